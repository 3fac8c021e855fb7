//! Error types for sample sources and streams

use crate::models::Candle;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("No samples returned for {symbol} {interval}")]
    Empty { symbol: String, interval: String },
    #[error("No price available for {0}")]
    Unavailable(String),
    #[error("Operation not supported by this source")]
    Unsupported,
    #[error("Source panicked: {0}")]
    Panicked(String),
}

#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] SourceError),
    #[error("Sample still invalid after repair: {0:?}")]
    InvalidSample(Candle),
    #[error("Stream stopped after {consecutive_errors} consecutive errors")]
    Terminal { consecutive_errors: u32 },
}

impl StreamError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamError::Terminal { .. })
    }
}
