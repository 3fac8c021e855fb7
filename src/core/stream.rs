//! Per-stream identity and bookkeeping

use crate::models::Candle;
use crate::series::Interval;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Registry key: one stream per (symbol, interval).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StreamKey {
    pub symbol: String,
    pub interval: Interval,
}

impl StreamKey {
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.symbol, self.interval)
    }
}

/// Mutable cycle state of a running stream.
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    pub is_running: bool,
    pub cycle_count: u64,
    /// Consecutive failures, reset by any successful cycle.
    pub error_count: u32,
    pub request_in_progress: bool,
    pub last_valid_sample: Option<Candle>,
    pub response_times: VecDeque<Duration>,
}

impl StreamState {
    pub fn running() -> Self {
        Self {
            is_running: true,
            ..Self::default()
        }
    }

    /// Keep only the most recent `window` latencies.
    pub fn record_latency(&mut self, latency: Duration, window: usize) {
        self.response_times.push_back(latency);
        while self.response_times.len() > window.max(1) {
            self.response_times.pop_front();
        }
    }

    pub fn average_response_time(&self) -> Option<Duration> {
        if self.response_times.is_empty() {
            return None;
        }
        let total: Duration = self.response_times.iter().sum();
        Some(total / self.response_times.len() as u32)
    }
}

/// Read-only view of a stream for callers and logs.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStats {
    pub key: StreamKey,
    pub is_running: bool,
    pub cycle_count: u64,
    pub error_count: u32,
    pub request_in_progress: bool,
    pub cycle_delay_ms: u64,
    pub average_response_ms: Option<f64>,
    pub series_len: usize,
    pub last_valid_sample: Option<Candle>,
}
