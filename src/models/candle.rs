use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV sample for a single interval window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Zero-volume candle with every price field set to `price`.
    pub fn flat(price: f64, timestamp: DateTime<Utc>) -> Self {
        Self::new(price, price, price, price, 0.0, timestamp)
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}
