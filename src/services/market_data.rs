//! Sample source interface consumed by the stream scheduler.

use crate::error::SourceError;
use crate::models::Candle;
use crate::series::{window_start, Interval};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[async_trait::async_trait]
pub trait SampleSource: Send + Sync {
    /// Fetch the most recent sample for `symbol` at `interval`. Only the
    /// last element of the returned vector is consumed.
    async fn fetch_latest(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Vec<Candle>, SourceError>;

    /// Get the latest traded or mid price for a symbol
    async fn latest_price(&self, _symbol: &str) -> Result<f64, SourceError> {
        Err(SourceError::Unsupported)
    }
}

/// Wraps a source and keeps the stream alive through partial outages by
/// synthesizing a candle from the last known price.
///
/// Inside the window of the last real sample the synthetic candle extends
/// that sample (close moved to the price, high/low widened, volume kept).
/// In a new window it is flat with zero volume.
pub struct FallbackSource {
    primary: Arc<dyn SampleSource>,
    last_close: Arc<RwLock<HashMap<String, f64>>>,
    last_sample: Arc<RwLock<HashMap<(String, Interval), Candle>>>,
}

impl FallbackSource {
    pub fn new(primary: Arc<dyn SampleSource>) -> Self {
        Self {
            primary,
            last_close: Arc::new(RwLock::new(HashMap::new())),
            last_sample: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn synthesize(
        &self,
        symbol: &str,
        interval: Interval,
        price: f64,
        now: DateTime<Utc>,
    ) -> Candle {
        let key = (symbol.to_string(), interval);
        match self.last_sample.read().await.get(&key) {
            Some(last) if window_start(last.timestamp, interval) == window_start(now, interval) => {
                Candle {
                    high: last.high.max(price),
                    low: last.low.min(price),
                    close: price,
                    ..*last
                }
            }
            _ => Candle::flat(price, now),
        }
    }

    async fn known_price(&self, symbol: &str) -> Option<f64> {
        match self.primary.latest_price(symbol).await {
            Ok(price) if price.is_finite() && price > 0.0 => return Some(price),
            Ok(_) | Err(_) => {}
        }
        self.last_close.read().await.get(symbol).copied()
    }
}

#[async_trait::async_trait]
impl SampleSource for FallbackSource {
    async fn fetch_latest(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Vec<Candle>, SourceError> {
        match self.primary.fetch_latest(symbol, interval).await {
            Ok(samples) => {
                if let Some(last) = samples.last().copied() {
                    if last.close.is_finite() && last.close > 0.0 {
                        self.last_close.write().await.insert(symbol.to_string(), last.close);
                    }
                    self.last_sample
                        .write()
                        .await
                        .insert((symbol.to_string(), interval), last);
                }
                Ok(samples)
            }
            Err(e) => match self.known_price(symbol).await {
                Some(price) => {
                    warn!(
                        symbol = %symbol,
                        interval = %interval,
                        error = %e,
                        price,
                        "FallbackSource: primary fetch failed, synthesizing sample from last known price"
                    );
                    Ok(vec![self.synthesize(symbol, interval, price, Utc::now()).await])
                }
                None => {
                    debug!(symbol = %symbol, "FallbackSource: no known price for {}", symbol);
                    Err(e)
                }
            },
        }
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, SourceError> {
        self.known_price(symbol)
            .await
            .ok_or_else(|| SourceError::Unavailable(symbol.to_string()))
    }
}

/// Source that never yields data, for wiring tests and dry runs.
pub struct PlaceholderSampleSource;

#[async_trait::async_trait]
impl SampleSource for PlaceholderSampleSource {
    async fn fetch_latest(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Vec<Candle>, SourceError> {
        Err(SourceError::Empty {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
        })
    }
}
