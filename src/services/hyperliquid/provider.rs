//! Hyperliquid REST sample source

use super::messages::{AllMids, CandleEntry, CandleSnapshotRequest, InfoRequest};
use crate::error::SourceError;
use crate::models::Candle;
use crate::series::Interval;
use crate::services::market_data::SampleSource;
use chrono::{DateTime, Utc};
use tracing::debug;
use url::Url;

pub struct HyperliquidRestSource {
    info_url: String,
    client: reqwest::Client,
}

impl HyperliquidRestSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let info_url = info_url(&base_url.into());
        Self { info_url, client }
    }

    async fn post_info<T: serde::de::DeserializeOwned>(
        &self,
        request: &InfoRequest,
    ) -> Result<T, SourceError> {
        let response = self.client.post(&self.info_url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| SourceError::Decode(e.to_string()))
    }
}

/// `{base}/info`, keeping any path prefix of `base_url`.
fn info_url(base_url: &str) -> String {
    match Url::parse(base_url) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push("info");
            }
            url.to_string()
        }
        _ => format!("{}/info", base_url.trim_end_matches('/')),
    }
}

/// Unparsable numeric strings decode to NaN and are left to validation.
fn parse_field(value: &str) -> f64 {
    value.trim().parse().unwrap_or(f64::NAN)
}

impl From<&CandleEntry> for Candle {
    fn from(entry: &CandleEntry) -> Self {
        let timestamp = DateTime::from_timestamp_millis(entry.open_time).unwrap_or_else(Utc::now);
        Candle::new(
            parse_field(&entry.open),
            parse_field(&entry.high),
            parse_field(&entry.low),
            parse_field(&entry.close),
            parse_field(&entry.volume),
            timestamp,
        )
    }
}

#[async_trait::async_trait]
impl SampleSource for HyperliquidRestSource {
    async fn fetch_latest(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Vec<Candle>, SourceError> {
        let end_time = Utc::now().timestamp_millis();
        let request = InfoRequest::CandleSnapshot {
            req: CandleSnapshotRequest {
                coin: symbol.to_string(),
                interval: interval.to_string(),
                start_time: end_time - 2 * interval.duration_ms(),
                end_time,
            },
        };

        let entries: Vec<CandleEntry> = self.post_info(&request).await?;
        debug!(
            symbol = %symbol,
            interval = %interval,
            count = entries.len(),
            "HyperliquidRestSource: received {} candles",
            entries.len()
        );

        let latest = entries
            .iter()
            .max_by_key(|entry| entry.open_time)
            .ok_or_else(|| SourceError::Empty {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            })?;
        Ok(vec![Candle::from(latest)])
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, SourceError> {
        let mids: AllMids = self.post_info(&InfoRequest::AllMids).await?;
        mids.get(symbol)
            .map(|px| parse_field(px))
            .filter(|px| px.is_finite() && *px > 0.0)
            .ok_or_else(|| SourceError::Unavailable(symbol.to_string()))
    }
}
