//! Request and response payloads of the `/info` endpoint

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest {
    CandleSnapshot { req: CandleSnapshotRequest },
    AllMids,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleSnapshotRequest {
    pub coin: String,
    pub interval: String,
    pub start_time: i64,
    pub end_time: i64,
}

/// One candle as returned by `candleSnapshot`; prices arrive as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct CandleEntry {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "T", default)]
    pub close_time: i64,
    #[serde(rename = "s", default)]
    pub coin: String,
    #[serde(rename = "i", default)]
    pub interval: String,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "v")]
    pub volume: String,
    #[serde(rename = "n", default)]
    pub trades: u64,
}

pub type AllMids = HashMap<String, String>;
