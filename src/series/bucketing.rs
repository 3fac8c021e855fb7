//! Interval codes, window alignment and sample classification

use crate::models::Candle;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Candle interval, identified by its exchange code (`"1m"`, `"4h"`, `"1M"`...).
/// Deserializes like [`Interval::parse`], so unknown codes become `1m`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Interval {
    #[default]
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl Interval {
    pub const ALL: [Interval; 15] = [
        Interval::OneMinute,
        Interval::ThreeMinutes,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
        Interval::TwoHours,
        Interval::FourHours,
        Interval::SixHours,
        Interval::EightHours,
        Interval::TwelveHours,
        Interval::OneDay,
        Interval::ThreeDays,
        Interval::OneWeek,
        Interval::OneMonth,
    ];

    /// Parse an interval code. Unknown codes fall back to one minute.
    pub fn parse(code: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|interval| interval.as_str() == code)
            .unwrap_or(Interval::OneMinute)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::ThreeMinutes => "3m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::TwoHours => "2h",
            Interval::FourHours => "4h",
            Interval::SixHours => "6h",
            Interval::EightHours => "8h",
            Interval::TwelveHours => "12h",
            Interval::OneDay => "1d",
            Interval::ThreeDays => "3d",
            Interval::OneWeek => "1w",
            Interval::OneMonth => "1M",
        }
    }

    /// Nominal window length. Weeks and months are calendar aligned, so for
    /// those this is only an approximation used for fetch ranges.
    pub fn duration_ms(&self) -> i64 {
        match self {
            Interval::OneMinute => MINUTE_MS,
            Interval::ThreeMinutes => 3 * MINUTE_MS,
            Interval::FiveMinutes => 5 * MINUTE_MS,
            Interval::FifteenMinutes => 15 * MINUTE_MS,
            Interval::ThirtyMinutes => 30 * MINUTE_MS,
            Interval::OneHour => HOUR_MS,
            Interval::TwoHours => 2 * HOUR_MS,
            Interval::FourHours => 4 * HOUR_MS,
            Interval::SixHours => 6 * HOUR_MS,
            Interval::EightHours => 8 * HOUR_MS,
            Interval::TwelveHours => 12 * HOUR_MS,
            Interval::OneDay => DAY_MS,
            Interval::ThreeDays => 3 * DAY_MS,
            Interval::OneWeek => 7 * DAY_MS,
            Interval::OneMonth => 30 * DAY_MS,
        }
    }

    pub fn is_calendar_aligned(&self) -> bool {
        matches!(self, Interval::OneWeek | Interval::OneMonth)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Interval {
    fn from(code: String) -> Self {
        Interval::parse(&code)
    }
}

impl FromStr for Interval {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Interval::parse(s))
    }
}

pub fn interval_duration_ms(interval: Interval) -> i64 {
    interval.duration_ms()
}

/// Canonical start of the window `timestamp` falls into.
pub fn window_start(timestamp: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    match interval {
        Interval::OneWeek => {
            let days_since_monday = i64::from(timestamp.weekday().num_days_from_monday());
            let monday = timestamp.date_naive() - Duration::days(days_since_monday);
            monday
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc())
                .unwrap_or(timestamp)
        }
        Interval::OneMonth => Utc
            .with_ymd_and_hms(timestamp.year(), timestamp.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(timestamp),
        fixed => {
            let duration = fixed.duration_ms();
            let start = timestamp.timestamp_millis().div_euclid(duration) * duration;
            DateTime::from_timestamp_millis(start).unwrap_or(timestamp)
        }
    }
}

/// What to do with a new sample relative to an existing series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesAction {
    /// Replace the element at this index (same window).
    Update(usize),
    /// Push as the newest element.
    Append,
    /// Older than anything retained, drop it.
    Ignore,
}

/// Classify `sample` against `series`, which must be ordered by window start
/// with no duplicate windows.
///
/// Same-window correction of the latest candle wins over chronological
/// append. Late samples repair an older window only while that window is
/// still retained, anything older is dropped.
pub fn classify(series: &[Candle], sample: &Candle, interval: Interval) -> SeriesAction {
    let Some(last) = series.last() else {
        return SeriesAction::Append;
    };

    let sample_window = window_start(sample.timestamp, interval);
    if sample_window == window_start(last.timestamp, interval) {
        return SeriesAction::Update(series.len() - 1);
    }

    if sample.timestamp > last.timestamp {
        return SeriesAction::Append;
    }

    match series.binary_search_by_key(&sample_window, |c| window_start(c.timestamp, interval)) {
        Ok(index) => SeriesAction::Update(index),
        Err(_) => SeriesAction::Ignore,
    }
}
