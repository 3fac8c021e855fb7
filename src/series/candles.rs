//! Bounded, window-deduplicated candle series

use super::bucketing::{classify, window_start, Interval, SeriesAction};
use crate::models::Candle;
use chrono::{DateTime, Utc};
use std::ops::Range;

pub const DEFAULT_MAX_CANDLES: usize = 1000;

/// Ordered candles for one (symbol, interval), newest last.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    interval: Interval,
    max_candles: usize,
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(interval: Interval, max_candles: usize) -> Self {
        Self {
            interval,
            max_candles: max_candles.max(1),
            candles: Vec::new(),
        }
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn max_candles(&self) -> usize {
        self.max_candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    /// Owned copy for renderers; the series itself is never handed out mutably.
    pub fn snapshot(&self) -> Vec<Candle> {
        self.candles.clone()
    }

    /// Apply `sample` and enforce capacity. The sample must already be valid.
    pub fn upsert(&mut self, sample: Candle) -> SeriesAction {
        let action = classify(&self.candles, &sample, self.interval);
        match action {
            SeriesAction::Update(index) => self.candles[index] = sample,
            SeriesAction::Append => {
                self.candles.push(sample);
                self.enforce_capacity();
            }
            SeriesAction::Ignore => {}
        }
        action
    }

    fn enforce_capacity(&mut self) {
        if self.candles.len() > self.max_candles {
            let excess = self.candles.len() - self.max_candles;
            self.candles.drain(..excess);
        }
    }

    /// Index of the candle whose window contains `timestamp`, or the nearest
    /// retained neighbour when that window is missing.
    pub fn index_of_timestamp(&self, timestamp: DateTime<Utc>) -> Option<usize> {
        if self.candles.is_empty() {
            return None;
        }
        let target = window_start(timestamp, self.interval);
        let index = match self
            .candles
            .binary_search_by_key(&target, |c| window_start(c.timestamp, self.interval))
        {
            Ok(index) => index,
            Err(insert_at) => insert_at.min(self.candles.len() - 1),
        };
        Some(index)
    }

    /// Lowest low and highest high across `range`, clipped to the series.
    pub fn price_bounds(&self, range: Range<usize>) -> Option<(f64, f64)> {
        let end = range.end.min(self.candles.len());
        let start = range.start.min(end);
        price_bounds(&self.candles[start..end])
    }
}

/// Functional form of [`CandleSeries::upsert`] over a plain slice.
pub fn upsert(
    series: &[Candle],
    sample: Candle,
    interval: Interval,
    max_candles: usize,
) -> (Vec<Candle>, SeriesAction) {
    let mut owned = CandleSeries {
        interval,
        max_candles: max_candles.max(1),
        candles: series.to_vec(),
    };
    let action = owned.upsert(sample);
    owned.enforce_capacity();
    (owned.candles, action)
}

pub fn price_bounds(candles: &[Candle]) -> Option<(f64, f64)> {
    candles.iter().fold(None, |bounds, c| match bounds {
        None => Some((c.low, c.high)),
        Some((low, high)) => Some((low.min(c.low), high.max(c.high))),
    })
}
