//! Time bucketing and the in-memory candle series

pub mod bucketing;
pub mod candles;
pub mod validation;

pub use bucketing::{classify, interval_duration_ms, window_start, Interval, SeriesAction};
pub use candles::{price_bounds, upsert, CandleSeries, DEFAULT_MAX_CANDLES};
pub use validation::{is_valid, repair, FALLBACK_PRICE};
