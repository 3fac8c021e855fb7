//! Market data sources

pub mod hyperliquid;
pub mod market_data;

pub use hyperliquid::HyperliquidRestSource;
pub use market_data::{FallbackSource, PlaceholderSampleSource, SampleSource};
