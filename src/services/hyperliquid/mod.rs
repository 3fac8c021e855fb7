//! Hyperliquid public info API

pub mod messages;
pub mod provider;

pub use provider::HyperliquidRestSource;
