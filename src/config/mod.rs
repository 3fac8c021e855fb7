//! Environment-driven configuration

pub mod chart;
pub mod stream;

pub use chart::{GestureConfig, ViewportConfig};
pub use stream::StreamConfig;

use std::env;
use std::str::FromStr;

/// Deployment environment (`APP_ENV`), `sandbox` when unset.
pub fn get_environment() -> String {
    env::var("APP_ENV").unwrap_or_else(|_| "sandbox".to_string())
}

pub fn get_hyperliquid_url() -> String {
    env::var("HYPERLIQUID_API_URL").unwrap_or_else(|_| "https://api.hyperliquid.xyz".to_string())
}

pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
