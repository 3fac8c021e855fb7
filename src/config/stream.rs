use super::env_or;
use crate::series::DEFAULT_MAX_CANDLES;
use std::time::Duration;

/// Scheduler tuning shared by every stream of one registry.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub cycle_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    pub max_consecutive_errors: u32,
    pub max_candles: usize,
    pub latency_window: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            cycle_delay: Duration::from_millis(1000),
            backoff_multiplier: 1.5,
            max_delay: Duration::from_millis(1000),
            max_consecutive_errors: 10,
            max_candles: DEFAULT_MAX_CANDLES,
            latency_window: 50,
        }
    }
}

impl StreamConfig {
    /// Read `STREAM_*` variables, keeping the default for anything missing
    /// or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cycle_delay: Duration::from_millis(env_or(
                "STREAM_CYCLE_DELAY_MS",
                defaults.cycle_delay.as_millis() as u64,
            )),
            backoff_multiplier: env_or("STREAM_BACKOFF_MULTIPLIER", defaults.backoff_multiplier),
            max_delay: Duration::from_millis(env_or(
                "STREAM_MAX_DELAY_MS",
                defaults.max_delay.as_millis() as u64,
            )),
            max_consecutive_errors: env_or("STREAM_MAX_ERRORS", defaults.max_consecutive_errors)
                .max(1),
            max_candles: env_or("STREAM_MAX_CANDLES", defaults.max_candles).max(1),
            latency_window: env_or("STREAM_LATENCY_WINDOW", defaults.latency_window).max(1),
        }
    }
}
