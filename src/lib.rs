//! Real-time candle streaming and chart viewport engine.

pub mod chart;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod models;
pub mod series;
pub mod services;

pub use error::{SourceError, StreamError};
pub use models::Candle;
