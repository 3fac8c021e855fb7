//! Shared data models spanning the engine layers.

pub mod candle;

pub use candle::Candle;
