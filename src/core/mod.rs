//! Streaming engine: stream bookkeeping and the polling scheduler

pub mod scheduler;
pub mod stream;

pub use scheduler::*;
pub use stream::*;
