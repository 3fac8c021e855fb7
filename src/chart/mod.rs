//! Camera/viewport transform and gesture handling for candle charts

pub mod interaction;
pub mod viewport;

pub use interaction::{GestureKind, InteractionController, TouchPoint};
pub use viewport::{CameraPosition, CameraState, PriceRange, Viewport, VisibleRange};
