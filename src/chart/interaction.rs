//! Touch gesture state machine driving the viewport

use super::viewport::{CameraPosition, Viewport, BASELINE_ZOOM};
use crate::config::GestureConfig;
use tracing::debug;

const DOUBLE_TAP_ZOOM: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f64,
    pub y: f64,
}

impl TouchPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &TouchPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &TouchPoint) -> TouchPoint {
        TouchPoint::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// How a finished gesture was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Tap,
    DoubleTap,
    LongPress,
    DragRelease,
    PinchRelease,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GesturePhase {
    Idle,
    Panning {
        anchor: TouchPoint,
        baseline: CameraPosition,
    },
    Pinching {
        initial_distance: f64,
        initial_centroid: TouchPoint,
        baseline: CameraPosition,
    },
}

/// One per chart. Times are caller-supplied milliseconds from any monotonic clock.
#[derive(Debug, Clone)]
pub struct InteractionController {
    config: GestureConfig,
    phase: GesturePhase,
    start_point: TouchPoint,
    last_point: TouchPoint,
    start_time_ms: u64,
    pinched: bool,
    last_tap_ms: Option<u64>,
}

impl InteractionController {
    pub fn new(config: GestureConfig) -> Self {
        let origin = TouchPoint::new(0.0, 0.0);
        Self {
            config,
            phase: GesturePhase::Idle,
            start_point: origin,
            last_point: origin,
            start_time_ms: 0,
            pinched: false,
            last_tap_ms: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == GesturePhase::Idle
    }

    pub fn is_panning(&self) -> bool {
        matches!(self.phase, GesturePhase::Panning { .. })
    }

    pub fn is_pinching(&self) -> bool {
        matches!(self.phase, GesturePhase::Pinching { .. })
    }

    pub fn touch_start(&mut self, viewport: &mut Viewport, touches: &[TouchPoint], now_ms: u64) {
        let Some(first) = touches.first().copied() else {
            return;
        };

        if self.phase != GesturePhase::Idle {
            if touches.len() >= 2 && self.is_panning() {
                self.begin_pinch(viewport, touches[0], touches[1]);
            }
            return;
        }

        self.start_point = first;
        self.last_point = first;
        self.start_time_ms = now_ms;
        self.pinched = false;
        viewport.start_user_interaction();

        if touches.len() >= 2 {
            self.begin_pinch(viewport, touches[0], touches[1]);
        } else {
            self.phase = GesturePhase::Panning {
                anchor: first,
                baseline: viewport.position(),
            };
        }
    }

    /// Switch to pinching from the current effective position, without
    /// committing anything.
    fn begin_pinch(&mut self, viewport: &Viewport, a: TouchPoint, b: TouchPoint) {
        self.pinched = true;
        self.phase = GesturePhase::Pinching {
            initial_distance: a.distance_to(&b),
            initial_centroid: a.midpoint(&b),
            baseline: viewport.position(),
        };
        debug!("InteractionController: pinch started");
    }

    pub fn touch_move(&mut self, viewport: &mut Viewport, touches: &[TouchPoint]) {
        let Some(first) = touches.first().copied() else {
            return;
        };
        let (width, height) = {
            let config = viewport.config();
            (config.chart_width, config.chart_height)
        };

        match self.phase {
            GesturePhase::Idle => {}
            GesturePhase::Panning { .. } if touches.len() >= 2 => {
                self.begin_pinch(viewport, touches[0], touches[1]);
            }
            GesturePhase::Panning { anchor, baseline } => {
                self.last_point = first;
                let position = CameraPosition {
                    zoom_level: baseline.zoom_level,
                    offset_x: baseline.offset_x - fraction(first.x - anchor.x, width),
                    offset_y: baseline.offset_y + fraction(first.y - anchor.y, height),
                };
                viewport.set_temporary_position(position);
            }
            GesturePhase::Pinching { .. } if touches.len() < 2 => {
                // A finger lifted: keep going as a pan from where the pinch left off.
                self.last_point = first;
                self.phase = GesturePhase::Panning {
                    anchor: first,
                    baseline: viewport.position(),
                };
            }
            GesturePhase::Pinching {
                initial_distance,
                initial_centroid,
                baseline,
            } => {
                self.last_point = first;
                let distance = touches[0].distance_to(&touches[1]);
                let ratio = if initial_distance > f64::EPSILON {
                    distance / initial_distance
                } else {
                    1.0
                };
                let centroid = touches[0].midpoint(&touches[1]);
                let position = CameraPosition {
                    zoom_level: baseline.zoom_level * ratio,
                    offset_x: baseline.offset_x - fraction(centroid.x - initial_centroid.x, width),
                    offset_y: baseline.offset_y
                        + fraction(centroid.y - initial_centroid.y, height),
                };
                viewport.set_temporary_position(position);
            }
        }
    }

    /// All fingers lifted. Returns `None` when no gesture was active.
    pub fn touch_end(&mut self, viewport: &mut Viewport, now_ms: u64) -> Option<GestureKind> {
        if self.phase == GesturePhase::Idle {
            return None;
        }
        self.phase = GesturePhase::Idle;

        let distance = self.start_point.distance_to(&self.last_point);
        let duration = now_ms.saturating_sub(self.start_time_ms);
        let stationary = !self.pinched && distance < self.config.tap_max_distance;

        let kind = if stationary && duration < self.config.tap_max_duration_ms {
            viewport.cancel_user_interaction();
            let double = self
                .last_tap_ms
                .is_some_and(|last| now_ms.saturating_sub(last) < self.config.double_tap_window_ms);
            if double {
                self.last_tap_ms = None;
                let zoom = if viewport.position().zoom_level > BASELINE_ZOOM + f64::EPSILON {
                    BASELINE_ZOOM
                } else {
                    DOUBLE_TAP_ZOOM
                };
                viewport.set_zoom(zoom);
                GestureKind::DoubleTap
            } else {
                self.last_tap_ms = Some(now_ms);
                GestureKind::Tap
            }
        } else {
            viewport.end_user_interaction();
            if self.pinched {
                GestureKind::PinchRelease
            } else if stationary && duration >= self.config.long_press_min_duration_ms {
                GestureKind::LongPress
            } else {
                GestureKind::DragRelease
            }
        };

        debug!(?kind, distance, duration_ms = duration, "InteractionController: gesture ended");
        Some(kind)
    }

    /// The platform cancelled the touch sequence: discard the gesture.
    pub fn touch_cancel(&mut self, viewport: &mut Viewport) {
        if self.phase != GesturePhase::Idle {
            self.phase = GesturePhase::Idle;
            viewport.cancel_user_interaction();
        }
    }
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

fn fraction(delta: f64, extent: f64) -> f64 {
    if extent > 0.0 {
        delta / extent
    } else {
        0.0
    }
}
