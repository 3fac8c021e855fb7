/// Chart geometry and zoom limits.
#[derive(Debug, Clone, Copy)]
pub struct ViewportConfig {
    pub chart_width: f64,
    pub chart_height: f64,
    pub min_candle_width: f64,
    pub max_candle_width: f64,
    pub zoom_factor: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            chart_width: 360.0,
            chart_height: 240.0,
            min_candle_width: 2.0,
            max_candle_width: 50.0,
            zoom_factor: 1.5,
            min_zoom: 0.1,
            max_zoom: 20.0,
        }
    }
}

impl ViewportConfig {
    /// Copy with every bound pair ordered and unusable values replaced by
    /// the defaults, so clamping against it cannot fail.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let (min_candle_width, max_candle_width) = ordered(
            non_negative(self.min_candle_width, defaults.min_candle_width),
            non_negative(self.max_candle_width, defaults.max_candle_width),
        );
        let (min_zoom, max_zoom) = ordered(
            positive(self.min_zoom, defaults.min_zoom),
            positive(self.max_zoom, defaults.max_zoom),
        );
        Self {
            chart_width: non_negative(self.chart_width, 0.0),
            chart_height: non_negative(self.chart_height, 0.0),
            min_candle_width,
            max_candle_width,
            zoom_factor: positive(self.zoom_factor, defaults.zoom_factor),
            min_zoom,
            max_zoom,
        }
    }
}

fn non_negative(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        fallback
    }
}

fn positive(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Thresholds for tap, double-tap and long-press recognition.
#[derive(Debug, Clone, Copy)]
pub struct GestureConfig {
    pub tap_max_distance: f64,
    pub tap_max_duration_ms: u64,
    pub double_tap_window_ms: u64,
    pub long_press_min_duration_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            tap_max_distance: 10.0,
            tap_max_duration_ms: 300,
            double_tap_window_ms: 300,
            long_press_min_duration_ms: 500,
        }
    }
}
