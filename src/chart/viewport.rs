//! Camera model mapping a candle series onto a bounded, zoomable window
//!
//! `offset_x = 0` shows the oldest candles, `offset_x = 1` the most recent.
//! `offset_y` shifts the fitted price range by a fraction of its span.
//! Nothing here fails: degenerate inputs produce zero widths and empty
//! ranges.

use crate::config::ViewportConfig;
use crate::models::Candle;
use crate::series::{price_bounds, CandleSeries};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::Range;
use tracing::trace;

pub const BASELINE_ZOOM: f64 = 1.0;

/// Zoom and pan, the part of the camera a gesture manipulates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraPosition {
    pub zoom_level: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for CameraPosition {
    fn default() -> Self {
        Self {
            zoom_level: BASELINE_ZOOM,
            offset_x: 1.0,
            offset_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraState {
    pub zoom_level: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub start_index: usize,
    pub end_index: usize,
    pub is_user_interacting: bool,
    pub temporary_position: Option<CameraPosition>,
}

impl Default for CameraState {
    fn default() -> Self {
        let position = CameraPosition::default();
        Self {
            zoom_level: position.zoom_level,
            offset_x: position.offset_x,
            offset_y: position.offset_y,
            min_price: 0.0,
            max_price: 0.0,
            start_index: 0,
            end_index: 0,
            is_user_interacting: false,
            temporary_position: None,
        }
    }
}

impl CameraState {
    pub fn committed_position(&self) -> CameraPosition {
        CameraPosition {
            zoom_level: self.zoom_level,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
        }
    }

    /// The temporary position while a gesture has one, the committed one otherwise.
    pub fn effective_position(&self) -> CameraPosition {
        match (self.is_user_interacting, self.temporary_position) {
            (true, Some(temporary)) => temporary,
            _ => self.committed_position(),
        }
    }

    fn commit(&mut self, position: CameraPosition) {
        self.zoom_level = position.zoom_level;
        self.offset_x = position.offset_x;
        self.offset_y = position.offset_y;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VisibleRange {
    pub start_index: usize,
    pub end_index: usize,
}

impl VisibleRange {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.start_index == self.end_index
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start_index..self.end_index
    }
}

/// Price bounds after the vertical offset, plus the vertical scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceRange {
    pub min_price: f64,
    pub max_price: f64,
    pub pixels_per_unit: f64,
}

#[derive(Debug, Clone)]
pub struct Viewport {
    config: ViewportConfig,
    camera: CameraState,
}

impl Viewport {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config: config.normalized(),
            camera: CameraState::default(),
        }
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn position(&self) -> CameraPosition {
        self.camera.effective_position()
    }

    pub fn resize(&mut self, chart_width: f64, chart_height: f64) {
        self.config.chart_width = sanitize(chart_width, 0.0).max(0.0);
        self.config.chart_height = sanitize(chart_height, 0.0).max(0.0);
    }

    fn clamp_position(&self, position: CameraPosition) -> CameraPosition {
        let current = self.position();
        CameraPosition {
            zoom_level: sanitize(position.zoom_level, current.zoom_level)
                .clamp(self.config.min_zoom, self.config.max_zoom),
            offset_x: sanitize(position.offset_x, current.offset_x).clamp(0.0, 1.0),
            offset_y: sanitize(position.offset_y, current.offset_y).clamp(-1.0, 1.0),
        }
    }

    /// Apply `change` to the effective position, writing to the temporary
    /// position during a gesture and to committed state otherwise.
    fn update_position(&mut self, change: impl FnOnce(&mut CameraPosition)) {
        let mut position = self.position();
        change(&mut position);
        let position = self.clamp_position(position);
        if self.camera.is_user_interacting {
            self.camera.temporary_position = Some(position);
        } else {
            self.camera.commit(position);
        }
    }

    pub fn candle_width(&self, candle_count: usize) -> f64 {
        if candle_count == 0 || self.config.chart_width <= 0.0 {
            return 0.0;
        }
        let zoom = self.position().zoom_level;
        let width = self.config.chart_width / candle_count as f64 * zoom;
        width.clamp(self.config.min_candle_width, self.config.max_candle_width)
    }

    pub fn visible_count(&self, candle_count: usize) -> usize {
        let width = self.candle_width(candle_count);
        if width <= 0.0 {
            return 0;
        }
        (self.config.chart_width / width).floor() as usize
    }

    pub fn visible_range(&self, candle_count: usize) -> VisibleRange {
        let visible = self.visible_count(candle_count);
        if visible == 0 {
            return VisibleRange::default();
        }
        let scrollable = candle_count.saturating_sub(visible);
        let start_index =
            ((self.position().offset_x * scrollable as f64).floor() as usize).min(scrollable);
        VisibleRange {
            start_index,
            end_index: candle_count.min(start_index + visible),
        }
    }

    /// Recompute and store the visible indices for `candle_count` candles.
    pub fn update_visible_range(&mut self, candle_count: usize) -> VisibleRange {
        let range = self.visible_range(candle_count);
        self.camera.start_index = range.start_index;
        self.camera.end_index = range.end_index;
        trace!(?range, candle_count, "Viewport: visible range updated");
        range
    }

    pub fn visible_slice<'a>(&self, candles: &'a [Candle]) -> &'a [Candle] {
        &candles[self.visible_range(candles.len()).as_range()]
    }

    pub fn zoom_in(&mut self) {
        let factor = self.config.zoom_factor;
        self.update_position(|p| p.zoom_level *= factor);
    }

    pub fn zoom_out(&mut self) {
        let factor = self.config.zoom_factor;
        self.update_position(|p| p.zoom_level /= factor);
    }

    pub fn set_zoom(&mut self, zoom_level: f64) {
        self.update_position(|p| p.zoom_level = zoom_level);
    }

    pub fn reset_zoom(&mut self) {
        self.set_zoom(BASELINE_ZOOM);
    }

    /// Towards older candles.
    pub fn pan_left(&mut self, step: f64) {
        self.update_position(|p| p.offset_x -= step);
    }

    /// Towards newer candles.
    pub fn pan_right(&mut self, step: f64) {
        self.update_position(|p| p.offset_x += step);
    }

    pub fn pan_up(&mut self, step: f64) {
        self.update_position(|p| p.offset_y += step);
    }

    pub fn pan_down(&mut self, step: f64) {
        self.update_position(|p| p.offset_y -= step);
    }

    pub fn set_pan(&mut self, offset_x: f64, offset_y: f64) {
        self.update_position(|p| {
            p.offset_x = offset_x;
            p.offset_y = offset_y;
        });
    }

    pub fn go_to_start(&mut self) {
        self.update_position(|p| p.offset_x = 0.0);
    }

    pub fn go_to_end(&mut self) {
        self.update_position(|p| p.offset_x = 1.0);
    }

    /// Scroll so `index` sits in the middle of the window where possible.
    pub fn go_to_index(&mut self, index: usize, candle_count: usize) {
        if candle_count == 0 {
            return;
        }
        let visible = self.visible_count(candle_count);
        let scrollable = candle_count.saturating_sub(visible);
        if scrollable == 0 {
            return;
        }
        let index = index.min(candle_count - 1);
        let start = index.saturating_sub(visible / 2).min(scrollable);
        // Half-step bias keeps floor(offset * scrollable) landing on `start`.
        let offset_x = ((start as f64 + 0.5) / scrollable as f64).min(1.0);
        self.update_position(|p| p.offset_x = offset_x);
    }

    pub fn go_to_timestamp(&mut self, timestamp: DateTime<Utc>, series: &CandleSeries) {
        if let Some(index) = series.index_of_timestamp(timestamp) {
            self.go_to_index(index, series.len());
        }
    }

    /// Back to the baseline: unit zoom, newest candles, price range over
    /// every candle.
    pub fn fit_all(&mut self, candles: &[Candle]) {
        self.update_position(|p| *p = CameraPosition::default());
        if let Some((low, high)) = price_bounds(candles) {
            self.fit_price_range(low, high);
        }
    }

    /// Fit the price range to the candles currently in view.
    pub fn fit_visible(&mut self, candles: &[Candle]) {
        self.update_visible_range(candles.len());
        if let Some((low, high)) = price_bounds(self.visible_slice(candles)) {
            self.fit_price_range(low, high);
        }
        self.update_position(|p| p.offset_y = 0.0);
    }

    pub fn fit_price_range(&mut self, min_price: f64, max_price: f64) {
        if !min_price.is_finite() || !max_price.is_finite() {
            return;
        }
        let (min_price, max_price) = if min_price <= max_price {
            (min_price, max_price)
        } else {
            (max_price, min_price)
        };
        self.camera.min_price = min_price;
        self.camera.max_price = max_price;
    }

    pub fn price_range(&self) -> PriceRange {
        let span = self.camera.max_price - self.camera.min_price;
        let shift = self.position().offset_y * span;
        let pixels_per_unit = if span > 0.0 {
            self.config.chart_height / span
        } else {
            0.0
        };
        PriceRange {
            min_price: self.camera.min_price + shift,
            max_price: self.camera.max_price + shift,
            pixels_per_unit,
        }
    }

    /// Pixel row of `price`, 0 at the top of the chart.
    pub fn price_to_y(&self, price: f64) -> f64 {
        let range = self.price_range();
        if range.pixels_per_unit <= 0.0 {
            return self.config.chart_height / 2.0;
        }
        (range.max_price - price) * range.pixels_per_unit
    }

    pub fn y_to_price(&self, y: f64) -> f64 {
        let range = self.price_range();
        if range.pixels_per_unit <= 0.0 {
            return range.min_price;
        }
        range.max_price - y / range.pixels_per_unit
    }

    pub fn start_user_interaction(&mut self) {
        self.camera.is_user_interacting = true;
        self.camera.temporary_position = Some(self.camera.committed_position());
    }

    /// Ignored unless an interaction is in progress.
    pub fn set_temporary_position(&mut self, position: CameraPosition) {
        if !self.camera.is_user_interacting {
            trace!("Viewport: temporary position outside interaction ignored");
            return;
        }
        self.camera.temporary_position = Some(self.clamp_position(position));
    }

    /// Commit the temporary position and leave interaction mode.
    pub fn end_user_interaction(&mut self) {
        if let Some(position) = self.camera.temporary_position.take() {
            self.camera.commit(position);
        }
        self.camera.is_user_interacting = false;
    }

    /// Leave interaction mode discarding the temporary position.
    pub fn cancel_user_interaction(&mut self) {
        self.camera.temporary_position = None;
        self.camera.is_user_interacting = false;
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

fn sanitize(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
