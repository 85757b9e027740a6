//! Zoom/pan state for one displayed screen.
//!
//! Screen coordinates relate to content coordinates by
//! `screen = content * scale + translation`. Content is centered on an axis
//! where it fits inside the view and clamped so its edges never leave the
//! view where it does not.

use crate::geometry::{Point, Rect, Size};
use serde::Serialize;
use tracing::trace;

pub const MIN_SCALE: f32 = 1.0;
pub const MAX_SCALE: f32 = 5.0;

/// Space kept between an ensured-visible rect and the view edges.
const VISIBLE_MARGIN_X: f32 = 50.0;
const VISIBLE_MARGIN_Y: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewportState {
    pub scale: f32,
    pub dx: f32,
    pub dy: f32,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            scale: MIN_SCALE,
            dx: 0.0,
            dy: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    state: ViewportState,
    view: Size,
    content: Size,
}

impl Viewport {
    pub fn new(view: Size, content: Size) -> Self {
        let mut viewport = Self {
            state: ViewportState::default(),
            view,
            content,
        };
        viewport.clamp();
        viewport
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn scale(&self) -> f32 {
        self.state.scale
    }

    pub fn view_size(&self) -> Size {
        self.view
    }

    pub fn content_size(&self) -> Size {
        self.content
    }

    pub fn is_zoomed(&self) -> bool {
        self.state.scale > MIN_SCALE
    }

    pub fn set_view_size(&mut self, view: Size) {
        self.view = view;
        self.clamp();
    }

    pub fn set_content_size(&mut self, content: Size) {
        self.content = content;
        self.clamp();
    }

    /// Multiply the scale by `factor` keeping `focus` (screen space) fixed.
    /// Returns whether the scale changed.
    pub fn zoom(&mut self, factor: f32, focus: Point) -> bool {
        if !factor.is_finite() || factor <= 0.0 {
            return false;
        }
        let previous = self.state.scale;
        let next = (previous * factor).clamp(MIN_SCALE, MAX_SCALE);
        let changed = (next - previous).abs() > f32::EPSILON;
        if changed {
            let adjusted = next / previous;
            self.state.dx += (self.state.dx - focus.x) * (adjusted - 1.0);
            self.state.dy += (self.state.dy - focus.y) * (adjusted - 1.0);
            self.state.scale = next;
        }
        self.clamp();
        trace!(scale = self.state.scale, dx = self.state.dx, dy = self.state.dy, "Zoomed viewport");
        changed
    }

    /// Drag by a screen-space delta. Only honoured while zoomed in.
    pub fn pan(&mut self, dx: f32, dy: f32) -> bool {
        if !self.is_zoomed() {
            return false;
        }
        self.state.dx += dx;
        self.state.dy += dy;
        self.clamp();
        true
    }

    pub fn reset(&mut self) {
        self.state = ViewportState::default();
        self.clamp();
    }

    pub fn to_document_point(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.state.dx) / self.state.scale,
            (screen.y - self.state.dy) / self.state.scale,
        )
    }

    pub fn to_screen_point(&self, content: Point) -> Point {
        Point::new(
            content.x * self.state.scale + self.state.dx,
            content.y * self.state.scale + self.state.dy,
        )
    }

    pub fn to_screen_rect(&self, content: Rect) -> Rect {
        content
            .scale(self.state.scale)
            .translate(self.state.dx, self.state.dy)
    }

    /// Pan so that `content` (content space) is on screen. Does nothing
    /// unless zoomed. Returns whether the translation moved.
    pub fn ensure_visible(&mut self, content: Rect) -> bool {
        if self.view.is_empty() || !self.is_zoomed() {
            return false;
        }
        let target = self.to_screen_rect(content);
        if Rect::from_size(self.view).contains_rect(&target) {
            return false;
        }

        let move_x = axis_shift(target.left, target.right, self.view.width, VISIBLE_MARGIN_X);
        let move_y = axis_shift(target.top, target.bottom, self.view.height, VISIBLE_MARGIN_Y);
        if move_x == 0.0 && move_y == 0.0 {
            return false;
        }
        let before = self.state;
        self.state.dx += move_x;
        self.state.dy += move_y;
        self.clamp();
        before != self.state
    }

    fn clamp(&mut self) {
        self.state.scale = self.state.scale.clamp(MIN_SCALE, MAX_SCALE);
        self.state.dx = clamp_axis(self.state.dx, self.content.width * self.state.scale, self.view.width);
        self.state.dy = clamp_axis(self.state.dy, self.content.height * self.state.scale, self.view.height);
    }
}

fn clamp_axis(offset: f32, scaled: f32, view: f32) -> f32 {
    if scaled <= view {
        (view - scaled) / 2.0
    } else {
        offset.clamp(view - scaled, 0.0)
    }
}

fn axis_shift(start: f32, end: f32, view: f32, margin: f32) -> f32 {
    let extent = end - start;
    if extent > view {
        (view - extent) / 2.0 - start
    } else if start < 0.0 {
        -start + margin
    } else if end > view {
        view - end - margin
    } else {
        0.0
    }
}
