//! Shared geometry types used across multiple modules.
//!
//! This module contains common data structures to avoid circular dependencies
//! between the drag controller, the board and the persisted layout.

use serde::{Deserialize, Serialize};

/// A widget rectangle in board pixels, relative to the board's top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Right edge X coordinate
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge Y coordinate
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether a point lies inside the rectangle (edges inclusive)
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }
}

/// Width and height pair, used for minimum widget sizes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// The visible board area.
///
/// `reserved_bottom` is the strip kept free for the bottom bar; widgets may
/// never extend into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub reserved_bottom: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, reserved_bottom: f64) -> Self {
        Self { width, height, reserved_bottom }
    }

    /// Height available to widgets
    pub fn usable_height(&self) -> f64 {
        (self.height - self.reserved_bottom).max(0.0)
    }

    /// Fit a rectangle inside the usable area.
    ///
    /// Size is clamped first (minimum wins over the viewport), then the
    /// position is pulled back so the rectangle ends inside the viewport.
    pub fn contain(&self, rect: Rect, min: Size) -> Rect {
        let width = clamp(rect.width, min.width, self.width);
        let height = clamp(rect.height, min.height, self.usable_height());
        Rect {
            x: clamp(rect.x, 0.0, self.width - width),
            y: clamp(rect.y, 0.0, self.usable_height() - height),
            width,
            height,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1920.0, 1080.0, 80.0)
    }
}

/// Clamp `value` into `[lo, hi]`; when `hi < lo` the lower bound wins.
///
/// `f64::clamp` panics on an inverted range, which happens whenever a widget
/// is larger than the space left for it.
pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.min(hi).max(lo)
}
