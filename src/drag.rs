//! Drag and resize gestures for a single widget.
//!
//! ```text
//!                 pointer down on body      ┌──────────┐
//!            ┌─────────────────────────────►│ Dragging │──┐
//!            │                              └──────────┘  │
//!       ┌────┴─┐                                          │ up / cancel /
//!       │ Idle │◄─────────────────────────────────────────┤ lost capture
//!       └────┬─┘                                          │
//!            │  pointer down on handle      ┌──────────┐  │
//!            └─────────────────────────────►│ Resizing │──┘
//!                                           └──────────┘
//! ```
//!
//! Motion is accumulated from successive pointer deltas rather than computed
//! from the gesture's starting point, so clamping against a viewport edge
//! swallows motion without skewing later moves.

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::types::{clamp, Rect, Size, Viewport};

/// Side length of the square resize handle in the bottom-right corner
pub const DEFAULT_RESIZE_HANDLE: f64 = 16.0;

/// Identifier of a pointer (mouse, pen or a single touch contact)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointerId(pub i32);

/// What a gesture does to the rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Drag,
    Resize,
}

/// Gesture state of one controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// No gesture in progress
    Idle,
    /// Moving the widget; `(last_x, last_y)` is the previous pointer position
    Dragging {
        pointer: PointerId,
        last_x: f64,
        last_y: f64,
    },
    /// Resizing from the bottom-right corner, top-left stays anchored
    Resizing {
        pointer: PointerId,
        last_x: f64,
        last_y: f64,
    },
}

impl Gesture {
    /// Pointer owning the active gesture
    pub fn pointer(&self) -> Option<PointerId> {
        match self {
            Gesture::Idle => None,
            Gesture::Dragging { pointer, .. } | Gesture::Resizing { pointer, .. } => Some(*pointer),
        }
    }

    pub fn kind(&self) -> Option<GestureKind> {
        match self {
            Gesture::Idle => None,
            Gesture::Dragging { .. } => Some(GestureKind::Drag),
            Gesture::Resizing { .. } => Some(GestureKind::Resize),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Gesture::Idle)
    }
}

/// Read side of a controller's rectangle.
///
/// Cloned into the widget registry as the board's accessor. Reads always see
/// the controller's latest write.
#[derive(Debug, Clone)]
pub struct RectReader {
    rect: Rc<Cell<Rect>>,
    version: Rc<Cell<u64>>,
}

impl RectReader {
    pub fn get_rect(&self) -> Rect {
        self.rect.get()
    }

    /// Bumped every time the rectangle changes
    pub fn version(&self) -> u64 {
        self.version.get()
    }
}

/// Pointer-gesture state machine for one widget
#[derive(Debug)]
pub struct DragController {
    rect: Rc<Cell<Rect>>,
    version: Rc<Cell<u64>>,
    min: Size,
    handle_size: f64,
    gesture: Gesture,
}

impl DragController {
    pub fn new(initial: Rect, min: Size, handle_size: f64) -> Self {
        Self {
            rect: Rc::new(Cell::new(initial)),
            version: Rc::new(Cell::new(0)),
            min,
            handle_size,
            gesture: Gesture::Idle,
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect.get()
    }

    pub fn version(&self) -> u64 {
        self.version.get()
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn min_size(&self) -> Size {
        self.min
    }

    pub fn reader(&self) -> RectReader {
        RectReader {
            rect: Rc::clone(&self.rect),
            version: Rc::clone(&self.version),
        }
    }

    /// Whether a point falls on the bottom-right resize handle
    pub fn hits_handle(&self, x: f64, y: f64) -> bool {
        let rect = self.rect.get();
        rect.contains(x, y)
            && x >= rect.right() - self.handle_size
            && y >= rect.bottom() - self.handle_size
    }

    /// Start a gesture. Ignored (returns None) while another gesture is active.
    pub fn begin(&mut self, pointer: PointerId, x: f64, y: f64) -> Option<GestureKind> {
        if !self.gesture.is_idle() {
            return None;
        }
        self.gesture = if self.hits_handle(x, y) {
            Gesture::Resizing { pointer, last_x: x, last_y: y }
        } else {
            Gesture::Dragging { pointer, last_x: x, last_y: y }
        };
        self.gesture.kind()
    }

    /// Apply a pointer move. Returns true if the rectangle changed.
    pub fn update(&mut self, pointer: PointerId, x: f64, y: f64, viewport: &Viewport) -> bool {
        let rect = self.rect.get();
        let next = match &mut self.gesture {
            Gesture::Dragging { pointer: p, last_x, last_y } if *p == pointer => {
                let (dx, dy) = (x - *last_x, y - *last_y);
                *last_x = x;
                *last_y = y;
                Rect {
                    x: clamp(rect.x + dx, 0.0, viewport.width - rect.width),
                    y: clamp(rect.y + dy, 0.0, viewport.usable_height() - rect.height),
                    ..rect
                }
            }
            Gesture::Resizing { pointer: p, last_x, last_y } if *p == pointer => {
                let (dx, dy) = (x - *last_x, y - *last_y);
                *last_x = x;
                *last_y = y;
                Rect {
                    width: clamp(rect.width + dx, self.min.width, viewport.width - rect.x),
                    height: clamp(rect.height + dy, self.min.height, viewport.usable_height() - rect.y),
                    ..rect
                }
            }
            _ => return false,
        };
        self.set_rect(next)
    }

    /// End the gesture owned by `pointer`. Returns the kind that ended.
    pub fn end(&mut self, pointer: PointerId) -> Option<GestureKind> {
        if self.gesture.pointer() != Some(pointer) {
            return None;
        }
        let kind = self.gesture.kind();
        self.gesture = Gesture::Idle;
        kind
    }

    /// Abort whatever gesture is active
    pub fn cancel(&mut self) -> Option<GestureKind> {
        let kind = self.gesture.kind();
        self.gesture = Gesture::Idle;
        kind
    }

    /// Re-fit the rectangle after the viewport changed
    pub fn contain(&mut self, viewport: &Viewport) -> bool {
        let contained = viewport.contain(self.rect.get(), self.min);
        self.set_rect(contained)
    }

    fn set_rect(&mut self, next: Rect) -> bool {
        if next == self.rect.get() {
            return false;
        }
        self.rect.set(next);
        self.version.set(self.version.get() + 1);
        true
    }
}
