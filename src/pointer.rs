//! Pointer routing for every widget on the board.
//!
//! The hub is the board-wide listener scope: it owns one [`DragController`]
//! per attached widget surface, decides which widget a pointer-down lands
//! on, and keeps delivering that pointer's moves to the same controller
//! until the gesture ends, wherever the pointer wanders.

use std::collections::HashMap;

use slotmap::{new_key_type, SlotMap};

use crate::drag::{DragController, GestureKind, PointerId, RectReader};
use crate::types::{Rect, Size, Viewport};
use crate::widget::WidgetId;

new_key_type! {
    /// Key of an attached controller inside the hub
    pub struct ControllerKey;
}

/// Pointer lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
    /// The surface lost pointer capture (e.g. the browser tab was hidden)
    LostCapture,
}

/// A raw pointer or touch sample in board coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub pointer: PointerId,
    pub x: f64,
    pub y: f64,
}

impl PointerEvent {
    pub fn new(phase: PointerPhase, pointer: PointerId, x: f64, y: f64) -> Self {
        Self { phase, pointer, x, y }
    }

    pub fn down(pointer: PointerId, x: f64, y: f64) -> Self {
        Self::new(PointerPhase::Down, pointer, x, y)
    }

    pub fn moved(pointer: PointerId, x: f64, y: f64) -> Self {
        Self::new(PointerPhase::Move, pointer, x, y)
    }

    pub fn up(pointer: PointerId, x: f64, y: f64) -> Self {
        Self::new(PointerPhase::Up, pointer, x, y)
    }

    pub fn cancel(pointer: PointerId) -> Self {
        Self::new(PointerPhase::Cancel, pointer, 0.0, 0.0)
    }
}

/// What a dispatched event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    /// Nobody handled the event
    Ignored,
    /// A gesture started on a widget
    Started { widget: WidgetId, kind: GestureKind },
    /// The widget's rectangle changed
    Moved { widget: WidgetId },
    /// The move belonged to a gesture but was fully clamped away
    Held { widget: WidgetId },
    /// A gesture finished
    Ended { widget: WidgetId, kind: GestureKind },
}

/// Attach-time programming errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DragError {
    #[error("surface {0} already has a drag controller attached")]
    AlreadyAttached(WidgetId),
}

/// Handle returned by [`PointerHub::attach`].
///
/// Deliberately not `Clone`: detaching consumes it, so a controller cannot
/// be detached twice.
#[derive(Debug)]
pub struct ControllerHandle {
    key: ControllerKey,
    surface: WidgetId,
    reader: RectReader,
}

impl ControllerHandle {
    pub fn key(&self) -> ControllerKey {
        self.key
    }

    pub fn surface(&self) -> WidgetId {
        self.surface
    }

    /// Current rectangle, read synchronously from the controller
    pub fn get_rect(&self) -> Rect {
        self.reader.get_rect()
    }

    pub fn version(&self) -> u64 {
        self.reader.version()
    }

    /// Accessor that stays valid for as long as anyone holds it
    pub fn reader(&self) -> RectReader {
        self.reader.clone()
    }
}

struct Attached {
    surface: WidgetId,
    controller: DragController,
}

/// Board-wide pointer router
pub struct PointerHub {
    controllers: SlotMap<ControllerKey, Attached>,
    /// Bottom-to-top stacking order
    stacking: Vec<ControllerKey>,
    /// Pointer id -> controller that owns its gesture
    captures: HashMap<PointerId, ControllerKey>,
    handle_size: f64,
}

impl PointerHub {
    pub fn new(handle_size: f64) -> Self {
        Self {
            controllers: SlotMap::with_key(),
            stacking: Vec::new(),
            captures: HashMap::new(),
            handle_size,
        }
    }

    /// Bind a controller to a widget surface, on top of the existing ones
    pub fn attach(
        &mut self,
        surface: WidgetId,
        initial: Rect,
        min: Size,
    ) -> Result<ControllerHandle, DragError> {
        if self.controllers.values().any(|a| a.surface == surface) {
            return Err(DragError::AlreadyAttached(surface));
        }
        let controller = DragController::new(initial, min, self.handle_size);
        let reader = controller.reader();
        let key = self.controllers.insert(Attached { surface, controller });
        self.stacking.push(key);
        log::debug!("Attached drag controller for widget {}", surface);
        Ok(ControllerHandle { key, surface, reader })
    }

    /// Remove a controller together with every pointer capture it held.
    /// Returns its final rectangle.
    pub fn detach(&mut self, handle: ControllerHandle) -> Option<Rect> {
        let attached = self.controllers.remove(handle.key)?;
        self.stacking.retain(|&k| k != handle.key);
        self.captures.retain(|_, k| *k != handle.key);
        log::debug!("Detached drag controller for widget {}", attached.surface);
        Some(attached.controller.rect())
    }

    /// Remove every controller
    pub fn detach_all(&mut self) {
        self.controllers.clear();
        self.stacking.clear();
        self.captures.clear();
    }

    pub fn controller(&self, key: ControllerKey) -> Option<&DragController> {
        self.controllers.get(key).map(|a| &a.controller)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Number of gestures in progress across all widgets
    pub fn active_gestures(&self) -> usize {
        self.captures.len()
    }

    /// Topmost widget under a point
    pub fn hit_test(&self, x: f64, y: f64) -> Option<WidgetId> {
        self.topmost_at(x, y).map(|key| self.controllers[key].surface)
    }

    /// Route one pointer event
    pub fn dispatch(&mut self, event: PointerEvent, viewport: &Viewport) -> PointerOutcome {
        match event.phase {
            PointerPhase::Down => self.pointer_down(event),
            PointerPhase::Move => self.pointer_move(event, viewport),
            PointerPhase::Up | PointerPhase::Cancel | PointerPhase::LostCapture => {
                self.pointer_release(event)
            }
        }
    }

    /// Re-fit every rectangle into a new viewport. Returns widgets that moved.
    pub fn contain_all(&mut self, viewport: &Viewport) -> Vec<WidgetId> {
        self.controllers
            .values_mut()
            .filter_map(|a| a.controller.contain(viewport).then_some(a.surface))
            .collect()
    }

    fn topmost_at(&self, x: f64, y: f64) -> Option<ControllerKey> {
        self.stacking
            .iter()
            .rev()
            .copied()
            .find(|&key| self.controllers[key].controller.rect().contains(x, y))
    }

    fn pointer_down(&mut self, event: PointerEvent) -> PointerOutcome {
        if self.captures.contains_key(&event.pointer) {
            return PointerOutcome::Ignored;
        }
        let Some(key) = self.topmost_at(event.x, event.y) else {
            return PointerOutcome::Ignored;
        };
        let attached = &mut self.controllers[key];
        // An already busy widget ignores extra contacts
        let Some(kind) = attached.controller.begin(event.pointer, event.x, event.y) else {
            return PointerOutcome::Ignored;
        };
        self.captures.insert(event.pointer, key);
        log::debug!("{:?} started on widget {}", kind, attached.surface);
        PointerOutcome::Started { widget: attached.surface, kind }
    }

    fn pointer_move(&mut self, event: PointerEvent, viewport: &Viewport) -> PointerOutcome {
        let Some(&key) = self.captures.get(&event.pointer) else {
            return PointerOutcome::Ignored;
        };
        let Some(attached) = self.controllers.get_mut(key) else {
            self.captures.remove(&event.pointer);
            return PointerOutcome::Ignored;
        };
        if attached.controller.update(event.pointer, event.x, event.y, viewport) {
            PointerOutcome::Moved { widget: attached.surface }
        } else {
            PointerOutcome::Held { widget: attached.surface }
        }
    }

    fn pointer_release(&mut self, event: PointerEvent) -> PointerOutcome {
        let Some(key) = self.captures.remove(&event.pointer) else {
            return PointerOutcome::Ignored;
        };
        let Some(attached) = self.controllers.get_mut(key) else {
            return PointerOutcome::Ignored;
        };
        match attached.controller.end(event.pointer) {
            Some(kind) => {
                log::debug!("{:?} ended on widget {} ({:?})", kind, attached.surface, event.phase);
                PointerOutcome::Ended { widget: attached.surface, kind }
            }
            None => PointerOutcome::Ignored,
        }
    }
}
