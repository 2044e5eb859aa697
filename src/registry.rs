//! Widget-id to rectangle-accessor registry owned by the board.
//!
//! Widgets register an accessor when their controller is attached and
//! unregister it when they are removed. When the board persists, it asks the
//! registry for each widget's authoritative rectangle.

use std::collections::HashMap;

use crate::types::Rect;
use crate::widget::WidgetId;

/// Reads a widget's current rectangle
pub type RectAccessor = Box<dyn Fn() -> Rect>;

#[derive(Default)]
pub struct WidgetRegistry {
    accessors: HashMap<WidgetId, RectAccessor>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the accessor of a widget
    pub fn register<F>(&mut self, id: WidgetId, get_rect: F)
    where
        F: Fn() -> Rect + 'static,
    {
        self.accessors.insert(id, Box::new(get_rect));
    }

    /// Returns true if an accessor was registered
    pub fn unregister(&mut self, id: WidgetId) -> bool {
        self.accessors.remove(&id).is_some()
    }

    pub fn is_registered(&self, id: WidgetId) -> bool {
        self.accessors.contains_key(&id)
    }

    /// Current rectangle of a widget, if it has an accessor
    pub fn rect_of(&self, id: WidgetId) -> Option<Rect> {
        self.accessors.get(&id).map(|get_rect| get_rect())
    }

    /// Current rectangle, or `fallback` when the widget has no accessor
    pub fn rect_or(&self, id: WidgetId, fallback: Rect) -> Rect {
        self.rect_of(id).unwrap_or(fallback)
    }

    pub fn clear(&mut self) {
        self.accessors.clear();
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }
}
