//! Board state transitions recorded for debugging.
//!
//! Widget lifecycle on the board:
//!
//! ```text
//!   add_widget / load        ┌─────────┐   pointer down    ┌─────────────┐
//!  ─────────────────────────►│ Resting │ ─────────────────►│ In gesture  │
//!                            └────┬────┘ ◄──────────────── └─────────────┘
//!                                 │       up / cancel
//!                                 │ remove / reset / load other layout
//!                                 ▼
//!                            (detached)
//! ```

use serde::{Deserialize, Serialize};

use crate::drag::GestureKind;
use crate::types::Rect;
use crate::widget::{WidgetId, WidgetKind};

/// Which persisted slot a save or load touched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "slot", content = "name", rename_all = "snake_case")]
pub enum LayoutSlot {
    /// The auto-saved layout
    Current,
    /// A named snapshot
    Named(String),
}

/// State transition events that can be traced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum BoardTransition {
    WidgetAdded {
        widget: WidgetId,
        kind: WidgetKind,
    },
    WidgetRemoved {
        widget: WidgetId,
    },
    WidgetRenamed {
        widget: WidgetId,
        title: String,
    },
    GestureStarted {
        widget: WidgetId,
        kind: GestureKind,
    },
    GestureEnded {
        widget: WidgetId,
        kind: GestureKind,
        rect: Rect,
    },
    LayoutSaved {
        slot: LayoutSlot,
        widgets: usize,
    },
    LayoutLoaded {
        slot: LayoutSlot,
        widgets: usize,
    },
    LayoutReset,
    SnapshotDeleted {
        name: String,
    },
}

impl BoardTransition {
    /// Short snake_case name of the transition
    pub fn name(&self) -> &'static str {
        match self {
            BoardTransition::WidgetAdded { .. } => "widget_added",
            BoardTransition::WidgetRemoved { .. } => "widget_removed",
            BoardTransition::WidgetRenamed { .. } => "widget_renamed",
            BoardTransition::GestureStarted { .. } => "gesture_started",
            BoardTransition::GestureEnded { .. } => "gesture_ended",
            BoardTransition::LayoutSaved { .. } => "layout_saved",
            BoardTransition::LayoutLoaded { .. } => "layout_loaded",
            BoardTransition::LayoutReset => "layout_reset",
            BoardTransition::SnapshotDeleted { .. } => "snapshot_deleted",
        }
    }

    /// Widget the transition is about, if any
    pub fn widget(&self) -> Option<WidgetId> {
        match self {
            BoardTransition::WidgetAdded { widget, .. }
            | BoardTransition::WidgetRemoved { widget }
            | BoardTransition::WidgetRenamed { widget, .. }
            | BoardTransition::GestureStarted { widget, .. }
            | BoardTransition::GestureEnded { widget, .. } => Some(*widget),
            _ => None,
        }
    }
}
