//! Event tracing for debugging the board.
//!
//! Keeps a ring buffer of recent transitions so a misbehaving session can be
//! inspected after the fact.

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::state::{BoardTransition, LayoutSlot};
use crate::widget::WidgetId;

/// Maximum number of events to keep in the trace buffer
const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Entry in the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub event_type: String,
    pub widget: Option<WidgetId>,
    pub details: String,
}

/// Event tracer with ring buffer storage
#[derive(Debug)]
pub struct EventTracer {
    entries: VecDeque<EventLogEntry>,
    max_entries: usize,
    sequence: u64,
    start_time: Instant,
}

impl EventTracer {
    /// Create a new event tracer with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// Create a new event tracer with specified capacity
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries),
            max_entries,
            sequence: 0,
            start_time: Instant::now(),
        }
    }

    /// Milliseconds since the tracer was created
    fn timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Trace a board state transition
    pub fn trace_transition(&mut self, transition: &BoardTransition) {
        let details = match transition {
            BoardTransition::WidgetAdded { kind, .. } => format!("kind={}", kind),
            BoardTransition::WidgetRemoved { .. } => String::new(),
            BoardTransition::WidgetRenamed { title, .. } => format!("title={:?}", title),
            BoardTransition::GestureStarted { kind, .. } => format!("kind={:?}", kind),
            BoardTransition::GestureEnded { kind, rect, .. } => format!(
                "kind={:?} rect={},{} {}x{}",
                kind, rect.x, rect.y, rect.width, rect.height
            ),
            BoardTransition::LayoutSaved { slot, widgets }
            | BoardTransition::LayoutLoaded { slot, widgets } => {
                format!("slot={} widgets={}", slot_label(slot), widgets)
            }
            BoardTransition::LayoutReset => String::new(),
            BoardTransition::SnapshotDeleted { name } => format!("name={:?}", name),
        };
        self.add_entry(transition.name().to_string(), transition.widget(), details);
    }

    /// Add an entry to the trace buffer
    fn add_entry(&mut self, event_type: String, widget: Option<WidgetId>, details: String) {
        // Remove oldest entry if at capacity
        if self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }

        self.sequence += 1;
        self.entries.push_back(EventLogEntry {
            sequence: self.sequence,
            timestamp_ms: self.timestamp(),
            event_type,
            widget,
            details,
        });
    }

    /// Get the last N entries
    pub fn get_last(&self, n: usize) -> Vec<EventLogEntry> {
        let start = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(start).cloned().collect()
    }

    pub fn get_all(&self) -> Vec<EventLogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Clear the trace buffer
    pub fn clear(&mut self) {
        self.entries.clear();
        self.sequence = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EventTracer {
    fn default() -> Self {
        Self::new()
    }
}

fn slot_label(slot: &LayoutSlot) -> String {
    match slot {
        LayoutSlot::Current => "current".to_string(),
        LayoutSlot::Named(name) => format!("named:{}", name),
    }
}
