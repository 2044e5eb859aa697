//! classboard - a classroom display board
//!
//! Widgets (clock, timer, stoplight, poll, ...) float over a colored or
//! image background. Each widget can be dragged by its body and resized from
//! its bottom-right corner; the layout is auto-saved after a quiet period and
//! can be stored as named screens to switch between lessons.

pub mod board;
pub mod config;
pub mod debounce;
pub mod drag;
pub mod layout;
pub mod pointer;
pub mod poll_sync;
pub mod registry;
pub mod state;
pub mod storage;
pub mod store;
pub mod tracing;
pub mod types;
pub mod widget;

pub use board::{Board, BoardError, DisplayOptions};
pub use config::{BoardSettings, Config};
pub use drag::{DragController, GestureKind, PointerId};
pub use layout::BoardLayout;
pub use pointer::{ControllerHandle, DragError, PointerEvent, PointerHub, PointerOutcome, PointerPhase};
pub use poll_sync::{ChannelError, MemoryPollChannel, PollChannel, PollRecord, PollSync, Subscription};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{LayoutError, LayoutStore};
pub use types::{Rect, Size, Viewport};
pub use widget::{WidgetId, WidgetInstance, WidgetKind, WidgetPayload};
