//! The classroom board: widgets, their gestures and layout persistence.
//!
//! `Board` ties the pieces together. It owns one drag controller per widget
//! (through the [`PointerHub`]), registers each controller's rectangle
//! accessor, and persists the collected layout through a [`LayoutStore`].
//!
//! Every change to what would be saved re-arms the auto-save debouncer; the
//! event loop calls [`Board::tick`] to let it fire. Named-screen operations
//! write the current slot themselves and cancel any pending auto-save.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use crate::config::BoardSettings;
use crate::debounce::Debouncer;
use crate::layout::{clamp_transparency, BoardLayout};
use crate::pointer::{ControllerHandle, DragError, PointerEvent, PointerHub, PointerOutcome};
use crate::registry::WidgetRegistry;
use crate::state::{BoardTransition, LayoutSlot};
use crate::storage::Storage;
use crate::store::{LayoutError, LayoutStore};
use crate::tracing::EventTracer;
use crate::types::{Rect, Viewport};
use crate::widget::{IdGenerator, WidgetId, WidgetInstance, WidgetKind, WidgetPayload};

/// Errors from editing widgets on the board
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("no widget with id {0}")]
    UnknownWidget(WidgetId),
    #[error("widget {widget} is a {expected}, not a {found}")]
    PayloadMismatch {
        widget: WidgetId,
        expected: WidgetKind,
        found: WidgetKind,
    },
    #[error(transparent)]
    Drag(#[from] DragError),
}

/// Board-wide display settings
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayOptions {
    pub background_color: String,
    pub background_image: Option<String>,
    pub widget_transparency: u8,
    pub hide_titles: bool,
}

pub struct Board<S: Storage> {
    settings: BoardSettings,
    /// Widgets and display options; widget rects here are the last known
    /// ones, the controllers hold the live values
    layout: BoardLayout,
    hub: PointerHub,
    handles: HashMap<WidgetId, ControllerHandle>,
    registry: WidgetRegistry,
    store: LayoutStore<S>,
    autosave: Debouncer,
    /// Latest instant handed in by the event loop; edits arm the auto-save
    /// from here
    clock: Instant,
    ids: IdGenerator,
    tracer: EventTracer,
}

impl<S: Storage> Board<S> {
    /// Restore the auto-saved layout from `storage` and attach every widget
    pub fn mount(settings: BoardSettings, storage: S) -> Self {
        let store = LayoutStore::with_background(storage, &settings.default_background);
        let layout = store.load_current();
        let mut board = Self {
            hub: PointerHub::new(settings.resize_handle),
            handles: HashMap::new(),
            registry: WidgetRegistry::new(),
            autosave: Debouncer::new(settings.quiet_period),
            clock: Instant::now(),
            ids: IdGenerator::new(),
            tracer: EventTracer::new(),
            layout: store.empty_layout(),
            store,
            settings,
        };
        board.install(layout);
        log::info!("Board mounted with {} widgets", board.layout.widgets.len());
        board.trace(BoardTransition::LayoutLoaded {
            slot: LayoutSlot::Current,
            widgets: board.layout.widgets.len(),
        });
        board
    }

    /// Tear the board down and hand the storage back. A pending auto-save
    /// is dropped.
    pub fn unmount(mut self) -> S {
        if self.autosave.cancel() {
            log::debug!("Dropped pending auto-save on unmount");
        }
        self.detach_all();
        self.store.into_storage()
    }

    // =========================================================================
    // Widgets
    // =========================================================================

    /// Add a widget of `kind` with its default title, rect and payload
    pub fn add_widget(&mut self, kind: WidgetKind) -> Result<WidgetId, BoardError> {
        let mut widget = WidgetInstance::new(self.ids.next(), kind);
        widget.rect = self.settings.viewport.contain(widget.rect, self.settings.min_size(kind));
        self.attach(&widget)?;
        let id = widget.id;
        self.layout.widgets.push(widget);
        log::info!("Added {} widget {}", kind, id);
        self.trace(BoardTransition::WidgetAdded { widget: id, kind });
        self.touch();
        Ok(id)
    }

    pub fn remove_widget(&mut self, id: WidgetId) -> Result<(), BoardError> {
        let index = self.index_of(id)?;
        self.layout.widgets.remove(index);
        self.registry.unregister(id);
        if let Some(handle) = self.handles.remove(&id) {
            self.hub.detach(handle);
        }
        log::info!("Removed widget {}", id);
        self.trace(BoardTransition::WidgetRemoved { widget: id });
        self.touch();
        Ok(())
    }

    /// Set a widget's title; a blank title restores the default
    pub fn rename_widget(&mut self, id: WidgetId, title: &str) -> Result<(), BoardError> {
        let index = self.index_of(id)?;
        let widget = &mut self.layout.widgets[index];
        let title = match title.trim() {
            "" => widget.kind.default_title(),
            trimmed => trimmed.to_string(),
        };
        if widget.title == title {
            return Ok(());
        }
        widget.title = title.clone();
        self.trace(BoardTransition::WidgetRenamed { widget: id, title });
        self.touch();
        Ok(())
    }

    /// Replace a widget's payload. The payload must be of the widget's kind.
    pub fn update_payload(&mut self, id: WidgetId, payload: WidgetPayload) -> Result<(), BoardError> {
        let index = self.index_of(id)?;
        let widget = &mut self.layout.widgets[index];
        if payload.kind() != widget.kind {
            return Err(BoardError::PayloadMismatch {
                widget: id,
                expected: widget.kind,
                found: payload.kind(),
            });
        }
        if widget.payload != payload {
            widget.payload = payload;
            self.touch();
        }
        Ok(())
    }

    /// Widget ids, bottom-most first
    pub fn widget_ids(&self) -> Vec<WidgetId> {
        self.layout.widgets.iter().map(|w| w.id).collect()
    }

    /// A widget with its live rectangle
    pub fn widget(&self, id: WidgetId) -> Option<WidgetInstance> {
        self.layout.widget(id).map(|w| WidgetInstance {
            rect: self.registry.rect_or(w.id, w.rect),
            ..w.clone()
        })
    }

    pub fn rect_of(&self, id: WidgetId) -> Option<Rect> {
        self.widget(id).map(|w| w.rect)
    }

    pub fn len(&self) -> usize {
        self.layout.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.widgets.is_empty()
    }

    // =========================================================================
    // Display options
    // =========================================================================

    pub fn set_background_color(&mut self, color: &str) {
        if self.layout.background_color != color {
            self.layout.background_color = color.to_string();
            self.touch();
        }
    }

    /// Show an image behind the widgets; `None` or an empty URL removes it
    pub fn set_background_image(&mut self, url: Option<&str>) {
        let url = url.filter(|u| !u.is_empty()).map(str::to_string);
        if self.layout.background_image != url {
            self.layout.background_image = url;
            self.touch();
        }
    }

    /// The background image could not be loaded; fall back to no image
    pub fn background_image_failed(&mut self) {
        if let Some(url) = self.layout.background_image.take() {
            log::warn!("Background image failed to load: {}", url);
            self.touch();
        }
    }

    /// An image widget's picture could not be loaded; it shows no image
    pub fn widget_image_failed(&mut self, id: WidgetId) -> Result<(), BoardError> {
        let index = self.index_of(id)?;
        if let WidgetPayload::Image(image) = &mut self.layout.widgets[index].payload {
            if !image.image_url.is_empty() {
                log::warn!("Image of widget {} failed to load: {}", id, image.image_url);
                image.image_url.clear();
                self.touch();
            }
        }
        Ok(())
    }

    /// Set widget opacity in percent, clamped to 10-100
    pub fn set_widget_transparency(&mut self, percent: f64) {
        let value = clamp_transparency(percent);
        if self.layout.widget_transparency != value {
            self.layout.widget_transparency = value;
            self.touch();
        }
    }

    pub fn set_hide_titles(&mut self, hide: bool) {
        if self.layout.hide_titles != hide {
            self.layout.hide_titles = hide;
            self.touch();
        }
    }

    pub fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            background_color: self.layout.background_color.clone(),
            background_image: self.layout.background_image.clone(),
            widget_transparency: self.layout.widget_transparency,
            hide_titles: self.layout.hide_titles,
        }
    }

    // =========================================================================
    // Pointer input and viewport
    // =========================================================================

    pub fn viewport(&self) -> Viewport {
        self.settings.viewport
    }

    /// Resize the board and pull every widget back inside it
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.settings.viewport = viewport;
        let moved = self.hub.contain_all(&viewport);
        if !moved.is_empty() {
            log::debug!("Viewport change moved {} widgets", moved.len());
            self.touch();
        }
    }

    /// Route a pointer event to the widget it belongs to
    pub fn handle_pointer(&mut self, event: PointerEvent, now: Instant) -> PointerOutcome {
        self.advance_clock(now);
        let outcome = self.hub.dispatch(event, &self.settings.viewport);
        match outcome {
            PointerOutcome::Started { widget, kind } => {
                self.trace(BoardTransition::GestureStarted { widget, kind });
            }
            PointerOutcome::Moved { .. } => self.autosave.notify(now),
            PointerOutcome::Ended { widget, kind } => {
                let Some(rect) = self.handles.get(&widget).map(ControllerHandle::get_rect) else {
                    return outcome;
                };
                if let Some(w) = self.layout.widgets.iter_mut().find(|w| w.id == widget) {
                    w.rect = rect;
                }
                self.trace(BoardTransition::GestureEnded { widget, kind, rect });
            }
            PointerOutcome::Held { .. } | PointerOutcome::Ignored => {}
        }
        outcome
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Let the auto-save fire if its quiet period has passed. Returns true
    /// if the layout was written.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.advance_clock(now);
        if !self.autosave.poll(now) {
            return false;
        }
        let layout = self.collect_layout();
        match self.store.save_current(&layout) {
            Ok(()) => {
                self.trace(BoardTransition::LayoutSaved {
                    slot: LayoutSlot::Current,
                    widgets: layout.widgets.len(),
                });
                true
            }
            Err(e) => {
                log::warn!("Auto-save failed: {:#}", e);
                false
            }
        }
    }

    /// When the pending auto-save is due, for sleeping the event loop
    pub fn next_deadline(&self) -> Option<Instant> {
        self.autosave.deadline()
    }

    pub fn has_pending_save(&self) -> bool {
        self.autosave.is_pending()
    }

    /// Snapshot of the board with every widget's authoritative rectangle
    pub fn collect_layout(&self) -> BoardLayout {
        let mut layout = self.layout.clone();
        for widget in &mut layout.widgets {
            widget.rect = self.registry.rect_or(widget.id, widget.rect);
        }
        layout
    }

    /// Save the board under `name`
    pub fn save_named(&mut self, name: &str) -> Result<(), LayoutError> {
        let layout = self.collect_layout();
        self.store.save_named(name, &layout)?;
        self.autosave.cancel();
        self.trace(BoardTransition::LayoutSaved {
            slot: LayoutSlot::Named(name.to_string()),
            widgets: layout.widgets.len(),
        });
        Ok(())
    }

    /// Replace the board with a named screen
    pub fn load_named(&mut self, name: &str) -> Result<(), LayoutError> {
        let layout = self.store.load_named(name)?;
        self.autosave.cancel();
        self.install(layout);
        self.trace(BoardTransition::LayoutLoaded {
            slot: LayoutSlot::Named(name.to_string()),
            widgets: self.layout.widgets.len(),
        });
        Ok(())
    }

    pub fn delete_named(&mut self, name: &str) -> Result<(), LayoutError> {
        self.store.delete_named(name)?;
        self.trace(BoardTransition::SnapshotDeleted { name: name.to_string() });
        Ok(())
    }

    pub fn list_named(&self) -> BTreeSet<String> {
        self.store.list_named()
    }

    /// Clear the board and erase the auto-saved layout
    pub fn reset(&mut self) -> Result<(), LayoutError> {
        let empty = self.store.reset_current()?;
        self.autosave.cancel();
        self.install(empty);
        self.trace(BoardTransition::LayoutReset);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn settings(&self) -> &BoardSettings {
        &self.settings
    }

    pub fn tracer(&self) -> &EventTracer {
        &self.tracer
    }

    pub fn storage(&self) -> &S {
        self.store.storage()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Swap in a whole layout, re-attaching a controller per widget
    fn install(&mut self, mut layout: BoardLayout) {
        self.detach_all();
        let widgets = std::mem::take(&mut layout.widgets);
        self.layout = layout;
        for mut widget in widgets {
            self.ids.observe(widget.id);
            widget.rect = self
                .settings
                .viewport
                .contain(widget.rect, self.settings.min_size(widget.kind));
            if let Err(e) = self.attach(&widget) {
                log::warn!("Skipping widget in layout: {}", e);
                continue;
            }
            self.layout.widgets.push(widget);
        }
    }

    fn attach(&mut self, widget: &WidgetInstance) -> Result<(), DragError> {
        let min = self.settings.min_size(widget.kind);
        let handle = self.hub.attach(widget.id, widget.rect, min)?;
        let reader = handle.reader();
        self.registry.register(widget.id, move || reader.get_rect());
        self.handles.insert(widget.id, handle);
        Ok(())
    }

    fn detach_all(&mut self) {
        self.handles.clear();
        self.hub.detach_all();
        self.registry.clear();
    }

    fn index_of(&self, id: WidgetId) -> Result<usize, BoardError> {
        self.layout
            .widgets
            .iter()
            .position(|w| w.id == id)
            .ok_or(BoardError::UnknownWidget(id))
    }

    /// Re-arm the auto-save after a change
    fn touch(&mut self) {
        self.autosave.notify(self.clock);
    }

    fn advance_clock(&mut self, now: Instant) {
        self.clock = self.clock.max(now);
    }

    fn trace(&mut self, transition: BoardTransition) {
        self.tracer.trace_transition(&transition);
    }
}
