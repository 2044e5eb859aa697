//! Layout persistence: the auto-saved "current" slot and named snapshots.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::layout::{BoardLayout, DEFAULT_BACKGROUND};
use crate::storage::Storage;

/// Storage key of the auto-saved layout
pub const CURRENT_KEY: &str = "classroomScreen";
/// Storage key of the name -> layout snapshot map
pub const NAMED_KEY: &str = "namedScreens";

/// Errors surfaced to the user as notices
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("a screen name is required")]
    InvalidName,
    #[error("no saved screen found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Reads and writes board layouts through a [`Storage`] backend
pub struct LayoutStore<S: Storage> {
    storage: S,
    default_background: String,
}

impl<S: Storage> LayoutStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_background(storage, DEFAULT_BACKGROUND)
    }

    /// Store whose empty layouts use `default_background`
    pub fn with_background(storage: S, default_background: &str) -> Self {
        Self {
            storage,
            default_background: default_background.to_string(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Layout of a board with nothing on it
    pub fn empty_layout(&self) -> BoardLayout {
        BoardLayout::empty(&self.default_background)
    }

    /// The auto-saved layout, or an empty one if it is missing or unreadable
    pub fn load_current(&self) -> BoardLayout {
        let raw = match self.storage.get_item(CURRENT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return self.empty_layout(),
            Err(e) => {
                log::warn!("Failed to read saved layout: {:#}", e);
                return self.empty_layout();
            }
        };
        match BoardLayout::from_json(&raw, &self.default_background) {
            Ok(mut layout) => {
                if layout.drop_transient_refs() {
                    log::info!("Dropped uploaded image references that did not survive reload");
                }
                layout
            }
            Err(e) => {
                log::warn!("Ignoring malformed saved layout: {}", e);
                self.empty_layout()
            }
        }
    }

    /// Overwrite the auto-saved slot
    pub fn save_current(&mut self, layout: &BoardLayout) -> Result<(), LayoutError> {
        let json = layout.to_json().map_err(anyhow::Error::from)?;
        self.storage.set_item(CURRENT_KEY, &json)?;
        log::debug!("Saved current layout ({} widgets)", layout.widgets.len());
        Ok(())
    }

    /// Save a named snapshot; the current slot is updated to match
    pub fn save_named(&mut self, name: &str, layout: &BoardLayout) -> Result<(), LayoutError> {
        if name.trim().is_empty() {
            return Err(LayoutError::InvalidName);
        }
        let value = layout.to_value().map_err(anyhow::Error::from)?;
        let mut screens = self.read_named();
        screens.insert(name.to_string(), value);
        self.write_named(&screens)?;
        self.save_current(layout)?;
        log::info!("Screen saved as {:?}", name);
        Ok(())
    }

    /// Load a named snapshot; the current slot is updated to match
    pub fn load_named(&mut self, name: &str) -> Result<BoardLayout, LayoutError> {
        let mut screens = self.read_named();
        let value = screens
            .remove(name)
            .ok_or_else(|| LayoutError::NotFound(name.to_string()))?;
        let mut layout = match BoardLayout::from_value(value, &self.default_background) {
            Ok(layout) => layout,
            Err(e) => {
                log::warn!("Saved screen {:?} is malformed: {}", name, e);
                return Err(LayoutError::NotFound(name.to_string()));
            }
        };
        layout.drop_transient_refs();
        self.save_current(&layout)?;
        log::info!("Loaded screen {:?}", name);
        Ok(layout)
    }

    /// Remove a named snapshot; absent names are fine
    pub fn delete_named(&mut self, name: &str) -> Result<(), LayoutError> {
        let mut screens = self.read_named();
        if screens.remove(name).is_some() {
            self.write_named(&screens)?;
            log::info!("Deleted screen {:?}", name);
        }
        Ok(())
    }

    /// Names of all saved snapshots, sorted
    pub fn list_named(&self) -> BTreeSet<String> {
        self.read_named().into_keys().collect()
    }

    /// Erase the auto-saved slot and return the empty layout
    pub fn reset_current(&mut self) -> Result<BoardLayout, LayoutError> {
        self.storage.remove_item(CURRENT_KEY)?;
        log::info!("Reset current layout");
        Ok(self.empty_layout())
    }

    /// Snapshot map; unreadable data counts as no snapshots
    fn read_named(&self) -> BTreeMap<String, Value> {
        let raw = match self.storage.get_item(NAMED_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeMap::new(),
            Err(e) => {
                log::warn!("Failed to read saved screens: {:#}", e);
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("Ignoring malformed saved screens: {}", e);
            BTreeMap::new()
        })
    }

    fn write_named(&mut self, screens: &BTreeMap<String, Value>) -> Result<(), LayoutError> {
        let json = serde_json::to_string(screens).map_err(anyhow::Error::from)?;
        self.storage.set_item(NAMED_KEY, &json)?;
        Ok(())
    }
}
