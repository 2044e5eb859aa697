//! Configuration file support for classboard.
//!
//! Loads settings from ~/.config/classboard/config.toml if it exists,
//! otherwise uses sensible defaults.
//!
//! Also provides `BoardSettings` - the runtime configuration struct with
//! resolved colors, sizes and durations.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::debounce::{DEFAULT_QUIET_PERIOD, MAX_QUIET_PERIOD};
use crate::drag::DEFAULT_RESIZE_HANDLE;
use crate::layout::DEFAULT_BACKGROUND;
use crate::storage::FileStorage;
use crate::types::{Size, Viewport};
use crate::widget::WidgetKind;

// =============================================================================
// Runtime Configuration (resolved values)
// =============================================================================

/// Runtime board configuration.
///
/// Built from the file-based config types at startup; everything the board
/// needs is already validated and converted here.
#[derive(Debug, Clone)]
pub struct BoardSettings {
    /// Visible area, including the reserved bottom bar
    pub viewport: Viewport,
    /// Side of the square resize handle
    pub resize_handle: f64,
    /// Quiet period before the layout is auto-saved
    pub quiet_period: Duration,
    /// Background color of an empty board
    pub default_background: String,
    /// Where file-backed storage lives; `None` means the platform data dir
    pub storage_dir: Option<PathBuf>,
    /// Per-kind minimum size overrides
    pub min_sizes: HashMap<WidgetKind, Size>,
}

impl BoardSettings {
    /// Minimum size for a widget kind, honoring overrides
    pub fn min_size(&self, kind: WidgetKind) -> Size {
        self.min_sizes
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.min_size())
    }

    /// Directory for file-backed layout storage
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(FileStorage::default_dir)
    }
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            resize_handle: DEFAULT_RESIZE_HANDLE,
            quiet_period: DEFAULT_QUIET_PERIOD,
            default_background: DEFAULT_BACKGROUND.to_string(),
            storage_dir: None,
            min_sizes: HashMap::new(),
        }
    }
}

// =============================================================================
// File-based Configuration (TOML parsing)
// =============================================================================

/// Top-level configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub board: BoardConfig,
    pub drag: DragConfig,
    pub persistence: PersistenceConfig,
    /// Minimum size overrides keyed by widget type ("clock", "timer", ...)
    pub widgets: HashMap<String, MinSizeConfig>,
}

/// Board geometry and look
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Height of the widget launcher bar along the bottom edge
    pub bottom_bar_height: u32,
    /// Hex color like "#800cb6ff" or "#1e1e1e"
    pub background: String,
}

/// Pointer gesture settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DragConfig {
    pub resize_handle_size: u32,
}

/// Layout persistence settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub autosave_quiet_ms: u64,
    pub storage_dir: Option<PathBuf>,
}

/// Minimum size override for one widget kind
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct MinSizeConfig {
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        let viewport = Viewport::default();
        Self {
            viewport_width: viewport.width as u32,
            viewport_height: viewport.height as u32,
            bottom_bar_height: viewport.reserved_bottom as u32,
            background: DEFAULT_BACKGROUND.to_string(),
        }
    }
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            resize_handle_size: DEFAULT_RESIZE_HANDLE as u32,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            autosave_quiet_ms: DEFAULT_QUIET_PERIOD.as_millis() as u64,
            storage_dir: None,
        }
    }
}

impl Config {
    /// Load config from default path (~/.config/classboard/config.toml)
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("classboard")
            .join("config.toml")
    }

    /// Load config from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config: {}", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Resolve into runtime settings
    pub fn settings(&self) -> BoardSettings {
        let background = if parse_color(&self.board.background).is_some() {
            self.board.background.clone()
        } else {
            log::warn!(
                "Invalid background color {:?}, using {}",
                self.board.background,
                DEFAULT_BACKGROUND
            );
            DEFAULT_BACKGROUND.to_string()
        };

        let mut min_sizes = HashMap::new();
        for (name, size) in &self.widgets {
            let kind = match name.parse::<WidgetKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    log::warn!("Ignoring [widgets.{}]: {}", name, e);
                    continue;
                }
            };
            let default = kind.min_size();
            min_sizes.insert(
                kind,
                Size::new(
                    size.min_width.map_or(default.width, f64::from),
                    size.min_height.map_or(default.height, f64::from),
                ),
            );
        }

        let mut quiet_period = Duration::from_millis(self.persistence.autosave_quiet_ms);
        if quiet_period > MAX_QUIET_PERIOD {
            log::warn!(
                "autosave_quiet_ms {} is too long, using {}",
                self.persistence.autosave_quiet_ms,
                MAX_QUIET_PERIOD.as_millis()
            );
            quiet_period = MAX_QUIET_PERIOD;
        }

        BoardSettings {
            viewport: Viewport::new(
                f64::from(self.board.viewport_width),
                f64::from(self.board.viewport_height),
                f64::from(self.board.bottom_bar_height),
            ),
            resize_handle: f64::from(self.drag.resize_handle_size),
            quiet_period,
            default_background: background,
            storage_dir: self.persistence.storage_dir.clone(),
            min_sizes,
        }
    }
}

/// Parse a hex color string ("#rrggbb" or "#rrggbbaa") to a u32
pub fn parse_color(s: &str) -> Option<u32> {
    let s = s.trim_start_matches('#');
    if s.len() != 6 && s.len() != 8 {
        return None;
    }
    u32::from_str_radix(s, 16).ok()
}
