//! Widget kinds, identities and per-kind payloads.
//!
//! Every widget on the board is a [`WidgetInstance`]: a stable id, a kind, a
//! title, its last known rectangle and a payload. The payload is a tagged
//! union keyed by kind; the board and the layout store only ever move it
//! around as a whole.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Rect, Size};

/// The closed set of widget kinds a board can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    Stoplight,
    Clock,
    Timer,
    Poll,
    Dice,
    #[serde(rename = "namepicker")]
    NamePicker,
    Conversion,
    Image,
    Text,
    Scoreboard,
}

impl WidgetKind {
    /// Every kind, in bottom-bar order
    pub const ALL: [WidgetKind; 10] = [
        WidgetKind::Stoplight,
        WidgetKind::Clock,
        WidgetKind::Timer,
        WidgetKind::Poll,
        WidgetKind::Dice,
        WidgetKind::NamePicker,
        WidgetKind::Conversion,
        WidgetKind::Image,
        WidgetKind::Text,
        WidgetKind::Scoreboard,
    ];

    /// Wire name, as stored in the `type` field of a persisted widget
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetKind::Stoplight => "stoplight",
            WidgetKind::Clock => "clock",
            WidgetKind::Timer => "timer",
            WidgetKind::Poll => "poll",
            WidgetKind::Dice => "dice",
            WidgetKind::NamePicker => "namepicker",
            WidgetKind::Conversion => "conversion",
            WidgetKind::Image => "image",
            WidgetKind::Text => "text",
            WidgetKind::Scoreboard => "scoreboard",
        }
    }

    /// Title given to a freshly added widget: the wire name, capitalized
    pub fn default_title(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Rectangle a new widget of this kind starts with
    pub fn default_rect(&self) -> Rect {
        match self {
            WidgetKind::Stoplight => Rect::new(80.0, 80.0, 160.0, 300.0),
            WidgetKind::Clock => Rect::new(320.0, 80.0, 200.0, 120.0),
            WidgetKind::Timer => Rect::new(80.0, 260.0, 240.0, 180.0),
            WidgetKind::Poll => Rect::new(200.0, 260.0, 300.0, 260.0),
            WidgetKind::Dice => Rect::new(400.0, 200.0, 220.0, 200.0),
            WidgetKind::NamePicker => Rect::new(400.0, 300.0, 260.0, 200.0),
            WidgetKind::Conversion => Rect::new(500.0, 250.0, 300.0, 260.0),
            WidgetKind::Image => Rect::new(40.0, 40.0, 300.0, 250.0),
            WidgetKind::Text => Rect::new(40.0, 40.0, 350.0, 300.0),
            WidgetKind::Scoreboard => Rect::new(40.0, 40.0, 400.0, 320.0),
        }
    }

    /// Smallest size a resize gesture may shrink this kind to
    pub fn min_size(&self) -> Size {
        match self {
            WidgetKind::Stoplight => Size::new(100.0, 220.0),
            WidgetKind::Clock => Size::new(140.0, 80.0),
            WidgetKind::Timer => Size::new(180.0, 140.0),
            WidgetKind::Poll => Size::new(200.0, 160.0),
            WidgetKind::Dice => Size::new(160.0, 140.0),
            WidgetKind::NamePicker => Size::new(180.0, 140.0),
            WidgetKind::Conversion => Size::new(220.0, 200.0),
            WidgetKind::Image => Size::new(120.0, 100.0),
            WidgetKind::Text => Size::new(160.0, 120.0),
            WidgetKind::Scoreboard => Size::new(240.0, 180.0),
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown widget kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown widget type: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for WidgetKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        WidgetKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Unique widget identifier, derived from a millisecond timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetId(pub u64);

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues unique, normally increasing widget ids.
///
/// Ids follow the wall clock in milliseconds, but two widgets added within
/// the same millisecond (or after the clock stepped back) still get distinct
/// ids. Ids seen in a restored layout are fed back through [`observe`] so
/// they are never issued again. An observed `u64::MAX` has no successor, so
/// it is reserved without moving the sequence.
///
/// [`observe`]: IdGenerator::observe
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: u64,
    taken: BTreeSet<u64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id based on the current wall clock
    pub fn next(&mut self) -> WidgetId {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.next_at(now_ms)
    }

    /// Next id for a given millisecond timestamp
    pub fn next_at(&mut self, now_ms: u64) -> WidgetId {
        let mut id = now_ms.max(self.last.saturating_add(1));
        while self.taken.contains(&id) {
            id = id.wrapping_add(1);
        }
        self.taken.insert(id);
        self.last = self.last.max(id);
        WidgetId(id)
    }

    /// Record an id that already exists
    pub fn observe(&mut self, id: WidgetId) {
        self.taken.insert(id.0);
        if id.0 < u64::MAX {
            self.last = self.last.max(id.0);
        }
    }
}

// =============================================================================
// Per-kind payloads
// =============================================================================

/// Lit lamp of a stoplight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    #[default]
    Red,
    Yellow,
    Green,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoplightState {
    pub active: Signal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClockState {
    pub color: String,
    pub show_date: bool,
}

impl Default for ClockState {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            show_date: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerState {
    /// Seconds left on the countdown
    pub seconds: u32,
}

impl Default for TimerState {
    fn default() -> Self {
        Self { seconds: 5 * 60 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollState {
    /// Remote poll this widget mirrors, once it has been published
    pub poll_id: Option<String>,
    pub title: String,
    pub options: Vec<String>,
}

impl Default for PollState {
    fn default() -> Self {
        Self {
            poll_id: None,
            title: String::new(),
            options: vec!["A".to_string(), "B".to_string(), "C".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiceState {
    pub count: u32,
    pub sides: u32,
    pub values: Vec<u32>,
}

impl Default for DiceState {
    fn default() -> Self {
        Self {
            count: 1,
            sides: 6,
            values: vec![1],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamePickerState {
    pub names: Vec<String>,
    /// Remove a name from the pool once it has been picked
    pub unique_pick: bool,
    pub selected: Option<String>,
}

impl Default for NamePickerState {
    fn default() -> Self {
        Self {
            names: ["Alice", "Bob", "Charlie"].iter().map(|s| s.to_string()).collect(),
            unique_pick: false,
            selected: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversionState {
    pub value: f64,
    pub ingredient: String,
    pub input_unit: String,
    pub output_unit: String,
}

impl Default for ConversionState {
    fn default() -> Self {
        Self {
            value: 0.0,
            ingredient: "flour".to_string(),
            input_unit: "grams".to_string(),
            output_unit: "cups".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageState {
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextState {
    /// Rich-text markup of the editor
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: u64,
    pub name: String,
    pub score: i64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreboardState {
    pub teams: Vec<Team>,
}

impl Default for ScoreboardState {
    fn default() -> Self {
        Self {
            teams: vec![
                Team { id: 1, name: "Team 1".to_string(), score: 0, color: "#3b82f6".to_string() },
                Team { id: 2, name: "Team 2".to_string(), score: 0, color: "#ef4444".to_string() },
            ],
        }
    }
}

/// Widget-owned state that must survive persistence, tagged by kind
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetPayload {
    Stoplight(StoplightState),
    Clock(ClockState),
    Timer(TimerState),
    Poll(PollState),
    Dice(DiceState),
    NamePicker(NamePickerState),
    Conversion(ConversionState),
    Image(ImageState),
    Text(TextState),
    Scoreboard(ScoreboardState),
}

impl WidgetPayload {
    /// Payload of a freshly added widget
    pub fn default_for(kind: WidgetKind) -> Self {
        match kind {
            WidgetKind::Stoplight => WidgetPayload::Stoplight(StoplightState::default()),
            WidgetKind::Clock => WidgetPayload::Clock(ClockState::default()),
            WidgetKind::Timer => WidgetPayload::Timer(TimerState::default()),
            WidgetKind::Poll => WidgetPayload::Poll(PollState::default()),
            WidgetKind::Dice => WidgetPayload::Dice(DiceState::default()),
            WidgetKind::NamePicker => WidgetPayload::NamePicker(NamePickerState::default()),
            WidgetKind::Conversion => WidgetPayload::Conversion(ConversionState::default()),
            WidgetKind::Image => WidgetPayload::Image(ImageState::default()),
            WidgetKind::Text => WidgetPayload::Text(TextState::default()),
            WidgetKind::Scoreboard => WidgetPayload::Scoreboard(ScoreboardState::default()),
        }
    }

    /// Kind tag of this payload
    pub fn kind(&self) -> WidgetKind {
        match self {
            WidgetPayload::Stoplight(_) => WidgetKind::Stoplight,
            WidgetPayload::Clock(_) => WidgetKind::Clock,
            WidgetPayload::Timer(_) => WidgetKind::Timer,
            WidgetPayload::Poll(_) => WidgetKind::Poll,
            WidgetPayload::Dice(_) => WidgetKind::Dice,
            WidgetPayload::NamePicker(_) => WidgetKind::NamePicker,
            WidgetPayload::Conversion(_) => WidgetKind::Conversion,
            WidgetPayload::Image(_) => WidgetKind::Image,
            WidgetPayload::Text(_) => WidgetKind::Text,
            WidgetPayload::Scoreboard(_) => WidgetKind::Scoreboard,
        }
    }

    /// Encode as the `widgetData` JSON value
    pub fn to_value(&self) -> serde_json::Result<Value> {
        match self {
            WidgetPayload::Stoplight(s) => serde_json::to_value(s),
            WidgetPayload::Clock(s) => serde_json::to_value(s),
            WidgetPayload::Timer(s) => serde_json::to_value(s),
            WidgetPayload::Poll(s) => serde_json::to_value(s),
            WidgetPayload::Dice(s) => serde_json::to_value(s),
            WidgetPayload::NamePicker(s) => serde_json::to_value(s),
            WidgetPayload::Conversion(s) => serde_json::to_value(s),
            WidgetPayload::Image(s) => serde_json::to_value(s),
            WidgetPayload::Text(s) => serde_json::to_value(s),
            WidgetPayload::Scoreboard(s) => serde_json::to_value(s),
        }
    }

    /// Decode a `widgetData` value for the given kind.
    ///
    /// A missing value or one that does not match the kind's shape yields
    /// the kind's default payload.
    pub fn from_value(kind: WidgetKind, value: Value) -> Self {
        if value.is_null() {
            return Self::default_for(kind);
        }
        let decoded = match kind {
            WidgetKind::Stoplight => serde_json::from_value(value).map(WidgetPayload::Stoplight),
            WidgetKind::Clock => serde_json::from_value(value).map(WidgetPayload::Clock),
            WidgetKind::Timer => serde_json::from_value(value).map(WidgetPayload::Timer),
            WidgetKind::Poll => serde_json::from_value(value).map(WidgetPayload::Poll),
            WidgetKind::Dice => serde_json::from_value(value).map(WidgetPayload::Dice),
            WidgetKind::NamePicker => serde_json::from_value(value).map(WidgetPayload::NamePicker),
            WidgetKind::Conversion => serde_json::from_value(value).map(WidgetPayload::Conversion),
            WidgetKind::Image => serde_json::from_value(value).map(WidgetPayload::Image),
            WidgetKind::Text => serde_json::from_value(value).map(WidgetPayload::Text),
            WidgetKind::Scoreboard => serde_json::from_value(value).map(WidgetPayload::Scoreboard),
        };
        decoded.unwrap_or_else(|e| {
            log::warn!("Discarding unreadable {} widget data: {}", kind, e);
            Self::default_for(kind)
        })
    }

    /// Clear object references that cannot outlive the page that created them.
    /// Returns true if anything was cleared.
    pub fn drop_transient_refs(&mut self) -> bool {
        match self {
            WidgetPayload::Image(image) if is_transient_ref(&image.image_url) => {
                image.image_url.clear();
                true
            }
            _ => false,
        }
    }
}

/// Whether an image reference only lives as long as the page (an uploaded blob)
pub fn is_transient_ref(url: &str) -> bool {
    url.starts_with("blob:")
}

/// A widget placed on the board
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetInstance {
    pub id: WidgetId,
    pub kind: WidgetKind,
    pub title: String,
    /// Last known rectangle; the drag controller holds the live one
    pub rect: Rect,
    pub payload: WidgetPayload,
}

impl WidgetInstance {
    /// A widget of `kind` with default title, rectangle and payload
    pub fn new(id: WidgetId, kind: WidgetKind) -> Self {
        Self {
            id,
            kind,
            title: kind.default_title(),
            rect: kind.default_rect(),
            payload: WidgetPayload::default_for(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_titles() {
        assert_eq!(WidgetKind::Clock.default_title(), "Clock");
        assert_eq!(WidgetKind::NamePicker.default_title(), "Namepicker");
        assert_eq!(WidgetKind::Scoreboard.default_title(), "Scoreboard");
    }

    #[test]
    fn test_kind_wire_names() {
        for kind in WidgetKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<WidgetKind>(), Ok(kind));
        }
        assert_eq!("Clock".parse::<WidgetKind>(), Ok(WidgetKind::Clock));
        assert!("calendar".parse::<WidgetKind>().is_err());
    }

    #[test]
    fn test_default_rect_respects_min_size() {
        for kind in WidgetKind::ALL {
            let rect = kind.default_rect();
            let min = kind.min_size();
            assert!(rect.width >= min.width, "{} default width below minimum", kind);
            assert!(rect.height >= min.height, "{} default height below minimum", kind);
        }
    }

    #[test]
    fn test_id_generator_strictly_increasing() {
        let mut ids = IdGenerator::new();
        let a = ids.next_at(1000);
        let b = ids.next_at(1000);
        let c = ids.next_at(999);
        let d = ids.next_at(2000);
        assert_eq!(a, WidgetId(1000));
        assert_eq!(b, WidgetId(1001));
        assert_eq!(c, WidgetId(1002));
        assert_eq!(d, WidgetId(2000));
    }

    #[test]
    fn test_id_generator_skips_observed_ids() {
        let mut ids = IdGenerator::new();
        ids.observe(WidgetId(5000));
        assert_eq!(ids.next_at(4000), WidgetId(5001));
    }

    #[test]
    fn test_id_generator_survives_max_id() {
        let mut ids = IdGenerator::new();
        ids.observe(WidgetId(u64::MAX));
        assert_eq!(ids.next_at(1000), WidgetId(1000));

        // Sequence runs into the top of the range and wraps to a free id
        ids.observe(WidgetId(u64::MAX - 1));
        assert_eq!(ids.next_at(1000), WidgetId(0));
        assert_eq!(ids.next_at(1000), WidgetId(1));
        assert_eq!(ids.next_at(1000), WidgetId(2));
    }

    #[test]
    fn test_payload_kind_matches_default() {
        for kind in WidgetKind::ALL {
            assert_eq!(WidgetPayload::default_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_payload_from_partial_value_fills_defaults() {
        let payload = WidgetPayload::from_value(WidgetKind::Dice, json!({"sides": 20}));
        assert_eq!(
            payload,
            WidgetPayload::Dice(DiceState { count: 1, sides: 20, values: vec![1] })
        );
    }

    #[test]
    fn test_payload_from_mismatched_value_degrades_to_default() {
        let payload = WidgetPayload::from_value(WidgetKind::Scoreboard, json!({"teams": "lots"}));
        assert_eq!(payload, WidgetPayload::default_for(WidgetKind::Scoreboard));

        let payload = WidgetPayload::from_value(WidgetKind::Timer, Value::Null);
        assert_eq!(payload, WidgetPayload::Timer(TimerState { seconds: 300 }));
    }

    #[test]
    fn test_payload_wire_shape() {
        let payload = WidgetPayload::NamePicker(NamePickerState {
            names: vec!["Ada".to_string()],
            unique_pick: true,
            selected: Some("Ada".to_string()),
        });
        let value = payload.to_value().unwrap();
        assert_eq!(value, json!({"names": ["Ada"], "uniquePick": true, "selected": "Ada"}));
    }

    #[test]
    fn test_drop_transient_image_refs() {
        let mut payload = WidgetPayload::Image(ImageState { image_url: "blob:http://x/1".to_string() });
        assert!(payload.drop_transient_refs());
        assert_eq!(payload, WidgetPayload::Image(ImageState::default()));

        let mut linked = WidgetPayload::Image(ImageState { image_url: "https://x/cat.png".to_string() });
        assert!(!linked.drop_transient_refs());
    }
}
