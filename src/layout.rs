//! Board layout and its persisted JSON form.
//!
//! The JSON shape is shared with every saved slot and named snapshot:
//!
//! ```text
//! {
//!   "widgets": [{ "id", "type", "title", "position": {x, y, width, height}, "widgetData" }],
//!   "bgUrl": "", "bgColor": "#800cb6ff", "widgetTransparency": 100, "hideTitles": false
//! }
//! ```
//!
//! Reading is forgiving: layouts written by earlier releases (positions
//! without a size, missing titles, unknown widget types) still load.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Rect;
use crate::widget::{is_transient_ref, WidgetId, WidgetInstance, WidgetKind, WidgetPayload};

/// Background color of a fresh board
pub const DEFAULT_BACKGROUND: &str = "#800cb6ff";

/// Lowest widget opacity, in percent
pub const MIN_TRANSPARENCY: u8 = 10;
/// Fully opaque widgets
pub const MAX_TRANSPARENCY: u8 = 100;

/// Everything needed to rebuild a board
#[derive(Debug, Clone, PartialEq)]
pub struct BoardLayout {
    /// Widgets in stacking order (first is bottom-most)
    pub widgets: Vec<WidgetInstance>,
    pub background_color: String,
    pub background_image: Option<String>,
    /// Widget opacity percentage, 10-100
    pub widget_transparency: u8,
    pub hide_titles: bool,
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self::empty(DEFAULT_BACKGROUND)
    }
}

impl BoardLayout {
    /// A layout with no widgets and the given background color
    pub fn empty(background_color: &str) -> Self {
        Self {
            widgets: Vec::new(),
            background_color: background_color.to_string(),
            background_image: None,
            widget_transparency: MAX_TRANSPARENCY,
            hide_titles: false,
        }
    }

    pub fn widget(&self, id: WidgetId) -> Option<&WidgetInstance> {
        self.widgets.iter().find(|w| w.id == id)
    }

    /// Clear page-lifetime image references (uploaded blobs), which point at
    /// nothing after a reload. Returns true if anything was cleared.
    pub fn drop_transient_refs(&mut self) -> bool {
        let mut cleared = false;
        if self.background_image.as_deref().is_some_and(is_transient_ref) {
            self.background_image = None;
            cleared = true;
        }
        for widget in &mut self.widgets {
            cleared |= widget.payload.drop_transient_refs();
        }
        cleared
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        let widgets = self
            .widgets
            .iter()
            .map(|w| serde_json::to_value(WidgetRecord::from_instance(w)?))
            .collect::<serde_json::Result<Vec<_>>>()?;
        serde_json::to_value(LayoutBlob {
            widgets: Some(widgets),
            bg_url: Some(self.background_image.clone().unwrap_or_default()),
            bg_color: Some(self.background_color.clone()),
            widget_transparency: Some(f64::from(self.widget_transparency)),
            hide_titles: Some(self.hide_titles),
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_value()?)
    }

    /// Decode a layout, using `default_background` when none was stored.
    ///
    /// Fails only when the value is not a layout object at all; individual
    /// unreadable widgets are skipped.
    pub fn from_value(value: Value, default_background: &str) -> serde_json::Result<Self> {
        let blob: LayoutBlob = serde_json::from_value(value)?;
        let stored = blob.widgets.unwrap_or_default();
        let mut widgets = Vec::with_capacity(stored.len());
        for raw in stored {
            match serde_json::from_value::<WidgetRecord>(raw) {
                Ok(record) => widgets.push(record.into_instance()),
                Err(e) => log::warn!("Skipping unreadable widget in saved layout: {}", e),
            }
        }
        Ok(Self {
            widgets,
            background_color: blob
                .bg_color
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| default_background.to_string()),
            background_image: blob.bg_url.filter(|url| !url.is_empty()),
            widget_transparency: blob
                .widget_transparency
                .map(clamp_transparency)
                .unwrap_or(MAX_TRANSPARENCY),
            hide_titles: blob.hide_titles.unwrap_or(false),
        })
    }

    pub fn from_json(json: &str, default_background: &str) -> serde_json::Result<Self> {
        Self::from_value(serde_json::from_str(json)?, default_background)
    }
}

/// Clamp a stored opacity into the supported 10-100 range
pub fn clamp_transparency(value: f64) -> u8 {
    if value.is_nan() {
        return MAX_TRANSPARENCY;
    }
    value
        .round()
        .clamp(f64::from(MIN_TRANSPARENCY), f64::from(MAX_TRANSPARENCY)) as u8
}

// =============================================================================
// Wire format
// =============================================================================

/// Every field may be missing or `null` in stored blobs
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutBlob {
    #[serde(default)]
    widgets: Option<Vec<Value>>,
    #[serde(default)]
    bg_url: Option<String>,
    #[serde(default)]
    bg_color: Option<String>,
    #[serde(default)]
    widget_transparency: Option<f64>,
    #[serde(default)]
    hide_titles: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WidgetRecord {
    id: WidgetId,
    #[serde(rename = "type")]
    kind: WidgetKind,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    position: Option<PositionRecord>,
    #[serde(rename = "widgetData", default)]
    widget_data: Value,
}

/// Older layouts stored only the top-left corner
#[derive(Debug, Serialize, Deserialize)]
struct PositionRecord {
    x: f64,
    y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<f64>,
}

impl WidgetRecord {
    fn from_instance(widget: &WidgetInstance) -> serde_json::Result<Self> {
        Ok(Self {
            id: widget.id,
            kind: widget.kind,
            title: Some(widget.title.clone()),
            position: Some(PositionRecord {
                x: widget.rect.x,
                y: widget.rect.y,
                width: Some(widget.rect.width),
                height: Some(widget.rect.height),
            }),
            widget_data: widget.payload.to_value()?,
        })
    }

    fn into_instance(self) -> WidgetInstance {
        let default_rect = self.kind.default_rect();
        let rect = match self.position {
            Some(pos) => Rect {
                x: pos.x,
                y: pos.y,
                width: pos.width.unwrap_or(default_rect.width),
                height: pos.height.unwrap_or(default_rect.height),
            },
            None => default_rect,
        };
        WidgetInstance {
            id: self.id,
            kind: self.kind,
            title: self.title.unwrap_or_else(|| self.kind.default_title()),
            rect,
            payload: WidgetPayload::from_value(self.kind, self.widget_data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::{ClockState, ImageState, ScoreboardState, Team, TextState};
    use serde_json::json;

    fn sample() -> BoardLayout {
        let mut clock = WidgetInstance::new(WidgetId(1700000000001), WidgetKind::Clock);
        clock.payload = WidgetPayload::Clock(ClockState { color: "#ff0000".to_string(), show_date: false });
        let mut text = WidgetInstance::new(WidgetId(1700000000002), WidgetKind::Text);
        text.title = "Agenda".to_string();
        text.rect = Rect::new(12.5, 40.0, 360.0, 310.0);
        text.payload = WidgetPayload::Text(TextState { content: "<b>Quiz</b>".to_string() });
        let mut scores = WidgetInstance::new(WidgetId(1700000000003), WidgetKind::Scoreboard);
        scores.payload = WidgetPayload::Scoreboard(ScoreboardState {
            teams: vec![Team { id: 9, name: "Owls".to_string(), score: 12, color: "#10b981".to_string() }],
        });
        BoardLayout {
            widgets: vec![clock, text, scores],
            background_color: "#112233".to_string(),
            background_image: Some("https://example.com/bg.jpg".to_string()),
            widget_transparency: 70,
            hide_titles: true,
        }
    }

    #[test]
    fn test_json_round_trip() {
        let layout = sample();
        let json = layout.to_json().unwrap();
        let restored = BoardLayout::from_json(&json, DEFAULT_BACKGROUND).unwrap();
        assert_eq!(restored, layout);
    }

    #[test]
    fn test_wire_field_names() {
        let value = sample().to_value().unwrap();
        assert_eq!(value["bgUrl"], json!("https://example.com/bg.jpg"));
        assert_eq!(value["bgColor"], json!("#112233"));
        assert_eq!(value["widgetTransparency"], json!(70.0));
        assert_eq!(value["hideTitles"], json!(true));
        let first = &value["widgets"][0];
        assert_eq!(first["id"], json!(1700000000001u64));
        assert_eq!(first["type"], json!("clock"));
        assert_eq!(first["title"], json!("Clock"));
        assert_eq!(first["position"], json!({"x": 320.0, "y": 80.0, "width": 200.0, "height": 120.0}));
        assert_eq!(first["widgetData"], json!({"color": "#ff0000", "showDate": false}));
    }

    #[test]
    fn test_legacy_layout_fills_gaps() {
        let json = r##"{
            "widgets": [
                {"id": 1, "type": "dice", "title": "Dice", "position": {"x": 40, "y": 40}},
                {"id": 2, "type": "timer"},
                {"id": 3, "type": "calendar", "title": "Gone"},
                {"id": 4, "type": "poll", "title": "Vote", "widgetData": {"options": ["Yes", "No"]}}
            ],
            "bgUrl": "",
            "bgColor": "#000000"
        }"##;
        let layout = BoardLayout::from_json(json, DEFAULT_BACKGROUND).unwrap();

        assert_eq!(layout.widgets.len(), 3);
        assert_eq!(layout.widgets[0].rect, Rect::new(40.0, 40.0, 220.0, 200.0));
        assert_eq!(layout.widgets[1].title, "Timer");
        assert_eq!(layout.widgets[1].rect, WidgetKind::Timer.default_rect());
        match &layout.widgets[2].payload {
            WidgetPayload::Poll(poll) => assert_eq!(poll.options, vec!["Yes", "No"]),
            other => panic!("Expected poll payload, got {:?}", other),
        }
        assert_eq!(layout.background_image, None);
        assert_eq!(layout.widget_transparency, 100);
        assert!(!layout.hide_titles);
    }

    #[test]
    fn test_null_fields_fall_back_to_defaults() {
        let json = r#"{
            "widgets": null,
            "bgUrl": null,
            "bgColor": null,
            "widgetTransparency": null,
            "hideTitles": null
        }"#;
        let layout = BoardLayout::from_json(json, DEFAULT_BACKGROUND).unwrap();
        assert_eq!(layout, BoardLayout::empty(DEFAULT_BACKGROUND));

        let json = r#"{"widgets": [{"id": 7, "type": "dice"}], "bgUrl": null, "hideTitles": null}"#;
        let layout = BoardLayout::from_json(json, DEFAULT_BACKGROUND).unwrap();
        assert_eq!(layout.widgets.len(), 1);
        assert_eq!(layout.background_image, None);
    }

    #[test]
    fn test_missing_background_uses_default() {
        let layout = BoardLayout::from_json(r#"{"widgets": []}"#, "#abcdef").unwrap();
        assert_eq!(layout.background_color, "#abcdef");
    }

    #[test]
    fn test_not_a_layout_is_an_error() {
        assert!(BoardLayout::from_json("[1, 2, 3]", DEFAULT_BACKGROUND).is_err());
        assert!(BoardLayout::from_json("{not json", DEFAULT_BACKGROUND).is_err());
    }

    #[test]
    fn test_transparency_is_clamped() {
        assert_eq!(clamp_transparency(0.0), 10);
        assert_eq!(clamp_transparency(55.4), 55);
        assert_eq!(clamp_transparency(250.0), 100);
        assert_eq!(clamp_transparency(f64::NAN), 100);
    }

    #[test]
    fn test_drop_transient_refs() {
        let mut layout = sample();
        layout.background_image = Some("blob:http://localhost/abc".to_string());
        let mut image = WidgetInstance::new(WidgetId(5), WidgetKind::Image);
        image.payload = WidgetPayload::Image(ImageState { image_url: "blob:http://localhost/def".to_string() });
        layout.widgets.push(image);

        assert!(layout.drop_transient_refs());
        assert_eq!(layout.background_image, None);
        assert_eq!(layout.widgets[3].payload, WidgetPayload::Image(ImageState::default()));
        assert!(!layout.drop_transient_refs());
    }
}
