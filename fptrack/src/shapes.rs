//! Upstream renderer payloads
//!
//! The host attaches one of two renderer structures to playlist items:
//!
//! - `playlistPanelVideoRenderer` (shape A): already close to the canonical record
//! - `musicResponsiveListItemRenderer` (shape B): column based, title and byline
//!   spread over `flexColumns`
//!
//! Both are deserialized leniently: every field is optional, unknown fields are
//! ignored (shape A keeps them for passthrough).

use crate::model::Thumbnail;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Key of the shape A payload
pub const PANEL_RENDERER_KEY: &str = "playlistPanelVideoRenderer";

/// Key of the shape B payload
pub const RESPONSIVE_RENDERER_KEY: &str = "musicResponsiveListItemRenderer";

/// A formatted text: either a list of runs or a simple text
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedText {
    #[serde(default)]
    pub runs: Vec<TextRun>,
    pub simple_text: Option<String>,
}

impl FormattedText {
    /// Text of the first run, falling back to `simpleText`
    pub fn first_text(&self) -> Option<&str> {
        self.runs
            .first()
            .map(|run| run.text.as_str())
            .or(self.simple_text.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    #[serde(default)]
    pub text: String,
    pub navigation_endpoint: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThumbnailList {
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

/// Shape A
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelVideoRenderer {
    pub video_id: Option<String>,
    pub title: Option<FormattedText>,
    pub long_byline_text: Option<FormattedText>,
    pub short_byline_text: Option<FormattedText>,
    pub thumbnail: Option<ThumbnailList>,
    pub length_text: Option<FormattedText>,
    #[serde(default)]
    pub selected: bool,
    pub navigation_endpoint: Option<Value>,
    /// Everything else (`menu`, `trackingParams`, badges...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Shape B
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsiveListItemRenderer {
    pub video_id: Option<String>,
    #[serde(default)]
    pub flex_columns: Vec<ListItemColumn>,
    #[serde(default)]
    pub fixed_columns: Vec<ListItemColumn>,
    pub thumbnail: Option<MusicThumbnail>,
    pub navigation_endpoint: Option<Value>,
    pub playlist_item_data: Option<PlaylistItemData>,
    pub menu: Option<Value>,
    pub tracking_params: Option<Value>,
}

impl ResponsiveListItemRenderer {
    /// Text of column `index`, if the column exists
    pub fn flex_column(&self, index: usize) -> Option<&FormattedText> {
        self.flex_columns.get(index).and_then(ListItemColumn::text)
    }

    pub fn fixed_column(&self, index: usize) -> Option<&FormattedText> {
        self.fixed_columns.get(index).and_then(ListItemColumn::text)
    }

    /// Thumbnails from either `musicThumbnailRenderer.thumbnail.thumbnails`
    /// or `musicThumbnailRenderer.thumbnails`
    pub fn thumbnails(&self) -> Vec<Thumbnail> {
        let Some(renderer) = self
            .thumbnail
            .as_ref()
            .and_then(|t| t.music_thumbnail_renderer.as_ref())
        else {
            return Vec::new();
        };

        match &renderer.thumbnail {
            Some(list) if !list.thumbnails.is_empty() => list.thumbnails.clone(),
            _ => renderer.thumbnails.clone(),
        }
    }
}

/// A flex or fixed column; the host uses a different key for each kind
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemColumn {
    #[serde(alias = "musicResponsiveListItemFixedColumnRenderer")]
    pub music_responsive_list_item_flex_column_renderer: Option<ColumnRenderer>,
}

impl ListItemColumn {
    pub fn text(&self) -> Option<&FormattedText> {
        self.music_responsive_list_item_flex_column_renderer
            .as_ref()
            .and_then(|c| c.text.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnRenderer {
    pub text: Option<FormattedText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicThumbnail {
    pub music_thumbnail_renderer: Option<MusicThumbnailRenderer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MusicThumbnailRenderer {
    pub thumbnail: Option<ThumbnailList>,
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemData {
    pub video_id: Option<String>,
}

/// Structured payload attached to a rendered item
#[derive(Debug, Clone)]
pub enum RendererPayload {
    Panel(PanelVideoRenderer),
    Responsive(ResponsiveListItemRenderer),
}

impl RendererPayload {
    /// Recognise a payload, shape A taking priority over shape B
    ///
    /// Returns `None` when neither key is present or the structure under the key
    /// cannot be read.
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(panel) = value.get(PANEL_RENDERER_KEY) {
            return match serde_json::from_value(panel.clone()) {
                Ok(renderer) => Some(Self::Panel(renderer)),
                Err(e) => {
                    tracing::debug!("Unreadable {} payload: {}", PANEL_RENDERER_KEY, e);
                    None
                }
            };
        }

        if let Some(responsive) = value.get(RESPONSIVE_RENDERER_KEY) {
            return match serde_json::from_value(responsive.clone()) {
                Ok(renderer) => Some(Self::Responsive(renderer)),
                Err(e) => {
                    tracing::debug!("Unreadable {} payload: {}", RESPONSIVE_RENDERER_KEY, e);
                    None
                }
            };
        }

        None
    }
}

/// `watchEndpoint.videoId` of a navigation endpoint
pub fn watch_video_id(endpoint: &Value) -> Option<String> {
    endpoint
        .pointer("/watchEndpoint/videoId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
