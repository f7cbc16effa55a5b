//! Canonical track record
//!
//! Every playlist entry, whatever representation it was read from, ends up as a
//! [`TrackRecord`]. Records can be rendered back into the host's
//! `playlistPanelVideoRenderer` item shape with [`TrackRecord::to_panel_item`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Duration shown when none could be discovered
pub const DEFAULT_DURATION: &str = "0:00";

/// Literal run inserted between two byline fragments
pub const BYLINE_SEPARATOR: &str = " • ";

/// Bullet character used by the host between byline fragments
pub const BULLET: char = '•';

fn default_duration() -> String {
    DEFAULT_DURATION.to_string()
}

/// Which extraction path produced a record
///
/// Diagnostic only: nothing branches on it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Read directly from a `playlistPanelVideoRenderer` payload
    #[default]
    Original,
    /// Rebuilt from rendered markup
    Reconstructed,
    /// Converted from a `musicResponsiveListItemRenderer` payload
    Transformed,
}

/// One byline fragment (artist, album, year...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BylineRun {
    pub text: String,
    /// Browse link attached to the fragment, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_endpoint: Option<Value>,
}

impl BylineRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            navigation_endpoint: None,
        }
    }

    fn to_run(&self) -> Value {
        let mut run = Map::new();
        run.insert("text".into(), Value::String(self.text.clone()));
        if let Some(endpoint) = &self.navigation_endpoint {
            run.insert("navigationEndpoint".into(), endpoint.clone());
        }
        Value::Object(run)
    }
}

impl From<&str> for BylineRun {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// One size variant of the cover art
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl Thumbnail {
    pub fn square(url: impl Into<String>, size: u32) -> Self {
        Self {
            url: url.into(),
            width: size,
            height: size,
        }
    }
}

/// Canonical representation of one playable playlist entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    /// Playable-item identifier; dedup and selection key
    pub id: String,
    #[serde(default)]
    pub title_text: String,
    /// Kept byline fragments, without separators
    #[serde(default)]
    pub byline_runs: Vec<BylineRun>,
    /// Ascending by size
    #[serde(default)]
    pub thumbnail_variants: Vec<Thumbnail>,
    #[serde(default = "default_duration")]
    pub duration_text: String,
    /// Opaque payload the host needs to start playback; never interpreted
    #[serde(default)]
    pub navigation_ref: Value,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub provenance: Provenance,
    /// Upstream fields the canonical schema does not model (`menu`, `trackingParams`...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub passthrough: Map<String, Value>,
}

impl TrackRecord {
    /// Create a bare record for `id`
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title_text: title.into(),
            byline_runs: Vec::new(),
            thumbnail_variants: Vec::new(),
            duration_text: default_duration(),
            navigation_ref: Value::Null,
            selected: false,
            provenance: Provenance::Original,
            passthrough: Map::new(),
        }
    }

    pub fn with_byline<I, S>(mut self, runs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.byline_runs = runs.into_iter().map(|s| BylineRun::new(s)).collect();
        self
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration_text = duration.into();
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Whether the record can be emitted at all
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// Navigation payload, or a minimal `watchEndpoint` when none was captured
    pub fn navigation_endpoint(&self) -> Value {
        if self.navigation_ref.is_null() {
            watch_endpoint(&self.id)
        } else {
            self.navigation_ref.clone()
        }
    }

    /// Long byline runs as the host renders them: kept runs with `" • "` runs between them
    pub fn long_byline(&self) -> Vec<Value> {
        let mut runs = Vec::with_capacity(self.byline_runs.len() * 2);
        for (i, run) in self.byline_runs.iter().enumerate() {
            if i > 0 {
                runs.push(json!({ "text": BYLINE_SEPARATOR }));
            }
            runs.push(run.to_run());
        }
        runs
    }

    /// Short byline: exactly the first kept run, or nothing
    pub fn short_byline(&self) -> Vec<Value> {
        self.byline_runs
            .first()
            .map(|run| vec![run.to_run()])
            .unwrap_or_default()
    }

    /// Render as a host queue item: `{ "playlistPanelVideoRenderer": { ... } }`
    ///
    /// Fails only when the record has no id.
    pub fn to_panel_item(&self) -> Result<Value> {
        if !self.has_id() {
            return Err(Error::MissingId);
        }

        // passthrough first so that canonical fields win on key clashes
        let mut renderer = self.passthrough.clone();
        renderer.insert("videoId".into(), Value::String(self.id.clone()));
        renderer.insert("title".into(), json!({ "runs": [{ "text": self.title_text }] }));
        renderer.insert("longBylineText".into(), json!({ "runs": self.long_byline() }));
        renderer.insert("shortBylineText".into(), json!({ "runs": self.short_byline() }));
        let thumbnails = serde_json::to_value(&self.thumbnail_variants)?;
        renderer.insert("thumbnail".into(), json!({ "thumbnails": thumbnails }));
        renderer.insert(
            "lengthText".into(),
            json!({
                "runs": [{ "text": self.duration_text }],
                "accessibility": {
                    "accessibilityData": { "label": format!("{} duration", self.duration_text) }
                }
            }),
        );
        renderer.insert("selected".into(), Value::Bool(self.selected));
        renderer.insert("navigationEndpoint".into(), self.navigation_endpoint());

        Ok(json!({ "playlistPanelVideoRenderer": Value::Object(renderer) }))
    }
}

/// Minimal navigation endpoint starting playback of `video_id`
pub fn watch_endpoint(video_id: &str) -> Value {
    json!({
        "clickTrackingParams": "",
        "watchEndpoint": { "videoId": video_id }
    })
}
