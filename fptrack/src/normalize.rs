//! Record Normalizer
//!
//! Maps each upstream representation onto [`TrackRecord`]. The set of
//! representations is closed ([`UpstreamShape`]); each variant has exactly one
//! normalisation function.
//!
//! Normalisation returns `None` when no id can be found: such an item is
//! unusable and must be discarded by the caller.

use crate::model::{watch_endpoint, BylineRun, Provenance, Thumbnail, TrackRecord, BULLET, DEFAULT_DURATION};
use crate::shapes::{
    watch_video_id, FormattedText, PanelVideoRenderer, RendererPayload,
    ResponsiveListItemRenderer, TextRun,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

/// A byline fragment made only of the bullet
pub const BULLET_TEXT: &str = "•";

/// Size ladder regenerated for reconstructed thumbnails
pub const THUMBNAIL_SIZES: [u32; 6] = [60, 120, 180, 226, 302, 544];

static SIZE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"=w\d+-h\d+.*$").expect("static regex"));

/// Item rebuilt from rendered markup (see [`crate::extract`])
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomItem {
    pub id: Option<String>,
    pub title_text: String,
    /// Raw byline fragments in display order (may still contain bullets or duplicates)
    pub byline_fragments: Vec<String>,
    pub thumbnail_url: Option<String>,
    pub duration_text: Option<String>,
}

/// Every representation a playlist entry can be read from
#[derive(Debug, Clone)]
pub enum UpstreamShape {
    /// Shape A: `playlistPanelVideoRenderer`
    Panel(PanelVideoRenderer),
    /// Shape B: `musicResponsiveListItemRenderer`
    Responsive(ResponsiveListItemRenderer),
    /// Rebuilt from markup
    Reconstructed(DomItem),
}

impl From<RendererPayload> for UpstreamShape {
    fn from(payload: RendererPayload) -> Self {
        match payload {
            RendererPayload::Panel(r) => Self::Panel(r),
            RendererPayload::Responsive(r) => Self::Responsive(r),
        }
    }
}

impl UpstreamShape {
    pub fn normalize(self) -> Option<TrackRecord> {
        match self {
            Self::Panel(r) => normalize_panel(r),
            Self::Responsive(r) => normalize_responsive(r),
            Self::Reconstructed(item) => normalize_dom(item),
        }
    }
}

/// First candidate holding non-blank text
fn first_populated<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn is_separator(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.chars().all(|c| c == BULLET)
}

/// Drop separator runs and exact-duplicate runs (by text), keeping first occurrences
pub fn clean_byline_runs(runs: impl IntoIterator<Item = BylineRun>) -> Vec<BylineRun> {
    let mut seen = HashSet::new();
    runs.into_iter()
        .filter_map(|mut run| {
            if is_separator(&run.text) {
                return None;
            }
            run.text = run.text.trim().to_string();
            seen.insert(run.text.clone()).then_some(run)
        })
        .collect()
}

fn runs_from_text(text: &FormattedText) -> Vec<BylineRun> {
    if text.runs.is_empty() {
        // simpleText bylines are bullet-joined
        return text
            .simple_text
            .as_deref()
            .map(split_on_bullet)
            .unwrap_or_default()
            .into_iter()
            .map(BylineRun::new)
            .collect();
    }
    text.runs.iter().map(byline_run).collect()
}

fn byline_run(run: &TextRun) -> BylineRun {
    BylineRun {
        text: run.text.clone(),
        navigation_endpoint: run.navigation_endpoint.clone(),
    }
}

/// Split a full byline on the bullet character, trimming each part
pub fn split_on_bullet(text: &str) -> Vec<String> {
    text.split(BULLET)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn sorted_thumbnails(mut thumbnails: Vec<Thumbnail>) -> Vec<Thumbnail> {
    thumbnails.sort_by_key(|t| (t.width, t.height));
    thumbnails
}

/// Regenerate the fixed size ladder from one discovered image URL
///
/// The embedded `=wNN-hNN...` suffix is stripped and re-applied for each size.
pub fn thumbnail_ladder(url: &str) -> Vec<Thumbnail> {
    let base = SIZE_SUFFIX.replace(url.trim(), "");
    if base.is_empty() {
        return Vec::new();
    }
    THUMBNAIL_SIZES
        .iter()
        .map(|&size| Thumbnail::square(format!("{base}=w{size}-h{size}-l90-rj"), size))
        .collect()
}

type PayloadIdLookup = fn(&ResponsiveListItemRenderer) -> Option<String>;

/// Id lookups for shape B, tried in order
const RESPONSIVE_ID_STRATEGIES: &[(&str, PayloadIdLookup)] = &[
    ("videoId", |r| r.video_id.clone()),
    ("playlistItemData", |r| {
        r.playlist_item_data.as_ref().and_then(|d| d.video_id.clone())
    }),
    ("navigationEndpoint", |r| {
        r.navigation_endpoint.as_ref().and_then(watch_video_id)
    }),
];

fn responsive_id(renderer: &ResponsiveListItemRenderer) -> Option<String> {
    RESPONSIVE_ID_STRATEGIES.iter().find_map(|(name, lookup)| {
        let id = lookup(renderer).filter(|id| !id.trim().is_empty())?;
        tracing::trace!(strategy = name, id = %id, "Resolved responsive item id");
        Some(id)
    })
}

/// Shape A → canonical
pub fn normalize_panel(renderer: PanelVideoRenderer) -> Option<TrackRecord> {
    let id = renderer
        .video_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .or_else(|| renderer.navigation_endpoint.as_ref().and_then(watch_video_id))?;

    let title = first_populated([renderer.title.as_ref().and_then(FormattedText::first_text)])
        .unwrap_or_default()
        .to_string();

    let byline_runs = renderer
        .long_byline_text
        .as_ref()
        .map(runs_from_text)
        .map(clean_byline_runs)
        .unwrap_or_default();

    let duration = first_populated([renderer.length_text.as_ref().and_then(FormattedText::first_text)])
        .unwrap_or(DEFAULT_DURATION)
        .to_string();

    let navigation_ref = renderer
        .navigation_endpoint
        .clone()
        .unwrap_or_else(|| watch_endpoint(&id));

    Some(TrackRecord {
        title_text: title,
        byline_runs,
        thumbnail_variants: sorted_thumbnails(
            renderer.thumbnail.map(|t| t.thumbnails).unwrap_or_default(),
        ),
        duration_text: duration,
        navigation_ref,
        selected: false,
        provenance: Provenance::Original,
        passthrough: renderer.extra,
        id,
    })
}

/// Shape B → canonical
pub fn normalize_responsive(renderer: ResponsiveListItemRenderer) -> Option<TrackRecord> {
    let Some(id) = responsive_id(&renderer) else {
        tracing::warn!("Transformation failed: responsive item has no video id");
        return None;
    };

    let title = first_populated([renderer.flex_column(0).and_then(FormattedText::first_text)])
        .unwrap_or_default()
        .to_string();

    let byline_runs = renderer
        .flex_column(1)
        .map(runs_from_text)
        .map(clean_byline_runs)
        .unwrap_or_default();

    let duration = first_populated([renderer.fixed_column(0).and_then(FormattedText::first_text)])
        .unwrap_or(DEFAULT_DURATION)
        .to_string();

    let navigation_ref = renderer
        .navigation_endpoint
        .clone()
        .unwrap_or_else(|| watch_endpoint(&id));

    let mut passthrough = serde_json::Map::new();
    if let Some(menu) = renderer.menu.clone() {
        passthrough.insert("menu".into(), menu);
    }
    if let Some(tracking) = renderer.tracking_params.clone() {
        passthrough.insert("trackingParams".into(), tracking);
    }

    Some(TrackRecord {
        title_text: title,
        byline_runs,
        thumbnail_variants: sorted_thumbnails(renderer.thumbnails()),
        duration_text: duration,
        navigation_ref,
        selected: false,
        provenance: Provenance::Transformed,
        passthrough,
        id,
    })
}

/// Markup reconstruction → canonical
pub fn normalize_dom(item: DomItem) -> Option<TrackRecord> {
    let id = item.id.filter(|id| !id.trim().is_empty())?;

    let byline_runs = clean_byline_runs(item.byline_fragments.into_iter().map(BylineRun::new));

    let thumbnail_variants = item
        .thumbnail_url
        .as_deref()
        .map(thumbnail_ladder)
        .unwrap_or_default();

    let duration = first_populated([item.duration_text.as_deref()])
        .unwrap_or(DEFAULT_DURATION)
        .to_string();

    Some(TrackRecord {
        title_text: item.title_text.trim().to_string(),
        byline_runs,
        thumbnail_variants,
        duration_text: duration,
        navigation_ref: watch_endpoint(&id),
        selected: false,
        provenance: Provenance::Reconstructed,
        passthrough: serde_json::Map::new(),
        id,
    })
}

/// Normalise a raw attached payload, if it has a known shape
pub fn normalize_payload(value: &Value) -> Option<TrackRecord> {
    RendererPayload::from_value(value)
        .map(UpstreamShape::from)
        .and_then(UpstreamShape::normalize)
}
