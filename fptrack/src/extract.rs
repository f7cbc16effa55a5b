//! Record Extractor
//!
//! Reads the playlist container of an HTML snapshot and produces one
//! [`TrackRecord`] per item, in visual order.
//!
//! Per item, the attached `data-payload` is tried first. When it holds no
//! usable renderer, the record is rebuilt from the rendered markup. Items for
//! which neither path yields an id are skipped with a warning.

use crate::error::{Error, Result};
use crate::model::TrackRecord;
use crate::normalize::{normalize_dom, normalize_payload, split_on_bullet, DomItem, BULLET_TEXT};
use crate::shapes::watch_video_id;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

/// Attribute holding element-attached JSON data
pub const PAYLOAD_ATTR: &str = "data-payload";

/// Attribute holding a navigation endpoint JSON
pub const ENDPOINT_ATTR: &str = "navigationendpoint";

/// Container of the playlist items
pub const CONTAINER_SELECTOR: &str = "ytmusic-playlist-shelf-renderer #contents";

/// Tag name of one playlist item
pub const ITEM_TAG: &str = "ytmusic-responsive-list-item-renderer";

/// Title containers, first match wins
const TITLE_SELECTORS: &[&str] = &[
    ".title-column .title",
    "yt-formatted-string.title",
    ".title",
];

/// Image elements, first match with a `src` wins
const THUMBNAIL_SELECTORS: &[&str] = &["ytmusic-thumbnail-renderer img#img", "img#img", "img"];

/// Attributes of the duration cell, first populated wins
const DURATION_ATTRS: &[&str] = &["title", "aria-label"];

/// Origin used to resolve relative links
const LINK_BASE: &str = "https://music.youtube.com/";

/// Compiled selectors used on every item
pub struct ItemSelectors {
    container: Selector,
    titles: Vec<Selector>,
    byline_region: Selector,
    byline_fragment: Selector,
    thumbnails: Vec<Selector>,
    duration: Selector,
    title_link: Selector,
    play_button: Selector,
    endpoint_holder: Selector,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Selector(format!("{css}: {e}")))
}

fn selectors(list: &[&str]) -> Result<Vec<Selector>> {
    list.iter().map(|css| selector(css)).collect()
}

impl ItemSelectors {
    pub fn new() -> Result<Self> {
        Ok(Self {
            container: selector(CONTAINER_SELECTOR)?,
            titles: selectors(TITLE_SELECTORS)?,
            byline_region: selector(".secondary-flex-columns")?,
            byline_fragment: selector("yt-formatted-string.flex-column")?,
            thumbnails: selectors(THUMBNAIL_SELECTORS)?,
            duration: selector(".fixed-columns yt-formatted-string")?,
            title_link: selector(".title-column a.yt-simple-endpoint, a.yt-simple-endpoint")?,
            play_button: selector("ytmusic-play-button-renderer")?,
            endpoint_holder: selector("[navigationendpoint], [data-payload]")?,
        })
    }
}

/// Visible text of an element, whitespace collapsed
fn element_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn json_attr(element: ElementRef, attr: &str) -> Option<Value> {
    let raw = element.value().attr(attr)?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Ignoring unreadable {} attribute: {}", attr, e);
            None
        }
    }
}

fn non_empty(id: Option<String>) -> Option<String> {
    id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())
}

/// `v` query parameter of a `watch?v=` link
pub fn video_id_from_href(href: &str) -> Option<String> {
    if !href.contains("watch?") {
        return None;
    }
    let url = Url::parse(LINK_BASE).ok()?.join(href).ok()?;
    let id = url
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned());
    non_empty(id)
}

type IdLookup = fn(&ItemSelectors, ElementRef) -> Option<String>;

/// Id lookups for markup reconstruction, tried in order
pub const ID_STRATEGIES: &[(&str, IdLookup)] = &[
    ("link-href", id_from_link),
    ("play-control", id_from_play_control),
    ("item-payload", id_from_item_payload),
    ("endpoint-descendant", id_from_endpoint_descendant),
];

fn id_from_link(sel: &ItemSelectors, item: ElementRef) -> Option<String> {
    item.select(&sel.title_link)
        .filter_map(|link| link.value().attr("href"))
        .find_map(video_id_from_href)
}

fn id_from_play_control(sel: &ItemSelectors, item: ElementRef) -> Option<String> {
    item.select(&sel.play_button)
        .filter_map(|button| json_attr(button, PAYLOAD_ATTR))
        .find_map(|payload| {
            payload
                .get("navigationEndpoint")
                .or_else(|| payload.get("playNavigationEndpoint"))
                .and_then(watch_video_id)
        })
}

fn id_from_item_payload(_: &ItemSelectors, item: ElementRef) -> Option<String> {
    let payload = json_attr(item, PAYLOAD_ATTR)?;
    let direct = payload.get("videoId").and_then(Value::as_str);
    // a renderer we could not read may still expose its id one level down
    let nested = || {
        payload
            .as_object()?
            .values()
            .find_map(|inner| inner.get("videoId").and_then(Value::as_str))
    };
    non_empty(direct.or_else(nested).map(str::to_string))
}

fn id_from_endpoint_descendant(sel: &ItemSelectors, item: ElementRef) -> Option<String> {
    item.select(&sel.endpoint_holder).find_map(|holder| {
        json_attr(holder, ENDPOINT_ATTR)
            .and_then(|endpoint| watch_video_id(&endpoint))
            .or_else(|| {
                json_attr(holder, PAYLOAD_ATTR)
                    .and_then(|payload| payload.get("navigationEndpoint").and_then(watch_video_id))
            })
    })
}

/// Run [`ID_STRATEGIES`] in order; first non-empty id wins
pub fn find_item_id(sel: &ItemSelectors, item: ElementRef) -> Option<String> {
    ID_STRATEGIES.iter().find_map(|(name, lookup)| {
        let id = non_empty(lookup(sel, item))?;
        tracing::trace!(strategy = name, id = %id, "Resolved item id from markup");
        Some(id)
    })
}

fn find_title(sel: &ItemSelectors, item: ElementRef) -> String {
    sel.titles
        .iter()
        .filter_map(|s| item.select(s).next())
        .map(element_text)
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

fn find_byline(sel: &ItemSelectors, item: ElementRef) -> Vec<String> {
    let Some(region) = item.select(&sel.byline_region).next() else {
        return Vec::new();
    };

    let fragments: Vec<String> = region
        .select(&sel.byline_fragment)
        .map(element_text)
        .filter(|text| !text.is_empty() && text != BULLET_TEXT)
        .collect();

    if fragments.len() > 1 {
        fragments
    } else {
        split_on_bullet(&element_text(region))
    }
}

fn find_thumbnail(sel: &ItemSelectors, item: ElementRef) -> Option<String> {
    sel.thumbnails.iter().find_map(|s| {
        item.select(s)
            .filter_map(|img| img.value().attr("src"))
            .map(str::trim)
            .find(|src| !src.is_empty())
            .map(str::to_string)
    })
}

fn find_duration(sel: &ItemSelectors, item: ElementRef) -> Option<String> {
    let cell = item.select(&sel.duration).next()?;
    DURATION_ATTRS
        .iter()
        .filter_map(|attr| cell.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| Some(element_text(cell)).filter(|text| !text.is_empty()))
}

/// Rebuild an item from its markup only
pub fn reconstruct_item(sel: &ItemSelectors, item: ElementRef) -> DomItem {
    DomItem {
        id: find_item_id(sel, item),
        title_text: find_title(sel, item),
        byline_fragments: find_byline(sel, item),
        thumbnail_url: find_thumbnail(sel, item),
        duration_text: find_duration(sel, item),
    }
}

/// Extract one item: attached payload first, markup second
pub fn extract_item(sel: &ItemSelectors, item: ElementRef) -> Option<TrackRecord> {
    if let Some(record) = json_attr(item, PAYLOAD_ATTR).and_then(|p| normalize_payload(&p)) {
        return Some(record);
    }
    normalize_dom(reconstruct_item(sel, item))
}

/// Extract every item of an already parsed document
pub fn extract_from_document(document: &Html) -> Result<Vec<TrackRecord>> {
    let sel = ItemSelectors::new()?;

    let container = document
        .select(&sel.container)
        .next()
        .ok_or_else(|| Error::extraction("no playlist container"))?;

    let items = container
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == ITEM_TAG);

    let mut records = Vec::new();
    for (index, item) in items.enumerate() {
        match extract_item(&sel, item) {
            Some(record) => records.push(record),
            None => tracing::warn!("Skipping playlist item #{}: no usable id", index),
        }
    }

    if records.is_empty() {
        return Err(Error::extraction("no extractable items"));
    }

    tracing::debug!("Extracted {} records", records.len());
    Ok(records)
}

/// Extract every item of an HTML snapshot, reporting failures
pub fn try_extract_from_html(html: &str) -> Result<Vec<TrackRecord>> {
    extract_from_document(&Html::parse_document(html))
}

/// Extract every item of an HTML snapshot
///
/// Never fails: extraction failures are logged and yield an empty list.
pub fn extract_from_html(html: &str) -> Vec<TrackRecord> {
    try_extract_from_html(html).unwrap_or_else(|e| {
        tracing::warn!("{}", e);
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Provenance;

    fn wrap(items: &str) -> String {
        format!(
            r#"<html><body><ytmusic-playlist-shelf-renderer><div id="contents">{items}</div></ytmusic-playlist-shelf-renderer></body></html>"#
        )
    }

    fn first_item(html: &str) -> (Html, ItemSelectors) {
        (Html::parse_document(html), ItemSelectors::new().unwrap())
    }

    fn item_of<'a>(doc: &'a Html) -> ElementRef<'a> {
        let s = Selector::parse(ITEM_TAG).unwrap();
        doc.select(&s).next().unwrap()
    }

    #[test]
    fn test_selectors_compile() {
        assert!(ItemSelectors::new().is_ok());
    }

    #[test]
    fn test_video_id_from_href() {
        assert_eq!(
            video_id_from_href("watch?v=abc&list=PL1"),
            Some("abc".to_string())
        );
        assert_eq!(
            video_id_from_href("https://music.youtube.com/watch?list=PL1&v=xyz"),
            Some("xyz".to_string())
        );
        assert_eq!(video_id_from_href("browse/UC123"), None);
        assert_eq!(video_id_from_href("watch?list=PL1"), None);
    }

    #[test]
    fn test_id_strategy_priority() {
        let html = wrap(
            r#"<ytmusic-responsive-list-item-renderer data-payload='{"videoId":"from-item"}'>
                 <ytmusic-play-button-renderer data-payload='{"navigationEndpoint":{"watchEndpoint":{"videoId":"from-play"}}}'></ytmusic-play-button-renderer>
                 <div class="title-column"><a class="yt-simple-endpoint" href="watch?v=from-link">x</a></div>
               </ytmusic-responsive-list-item-renderer>"#,
        );
        let (doc, sel) = first_item(&html);
        assert_eq!(find_item_id(&sel, item_of(&doc)), Some("from-link".into()));
    }

    #[test]
    fn test_id_each_strategy_alone() {
        let cases = [
            (
                r#"<ytmusic-play-button-renderer data-payload='{"navigationEndpoint":{"watchEndpoint":{"videoId":"p"}}}'></ytmusic-play-button-renderer>"#,
                "",
                "p",
            ),
            ("", r#" data-payload='{"videoId":"i"}'"#, "i"),
            (
                r#"<span navigationendpoint='{"watchEndpoint":{"videoId":"n"}}'></span>"#,
                "",
                "n",
            ),
        ];
        for (inner, attrs, expected) in cases {
            let html = wrap(&format!(
                "<ytmusic-responsive-list-item-renderer{attrs}>{inner}</ytmusic-responsive-list-item-renderer>"
            ));
            let (doc, sel) = first_item(&html);
            assert_eq!(find_item_id(&sel, item_of(&doc)).as_deref(), Some(expected));
        }
    }

    #[test]
    fn test_reconstruct_item_fields() {
        let html = wrap(
            r#"<ytmusic-responsive-list-item-renderer>
                 <ytmusic-thumbnail-renderer><img id="img" src="https://lh3/abc=w60-h60-l90-rj"></ytmusic-thumbnail-renderer>
                 <div class="title-column"><yt-formatted-string class="title"><a class="yt-simple-endpoint" href="watch?v=v1">  Song   One </a></yt-formatted-string></div>
                 <div class="secondary-flex-columns">
                   <yt-formatted-string class="flex-column">Artist</yt-formatted-string>
                   <yt-formatted-string class="flex-column">•</yt-formatted-string>
                   <yt-formatted-string class="flex-column">Album</yt-formatted-string>
                 </div>
                 <div class="fixed-columns"><yt-formatted-string title="3:45">3:45</yt-formatted-string></div>
               </ytmusic-responsive-list-item-renderer>"#,
        );
        let (doc, sel) = first_item(&html);
        let item = reconstruct_item(&sel, item_of(&doc));
        assert_eq!(item.id.as_deref(), Some("v1"));
        assert_eq!(item.title_text, "Song One");
        assert_eq!(item.byline_fragments, vec!["Artist", "Album"]);
        assert_eq!(item.thumbnail_url.as_deref(), Some("https://lh3/abc=w60-h60-l90-rj"));
        assert_eq!(item.duration_text.as_deref(), Some("3:45"));
    }

    #[test]
    fn test_formatted_title_preferred_over_other_title_class() {
        let html = wrap(
            r#"<ytmusic-responsive-list-item-renderer>
                 <span class="badge title">Explicit</span>
                 <yt-formatted-string class="title">Real Title</yt-formatted-string>
               </ytmusic-responsive-list-item-renderer>"#,
        );
        let (doc, sel) = first_item(&html);
        assert_eq!(find_title(&sel, item_of(&doc)), "Real Title");
    }

    #[test]
    fn test_single_fragment_byline_is_split() {
        let html = wrap(
            r#"<ytmusic-responsive-list-item-renderer>
                 <div class="secondary-flex-columns"><yt-formatted-string class="flex-column">Artist • Album • 2019</yt-formatted-string></div>
               </ytmusic-responsive-list-item-renderer>"#,
        );
        let (doc, sel) = first_item(&html);
        assert_eq!(
            find_byline(&sel, item_of(&doc)),
            vec!["Artist", "Album", "2019"]
        );
    }

    #[test]
    fn test_payload_preferred_over_markup() {
        let html = wrap(
            r#"<ytmusic-responsive-list-item-renderer data-payload='{"playlistPanelVideoRenderer":{"videoId":"pay","title":{"runs":[{"text":"From payload"}]}}}'>
                 <div class="title-column"><a class="yt-simple-endpoint title" href="watch?v=dom">From markup</a></div>
               </ytmusic-responsive-list-item-renderer>"#,
        );
        let records = try_extract_from_html(&html).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "pay");
        assert_eq!(records[0].title_text, "From payload");
        assert_eq!(records[0].provenance, Provenance::Original);
    }

    #[test]
    fn test_items_without_id_are_skipped_in_order() {
        let html = wrap(
            r#"<ytmusic-responsive-list-item-renderer><a class="yt-simple-endpoint" href="watch?v=a">A</a></ytmusic-responsive-list-item-renderer>
               <ytmusic-responsive-list-item-renderer><span class="title">orphan</span></ytmusic-responsive-list-item-renderer>
               <ytmusic-responsive-list-item-renderer><a class="yt-simple-endpoint" href="watch?v=c">C</a></ytmusic-responsive-list-item-renderer>"#,
        );
        let ids: Vec<String> = extract_from_html(&html).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_missing_container() {
        assert!(matches!(
            try_extract_from_html("<html><body><p>nothing</p></body></html>"),
            Err(Error::Extraction(_))
        ));
        assert!(extract_from_html("").is_empty());
    }

    #[test]
    fn test_empty_container() {
        assert!(matches!(
            try_extract_from_html(&wrap("")),
            Err(Error::Extraction(_))
        ));
    }

    #[test]
    fn test_duration_defaults() {
        let html = wrap(
            r#"<ytmusic-responsive-list-item-renderer><a class="yt-simple-endpoint" href="watch?v=a">A</a></ytmusic-responsive-list-item-renderer>"#,
        );
        let records = extract_from_html(&html);
        assert_eq!(records[0].duration_text, "0:00");
        assert!(records[0].thumbnail_variants.is_empty());
    }
}
