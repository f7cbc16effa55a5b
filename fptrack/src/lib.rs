//! Track records for FilterPlay
//!
//! This crate turns the playlist entries of a music web client into canonical
//! [`TrackRecord`]s and filters them.
//!
//! # Features
//!
//! - **Upstream shapes**: `playlistPanelVideoRenderer` and
//!   `musicResponsiveListItemRenderer` payloads ([`shapes`])
//! - **Normalisation**: one function per shape, producing the same record for the
//!   same track ([`normalize`])
//! - **Extraction**: best-effort reading of an HTML snapshot of the playlist,
//!   payload first, rendered markup second ([`extract`])
//! - **Filtering**: comma-separated OR substring queries ([`filter`])
//!
//! # Example
//!
//! ```no_run
//! use fptrack::{extract_from_html, filter_records, FilterQuery};
//!
//! let html = std::fs::read_to_string("playlist.html").unwrap();
//! let records = extract_from_html(&html);
//! let query = FilterQuery::parse("drake, beyonce");
//! for record in filter_records(&records, &query) {
//!     println!("{} - {}", record.id, record.title_text);
//! }
//! ```
//!
//! Records are plain owned values: nothing keeps a reference to the snapshot
//! they were read from.

pub mod error;
pub mod extract;
pub mod filter;
pub mod model;
pub mod normalize;
pub mod shapes;
pub mod trigger;

// Re-exports
pub use error::{Error, Result};
pub use extract::{extract_from_document, extract_from_html, try_extract_from_html};
pub use filter::{filter_records, matches, searchable_text, FilterQuery};
pub use model::{BylineRun, Provenance, Thumbnail, TrackRecord, DEFAULT_DURATION};
pub use normalize::{DomItem, UpstreamShape};
pub use shapes::RendererPayload;
pub use trigger::{prepare_trigger, TriggerEvent};
