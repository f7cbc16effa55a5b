//! Filter Predicate Engine
//!
//! A query is a comma-separated list of terms. A record matches when any term
//! is a substring of its searchable text (title then byline fragments,
//! lowercase, whitespace collapsed). An empty query matches everything.

use crate::model::TrackRecord;
use serde::{Deserialize, Serialize};

/// Parsed filter query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterQuery {
    /// Lowercase, trimmed, non-empty, no duplicates, in input order
    terms: Vec<String>,
}

impl FilterQuery {
    /// Parse a raw query string
    pub fn parse(raw: &str) -> Self {
        let mut terms: Vec<String> = Vec::new();
        for term in raw.split(',') {
            let term = collapse_whitespace(&term.to_lowercase());
            if !term.is_empty() && !terms.contains(&term) {
                terms.push(term);
            }
        }
        Self { terms }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// An empty query matches every record
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, record: &TrackRecord) -> bool {
        matches(record, self)
    }
}

impl From<&str> for FilterQuery {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text a query is matched against
pub fn searchable_text(record: &TrackRecord) -> String {
    let parts = std::iter::once(record.title_text.as_str())
        .chain(record.byline_runs.iter().map(|run| run.text.as_str()));
    collapse_whitespace(&parts.collect::<Vec<_>>().join(" ").to_lowercase())
}

/// Whether `record` satisfies `query`
pub fn matches(record: &TrackRecord, query: &FilterQuery) -> bool {
    if query.is_empty() {
        return true;
    }
    let text = searchable_text(record);
    query.terms.iter().any(|term| text.contains(term.as_str()))
}

/// Copies of the matching records, order preserved
pub fn filter_records<'a, I>(records: I, query: &FilterQuery) -> Vec<TrackRecord>
where
    I: IntoIterator<Item = &'a TrackRecord>,
{
    records
        .into_iter()
        .filter(|record| matches(record, query))
        .cloned()
        .collect()
}
