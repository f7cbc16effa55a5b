//! Play trigger payload
//!
//! The UI layer packages the user's chosen item and the filtered record set
//! into a [`TriggerEvent`] before starting playback.

use crate::extract::try_extract_from_html;
use crate::error::{Error, Result};
use crate::filter::{filter_records, FilterQuery};
use crate::model::TrackRecord;
use serde::{Deserialize, Serialize};

/// `{ targetId, filteredRecords }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    pub target_id: String,
    pub filtered_records: Vec<TrackRecord>,
}

impl TriggerEvent {
    pub fn new(target_id: impl Into<String>, filtered_records: Vec<TrackRecord>) -> Self {
        Self {
            target_id: target_id.into(),
            filtered_records,
        }
    }
}

/// Extract the playlist of `html`, filter it with `query` and package it for `target_id`
///
/// Returns `Ok(None)` when there is nothing to hand over: `query` has no term
/// (native playback applies) or no record matches it. Fails when nothing
/// could be extracted or `target_id` is blank.
pub fn prepare_trigger(html: &str, query: &str, target_id: &str) -> Result<Option<TriggerEvent>> {
    let target_id = target_id.trim();
    if target_id.is_empty() {
        return Err(Error::MissingId);
    }

    let query = FilterQuery::parse(query);
    if query.is_empty() {
        tracing::debug!("No active filter, play of {} left to the host", target_id);
        return Ok(None);
    }

    let records = try_extract_from_html(html)?;
    let filtered = filter_records(&records, &query);
    if filtered.is_empty() {
        tracing::info!(
            "No record out of {} matches {:?}, play of {} left to the host",
            records.len(),
            query.terms(),
            target_id
        );
        return Ok(None);
    }

    tracing::info!(
        "Prepared trigger for {}: {}/{} records match {:?}",
        target_id,
        filtered.len(),
        records.len(),
        query.terms()
    );
    Ok(Some(TriggerEvent::new(target_id, filtered)))
}
