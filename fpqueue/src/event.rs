//! Trigger event validation
//!
//! A trigger is accepted only when it deserializes as
//! `{ targetId, filteredRecords }`, the target is non-blank and at least one
//! record has an id. Records without an id are dropped here so that every
//! queued record can be emitted.

use crate::error::{Error, Result};
use crate::session::FilteredQueue;
use fptrack::normalize::clean_byline_runs;
use fptrack::{TrackRecord, TriggerEvent};
use serde_json::Value;

/// A validated trigger, ready to become a session
#[derive(Debug, Clone)]
pub struct ValidTrigger {
    pub target_id: String,
    pub queue: FilteredQueue,
}

fn sanitize(mut record: TrackRecord) -> TrackRecord {
    record.id = record.id.trim().to_string();
    record.byline_runs = clean_byline_runs(std::mem::take(&mut record.byline_runs));
    record.selected = false;
    record
}

/// Validate an already typed event
pub fn validate(event: TriggerEvent) -> Result<ValidTrigger> {
    let target_id = event.target_id.trim().to_string();
    if target_id.is_empty() {
        return Err(Error::invalid_trigger("empty targetId"));
    }

    let total = event.filtered_records.len();
    let records: Vec<TrackRecord> = event
        .filtered_records
        .into_iter()
        .filter(TrackRecord::has_id)
        .map(sanitize)
        .collect();

    if records.len() < total {
        tracing::warn!(
            "Dropped {} trigger records without id",
            total - records.len()
        );
    }
    if records.is_empty() {
        return Err(Error::invalid_trigger("no usable record"));
    }

    if !records.iter().any(|r| r.id == target_id) {
        tracing::debug!("Target {} is not part of the filtered queue", target_id);
    }

    Ok(ValidTrigger {
        target_id,
        queue: FilteredQueue::new(records),
    })
}

/// Validate a raw JSON trigger payload
pub fn parse_trigger(payload: Value) -> Result<ValidTrigger> {
    let event: TriggerEvent =
        serde_json::from_value(payload).map_err(|e| Error::invalid_trigger(e.to_string()))?;
    validate(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_trigger() {
        let trigger = parse_trigger(json!({
            "targetId": " v1 ",
            "filteredRecords": [
                { "id": "v1", "titleText": "One", "selected": true },
                { "id": "v2", "bylineRuns": [{ "text": "A" }, { "text": "•" }, { "text": "A" }] }
            ]
        }))
        .unwrap();

        assert_eq!(trigger.target_id, "v1");
        assert_eq!(trigger.queue.len(), 2);
        assert!(!trigger.queue.get(0).unwrap().selected);
        assert_eq!(trigger.queue.get(1).unwrap().byline_runs.len(), 1);
    }

    #[test]
    fn test_invalid_shapes() {
        let payloads = [
            json!(null),
            json!("v1"),
            json!({ "targetId": "v1" }),
            json!({ "filteredRecords": [{ "id": "v1" }] }),
            json!({ "targetId": "v1", "filteredRecords": {} }),
            json!({ "targetId": 3, "filteredRecords": [{ "id": "v1" }] }),
        ];
        for payload in payloads {
            assert!(
                matches!(parse_trigger(payload.clone()), Err(Error::InvalidTrigger(_))),
                "{payload} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_records_rejected() {
        assert!(parse_trigger(json!({ "targetId": "v1", "filteredRecords": [] })).is_err());
        assert!(parse_trigger(json!({ "targetId": "", "filteredRecords": [{ "id": "v1" }] })).is_err());
    }

    #[test]
    fn test_records_without_id_are_dropped() {
        let trigger = parse_trigger(json!({
            "targetId": "v1",
            "filteredRecords": [{ "id": "" }, { "id": "v1" }, { "id": "  " }]
        }))
        .unwrap();
        assert_eq!(trigger.queue.len(), 1);

        assert!(parse_trigger(json!({
            "targetId": "v1",
            "filteredRecords": [{ "id": "" }]
        }))
        .is_err());
    }
}
