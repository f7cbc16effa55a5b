//! Intercept sessions
//!
//! A session owns an immutable [`FilteredQueue`] and a cursor. Batches are
//! drawn under the session's own lock, so two rewrites never tear the cursor,
//! and a rewrite that snapshotted a session keeps working on that session even
//! if it has been replaced meanwhile.

use fptrack::TrackRecord;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Filtered records captured when playback started; never mutated
#[derive(Debug, Clone)]
pub struct FilteredQueue {
    records: Arc<[TrackRecord]>,
}

impl FilteredQueue {
    pub fn new(records: Vec<TrackRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrackRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackRecord> {
        self.records.iter()
    }
}

/// Items emitted for one intercepted response
#[derive(Debug, Clone)]
pub struct Batch {
    /// Rendered `playlistPanelVideoRenderer` items, independent copies
    pub items: Vec<Value>,
    pub cursor_before: usize,
    /// `cursor_before + items.len() + skipped`
    pub cursor_after: usize,
    /// Records passed over because they could not be rendered
    pub skipped: usize,
    /// The queue has been fully emitted; the session is now closed
    pub exhausted: bool,
}

#[derive(Debug)]
struct Progress {
    cursor: usize,
    emitted: usize,
}

/// State of one interception session
#[derive(Debug)]
pub struct InterceptSession {
    generation: u64,
    target_id: String,
    queue: FilteredQueue,
    progress: Mutex<Progress>,
    closed: AtomicBool,
}

impl InterceptSession {
    pub fn new(generation: u64, target_id: impl Into<String>, queue: FilteredQueue) -> Self {
        Self {
            generation,
            target_id: target_id.into(),
            queue,
            progress: Mutex::new(Progress {
                cursor: 0,
                emitted: 0,
            }),
            closed: AtomicBool::new(false),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn queue(&self) -> &FilteredQueue {
        &self.queue
    }

    fn lock_progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cursor(&self) -> usize {
        self.lock_progress().cursor
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop emitting from this session; further batches return `None`
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Draw up to `size` rendered records starting at the cursor
    ///
    /// The first record ever emitted is marked selected. Records that cannot
    /// be rendered are skipped and the batch continues with the remainder, so
    /// a batch is only short when the queue runs out. Returns `None` once the
    /// session is closed.
    pub fn next_batch(&self, size: usize) -> Option<Batch> {
        let mut progress = self.lock_progress();
        if self.is_closed() {
            return None;
        }

        let cursor_before = progress.cursor;
        let remaining = self.queue.len().saturating_sub(cursor_before);
        let mut items = Vec::with_capacity(size.min(remaining));
        let mut skipped = 0;

        while items.len() < size {
            let Some(record) = self.queue.get(progress.cursor) else {
                break;
            };
            let mut copy = record.clone();
            copy.selected = progress.emitted == 0;
            match copy.to_panel_item() {
                Ok(item) => {
                    items.push(item);
                    progress.emitted += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Skipping queued record #{} ({:?}): {}",
                        progress.cursor,
                        record.id,
                        e
                    );
                    skipped += 1;
                }
            }
            progress.cursor += 1;
        }

        let exhausted = progress.cursor >= self.queue.len();
        if exhausted {
            self.close();
        }

        Some(Batch {
            items,
            cursor_before,
            cursor_after: progress.cursor,
            skipped,
            exhausted,
        })
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            active: !self.is_closed(),
            generation: self.generation,
            target_id: Some(self.target_id.clone()),
            cursor: self.cursor(),
            queue_len: self.queue.len(),
        }
    }
}

/// Snapshot of the current session, for diagnostics
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub active: bool,
    pub generation: u64,
    pub target_id: Option<String>,
    pub cursor: usize,
    pub queue_len: usize,
}
