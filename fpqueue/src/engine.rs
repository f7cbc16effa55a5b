//! Queue Replacement Engine
//!
//! Holds at most one [`InterceptSession`] and rewrites continuation responses
//! from it. Starting a session is an atomic swap of the current slot and re-arms
//! the expiry task; the expiry task only clears the session it was armed for.

use crate::error::Result;
use crate::event::{parse_trigger, ValidTrigger};
use crate::session::{InterceptSession, SessionStatus};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default lifetime of a session
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30);

/// Batch size used when the original item list is empty or unreadable
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Layouts holding the queue item list, in priority order
pub const QUEUE_LIST_POINTERS: [&str; 2] = [
    "/contents/twoColumnWatchNextResults/playlist/playlist",
    "/contents/singleColumnMusicWatchNextResultsRenderer/tabbedRenderer/watchNextTabbedResultsRenderer/tabs/0/tabRenderer/content/musicQueueRenderer/content/playlistPanelRenderer",
];

/// Engine tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub session_ttl: Duration,
    pub default_batch_size: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
            default_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Result of a trigger
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum TriggerOutcome {
    #[serde(rename_all = "camelCase")]
    Started {
        generation: u64,
        target_id: String,
        queue_len: usize,
    },
    /// The payload was invalid; any previous session has been cleared
    Rejected { reason: String },
}

/// What happened to one intercepted body
#[derive(Debug, Clone, PartialEq)]
pub enum Rewrite {
    /// Body must be returned untouched
    Unchanged,
    /// Body was replaced
    Replaced { body: Value, emitted: usize, exhausted: bool },
}

#[derive(Default)]
struct Slot {
    session: Option<Arc<InterceptSession>>,
    expiry: Option<JoinHandle<()>>,
}

struct EngineInner {
    options: EngineOptions,
    slot: Mutex<Slot>,
    generation: AtomicU64,
}

/// Owner of the single interception session
///
/// Cheap to clone; clones share the same session slot.
#[derive(Clone)]
pub struct QueueEngine {
    inner: Arc<EngineInner>,
}

impl Default for QueueEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl std::fmt::Debug for QueueEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEngine")
            .field("options", &self.inner.options)
            .field("status", &self.status())
            .finish()
    }
}

impl QueueEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                options,
                slot: Mutex::new(Slot::default()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn options(&self) -> EngineOptions {
        self.inner.options
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current open session, if any
    pub fn current(&self) -> Option<Arc<InterceptSession>> {
        self.lock_slot()
            .session
            .clone()
            .filter(|session| !session.is_closed())
    }

    pub fn is_active(&self) -> bool {
        self.current().is_some()
    }

    pub fn status(&self) -> SessionStatus {
        self.current()
            .map(|session| session.status())
            .unwrap_or_default()
    }

    /// Handle a raw trigger payload
    ///
    /// Must be called from within a tokio runtime (the expiry task is spawned).
    pub fn handle_trigger(&self, payload: Value) -> TriggerOutcome {
        match parse_trigger(payload) {
            Ok(trigger) => self.start(trigger),
            Err(e) => {
                tracing::warn!("{}", e);
                self.clear("invalid trigger");
                TriggerOutcome::Rejected {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Install a new session, replacing any existing one
    pub fn start(&self, trigger: ValidTrigger) -> TriggerOutcome {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let queue_len = trigger.queue.len();
        let session = Arc::new(InterceptSession::new(
            generation,
            trigger.target_id.clone(),
            trigger.queue,
        ));

        let expiry = self.spawn_expiry(generation);
        let previous = {
            let mut slot = self.lock_slot();
            if let Some(handle) = slot.expiry.replace(expiry) {
                handle.abort();
            }
            slot.session.replace(session)
        };

        if let Some(previous) = previous {
            // an in-flight rewrite of the old session still completes on its snapshot
            tracing::debug!(
                "Session #{} replaced at cursor {}/{}",
                previous.generation(),
                previous.cursor(),
                previous.queue().len()
            );
        }

        tracing::info!(
            "Filtered playback session #{} started for {} ({} records)",
            generation,
            trigger.target_id,
            queue_len
        );

        TriggerOutcome::Started {
            generation,
            target_id: trigger.target_id,
            queue_len,
        }
    }

    fn spawn_expiry(&self, generation: u64) -> JoinHandle<()> {
        let engine: Weak<EngineInner> = Arc::downgrade(&self.inner);
        let ttl = self.inner.options.session_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = engine.upgrade() {
                QueueEngine { inner }.expire(generation);
            }
        })
    }

    fn expire(&self, generation: u64) {
        let mut slot = self.lock_slot();
        let current = slot.session.as_ref().map(|s| s.generation());
        if current != Some(generation) {
            return;
        }
        if let Some(session) = slot.session.take() {
            session.close();
        }
        // running from the expiry task itself: detach rather than abort
        slot.expiry.take();
        tracing::debug!("Session #{} expired", generation);
    }

    /// Terminate the current session, whatever it is
    pub fn clear(&self, reason: &str) {
        let mut slot = self.lock_slot();
        if let Some(handle) = slot.expiry.take() {
            handle.abort();
        }
        if let Some(session) = slot.session.take() {
            session.close();
            tracing::debug!("Session #{} cleared: {}", session.generation(), reason);
        }
    }

    /// Terminate the session only if it is still `generation`
    pub fn clear_if_current(&self, generation: u64, reason: &str) {
        let mut slot = self.lock_slot();
        let is_current = slot
            .session
            .as_ref()
            .is_some_and(|s| s.generation() == generation);
        if !is_current {
            return;
        }
        if let Some(handle) = slot.expiry.take() {
            handle.abort();
        }
        if let Some(session) = slot.session.take() {
            session.close();
        }
        tracing::debug!("Session #{} ended: {}", generation, reason);
    }

    /// Rewrite a continuation body from `session`
    ///
    /// Unchanged when no known layout holds a `contents` field or when the
    /// session closed meanwhile. Errors (unparsable body) terminate the session.
    pub fn rewrite_body(&self, session: &InterceptSession, body: &[u8]) -> Result<Rewrite> {
        let result = self.try_rewrite(session, body);
        match &result {
            Ok(Rewrite::Replaced { exhausted: true, .. }) => {
                self.clear_if_current(session.generation(), "queue finished")
            }
            Err(e) => {
                tracing::warn!("Rewrite failed under session #{}: {}", session.generation(), e);
                session.close();
                self.clear_if_current(session.generation(), "error while rewriting");
            }
            _ => {}
        }
        result
    }

    fn try_rewrite(&self, session: &InterceptSession, body: &[u8]) -> Result<Rewrite> {
        let mut document: Value = serde_json::from_slice(body)?;

        let Some(container) = locate_queue_list(&mut document) else {
            tracing::debug!("No queue list in continuation response, passing through");
            return Ok(Rewrite::Unchanged);
        };

        let size = batch_size(container, self.inner.options.default_batch_size);
        let Some(batch) = session.next_batch(size) else {
            tracing::debug!("Session #{} closed before rewrite", session.generation());
            return Ok(Rewrite::Unchanged);
        };

        let emitted = batch.items.len();
        container.insert("contents".into(), Value::Array(batch.items));
        if batch.exhausted {
            if let Some(continuations) = container.get_mut("continuations") {
                *continuations = Value::Array(Vec::new());
            }
        }

        tracing::debug!(
            "Session #{}: emitted {} records ({} -> {} of {}){}",
            session.generation(),
            emitted,
            batch.cursor_before,
            batch.cursor_after,
            session.queue().len(),
            if batch.exhausted { ", queue finished" } else { "" }
        );

        Ok(Rewrite::Replaced {
            body: document,
            emitted,
            exhausted: batch.exhausted,
        })
    }
}

/// First known layout whose container holds a `contents` field
pub fn locate_queue_list(document: &mut Value) -> Option<&mut serde_json::Map<String, Value>> {
    let pointer = QUEUE_LIST_POINTERS.iter().find(|pointer| {
        document
            .pointer(pointer)
            .and_then(Value::as_object)
            .is_some_and(|container| container.contains_key("contents"))
    })?;
    document.pointer_mut(pointer)?.as_object_mut()
}

/// Size of the original list, or `default` when it is empty or not a list
pub fn batch_size(container: &serde_json::Map<String, Value>, default: usize) -> usize {
    match container.get("contents").and_then(Value::as_array) {
        Some(items) if !items.is_empty() => items.len(),
        _ => default.max(1),
    }
}
