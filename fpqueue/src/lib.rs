//! Queue replacement for FilterPlay
//!
//! When the user starts playback from a filtered playlist, the host keeps
//! asking its `youtubei/v1/next` endpoint for the following items. This crate
//! answers those calls from the filtered queue instead, one batch at a time,
//! keeping the host's pagination contract: same batch size as the original
//! page, the first item of the first batch selected, continuations removed
//! once the queue is exhausted.
//!
//! # Components
//!
//! - [`event`]: validation of the trigger payload
//! - [`session`]: immutable filtered queue and its cursor
//! - [`engine`]: the single session slot, expiry task and body rewriting
//! - [`interceptor`]: the hook the proxy calls for every request
//!
//! # Example
//!
//! ```no_run
//! use fpqueue::{Interceptor, QueueEngine, Upstream};
//! use std::sync::Arc;
//!
//! # async fn run(upstream: Arc<dyn Upstream>) {
//! let engine = QueueEngine::default();
//! engine.handle_trigger(serde_json::json!({
//!     "targetId": "v1",
//!     "filteredRecords": [{ "id": "v1" }, { "id": "v2" }]
//! }));
//! let interceptor = Interceptor::new(engine, upstream);
//! # }
//! ```

pub mod config_ext;
pub mod engine;
pub mod error;
pub mod event;
pub mod interceptor;
pub mod session;

// Re-exports
pub use config_ext::QueueConfigExt;
pub use engine::{EngineOptions, QueueEngine, Rewrite, TriggerOutcome};
pub use error::{Error, Result};
pub use event::{parse_trigger, ValidTrigger};
pub use interceptor::{
    classify, CallClass, Interceptor, ProxyBody, ProxyRequest, ProxyResponse, Upstream,
};
pub use session::{Batch, FilteredQueue, InterceptSession, SessionStatus};
