//! # fpserver - Serveur HTTP de FilterPlay
//!
//! Ce crate assemble la partie réseau de FilterPlay autour d'axum :
//!
//! - **Proxy** : toute requête sans route est relayée vers l'origine amont
//!   à travers l'[`Interceptor`](fpqueue::Interceptor) ([`proxy`], [`upstream`])
//! - **API de contrôle** : déclenchement et suivi des sessions ([`api`])
//! - **Logs** : buffer circulaire, SSE et niveau réglable à chaud ([`logs`])
//! - **Configuration** : API REST de `fpconfig` ([`config_ext`])
//!
//! ## Exemple
//!
//! ```rust,no_run
//! use fpqueue::{Interceptor, QueueEngine};
//! use fpserver::{ConfigExt, FilterPlayExt, LoggingOptions, ReqwestUpstream, ServerBuilder};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = ServerBuilder::new_configured().build();
//!     server.init_logging(LoggingOptions::from_config());
//!     server.init_config_api()?;
//!
//!     let upstream = Arc::new(ReqwestUpstream::from_config()?);
//!     let interceptor = Interceptor::new(QueueEngine::default(), upstream);
//!     server.init_filterplay(interceptor);
//!
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config_ext;
pub mod logs;
pub mod proxy;
pub mod server;
pub mod upstream;

pub use api::{FilterPlayApiDoc, FilterPlayExt};
pub use config_ext::ConfigExt;
pub use logs::{init_logging, LogState, LoggingOptions};
pub use proxy::create_proxy_router;
pub use server::{Server, ServerBuilder, ServerInfo};
pub use upstream::ReqwestUpstream;
