use fpconfig::get_config;
use fpqueue::{Interceptor, QueueConfigExt, QueueEngine};
use fpserver::{ConfigExt, FilterPlayExt, LoggingOptions, ReqwestUpstream, ServerBuilder};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ========== PHASE 1 : Infrastructure ==========

    let mut server = ServerBuilder::new_configured().build();
    server.init_logging(LoggingOptions::from_config());

    server.add_route("/info", || async {
        serde_json::json!({ "name": "FilterPlay", "version": env!("CARGO_PKG_VERSION") })
    });

    info!("⚙️ Registering configuration API...");
    server.init_config_api()?;

    // ========== PHASE 2 : Interception ==========

    let config = get_config();
    let options = config.get_engine_options()?;
    info!(
        "🎵 Queue engine: session TTL {}s, default batch size {}",
        options.session_ttl.as_secs(),
        options.default_batch_size
    );
    let engine = QueueEngine::new(options);

    let upstream = ReqwestUpstream::from_config()?;
    info!("📡 Proxying {}", upstream.base_url());

    server.init_filterplay(Interceptor::new(engine, Arc::new(upstream)));

    // ========== PHASE 3 : Démarrage du serveur ==========

    info!("🌐 Starting HTTP server...");
    server.start().await?;

    info!("✅ FilterPlay is ready!");
    info!("Press Ctrl+C to stop...");
    server.wait().await;

    Ok(())
}
