//! # Serveur HTTP de FilterPlay
//!
//! [`Server`] accumule les routes pendant la phase de démarrage, puis sert le
//! tout avec axum. Les requêtes qui ne correspondent à aucune route partent
//! vers le router de repli (le proxy, voir [`crate::proxy`]).
//!
//! Les APIs documentées sont montées par [`Server::add_openapi`] :
//! `/api/{nom}` pour les routes, `/swagger-ui/{nom}` pour l'interface Swagger
//! et `/api-docs/{nom}.json` pour le document OpenAPI.

use crate::logs::{
    create_logs_router, init_logging, log_dump, log_sse, LogState, LoggingOptions, LogsApiDoc,
};
use anyhow::{Context, Result};
use axum::handler::Handler;
use axum::routing::{get, post, MethodRouter};
use axum::{Json, Router};
use fpconfig::get_config;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const SERVER_NAME: &str = "FilterPlay";

/// Identité du serveur, telle qu'exposée par `/info`
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ServerInfo {
    pub name: String,
    pub base_url: String,
    pub http_port: u16,
}

pub struct Server {
    info: ServerInfo,
    routes: Router,
    fallback: Option<Router>,
    serving: Option<JoinHandle<()>>,
    log_state: Option<LogState>,
}

impl Server {
    /// `base_url` n'est utilisé que pour l'affichage; l'écoute se fait sur
    /// toutes les interfaces.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                base_url: base_url.into(),
                http_port,
            },
            routes: Router::new(),
            fallback: None,
            serving: None,
            log_state: None,
        }
    }

    /// Serveur nommé "FilterPlay", hôte et port lus dans la section `host`
    pub fn new_configured() -> Self {
        ServerBuilder::new_configured().build()
    }

    /// Monte `router` à `path` ("/" fusionne au niveau racine)
    pub fn add_router(&mut self, path: &str, router: Router) {
        let path = format!("/{}", path.trim_start_matches('/'));
        let routes = std::mem::take(&mut self.routes);
        self.routes = if path == "/" {
            routes.merge(router)
        } else {
            routes.nest(&path, router)
        };
    }

    fn add_method<S>(&mut self, path: &str, method: MethodRouter<S>, state: S)
    where
        S: Clone + Send + Sync + 'static,
    {
        self.add_router(path, Router::new().route("/", method).with_state(state));
    }

    /// Route GET qui répond le JSON produit par `f`
    ///
    /// ```rust,no_run
    /// # use fpserver::Server;
    /// let mut server = Server::new("Test", "localhost", 3000);
    /// server.add_route("/info", || async { serde_json::json!({ "version": "0.1.0" }) });
    /// ```
    pub fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        let handler = move || {
            let f = Arc::clone(&f);
            async move { Json(f().await) }
        };
        self.add_method(path, get(handler), ());
    }

    pub fn add_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S> + Clone + 'static,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        self.add_method(path, get(handler), state);
    }

    pub fn add_post_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S> + Clone + 'static,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        self.add_method(path, post(handler), state);
    }

    /// Monte une API documentée sous `/api/{name}` avec sa page Swagger
    pub fn add_openapi(&mut self, api: Router, doc: utoipa::openapi::OpenApi, name: &str) {
        let swagger =
            SwaggerUi::new(format!("/swagger-ui/{name}")).url(format!("/api-docs/{name}.json"), doc);
        self.add_router(&format!("/api/{name}"), api);
        self.routes = std::mem::take(&mut self.routes).merge(swagger);
    }

    /// Router qui reçoit toute requête sans route
    pub fn set_fallback(&mut self, fallback: Router) {
        self.fallback = Some(fallback);
    }

    /// Application complète, repli compris
    pub fn router(&self) -> Router {
        match &self.fallback {
            Some(fallback) => self.routes.clone().fallback_service(fallback.clone()),
            None => self.routes.clone(),
        }
    }

    /// Réserve le port puis sert l'application en tâche de fond
    ///
    /// Rend la main aussitôt; [`Server::wait`] attend l'arrêt (Ctrl+C ou
    /// erreur du serveur).
    pub async fn start(&mut self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.info.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Cannot bind {addr}"))?;

        info!(
            "{} listening on http://{}:{}",
            self.info.name, self.info.base_url, self.info.http_port
        );

        let app = self.router();
        self.serving = Some(tokio::spawn(async move {
            let shutdown = async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Ctrl+C reçu, arrêt"),
                    Err(e) => {
                        error!("Cannot listen for Ctrl+C: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("HTTP server stopped: {}", e);
            }
        }));

        Ok(())
    }

    pub async fn wait(&mut self) {
        if let Some(serving) = self.serving.take() {
            let _ = serving.await;
        }
    }

    pub fn info(&self) -> ServerInfo {
        self.info.clone()
    }

    pub fn log_state(&self) -> Option<&LogState> {
        self.log_state.as_ref()
    }

    /// Installe le subscriber global et publie les routes de logs
    pub fn init_logging(&mut self, options: LoggingOptions) {
        let log_state = init_logging(options);
        self.register_log_routes(log_state);
    }

    /// `/log-sse`, `/log-dump` et `/api/logs/log_setup` pour `log_state`
    pub fn register_log_routes(&mut self, log_state: LogState) {
        self.add_handler_with_state("/log-sse", log_sse, log_state.clone());
        self.add_handler_with_state("/log-dump", log_dump, log_state.clone());
        self.add_openapi(
            create_logs_router(log_state.clone()),
            LogsApiDoc::openapi(),
            "logs",
        );
        self.log_state = Some(log_state);
    }
}

pub struct ServerBuilder {
    name: String,
    base_url: String,
    http_port: u16,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
        }
    }

    pub fn new_configured() -> Self {
        let config = get_config();
        Self::new(SERVER_NAME, config.get_base_url(), config.get_http_port())
    }

    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn build(self) -> Server {
        Server::new(self.name, self.base_url, self.http_port)
    }
}
