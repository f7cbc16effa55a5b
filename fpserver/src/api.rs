//! API de contrôle FilterPlay
//!
//! Routes montées sous `/api/filterplay` :
//!
//! - `POST /trigger` : événement de déclenchement déjà préparé
//! - `POST /play` : extraction + filtrage d'un instantané HTML, puis déclenchement
//! - `POST /extract` : extraction + filtrage seuls
//! - `GET /session` : état de la session d'interception

use crate::proxy::create_proxy_router;
use crate::Server;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fpqueue::{Interceptor, QueueEngine, TriggerOutcome};
use fptrack::{extract_from_html, filter_records, prepare_trigger, FilterQuery, TrackRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use utoipa::OpenApi;

/// Corps de `POST /play`
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayRequest {
    /// Instantané HTML du conteneur de la playlist
    pub html: String,
    /// Requête de filtrage (termes séparés par des virgules)
    #[serde(default)]
    pub query: String,
    /// Identifiant du morceau choisi par l'utilisateur
    pub target_id: String,
}

/// Corps de `POST /extract`
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ExtractRequest {
    pub html: String,
    #[serde(default)]
    pub query: String,
}

/// Réponse de `POST /extract`
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub total: usize,
    pub terms: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    pub records: Vec<TrackRecord>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

fn outcome_response(outcome: TriggerOutcome) -> Response {
    let status = match outcome {
        TriggerOutcome::Started { .. } => StatusCode::OK,
        TriggerOutcome::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, Json(outcome)).into_response()
}

/// POST /api/filterplay/trigger - Démarre une session depuis un événement
#[utoipa::path(
    post,
    path = "/trigger",
    tag = "filterplay",
    request_body(content = serde_json::Value, description = "{ targetId, filteredRecords }"),
    responses(
        (status = 200, description = "Session démarrée", body = serde_json::Value),
        (status = 422, description = "Événement invalide, session effacée", body = serde_json::Value)
    )
)]
pub(crate) async fn post_trigger(
    State(engine): State<QueueEngine>,
    Json(payload): Json<Value>,
) -> Response {
    outcome_response(engine.handle_trigger(payload))
}

/// POST /api/filterplay/play - Extrait, filtre et démarre une session
#[utoipa::path(
    post,
    path = "/play",
    tag = "filterplay",
    request_body = PlayRequest,
    responses(
        (status = 200, description = "Session démarrée, ou requête ignorée sans filtre actif ni morceau retenu", body = serde_json::Value),
        (status = 422, description = "Extraction impossible", body = serde_json::Value)
    )
)]
pub(crate) async fn post_play(
    State(engine): State<QueueEngine>,
    Json(request): Json<PlayRequest>,
) -> Response {
    let prepared = tokio::task::spawn_blocking(move || {
        prepare_trigger(&request.html, &request.query, &request.target_id)
    })
    .await;

    let event = match prepared {
        Ok(Ok(Some(event))) => event,
        Ok(Ok(None)) => {
            return (
                StatusCode::OK,
                Json(serde_json::json!({
                    "outcome": "ignored",
                    "reason": "no active filter or no matching record"
                })),
            )
                .into_response();
        }
        Ok(Err(e)) => {
            warn!("Play request rejected: {}", e);
            engine.clear("extraction failure");
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string());
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    match serde_json::to_value(&event) {
        Ok(payload) => outcome_response(engine.handle_trigger(payload)),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// POST /api/filterplay/extract - Extrait et filtre sans démarrer de session
#[utoipa::path(
    post,
    path = "/extract",
    tag = "filterplay",
    request_body = ExtractRequest,
    responses(
        (status = 200, description = "Morceaux retenus, dans l'ordre visuel", body = ExtractResponse)
    )
)]
pub(crate) async fn post_extract(Json(request): Json<ExtractRequest>) -> Response {
    let extracted = tokio::task::spawn_blocking(move || {
        let records = extract_from_html(&request.html);
        let query = FilterQuery::parse(&request.query);
        let filtered = filter_records(&records, &query);
        ExtractResponse {
            total: records.len(),
            terms: query.terms().to_vec(),
            records: filtered,
        }
    })
    .await;

    match extracted {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// GET /api/filterplay/session - État de la session d'interception
#[utoipa::path(
    get,
    path = "/session",
    tag = "filterplay",
    responses(
        (status = 200, description = "État courant", body = serde_json::Value)
    )
)]
pub(crate) async fn get_session(State(engine): State<QueueEngine>) -> Response {
    Json(engine.status()).into_response()
}

/// Crée le router de l'API de contrôle
pub fn create_router(engine: QueueEngine) -> Router {
    Router::new()
        .route("/trigger", post(post_trigger))
        .route("/play", post(post_play))
        .route("/extract", post(post_extract))
        .route("/session", get(get_session))
        .with_state(engine)
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FilterPlay Control API",
        version = "0.1.0",
        description = "Démarrage et suivi des sessions de lecture filtrée",
    ),
    paths(post_trigger, post_play, post_extract, get_session),
    components(schemas(PlayRequest, ExtractRequest, ExtractResponse)),
    tags(
        (name = "filterplay", description = "Lecture filtrée")
    )
)]
pub struct FilterPlayApiDoc;

/// Trait d'extension qui branche FilterPlay sur un [`Server`]
pub trait FilterPlayExt {
    /// Enregistre l'API de contrôle et installe le proxy en repli
    ///
    /// # Routes enregistrées
    ///
    /// - `/api/filterplay/*` - API de contrôle
    /// - `/swagger-ui/filterplay` - Documentation interactive
    /// - tout le reste - proxy vers l'origine amont
    fn init_filterplay(&mut self, interceptor: Interceptor);
}

impl FilterPlayExt for Server {
    fn init_filterplay(&mut self, interceptor: Interceptor) {
        self.add_openapi(
            create_router(interceptor.engine().clone()),
            FilterPlayApiDoc::openapi(),
            "filterplay",
        );
        self.set_fallback(create_proxy_router(interceptor));
        info!("FilterPlay control API and proxy registered");
    }
}
