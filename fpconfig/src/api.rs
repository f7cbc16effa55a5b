//! REST access to the live configuration tree.
//!
//! Keys are addressed with dotted paths (`interception.session_ttl_secs`);
//! values travel as JSON and are stored as YAML.

use crate::Config;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

/// Une clé de configuration et sa valeur, en lecture comme en écriture
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ConfigEntry {
    /// Dotted key, e.g. `interception.default_batch_size`
    pub path: String,
    pub value: JsonValue,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateConfigResponse {
    pub success: bool,
    pub message: String,
}

/// Failure of a config endpoint, rendered as `{"error": ...}`
#[derive(Debug)]
pub enum ApiError {
    UnknownKey(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownKey(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::UnknownKey(key) => format!("No configuration value at {key}"),
            ApiError::Internal(e) => e.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        ApiError::Internal(err.into())
    }
}

fn split_key(path: &str) -> Vec<&str> {
    path.split('.').filter(|part| !part.is_empty()).collect()
}

/// Whole configuration tree
#[utoipa::path(
    get,
    path = "/api/config",
    tag = "config",
    responses(
        (status = 200, description = "Full configuration tree", body = serde_json::Value)
    )
)]
pub(crate) async fn get_full_config(
    State(config): State<Arc<Config>>,
) -> Result<Json<JsonValue>, ApiError> {
    let tree = config.get_value(&[])?;
    Ok(Json(serde_json::to_value(tree)?))
}

#[utoipa::path(
    get,
    path = "/api/config/{path}",
    tag = "config",
    params(
        ("path" = String, Path, description = "Dotted key, e.g. host.http_port")
    ),
    responses(
        (status = 200, description = "Value stored at the key", body = ConfigEntry),
        (status = 404, description = "No value at this key")
    )
)]
pub(crate) async fn get_config_value(
    State(config): State<Arc<Config>>,
    Path(path): Path<String>,
) -> Result<Json<ConfigEntry>, ApiError> {
    let value = config
        .get_value(&split_key(&path))
        .map_err(|_| ApiError::UnknownKey(path.clone()))?;
    Ok(Json(ConfigEntry {
        value: serde_json::to_value(value)?,
        path,
    }))
}

/// Écrit une valeur puis sauvegarde le fichier utilisateur
#[utoipa::path(
    post,
    path = "/api/config",
    tag = "config",
    request_body = ConfigEntry,
    responses(
        (status = 200, description = "Value stored and saved", body = UpdateConfigResponse)
    )
)]
pub(crate) async fn update_config_value(
    State(config): State<Arc<Config>>,
    Json(entry): Json<ConfigEntry>,
) -> Result<Json<UpdateConfigResponse>, ApiError> {
    let value: serde_yaml::Value = serde_yaml::to_value(&entry.value)?;
    config.set_value(&split_key(&entry.path), value)?;

    Ok(Json(UpdateConfigResponse {
        success: true,
        message: format!("{} updated", entry.path),
    }))
}

/// Routes are relative; the server nests them under `/api/config`.
pub fn create_router(config: Arc<Config>) -> Router {
    Router::new()
        .route("/", get(get_full_config).post(update_config_value))
        .route("/{path}", get(get_config_value))
        .with_state(config)
}
