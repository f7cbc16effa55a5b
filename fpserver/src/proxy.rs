//! Proxy handler: every request without a route is handed to the interceptor

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use fpqueue::{Interceptor, ProxyBody, ProxyRequest};
use tracing::error;

/// Largest request body accepted from the host client
pub const MAX_REQUEST_BODY: usize = 16 * 1024 * 1024;

pub async fn proxy_handler(State(interceptor): State<Interceptor>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_REQUEST_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, format!("Cannot read body: {}", e))
                .into_response()
        }
    };

    let proxied = ProxyRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
    };

    match interceptor.handle(proxied).await {
        Ok(upstream) => {
            let body = match upstream.body {
                ProxyBody::Full(bytes) => Body::from(bytes),
                ProxyBody::Stream(stream) => Body::from_stream(stream),
            };
            let mut response = Response::new(body);
            *response.status_mut() = upstream.status;
            *response.headers_mut() = upstream.headers;
            response
        }
        Err(e) => {
            error!("Proxy error: {}", e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

/// Router whose fallback forwards everything through `interceptor`
pub fn create_proxy_router(interceptor: Interceptor) -> Router {
    Router::new()
        .fallback(proxy_handler)
        .with_state(interceptor)
}
