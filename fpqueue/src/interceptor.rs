//! Network interception hook
//!
//! Every proxied call goes through [`Interceptor::handle`]. Calls outside
//! `youtubei/v1/` and API calls without an open session are forwarded as is.
//! Continuation calls (`/next`) under an open session are fetched, then their
//! item list is replaced from the session snapshot taken before the fetch.

use crate::engine::{QueueEngine, Rewrite};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, StreamExt};
use http::{header, HeaderMap, Method, StatusCode, Uri};
use std::fmt;
use std::sync::Arc;

/// Path fragment of the host's internal API
pub const API_MARKER: &str = "youtubei/v1/";

/// Path fragment of the continuation endpoint
pub const NEXT_MARKER: &str = "/next";

/// Headers that no longer describe a rewritten body
const STALE_BODY_HEADERS: [&str; 3] = ["content-length", "content-encoding", "transfer-encoding"];

/// Request as received by the proxy
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path and query, relative to the upstream origin
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

/// Body of a proxied response
///
/// Upstreams may hand back a live stream; only continuation bodies that are
/// about to be rewritten get buffered.
pub enum ProxyBody {
    Full(Bytes),
    Stream(BoxStream<'static, std::io::Result<Bytes>>),
}

impl ProxyBody {
    /// The buffered bytes, `None` for a stream
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ProxyBody::Full(bytes) => Some(bytes),
            ProxyBody::Stream(_) => None,
        }
    }

    /// Read the whole body
    pub async fn into_bytes(self) -> Result<Bytes> {
        let mut stream = match self {
            ProxyBody::Full(bytes) => return Ok(bytes),
            ProxyBody::Stream(stream) => stream,
        };
        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::upstream(format!("Body read failed: {}", e)))?;
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }
}

impl fmt::Debug for ProxyBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyBody::Full(bytes) => write!(f, "Full({} bytes)", bytes.len()),
            ProxyBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl<T: Into<Bytes>> From<T> for ProxyBody {
    fn from(bytes: T) -> Self {
        ProxyBody::Full(bytes.into())
    }
}

/// Response handed back to the client
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ProxyBody,
}

impl ProxyResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ProxyBody::Full(body.into()),
        }
    }

    /// Response whose body is relayed chunk by chunk
    pub fn streaming(status: StatusCode, body: BoxStream<'static, std::io::Result<Bytes>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ProxyBody::Stream(body),
        }
    }
}

/// Where proxied calls are actually sent
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(&self, request: ProxyRequest) -> Result<ProxyResponse>;
}

/// How a call is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallClass {
    /// Not an API call
    Passthrough,
    /// API call not subject to rewriting
    Api,
    /// Continuation call, rewritten while a session is open
    Next,
}

/// Classify a request path
pub fn classify(path: &str) -> CallClass {
    if !path.contains(API_MARKER) {
        CallClass::Passthrough
    } else if path.contains(NEXT_MARKER) {
        CallClass::Next
    } else {
        CallClass::Api
    }
}

/// The interception hook
#[derive(Clone)]
pub struct Interceptor {
    engine: QueueEngine,
    upstream: Arc<dyn Upstream>,
}

impl Interceptor {
    pub fn new(engine: QueueEngine, upstream: Arc<dyn Upstream>) -> Self {
        Self { engine, upstream }
    }

    pub fn engine(&self) -> &QueueEngine {
        &self.engine
    }

    /// Forward `request`, rewriting continuation responses under an open session
    ///
    /// Errors are upstream failures of a plain forward; interception problems
    /// never surface and degrade to forwarding.
    pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        if classify(request.path()) != CallClass::Next {
            return self.upstream.fetch(request).await;
        }

        // snapshot before any suspension point
        let Some(session) = self.engine.current() else {
            return self.upstream.fetch(request).await;
        };

        let mut forwarded = request.clone();
        // the body must be readable JSON to be rewritten
        forwarded.headers.remove(header::ACCEPT_ENCODING);

        let fetched = match self.upstream.fetch(forwarded).await {
            Ok(ProxyResponse {
                status,
                headers,
                body,
            }) => body
                .into_bytes()
                .await
                .map(|body| (status, headers, body)),
            Err(e) => Err(e),
        };
        let (status, headers, body) = match fetched {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!("Continuation fetch failed, retrying as pass-through: {}", e);
                session.close();
                self.engine
                    .clear_if_current(session.generation(), "upstream failure");
                return self.upstream.fetch(request).await;
            }
        };
        let response = ProxyResponse {
            status,
            headers,
            body: ProxyBody::Full(body.clone()),
        };

        match self.engine.rewrite_body(&session, &body) {
            Ok(Rewrite::Replaced { body, .. }) => match serde_json::to_vec(&body) {
                Ok(bytes) => Ok(rewritten(response, bytes)),
                Err(e) => {
                    tracing::warn!("Could not serialize rewritten body: {}", e);
                    self.engine
                        .clear_if_current(session.generation(), "serialization failure");
                    Ok(response)
                }
            },
            Ok(Rewrite::Unchanged) | Err(_) => Ok(response),
        }
    }
}

fn rewritten(original: ProxyResponse, body: Vec<u8>) -> ProxyResponse {
    let mut headers = original.headers;
    for name in STALE_BODY_HEADERS {
        headers.remove(name);
    }
    ProxyResponse {
        status: original.status,
        headers,
        body: ProxyBody::Full(Bytes::from(body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("/watch"), CallClass::Passthrough);
        assert_eq!(classify("/next"), CallClass::Passthrough);
        assert_eq!(classify("/youtubei/v1/browse"), CallClass::Api);
        assert_eq!(classify("/youtubei/v1/player"), CallClass::Api);
        assert_eq!(classify("/youtubei/v1/next"), CallClass::Next);
    }

    #[test]
    fn test_rewritten_drops_stale_headers() {
        let mut original = ProxyResponse::new(StatusCode::OK, "{}");
        original
            .headers
            .insert(header::CONTENT_LENGTH, "2".parse().unwrap());
        original
            .headers
            .insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());
        original
            .headers
            .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());

        let response = rewritten(original, b"{\"a\":1}".to_vec());
        assert!(response.headers.get(header::CONTENT_LENGTH).is_none());
        assert!(response.headers.get(header::CONTENT_ENCODING).is_none());
        assert_eq!(response.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_streamed_body_is_collected() {
        let chunks: Vec<std::io::Result<Bytes>> =
            vec![Ok(Bytes::from_static(b"{\"a\"")), Ok(Bytes::from_static(b":1}"))];
        let body = ProxyBody::Stream(futures::stream::iter(chunks).boxed());
        assert!(body.as_bytes().is_none());
        assert_eq!(&body.into_bytes().await.unwrap()[..], b"{\"a\":1}");

        let failing = vec![
            Ok(Bytes::from_static(b"{")),
            Err(std::io::Error::other("reset")),
        ];
        let body = ProxyBody::Stream(futures::stream::iter(failing).boxed());
        assert!(matches!(body.into_bytes().await, Err(Error::Upstream(_))));
    }
}
