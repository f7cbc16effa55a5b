//! Client HTTP vers l'origine amont (reqwest)
//!
//! Les requêtes reçues par le proxy sont rejouées telles quelles vers
//! `upstream.base_url`, sans les en-têtes de connexion. Les réponses ne sont
//! ni décompressées ni suivies en cas de redirection, et leur corps est
//! relayé au fil de l'eau.

use async_trait::async_trait;
use fpconfig::get_config;
use fpqueue::{Error, ProxyRequest, ProxyResponse, Result, Upstream};
use futures::{StreamExt, TryStreamExt};
use http::HeaderMap;
use reqwest::{redirect, Client};
use std::time::Duration;
use tracing::debug;

/// En-têtes propres à une connexion, jamais transmis
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// [`Upstream`] backed by a shared `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestUpstream {
    client: Client,
    base_url: String,
}

impl ReqwestUpstream {
    /// Crée un client vers `base_url`
    ///
    /// # Arguments
    ///
    /// * `base_url` - Origine amont (ex: "https://music.youtube.com")
    /// * `timeout` - Délai maximal par requête
    /// * `user_agent` - User-Agent utilisé quand le client n'en fournit pas
    pub fn new(base_url: impl Into<String>, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| Error::upstream(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Crée le client à partir de la section `upstream` de la configuration
    pub fn from_config() -> Result<Self> {
        let config = get_config();
        Self::new(
            config.get_upstream_base_url()?,
            Duration::from_secs(config.get_upstream_timeout_secs()?),
            &config.get_upstream_user_agent()?,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL amont pour un chemin + requête relatif
    pub fn target_url(&self, request: &ProxyRequest) -> String {
        let path_and_query = request
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        format!("{}{}", self.base_url, path_and_query)
    }
}

/// Copie des en-têtes sans ceux de connexion
fn forwardable(headers: &HeaderMap, extra: &[&str]) -> HeaderMap {
    let mut out = headers.clone();
    for name in HOP_BY_HOP.iter().chain(extra) {
        out.remove(*name);
    }
    out
}

#[async_trait]
impl Upstream for ReqwestUpstream {
    async fn fetch(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        let url = self.target_url(&request);
        debug!("→ {} {}", request.method, url);

        // host et longueur sont recalculés par le client
        let headers = forwardable(&request.headers, &["host", "content-length"]);

        let response = self
            .client
            .request(request.method, &url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("{}: {}", url, e)))?;

        let status = response.status();
        let headers = forwardable(response.headers(), &[]);
        debug!("← {} {}", status, url);

        let body = response.bytes_stream().map_err(std::io::Error::other).boxed();
        let mut proxied = ProxyResponse::streaming(status, body);
        proxied.headers = headers;
        Ok(proxied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{header, Method};

    #[test]
    fn test_target_url_keeps_query() {
        let upstream =
            ReqwestUpstream::new("https://music.example.com/", Duration::from_secs(5), "t")
                .unwrap();
        let request = ProxyRequest::new(
            Method::POST,
            "/youtubei/v1/next?prettyPrint=false".parse().unwrap(),
        );
        assert_eq!(
            upstream.target_url(&request),
            "https://music.example.com/youtubei/v1/next?prettyPrint=false"
        );
    }

    #[test]
    fn test_hop_by_hop_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "keep-alive".parse().unwrap());
        headers.insert(header::HOST, "localhost:8480".parse().unwrap());
        headers.insert(header::COOKIE, "SID=1".parse().unwrap());

        let out = forwardable(&headers, &["host"]);
        assert!(out.get(header::CONNECTION).is_none());
        assert!(out.get(header::HOST).is_none());
        assert_eq!(out[header::COOKIE], "SID=1");
    }
}
