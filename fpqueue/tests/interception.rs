use async_trait::async_trait;
use bytes::Bytes;
use fpqueue::{
    Error, Interceptor, ProxyBody, ProxyRequest, ProxyResponse, QueueEngine, Result, Upstream,
};
use futures::stream::{self, StreamExt};
use http::{header, Method, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Upstream answering every call with a canned `/next` document
#[derive(Default)]
struct FakeUpstream {
    page_len: usize,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    seen_paths: Mutex<Vec<String>>,
    seen_encodings: Mutex<Vec<Option<String>>>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakeUpstream {
    fn new(page_len: usize) -> Self {
        Self {
            page_len,
            ..Default::default()
        }
    }

    fn next_document(&self) -> Value {
        let items: Vec<Value> = (0..self.page_len)
            .map(|i| json!({ "playlistPanelVideoRenderer": { "videoId": format!("orig{i}") } }))
            .collect();
        json!({ "contents": { "singleColumnMusicWatchNextResultsRenderer": { "tabbedRenderer": {
            "watchNextTabbedResultsRenderer": { "tabs": [{ "tabRenderer": { "content": {
                "musicQueueRenderer": { "content": { "playlistPanelRenderer": {
                    "contents": items,
                    "continuations": [{ "nextContinuationData": { "continuation": "tok" } }]
                }}}}}}]}}}}})
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn fetch(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_paths.lock().unwrap().push(request.path().to_string());
        self.seen_encodings.lock().unwrap().push(
            request
                .headers
                .get(header::ACCEPT_ENCODING)
                .map(|v| v.to_str().unwrap().to_string()),
        );

        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }

        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::upstream("connection reset"));
        }

        let body = if request.path().contains("/next") {
            serde_json::to_vec(&self.next_document()).unwrap()
        } else {
            b"<html>page</html>".to_vec()
        };
        let mut response = ProxyResponse::new(StatusCode::OK, body.clone());
        response
            .headers
            .insert(header::CONTENT_LENGTH, body.len().to_string().parse().unwrap());
        response
            .headers
            .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        Ok(response)
    }
}

fn next_request() -> ProxyRequest {
    let mut request = ProxyRequest::new(Method::POST, "/youtubei/v1/next?prettyPrint=false".parse().unwrap())
        .with_body(r#"{"videoId":"v1"}"#);
    request
        .headers
        .insert(header::ACCEPT_ENCODING, "gzip, br".parse().unwrap());
    request
}

fn trigger(ids: &[&str]) -> Value {
    let records: Vec<Value> = ids.iter().map(|id| json!({ "id": id, "titleText": id })).collect();
    json!({ "targetId": ids[0], "filteredRecords": records })
}

fn queue_list(response: &ProxyResponse) -> Value {
    let body: Value = serde_json::from_slice(response.body.as_bytes().unwrap()).unwrap();
    body.pointer("/contents/singleColumnMusicWatchNextResultsRenderer/tabbedRenderer/watchNextTabbedResultsRenderer/tabs/0/tabRenderer/content/musicQueueRenderer/content/playlistPanelRenderer")
        .unwrap()
        .clone()
}

fn ids(list: &Value) -> Vec<String> {
    list["contents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["playlistPanelVideoRenderer"]["videoId"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn filtered_queue_replaces_first_page() -> anyhow::Result<()> {
    let upstream = Arc::new(FakeUpstream::new(20));
    let engine = QueueEngine::default();
    let interceptor = Interceptor::new(engine.clone(), upstream.clone());

    engine.handle_trigger(trigger(&["v1", "v2", "v3"]));
    let response = interceptor.handle(next_request()).await?;

    let list = queue_list(&response);
    assert_eq!(ids(&list), vec!["v1", "v2", "v3"]);
    assert_eq!(list["contents"][0]["playlistPanelVideoRenderer"]["selected"], true);
    assert_eq!(list["continuations"], json!([]));
    assert!(!engine.is_active());

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers.get(header::CONTENT_LENGTH).is_none());
    assert_eq!(response.headers[header::CONTENT_TYPE], "application/json");

    // compression was not requested for the rewritten call
    assert_eq!(upstream.seen_encodings.lock().unwrap()[0], None);

    // session over: the next page is the host's own
    let response = interceptor.handle(next_request()).await?;
    assert_eq!(ids(&queue_list(&response)).len(), 20);
    assert_eq!(ids(&queue_list(&response))[0], "orig0");
    Ok(())
}

#[tokio::test]
async fn pages_follow_original_batch_size() -> anyhow::Result<()> {
    let upstream = Arc::new(FakeUpstream::new(2));
    let engine = QueueEngine::default();
    let interceptor = Interceptor::new(engine.clone(), upstream);

    engine.handle_trigger(trigger(&["a", "b", "c", "d", "e"]));

    let mut pages = Vec::new();
    for _ in 0..3 {
        pages.push(queue_list(&interceptor.handle(next_request()).await?));
    }

    assert_eq!(ids(&pages[0]), vec!["a", "b"]);
    assert_eq!(ids(&pages[1]), vec!["c", "d"]);
    assert_eq!(ids(&pages[2]), vec!["e"]);

    let selected = pages
        .iter()
        .flat_map(|page| page["contents"].as_array().unwrap().clone())
        .filter(|item| item["playlistPanelVideoRenderer"]["selected"] == true)
        .count();
    assert_eq!(selected, 1);

    assert_ne!(pages[1]["continuations"], json!([]));
    assert_eq!(pages[2]["continuations"], json!([]));
    Ok(())
}

#[tokio::test]
async fn unrelated_calls_are_byte_identical() -> anyhow::Result<()> {
    let upstream = Arc::new(FakeUpstream::new(20));
    let engine = QueueEngine::default();
    let interceptor = Interceptor::new(engine.clone(), upstream.clone());
    engine.handle_trigger(trigger(&["v1"]));

    let page = interceptor
        .handle(ProxyRequest::new(Method::GET, "/watch?v=v1".parse()?))
        .await?;
    assert_eq!(&page.body.into_bytes().await?[..], b"<html>page</html>");
    assert!(page.headers.get(header::CONTENT_LENGTH).is_some());

    let api = interceptor
        .handle(ProxyRequest::new(Method::POST, "/youtubei/v1/browse".parse()?))
        .await?;
    assert_eq!(&api.body.into_bytes().await?[..], b"<html>page</html>");

    // neither call touched the session
    assert!(engine.is_active());
    assert_eq!(engine.status().cursor, 0);
    Ok(())
}

#[tokio::test]
async fn next_without_session_is_forwarded() -> anyhow::Result<()> {
    let upstream = Arc::new(FakeUpstream::new(20));
    let interceptor = Interceptor::new(QueueEngine::default(), upstream.clone());

    let response = interceptor.handle(next_request()).await?;
    assert_eq!(ids(&queue_list(&response))[0], "orig0");
    assert!(response.headers.get(header::CONTENT_LENGTH).is_some());
    // forwarded untouched, including its encoding preference
    assert_eq!(
        upstream.seen_encodings.lock().unwrap()[0].as_deref(),
        Some("gzip, br")
    );
    Ok(())
}

#[tokio::test]
async fn upstream_failure_ends_session_and_retries_once() -> anyhow::Result<()> {
    let upstream = Arc::new(FakeUpstream::new(20));
    upstream.failures_left.store(1, Ordering::SeqCst);
    let engine = QueueEngine::default();
    let interceptor = Interceptor::new(engine.clone(), upstream.clone());
    engine.handle_trigger(trigger(&["v1", "v2"]));

    let response = interceptor.handle(next_request()).await?;
    assert_eq!(ids(&queue_list(&response))[0], "orig0");
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    assert!(!engine.is_active());
    Ok(())
}

#[tokio::test]
async fn retry_failure_is_reported() {
    let upstream = Arc::new(FakeUpstream::new(20));
    upstream.failures_left.store(2, Ordering::SeqCst);
    let engine = QueueEngine::default();
    let interceptor = Interceptor::new(engine.clone(), upstream);
    engine.handle_trigger(trigger(&["v1"]));

    assert!(matches!(
        interceptor.handle(next_request()).await,
        Err(Error::Upstream(_))
    ));
    assert!(!engine.is_active());
}

#[tokio::test]
async fn replacement_mid_flight_completes_under_old_session() -> anyhow::Result<()> {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let upstream = Arc::new(FakeUpstream {
        page_len: 20,
        gate: Some((entered.clone(), release.clone())),
        ..Default::default()
    });
    let engine = QueueEngine::default();
    let interceptor = Interceptor::new(engine.clone(), upstream);

    engine.handle_trigger(trigger(&["old1", "old2"]));

    let in_flight = {
        let interceptor = interceptor.clone();
        tokio::spawn(async move { interceptor.handle(next_request()).await })
    };
    entered.notified().await;

    engine.handle_trigger(trigger(&["new1", "new2", "new3"]));
    release.notify_one();

    let response = in_flight.await??;
    assert_eq!(ids(&queue_list(&response)), vec!["old1", "old2"]);

    // the new session is untouched and still current
    let status = engine.status();
    assert!(status.active);
    assert_eq!(status.target_id.as_deref(), Some("new1"));
    assert_eq!(status.cursor, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn idle_session_expires_then_passes_through() -> anyhow::Result<()> {
    let upstream = Arc::new(FakeUpstream::new(20));
    let engine = QueueEngine::default();
    let interceptor = Interceptor::new(engine.clone(), upstream);
    engine.handle_trigger(trigger(&["v1", "v2"]));

    tokio::time::sleep(Duration::from_secs(31)).await;

    let response = interceptor.handle(next_request()).await?;
    assert_eq!(ids(&queue_list(&response))[0], "orig0");
    assert!(response.headers.get(header::CONTENT_LENGTH).is_some());
    Ok(())
}

#[tokio::test]
async fn unknown_layout_passes_through_and_keeps_session() -> anyhow::Result<()> {
    struct OtherLayout;

    #[async_trait]
    impl Upstream for OtherLayout {
        async fn fetch(&self, _request: ProxyRequest) -> Result<ProxyResponse> {
            Ok(ProxyResponse::new(
                StatusCode::OK,
                serde_json::to_vec(&json!({ "contents": { "tabbedResults": {} } })).unwrap(),
            ))
        }
    }

    let engine = QueueEngine::default();
    let interceptor = Interceptor::new(engine.clone(), Arc::new(OtherLayout));
    engine.handle_trigger(trigger(&["v1"]));

    let response = interceptor.handle(next_request()).await?;
    let body: Value = serde_json::from_slice(&response.body.into_bytes().await?)?;
    assert_eq!(body, json!({ "contents": { "tabbedResults": {} } }));
    assert!(engine.is_active());
    Ok(())
}

/// Upstream relaying every body as a two-chunk stream
struct ChunkedUpstream(FakeUpstream);

#[async_trait]
impl Upstream for ChunkedUpstream {
    async fn fetch(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        let response = self.0.fetch(request).await?;
        let bytes = response.body.into_bytes().await?;
        let (head, tail) = bytes.split_at(bytes.len() / 2);
        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(head)),
            Ok(Bytes::copy_from_slice(tail)),
        ];
        let mut streamed =
            ProxyResponse::streaming(response.status, stream::iter(chunks).boxed());
        streamed.headers = response.headers;
        Ok(streamed)
    }
}

#[tokio::test]
async fn streamed_bodies_are_buffered_only_for_rewrites() -> anyhow::Result<()> {
    let engine = QueueEngine::default();
    let upstream = Arc::new(ChunkedUpstream(FakeUpstream::new(20)));
    let interceptor = Interceptor::new(engine.clone(), upstream);
    engine.handle_trigger(trigger(&["v1", "v2"]));

    let page = interceptor
        .handle(ProxyRequest::new(Method::GET, "/watch?v=v1".parse()?))
        .await?;
    assert!(matches!(page.body, ProxyBody::Stream(_)));
    assert_eq!(&page.body.into_bytes().await?[..], b"<html>page</html>");

    let response = interceptor.handle(next_request()).await?;
    assert!(response.body.as_bytes().is_some());
    assert_eq!(ids(&queue_list(&response)), vec!["v1", "v2"]);
    assert!(!engine.is_active());
    Ok(())
}
