// tests/timeline_adapter.rs
//
// End-to-end adapter behavior against a local stub provider. Each test
// serves a scripted response on a loopback socket and points the adapter at
// it; no real provider is involved.

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::time::Duration;

use linkrelay::config::{SourceDescriptor, SourceKind};
use linkrelay::sources::adapter_for;
use linkrelay::sources::types::PollOutcome;

const TIMELINE_FIXTURE: &str = include_str!("fixtures/timeline_mixed.json");

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn timeline_descriptor(handle: &str) -> SourceDescriptor {
    SourceDescriptor {
        kind: SourceKind::UserTimeline,
        target: handle.to_string(),
        selector: None,
    }
}

#[tokio::test]
async fn keeps_own_posts_and_drops_the_rest() {
    let base = serve(Router::new().route(
        "/user/last_tweets",
        get(|| async { ([(header::CONTENT_TYPE, "application/json")], TIMELINE_FIXTURE) }),
    ))
    .await;

    let adapter = adapter_for(&timeline_descriptor("acme"), "test-key", &base, None).unwrap();
    let PollOutcome::Items(items) = adapter.poll().await.unwrap() else {
        panic!("expected items");
    };

    // Fixture holds one post by @Acme, one retweet by another account, and
    // one id-less promoted card.
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source, "x:acme");
    assert_eq!(items[0].external_id, "101");
    assert_eq!(items[0].url, "https://x.com/acme/status/101");
    assert_eq!(items[0].title.as_deref(), Some("Fresh release is out"));
    assert!(items[0].published_at.is_some());
}

#[tokio::test]
async fn rate_limit_reports_the_providers_cool_down() {
    let base = serve(Router::new().route(
        "/user/last_tweets",
        get(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, "7")],
                "slow down",
            )
        }),
    ))
    .await;

    let adapter = adapter_for(&timeline_descriptor("acme"), "test-key", &base, None).unwrap();
    let PollOutcome::RateLimited { cool_down } = adapter.poll().await.unwrap() else {
        panic!("expected rate limit");
    };
    assert_eq!(cool_down, Duration::from_secs(7));
}

#[tokio::test]
async fn rate_limit_without_header_uses_the_fallback() {
    let base = serve(Router::new().route(
        "/user/last_tweets",
        get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
    ))
    .await;

    let adapter = adapter_for(&timeline_descriptor("acme"), "test-key", &base, None).unwrap();
    let PollOutcome::RateLimited { cool_down } = adapter.poll().await.unwrap() else {
        panic!("expected rate limit");
    };
    assert_eq!(cool_down, Duration::from_secs(900));
}

#[tokio::test]
async fn not_found_is_an_empty_cycle() {
    let base = serve(Router::new().route(
        "/user/last_tweets",
        get(|| async { (StatusCode::NOT_FOUND, "no such user") }),
    ))
    .await;

    let adapter = adapter_for(&timeline_descriptor("ghost"), "test-key", &base, None).unwrap();
    let PollOutcome::Items(items) = adapter.poll().await.unwrap() else {
        panic!("expected items");
    };
    assert!(items.is_empty());
}

#[tokio::test]
async fn malformed_body_is_an_empty_cycle() {
    let base = serve(Router::new().route(
        "/user/last_tweets",
        get(|| async { "<html>not json at all</html>" }),
    ))
    .await;

    let adapter = adapter_for(&timeline_descriptor("acme"), "test-key", &base, None).unwrap();
    let PollOutcome::Items(items) = adapter.poll().await.unwrap() else {
        panic!("expected items");
    };
    assert!(items.is_empty());
}

#[tokio::test]
async fn malformed_body_lands_in_the_debug_sink() {
    use linkrelay::sources::DebugSink;

    let base = serve(Router::new().route(
        "/user/last_tweets",
        get(|| async { "<html>not json at all</html>" }),
    ))
    .await;

    let tmp = tempfile::tempdir().unwrap();
    let sink = DebugSink::new(tmp.path().to_path_buf());
    let adapter = adapter_for(&timeline_descriptor("acme"), "test-key", &base, Some(sink)).unwrap();
    adapter.poll().await.unwrap();

    let dumped: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
    assert_eq!(dumped.len(), 1);
}

#[tokio::test]
async fn api_stream_fetches_its_target_verbatim() {
    let base = serve(Router::new().route(
        "/feed",
        get(|| async {
            (
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"data": [{"id": "9", "text": "anything", "url": "https://example.com/9"}]}"#,
            )
        }),
    ))
    .await;

    let descriptor = SourceDescriptor {
        kind: SourceKind::ApiStream,
        target: format!("{base}/feed"),
        selector: None,
    };
    let adapter = adapter_for(&descriptor, "test-key", &base, None).unwrap();
    let PollOutcome::Items(items) = adapter.poll().await.unwrap() else {
        panic!("expected items");
    };
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].url, "https://example.com/9");
}
