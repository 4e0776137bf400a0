use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use sensor_proxy::application::proxy::{ProxyConfig, ProxyService};
use sensor_proxy::application::upstream::{TelemetryUpstream, UpstreamError};
use sensor_proxy::cache::{CacheConfig, TtlCache};
use sensor_proxy::infra::http::{AppState, REQUEST_ID_HEADER, build_router};
use sensor_proxy_api_types::PROXY_ROUTE;
use serde_json::{Value, json};
use tower::ServiceExt;

const DEFAULT_ENDPOINT: &str = "https://default.example";

#[derive(Default)]
struct CountingUpstream {
    calls: AtomicUsize,
    failing: AtomicBool,
    last_url: Mutex<Option<String>>,
}

impl CountingUpstream {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_url(&self) -> Option<String> {
        self.last_url.lock().expect("url lock").clone()
    }
}

#[async_trait]
impl TelemetryUpstream for CountingUpstream {
    async fn fetch(&self, url: &str) -> Result<Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().expect("url lock") = Some(url.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(UpstreamError::status(503, "Service Unavailable"));
        }
        Ok(json!({ "sensor1": { "speed": 42 } }))
    }
}

fn app(upstream: Arc<CountingUpstream>) -> Router {
    let proxy = ProxyService::new(
        Arc::new(TtlCache::new()),
        upstream,
        ProxyConfig::new(DEFAULT_ENDPOINT, &CacheConfig::default()),
    );
    build_router(AppState {
        proxy: Arc::new(proxy),
    })
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(PROXY_ROUTE)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be JSON")
    };
    (status, body)
}

#[tokio::test]
async fn missing_resource_path_is_rejected_without_upstream_call() {
    let upstream = Arc::new(CountingUpstream::default());
    let app = app(upstream.clone());

    let (status, body) = call(&app, post_json(r#"{ "connectionConfig": "{}" }"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "missing resource path" }));
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn malformed_body_is_rejected_without_upstream_call() {
    let upstream = Arc::new(CountingUpstream::default());
    let app = app(upstream.clone());

    let (status, body) = call(&app, post_json("{ not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn garbage_config_still_succeeds_and_second_call_is_cached() {
    let upstream = Arc::new(CountingUpstream::default());
    let app = app(upstream.clone());
    let request = r#"{ "connectionConfig": "hello world not json", "resourcePath": "sensor1/live" }"#;

    let (status, first) = call(&app, post_json(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["source"], "upstream");
    assert_eq!(first["data"], json!({ "sensor1": { "speed": 42 } }));
    assert_eq!(first["reading"], json!(42.0));

    let (status, second) = call(&app, post_json(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["source"], "cache");
    assert_eq!(second["data"], first["data"]);

    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn non_string_config_falls_back_to_default_endpoint() {
    let upstream = Arc::new(CountingUpstream::default());
    let app = app(upstream.clone());

    for body in [
        r#"{ "connectionConfig": { "databaseURL": "https://x" }, "resourcePath": "a" }"#,
        r#"{ "connectionConfig": 42, "resourcePath": "b" }"#,
    ] {
        let (status, response) = call(&app, post_json(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["source"], "upstream");
    }

    assert_eq!(upstream.calls(), 2);
    assert_eq!(upstream.last_url().as_deref(), Some("https://default.example/b.json"));
}

#[tokio::test]
async fn legacy_field_names_are_accepted() {
    let upstream = Arc::new(CountingUpstream::default());
    let app = app(upstream.clone());

    let (status, body) = call(
        &app,
        post_json(r#"{ "firebaseConfig": "", "dbPath": "SPD-01/live/speed" }"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "upstream");
}

#[tokio::test]
async fn upstream_failure_is_internal_error_with_message() {
    let upstream = Arc::new(CountingUpstream::default());
    upstream.failing.store(true, Ordering::SeqCst);
    let app = app(upstream.clone());

    let (status, body) = call(&app, post_json(r#"{ "resourcePath": "a/b" }"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "error": "upstream responded 503 Service Unavailable" })
    );

    // Failures are not cached; the next request goes upstream again.
    let (status, _) = call(&app, post_json(r#"{ "resourcePath": "a/b" }"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test]
async fn cache_status_counts_entries() {
    let upstream = Arc::new(CountingUpstream::default());
    let app = app(upstream);

    for path in ["a", "/a/", "b"] {
        let body = json!({ "resourcePath": path }).to_string();
        let (status, _) = call(&app, post_json(&body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/proxy/cache")
        .body(Body::empty())
        .expect("request should build");
    let (status, body) = call(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "entries": 2 }));
}

#[tokio::test]
async fn healthz_is_no_content_and_tagged_with_request_id() {
    let app = app(Arc::new(CountingUpstream::default()));

    let request = Request::builder()
        .method(Method::GET)
        .uri("/healthz")
        .header(&REQUEST_ID_HEADER, "probe-1")
        .body(Body::empty())
        .expect("request should build");
    let response = app.oneshot(request).await.expect("router should respond");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
        Some("probe-1")
    );
}
