//! Status tracker HTTP surface and the completion-wait client against it

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use callwatch::config::TtsConfig;
use callwatch::tracker::TokioClock;
use callwatch::voice::{SynthesisRequest, Synthesizer, TtsError};
use callwatch::{
    create_app, wait_for_completion, CallRegistry, CallStatus, InMemoryRegistry, ServerState,
    TrackerClient, WaitOutcome, WaitPolicy,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

struct SilentSynth;

#[async_trait]
impl Synthesizer for SilentSynth {
    async fn synthesize(&self, _request: &SynthesisRequest) -> Result<Vec<u8>, TtsError> {
        Ok(vec![0, 0])
    }
}

fn app_with(registry: Arc<InMemoryRegistry>, secret: Option<&str>) -> Router {
    let state = ServerState::new(
        registry,
        Arc::new(SilentSynth),
        TtsConfig::default(),
        secret.map(str::to_string),
    );
    create_app(state)
}

fn status_event(call_id: &str, status: &str) -> Value {
    json!({
        "message": {
            "type": "status-update",
            "status": status,
            "call": { "id": call_id }
        }
    })
}

async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_webhook_then_lookup() {
    let app = app_with(InMemoryRegistry::new(), None);
    let before = chrono::Utc::now();

    let (status, body) = post_json(&app, "/webhook", &status_event("call-1", "ringing")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"received": true, "recorded": true}));

    let (status, body) = get(&app, "/calls/call-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["call_id"], "call-1");
    assert_eq!(body["status"], "ringing");
    assert!(body["analysis"].is_null());
    assert!(body["result"].is_null());

    let updated_at: chrono::DateTime<chrono::Utc> = body["updated_at"].as_str().unwrap().parse().unwrap();
    assert!(updated_at >= before);
}

#[tokio::test]
async fn test_lookup_unknown_call_is_404() {
    let app = app_with(InMemoryRegistry::new(), None);
    let (status, body) = get(&app, "/calls/never-seen").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("never-seen"));
}

#[tokio::test]
async fn test_ignored_event_types_do_not_create_records() {
    let registry = InMemoryRegistry::new();
    let app = app_with(registry.clone(), None);

    let event = json!({
        "message": { "type": "transcript", "transcript": "hello", "call": { "id": "call-2" } }
    });
    let (status, body) = post_json(&app, "/webhook", &event).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recorded"], false);
    assert!(registry.lookup("call-2").await.unwrap().is_none());

    let (status, _) = get(&app, "/calls/call-2").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ignored_event_does_not_touch_existing_record() {
    let registry = InMemoryRegistry::new();
    let app = app_with(registry.clone(), None);

    post_json(&app, "/webhook", &status_event("call-3", "in-progress")).await;
    let before = registry.lookup("call-3").await.unwrap().unwrap();

    let event = json!({ "message": { "type": "speech-update", "status": "stopped", "call": { "id": "call-3" } } });
    post_json(&app, "/webhook", &event).await;

    let after = registry.lookup("call-3").await.unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_missing_call_id_is_400() {
    let app = app_with(InMemoryRegistry::new(), None);
    let event = json!({ "message": { "type": "status-update", "status": "ended" } });

    let (status, body) = post_json(&app, "/webhook", &event).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing call id");
}

#[tokio::test]
async fn test_non_json_body_is_400() {
    let app = app_with(InMemoryRegistry::new(), None);
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_repeated_event_is_idempotent() {
    let registry = InMemoryRegistry::new();
    let app = app_with(registry.clone(), None);
    let event = status_event("call-4", "ended");

    post_json(&app, "/webhook", &event).await;
    let once = registry.lookup("call-4").await.unwrap().unwrap();
    post_json(&app, "/webhook", &event).await;
    let twice = registry.lookup("call-4").await.unwrap().unwrap();

    assert_eq!(once.status, twice.status);
    assert_eq!(once.analysis, twice.analysis);
    assert_eq!(once.result, twice.result);
    assert!(twice.updated_at >= once.updated_at);
}

#[tokio::test]
async fn test_concurrent_webhooks_for_distinct_calls() {
    let registry = InMemoryRegistry::new();
    let app = app_with(registry.clone(), None);

    let mut handles = Vec::new();
    for i in 0..50 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("call-{}", i);
            post_json(&app, "/webhook", &status_event(&id, "ringing")).await;
            post_json(&app, "/webhook", &status_event(&id, "ended")).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(registry.len().await, 50);
    for i in 0..50 {
        let (status, body) = get(&app, &format!("/calls/call-{}", i)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ended");
    }
}

#[tokio::test]
async fn test_shared_secret_is_enforced() {
    let app = app_with(InMemoryRegistry::new(), Some("s3cret"));

    let (status, _) = post_json(&app, "/webhook", &status_event("call-5", "queued")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-server-secret", "s3cret")
        .body(Body::from(status_event("call-5", "queued").to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&app, "/calls/call-5").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracked_calls"], 1);
}

#[tokio::test]
async fn test_wait_client_sees_webhook_over_http() {
    let registry = InMemoryRegistry::new();
    let app = app_with(registry.clone(), Some("s3cret"));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // the call ends a little after the client starts waiting
    let feeder = registry.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        feeder
            .record(callwatch::StatusUpdate::new("call-live", CallStatus::InProgress))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        feeder
            .record(callwatch::StatusUpdate::new("call-live", CallStatus::Ended))
            .await
            .unwrap();
    });

    let client = TrackerClient::new(format!("http://{}", addr), Some("s3cret".to_string()), Duration::from_secs(2)).unwrap();
    let policy = WaitPolicy::new(Duration::from_secs(10), Duration::from_millis(50));

    let started = Instant::now();
    let outcome = wait_for_completion(&client, "call-live", policy, &TokioClock).await;

    match outcome {
        WaitOutcome::Completed(record) => assert_eq!(record.status, CallStatus::Ended),
        other => panic!("expected completion, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_wait_client_times_out_without_webhooks() {
    let app = app_with(InMemoryRegistry::new(), None);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = TrackerClient::new(format!("http://{}", addr), None, Duration::from_secs(2)).unwrap();
    let policy = WaitPolicy::new(Duration::from_millis(300), Duration::from_millis(100));

    let started = Instant::now();
    let outcome = wait_for_completion(&client, "call-silent", policy, &TokioClock).await;
    let elapsed = started.elapsed();

    assert!(!outcome.is_completed());
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_secs(3));
}
