// Tests for the HTTP routes (health, session listing, session status)

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::FakeEngines;
use loqa_interpreter::config::RelayConfig;
use loqa_interpreter::session::{LanguagePair, SessionState};
use loqa_interpreter::{create_router, AppState};
use std::sync::Arc;
use tower::ServiceExt;

fn app_state() -> AppState {
    let engines = Arc::new(FakeEngines::default());
    AppState::new(engines.engines(), RelayConfig::default())
}

async fn get(state: AppState, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = create_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_health_check() {
    let (status, body) = get(app_state(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_list_sessions_empty() {
    let (status, body) = get(app_state(), "/sessions").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, serde_json::json!([]));
}

#[tokio::test]
async fn test_session_status() {
    let state = app_state();
    let session = Arc::new(SessionState::new("session-1", LanguagePair::new("en", "es")));
    state.sessions.register(session).await;

    let (status, body) = get(state.clone(), "/sessions/session-1/status").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["session_id"], "session-1");
    assert_eq!(json["stage"], "idle");
    assert_eq!(json["source_language"], "en");
    assert_eq!(json["target_language"], "es");
    assert_eq!(json["is_processing"], false);

    let (status, body) = get(state, "/sessions").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let (status, body) = get(app_state(), "/sessions/missing/status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Session missing not found");
}

#[tokio::test]
async fn test_ws_requires_upgrade() {
    let (status, _) = get(app_state(), "/ws").await;
    assert!(status.is_client_error());
}
