//! WebSocket upgrade authentication tests
//!
//! These requests never carry a real upgrade, so they only observe what
//! happens before the socket is handed to the hub.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use crate::common::{access_token, body_json, TestApp};

#[tokio::test]
async fn test_upgrade_without_token_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app.get("/ws").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], 10003);
}

#[tokio::test]
async fn test_upgrade_with_garbage_token_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app.get_auth("/ws", "not-a-jwt").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upgrade_with_expired_token_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app.get_auth("/ws", &access_token(7, -3600)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_query_token_is_checked() {
    let app = TestApp::new().await;

    let response = app.get("/ws?token=not-a-jwt").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_token_passes_authentication() {
    let app = TestApp::new().await;

    // Past auth, the upgrade extractor rejects the plain GET
    let response = app.get(&format!("/ws?token={}", access_token(7, 600))).await;

    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.hub.connection_count().await.unwrap(), 0);
}
