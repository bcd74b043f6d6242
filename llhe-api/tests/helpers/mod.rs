//! Shared setup for HTTP integration tests
//!
//! Each test gets an in-memory database, a temp media root and a router
//! built exactly as the binary builds it.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::Duration;
use llhe_api::ai::AiServices;
use llhe_api::db::users;
use llhe_api::storage::{LocalStorage, MediaStorage};
use llhe_api::{build_router, AppState};
use llhe_common::config::Config;
use llhe_common::db::open_in_memory;
use llhe_common::models::User;
use llhe_common::time::now;
use llhe_common::tokens::{generate_token, hash_token};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const ADMIN_EMAIL: &str = "moderator@example.com";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    /// Media root; must outlive the test
    pub media_dir: TempDir,
}

pub fn test_config(media_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.root = media_dir.path().to_path_buf();
    config.storage.signing_secret = "test-signing-secret".to_string();
    config.storage.max_upload_bytes = 1024;
    config.auth.admin_emails = vec![ADMIN_EMAIL.to_string()];
    config.auth.expose_login_link = true;
    config
}

/// App with rule-based AI and local storage
pub async fn test_app() -> TestApp {
    test_app_with(AiServices::rules(), None).await
}

/// App with custom AI providers and, optionally, a custom storage backend
pub async fn test_app_with(ai: AiServices, storage: Option<Arc<dyn MediaStorage>>) -> TestApp {
    let media_dir = TempDir::new().expect("Should create temp dir");
    let config = test_config(&media_dir);
    let db = open_in_memory().await.expect("Should open in-memory database");
    let storage = storage.unwrap_or_else(|| Arc::new(LocalStorage::new(media_dir.path())) as Arc<dyn MediaStorage>);

    let state = AppState::new(db, config, ai, storage);
    let router = build_router(state.clone());
    TestApp {
        state,
        router,
        media_dir,
    }
}

/// Create a user with a live session, returning the bearer token
pub async fn create_user_session(state: &AppState, email: &str) -> (User, String) {
    let user = users::upsert_by_email(&state.db, email)
        .await
        .expect("Should create user");
    let token = generate_token();
    users::create_session(&state.db, &hash_token(&token), user.id, now() + Duration::hours(1))
        .await
        .expect("Should create session");
    (user, token)
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

/// Extract JSON body from response
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Create a fragment through the API, returning its JSON
pub async fn create_fragment(app: &TestApp, token: &str, body: Value) -> Value {
    let response = send(app, json_request("POST", "/api/fragments", Some(token), Some(body))).await;
    assert_eq!(response.status(), 201, "fragment creation should succeed");
    body_json(response).await
}

pub fn fragment_body(title: &str, content: &str) -> Value {
    serde_json::json!({
        "title": title,
        "content": content,
        "event_at": "2019-07-04T12:00:00Z",
    })
}
