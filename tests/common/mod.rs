//! Common test utilities and helpers

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use chrono::{Duration, Utc};
use stackshare_core::{
    build_router, AppState, ConnectionMode, LibsqlStorage, MemoryObjectStore, ObjectStore,
    SessionSigner, Stack, StackId, StackShareConfig, StorageBackend, UserId,
};
use stackshare_core::utils::retry::RetryPolicy;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Create a file-backed LibSQL storage for testing
///
/// libSQL's `:memory:` mode is isolated per connection, so migrations would
/// not be visible to later queries.
pub async fn create_test_storage() -> (Arc<LibsqlStorage>, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir
        .path()
        .join(format!("stackshare_test_{}.db", uuid::Uuid::new_v4()));
    let storage = LibsqlStorage::new_with_validation(
        ConnectionMode::Local(path.to_string_lossy().to_string()),
        true,
    )
    .await
    .expect("Failed to create test storage");
    (Arc::new(storage), dir)
}

pub fn test_config() -> StackShareConfig {
    let mut config = StackShareConfig::default();
    config.auth.session_secret = TEST_SECRET.to_string();
    config
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub storage: Arc<LibsqlStorage>,
    pub objects: Arc<MemoryObjectStore>,
    _dir: TempDir,
}

/// Router over a fresh database with in-memory object storage and no retry delays
pub async fn test_app() -> TestApp {
    let (storage, dir) = create_test_storage().await;
    let objects = Arc::new(MemoryObjectStore::new());
    let state = AppState::new(
        storage.clone() as Arc<dyn StorageBackend>,
        Some(objects.clone() as Arc<dyn ObjectStore>),
        test_config(),
    )
    .with_retry(RetryPolicy::immediate(1));

    TestApp {
        router: build_router(state.clone()),
        state,
        storage,
        objects,
        _dir: dir,
    }
}

/// Session token for `user`, valid for an hour
pub fn token_for(user: UserId) -> String {
    SessionSigner::new(TEST_SECRET)
        .issue(user, Some("tester@example.com".to_string()), Duration::hours(1), Utc::now())
        .expect("Failed to issue token")
}

pub fn authed(builder: axum::http::request::Builder, user: UserId) -> axum::http::request::Builder {
    builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)))
}

pub fn json_request(method: &str, uri: &str, user: Option<UserId>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = authed(builder, user);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn empty_request(method: &str, uri: &str, user: Option<UserId>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = authed(builder, user);
    }
    builder.body(Body::empty()).expect("Failed to build request")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8_lossy(&bytes).to_string()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let text = body_text(response).await;
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("Invalid JSON ({}): {}", e, text))
}

pub fn make_stack(owner: UserId, name: &str, is_public: bool) -> Stack {
    let now = Utc::now();
    Stack {
        id: StackId::new(),
        user_id: owner,
        name: name.to_string(),
        description: None,
        purpose: None,
        is_public,
        views: 0,
        likes: 0,
        original_stack_id: None,
        original_author: None,
        created_at: now,
        updated_at: now,
    }
}
