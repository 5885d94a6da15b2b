//! Test helper utilities
//!
//! Builds the full router over an in-memory database and wraps the
//! request/response plumbing shared by the integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tenx_api::AppState;
use tenx_common::config::TomlConfig;
use tower::util::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PASSWORD: &str = "correct horse battery";

/// Router plus the state behind it
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// Default test configuration: rate limiting off, one admin email
pub fn test_config() -> TomlConfig {
    let mut config = TomlConfig::default();
    config.rate_limit.enabled = false;
    config.auth.admin_emails = vec![ADMIN_EMAIL.to_string()];
    config
}

pub async fn test_app() -> TestApp {
    test_app_with(test_config()).await
}

pub async fn test_app_with(config: TomlConfig) -> TestApp {
    let pool = tenx_common::db::init_memory_database()
        .await
        .expect("Failed to create in-memory database");
    let state = AppState::new(pool, config, TEST_SECRET.to_string()).expect("Failed to build state");
    let router = tenx_api::build_router(state.clone());
    TestApp { router, state }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible")
    }

    /// JSON request; returns status and parsed body (`Null` when empty)
    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.send(json_request(method, uri, token, body)).await;
        let status = response.status();
        (status, extract_json(response).await)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, token, None).await
    }

    /// Register an account; returns its token and user id
    pub async fn register(&self, email: &str, name: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({"email": email, "password": PASSWORD, "name": name}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {}: {}", email, body);
        (
            body["token"].as_str().expect("token").to_string(),
            body["user"]["id"].as_str().expect("user id").to_string(),
        )
    }

    pub async fn register_admin(&self) -> (String, String) {
        self.register(ADMIN_EMAIL, "Admin").await
    }

    /// Create a card as `token`; returns the card body
    pub async fn create_card(&self, token: &str, title: &str, visibility: &str) -> Value {
        let (status, body) = self.post("/api/card-features", Some(token), card_body(title, visibility)).await;
        assert_eq!(status, StatusCode::CREATED, "create card: {}", body);
        body
    }
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&value).expect("serializable body"))
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid request")
}

pub async fn extract_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("readable body")
        .to_bytes();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

pub fn card_body(title: &str, visibility: &str) -> Value {
    json!({
        "title": title,
        "tech": "Rust",
        "language": "rust",
        "description": "A small example",
        "visibility": visibility,
        "screens": [{
            "name": "Main",
            "blocks": [
                {"type": "code", "content": "fn main() {}", "language": "rust"},
                {"type": "text", "content": "Entry point"}
            ]
        }],
        "tags": ["example"]
    })
}
