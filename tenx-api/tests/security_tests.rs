//! Integration tests for the middleware chain
//!
//! Content type, sanitization, body limits, rate limiting, security
//! headers and token handling.

mod helpers;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use helpers::{extract_json, json_request, test_app, test_app_with, test_config, PASSWORD, TEST_SECRET};
use serde_json::{json, Value};
use tenx_common::auth::{encode_token, Claims, Role};

#[tokio::test]
async fn test_non_json_body_rejected_with_415() {
    let app = test_app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("email=a@example.com"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = extract_json(response).await;
    assert_eq!(body["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");
}

#[tokio::test]
async fn test_bodiless_post_passes_content_type_check() {
    let app = test_app().await;
    let (token, _) = app.register("alice@example.com", "Alice").await;

    // No body and no content type: reaches the handler, which 404s
    let request = json_request(
        Method::POST,
        &format!("/api/import-jobs/{}/cancel", uuid::Uuid::new_v4()),
        Some(&token),
        None,
    );
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_control_characters_stripped() {
    let app = test_app().await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({"email": "ctl@example.com", "password": PASSWORD, "name": "Ev\u{0007}il\u{0000}\tName"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["name"], "Evil\tName");
}

#[tokio::test]
async fn test_deeply_nested_json_rejected() {
    let app = test_app().await;

    let mut nested = json!("leaf");
    for _ in 0..40 {
        nested = json!({ "a": nested });
    }
    let (status, body) = app
        .post("/api/auth/login", None, json!({"email": "x@example.com", "password": nested}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_malformed_json_is_400_and_wrong_shape_is_422() {
    let app = test_app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\": "))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/api/auth/login", None, json!({"email": 42})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_oversized_body_rejected_with_413() {
    let mut config = test_config();
    config.server.max_body_bytes = 1024;
    let app = test_app_with(config).await;

    let big = json!({"email": "a@example.com", "password": "x".repeat(4096)});
    let (status, _) = app.post("/api/auth/login", None, big).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_auth_rate_limit_returns_retry_after() {
    let mut config = test_config();
    config.rate_limit.enabled = true;
    config.rate_limit.auth_requests_per_minute = 2;
    let app = test_app_with(config).await;

    let login = || json!({"email": "nobody@example.com", "password": PASSWORD});
    for _ in 0..2 {
        let (status, _) = app.post("/api/auth/login", None, login()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let response = app
        .send(json_request(Method::POST, "/api/auth/login", None, Some(login())))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    // Another client has its own bucket
    let mut request = json_request(Method::POST, "/api/auth/login", None, Some(login()));
    request
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
    assert_eq!(app.send(request).await.status(), StatusCode::UNAUTHORIZED);

    // Non-auth routes use the general quota; health is never limited
    let (status, _) = app.get("/api/card-features", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = test_app().await;

    for uri in ["/health", "/api/card-features", "/no-such-route"] {
        let response = app.send(json_request(Method::GET, uri, None, None)).await;
        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff", "{}", uri);
        assert_eq!(headers["x-frame-options"], "DENY", "{}", uri);
        assert_eq!(headers["referrer-policy"], "no-referrer", "{}", uri);
        assert_eq!(
            headers["content-security-policy"],
            "default-src 'none'; frame-ancestors 'none'",
            "{}",
            uri
        );
        assert_eq!(
            headers["strict-transport-security"],
            "max-age=15552000; includeSubDomains",
            "{}",
            uri
        );
        assert_eq!(headers["cross-origin-resource-policy"], "same-origin", "{}", uri);
    }
}

#[tokio::test]
async fn test_cors_preflight_for_allowed_origin() {
    let app = test_app().await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/card-features")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/card-features")
        .header(header::ORIGIN, "https://evil.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_token_failures_are_401() {
    let app = test_app().await;
    let (_, user_id) = app.register("alice@example.com", "Alice").await;

    // Missing token on a protected route
    let (status, _) = app.get("/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Garbage token, even on a route that allows anonymous access
    let (status, body) = app.get("/api/card-features", Some("not.a.token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    // Expired token
    let user_id: uuid::Uuid = user_id.parse().unwrap();
    let issued = chrono::Utc::now().timestamp() - 7200;
    let expired = encode_token(
        &Claims::new(user_id, "alice@example.com", Role::User, issued, 3600),
        TEST_SECRET,
    )
    .unwrap();
    let (status, _) = app.get("/api/auth/me", Some(&expired)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Signed with another secret
    let forged = encode_token(
        &Claims::new(user_id, "alice@example.com", Role::Admin, chrono::Utc::now().timestamp(), 3600),
        "some-other-secret-that-is-long-enough",
    )
    .unwrap();
    let (status, _) = app.get("/api/admin/stats", Some(&forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_claim_in_token_is_not_trusted() {
    let app = test_app().await;
    let (_, user_id) = app.register("alice@example.com", "Alice").await;

    // Correctly signed, claims admin, but the account is a plain user
    let token = encode_token(
        &Claims::new(
            user_id.parse().unwrap(),
            "alice@example.com",
            Role::Admin,
            chrono::Utc::now().timestamp(),
            3600,
        ),
        TEST_SECRET,
    )
    .unwrap();
    let (status, body): (StatusCode, Value) = app.get("/api/admin/stats", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);
}
