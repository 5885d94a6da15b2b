//! GitHub import integration tests
//!
//! A local axum server stands in for the GitHub zipball endpoint.

mod helpers;

use axum::{
    body::{Body, Bytes},
    extract::Path,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use helpers::{extract_json, json_request, test_app_with, test_config, TestApp};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;
use zip::write::SimpleFileOptions;

/// Zip laid out like a GitHub zipball: everything under one top-level folder
fn repo_zip() -> Vec<u8> {
    let files: &[(&str, &str)] = &[
        ("README.md", "# Acme App\n\nA small demo application for testing imports.\n"),
        ("package.json", r#"{"name": "acme-app", "dependencies": {"react": "^18.2.0"}}"#),
        ("src/index.js", "import App from './components/App';\n"),
        ("src/components/App.jsx", "export default function App() { return <Header />; }\n"),
        ("src/components/Header.jsx", "export function Header() { return <h1>Acme</h1>; }\n"),
        ("src/api/client.js", "export const get = (url) => fetch(url).then(r => r.json());\n"),
        ("logo.png", "\u{89}PNG not really"),
        ("node_modules/react/index.js", "module.exports = {};\n"),
    ];

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (path, content) in files {
        writer.start_file(format!("acme-app-1a2b3c/{}", path), options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

async fn zipball(Path((_owner, repo)): Path<(String, String)>) -> Response {
    match repo.as_str() {
        "missing" => StatusCode::NOT_FOUND.into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            repo_zip().into_response()
        }
        // Streamed without a Content-Length header
        "chunked" => {
            let chunks: Vec<Result<Bytes, std::io::Error>> = repo_zip()
                .chunks(16)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect();
            Body::from_stream(futures::stream::iter(chunks)).into_response()
        }
        _ => ([(header::CONTENT_TYPE, "application/zip")], repo_zip()).into_response(),
    }
}

async fn zipball_branch(Path((owner, repo, _branch)): Path<(String, String, String)>) -> Response {
    zipball(Path((owner, repo))).await
}

/// Serve fake zipballs on an ephemeral port
async fn spawn_github() -> SocketAddr {
    let router = Router::new()
        .route("/repos/:owner/:repo/zipball", get(zipball))
        .route("/repos/:owner/:repo/zipball/*branch", get(zipball_branch));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn import_app() -> TestApp {
    import_app_with(test_config()).await
}

async fn import_app_with(mut config: tenx_common::config::TomlConfig) -> TestApp {
    let addr = spawn_github().await;
    config.github.api_base = format!("http://{}", addr);
    test_app_with(config).await
}

async fn chat_ok() -> Json<Value> {
    Json(json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": r#"{"title": "AI title", "description": "AI description"}"#
            }
        }]
    }))
}

async fn chat_garbled() -> Json<Value> {
    Json(json!({
        "choices": [{"message": {"role": "assistant", "content": "Sure! Here is a title for you."}}]
    }))
}

async fn chat_broken() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
}

/// Serve a fake chat completions API under `/ok`, `/garbled` and `/broken`
async fn spawn_llm() -> SocketAddr {
    let router = Router::new()
        .route("/ok/chat/completions", post(chat_ok))
        .route("/garbled/chat/completions", post(chat_garbled))
        .route("/broken/chat/completions", post(chat_broken));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Run an AI-assisted import against the given LLM stub path; returns the job and the cards
async fn ai_import(llm_path: &str) -> (Value, Vec<Value>) {
    let llm_addr = spawn_llm().await;
    let mut config = test_config();
    config.llm.enabled = true;
    config.llm.endpoint = format!("http://{}/{}", llm_addr, llm_path);
    config.llm.api_key = Some("sk-test".to_string());
    let app = import_app_with(config).await;
    let (token, _) = app.register("alice@example.com", "Alice").await;

    let (status, body) = app
        .post(
            "/api/card-features/import-github",
            Some(&token),
            json!({"url": "https://github.com/acme/app", "use_ai": true}),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{}", body);

    let job = wait_for_job(&app, &token, body["job_id"].as_str().unwrap()).await;
    let (_, page) = app.get("/api/card-features?mine=true&limit=100", Some(&token)).await;
    (job, page["data"].as_array().unwrap().clone())
}

/// Poll a job until it reaches a terminal status
async fn wait_for_job(app: &TestApp, token: &str, job_id: &str) -> Value {
    for _ in 0..200 {
        let (status, job) = app.get(&format!("/api/import-jobs/{}", job_id), Some(token)).await;
        assert_eq!(status, StatusCode::OK);
        if matches!(job["status"].as_str(), Some("done" | "error" | "cancelled")) {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("import job {} did not finish", job_id);
}

#[tokio::test]
async fn test_import_creates_private_approved_cards() {
    let app = import_app().await;
    let (token, user_id) = app.register("alice@example.com", "Alice").await;

    let (status, body) = app
        .post(
            "/api/card-features/import-github",
            Some(&token),
            json!({"url": "https://github.com/acme/app"}),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{}", body);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let job = wait_for_job(&app, &token, &job_id).await;
    assert_eq!(job["status"], "done", "{}", job);
    assert_eq!(job["progress"], 100);
    assert_eq!(job["repo_url"], "https://github.com/acme/app");
    let created = job["cards_created"].as_i64().unwrap();
    assert!(created > 0);

    let (_, page) = app.get("/api/card-features?mine=true&limit=100", Some(&token)).await;
    let cards = page["data"].as_array().unwrap();
    assert_eq!(cards.len() as i64, created);
    for card in cards {
        assert_eq!(card["visibility"], "private");
        assert_eq!(card["approval_status"], "approved");
        assert_eq!(card["created_by"], user_id.as_str());
        assert!(card["tags"].as_array().unwrap().contains(&json!("imported")));
    }

    // Dependency and binary files never become screens
    let paths: Vec<String> = cards
        .iter()
        .flat_map(|c| c["screens"].as_array().unwrap().clone())
        .flat_map(|s| s["blocks"].as_array().unwrap().clone())
        .filter_map(|b| b["route"].as_str().map(str::to_string))
        .collect();
    assert!(paths.iter().all(|p| !p.contains("node_modules") && !p.ends_with(".png")));

    // Private imports stay out of the public listing
    let (_, public) = app.get("/api/card-features", None).await;
    assert_eq!(public["total"], 0);

    let (_, jobs) = app.get("/api/import-jobs", Some(&token)).await;
    assert_eq!(jobs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_import_with_branch_url() {
    let app = import_app().await;
    let (token, _) = app.register("alice@example.com", "Alice").await;

    let (status, body) = app
        .post(
            "/api/card-features/import-github",
            Some(&token),
            json!({"url": "https://github.com/acme/app/tree/develop"}),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{}", body);

    let job = wait_for_job(&app, &token, body["job_id"].as_str().unwrap()).await;
    assert_eq!(job["status"], "done", "{}", job);
    assert_eq!(job["branch"], "develop");
}

#[tokio::test]
async fn test_missing_repository_fails_job() {
    let app = import_app().await;
    let (token, _) = app.register("alice@example.com", "Alice").await;

    let (_, body) = app
        .post(
            "/api/card-features/import-github",
            Some(&token),
            json!({"url": "https://github.com/acme/missing"}),
        )
        .await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let job = wait_for_job(&app, &token, &job_id).await;
    assert_eq!(job["status"], "error");
    assert!(job["error"].as_str().unwrap().contains("not found"), "{}", job);
    assert_eq!(job["cards_created"], 0);

    // Event stream of a finished job sends the snapshot and closes
    let response = app
        .send(json_request(
            Method::GET,
            &format!("/api/import-jobs/{}/events", job_id),
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    let Value::String(stream) = extract_json(response).await else {
        panic!("expected a text event stream");
    };
    assert!(stream.contains("event: ImportJobUpdated"), "{}", stream);
    assert!(stream.contains(r#""status":"error""#), "{}", stream);

    // Terminal jobs cannot be cancelled
    let (status, _) = app
        .post(&format!("/api/import-jobs/{}/cancel", job_id), Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_one_active_import_per_user_and_cancel() {
    let app = import_app().await;
    let (token, _) = app.register("alice@example.com", "Alice").await;
    let (other_token, _) = app.register("bob@example.com", "Bob").await;

    let (status, body) = app
        .post(
            "/api/card-features/import-github",
            Some(&token),
            json!({"url": "https://github.com/acme/slow"}),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(
            "/api/card-features/import-github",
            Some(&token),
            json!({"url": "https://github.com/acme/app"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Jobs are private to their owner
    let (status, _) = app.get(&format!("/api/import-jobs/{}", job_id), Some(&other_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .post(&format!("/api/import-jobs/{}/cancel", job_id), Some(&other_token), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, job) = app
        .post(&format!("/api/import-jobs/{}/cancel", job_id), Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", job);
    assert_eq!(job["status"], "cancelled");

    let job = wait_for_job(&app, &token, &job_id).await;
    assert_eq!(job["status"], "cancelled");

    // A new import is allowed once the previous one is terminal
    let (status, _) = app
        .post(
            "/api/card-features/import-github",
            Some(&token),
            json!({"url": "https://github.com/acme/app"}),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_import_request_validation() {
    let app = import_app().await;
    let (token, _) = app.register("alice@example.com", "Alice").await;

    for url in ["https://gitlab.com/acme/app", "not a url", "https://github.com/acme", ""] {
        let (status, body) = app
            .post("/api/card-features/import-github", Some(&token), json!({"url": url}))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}: {}", url, body);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    let (status, _) = app
        .post("/api/card-features/import-github", None, json!({"url": "https://github.com/acme/app"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ai_import_uses_llm_text() {
    let (job, cards) = ai_import("ok").await;
    assert_eq!(job["status"], "done", "{}", job);
    assert!(!cards.is_empty());
    for card in &cards {
        assert_eq!(card["title"], "AI title");
        assert_eq!(card["description"], "AI description");
    }
}

#[tokio::test]
async fn test_ai_import_falls_back_to_generated_text() {
    for llm_path in ["broken", "garbled"] {
        let (job, cards) = ai_import(llm_path).await;
        assert_eq!(job["status"], "done", "{}: {}", llm_path, job);
        assert_eq!(job["cards_created"].as_i64().unwrap(), cards.len() as i64);

        let titles: Vec<&str> = cards.iter().filter_map(|c| c["title"].as_str()).collect();
        assert!(titles.contains(&"app overview"), "{}: {:?}", llm_path, titles);
        assert!(titles.contains(&"app: Components"), "{}: {:?}", llm_path, titles);
        assert!(!titles.contains(&"AI title"));
    }
}

#[tokio::test]
async fn test_event_stream_follows_job_until_cancelled() {
    let app = import_app().await;
    let (token, _) = app.register("alice@example.com", "Alice").await;

    let (_, body) = app
        .post(
            "/api/card-features/import-github",
            Some(&token),
            json!({"url": "https://github.com/acme/slow"}),
        )
        .await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let response = app
        .send(json_request(
            Method::GET,
            &format!("/api/import-jobs/{}/events", job_id),
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body();

    // First frame is the snapshot of the running job
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("snapshot frame")
        .expect("stream open")
        .unwrap();
    let snapshot = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(snapshot.contains("event: ImportJobUpdated"), "{}", snapshot);
    assert!(!snapshot.contains(r#""status":"cancelled""#), "{}", snapshot);

    let (status, _) = app
        .post(&format!("/api/import-jobs/{}/cancel", job_id), Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    // The stream delivers the cancellation and then ends on its own
    let rest = tokio::time::timeout(Duration::from_secs(5), body.collect())
        .await
        .expect("stream should close after the terminal update")
        .unwrap()
        .to_bytes();
    let rest = String::from_utf8(rest.to_vec()).unwrap();
    assert!(rest.contains(r#""status":"cancelled""#), "{}", rest);
}

#[tokio::test]
async fn test_oversized_archive_fails_job() {
    let mut config = test_config();
    config.import.max_archive_bytes = 64;
    let app = import_app_with(config).await;
    let (token, _) = app.register("alice@example.com", "Alice").await;

    // "app" is sent with a Content-Length; "chunked" has to be counted as it streams
    for repo in ["app", "chunked"] {
        let (status, body) = app
            .post(
                "/api/card-features/import-github",
                Some(&token),
                json!({"url": format!("https://github.com/acme/{}", repo)}),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED, "{}", body);

        let job = wait_for_job(&app, &token, body["job_id"].as_str().unwrap()).await;
        assert_eq!(job["status"], "error", "{}: {}", repo, job);
        assert!(job["error"].as_str().unwrap().contains("exceeds"), "{}: {}", repo, job);
        assert_eq!(job["cards_created"], 0);
    }
}
