//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Process is serving requests ("ok")
    pub status: String,
    /// Module name ("tenx-api")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// "ok" or "error"
    pub database: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
}

/// GET /health
///
/// No authentication and no rate limit; the database is checked with a
/// trivial query.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    let database_ok = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check database query failed");
            false
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "tenx-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database_ok { "ok" } else { "error" }.to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
