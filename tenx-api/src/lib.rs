//! tenx-api library interface
//!
//! Exposes the router and application state for the binary and for
//! integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod services;
pub mod utils;
pub mod validation;

pub use crate::error::{ApiError, ApiResult};

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tenx_common::config::{CorsConfig, TomlConfig};
use tenx_common::events::EventBus;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::middleware::RateLimiters;
use crate::services::{GithubClient, LlmClient};

/// Broadcast capacity of the event bus
pub const EVENT_BUS_CAPACITY: usize = 256;

const CORS_MAX_AGE_SECS: u64 = 3600;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub config: Arc<TomlConfig>,
    /// Token signing secret, resolved once at startup
    pub jwt_secret: Arc<String>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Cancellation tokens for running import jobs
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// `None` when rate limiting is disabled
    pub rate_limiters: Option<Arc<RateLimiters>>,
    pub github: GithubClient,
    /// `None` unless an LLM endpoint is enabled and has credentials
    pub llm: Option<LlmClient>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: TomlConfig, jwt_secret: String) -> anyhow::Result<Self> {
        let github = GithubClient::new(&config.github)?;

        let llm = if config.llm.is_configured() {
            tracing::info!(endpoint = %config.llm.endpoint, model = %config.llm.model, "LLM rewording enabled");
            Some(LlmClient::new(&config.llm)?)
        } else {
            tracing::info!("LLM not configured; imports use heuristic card text");
            None
        };

        let rate_limiters = RateLimiters::from_config(&config.rate_limit).map(Arc::new);
        if rate_limiters.is_none() {
            tracing::warn!("Rate limiting disabled");
        }

        Ok(Self {
            db,
            config: Arc::new(config),
            jwt_secret: Arc::new(jwt_secret),
            event_bus: EventBus::new(EVENT_BUS_CAPACITY),
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            rate_limiters,
            github,
            llm,
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
///
/// Layers, outermost first: body limit, CORS, security headers, trace, then
/// (on `/api` routes only) rate limit, content type and sanitization.
/// Authentication is applied per route group inside each `*_routes`.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware::{from_fn, from_fn_with_state};

    let api = Router::new()
        .merge(api::auth_routes(state.clone()))
        .merge(api::card_feature_routes(state.clone()))
        .merge(api::import_routes(state.clone()))
        .merge(api::video_routes(state.clone()))
        .merge(api::project_routes(state.clone()))
        .merge(api::template_routes(state.clone()))
        .merge(api::admin_routes(state.clone()))
        .layer(from_fn(middleware::sanitize_json_body))
        .layer(from_fn(middleware::require_json_content_type))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit_middleware));

    let app = Router::new()
        .merge(api::health_routes())
        .merge(api)
        .layer(TraceLayer::new_for_http());

    middleware::security_headers::apply(app)
        .layer(cors_layer(&state.config.cors))
        .layer(RequestBodyLimitLayer::new(state.config.server.max_body_bytes))
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS))
}
