//! Per-client rate limiting
//!
//! Clients are keyed by the first `X-Forwarded-For` address, else the
//! socket peer address, else a shared `unknown` bucket. `/api/auth/*`
//! requests draw from a second, stricter quota as well as the general one.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tenx_common::config::RateLimitConfig;
use tokio::task::JoinHandle;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Path prefix sharing the authentication quota
pub const AUTH_PREFIX: &str = "/api/auth/";

const UNKNOWN_CLIENT: &str = "unknown";

/// How often idle client entries are dropped
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// General and authentication quotas
pub struct RateLimiters {
    general: KeyedLimiter,
    auth: KeyedLimiter,
    clock: DefaultClock,
}

impl RateLimiters {
    /// `None` when rate limiting is disabled
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        let per_minute = |n: u32| Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN));
        Some(Self {
            general: RateLimiter::keyed(per_minute(config.requests_per_minute)),
            auth: RateLimiter::keyed(per_minute(config.auth_requests_per_minute)),
            clock: DefaultClock::default(),
        })
    }

    /// Take one request from the applicable quotas
    ///
    /// On refusal returns the seconds until the next request is allowed.
    pub fn check(&self, client: &str, path: &str) -> Result<(), u64> {
        let key = client.to_string();
        if path.starts_with(AUTH_PREFIX) {
            self.auth.check_key(&key).map_err(|not_until| self.retry_after(&not_until))?;
        }
        self.general.check_key(&key).map_err(|not_until| self.retry_after(&not_until))
    }

    /// Drop clients whose quota has fully replenished
    pub fn prune(&self) {
        for limiter in [&self.general, &self.auth] {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Number of tracked client entries across both quotas
    pub fn tracked_clients(&self) -> usize {
        self.general.len() + self.auth.len()
    }

    fn retry_after(&self, not_until: &governor::NotUntil<<DefaultClock as Clock>::Instant>) -> u64 {
        not_until.wait_time_from(self.clock.now()).as_secs().max(1)
    }
}

/// Prune `limiters` every `interval` until the runtime shuts down
pub fn spawn_pruner(limiters: Arc<RateLimiters>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let before = limiters.tracked_clients();
            limiters.prune();
            tracing::debug!(before, after = limiters.tracked_clients(), "Pruned rate limiter state");
        }
    })
}

/// Apply [`RateLimiters`] from the application state
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if let Some(limiters) = &state.rate_limiters {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client = client_key(request.headers(), peer);

        if let Err(retry_after_secs) = limiters.check(&client, request.uri().path()) {
            tracing::warn!(client = %client, path = %request.uri().path(), "Rate limit exceeded");
            return Err(ApiError::TooManyRequests { retry_after_secs });
        }
    }
    Ok(next.run(request).await)
}

/// Rate limit key for a request
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(addr), _) => addr.to_string(),
        (None, Some(peer)) => peer.ip().to_string(),
        (None, None) => UNKNOWN_CLIENT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(general: u32, auth: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            requests_per_minute: general,
            auth_requests_per_minute: auth,
        }
    }

    #[test]
    fn test_client_key_precedence() {
        let peer: SocketAddr = "10.0.0.7:5123".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers, None), "unknown");
        assert_eq!(client_key(&headers, Some(peer)), "10.0.0.7");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.9");
    }

    #[test]
    fn test_auth_quota_is_separate() {
        let limiters = RateLimiters::from_config(&config(100, 2)).unwrap();
        assert!(limiters.check("a", "/api/auth/login").is_ok());
        assert!(limiters.check("a", "/api/auth/login").is_ok());
        let retry = limiters.check("a", "/api/auth/login").unwrap_err();
        assert!(retry >= 1);

        // Other routes and other clients are unaffected
        assert!(limiters.check("a", "/api/videos").is_ok());
        assert!(limiters.check("b", "/api/auth/login").is_ok());
    }

    #[test]
    fn test_general_quota_exhausts() {
        let limiters = RateLimiters::from_config(&config(1, 10)).unwrap();
        assert!(limiters.check("c", "/api/videos").is_ok());
        assert!(limiters.check("c", "/api/videos").is_err());
    }

    #[test]
    fn test_prune_drops_idle_clients() {
        // 6000/min replenishes one request every 10ms
        let limiters = RateLimiters::from_config(&config(6000, 6000)).unwrap();
        for i in 0..50 {
            limiters.check(&format!("198.51.100.{}", i), "/api/auth/login").unwrap();
        }
        assert_eq!(limiters.tracked_clients(), 100);

        std::thread::sleep(Duration::from_millis(100));
        limiters.prune();
        assert_eq!(limiters.tracked_clients(), 0);
    }

    #[test]
    fn test_prune_keeps_limited_clients() {
        let limiters = RateLimiters::from_config(&config(1, 1)).unwrap();
        limiters.check("a", "/api/videos").unwrap();
        limiters.prune();
        assert_eq!(limiters.tracked_clients(), 1);
        assert!(limiters.check("a", "/api/videos").is_err());
    }

    #[tokio::test]
    async fn test_pruner_task_runs_on_interval() {
        let limiters = Arc::new(RateLimiters::from_config(&config(6000, 6000)).unwrap());
        limiters.check("203.0.113.1", "/api/videos").unwrap();
        assert_eq!(limiters.tracked_clients(), 1);

        let handle = spawn_pruner(limiters.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(limiters.tracked_clients(), 0);
        handle.abort();
    }

    #[test]
    fn test_disabled() {
        let mut disabled = config(1, 1);
        disabled.enabled = false;
        assert!(RateLimiters::from_config(&disabled).is_none());
    }
}
