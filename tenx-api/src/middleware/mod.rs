//! HTTP middleware
//!
//! Order, outermost first: body limit, CORS, security headers, trace,
//! rate limit, content type, sanitization, then per-route authentication
//! and admin gating. The router assembly in `lib.rs` applies them.

pub mod auth;
pub mod content_type;
pub mod extract;
pub mod rate_limit;
pub mod sanitize;
pub mod security_headers;

pub use auth::{auth_middleware, optional_auth_middleware, require_admin, AdminUser};
pub use content_type::require_json_content_type;
pub use extract::ApiJson;
pub use rate_limit::{rate_limit_middleware, RateLimiters};
pub use sanitize::sanitize_json_body;
