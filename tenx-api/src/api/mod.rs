//! HTTP API handlers

pub mod admin;
pub mod auth;
pub mod card_features;
pub mod health;
pub mod import;
pub mod projects;
pub mod sse;
pub mod templates;
pub mod videos;

pub use admin::admin_routes;
pub use auth::auth_routes;
pub use card_features::card_feature_routes;
pub use health::health_routes;
pub use import::import_routes;
pub use projects::project_routes;
pub use templates::template_routes;
pub use videos::video_routes;
