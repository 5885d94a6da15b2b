//! # 10xDev Common Library
//!
//! Shared code for the 10xDev backend including:
//! - Configuration loading (TOML + environment overrides)
//! - Authentication primitives (HS256 tokens, password hashing)
//! - Database initialization, schema and migrations
//! - Event types and the in-process event bus
//! - SSE helpers

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
