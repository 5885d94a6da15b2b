//! Authentication primitives
//!
//! Contains ONLY pure functions and shared types:
//! - HS256 token encoding and verification ([`jwt`])
//! - Password hashing ([`password`])
//!
//! HTTP middleware lives in the API crate and wraps these functions.

pub mod jwt;
pub mod password;

pub use jwt::{decode_token, encode_token, Claims};
pub use password::{hash_password, verify_password, verify_without_account};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Token is not three base64url segments of valid JSON
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Header names an algorithm other than HS256
    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signature does not match the payload
    #[error("Invalid token signature")]
    InvalidSignature,

    /// `exp` is not in the future
    #[error("Token expired")]
    Expired,

    /// Signing key could not be used
    #[error("Invalid signing key")]
    InvalidKey,

    /// Password hashing backend failure
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
