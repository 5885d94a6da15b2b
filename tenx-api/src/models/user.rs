//! Account models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenx_common::auth::Role;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::validation::{is_valid_email, Validator};

pub const MIN_PASSWORD_CHARS: usize = 8;
pub const MAX_PASSWORD_CHARS: usize = 128;
pub const MAX_NAME_CHARS: usize = 100;

/// Public account representation (never includes the password hash)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Authenticated caller, inserted into request extensions by the auth middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owner of a resource, or an administrator
    pub fn can_manage(&self, owner: Option<Uuid>) -> bool {
        self.is_admin() || owner == Some(self.id)
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> ApiResult<()> {
        let mut v = Validator::new();
        v.check(is_valid_email(self.email.trim()), "email", "must be a valid email address");
        validate_password(&mut v, &self.password);
        v.length("name", &self.name, 1, MAX_NAME_CHARS);
        v.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub password: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> ApiResult<()> {
        let mut v = Validator::new();
        v.optional_length("name", self.name.as_deref(), 1, MAX_NAME_CHARS);
        if let Some(password) = &self.password {
            validate_password(&mut v, password);
        }
        v.finish()
    }
}

fn validate_password(v: &mut Validator, password: &str) {
    // Passwords are not trimmed; whitespace is significant
    let len = password.chars().count();
    v.check(
        (MIN_PASSWORD_CHARS..=MAX_PASSWORD_CHARS).contains(&len),
        "password",
        format!(
            "must be between {} and {} characters",
            MIN_PASSWORD_CHARS, MAX_PASSWORD_CHARS
        ),
    );
}

/// Successful register/login response
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}
