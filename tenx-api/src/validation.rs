//! Request field validation
//!
//! Collects every field failure of a request so clients can show them all
//! at once, then converts into [`ApiError::Validation`].

use crate::error::{ApiError, ApiResult, FieldError};

/// Accumulates field errors
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Record `message` unless `ok`
    pub fn check(&mut self, ok: bool, field: impl Into<String>, message: impl Into<String>) {
        if !ok {
            self.add(field, message);
        }
    }

    /// Character count of `value` (trimmed) must fall within `min..=max`
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.trim().chars().count();
        if len < min {
            if min == 1 {
                self.add(field, "is required");
            } else {
                self.add(field, format!("must be at least {} characters", min));
            }
        } else if len > max {
            self.add(field, format!("must be at most {} characters", max));
        }
    }

    /// Like [`Validator::length`] for optional fields; `None` always passes
    pub fn optional_length(&mut self, field: &str, value: Option<&str>, min: usize, max: usize) {
        if let Some(value) = value {
            self.length(field, value, min, max);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing failed
    pub fn finish(self) -> ApiResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

/// Minimal address shape check: `local@domain.tld`
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && tld.len() >= 2 && !host.starts_with('.') && !host.ends_with('.'),
        None => false,
    }
}

/// Lowercased, trimmed email
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
