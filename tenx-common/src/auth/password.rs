//! Password hashing (argon2id, PHC string format)

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::sync::OnceLock;

use super::AuthError;

/// Hash a password into a PHC string (`$argon2id$v=19$...`)
///
/// CPU-bound; async callers should run it on a blocking thread.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Check a password against a stored PHC string
///
/// An unparseable stored hash verifies as `false`.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is not a valid PHC string: {}", e);
            false
        }
    }
}

const DECOY_PASSWORD: &str = "tenx-decoy-password";

/// Hash checked when a login names no account, built on first use
static DECOY_HASH: OnceLock<Option<String>> = OnceLock::new();

/// Run the argon2 verification a real login would, for an email with no account
///
/// Always returns `false`. Login latency then does not reveal whether an
/// email is registered.
pub fn verify_without_account(password: &str) -> bool {
    let decoy = DECOY_HASH.get_or_init(|| hash_password(DECOY_PASSWORD).ok());
    if let Some(hash) = decoy {
        let _ = verify_password(password, hash);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong horse battery", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_does_not_verify() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_missing_account_never_verifies() {
        assert!(!verify_without_account("anything"));
        assert!(!verify_without_account(DECOY_PASSWORD));

        // The decoy is a real argon2 hash, so the work matches a stored one
        let decoy = DECOY_HASH.get().unwrap().as_deref().unwrap();
        assert!(decoy.starts_with("$argon2id$"));
        assert!(verify_password(DECOY_PASSWORD, decoy));
    }
}
