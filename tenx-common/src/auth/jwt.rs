//! HS256 JSON Web Tokens
//!
//! # Format
//!
//! `base64url(header) "." base64url(claims) "." base64url(signature)`
//!
//! - Header is always `{"alg":"HS256","typ":"JWT"}`
//! - Signature is HMAC-SHA256 over the first two segments joined by `.`
//! - All segments use URL-safe base64 without padding
//!
//! Only HS256 is accepted when decoding; a token announcing any other
//! algorithm (including `none`) is rejected before the signature is checked.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::{AuthError, Role};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

// ========================================
// Token Types
// ========================================

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

/// Token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiry (Unix seconds)
    pub exp: i64,
}

impl Claims {
    /// Claims for a user, valid for `ttl_secs` from `now`
    pub fn new(sub: Uuid, email: impl Into<String>, role: Role, now: i64, ttl_secs: i64) -> Self {
        Self {
            sub,
            email: email.into(),
            role,
            iat: now,
            exp: now + ttl_secs,
        }
    }
}

// ========================================
// Encoding
// ========================================

/// Sign claims into a compact token
///
/// # Examples
///
/// ```
/// use tenx_common::auth::{decode_token, encode_token, Claims, Role};
/// use uuid::Uuid;
///
/// let claims = Claims::new(Uuid::new_v4(), "dev@example.com", Role::User, 1_700_000_000, 3600);
/// let token = encode_token(&claims, "a-secret-that-is-long-enough-for-hs256").unwrap();
///
/// assert_eq!(token.split('.').count(), 3);
/// let decoded = decode_token(&token, "a-secret-that-is-long-enough-for-hs256", 1_700_000_100).unwrap();
/// assert_eq!(decoded, claims);
/// ```
pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    let header = Header {
        alg: ALGORITHM.to_string(),
        typ: Some("JWT".to_string()),
    };

    let header_json =
        serde_json::to_vec(&header).map_err(|e| AuthError::MalformedToken(e.to_string()))?;
    let claims_json =
        serde_json::to_vec(claims).map_err(|e| AuthError::MalformedToken(e.to_string()))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );
    let signature = sign(signing_input.as_bytes(), secret)?;

    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

fn sign(input: &[u8], secret: &str) -> Result<Vec<u8>, AuthError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidKey)?;
    mac.update(input);
    Ok(mac.finalize().into_bytes().to_vec())
}

// ========================================
// Decoding and Verification
// ========================================

/// Verify a token and return its claims
///
/// # Checks (in order)
///
/// 1. Exactly three non-empty segments
/// 2. Header decodes and names HS256
/// 3. Signature matches (constant-time comparison)
/// 4. Claims decode
/// 5. `exp` is strictly greater than `now`
pub fn decode_token(token: &str, secret: &str, now: i64) -> Result<Claims, AuthError> {
    let mut parts = token.split('.');
    let (header_b64, claims_b64, signature_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(c), Some(s), None) if !h.is_empty() && !c.is_empty() && !s.is_empty() => (h, c, s),
        _ => {
            return Err(AuthError::MalformedToken(
                "expected three dot-separated segments".to_string(),
            ))
        }
    };

    let header: Header = decode_segment(header_b64, "header")?;
    if header.alg != ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm(header.alg));
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|e| AuthError::MalformedToken(format!("signature: {}", e)))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidKey)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AuthError::InvalidSignature)?;

    let claims: Claims = decode_segment(claims_b64, "claims")?;
    if claims.exp <= now {
        return Err(AuthError::Expired);
    }

    Ok(claims)
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str, name: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::MalformedToken(format!("{}: {}", name, e)))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::MalformedToken(format!("{}: {}", name, e)))
}

// ========================================
// Tests
// ========================================
