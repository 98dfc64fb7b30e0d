//! Cryptographic helpers for the session token.
//!
//! HMAC-SHA256 signed claims (`{sub, iat, exp}`) carried in the `token`
//! cookie, plus random state tokens for the OAuth round trip. Pure Rust
//! crates, no I/O — callers pass in the current unix time.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::ServiceError;

/// Token header (always HS256).
const TOKEN_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Session token expiry: 7 days in seconds.
pub const TOKEN_TTL_SECS: u64 = 7 * 24 * 3600;

/// Sign a session token binding the given email. Returns the encoded token.
pub fn sign_token(email: &str, secret: &str, now_unix: u64) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(TOKEN_HEADER.as_bytes());

    let payload = serde_json::json!({
        "sub": email,
        "iat": now_unix,
        "exp": now_unix + TOKEN_TTL_SECS,
    })
    .to_string();
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload.as_bytes());

    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = hmac_sha256(secret.as_bytes(), signing_input.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature);

    format!("{signing_input}.{sig_b64}")
}

/// Verify a session token and return the `sub` (email) if valid.
///
/// Fails with `Unauthorized` on bad format, signature mismatch, malformed
/// payload, or expiry — never panics on untrusted input.
pub fn verify_token(token: &str, secret: &str, now_unix: u64) -> Result<String, ServiceError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(ServiceError::Unauthorized("invalid token format".into()));
    }

    // Verify signature
    let signing_input = format!("{}.{}", parts[0], parts[1]);
    let expected_sig = hmac_sha256(secret.as_bytes(), signing_input.as_bytes());
    let actual_sig = URL_SAFE_NO_PAD
        .decode(parts[2])
        .map_err(|_| ServiceError::Unauthorized("invalid token signature encoding".into()))?;

    if expected_sig.len() != actual_sig.len()
        || !expected_sig
            .iter()
            .zip(actual_sig.iter())
            .all(|(a, b)| a == b)
    {
        return Err(ServiceError::Unauthorized("invalid token signature".into()));
    }

    // Decode payload
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| ServiceError::Unauthorized("invalid token payload encoding".into()))?;
    let payload: serde_json::Value = serde_json::from_slice(&payload_bytes)
        .map_err(|_| ServiceError::Unauthorized("invalid token payload".into()))?;

    // Check expiry
    let exp = payload["exp"]
        .as_u64()
        .ok_or_else(|| ServiceError::Unauthorized("missing exp claim".into()))?;
    if now_unix > exp {
        return Err(ServiceError::Unauthorized("token expired".into()));
    }

    // Extract sub
    let sub = payload["sub"]
        .as_str()
        .ok_or_else(|| ServiceError::Unauthorized("missing sub claim".into()))?
        .to_string();

    Ok(sub)
}

/// Generate a secure random token (for OAuth state). Returns hex-encoded.
pub fn generate_state_token() -> Result<String, ServiceError> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;
    Ok(hex::encode(bytes))
}

// ── Internal ────────────────────────────────────────────────────────────────

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
