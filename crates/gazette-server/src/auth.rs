//! Session authentication and password derivation.
//!
//! Passwords are never stored: each account keeps a random salt and a
//! BLAKE3 derivation of (salt, password) under a fixed context string.
//! Verification is constant-time.  Session tokens are random and opaque;
//! the bearer token on each request resolves to a profile through the
//! sessions table.

use axum::http::HeaderMap;
use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

use gazette_shared::constants::{KDF_CONTEXT_PASSWORD, PASSWORD_SALT_SIZE, SESSION_TOKEN_SIZE};
use gazette_store::{Database, UserProfile};

use crate::error::ServerError;

/// Generate a fresh password salt.
pub fn generate_salt() -> [u8; PASSWORD_SALT_SIZE] {
    let mut salt = [0u8; PASSWORD_SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Generate an opaque session token (hex-encoded random bytes).
pub fn generate_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Derive the stored password hash for (salt, password).
pub fn hash_password(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_PASSWORD);
    hasher.update(salt);
    hasher.update(password.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Constant-time verification of a password attempt against the stored
/// hex-encoded salt and hash.  Malformed stored material fails closed.
pub fn verify_password(password: &str, salt_hex: &str, hash_hex: &str) -> bool {
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(hash_hex) else {
        return false;
    };

    let derived = hash_password(password, &salt);
    expected.len() == derived.len() && derived.ct_eq(&expected).unwrap_u8() == 1
}

/// Extract the bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get("authorization")?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ").unwrap_or(auth).trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Resolve the request's session to a profile, or fail with 401.
pub async fn require_user(
    db: &Mutex<Database>,
    headers: &HeaderMap,
) -> Result<UserProfile, ServerError> {
    let token =
        bearer_token(headers).ok_or_else(|| ServerError::Unauthorized("Missing token".into()))?;

    db.lock()
        .await
        .session_user(token)
        .map_err(|_| ServerError::Unauthorized("Invalid or expired session".into()))
}

/// Resolve the request's session if one is present and valid.
pub async fn optional_user(db: &Mutex<Database>, headers: &HeaderMap) -> Option<UserProfile> {
    let token = bearer_token(headers)?;
    db.lock().await.session_user(token).ok()
}
