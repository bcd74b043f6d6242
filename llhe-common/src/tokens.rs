//! Opaque tokens and signed upload URLs
//!
//! # Architecture
//!
//! - Session and login tokens are 32 random bytes rendered as 64 hex chars.
//!   Only their SHA-256 digest is persisted.
//! - Upload URLs carry `expires` (Unix seconds) and `signature`, where the
//!   signature is SHA-256 over `path:expires:secret`.
//!
//! Pure functions only; no HTTP or database dependencies.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Length in bytes of generated tokens (before hex encoding)
pub const TOKEN_BYTES: usize = 32;

/// Generate a random opaque token (64 hex characters)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    to_hex(&bytes)
}

/// SHA-256 digest of a token, as stored in the database
///
/// # Examples
///
/// ```
/// use llhe_common::tokens::hash_token;
///
/// let hash = hash_token("abc");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, hash_token("abc"));
/// ```
pub fn hash_token(token: &str) -> String {
    sha256_hex(token.as_bytes())
}

/// Calculate the signature of an upload URL
///
/// # Algorithm
///
/// 1. Concatenate `path`, `:`, `expires` as decimal, `:`, `secret`
/// 2. SHA-256 of the concatenated string
/// 3. Return as 64 hex characters
pub fn sign_upload(path: &str, expires: i64, secret: &str) -> String {
    sha256_hex(format!("{}:{}:{}", path, expires, secret).as_bytes())
}

/// Outcome of checking an upload signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadCheck {
    Valid,
    Expired,
    BadSignature,
}

/// Validate an upload signature against `now` (Unix seconds)
///
/// The signature is checked before expiry.
pub fn verify_upload(path: &str, expires: i64, signature: &str, secret: &str, now: i64) -> UploadCheck {
    if sign_upload(path, expires, secret) != signature {
        return UploadCheck::BadSignature;
    }
    if now > expires {
        return UploadCheck::Expired;
    }
    UploadCheck::Valid
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
