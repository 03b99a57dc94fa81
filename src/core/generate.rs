//! # Identifier & Secret Generation
//!
//! Every opaque identifier the bridge hands out — session ids, codes,
//! tokens, nonces, client ids and secrets — is generated here from a single
//! CSPRNG source (`rand::rng()`), so there is exactly one place that needs
//! auditing for randomness quality.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::RngCore;
use rand::rng;

/// 32 random bytes, URL-safe base64 without padding (43 characters).
///
/// Used for `client_secret`, `registration_access_token`, `nonce`,
/// `authorization_code`, `access_token`, and `refresh_token`.
#[must_use]
pub fn token() -> String {
    let mut bytes = [0u8; 32];
    rng().fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

/// 16 random bytes (128 bits), URL-safe base64 without padding.
///
/// Used for the opaque `Session` id.
#[must_use]
pub fn session_id() -> String {
    let mut bytes = [0u8; 16];
    rng().fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

/// 16 random bytes, hex-encoded (32 characters).
///
/// Used for `client_id`.
#[must_use]
pub fn client_id() -> String {
    let mut bytes = [0u8; 16];
    rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Alias for [`token`] — a fresh `client_secret`.
#[must_use]
pub fn client_secret() -> String {
    token()
}

/// Alias for [`token`] — a fresh `registration_access_token`.
#[must_use]
pub fn registration_access_token() -> String {
    token()
}

/// Alias for [`token`] — a fresh OpenID4VP request-object nonce.
#[must_use]
pub fn nonce() -> String {
    token()
}

/// Alias for [`token`] — a fresh `authorization_code`.
#[must_use]
pub fn authorization_code() -> String {
    token()
}

/// Alias for [`token`] — a fresh `access_token`.
#[must_use]
pub fn access_token() -> String {
    token()
}

/// Alias for [`token`] — a fresh `refresh_token`.
#[must_use]
pub fn refresh_token() -> String {
    token()
}

/// Alias for [`token`] — a fresh key id (`kid`) for an ephemeral encryption
/// key, or the cache key under which an unsigned request object is stored.
#[must_use]
pub fn key_id() -> String {
    token()
}
