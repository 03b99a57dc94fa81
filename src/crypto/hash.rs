//! # Secret Hashing
//!
//! `spec.md` §9 flags the teacher's source as inconsistent here — some paths
//! compared a SHA-256 of the provided client secret against a stored
//! SHA-256, bypassing the bcrypt path used elsewhere. This module
//! consolidates on one rule per secret type and gives each its own function
//! so the two can never be accidentally swapped at a call site:
//!
//! - `client_secret` → bcrypt (slow, salted — the secret is a long-lived
//!   credential an attacker might try to brute-force offline from a leaked
//!   store dump).
//! - `registration_access_token` → hex-encoded SHA-256, compared in constant
//!   time (the token is already 256 bits of CSPRNG output; bcrypt's per-hash
//!   work factor buys nothing for a value nobody is brute-forcing, and a
//!   fast hash keeps `/register/:client_id` lookups cheap).

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Hash a freshly generated `client_secret` for storage.
///
/// # Errors
///
/// Returns an error if bcrypt's internal RNG or encoding fails.
pub fn hash_client_secret(secret: &str) -> anyhow::Result<String> {
    Ok(bcrypt::hash(secret, bcrypt::DEFAULT_COST)?)
}

/// Verify a client-supplied secret against its stored bcrypt hash.
#[must_use]
pub fn verify_client_secret(secret: &str, hash: &str) -> bool {
    bcrypt::verify(secret, hash).unwrap_or(false)
}

/// Hash a freshly generated `registration_access_token` for storage.
///
/// Always produces exactly 64 lowercase hex characters.
#[must_use]
pub fn hash_registration_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Verify a client-supplied registration access token against its stored
/// hash, in constant time.
#[must_use]
pub fn verify_registration_token(token: &str, hash: &str) -> bool {
    let computed = hash_registration_token(token);
    computed.as_bytes().ct_eq(hash.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcrypt_round_trips() {
        let hash = hash_client_secret("s3cr3t").unwrap();
        assert!(verify_client_secret("s3cr3t", &hash));
        assert!(!verify_client_secret("wrong", &hash));
    }

    #[test]
    fn registration_token_hash_is_64_hex_chars() {
        let hash = hash_registration_token("some-token-value");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn registration_token_verifies() {
        let hash = hash_registration_token("abc123");
        assert!(verify_registration_token("abc123", &hash));
        assert!(!verify_registration_token("abc124", &hash));
    }
}
