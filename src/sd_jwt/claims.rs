//! Claim shapes carried by an SD-JWT VC presentation.
//!
//! Grounded on `src/format/sd_jwt.rs` in the teacher; trimmed to the fields
//! a verifier reads (issuance-only fields like `vct#integrity` handling and
//! the `SdJwtVcBuilder`/`to_queryable` issuer-side helpers are dropped,
//! they belong to the teacher's out-of-scope issuance path).

use chrono::serde::{ts_seconds, ts_seconds_option};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The claims set (second JWT segment) of an issuer-signed SD-JWT VC.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SdJwtClaims {
    /// Digests of selectively disclosed claims.
    #[serde(rename = "_sd")]
    pub sd: Vec<String>,

    /// Hash algorithm used for `_sd` digests. This crate only supports
    /// `sha-256`; any other value fails verification.
    #[serde(rename = "_sd_alg")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd_alg: Option<String>,

    /// The credential type, e.g. `"urn:eu.europa.ec.eudi:pid:1"`.
    pub vct: String,

    /// The credential issuer.
    pub iss: String,

    /// Issuance time.
    #[serde(with = "ts_seconds_option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<DateTime<Utc>>,

    /// Not-before time.
    #[serde(with = "ts_seconds_option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<DateTime<Utc>>,

    /// Expiry time.
    #[serde(with = "ts_seconds_option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<DateTime<Utc>>,

    /// Subject identifier, if the issuer chose to include one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// The public key the key-binding JWT must be signed with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnf: Option<KeyBinding>,

    /// Credential status reference. Status-list checking is out of scope
    /// for this crate (`spec.md` §1 Non-goals); the field is parsed but
    /// never dereferenced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// The confirmation-key binding between an SD-JWT VC and a holder key.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyBinding {
    /// The holder's public key, as a JWK.
    Jwk(serde_json::Value),
}

/// The key-binding JWT's claims set, proving possession of the `cnf.jwk`
/// key over this specific presentation.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct KbJwtClaims {
    /// The request object nonce this presentation answers.
    pub nonce: String,
    /// The intended audience — this verifier's `response_uri`, or the
    /// origin for Digital Credentials API requests.
    pub aud: String,
    /// Issuance time of the key-binding JWT.
    #[serde(with = "ts_seconds")]
    pub iat: DateTime<Utc>,
    /// Base64url-encoded hash over the issuer-signed JWT and disclosures
    /// that precede the key-binding JWT in the presentation.
    pub sd_hash: String,
}

/// One claim disclosed by the holder: `["<salt>","<name>","<value>"]`
/// base64url-decoded.
#[derive(Clone, Debug)]
pub struct Disclosure {
    /// The raw base64url-encoded disclosure, as it appeared in the
    /// presentation — this is what gets hashed and matched against `_sd`.
    pub encoded: String,
    /// The disclosed claim name.
    pub name: String,
    /// The disclosed claim value.
    pub value: serde_json::Value,
}

impl Disclosure {
    /// Decode a single `~`-delimited disclosure segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is not valid base64url, or does not
    /// decode to a `[salt, name, value]` JSON array.
    pub fn decode(encoded: &str) -> anyhow::Result<Self> {
        use base64ct::{Base64UrlUnpadded, Encoding};
        let bytes = Base64UrlUnpadded::decode_vec(encoded)?;
        let array: serde_json::Value = serde_json::from_slice(&bytes)?;
        let [_salt, name, value] = <[serde_json::Value; 3]>::try_from(
            array.as_array().cloned().ok_or_else(|| anyhow::anyhow!("disclosure is not an array"))?,
        )
        .map_err(|_| anyhow::anyhow!("disclosure array must have exactly 3 elements"))?;
        let name =
            name.as_str().ok_or_else(|| anyhow::anyhow!("disclosure name must be a string"))?;
        Ok(Self { encoded: encoded.to_string(), name: name.to_string(), value })
    }

    /// The base64url-encoded SHA-256 digest of this disclosure, as it
    /// would appear in an `_sd` array.
    #[must_use]
    pub fn digest(&self) -> String {
        use base64ct::{Base64UrlUnpadded, Encoding};
        use sha2::{Digest as _, Sha256};
        Base64UrlUnpadded::encode_string(Sha256::digest(self.encoded.as_bytes()).as_slice())
    }
}

#[cfg(test)]
mod tests {
    use base64ct::{Base64UrlUnpadded, Encoding};

    use super::*;

    #[test]
    fn decodes_well_formed_disclosure() {
        let json = serde_json::json!(["saltvalue", "given_name", "Alice"]);
        let encoded = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&json).unwrap());
        let disclosure = Disclosure::decode(&encoded).unwrap();
        assert_eq!(disclosure.name, "given_name");
        assert_eq!(disclosure.value, serde_json::json!("Alice"));
    }

    #[test]
    fn rejects_malformed_disclosure() {
        assert!(Disclosure::decode("not-base64!!").is_err());
    }
}
