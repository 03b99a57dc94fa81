//! # Configuration
//!
//! The typed configuration the core is constructed with (`spec.md` §6).
//! This crate never reads a file or environment variable itself — the
//! caller (the demo binary, or a production host application) is
//! responsible for loading a `Config`, the same division the teacher draws
//! between its `Provider` traits and whatever wires them to `clap`/`envy`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::crypto::jws::SigningKey;

/// How subject identifiers (`sub`) are derived for the OIDC `id_token`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    /// The same `sub` value across every client.
    Public,
    /// A per-client `sub`, salted so the same end user looks different to
    /// different relying parties.
    Pairwise,
}

/// One `vct` this verifier knows how to request and validate, with the
/// OIDC scopes that expose it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupportedCredential {
    /// The SD-JWT VC `vct` value, e.g. `"urn:eu.europa.ec.eudi:pid:1"`.
    pub vct: String,
    /// Scopes a client can request that map to this credential type.
    pub scopes: Vec<String>,
}

/// Digital Credentials API (same-device, browser-mediated) settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DigitalCredentialsConfig {
    /// Whether the same-device flow is offered at all.
    pub enabled: bool,
    /// `response_mode` used for same-device requests (`"dc_api"` or
    /// `"dc_api.jwt"`).
    pub response_mode: String,
    /// Credential formats to advertise, in preference order.
    pub preferred_formats: Vec<String>,
}

/// Token lifetimes, all expressed in seconds (`spec.md` §6).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Lifetimes {
    /// How long a session stays `pending`/`awaiting_presentation` before
    /// `session_expired`. Default 900 (15 min).
    pub session_duration_sec: i64,
    /// Authorization code validity. Default 60.
    pub code_duration_sec: i64,
    /// Access token validity. Default 3600.
    pub access_token_duration_sec: i64,
    /// `id_token` validity. Default 3600.
    pub id_token_duration_sec: i64,
    /// Refresh token validity. Default 2_592_000 (30 days).
    pub refresh_token_duration_sec: i64,
}

impl Default for Lifetimes {
    fn default() -> Self {
        Self {
            session_duration_sec: 900,
            code_duration_sec: 60,
            access_token_duration_sec: 3600,
            id_token_duration_sec: 3600,
            refresh_token_duration_sec: 2_592_000,
        }
    }
}

/// The verifier's static configuration, constructed once at startup and
/// held immutably for the process lifetime (`spec.md` §5).
pub struct Config {
    /// The externally reachable base URL (e.g. `https://verifier.example`),
    /// used to derive every endpoint URL in discovery metadata.
    pub external_url: String,
    /// The OIDC `iss` value. Usually equal to `external_url`.
    pub issuer: String,
    /// How `sub` is derived for issued `id_token`s.
    pub subject_type: SubjectType,
    /// Salt mixed into the pairwise `sub` derivation. Required when
    /// `subject_type` is [`SubjectType::Pairwise`].
    pub subject_salt: Option<String>,
    /// Token and session lifetimes.
    pub lifetimes: Lifetimes,
    /// Same-device Digital Credentials API settings.
    pub digital_credentials: DigitalCredentialsConfig,
    /// The verifier's signing key, loaded from a PEM at startup. Wrapped in
    /// `Arc` so cheap to share across the `Store` handles passed to every
    /// handler.
    pub signing_key: Arc<SigningKey>,
    /// Optional `x5c` certificate chain to embed in signed JWTs, leaf first.
    pub signing_key_x5c: Option<Vec<String>>,
    /// Credential types this verifier can request, keyed by `vct`.
    pub supported_credentials: Vec<SupportedCredential>,
    /// Known wallet invocation URLs, by display name, surfaced in whatever
    /// UI drives the cross-device QR/link step (outside this crate's
    /// scope, but the mapping lives here since it's verifier-wide config).
    pub supported_wallets: std::collections::BTreeMap<String, String>,
}

impl Config {
    /// Load a signing key from PEM and assemble a `Config` around it.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM cannot be parsed, or `x5c` is
    /// `Some(vec![])` (`spec.md` §9: a configured-but-empty chain is a
    /// startup error).
    pub fn new(
        external_url: String, issuer: String, subject_type: SubjectType,
        subject_salt: Option<String>, lifetimes: Lifetimes,
        digital_credentials: DigitalCredentialsConfig, signing_key_pem: &str,
        signing_key_x5c: Option<Vec<String>>,
        supported_credentials: Vec<SupportedCredential>,
        supported_wallets: std::collections::BTreeMap<String, String>,
    ) -> anyhow::Result<Self> {
        let (signing_key, signing_key_x5c) =
            SigningKey::from_pem(signing_key_pem, signing_key_x5c)?;
        Ok(Self {
            external_url,
            issuer,
            subject_type,
            subject_salt,
            lifetimes,
            digital_credentials,
            signing_key: Arc::new(signing_key),
            signing_key_x5c,
            supported_credentials,
            supported_wallets,
        })
    }

    /// The `/.well-known/openid-configuration` endpoint URL.
    #[must_use]
    pub fn authorization_endpoint(&self) -> String {
        format!("{}/authorize", self.external_url)
    }

    /// The token endpoint URL.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!("{}/token", self.external_url)
    }

    /// The userinfo endpoint URL.
    #[must_use]
    pub fn userinfo_endpoint(&self) -> String {
        format!("{}/userinfo", self.external_url)
    }

    /// The JWKS endpoint URL.
    #[must_use]
    pub fn jwks_uri(&self) -> String {
        format!("{}/jwks", self.external_url)
    }

    /// The dynamic client registration endpoint URL.
    #[must_use]
    pub fn registration_endpoint(&self) -> String {
        format!("{}/register", self.external_url)
    }

    /// The `OpenID4VP` request-object URL for a given session id, embedded
    /// in the wallet-facing deep link / QR code.
    #[must_use]
    pub fn request_object_endpoint(&self, session_id: &str) -> String {
        format!("{}/verification/request-object?id={session_id}", self.external_url)
    }

    /// The `response_uri` the wallet posts its `direct_post`/`direct_post.jwt`
    /// response to. Doubles as the key-binding JWT's expected `aud`.
    #[must_use]
    pub fn direct_post_endpoint(&self) -> String {
        format!("{}/verification/direct_post", self.external_url)
    }

    /// Where the wallet lands after posting its response in same-device
    /// flows.
    #[must_use]
    pub fn callback_endpoint(&self) -> String {
        format!("{}/verification/callback", self.external_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lifetimes_match_spec() {
        let lifetimes = Lifetimes::default();
        assert_eq!(lifetimes.session_duration_sec, 900);
        assert_eq!(lifetimes.code_duration_sec, 60);
        assert_eq!(lifetimes.access_token_duration_sec, 3600);
    }

    #[test]
    fn endpoint_urls_derive_from_external_url() {
        let key = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let pem = {
            use pkcs8::EncodePrivateKey;
            key.to_pkcs8_pem(pkcs8::LineEnding::LF).unwrap()
        };
        let config = Config::new(
            "https://verifier.example".to_string(),
            "https://verifier.example".to_string(),
            SubjectType::Public,
            None,
            Lifetimes::default(),
            DigitalCredentialsConfig {
                enabled: false,
                response_mode: "dc_api".to_string(),
                preferred_formats: vec![],
            },
            &pem,
            None,
            vec![],
            std::collections::BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(config.authorization_endpoint(), "https://verifier.example/authorize");
        assert_eq!(config.jwks_uri(), "https://verifier.example/jwks");
    }
}
