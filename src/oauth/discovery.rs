//! # Discovery / JWKS (C8)
//!
//! `spec.md` §4.7: pure functions over [`Config`] and the configured
//! signing key. No I/O, no caching — values are static for the process
//! lifetime.

use serde::Serialize;

use super::error::Error;
use crate::config::Config;
use crate::server_error;

/// `/.well-known/openid-configuration` response shape.
#[derive(Clone, Debug, Serialize)]
pub struct DiscoveryMetadata {
    /// The OIDC `iss` value.
    pub issuer: String,
    /// `/authorize` URL.
    pub authorization_endpoint: String,
    /// `/token` URL.
    pub token_endpoint: String,
    /// `/userinfo` URL.
    pub userinfo_endpoint: String,
    /// `/jwks` URL.
    pub jwks_uri: String,
    /// `/register` URL.
    pub registration_endpoint: String,
    /// Always `["code"]`.
    pub response_types_supported: Vec<&'static str>,
    /// `["public", "pairwise"]`.
    pub subject_types_supported: Vec<&'static str>,
    /// The algorithms `id_token`s may be signed with.
    pub id_token_signing_alg_values_supported: Vec<&'static str>,
    /// Standard scopes plus every scope named by a configured credential.
    pub scopes_supported: Vec<String>,
    /// `["authorization_code", "refresh_token"]`.
    pub grant_types_supported: Vec<&'static str>,
    /// `["S256", "plain"]`.
    pub code_challenge_methods_supported: Vec<&'static str>,
    /// Supported `/token` client authentication methods.
    pub token_endpoint_auth_methods_supported: Vec<&'static str>,
}

/// `GetDiscoveryMetadata` — `spec.md` §4.7.
#[must_use]
pub fn metadata(config: &Config) -> DiscoveryMetadata {
    let mut scopes_supported = vec!["openid".to_string(), "profile".to_string(), "email".to_string()];
    for credential in &config.supported_credentials {
        for scope in &credential.scopes {
            if !scopes_supported.contains(scope) {
                scopes_supported.push(scope.clone());
            }
        }
    }

    DiscoveryMetadata {
        issuer: config.issuer.clone(),
        authorization_endpoint: config.authorization_endpoint(),
        token_endpoint: config.token_endpoint(),
        userinfo_endpoint: config.userinfo_endpoint(),
        jwks_uri: config.jwks_uri(),
        registration_endpoint: config.registration_endpoint(),
        response_types_supported: vec!["code"],
        subject_types_supported: vec!["public", "pairwise"],
        id_token_signing_alg_values_supported: vec!["RS256", "ES256", "ES384", "ES512", "EdDSA"],
        scopes_supported,
        grant_types_supported: vec!["authorization_code", "refresh_token"],
        code_challenge_methods_supported: vec!["S256", "plain"],
        token_endpoint_auth_methods_supported: vec![
            "client_secret_basic",
            "client_secret_post",
            "none",
        ],
    }
}

/// `GetJWKS` — `spec.md` §4.7.
///
/// # Errors
///
/// Returns [`Error::ServerError`] if the signing key cannot be rendered as
/// a JWK (practically unreachable, since [`crate::crypto::jws::SigningKey`]
/// only ever holds a key type this crate knows how to export).
pub fn jwks(config: &Config) -> Result<serde_json::Value, Error> {
    let jwk = config.signing_key.verifying_key().to_jwk("default");
    if jwk.get("kty").is_none() {
        return Err(server_error!("signing key produced a JWK with no kty"));
    }
    Ok(serde_json::json!({ "keys": [jwk] }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let key = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        use pkcs8::EncodePrivateKey;
        let pem = key.to_pkcs8_pem(pkcs8::LineEnding::LF).unwrap();
        Config::new(
            "https://verifier.example".to_string(),
            "https://verifier.example".to_string(),
            crate::config::SubjectType::Public,
            None,
            crate::config::Lifetimes::default(),
            crate::config::DigitalCredentialsConfig {
                enabled: false,
                response_mode: "dc_api".to_string(),
                preferred_formats: vec![],
            },
            &pem,
            None,
            vec![crate::config::SupportedCredential {
                vct: "urn:example:pid:1".to_string(),
                scopes: vec!["pid".to_string()],
            }],
            std::collections::BTreeMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn metadata_includes_per_credential_scopes() {
        let config = test_config();
        let meta = metadata(&config);
        assert!(meta.scopes_supported.contains(&"pid".to_string()));
        assert_eq!(meta.issuer, "https://verifier.example");
    }

    #[test]
    fn jwks_renders_configured_key() {
        let config = test_config();
        let jwks = jwks(&config).unwrap();
        assert_eq!(jwks["keys"][0]["kty"], "EC");
        assert_eq!(jwks["keys"][0]["alg"], "ES256");
    }
}
