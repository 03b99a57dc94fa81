//! Shared test fixtures for `vp-bridge`: a throwaway [`Config`], sample
//! [`Client`]/[`Session`] values, and an SD-JWT VC builder for exercising
//! [`vp_bridge::oid4vp::handle_direct_post`] without a real wallet or
//! credential issuer. Grounded on the `FakeStore`/`FakeTrust`/
//! `build_sd_jwt_vc` test helpers built up inline across `vp-bridge`'s own
//! unit tests (`oid4vp::direct_post`, `oid4vp::request_object`), lifted out
//! here so integration tests in `tests/` and the `demos/verifier` binary
//! don't each reinvent them.

use std::collections::BTreeMap;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use pkcs8::EncodePrivateKey;
use sha2::{Digest, Sha256};
use vp_bridge::config::{Config, DigitalCredentialsConfig, Lifetimes, SubjectType, SupportedCredential};
use vp_bridge::crypto::jws::{self, SigningKey, VerifyingKey};
use vp_bridge::oauth::error::Error;
use vp_bridge::oauth::provider::TrustAnchor;
use vp_bridge::oauth::types::{
    AuthMethod, Client, ClientId, OidcRequest, Openid4VpState, Session, SessionId, Status, Tokens,
};
use vp_bridge::sd_jwt::{Disclosure, KbJwtClaims, KeyBinding, SdJwtClaims};

/// A fresh, random ES256 signing key, PEM-encoded.
#[must_use]
pub fn signing_key_pem() -> String {
    let key = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
    key.to_pkcs8_pem(pkcs8::LineEnding::LF).unwrap().to_string()
}

/// A `Config` pointed at `https://verifier.example`, with a freshly
/// generated signing key and one supported credential (`urn:example:pid:1`,
/// behind the `pid` scope).
///
/// # Panics
///
/// Panics if the generated key fails to encode, which would indicate a bug
/// in this crate, not the caller.
#[must_use]
pub fn test_config() -> Config {
    let pem = signing_key_pem();
    Config::new(
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
        vec![SupportedCredential {
            vct: "urn:example:pid:1".to_string(),
            scopes: vec!["pid".to_string()],
        }],
        BTreeMap::new(),
    )
    .unwrap()
}

/// A registered client with `client_id = "client-1"`, PKCE required, and a
/// single redirect URI (`https://rp.example/cb`). No client secret (a
/// public client).
#[must_use]
pub fn sample_client() -> Client {
    Client {
        client_id: ClientId::from("client-1"),
        client_secret_hash: None,
        registration_access_token_hash: String::new(),
        redirect_uris: vec!["https://rp.example/cb".to_string()],
        grant_types: vec!["authorization_code".to_string()],
        response_types: vec!["code".to_string()],
        token_endpoint_auth_method: AuthMethod::None,
        allowed_scopes: vec!["openid".to_string(), "pid".to_string()],
        default_scopes: vec!["openid".to_string()],
        subject_type: vp_bridge::oauth::types::SubjectType::Public,
        require_pkce: true,
        jwks: None,
        client_name: Some("Example RP".to_string()),
        client_uri: None,
        policy_uri: None,
        tos_uri: None,
        logo_uri: None,
        contacts: vec![],
        client_id_issued_at: Utc::now(),
    }
}

/// A `AwaitingPresentation` session for `sample_client()`, requesting
/// `openid pid`, with `request_object_nonce` already set to `nonce` (as it
/// would be once `oid4vp::build_request_object` has run).
#[must_use]
pub fn fresh_session(nonce: &str) -> Session {
    let now = Utc::now();
    Session {
        id: SessionId::from("sess-1"),
        status: Status::AwaitingPresentation,
        created_at: now,
        expires_at: now + chrono::Duration::minutes(15),
        oidc_request: OidcRequest {
            client_id: ClientId::from("client-1"),
            redirect_uri: "https://rp.example/cb".to_string(),
            scope: "openid pid".to_string(),
            state: "xyz".to_string(),
            nonce: "n1".to_string(),
            response_type: "code".to_string(),
            code_challenge: None,
            code_challenge_method: None,
            show_credential_details: false,
        },
        openid4vp: Openid4VpState { request_object_nonce: Some(nonce.to_string()), ..Default::default() },
        tokens: Tokens::default(),
        verified_claims: BTreeMap::new(),
    }
}

/// A fresh, random ES256 issuer/holder signing key (in-memory only, not
/// PEM-encoded — for key-binding and SD-JWT VC signing, not `Config`).
#[must_use]
pub fn random_signing_key() -> SigningKey {
    SigningKey::EcP256(Box::new(p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng)))
}

/// A [`TrustAnchor`] backed by a fixed issuer-URL → [`VerifyingKey`] map.
#[derive(Clone, Default)]
pub struct FixedTrust {
    keys: BTreeMap<String, VerifyingKey>,
}

impl FixedTrust {
    /// An empty trust anchor; every `verifying_key_for_issuer` call fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `key` for presentations claiming `issuer` as their `iss`.
    #[must_use]
    pub fn trusting(mut self, issuer: impl Into<String>, key: VerifyingKey) -> Self {
        self.keys.insert(issuer.into(), key);
        self
    }
}

impl TrustAnchor for FixedTrust {
    async fn verifying_key_for_issuer(&self, issuer: &str) -> Result<VerifyingKey, Error> {
        self.keys
            .get(issuer)
            .cloned()
            .ok_or_else(|| Error::PresentationInvalid(format!("unknown issuer {issuer}")))
    }
}

/// One disclosed claim to embed in a built SD-JWT VC: a name, a salt
/// (unique within the presentation), and a value.
pub struct DisclosedClaim {
    /// The claim name, e.g. `"given_name"`.
    pub name: &'static str,
    /// The salt, e.g. `"salt123"`.
    pub salt: &'static str,
    /// The disclosed value.
    pub value: serde_json::Value,
}

/// Build a complete SD-JWT VC presentation: issuer-signed JWT, disclosures,
/// and a key-binding JWT over `nonce`/`aud`, exactly as
/// [`vp_bridge::sd_jwt::verify_presentation`] expects to parse it.
///
/// Grounded on the `build_sd_jwt_vc` helper inline in
/// `oid4vp::direct_post`'s own tests.
///
/// # Panics
///
/// Panics if signing fails, which would indicate a bug in this crate's
/// fixture construction, not the caller's.
#[must_use]
pub fn build_sd_jwt_vc(
    issuer: &SigningKey, holder: &SigningKey, vct: &str, claims: &[DisclosedClaim], nonce: &str, aud: &str,
) -> String {
    let disclosures: Vec<Disclosure> = claims
        .iter()
        .map(|claim| {
            let encoded = Base64UrlUnpadded::encode_string(
                &serde_json::to_vec(&serde_json::json!([claim.salt, claim.name, claim.value])).unwrap(),
            );
            Disclosure::decode(&encoded).unwrap()
        })
        .collect();

    let holder_jwk = holder.verifying_key().to_jwk("holder");
    let sd_jwt_claims = SdJwtClaims {
        sd: disclosures.iter().map(Disclosure::digest).collect(),
        sd_alg: Some("sha-256".to_string()),
        vct: vct.to_string(),
        iss: "https://issuer.example".to_string(),
        iat: Some(Utc::now()),
        nbf: None,
        exp: Some(Utc::now() + chrono::Duration::hours(1)),
        sub: None,
        cnf: Some(KeyBinding::Jwk(holder_jwk)),
        status: None,
    };
    let issuer_jwt = jws::sign_compact(issuer, "dc+sd-jwt", "default", None, &sd_jwt_claims).unwrap();

    let disclosures_joined =
        disclosures.iter().map(|d| d.encoded.as_str()).collect::<Vec<_>>().join("~");
    let signed_part = format!("{issuer_jwt}~{disclosures_joined}~");
    let sd_hash = Base64UrlUnpadded::encode_string(Sha256::digest(&signed_part).as_slice());
    let kb_claims = KbJwtClaims { nonce: nonce.to_string(), aud: aud.to_string(), iat: Utc::now(), sd_hash };
    let kb_jwt = jws::sign_compact(holder, "kb+jwt", "holder", None, &kb_claims).unwrap();

    format!("{signed_part}{kb_jwt}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_presentation_that_verifies() {
        let issuer = random_signing_key();
        let holder = random_signing_key();
        let config = test_config();
        let nonce = "n1";
        let vc = build_sd_jwt_vc(
            &issuer,
            &holder,
            "urn:example:pid:1",
            &[DisclosedClaim { name: "given_name", salt: "salt123", value: serde_json::json!("Alice") }],
            nonce,
            &config.direct_post_endpoint(),
        );

        let verified = vp_bridge::sd_jwt::verify_presentation(
            &vc,
            &issuer.verifying_key(),
            nonce,
            &config.direct_post_endpoint(),
        )
        .unwrap();
        assert_eq!(verified.claims.get("given_name"), Some(&serde_json::json!("Alice")));
    }

    #[tokio::test]
    async fn fixed_trust_resolves_only_trusted_issuers() {
        let key = random_signing_key().verifying_key();
        let trust = FixedTrust::new().trusting("https://issuer.example", key);
        assert!(trust.verifying_key_for_issuer("https://issuer.example").await.is_ok());
        assert!(trust.verifying_key_for_issuer("https://evil.example").await.is_err());
    }
}
