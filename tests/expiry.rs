//! Scenario 5 (`spec.md` §8 "Expiry"): a direct_post after the session's
//! `expires_at` has passed is rejected with `session_expired`. Scenario 6
//! (`spec.md` §8 "Encrypted response"): a `direct_post.jwt` response whose
//! `kid` is absent from the ephemeral-key cache fails with `invalid_request`,
//! and one encrypted to the right key round-trips like the plain
//! `direct_post` flow.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Serialize;
use sha2::{Digest, Sha256};

use vp_bridge::oauth::endpoint::authorize::{AuthorizeRequest, authorize};
use vp_bridge::oauth::error::Error;
use vp_bridge::oauth::provider::Store;
use vp_bridge::oauth::registry::{RegistrationRequest, register};
use vp_bridge::crypto::jwe::RecipientKey;
use vp_bridge::oid4vp::{self, DirectPostForm, ResponseMode};
use vp_bridge_memstore::MemStore;
use vp_bridge_test_utils::{DisclosedClaim, FixedTrust, build_sd_jwt_vc, random_signing_key, test_config};

const CODE_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

async fn registered_and_authorized(
    store: &MemStore, config: &vp_bridge::config::Config,
) -> vp_bridge::oauth::endpoint::authorize::AuthorizeResponse {
    let registration = register(
        store,
        RegistrationRequest {
            redirect_uris: vec!["https://rp.example/cb".to_string()],
            token_endpoint_auth_method: Some(vp_bridge::oauth::types::AuthMethod::None),
            grant_types: None,
            response_types: None,
            allowed_scopes: vec!["openid".to_string(), "profile".to_string(), "pid".to_string()],
            default_scopes: vec!["openid".to_string()],
            subject_type: None,
            code_challenge_method: Some("S256".to_string()),
            jwks_uri: None,
            jwks: None,
            client_name: None,
            client_uri: None,
            policy_uri: None,
            tos_uri: None,
            logo_uri: None,
            contacts: vec![],
        },
    )
    .await
    .unwrap();

    authorize(
        store,
        config,
        AuthorizeRequest {
            response_type: "code".to_string(),
            client_id: registration.client_id.to_string(),
            redirect_uri: "https://rp.example/cb".to_string(),
            scope: Some("openid profile pid".to_string()),
            state: "xyz".to_string(),
            nonce: "n1".to_string(),
            code_challenge: Some(CODE_CHALLENGE.to_string()),
            code_challenge_method: Some("S256".to_string()),
            show_credential_details: false,
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn direct_post_after_session_expiry_fails() {
    let store = MemStore::new();
    let config = test_config();
    let caches = oid4vp::Caches::new();

    let authorized = registered_and_authorized(&store, &config).await;
    let session_id = authorized.session_id.to_string();
    oid4vp::get_or_build_request_object(&store, &config, &caches, &session_id, ResponseMode::DirectPost)
        .await
        .unwrap();

    let mut session = store.get_session(&authorized.session_id).await.unwrap().unwrap();
    session.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
    store.update_session(session.clone()).await.unwrap();

    let query = oid4vp::default_query(&config, &session).unwrap();
    let form = DirectPostForm {
        vp_token: Some(serde_json::json!("irrelevant")),
        state: Some(session_id.clone()),
        presentation_submission: None,
        response: None,
    };
    let trust = FixedTrust::new();
    let err =
        oid4vp::handle_direct_post(&store, &trust, &config, &caches, &session_id, &query, form)
            .await
            .unwrap_err();
    assert!(matches!(err, Error::SessionExpired(_)));
}

#[derive(Serialize)]
struct JweHeader<'a> {
    alg: &'a str,
    enc: &'a str,
    kid: &'a str,
    epk: serde_json::Value,
}

fn encrypt_for(recipient_public: &p256::PublicKey, kid: &str, plaintext: &[u8]) -> String {
    let sender_secret = p256::ecdh::EphemeralSecret::random(&mut rand::rngs::OsRng);
    let sender_public = p256::PublicKey::from(&sender_secret);
    let shared = sender_secret.diffie_hellman(recipient_public);

    let mut other_info = Vec::new();
    let alg = "A256GCM";
    other_info.extend_from_slice(&(alg.len() as u32).to_be_bytes());
    other_info.extend_from_slice(alg.as_bytes());
    other_info.extend_from_slice(&0u32.to_be_bytes());
    other_info.extend_from_slice(&0u32.to_be_bytes());
    other_info.extend_from_slice(&256u32.to_be_bytes());
    let mut hasher = Sha256::new();
    hasher.update(1u32.to_be_bytes());
    hasher.update(shared.raw_secret_bytes());
    hasher.update(&other_info);
    let key = hasher.finalize();

    let point = sender_public.to_encoded_point(false);
    let header = JweHeader {
        alg: "ECDH-ES",
        enc: "A256GCM",
        kid,
        epk: serde_json::json!({
            "kty": "EC",
            "crv": "P-256",
            "x": Base64UrlUnpadded::encode_string(point.x().unwrap()),
            "y": Base64UrlUnpadded::encode_string(point.y().unwrap()),
        }),
    };
    let header_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&header).unwrap());

    let cipher = Aes256Gcm::new_from_slice(&key).unwrap();
    let nonce_bytes: [u8; 12] = rand::random();
    let nonce = Nonce::from_slice(&nonce_bytes);
    let sealed = cipher
        .encrypt(nonce, aes_gcm::aead::Payload { msg: plaintext, aad: header_b64.as_bytes() })
        .unwrap();
    let (ciphertext, tag) = sealed.split_at(sealed.len() - 16);

    format!(
        "{header_b64}..{}.{}.{}",
        Base64UrlUnpadded::encode_string(&nonce_bytes),
        Base64UrlUnpadded::encode_string(ciphertext),
        Base64UrlUnpadded::encode_string(tag),
    )
}

#[tokio::test]
async fn direct_post_jwt_with_unknown_kid_fails_with_invalid_request() {
    let store = MemStore::new();
    let config = test_config();
    let caches = oid4vp::Caches::new();

    let authorized = registered_and_authorized(&store, &config).await;
    let session_id = authorized.session_id.to_string();
    oid4vp::get_or_build_request_object(&store, &config, &caches, &session_id, ResponseMode::DirectPostJwt)
        .await
        .unwrap();

    let unrelated = RecipientKey::generate();
    let plaintext = serde_json::to_vec(&serde_json::json!({"vp_token": "x", "state": session_id})).unwrap();
    let jwe = encrypt_for(&unrelated.public, "not-a-cached-kid", &plaintext);

    let session = store.get_session(&authorized.session_id).await.unwrap().unwrap();
    let query = oid4vp::default_query(&config, &session).unwrap();
    let form = DirectPostForm { vp_token: None, state: None, presentation_submission: None, response: Some(jwe) };
    let trust = FixedTrust::new();

    let err =
        oid4vp::handle_direct_post(&store, &trust, &config, &caches, &session_id, &query, form)
            .await
            .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}

#[tokio::test]
async fn direct_post_jwt_encrypted_to_the_cached_key_round_trips() {
    let store = MemStore::new();
    let config = test_config();
    let caches = oid4vp::Caches::new();

    let authorized = registered_and_authorized(&store, &config).await;
    let session_id = authorized.session_id.to_string();
    oid4vp::get_or_build_request_object(&store, &config, &caches, &session_id, ResponseMode::DirectPostJwt)
        .await
        .unwrap();

    let session = store.get_session(&authorized.session_id).await.unwrap().unwrap();
    let kid = session.openid4vp.ephemeral_encryption_kid.clone().unwrap();
    let recipient = caches.ephemeral_keys.get(&kid).unwrap();
    let nonce = session.openid4vp.request_object_nonce.clone().unwrap();
    let query = oid4vp::default_query(&config, &session).unwrap();

    let issuer = random_signing_key();
    let holder = random_signing_key();
    let vc = build_sd_jwt_vc(
        &issuer,
        &holder,
        "urn:example:pid:1",
        &[
            DisclosedClaim { name: "given_name", salt: "salt123", value: serde_json::json!("Alice") },
            DisclosedClaim { name: "family_name", salt: "salt124", value: serde_json::json!("Doe") },
            DisclosedClaim { name: "name", salt: "salt125", value: serde_json::json!("Alice Doe") },
        ],
        &nonce,
        &config.direct_post_endpoint(),
    );
    let trust = FixedTrust::new().trusting("https://issuer.example", issuer.verifying_key());

    let plaintext = serde_json::to_vec(&serde_json::json!({"vp_token": vc, "state": session_id})).unwrap();
    let jwe = encrypt_for(&recipient.public, &kid, &plaintext);
    let form = DirectPostForm { vp_token: None, state: None, presentation_submission: None, response: Some(jwe) };

    let response =
        oid4vp::handle_direct_post(&store, &trust, &config, &caches, &session_id, &query, form)
            .await
            .unwrap();
    assert!(response.redirect_uri.starts_with("https://rp.example/cb?code="));
}
