//! `POST /token` — `spec.md` §4.5 "Token".

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::core::generate;
use crate::crypto::{hash, pkce};
use crate::oauth::error::Error;
use crate::oauth::provider::Store;
use crate::oauth::session;
use crate::oauth::types::{AccessToken, AuthMethod, ClientId, Session, Status};
use crate::{invalid_client, invalid_grant, server_error};

/// Client credentials as presented to `/token` (`spec.md` §4.5 step 6).
#[derive(Clone, Debug, Default)]
pub struct ClientAuth {
    /// Basic-auth or POST-body `client_id`, if the client authenticated
    /// this way.
    pub client_id: Option<String>,
    /// The accompanying secret, if any.
    pub client_secret: Option<String>,
}

/// `/token` request parameters for the `authorization_code` grant.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenRequest {
    /// Must be `"authorization_code"` or `"refresh_token"`.
    pub grant_type: String,
    /// The authorization code to exchange.
    #[serde(default)]
    pub code: Option<String>,
    /// Required alongside `code`.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Must equal `session.oidc_request.redirect_uri`.
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// The PKCE verifier, if the session's request carried a challenge.
    #[serde(default)]
    pub code_verifier: Option<String>,
    /// Present for `grant_type=refresh_token`.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// A successful token response.
#[derive(Clone, Debug, Serialize)]
pub struct TokenResponse {
    /// The opaque access token.
    pub access_token: String,
    /// Always `"Bearer"`.
    pub token_type: String,
    /// Seconds until `access_token` expires.
    pub expires_in: i64,
    /// The signed `id_token`.
    pub id_token: String,
    /// The opaque refresh token, if the client's grant types include it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

fn authenticate_client(auth_method: AuthMethod, secret_hash: Option<&str>, auth: &ClientAuth) -> Result<(), Error> {
    match auth_method {
        AuthMethod::None => Ok(()),
        AuthMethod::ClientSecretBasic | AuthMethod::ClientSecretPost => {
            let (Some(secret), Some(hash)) = (&auth.client_secret, secret_hash) else {
                return Err(invalid_client!("client authentication required"));
            };
            if hash::verify_client_secret(secret, hash) {
                Ok(())
            } else {
                Err(invalid_client!("client secret does not match"))
            }
        }
    }
}

#[derive(Serialize)]
struct IdTokenClaims {
    iss: String,
    sub: String,
    aud: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    exp: chrono::DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    iat: chrono::DateTime<Utc>,
    nonce: String,
    #[serde(flatten)]
    verified_claims: std::collections::BTreeMap<String, serde_json::Value>,
}

fn derive_subject(config: &Config, session: &Session, client_id: &ClientId) -> String {
    match config.subject_type {
        crate::config::SubjectType::Public => session
            .verified_claims
            .get("sub")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| session.id.to_string(), ToString::to_string),
        crate::config::SubjectType::Pairwise => {
            let user_identifier = session
                .verified_claims
                .get("sub")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(session.id.as_ref());
            let salt = config.subject_salt.as_deref().unwrap_or("");
            let mut hasher = Sha256::new();
            hasher.update(client_id.as_ref().as_bytes());
            hasher.update(user_identifier.as_bytes());
            hasher.update(salt.as_bytes());
            hex::encode(hasher.finalize())
        }
    }
}

/// A replayed code (`spec.md` §4.5 step 2) must not just be rejected — any
/// tokens already minted from its first, legitimate use are revoked too.
async fn invalidate_issued_tokens<S: Store>(store: &S, mut session: Session) -> Result<(), Error> {
    session.tokens.access_token = None;
    session.tokens.access_token_expires_at = None;
    session.tokens.id_token = None;
    session.tokens.refresh_token = None;
    session.tokens.refresh_token_expires_at = None;
    store.update_session(session).await
}

/// `Token` — `spec.md` §4.5, `authorization_code` grant. `refresh_token` is
/// rejected with [`Error::UnsupportedGrantType`] (`spec.md` §9 Open
/// Question, resolved in `DESIGN.md`: this crate never implements refresh).
///
/// # Errors
///
/// Returns [`Error::InvalidGrant`] for an unknown, expired, or already-used
/// code, a client/redirect mismatch, or a failed PKCE check;
/// [`Error::InvalidClient`] for a failed client authentication;
/// [`Error::UnsupportedGrantType`] for any grant type other than
/// `authorization_code`.
#[tracing::instrument(skip(store, config, auth), err)]
pub async fn token<S: Store>(
    store: &S, config: &Config, req: TokenRequest, auth: ClientAuth,
) -> Result<TokenResponse, Error> {
    if req.grant_type != "authorization_code" {
        return Err(Error::UnsupportedGrantType(format!(
            "grant_type {:?} is not supported",
            req.grant_type
        )));
    }

    let code = req.code.ok_or_else(|| invalid_grant!("code is required"))?.into();
    let Some(mut found) = store.get_by_authorization_code(&code).await? else {
        return Err(invalid_grant!("unknown authorization code"));
    };

    let now = Utc::now();
    session::require_status(&found, now, &[Status::CodeIssued])?;

    if found.tokens.authorization_code_used {
        invalidate_issued_tokens(store, found).await?;
        return Err(invalid_grant!("authorization code already used"));
    }
    if found.tokens.code_expires_at.is_some_and(|exp| now > exp) {
        return Err(invalid_grant!("authorization code expired"));
    }

    let requested_client_id: ClientId = req.client_id.clone().unwrap_or_default().into();
    if requested_client_id != found.oidc_request.client_id {
        return Err(invalid_grant!("client_id does not match the authorization request"));
    }
    if req.redirect_uri.as_deref() != Some(found.oidc_request.redirect_uri.as_str()) {
        return Err(invalid_grant!("redirect_uri does not match the authorization request"));
    }

    let Some(client) = store.get_client(&found.oidc_request.client_id).await? else {
        return Err(invalid_client!("unknown client"));
    };
    authenticate_client(client.token_endpoint_auth_method, client.client_secret_hash.as_deref(), &auth)?;

    if let Some(challenge) = &found.oidc_request.code_challenge {
        let method = found
            .oidc_request
            .code_challenge_method
            .as_deref()
            .and_then(pkce::Method::parse)
            .ok_or_else(|| invalid_grant!("unsupported code_challenge_method"))?;
        let verifier = req.code_verifier.ok_or_else(|| invalid_grant!("code_verifier is required"))?;
        if !pkce::verify(method, &verifier, challenge) {
            return Err(invalid_grant!("code_verifier does not match code_challenge"));
        }
    }

    if !store.mark_code_used(&found.id).await? {
        invalidate_issued_tokens(store, found).await?;
        return Err(invalid_grant!("authorization code already used"));
    }

    let access_token: AccessToken = generate::access_token().into();
    let sub = derive_subject(config, &found, &found.oidc_request.client_id);
    let id_token_claims = IdTokenClaims {
        iss: config.issuer.clone(),
        sub,
        aud: found.oidc_request.client_id.to_string(),
        exp: now + chrono::Duration::seconds(config.lifetimes.id_token_duration_sec),
        iat: now,
        nonce: found.oidc_request.nonce.clone(),
        verified_claims: found.verified_claims.clone(),
    };
    let id_token = crate::crypto::jws::sign_compact(&config.signing_key, "JWT", "default", config.signing_key_x5c.as_deref(), &id_token_claims)
        .map_err(|e| server_error!("failed to sign id_token: {e}"))?;

    let refresh_token = client
        .grant_types
        .iter()
        .any(|g| g == "refresh_token")
        .then(generate::refresh_token);

    session::issue_tokens(&mut found, now)?;
    found.tokens.access_token = Some(access_token.clone());
    found.tokens.access_token_expires_at = Some(now + chrono::Duration::seconds(config.lifetimes.access_token_duration_sec));
    found.tokens.id_token = Some(id_token.clone());
    found.tokens.refresh_token = refresh_token.clone();
    found.tokens.refresh_token_expires_at = refresh_token
        .is_some()
        .then(|| now + chrono::Duration::seconds(config.lifetimes.refresh_token_duration_sec));
    store.update_session(found).await?;

    Ok(TokenResponse {
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        expires_in: config.lifetimes.access_token_duration_sec,
        id_token,
        refresh_token,
    })
}
