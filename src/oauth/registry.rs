//! # Dynamic Client Registration (C4)
//!
//! [RFC 7591](https://www.rfc-editor.org/rfc/rfc7591) self-service
//! registration plus [RFC 7592](https://www.rfc-editor.org/rfc/rfc7592)
//! read/update/delete, authenticated by the registration access token
//! minted at registration time.
//!
//! Grounded on the validate-then-store-then-respond shape of the teacher's
//! `src/oid4vci/server/register.rs`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::Error;
use super::provider::Store;
use super::types::{AuthMethod, Client, ClientId, JwksSource, SubjectType};
use crate::core::generate;
use crate::crypto::hash::{hash_client_secret, hash_registration_token, verify_registration_token};
use crate::{invalid_client, invalid_request};

/// A client registration request, as posted to `/register` (`spec.md`
/// §4.4).
#[derive(Clone, Debug, Deserialize)]
pub struct RegistrationRequest {
    /// Registered redirect URIs. Must contain at least one.
    pub redirect_uris: Vec<String>,
    /// How the client authenticates at `/token`. Defaults to
    /// `client_secret_basic`.
    #[serde(default)]
    pub token_endpoint_auth_method: Option<AuthMethod>,
    /// Grant types this client may use. Defaults to `["authorization_code"]`.
    #[serde(default)]
    pub grant_types: Option<Vec<String>>,
    /// Response types this client may use. Defaults to `["code"]`.
    #[serde(default)]
    pub response_types: Option<Vec<String>>,
    /// Scopes this client is permitted to request.
    #[serde(default)]
    pub allowed_scopes: Vec<String>,
    /// Scopes granted when `/authorize` omits `scope`.
    #[serde(default)]
    pub default_scopes: Vec<String>,
    /// How `sub` is derived for this client's users. Defaults to
    /// [`SubjectType::Public`].
    #[serde(default)]
    pub subject_type: Option<SubjectType>,
    /// PKCE method this client will use, if any. Any non-empty value sets
    /// `require_pkce = true`.
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    /// The client's own JWKS URI. Mutually exclusive with `jwks`.
    #[serde(default)]
    pub jwks_uri: Option<String>,
    /// The client's own JWKS, inlined. Mutually exclusive with `jwks_uri`.
    #[serde(default)]
    pub jwks: Option<serde_json::Value>,
    #[serde(default)]
    client_name: Option<String>,
    #[serde(default)]
    client_uri: Option<String>,
    #[serde(default)]
    policy_uri: Option<String>,
    #[serde(default)]
    tos_uri: Option<String>,
    #[serde(default)]
    logo_uri: Option<String>,
    #[serde(default)]
    contacts: Vec<String>,
}

/// The response to a successful registration, carrying the one-time raw
/// secrets the store never sees again (`spec.md` §4.4).
#[derive(Clone, Debug, Serialize)]
pub struct RegistrationResponse {
    /// The newly assigned client identifier.
    pub client_id: ClientId,
    /// The raw client secret. `None` for `token_endpoint_auth_method = none`.
    pub client_secret: Option<String>,
    /// The raw registration access token, required to read/update/delete
    /// this registration later. Never recoverable once this response is
    /// sent.
    pub registration_access_token: String,
    /// Where the RP can re-read or update this registration.
    pub registration_client_uri: String,
    /// When this registration was created, as Unix seconds.
    pub client_id_issued_at: i64,
}

fn validate_https_uri(value: &str, field: &str) -> Result<(), Error> {
    let url = Url::parse(value).map_err(|e| invalid_request!("{field}: not a valid URI: {e}"))?;
    let is_localhost = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "::1"));
    if url.scheme() != "https" && !is_localhost {
        return Err(invalid_request!("{field}: must be https (or localhost)"));
    }
    Ok(())
}

fn validate(req: &RegistrationRequest) -> Result<(), Error> {
    if req.redirect_uris.is_empty() {
        return Err(invalid_request!("redirect_uris: at least one is required"));
    }
    for uri in &req.redirect_uris {
        let url =
            Url::parse(uri).map_err(|e| invalid_request!("redirect_uris: {uri:?} is not a valid URI: {e}"))?;
        if url.fragment().is_some() {
            return Err(invalid_request!("redirect_uris: {uri:?} must not contain a fragment"));
        }
        if uri.contains('*') {
            return Err(invalid_request!("redirect_uris: {uri:?} must not contain a wildcard"));
        }
        validate_https_uri(uri, "redirect_uris")?;
    }

    if let Some(grant_types) = &req.grant_types {
        for grant_type in grant_types {
            if !["authorization_code", "refresh_token"].contains(&grant_type.as_str()) {
                return Err(invalid_request!("grant_types: unsupported value {grant_type:?}"));
            }
        }
    }
    if let Some(response_types) = &req.response_types {
        for response_type in response_types {
            if response_type != "code" {
                return Err(invalid_request!("response_types: unsupported value {response_type:?}"));
            }
        }
    }
    if let Some(method) = &req.code_challenge_method {
        if !["S256", "plain"].contains(&method.as_str()) {
            return Err(invalid_request!("code_challenge_method: unsupported value {method:?}"));
        }
    }
    if req.jwks_uri.is_some() && req.jwks.is_some() {
        return Err(invalid_request!("jwks and jwks_uri are mutually exclusive"));
    }
    for (field, value) in [
        ("logo_uri", &req.logo_uri),
        ("client_uri", &req.client_uri),
        ("policy_uri", &req.policy_uri),
        ("tos_uri", &req.tos_uri),
    ] {
        if let Some(value) = value {
            validate_https_uri(value, field)?;
        }
    }
    Ok(())
}

/// `Register(req)` — `spec.md` §4.4.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] if `req` fails validation.
pub async fn register<S: Store>(
    store: &S, req: RegistrationRequest,
) -> Result<RegistrationResponse, Error> {
    validate(&req)?;

    let auth_method = req.token_endpoint_auth_method.unwrap_or(AuthMethod::ClientSecretBasic);
    let client_id = ClientId::from(generate::client_id());
    let raw_secret = (auth_method != AuthMethod::None).then(generate::client_secret);
    let client_secret_hash =
        raw_secret.as_deref().map(hash_client_secret).transpose().map_err(Error::from)?;
    let raw_registration_token = generate::registration_access_token();
    let now = Utc::now();

    let client = Client {
        client_id: client_id.clone(),
        client_secret_hash,
        registration_access_token_hash: hash_registration_token(&raw_registration_token),
        redirect_uris: req.redirect_uris,
        grant_types: req.grant_types.unwrap_or_else(|| vec!["authorization_code".to_string()]),
        response_types: req.response_types.unwrap_or_else(|| vec!["code".to_string()]),
        token_endpoint_auth_method: auth_method,
        allowed_scopes: req.allowed_scopes,
        default_scopes: req.default_scopes,
        subject_type: req.subject_type.unwrap_or(SubjectType::Public),
        require_pkce: req.code_challenge_method.is_some(),
        jwks: req
            .jwks_uri
            .map(JwksSource::Uri)
            .or(req.jwks.map(JwksSource::Inline)),
        client_name: req.client_name,
        client_uri: req.client_uri,
        policy_uri: req.policy_uri,
        tos_uri: req.tos_uri,
        logo_uri: req.logo_uri,
        contacts: req.contacts,
        client_id_issued_at: now,
    };

    store.create_client(client).await?;
    tracing::info!(%client_id, "client registered");

    Ok(RegistrationResponse {
        client_id: client_id.clone(),
        client_secret: raw_secret,
        registration_access_token: raw_registration_token,
        registration_client_uri: format!("/register/{client_id}"),
        client_id_issued_at: now.timestamp(),
    })
}

async fn authenticate<S: Store>(
    store: &S, client_id: &ClientId, registration_access_token: &str,
) -> Result<Client, Error> {
    let Some(client) = store.get_client(client_id).await? else {
        return Err(invalid_client!("unknown client {client_id}"));
    };
    if !verify_registration_token(registration_access_token, &client.registration_access_token_hash) {
        return Err(Error::InvalidToken("registration access token does not match".to_string()));
    }
    Ok(client)
}

/// `Read` — `spec.md` §4.4.
///
/// # Errors
///
/// Returns [`Error::InvalidClient`] for an unknown client, or
/// [`Error::InvalidToken`] for a wrong registration access token.
pub async fn read<S: Store>(
    store: &S, client_id: &ClientId, registration_access_token: &str,
) -> Result<Client, Error> {
    authenticate(store, client_id, registration_access_token).await
}

/// `Update` — `spec.md` §4.4. Re-validates the full request;
/// `client_id_issued_at` is preserved from the original registration.
///
/// # Errors
///
/// Returns [`Error::InvalidClient`]/[`Error::InvalidToken`] as [`read`],
/// or [`Error::InvalidRequest`] if `req` fails validation.
pub async fn update<S: Store>(
    store: &S, client_id: &ClientId, registration_access_token: &str, req: RegistrationRequest,
) -> Result<Client, Error> {
    let existing = authenticate(store, client_id, registration_access_token).await?;
    validate(&req)?;

    let auth_method = req.token_endpoint_auth_method.unwrap_or(AuthMethod::ClientSecretBasic);
    let updated = Client {
        client_id: existing.client_id,
        client_secret_hash: existing.client_secret_hash,
        registration_access_token_hash: existing.registration_access_token_hash,
        redirect_uris: req.redirect_uris,
        grant_types: req.grant_types.unwrap_or_else(|| vec!["authorization_code".to_string()]),
        response_types: req.response_types.unwrap_or_else(|| vec!["code".to_string()]),
        token_endpoint_auth_method: auth_method,
        allowed_scopes: req.allowed_scopes,
        default_scopes: req.default_scopes,
        subject_type: req.subject_type.unwrap_or(SubjectType::Public),
        require_pkce: req.code_challenge_method.is_some(),
        jwks: req.jwks_uri.map(JwksSource::Uri).or(req.jwks.map(JwksSource::Inline)),
        client_name: req.client_name,
        client_uri: req.client_uri,
        policy_uri: req.policy_uri,
        tos_uri: req.tos_uri,
        logo_uri: req.logo_uri,
        contacts: req.contacts,
        client_id_issued_at: existing.client_id_issued_at,
    };
    store.update_client(updated.clone()).await?;
    Ok(updated)
}

/// `Delete` — `spec.md` §4.4.
///
/// # Errors
///
/// Returns [`Error::InvalidClient`]/[`Error::InvalidToken`] as [`read`].
pub async fn delete<S: Store>(
    store: &S, client_id: &ClientId, registration_access_token: &str,
) -> Result<(), Error> {
    authenticate(store, client_id, registration_access_token).await?;
    store.delete_client(client_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> RegistrationRequest {
        RegistrationRequest {
            redirect_uris: vec!["https://rp.example/cb".to_string()],
            token_endpoint_auth_method: Some(AuthMethod::None),
            grant_types: None,
            response_types: None,
            allowed_scopes: vec!["openid".to_string()],
            default_scopes: vec!["openid".to_string()],
            subject_type: None,
            code_challenge_method: Some("S256".to_string()),
            jwks_uri: None,
            jwks: None,
            client_name: Some("Test RP".to_string()),
            client_uri: None,
            policy_uri: None,
            tos_uri: None,
            logo_uri: None,
            contacts: vec![],
        }
    }

    #[test]
    fn rejects_empty_redirect_uris() {
        let mut req = sample_request();
        req.redirect_uris = vec![];
        assert!(validate(&req).is_err());
    }

    #[test]
    fn rejects_non_https_redirect_uri() {
        let mut req = sample_request();
        req.redirect_uris = vec!["http://rp.example/cb".to_string()];
        assert!(validate(&req).is_err());
    }

    #[test]
    fn allows_localhost_http() {
        let mut req = sample_request();
        req.redirect_uris = vec!["http://localhost:8080/cb".to_string()];
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn rejects_jwks_and_jwks_uri_together() {
        let mut req = sample_request();
        req.jwks_uri = Some("https://rp.example/jwks".to_string());
        req.jwks = Some(serde_json::json!({"keys": []}));
        assert!(validate(&req).is_err());
    }

    #[test]
    fn rejects_redirect_uri_with_fragment() {
        let mut req = sample_request();
        req.redirect_uris = vec!["https://rp.example/cb#frag".to_string()];
        assert!(validate(&req).is_err());
    }
}
