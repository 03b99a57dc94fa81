//! `GET /authorize` — `spec.md` §4.5 "Authorize".

use chrono::Utc;
use serde::Deserialize;

use crate::config::Config;
use crate::core::generate;
use crate::core::strings::scopes_allowed;
use crate::crypto::pkce;
use crate::oauth::error::Error;
use crate::oauth::provider::Store;
use crate::oauth::types::{OidcRequest, Openid4VpState, Session, SessionId, Status, Tokens};
use crate::{invalid_request, invalid_scope};

/// Parameters accepted by `/authorize`.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthorizeRequest {
    /// Always `"code"`.
    pub response_type: String,
    /// The registered client making the request.
    pub client_id: String,
    /// Must match one of the client's registered redirect URIs exactly.
    pub redirect_uri: String,
    /// Space-delimited requested scopes. Defaults to the client's
    /// `default_scopes` when absent.
    #[serde(default)]
    pub scope: Option<String>,
    /// Opaque RP value, echoed back on the final redirect.
    pub state: String,
    /// Bound into the `id_token` and the request object nonce.
    pub nonce: String,
    /// PKCE challenge.
    #[serde(default)]
    pub code_challenge: Option<String>,
    /// PKCE method (`S256` or `plain`).
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    /// Whether to show credential details in the cross-device UI before
    /// redirecting the RP.
    #[serde(default)]
    pub show_credential_details: bool,
}

/// What the HTTP layer needs to render the next step: a session id plus
/// the URLs for the wallet deep link and RP polling (`spec.md` §4.5 step
/// 7).
#[derive(Clone, Debug, serde::Serialize)]
pub struct AuthorizeResponse {
    /// The newly created session.
    pub session_id: SessionId,
    /// Where the wallet fetches the signed request object.
    pub request_object_uri: String,
    /// Where the RP polls for the outcome.
    pub poll_uri: String,
}

/// `Authorize` — `spec.md` §4.5.
///
/// # Errors
///
/// Returns [`Error::InvalidClient`] for an unknown client,
/// [`Error::InvalidRequest`] for a redirect URI / response type mismatch
/// or a missing required PKCE challenge, or [`Error::InvalidScope`] if the
/// requested scopes exceed what the client is allowed.
#[tracing::instrument(skip(store, config), err)]
pub async fn authorize<S: Store>(
    store: &S, config: &Config, req: AuthorizeRequest,
) -> Result<AuthorizeResponse, Error> {
    let client_id = req.client_id.clone().into();
    let Some(client) = store.get_client(&client_id).await? else {
        return Err(Error::InvalidClient(format!("unknown client {}", req.client_id)));
    };

    if !client.redirect_uris.iter().any(|uri| uri == &req.redirect_uri) {
        return Err(invalid_request!("redirect_uri does not match a registered URI"));
    }
    if !client.response_types.iter().any(|rt| rt == &req.response_type) {
        return Err(invalid_request!("response_type {:?} not permitted for this client", req.response_type));
    }

    let scope = req.scope.unwrap_or_else(|| client.default_scopes.join(" "));
    if !scopes_allowed(&scope, &client.allowed_scopes) {
        return Err(invalid_scope!("requested scope exceeds client's allowed scopes"));
    }

    if client.require_pkce && req.code_challenge.is_none() {
        return Err(invalid_request!("this client must send a PKCE code_challenge"));
    }
    if let Some(method) = &req.code_challenge_method {
        if pkce::Method::parse(method).is_none() {
            return Err(invalid_request!("unsupported code_challenge_method {method:?}"));
        }
    }

    let now = Utc::now();
    let session_id = SessionId::from(generate::session_id());
    let session = Session {
        id: session_id.clone(),
        status: Status::Pending,
        created_at: now,
        expires_at: now + chrono::Duration::seconds(config.lifetimes.session_duration_sec),
        oidc_request: OidcRequest {
            client_id,
            redirect_uri: req.redirect_uri,
            scope,
            state: req.state,
            nonce: req.nonce,
            response_type: req.response_type,
            code_challenge: req.code_challenge,
            code_challenge_method: req.code_challenge_method,
            show_credential_details: req.show_credential_details,
        },
        openid4vp: Openid4VpState::default(),
        tokens: Tokens::default(),
        verified_claims: std::collections::BTreeMap::new(),
    };
    store.create_session(session).await?;
    tracing::info!(%session_id, "session created");

    Ok(AuthorizeResponse {
        request_object_uri: format!(
            "{}/verification/request-object?id={session_id}",
            config.external_url
        ),
        poll_uri: format!("{}/session/{session_id}", config.external_url),
        session_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DigitalCredentialsConfig, Lifetimes, SubjectType as ConfigSubjectType};
    use crate::oauth::types::{AuthMethod, Client, SubjectType};

    #[derive(Clone, Default)]
    struct FakeStore {
        clients: std::sync::Arc<dashmap::DashMap<String, Client>>,
        sessions: std::sync::Arc<dashmap::DashMap<String, Session>>,
    }

    impl Store for FakeStore {
        async fn create_session(&self, session: Session) -> Result<(), Error> {
            self.sessions.insert(session.id.0.clone(), session);
            Ok(())
        }
        async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, Error> {
            Ok(self.sessions.get(&id.0).map(|s| s.clone()))
        }
        async fn get_by_authorization_code(
            &self, _code: &crate::oauth::types::AuthorizationCode,
        ) -> Result<Option<Session>, Error> {
            Ok(None)
        }
        async fn get_by_access_token(
            &self, _token: &crate::oauth::types::AccessToken,
        ) -> Result<Option<Session>, Error> {
            Ok(None)
        }
        async fn update_session(&self, session: Session) -> Result<(), Error> {
            self.sessions.insert(session.id.0.clone(), session);
            Ok(())
        }
        async fn mark_code_used(&self, _id: &SessionId) -> Result<bool, Error> {
            Ok(true)
        }
        async fn delete_session(&self, id: &SessionId) -> Result<(), Error> {
            self.sessions.remove(&id.0);
            Ok(())
        }
        async fn create_client(&self, client: Client) -> Result<(), Error> {
            self.clients.insert(client.client_id.0.clone(), client);
            Ok(())
        }
        async fn get_client(
            &self, id: &crate::oauth::types::ClientId,
        ) -> Result<Option<Client>, Error> {
            Ok(self.clients.get(&id.0).map(|c| c.clone()))
        }
        async fn update_client(&self, client: Client) -> Result<(), Error> {
            self.clients.insert(client.client_id.0.clone(), client);
            Ok(())
        }
        async fn delete_client(&self, id: &crate::oauth::types::ClientId) -> Result<(), Error> {
            self.clients.remove(&id.0);
            Ok(())
        }
    }

    fn test_config() -> Config {
        let key = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        use pkcs8::EncodePrivateKey;
        let pem = key.to_pkcs8_pem(pkcs8::LineEnding::LF).unwrap();
        Config::new(
            "https://verifier.example".to_string(),
            "https://verifier.example".to_string(),
            ConfigSubjectType::Public,
            None,
            Lifetimes::default(),
            DigitalCredentialsConfig { enabled: false, response_mode: "dc_api".to_string(), preferred_formats: vec![] },
            &pem,
            None,
            vec![],
            std::collections::BTreeMap::new(),
        )
        .unwrap()
    }

    fn test_client(require_pkce: bool) -> Client {
        Client {
            client_id: "client-1".into(),
            client_secret_hash: None,
            registration_access_token_hash: "hash".to_string(),
            redirect_uris: vec!["https://rp.example/cb".to_string()],
            grant_types: vec!["authorization_code".to_string()],
            response_types: vec!["code".to_string()],
            token_endpoint_auth_method: AuthMethod::None,
            allowed_scopes: vec!["openid".to_string()],
            default_scopes: vec!["openid".to_string()],
            subject_type: SubjectType::Public,
            require_pkce,
            jwks: None,
            client_name: None,
            client_uri: None,
            policy_uri: None,
            tos_uri: None,
            logo_uri: None,
            contacts: vec![],
            client_id_issued_at: Utc::now(),
        }
    }

    fn sample_req() -> AuthorizeRequest {
        AuthorizeRequest {
            response_type: "code".to_string(),
            client_id: "client-1".to_string(),
            redirect_uri: "https://rp.example/cb".to_string(),
            scope: Some("openid".to_string()),
            state: "xyz".to_string(),
            nonce: "n1".to_string(),
            code_challenge: Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string()),
            code_challenge_method: Some("S256".to_string()),
            show_credential_details: false,
        }
    }

    #[tokio::test]
    async fn creates_pending_session_for_known_client() {
        let store = FakeStore::default();
        store.create_client(test_client(true)).await.unwrap();
        let config = test_config();

        let response = authorize(&store, &config, sample_req()).await.unwrap();
        let session = store.get_session(&response.session_id).await.unwrap().unwrap();
        assert_eq!(session.status, Status::Pending);
    }

    #[tokio::test]
    async fn rejects_mismatched_redirect_uri() {
        let store = FakeStore::default();
        store.create_client(test_client(true)).await.unwrap();
        let config = test_config();

        let mut req = sample_req();
        req.redirect_uri = "https://evil.example/cb".to_string();
        assert!(authorize(&store, &config, req).await.is_err());
    }

    #[tokio::test]
    async fn rejects_missing_pkce_when_required() {
        let store = FakeStore::default();
        store.create_client(test_client(true)).await.unwrap();
        let config = test_config();

        let mut req = sample_req();
        req.code_challenge = None;
        req.code_challenge_method = None;
        assert!(authorize(&store, &config, req).await.is_err());
    }

    #[tokio::test]
    async fn rejects_unknown_client() {
        let store = FakeStore::default();
        let config = test_config();
        assert!(authorize(&store, &config, sample_req()).await.is_err());
    }
}
