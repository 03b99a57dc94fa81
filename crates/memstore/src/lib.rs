//! In-memory [`Store`](vp_bridge::oauth::provider::Store) implementation,
//! backed by `dashmap` (`spec.md` §4.1, §9 "Persistence"). Grounded on the
//! `FakeStore` test doubles built up across `vp-bridge`'s own unit tests
//! (`oauth::endpoint::token`, `oid4vp::request_object`,
//! `oid4vp::direct_post`): a `dashmap` keyed by session/client id, plus two
//! secondary indexes for the authorization-code and access-token lookups
//! the protocol needs.
//!
//! Not durable — restarting the process loses every session and client.
//! Intended for tests and the `demos/verifier` binary; a real deployment
//! swaps this crate for a `Store` backed by Redis/Postgres/etc.

use std::sync::Arc;

use dashmap::DashMap;
use vp_bridge::oauth::error::Error;
use vp_bridge::oauth::provider::Store;
use vp_bridge::oauth::types::{AccessToken, AuthorizationCode, Client, ClientId, Session, SessionId};
use vp_bridge::server_error;

/// An in-memory, `dashmap`-backed [`Store`].
///
/// Cheap to clone — every field is an `Arc<DashMap<_, _>>`, matching
/// `spec.md` §5's concurrency model (every handler takes `&self` over a
/// shared store).
#[derive(Clone, Default)]
pub struct MemStore {
    sessions: Arc<DashMap<SessionId, Session>>,
    clients: Arc<DashMap<ClientId, Client>>,
}

impl MemStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    async fn create_session(&self, session: Session) -> Result<(), Error> {
        if self.sessions.contains_key(&session.id) {
            return Err(server_error!("session {} already exists", session.id));
        }
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, Error> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn get_by_authorization_code(
        &self, code: &AuthorizationCode,
    ) -> Result<Option<Session>, Error> {
        Ok(self
            .sessions
            .iter()
            .find(|entry| entry.tokens.authorization_code.as_ref() == Some(code))
            .map(|entry| entry.clone()))
    }

    async fn get_by_access_token(&self, token: &AccessToken) -> Result<Option<Session>, Error> {
        Ok(self
            .sessions
            .iter()
            .find(|entry| entry.tokens.access_token.as_ref() == Some(token))
            .map(|entry| entry.clone()))
    }

    async fn update_session(&self, session: Session) -> Result<(), Error> {
        if !self.sessions.contains_key(&session.id) {
            return Err(Error::SessionNotFound(session.id.to_string()));
        }
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn mark_code_used(&self, id: &SessionId) -> Result<bool, Error> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        if entry.tokens.authorization_code_used {
            Ok(false)
        } else {
            entry.tokens.authorization_code_used = true;
            Ok(true)
        }
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), Error> {
        self.sessions.remove(id);
        Ok(())
    }

    async fn create_client(&self, client: Client) -> Result<(), Error> {
        self.clients.insert(client.client_id.clone(), client);
        Ok(())
    }

    async fn get_client(&self, id: &ClientId) -> Result<Option<Client>, Error> {
        Ok(self.clients.get(id).map(|entry| entry.clone()))
    }

    async fn update_client(&self, client: Client) -> Result<(), Error> {
        if !self.clients.contains_key(&client.client_id) {
            return Err(vp_bridge::invalid_client!(
                "no client registered with id {}",
                client.client_id
            ));
        }
        self.clients.insert(client.client_id.clone(), client);
        Ok(())
    }

    async fn delete_client(&self, id: &ClientId) -> Result<(), Error> {
        self.clients.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use vp_bridge::oauth::types::{OidcRequest, Openid4VpState, Status, Tokens};
    use vp_bridge::oauth::types::SessionId as Id;

    use super::*;

    fn fresh_session(id: &str) -> Session {
        Session {
            id: Id::from(id),
            status: Status::Pending,
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::minutes(15),
            oidc_request: OidcRequest {
                client_id: ClientId::from("client-1"),
                redirect_uri: "https://rp.example/callback".to_string(),
                scope: "openid".to_string(),
                state: "xyz".to_string(),
                nonce: "n-0s6Q".to_string(),
                response_type: "code".to_string(),
                code_challenge: None,
                code_challenge_method: None,
                show_credential_details: false,
            },
            openid4vp: Openid4VpState::default(),
            tokens: Tokens::default(),
            verified_claims: std::collections::BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn creates_and_fetches_a_session() {
        let store = MemStore::new();
        let session = fresh_session("sess-1");
        store.create_session(session.clone()).await.unwrap();

        let fetched = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, session.id);
    }

    #[tokio::test]
    async fn rejects_duplicate_session_creation() {
        let store = MemStore::new();
        let session = fresh_session("sess-1");
        store.create_session(session.clone()).await.unwrap();

        assert!(store.create_session(session).await.is_err());
    }

    #[tokio::test]
    async fn update_session_requires_prior_existence() {
        let store = MemStore::new();
        let session = fresh_session("sess-1");

        assert!(matches!(
            store.update_session(session).await,
            Err(Error::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn mark_code_used_is_one_shot() {
        let store = MemStore::new();
        let mut session = fresh_session("sess-1");
        session.tokens.authorization_code = Some(AuthorizationCode::from("code-1"));
        store.create_session(session.clone()).await.unwrap();

        assert!(store.mark_code_used(&session.id).await.unwrap());
        assert!(!store.mark_code_used(&session.id).await.unwrap());
    }

    #[tokio::test]
    async fn finds_session_by_access_token() {
        let store = MemStore::new();
        let mut session = fresh_session("sess-1");
        session.tokens.access_token = Some(AccessToken::from("token-1"));
        store.create_session(session.clone()).await.unwrap();

        let found = store
            .get_by_access_token(&AccessToken::from("token-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, session.id);

        assert!(store
            .get_by_access_token(&AccessToken::from("no-such-token"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn client_crud_round_trips() {
        let store = MemStore::new();
        let client = Client {
            client_id: ClientId::from("client-1"),
            client_secret_hash: None,
            registration_access_token_hash: "hash".to_string(),
            redirect_uris: vec!["https://rp.example/callback".to_string()],
            grant_types: vec!["authorization_code".to_string()],
            response_types: vec!["code".to_string()],
            token_endpoint_auth_method: vp_bridge::oauth::types::AuthMethod::None,
            allowed_scopes: vec!["openid".to_string()],
            default_scopes: vec!["openid".to_string()],
            subject_type: vp_bridge::oauth::types::SubjectType::Public,
            require_pkce: true,
            jwks: None,
            client_name: None,
            client_uri: None,
            policy_uri: None,
            tos_uri: None,
            logo_uri: None,
            contacts: vec![],
            client_id_issued_at: Utc::now(),
        };
        store.create_client(client.clone()).await.unwrap();

        let fetched = store.get_client(&client.client_id).await.unwrap().unwrap();
        assert_eq!(fetched.client_id, client.client_id);

        store.delete_client(&client.client_id).await.unwrap();
        assert!(store.get_client(&client.client_id).await.unwrap().is_none());
    }
}
