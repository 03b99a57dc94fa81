//! # Provider Traits
//!
//! The two external collaborators this crate requires from its host
//! application: persistence ([`Store`]) and issuer key resolution
//! ([`TrustAnchor`], standing in for `spec.md` §4.6's `TrustService`,
//! explicitly out of core scope). Grounded on the teacher's
//! `oid4vp::provider::Metadata` trait shape: plain methods returning
//! `impl Future<Output = Result<T>> + Send` rather than pulling in
//! `async-trait`, since every call site here is generic, not `dyn`.

use std::future::Future;

use super::error::Error;
use super::types::{AccessToken, AuthorizationCode, Client, ClientId, Session, SessionId};
use crate::crypto::jws::VerifyingKey;

/// Persistence for [`Session`]s and [`Client`]s (`spec.md` §4.1).
///
/// Implementors must be cheap to clone — every handler takes `&self` over
/// a `Store`, matching `spec.md` §5's concurrency model. `crates/memstore`
/// provides the in-memory implementation used by tests and the demo.
pub trait Store: Clone + Send + Sync + 'static {
    /// Persist a newly created session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServerError`] if a session with the same `id`
    /// already exists.
    fn create_session(&self, session: Session) -> impl Future<Output = Result<(), Error>> + Send;

    /// Look up a session by id. Absence is not an error.
    fn get_session(
        &self, id: &SessionId,
    ) -> impl Future<Output = Result<Option<Session>, Error>> + Send;

    /// Look up the session currently holding `code` as its (possibly
    /// already-used) authorization code.
    fn get_by_authorization_code(
        &self, code: &AuthorizationCode,
    ) -> impl Future<Output = Result<Option<Session>, Error>> + Send;

    /// Look up the session currently holding `token` as its access token.
    fn get_by_access_token(
        &self, token: &AccessToken,
    ) -> impl Future<Output = Result<Option<Session>, Error>> + Send;

    /// Persist an updated session in full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if no session with this id
    /// exists.
    fn update_session(&self, session: Session) -> impl Future<Output = Result<(), Error>> + Send;

    /// Atomically set `tokens.authorization_code_used` from `false` to
    /// `true`. Returns `true` if this call performed the transition,
    /// `false` if it was already `true` (the replay case, `spec.md` §4.5
    /// step 8).
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if no session with this id
    /// exists.
    fn mark_code_used(&self, id: &SessionId) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Delete a session.
    fn delete_session(&self, id: &SessionId) -> impl Future<Output = Result<(), Error>> + Send;

    /// Persist a newly registered client.
    fn create_client(&self, client: Client) -> impl Future<Output = Result<(), Error>> + Send;

    /// Look up a client by id. Absence is not an error.
    fn get_client(
        &self, id: &ClientId,
    ) -> impl Future<Output = Result<Option<Client>, Error>> + Send;

    /// Persist an updated client in full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClient`] if no client with this id exists.
    fn update_client(&self, client: Client) -> impl Future<Output = Result<(), Error>> + Send;

    /// Delete a client's registration.
    fn delete_client(&self, id: &ClientId) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Resolves the verifying key for a credential issuer's signature
/// (`spec.md` §4.6 step 4: "trust source out of core scope; call out to a
/// `TrustService` interface"). The in-memory implementation in
/// `crates/test-utils` backs this with a fixed issuer → key map.
pub trait TrustAnchor: Clone + Send + Sync + 'static {
    /// Resolve the verifying key this verifier should trust for `issuer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PresentationInvalid`] if `issuer` is not a known,
    /// trusted credential issuer.
    fn verifying_key_for_issuer(
        &self, issuer: &str,
    ) -> impl Future<Output = Result<VerifyingKey, Error>> + Send;
}
