//! # Data Model
//!
//! [`Session`] and [`Client`] as specified in `spec.md` §3, plus the
//! opaque-identifier newtypes (`spec.md` §9 "Dynamic dispatch" — the
//! teacher prefers tagged variants over bare strings at call sites).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype!(SessionId);
string_newtype!(ClientId);
string_newtype!(AuthorizationCode);
string_newtype!(AccessToken);

/// Where a [`Session`] sits in the flow (`spec.md` §4.5 "State machine").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// `/authorize` has been called; the wallet has not yet fetched the
    /// request object.
    Pending,
    /// The wallet has fetched the request object and a response is
    /// awaited.
    AwaitingPresentation,
    /// A valid presentation was received; an authorization code was
    /// minted.
    CodeIssued,
    /// The authorization code was exchanged for tokens.
    TokenIssued,
    /// Terminal: the flow finished successfully and nothing further will
    /// happen to this session.
    Completed,
    /// Terminal: the flow failed (invalid presentation, wallet
    /// cancellation, …).
    Error,
    /// Terminal: `expires_at` passed before the flow completed.
    Expired,
}

impl Status {
    /// Whether this status is terminal — `spec.md` §3's invariant that a
    /// session in a terminal state is never mutated again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Expired)
    }
}

/// The RP's original `/authorize` request, recorded on the session so
/// later steps (token exchange, redirect construction) can refer back to
/// it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OidcRequest {
    /// The authenticated client.
    pub client_id: ClientId,
    /// Must match one of the client's registered `redirect_uris` exactly.
    pub redirect_uri: String,
    /// Space-delimited requested scopes.
    pub scope: String,
    /// Opaque RP value, echoed back on the final redirect.
    pub state: String,
    /// Bound into the `id_token` and the `OpenID4VP` request nonce.
    pub nonce: String,
    /// Always `"code"` in this crate (`spec.md` §6's
    /// `response_types_supported`).
    pub response_type: String,
    /// PKCE challenge, if the client sent one.
    pub code_challenge: Option<String>,
    /// PKCE method (`S256` or `plain`), required if `code_challenge` is
    /// set.
    pub code_challenge_method: Option<String>,
    /// Whether the cross-device UI should show credential details to the
    /// end user before the RP is redirected. Outside this crate's
    /// protocol surface, but recorded since it travels with the request.
    pub show_credential_details: bool,
}

/// `OpenID4VP` exchange state recorded on the session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Openid4VpState {
    /// Opaque identifier for the wallet instance, once known.
    pub wallet_id: Option<String>,
    /// The nonce embedded in the request object, checked against the
    /// key-binding JWT.
    pub request_object_nonce: Option<String>,
    /// The raw `vp_token` as posted by the wallet.
    pub vp_token: Option<String>,
    /// The `presentation_submission` the wallet posted alongside it.
    pub presentation_submission: Option<Value>,
    /// The `kid` of the ephemeral decryption key generated for this
    /// session's request object, if response encryption is in use.
    pub ephemeral_encryption_kid: Option<String>,
}

/// Token state recorded on the session across the code → token exchange.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Tokens {
    /// The minted authorization code, once issued.
    pub authorization_code: Option<AuthorizationCode>,
    /// When the authorization code expires.
    pub code_expires_at: Option<DateTime<Utc>>,
    /// Set by an atomic compare-and-set on first use; a second exchange
    /// attempt observes `true` and fails (`spec.md` §4.5 step 8, replay
    /// defence).
    pub authorization_code_used: bool,
    /// The minted opaque access token.
    pub access_token: Option<AccessToken>,
    /// When the access token expires.
    pub access_token_expires_at: Option<DateTime<Utc>>,
    /// The minted signed `id_token`.
    pub id_token: Option<String>,
    /// The minted opaque refresh token, if refresh is supported for this
    /// client.
    pub refresh_token: Option<String>,
    /// When the refresh token expires.
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
}

/// One RP authorization attempt, end to end (`spec.md` §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Opaque, 128-bit random, URL-safe base64 identifier.
    pub id: SessionId,
    /// Where this session sits in the state machine.
    pub status: Status,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Absolute deadline; default TTL 15 minutes (`spec.md` §3).
    pub expires_at: DateTime<Utc>,
    /// The RP's original `/authorize` request.
    pub oidc_request: OidcRequest,
    /// `OpenID4VP` exchange state.
    pub openid4vp: Openid4VpState,
    /// Token issuance state.
    pub tokens: Tokens,
    /// Claims materialised from the verified presentation, keyed by claim
    /// name.
    pub verified_claims: BTreeMap<String, Value>,
}

impl Session {
    /// Whether `now` is past this session's absolute deadline.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Client token-endpoint authentication method (`spec.md` §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// HTTP Basic auth carrying `client_id`/`client_secret`.
    ClientSecretBasic,
    /// `client_id`/`client_secret` as POST body parameters.
    ClientSecretPost,
    /// No client authentication (public client).
    None,
}

/// Subject identifier derivation for this client's users (`spec.md` §3, §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    /// The same `sub` across every client.
    Public,
    /// A per-client, salted `sub`.
    Pairwise,
}

/// Where a client's signature-verification JWKS is found.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JwksSource {
    /// A URL the verifier fetches on demand. Out of scope for this crate
    /// to dereference; recorded for completeness.
    Uri(String),
    /// The JWKS inlined at registration time.
    Inline(Value),
}

/// A registered relying party (`spec.md` §3, §4.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Client {
    /// 128-bit random, hex-encoded identifier (32 chars).
    pub client_id: ClientId,
    /// Bcrypt hash of the client secret. `None` when
    /// `token_endpoint_auth_method = none`.
    pub client_secret_hash: Option<String>,
    /// SHA-256 hex hash of the registration access token.
    pub registration_access_token_hash: String,
    /// Registered redirect URIs; `/authorize` requires an exact match
    /// against one of these.
    pub redirect_uris: Vec<String>,
    /// Grant types this client may use.
    pub grant_types: Vec<String>,
    /// Response types this client may use (always `["code"]` today).
    pub response_types: Vec<String>,
    /// How this client authenticates at `/token`.
    pub token_endpoint_auth_method: AuthMethod,
    /// Scopes this client is permitted to request.
    pub allowed_scopes: Vec<String>,
    /// Scopes granted when `/authorize` omits `scope`.
    pub default_scopes: Vec<String>,
    /// How `sub` is derived for this client's users.
    pub subject_type: SubjectType,
    /// Whether `/authorize` must carry a `code_challenge`.
    pub require_pkce: bool,
    /// The client's own JWKS, if it has one (e.g. for a future
    /// private_key_jwt auth method).
    pub jwks: Option<JwksSource>,
    /// Human-readable client name.
    pub client_name: Option<String>,
    /// Client homepage.
    pub client_uri: Option<String>,
    /// Privacy policy URI.
    pub policy_uri: Option<String>,
    /// Terms of service URI.
    pub tos_uri: Option<String>,
    /// Logo URI.
    pub logo_uri: Option<String>,
    /// Contact addresses.
    pub contacts: Vec<String>,
    /// When this registration was created.
    pub client_id_issued_at: DateTime<Utc>,
}
