//! # OAuth / `OpenID4VP` Errors
//!
//! One variant per error kind in `spec.md` §7, serialized as the compact
//! `{"error":...,"error_description":...}` envelope the OIDC/OAuth2 error
//! responses use. Grounded on the teacher's `oid4vci::error::Error`: a
//! `thiserror` enum whose `Display` impl IS the JSON body, reparsed by
//! `Serialize` rather than hand-built twice.

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::core::urlencode;

/// Errors the OIDC/`OpenID4VP` bridge can return, one variant per error
/// kind enumerated in `spec.md` §7.
#[derive(Error, Debug, Deserialize)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// The request is missing a required parameter, repeats one, or is
    /// otherwise malformed.
    #[error(r#"{{"error": "invalid_request", "error_description": "{0}"}}"#)]
    InvalidRequest(String),

    /// Client authentication failed, or `client_id` is unknown.
    #[error(r#"{{"error": "invalid_client", "error_description": "{0}"}}"#)]
    InvalidClient(String),

    /// The authorization code or refresh token is invalid, expired,
    /// already used, or was issued to another client/redirect URI.
    #[error(r#"{{"error": "invalid_grant", "error_description": "{0}"}}"#)]
    InvalidGrant(String),

    /// The presented access token is invalid or expired.
    #[error(r#"{{"error": "invalid_token", "error_description": "{0}"}}"#)]
    InvalidToken(String),

    /// The requested scope is invalid, unknown, or exceeds what the
    /// client is allowed.
    #[error(r#"{{"error": "invalid_scope", "error_description": "{0}"}}"#)]
    InvalidScope(String),

    /// The `grant_type` is not one this server supports.
    #[error(r#"{{"error": "unsupported_grant_type", "error_description": "{0}"}}"#)]
    UnsupportedGrantType(String),

    /// The `response_type` is not one this server supports.
    #[error(r#"{{"error": "unsupported_response_type", "error_description": "{0}"}}"#)]
    UnsupportedResponseType(String),

    /// The end user (or wallet, on their behalf) denied the request.
    #[error(r#"{{"error": "access_denied", "error_description": "{0}"}}"#)]
    AccessDenied(String),

    /// No session exists for the given identifier.
    #[error(r#"{{"error": "session_not_found", "error_description": "{0}"}}"#)]
    SessionNotFound(String),

    /// The session's `expires_at` has passed.
    #[error(r#"{{"error": "session_expired", "error_description": "{0}"}}"#)]
    SessionExpired(String),

    /// The ephemeral decryption key named by a JWE's `kid` is not (or no
    /// longer) in the cache.
    #[error(r#"{{"error": "ephemeral_key_missing", "error_description": "{0}"}}"#)]
    EphemeralKeyMissing(String),

    /// The presented VP token failed a structural or claims check
    /// (`spec.md` §4.6 step 4).
    #[error(r#"{{"error": "presentation_invalid", "error_description": "{0}"}}"#)]
    PresentationInvalid(String),

    /// A JWS or key-binding signature failed to verify.
    #[error(r#"{{"error": "signature_invalid", "error_description": "{0}"}}"#)]
    SignatureInvalid(String),

    /// An unexpected internal failure — never includes the underlying
    /// cause in the wire body (`spec.md` §7); the cause is logged at the
    /// call site instead.
    #[error(r#"{{"error": "server_error", "error_description": "{0}"}}"#)]
    ServerError(String),
}

impl Error {
    /// The `error` code this variant serializes to, independent of the
    /// description.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::InvalidToken(_) => "invalid_token",
            Self::InvalidScope(_) => "invalid_scope",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::AccessDenied(_) => "access_denied",
            Self::SessionNotFound(_) => "session_not_found",
            Self::SessionExpired(_) => "session_expired",
            Self::EphemeralKeyMissing(_) => "ephemeral_key_missing",
            Self::PresentationInvalid(_) => "presentation_invalid",
            Self::SignatureInvalid(_) => "signature_invalid",
            Self::ServerError(_) => "server_error",
        }
    }

    /// The HTTP status this error maps to per `spec.md` §6's fixed table.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidGrant(_)
            | Self::InvalidScope(_)
            | Self::UnsupportedGrantType(_)
            | Self::UnsupportedResponseType(_)
            | Self::PresentationInvalid(_)
            | Self::SessionExpired(_) => 400,
            Self::InvalidClient(_) | Self::InvalidToken(_) | Self::SignatureInvalid(_) => 401,
            Self::AccessDenied(_) => 403,
            Self::SessionNotFound(_) | Self::EphemeralKeyMissing(_) => 404,
            Self::ServerError(_) => 500,
        }
    }

    /// This error as an `OpenID` compatible JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.to_string()).unwrap_or_default()
    }

    /// This error as an `application/x-www-form-urlencoded` query string,
    /// suitable for appending to a redirect URI.
    #[must_use]
    pub fn to_querystring(&self) -> String {
        urlencode::to_string(&self).unwrap_or_default()
    }
}

#[derive(Deserialize, Serialize)]
struct ErrorBody {
    error: String,
    error_description: String,
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as _;
        let Ok(body) = serde_json::from_str::<ErrorBody>(&self.to_string()) else {
            return Err(S::Error::custom("failed to reparse Error display as JSON"));
        };
        body.serialize(serializer)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::ServerError(err.to_string())
    }
}

/// Build an [`Error::InvalidRequest`].
#[macro_export]
macro_rules! invalid_request {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::oauth::error::Error::InvalidRequest(format!($fmt, $($arg)*))
    };
    ($err:expr $(,)?) => {
        $crate::oauth::error::Error::InvalidRequest(format!($err))
    };
}

/// Build an [`Error::InvalidGrant`].
#[macro_export]
macro_rules! invalid_grant {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::oauth::error::Error::InvalidGrant(format!($fmt, $($arg)*))
    };
    ($err:expr $(,)?) => {
        $crate::oauth::error::Error::InvalidGrant(format!($err))
    };
}

/// Build an [`Error::InvalidClient`].
#[macro_export]
macro_rules! invalid_client {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::oauth::error::Error::InvalidClient(format!($fmt, $($arg)*))
    };
    ($err:expr $(,)?) => {
        $crate::oauth::error::Error::InvalidClient(format!($err))
    };
}

/// Build an [`Error::InvalidScope`].
#[macro_export]
macro_rules! invalid_scope {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::oauth::error::Error::InvalidScope(format!($fmt, $($arg)*))
    };
    ($err:expr $(,)?) => {
        $crate::oauth::error::Error::InvalidScope(format!($err))
    };
}

/// Build an [`Error::ServerError`].
#[macro_export]
macro_rules! server_error {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::oauth::error::Error::ServerError(format!($fmt, $($arg)*))
    };
    ($err:expr $(,)?) => {
        $crate::oauth::error::Error::ServerError(format!($err))
    };
}
