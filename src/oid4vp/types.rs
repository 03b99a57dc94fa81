//! # `OpenID4VP` Request/Response Data Model
//!
//! The wire shapes exchanged with the wallet (`spec.md` §3 "Request
//! object"). Grounded on the teacher's `oid4vp::types::request::RequestObject`
//! field set, trimmed to what `spec.md` actually specifies and re-pointed at
//! [`crate::oid4vp::dcql::DcqlQuery`] instead of DIF Presentation Exchange.

use serde::{Deserialize, Serialize};

use super::dcql::DcqlQuery;

/// How the wallet delivers its response back to this verifier (`spec.md`
/// §3, §4.6 step 3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Plain form POST to `response_uri`.
    DirectPost,
    /// Form POST carrying a single JWE-wrapped `response` field.
    #[serde(rename = "direct_post.jwt")]
    DirectPostJwt,
    /// Digital Credentials API, browser-mediated, same-device only.
    #[serde(rename = "dc_api.jwt")]
    DcApiJwt,
}

impl ResponseMode {
    /// Whether this mode requires an ephemeral encryption key to be
    /// generated and embedded in the request object's `jwks`.
    #[must_use]
    pub const fn is_encrypted(self) -> bool {
        matches!(self, Self::DirectPostJwt | Self::DcApiJwt)
    }
}

/// Verifier metadata embedded in the request object, carrying the
/// ephemeral public encryption key for encrypted response modes.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientMetadata {
    /// Preferred VP formats, in order, e.g. `["dc+sd-jwt"]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vp_formats: Option<Vec<String>>,
    /// A JWK Set containing the ephemeral public encryption key, present
    /// only when [`ResponseMode::is_encrypted`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<serde_json::Value>,
}

/// The signed `OpenID4VP` authorization request object (`spec.md` §3).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RequestObject {
    /// This verifier's issuer identifier (its `external_url`).
    pub iss: String,
    /// Always `"https://self-issued.me/v2"` (`spec.md` §3).
    pub aud: String,
    /// Issued-at, epoch seconds.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: chrono::DateTime<chrono::Utc>,
    /// Always `"vp_token"`.
    pub response_type: &'static str,
    /// This verifier's client id (its `external_url`, a self-issued `iss`
    /// client per the `OpenID4VP`/SIOPv2 convention).
    pub client_id: String,
    /// Bound into the wallet's key-binding JWT `nonce`.
    pub nonce: String,
    /// How the wallet returns its response.
    pub response_mode: ResponseMode,
    /// Where the wallet POSTs its response (`direct_post`/`direct_post.jwt`).
    pub response_uri: String,
    /// Echoes the session id; the wallet returns this unchanged.
    pub state: String,
    /// The credential-selection query.
    pub dcql_query: DcqlQuery,
    /// Verifier metadata, present when it carries an ephemeral encryption
    /// key or a `vp_formats` preference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_metadata: Option<ClientMetadata>,
}

/// `spec.md` §3's fixed `aud` value for `OpenID4VP` request objects.
pub const SELF_ISSUED_AUD: &str = "https://self-issued.me/v2";

/// The wallet's `direct_post` (unencrypted) form body.
#[derive(Clone, Debug, Deserialize)]
pub struct DirectPostForm {
    /// An SD-JWT VC, or a JSON object mapping DCQL credential id to
    /// SD-JWT VC, depending on how many credentials were requested.
    #[serde(default)]
    pub vp_token: Option<serde_json::Value>,
    /// Echoes [`RequestObject::state`].
    #[serde(default)]
    pub state: Option<String>,
    /// Present when the wallet used DIF Presentation Exchange-shaped
    /// descriptors; this crate only consults `state`/`vp_token`, but the
    /// field is accepted for forward compatibility.
    #[serde(default)]
    pub presentation_submission: Option<serde_json::Value>,
    /// The `direct_post.jwt` carrier: a single JWE-wrapped `response`
    /// containing `{vp_token, state}` as its plaintext (`spec.md` §4.6
    /// step 1).
    #[serde(default)]
    pub response: Option<String>,
}

/// The plaintext payload of a decrypted `direct_post.jwt` response.
#[derive(Clone, Debug, Deserialize)]
pub struct DirectPostPayload {
    /// See [`DirectPostForm::vp_token`].
    pub vp_token: serde_json::Value,
    /// See [`DirectPostForm::state`].
    pub state: String,
}

/// The verifier's reply to a successful `HandleDirectPost` call.
#[derive(Clone, Debug, Serialize)]
pub struct DirectPostResponse {
    /// The RP's `redirect_uri`, augmented with `code` and `state`
    /// (`spec.md` §4.6 step 6).
    pub redirect_uri: String,
}
