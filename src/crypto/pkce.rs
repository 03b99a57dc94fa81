//! # PKCE ([RFC 7636](https://www.rfc-editor.org/rfc/rfc7636))
//!
//! Proof Key for Code Exchange binds an authorization code to the client
//! instance that started the authorization flow.

use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};

/// The `code_challenge_method` a client registered or an authorize request
/// specified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// `base64url(sha256(code_verifier)) == code_challenge`.
    S256,
    /// `code_verifier == code_challenge`.
    Plain,
}

impl Method {
    /// Parse a `code_challenge_method` string.
    ///
    /// Returns `None` for any value other than `S256` or `plain` — unknown
    /// methods must fail verification per `spec.md` §4.2.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "S256" => Some(Self::S256),
            "plain" => Some(Self::Plain),
            _ => None,
        }
    }
}

/// Verify `code_verifier` against a previously recorded `code_challenge`
/// using `method`.
#[must_use]
pub fn verify(method: Method, code_verifier: &str, code_challenge: &str) -> bool {
    match method {
        Method::S256 => {
            let digest = Sha256::digest(code_verifier.as_bytes());
            Base64UrlUnpadded::encode_string(&digest) == code_challenge
        }
        Method::Plain => code_verifier == code_challenge,
    }
}
