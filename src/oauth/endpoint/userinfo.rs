//! `GET/POST /userinfo` — `spec.md` §4.5 "UserInfo".
//!
//! `spec.md` §4.5's prose says a missing/expired access token fails
//! `invalid_grant`; the endpoint table in `spec.md` §6 fixes `/userinfo`'s
//! failure HTTP status at 401, which is `invalid_token`'s status, not
//! `invalid_grant`'s (400). This crate follows the endpoint table — see
//! `DESIGN.md`.

use chrono::Utc;
use serde_json::Value;

use crate::oauth::error::Error;
use crate::oauth::provider::Store;
use crate::oauth::types::AccessToken;
use crate::invalid_request;

pub(crate) const SCOPE_CLAIMS: &[(&str, &[&str])] = &[
    ("openid", &["sub"]),
    ("profile", &["name", "family_name", "given_name"]),
    ("email", &["email", "email_verified"]),
];

/// `UserInfo` — `spec.md` §4.5.
///
/// # Errors
///
/// Returns [`Error::InvalidToken`] if `access_token` is unknown or expired.
#[tracing::instrument(skip(store), err)]
pub async fn userinfo<S: Store>(
    store: &S, access_token: &str,
) -> Result<serde_json::Map<String, Value>, Error> {
    let token: AccessToken = access_token.to_string().into();
    let Some(session) = store.get_by_access_token(&token).await? else {
        return Err(Error::InvalidToken("access token is unknown or expired".to_string()));
    };

    let now = Utc::now();
    if session.tokens.access_token_expires_at.is_some_and(|exp| now <= exp) {
        Ok(filter_claims(&session.oidc_request.scope, &session.verified_claims))
    } else {
        Err(Error::InvalidToken("access token has expired".to_string()))
    }
}

fn filter_claims(
    scope: &str, claims: &std::collections::BTreeMap<String, Value>,
) -> serde_json::Map<String, Value> {
    let requested: std::collections::HashSet<&str> = scope.split_whitespace().collect();
    let mut out = serde_json::Map::new();
    for (scope_name, claim_names) in SCOPE_CLAIMS {
        if requested.contains(scope_name) {
            for claim_name in *claim_names {
                if let Some(value) = claims.get(*claim_name) {
                    out.insert((*claim_name).to_string(), value.clone());
                }
            }
        }
    }
    out
}

/// Parse an `Authorization: Bearer <token>` header value.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] if `header` is not a well-formed
/// bearer authorization value.
pub fn parse_bearer(header: &str) -> Result<&str, Error> {
    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| invalid_request!("expected a Bearer authorization header"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_to_openid_scope_only() {
        let mut claims = std::collections::BTreeMap::new();
        claims.insert("sub".to_string(), serde_json::json!("user-1"));
        claims.insert("email".to_string(), serde_json::json!("a@example.com"));

        let filtered = filter_claims("openid", &claims);
        assert_eq!(filtered.get("sub"), Some(&serde_json::json!("user-1")));
        assert!(!filtered.contains_key("email"));
    }

    #[test]
    fn includes_email_scope_claims() {
        let mut claims = std::collections::BTreeMap::new();
        claims.insert("email".to_string(), serde_json::json!("a@example.com"));

        let filtered = filter_claims("openid email", &claims);
        assert_eq!(filtered.get("email"), Some(&serde_json::json!("a@example.com")));
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(parse_bearer("Bearer abc123").unwrap(), "abc123");
        assert!(parse_bearer("Basic abc123").is_err());
    }
}
