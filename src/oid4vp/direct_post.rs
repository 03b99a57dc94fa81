//! `HandleDirectPost` — `spec.md` §4.6, C6.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::config::Config;
use crate::core::generate;
use crate::oauth::error::Error;
use crate::oauth::provider::{Store, TrustAnchor};
use crate::oauth::session;
use crate::oauth::types::{AuthorizationCode, SessionId, Status};
use crate::sd_jwt::verify_presentation;
use crate::{invalid_grant, invalid_request, server_error};

use super::dcql;
use super::request_object::Caches;
use super::types::{DirectPostForm, DirectPostPayload, DirectPostResponse};

/// `HandleDirectPost` — `spec.md` §4.6.
///
/// `form` is the wallet's posted body, already parsed from
/// `application/x-www-form-urlencoded` by the HTTP layer. `session_id`
/// comes from the `/verification/direct_post` path, not the form body —
/// the inner `state` is checked against it (step 3), not trusted as the
/// lookup key.
///
/// A presentation that fails verification (untrusted issuer, bad signature,
/// missing DCQL claim) does not surface as an `Err`: the session still moves
/// to `error`, but the caller gets back `Ok` with a redirect to the RP's
/// `redirect_uri` carrying `error=access_denied` (`spec.md` §4.6 Failure
/// semantics), the same shape as a browser-facing OAuth error redirect.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] for a malformed body, an unresolvable
/// JWE `kid`, or a `state` mismatch; [`Error::InvalidGrant`]/
/// [`Error::SessionExpired`] if the session cannot accept a presentation.
#[tracing::instrument(skip(store, trust, config, caches, form), err)]
pub async fn handle_direct_post<S: Store, T: TrustAnchor>(
    store: &S, trust: &T, config: &Config, caches: &Caches, session_id: &str, query: &dcql::DcqlQuery,
    form: DirectPostForm,
) -> Result<DirectPostResponse, Error> {
    let id = SessionId::from(session_id.to_string());
    let Some(mut found) = store.get_session(&id).await? else {
        return Err(Error::SessionNotFound(format!("no session {session_id}")));
    };

    let now = Utc::now();
    session::require_status(&found, now, &[Status::Pending, Status::AwaitingPresentation])?;

    let payload = decode_body(caches, form)?;
    if payload.state != session_id {
        session::fail(&mut found, now);
        store.update_session(found).await?;
        return Err(invalid_request!("direct_post state does not match the session"));
    }

    match process_presentation(store, trust, config, query, &found, &payload).await {
        Ok((claims, code, presentation_submission)) => {
            found.openid4vp.vp_token = Some(payload.vp_token.to_string());
            found.openid4vp.presentation_submission = presentation_submission;
            found.verified_claims = claims;
            session::issue_code(&mut found, now)?;
            found.tokens.authorization_code = Some(code.clone());
            found.tokens.code_expires_at =
                Some(now + chrono::Duration::seconds(config.lifetimes.code_duration_sec));
            store.update_session(found.clone()).await?;

            Ok(DirectPostResponse {
                redirect_uri: format!(
                    "{}?code={code}&state={}",
                    found.oidc_request.redirect_uri, found.oidc_request.state
                ),
            })
        }
        Err(err) => {
            session::fail(&mut found, now);
            store.update_session(found.clone()).await?;
            tracing::warn!(session_id, error = %err, "presentation rejected");
            Ok(DirectPostResponse {
                redirect_uri: format!(
                    "{}?error=access_denied&state={}",
                    found.oidc_request.redirect_uri, found.oidc_request.state
                ),
            })
        }
    }
}

/// Step 1: unwrap a `direct_post.jwt` JWE using the ephemeral key cache, or
/// pass a plain `direct_post` body through unchanged.
fn decode_body(caches: &Caches, form: DirectPostForm) -> Result<DirectPostPayload, Error> {
    if let Some(jwe) = &form.response {
        let kid = crate::crypto::jwe::peek_kid(jwe)
            .map_err(|e| invalid_request!("malformed direct_post.jwt response: {e}"))?
            .ok_or_else(|| invalid_request!("direct_post.jwt response carries no kid"))?;
        let Some(recipient) = caches.ephemeral_keys.get(&kid) else {
            return Err(invalid_request!("no ephemeral key cached for kid {kid}"));
        };
        let plaintext = crate::crypto::jwe::decrypt_compact(jwe, &recipient)
            .map_err(|e| invalid_request!("failed to decrypt direct_post.jwt response: {e}"))?;
        serde_json::from_slice(&plaintext).map_err(|e| invalid_request!("malformed decrypted payload: {e}"))
    } else {
        let Some(vp_token) = form.vp_token else {
            return Err(invalid_request!("direct_post body carries neither vp_token nor response"));
        };
        let Some(state) = form.state else {
            return Err(invalid_request!("direct_post body is missing state"));
        };
        Ok(DirectPostPayload { vp_token, state })
    }
}

/// Steps 3-5: verify every presented SD-JWT VC against `query`, returning
/// the materialised claims and a freshly minted authorization code.
async fn process_presentation<S: Store, T: TrustAnchor>(
    _store: &S, trust: &T, config: &Config, query: &dcql::DcqlQuery,
    session: &crate::oauth::types::Session, payload: &DirectPostPayload,
) -> Result<(BTreeMap<String, serde_json::Value>, AuthorizationCode, Option<serde_json::Value>), Error> {
    let expected_nonce = session
        .openid4vp
        .request_object_nonce
        .as_deref()
        .ok_or_else(|| server_error!("session has no request_object_nonce recorded"))?;
    let expected_aud = config.direct_post_endpoint();

    let mut presented = BTreeMap::new();
    let raw_by_id = raw_presentations_by_credential_id(&payload.vp_token, query)?;
    for (credential_id, raw) in &raw_by_id {
        let issuer = peek_issuer(raw)?;
        let issuer_key = trust
            .verifying_key_for_issuer(&issuer)
            .await
            .map_err(|_| Error::PresentationInvalid(format!("issuer {issuer:?} is not trusted")))?;
        let verified = verify_presentation(raw, &issuer_key, expected_nonce, &expected_aud)
            .map_err(|e| Error::SignatureInvalid(e.to_string()))?;
        presented.insert(credential_id.clone(), verified);
    }

    dcql::evaluate(query, &presented).map_err(Error::PresentationInvalid)?;

    let mut claims = BTreeMap::new();
    for verified in presented.values() {
        for (name, value) in &verified.claims {
            claims.insert(name.clone(), value.clone());
        }
    }

    let code: AuthorizationCode = generate::authorization_code().into();
    // This crate only consumes DCQL, never DIF Presentation Exchange, so
    // there is no `presentation_submission` of our own to record.
    Ok((claims, code, None))
}

/// `vp_token` is either a single SD-JWT VC string (one credential
/// requested) or a JSON object mapping DCQL credential id to SD-JWT VC
/// string (`spec.md` §4.6 step 4).
fn raw_presentations_by_credential_id(
    vp_token: &serde_json::Value, query: &dcql::DcqlQuery,
) -> Result<BTreeMap<String, String>, Error> {
    match vp_token {
        serde_json::Value::String(raw) => {
            let Some(only) = query.credentials.first() else {
                return Err(invalid_request!("dcql_query names no credentials"));
            };
            Ok(BTreeMap::from([(only.id.clone(), raw.clone())]))
        }
        serde_json::Value::Object(map) => {
            let mut out = BTreeMap::new();
            for (id, value) in map {
                let raw = value
                    .as_str()
                    .ok_or_else(|| invalid_request!("vp_token entry for {id:?} is not a string"))?;
                out.insert(id.clone(), raw.to_string());
            }
            Ok(out)
        }
        _ => Err(invalid_request!("vp_token must be a string or an object of strings")),
    }
}

fn peek_issuer(raw: &str) -> Result<String, Error> {
    let issuer_jwt = raw.split('~').next().ok_or_else(|| invalid_request!("empty vp_token entry"))?;
    let mut parts = issuer_jwt.split('.');
    let (Some(_header), Some(payload_b64), Some(_sig)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid_request!("malformed SD-JWT VC: expected a three-segment JWT"));
    };
    let payload = base64ct::Base64UrlUnpadded::decode_vec(payload_b64)
        .map_err(|e| invalid_request!("invalid SD-JWT VC payload encoding: {e}"))?;
    let value: serde_json::Value = serde_json::from_slice(&payload)
        .map_err(|e| invalid_request!("malformed SD-JWT VC payload: {e}"))?;
    value
        .get("iss")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid_request!("SD-JWT VC payload has no iss"))
}
