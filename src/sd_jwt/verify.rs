//! Verifies a compact SD-JWT VC presentation end to end (`spec.md` §4.6
//! step 4): issuer signature, disclosure digests, and key binding.

use anyhow::{Result, bail};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::claims::{Disclosure, KbJwtClaims, KeyBinding, SdJwtClaims};
use super::split::Presentation;
use crate::crypto::jws::{VerifyingKey, verify_compact};

/// The result of a fully verified presentation: the issuer's claims with
/// every disclosure folded in.
#[derive(Clone, Debug)]
pub struct VerifiedPresentation {
    /// The credential type presented.
    pub vct: String,
    /// The credential issuer.
    pub iss: String,
    /// Disclosed claims, keyed by name, as found in the disclosures —
    /// `_sd`/`_sd_alg`/`cnf` are not themselves claims and are excluded.
    pub claims: serde_json::Map<String, Value>,
}

/// Verify a compact SD-JWT VC presentation.
///
/// `issuer_key` must already have been resolved for the claimed issuer
/// (`spec.md` §4.6's `TrustService`/[`crate::oauth::provider::TrustAnchor`]
/// interface — this function does no issuer lookup itself). `expected_nonce`
/// is the session's `request_object_nonce`; `expected_aud` is the
/// verifier's `response_uri` (or origin, for Digital Credentials API
/// requests).
///
/// # Errors
///
/// Returns an error if the issuer signature fails, a disclosure's digest is
/// not present in `_sd`, the presentation carries no key-binding JWT, or the
/// key-binding JWT fails signature, `nonce`, or `aud` checks.
pub fn verify_presentation(
    raw: &str, issuer_key: &VerifyingKey, expected_nonce: &str, expected_aud: &str,
) -> Result<VerifiedPresentation> {
    let presentation = Presentation::split(raw)?;

    let sd_jwt_claims: SdJwtClaims = verify_compact(presentation.issuer_jwt, issuer_key)?;

    if sd_jwt_claims.sd_alg.as_deref().is_some_and(|alg| alg != "sha-256") {
        bail!("unsupported _sd_alg {:?}, only sha-256 is supported", sd_jwt_claims.sd_alg);
    }
    if let Some(exp) = sd_jwt_claims.exp {
        if chrono::Utc::now() > exp {
            bail!("SD-JWT VC has expired");
        }
    }

    let mut claims = serde_json::Map::new();
    for encoded in &presentation.disclosures {
        let disclosure = Disclosure::decode(encoded)?;
        if !sd_jwt_claims.sd.contains(&disclosure.digest()) {
            bail!("disclosure {:?} digest not present in _sd", disclosure.name);
        }
        claims.insert(disclosure.name, disclosure.value);
    }

    let Some(kb_jwt) = presentation.kb_jwt else {
        bail!("presentation has no key-binding JWT");
    };
    let Some(KeyBinding::Jwk(holder_jwk)) = &sd_jwt_claims.cnf else {
        bail!("SD-JWT VC carries no cnf.jwk to verify key binding against");
    };
    let holder_key = VerifyingKey::from_jwk(holder_jwk)?;

    let kb_claims: KbJwtClaims = verify_compact(kb_jwt, &holder_key)?;
    if kb_claims.nonce != expected_nonce {
        bail!("key-binding JWT nonce mismatch");
    }
    if kb_claims.aud != expected_aud {
        bail!("key-binding JWT aud mismatch");
    }

    let signed_part_end = raw.rfind('~').map_or(raw.len(), |idx| idx + 1);
    let expected_hash =
        base64ct::Base64UrlUnpadded::encode_string(Sha256::digest(&raw[..signed_part_end]).as_slice());
    if kb_claims.sd_hash != expected_hash {
        bail!("key-binding JWT sd_hash does not match presentation");
    }

    Ok(VerifiedPresentation { vct: sd_jwt_claims.vct, iss: sd_jwt_claims.iss, claims })
}
