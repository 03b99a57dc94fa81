//! A stand-in [`TrustAnchor`] for the demo. `spec.md` §4.6 scopes the real
//! `TrustService` (resolving an issuer's current signing key — a DID
//! document, a federation registry, a static allowlist) out of core; this
//! demo ships an empty, in-memory one so the binary runs standalone. Wire
//! in real issuer keys via [`StaticTrust::trusting`] or swap this module
//! out entirely in a production deployment.

use std::collections::BTreeMap;
use std::sync::Arc;

use vp_bridge::crypto::jws::VerifyingKey;
use vp_bridge::oauth::error::Error;
use vp_bridge::oauth::provider::TrustAnchor;

#[derive(Clone, Default)]
pub struct StaticTrust {
    keys: Arc<BTreeMap<String, VerifyingKey>>,
}

impl StaticTrust {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn trusting(issuer: impl Into<String>, key: VerifyingKey) -> Self {
        Self { keys: Arc::new(BTreeMap::from([(issuer.into(), key)])) }
    }
}

impl TrustAnchor for StaticTrust {
    async fn verifying_key_for_issuer(&self, issuer: &str) -> Result<VerifyingKey, Error> {
        self.keys
            .get(issuer)
            .cloned()
            .ok_or_else(|| Error::PresentationInvalid(format!("issuer {issuer} is not configured as trusted")))
    }
}
