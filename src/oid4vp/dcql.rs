//! # DCQL — Digital Credentials Query Language
//!
//! `spec.md` §3 describes the request object's `dcql_query` only as "a
//! credential-selection query"; this module implements the subset of the
//! real DCQL grammar (OpenID4VP's query language for selecting among a
//! wallet's credentials) this verifier needs: one or more named credential
//! queries, each naming an accepted `vct` and the claims that must be
//! disclosed. Grounded on the teacher's `oid4vp::query::dif_exch`
//! `PresentationDefinition`/`InputDescriptor` split — same shape (a query
//! keyed by id, evaluated against what the wallet actually presented) over
//! DCQL's vocabulary instead of DIF Presentation Exchange's.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sd_jwt::VerifiedPresentation;

/// One claim this verifier requires to be disclosed, addressed by its
/// top-level SD-JWT claim name.
///
/// DCQL proper allows nested `path` arrays; SD-JWT VC's disclosure model in
/// this crate only materialises top-level claims (`spec.md` §4.6 step 4),
/// so `path` here is always a single-element array.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimsQuery {
    /// Addresses the claim by name, e.g. `["given_name"]`.
    pub path: Vec<String>,
}

impl ClaimsQuery {
    /// Build a claims query for a single top-level claim name.
    #[must_use]
    pub fn named(claim: impl Into<String>) -> Self {
        Self { path: vec![claim.into()] }
    }

    fn claim_name(&self) -> Option<&str> {
        self.path.first().map(String::as_str)
    }
}

/// Constrains which credential types satisfy a [`CredentialQuery`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialMeta {
    /// Acceptable `vct` values; the wallet's presented credential must
    /// match at least one.
    pub vct_values: Vec<String>,
}

/// One credential this verifier wants the wallet to present, identified by
/// `id` so the response (`spec.md` §4.6 step 4: "possibly a mapping keyed
/// by DCQL credential id") can be matched back to the query that asked for
/// it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialQuery {
    /// Unique within the containing [`DcqlQuery`].
    pub id: String,
    /// Credential format identifier, always `"dc+sd-jwt"` in this crate.
    pub format: String,
    /// `vct` constraint.
    pub meta: CredentialMeta,
    /// Claims that must be disclosed.
    pub claims: Vec<ClaimsQuery>,
}

/// The full credential-selection query embedded in a request object.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DcqlQuery {
    /// One entry per credential the wallet is asked to present.
    pub credentials: Vec<CredentialQuery>,
}

impl DcqlQuery {
    /// Build a query requesting a single SD-JWT VC of type `vct` with the
    /// given claims disclosed, under credential id `"cred1"`.
    #[must_use]
    pub fn single_sd_jwt(vct: impl Into<String>, claims: &[&str]) -> Self {
        Self {
            credentials: vec![CredentialQuery {
                id: "cred1".to_string(),
                format: "dc+sd-jwt".to_string(),
                meta: CredentialMeta { vct_values: vec![vct.into()] },
                claims: claims.iter().map(|c| ClaimsQuery::named(*c)).collect(),
            }],
        }
    }
}

/// Check a set of presentations — keyed by the [`CredentialQuery::id`] they
/// satisfy — against `query`.
///
/// # Errors
///
/// Returns a human-readable message naming the first unmet requirement: a
/// missing credential id, a `vct` outside `meta.vct_values`, or a claim
/// named in the query that was not disclosed.
pub fn evaluate(
    query: &DcqlQuery, presented: &BTreeMap<String, VerifiedPresentation>,
) -> Result<(), String> {
    for credential in &query.credentials {
        let Some(presentation) = presented.get(&credential.id) else {
            return Err(format!("no presentation supplied for credential query {:?}", credential.id));
        };
        if !credential.meta.vct_values.contains(&presentation.vct) {
            return Err(format!(
                "credential {:?} has vct {:?}, expected one of {:?}",
                credential.id, presentation.vct, credential.meta.vct_values
            ));
        }
        for claim in &credential.claims {
            let Some(name) = claim.claim_name() else {
                return Err(format!("credential {:?} has a claims query with an empty path", credential.id));
            };
            if !presentation.claims.contains_key(name) {
                return Err(format!(
                    "credential {:?} did not disclose required claim {name:?}",
                    credential.id
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presentation(vct: &str, claims: &[(&str, &str)]) -> VerifiedPresentation {
        let mut map = serde_json::Map::new();
        for (k, v) in claims {
            map.insert((*k).to_string(), serde_json::json!(v));
        }
        VerifiedPresentation { vct: vct.to_string(), iss: "https://issuer.example".to_string(), claims: map }
    }

    #[test]
    fn accepts_matching_presentation() {
        let query = DcqlQuery::single_sd_jwt("urn:example:pid:1", &["given_name"]);
        let mut presented = BTreeMap::new();
        presented.insert("cred1".to_string(), presentation("urn:example:pid:1", &[("given_name", "Alice")]));

        assert!(evaluate(&query, &presented).is_ok());
    }

    #[test]
    fn rejects_missing_credential() {
        let query = DcqlQuery::single_sd_jwt("urn:example:pid:1", &["given_name"]);
        assert!(evaluate(&query, &BTreeMap::new()).is_err());
    }

    #[test]
    fn rejects_vct_mismatch() {
        let query = DcqlQuery::single_sd_jwt("urn:example:pid:1", &[]);
        let mut presented = BTreeMap::new();
        presented.insert("cred1".to_string(), presentation("urn:example:other:1", &[]));

        assert!(evaluate(&query, &presented).is_err());
    }

    #[test]
    fn rejects_missing_claim() {
        let query = DcqlQuery::single_sd_jwt("urn:example:pid:1", &["given_name"]);
        let mut presented = BTreeMap::new();
        presented.insert("cred1".to_string(), presentation("urn:example:pid:1", &[]));

        assert!(evaluate(&query, &presented).is_err());
    }
}
