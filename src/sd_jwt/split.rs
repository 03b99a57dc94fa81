//! Splits a compact SD-JWT VC presentation into its constituent parts.
//!
//! Presentation wire format: `<issuer-signed JWT>~<disclosure>~...~<KB-JWT>`
//! (`spec.md` §4.6 step 4). The key-binding JWT is only absent when the
//! issuer signed without `cnf`, in which case key binding verification is
//! skipped and only checked if the session's DCQL query demanded it.

use anyhow::{Result, bail};

/// The un-verified parts of a presentation, as parsed off the wire.
pub struct Presentation<'a> {
    /// The compact issuer-signed JWT (header.payload.signature).
    pub issuer_jwt: &'a str,
    /// Each disclosure, still base64url-encoded.
    pub disclosures: Vec<&'a str>,
    /// The compact key-binding JWT, if the presentation ends with one.
    pub kb_jwt: Option<&'a str>,
}

impl<'a> Presentation<'a> {
    /// Split `raw` on `~`.
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` has no segments, or the first segment is
    /// not itself a three-part compact JWT.
    pub fn split(raw: &'a str) -> Result<Self> {
        let mut segments: Vec<&str> = raw.split('~').collect();
        if segments.is_empty() {
            bail!("empty SD-JWT VC presentation");
        }
        let issuer_jwt = segments.remove(0);
        if issuer_jwt.split('.').count() != 3 {
            bail!("first presentation segment is not a compact JWT");
        }

        // A trailing empty segment (from a presentation ending in `~`) means
        // no key-binding JWT was appended.
        let kb_jwt = match segments.last() {
            Some(&"") | None => None,
            Some(last) => Some(*last),
        };
        if kb_jwt.is_some() {
            segments.pop();
        } else if segments.last() == Some(&"") {
            segments.pop();
        }

        Ok(Self { issuer_jwt, disclosures: segments, kb_jwt })
    }
}
