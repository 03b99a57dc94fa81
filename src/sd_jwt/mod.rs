//! # SD-JWT Verifiable Credentials
//!
//! Parses and verifies SD-JWT VC presentations (`spec.md` §4.6 step 4),
//! grounded on the teacher's `src/format/sd_jwt.rs` claim shapes
//! reimplemented for the verifier's direction: this crate only ever reads
//! a presentation a wallet produced, it never issues one.
//!
//! [draft-ietf-oauth-selective-disclosure-jwt]: https://www.ietf.org/archive/id/draft-ietf-oauth-selective-disclosure-jwt-17.html

pub mod claims;
pub mod split;
pub mod verify;

pub use claims::{Disclosure, KbJwtClaims, KeyBinding, SdJwtClaims};
pub use split::Presentation;
pub use verify::{VerifiedPresentation, verify_presentation};
