//! # Verifier Bridge
//!
//! A library implementing the stateful bridge between `OpenID` Connect (OIDC)
//! and `OpenID` for Verifiable Presentations ([`OpenID4VP`]).
//!
//! A relying party (RP) speaks plain OAuth 2.0 / OIDC to this crate's
//! [`oauth`] endpoints. Behind the scenes, the crate drives an
//! [`OpenID4VP`] exchange with the end user's wallet, and translates the
//! result into the OIDC tokens the RP already knows how to consume.
//!
//! # Design
//!
//! The crate is a library, not a server: it has no opinion on routing, TLS,
//! or cookie-based web sessions. Callers implement [`oauth::provider::Store`]
//! (persistence for [`oauth::Session`] and [`oauth::Client`]) and
//! [`oauth::provider::TrustAnchor`] (issuer key lookup for presented
//! credentials), and wire the functions in [`oauth::endpoint`] and
//! [`oid4vp`] onto whatever HTTP framework they use. See `demos/verifier`
//! for a complete `axum` wiring.
//!
//! [`OpenID4VP`]: https://openid.net/specs/openid-4-verifiable-presentations-1_0.html

pub mod cache;
pub mod config;
pub mod core;
pub mod crypto;
pub mod oauth;
pub mod oid4vp;
pub mod sd_jwt;

pub use config::Config;
