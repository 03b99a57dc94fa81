//! # OAuth 2.0 / OIDC Surface
//!
//! Everything a relying party sees: the protocol engine (C5), the session
//! state machine (C7), the client registry (C4), and discovery (C8). The
//! `OpenID4VP` exchange that drives a session's middle states lives in
//! [`crate::oid4vp`] instead, and talks back to this module only through
//! [`Session`]/[`provider::Store`].

pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod provider;
pub mod registry;
pub mod session;
pub mod types;

pub use error::Error;
pub use provider::{Store, TrustAnchor};
pub use types::{Client, Session};
