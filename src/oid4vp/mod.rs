//! # `OpenID4VP` Engine (C6)
//!
//! Builds and serves signed request objects, and turns the wallet's
//! `direct_post`/`direct_post.jwt` response into a verified presentation
//! and an OIDC authorization code (`spec.md` §4.6). Depends on
//! [`crate::oauth`] only through [`crate::oauth::provider::Store`]/
//! [`crate::oauth::types::Session`] — the OIDC surface calls into this
//! module, not the reverse.

pub mod dcql;
pub mod direct_post;
pub mod request_object;
pub mod types;

pub use dcql::DcqlQuery;
pub use direct_post::handle_direct_post;
pub use request_object::{Caches, build_request_object, default_query, get_or_build_request_object, get_request_object};
pub use types::{DirectPostForm, DirectPostResponse, RequestObject, ResponseMode};
