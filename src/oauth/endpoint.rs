//! # OIDC Protocol Engine (C5)
//!
//! `spec.md` §4.5: `/authorize`, `/token`, `/userinfo`. Split one handler
//! per file, grounded on the teacher's `src/oid4vci/server/` layout.

pub mod authorize;
pub mod token;
pub mod userinfo;

pub use authorize::{AuthorizeRequest, AuthorizeResponse, authorize};
pub use token::{ClientAuth, TokenRequest, TokenResponse, token};
pub use userinfo::{parse_bearer, userinfo};
