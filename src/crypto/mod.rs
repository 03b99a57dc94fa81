//! # Cryptographic Primitives
//!
//! Pure, side-effect-free cryptography used by the protocol engines: JWS
//! signing/verification, JWE decryption, PKCE verification, and secret
//! hashing. None of these functions panic; failures are always a typed or
//! `anyhow` error.
//!
//! Grounded on `crates/datasec/src/jose.rs`'s module split
//! (`jwa`/`jwe`/`jwk`/`jws`) in the teacher repo, reimplemented directly over
//! RustCrypto crates rather than the teacher's own `credibil-infosec`
//! dependency (see `DESIGN.md`).

pub mod hash;
pub mod jwe;
pub mod jws;
pub mod pkce;
