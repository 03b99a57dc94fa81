//! # JSON Web Encryption
//!
//! Decrypts the `direct_post.jwt` response mode's encrypted VP token
//! (`spec.md` §4.6, C6). The wallet encrypts to this verifier's ephemeral
//! public key using `ECDH-ES` key agreement (RFC 7518 §4.6) with
//! `A256GCM` content encryption; only decryption is implemented; this crate
//! never encrypts a JWE itself.
//!
//! Grounded on the teacher's `crates/datasec/src/jose/jwe.rs` module split,
//! reimplemented over `p256`'s ECDH support and `aes-gcm` rather than the
//! teacher's `credibil-infosec` dependency (see `DESIGN.md`).

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use anyhow::{Context, Result, bail};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// The decoded JWE protected header fields this crate understands.
#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
    enc: String,
    epk: EphemeralKey,
    #[serde(default)]
    apu: Option<String>,
    #[serde(default)]
    apv: Option<String>,
    #[serde(default)]
    kid: Option<String>,
}

/// Read the `kid` header of a compact JWE without decrypting it, so the
/// caller can look up the matching [`RecipientKey`] in its ephemeral-key
/// cache before calling [`decrypt_compact`] (`spec.md` §4.6
/// `HandleDirectPost` step 1: a missing `kid` or an unknown one is
/// `ephemeral_key_not_found`, not a decryption failure).
///
/// # Errors
///
/// Returns an error if `jwe` is not a well-formed compact JWE.
pub fn peek_kid(jwe: &str) -> Result<Option<String>> {
    let header_b64 = jwe.split('.').next().context("empty JWE")?;
    let header_bytes =
        Base64UrlUnpadded::decode_vec(header_b64).context("invalid JWE header encoding")?;
    let header: Header = serde_json::from_slice(&header_bytes)?;
    Ok(header.kid)
}

#[derive(Debug, Deserialize)]
struct EphemeralKey {
    crv: String,
    x: String,
    y: String,
}

/// An ephemeral-static ECDH-ES recipient key pair, generated fresh for each
/// request object this verifier issues with `response_mode=direct_post.jwt`.
///
/// `secret` is a [`p256::SecretKey`] rather than [`p256::ecdh::EphemeralSecret`]
/// so this type stays `Clone`, as required to live in [`crate::cache::TtlCache`]
/// keyed by `kid` (`spec.md` §4.3: the ephemeral-key cache).
#[derive(Clone)]
pub struct RecipientKey {
    secret: p256::SecretKey,
    /// The public half, to embed in the request object's `client_metadata`.
    pub public: p256::PublicKey,
}

impl RecipientKey {
    /// Generate a fresh P-256 key pair.
    #[must_use]
    pub fn generate() -> Self {
        let secret = p256::SecretKey::random(&mut rand::rngs::OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// The public key as a JWK `epk` object.
    #[must_use]
    pub fn public_jwk(&self) -> serde_json::Value {
        let point = self.public.to_encoded_point(false);
        serde_json::json!({
            "kty": "EC",
            "crv": "P-256",
            "x": Base64UrlUnpadded::encode_string(point.x().unwrap()),
            "y": Base64UrlUnpadded::encode_string(point.y().unwrap()),
        })
    }
}

/// Decrypt a compact JWE (`alg=ECDH-ES`, `enc=A256GCM`) produced for
/// `recipient`, returning the plaintext payload.
///
/// # Errors
///
/// Returns an error if the JWE is malformed, uses an unsupported algorithm,
/// or fails authentication.
pub fn decrypt_compact(jwe: &str, recipient: &RecipientKey) -> Result<Vec<u8>> {
    let mut parts = jwe.split('.');
    let (Some(header_b64), Some(ekey_b64), Some(iv_b64), Some(ct_b64), Some(tag_b64), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        bail!("malformed compact JWE: expected exactly five segments");
    };

    let header_bytes =
        Base64UrlUnpadded::decode_vec(header_b64).context("invalid JWE header encoding")?;
    let header: Header = serde_json::from_slice(&header_bytes)?;

    if header.alg != "ECDH-ES" {
        bail!("unsupported JWE alg {:?}, expected ECDH-ES", header.alg);
    }
    if header.enc != "A256GCM" {
        bail!("unsupported JWE enc {:?}, expected A256GCM", header.enc);
    }
    if header.epk.crv != "P-256" {
        bail!("unsupported epk crv {:?}, expected P-256", header.epk.crv);
    }
    // ECDH-ES direct key agreement never carries an encrypted key segment.
    if !ekey_b64.is_empty() {
        bail!("ECDH-ES direct agreement must not carry an encrypted key segment");
    }

    let x = Base64UrlUnpadded::decode_vec(&header.epk.x).context("invalid epk.x")?;
    let y = Base64UrlUnpadded::decode_vec(&header.epk.y).context("invalid epk.y")?;
    let mut sec1 = Vec::with_capacity(1 + x.len() + y.len());
    sec1.push(0x04);
    sec1.extend_from_slice(&x);
    sec1.extend_from_slice(&y);
    let sender_public = p256::PublicKey::from_sec1_bytes(&sec1).context("invalid epk point")?;

    let shared = p256::ecdh::diffie_hellman(
        recipient.secret.to_nonzero_scalar(),
        sender_public.as_affine(),
    );
    let apu = header.apu.as_deref().unwrap_or("");
    let apv = header.apv.as_deref().unwrap_or("");
    let key = concat_kdf(shared.raw_secret_bytes(), "A256GCM", apu, apv, 256)?;

    let nonce_bytes = Base64UrlUnpadded::decode_vec(iv_b64).context("invalid IV encoding")?;
    let ciphertext = Base64UrlUnpadded::decode_vec(ct_b64).context("invalid ciphertext encoding")?;
    let tag = Base64UrlUnpadded::decode_vec(tag_b64).context("invalid tag encoding")?;
    if nonce_bytes.len() != 12 {
        bail!("A256GCM IV must be 96 bits, got {} bytes", nonce_bytes.len());
    }

    let mut combined = ciphertext;
    combined.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new_from_slice(&key).context("invalid A256GCM key length")?;
    let nonce = Nonce::from_slice(&nonce_bytes);
    cipher
        .decrypt(nonce, aes_gcm::aead::Payload { msg: &combined, aad: header_b64.as_bytes() })
        .map_err(|_| anyhow::anyhow!("JWE authentication failed"))
}

/// NIST SP 800-56A Concat KDF, as profiled by RFC 7518 §4.6 for ECDH-ES.
///
/// `key_bit_len` is the length of the derived content encryption key, in
/// bits (256 for `A256GCM`).
fn concat_kdf(
    shared_secret: &[u8], alg: &str, apu: &str, apv: &str, key_bit_len: u32,
) -> Result<Vec<u8>> {
    let apu_bytes = Base64UrlUnpadded::decode_vec(apu).unwrap_or_default();
    let apv_bytes = Base64UrlUnpadded::decode_vec(apv).unwrap_or_default();

    let mut other_info = Vec::new();
    other_info.extend_from_slice(&(alg.len() as u32).to_be_bytes());
    other_info.extend_from_slice(alg.as_bytes());
    other_info.extend_from_slice(&(apu_bytes.len() as u32).to_be_bytes());
    other_info.extend_from_slice(&apu_bytes);
    other_info.extend_from_slice(&(apv_bytes.len() as u32).to_be_bytes());
    other_info.extend_from_slice(&apv_bytes);
    other_info.extend_from_slice(&key_bit_len.to_be_bytes());

    let key_byte_len = (key_bit_len as usize).div_ceil(8);
    let mut output = Vec::with_capacity(key_byte_len);
    let mut counter: u32 = 1;
    while output.len() < key_byte_len {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_be_bytes());
        hasher.update(shared_secret);
        hasher.update(&other_info);
        output.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    output.truncate(key_byte_len);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use aes_gcm::aead::rand_core::OsRng;
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct EncryptFixtureHeader<'a> {
        alg: &'a str,
        enc: &'a str,
        epk: serde_json::Value,
    }

    fn encrypt_for(
        recipient: &RecipientKey, plaintext: &[u8],
    ) -> String {
        let sender_secret = p256::ecdh::EphemeralSecret::random(&mut OsRng);
        let sender_public = p256::PublicKey::from(&sender_secret);
        let shared = sender_secret.diffie_hellman(&recipient.public);
        let key = concat_kdf(shared.raw_secret_bytes(), "A256GCM", "", "", 256).unwrap();

        let point = sender_public.to_encoded_point(false);
        let header = EncryptFixtureHeader {
            alg: "ECDH-ES",
            enc: "A256GCM",
            epk: serde_json::json!({
                "kty": "EC",
                "crv": "P-256",
                "x": Base64UrlUnpadded::encode_string(point.x().unwrap()),
                "y": Base64UrlUnpadded::encode_string(point.y().unwrap()),
            }),
        };
        let header_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&header).unwrap());

        let cipher = Aes256Gcm::new_from_slice(&key).unwrap();
        let nonce_bytes: [u8; 12] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let sealed = cipher
            .encrypt(nonce, aes_gcm::aead::Payload { msg: plaintext, aad: header_b64.as_bytes() })
            .unwrap();
        let (ciphertext, tag) = sealed.split_at(sealed.len() - 16);

        format!(
            "{header_b64}..{}.{}.{}",
            Base64UrlUnpadded::encode_string(&nonce_bytes),
            Base64UrlUnpadded::encode_string(ciphertext),
            Base64UrlUnpadded::encode_string(tag),
        )
    }

    #[test]
    fn round_trips_through_ecdh_es_a256gcm() {
        let recipient = RecipientKey::generate();
        let jwe = encrypt_for(&recipient, b"vp_token payload");
        let plaintext = decrypt_compact(&jwe, &recipient).unwrap();
        assert_eq!(plaintext, b"vp_token payload");
    }

    #[test]
    fn wrong_recipient_fails() {
        let recipient = RecipientKey::generate();
        let other = RecipientKey::generate();
        let jwe = encrypt_for(&recipient, b"secret");
        assert!(decrypt_compact(&jwe, &other).is_err());
    }

    #[test]
    fn peeks_kid_without_decrypting() {
        let recipient = RecipientKey::generate();
        let jwe = encrypt_for(&recipient, b"vp_token payload");
        assert_eq!(peek_kid(&jwe).unwrap(), None);
    }

    #[test]
    fn rejects_unsupported_enc() {
        let recipient = RecipientKey::generate();
        let point = recipient.public.to_encoded_point(false);
        let header = serde_json::json!({
            "alg": "ECDH-ES",
            "enc": "A128CBC-HS256",
            "epk": {
                "kty": "EC",
                "crv": "P-256",
                "x": Base64UrlUnpadded::encode_string(point.x().unwrap()),
                "y": Base64UrlUnpadded::encode_string(point.y().unwrap()),
            },
        });
        let header_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&header).unwrap());
        let jwe = format!("{header_b64}...a.b");
        assert!(decrypt_compact(&jwe, &recipient).is_err());
    }
}
