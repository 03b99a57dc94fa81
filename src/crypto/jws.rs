//! # JSON Web Signatures
//!
//! Signs and verifies compact JWS, the format used for both the
//! `OpenID4VP` request object (`spec.md` §4.6) and the OIDC `id_token`
//! (`spec.md` §4.5). The signing algorithm is derived from the key type, not
//! configured independently, matching `spec.md` §4.2: RSA → RS256, EC P-256
//! → ES256, EC P-384 → ES384, EC P-521 → ES512, Ed25519 → EdDSA.
//!
//! Grounded on the `JwsBuilder` usage in the teacher's
//! `src/verifier/request_object.rs` and the module layout of
//! `crates/datasec/src/jose.rs`, rebuilt directly on RustCrypto crates.

use anyhow::{Context, Result, anyhow, bail};
use base64ct::{Base64UrlUnpadded, Encoding};
use ed25519_dalek::Signer as _;
use ed25519_dalek::Verifier as _;
use p256::ecdsa::signature::{Signer as _, Verifier as _};
use pkcs8::DecodePrivateKey;
use rsa::pkcs1v15;
use rsa::pkcs8::DecodePrivateKey as _;
use rsa::signature::{SignatureEncoding, Signer as _, Verifier as _};
use rsa::traits::PublicKeyParts;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

/// The JOSE `alg` header values this crate supports, one per key type
/// `spec.md` §4.2 names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, serde::Deserialize)]
pub enum Algorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256.
    #[serde(rename = "RS256")]
    Rs256,
    /// ECDSA using P-256 and SHA-256.
    #[serde(rename = "ES256")]
    Es256,
    /// ECDSA using P-384 and SHA-384.
    #[serde(rename = "ES384")]
    Es384,
    /// ECDSA using P-521 and SHA-512.
    #[serde(rename = "ES512")]
    Es512,
    /// Edwards-curve DSA using Ed25519.
    #[serde(rename = "EdDSA")]
    EdDsa,
}

impl Algorithm {
    /// The JOSE `alg` header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
            Self::EdDsa => "EdDSA",
        }
    }
}

/// A private signing key, chosen by the configured key type at startup.
pub enum SigningKey {
    /// RSASSA-PKCS1-v1_5, RS256.
    Rsa(Box<rsa::RsaPrivateKey>),
    /// EC P-256, ES256.
    EcP256(Box<p256::ecdsa::SigningKey>),
    /// EC P-384, ES384.
    EcP384(Box<p384::ecdsa::SigningKey>),
    /// EC P-521, ES512.
    EcP521(Box<p521::ecdsa::SigningKey>),
    /// Ed25519, EdDSA.
    Ed25519(Box<ed25519_dalek::SigningKey>),
}

impl SigningKey {
    /// Load a signing key from a PEM-encoded PKCS#8 private key.
    ///
    /// `x5c` is the optional certificate chain to embed in the JWS header.
    /// Per `spec.md` §9, a configured-but-empty chain (no leaf certificate)
    /// is a startup error, not a value to silently drop.
    pub fn from_pem(pem: &str, x5c: Option<Vec<String>>) -> Result<(Self, Option<Vec<String>>)> {
        if let Some(chain) = &x5c {
            if chain.is_empty() {
                bail!("x5c chain configured with no leaf certificate");
            }
        }

        if let Ok(key) = rsa::RsaPrivateKey::from_pkcs8_pem(pem) {
            return Ok((Self::Rsa(Box::new(key)), x5c));
        }
        if let Ok(key) = <p256::ecdsa::SigningKey as pkcs8::DecodePrivateKey>::from_pkcs8_pem(pem)
        {
            return Ok((Self::EcP256(Box::new(key)), x5c));
        }
        if let Ok(key) = <p384::ecdsa::SigningKey as pkcs8::DecodePrivateKey>::from_pkcs8_pem(pem)
        {
            return Ok((Self::EcP384(Box::new(key)), x5c));
        }
        if let Ok(key) = <p521::ecdsa::SigningKey as pkcs8::DecodePrivateKey>::from_pkcs8_pem(pem)
        {
            return Ok((Self::EcP521(Box::new(key)), x5c));
        }
        if let Ok(key) =
            <ed25519_dalek::SigningKey as pkcs8::DecodePrivateKey>::from_pkcs8_pem(pem)
        {
            return Ok((Self::Ed25519(Box::new(key)), x5c));
        }
        Err(anyhow!("unrecognised or unsupported private key format"))
    }

    /// The algorithm this key signs with.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self {
            Self::Rsa(_) => Algorithm::Rs256,
            Self::EcP256(_) => Algorithm::Es256,
            Self::EcP384(_) => Algorithm::Es384,
            Self::EcP521(_) => Algorithm::Es512,
            Self::Ed25519(_) => Algorithm::EdDsa,
        }
    }

    fn sign_bytes(&self, msg: &[u8]) -> Result<Vec<u8>> {
        Ok(match self {
            Self::Rsa(key) => {
                let signing_key = pkcs1v15::SigningKey::<Sha256>::new((**key).clone());
                signing_key.sign(msg).to_vec()
            }
            Self::EcP256(key) => {
                let sig: p256::ecdsa::Signature = key.sign(msg);
                sig.to_bytes().to_vec()
            }
            Self::EcP384(key) => {
                let sig: p384::ecdsa::Signature = key.sign(msg);
                sig.to_bytes().to_vec()
            }
            Self::EcP521(key) => {
                let sig: p521::ecdsa::Signature = key.sign(msg);
                sig.to_bytes().to_vec()
            }
            Self::Ed25519(key) => key.sign(msg).to_bytes().to_vec(),
        })
    }

    /// Derive the public verifying key and its JWK representation, for
    /// publishing in a JWKS (`spec.md` §4.7) or the request object's
    /// `client_metadata.jwks`.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        match self {
            Self::Rsa(key) => VerifyingKey::Rsa(Box::new(key.to_public_key())),
            Self::EcP256(key) => VerifyingKey::EcP256(Box::new(*key.verifying_key())),
            Self::EcP384(key) => VerifyingKey::EcP384(Box::new(*key.verifying_key())),
            Self::EcP521(key) => VerifyingKey::EcP521(Box::new(*key.verifying_key())),
            Self::Ed25519(key) => VerifyingKey::Ed25519(Box::new(key.verifying_key())),
        }
    }
}

/// A public verifying key, either derived from a [`SigningKey`] or resolved
/// from a counterparty's (e.g. a credential issuer's) published JWKS.
#[derive(Clone)]
pub enum VerifyingKey {
    /// RSASSA-PKCS1-v1_5, RS256.
    Rsa(Box<rsa::RsaPublicKey>),
    /// EC P-256, ES256.
    EcP256(Box<p256::ecdsa::VerifyingKey>),
    /// EC P-384, ES384.
    EcP384(Box<p384::ecdsa::VerifyingKey>),
    /// EC P-521, ES512.
    EcP521(Box<p521::ecdsa::VerifyingKey>),
    /// Ed25519, EdDSA.
    Ed25519(Box<ed25519_dalek::VerifyingKey>),
}

impl VerifyingKey {
    fn verify_bytes(&self, msg: &[u8], sig: &[u8]) -> Result<()> {
        match self {
            Self::Rsa(key) => {
                let verifying_key = pkcs1v15::VerifyingKey::<Sha256>::new((**key).clone());
                let signature = pkcs1v15::Signature::try_from(sig)?;
                verifying_key.verify(msg, &signature).context("RS256 signature invalid")
            }
            Self::EcP256(key) => {
                let signature = p256::ecdsa::Signature::from_slice(sig)?;
                key.verify(msg, &signature).context("ES256 signature invalid")
            }
            Self::EcP384(key) => {
                let signature = p384::ecdsa::Signature::from_slice(sig)?;
                key.verify(msg, &signature).context("ES384 signature invalid")
            }
            Self::EcP521(key) => {
                let signature = p521::ecdsa::Signature::from_slice(sig)?;
                key.verify(msg, &signature).context("ES512 signature invalid")
            }
            Self::Ed25519(key) => {
                let signature = ed25519_dalek::Signature::from_slice(sig)?;
                key.verify(msg, &signature).context("EdDSA signature invalid")
            }
        }
    }

    /// Render this key as a JWK (`spec.md` §4.7: `n`/`e` for RSA,
    /// `crv`/`x`/`y` for EC, `x` for Ed25519), tagged with `kid` and
    /// `use=sig`.
    #[must_use]
    pub fn to_jwk(&self, kid: &str) -> serde_json::Value {
        match self {
            Self::Rsa(key) => serde_json::json!({
                "kty": "RSA",
                "use": "sig",
                "kid": kid,
                "alg": Algorithm::Rs256.as_str(),
                "n": Base64UrlUnpadded::encode_string(&key.n().to_bytes_be()),
                "e": Base64UrlUnpadded::encode_string(&key.e().to_bytes_be()),
            }),
            Self::EcP256(key) => {
                let point = key.to_encoded_point(false);
                serde_json::json!({
                    "kty": "EC",
                    "use": "sig",
                    "kid": kid,
                    "alg": Algorithm::Es256.as_str(),
                    "crv": "P-256",
                    "x": Base64UrlUnpadded::encode_string(point.x().unwrap()),
                    "y": Base64UrlUnpadded::encode_string(point.y().unwrap()),
                })
            }
            Self::EcP384(key) => {
                let point = key.to_encoded_point(false);
                serde_json::json!({
                    "kty": "EC",
                    "use": "sig",
                    "kid": kid,
                    "alg": Algorithm::Es384.as_str(),
                    "crv": "P-384",
                    "x": Base64UrlUnpadded::encode_string(point.x().unwrap()),
                    "y": Base64UrlUnpadded::encode_string(point.y().unwrap()),
                })
            }
            Self::EcP521(key) => {
                let point = key.to_encoded_point(false);
                serde_json::json!({
                    "kty": "EC",
                    "use": "sig",
                    "kid": kid,
                    "alg": Algorithm::Es512.as_str(),
                    "crv": "P-521",
                    "x": Base64UrlUnpadded::encode_string(point.x().unwrap()),
                    "y": Base64UrlUnpadded::encode_string(point.y().unwrap()),
                })
            }
            Self::Ed25519(key) => serde_json::json!({
                "kty": "OKP",
                "use": "sig",
                "kid": kid,
                "alg": Algorithm::EdDsa.as_str(),
                "crv": "Ed25519",
                "x": Base64UrlUnpadded::encode_string(key.as_bytes()),
            }),
        }
    }

    /// Parse a JWK into a verifying key, e.g. an SD-JWT VC's `cnf.jwk` or
    /// an entry from a counterparty's published JWKS.
    ///
    /// # Errors
    ///
    /// Returns an error if `jwk` is missing required fields or names an
    /// unsupported `kty`/`crv` combination.
    pub fn from_jwk(jwk: &serde_json::Value) -> Result<Self> {
        let field = |name: &str| -> Result<Vec<u8>> {
            let value = jwk
                .get(name)
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| anyhow!("JWK missing {name}"))?;
            Base64UrlUnpadded::decode_vec(value).with_context(|| format!("invalid {name} encoding"))
        };

        match jwk.get("kty").and_then(serde_json::Value::as_str) {
            Some("RSA") => {
                let n = field("n")?;
                let e = field("e")?;
                let key = rsa::RsaPublicKey::new(
                    rsa::BigUint::from_bytes_be(&n),
                    rsa::BigUint::from_bytes_be(&e),
                )?;
                Ok(Self::Rsa(Box::new(key)))
            }
            Some("EC") => {
                let x = field("x")?;
                let y = field("y")?;
                let mut sec1 = Vec::with_capacity(1 + x.len() + y.len());
                sec1.push(0x04);
                sec1.extend_from_slice(&x);
                sec1.extend_from_slice(&y);
                match jwk.get("crv").and_then(serde_json::Value::as_str) {
                    Some("P-256") => Ok(Self::EcP256(Box::new(p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)?))),
                    Some("P-384") => Ok(Self::EcP384(Box::new(p384::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)?))),
                    Some("P-521") => Ok(Self::EcP521(Box::new(p521::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)?))),
                    other => bail!("unsupported EC crv {other:?}"),
                }
            }
            Some("OKP") => {
                if jwk.get("crv").and_then(serde_json::Value::as_str) != Some("Ed25519") {
                    bail!("unsupported OKP crv, expected Ed25519");
                }
                let x = field("x")?;
                let bytes: [u8; 32] =
                    x.try_into().map_err(|_| anyhow!("Ed25519 JWK x must be 32 bytes"))?;
                Ok(Self::Ed25519(Box::new(ed25519_dalek::VerifyingKey::from_bytes(&bytes)?)))
            }
            other => bail!("unsupported JWK kty {other:?}"),
        }
    }
}

fn b64(segment: &impl Serialize) -> Result<String> {
    Ok(Base64UrlUnpadded::encode_string(&serde_json::to_vec(segment)?))
}

/// Sign `claims` as a compact JWS.
///
/// `typ` is the JWS `typ` header (`"JWT"`, or `"oauth-authz-req+jwt"` for an
/// `OpenID4VP` request object). `x5c`, if present, is embedded unmodified.
///
/// # Errors
///
/// Returns an error if `claims` cannot be serialized or the signature
/// cannot be produced.
pub fn sign_compact<T: Serialize>(
    key: &SigningKey, typ: &str, kid: &str, x5c: Option<&[String]>, claims: &T,
) -> Result<String> {
    let mut header = serde_json::json!({
        "alg": key.algorithm().as_str(),
        "typ": typ,
        "kid": kid,
    });
    if let Some(chain) = x5c {
        header["x5c"] = serde_json::json!(chain);
    }

    let signing_input = format!("{}.{}", b64(&header)?, b64(claims)?);
    let signature = key.sign_bytes(signing_input.as_bytes())?;
    Ok(format!("{signing_input}.{}", Base64UrlUnpadded::encode_string(&signature)))
}

/// Verify a compact JWS against `verifying_key` and return its decoded
/// claims.
///
/// # Errors
///
/// Returns an error if the JWS is malformed, the signature does not verify,
/// or the payload does not deserialize to `T`.
pub fn verify_compact<T: DeserializeOwned>(jws: &str, verifying_key: &VerifyingKey) -> Result<T> {
    let mut parts = jws.split('.');
    let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        bail!("malformed compact JWS: expected exactly three segments");
    };

    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = Base64UrlUnpadded::decode_vec(sig_b64).context("invalid signature encoding")?;
    verifying_key.verify_bytes(signing_input.as_bytes(), &signature)?;

    let payload = Base64UrlUnpadded::decode_vec(payload_b64).context("invalid payload encoding")?;
    Ok(serde_json::from_slice(&payload)?)
}
