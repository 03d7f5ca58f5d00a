// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Symmetric and asymmetric JWT key loading, generalized from a single
//! fixed-algorithm wrapper into the multi-key, multi-algorithm key manager
//! that backs [`super::KeyManager`].

use anyhow::{anyhow, Context, Result};
use base64::prelude::*;
use jsonwebtoken::jwk::{Jwk, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;

#[derive(Debug, Clone, Copy)]
pub enum KeyType {
    Symmetric,
    RSA,
    EC,
}

/// Algorithm-tagged signing/verification key pair, the unit [`super::KeyManager`]
/// stores per `kid`.
pub struct JwtKeyConfig {
    pub algorithm: Algorithm,
    pub key_type: KeyType,
    pub encoding_key: EncodingKey,
    pub decoding_key: DecodingKey,
    /// Retained for RSA keys so a public JWK can be published without
    /// re-parsing the PEM at JWKS-fetch time.
    rsa_public: Option<RsaPublicKey>,
}

impl std::fmt::Debug for JwtKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeyConfig")
            .field("algorithm", &self.algorithm)
            .field("key_type", &self.key_type)
            .field("encoding_key", &"<EncodingKey>")
            .field("decoding_key", &"<DecodingKey>")
            .finish()
    }
}

impl JwtKeyConfig {
    pub fn new_symmetric(secret: &[u8], algorithm: Algorithm) -> Result<Self> {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => (),
            _ => return Err(anyhow!("algorithm {:?} is not valid for symmetric keys", algorithm)),
        }
        Ok(Self {
            algorithm,
            key_type: KeyType::Symmetric,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            rsa_public: None,
        })
    }

    pub fn new_rsa_from_pem(private_key: &[u8], public_key: &[u8], algorithm: Algorithm) -> Result<Self> {
        match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => (),
            _ => return Err(anyhow!("algorithm {:?} is not valid for RSA keys", algorithm)),
        }
        let rsa_public = RsaPublicKey::from_pkcs1_pem(std::str::from_utf8(public_key)?)
            .ok()
            .or_else(|| {
                // Fall back to parsing a SubjectPublicKeyInfo-wrapped key.
                use rsa::pkcs8::DecodePublicKey;
                RsaPublicKey::from_public_key_pem(std::str::from_utf8(public_key).ok()?).ok()
            });
        Ok(Self {
            algorithm,
            key_type: KeyType::RSA,
            encoding_key: EncodingKey::from_rsa_pem(private_key)?,
            decoding_key: DecodingKey::from_rsa_pem(public_key)?,
            rsa_public,
        })
    }

    pub fn new_ec_from_pem(private_key: &[u8], public_key: &[u8], algorithm: Algorithm) -> Result<Self> {
        match algorithm {
            Algorithm::ES256 | Algorithm::ES384 => (),
            _ => return Err(anyhow!("algorithm {:?} is not valid for EC keys", algorithm)),
        }
        Ok(Self {
            algorithm,
            key_type: KeyType::EC,
            encoding_key: EncodingKey::from_ec_pem(private_key)?,
            decoding_key: DecodingKey::from_ec_pem(public_key)?,
            rsa_public: None,
        })
    }

    /// Build a [`JwtKeyConfig`] from the plugin's `signing_key` /
    /// `signing_algorithm` configuration fields. HMAC secrets are taken
    /// verbatim; anything beginning with `-----BEGIN` is treated as a PEM
    /// key pair where `signing_key` holds both private and public blocks
    /// concatenated (the convenience format used by the demo binary).
    pub fn from_config(signing_key: &str, algorithm_name: &str) -> Result<Self> {
        let algorithm: Algorithm = algorithm_name
            .parse()
            .map_err(|_| anyhow!("unsupported signing algorithm: {algorithm_name}"))?;
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                Self::new_symmetric(signing_key.as_bytes(), algorithm)
            }
            _ => Err(anyhow!(
                "asymmetric signing_key must be loaded via new_rsa_from_pem/new_ec_from_pem, not from_config"
            )),
        }
    }

    /// Public JWK for this key, or `None` for symmetric keys (which must
    /// never be published).
    pub fn to_public_jwk(&self, kid: &str) -> Result<Option<Jwk>> {
        match self.key_type {
            KeyType::Symmetric => Ok(None),
            KeyType::RSA => {
                let public_key = self
                    .rsa_public
                    .as_ref()
                    .context("RSA key loaded without retaining its public component")?;
                Ok(Some(rsa_to_jwk(public_key, kid, self.algorithm)))
            }
            KeyType::EC => Ok(None), // EC JWK export omitted; EC keys here are verify-only via PEM.
        }
    }

    #[cfg(test)]
    pub fn generate_test_key_pair() -> Result<Self> {
        Self::new_symmetric(b"test-secret-key-for-jwt-token-testing-only-32b", Algorithm::HS256)
    }
}

/// Parse the first RSA encryption key out of a client's registered JWK
/// Set (spec §4.1 `RSA-OAEP-256`), the reverse of [`rsa_to_jwk`]. Accepts
/// a key with `use: "enc"` or no `use` at all; skips signature-only keys.
pub fn rsa_public_key_from_jwks(jwks: &serde_json::Value) -> Option<RsaPublicKey> {
    let keys = jwks.get("keys")?.as_array()?;
    let key = keys.iter().find(|k| {
        k.get("kty").and_then(|v| v.as_str()) == Some("RSA")
            && k.get("use").and_then(|v| v.as_str()).map(|u| u == "enc").unwrap_or(true)
    })?;
    let n = BASE64_URL_SAFE_NO_PAD.decode(key.get("n")?.as_str()?).ok()?;
    let e = BASE64_URL_SAFE_NO_PAD.decode(key.get("e")?.as_str()?).ok()?;
    RsaPublicKey::new(rsa::BigUint::from_bytes_be(&n), rsa::BigUint::from_bytes_be(&e)).ok()
}

fn rsa_to_jwk(public_key: &RsaPublicKey, kid: &str, algorithm: Algorithm) -> Jwk {
    let n = BASE64_URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
    let e = BASE64_URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
    let key_algorithm = match algorithm {
        Algorithm::RS384 => jsonwebtoken::jwk::KeyAlgorithm::RS384,
        Algorithm::RS512 => jsonwebtoken::jwk::KeyAlgorithm::RS512,
        _ => jsonwebtoken::jwk::KeyAlgorithm::RS256,
    };
    Jwk {
        common: jsonwebtoken::jwk::CommonParameters {
            public_key_use: Some(PublicKeyUse::Signature),
            key_id: Some(kid.to_string()),
            key_algorithm: Some(key_algorithm),
            ..Default::default()
        },
        algorithm: jsonwebtoken::jwk::AlgorithmParameters::RSA(jsonwebtoken::jwk::RSAKeyParameters {
            key_type: jsonwebtoken::jwk::RSAKeyType::RSA,
            n,
            e,
            ..Default::default()
        }),
    }
}
