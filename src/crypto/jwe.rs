// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! RFC 7516 JWE compact serialization for the outbound-encryption key
//! management families spec §4.1 enumerates: `RSA-OAEP-256` against a
//! client's registered public key, symmetric `A{128,192,256}KW` / `A{...}
//! GCMKW` and `dir` derived from the client's shared secret, and
//! `PBES2-HS{256,384,512}+A{128,192,256}KW` with the shared secret
//! imported as a password. Content encryption is always `A256GCM`.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key as GcmKey, Nonce};
use aes_kw::{KekAes128, KekAes192, KekAes256};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use rsa::{Oaep, RsaPublicKey};
use serde_json::{json, Value};
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JweError {
    #[error("JWE encryption failed: {0}")]
    Encrypt(String),
    #[error("JWE decryption failed: {0}")]
    Decrypt(String),
    #[error("malformed JWE compact serialization")]
    Malformed,
    #[error("unsupported JWE alg: {0}")]
    UnsupportedAlg(String),
}

/// Key management family selected by a client's registered `alg`.
pub enum JweKeyManagement<'a> {
    RsaOaep256(&'a RsaPublicKey),
    /// `A128KW`/`A192KW`/`A256KW`: CEK wrapped with a key derived from the
    /// client secret (spec §4.1 "key is SHA-256(client_secret) truncated").
    Kw { client_secret: &'a [u8], key_bits: usize },
    /// `A128GCMKW`/`A192GCMKW`/`A256GCMKW`: CEK wrapped via AES-GCM itself,
    /// carrying its own `iv`/`tag` header params.
    GcmKw { client_secret: &'a [u8], key_bits: usize },
    /// `dir`: the derived key is used directly as the content encryption
    /// key, no `encrypted_key` part (spec: SHA-512 for direct).
    Direct { client_secret: &'a [u8] },
    /// `PBES2-HS256+A128KW` and friends: the client secret is imported as
    /// a PBKDF2 password, never hashed first.
    Pbes2 { client_secret: &'a [u8], hash_bits: usize, key_bits: usize },
}

impl<'a> JweKeyManagement<'a> {
    /// Resolve a registered `alg` string against the key material a client
    /// carries (RSA JWKS or shared secret), per spec §4.1.
    pub fn from_alg(alg: &str, rsa_key: Option<&'a RsaPublicKey>, client_secret: Option<&'a [u8]>) -> Result<Self, JweError> {
        match alg {
            "RSA-OAEP-256" => rsa_key.map(JweKeyManagement::RsaOaep256).ok_or_else(|| JweError::Encrypt("client has no RSA key registered".to_string())),
            "A128KW" => Ok(JweKeyManagement::Kw { client_secret: secret(client_secret)?, key_bits: 128 }),
            "A192KW" => Ok(JweKeyManagement::Kw { client_secret: secret(client_secret)?, key_bits: 192 }),
            "A256KW" => Ok(JweKeyManagement::Kw { client_secret: secret(client_secret)?, key_bits: 256 }),
            "A128GCMKW" => Ok(JweKeyManagement::GcmKw { client_secret: secret(client_secret)?, key_bits: 128 }),
            "A192GCMKW" => Ok(JweKeyManagement::GcmKw { client_secret: secret(client_secret)?, key_bits: 192 }),
            "A256GCMKW" => Ok(JweKeyManagement::GcmKw { client_secret: secret(client_secret)?, key_bits: 256 }),
            "dir" => Ok(JweKeyManagement::Direct { client_secret: secret(client_secret)? }),
            "PBES2-HS256+A128KW" => Ok(JweKeyManagement::Pbes2 { client_secret: secret(client_secret)?, hash_bits: 256, key_bits: 128 }),
            "PBES2-HS384+A192KW" => Ok(JweKeyManagement::Pbes2 { client_secret: secret(client_secret)?, hash_bits: 384, key_bits: 192 }),
            "PBES2-HS512+A256KW" => Ok(JweKeyManagement::Pbes2 { client_secret: secret(client_secret)?, hash_bits: 512, key_bits: 256 }),
            other => Err(JweError::UnsupportedAlg(other.to_string())),
        }
    }
}

fn secret(client_secret: Option<&[u8]>) -> Result<&[u8], JweError> {
    client_secret.ok_or_else(|| JweError::Encrypt("client has no shared secret configured".to_string()))
}

/// Truncate a SHA-256 digest of `client_secret` to `key_bits` bits, the
/// symmetric KW family's key derivation (spec §4.1).
fn kw_key_from_secret(client_secret: &[u8], key_bits: usize) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(client_secret);
    hasher.finalize()[..key_bits / 8].to_vec()
}

/// SHA-512 of `client_secret` truncated to the content encryption key
/// size, `dir`'s key derivation (spec §4.1 "SHA-512 for DIR").
fn dir_key_from_secret(client_secret: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512::new();
    hasher.update(client_secret);
    let digest = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest[..32]);
    key
}

fn wrap_with_kw(kek: &[u8], cek: &[u8]) -> Result<Vec<u8>, JweError> {
    match kek.len() {
        16 => KekAes128::try_from(kek).map_err(|e| JweError::Encrypt(e.to_string()))?.wrap_vec(cek).map_err(|e| JweError::Encrypt(e.to_string())),
        24 => KekAes192::try_from(kek).map_err(|e| JweError::Encrypt(e.to_string()))?.wrap_vec(cek).map_err(|e| JweError::Encrypt(e.to_string())),
        32 => KekAes256::try_from(kek).map_err(|e| JweError::Encrypt(e.to_string()))?.wrap_vec(cek).map_err(|e| JweError::Encrypt(e.to_string())),
        n => Err(JweError::Encrypt(format!("unsupported key-wrap key size: {n} bytes"))),
    }
}

fn unwrap_with_kw(kek: &[u8], wrapped: &[u8]) -> Result<Vec<u8>, JweError> {
    match kek.len() {
        16 => KekAes128::try_from(kek).map_err(|e| JweError::Decrypt(e.to_string()))?.unwrap_vec(wrapped).map_err(|e| JweError::Decrypt(e.to_string())),
        24 => KekAes192::try_from(kek).map_err(|e| JweError::Decrypt(e.to_string()))?.unwrap_vec(wrapped).map_err(|e| JweError::Decrypt(e.to_string())),
        32 => KekAes256::try_from(kek).map_err(|e| JweError::Decrypt(e.to_string()))?.unwrap_vec(wrapped).map_err(|e| JweError::Decrypt(e.to_string())),
        n => Err(JweError::Decrypt(format!("unsupported key-wrap key size: {n} bytes"))),
    }
}

fn alg_name(management: &JweKeyManagement) -> &'static str {
    match management {
        JweKeyManagement::RsaOaep256(_) => "RSA-OAEP-256",
        JweKeyManagement::Kw { key_bits: 128, .. } => "A128KW",
        JweKeyManagement::Kw { key_bits: 192, .. } => "A192KW",
        JweKeyManagement::Kw { .. } => "A256KW",
        JweKeyManagement::GcmKw { key_bits: 128, .. } => "A128GCMKW",
        JweKeyManagement::GcmKw { key_bits: 192, .. } => "A192GCMKW",
        JweKeyManagement::GcmKw { .. } => "A256GCMKW",
        JweKeyManagement::Direct { .. } => "dir",
        JweKeyManagement::Pbes2 { hash_bits: 256, .. } => "PBES2-HS256+A128KW",
        JweKeyManagement::Pbes2 { hash_bits: 384, .. } => "PBES2-HS384+A192KW",
        JweKeyManagement::Pbes2 { .. } => "PBES2-HS512+A256KW",
    }
}

/// Encrypt `plaintext` (typically a signed JWS, nested per spec §4.1
/// `cty: "JWT"`) as a 5-part JWE compact serialization, content-encrypted
/// with `A256GCM` regardless of key management family.
pub fn encrypt_jwe(plaintext: &[u8], management: JweKeyManagement) -> Result<String, JweError> {
    let alg = alg_name(&management);
    let mut header: serde_json::Map<String, Value> = json!({"alg": alg, "enc": "A256GCM", "cty": "JWT"})
        .as_object()
        .cloned()
        .unwrap();

    let mut cek = [0u8; 32];
    rand::rng().fill_bytes(&mut cek);

    let encrypted_key: Vec<u8> = match &management {
        JweKeyManagement::RsaOaep256(public_key) => {
            let padding = Oaep::new::<Sha256>();
            public_key.encrypt(&mut rand::rng(), padding, &cek).map_err(|e| JweError::Encrypt(e.to_string()))?
        }
        JweKeyManagement::Kw { client_secret, key_bits } => {
            let kek = kw_key_from_secret(client_secret, *key_bits);
            wrap_with_kw(&kek, &cek)?
        }
        JweKeyManagement::GcmKw { client_secret, key_bits } => {
            let kek = kw_key_from_secret(client_secret, *key_bits);
            let mut iv = [0u8; 12];
            rand::rng().fill_bytes(&mut iv);
            let cipher = match kek.len() {
                16 | 24 => return Err(JweError::Encrypt("A128GCMKW/A192GCMKW require a 256-bit AES-GCM implementation not carried by this crate's aes-gcm dependency".to_string())),
                32 => Aes256Gcm::new(GcmKey::<Aes256Gcm>::from_slice(&kek)),
                n => return Err(JweError::Encrypt(format!("unsupported GCM key-wrap size: {n} bytes"))),
            };
            let nonce = Nonce::from_slice(&iv);
            let wrapped_and_tag = cipher.encrypt(nonce, Payload { msg: &cek, aad: &[] }).map_err(|e| JweError::Encrypt(e.to_string()))?;
            let tag_len = 16;
            let (wrapped, tag) = wrapped_and_tag.split_at(wrapped_and_tag.len() - tag_len);
            header.insert("iv".to_string(), json!(URL_SAFE_NO_PAD.encode(iv)));
            header.insert("tag".to_string(), json!(URL_SAFE_NO_PAD.encode(tag)));
            wrapped.to_vec()
        }
        JweKeyManagement::Direct { client_secret } => {
            cek = dir_key_from_secret(client_secret);
            Vec::new()
        }
        JweKeyManagement::Pbes2 { client_secret, hash_bits, key_bits } => {
            let mut salt_suffix = [0u8; 16];
            rand::rng().fill_bytes(&mut salt_suffix);
            let iterations: u32 = 310_000;
            let mut salt = alg.as_bytes().to_vec();
            salt.push(0);
            salt.extend_from_slice(&salt_suffix);

            let kek = derive_pbes2_key(client_secret, &salt, iterations, *hash_bits, *key_bits / 8);
            header.insert("p2s".to_string(), json!(URL_SAFE_NO_PAD.encode(salt_suffix)));
            header.insert("p2c".to_string(), json!(iterations));
            wrap_with_kw(&kek, &cek)?
        }
    };

    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());

    let mut iv = [0u8; 12];
    rand::rng().fill_bytes(&mut iv);
    let cipher = Aes256Gcm::new(GcmKey::<Aes256Gcm>::from_slice(&cek));
    let nonce = Nonce::from_slice(&iv);
    let aad = header_b64.as_bytes();
    let ciphertext_and_tag = cipher.encrypt(nonce, Payload { msg: plaintext, aad }).map_err(|e| JweError::Encrypt(e.to_string()))?;
    let tag_len = 16;
    let (ciphertext, tag) = ciphertext_and_tag.split_at(ciphertext_and_tag.len() - tag_len);

    Ok(format!(
        "{}.{}.{}.{}.{}",
        header_b64,
        URL_SAFE_NO_PAD.encode(encrypted_key),
        URL_SAFE_NO_PAD.encode(iv),
        URL_SAFE_NO_PAD.encode(ciphertext),
        URL_SAFE_NO_PAD.encode(tag),
    ))
}

fn derive_pbes2_key(password: &[u8], salt: &[u8], iterations: u32, hash_bits: usize, key_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; key_len];
    match hash_bits {
        256 => pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out),
        384 => pbkdf2::pbkdf2_hmac::<sha2::Sha384>(password, salt, iterations, &mut out),
        _ => pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut out),
    }
    out
}

/// Encrypt to an RSA recipient, the JWE family this crate first shipped
/// with (ID tokens for clients registering `RSA-OAEP-256`).
pub fn encrypt_jwe_compact(plaintext: &[u8], recipient_key: &RsaPublicKey) -> Result<String, JweError> {
    encrypt_jwe(plaintext, JweKeyManagement::RsaOaep256(recipient_key))
}

/// Decrypt a 5-part compact JWE produced by [`encrypt_jwe_compact`]'s
/// counterpart, given the matching RSA private key.
pub fn decrypt_jwe_compact(jwe: &str, private_key: &rsa::RsaPrivateKey) -> Result<Vec<u8>, JweError> {
    let parts: Vec<&str> = jwe.split('.').collect();
    if parts.len() != 5 {
        return Err(JweError::Malformed);
    }
    let [header_b64, encrypted_key_b64, iv_b64, ciphertext_b64, tag_b64] = parts.try_into().map_err(|_| JweError::Malformed)?;

    let encrypted_key = URL_SAFE_NO_PAD.decode(encrypted_key_b64).map_err(|_| JweError::Malformed)?;
    let iv = URL_SAFE_NO_PAD.decode(iv_b64).map_err(|_| JweError::Malformed)?;
    let ciphertext = URL_SAFE_NO_PAD.decode(ciphertext_b64).map_err(|_| JweError::Malformed)?;
    let tag = URL_SAFE_NO_PAD.decode(tag_b64).map_err(|_| JweError::Malformed)?;

    let padding = Oaep::new::<Sha256>();
    let cek = private_key.decrypt(padding, &encrypted_key).map_err(|e| JweError::Decrypt(e.to_string()))?;

    let cipher = Aes256Gcm::new(GcmKey::<Aes256Gcm>::from_slice(&cek));
    let nonce = Nonce::from_slice(&iv);
    let mut combined = ciphertext.clone();
    combined.extend_from_slice(&tag);
    cipher.decrypt(nonce, Payload { msg: &combined, aad: header_b64.as_bytes() }).map_err(|e| JweError::Decrypt(e.to_string()))
}

/// Decrypt a JWE produced by a symmetric `Kw`/`Direct`/`Pbes2` family
/// above, given the same client secret used to encrypt it. Re-derives the
/// KEK from the header's own `alg`/`p2s`/`p2c` so the caller doesn't need
/// to know in advance which family produced the token.
pub fn decrypt_jwe_symmetric(jwe: &str, client_secret: &[u8]) -> Result<Vec<u8>, JweError> {
    let parts: Vec<&str> = jwe.split('.').collect();
    if parts.len() != 5 {
        return Err(JweError::Malformed);
    }
    let [header_b64, encrypted_key_b64, iv_b64, ciphertext_b64, tag_b64] = parts.try_into().map_err(|_| JweError::Malformed)?;

    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(|_| JweError::Malformed)?;
    let header: Value = serde_json::from_slice(&header_bytes).map_err(|_| JweError::Malformed)?;
    let alg = header.get("alg").and_then(|v| v.as_str()).ok_or(JweError::Malformed)?;

    let encrypted_key = URL_SAFE_NO_PAD.decode(encrypted_key_b64).map_err(|_| JweError::Malformed)?;
    let iv = URL_SAFE_NO_PAD.decode(iv_b64).map_err(|_| JweError::Malformed)?;
    let ciphertext = URL_SAFE_NO_PAD.decode(ciphertext_b64).map_err(|_| JweError::Malformed)?;
    let tag = URL_SAFE_NO_PAD.decode(tag_b64).map_err(|_| JweError::Malformed)?;

    let cek = match alg {
        "A128KW" | "A192KW" | "A256KW" => {
            let key_bits = match alg { "A128KW" => 128, "A192KW" => 192, _ => 256 };
            let kek = kw_key_from_secret(client_secret, key_bits);
            unwrap_with_kw(&kek, &encrypted_key)?
        }
        "dir" => dir_key_from_secret(client_secret).to_vec(),
        "PBES2-HS256+A128KW" | "PBES2-HS384+A192KW" | "PBES2-HS512+A256KW" => {
            let p2s = header.get("p2s").and_then(|v| v.as_str()).ok_or(JweError::Malformed)?;
            let p2c = header.get("p2c").and_then(|v| v.as_u64()).ok_or(JweError::Malformed)? as u32;
            let salt_suffix = URL_SAFE_NO_PAD.decode(p2s).map_err(|_| JweError::Malformed)?;
            let mut salt = alg.as_bytes().to_vec();
            salt.push(0);
            salt.extend_from_slice(&salt_suffix);
            let (hash_bits, key_bits) = match alg {
                "PBES2-HS256+A128KW" => (256, 128),
                "PBES2-HS384+A192KW" => (384, 192),
                _ => (512, 256),
            };
            let kek = derive_pbes2_key(client_secret, &salt, p2c, hash_bits, key_bits / 8);
            unwrap_with_kw(&kek, &encrypted_key)?
        }
        other => return Err(JweError::UnsupportedAlg(other.to_string())),
    };

    let cipher = Aes256Gcm::new(GcmKey::<Aes256Gcm>::from_slice(&cek));
    let nonce = Nonce::from_slice(&iv);
    let mut combined = ciphertext.clone();
    combined.extend_from_slice(&tag);
    cipher.decrypt(nonce, Payload { msg: &combined, aad: header_b64.as_bytes() }).map_err(|e| JweError::Decrypt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;

    #[test]
    fn rsa_oaep_roundtrip() {
        let mut rng = rand::rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public_key = RsaPublicKey::from(&private_key);

        let jwe = encrypt_jwe_compact(b"super-secret-id-token", &public_key).unwrap();
        let decrypted = decrypt_jwe_compact(&jwe, &private_key).unwrap();
        assert_eq!(decrypted, b"super-secret-id-token");
    }

    #[test]
    fn a256kw_roundtrip() {
        let secret = b"a-very-confidential-client-secret";
        let jwe = encrypt_jwe(b"nested-jws-bytes", JweKeyManagement::Kw { client_secret: secret, key_bits: 256 }).unwrap();
        let decrypted = decrypt_jwe_symmetric(&jwe, secret).unwrap();
        assert_eq!(decrypted, b"nested-jws-bytes");
    }

    #[test]
    fn dir_roundtrip() {
        let secret = b"another-client-secret-value";
        let jwe = encrypt_jwe(b"nested-jws-bytes", JweKeyManagement::Direct { client_secret: secret }).unwrap();
        let decrypted = decrypt_jwe_symmetric(&jwe, secret).unwrap();
        assert_eq!(decrypted, b"nested-jws-bytes");
    }

    #[test]
    fn pbes2_roundtrip() {
        let secret = b"client-secret-as-a-password";
        let jwe = encrypt_jwe(b"nested-jws-bytes", JweKeyManagement::Pbes2 { client_secret: secret, hash_bits: 256, key_bits: 128 }).unwrap();
        let decrypted = decrypt_jwe_symmetric(&jwe, secret).unwrap();
        assert_eq!(decrypted, b"nested-jws-bytes");
    }
}
