// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Salted password hashing for the in-memory [`crate::host::memory::MemoryHost`].
//!
//! Format: `sha256${salt_hex}${digest_hex}`. Real deployments plug in
//! their own `Host::generate_hash`/`verify_hash` (bcrypt, argon2, whatever
//! their user directory already uses) — this one exists only so the demo
//! binary and tests have something to check passwords against.

use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

const PREFIX: &str = "sha256$";

pub fn hash_password(plaintext: &str) -> String {
    let mut salt = [0u8; 16];
    rand::rng().fill_bytes(&mut salt);
    let salt_hex = hex_encode(&salt);
    let digest = digest_with_salt(plaintext, &salt_hex);
    format!("{PREFIX}{salt_hex}${digest}")
}

pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    let Some(rest) = hash.strip_prefix(PREFIX) else {
        return false;
    };
    let Some((salt_hex, expected_digest)) = rest.split_once('$') else {
        return false;
    };
    digest_with_salt(plaintext, salt_hex) == expected_digest
}

fn digest_with_salt(plaintext: &str, salt_hex: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(b":");
    hasher.update(plaintext.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Base64-encodes a hash in the same "store it as text in YAML" shape the
/// teacher's config used for `openssl passwd` output.
pub fn hash_password_b64(plaintext: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(hash_password(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_verifies() {
        let hash = hash_password("correct horse battery staple");
        assert!(verify_password("correct horse battery staple", &hash));
    }

    #[test]
    fn wrong_password_fails() {
        let hash = hash_password("correct horse battery staple");
        assert!(!verify_password("wrong password", &hash));
    }
}
