// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! RFC 7638 JWK thumbprints (used as DPoP `jkt`) and RFC 8705 `x5t#S256`
//! client certificate thumbprints.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk};
use serde_json::json;
use sha2::{Digest, Sha256};

/// RFC 7638 thumbprint: SHA-256 of the lexicographically-ordered, compact
/// JSON serialization of the JWK's required members.
pub fn calculate_jwk_thumbprint(jwk: &Jwk) -> Result<String> {
    let canonical = match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => json!({
            "e": rsa.e,
            "kty": "RSA",
            "n": rsa.n,
        }),
        AlgorithmParameters::EllipticCurve(ec) => json!({
            "crv": format!("{:?}", ec.curve),
            "kty": "EC",
            "x": ec.x,
            "y": ec.y,
        }),
        AlgorithmParameters::OctetKey(oct) => json!({
            "k": oct.value,
            "kty": "oct",
        }),
        _ => return Err(anyhow!("unsupported key type for thumbprint computation")),
    };

    let canonical_bytes = serde_json::to_vec(&canonical).context("failed to serialize JWK")?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical_bytes);
    Ok(URL_SAFE_NO_PAD.encode(hasher.finalize()))
}

/// RFC 8705 §3.1 `x5t#S256`: base64url(SHA-256(DER-encoded certificate)).
pub fn certificate_thumbprint_s256(der: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(der);
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
