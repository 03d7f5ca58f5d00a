// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! DPoP proof verification (RFC 9449, spec §4.12): validates the
//! `DPoP` header JWT presented alongside a token request or a resource
//! access, binding the minted access token's `cnf.jkt` to the client's
//! proof-of-possession key.

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::crypto::calculate_jwk_thumbprint;
use crate::error::{OidcError, OidcResult};
use crate::store::{now, DpopJti, TokenStore};

#[derive(Debug, Deserialize)]
struct DpopHeader {
    typ: String,
    alg: String,
    jwk: Jwk,
}

#[derive(Debug, Deserialize)]
struct DpopClaims {
    htm: String,
    htu: String,
    iat: i64,
    jti: String,
    /// Present when the proof accompanies a resource request bound to a
    /// prior access token (RFC 9449 §4.3).
    #[serde(default)]
    ath: Option<String>,
}

/// The outcome of a verified DPoP proof: the `jkt` thumbprint to bind the
/// minted token to.
pub struct VerifiedDpopProof {
    pub jkt: String,
}

/// Verify a DPoP proof JWT against the expected HTTP method and URL,
/// rejecting replayed `jti`s via `store::TokenStore`.
pub async fn verify_dpop_proof(
    proof: &str,
    expected_method: &str,
    expected_url: &str,
    store: &dyn TokenStore,
) -> OidcResult<VerifiedDpopProof> {
    let header = jsonwebtoken::decode_header(proof)
        .map_err(|e| OidcError::invalid_request(format!("malformed DPoP proof header: {e}")))?;

    let raw_header = decode_header_json(proof)?;
    if raw_header.typ != "dpop+jwt" {
        return Err(OidcError::invalid_request("DPoP proof typ must be dpop+jwt"));
    }

    let decoding_key = jwk_to_decoding_key(&raw_header.jwk)?;
    let mut validation = Validation::new(header.alg);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;

    let decoded = jsonwebtoken::decode::<DpopClaims>(proof, &decoding_key, &validation)
        .map_err(|e| OidcError::invalid_request(format!("DPoP proof signature invalid: {e}")))?;

    if decoded.claims.htm.to_uppercase() != expected_method.to_uppercase() {
        return Err(OidcError::invalid_request("DPoP htm does not match the request method"));
    }
    if decoded.claims.htu != expected_url {
        return Err(OidcError::invalid_request("DPoP htu does not match the request URL"));
    }

    let age = now() - decoded.claims.iat;
    if !(-60..=300).contains(&age) {
        return Err(OidcError::invalid_request("DPoP proof iat is too old or in the future"));
    }

    let fresh = store
        .record_dpop_jti(DpopJti { jti: decoded.claims.jti, seen_at: now() })
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?;
    if !fresh {
        return Err(OidcError::invalid_request("DPoP proof jti has already been used"));
    }

    let jkt = calculate_jwk_thumbprint(&raw_header.jwk).map_err(|e| OidcError::Crypto(e.to_string()))?;
    Ok(VerifiedDpopProof { jkt })
}

/// Confirm a resource request's DPoP proof binds to a previously issued
/// access token, by checking `ath` (RFC 9449 §4.3) and the `cnf.jkt` the
/// token was minted with.
pub fn check_access_token_binding(ath: Option<&str>, access_token: &str, bound_jkt: &str, proof_jkt: &str) -> OidcResult<()> {
    if bound_jkt != proof_jkt {
        return Err(OidcError::invalid_client("DPoP proof key does not match the token's cnf.jkt"));
    }
    if let Some(ath) = ath {
        let expected = crate::token_factory::half_hash(access_token);
        if ath != expected {
            return Err(OidcError::invalid_client("DPoP proof ath does not match the presented access token"));
        }
    }
    Ok(())
}

fn decode_header_json(token: &str) -> OidcResult<DpopHeader> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    let header_part = token
        .split('.')
        .next()
        .ok_or_else(|| OidcError::invalid_request("malformed DPoP proof"))?;
    let decoded = URL_SAFE_NO_PAD
        .decode(header_part)
        .map_err(|_| OidcError::invalid_request("malformed DPoP proof header encoding"))?;
    serde_json::from_slice(&decoded).map_err(|e| OidcError::invalid_request(format!("malformed DPoP proof header JSON: {e}")))
}

fn jwk_to_decoding_key(jwk: &Jwk) -> OidcResult<DecodingKey> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(|e| OidcError::Crypto(e.to_string())),
        AlgorithmParameters::EllipticCurve(ec) => {
            DecodingKey::from_ec_components(&ec.x, &ec.y).map_err(|e| OidcError::Crypto(e.to_string()))
        }
        _ => Err(OidcError::invalid_request("unsupported DPoP proof key type")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_binding_rejects_mismatched_jkt() {
        let result = check_access_token_binding(None, "token", "jkt-a", "jkt-b");
        assert!(result.is_err());
    }

    #[test]
    fn access_token_binding_accepts_matching_jkt_without_ath() {
        let result = check_access_token_binding(None, "token", "jkt-a", "jkt-a");
        assert!(result.is_ok());
    }
}
