// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Token minting (spec C5): authorization codes, refresh tokens, signed
//! access tokens and ID tokens, including the `at_hash`/`c_hash` binding
//! claims OIDC Core requires when an ID token is issued alongside an
//! access token or code.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::crypto::KeyManager;
use crate::error::{OidcError, OidcResult};
use crate::store::now;

/// Standard ID token claims plus whatever scope/claims-request derived
/// claims `claims::userinfo_response` contributed.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub auth_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub amr: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Access token claims, as a signed JWT (spec §4.5 "self-contained access
/// token" option; an opaque reference token is just this record's `jti`
/// handed back to the caller with the JWT discarded).
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub client_id: String,
    pub scope: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    #[serde(rename = "type")]
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnf: Option<ConfirmationClaim>,
}

/// RFC 9449/8705 `cnf` proof-of-possession binding (`jkt` for DPoP,
/// `x5t#S256` for mTLS).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationClaim {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jkt: Option<String>,
    #[serde(rename = "x5t#S256", skip_serializing_if = "Option::is_none")]
    pub x5t_s256: Option<String>,
}

pub fn generate_random_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn generate_jti() -> String {
    generate_random_token(24)
}

/// OIDC Core §3.1.3.6 `at_hash`/`c_hash`: left half of the SHA-256 of the
/// ASCII value, base64url encoded, truncated to the hash algorithm's bit
/// length halved — for HS256/RS256 that's the left 128 bits.
pub fn half_hash(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

pub struct AccessTokenRequest<'a> {
    pub issuer: &'a str,
    pub subject: &'a str,
    pub client_id: &'a str,
    pub scopes: &'a [String],
    pub ttl_seconds: i64,
    pub dpop_jkt: Option<String>,
    pub cert_thumbprint: Option<String>,
    pub sign_kid: Option<&'a str>,
}

pub struct MintedAccessToken {
    pub jwt: String,
    pub jti: String,
    pub expires_at: i64,
}

pub fn mint_access_token(keys: &KeyManager, request: AccessTokenRequest<'_>) -> OidcResult<MintedAccessToken> {
    let jti = generate_jti();
    let issued_at = now();
    let expires_at = issued_at + request.ttl_seconds;
    let cnf = match (&request.dpop_jkt, &request.cert_thumbprint) {
        (None, None) => None,
        (jkt, x5t) => Some(ConfirmationClaim { jkt: jkt.clone(), x5t_s256: x5t.clone() }),
    };
    let claims = AccessTokenClaims {
        iss: request.issuer.to_string(),
        sub: request.subject.to_string(),
        aud: request.client_id.to_string(),
        client_id: request.client_id.to_string(),
        scope: request.scopes.join(" "),
        jti: jti.clone(),
        exp: expires_at,
        iat: issued_at,
        nbf: issued_at,
        token_type: "access_token".to_string(),
        cnf,
    };
    let jwt = keys.sign_typed(&claims, request.sign_kid, Some("at+jwt"))?;
    Ok(MintedAccessToken { jwt, jti, expires_at })
}

pub struct IdTokenRequest<'a> {
    pub issuer: &'a str,
    pub subject: &'a str,
    pub client_id: &'a str,
    pub ttl_seconds: i64,
    pub auth_time: i64,
    pub nonce: Option<String>,
    pub acr: Option<String>,
    pub amr: Vec<String>,
    pub extra_claims: Map<String, Value>,
    pub access_token_for_hash: Option<&'a str>,
    pub code_for_hash: Option<&'a str>,
    pub sign_kid: Option<&'a str>,
}

pub fn mint_id_token(keys: &KeyManager, request: IdTokenRequest<'_>) -> OidcResult<String> {
    let issued_at = now();
    let claims = IdTokenClaims {
        iss: request.issuer.to_string(),
        sub: request.subject.to_string(),
        aud: request.client_id.to_string(),
        exp: issued_at + request.ttl_seconds,
        iat: issued_at,
        auth_time: request.auth_time,
        nonce: request.nonce,
        acr: request.acr,
        amr: request.amr,
        at_hash: request.access_token_for_hash.map(half_hash),
        c_hash: request.code_for_hash.map(half_hash),
        extra: request.extra_claims,
    };
    keys.sign(&claims, request.sign_kid)
        .map_err(|e| OidcError::Crypto(format!("failed to mint ID token: {e}")))
}

/// Wrap a signed JWT (an ID token, or a `/userinfo`/introspection response
/// issued as a nested JWT) in a JWE per the client's registered
/// `encrypted_response_alg`/`_enc` (spec §4.1 "outbound encryption"). Falls
/// through unchanged when the client never configured one, so callers can
/// apply this unconditionally to every response.
pub fn encrypt_for_client(
    jwt: &str,
    alg: Option<&str>,
    client_secret: Option<&str>,
    jwks: Option<&Value>,
) -> OidcResult<String> {
    let Some(alg) = alg else {
        return Ok(jwt.to_string());
    };
    let rsa_key = jwks.and_then(crate::crypto::rsa_public_key_from_jwks);
    let management =
        crate::crypto::JweKeyManagement::from_alg(alg, rsa_key.as_ref(), client_secret.map(str::as_bytes))
            .map_err(|e| OidcError::Crypto(e.to_string()))?;
    crate::crypto::encrypt_jwe(jwt.as_bytes(), management).map_err(|e| OidcError::Crypto(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::JwtKeyConfig;
    use jsonwebtoken::Algorithm;

    fn test_keys() -> KeyManager {
        let config = JwtKeyConfig::new_symmetric(b"test-signing-secret-at-least-32b", Algorithm::HS256).unwrap();
        KeyManager::from_single_key("default", config).unwrap()
    }

    #[test]
    fn half_hash_is_deterministic() {
        assert_eq!(half_hash("access-token-value"), half_hash("access-token-value"));
        assert_ne!(half_hash("access-token-value"), half_hash("other-value"));
    }

    #[test]
    fn mint_access_token_sets_cnf_for_dpop() {
        let keys = test_keys();
        let minted = mint_access_token(
            &keys,
            AccessTokenRequest {
                issuer: "https://issuer.example",
                subject: "usr-1",
                client_id: "client-1",
                scopes: &["openid".to_string()],
                ttl_seconds: 3600,
                dpop_jkt: Some("thumbprint-value".to_string()),
                cert_thumbprint: None,
                sign_kid: None,
            },
        )
        .unwrap();
        assert!(!minted.jwt.is_empty());
        assert!(minted.expires_at > now());
    }
}
