// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Client authentication (spec C8): the six methods RFC 6749/7523/8705
//! define — `none`, `client_secret_basic`, `client_secret_post`,
//! `client_secret_jwt`, `private_key_jwt`, `tls_client_auth`.

use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::{OidcError, OidcResult};
use crate::host::Host;
use crate::store::{now, TokenStore};

#[derive(Debug, Clone)]
pub enum PresentedCredential {
    None,
    Basic { client_id: String, client_secret: String },
    Post { client_id: String, client_secret: String },
    ClientAssertion { client_id: String, assertion: String, assertion_type: String },
    MutualTls { client_id: String, cert_subject_dn: String },
}

#[derive(Debug, Deserialize)]
struct AssertionClaims {
    iss: String,
    sub: String,
    aud: String,
    jti: String,
    exp: i64,
}

/// Authenticate the client for a given method, consulting the client's
/// registered `token_endpoint_auth_method`.
pub async fn authenticate_client(
    client: &ClientConfig,
    credential: &PresentedCredential,
    issuer: &str,
    token_endpoint: &str,
    store: &dyn TokenStore,
    host: &dyn Host,
) -> OidcResult<()> {
    match (client.token_endpoint_auth_method.as_str(), credential) {
        ("none", PresentedCredential::None) => Ok(()),
        ("client_secret_basic", PresentedCredential::Basic { client_id, client_secret })
        | ("client_secret_post", PresentedCredential::Post { client_id, client_secret }) => {
            check_shared_secret(host, client, client_id, client_secret).await
        }
        ("client_secret_jwt", PresentedCredential::ClientAssertion { client_id, assertion, .. }) => {
            verify_client_assertion_jwt(client, client_id, assertion, issuer, token_endpoint, store, true).await
        }
        ("private_key_jwt", PresentedCredential::ClientAssertion { client_id, assertion, .. }) => {
            verify_client_assertion_jwt(client, client_id, assertion, issuer, token_endpoint, store, false).await
        }
        ("tls_client_auth", PresentedCredential::MutualTls { client_id, cert_subject_dn }) => {
            if client_id != &client.client_id {
                return Err(OidcError::invalid_client("client_id mismatch"));
            }
            match &client.tls_client_auth_subject_dn {
                Some(expected) if expected == cert_subject_dn => Ok(()),
                _ => Err(OidcError::invalid_client("mTLS certificate subject DN mismatch")),
            }
        }
        _ => Err(OidcError::invalid_client(
            "client authentication method does not match the client's registration",
        )),
    }
}

/// Compares the presented secret against the host's record, never the
/// config-level plaintext directly (spec §3 "secrets are stored only as
/// salted hashes"); `host.check_client_valid` is where the hash comparison
/// actually happens (`Host::verify_hash`).
async fn check_shared_secret(host: &dyn Host, client: &ClientConfig, client_id: &str, client_secret: &str) -> OidcResult<()> {
    if client_id != client.client_id {
        return Err(OidcError::invalid_client("client_id mismatch"));
    }
    if host.check_client_valid(client_id, Some(client_secret)).await {
        Ok(())
    } else {
        Err(OidcError::invalid_client("invalid client secret"))
    }
}

/// `client_secret_jwt` (HMAC over the shared secret) or `private_key_jwt`
/// (signed with the client's own registered key), both RFC 7523 JWT
/// client assertions with `aud` pinned to the token endpoint and a
/// single-use `jti` enforced via `store::TokenStore`.
async fn verify_client_assertion_jwt(
    client: &ClientConfig,
    client_id: &str,
    assertion: &str,
    _issuer: &str,
    token_endpoint: &str,
    store: &dyn TokenStore,
    symmetric: bool,
) -> OidcResult<()> {
    if client_id != client.client_id {
        return Err(OidcError::invalid_client("client_id mismatch"));
    }

    let header = jsonwebtoken::decode_header(assertion)
        .map_err(|e| OidcError::invalid_client(format!("malformed client assertion: {e}")))?;

    let decoding_key = if symmetric {
        let secret = client
            .client_secret
            .as_ref()
            .ok_or_else(|| OidcError::invalid_client("client has no shared secret configured"))?;
        DecodingKey::from_secret(secret.as_bytes())
    } else {
        decoding_key_from_client_jwks(client, header.kid.as_deref())?
    };

    let mut validation = Validation::new(header.alg);
    validation.set_audience(&[token_endpoint]);
    validation.set_required_spec_claims(&["iss", "sub", "aud", "exp", "jti"]);

    let decoded = jsonwebtoken::decode::<AssertionClaims>(assertion, &decoding_key, &validation)
        .map_err(|e| OidcError::invalid_client(format!("client assertion verification failed: {e}")))?;

    if decoded.claims.iss != client.client_id || decoded.claims.sub != client.client_id {
        return Err(OidcError::invalid_client("client assertion iss/sub must equal client_id"));
    }

    let fresh = store
        .record_client_assertion_jti(crate::store::ClientAssertionJti {
            jti: decoded.claims.jti,
            client_id: client.client_id.clone(),
            seen_at: now(),
        })
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?;
    if !fresh {
        return Err(OidcError::invalid_grant("client assertion jti has already been used"));
    }

    Ok(())
}

fn decoding_key_from_client_jwks(client: &ClientConfig, kid: Option<&str>) -> OidcResult<DecodingKey> {
    let jwks = client
        .jwks
        .as_ref()
        .ok_or_else(|| OidcError::invalid_client("client has no JWKS registered for private_key_jwt"))?;
    let keys = jwks
        .get("keys")
        .and_then(|k| k.as_array())
        .ok_or_else(|| OidcError::invalid_client("client JWKS is malformed"))?;

    let key = keys
        .iter()
        .find(|k| kid.is_none() || k.get("kid").and_then(|v| v.as_str()) == kid)
        .ok_or_else(|| OidcError::invalid_client("no matching key in client JWKS"))?;

    let n = key.get("n").and_then(|v| v.as_str()).ok_or_else(|| OidcError::invalid_client("JWK missing n"))?;
    let e = key.get("e").and_then(|v| v.as_str()).ok_or_else(|| OidcError::invalid_client("JWK missing e"))?;
    DecodingKey::from_rsa_components(n, e).map_err(|e| OidcError::Crypto(e.to_string()))
}

/// Decode an HTTP `Authorization: Basic` header into a client_id/secret
/// pair (RFC 6749 §2.3.1).
pub fn parse_basic_auth_header(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (id, secret) = text.split_once(':')?;
    Some((
        urlencoding_decode(id),
        urlencoding_decode(secret),
    ))
}

fn urlencoding_decode(value: &str) -> String {
    value.replace("%3A", ":").replace("%40", "@")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header_roundtrips() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"client-1:s3cr3t");
        let header = format!("Basic {encoded}");
        let (id, secret) = parse_basic_auth_header(&header).unwrap();
        assert_eq!(id, "client-1");
        assert_eq!(secret, "s3cr3t");
    }

    #[tokio::test]
    async fn shared_secret_mismatch_is_rejected() {
        use crate::config::OidcPluginConfig;
        use crate::host::memory::MemoryHost;

        let config = OidcPluginConfig::default();
        let client = config.clients[0].clone();
        let host = MemoryHost::new(&config);
        let result = check_shared_secret(&host, &client, &client.client_id, "wrong").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn shared_secret_match_is_accepted() {
        use crate::config::OidcPluginConfig;
        use crate::host::memory::MemoryHost;

        let config = OidcPluginConfig::default();
        let client = config.clients[0].clone();
        let secret = client.client_secret.clone().unwrap();
        let host = MemoryHost::new(&config);
        let result = check_shared_secret(&host, &client, &client.client_id, &secret).await;
        assert!(result.is_ok());
    }
}
