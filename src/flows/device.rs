// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Device authorization grant (RFC 8628, spec §4.9.6): an input-constrained
//! client (a TV, a CLI) obtains a `device_code`/`user_code` pair, shows the
//! user a verification URL, and polls `/token` until the user approves it
//! on a second device.

use rand::Rng;
use serde::Serialize;

use crate::claims::scope_claims;
use crate::error::{OidcError, OidcResult};
use crate::store::{now, DeviceAuthorization};
use crate::token_factory::{generate_random_token, mint_access_token, mint_id_token, AccessTokenRequest, IdTokenRequest};

use super::{GrantContext, TokenResponse};

#[derive(Debug, Serialize)]
pub struct DeviceAuthorizationResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: String,
    pub expires_in: i64,
    pub interval: i64,
}

/// RFC 8628 §3.2 user codes: short, unambiguous (no 0/O/1/I), easy to
/// read aloud or type.
const USER_CODE_ALPHABET: &[u8] = b"BCDFGHJKLMNPQRSTVWXZ23456789";

fn generate_user_code() -> String {
    let mut rng = rand::rng();
    let chars: String = (0..8).map(|_| USER_CODE_ALPHABET[rng.random_range(0..USER_CODE_ALPHABET.len())] as char).collect();
    format!("{}-{}", &chars[..4], &chars[4..])
}

pub async fn start_device_authorization(
    ctx: &GrantContext<'_>,
    client_id: &str,
    requested_scopes: &[String],
) -> OidcResult<DeviceAuthorizationResponse> {
    if !ctx.config.grants.device_code {
        return Err(OidcError::protocol(
            crate::error::ProtocolErrorCode::UnauthorizedClient,
            "the device_code grant is disabled on this server",
        ));
    }
    ctx.host
        .get_client(client_id)
        .await
        .ok_or_else(|| OidcError::invalid_client("unknown client"))?;

    let device_code = generate_random_token(32);
    let user_code = generate_user_code();
    let ttl = ctx.config.lifetimes.device_code_seconds;
    let verification_uri = ctx.config.endpoint("device");

    ctx.store
        .put_device_authorization(DeviceAuthorization {
            device_code: device_code.clone(),
            user_code: user_code.clone(),
            client_id: client_id.to_string(),
            scopes: requested_scopes.to_vec(),
            verification_uri: verification_uri.clone(),
            expires_at: now() + ttl,
            interval: 5,
            subject: None,
            approved: false,
            denied: false,
            last_poll_at: None,
        })
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?;

    Ok(DeviceAuthorizationResponse {
        device_code,
        verification_uri_complete: format!("{verification_uri}?user_code={user_code}"),
        user_code,
        expires_in: ttl,
        interval: 5,
    })
}

/// The host's user-facing approval/denial action, called from the
/// `/device` verification page after the user authenticates (spec §4.10
/// consent territory, reused here for the device flow's own grant).
pub async fn resolve_user_code(ctx: &GrantContext<'_>, user_code: &str, subject: &str, approve: bool) -> OidcResult<()> {
    let mut authz = ctx
        .store
        .get_device_authorization_by_user_code(user_code)
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?
        .ok_or_else(|| OidcError::invalid_request("unknown or expired user code"))?;

    if authz.expires_at < now() {
        return Err(OidcError::protocol(crate::error::ProtocolErrorCode::ExpiredToken, "device code has expired"));
    }

    authz.subject = Some(subject.to_string());
    authz.approved = approve;
    authz.denied = !approve;
    ctx.store.update_device_authorization(authz).await.map_err(|e| OidcError::Persistence(e.to_string()))
}

/// Poll `/token` with `grant_type=urn:ietf:params:oauth:grant-type:device_code`
/// (RFC 8628 §3.4/§3.5).
pub async fn poll_device_token(ctx: &GrantContext<'_>, client_id: &str, device_code: &str) -> OidcResult<TokenResponse> {
    let mut authz = ctx
        .store
        .get_device_authorization_by_device_code(device_code)
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?
        .ok_or_else(|| OidcError::invalid_grant("device_code is unknown"))?;

    if authz.client_id != client_id {
        return Err(OidcError::invalid_grant("device_code was not issued to this client"));
    }
    if authz.expires_at < now() {
        return Err(OidcError::protocol(crate::error::ProtocolErrorCode::ExpiredToken, "device_code has expired"));
    }
    if authz.denied {
        return Err(OidcError::protocol(crate::error::ProtocolErrorCode::AccessDenied, "the user denied this device"));
    }

    if let Some(last_poll) = authz.last_poll_at {
        if now() - last_poll < authz.interval {
            return Err(OidcError::protocol(crate::error::ProtocolErrorCode::SlowDown, "polling too frequently"));
        }
    }
    authz.last_poll_at = Some(now());

    if !authz.approved {
        ctx.store
            .update_device_authorization(authz)
            .await
            .map_err(|e| OidcError::Persistence(e.to_string()))?;
        return Err(OidcError::protocol(
            crate::error::ProtocolErrorCode::AuthorizationPending,
            "the user has not yet approved this device",
        ));
    }

    let subject = authz.subject.clone().ok_or_else(|| OidcError::Server("approved device authorization missing a subject".into()))?;
    let client = ctx
        .host
        .get_client(client_id)
        .await
        .ok_or_else(|| OidcError::invalid_client("unknown client"))?;

    let access_ttl = ctx.config.lifetimes.access_token_seconds;
    let minted = mint_access_token(
        ctx.keys,
        AccessTokenRequest {
            issuer: &ctx.config.issuer,
            subject: &subject,
            client_id,
            scopes: &authz.scopes,
            ttl_seconds: access_ttl,
            dpop_jkt: None,
            cert_thumbprint: None,
            sign_kid: client.sign_kid.as_deref(),
        },
    )?;
    ctx.store
        .put_access_token(crate::store::AccessTokenRecord {
            jti: minted.jti,
            client_id: client_id.to_string(),
            subject: Some(subject.clone()),
            scopes: authz.scopes.clone(),
            issued_at: now(),
            expires_at: minted.expires_at,
            revoked: false,
            dpop_jkt: None,
            cert_thumbprint: None,
            resource: vec![],
        })
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?;

    let id_token = if authz.scopes.iter().any(|s| s == "openid") {
        let user = ctx.host.get_user(&subject).await;
        let extra = user.map(|u| scope_claims(&authz.scopes, &u)).unwrap_or_default();
        Some(mint_id_token(
            ctx.keys,
            IdTokenRequest {
                issuer: &ctx.config.issuer,
                subject: &subject,
                client_id,
                ttl_seconds: ctx.config.lifetimes.id_token_seconds,
                auth_time: now(),
                nonce: None,
                acr: None,
                amr: vec!["pwd".to_string()],
                extra_claims: extra,
                access_token_for_hash: Some(&minted.jwt),
                code_for_hash: None,
                sign_kid: client.sign_kid.as_deref(),
            },
        )?)
    } else {
        None
    };

    // One-shot grant: consume the device authorization so a second poll
    // after success reports it unknown rather than minting again.
    authz.approved = false;
    authz.denied = true;
    ctx.store
        .update_device_authorization(authz.clone())
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?;

    Ok(TokenResponse {
        access_token: minted.jwt,
        token_type: "Bearer".to_string(),
        expires_in: access_ttl,
        refresh_token: None,
        id_token,
        scope: authz.scopes.join(" "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OidcPluginConfig;
    use crate::crypto::{JwtKeyConfig, KeyManager};
    use crate::host::memory::MemoryHost;
    use crate::store::memory::MemoryStore;
    use jsonwebtoken::Algorithm;

    fn test_keys() -> KeyManager {
        let config = JwtKeyConfig::new_symmetric(b"test-signing-secret-at-least-32b", Algorithm::HS256).unwrap();
        KeyManager::from_single_key("default", config).unwrap()
    }

    #[tokio::test]
    async fn poll_before_approval_is_pending() {
        let config = OidcPluginConfig::default();
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };
        let client_id = config.clients[0].client_id.clone();

        let started = start_device_authorization(&ctx, &client_id, &["openid".to_string()]).await.unwrap();
        let poll = poll_device_token(&ctx, &client_id, &started.device_code).await;
        assert!(poll.is_err());
    }

    #[tokio::test]
    async fn approval_then_poll_mints_tokens() {
        let config = OidcPluginConfig::default();
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };
        let client_id = config.clients[0].client_id.clone();

        let started = start_device_authorization(&ctx, &client_id, &["openid".to_string()]).await.unwrap();
        resolve_user_code(&ctx, &started.user_code, "usr-admin", true).await.unwrap();

        let response = poll_device_token(&ctx, &client_id, &started.device_code).await.unwrap();
        assert!(!response.access_token.is_empty());

        let second_poll = poll_device_token(&ctx, &client_id, &started.device_code).await;
        assert!(second_poll.is_err());
    }

    #[tokio::test]
    async fn denial_is_reported_as_access_denied() {
        let config = OidcPluginConfig::default();
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };
        let client_id = config.clients[0].client_id.clone();

        let started = start_device_authorization(&ctx, &client_id, &["openid".to_string()]).await.unwrap();
        resolve_user_code(&ctx, &started.user_code, "usr-admin", false).await.unwrap();

        let poll = poll_device_token(&ctx, &client_id, &started.device_code).await;
        assert!(poll.is_err());
    }
}
