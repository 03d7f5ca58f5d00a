// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Refresh token grant (spec §4.9.5, RFC 6749 §6): one-use rotation —
//! each redemption revokes the presented token and issues a fresh one,
//! so reuse of an already-rotated token is detectable.

use crate::claims::scope_claims;
use crate::error::{OidcError, OidcResult};
use crate::store::{now, RefreshToken};
use crate::token_factory::{generate_random_token, mint_access_token, mint_id_token, AccessTokenRequest, IdTokenRequest};

use super::{GrantContext, TokenResponse};

pub async fn exchange_refresh_token(
    ctx: &GrantContext<'_>,
    client_id: &str,
    refresh_token: &str,
    requested_scopes: Option<&[String]>,
) -> OidcResult<TokenResponse> {
    if !ctx.config.grants.refresh_token {
        return Err(OidcError::protocol(
            crate::error::ProtocolErrorCode::UnauthorizedClient,
            "the refresh_token grant is disabled on this server",
        ));
    }

    let record = ctx
        .store
        .get_refresh_token(refresh_token)
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?
        .ok_or_else(|| OidcError::invalid_grant("refresh token is unknown"))?;

    if record.revoked {
        // Reuse of an already-rotated or revoked token: the lineage is
        // compromised, so the whole chain goes with it.
        if let Some(origin) = &record.origin_code {
            ctx.store
                .revoke_descendants_of_code(origin)
                .await
                .map_err(|e| OidcError::Persistence(e.to_string()))?;
        }
        return Err(OidcError::invalid_grant("refresh token has already been used or was revoked"));
    }
    if record.client_id != client_id {
        return Err(OidcError::invalid_grant("refresh token was not issued to this client"));
    }
    if record.expires_at < now() {
        return Err(OidcError::invalid_grant("refresh token has expired"));
    }

    let scopes = match requested_scopes {
        Some(requested) if !requested.is_empty() => {
            let narrowed: Vec<String> = requested.iter().filter(|s| record.scopes.contains(s)).cloned().collect();
            if narrowed.is_empty() {
                return Err(OidcError::invalid_scope("requested scope exceeds the original grant"));
            }
            narrowed
        }
        _ => record.scopes.clone(),
    };

    let client = ctx
        .host
        .get_client(client_id)
        .await
        .ok_or_else(|| OidcError::invalid_client("unknown client"))?;

    ctx.store.revoke_refresh_token(refresh_token).await.map_err(|e| OidcError::Persistence(e.to_string()))?;

    let access_ttl = ctx.config.lifetimes.access_token_seconds;
    let minted = mint_access_token(
        ctx.keys,
        AccessTokenRequest {
            issuer: &ctx.config.issuer,
            subject: &record.subject,
            client_id,
            scopes: &scopes,
            ttl_seconds: access_ttl,
            dpop_jkt: record.dpop_jkt.clone(),
            cert_thumbprint: None,
            sign_kid: client.sign_kid.as_deref(),
        },
    )?;
    ctx.store
        .put_access_token(crate::store::AccessTokenRecord {
            jti: minted.jti,
            client_id: client_id.to_string(),
            subject: Some(record.subject.clone()),
            scopes: scopes.clone(),
            issued_at: now(),
            expires_at: minted.expires_at,
            revoked: false,
            dpop_jkt: record.dpop_jkt.clone(),
            cert_thumbprint: None,
            resource: record.resource.clone(),
        })
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?;

    let new_refresh_token = generate_random_token(32);
    ctx.store
        .put_refresh_token(RefreshToken {
            token: new_refresh_token.clone(),
            client_id: client_id.to_string(),
            subject: record.subject.clone(),
            scopes: scopes.clone(),
            issued_at: now(),
            expires_at: now() + ctx.config.lifetimes.refresh_token_seconds,
            revoked: false,
            origin_code: record.origin_code.clone(),
            dpop_jkt: record.dpop_jkt.clone(),
            resource: record.resource.clone(),
        })
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?;

    let id_token = if scopes.iter().any(|s| s == "openid") {
        let user = ctx.host.get_user(&record.subject).await;
        let extra = user.map(|u| scope_claims(&scopes, &u)).unwrap_or_default();
        Some(mint_id_token(
            ctx.keys,
            IdTokenRequest {
                issuer: &ctx.config.issuer,
                subject: &record.subject,
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

    Ok(TokenResponse {
        access_token: minted.jwt,
        token_type: "Bearer".to_string(),
        expires_in: access_ttl,
        refresh_token: Some(new_refresh_token),
        id_token,
        scope: scopes.join(" "),
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

    async fn seed_refresh_token(store: &MemoryStore, client_id: &str) -> String {
        let token = generate_random_token(32);
        store
            .put_refresh_token(RefreshToken {
                token: token.clone(),
                client_id: client_id.to_string(),
                subject: "usr-admin".to_string(),
                scopes: vec!["openid".to_string(), "profile".to_string()],
                issued_at: now(),
                expires_at: now() + 1000,
                revoked: false,
                origin_code: Some("original-code".to_string()),
                dpop_jkt: None,
                resource: vec![],
            })
            .await
            .unwrap();
        token
    }

    #[tokio::test]
    async fn rotation_issues_a_new_token_and_revokes_the_old() {
        let config = OidcPluginConfig::default();
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let client_id = config.clients[0].client_id.clone();
        let original = seed_refresh_token(&store, &client_id).await;
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };

        let response = exchange_refresh_token(&ctx, &client_id, &original, None).await.unwrap();
        assert!(response.refresh_token.is_some());
        assert_ne!(response.refresh_token.as_deref(), Some(original.as_str()));

        let reuse = exchange_refresh_token(&ctx, &client_id, &original, None).await;
        assert!(reuse.is_err());
    }

    #[tokio::test]
    async fn narrowed_scope_request_is_honored() {
        let config = OidcPluginConfig::default();
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let client_id = config.clients[0].client_id.clone();
        let original = seed_refresh_token(&store, &client_id).await;
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };

        let response = exchange_refresh_token(&ctx, &client_id, &original, Some(&["openid".to_string()])).await.unwrap();
        assert_eq!(response.scope, "openid");
    }
}
