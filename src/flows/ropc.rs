// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Resource owner password credentials grant (spec §4.9.3, RFC 6749
//! §4.3). Disabled by default — OAuth 2.1 drops it — but kept for
//! first-party legacy clients that still need it.

use crate::claims::scope_claims;
use crate::error::{OidcError, OidcResult};
use crate::store::now;
use crate::token_factory::{mint_access_token, mint_id_token, AccessTokenRequest, IdTokenRequest};

use super::{GrantContext, TokenResponse};

pub async fn exchange_password_credentials(
    ctx: &GrantContext<'_>,
    client_id: &str,
    username: &str,
    password: &str,
    requested_scopes: &[String],
) -> OidcResult<TokenResponse> {
    if !ctx.config.grants.resource_owner_password_credentials {
        return Err(OidcError::protocol(
            crate::error::ProtocolErrorCode::UnauthorizedClient,
            "the password grant is disabled on this server",
        ));
    }

    let client = ctx
        .host
        .get_client(client_id)
        .await
        .ok_or_else(|| OidcError::invalid_client("unknown client"))?;

    let user = ctx
        .host
        .check_user_valid(username, password)
        .await
        .ok_or_else(|| OidcError::invalid_grant("invalid username or password"))?;

    let scopes: Vec<String> = requested_scopes
        .iter()
        .filter(|s| user.granted_scopes.iter().any(|g| g == *s) || client.default_scope.split_whitespace().any(|d| d == s.as_str()))
        .cloned()
        .collect();

    let access_ttl = ctx.config.lifetimes.access_token_seconds;
    let minted = mint_access_token(
        ctx.keys,
        AccessTokenRequest {
            issuer: &ctx.config.issuer,
            subject: &user.subject,
            client_id,
            scopes: &scopes,
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
            subject: Some(user.subject.clone()),
            scopes: scopes.clone(),
            issued_at: now(),
            expires_at: minted.expires_at,
            revoked: false,
            dpop_jkt: None,
            cert_thumbprint: None,
            resource: vec![],
        })
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?;

    let id_token = if scopes.iter().any(|s| s == "openid") {
        let extra = scope_claims(&scopes, &user);
        Some(mint_id_token(
            ctx.keys,
            IdTokenRequest {
                issuer: &ctx.config.issuer,
                subject: &user.subject,
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
        refresh_token: None,
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

    #[tokio::test]
    async fn disabled_by_default() {
        let config = OidcPluginConfig::default();
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };
        let client_id = config.clients[0].client_id.clone();

        let result = exchange_password_credentials(&ctx, &client_id, "admin", "admin123", &["openid".to_string()]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn valid_credentials_mint_tokens_when_enabled() {
        let mut config = OidcPluginConfig::default();
        config.grants.resource_owner_password_credentials = true;
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };
        let client_id = config.clients[0].client_id.clone();

        let response = exchange_password_credentials(&ctx, &client_id, "admin", "admin123", &["openid".to_string(), "profile".to_string()])
            .await
            .unwrap();
        assert!(!response.access_token.is_empty());
        assert!(response.id_token.is_some());
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let mut config = OidcPluginConfig::default();
        config.grants.resource_owner_password_credentials = true;
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };
        let client_id = config.clients[0].client_id.clone();

        let result = exchange_password_credentials(&ctx, &client_id, "admin", "wrong-password", &["openid".to_string()]).await;
        assert!(result.is_err());
    }
}
