// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Client credentials grant (spec §4.9.4, RFC 6749 §4.4): a confidential
//! client acting on its own behalf, with no end-user and no `sub` other
//! than the client itself.

use crate::error::{OidcError, OidcResult};
use crate::store::now;
use crate::token_factory::{mint_access_token, AccessTokenRequest};

use super::{GrantContext, TokenResponse};

pub async fn exchange_client_credentials(
    ctx: &GrantContext<'_>,
    client_id: &str,
    requested_scopes: &[String],
) -> OidcResult<TokenResponse> {
    if !ctx.config.grants.client_credentials {
        return Err(OidcError::protocol(
            crate::error::ProtocolErrorCode::UnauthorizedClient,
            "the client_credentials grant is disabled on this server",
        ));
    }

    let client = ctx
        .host
        .get_client(client_id)
        .await
        .ok_or_else(|| OidcError::invalid_client("unknown client"))?;
    if !client.is_confidential {
        return Err(OidcError::invalid_client("public clients may not use client_credentials"));
    }

    let allowed: Vec<&str> = client.default_scope.split_whitespace().collect();
    let scopes: Vec<String> = if requested_scopes.is_empty() {
        allowed.iter().map(|s| s.to_string()).collect()
    } else {
        requested_scopes.iter().filter(|s| allowed.contains(&s.as_str())).cloned().collect()
    };

    let ttl = ctx.config.lifetimes.access_token_seconds;
    let minted = mint_access_token(
        ctx.keys,
        AccessTokenRequest {
            issuer: &ctx.config.issuer,
            subject: client_id,
            client_id,
            scopes: &scopes,
            ttl_seconds: ttl,
            dpop_jkt: None,
            cert_thumbprint: None,
            sign_kid: client.sign_kid.as_deref(),
        },
    )?;

    ctx.store
        .put_access_token(crate::store::AccessTokenRecord {
            jti: minted.jti,
            client_id: client_id.to_string(),
            subject: None,
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

    Ok(TokenResponse {
        access_token: minted.jwt,
        token_type: "Bearer".to_string(),
        expires_in: ttl,
        refresh_token: None,
        id_token: None,
        scope: scopes.join(" "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, OidcPluginConfig};
    use crate::crypto::{JwtKeyConfig, KeyManager};
    use crate::host::memory::MemoryHost;
    use crate::store::memory::MemoryStore;
    use jsonwebtoken::Algorithm;

    fn test_keys() -> KeyManager {
        let config = JwtKeyConfig::new_symmetric(b"test-signing-secret-at-least-32b", Algorithm::HS256).unwrap();
        KeyManager::from_single_key("default", config).unwrap()
    }

    #[tokio::test]
    async fn confidential_client_receives_its_own_scoped_token() {
        let config = OidcPluginConfig::default();
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };
        let client_id = config.clients[0].client_id.clone();

        let response = exchange_client_credentials(&ctx, &client_id, &[]).await.unwrap();
        assert!(!response.access_token.is_empty());
    }

    #[tokio::test]
    async fn public_client_is_rejected() {
        let mut config = OidcPluginConfig::default();
        config.clients.push(ClientConfig { client_id: "public-client".to_string(), is_confidential: false, client_secret: None, ..ClientConfig::default() });
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };

        let result = exchange_client_credentials(&ctx, "public-client", &[]).await;
        assert!(result.is_err());
    }
}
