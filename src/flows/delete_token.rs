// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! `delete_token` grant: a non-standard `/token` grant type
//! (`urn:params:oauth:grant-type:delete_token`) some Glewlwyd-class
//! deployments expose so a client can revoke one of its own tokens
//! through the same endpoint and credentials it uses to mint them,
//! without standing up RFC 7009's separate `/revoke` endpoint. Disabled
//! by default; where it's enabled, it behaves exactly like
//! `introspect::revoke_token` scoped to the calling client.

use crate::error::{OidcError, OidcResult};
use crate::introspect::revoke_token;

use super::GrantContext;

pub async fn delete_token(ctx: &GrantContext<'_>, client_id: &str, token: &str) -> OidcResult<()> {
    if !ctx.config.grants.delete_token {
        return Err(OidcError::protocol(
            crate::error::ProtocolErrorCode::UnauthorizedClient,
            "the delete_token grant is disabled on this server",
        ));
    }
    revoke_token(ctx.store, token, client_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OidcPluginConfig;
    use crate::crypto::{JwtKeyConfig, KeyManager};
    use crate::host::memory::MemoryHost;
    use crate::store::{memory::MemoryStore, now, AccessTokenRecord};
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

        let result = delete_token(&ctx, &client_id, "whatever").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn enabled_grant_revokes_the_callers_own_access_token() {
        let mut config = OidcPluginConfig::default();
        config.grants.delete_token = true;
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let client_id = config.clients[0].client_id.clone();

        store
            .put_access_token(AccessTokenRecord {
                jti: "jti-1".to_string(),
                client_id: client_id.clone(),
                subject: Some("usr-admin".to_string()),
                scopes: vec!["openid".to_string()],
                issued_at: now(),
                expires_at: now() + 3600,
                revoked: false,
                dpop_jkt: None,
                cert_thumbprint: None,
                resource: vec![],
            })
            .await
            .unwrap();

        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };
        delete_token(&ctx, &client_id, "jti-1").await.unwrap();

        let record = store.get_access_token("jti-1").await.unwrap().unwrap();
        assert!(record.revoked);
    }
}
