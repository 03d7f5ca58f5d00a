// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Implicit and hybrid response types (spec §4.9.2): tokens minted
//! directly at `/authorize` and returned in the redirect fragment instead
//! of via `/token`. Disabled by default (`grants.implicit`) — OAuth 2.1
//! deprecates this flow, but Glewlwyd-class servers still carry it for
//! legacy clients.

use serde::Serialize;

use crate::claims::scope_claims;
use crate::config::UserRecord;
use crate::error::{OidcError, OidcResult};
use crate::request::ValidatedRequest;
use crate::store::now;
use crate::subject::{resolve_subject, SubjectType};
use crate::token_factory::{mint_access_token, mint_id_token, AccessTokenRequest, IdTokenRequest};

use super::GrantContext;

/// Fragment parameters for `id_token`, `token`, or `code id_token`
/// response types (spec §4.9.2).
#[derive(Debug, Serialize)]
pub struct ImplicitResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

pub async fn issue_implicit_response(
    ctx: &GrantContext<'_>,
    request: &ValidatedRequest,
    subject: &str,
    auth_time: i64,
) -> OidcResult<ImplicitResult> {
    if !ctx.config.grants.implicit {
        return Err(OidcError::protocol(
            crate::error::ProtocolErrorCode::UnsupportedResponseType,
            "the implicit grant is disabled on this server",
        ));
    }

    let client = ctx
        .host
        .get_client(&request.client_id)
        .await
        .ok_or_else(|| OidcError::invalid_client("unknown client"))?;
    let subject_type = if client.subject_type == "pairwise" { SubjectType::Pairwise } else { SubjectType::Public };
    let sub = resolve_subject(ctx.store, subject_type, subject, &request.client_id)
        .await
        .map_err(|e| OidcError::Server(e.to_string()))?;

    let wants_token = request.response_type.iter().any(|t| t == "token");
    let wants_id_token = request.response_type.iter().any(|t| t == "id_token");

    let mut access_token = None;
    let mut token_type = None;
    let mut expires_in = None;

    if wants_token {
        let minted = mint_access_token(
            ctx.keys,
            AccessTokenRequest {
                issuer: &ctx.config.issuer,
                subject: &sub,
                client_id: &request.client_id,
                scopes: &request.scopes,
                ttl_seconds: ctx.config.lifetimes.access_token_seconds,
                dpop_jkt: None,
                cert_thumbprint: None,
                sign_kid: client.sign_kid.as_deref(),
            },
        )?;
        ctx.store
            .put_access_token(crate::store::AccessTokenRecord {
                jti: minted.jti,
                client_id: request.client_id.clone(),
                subject: Some(sub.clone()),
                scopes: request.scopes.clone(),
                issued_at: now(),
                expires_at: minted.expires_at,
                revoked: false,
                dpop_jkt: None,
                cert_thumbprint: None,
                resource: request.resource.clone(),
            })
            .await
            .map_err(|e| OidcError::Persistence(e.to_string()))?;
        access_token = Some(minted.jwt);
        token_type = Some("Bearer".to_string());
        expires_in = Some(ctx.config.lifetimes.access_token_seconds);
    }

    let id_token = if wants_id_token {
        let user: Option<UserRecord> = ctx.host.get_user(subject).await;
        let extra = user.as_ref().map(|u| scope_claims(&request.scopes, u)).unwrap_or_default();
        Some(mint_id_token(
            ctx.keys,
            IdTokenRequest {
                issuer: &ctx.config.issuer,
                subject: &sub,
                client_id: &request.client_id,
                ttl_seconds: ctx.config.lifetimes.id_token_seconds,
                auth_time,
                nonce: request.nonce.clone(),
                acr: request.acr_values.first().cloned(),
                amr: vec!["pwd".to_string()],
                extra_claims: extra,
                access_token_for_hash: access_token.as_deref(),
                code_for_hash: None,
                sign_kid: client.sign_kid.as_deref(),
            },
        )?)
    } else {
        None
    };

    Ok(ImplicitResult { access_token, token_type, expires_in, id_token, state: request.state.clone() })
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

    fn sample_request(client_id: &str, response_type: &str) -> ValidatedRequest {
        ValidatedRequest {
            response_type: response_type.split_whitespace().map(String::from).collect(),
            client_id: client_id.to_string(),
            redirect_uri: "http://localhost:8080/client/callback".to_string(),
            scopes: vec!["openid".to_string()],
            state: Some("xyz".to_string()),
            nonce: Some("nonce-1".to_string()),
            code_challenge: None,
            code_challenge_method: None,
            resource: vec![],
            prompt: vec![],
            max_age: None,
            acr_values: vec![],
            authorization_details: None,
        }
    }

    #[tokio::test]
    async fn disabled_implicit_grant_is_rejected() {
        let config = OidcPluginConfig::default();
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };

        let client_id = config.clients[0].client_id.clone();
        let result = issue_implicit_response(&ctx, &sample_request(&client_id, "token"), "usr-admin", now()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn enabled_implicit_grant_mints_id_token_and_access_token() {
        let mut config = OidcPluginConfig::default();
        config.grants.implicit = true;
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };

        let client_id = config.clients[0].client_id.clone();
        let result = issue_implicit_response(&ctx, &sample_request(&client_id, "id_token token"), "usr-admin", now())
            .await
            .unwrap();
        assert!(result.access_token.is_some());
        assert!(result.id_token.is_some());
        assert_eq!(result.state.as_deref(), Some("xyz"));
    }
}
