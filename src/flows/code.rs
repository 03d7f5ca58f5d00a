// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Authorization code grant (spec §4.9.1), the primary flow: `/authorize`
//! mints a short-lived code, `/token` redeems it exactly once for an
//! access token, optional refresh token, and (for `openid` scope) an ID
//! token.

use crate::claims::{merge_requested_claims, scope_claims};
use crate::config::UserRecord;
use crate::error::{OidcError, OidcResult};
use crate::request::{verify_pkce, ValidatedRequest};
use crate::store::{now, AuthorizationCode, RefreshToken, TokenStore};
use crate::subject::{resolve_subject, SubjectType};
use crate::token_factory::{
    generate_random_token, mint_access_token, mint_id_token, AccessTokenRequest, IdTokenRequest,
};

use super::{GrantContext, TokenResponse};

pub struct IssuedCode {
    pub code: String,
    pub expires_in: i64,
}

/// Mint and store an authorization code after `/authorize` has resolved
/// consent (spec §4.7/§4.10 upstream of this call).
pub async fn issue_authorization_code(
    ctx: &GrantContext<'_>,
    request: &ValidatedRequest,
    subject: &str,
    auth_time: i64,
    amr: Vec<String>,
    dpop_jkt: Option<String>,
) -> OidcResult<IssuedCode> {
    let ttl = ctx.config.lifetimes.authorization_code_seconds;
    let code = generate_random_token(24);

    ctx.store
        .put_authorization_code(AuthorizationCode {
            code: code.clone(),
            client_id: request.client_id.clone(),
            subject: subject.to_string(),
            redirect_uri: request.redirect_uri.clone(),
            scopes: request.scopes.clone(),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: request.code_challenge_method.clone(),
            nonce: request.nonce.clone(),
            acr: request.acr_values.first().cloned(),
            amr,
            auth_time,
            expires_at: now() + ttl,
            consumed: false,
            resource: request.resource.clone(),
            authorization_details: request.authorization_details.clone(),
            dpop_jkt,
            gpoctr_cient_id: None,
        })
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?;

    Ok(IssuedCode { code, expires_in: ttl })
}

/// Redeem an authorization code at `/token` (spec §4.9.1, §7 replay
/// handling): PKCE verification, single-use enforcement, and — on replay
/// of an already-consumed code — cascading revocation of every refresh
/// token descended from it.
pub async fn exchange_authorization_code(
    ctx: &GrantContext<'_>,
    code: &str,
    redirect_uri: &str,
    client_id: &str,
    code_verifier: Option<&str>,
    proof_jkt: Option<String>,
) -> OidcResult<TokenResponse> {
    let record = ctx
        .store
        .take_authorization_code(code)
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?
        .ok_or_else(|| OidcError::invalid_grant("authorization code is unknown or expired"))?;

    if record.consumed {
        // A second redemption of the same code is a replay: the teacher's
        // single-use enforcement already re-marked this as consumed on
        // first look, so seeing it consumed here means this is exactly
        // that second attempt.
        ctx.store
            .revoke_descendants_of_code(code)
            .await
            .map_err(|e| OidcError::Persistence(e.to_string()))?;
        return Err(OidcError::invalid_grant("authorization code has already been used"));
    }

    if record.client_id != client_id {
        return Err(OidcError::invalid_grant("authorization code was not issued to this client"));
    }
    if record.redirect_uri != redirect_uri {
        return Err(OidcError::invalid_grant("redirect_uri does not match the authorization request"));
    }
    if record.expires_at < now() {
        return Err(OidcError::invalid_grant("authorization code has expired"));
    }

    if let Some(challenge) = &record.code_challenge {
        let verifier = code_verifier.ok_or_else(|| OidcError::invalid_request("code_verifier is required"))?;
        let method = record.code_challenge_method.as_deref().unwrap_or("plain");
        if !verify_pkce(verifier, challenge, method) {
            return Err(OidcError::invalid_grant("code_verifier does not match code_challenge"));
        }
    }

    let client = ctx
        .host
        .get_client(client_id)
        .await
        .ok_or_else(|| OidcError::invalid_client("unknown client"))?;

    let subject_type = if client.subject_type == "pairwise" { SubjectType::Pairwise } else { SubjectType::Public };
    let sub = resolve_subject(ctx.store, subject_type, &record.subject, client_id)
        .await
        .map_err(|e| OidcError::Server(e.to_string()))?;

    let access_ttl = ctx.config.lifetimes.access_token_seconds;
    let minted_access = mint_access_token(
        ctx.keys,
        AccessTokenRequest {
            issuer: &ctx.config.issuer,
            subject: &sub,
            client_id,
            scopes: &record.scopes,
            ttl_seconds: access_ttl,
            dpop_jkt: record.dpop_jkt.clone().or(proof_jkt),
            cert_thumbprint: None,
            sign_kid: client.sign_kid.as_deref(),
        },
    )?;

    ctx.store
        .put_access_token(crate::store::AccessTokenRecord {
            jti: minted_access.jti.clone(),
            client_id: client_id.to_string(),
            subject: Some(sub.clone()),
            scopes: record.scopes.clone(),
            issued_at: now(),
            expires_at: minted_access.expires_at,
            revoked: false,
            dpop_jkt: record.dpop_jkt.clone(),
            cert_thumbprint: None,
            resource: record.resource.clone(),
        })
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?;

    let refresh_token = if ctx.config.grants.refresh_token {
        let token = generate_random_token(32);
        ctx.store
            .put_refresh_token(RefreshToken {
                token: token.clone(),
                client_id: client_id.to_string(),
                subject: sub.clone(),
                scopes: record.scopes.clone(),
                issued_at: now(),
                expires_at: now() + ctx.config.lifetimes.refresh_token_seconds,
                revoked: false,
                origin_code: Some(crate::store::hash_opaque(code)),
                dpop_jkt: record.dpop_jkt.clone(),
                resource: record.resource.clone(),
            })
            .await
            .map_err(|e| OidcError::Persistence(e.to_string()))?;
        Some(token)
    } else {
        None
    };

    let id_token = if record.scopes.iter().any(|s| s == "openid") {
        let user = ctx.host.get_user(&record.subject).await;
        Some(mint_scoped_id_token(ctx, &user, &sub, client_id, &record, &minted_access.jwt, Some(code))?)
    } else {
        None
    };

    Ok(TokenResponse {
        access_token: minted_access.jwt,
        token_type: "Bearer".to_string(),
        expires_in: access_ttl,
        refresh_token,
        id_token,
        scope: record.scopes.join(" "),
    })
}

fn mint_scoped_id_token(
    ctx: &GrantContext<'_>,
    user: &Option<UserRecord>,
    sub: &str,
    client_id: &str,
    record: &AuthorizationCode,
    access_token: &str,
    code: Option<&str>,
) -> OidcResult<String> {
    let extra = match user {
        Some(user) => scope_claims(&record.scopes, user),
        None => Default::default(),
    };
    mint_id_token(
        ctx.keys,
        IdTokenRequest {
            issuer: &ctx.config.issuer,
            subject: sub,
            client_id,
            ttl_seconds: ctx.config.lifetimes.id_token_seconds,
            auth_time: record.auth_time,
            nonce: record.nonce.clone(),
            acr: record.acr.clone(),
            amr: record.amr.clone(),
            extra_claims: extra,
            access_token_for_hash: Some(access_token),
            code_for_hash: code,
            sign_kid: None,
        },
    )
}

/// Merge the OIDC Core §5.5 `claims` request parameter on top of the
/// scope-derived set, used when `/authorize` carried an explicit
/// `claims=` JSON object (not wired into `ValidatedRequest` here since
/// this plugin only supports the `claims` parameter at `/userinfo` today).
#[allow(dead_code)]
fn with_requested_claims(
    base: serde_json::Map<String, serde_json::Value>,
    requested: &std::collections::HashMap<String, serde_json::Value>,
    user: &UserRecord,
) -> serde_json::Map<String, serde_json::Value> {
    merge_requested_claims(base, requested, user)
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

    fn sample_request(client_id: &str) -> ValidatedRequest {
        ValidatedRequest {
            response_type: vec!["code".to_string()],
            client_id: client_id.to_string(),
            redirect_uri: "http://localhost:8080/client/callback".to_string(),
            scopes: vec!["openid".to_string(), "profile".to_string()],
            state: None,
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
    async fn issue_then_exchange_yields_tokens() {
        let config = OidcPluginConfig::default();
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };

        let client_id = config.clients[0].client_id.clone();
        let request = sample_request(&client_id);
        let issued = issue_authorization_code(&ctx, &request, "usr-admin", now(), vec!["pwd".to_string()], None).await.unwrap();

        let response = exchange_authorization_code(&ctx, &issued.code, &request.redirect_uri, &client_id, None, None)
            .await
            .unwrap();
        assert!(!response.access_token.is_empty());
        assert!(response.id_token.is_some());
    }

    #[tokio::test]
    async fn replayed_code_is_rejected_and_revokes_descendants() {
        let config = OidcPluginConfig::default();
        let store = MemoryStore::new();
        let host = MemoryHost::new(&config);
        let keys = test_keys();
        let ctx = GrantContext { config: &config, store: &store, host: &host, keys: &keys };

        let client_id = config.clients[0].client_id.clone();
        let request = sample_request(&client_id);
        let issued = issue_authorization_code(&ctx, &request, "usr-admin", now(), vec!["pwd".to_string()], None).await.unwrap();

        let _first = exchange_authorization_code(&ctx, &issued.code, &request.redirect_uri, &client_id, None, None)
            .await
            .unwrap();
        let second = exchange_authorization_code(&ctx, &issued.code, &request.redirect_uri, &client_id, None, None).await;
        assert!(second.is_err());
    }
}
