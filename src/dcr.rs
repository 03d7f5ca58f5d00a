// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Dynamic client registration (RFC 7591/7592, spec C12): register a new
//! client at runtime and manage it afterward with a bearer
//! `registration_access_token`.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::ClientConfig;
use crate::error::{OidcError, OidcResult};
use crate::store::{now, ClientRegistration, TokenStore};
use crate::token_factory::generate_random_token;

/// RFC 7591 §2 registration request — only the metadata fields this
/// plugin understands; anything else is preserved verbatim in the stored
/// `metadata` blob and echoed back unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientRegistrationRequest {
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_method: Option<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub jwks: Option<serde_json::Value>,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(default)]
    pub tls_client_auth_subject_dn: Option<String>,
    #[serde(default)]
    pub id_token_encrypted_response_alg: Option<String>,
    #[serde(default)]
    pub id_token_encrypted_response_enc: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClientRegistrationResponse {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub client_id_issued_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<i64>,
    pub registration_access_token: String,
    pub registration_client_uri: String,
    pub redirect_uris: Vec<String>,
    pub token_endpoint_auth_method: String,
    pub grant_types: Vec<String>,
    pub scope: String,
}

/// Register a new client (RFC 7591 §3.1).
pub async fn register_client(
    store: &dyn TokenStore,
    issuer: &str,
    request: ClientRegistrationRequest,
) -> OidcResult<ClientRegistrationResponse> {
    if request.redirect_uris.is_empty() {
        return Err(OidcError::invalid_request("redirect_uris must contain at least one URI"));
    }

    let client_id = format!("dyn-{}", generate_random_token(12));
    let auth_method = request.token_endpoint_auth_method.clone().unwrap_or_else(|| "client_secret_basic".to_string());
    let is_confidential = auth_method != "none";
    let client_secret = if is_confidential && auth_method.starts_with("client_secret") {
        Some(generate_random_token(24))
    } else {
        None
    };

    let client_config = ClientConfig {
        client_id: client_id.clone(),
        client_secret: client_secret.clone(),
        redirect_uris: request.redirect_uris.clone(),
        token_endpoint_auth_method: auth_method.clone(),
        grant_types: if request.grant_types.is_empty() { vec!["authorization_code".to_string()] } else { request.grant_types.clone() },
        default_scope: request.scope.clone().unwrap_or_else(|| "openid".to_string()),
        sign_kid: None,
        jwks: request.jwks.clone(),
        jwks_uri: request.jwks_uri.clone(),
        tls_client_auth_subject_dn: request.tls_client_auth_subject_dn.clone(),
        subject_type: "public".to_string(),
        is_confidential,
        id_token_encrypted_response_alg: request.id_token_encrypted_response_alg.clone(),
        id_token_encrypted_response_enc: request.id_token_encrypted_response_enc.clone(),
        userinfo_encrypted_response_alg: None,
        userinfo_encrypted_response_enc: None,
    };

    let registration_access_token = generate_random_token(24);
    let registration_client_uri = format!("{issuer}/register/{client_id}");
    let created_at = now();

    store
        .put_client_registration(ClientRegistration {
            client_id: client_id.clone(),
            registration_access_token: crate::store::hash_opaque(&registration_access_token),
            registration_client_uri: registration_client_uri.clone(),
            metadata: json!({ "client": client_config }),
            created_at,
        })
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?;

    Ok(ClientRegistrationResponse {
        client_id,
        client_secret,
        client_id_issued_at: created_at,
        client_secret_expires_at: None,
        registration_access_token,
        registration_client_uri,
        redirect_uris: client_config.redirect_uris,
        token_endpoint_auth_method: client_config.token_endpoint_auth_method,
        grant_types: client_config.grant_types,
        scope: client_config.default_scope,
    })
}

/// Read back a client's registration (RFC 7592 §2.1), bearer-authenticated
/// with its `registration_access_token`.
pub async fn read_client(store: &dyn TokenStore, client_id: &str, registration_access_token: &str) -> OidcResult<serde_json::Value> {
    let registration = authenticate_registration(store, client_id, registration_access_token).await?;
    Ok(registration.metadata)
}

/// Delete a client's registration (RFC 7592 §2.3).
pub async fn delete_client(store: &dyn TokenStore, client_id: &str, registration_access_token: &str) -> OidcResult<()> {
    authenticate_registration(store, client_id, registration_access_token).await?;
    store
        .delete_client_registration(client_id)
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))
}

async fn authenticate_registration(store: &dyn TokenStore, client_id: &str, registration_access_token: &str) -> OidcResult<ClientRegistration> {
    let registration = store
        .get_client_registration(client_id)
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?
        .ok_or_else(|| OidcError::invalid_client("no such registered client"))?;

    // `registration.registration_access_token` is stored as a hash (spec
    // §4.13 "compared by hash"), never the plaintext bearer token.
    if registration.registration_access_token != crate::store::hash_opaque(registration_access_token) {
        return Err(OidcError::invalid_client("registration access token does not match"));
    }
    Ok(registration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn sample_request() -> ClientRegistrationRequest {
        ClientRegistrationRequest {
            redirect_uris: vec!["https://client.example/cb".to_string()],
            token_endpoint_auth_method: None,
            grant_types: vec![],
            scope: Some("openid profile".to_string()),
            jwks: None,
            jwks_uri: None,
            tls_client_auth_subject_dn: None,
            id_token_encrypted_response_alg: None,
            id_token_encrypted_response_enc: None,
        }
    }

    #[tokio::test]
    async fn register_then_read_then_delete() {
        let store = MemoryStore::new();
        let registered = register_client(&store, "https://issuer.example", sample_request()).await.unwrap();
        assert!(registered.client_secret.is_some());

        let read_back = read_client(&store, &registered.client_id, &registered.registration_access_token).await;
        assert!(read_back.is_ok());

        let wrong_token = read_client(&store, &registered.client_id, "wrong-token").await;
        assert!(wrong_token.is_err());

        delete_client(&store, &registered.client_id, &registered.registration_access_token).await.unwrap();
        let after_delete = read_client(&store, &registered.client_id, &registered.registration_access_token).await;
        assert!(after_delete.is_err());
    }

    #[tokio::test]
    async fn registration_without_redirect_uris_is_rejected() {
        let store = MemoryStore::new();
        let mut request = sample_request();
        request.redirect_uris.clear();
        let result = register_client(&store, "https://issuer.example", request).await;
        assert!(result.is_err());
    }
}
