// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! OIDC discovery (spec C11): the `.well-known/openid-configuration`
//! document and the JWKS it advertises.

use jsonwebtoken::jwk::Jwk;
use serde::Serialize;

use crate::config::OidcPluginConfig;
use crate::crypto::KeyManager;

/// `.well-known/openid-configuration` (OIDC Discovery 1.0 §3).
#[derive(Debug, Serialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub registration_endpoint: String,
    pub introspection_endpoint: String,
    pub revocation_endpoint: String,
    pub pushed_authorization_request_endpoint: String,
    pub device_authorization_endpoint: String,
    pub end_session_endpoint: String,
    pub check_session_iframe: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub claims_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub require_pushed_authorization_requests: bool,
    pub dpop_signing_alg_values_supported: Vec<String>,
}

/// Assemble the discovery document from configuration and the key
/// manager's currently published algorithm.
pub fn discovery_document(config: &OidcPluginConfig, signing_algorithm: &str) -> DiscoveryDocument {
    let mut grant_types_supported = vec!["authorization_code".to_string()];
    if config.grants.implicit {
        grant_types_supported.push("implicit".to_string());
    }
    if config.grants.resource_owner_password_credentials {
        grant_types_supported.push("password".to_string());
    }
    if config.grants.client_credentials {
        grant_types_supported.push("client_credentials".to_string());
    }
    if config.grants.refresh_token {
        grant_types_supported.push("refresh_token".to_string());
    }
    if config.grants.device_code {
        grant_types_supported.push("urn:ietf:params:oauth:grant-type:device_code".to_string());
    }
    if config.grants.delete_token {
        grant_types_supported.push("urn:params:oauth:grant-type:delete_token".to_string());
    }

    let mut response_types_supported = vec!["code".to_string()];
    if config.grants.implicit {
        response_types_supported.push("id_token".to_string());
        response_types_supported.push("id_token token".to_string());
        response_types_supported.push("code id_token".to_string());
    }

    DiscoveryDocument {
        issuer: config.issuer.clone(),
        authorization_endpoint: config.endpoint("authorize"),
        token_endpoint: config.endpoint("token"),
        userinfo_endpoint: config.endpoint("userinfo"),
        jwks_uri: config.endpoint("jwks"),
        registration_endpoint: config.endpoint("register"),
        introspection_endpoint: config.endpoint("introspect"),
        revocation_endpoint: config.endpoint("revoke"),
        pushed_authorization_request_endpoint: config.endpoint("par"),
        device_authorization_endpoint: config.endpoint("device_authorization"),
        end_session_endpoint: config.endpoint("end_session"),
        check_session_iframe: config.endpoint("check_session_iframe"),
        response_types_supported,
        grant_types_supported,
        subject_types_supported: vec!["public".to_string(), "pairwise".to_string()],
        id_token_signing_alg_values_supported: vec![signing_algorithm.to_string()],
        token_endpoint_auth_methods_supported: vec![
            "none".to_string(),
            "client_secret_basic".to_string(),
            "client_secret_post".to_string(),
            "client_secret_jwt".to_string(),
            "private_key_jwt".to_string(),
            "tls_client_auth".to_string(),
        ],
        scopes_supported: vec!["openid".to_string(), "profile".to_string(), "email".to_string(), "offline_access".to_string()],
        claims_supported: vec![
            "sub".to_string(),
            "name".to_string(),
            "email".to_string(),
            "email_verified".to_string(),
            "preferred_username".to_string(),
        ],
        code_challenge_methods_supported: vec!["S256".to_string(), "plain".to_string()],
        require_pushed_authorization_requests: config.par_required,
        dpop_signing_alg_values_supported: if config.dpop_required {
            vec!["ES256".to_string(), "RS256".to_string()]
        } else {
            vec![]
        },
    }
}

/// `keys` array for the `jwks_uri` response.
#[derive(Debug, Serialize)]
pub struct JwksDocument {
    pub keys: Vec<Jwk>,
}

pub fn jwks_document(keys: &KeyManager) -> JwksDocument {
    JwksDocument { keys: keys.public_jwks() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_document_uses_configured_issuer() {
        let config = OidcPluginConfig::default();
        let doc = discovery_document(&config, "HS256");
        assert_eq!(doc.issuer, config.issuer);
        assert!(doc.authorization_endpoint.starts_with(&config.issuer) || doc.authorization_endpoint.contains("authorize"));
        assert_eq!(doc.id_token_signing_alg_values_supported, vec!["HS256".to_string()]);
    }

    #[test]
    fn device_code_grant_is_advertised_by_default() {
        let config = OidcPluginConfig::default();
        let doc = discovery_document(&config, "HS256");
        assert!(doc.grant_types_supported.iter().any(|g| g.contains("device_code")));
    }
}
