// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Token and grant persistence (spec C6 / §3).
//!
//! `TokenStore` is the abstract facility a host deployment would back with
//! its own SQL store; this crate ships [`memory::MemoryStore`], a
//! `tokio::sync::Mutex`-guarded in-memory implementation exercised by the
//! whole test suite. All timestamps are Unix seconds (UTC) so an
//! implementation never needs to carry a timezone-aware database column.

pub mod memory;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic digest used to index and compare server-issued bearer
/// secrets (authorization codes, refresh tokens, device codes) so a
/// `TokenStore` implementation never retains the plaintext value (spec §3
/// "secrets are stored only as salted hashes"). These values already carry
/// 128+ bits of server-generated randomness, so a per-record salt buys
/// nothing a deterministic digest doesn't already provide, and determinism
/// is what lets a presented plaintext value still resolve to its record in
/// O(1) instead of a linear scan. Callers that need two records to agree
/// on the same hashed identity (e.g. a refresh token's `origin_code`) must
/// hash with this function themselves rather than let a store re-hash an
/// already-hashed value.
pub fn hash_opaque(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// An issued authorization code (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub subject: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub nonce: Option<String>,
    pub acr: Option<String>,
    pub amr: Vec<String>,
    pub auth_time: i64,
    pub expires_at: i64,
    pub consumed: bool,
    pub resource: Vec<String>,
    pub authorization_details: Option<serde_json::Value>,
    pub dpop_jkt: Option<String>,
    /// Preserved verbatim from the schema this plugin's data model
    /// descends from; never populated or read by application logic.
    pub gpoctr_cient_id: Option<String>,
}

/// A refresh token and the grant lineage it descends from (spec §3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub token: String,
    pub client_id: String,
    pub subject: String,
    pub scopes: Vec<String>,
    pub issued_at: i64,
    pub expires_at: i64,
    pub revoked: bool,
    /// The authorization code this refresh token's lineage started from,
    /// used to cascade-revoke descendants on reuse detection (spec §7
    /// "Replay / reuse").
    pub origin_code: Option<String>,
    pub dpop_jkt: Option<String>,
    pub resource: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    pub jti: String,
    pub client_id: String,
    pub subject: Option<String>,
    pub scopes: Vec<String>,
    pub issued_at: i64,
    pub expires_at: i64,
    pub revoked: bool,
    pub dpop_jkt: Option<String>,
    pub cert_thumbprint: Option<String>,
    pub resource: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenRecord {
    pub jti: String,
    pub client_id: String,
    pub subject: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectIdentifier {
    pub sector_identifier: String,
    pub local_subject: String,
    pub pairwise_subject: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub verification_uri: String,
    pub expires_at: i64,
    pub interval: i64,
    pub subject: Option<String>,
    pub approved: bool,
    pub denied: bool,
    pub last_poll_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushedAuthorizationRequest {
    pub request_uri: String,
    pub client_id: String,
    pub params: serde_json::Value,
    pub expires_at: i64,
    pub consumed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DpopJti {
    pub jti: String,
    pub seen_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAssertionJti {
    pub jti: String,
    pub client_id: String,
    pub seen_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub client_id: String,
    /// `hash_opaque` digest of the bearer token returned to the client at
    /// registration time (spec §4.13 "compared by hash") — never plaintext.
    pub registration_access_token: String,
    pub registration_client_uri: String,
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RarConsent {
    pub subject: String,
    pub client_id: String,
    pub authorization_details: serde_json::Value,
    pub granted_at: i64,
}

/// Abstract persistence facility backing every flow engine (spec C6).
///
/// Implementations must treat the insert of a code/refresh/device/PAR
/// record together with its scope and AMR rows as a single atomic unit —
/// this crate's own [`memory::MemoryStore`] does so by holding
/// [`memory::INSERT_LOCK`] for the duration of each such aggregate insert.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn put_authorization_code(&self, code: AuthorizationCode) -> anyhow::Result<()>;
    async fn take_authorization_code(&self, code: &str) -> anyhow::Result<Option<AuthorizationCode>>;

    async fn put_refresh_token(&self, token: RefreshToken) -> anyhow::Result<()>;
    async fn get_refresh_token(&self, token: &str) -> anyhow::Result<Option<RefreshToken>>;
    async fn revoke_refresh_token(&self, token: &str) -> anyhow::Result<()>;
    /// Cascades revocation to every refresh token descended from the same
    /// authorization code — the reuse-detection response of spec §7.
    async fn revoke_descendants_of_code(&self, code: &str) -> anyhow::Result<()>;

    async fn put_access_token(&self, record: AccessTokenRecord) -> anyhow::Result<()>;
    async fn get_access_token(&self, jti: &str) -> anyhow::Result<Option<AccessTokenRecord>>;
    async fn revoke_access_token(&self, jti: &str) -> anyhow::Result<()>;

    async fn put_id_token(&self, record: IdTokenRecord) -> anyhow::Result<()>;

    async fn put_subject_identifier(&self, identifier: SubjectIdentifier) -> anyhow::Result<()>;
    async fn get_pairwise_subject(
        &self,
        sector_identifier: &str,
        local_subject: &str,
    ) -> anyhow::Result<Option<String>>;

    async fn put_device_authorization(&self, authz: DeviceAuthorization) -> anyhow::Result<()>;
    async fn get_device_authorization_by_device_code(
        &self,
        device_code: &str,
    ) -> anyhow::Result<Option<DeviceAuthorization>>;
    async fn get_device_authorization_by_user_code(
        &self,
        user_code: &str,
    ) -> anyhow::Result<Option<DeviceAuthorization>>;
    async fn update_device_authorization(&self, authz: DeviceAuthorization) -> anyhow::Result<()>;

    async fn put_par(&self, par: PushedAuthorizationRequest) -> anyhow::Result<()>;
    async fn take_par(&self, request_uri: &str) -> anyhow::Result<Option<PushedAuthorizationRequest>>;

    async fn record_dpop_jti(&self, jti: DpopJti) -> anyhow::Result<bool>;
    async fn record_client_assertion_jti(&self, jti: ClientAssertionJti) -> anyhow::Result<bool>;

    async fn put_client_registration(&self, registration: ClientRegistration) -> anyhow::Result<()>;
    async fn get_client_registration(&self, client_id: &str) -> anyhow::Result<Option<ClientRegistration>>;
    async fn delete_client_registration(&self, client_id: &str) -> anyhow::Result<()>;

    async fn put_rar_consent(&self, consent: RarConsent) -> anyhow::Result<()>;
    async fn get_rar_consent(&self, subject: &str, client_id: &str) -> anyhow::Result<Option<RarConsent>>;
}

/// Current Unix timestamp (UTC), the only notion of "now" every
/// `TokenStore` implementation needs.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
