// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! In-memory [`super::TokenStore`], the reference implementation this
//! crate's own flow engines and tests run against. Generalizes the
//! teacher's single `JwtTokenMap` (one `HashMap<String, Grant>` behind an
//! `Arc<Mutex<_>>`) into one map per entity of spec §3.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use super::{
    hash_opaque, AccessTokenRecord, AuthorizationCode, ClientAssertionJti, ClientRegistration,
    DeviceAuthorization, DpopJti, IdTokenRecord, PushedAuthorizationRequest, RarConsent,
    RefreshToken, SubjectIdentifier, TokenStore,
};

/// Process-wide lock serializing multi-row aggregate inserts (code+scopes
/// +amr, refresh+scopes, PAR+scopes, device-authorization+scopes), per
/// spec §3/§5. A single global lock rather than one per table because the
/// aggregates this guards against interleaving spans several of the maps
/// below at once.
pub static INSERT_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

#[derive(Default)]
pub struct MemoryStore {
    codes: Mutex<HashMap<String, AuthorizationCode>>,
    refresh_tokens: Mutex<HashMap<String, RefreshToken>>,
    access_tokens: Mutex<HashMap<String, AccessTokenRecord>>,
    id_tokens: Mutex<HashMap<String, IdTokenRecord>>,
    subjects: Mutex<HashMap<(String, String), SubjectIdentifier>>,
    device_authorizations_by_device_code: Mutex<HashMap<String, DeviceAuthorization>>,
    device_authorizations_by_user_code: Mutex<HashMap<String, String>>,
    pars: Mutex<HashMap<String, PushedAuthorizationRequest>>,
    dpop_jtis: Mutex<HashMap<String, DpopJti>>,
    client_assertion_jtis: Mutex<HashMap<String, ClientAssertionJti>>,
    client_registrations: Mutex<HashMap<String, ClientRegistration>>,
    rar_consents: Mutex<HashMap<(String, String), RarConsent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn put_authorization_code(&self, mut code: AuthorizationCode) -> anyhow::Result<()> {
        let _guard = INSERT_LOCK.lock().await;
        let key = hash_opaque(&code.code);
        code.code = key.clone();
        self.codes.lock().unwrap().insert(key, code);
        Ok(())
    }

    async fn take_authorization_code(&self, code: &str) -> anyhow::Result<Option<AuthorizationCode>> {
        let key = hash_opaque(code);
        let mut codes = self.codes.lock().unwrap();
        if let Some(entry) = codes.get_mut(&key) {
            if entry.consumed {
                // Reuse of an already-consumed code: surface it but don't
                // silently re-issue, callers treat this as a replay event.
                return Ok(Some(entry.clone()));
            }
            entry.consumed = true;
            return Ok(Some(entry.clone()));
        }
        Ok(None)
    }

    async fn put_refresh_token(&self, mut token: RefreshToken) -> anyhow::Result<()> {
        let _guard = INSERT_LOCK.lock().await;
        let key = hash_opaque(&token.token);
        token.token = key.clone();
        self.refresh_tokens.lock().unwrap().insert(key, token);
        Ok(())
    }

    async fn get_refresh_token(&self, token: &str) -> anyhow::Result<Option<RefreshToken>> {
        Ok(self.refresh_tokens.lock().unwrap().get(&hash_opaque(token)).cloned())
    }

    async fn revoke_refresh_token(&self, token: &str) -> anyhow::Result<()> {
        if let Some(entry) = self.refresh_tokens.lock().unwrap().get_mut(&hash_opaque(token)) {
            entry.revoked = true;
        }
        Ok(())
    }

    async fn revoke_descendants_of_code(&self, code: &str) -> anyhow::Result<()> {
        // Not additionally serialized beyond INSERT_LOCK — last writer
        // wins against a concurrent refresh-rotation (spec §9 open
        // question c). `origin_code` is already stored hashed (callers set
        // it via `hash_opaque` themselves), so compare against a single
        // hash of the presented code, never a re-hash of a stored value.
        let key = hash_opaque(code);
        let mut tokens = self.refresh_tokens.lock().unwrap();
        for token in tokens.values_mut() {
            if token.origin_code.as_deref() == Some(key.as_str()) {
                token.revoked = true;
            }
        }
        Ok(())
    }

    async fn put_access_token(&self, record: AccessTokenRecord) -> anyhow::Result<()> {
        self.access_tokens.lock().unwrap().insert(record.jti.clone(), record);
        Ok(())
    }

    async fn get_access_token(&self, jti: &str) -> anyhow::Result<Option<AccessTokenRecord>> {
        Ok(self.access_tokens.lock().unwrap().get(jti).cloned())
    }

    async fn revoke_access_token(&self, jti: &str) -> anyhow::Result<()> {
        if let Some(entry) = self.access_tokens.lock().unwrap().get_mut(jti) {
            entry.revoked = true;
        }
        Ok(())
    }

    async fn put_id_token(&self, record: IdTokenRecord) -> anyhow::Result<()> {
        self.id_tokens.lock().unwrap().insert(record.jti.clone(), record);
        Ok(())
    }

    async fn put_subject_identifier(&self, identifier: SubjectIdentifier) -> anyhow::Result<()> {
        self.subjects.lock().unwrap().insert(
            (identifier.sector_identifier.clone(), identifier.local_subject.clone()),
            identifier,
        );
        Ok(())
    }

    async fn get_pairwise_subject(
        &self,
        sector_identifier: &str,
        local_subject: &str,
    ) -> anyhow::Result<Option<String>> {
        Ok(self
            .subjects
            .lock()
            .unwrap()
            .get(&(sector_identifier.to_string(), local_subject.to_string()))
            .map(|s| s.pairwise_subject.clone()))
    }

    async fn put_device_authorization(&self, mut authz: DeviceAuthorization) -> anyhow::Result<()> {
        let _guard = INSERT_LOCK.lock().await;
        let device_key = hash_opaque(&authz.device_code);
        authz.device_code = device_key.clone();
        self.device_authorizations_by_user_code
            .lock()
            .unwrap()
            .insert(authz.user_code.clone(), device_key.clone());
        self.device_authorizations_by_device_code
            .lock()
            .unwrap()
            .insert(device_key, authz);
        Ok(())
    }

    async fn get_device_authorization_by_device_code(
        &self,
        device_code: &str,
    ) -> anyhow::Result<Option<DeviceAuthorization>> {
        Ok(self
            .device_authorizations_by_device_code
            .lock()
            .unwrap()
            .get(&hash_opaque(device_code))
            .cloned())
    }

    async fn get_device_authorization_by_user_code(
        &self,
        user_code: &str,
    ) -> anyhow::Result<Option<DeviceAuthorization>> {
        // The user-code map already stores the device code's hash, so this
        // is a direct lookup, not a second `hash_opaque` pass.
        let device_key = self.device_authorizations_by_user_code.lock().unwrap().get(user_code).cloned();
        match device_key {
            Some(device_key) => Ok(self.device_authorizations_by_device_code.lock().unwrap().get(&device_key).cloned()),
            None => Ok(None),
        }
    }

    async fn update_device_authorization(&self, authz: DeviceAuthorization) -> anyhow::Result<()> {
        // `authz.device_code` here is always a record previously returned
        // by one of the getters above, so it already carries the hash.
        self.device_authorizations_by_device_code
            .lock()
            .unwrap()
            .insert(authz.device_code.clone(), authz);
        Ok(())
    }

    async fn put_par(&self, par: PushedAuthorizationRequest) -> anyhow::Result<()> {
        let _guard = INSERT_LOCK.lock().await;
        self.pars.lock().unwrap().insert(par.request_uri.clone(), par);
        Ok(())
    }

    async fn take_par(&self, request_uri: &str) -> anyhow::Result<Option<PushedAuthorizationRequest>> {
        let mut pars = self.pars.lock().unwrap();
        if let Some(entry) = pars.get_mut(request_uri) {
            if entry.consumed {
                return Ok(None);
            }
            entry.consumed = true;
            return Ok(Some(entry.clone()));
        }
        Ok(None)
    }

    async fn record_dpop_jti(&self, jti: DpopJti) -> anyhow::Result<bool> {
        let mut jtis = self.dpop_jtis.lock().unwrap();
        if jtis.contains_key(&jti.jti) {
            return Ok(false);
        }
        jtis.insert(jti.jti.clone(), jti);
        Ok(true)
    }

    async fn record_client_assertion_jti(&self, jti: ClientAssertionJti) -> anyhow::Result<bool> {
        let mut jtis = self.client_assertion_jtis.lock().unwrap();
        if jtis.contains_key(&jti.jti) {
            return Ok(false);
        }
        jtis.insert(jti.jti.clone(), jti);
        Ok(true)
    }

    async fn put_client_registration(&self, registration: ClientRegistration) -> anyhow::Result<()> {
        self.client_registrations
            .lock()
            .unwrap()
            .insert(registration.client_id.clone(), registration);
        Ok(())
    }

    async fn get_client_registration(&self, client_id: &str) -> anyhow::Result<Option<ClientRegistration>> {
        Ok(self.client_registrations.lock().unwrap().get(client_id).cloned())
    }

    async fn delete_client_registration(&self, client_id: &str) -> anyhow::Result<()> {
        self.client_registrations.lock().unwrap().remove(client_id);
        Ok(())
    }

    async fn put_rar_consent(&self, consent: RarConsent) -> anyhow::Result<()> {
        self.rar_consents
            .lock()
            .unwrap()
            .insert((consent.subject.clone(), consent.client_id.clone()), consent);
        Ok(())
    }

    async fn get_rar_consent(&self, subject: &str, client_id: &str) -> anyhow::Result<Option<RarConsent>> {
        Ok(self
            .rar_consents
            .lock()
            .unwrap()
            .get(&(subject.to_string(), client_id.to_string()))
            .cloned())
    }
}
