// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! In-process [`super::Host`] backed by [`crate::config::OidcPluginConfig`]'s
//! `clients`/`users` lists and a `Mutex`-guarded session map. Grounded in
//! the teacher's `config::access::AccessConfig` as the directory data this
//! stands in front of.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::config::{ClientConfig, OidcPluginConfig, UserRecord};
use crate::crypto::password::verify_password;
use crate::store::now;

use super::Host;

struct Session {
    subject: String,
    authenticated_at: i64,
    amr: Vec<String>,
}

pub struct MemoryHost {
    clients: HashMap<String, ClientConfig>,
    /// Salted hash of each confidential client's shared secret, indexed by
    /// `client_id`. `ClientConfig::client_secret` itself stays plaintext
    /// since `client_secret_jwt` needs it back as a raw HMAC key; this is
    /// the hash `check_client_valid` actually compares against, per spec §3.
    client_secret_hashes: HashMap<String, String>,
    users_by_subject: HashMap<String, UserRecord>,
    users_by_username: HashMap<String, UserRecord>,
    sessions: Mutex<HashMap<String, Session>>,
    login_base_url: String,
    counters: Mutex<HashMap<String, AtomicU64>>,
}

impl MemoryHost {
    pub fn new(config: &OidcPluginConfig) -> Self {
        let clients: HashMap<String, ClientConfig> = config
            .clients
            .iter()
            .cloned()
            .map(|c| (c.client_id.clone(), c))
            .collect();
        let client_secret_hashes = clients
            .values()
            .filter_map(|c| Some((c.client_id.clone(), crate::crypto::password::hash_password(c.client_secret.as_deref()?))))
            .collect();
        let users_by_subject = config
            .users
            .iter()
            .cloned()
            .map(|u| (u.subject.clone(), u))
            .collect();
        let users_by_username = config
            .users
            .iter()
            .cloned()
            .map(|u| (u.username.clone(), u))
            .collect();

        Self {
            clients,
            client_secret_hashes,
            users_by_subject,
            users_by_username,
            sessions: Mutex::new(HashMap::new()),
            login_base_url: format!(
                "http://{}:{}/login",
                config.server.address, config.server.port
            ),
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Establish a session for a successfully authenticated user, returning
    /// the session id the consent bridge can check. `amr` is the set of
    /// authentication methods the login satisfied (e.g. `["pwd"]`).
    pub fn start_session(&self, subject: &str, amr: Vec<String>) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.sessions.lock().unwrap().insert(
            session_id.clone(),
            Session { subject: subject.to_string(), authenticated_at: now(), amr },
        );
        session_id
    }
}

#[async_trait]
impl Host for MemoryHost {
    async fn get_client(&self, client_id: &str) -> Option<ClientConfig> {
        self.clients.get(client_id).cloned()
    }

    async fn check_client_valid(&self, client_id: &str, client_secret: Option<&str>) -> bool {
        match self.clients.get(client_id) {
            Some(client) if client.is_confidential => match (self.client_secret_hashes.get(client_id), client_secret) {
                (Some(hash), Some(secret)) => self.verify_hash(secret, hash),
                _ => false,
            },
            Some(_) => true,
            None => false,
        }
    }

    async fn get_user(&self, subject: &str) -> Option<UserRecord> {
        self.users_by_subject.get(subject).cloned()
    }

    async fn get_user_by_username(&self, username: &str) -> Option<UserRecord> {
        self.users_by_username.get(username).cloned()
    }

    async fn check_user_valid(&self, username: &str, password: &str) -> Option<UserRecord> {
        let user = self.users_by_username.get(username)?;
        if verify_password(password, &user.pass) {
            Some(user.clone())
        } else {
            None
        }
    }

    async fn check_session_valid(&self, session_id: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(session_id)
    }

    async fn get_session_age(&self, session_id: &str) -> Option<i64> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map(|s| now() - s.authenticated_at)
    }

    async fn get_session_subject(&self, session_id: &str) -> Option<String> {
        self.sessions.lock().unwrap().get(session_id).map(|s| s.subject.clone())
    }

    async fn get_session_amr(&self, session_id: &str) -> Vec<String> {
        self.sessions.lock().unwrap().get(session_id).map(|s| s.amr.clone()).unwrap_or_default()
    }

    async fn get_client_granted_scopes(&self, subject: &str, _client_id: &str) -> Vec<String> {
        self.users_by_subject
            .get(subject)
            .map(|u| u.granted_scopes.clone())
            .unwrap_or_default()
    }

    fn get_login_url(&self, return_to: &str) -> String {
        format!("{}?return_to={}", self.login_base_url, urlencoding_minimal(return_to))
    }

    fn generate_hash(&self, plaintext: &str) -> String {
        crate::crypto::password::hash_password(plaintext)
    }

    fn verify_hash(&self, plaintext: &str, hash: &str) -> bool {
        verify_password(plaintext, hash)
    }

    fn metrics_increment_counter(&self, name: &str) {
        let mut counters = self.counters.lock().unwrap();
        counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }
}

/// Percent-encode the handful of characters that matter in a query string
/// value; avoids pulling in a full URL-encoding crate for one call site.
fn urlencoding_minimal(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            ' ' => "%20".to_string(),
            '&' => "%26".to_string(),
            '=' => "%3D".to_string(),
            '?' => "%3F".to_string(),
            '#' => "%23".to_string(),
            other => other.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn metrics_counter_increments() {
        let config = OidcPluginConfig::default();
        let host = MemoryHost::new(&config);
        host.metrics_increment_counter("token_issued");
        host.metrics_increment_counter("token_issued");
        assert_eq!(
            host.counters.lock().unwrap().get("token_issued").unwrap().load(Ordering::Relaxed),
            2
        );
    }

    #[tokio::test]
    async fn unknown_client_is_invalid() {
        let config = OidcPluginConfig::default();
        let host = MemoryHost::new(&config);
        assert!(!host.check_client_valid("does-not-exist", None).await);
    }
}
