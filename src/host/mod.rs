// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! The host framework contract (spec §6): everything this plugin needs
//! from the surrounding SSO server but does not implement itself — user
//! directory lookups, session validation, login URLs, password hashing,
//! and metrics. [`memory::MemoryHost`] is the in-process reference
//! implementation used by the demo binary and the test suite.

pub mod memory;

use crate::config::{ClientConfig, UserRecord};
use async_trait::async_trait;

/// Everything a flow engine needs from the surrounding SSO server, kept
/// as a trait object so a real deployment can back it with its own user
/// directory and session store instead of this crate's in-memory stand-in.
#[async_trait]
pub trait Host: Send + Sync {
    async fn get_client(&self, client_id: &str) -> Option<ClientConfig>;
    async fn check_client_valid(&self, client_id: &str, client_secret: Option<&str>) -> bool;

    async fn get_user(&self, subject: &str) -> Option<UserRecord>;
    async fn get_user_by_username(&self, username: &str) -> Option<UserRecord>;
    async fn check_user_valid(&self, username: &str, password: &str) -> Option<UserRecord>;

    async fn check_session_valid(&self, session_id: &str) -> bool;
    /// Seconds since the session's last authentication event, for
    /// `max_age` enforcement (spec §4.10).
    async fn get_session_age(&self, session_id: &str) -> Option<i64>;
    /// The subject a session id resolves to, for consent reconciliation.
    async fn get_session_subject(&self, session_id: &str) -> Option<String>;
    /// The authentication methods (spec §4.10 "satisfied schemes") the
    /// session's login established, carried into the authorization code's
    /// `amr` and from there into the id_token.
    async fn get_session_amr(&self, session_id: &str) -> Vec<String>;

    async fn get_client_granted_scopes(&self, subject: &str, client_id: &str) -> Vec<String>;

    /// Where to redirect an end-user to establish a session, given the
    /// original `/auth` request URL to return to afterward.
    fn get_login_url(&self, return_to: &str) -> String;

    fn generate_hash(&self, plaintext: &str) -> String;
    fn verify_hash(&self, plaintext: &str, hash: &str) -> bool;

    fn metrics_increment_counter(&self, name: &str);
}
