// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Grant engines (spec C9 / §4.9): one module per OAuth2/OIDC grant type,
//! each wiring `request`, `client_auth`, `dpop`, `subject`, `claims` and
//! `token_factory` together against a `store::TokenStore`.

pub mod client_credentials;
pub mod code;
pub mod delete_token;
pub mod device;
pub mod implicit;
pub mod refresh;
pub mod ropc;

use serde::Serialize;

use crate::config::OidcPluginConfig;
use crate::crypto::KeyManager;
use crate::host::Host;
use crate::store::TokenStore;

/// Everything a grant engine needs, bundled so server handlers don't have
/// to thread four separate references through every call.
pub struct GrantContext<'a> {
    pub config: &'a OidcPluginConfig,
    pub store: &'a dyn TokenStore,
    pub host: &'a dyn Host,
    pub keys: &'a KeyManager,
}

/// RFC 6749 §5.1 token response body, shared by every grant that mints an
/// access token.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub scope: String,
}
