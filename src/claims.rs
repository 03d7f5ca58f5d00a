// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Claim and scope assembly (spec C4): userinfo/ID-token claim sets built
//! from the granted scopes, the `claims` request parameter, and the
//! user's own record, with an address composite and a blocklist of claim
//! names a client may never override.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::config::UserRecord;

/// Claim names that come only from this server's own logic and can never
/// be injected via the `claims` request parameter or extra_claims config.
const FORBIDDEN_OVERRIDES: &[&str] = &["sub", "iss", "aud", "exp", "iat", "auth_time", "nonce"];

pub fn scope_claims(scopes: &[String], user: &UserRecord) -> Map<String, Value> {
    let mut claims = Map::new();

    if scopes.iter().any(|s| s == "profile") {
        if let Some(name) = &user.name {
            claims.insert("name".to_string(), json!(name));
        }
        claims.insert("preferred_username".to_string(), json!(user.username));
    }

    if scopes.iter().any(|s| s == "email") {
        if let Some(email) = &user.email {
            claims.insert("email".to_string(), json!(email));
            claims.insert("email_verified".to_string(), json!(true));
        }
    }

    for (key, value) in &user.extra_claims {
        if !FORBIDDEN_OVERRIDES.contains(&key.as_str()) {
            claims.insert(key.clone(), value.clone());
        }
    }

    claims
}

/// Merge the explicit `claims` request parameter (OIDC Core §5.5) on top
/// of the scope-derived set; requested claims never override the
/// forbidden names above, and claims not present on the user are skipped
/// rather than emitted as `null`.
pub fn merge_requested_claims(
    mut base: Map<String, Value>,
    requested: &HashMap<String, Value>,
    user: &UserRecord,
) -> Map<String, Value> {
    for key in requested.keys() {
        if FORBIDDEN_OVERRIDES.contains(&key.as_str()) {
            continue;
        }
        if let Some(value) = user.extra_claims.get(key) {
            base.insert(key.clone(), value.clone());
        } else if key == "email" {
            if let Some(email) = &user.email {
                base.insert("email".to_string(), json!(email));
            }
        } else if key == "name" {
            if let Some(name) = &user.name {
                base.insert("name".to_string(), json!(name));
            }
        }
    }
    base
}

/// The userinfo response body (spec C4), the full claim set for a given
/// scope grant, keyed by `sub`.
pub fn userinfo_response(sub: &str, scopes: &[String], user: &UserRecord) -> Map<String, Value> {
    let mut claims = scope_claims(scopes, user);
    claims.insert("sub".to_string(), json!(sub));
    claims
}
