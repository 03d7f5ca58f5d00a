// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Authorization/PAR request parsing and validation (spec C7): PKCE,
//! scope reduction against the client's allow-list, the `resource`
//! parameter, rich authorization requests, `prompt`, and `max_age`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rocket::form::FromForm;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::ClientConfig;
use crate::error::{OidcError, OidcResult};

/// Raw `/authorize` and `/par` request parameters, as received over the
/// wire — mirrors the teacher's `oauth2::forms` query-extraction idiom.
#[derive(Debug, Clone, FromForm, Serialize, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: String,
    pub client_id: String,
    #[field(default = None)]
    pub redirect_uri: Option<String>,
    #[field(default = None)]
    pub scope: Option<String>,
    #[field(default = None)]
    pub state: Option<String>,
    #[field(default = None)]
    pub nonce: Option<String>,
    #[field(default = None)]
    pub code_challenge: Option<String>,
    #[field(default = None)]
    pub code_challenge_method: Option<String>,
    #[field(default = None)]
    pub resource: Option<String>,
    #[field(default = None)]
    pub prompt: Option<String>,
    #[field(default = None)]
    pub max_age: Option<i64>,
    #[field(default = None)]
    pub acr_values: Option<String>,
    #[field(default = None)]
    pub authorization_details: Option<String>,
    #[field(default = None)]
    pub request_uri: Option<String>,
}

/// A validated, normalized authorization request ready to hand to a flow
/// engine.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub response_type: Vec<String>,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub resource: Vec<String>,
    pub prompt: Vec<String>,
    pub max_age: Option<i64>,
    pub acr_values: Vec<String>,
    pub authorization_details: Option<serde_json::Value>,
}

/// Validate and normalize a raw request against the client's registration
/// (spec C7 / §4.7).
pub fn validate_authorize_request(
    params: &AuthorizeParams,
    client: &ClientConfig,
    pkce_required_for_public_clients: bool,
) -> OidcResult<ValidatedRequest> {
    let response_type: Vec<String> = params.response_type.split_whitespace().map(String::from).collect();
    if response_type.is_empty() {
        return Err(OidcError::invalid_request("response_type is required"));
    }

    let redirect_uri = match &params.redirect_uri {
        Some(uri) => uri.clone(),
        None => client
            .redirect_uris
            .first()
            .cloned()
            .ok_or_else(|| OidcError::invalid_request("redirect_uri is required"))?,
    };
    if !client.redirect_uris.iter().any(|r| r == &redirect_uri) {
        return Err(OidcError::protocol(
            crate::error::ProtocolErrorCode::InvalidRequest,
            "redirect_uri does not match any registered value",
        ));
    }

    let requested_scopes: Vec<String> = params
        .scope
        .clone()
        .unwrap_or_else(|| client.default_scope.clone())
        .split_whitespace()
        .map(String::from)
        .collect();
    let scopes = reduce_scopes(&requested_scopes, &client.default_scope);

    if !client.is_confidential && pkce_required_for_public_clients && params.code_challenge.is_none() {
        return Err(OidcError::invalid_request("PKCE code_challenge is required for public clients"));
    }
    if let Some(method) = &params.code_challenge_method {
        if method != "S256" && method != "plain" {
            return Err(OidcError::invalid_request("unsupported code_challenge_method"));
        }
    }

    let authorization_details = match &params.authorization_details {
        Some(raw) => Some(
            serde_json::from_str(raw)
                .map_err(|e| OidcError::invalid_request(format!("malformed authorization_details: {e}")))?,
        ),
        None => None,
    };

    Ok(ValidatedRequest {
        response_type,
        client_id: params.client_id.clone(),
        redirect_uri,
        scopes,
        state: params.state.clone(),
        nonce: params.nonce.clone(),
        code_challenge: params.code_challenge.clone(),
        code_challenge_method: params.code_challenge_method.clone().or(Some("plain".to_string())),
        resource: params.resource.clone().map(|r| vec![r]).unwrap_or_default(),
        prompt: params
            .prompt
            .clone()
            .map(|p| p.split_whitespace().map(String::from).collect())
            .unwrap_or_default(),
        max_age: params.max_age,
        acr_values: params
            .acr_values
            .clone()
            .map(|a| a.split_whitespace().map(String::from).collect())
            .unwrap_or_default(),
        authorization_details,
    })
}

/// Drop any requested scope the client isn't allowed to ask for, rather
/// than rejecting the whole request (spec §4.7 "scope reduction").
fn reduce_scopes(requested: &[String], default_scope: &str) -> Vec<String> {
    let allowed: Vec<&str> = default_scope.split_whitespace().collect();
    requested
        .iter()
        .filter(|s| allowed.contains(&s.as_str()))
        .cloned()
        .collect()
}

/// RFC 7636 PKCE S256 verification.
pub fn verify_pkce(code_verifier: &str, code_challenge: &str, method: &str) -> bool {
    match method {
        "plain" => code_verifier == code_challenge,
        "S256" => {
            let mut hasher = Sha256::new();
            hasher.update(code_verifier.as_bytes());
            let computed = URL_SAFE_NO_PAD.encode(hasher.finalize());
            computed == code_challenge
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_reduction_drops_unlisted_scopes() {
        let reduced = reduce_scopes(
            &["openid".to_string(), "admin".to_string()],
            "openid profile",
        );
        assert_eq!(reduced, vec!["openid".to_string()]);
    }

    #[test]
    fn pkce_s256_matches_known_vector() {
        // RFC 7636 appendix B test vector.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert!(verify_pkce(verifier, challenge, "S256"));
        assert!(!verify_pkce("wrong-verifier", challenge, "S256"));
    }
}
