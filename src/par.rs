// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Pushed Authorization Requests (RFC 9126, spec §4.11): a client submits
//! its full `/authorize` parameter set directly to the server over a
//! back-channel, back-authenticated request and gets back a short-lived
//! `request_uri` to use in the actual browser redirect.

use crate::error::{OidcError, OidcResult};
use crate::request::AuthorizeParams;
use crate::store::{now, PushedAuthorizationRequest, TokenStore};
use crate::token_factory::generate_random_token;

pub struct PushedRequestResult {
    pub request_uri: String,
    pub expires_in: i64,
}

/// Store a pushed authorization request and hand back its reference URI.
pub async fn push_authorization_request(
    store: &dyn TokenStore,
    client_id: &str,
    params: &AuthorizeParams,
    ttl_seconds: i64,
) -> OidcResult<PushedRequestResult> {
    let request_uri = format!("urn:ietf:params:oauth:request_uri:{}", generate_random_token(24));
    let params_value = serde_json::to_value(params).map_err(|e| OidcError::Server(e.to_string()))?;

    store
        .put_par(PushedAuthorizationRequest {
            request_uri: request_uri.clone(),
            client_id: client_id.to_string(),
            params: params_value,
            expires_at: now() + ttl_seconds,
            consumed: false,
        })
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?;

    Ok(PushedRequestResult { request_uri, expires_in: ttl_seconds })
}

/// Redeem a `request_uri` at `/authorize`, single-use (spec §3 "consumed"
/// flag) and client-bound.
pub async fn redeem_pushed_request(
    store: &dyn TokenStore,
    request_uri: &str,
    client_id: &str,
) -> OidcResult<AuthorizeParams> {
    let par = store
        .take_par(request_uri)
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))?
        .ok_or_else(|| OidcError::invalid_request("request_uri is unknown, expired, or already used"))?;

    if par.client_id != client_id {
        return Err(OidcError::invalid_request("request_uri was not pushed by this client"));
    }
    if par.expires_at < now() {
        return Err(OidcError::invalid_request("request_uri has expired"));
    }

    serde_json::from_value(par.params).map_err(|e| OidcError::Server(format!("corrupted PAR record: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn sample_params() -> AuthorizeParams {
        AuthorizeParams {
            response_type: "code".into(),
            client_id: "client-1".into(),
            redirect_uri: Some("https://client.example/cb".into()),
            scope: Some("openid".into()),
            state: None,
            nonce: None,
            code_challenge: None,
            code_challenge_method: None,
            resource: None,
            prompt: None,
            max_age: None,
            acr_values: None,
            authorization_details: None,
            request_uri: None,
        }
    }

    #[tokio::test]
    async fn par_round_trips_and_is_single_use() {
        let store = MemoryStore::new();
        let pushed = push_authorization_request(&store, "client-1", &sample_params(), 90).await.unwrap();
        let redeemed = redeem_pushed_request(&store, &pushed.request_uri, "client-1").await.unwrap();
        assert_eq!(redeemed.client_id, "client-1");

        let second_attempt = redeem_pushed_request(&store, &pushed.request_uri, "client-1").await;
        assert!(second_attempt.is_err());
    }

    #[tokio::test]
    async fn par_rejects_wrong_client() {
        let store = MemoryStore::new();
        let pushed = push_authorization_request(&store, "client-1", &sample_params(), 90).await.unwrap();
        let result = redeem_pushed_request(&store, &pushed.request_uri, "someone-else").await;
        assert!(result.is_err());
    }
}
