// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Session/consent reconciliation (spec C10 / §4.10): decides whether an
//! `/authorize` request can proceed silently against an existing session
//! or must be bounced to the host's login/consent surface, honoring
//! `prompt` and `max_age`.

use crate::error::{OidcError, OidcResult};
use crate::host::Host;
use crate::request::ValidatedRequest;

/// What the authorization endpoint should do next.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsentOutcome {
    /// The session is valid, fresh enough, and already covers the
    /// requested scopes — proceed straight to minting a response. `amr`
    /// carries the authentication methods the session's login satisfied.
    Proceed { subject: String, amr: Vec<String> },
    /// No usable session; redirect to the host's login surface.
    RequireLogin { login_url: String },
    /// A session exists but is missing a grant the client is asking for.
    RequireConsent { subject: String, missing_scopes: Vec<String>, amr: Vec<String> },
}

/// Reconcile a request against `session_id` (`None` if the end-user has
/// no session cookie at all).
pub async fn reconcile(
    host: &dyn Host,
    request: &ValidatedRequest,
    session_id: Option<&str>,
    authorize_url: &str,
) -> OidcResult<ConsentOutcome> {
    let wants_silent = request.prompt.iter().any(|p| p == "none");
    let force_login = request.prompt.iter().any(|p| p == "login");

    let session_id = match session_id {
        Some(id) if !force_login && host.check_session_valid(id).await => id,
        _ => {
            return if wants_silent {
                Err(OidcError::protocol(
                    crate::error::ProtocolErrorCode::LoginRequired,
                    "no active session and prompt=none was requested",
                ))
            } else {
                Ok(ConsentOutcome::RequireLogin { login_url: host.get_login_url(authorize_url) })
            }
        }
    };

    if let Some(max_age) = request.max_age {
        let age = host.get_session_age(session_id).await.unwrap_or(i64::MAX);
        if age > max_age {
            return if wants_silent {
                Err(OidcError::protocol(
                    crate::error::ProtocolErrorCode::LoginRequired,
                    "session exceeds the requested max_age",
                ))
            } else {
                Ok(ConsentOutcome::RequireLogin { login_url: host.get_login_url(authorize_url) })
            };
        }
    }

    let subject = host
        .get_session_subject(session_id)
        .await
        .ok_or_else(|| OidcError::Server("session is valid but has no resolvable subject".to_string()))?;
    let granted = host.get_client_granted_scopes(&subject, &request.client_id).await;
    let missing: Vec<String> = request.scopes.iter().filter(|s| !granted.contains(s)).cloned().collect();
    let amr = host.get_session_amr(session_id).await;

    if missing.is_empty() {
        Ok(ConsentOutcome::Proceed { subject, amr })
    } else if wants_silent {
        Err(OidcError::protocol(
            crate::error::ProtocolErrorCode::InteractionRequired,
            "additional consent is required but prompt=none was requested",
        ))
    } else {
        Ok(ConsentOutcome::RequireConsent { subject, missing_scopes: missing, amr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, UserRecord};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubHost {
        valid_session: bool,
        granted: Vec<String>,
        login_calls: Mutex<u32>,
    }

    #[async_trait]
    impl Host for StubHost {
        async fn get_client(&self, _client_id: &str) -> Option<ClientConfig> {
            None
        }
        async fn check_client_valid(&self, _client_id: &str, _client_secret: Option<&str>) -> bool {
            true
        }
        async fn get_user(&self, _subject: &str) -> Option<UserRecord> {
            None
        }
        async fn get_user_by_username(&self, _username: &str) -> Option<UserRecord> {
            None
        }
        async fn check_user_valid(&self, _username: &str, _password: &str) -> Option<UserRecord> {
            None
        }
        async fn check_session_valid(&self, _session_id: &str) -> bool {
            self.valid_session
        }
        async fn get_session_age(&self, _session_id: &str) -> Option<i64> {
            Some(0)
        }
        async fn get_session_subject(&self, session_id: &str) -> Option<String> {
            Some(session_id.to_string())
        }
        async fn get_session_amr(&self, _session_id: &str) -> Vec<String> {
            vec!["pwd".to_string()]
        }
        async fn get_client_granted_scopes(&self, _subject: &str, _client_id: &str) -> Vec<String> {
            self.granted.clone()
        }
        fn get_login_url(&self, return_to: &str) -> String {
            *self.login_calls.lock().unwrap() += 1;
            format!("/login?return_to={return_to}")
        }
        fn generate_hash(&self, plaintext: &str) -> String {
            plaintext.to_string()
        }
        fn verify_hash(&self, plaintext: &str, hash: &str) -> bool {
            plaintext == hash
        }
        fn metrics_increment_counter(&self, _name: &str) {}
    }

    fn sample_request() -> ValidatedRequest {
        ValidatedRequest {
            response_type: vec!["code".to_string()],
            client_id: "client-1".to_string(),
            redirect_uri: "https://client.example/cb".to_string(),
            scopes: vec!["openid".to_string()],
            state: None,
            nonce: None,
            code_challenge: None,
            code_challenge_method: None,
            resource: vec![],
            prompt: vec![],
            max_age: None,
            acr_values: vec![],
            authorization_details: None,
        }
    }

    #[tokio::test]
    async fn no_session_redirects_to_login() {
        let host = StubHost { valid_session: false, granted: vec![], login_calls: Mutex::new(0) };
        let outcome = reconcile(&host, &sample_request(), None, "https://issuer.example/authorize?x").await.unwrap();
        assert!(matches!(outcome, ConsentOutcome::RequireLogin { .. }));
    }

    #[tokio::test]
    async fn prompt_none_without_session_is_login_required_error() {
        let host = StubHost { valid_session: false, granted: vec![], login_calls: Mutex::new(0) };
        let mut request = sample_request();
        request.prompt = vec!["none".to_string()];
        let outcome = reconcile(&host, &request, None, "https://issuer.example/authorize?x").await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn session_with_missing_scope_requires_consent() {
        let host = StubHost { valid_session: true, granted: vec![], login_calls: Mutex::new(0) };
        let outcome = reconcile(&host, &sample_request(), Some("usr-1"), "https://issuer.example/authorize?x")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ConsentOutcome::RequireConsent {
                subject: "usr-1".to_string(),
                missing_scopes: vec!["openid".to_string()],
                amr: vec!["pwd".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn session_with_granted_scopes_proceeds() {
        let host = StubHost { valid_session: true, granted: vec!["openid".to_string()], login_calls: Mutex::new(0) };
        let outcome = reconcile(&host, &sample_request(), Some("usr-1"), "https://issuer.example/authorize?x")
            .await
            .unwrap();
        assert_eq!(outcome, ConsentOutcome::Proceed { subject: "usr-1".to_string(), amr: vec!["pwd".to_string()] });
    }
}
