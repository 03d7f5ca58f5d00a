// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! End-to-end HTTP coverage for the authorization code + PKCE flow, plus
//! the one-use refresh token rotation that follows it: `/authorize` with
//! an existing session straight through to `/token`, `/userinfo`, and two
//! `grant_type=refresh_token` exchanges where the second must fail.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use oidc_authority::config::OidcPluginConfig;
use oidc_authority::crypto::{JwtKeyConfig, KeyManager};
use oidc_authority::host::memory::MemoryHost;
use oidc_authority::host::Host;
use oidc_authority::store::memory::MemoryStore;
use oidc_authority::{server, store};
use rocket::http::{ContentType, Cookie, Status};
use rocket::local::asynchronous::Client;
use serde_json::Value;
use sha2::{Digest, Sha256};

fn get_test_figment() -> rocket::figment::Figment {
    rocket::Config::figment()
        .merge(("port", 0))
        .merge(("address", "127.0.0.1"))
        .merge(("log_level", rocket::config::LogLevel::Debug))
}

fn test_keys(config: &OidcPluginConfig) -> KeyManager {
    let key_config = JwtKeyConfig::new_symmetric(config.signing_key.as_bytes(), jsonwebtoken::Algorithm::HS256).unwrap();
    KeyManager::from_single_key("default", key_config).unwrap()
}

fn pkce_pair() -> (String, String) {
    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string();
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let challenge = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize());
    (verifier, challenge)
}

fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(format!("{client_id}:{client_secret}")))
}

async fn build_client() -> (Client, String) {
    let config = OidcPluginConfig::default();
    let host = MemoryHost::new(&config);
    let session_id = host.start_session("usr-admin", vec!["pwd".to_string()]);

    let state = server::AppState {
        keys: Arc::new(test_keys(&config)),
        store: Arc::new(MemoryStore::new()) as Arc<dyn store::TokenStore>,
        host: Arc::new(host) as Arc<dyn Host>,
        config,
    };
    let rocket = server::build_rocket(get_test_figment(), state);
    let client = Client::tracked(rocket).await.expect("valid rocket instance");
    (client, session_id)
}

#[rocket::async_test]
async fn authorization_code_pkce_and_refresh_rotation() {
    let (client, session_id) = build_client().await;
    let (verifier, challenge) = pkce_pair();

    let authorize_path = format!(
        "/oidc/authorize?response_type=code&client_id=demo-client&redirect_uri={}&scope=openid%20profile%20email&state=xyz&code_challenge={}&code_challenge_method=S256",
        urlencoding_like("http://localhost:8080/client/callback"),
        challenge,
    );
    let response = client
        .get(&authorize_path)
        .cookie(Cookie::new("oidc_session", session_id.clone()))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::SeeOther);
    let location = response.headers().get_one("Location").expect("redirect Location header").to_string();
    assert!(location.starts_with("http://localhost:8080/client/callback?"));
    assert!(location.contains("state=xyz"));

    let code = extract_query_param(&location, "code").expect("authorization code in redirect");

    let mut token_form = HashMap::new();
    token_form.insert("grant_type", "authorization_code");
    token_form.insert("code", code.as_str());
    token_form.insert("redirect_uri", "http://localhost:8080/client/callback");
    token_form.insert("code_verifier", verifier.as_str());

    let response = client
        .post("/oidc/token")
        .header(ContentType::Form)
        .header(rocket::http::Header::new("Authorization", basic_auth_header("demo-client", "demo-secret")))
        .body(serde_urlencoded::to_string(&token_form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
    let access_token = body["access_token"].as_str().unwrap().to_string();
    let refresh_token = body["refresh_token"].as_str().unwrap().to_string();
    assert_eq!(body["token_type"].as_str(), Some("Bearer"));

    let response = client
        .get("/oidc/userinfo")
        .header(rocket::http::Header::new("Authorization", format!("Bearer {access_token}")))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let userinfo: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
    assert_eq!(userinfo["sub"].as_str(), Some("usr-admin"));

    let mut refresh_form = HashMap::new();
    refresh_form.insert("grant_type", "refresh_token");
    refresh_form.insert("refresh_token", refresh_token.as_str());
    let response = client
        .post("/oidc/token")
        .header(ContentType::Form)
        .header(rocket::http::Header::new("Authorization", basic_auth_header("demo-client", "demo-secret")))
        .body(serde_urlencoded::to_string(&refresh_form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let rotated: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
    let new_refresh_token = rotated["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(new_refresh_token, refresh_token);

    // Reusing the now-revoked first refresh token must fail (one-use rotation).
    let response = client
        .post("/oidc/token")
        .header(ContentType::Form)
        .header(rocket::http::Header::new("Authorization", basic_auth_header("demo-client", "demo-secret")))
        .body(serde_urlencoded::to_string(&refresh_form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    // The rotated refresh token still works.
    let mut second_refresh_form = HashMap::new();
    second_refresh_form.insert("grant_type", "refresh_token");
    second_refresh_form.insert("refresh_token", new_refresh_token.as_str());
    let response = client
        .post("/oidc/token")
        .header(ContentType::Form)
        .header(rocket::http::Header::new("Authorization", basic_auth_header("demo-client", "demo-secret")))
        .body(serde_urlencoded::to_string(&second_refresh_form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
}

#[rocket::async_test]
async fn authorize_without_session_redirects_to_login() {
    let (client, _session_id) = build_client().await;
    let response = client
        .get("/oidc/authorize?response_type=code&client_id=demo-client&scope=openid")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::SeeOther);
    let location = response.headers().get_one("Location").unwrap();
    assert!(location.contains("/login"));
}

#[rocket::async_test]
async fn token_without_client_authentication_is_rejected() {
    let (client, _session_id) = build_client().await;
    let mut form = HashMap::new();
    form.insert("grant_type", "authorization_code");
    form.insert("code", "whatever");
    let response = client
        .post("/oidc/token")
        .header(ContentType::Form)
        .body(serde_urlencoded::to_string(&form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
}

fn urlencoding_like(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            ':' => "%3A".to_string(),
            '/' => "%2F".to_string(),
            other => other.to_string(),
        })
        .collect()
}

fn extract_query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}
