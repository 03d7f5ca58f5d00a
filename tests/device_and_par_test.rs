// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! End-to-end HTTP coverage for the device authorization grant (RFC 8628)
//! and Pushed Authorization Requests (RFC 9126).

use std::collections::HashMap;
use std::sync::Arc;

use oidc_authority::config::OidcPluginConfig;
use oidc_authority::crypto::{JwtKeyConfig, KeyManager};
use oidc_authority::host::memory::MemoryHost;
use oidc_authority::host::Host;
use oidc_authority::store::memory::MemoryStore;
use oidc_authority::{server, store};
use base64::Engine;
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use serde_json::Value;

fn basic_auth_header() -> Header<'static> {
    let encoded = base64::engine::general_purpose::STANDARD.encode("demo-client:demo-secret");
    Header::new("Authorization", format!("Basic {encoded}"))
}

fn get_test_figment() -> rocket::figment::Figment {
    rocket::Config::figment()
        .merge(("port", 0))
        .merge(("address", "127.0.0.1"))
        .merge(("log_level", rocket::config::LogLevel::Debug))
}

async fn build_client() -> Client {
    let config = OidcPluginConfig::default();
    let key_config = JwtKeyConfig::new_symmetric(config.signing_key.as_bytes(), jsonwebtoken::Algorithm::HS256).unwrap();
    let state = server::AppState {
        keys: Arc::new(KeyManager::from_single_key("default", key_config).unwrap()),
        store: Arc::new(MemoryStore::new()) as Arc<dyn store::TokenStore>,
        host: Arc::new(MemoryHost::new(&config)) as Arc<dyn Host>,
        config,
    };
    let rocket = server::build_rocket(get_test_figment(), state);
    Client::tracked(rocket).await.expect("valid rocket instance")
}

#[rocket::async_test]
async fn device_flow_polls_pending_then_succeeds_after_approval() {
    let client = build_client().await;

    let mut start_form = HashMap::new();
    start_form.insert("client_id", "demo-client");
    start_form.insert("scope", "openid profile");
    let response = client
        .post("/oidc/device_authorization")
        .header(ContentType::Form)
        .body(serde_urlencoded::to_string(&start_form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let started: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
    let device_code = started["device_code"].as_str().unwrap().to_string();
    let user_code = started["user_code"].as_str().unwrap().to_string();

    let mut poll_form = HashMap::new();
    poll_form.insert("grant_type", "urn:ietf:params:oauth:grant-type:device_code");
    poll_form.insert("device_code", device_code.as_str());
    poll_form.insert("client_id", "demo-client");

    let response = client
        .post("/oidc/token")
        .header(ContentType::Form)
        .header(basic_auth_header())
        .body(serde_urlencoded::to_string(&poll_form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let pending: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
    assert_eq!(pending["error"].as_str(), Some("authorization_pending"));

    let approve_path = format!("/oidc/device/approve?user_code={user_code}&subject=usr-admin&approve=true");
    let response = client.get(&approve_path).dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let response = client
        .post("/oidc/token")
        .header(ContentType::Form)
        .header(basic_auth_header())
        .body(serde_urlencoded::to_string(&poll_form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let minted: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
    assert!(minted["access_token"].as_str().unwrap().len() > 0);

    // The device code is single-use; polling again after success fails.
    let response = client
        .post("/oidc/token")
        .header(ContentType::Form)
        .header(basic_auth_header())
        .body(serde_urlencoded::to_string(&poll_form).unwrap())
        .dispatch()
        .await;
    assert_ne!(response.status(), Status::Ok);
}

#[rocket::async_test]
async fn device_flow_denial_is_reported_as_access_denied() {
    let client = build_client().await;

    let mut start_form = HashMap::new();
    start_form.insert("client_id", "demo-client");
    let response = client
        .post("/oidc/device_authorization")
        .header(ContentType::Form)
        .body(serde_urlencoded::to_string(&start_form).unwrap())
        .dispatch()
        .await;
    let started: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
    let device_code = started["device_code"].as_str().unwrap().to_string();
    let user_code = started["user_code"].as_str().unwrap().to_string();

    let deny_path = format!("/oidc/device/approve?user_code={user_code}&subject=usr-admin&approve=false");
    client.get(&deny_path).dispatch().await;

    let mut poll_form = HashMap::new();
    poll_form.insert("grant_type", "urn:ietf:params:oauth:grant-type:device_code");
    poll_form.insert("device_code", device_code.as_str());
    poll_form.insert("client_id", "demo-client");
    let response = client
        .post("/oidc/token")
        .header(ContentType::Form)
        .header(basic_auth_header())
        .body(serde_urlencoded::to_string(&poll_form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let denied: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
    assert_eq!(denied["error"].as_str(), Some("access_denied"));
}

#[rocket::async_test]
async fn par_push_then_redeem_at_authorize() {
    let client = build_client().await;

    let mut par_form = HashMap::new();
    par_form.insert("response_type", "code");
    par_form.insert("client_id", "demo-client");
    par_form.insert("redirect_uri", "http://localhost:8080/client/callback");
    par_form.insert("scope", "openid");
    par_form.insert("state", "par-state");

    let response = client
        .post("/oidc/par")
        .header(ContentType::Form)
        .body(serde_urlencoded::to_string(&par_form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let pushed: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
    let request_uri = pushed["request_uri"].as_str().unwrap().to_string();
    assert!(request_uri.starts_with("urn:ietf:params:oauth:request_uri:"));

    let authorize_path = format!(
        "/oidc/authorize?response_type=code&client_id=demo-client&request_uri={}",
        urlencoding_like(&request_uri),
    );
    // No session cookie: the redeemed PAR request is valid but still
    // requires login, proving the request_uri round-tripped through
    // validation rather than failing outright.
    let response = client.get(&authorize_path).dispatch().await;
    assert_eq!(response.status(), Status::SeeOther);
    let location = response.headers().get_one("Location").unwrap();
    assert!(location.contains("/login"));

    // A request_uri is single-use; redeeming it again fails.
    let response = client.get(&authorize_path).dispatch().await;
    assert_eq!(response.status(), Status::BadRequest);
}

fn urlencoding_like(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            ':' => "%3A".to_string(),
            other => other.to_string(),
        })
        .collect()
}
