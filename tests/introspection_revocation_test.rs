// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! End-to-end HTTP coverage for client_credentials token minting followed
//! by introspection (RFC 7662) and revocation (RFC 7009).

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use oidc_authority::config::OidcPluginConfig;
use oidc_authority::crypto::{JwtKeyConfig, KeyManager};
use oidc_authority::host::memory::MemoryHost;
use oidc_authority::host::Host;
use oidc_authority::store::memory::MemoryStore;
use oidc_authority::{server, store};
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

async fn mint_client_credentials_token(client: &Client) -> String {
    let mut form = HashMap::new();
    form.insert("grant_type", "client_credentials");
    let response = client
        .post("/oidc/token")
        .header(ContentType::Form)
        .header(basic_auth_header())
        .body(serde_urlencoded::to_string(&form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
    body["access_token"].as_str().unwrap().to_string()
}

#[rocket::async_test]
async fn introspect_then_revoke_then_reintrospect() {
    let client = build_client().await;
    let access_token = mint_client_credentials_token(&client).await;

    let mut introspect_form = HashMap::new();
    introspect_form.insert("token", access_token.as_str());
    let response = client
        .post("/oidc/introspect")
        .header(ContentType::Form)
        .header(basic_auth_header())
        .body(serde_urlencoded::to_string(&introspect_form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let active: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
    assert_eq!(active["active"].as_bool(), Some(true));
    assert_eq!(active["client_id"].as_str(), Some("demo-client"));

    let mut revoke_form = HashMap::new();
    revoke_form.insert("token", access_token.as_str());
    let response = client
        .post("/oidc/revoke")
        .header(ContentType::Form)
        .header(basic_auth_header())
        .body(serde_urlencoded::to_string(&revoke_form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let response = client
        .post("/oidc/introspect")
        .header(ContentType::Form)
        .header(basic_auth_header())
        .body(serde_urlencoded::to_string(&introspect_form).unwrap())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let inactive: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
    assert_eq!(inactive["active"].as_bool(), Some(false));
}

#[rocket::async_test]
async fn introspect_rejects_tokens_belonging_to_another_client() {
    let client = build_client().await;
    let access_token = mint_client_credentials_token(&client).await;

    let encoded = base64::engine::general_purpose::STANDARD.encode("someone-else:wrong-secret");
    let mut introspect_form = HashMap::new();
    introspect_form.insert("token", access_token.as_str());
    let response = client
        .post("/oidc/introspect")
        .header(ContentType::Form)
        .header(Header::new("Authorization", format!("Basic {encoded}")))
        .body(serde_urlencoded::to_string(&introspect_form).unwrap())
        .dispatch()
        .await;
    // "someone-else" is not a registered client, so authentication itself fails.
    assert_eq!(response.status(), Status::Unauthorized);
}
