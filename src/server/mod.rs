// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rocket wiring for the authorization server: state management, route
//! mounting, CORS, and the security-header fairing spec §7 asks for on
//! every token/userinfo/introspection response.

pub mod guards;
pub mod routes;

use std::sync::Arc;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Build, Request, Response, Rocket};
use rocket_cors::{AllowedMethods, AllowedOrigins, CorsOptions};

use crate::config::OidcPluginConfig;
use crate::crypto::KeyManager;
use crate::host::Host;
use crate::store::TokenStore;

/// Everything a route handler needs, held behind `Arc`s so Rocket can hand
/// out `&State<AppState>` to every handler without cloning the underlying
/// store/host/keys.
pub struct AppState {
    pub config: OidcPluginConfig,
    pub store: Arc<dyn TokenStore>,
    pub host: Arc<dyn Host>,
    pub keys: Arc<KeyManager>,
}

impl AppState {
    pub fn grant_context(&self) -> crate::flows::GrantContext<'_> {
        crate::flows::GrantContext {
            config: &self.config,
            store: self.store.as_ref(),
            host: self.host.as_ref(),
            keys: &self.keys,
        }
    }
}

/// `Cache-Control: no-store` and friends on every response carrying token
/// material (spec §7: tokens must never be cached by an intermediary).
pub struct SecurityHeaders;

#[rocket::async_trait]
impl Fairing for SecurityHeaders {
    fn info(&self) -> Info {
        Info { name: "security headers", kind: Kind::Response }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_raw_header("Cache-Control", "no-store");
        response.set_raw_header("Pragma", "no-cache");
        response.set_raw_header("Referrer-Policy", "no-referrer");
        response.set_raw_header("X-Content-Type-Options", "nosniff");
    }
}

fn cors_fairing() -> rocket_cors::Cors {
    CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![rocket::http::Method::Get, rocket::http::Method::Post, rocket::http::Method::Delete]
                .into_iter()
                .map(From::from)
                .collect::<AllowedMethods>(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("CORS configuration is static and always valid")
}

/// Build the Rocket instance: `.well-known/openid-configuration` is
/// mounted at the server root per OIDC Discovery 1.0 §4; everything else
/// is mounted under `server.endpoint_prefix`, matching the paths
/// `config.endpoint(name)` advertises in the discovery document.
pub fn build_rocket(figment: rocket::figment::Figment, state: AppState) -> Rocket<Build> {
    let prefix = state.config.server.endpoint_prefix.clone();
    rocket::custom(figment)
        .attach(cors_fairing())
        .attach(SecurityHeaders)
        .manage(state)
        .mount("/", rocket::routes![routes::discovery_document])
        .mount(
            &prefix,
            rocket::routes![
                routes::jwks,
                routes::authorize,
                routes::consent_page,
                routes::consent_approve,
                routes::token,
                routes::userinfo,
                routes::introspect,
                routes::revoke,
                routes::par,
                routes::register_client,
                routes::read_client,
                routes::delete_client,
                routes::device_authorization,
                routes::device_verify_page,
                routes::device_verify_approve,
                routes::end_session,
                routes::check_session_iframe,
            ],
        )
}
