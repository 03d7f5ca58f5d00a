// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rocket request guards: bearer token extraction, a raw `DPoP` proof
//! header, and an mTLS client-certificate guard for `tls_client_auth`
//! (RFC 8705 §2.1.2). Grounded on the teacher's `OAuthBearer` guard,
//! generalized to hand back the raw token instead of a decoded
//! `UserSysInfo` — decoding is this plugin's own job, not the guard's.

use jsonwebtoken::{Algorithm, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::{Request, State};

use super::AppState;
use crate::token_factory::AccessTokenClaims;

/// The raw bearer token presented on `Authorization: Bearer <token>`,
/// undecoded — callers hand it to `introspect`/`userinfo` themselves.
pub struct BearerToken(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BearerToken {
    type Error = &'static str;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.headers().get_one("Authorization") {
            None => Outcome::Error((Status::Unauthorized, "missing Authorization header")),
            Some(header) => match header.strip_prefix("Bearer ") {
                Some(token) if !token.is_empty() => Outcome::Success(BearerToken(token.to_string())),
                _ => Outcome::Error((Status::Unauthorized, "Authorization header is not a Bearer token")),
            },
        }
    }
}

/// A verified access token plus the scopes it carries, for endpoints that
/// gate on scope membership rather than just "some bearer token was
/// presented" (the job [`BearerToken`] leaves to its caller). Grounded on
/// the teacher's `OAuthBearer` guard, generalized from permission strings
/// to OAuth2 scopes.
pub struct ScopedBearer {
    pub claims: AccessTokenClaims,
    pub token: String,
    scopes: Vec<String>,
}

impl ScopedBearer {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ScopedBearer {
    type Error = &'static str;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let bearer = match BearerToken::from_request(request).await {
            Outcome::Success(bearer) => bearer,
            Outcome::Error(e) => return Outcome::Error(e),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };
        let state = match request.guard::<&State<AppState>>().await {
            Outcome::Success(state) => state,
            _ => return Outcome::Error((Status::InternalServerError, "missing AppState")),
        };
        let validation = Validation::new(Algorithm::HS256);
        match state.keys.verify::<AccessTokenClaims>(&bearer.0, &validation) {
            Ok(data) => {
                let scopes = data.claims.scope.split_whitespace().map(str::to_string).collect();
                Outcome::Success(ScopedBearer { claims: data.claims, token: bearer.0, scopes })
            }
            Err(_) => Outcome::Error((Status::Unauthorized, "invalid or expired access token")),
        }
    }
}

/// A `DPoP` proof header, present only on requests using proof-of-possession
/// (RFC 9449 §4). Absent is not an error at the guard level — whether it's
/// required depends on `config.dpop_required` and is checked by the handler.
pub struct DpopProof(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for DpopProof {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(DpopProof(request.headers().get_one("DPoP").map(str::to_string)))
    }
}

/// The client certificate subject DN for `tls_client_auth` (RFC 8705
/// §2.1.2). Rocket does not terminate client TLS itself; this guard reads
/// the subject DN forwarded by a trusted reverse proxy terminating mTLS,
/// the same pattern nginx's `$ssl_client_s_dn` / Envoy's
/// `x-forwarded-client-cert` headers are designed for. Absent is not an
/// error — most clients don't use `tls_client_auth`.
pub struct MutualTlsSubject(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MutualTlsSubject {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(MutualTlsSubject(request.headers().get_one("X-SSL-Client-S-DN").map(str::to_string)))
    }
}
