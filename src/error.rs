// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Typed domain errors for the authorization server core.
//!
//! Every fallible operation in this crate returns `Result<T, OidcError>`.
//! `OidcError` carries enough information to render the RFC 6749 wire format
//! (`{"error": "...", "error_description": "..."}`), pick an HTTP status,
//! and decide whether the failure belongs on a `/auth` redirect, a `/token`
//! JSON body, or a bare 403/500.

use rocket::http::Status;
use serde::Serialize;
use thiserror::Error;

/// RFC-defined `error` values used across the authorization, token,
/// device, and introspection endpoints (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorCode {
    InvalidRequest,
    InvalidScope,
    InvalidClient,
    InvalidGrant,
    InvalidTarget,
    UnsupportedResponseType,
    UnauthorizedClient,
    AccessDenied,
    InteractionRequired,
    AuthorizationPending,
    SlowDown,
    ExpiredToken,
    LoginRequired,
    ServerError,
    TemporarilyUnavailable,
}

impl ProtocolErrorCode {
    /// The exact RFC wire string for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidScope => "invalid_scope",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidTarget => "invalid_target",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::AccessDenied => "access_denied",
            Self::InteractionRequired => "interaction_required",
            Self::AuthorizationPending => "authorization_pending",
            Self::SlowDown => "slow_down",
            Self::ExpiredToken => "expired_token",
            Self::LoginRequired => "login_required",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
        }
    }

    /// Default HTTP status for this code when returned as a JSON body
    /// (the `/auth` redirect path always uses 302 regardless, per spec §7).
    pub fn default_status(&self) -> Status {
        match self {
            Self::InvalidClient | Self::UnauthorizedClient => Status::Unauthorized,
            Self::ServerError | Self::TemporarilyUnavailable => Status::InternalServerError,
            Self::AuthorizationPending | Self::SlowDown => Status::BadRequest,
            _ => Status::BadRequest,
        }
    }
}

/// Domain error for the authorization-server core (spec §7).
#[derive(Debug, Error)]
pub enum OidcError {
    /// A request failed RFC validation; surfaced with the RFC wire code.
    #[error("{code}: {description}", code = .0.as_str(), description = .1)]
    Protocol(ProtocolErrorCode, String),

    /// An unrecoverable internal failure (panics in dependencies excluded);
    /// surfaced to the caller as `server_error`/500.
    #[error("server error: {0}")]
    Server(String),

    /// A persistence aggregate failed to commit; rolled back and surfaced
    /// as `server_error`/500.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Key generation, signing, or verification failed. Verification
    /// mismatches on caller-supplied tokens are remapped to
    /// `ProtocolErrorCode::InvalidClient`/403 by callers; this variant is
    /// for the remaining (signing, key-loading) crypto failures.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl OidcError {
    pub fn protocol(code: ProtocolErrorCode, description: impl Into<String>) -> Self {
        Self::Protocol(code, description.into())
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::protocol(ProtocolErrorCode::InvalidRequest, description)
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::protocol(ProtocolErrorCode::InvalidGrant, description)
    }

    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::protocol(ProtocolErrorCode::InvalidClient, description)
    }

    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self::protocol(ProtocolErrorCode::InvalidScope, description)
    }

    /// HTTP status this error maps to when rendered as a plain JSON error
    /// body (not a `/auth` redirect — see [`OidcError::as_redirect_fragment`]).
    pub fn http_status(&self) -> Status {
        match self {
            OidcError::Protocol(code, _) => code.default_status(),
            OidcError::Server(_) => Status::InternalServerError,
            OidcError::Persistence(_) => Status::InternalServerError,
            OidcError::Crypto(_) => Status::InternalServerError,
        }
    }

    /// The RFC wire error code, defaulting unmapped internal errors to
    /// `server_error` as spec §7 requires.
    pub fn wire_code(&self) -> &'static str {
        match self {
            OidcError::Protocol(code, _) => code.as_str(),
            _ => ProtocolErrorCode::ServerError.as_str(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            OidcError::Protocol(_, d) => d.clone(),
            OidcError::Server(d) | OidcError::Persistence(d) | OidcError::Crypto(d) => d.clone(),
        }
    }

    /// Render as the `{error, error_description}` JSON body used by
    /// `/token`, `/par`, `/device_authorization` and `/register`.
    pub fn as_wire_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.wire_code().to_string(),
            error_description: self.description(),
        }
    }
}

/// RFC 6749 §5.2 error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_description: String,
}

pub type OidcResult<T> = Result<T, OidcError>;
