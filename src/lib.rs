// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # OIDC/OAuth2 authorization server plugin
//!
//! A pluggable OpenID Connect / OAuth 2.0 authorization server: every grant
//! type RFC 6749/7636/8628 define, PAR, DPoP, dynamic client registration,
//! introspection and revocation, built to run inside a host SSO server that
//! supplies its own user directory and session store through the [`host`]
//! trait.
//!
//! ## Main components
//!
//! - **crypto**: signing keys, JWKS publication, JWE encryption
//! - **flows**: one module per grant type, wiring everything else together
//! - **server**: the Rocket HTTP surface
//! - **host**: the trait contract this plugin needs from its surrounding
//!   server, plus an in-memory reference implementation for the demo binary
//!   and test suite
//!
//! ## Binaries
//!
//! - **main**: a standalone demo server booting the plugin against the
//!   in-memory host and store

/// Build and version information for maintenance and debugging.
///
/// Provides access to Git commit hashes, build timestamps, and other metadata
/// useful for tracking exact versions in deployed systems.
pub mod build_info;

/// Client authentication (spec C8): `none`, `client_secret_basic`,
/// `client_secret_post`, `client_secret_jwt`, `private_key_jwt`,
/// `tls_client_auth`.
pub mod client_auth;

/// Claim and scope assembly for ID tokens and `/userinfo`.
pub mod claims;

/// Configuration: registered clients, users, and the grant/endpoint policy
/// flags that shape this plugin's behavior.
pub mod config;

/// Session/consent reconciliation for `/authorize`.
pub mod consent;

/// Signing keys, JWKS publication, and JWE encryption.
pub mod crypto;

/// Dynamic client registration (RFC 7591/7592).
pub mod dcr;

/// DPoP proof-of-possession verification (RFC 9449).
pub mod dpop;

/// OIDC Discovery 1.0: `.well-known/openid-configuration` and the JWKS
/// document it advertises.
pub mod discovery;

/// Typed domain errors shared by every module.
pub mod error;

/// Grant engines: one module per OAuth2/OIDC flow.
pub mod flows;

/// The host framework contract this plugin needs from its surrounding SSO
/// server, plus an in-memory reference implementation.
pub mod host;

/// Token introspection (RFC 7662) and revocation (RFC 7009).
pub mod introspect;

/// Pushed Authorization Requests (RFC 9126).
pub mod par;

/// Authorization/PAR request parsing and validation.
pub mod request;

/// The Rocket HTTP surface: state, routes, guards, and fairings.
pub mod server;

/// Token and grant persistence, backed by an in-memory reference store.
pub mod store;

/// OIDC Core §8 subject type resolution (public/pairwise).
pub mod subject;

/// Token minting: authorization codes, refresh tokens, access tokens, ID
/// tokens.
pub mod token_factory;
