// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Key management, signing, verification, JWKS publication and JWE
//! encryption (spec C1 / §4.1).
//!
//! A single [`KeyManager`] holds one or more [`KeyEntry`] values keyed by
//! `kid`. Token minting (`token_factory`) asks the manager for the default
//! signing key or a client's `sign_kid` override; `discovery` asks it for
//! the public JWKS document; `client_auth` and `dpop` ask it for thumbprint
//! math.

mod jwe;
mod keys;
pub mod password;
mod thumbprint;

pub use jwe::{decrypt_jwe_compact, decrypt_jwe_symmetric, encrypt_jwe, encrypt_jwe_compact, JweError, JweKeyManagement};
pub use keys::{rsa_public_key_from_jwks, JwtKeyConfig, KeyType};
pub use thumbprint::{calculate_jwk_thumbprint, certificate_thumbprint_s256};

use crate::error::{OidcError, OidcResult};
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{decode, encode, Header, TokenData, Validation};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

/// One signing/verification key plus its published JWK, addressable by
/// `kid` for the `sign_kid`/`jkt`/`x5t#S256` use cases of §4.1.
pub struct KeyEntry {
    pub kid: String,
    pub config: JwtKeyConfig,
    pub public_jwk: Option<Jwk>,
}

/// Holds every signing key the server knows about and the default kid
/// used when a client has no `sign_kid` override.
pub struct KeyManager {
    entries: HashMap<String, KeyEntry>,
    default_kid: String,
}

impl KeyManager {
    /// Build a key manager from a single configured key (the common case:
    /// one HMAC secret or one asymmetric key pair loaded from
    /// [`crate::config::OidcPluginConfig`]).
    pub fn from_single_key(kid: &str, config: JwtKeyConfig) -> OidcResult<Self> {
        let public_jwk = config
            .to_public_jwk(kid)
            .map_err(|e| OidcError::Crypto(e.to_string()))?;
        let mut entries = HashMap::new();
        entries.insert(
            kid.to_string(),
            KeyEntry {
                kid: kid.to_string(),
                config,
                public_jwk,
            },
        );
        Ok(Self {
            entries,
            default_kid: kid.to_string(),
        })
    }

    pub fn add_key(&mut self, kid: &str, config: JwtKeyConfig) -> OidcResult<()> {
        let public_jwk = config
            .to_public_jwk(kid)
            .map_err(|e| OidcError::Crypto(e.to_string()))?;
        self.entries.insert(
            kid.to_string(),
            KeyEntry {
                kid: kid.to_string(),
                config,
                public_jwk,
            },
        );
        Ok(())
    }

    pub fn default_kid(&self) -> &str {
        &self.default_kid
    }

    fn entry(&self, kid: &str) -> OidcResult<&KeyEntry> {
        self.entries
            .get(kid)
            .ok_or_else(|| OidcError::Crypto(format!("unknown signing key id: {kid}")))
    }

    /// Sign `claims` as a compact JWS, using `kid` if given or the default
    /// key otherwise. Sets `header.kid` so verifiers (including this same
    /// manager, for introspection) can select the right key. Header `typ`
    /// defaults to `JWT`; pass `typ` to override it (e.g. `at+jwt` for a
    /// JWT-profile access token per RFC 9068).
    pub fn sign<T: Serialize>(&self, claims: &T, kid: Option<&str>) -> OidcResult<String> {
        self.sign_typed(claims, kid, None)
    }

    pub fn sign_typed<T: Serialize>(&self, claims: &T, kid: Option<&str>, typ: Option<&str>) -> OidcResult<String> {
        let kid = kid.unwrap_or(&self.default_kid);
        let entry = self.entry(kid)?;
        let mut header = Header::new(entry.config.algorithm);
        header.kid = Some(entry.kid.clone());
        if let Some(typ) = typ {
            header.typ = Some(typ.to_string());
        }
        encode(&header, claims, &entry.config.encoding_key)
            .map_err(|e| OidcError::Crypto(format!("failed to sign token: {e}")))
    }

    /// Verify and decode a compact JWS. The `kid` in the token header (if
    /// present) selects the key; otherwise falls back to the default.
    pub fn verify<T: DeserializeOwned>(
        &self,
        token: &str,
        validation: &Validation,
    ) -> OidcResult<TokenData<T>> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| OidcError::Crypto(format!("malformed token header: {e}")))?;
        let kid = header.kid.as_deref().unwrap_or(&self.default_kid);
        let entry = self.entry(kid)?;
        decode::<T>(token, &entry.config.decoding_key, validation)
            .map_err(|e| OidcError::invalid_client(format!("token verification failed: {e}")))
    }

    /// Render the full public JWKS document (spec C11/discovery).
    pub fn public_jwks(&self) -> Vec<Jwk> {
        self.entries
            .values()
            .filter_map(|entry| entry.public_jwk.clone())
            .collect()
    }

    /// The `jkt`/`x5t#S256` thumbprint of the default signing key's public
    /// JWK, for DPoP proof-of-possession binding.
    pub fn default_key_thumbprint(&self) -> OidcResult<String> {
        let entry = self.entry(&self.default_kid)?;
        let jwk = entry
            .public_jwk
            .as_ref()
            .ok_or_else(|| OidcError::Crypto("default key has no public JWK".into()))?;
        calculate_jwk_thumbprint(jwk).map_err(|e| OidcError::Crypto(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::Algorithm;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct Claims {
        sub: String,
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let config = JwtKeyConfig::new_symmetric(b"test-secret-at-least-32-bytes-long", Algorithm::HS256).unwrap();
        let manager = KeyManager::from_single_key("default", config).unwrap();
        let token = manager
            .sign(&Claims { sub: "alice".into() }, None)
            .unwrap();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        let decoded: TokenData<Claims> = manager.verify(&token, &validation).unwrap();
        assert_eq!(decoded.claims.sub, "alice");
    }
}
