// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Subject identifier resolution (spec C3): public `sub` passthrough, or
//! per-sector pairwise pseudonymous identifiers (OIDC Core §8.1) persisted
//! in `store::TokenStore`.

use rand::Rng;

use crate::store::{SubjectIdentifier, TokenStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectType {
    Public,
    Pairwise,
}

/// Resolve the `sub` claim value for a given local user and client,
/// honoring the client's configured subject type.
pub async fn resolve_subject(
    store: &dyn TokenStore,
    subject_type: SubjectType,
    local_subject: &str,
    sector_identifier: &str,
) -> anyhow::Result<String> {
    match subject_type {
        SubjectType::Public => Ok(local_subject.to_string()),
        SubjectType::Pairwise => {
            if let Some(existing) = store
                .get_pairwise_subject(sector_identifier, local_subject)
                .await?
            {
                return Ok(existing);
            }
            let pairwise = generate_pairwise_identifier();
            store
                .put_subject_identifier(SubjectIdentifier {
                    sector_identifier: sector_identifier.to_string(),
                    local_subject: local_subject.to_string(),
                    pairwise_subject: pairwise.clone(),
                })
                .await?;
            Ok(pairwise)
        }
    }
}

/// A fresh, unguessable pairwise identifier. Not derived deterministically
/// from the sector+subject pair (that would make it reversible with
/// enough sector URIs) — instead generated once and persisted, like the
/// teacher's `default_session_secret` random-bytes idiom.
fn generate_pairwise_identifier() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn public_subject_is_passthrough() {
        let store = MemoryStore::new();
        let sub = resolve_subject(&store, SubjectType::Public, "usr-1", "client.example").await.unwrap();
        assert_eq!(sub, "usr-1");
    }

    #[tokio::test]
    async fn pairwise_subject_is_stable_across_calls() {
        let store = MemoryStore::new();
        let first = resolve_subject(&store, SubjectType::Pairwise, "usr-1", "client.example").await.unwrap();
        let second = resolve_subject(&store, SubjectType::Pairwise, "usr-1", "client.example").await.unwrap();
        assert_eq!(first, second);
        assert_ne!(first, "usr-1");
    }

    #[tokio::test]
    async fn pairwise_subject_differs_per_sector() {
        let store = MemoryStore::new();
        let a = resolve_subject(&store, SubjectType::Pairwise, "usr-1", "a.example").await.unwrap();
        let b = resolve_subject(&store, SubjectType::Pairwise, "usr-1", "b.example").await.unwrap();
        assert_ne!(a, b);
    }
}
