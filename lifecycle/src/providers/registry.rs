//! Batch token ownership and metadata URIs.

use crate::types::{BatchId, Identity};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Ownership registry failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A token already exists for the batch
    #[error("Token for {0} already minted")]
    AlreadyMinted(BatchId),

    /// No token exists for the batch
    #[error("Token for {0} not minted")]
    NotMinted(BatchId),
}

/// Ownership registry.
///
/// One enumerable, URI-carrying token per batch. Implementations use interior
/// mutability: they are only written from the reducer, which already runs
/// under the store's write lock.
pub trait OwnershipRegistry: Send + Sync {
    /// Mint the token for a new batch.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyMinted`] if the batch has a token.
    fn mint(&self, batch_id: BatchId, owner: Identity, uri: String) -> Result<(), RegistryError>;

    /// Replace the metadata URI of an existing token.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotMinted`] if the batch has no token.
    fn set_metadata(&self, batch_id: BatchId, uri: String) -> Result<(), RegistryError>;

    /// Returns `true` if the batch has a token.
    fn exists(&self, batch_id: BatchId) -> bool;

    /// Account owning the batch token.
    fn owner_of(&self, batch_id: BatchId) -> Option<Identity>;

    /// Current metadata URI.
    fn token_uri(&self, batch_id: BatchId) -> Option<String>;

    /// Number of minted tokens.
    fn total_supply(&self) -> usize;

    /// URI of the token at `index` in mint order.
    fn uri_at(&self, index: usize) -> Option<String>;
}

#[derive(Debug, Clone)]
struct Token {
    owner: Identity,
    uri: String,
}

#[derive(Debug, Default)]
struct Ledger {
    tokens: HashMap<BatchId, Token>,
    mint_order: Vec<BatchId>,
}

/// In-memory ownership registry.
#[derive(Debug, Default)]
pub struct TokenLedger {
    inner: RwLock<Ledger>,
}

impl TokenLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OwnershipRegistry for TokenLedger {
    fn mint(&self, batch_id: BatchId, owner: Identity, uri: String) -> Result<(), RegistryError> {
        let mut ledger = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if ledger.tokens.contains_key(&batch_id) {
            return Err(RegistryError::AlreadyMinted(batch_id));
        }
        ledger.tokens.insert(batch_id, Token { owner, uri });
        ledger.mint_order.push(batch_id);
        Ok(())
    }

    fn set_metadata(&self, batch_id: BatchId, uri: String) -> Result<(), RegistryError> {
        let mut ledger = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let token = ledger
            .tokens
            .get_mut(&batch_id)
            .ok_or(RegistryError::NotMinted(batch_id))?;
        token.uri = uri;
        Ok(())
    }

    fn exists(&self, batch_id: BatchId) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tokens
            .contains_key(&batch_id)
    }

    fn owner_of(&self, batch_id: BatchId) -> Option<Identity> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tokens
            .get(&batch_id)
            .map(|token| token.owner.clone())
    }

    fn token_uri(&self, batch_id: BatchId) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tokens
            .get(&batch_id)
            .map(|token| token.uri.clone())
    }

    fn total_supply(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .mint_order
            .len()
    }

    fn uri_at(&self, index: usize) -> Option<String> {
        let ledger = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let batch_id = ledger.mint_order.get(index)?;
        ledger.tokens.get(batch_id).map(|token| token.uri.clone())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code

    use super::*;

    #[test]
    fn mint_then_update_uri() {
        let ledger = TokenLedger::new();
        let batch = BatchId::new(0);
        ledger
            .mint(batch, Identity::new("operator"), "ipfs://h1".into())
            .unwrap();
        ledger.set_metadata(batch, "ipfs://h2".into()).unwrap();

        assert_eq!(ledger.token_uri(batch).as_deref(), Some("ipfs://h2"));
        assert_eq!(ledger.uri_at(0).as_deref(), Some("ipfs://h2"));
        assert_eq!(ledger.owner_of(batch), Some(Identity::new("operator")));
        assert_eq!(ledger.total_supply(), 1);
    }

    #[test]
    fn double_mint_and_unknown_update_fail() {
        let ledger = TokenLedger::new();
        let batch = BatchId::new(4);
        ledger.mint(batch, Identity::new("op"), "u".into()).unwrap();

        assert_eq!(
            ledger.mint(batch, Identity::new("op"), "u".into()),
            Err(RegistryError::AlreadyMinted(batch))
        );
        assert_eq!(
            ledger.set_metadata(BatchId::new(5), "u".into()),
            Err(RegistryError::NotMinted(BatchId::new(5)))
        );
        assert!(!ledger.exists(BatchId::new(5)));
        assert_eq!(ledger.uri_at(1), None);
    }
}
