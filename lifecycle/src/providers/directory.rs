//! Actor identities.
//!
//! Identities are soul-bound: the registry can mint them and answer queries
//! about them, and nothing else. There is no operation that moves an identity
//! to another account.

use crate::error::ProvenanceError;
use crate::types::{ActorId, ActorType, Identity, MetadataHash};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Read-only view of registered actors.
pub trait ActorDirectory: Send + Sync {
    /// Returns `true` if `actor_id` is registered as `actor_type`.
    fn exists(&self, actor_type: ActorType, actor_id: ActorId) -> bool;

    /// Metadata hash the actor registered with.
    fn metadata_hash(&self, actor_type: ActorType, actor_id: ActorId) -> Option<MetadataHash>;
}

#[derive(Debug, Clone)]
struct Registration {
    owner: Identity,
    metadata_hash: MetadataHash,
}

#[derive(Debug, Default)]
struct Registrations {
    // Index i holds actor id i + 1; id 0 means "unset".
    by_type: HashMap<ActorType, Vec<Registration>>,
    by_account: HashMap<(Identity, ActorType), ActorId>,
}

/// In-memory identity registry.
///
/// One identity per account per actor type, ids starting at 1 within each type.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    inner: RwLock<Registrations>,
}

impl IdentityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an identity of `actor_type` for `account`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvenanceError::DuplicateRegistration`] if the account
    /// already holds an identity of this type.
    pub fn register(
        &self,
        account: Identity,
        actor_type: ActorType,
        metadata_hash: MetadataHash,
    ) -> Result<ActorId, ProvenanceError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let key = (account, actor_type);
        if inner.by_account.contains_key(&key) {
            return Err(ProvenanceError::DuplicateRegistration {
                account: key.0,
                actor_type,
            });
        }

        let entries = inner.by_type.entry(actor_type).or_default();
        entries.push(Registration {
            owner: key.0.clone(),
            metadata_hash,
        });
        let id = ActorId::new(entries.len() as u64);
        inner.by_account.insert(key, id);

        tracing::debug!(%actor_type, actor_id = %id, "Registered actor identity");
        Ok(id)
    }

    /// The identity `account` holds for `actor_type`.
    #[must_use]
    pub fn identity_of(&self, account: &Identity, actor_type: ActorType) -> Option<ActorId> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_account
            .get(&(account.clone(), actor_type))
            .copied()
    }

    /// Account holding an identity.
    #[must_use]
    pub fn owner_of(&self, actor_type: ActorType, actor_id: ActorId) -> Option<Identity> {
        self.with_registration(actor_type, actor_id, |r| r.owner.clone())
    }

    fn with_registration<T>(
        &self,
        actor_type: ActorType,
        actor_id: ActorId,
        f: impl FnOnce(&Registration) -> T,
    ) -> Option<T> {
        let index = usize::try_from(actor_id.get().checked_sub(1)?).ok()?;
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .by_type
            .get(&actor_type)
            .and_then(|entries| entries.get(index))
            .map(f)
    }
}

impl ActorDirectory for IdentityRegistry {
    fn exists(&self, actor_type: ActorType, actor_id: ActorId) -> bool {
        self.with_registration(actor_type, actor_id, |_| ()).is_some()
    }

    fn metadata_hash(&self, actor_type: ActorType, actor_id: ActorId) -> Option<MetadataHash> {
        self.with_registration(actor_type, actor_id, |r| r.metadata_hash.clone())
    }
}
