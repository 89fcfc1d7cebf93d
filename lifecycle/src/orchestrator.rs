//! Public entry point for lifecycle operations.
//!
//! [`LifecycleOrchestrator`] wraps a runtime [`Store`] around the
//! [`LifecycleReducer`]. Mutating operations are dispatched as actions and
//! their results are read back from the receipt slot under the same write
//! lock, so every call observes exactly the state it produced. Queries take
//! the read lock and only ever see committed data.
//!
//! # Example
//!
//! ```ignore
//! let orchestrator = LifecycleOrchestrator::new(environment);
//!
//! let correlation_id = orchestrator
//!     .create_harvested_batch(&operator, farmer, location, "Hand Picking", hash)
//!     .await?;
//!
//! // Later, from the oracle integration
//! let outcome = orchestrator
//!     .fulfill(&integration, correlation_id, b"true", b"")
//!     .await?;
//! ```

use crate::actions::{FulfillOutcome, ProvenanceAction, Receipt, Transition};
use crate::batch::Batch;
use crate::environment::ProvenanceEnvironment;
use crate::error::{ProvenanceError, Result};
use crate::event_log::{DistributionEvent, RetailEvent};
use crate::pending::ValidationRequest;
use crate::reducer::LifecycleReducer;
use crate::state::ProvenanceState;
use crate::types::{
    ActorId, BatchId, CorrelationId, EventId, GeoPoint, Identity, MetadataHash, Quantity, Role,
};
use batchtrace_runtime::{Store, StoreError};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::broadcast;

/// Store specialised to the lifecycle reducer.
pub type ProvenanceStore =
    Store<ProvenanceState, ProvenanceAction, ProvenanceEnvironment, LifecycleReducer>;

/// Lifecycle orchestrator.
///
/// Cloning is cheap and yields a handle to the same state.
#[derive(Clone)]
pub struct LifecycleOrchestrator {
    store: ProvenanceStore,
}

impl LifecycleOrchestrator {
    /// Create an orchestrator with empty state.
    #[must_use]
    pub fn new(environment: ProvenanceEnvironment) -> Self {
        Self::with_state(ProvenanceState::new(), environment)
    }

    /// Create an orchestrator over existing state.
    #[must_use]
    pub fn with_state(state: ProvenanceState, environment: ProvenanceEnvironment) -> Self {
        Self {
            store: Store::with_broadcast_capacity(state, LifecycleReducer::new(), environment, 256),
        }
    }

    /// Borrow the environment.
    #[must_use]
    pub fn environment(&self) -> &ProvenanceEnvironment {
        self.store.environment()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Transitions
    // ═══════════════════════════════════════════════════════════════════════

    /// Propose a new batch at `Harvested` for `farmer_id`.
    ///
    /// Returns once local validation passed and the oracle request is under
    /// way. The batch exists only after the request is fulfilled with an
    /// approval.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, `UnknownActor` or `Validation`; nothing is submitted.
    #[tracing::instrument(skip(self))]
    pub async fn create_harvested_batch(
        &self,
        caller: &Identity,
        farmer_id: ActorId,
        location: GeoPoint,
        method: &str,
        metadata_hash: MetadataHash,
    ) -> Result<CorrelationId> {
        self.submit(
            caller,
            metadata_hash,
            Transition::Harvest {
                farmer_id,
                location,
                method: method.to_string(),
            },
        )
        .await
    }

    /// Propose moving a batch to `Processed`.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, `UnknownActor`, `InvalidBatchId`, `IllegalTransition`
    /// or `Validation`; nothing is submitted.
    #[tracing::instrument(skip(self))]
    pub async fn push_to_processed(
        &self,
        caller: &Identity,
        batch_id: BatchId,
        processor_id: ActorId,
        location: GeoPoint,
        quantity: Quantity,
        metadata_hash: MetadataHash,
    ) -> Result<CorrelationId> {
        self.submit(
            caller,
            metadata_hash,
            Transition::Process {
                batch_id,
                processor_id,
                location,
                quantity,
            },
        )
        .await
    }

    /// Propose moving a batch to `Packaged`.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, `UnknownActor`, `InvalidBatchId`, `IllegalTransition`
    /// or `Validation`; nothing is submitted.
    #[tracing::instrument(skip(self))]
    pub async fn push_to_packaged(
        &self,
        caller: &Identity,
        batch_id: BatchId,
        packager_id: ActorId,
        location: GeoPoint,
        quantity: Quantity,
        metadata_hash: MetadataHash,
    ) -> Result<CorrelationId> {
        self.submit(
            caller,
            metadata_hash,
            Transition::Package {
                batch_id,
                packager_id,
                location,
                quantity,
            },
        )
        .await
    }

    /// Propose handing a batch to a distributor.
    ///
    /// On approval the distributor joins the batch's distributor set and a new
    /// distribution record is appended.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, `UnknownActor`, `InvalidBatchId`, `IllegalTransition`
    /// or `Validation`; nothing is submitted.
    #[tracing::instrument(skip(self))]
    #[allow(clippy::too_many_arguments)]
    pub async fn assign_to_distributor(
        &self,
        caller: &Identity,
        batch_id: BatchId,
        distributor_id: ActorId,
        location: GeoPoint,
        storage_condition: &str,
        handling: &str,
        metadata_hash: MetadataHash,
    ) -> Result<CorrelationId> {
        self.submit(
            caller,
            metadata_hash,
            Transition::Distribute {
                batch_id,
                distributor_id,
                location,
                storage_condition: storage_condition.to_string(),
                handling: handling.to_string(),
            },
        )
        .await
    }

    /// Propose handing a batch to a retailer.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, `UnknownActor`, `InvalidBatchId`, `IllegalTransition`
    /// or `Validation`; nothing is submitted.
    #[tracing::instrument(skip(self))]
    pub async fn assign_to_retailer(
        &self,
        caller: &Identity,
        batch_id: BatchId,
        retailer_id: ActorId,
        location: GeoPoint,
        quantity: Quantity,
        metadata_hash: MetadataHash,
    ) -> Result<CorrelationId> {
        self.submit(
            caller,
            metadata_hash,
            Transition::Retail {
                batch_id,
                retailer_id,
                location,
                quantity,
            },
        )
        .await
    }

    async fn submit(
        &self,
        caller: &Identity,
        metadata_hash: MetadataHash,
        transition: Transition,
    ) -> Result<CorrelationId> {
        let action = ProvenanceAction::Submit {
            caller: caller.clone(),
            metadata_hash,
            transition,
        };
        match self.dispatch(action).await? {
            Receipt::Submitted(correlation_id) => Ok(correlation_id),
            _ => Err(ProvenanceError::MissingReceipt),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Oracle callback and expiry
    // ═══════════════════════════════════════════════════════════════════════

    /// Deliver the oracle's verdict for a pending request.
    ///
    /// A negative verdict is a successful call returning
    /// [`FulfillOutcome::Rejected`].
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless `caller` is the oracle integration, and
    /// `UnknownRequest` if no request is live for `correlation_id`. Neither
    /// changes any state.
    #[tracing::instrument(skip(self, response, error))]
    pub async fn fulfill(
        &self,
        caller: &Identity,
        correlation_id: CorrelationId,
        response: &[u8],
        error: &[u8],
    ) -> Result<FulfillOutcome> {
        let action = ProvenanceAction::Fulfill {
            caller: caller.clone(),
            correlation_id,
            response: response.to_vec(),
            error: error.to_vec(),
        };
        match self.dispatch(action).await? {
            Receipt::Fulfilled(outcome) => Ok(outcome),
            _ => Err(ProvenanceError::MissingReceipt),
        }
    }

    /// Discard every pending request older than the configured time-to-live.
    ///
    /// Without a time-to-live nothing expires.
    ///
    /// # Errors
    ///
    /// Only runtime errors.
    #[tracing::instrument(skip(self))]
    pub async fn expire_stale(&self) -> Result<Vec<CorrelationId>> {
        match self.dispatch(ProvenanceAction::ExpireStale).await? {
            Receipt::Expired(ids) => Ok(ids),
            _ => Err(ProvenanceError::MissingReceipt),
        }
    }

    async fn dispatch(&self, action: ProvenanceAction) -> Result<Receipt> {
        let (receipt, _effects) = self
            .store
            .send_then(action, ProvenanceState::take_receipt)
            .await?;
        receipt.ok_or(ProvenanceError::MissingReceipt)?
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Metadata URI of a committed batch.
    ///
    /// # Errors
    ///
    /// `InvalidBatchId` if the batch has no token.
    pub fn get_batch_metadata_uri(&self, batch_id: BatchId) -> Result<String> {
        self.environment()
            .registry
            .token_uri(batch_id)
            .ok_or(ProvenanceError::InvalidBatchId(batch_id))
    }

    /// A page of metadata URIs in mint order.
    ///
    /// # Errors
    ///
    /// `OutOfBounds` if `page_size` exceeds the configured maximum or
    /// `cursor` is not below the number of batches.
    pub fn list_batch_metadata_uris(&self, cursor: usize, page_size: usize) -> Result<Vec<String>> {
        let env = self.environment();
        let max = env.config.lifecycle.max_page_size;
        if page_size > max {
            return Err(ProvenanceError::OutOfBounds {
                value: page_size,
                limit: max,
            });
        }
        let total = env.registry.total_supply();
        if cursor >= total {
            return Err(ProvenanceError::OutOfBounds {
                value: cursor,
                limit: total,
            });
        }
        let end = cursor.saturating_add(page_size).min(total);
        Ok((cursor..end).filter_map(|index| env.registry.uri_at(index)).collect())
    }

    /// Committed batch.
    ///
    /// # Errors
    ///
    /// `InvalidBatchId` if the batch was never committed.
    pub async fn get_batch(&self, batch_id: BatchId) -> Result<Batch> {
        self.store
            .state(|s| s.batches.get(batch_id).map(|stored| stored.batch.clone()))
            .await
            .ok_or(ProvenanceError::InvalidBatchId(batch_id))
    }

    /// Every distributor that ever held the batch.
    ///
    /// # Errors
    ///
    /// `InvalidBatchId` if the batch was never committed.
    pub async fn get_all_distributors_for_batch(
        &self,
        batch_id: BatchId,
    ) -> Result<BTreeSet<ActorId>> {
        Ok(self.get_batch(batch_id).await?.distributor_ids)
    }

    /// Every retailer that ever held the batch.
    ///
    /// # Errors
    ///
    /// `InvalidBatchId` if the batch was never committed.
    pub async fn get_all_retailers_for_batch(
        &self,
        batch_id: BatchId,
    ) -> Result<BTreeSet<ActorId>> {
        Ok(self.get_batch(batch_id).await?.retailer_ids)
    }

    /// Batches `actor_id` touched in `role`.
    pub async fn get_batches_by_role(&self, role: Role, actor_id: ActorId) -> BTreeSet<BatchId> {
        self.store.state(|s| s.index.batches(role, actor_id)).await
    }

    /// Distribution records authored by a distributor.
    pub async fn get_distribution_event_ids(&self, distributor_id: ActorId) -> BTreeSet<EventId> {
        self.store
            .state(|s| s.index.event_ids(Role::Distributor, distributor_id))
            .await
    }

    /// Retail records authored by a retailer.
    pub async fn get_retail_event_ids(&self, retailer_id: ActorId) -> BTreeSet<EventId> {
        self.store
            .state(|s| s.index.event_ids(Role::Retailer, retailer_id))
            .await
    }

    /// One distribution record.
    pub async fn get_distribution_event(&self, event_id: EventId) -> Option<DistributionEvent> {
        self.store.state(|s| s.events.distribution(event_id).cloned()).await
    }

    /// One retail record.
    pub async fn get_retail_event(&self, event_id: EventId) -> Option<RetailEvent> {
        self.store.state(|s| s.events.retail(event_id).cloned()).await
    }

    /// A live pending request.
    pub async fn pending_request(
        &self,
        correlation_id: CorrelationId,
    ) -> Option<ValidationRequest> {
        self.store.state(|s| s.pending.get(correlation_id).cloned()).await
    }

    /// Number of live pending requests.
    pub async fn pending_count(&self) -> usize {
        self.store.state(|s| s.pending.len()).await
    }

    /// Read arbitrary state under the read lock.
    pub async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&ProvenanceState) -> T,
    {
        self.store.state(f).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Runtime
    // ═══════════════════════════════════════════════════════════════════════

    /// Actions fed back by effects (dispatch failures, expiry timers).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProvenanceAction> {
        self.store.subscribe_actions()
    }

    /// Wait until no effect task is running.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if effects are still running after `timeout`.
    pub async fn wait_for_effects(&self, timeout: Duration) -> std::result::Result<(), StoreError> {
        let idle = async {
            while self.store.pending_effects() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(timeout, idle)
            .await
            .map_err(|_| StoreError::Timeout)
    }

    /// Stop accepting operations and drain running effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects outlive `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> std::result::Result<(), StoreError> {
        self.store.shutdown(timeout).await
    }
}
