//! Error types for lifecycle operations.

use crate::providers::access::Capability;
use crate::providers::registry::RegistryError;
use crate::types::{ActorType, BatchId, CorrelationId, Identity, Stage};
use crate::validation::ValidationError;
use batchtrace_runtime::StoreError;
use thiserror::Error;

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, ProvenanceError>;

/// Every way a lifecycle call can fail synchronously.
///
/// A negative oracle verdict is not in here: it is a normal outcome,
/// reported as [`crate::actions::FulfillOutcome::Rejected`] and through the
/// audit stream. Every variant below aborts the call with no state change.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvenanceError {
    // ═══════════════════════════════════════════════════════════
    // Authorization
    // ═══════════════════════════════════════════════════════════

    /// Caller lacks the required capability.
    #[error("Unauthorized: missing capability {0}")]
    Unauthorized(Capability),

    // ═══════════════════════════════════════════════════════════
    // Lookups
    // ═══════════════════════════════════════════════════════════

    /// Referenced batch does not exist.
    #[error("Invalid batch id {0}")]
    InvalidBatchId(BatchId),

    /// Referenced actor is not registered for the type.
    #[error("Unknown {actor_type} {actor_id}")]
    UnknownActor {
        /// Expected actor type
        actor_type: ActorType,
        /// Raw actor id
        actor_id: u64,
    },

    /// Pagination parameter violates its bound.
    #[error("Value {value} out of bounds (limit {limit})")]
    OutOfBounds {
        /// Offending value
        value: usize,
        /// Bound it violated
        limit: usize,
    },

    // ═══════════════════════════════════════════════════════════
    // Protocol
    // ═══════════════════════════════════════════════════════════

    /// Fulfillment references no live pending request.
    ///
    /// Either a duplicate callback or a desync with the oracle integration.
    #[error("Unknown request {0}")]
    UnknownRequest(CorrelationId),

    /// Stage change not allowed by the transition table.
    #[error("Illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Current stage
        from: Stage,
        /// Requested stage
        to: Stage,
    },

    /// Local field validation failed before any request was made.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    // ═══════════════════════════════════════════════════════════
    // Identity and ownership
    // ═══════════════════════════════════════════════════════════

    /// Account already holds an identity of this type.
    #[error("{account} already registered as {actor_type}")]
    DuplicateRegistration {
        /// Registering account
        account: Identity,
        /// Requested actor type
        actor_type: ActorType,
    },

    /// Ownership registry refused the operation.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // ═══════════════════════════════════════════════════════════
    // System
    // ═══════════════════════════════════════════════════════════

    /// The store runtime refused the action.
    #[error("Runtime error: {0}")]
    Runtime(#[from] StoreError),

    /// The reducer produced no result for a command.
    #[error("Command produced no receipt")]
    MissingReceipt,
}

impl ProvenanceError {
    /// Returns `true` for anomalies worth a security log entry.
    #[must_use]
    pub const fn is_security_relevant(&self) -> bool {
        matches!(self, Self::UnknownRequest(_) | Self::Unauthorized(_))
    }
}
