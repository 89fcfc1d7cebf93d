//! Lifecycle actions and command results.

use crate::error::ProvenanceError;
use crate::types::{
    ActorId, ActorType, BatchId, CorrelationId, GeoPoint, Identity, MetadataHash, Quantity, Role,
    Stage,
};

/// A requested lifecycle transition.
///
/// Vocabulary fields arrive as raw strings and are parsed during validation,
/// so an unknown value is rejected before anything is submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Create a batch at `Harvested`
    Harvest {
        /// Farmer creating the batch
        farmer_id: ActorId,
        /// Harvest location
        location: GeoPoint,
        /// Harvest method label
        method: String,
    },
    /// Move a batch to `Processed`
    Process {
        /// Target batch
        batch_id: BatchId,
        /// Processor
        processor_id: ActorId,
        /// Processing location
        location: GeoPoint,
        /// Processed quantity
        quantity: Quantity,
    },
    /// Move a batch to `Packaged`
    Package {
        /// Target batch
        batch_id: BatchId,
        /// Packager
        packager_id: ActorId,
        /// Packaging location
        location: GeoPoint,
        /// Packaged quantity
        quantity: Quantity,
    },
    /// Hand a batch to a distributor
    Distribute {
        /// Target batch
        batch_id: BatchId,
        /// Distributor taking custody
        distributor_id: ActorId,
        /// Storage location
        location: GeoPoint,
        /// Storage condition label
        storage_condition: String,
        /// Handling label
        handling: String,
    },
    /// Hand a batch to a retailer
    Retail {
        /// Target batch
        batch_id: BatchId,
        /// Retailer receiving the goods
        retailer_id: ActorId,
        /// Store location
        location: GeoPoint,
        /// Received quantity
        quantity: Quantity,
    },
}

impl Transition {
    /// Stage the batch is in after the transition commits.
    #[must_use]
    pub const fn target_stage(&self) -> Stage {
        match self {
            Self::Harvest { .. } => Stage::Harvested,
            Self::Process { .. } => Stage::Processed,
            Self::Package { .. } => Stage::Packaged,
            Self::Distribute { .. } => Stage::AtDistributors,
            Self::Retail { .. } => Stage::AtRetailers,
        }
    }

    /// Existing batch the transition applies to, `None` for a creation.
    #[must_use]
    pub const fn batch_id(&self) -> Option<BatchId> {
        match self {
            Self::Harvest { .. } => None,
            Self::Process { batch_id, .. }
            | Self::Package { batch_id, .. }
            | Self::Distribute { batch_id, .. }
            | Self::Retail { batch_id, .. } => Some(*batch_id),
        }
    }

    /// Role and actor the committed batch is indexed under.
    #[must_use]
    pub const fn assignee(&self) -> (Role, ActorId) {
        match self {
            Self::Harvest { farmer_id, .. } => (Role::Farmer, *farmer_id),
            Self::Process { processor_id, .. } => (Role::Processor, *processor_id),
            Self::Package { packager_id, .. } => (Role::Packager, *packager_id),
            Self::Distribute { distributor_id, .. } => (Role::Distributor, *distributor_id),
            Self::Retail { retailer_id, .. } => (Role::Retailer, *retailer_id),
        }
    }

    /// Actor type the assignee must be registered as.
    #[must_use]
    pub const fn actor_type(&self) -> ActorType {
        self.assignee().0.actor_type()
    }
}

/// Lifecycle actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProvenanceAction {
    // ═══════════════════════════════════════════════════════════
    // Commands
    // ═══════════════════════════════════════════════════════════
    /// Validate a transition and send it for certification
    Submit {
        /// Calling account, must be a company operator
        caller: Identity,
        /// Hash of the stage metadata document
        metadata_hash: MetadataHash,
        /// Requested transition
        transition: Transition,
    },

    /// Deliver the oracle's verdict for a pending request
    Fulfill {
        /// Calling account, must be the oracle integration
        caller: Identity,
        /// Request being answered
        correlation_id: CorrelationId,
        /// Verdict bytes
        response: Vec<u8>,
        /// Error bytes, empty on success
        error: Vec<u8>,
    },

    /// Discard every pending request older than the configured time-to-live
    ExpireStale,

    // ═══════════════════════════════════════════════════════════
    // Effect feedback
    // ═══════════════════════════════════════════════════════════
    /// The oracle request could not be dispatched
    OracleUnreachable {
        /// Request that failed to go out
        correlation_id: CorrelationId,
        /// Dispatch error
        detail: String,
    },

    /// A pending request reached its time-to-live
    ExpireRequest {
        /// Request to expire if still live
        correlation_id: CorrelationId,
    },
}

/// Terminal outcome of a fulfilled request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FulfillOutcome {
    /// The snapshot was committed
    Committed {
        /// Created or updated batch
        batch_id: BatchId,
        /// Stage after the commit
        stage: Stage,
        /// `true` if the batch was created
        created: bool,
    },
    /// Error payload or negative verdict; nothing changed
    Rejected {
        /// Target batch, `None` for a creation
        batch_id: Option<BatchId>,
        /// Reported detail
        detail: String,
    },
    /// Approved, but the batch changed since the proposal was built
    Conflicted {
        /// Target batch
        batch_id: BatchId,
        /// Revision mismatch description
        detail: String,
    },
}

impl FulfillOutcome {
    /// Returns `true` if the proposal was applied.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Synchronous result of one command, read back under the store's write lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Receipt {
    /// Submission accepted and a validation request issued
    Submitted(CorrelationId),
    /// Fulfillment processed
    Fulfilled(FulfillOutcome),
    /// Requests discarded by expiry
    Expired(Vec<CorrelationId>),
}

/// Receipt slot contents.
pub type CommandResult = Result<Receipt, ProvenanceError>;
