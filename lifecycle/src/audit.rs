//! Observable provenance events for downstream indexers and audit trails.
//!
//! The reducer never publishes directly. It returns a fire-and-forget effect
//! per event, so the audit stream only ever reflects state that was actually
//! applied.

use crate::types::{BatchId, CorrelationId, MetadataHash, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance events.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProvenanceEvent {
    // ═══════════════════════════════════════════════════════════════════════
    // Protocol
    // ═══════════════════════════════════════════════════════════════════════
    /// A transition passed local checks and was sent for validation.
    ValidationRequested {
        /// Correlation id of the pending request
        correlation_id: CorrelationId,
        /// Target batch, `None` for a creation
        batch_id: Option<BatchId>,
        /// Hash under review
        metadata_hash: MetadataHash,
        /// When the request was submitted
        timestamp: DateTime<Utc>,
    },

    /// The oracle approved a hash and the change was committed.
    DataCertified {
        /// Committed batch
        batch_id: BatchId,
        /// Certified hash
        metadata_hash: MetadataHash,
        /// Commit time
        timestamp: DateTime<Utc>,
    },

    /// A proposal was discarded: error verdict, negative verdict, conflict
    /// or dispatch failure.
    DataCertificationFailed {
        /// Target batch, `None` for a creation
        batch_id: Option<BatchId>,
        /// Hash that was under review
        metadata_hash: MetadataHash,
        /// Why the proposal was discarded
        error_detail: String,
        /// When it was discarded
        timestamp: DateTime<Utc>,
    },

    /// A pending request outlived its time-to-live.
    RequestExpired {
        /// Correlation id of the expired request
        correlation_id: CorrelationId,
        /// Target batch, `None` for a creation
        batch_id: Option<BatchId>,
        /// Hash that was under review
        metadata_hash: MetadataHash,
        /// When it expired
        timestamp: DateTime<Utc>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Batch
    // ═══════════════════════════════════════════════════════════════════════
    /// A new batch was committed.
    BatchCreated {
        /// New batch id
        batch_id: BatchId,
        /// Certified hash
        metadata_hash: MetadataHash,
        /// Commit time
        timestamp: DateTime<Utc>,
    },

    /// An existing batch moved to a new stage.
    BatchStageUpdated {
        /// Updated batch
        batch_id: BatchId,
        /// Stage after the commit
        stage: Stage,
        /// Certified hash
        metadata_hash: MetadataHash,
        /// Commit time
        timestamp: DateTime<Utc>,
    },
}

impl ProvenanceEvent {
    /// Stable event type name.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::ValidationRequested { .. } => "ValidationRequested",
            Self::DataCertified { .. } => "DataCertified",
            Self::DataCertificationFailed { .. } => "DataCertificationFailed",
            Self::RequestExpired { .. } => "RequestExpired",
            Self::BatchCreated { .. } => "BatchCreated",
            Self::BatchStageUpdated { .. } => "BatchStageUpdated",
        }
    }
}

/// Destination for provenance events.
pub trait AuditSink: Send + Sync {
    /// Publish one event. Must not fail; sinks log their own delivery problems.
    fn publish(&self, event: ProvenanceEvent);
}

/// Audit sink that writes every event to the `batchtrace::audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn publish(&self, event: ProvenanceEvent) {
        match &event {
            ProvenanceEvent::DataCertificationFailed {
                batch_id,
                metadata_hash,
                error_detail,
                ..
            } => {
                tracing::warn!(
                    target: "batchtrace::audit",
                    event_type = event.event_type(),
                    ?batch_id,
                    %metadata_hash,
                    %error_detail,
                    "Certification failed"
                );
            },
            ProvenanceEvent::RequestExpired {
                correlation_id,
                metadata_hash,
                ..
            } => {
                tracing::warn!(
                    target: "batchtrace::audit",
                    event_type = event.event_type(),
                    %correlation_id,
                    %metadata_hash,
                    "Validation request expired"
                );
            },
            other => {
                tracing::info!(
                    target: "batchtrace::audit",
                    event_type = other.event_type(),
                    event = ?other
                );
            },
        }
    }
}
