//! In-flight validation requests keyed by correlation id.
//!
//! A [`ValidationRequest`] carries the full speculative batch snapshot plus
//! everything needed to commit or discard it once the oracle answers. At most
//! one record exists per correlation id, and a live id is never handed out
//! again. Several requests may target the same batch at once.

use crate::batch::Batch;
use crate::error::ProvenanceError;
use crate::event_log::LogAppend;
use crate::types::{ActorId, BatchId, CorrelationId, Identity, MetadataHash, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a pending request will do to the batch store when approved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proposal {
    /// Create a new batch under the next id
    Create,
    /// Replace an existing batch
    Update {
        /// Target batch
        batch_id: BatchId,
        /// Revision the snapshot was built on
        base_revision: u64,
    },
}

/// A speculative change waiting for the external verdict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// Create or update
    pub proposal: Proposal,
    /// Caller that submitted the transition
    pub requester: Identity,
    /// Batch state to commit on approval
    pub snapshot: Batch,
    /// Hash under review
    pub metadata_hash: MetadataHash,
    /// Log record to append on approval (distribution and retail only)
    pub append: Option<LogAppend>,
    /// Actor to index under the new stage
    pub assignee: (Role, ActorId),
    /// When the request was submitted
    pub submitted_at: DateTime<Utc>,
}

impl ValidationRequest {
    /// Returns `true` if approval creates a batch.
    #[must_use]
    pub const fn is_new_creation(&self) -> bool {
        matches!(self.proposal, Proposal::Create)
    }

    /// Target batch, `None` for a creation.
    #[must_use]
    pub const fn target_batch_id(&self) -> Option<BatchId> {
        match self.proposal {
            Proposal::Create => None,
            Proposal::Update { batch_id, .. } => Some(batch_id),
        }
    }
}

/// Result of matching an oracle reply to its pending request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Response equals the approval sentinel and no error was reported
    Approved(ValidationRequest),
    /// Error payload or negative verdict; the request is gone
    Rejected {
        /// The discarded request
        request: ValidationRequest,
        /// Error text, or a description of the negative response
        detail: String,
    },
}

/// Holds pending requests and allocates correlation ids.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequestTracker {
    requests: BTreeMap<CorrelationId, ValidationRequest>,
    next: u64,
}

impl PendingRequestTracker {
    /// Create an empty tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            requests: BTreeMap::new(),
            next: 0,
        }
    }

    /// Store a request under a fresh correlation id.
    ///
    /// Ids come from a wrapping counter that skips any id still live, so a
    /// live id is never reused even after the counter wraps.
    pub fn submit(&mut self, request: ValidationRequest) -> CorrelationId {
        let mut id = CorrelationId::new(self.next);
        while self.requests.contains_key(&id) {
            self.next = self.next.wrapping_add(1);
            id = CorrelationId::new(self.next);
        }
        self.next = self.next.wrapping_add(1);
        self.requests.insert(id, request);
        id
    }

    /// Consume the request for `id` and classify the oracle reply.
    ///
    /// The record is removed whatever the verdict.
    ///
    /// # Errors
    ///
    /// Returns [`ProvenanceError::UnknownRequest`] if no record is live for `id`.
    pub fn fulfill(
        &mut self,
        id: CorrelationId,
        response: &[u8],
        error: &[u8],
        approval_sentinel: &[u8],
    ) -> Result<Verdict, ProvenanceError> {
        let request = self
            .requests
            .remove(&id)
            .ok_or(ProvenanceError::UnknownRequest(id))?;

        if !error.is_empty() {
            return Ok(Verdict::Rejected {
                request,
                detail: String::from_utf8_lossy(error).into_owned(),
            });
        }
        if response != approval_sentinel {
            return Ok(Verdict::Rejected {
                request,
                detail: format!(
                    "negative verdict: {}",
                    String::from_utf8_lossy(response)
                ),
            });
        }
        Ok(Verdict::Approved(request))
    }

    /// Drop a request without a verdict (dispatch failure, expiry).
    pub fn discard(&mut self, id: CorrelationId) -> Option<ValidationRequest> {
        self.requests.remove(&id)
    }

    /// Look at a live request.
    #[must_use]
    pub fn get(&self, id: CorrelationId) -> Option<&ValidationRequest> {
        self.requests.get(&id)
    }

    /// Live requests submitted at or before `cutoff`, oldest id first.
    #[must_use]
    pub fn submitted_before(&self, cutoff: DateTime<Utc>) -> Vec<CorrelationId> {
        self.requests
            .iter()
            .filter(|(_, request)| request.submitted_at <= cutoff)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of live requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns `true` if nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
