//! Test doubles for the collaborator traits.
//!
//! Cloning a mock yields a handle to the same recorded data, so a test can keep
//! one clone and hand the other to the environment.

use crate::audit::{AuditSink, ProvenanceEvent};
use crate::providers::{
    AccessGuard, ActorDirectory, Capability, OracleError, OracleRequest, ValidationOracle,
};
use crate::types::{ActorId, ActorType, Identity, MetadataHash};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, PoisonError};

/// Oracle that accepts every request and remembers it.
#[derive(Debug, Clone, Default)]
pub struct RecordingOracle {
    requests: Arc<Mutex<Vec<OracleRequest>>>,
}

impl RecordingOracle {
    /// Create an oracle with no recorded requests.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent request.
    #[must_use]
    pub fn last(&self) -> Option<OracleRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl ValidationOracle for RecordingOracle {
    fn request(&self, request: OracleRequest) -> BoxFuture<'static, Result<(), OracleError>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        Box::pin(async { Ok(()) })
    }
}

/// Oracle that is never reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingOracle;

impl ValidationOracle for FailingOracle {
    fn request(&self, _request: OracleRequest) -> BoxFuture<'static, Result<(), OracleError>> {
        Box::pin(async { Err(OracleError::Unavailable("connection refused".to_string())) })
    }
}

/// Audit sink that keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    events: Arc<Mutex<Vec<ProvenanceEvent>>>,
}

impl InMemoryAuditLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event published so far.
    #[must_use]
    pub fn events(&self) -> Vec<ProvenanceEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events of one type, in publication order.
    #[must_use]
    pub fn of_type(&self, event_type: &str) -> Vec<ProvenanceEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.event_type() == event_type)
            .collect()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn publish(&self, event: ProvenanceEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Grants every capability and knows every actor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessGuard for AllowAll {
    fn has_capability(&self, _capability: Capability, _caller: &Identity) -> bool {
        true
    }
}

impl ActorDirectory for AllowAll {
    fn exists(&self, _actor_type: ActorType, actor_id: ActorId) -> bool {
        actor_id.get() != 0
    }

    fn metadata_hash(&self, actor_type: ActorType, actor_id: ActorId) -> Option<MetadataHash> {
        Some(MetadataHash::new(format!("{actor_type}-{}", actor_id.get())))
    }
}
