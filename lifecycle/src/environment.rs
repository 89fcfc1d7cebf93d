//! Lifecycle environment.
//!
//! Everything the reducer needs from the outside world, injected as trait
//! objects so production adapters and test doubles are interchangeable.

use crate::audit::{AuditSink, TracingAuditSink};
use crate::config::ProvenanceConfig;
use crate::providers::{
    AccessGuard, ActorDirectory, IdentityRegistry, OwnershipRegistry, RoleTable, TokenLedger,
    ValidationOracle,
};
use batchtrace_core::environment::{Clock, SystemClock};
use std::sync::Arc;

/// Lifecycle environment.
#[derive(Clone)]
pub struct ProvenanceEnvironment {
    /// Time source for date validation and event timestamps.
    pub clock: Arc<dyn Clock>,

    /// Capability checks for operators and the oracle integration.
    pub access: Arc<dyn AccessGuard>,

    /// Registered actors.
    pub directory: Arc<dyn ActorDirectory>,

    /// Batch tokens and metadata URIs.
    pub registry: Arc<dyn OwnershipRegistry>,

    /// External validation oracle.
    pub oracle: Arc<dyn ValidationOracle>,

    /// Audit event destination.
    pub audit: Arc<dyn AuditSink>,

    /// Immutable configuration.
    pub config: Arc<ProvenanceConfig>,
}

impl ProvenanceEnvironment {
    /// Create an environment around an oracle.
    ///
    /// Defaults: system clock, empty [`RoleTable`], empty [`IdentityRegistry`],
    /// empty [`TokenLedger`], [`TracingAuditSink`]. An empty role table denies
    /// every call, so production setups replace `access` with a populated one.
    #[must_use]
    pub fn new(config: ProvenanceConfig, oracle: Arc<dyn ValidationOracle>) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            access: Arc::new(RoleTable::new()),
            directory: Arc::new(IdentityRegistry::new()),
            registry: Arc::new(TokenLedger::new()),
            oracle,
            audit: Arc::new(TracingAuditSink),
            config: Arc::new(config),
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the access guard.
    #[must_use]
    pub fn with_access(mut self, access: Arc<dyn AccessGuard>) -> Self {
        self.access = access;
        self
    }

    /// Replace the actor directory.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn ActorDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Replace the ownership registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn OwnershipRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }
}
