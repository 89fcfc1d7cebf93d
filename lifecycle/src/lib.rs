//! # Batchtrace Lifecycle
//!
//! Provenance tracking for batches moving through a multi-party supply chain.
//!
//! Every stage transition is bound to an off-chain metadata hash that must be
//! approved by an external validation oracle before it becomes canonical.
//!
//! ## Components
//!
//! - [`validation`]: stateless field checks and the stage transition table
//! - [`pending`]: in-flight validation requests keyed by correlation id
//! - [`batch`] and [`event_log`]: committed batches and append-only records
//! - [`index`]: actor to batch and actor to record reverse lookups
//! - [`reducer`]: the lifecycle state machine and the validate-then-commit protocol
//! - [`orchestrator`]: the public async API over a runtime store
//! - [`providers`]: access, identity, ownership and oracle collaborators
//!
//! ## Flow
//!
//! ```text
//! caller ──► orchestrator ──► validation ──► pending tracker ──► oracle request
//!                                                                    │
//! oracle integration ──► fulfill ──► commit ──► batch store / event log / index
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use batchtrace_lifecycle::{LifecycleOrchestrator, ProvenanceConfig, ProvenanceEnvironment};
//!
//! let env = ProvenanceEnvironment::new(ProvenanceConfig::from_env()?, oracle)
//!     .with_access(role_table)
//!     .with_directory(identities);
//! let orchestrator = LifecycleOrchestrator::new(env);
//!
//! let id = orchestrator
//!     .create_harvested_batch(&operator, farmer, location, "Hand Picking", hash)
//!     .await?;
//! ```

#![deny(missing_docs)]

pub mod actions;
pub mod audit;
pub mod batch;
pub mod config;
pub mod environment;
pub mod error;
pub mod event_log;
pub mod index;
pub mod mocks;
pub mod orchestrator;
pub mod pending;
pub mod providers;
pub mod reducer;
pub mod state;
pub mod types;
pub mod validation;
pub mod vocabulary;

// Re-export main types for convenience
pub use actions::{FulfillOutcome, ProvenanceAction, Receipt, Transition};
pub use audit::{AuditSink, ProvenanceEvent, TracingAuditSink};
pub use batch::{Batch, BatchStore};
pub use config::{ConflictPolicy, LifecycleConfig, OracleConfig, ProvenanceConfig};
pub use environment::ProvenanceEnvironment;
pub use error::{ProvenanceError, Result};
pub use orchestrator::LifecycleOrchestrator;
pub use reducer::LifecycleReducer;
pub use state::ProvenanceState;
pub use types::{
    ActorId, ActorType, BatchId, CorrelationId, EventId, GeoPoint, Identity, MetadataHash,
    Quantity, Role, Stage,
};
