//! Lifecycle state.

use crate::actions::CommandResult;
use crate::batch::BatchStore;
use crate::event_log::EventLog;
use crate::index::ParticipationIndex;
use crate::pending::PendingRequestTracker;

/// Everything the lifecycle reducer owns.
///
/// Committed data (`batches`, `events`, `index`) changes only on an approved
/// fulfillment. `pending` changes on every submission and fulfillment.
#[derive(Clone, Debug, Default)]
pub struct ProvenanceState {
    /// Committed batches
    pub batches: BatchStore,
    /// Distribution and retail records
    pub events: EventLog,
    /// Actor reverse lookups
    pub index: ParticipationIndex,
    /// In-flight validation requests
    pub pending: PendingRequestTracker,
    /// Result of the last command, cleared at the start of every action
    pub receipt: Option<CommandResult>,
}

impl ProvenanceState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the result of the command just reduced.
    pub fn take_receipt(&mut self) -> Option<CommandResult> {
        self.receipt.take()
    }
}
