//! Reverse lookups from actors to the batches and records they touched.
//!
//! The index owns no batch data. It is written only as a side effect of a
//! successful commit, so after every commit it agrees with `BatchStore` and
//! `EventLog`; pending proposals are never visible here.

use crate::types::{ActorId, BatchId, EventId, Role};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which append-only log an event id refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    /// Distribution records
    Distribution,
    /// Retail records
    Retail,
}

/// Secondary index: (role, actor) → batches, and actor → event ids per log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationIndex {
    batches: BTreeMap<(Role, ActorId), BTreeSet<BatchId>>,
    events: BTreeMap<(EventKind, ActorId), BTreeSet<EventId>>,
}

impl ParticipationIndex {
    /// Create an empty index.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            batches: BTreeMap::new(),
            events: BTreeMap::new(),
        }
    }

    /// Record that `actor` touched `batch` in `role`. Repeats are no-ops.
    pub fn record_batch(&mut self, role: Role, actor: ActorId, batch: BatchId) {
        self.batches.entry((role, actor)).or_default().insert(batch);
    }

    /// Record that `actor` authored `event` in the given log.
    pub fn record_event(&mut self, kind: EventKind, actor: ActorId, event: EventId) {
        self.events.entry((kind, actor)).or_default().insert(event);
    }

    /// Batches touched by `actor` in `role`.
    #[must_use]
    pub fn batches(&self, role: Role, actor: ActorId) -> BTreeSet<BatchId> {
        self.batches
            .get(&(role, actor))
            .cloned()
            .unwrap_or_default()
    }

    /// Event ids authored by `actor`.
    ///
    /// Only distributors and retailers author log records; other roles yield
    /// an empty set.
    #[must_use]
    pub fn event_ids(&self, role: Role, actor: ActorId) -> BTreeSet<EventId> {
        let kind = match role {
            Role::Distributor => EventKind::Distribution,
            Role::Retailer => EventKind::Retail,
            Role::Farmer | Role::Processor | Role::Packager => return BTreeSet::new(),
        };
        self.events
            .get(&(kind, actor))
            .cloned()
            .unwrap_or_default()
    }
}
