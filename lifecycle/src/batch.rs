//! Batch records and the committed batch store.
//!
//! `BatchStore` is the only owner of committed batch data. Pending proposals
//! hold their own cloned snapshot until they are committed or discarded.

use crate::types::{ActorId, BatchId, EventId, GeoPoint, MetadataHash, Quantity, Stage};
use crate::vocabulary::HarvestMethod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Harvest record embedded in the batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestEvent {
    /// When the harvest happened
    pub date: DateTime<Utc>,
    /// Where the harvest happened
    pub location: GeoPoint,
    /// How the produce was harvested
    pub method: HarvestMethod,
}

/// Processing record embedded in the batch; replaced on every processing step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingEvent {
    /// When processing happened
    pub date: DateTime<Utc>,
    /// Where processing happened
    pub location: GeoPoint,
    /// Processed quantity
    pub quantity: Quantity,
}

/// Packaging record embedded in the batch; replaced on every packaging step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingEvent {
    /// When packaging happened
    pub date: DateTime<Utc>,
    /// Where packaging happened
    pub location: GeoPoint,
    /// Packaged quantity
    pub quantity: Quantity,
}

/// One traceable production run.
///
/// Distributor and retailer membership only grows: a batch remembers every
/// actor that ever held it, not just the latest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Current lifecycle stage
    pub stage: Stage,
    /// Set once the external validation approved the latest change
    pub certified: bool,
    /// Farmer that created the batch
    pub farmer_id: Option<ActorId>,
    /// Latest processor
    pub processor_id: Option<ActorId>,
    /// Latest packager
    pub packager_id: Option<ActorId>,
    /// Harvest record, present from creation on
    pub harvest: Option<HarvestEvent>,
    /// Latest processing record
    pub processing: Option<ProcessingEvent>,
    /// Latest packaging record
    pub packaging: Option<PackagingEvent>,
    /// Every distributor ever assigned
    pub distributor_ids: BTreeSet<ActorId>,
    /// Every retailer ever assigned
    pub retailer_ids: BTreeSet<ActorId>,
    /// Distribution records that apply to this batch
    pub distribution_event_ids: BTreeSet<EventId>,
    /// Retail records that apply to this batch
    pub retail_event_ids: BTreeSet<EventId>,
}

impl Batch {
    /// An empty, uncertified batch at `Harvested`, used as the base of a creation proposal.
    #[must_use]
    pub const fn unharvested() -> Self {
        Self {
            stage: Stage::Harvested,
            certified: false,
            farmer_id: None,
            processor_id: None,
            packager_id: None,
            harvest: None,
            processing: None,
            packaging: None,
            distributor_ids: BTreeSet::new(),
            retailer_ids: BTreeSet::new(),
            distribution_event_ids: BTreeSet::new(),
            retail_event_ids: BTreeSet::new(),
        }
    }

    /// Fold in every distributor, retailer and record already on `committed`.
    ///
    /// A proposal's snapshot is cloned at submission; commits that landed in
    /// between must not drop membership.
    pub fn absorb_membership(&mut self, committed: &Self) {
        self.distributor_ids
            .extend(committed.distributor_ids.iter().copied());
        self.retailer_ids.extend(committed.retailer_ids.iter().copied());
        self.distribution_event_ids
            .extend(committed.distribution_event_ids.iter().copied());
        self.retail_event_ids
            .extend(committed.retail_event_ids.iter().copied());
    }
}

/// A committed batch plus the bookkeeping the commit guard needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBatch {
    /// Committed batch data
    pub batch: Batch,
    /// Bumped on every commit; proposals remember the revision they were built on
    pub revision: u64,
    /// Hash certified by the latest commit
    pub metadata_hash: MetadataHash,
}

/// Canonical committed state per batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStore {
    batches: BTreeMap<BatchId, StoredBatch>,
    next_id: u64,
}

impl BatchStore {
    /// Create an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            batches: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// The id the next created batch will receive.
    #[must_use]
    pub const fn peek_next_id(&self) -> BatchId {
        BatchId::new(self.next_id)
    }

    /// Insert a newly created batch under the next id.
    pub fn create(&mut self, batch: Batch, metadata_hash: MetadataHash) -> BatchId {
        let id = BatchId::new(self.next_id);
        self.next_id += 1;
        self.batches.insert(
            id,
            StoredBatch {
                batch,
                revision: 0,
                metadata_hash,
            },
        );
        id
    }

    /// Replace a committed batch, bumping its revision.
    ///
    /// Returns the new revision, or `None` if the batch does not exist.
    pub fn replace(
        &mut self,
        id: BatchId,
        batch: Batch,
        metadata_hash: MetadataHash,
    ) -> Option<u64> {
        let stored = self.batches.get_mut(&id)?;
        stored.batch = batch;
        stored.revision += 1;
        stored.metadata_hash = metadata_hash;
        Some(stored.revision)
    }

    /// Look up a committed batch.
    #[must_use]
    pub fn get(&self, id: BatchId) -> Option<&StoredBatch> {
        self.batches.get(&id)
    }

    /// Current revision of a batch.
    #[must_use]
    pub fn revision(&self, id: BatchId) -> Option<u64> {
        self.batches.get(&id).map(|stored| stored.revision)
    }

    /// Number of committed batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Returns `true` if no batch was committed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
