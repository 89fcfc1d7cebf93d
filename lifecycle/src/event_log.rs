//! Append-only log of distribution and retail records.
//!
//! Unlike the harvest/processing/packaging records embedded in a batch, every
//! distributor or retailer touch creates a new immutable record here.

use crate::types::{ActorId, BatchId, EventId, GeoPoint, Quantity};
use crate::vocabulary::{Handling, StorageCondition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A distributor taking custody of a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionEvent {
    /// Batch the record applies to
    pub batch_id: BatchId,
    /// Distributor that took custody
    pub distributor_id: ActorId,
    /// When custody started
    pub date: DateTime<Utc>,
    /// Where the goods are held
    pub location: GeoPoint,
    /// Declared storage condition
    pub storage_condition: StorageCondition,
    /// Declared handling instruction
    pub handling: Handling,
}

/// A retailer receiving a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetailEvent {
    /// Batch the record applies to
    pub batch_id: BatchId,
    /// Retailer that received the goods
    pub retailer_id: ActorId,
    /// When the goods arrived
    pub date: DateTime<Utc>,
    /// Where the goods are sold
    pub location: GeoPoint,
    /// Received quantity
    pub quantity: Quantity,
}

/// A record waiting to be appended when its proposal commits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogAppend {
    /// Append to the distribution log
    Distribution(DistributionEvent),
    /// Append to the retail log
    Retail(RetailEvent),
}

/// Both append-only logs. Ids are positions, so they auto-increment from 0.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    distribution: Vec<DistributionEvent>,
    retail: Vec<RetailEvent>,
}

impl EventLog {
    /// Create empty logs.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            distribution: Vec::new(),
            retail: Vec::new(),
        }
    }

    /// Append a distribution record and return its id.
    pub fn append_distribution(&mut self, event: DistributionEvent) -> EventId {
        let id = EventId::new(self.distribution.len() as u64);
        self.distribution.push(event);
        id
    }

    /// Append a retail record and return its id.
    pub fn append_retail(&mut self, event: RetailEvent) -> EventId {
        let id = EventId::new(self.retail.len() as u64);
        self.retail.push(event);
        id
    }

    /// Look up a distribution record.
    #[must_use]
    pub fn distribution(&self, id: EventId) -> Option<&DistributionEvent> {
        usize::try_from(id.get())
            .ok()
            .and_then(|index| self.distribution.get(index))
    }

    /// Look up a retail record.
    #[must_use]
    pub fn retail(&self, id: EventId) -> Option<&RetailEvent> {
        usize::try_from(id.get())
            .ok()
            .and_then(|index| self.retail.get(index))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code

    use super::*;
    use chrono::TimeZone;

    fn distribution(distributor: u64) -> DistributionEvent {
        DistributionEvent {
            batch_id: BatchId::new(0),
            distributor_id: ActorId::new(distributor),
            date: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
            location: GeoPoint::from_degrees(45, 9),
            storage_condition: StorageCondition::Refrigerated,
            handling: Handling::Fragile,
        }
    }

    #[test]
    fn appends_never_overwrite() {
        let mut log = EventLog::new();
        let first = log.append_distribution(distribution(9));
        let second = log.append_distribution(distribution(9));

        assert_eq!((first, second), (EventId::new(0), EventId::new(1)));
        assert_eq!(log.distribution(first), Some(&distribution(9)));
        assert_eq!(log.distribution(second), Some(&distribution(9)));
        assert!(log.retail(first).is_none());
    }

    #[test]
    fn unknown_ids_are_none() {
        let log = EventLog::new();
        assert!(log.distribution(EventId::new(0)).is_none());
        assert!(log.retail(EventId::new(u64::MAX)).is_none());
    }
}
