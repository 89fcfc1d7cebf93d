//! Stateless validation rules applied before a proposal leaves the process.
//!
//! Field validators, per-record composites, the stage-driven batch composite
//! and the transition-legality table. Nothing here reads a clock directly;
//! callers pass the current time in.

use crate::batch::{Batch, HarvestEvent, PackagingEvent, ProcessingEvent};
use crate::event_log::{DistributionEvent, RetailEvent};
use crate::types::{GeoPoint, MetadataHash, Quantity, Stage};
use crate::vocabulary::{Handling, HarvestMethod, StorageCondition};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Inclusive upper bound for latitude (90° at 1e-8 precision).
pub const MAX_LATITUDE: i64 = 90 * GeoPoint::SCALE;

/// Inclusive upper bound for longitude (180° at 1e-8 precision).
pub const MAX_LONGITUDE: i64 = 180 * GeoPoint::SCALE;

/// Exclusive lower bound for quantities: 100 whole units.
pub const MIN_QUANTITY: Quantity = Quantity::from_base_units(100 * Quantity::UNIT);

/// Exclusive upper bound for quantities.
pub const MAX_QUANTITY: Quantity = Quantity::MAX;

/// A field or record failed local validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Date lies after the current time
    #[error("date {date} is in the future (now {now})")]
    FutureDate {
        /// Offending date
        date: DateTime<Utc>,
        /// Current time used for the check
        now: DateTime<Utc>,
    },

    /// Latitude outside `0..=90°`
    #[error("latitude {0} outside 0..={MAX_LATITUDE}")]
    LatitudeOutOfRange(i64),

    /// Longitude outside `0..=180°`
    #[error("longitude {0} outside 0..={MAX_LONGITUDE}")]
    LongitudeOutOfRange(i64),

    /// Method not in the harvest vocabulary
    #[error("unknown harvest method '{0}'")]
    UnknownHarvestMethod(String),

    /// Condition not in the storage vocabulary
    #[error("unknown storage condition '{0}'")]
    UnknownStorageCondition(String),

    /// Instruction not in the handling vocabulary
    #[error("unknown handling condition '{0}'")]
    UnknownHandling(String),

    /// Quantity not strictly between the bounds
    #[error("quantity {0} must be greater than {MIN_QUANTITY} and below the maximum")]
    QuantityOutOfRange(Quantity),

    /// A record the stage requires is absent
    #[error("{record} record required at stage {stage} is missing")]
    MissingEvent {
        /// Which record is missing
        record: &'static str,
        /// Stage that requires it
        stage: Stage,
    },

    /// Metadata hash is empty
    #[error("metadata hash must not be empty")]
    EmptyMetadataHash,
}

/// Fails if `date` is after `now`.
///
/// # Errors
///
/// Returns [`ValidationError::FutureDate`].
pub fn validate_date(date: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ValidationError> {
    if date > now {
        return Err(ValidationError::FutureDate { date, now });
    }
    Ok(())
}

/// Fails unless `0 ≤ lat ≤ 90°` and `0 ≤ lon ≤ 180°`.
///
/// # Errors
///
/// Returns the first out-of-range coordinate.
pub fn validate_location(location: &GeoPoint) -> Result<(), ValidationError> {
    if !(0..=MAX_LATITUDE).contains(&location.latitude) {
        return Err(ValidationError::LatitudeOutOfRange(location.latitude));
    }
    if !(0..=MAX_LONGITUDE).contains(&location.longitude) {
        return Err(ValidationError::LongitudeOutOfRange(location.longitude));
    }
    Ok(())
}

/// Parses a harvest method from the closed vocabulary.
///
/// # Errors
///
/// Returns [`ValidationError::UnknownHarvestMethod`] for any other string.
pub fn validate_method(method: &str) -> Result<HarvestMethod, ValidationError> {
    method.parse()
}

/// Parses a storage condition from the closed vocabulary.
///
/// # Errors
///
/// Returns [`ValidationError::UnknownStorageCondition`] for any other string.
pub fn validate_storage_condition(condition: &str) -> Result<StorageCondition, ValidationError> {
    condition.parse()
}

/// Parses a handling instruction from the closed vocabulary.
///
/// # Errors
///
/// Returns [`ValidationError::UnknownHandling`] for any other string.
pub fn validate_handling(handling: &str) -> Result<Handling, ValidationError> {
    handling.parse()
}

/// Fails unless `MIN_QUANTITY < quantity < MAX_QUANTITY`.
///
/// # Errors
///
/// Returns [`ValidationError::QuantityOutOfRange`].
pub fn validate_quantity(quantity: Quantity) -> Result<(), ValidationError> {
    if quantity > MIN_QUANTITY && quantity < MAX_QUANTITY {
        Ok(())
    } else {
        Err(ValidationError::QuantityOutOfRange(quantity))
    }
}

/// Fails if the hash is blank.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyMetadataHash`].
pub fn validate_metadata_hash(hash: &MetadataHash) -> Result<(), ValidationError> {
    if hash.is_blank() {
        return Err(ValidationError::EmptyMetadataHash);
    }
    Ok(())
}

/// Date and location of a harvest. The method is typed, so already valid.
///
/// # Errors
///
/// Returns the first failing field.
pub fn validate_harvest_event(
    event: &HarvestEvent,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    validate_date(event.date, now)?;
    validate_location(&event.location)
}

/// Date, location and quantity of a processing step.
///
/// # Errors
///
/// Returns the first failing field.
pub fn validate_processing_event(
    event: &ProcessingEvent,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    validate_date(event.date, now)?;
    validate_location(&event.location)?;
    validate_quantity(event.quantity)
}

/// Date, location and quantity of a packaging step.
///
/// # Errors
///
/// Returns the first failing field.
pub fn validate_packaging_event(
    event: &PackagingEvent,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    validate_date(event.date, now)?;
    validate_location(&event.location)?;
    validate_quantity(event.quantity)
}

/// Date and location of a distribution record.
///
/// # Errors
///
/// Returns the first failing field.
pub fn validate_distribution_event(
    event: &DistributionEvent,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    validate_date(event.date, now)?;
    validate_location(&event.location)
}

/// Date, location and quantity of a retail record.
///
/// # Errors
///
/// Returns the first failing field.
pub fn validate_retail_event(
    event: &RetailEvent,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    validate_date(event.date, now)?;
    validate_location(&event.location)?;
    validate_quantity(event.quantity)
}

/// Validates the embedded records implied by `batch.stage`.
///
/// - `Harvested`: harvest
/// - `Processed`: harvest and processing
/// - later stages: harvest and processing, plus packaging when present
///
/// Packaging may be absent past `Packaged` because of the
/// `Processed → AtDistributors` shortcut. Distribution and retail records are
/// validated on their own at submission, not here. Auxiliary stages carry no
/// requirements beyond what the batch already holds.
///
/// # Errors
///
/// Returns [`ValidationError::MissingEvent`] for an absent required record, or
/// the first failing field of a present one.
pub fn validate_batch_events(batch: &Batch, now: DateTime<Utc>) -> Result<(), ValidationError> {
    let Some(ordinal) = batch.stage.ordinal() else {
        return Ok(());
    };

    let harvest = batch.harvest.as_ref().ok_or(ValidationError::MissingEvent {
        record: "harvest",
        stage: batch.stage,
    })?;
    validate_harvest_event(harvest, now)?;

    if ordinal >= 1 {
        let processing = batch
            .processing
            .as_ref()
            .ok_or(ValidationError::MissingEvent {
                record: "processing",
                stage: batch.stage,
            })?;
        validate_processing_event(processing, now)?;
    }

    if ordinal == 2 && batch.packaging.is_none() {
        return Err(ValidationError::MissingEvent {
            record: "packaging",
            stage: batch.stage,
        });
    }
    if ordinal >= 2 {
        if let Some(packaging) = &batch.packaging {
            validate_packaging_event(packaging, now)?;
        }
    }

    Ok(())
}

/// Transition-legality table.
///
/// Legal iff the move is strictly forward on the canonical path, a repeat
/// assignment while at distributors or retailers, or the
/// `Processed → AtDistributors` shortcut. Auxiliary stages are never legal
/// endpoints.
#[must_use]
pub fn validate_chronological_order(old: Stage, new: Stage) -> bool {
    let (Some(from), Some(to)) = (old.ordinal(), new.ordinal()) else {
        return false;
    };
    from < to
        || (old == new && matches!(old, Stage::AtDistributors | Stage::AtRetailers))
        || (old == Stage::Processed && new == Stage::AtDistributors)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code

    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn harvested() -> Batch {
        let mut batch = Batch::unharvested();
        batch.harvest = Some(HarvestEvent {
            date: now() - Duration::days(1),
            location: GeoPoint::from_degrees(45, 9),
            method: HarvestMethod::HandPicking,
        });
        batch
    }

    #[test]
    fn date_equal_to_now_is_accepted() {
        assert!(validate_date(now(), now()).is_ok());
        assert!(matches!(
            validate_date(now() + Duration::seconds(1), now()),
            Err(ValidationError::FutureDate { .. })
        ));
    }

    #[test]
    fn location_bounds_are_inclusive() {
        assert!(validate_location(&GeoPoint::new(0, 0)).is_ok());
        assert!(validate_location(&GeoPoint::new(MAX_LATITUDE, MAX_LONGITUDE)).is_ok());
        assert_eq!(
            validate_location(&GeoPoint::new(MAX_LATITUDE + 1, 0)),
            Err(ValidationError::LatitudeOutOfRange(MAX_LATITUDE + 1))
        );
        assert_eq!(
            validate_location(&GeoPoint::new(0, -1)),
            Err(ValidationError::LongitudeOutOfRange(-1))
        );
    }

    #[test]
    fn quantity_bounds_are_exclusive() {
        assert!(validate_quantity(MIN_QUANTITY).is_err());
        assert!(validate_quantity(MAX_QUANTITY).is_err());
        let just_above = Quantity::from_base_units(MIN_QUANTITY.base_units() + 1);
        assert!(validate_quantity(just_above).is_ok());
        assert!(validate_quantity(Quantity::from_units(500)).is_ok());
    }

    #[test]
    fn vocabulary_validators_reject_unknown_strings() {
        assert_eq!(validate_method("Cutting"), Ok(HarvestMethod::Cutting));
        assert_eq!(
            validate_method("Laser"),
            Err(ValidationError::UnknownHarvestMethod("Laser".into()))
        );
        assert!(validate_storage_condition("Frozen").is_ok());
        assert!(validate_storage_condition("Warm").is_err());
        assert!(validate_handling("Keep Dry").is_ok());
        assert!(validate_handling("Throw").is_err());
    }

    #[test]
    fn blank_hash_is_rejected() {
        assert_eq!(
            validate_metadata_hash(&MetadataHash::new("  ")),
            Err(ValidationError::EmptyMetadataHash)
        );
        assert!(validate_metadata_hash(&MetadataHash::new("bafy")).is_ok());
    }

    #[test]
    fn batch_events_follow_stage() {
        let mut batch = harvested();
        assert!(validate_batch_events(&batch, now()).is_ok());

        batch.stage = Stage::Processed;
        assert_eq!(
            validate_batch_events(&batch, now()),
            Err(ValidationError::MissingEvent {
                record: "processing",
                stage: Stage::Processed
            })
        );

        batch.processing = Some(ProcessingEvent {
            date: now(),
            location: GeoPoint::from_degrees(45, 9),
            quantity: Quantity::from_units(200),
        });
        assert!(validate_batch_events(&batch, now()).is_ok());

        batch.stage = Stage::Packaged;
        assert!(matches!(
            validate_batch_events(&batch, now()),
            Err(ValidationError::MissingEvent { record: "packaging", .. })
        ));

        // Skip-packaging shortcut leaves packaging absent.
        batch.stage = Stage::AtDistributors;
        assert!(validate_batch_events(&batch, now()).is_ok());
    }

    #[test]
    fn batch_without_harvest_is_invalid() {
        let batch = Batch::unharvested();
        assert!(matches!(
            validate_batch_events(&batch, now()),
            Err(ValidationError::MissingEvent { record: "harvest", .. })
        ));
    }

    #[test]
    fn invalid_embedded_record_fails_composite() {
        let mut batch = harvested();
        batch.stage = Stage::Processed;
        batch.processing = Some(ProcessingEvent {
            date: now(),
            location: GeoPoint::from_degrees(45, 9),
            quantity: Quantity::from_units(1),
        });
        assert!(matches!(
            validate_batch_events(&batch, now()),
            Err(ValidationError::QuantityOutOfRange(_))
        ));
    }

    #[test]
    fn chronological_table_matches_rules() {
        let legal: Vec<(Stage, Stage)> = Stage::ALL
            .iter()
            .flat_map(|old| Stage::ALL.iter().map(move |new| (*old, *new)))
            .filter(|(old, new)| validate_chronological_order(*old, *new))
            .collect();

        // 15 strictly-forward canonical pairs + 2 same-stage re-assignments.
        assert_eq!(legal.len(), 17);
        assert_eq!(Stage::ALL.len() * Stage::ALL.len() - legal.len(), 64);

        assert!(validate_chronological_order(Stage::Processed, Stage::AtDistributors));
        assert!(validate_chronological_order(Stage::AtDistributors, Stage::AtDistributors));
        assert!(validate_chronological_order(Stage::AtRetailers, Stage::AtRetailers));
        assert!(!validate_chronological_order(Stage::Harvested, Stage::Harvested));
        assert!(!validate_chronological_order(Stage::Packaged, Stage::Packaged));
        assert!(!validate_chronological_order(Stage::AtRetailers, Stage::AtDistributors));
        assert!(!validate_chronological_order(Stage::ToCustomers, Stage::ToCustomers));
        assert!(!validate_chronological_order(Stage::Harvested, Stage::InStorage));
        assert!(!validate_chronological_order(Stage::InTransit, Stage::ToCustomers));
    }

    proptest! {
        #[test]
        fn location_validator_matches_bounds(
            lat in -MAX_LATITUDE..=2 * MAX_LATITUDE,
            lon in -MAX_LONGITUDE..=2 * MAX_LONGITUDE,
        ) {
            let expected = (0..=MAX_LATITUDE).contains(&lat) && (0..=MAX_LONGITUDE).contains(&lon);
            prop_assert_eq!(validate_location(&GeoPoint::new(lat, lon)).is_ok(), expected);
        }

        #[test]
        fn quantity_validator_matches_bounds(raw in any::<u128>()) {
            let expected = raw > MIN_QUANTITY.base_units() && raw < u128::MAX;
            prop_assert_eq!(validate_quantity(Quantity::from_base_units(raw)).is_ok(), expected);
        }

        #[test]
        fn backward_canonical_moves_are_illegal(a in 0usize..6, b in 0usize..6) {
            let (old, new) = (Stage::ALL[a], Stage::ALL[b]);
            if b < a {
                prop_assert!(!validate_chronological_order(old, new));
            }
        }
    }
}
