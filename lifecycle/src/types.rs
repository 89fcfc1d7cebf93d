//! Identifiers and value types shared by every lifecycle module.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw identifier.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw identifier.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a batch, assigned monotonically on creation and never reused.
    BatchId,
    "batch-"
);

numeric_id!(
    /// Identifier of an actor within one actor type (farmer 7, distributor 9, ...).
    ActorId,
    "actor-"
);

numeric_id!(
    /// Identifier of a distribution or retail record in the event log.
    EventId,
    "event-"
);

/// Token binding an outbound validation request to its asynchronous reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Wraps a raw correlation value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw correlation value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// An account identity calling into the system (operator, oracle integration, actor owner).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Creates an identity from an account string.
    #[must_use]
    pub fn new(account: impl Into<String>) -> Self {
        Self(account.into())
    }

    /// Returns the account string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content hash of the off-chain metadata document describing a stage.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetadataHash(String);

impl MetadataHash {
    /// Creates a hash reference.
    #[must_use]
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Returns the hash string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the hash has no visible content.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for MetadataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a batch in the lifecycle state machine.
///
/// The first six variants form the canonical forward path and are ordered.
/// The last three are auxiliary holding states with no ordinal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Produce harvested by a farmer
    Harvested,
    /// Processed by a processor
    Processed,
    /// Packaged by a packager
    Packaged,
    /// Held by one or more distributors
    AtDistributors,
    /// Held by one or more retailers
    AtRetailers,
    /// Sold to customers
    ToCustomers,
    /// Auxiliary: in storage
    InStorage,
    /// Auxiliary: in transit
    InTransit,
    /// Auxiliary: in processing
    InProcessing,
}

impl Stage {
    /// Every stage, canonical path first.
    pub const ALL: [Self; 9] = [
        Self::Harvested,
        Self::Processed,
        Self::Packaged,
        Self::AtDistributors,
        Self::AtRetailers,
        Self::ToCustomers,
        Self::InStorage,
        Self::InTransit,
        Self::InProcessing,
    ];

    /// Position on the canonical path, `None` for auxiliary stages.
    #[must_use]
    pub const fn ordinal(self) -> Option<u8> {
        match self {
            Self::Harvested => Some(0),
            Self::Processed => Some(1),
            Self::Packaged => Some(2),
            Self::AtDistributors => Some(3),
            Self::AtRetailers => Some(4),
            Self::ToCustomers => Some(5),
            Self::InStorage | Self::InTransit | Self::InProcessing => None,
        }
    }

    /// Returns `true` for the holding states outside the canonical path.
    #[must_use]
    pub const fn is_auxiliary(self) -> bool {
        self.ordinal().is_none()
    }

    /// Stable name used in logs and audit records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Harvested => "Harvested",
            Self::Processed => "Processed",
            Self::Packaged => "Packaged",
            Self::AtDistributors => "AtDistributors",
            Self::AtRetailers => "AtRetailers",
            Self::ToCustomers => "ToCustomers",
            Self::InStorage => "InStorage",
            Self::InTransit => "InTransit",
            Self::InProcessing => "InProcessing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of registered participant holding a non-transferable identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActorType {
    /// Grows and harvests
    Farmer,
    /// Processes raw produce
    Processor,
    /// Packages processed goods
    Packager,
    /// Stores and moves goods
    Distributor,
    /// Sells goods
    Retailer,
    /// Buys goods
    Consumer,
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Farmer => "farmer",
            Self::Processor => "processor",
            Self::Packager => "packager",
            Self::Distributor => "distributor",
            Self::Retailer => "retailer",
            Self::Consumer => "consumer",
        };
        f.write_str(name)
    }
}

/// Role under which a batch is indexed for an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Created the batch
    Farmer,
    /// Processed the batch
    Processor,
    /// Packaged the batch
    Packager,
    /// Held the batch as a distributor
    Distributor,
    /// Held the batch as a retailer
    Retailer,
}

impl Role {
    /// Actor type whose identifiers are indexed under this role.
    #[must_use]
    pub const fn actor_type(self) -> ActorType {
        match self {
            Self::Farmer => ActorType::Farmer,
            Self::Processor => ActorType::Processor,
            Self::Packager => ActorType::Packager,
            Self::Distributor => ActorType::Distributor,
            Self::Retailer => ActorType::Retailer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.actor_type().fmt(f)
    }
}

/// Geographic position as fixed-point degrees with eight decimal digits.
///
/// `latitude = 45_12345678` means 45.12345678°.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in 1e-8 degrees
    pub latitude: i64,
    /// Longitude in 1e-8 degrees
    pub longitude: i64,
}

impl GeoPoint {
    /// Fixed-point scale: 10^8 units per degree.
    pub const SCALE: i64 = 100_000_000;

    /// Creates a point from fixed-point components.
    #[must_use]
    pub const fn new(latitude: i64, longitude: i64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Creates a point from whole degrees.
    #[must_use]
    pub const fn from_degrees(latitude: i64, longitude: i64) -> Self {
        Self::new(
            latitude.saturating_mul(Self::SCALE),
            longitude.saturating_mul(Self::SCALE),
        )
    }
}

/// Quantity as an 18-decimal fixed-point unsigned amount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quantity(u128);

impl Quantity {
    /// Fixed-point scale: 10^18 base units per whole unit.
    pub const UNIT: u128 = 1_000_000_000_000_000_000;

    /// Largest representable quantity.
    pub const MAX: Self = Self(u128::MAX);

    /// Creates a quantity from base units.
    #[must_use]
    pub const fn from_base_units(raw: u128) -> Self {
        Self(raw)
    }

    /// Creates a quantity from whole units, saturating at [`Quantity::MAX`].
    #[must_use]
    pub const fn from_units(units: u64) -> Self {
        Self((units as u128).saturating_mul(Self::UNIT))
    }

    /// Returns the raw base units.
    #[must_use]
    pub const fn base_units(self) -> u128 {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::UNIT;
        let fraction = self.0 % Self::UNIT;
        if fraction == 0 {
            write!(f, "{whole}")
        } else {
            let digits = format!("{fraction:018}");
            write!(f, "{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_stages_are_ordered() {
        let ordinals: Vec<_> = Stage::ALL.iter().filter_map(|s| s.ordinal()).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3, 4, 5]);
        assert!(Stage::InTransit.is_auxiliary());
        assert!(!Stage::Packaged.is_auxiliary());
    }

    #[test]
    fn quantity_display_trims_fraction() {
        assert_eq!(Quantity::from_units(150).to_string(), "150");
        let half = Quantity::from_base_units(Quantity::UNIT / 2 + Quantity::UNIT);
        assert_eq!(half.to_string(), "1.5");
    }

    #[test]
    fn correlation_id_displays_as_hex() {
        assert_eq!(CorrelationId::new(255).to_string(), "0x00000000000000ff");
    }

    #[test]
    fn geo_point_from_degrees_scales() {
        let point = GeoPoint::from_degrees(45, 9);
        assert_eq!(point.latitude, 4_500_000_000);
        assert_eq!(point.longitude, 900_000_000);
    }

    #[test]
    fn huge_degrees_saturate_and_fail_validation() {
        let point = GeoPoint::from_degrees(100_000_000_000, -100_000_000_000);
        assert_eq!(point, GeoPoint::new(i64::MAX, i64::MIN));
        assert!(crate::validation::validate_location(&point).is_err());
    }
}
