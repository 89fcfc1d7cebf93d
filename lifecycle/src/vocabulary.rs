//! Closed vocabularies for harvest methods, storage conditions and handling.
//!
//! These lists are part of the external contract: downstream consumers match on
//! the exact strings, so adding or renaming a value is a breaking change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, $error:ident {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[doc = $label]
                $variant,
            )+
        }

        impl $name {
            /// Every accepted value, in contract order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The contract string for this value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = crate::validation::ValidationError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($label => Ok(Self::$variant),)+
                    other => Err(crate::validation::ValidationError::$error(other.to_string())),
                }
            }
        }
    };
}

vocabulary!(
    /// How produce was harvested (7 values).
    HarvestMethod, UnknownHarvestMethod {
        HandPicking => "Hand Picking",
        MachineHarvesting => "Machine Harvesting",
        StripPicking => "Strip Picking",
        SelectivePicking => "Selective Picking",
        CombineHarvesting => "Combine Harvesting",
        Shaking => "Shaking",
        Cutting => "Cutting",
    }
);

vocabulary!(
    /// Storage condition declared by a distributor (12 values).
    StorageCondition, UnknownStorageCondition {
        Refrigerated => "Refrigerated",
        Frozen => "Frozen",
        DryStorage => "Dry Storage",
        Ambient => "Ambient",
        ControlledAtmosphere => "Controlled Atmosphere",
        HumidityControlled => "Humidity Controlled",
        Ventilated => "Ventilated",
        DarkStorage => "Dark Storage",
        CoolStorage => "Cool Storage",
        ClimateControlled => "Climate Controlled",
        VacuumSealed => "Vacuum Sealed",
        ModifiedAtmosphere => "Modified Atmosphere",
    }
);

vocabulary!(
    /// Handling instruction declared by a distributor (9 values).
    Handling, UnknownHandling {
        Standard => "Standard",
        Fragile => "Fragile",
        KeepUpright => "Keep Upright",
        KeepDry => "Keep Dry",
        TemperatureSensitive => "Temperature Sensitive",
        Perishable => "Perishable",
        DoNotStack => "Do Not Stack",
        HandleWithCare => "Handle With Care",
        Hazardous => "Hazardous",
    }
);
