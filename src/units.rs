use clap::ValueEnum;
use serde::{Deserialize, Serialize};

const KM_PER_MILE: f64 = 1.609_344;

/// Unit the user enters walked distance in; stored internally as km.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Kilometers,
    Miles,
}

impl DistanceUnit {
    pub fn to_km(self, value: f64) -> f64 {
        match self {
            DistanceUnit::Kilometers => value,
            DistanceUnit::Miles => value * KM_PER_MILE,
        }
    }

    pub fn abbrev(self) -> &'static str {
        match self {
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            DistanceUnit::Kilometers => DistanceUnit::Miles,
            DistanceUnit::Miles => DistanceUnit::Kilometers,
        }
    }
}
