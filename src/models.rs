use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::categorizer::EventLabel;

/// Row shape of the storm events file before validation. Columns not named
/// here are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRow {
    #[serde(rename = "STATE__")]
    pub state_code: String,
    #[serde(rename = "BGN_DATE")]
    pub begin_date: String,
    #[serde(rename = "COUNTYNAME")]
    pub county: String,
    #[serde(rename = "STATE")]
    pub state: String,
    #[serde(rename = "EVTYPE")]
    pub event_type: String,
    #[serde(rename = "BGN_LOCATI")]
    pub location: String,
    #[serde(rename = "FATALITIES")]
    pub fatalities: String,
    #[serde(rename = "INJURIES")]
    pub injuries: String,
    #[serde(rename = "PROPDMG")]
    pub prop_dmg: String,
    #[serde(rename = "PROPDMGEXP")]
    pub prop_dmg_exp: String,
    #[serde(rename = "CROPDMG")]
    pub crop_dmg: String,
    #[serde(rename = "CROPDMGEXP")]
    pub crop_dmg_exp: String,
    #[serde(rename = "REMARKS")]
    pub remarks: String,
    #[serde(rename = "REFNUM")]
    pub refnum: String,
}

/// One observed storm event, typed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StormRecord {
    /// 1-based line in the source file where the row starts.
    pub line: u64,
    pub refnum: Option<u64>,
    pub event_type: String,
    pub begin_date: NaiveDate,
    pub state: String,
    pub state_code: u32,
    pub county: String,
    pub fatalities: u64,
    pub injuries: u64,
    pub prop_dmg: f64,
    pub prop_dmg_exp: String,
    pub crop_dmg: f64,
    pub crop_dmg_exp: String,
    pub remarks: String,
    pub location: String,
}

/// Decoded magnitude of a damage exponent code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Multiplier {
    Known(f64),
    /// The code as recorded, trimmed.
    Unknown(String),
}

/// A damage amount after applying its multiplier.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Damage {
    Known(f64),
    Unknown { amount: f64, code: String },
}

impl Damage {
    pub fn from_parts(amount: f64, multiplier: Multiplier) -> Self {
        match multiplier {
            Multiplier::Known(m) => Damage::Known(amount * m),
            Multiplier::Unknown(code) => Damage::Unknown { amount, code },
        }
    }

    pub fn known(&self) -> Option<f64> {
        match self {
            Damage::Known(v) => Some(*v),
            Damage::Unknown { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateResolution {
    Original,
    Corrected { from: String },
}

impl StateResolution {
    pub fn is_corrected(&self) -> bool {
        matches!(self, StateResolution::Corrected { .. })
    }
}

/// A record after field normalization. The source record is kept as loaded.
#[derive(Debug, Clone, Serialize)]
pub struct CleanRecord {
    pub record: StormRecord,
    pub label: EventLabel,
    pub state: String,
    pub state_resolution: StateResolution,
    pub property_damage: Damage,
    pub crop_damage: Damage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageField {
    Property,
    Crop,
}

impl std::fmt::Display for DamageField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DamageField::Property => write!(f, "property"),
            DamageField::Crop => write!(f, "crop"),
        }
    }
}
