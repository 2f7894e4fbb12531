use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::categorizer::{Categorizer, EventLabel};
use crate::models::{CleanRecord, Damage, Multiplier, StateResolution, StormRecord};

// ---------------------------------------------------------------------------
// Exponent codes
// ---------------------------------------------------------------------------

/// Documented exponent codes, shown in the processing narrative.
pub const EXPONENT_TABLE: &[(&str, &str)] = &[
    ("H", "100"),
    ("K", "1,000"),
    ("M", "1,000,000"),
    ("B", "1,000,000,000"),
    ("0-9", "10"),
    ("+", "1"),
    ("-, ?, blank", "0"),
    ("anything else", "unknown"),
];

/// Decode a damage exponent code. Case-insensitive; surrounding whitespace
/// is ignored. Unrecognized codes are `Unknown`, never zero.
pub fn decode_exponent(code: &str) -> Multiplier {
    let code = code.trim();
    let mut chars = code.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return if code.is_empty() {
            Multiplier::Known(0.0)
        } else {
            Multiplier::Unknown(code.to_string())
        };
    };
    match c.to_ascii_uppercase() {
        'H' => Multiplier::Known(1e2),
        'K' => Multiplier::Known(1e3),
        'M' => Multiplier::Known(1e6),
        'B' => Multiplier::Known(1e9),
        '0'..='9' => Multiplier::Known(10.0),
        '+' => Multiplier::Known(1.0),
        '-' | '?' => Multiplier::Known(0.0),
        _ => Multiplier::Unknown(code.to_string()),
    }
}

// ---------------------------------------------------------------------------
// State corrections
// ---------------------------------------------------------------------------

pub struct StateCorrection {
    pub code: u32,
    pub observed: &'static str,
    pub corrected: &'static str,
}

const fn fix(code: u32, observed: &'static str, corrected: &'static str) -> StateCorrection {
    StateCorrection { code, observed, corrected }
}

/// Revision of `STATE_CORRECTIONS`. Bump when the table changes.
pub const STATE_CORRECTIONS_VERSION: u32 = 1;

/// Known data-entry errors: rows whose numeric code belongs to one state
/// while the abbreviation names a neighbour in code order. Derived with
/// `audit_state_pairs`; the code is trusted over the abbreviation.
pub const STATE_CORRECTIONS: &[StateCorrection] = &[
    fix(6, "CO", "CA"),
    fix(8, "CA", "CO"),
    fix(18, "IA", "IN"),
    fix(19, "IN", "IA"),
    fix(27, "MT", "MN"),
    fix(30, "MN", "MT"),
    fix(31, "NC", "NE"),
    fix(37, "NE", "NC"),
    fix(45, "SD", "SC"),
    fix(46, "SC", "SD"),
];

/// Look up `(code, name)` in the correction table. Unlisted pairs keep the
/// recorded name.
pub fn correct_state(code: u32, name: &str) -> (String, StateResolution) {
    let trimmed = name.trim();
    match STATE_CORRECTIONS
        .iter()
        .find(|c| c.code == code && c.observed.eq_ignore_ascii_case(trimmed))
    {
        Some(c) => (
            c.corrected.to_string(),
            StateResolution::Corrected {
                from: trimmed.to_string(),
            },
        ),
        None => (trimmed.to_string(), StateResolution::Original),
    }
}

/// Share of a code's rows below which a pairing counts as an anomaly.
pub const MINORITY_SHARE: f64 = 0.05;

#[derive(Debug, Clone, Serialize)]
pub struct PairingAnomaly {
    pub code: u32,
    pub observed: String,
    pub count: usize,
    pub dominant: String,
    pub dominant_count: usize,
    pub share: f64,
    /// Whether `STATE_CORRECTIONS` already has an entry for this pair.
    pub covered: bool,
}

/// Majority vote per numeric code over the recorded state names. Returns the
/// minority pairings whose share of the code's rows is below
/// `MINORITY_SHARE`, ordered by code then descending count. Diagnostic only.
pub fn audit_state_pairs(records: &[StormRecord]) -> Vec<PairingAnomaly> {
    let mut by_code: BTreeMap<u32, HashMap<&str, usize>> = BTreeMap::new();
    for r in records {
        *by_code
            .entry(r.state_code)
            .or_default()
            .entry(r.state.trim())
            .or_insert(0) += 1;
    }

    let mut anomalies = Vec::new();
    for (code, names) in &by_code {
        let total: usize = names.values().sum();
        let Some((dominant, dominant_count)) = names
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(n, c)| (*n, *c))
        else {
            continue;
        };
        let mut minority: Vec<(&str, usize)> = names
            .iter()
            .filter(|(n, _)| **n != dominant)
            .map(|(n, c)| (*n, *c))
            .collect();
        minority.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        for (name, count) in minority {
            let share = count as f64 / total as f64;
            if share >= MINORITY_SHARE {
                continue;
            }
            let covered = STATE_CORRECTIONS
                .iter()
                .any(|c| c.code == *code && c.observed.eq_ignore_ascii_case(name));
            anomalies.push(PairingAnomaly {
                code: *code,
                observed: name.to_string(),
                count,
                dominant: dominant.to_string(),
                dominant_count,
                share,
                covered,
            });
        }
    }
    anomalies
}

// ---------------------------------------------------------------------------
// Record normalization
// ---------------------------------------------------------------------------

pub fn normalize_record(record: StormRecord, categorizer: &Categorizer) -> CleanRecord {
    let label = categorizer.canonicalize(&record.event_type);
    with_label(record, label)
}

fn with_label(record: StormRecord, label: EventLabel) -> CleanRecord {
    let (state, state_resolution) = correct_state(record.state_code, &record.state);
    let property_damage = Damage::from_parts(record.prop_dmg, decode_exponent(&record.prop_dmg_exp));
    let crop_damage = Damage::from_parts(record.crop_dmg, decode_exponent(&record.crop_dmg_exp));
    CleanRecord {
        record,
        label,
        state,
        state_resolution,
        property_damage,
        crop_damage,
    }
}

/// Normalize every record. Each distinct event text is canonicalized once.
pub fn normalize_records(records: Vec<StormRecord>, categorizer: &Categorizer) -> Vec<CleanRecord> {
    let mut labels: HashMap<String, EventLabel> = HashMap::new();
    let clean: Vec<CleanRecord> = records
        .into_iter()
        .map(|r| {
            let label = match labels.get(&r.event_type) {
                Some(label) => *label,
                None => {
                    let label = categorizer.canonicalize(&r.event_type);
                    labels.insert(r.event_type.clone(), label);
                    label
                }
            };
            with_label(r, label)
        })
        .collect();
    let corrected = clean.iter().filter(|c| c.state_resolution.is_corrected()).count();
    tracing::info!(
        records = clean.len(),
        event_types = labels.len(),
        corrected_states = corrected,
        strategy = categorizer.strategy().name(),
        "normalized records"
    );
    clean
}
