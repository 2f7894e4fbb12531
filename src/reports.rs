use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::categorizer::EventLabel;
use crate::models::{CleanRecord, Damage, DamageField};

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Fatalities,
    Injuries,
    /// Fatalities plus injuries.
    Health,
    PropertyDamage,
    CropDamage,
    /// Property plus crop damage.
    EconomicDamage,
}

impl Metric {
    pub fn title(&self) -> &'static str {
        match self {
            Metric::Fatalities => "Fatalities",
            Metric::Injuries => "Injuries",
            Metric::Health => "Fatalities + Injuries",
            Metric::PropertyDamage => "Property Damage",
            Metric::CropDamage => "Crop Damage",
            Metric::EconomicDamage => "Total Damage",
        }
    }

    pub fn is_monetary(&self) -> bool {
        matches!(
            self,
            Metric::PropertyDamage | Metric::CropDamage | Metric::EconomicDamage
        )
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// ---------------------------------------------------------------------------
// Tally
// ---------------------------------------------------------------------------

/// Running totals over a set of records. Damage sums include known
/// multipliers only; unknown ones are counted in `unknown_contributions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tally {
    pub events: usize,
    pub fatalities: u64,
    pub injuries: u64,
    pub property_damage: f64,
    pub crop_damage: f64,
    pub unknown_contributions: usize,
}

impl Tally {
    fn add(&mut self, rec: &CleanRecord) {
        self.events += 1;
        self.fatalities = self.fatalities.saturating_add(rec.record.fatalities);
        self.injuries = self.injuries.saturating_add(rec.record.injuries);
        for damage in [&rec.property_damage, &rec.crop_damage] {
            if damage.known().is_none() {
                self.unknown_contributions += 1;
            }
        }
        self.property_damage += rec.property_damage.known().unwrap_or(0.0);
        self.crop_damage += rec.crop_damage.known().unwrap_or(0.0);
    }

    fn merge(&mut self, other: &Tally) {
        self.events += other.events;
        self.fatalities = self.fatalities.saturating_add(other.fatalities);
        self.injuries = self.injuries.saturating_add(other.injuries);
        self.property_damage += other.property_damage;
        self.crop_damage += other.crop_damage;
        self.unknown_contributions += other.unknown_contributions;
    }

    pub fn health(&self) -> u64 {
        self.fatalities.saturating_add(self.injuries)
    }

    pub fn economic(&self) -> f64 {
        self.property_damage + self.crop_damage
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Fatalities => self.fatalities as f64,
            Metric::Injuries => self.injuries as f64,
            Metric::Health => self.health() as f64,
            Metric::PropertyDamage => self.property_damage,
            Metric::CropDamage => self.crop_damage,
            Metric::EconomicDamage => self.economic(),
        }
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub label: EventLabel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(flatten)]
    pub tally: Tally,
}

impl GroupSummary {
    pub fn name(&self) -> String {
        match &self.state {
            Some(state) => format!("{} ({state})", self.label),
            None => self.label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StateSummary {
    pub state: String,
    #[serde(flatten)]
    pub tally: Tally,
}

/// A damage contribution excluded from the sums because its exponent code
/// is not recognized.
#[derive(Debug, Clone, Serialize)]
pub struct UnknownDamage {
    pub refnum: Option<u64>,
    pub line: u64,
    pub label: EventLabel,
    pub state: String,
    pub field: DamageField,
    pub amount: f64,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactReport {
    pub by_state: bool,
    pub groups: Vec<GroupSummary>,
    pub totals: Tally,
    pub unknown_damage: Vec<UnknownDamage>,
}

/// Group records by label (and state when `by_state`) and sum their metrics.
pub fn summarize(records: &[CleanRecord], by_state: bool) -> ImpactReport {
    let mut groups: BTreeMap<(EventLabel, Option<String>), Tally> = BTreeMap::new();
    let mut totals = Tally::default();
    let mut unknown_damage = Vec::new();

    for rec in records {
        let key = (rec.label, by_state.then(|| rec.state.clone()));
        groups.entry(key).or_default().add(rec);
        totals.add(rec);

        for (field, damage) in [
            (DamageField::Property, &rec.property_damage),
            (DamageField::Crop, &rec.crop_damage),
        ] {
            if let Damage::Unknown { amount, code } = damage {
                unknown_damage.push(UnknownDamage {
                    refnum: rec.record.refnum,
                    line: rec.record.line,
                    label: rec.label,
                    state: rec.state.clone(),
                    field,
                    amount: *amount,
                    code: code.clone(),
                });
            }
        }
    }

    if !unknown_damage.is_empty() {
        tracing::warn!(
            count = unknown_damage.len(),
            "damage contributions with unknown exponent codes excluded from totals"
        );
    }

    ImpactReport {
        by_state,
        groups: groups
            .into_iter()
            .map(|((label, state), tally)| GroupSummary { label, state, tally })
            .collect(),
        totals,
        unknown_damage,
    }
}

fn desc_by(metric: Metric, a: &Tally, b: &Tally) -> std::cmp::Ordering {
    b.value(metric)
        .partial_cmp(&a.value(metric))
        .unwrap_or(std::cmp::Ordering::Equal)
}

impl ImpactReport {
    /// Groups in descending order of `metric`; ties by label, then state.
    pub fn ranked(&self, metric: Metric) -> Vec<&GroupSummary> {
        let mut ranked: Vec<&GroupSummary> = self.groups.iter().collect();
        ranked.sort_by(|a, b| {
            desc_by(metric, &a.tally, &b.tally)
                .then_with(|| a.label.cmp(&b.label))
                .then_with(|| a.state.cmp(&b.state))
        });
        ranked
    }

    /// The first `n` ranked groups with a non-zero value.
    pub fn top(&self, metric: Metric, n: usize) -> Vec<&GroupSummary> {
        self.ranked(metric)
            .into_iter()
            .filter(|g| g.tally.value(metric) > 0.0)
            .take(n)
            .collect()
    }

    /// Totals per state across labels. Empty unless grouped by state.
    pub fn state_rollup(&self) -> Vec<StateSummary> {
        let mut states: BTreeMap<&str, Tally> = BTreeMap::new();
        for g in &self.groups {
            if let Some(state) = &g.state {
                states.entry(state.as_str()).or_default().merge(&g.tally);
            }
        }
        states
            .into_iter()
            .map(|(state, tally)| StateSummary {
                state: state.to_string(),
                tally,
            })
            .collect()
    }
}

/// States in descending order of `metric`; ties by state name.
pub fn rank_states(states: &[StateSummary], metric: Metric) -> Vec<&StateSummary> {
    let mut ranked: Vec<&StateSummary> = states.iter().collect();
    ranked.sort_by(|a, b| desc_by(metric, &a.tally, &b.tally).then_with(|| a.state.cmp(&b.state)));
    ranked
}
