use std::collections::{BTreeMap, HashMap};

use comfy_table::{Cell, CellAlignment, Table};

use crate::categorizer::{EventLabel, Strategy, OTHER};
use crate::cli::{parse_strategy, prepare};
use crate::error::Result;
use crate::fmt::count;
use crate::models::CleanRecord;

pub struct LabelUsage {
    pub label: EventLabel,
    pub events: usize,
    pub distinct_types: usize,
}

/// Events and distinct recorded types for every label the strategy can
/// produce, most events first. Unused labels are listed with zero events.
pub fn label_usage(records: &[CleanRecord], strategy: Strategy) -> Vec<LabelUsage> {
    let mut by_label: BTreeMap<EventLabel, HashMap<String, usize>> = strategy
        .labels()
        .into_iter()
        .map(|label| (label, HashMap::new()))
        .collect();
    for r in records {
        *by_label
            .entry(r.label)
            .or_default()
            .entry(r.record.event_type.trim().to_uppercase())
            .or_insert(0) += 1;
    }
    let mut usage: Vec<LabelUsage> = by_label
        .into_iter()
        .map(|(label, types)| LabelUsage {
            label,
            events: types.values().sum(),
            distinct_types: types.len(),
        })
        .collect();
    usage.sort_by(|a, b| b.events.cmp(&a.events).then_with(|| a.label.cmp(&b.label)));
    usage
}

/// The most frequent recorded types that fell through to `OTHER`.
pub fn unmatched(records: &[CleanRecord], limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for r in records.iter().filter(|r| r.label == OTHER) {
        *counts
            .entry(r.record.event_type.trim().to_uppercase())
            .or_insert(0) += 1;
    }
    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out.truncate(limit);
    out
}

pub fn run(
    file: Option<String>,
    strategy: &str,
    max_distance: Option<usize>,
    limit: usize,
) -> Result<()> {
    let strategy = parse_strategy(strategy, max_distance)?;
    let prepared = prepare(file.as_deref(), strategy)?;
    let records = &prepared.records;

    let mut table = Table::new();
    table.set_header(vec!["Label", "Events", "Recorded types"]);
    for u in label_usage(records, strategy) {
        table.add_row(vec![
            Cell::new(u.label),
            Cell::new(count(u.events as u64)).set_alignment(CellAlignment::Right),
            Cell::new(count(u.distinct_types as u64)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("Event types ({} strategy)\n{table}", strategy.name());

    let other = unmatched(records, limit);
    if !other.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Recorded type", "Events"]);
        for (name, n) in &other {
            table.add_row(vec![
                Cell::new(name),
                Cell::new(count(*n as u64)).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("\nMost frequent types labelled {OTHER}\n{table}");
    }
    Ok(())
}
