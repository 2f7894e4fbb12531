use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::resolve_source;
use crate::error::Result;
use crate::fmt::count;
use crate::importer::{cutoff_date, load_records};
use crate::normalizer::{audit_state_pairs, MINORITY_SHARE};

pub fn run(file: Option<String>) -> Result<()> {
    let source = resolve_source(file.as_deref());
    let load = load_records(&source, cutoff_date())?;
    let anomalies = audit_state_pairs(&load.records);

    if anomalies.is_empty() {
        println!("No minority state pairings below {:.0}% of a code's rows.", MINORITY_SHARE * 100.0);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["STATE__", "Recorded", "Rows", "Dominant", "Dominant rows", "Share", "Table"]);
    for a in &anomalies {
        let covered = if a.covered {
            "corrected".green()
        } else {
            "uncovered".yellow()
        };
        table.add_row(vec![
            Cell::new(a.code).set_alignment(CellAlignment::Right),
            Cell::new(&a.observed),
            Cell::new(count(a.count as u64)).set_alignment(CellAlignment::Right),
            Cell::new(&a.dominant),
            Cell::new(count(a.dominant_count as u64)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}%", a.share * 100.0)).set_alignment(CellAlignment::Right),
            Cell::new(covered),
        ]);
    }

    let uncovered = anomalies.iter().filter(|a| !a.covered).count();
    println!("State pairing audit\n{table}");
    println!(
        "{} minority pairings, {} not in the correction table.",
        anomalies.len(),
        uncovered
    );
    Ok(())
}
