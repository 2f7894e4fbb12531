pub mod events;
pub mod fetch;
pub mod init;
pub mod report;
pub mod states;
pub mod status;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::categorizer::{Categorizer, Strategy};
use crate::error::{Result, StormError};
use crate::fetch::cached_source_path;
use crate::importer::{cutoff_date, load_records, LoadIssue};
use crate::models::CleanRecord;
use crate::normalizer::normalize_records;
use crate::settings::{get_cache_dir, shellexpand_path};

/// The `--file` argument, or the cached download.
pub(crate) fn resolve_source(file: Option<&str>) -> PathBuf {
    match file {
        Some(f) => PathBuf::from(shellexpand_path(f)),
        None => cached_source_path(&get_cache_dir()),
    }
}

pub(crate) fn parse_strategy(strategy: &str, max_distance: Option<usize>) -> Result<Strategy> {
    match (strategy.parse::<Strategy>()?, max_distance) {
        (Strategy::Vocabulary { .. }, Some(max_distance)) => Ok(Strategy::Vocabulary { max_distance }),
        (Strategy::Keyword, Some(_)) => Err(StormError::InvalidArgument(
            "--max-distance only applies to the vocabulary strategy".to_string(),
        )),
        (s, None) => Ok(s),
    }
}

/// Records loaded from one source and normalized under one strategy.
pub(crate) struct Prepared {
    pub source: PathBuf,
    pub strategy: Strategy,
    pub rows_read: usize,
    pub before_cutoff: usize,
    pub issues: Vec<LoadIssue>,
    pub records: Vec<CleanRecord>,
}

pub(crate) fn prepare(file: Option<&str>, strategy: Strategy) -> Result<Prepared> {
    let source = resolve_source(file);
    let categorizer = Categorizer::new(strategy)?;
    let load = load_records(&source, cutoff_date())?;
    let records = normalize_records(load.records, &categorizer);
    Ok(Prepared {
        source,
        strategy,
        rows_read: load.rows_read,
        before_cutoff: load.before_cutoff,
        issues: load.issues,
        records,
    })
}

#[derive(Parser)]
#[command(
    name = "storm-report",
    version,
    about = "Health and economic impact of severe weather from the NOAA Storm Events data."
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the settings file and create the cache directory.
    Init {
        /// Where to keep the downloaded data (default: the user cache dir)
        #[arg(long = "cache-dir")]
        cache_dir: Option<String>,
    },
    /// Download the Storm Events archive into the cache.
    Fetch {
        /// Source URL (default: from settings)
        #[arg(long)]
        url: Option<String>,
        /// Download again even if a cached copy exists
        #[arg(long)]
        force: bool,
    },
    /// Build the impact report.
    Report {
        /// CSV or .csv.bz2 file (default: the cached download)
        #[arg(long)]
        file: Option<String>,
        /// Event type canonicalization: keyword, vocabulary
        #[arg(long, default_value = "keyword")]
        strategy: String,
        /// Largest edit distance accepted by the vocabulary strategy
        #[arg(long = "max-distance")]
        max_distance: Option<usize>,
        /// Group by event type and state
        #[arg(long = "by-state")]
        by_state: bool,
        /// Rows per ranking table (default: from settings)
        #[arg(long)]
        top: Option<usize>,
        /// Output format: text, markdown, json, pdf
        #[arg(long, default_value = "text")]
        format: String,
        /// Output file (default: stdout; storm-report.pdf for pdf)
        #[arg(long)]
        output: Option<String>,
    },
    /// Show how recorded event types map to canonical labels.
    Events {
        #[arg(long)]
        file: Option<String>,
        /// Event type canonicalization: keyword, vocabulary
        #[arg(long, default_value = "keyword")]
        strategy: String,
        #[arg(long = "max-distance")]
        max_distance: Option<usize>,
        /// Number of unmatched event types to list
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Audit state code and abbreviation pairings.
    States {
        #[arg(long)]
        file: Option<String>,
    },
    /// Show settings and the cached download.
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strategy() {
        assert_eq!(parse_strategy("keyword", None).unwrap(), Strategy::Keyword);
        assert_eq!(
            parse_strategy("vocabulary", Some(1)).unwrap(),
            Strategy::Vocabulary { max_distance: 1 }
        );
        assert!(parse_strategy("keyword", Some(2)).is_err());
        assert!(parse_strategy("fuzzy", None).is_err());
    }

    #[test]
    fn test_prepare_normalizes_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storms.csv");
        std::fs::write(
            &path,
            "STATE__,BGN_DATE,COUNTYNAME,STATE,EVTYPE,BGN_LOCATI,FATALITIES,INJURIES,PROPDMG,PROPDMGEXP,CROPDMG,CROPDMGEXP,REMARKS,REFNUM\n\
             46.00,6/1/2001 0:00:00,LINCOLN,SC,TSTM WIND,,0.00,1.00,10.00,K,0.00,,,2\n\
             46.00,not a date,LINCOLN,SD,HAIL,,0.00,0.00,0.00,,0.00,,,3\n",
        )
        .unwrap();
        let prepared = prepare(path.to_str(), Strategy::Keyword).unwrap();
        assert_eq!(prepared.rows_read, 2);
        assert_eq!(prepared.issues.len(), 1);
        assert_eq!(prepared.records.len(), 1);
        assert_eq!(prepared.records[0].state, "SD");
        assert_eq!(prepared.records[0].label.as_str(), "WIND");
    }
}
