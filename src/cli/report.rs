use std::path::PathBuf;
use std::str::FromStr;

use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};
use serde::Serialize;

use crate::cli::{parse_strategy, prepare, Prepared};
use crate::document::{ascii_panel, build_document, render_markdown, ReportDocument, ResultTable, RunInfo};
use crate::error::{Result, StormError};
use crate::importer::compute_checksum;
use crate::reports::{summarize, ImpactReport, StateSummary};
use crate::settings::load_settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Markdown,
    Json,
    Pdf,
}

impl FromStr for OutputFormat {
    type Err = StormError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            "pdf" => Ok(OutputFormat::Pdf),
            other => Err(StormError::InvalidArgument(format!(
                "unknown format '{other}' (expected text, markdown, json or pdf)"
            ))),
        }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    run: &'a RunInfo,
    report: &'a ImpactReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    states: Vec<StateSummary>,
}

fn run_info(prepared: &Prepared) -> Result<RunInfo> {
    Ok(RunInfo {
        source: prepared.source.display().to_string(),
        checksum: Some(compute_checksum(&prepared.source)?),
        strategy: prepared.strategy,
        rows_read: prepared.rows_read,
        kept: prepared.records.len(),
        before_cutoff: prepared.before_cutoff,
        issues: prepared.issues.len(),
        corrected_states: prepared
            .records
            .iter()
            .filter(|r| r.state_resolution.is_corrected())
            .count(),
        generated: chrono::Local::now().format("%Y-%m-%d %H:%M").to_string(),
    })
}

fn write_output(output: Option<&str>, bytes: &[u8]) -> Result<()> {
    match output {
        Some(path) => {
            let path = PathBuf::from(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, bytes)?;
            println!("Wrote {}", path.display());
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(bytes)?;
        }
    }
    Ok(())
}

fn comfy(table: &ResultTable) -> Table {
    let mut out = Table::new();
    out.set_header(table.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>());
    for row in &table.rows {
        out.add_row(
            row.iter()
                .zip(&table.columns)
                .map(|(value, col)| {
                    let cell = Cell::new(value);
                    if col.numeric {
                        cell.set_alignment(CellAlignment::Right)
                    } else {
                        cell
                    }
                })
                .collect::<Vec<_>>(),
        );
    }
    out
}

fn print_text(doc: &ReportDocument, run: &RunInfo) {
    println!("{}", doc.title.bold());
    println!(
        "{}",
        format!(
            "{} events kept from {} rows ({} before cutoff, {} malformed, {} states corrected), {} strategy",
            run.kept, run.rows_read, run.before_cutoff, run.issues, run.corrected_states,
            run.strategy.name()
        )
        .dimmed()
    );
    println!();
    println!("{}", textwrap::fill(&doc.synopsis, 80));
    println!();
    for p in &doc.results.paragraphs {
        println!("{}", textwrap::fill(p, 80));
    }
    for table in &doc.results.tables {
        println!();
        println!("{}\n{}", table.title.bold(), comfy(table));
    }
    for (i, fig) in doc.figures().iter().enumerate() {
        println!();
        println!("{}", format!("Figure {}: {}", i + 1, fig.title).bold());
        for panel in &fig.panels {
            print!("{}", ascii_panel(panel));
        }
    }
}

pub fn run(
    file: Option<String>,
    strategy: &str,
    max_distance: Option<usize>,
    by_state: bool,
    top: Option<usize>,
    format: &str,
    output: Option<String>,
) -> Result<()> {
    let format: OutputFormat = format.parse()?;
    let strategy = parse_strategy(strategy, max_distance)?;
    let top = top.unwrap_or_else(|| load_settings().top);
    if top == 0 {
        return Err(StormError::InvalidArgument("--top must be at least 1".to_string()));
    }

    let prepared = prepare(file.as_deref(), strategy)?;
    let run = run_info(&prepared)?;
    let report = summarize(&prepared.records, false);
    let states = by_state.then(|| summarize(&prepared.records, true));

    match format {
        OutputFormat::Json => {
            let out = JsonOutput {
                run: &run,
                report: states.as_ref().unwrap_or(&report),
                states: states.as_ref().map(|s| s.state_rollup()).unwrap_or_default(),
            };
            let json = serde_json::to_string_pretty(&out)?;
            write_output(output.as_deref(), format!("{json}\n").as_bytes())
        }
        OutputFormat::Markdown => {
            let doc = build_document(&report, states.as_ref(), &run, top)?;
            write_output(output.as_deref(), render_markdown(&doc, &run).as_bytes())
        }
        OutputFormat::Text => {
            let doc = build_document(&report, states.as_ref(), &run, top)?;
            match output {
                Some(path) => write_output(Some(path.as_str()), render_markdown(&doc, &run).as_bytes()),
                None => {
                    print_text(&doc, &run);
                    Ok(())
                }
            }
        }
        OutputFormat::Pdf => render_pdf(&report, states.as_ref(), &run, top, output),
    }
}

#[cfg(feature = "pdf")]
fn render_pdf(
    report: &ImpactReport,
    states: Option<&ImpactReport>,
    run: &RunInfo,
    top: usize,
    output: Option<String>,
) -> Result<()> {
    let doc = build_document(report, states, run, top)?;
    let bytes = crate::pdf::render_document(&doc, run)?;
    let path = output.unwrap_or_else(|| "storm-report.pdf".to_string());
    write_output(Some(path.as_str()), &bytes)
}

#[cfg(not(feature = "pdf"))]
fn render_pdf(
    _report: &ImpactReport,
    _states: Option<&ImpactReport>,
    _run: &RunInfo,
    _top: usize,
    _output: Option<String>,
) -> Result<()> {
    Err(StormError::InvalidArgument(
        "PDF output requires the `pdf` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("pdf".parse::<OutputFormat>().unwrap(), OutputFormat::Pdf);
        assert!("html".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_write_output_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.md");
        write_output(path.to_str(), b"# Report\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Report\n");
    }
}
