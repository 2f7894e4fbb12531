use serde::Serialize;

use crate::categorizer::{Strategy, KEYWORD_RULES, OFFICIAL_EVENT_TYPES, VOCABULARY_ALIASES};
use crate::error::{Result, StormError};
use crate::fmt::{compact_money, count, money};
use crate::importer::cutoff_date;
use crate::normalizer::{EXPONENT_TABLE, STATE_CORRECTIONS, STATE_CORRECTIONS_VERSION};
use crate::reports::{rank_states, GroupSummary, ImpactReport, Metric};

/// Hard limit on rendered figures per report.
pub const MAX_FIGURES: usize = 3;

/// Bars per figure panel.
const MAX_BARS: usize = 10;
/// Unknown-exponent records listed one by one in the results.
const MAX_AUDIT_ROWS: usize = 20;

const WRAP_WIDTH: usize = 80;
const BAR_WIDTH: usize = 40;

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Count,
    Dollars,
}

impl Unit {
    pub fn format(&self, value: f64) -> String {
        match self {
            Unit::Count => count(value.round() as u64),
            Unit::Dollars => compact_money(value),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Bar {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Panel {
    pub title: String,
    pub unit: Unit,
    pub bars: Vec<Bar>,
}

impl Panel {
    pub fn max_value(&self) -> f64 {
        self.bars.iter().map(|b| b.value).fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub title: String,
    pub caption: String,
    pub panels: Vec<Panel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub name: String,
    pub numeric: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultTable {
    pub title: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    fn new(title: impl Into<String>, columns: &[(&str, bool)]) -> Self {
        Self {
            title: title.into(),
            columns: columns
                .iter()
                .map(|(name, numeric)| Column {
                    name: name.to_string(),
                    numeric: *numeric,
                })
                .collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

/// A titled block of prose with optional tables.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub heading: String,
    pub paragraphs: Vec<String>,
    pub tables: Vec<ResultTable>,
}

/// Facts about the run shown in the processing narrative.
#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub source: String,
    pub checksum: Option<String>,
    pub strategy: Strategy,
    pub rows_read: usize,
    pub kept: usize,
    pub before_cutoff: usize,
    pub issues: usize,
    pub corrected_states: usize,
    pub generated: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub title: String,
    pub synopsis: String,
    pub processing: Vec<Section>,
    pub results: Section,
    figures: Vec<Figure>,
}

impl ReportDocument {
    pub fn add_figure(&mut self, figure: Figure) -> Result<()> {
        if self.figures.len() >= MAX_FIGURES {
            return Err(StormError::TooManyFigures { max: MAX_FIGURES });
        }
        self.figures.push(figure);
        Ok(())
    }

    pub fn figures(&self) -> &[Figure] {
        &self.figures
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

fn synopsis(report: &ImpactReport, run: &RunInfo) -> String {
    let leader = |metric: Metric| {
        report
            .top(metric, 1)
            .first()
            .map(|g| g.label.to_string())
            .unwrap_or_else(|| "no event type".to_string())
    };
    format!(
        "This report explores the NOAA Storm Events database to find which types of \
         severe weather are most harmful to population health and which have the \
         greatest economic consequences across the United States. Across {} events \
         beginning on or after {}, {} caused the most fatalities and injuries, and {} \
         caused the greatest combined property and crop damage.",
        count(run.kept as u64),
        cutoff_date().format("%Y-%m-%d"),
        leader(Metric::Health),
        leader(Metric::EconomicDamage),
    )
}

fn loading_section(run: &RunInfo) -> Section {
    let checksum = run
        .checksum
        .as_deref()
        .map(|c| format!(" (SHA-256 {c})"))
        .unwrap_or_default();
    Section {
        heading: "Loading".to_string(),
        paragraphs: vec![
            format!(
                "Read {} rows from {}{checksum}. Rows whose begin date falls before {} \
                 are excluded because only from that date are all event types recorded; \
                 {} rows were excluded this way and {} malformed rows were skipped. \
                 {} events remain.",
                count(run.rows_read as u64),
                run.source,
                cutoff_date().format("%Y-%m-%d"),
                count(run.before_cutoff as u64),
                count(run.issues as u64),
                count(run.kept as u64),
            ),
        ],
        tables: Vec::new(),
    }
}

fn exponent_section() -> Section {
    let mut table = ResultTable::new("Damage exponent codes", &[("Code", false), ("Multiplier", true)]);
    for (code, multiplier) in EXPONENT_TABLE {
        table.push(vec![code.to_string(), multiplier.to_string()]);
    }
    Section {
        heading: "Damage multipliers".to_string(),
        paragraphs: vec![
            "Property and crop damage are recorded as an amount plus a one-character \
             exponent code. Each amount is multiplied by the decoded code below. \
             Contributions with any other code are listed in the audit table and left \
             out of the totals."
                .to_string(),
        ],
        tables: vec![table],
    }
}

fn state_section(run: &RunInfo) -> Section {
    let mut table = ResultTable::new(
        format!("State corrections (version {STATE_CORRECTIONS_VERSION})"),
        &[("STATE__", true), ("Recorded", false), ("Corrected", false)],
    );
    for fix in STATE_CORRECTIONS {
        table.push(vec![
            fix.code.to_string(),
            fix.observed.to_string(),
            fix.corrected.to_string(),
        ]);
    }
    Section {
        heading: "State corrections".to_string(),
        paragraphs: vec![format!(
            "Some records pair a numeric state code with the abbreviation of another \
             state. The numeric code is trusted and the abbreviation replaced using the \
             fixed table below; {} records were corrected.",
            count(run.corrected_states as u64),
        )],
        tables: vec![table],
    }
}

fn event_type_section(strategy: Strategy) -> Section {
    match strategy {
        Strategy::Keyword => {
            let mut table = ResultTable::new(
                "Keyword rules",
                &[("Pattern", false), ("Match", false), ("Event type", false)],
            );
            for rule in KEYWORD_RULES {
                table.push(vec![
                    rule.pattern.to_string(),
                    rule.match_type.key().to_string(),
                    rule.label.to_string(),
                ]);
            }
            Section {
                heading: "Event types".to_string(),
                paragraphs: vec![
                    "Free-text event types are mapped to a small set of categories by the \
                     ordered, case-insensitive rules below. The first matching rule wins; \
                     text that matches no rule is labelled OTHER."
                        .to_string(),
                ],
                tables: vec![table],
            }
        }
        Strategy::Vocabulary { max_distance } => {
            let mut table = ResultTable::new("Aliases", &[("Recorded", false), ("Event type", false)]);
            for (alias, official) in VOCABULARY_ALIASES {
                table.push(vec![alias.to_string(), official.to_string()]);
            }
            Section {
                heading: "Event types".to_string(),
                paragraphs: vec![
                    format!(
                        "Free-text event types are normalized (upper case, punctuation \
                         removed, common abbreviations expanded) and matched to the \
                         closest of the {} official event names by edit distance. Matches \
                         further than {max_distance} edits are labelled OTHER.",
                        OFFICIAL_EVENT_TYPES.len(),
                    ),
                    format!("Official names: {}.", OFFICIAL_EVENT_TYPES.join(", ")),
                ],
                tables: vec![table],
            }
        }
    }
}

fn health_table(report: &ImpactReport, top: usize) -> ResultTable {
    let mut table = ResultTable::new(
        "Most harmful to population health",
        &[
            ("Event type", false),
            ("Events", true),
            ("Fatalities", true),
            ("Injuries", true),
            ("Total", true),
        ],
    );
    for g in report.top(Metric::Health, top) {
        table.push(vec![
            g.name(),
            count(g.tally.events as u64),
            count(g.tally.fatalities),
            count(g.tally.injuries),
            count(g.tally.health()),
        ]);
    }
    table
}

fn economic_table(report: &ImpactReport, top: usize) -> ResultTable {
    let mut table = ResultTable::new(
        "Greatest economic consequences",
        &[
            ("Event type", false),
            ("Events", true),
            ("Property", true),
            ("Crop", true),
            ("Total", true),
        ],
    );
    for g in report.top(Metric::EconomicDamage, top) {
        table.push(vec![
            g.name(),
            count(g.tally.events as u64),
            money(g.tally.property_damage),
            money(g.tally.crop_damage),
            money(g.tally.economic()),
        ]);
    }
    table
}

fn unknown_table(report: &ImpactReport) -> ResultTable {
    let mut by_code: std::collections::BTreeMap<&str, (usize, f64)> =
        std::collections::BTreeMap::new();
    for u in &report.unknown_damage {
        let entry = by_code.entry(u.code.as_str()).or_default();
        entry.0 += 1;
        entry.1 += u.amount;
    }
    let mut table = ResultTable::new(
        "Unknown exponent codes (excluded from totals)",
        &[("Code", false), ("Contributions", true), ("Raw amount", true)],
    );
    for (code, (n, amount)) in by_code {
        table.push(vec![code.to_string(), count(n as u64), format!("{amount:.2}")]);
    }
    table
}

fn unknown_records_table(report: &ImpactReport) -> ResultTable {
    let shown = report.unknown_damage.len().min(MAX_AUDIT_ROWS);
    let mut table = ResultTable::new(
        format!(
            "Unknown exponent contributions ({shown} of {})",
            count(report.unknown_damage.len() as u64)
        ),
        &[
            ("REFNUM", true),
            ("Line", true),
            ("Event type", false),
            ("State", false),
            ("Field", false),
            ("Amount", true),
            ("Code", false),
        ],
    );
    for u in report.unknown_damage.iter().take(MAX_AUDIT_ROWS) {
        table.push(vec![
            u.refnum.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
            u.line.to_string(),
            u.label.to_string(),
            u.state.clone(),
            u.field.to_string(),
            format!("{:.2}", u.amount),
            u.code.clone(),
        ]);
    }
    table
}

fn panel(groups: &[&GroupSummary], metric: Metric, unit: Unit) -> Panel {
    Panel {
        title: metric.title().to_string(),
        unit,
        bars: groups
            .iter()
            .map(|g| Bar {
                label: g.name(),
                value: g.tally.value(metric),
            })
            .collect(),
    }
}

fn metric_panel(report: &ImpactReport, metric: Metric) -> Panel {
    let unit = if metric.is_monetary() {
        Unit::Dollars
    } else {
        Unit::Count
    };
    panel(&report.top(metric, MAX_BARS), metric, unit)
}

fn states_figure(by_state: &ImpactReport) -> Figure {
    let states = by_state.state_rollup();
    let state_panel = |metric: Metric, unit: Unit| Panel {
        title: metric.title().to_string(),
        unit,
        bars: rank_states(&states, metric)
            .into_iter()
            .filter(|s| s.tally.value(metric) > 0.0)
            .take(MAX_BARS)
            .map(|s| Bar {
                label: s.state.clone(),
                value: s.tally.value(metric),
            })
            .collect(),
    };
    Figure {
        title: "Impact by state".to_string(),
        caption: "States with the highest combined fatalities and injuries, and the \
                  highest combined property and crop damage, across all event types."
            .to_string(),
        panels: vec![
            state_panel(Metric::Health, Unit::Count),
            state_panel(Metric::EconomicDamage, Unit::Dollars),
        ],
    }
}

/// Assemble the full report. `by_state` is the same data grouped by
/// event type and state; when present the results list per-state groups
/// and a state figure is added.
pub fn build_document(
    report: &ImpactReport,
    by_state: Option<&ImpactReport>,
    run: &RunInfo,
    top: usize,
) -> Result<ReportDocument> {
    let detail = by_state.unwrap_or(report);

    let mut results = Section {
        heading: "Results".to_string(),
        paragraphs: vec![format!(
            "Totals: {} fatalities, {} injuries, {} property damage and {} crop damage.",
            count(report.totals.fatalities),
            count(report.totals.injuries),
            money(report.totals.property_damage),
            money(report.totals.crop_damage),
        )],
        tables: vec![health_table(detail, top), economic_table(detail, top)],
    };
    if !report.unknown_damage.is_empty() {
        results.paragraphs.push(format!(
            "{} damage contributions carry an unrecognized exponent code and are \
             excluded from the totals above.",
            count(report.unknown_damage.len() as u64),
        ));
        results.tables.push(unknown_table(report));
        results.tables.push(unknown_records_table(report));
    }

    let mut doc = ReportDocument {
        title: "Health and Economic Impact of Severe Weather Events".to_string(),
        synopsis: synopsis(report, run),
        processing: vec![
            loading_section(run),
            exponent_section(),
            state_section(run),
            event_type_section(run.strategy),
        ],
        results,
        figures: Vec::new(),
    };

    doc.add_figure(Figure {
        title: "Population health".to_string(),
        caption: "Event types with the most fatalities (left) and injuries (right).".to_string(),
        panels: vec![
            metric_panel(report, Metric::Fatalities),
            metric_panel(report, Metric::Injuries),
        ],
    })?;
    doc.add_figure(Figure {
        title: "Economic consequences".to_string(),
        caption: "Event types with the most property damage (left) and crop damage (right), \
                  in US dollars."
            .to_string(),
        panels: vec![
            metric_panel(report, Metric::PropertyDamage),
            metric_panel(report, Metric::CropDamage),
        ],
    })?;
    if let Some(by_state) = by_state {
        doc.add_figure(states_figure(by_state))?;
    }

    Ok(doc)
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

fn markdown_table(out: &mut String, table: &ResultTable) {
    out.push_str(&format!("**{}**\n\n", table.title));
    let header: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    let rule: Vec<&str> = table
        .columns
        .iter()
        .map(|c| if c.numeric { "---:" } else { "---" })
        .collect();
    out.push_str(&format!("| {} |\n", rule.join(" | ")));
    for row in &table.rows {
        let cells: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out.push('\n');
}

fn section(out: &mut String, s: &Section, level: &str) {
    out.push_str(&format!("{level} {}\n\n", s.heading));
    for p in &s.paragraphs {
        out.push_str(&textwrap::fill(p, WRAP_WIDTH));
        out.push_str("\n\n");
    }
    for t in &s.tables {
        markdown_table(out, t);
    }
}

/// Horizontal bars scaled to the largest value in the panel.
pub fn ascii_panel(panel: &Panel) -> String {
    let max = panel.max_value();
    let label_w = panel.bars.iter().map(|b| b.label.len()).max().unwrap_or(0);
    let mut out = format!("{}\n", panel.title);
    if panel.bars.is_empty() {
        out.push_str("  (no data)\n");
        return out;
    }
    for bar in &panel.bars {
        let len = if max > 0.0 {
            ((bar.value / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        out.push_str(&format!(
            "  {:<label_w$}  {} {}\n",
            bar.label,
            "#".repeat(len.max(1)),
            panel.unit.format(bar.value),
        ));
    }
    out
}

pub fn render_markdown(doc: &ReportDocument, run: &RunInfo) -> String {
    let mut out = format!("# {}\n\n", doc.title);
    out.push_str(&format!("_Generated {}_\n\n", run.generated));

    out.push_str("## Synopsis\n\n");
    out.push_str(&textwrap::fill(&doc.synopsis, WRAP_WIDTH));
    out.push_str("\n\n## Data Processing\n\n");
    for s in &doc.processing {
        section(&mut out, s, "###");
    }

    section(&mut out, &doc.results, "##");

    for (i, fig) in doc.figures().iter().enumerate() {
        out.push_str(&format!("### Figure {}: {}\n\n```text\n", i + 1, fig.title));
        for panel in &fig.panels {
            out.push_str(&ascii_panel(panel));
            out.push('\n');
        }
        out.push_str("```\n\n");
        out.push_str(&textwrap::fill(&fig.caption, WRAP_WIDTH));
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorizer::Categorizer;
    use crate::importer::read_records;
    use crate::normalizer::normalize_records;
    use crate::reports::summarize;

    const CSV: &str = "\
STATE__,BGN_DATE,COUNTYNAME,STATE,EVTYPE,BGN_LOCATI,FATALITIES,INJURIES,PROPDMG,PROPDMGEXP,CROPDMG,CROPDMGEXP,REMARKS,REFNUM
1.00,4/18/2000 0:00:00,MOBILE,AL,TORNADO,,5.00,40.00,2.5,B,0.00,,,1
46.00,6/1/2001 0:00:00,LINCOLN,SC,TSTM WIND,,0.00,1.00,10.00,K,0.00,,,2
29.00,7/19/1999 0:00:00,ST LOUIS,MO,EXCESSIVE HEAT,,12.00,30.00,0.00,,0.00,,,3
29.00,5/5/2003 0:00:00,ST LOUIS,MO,HAIL,,0.00,0.00,3.00,Z,5.00,M,,4
1.00,4/3/1974 0:00:00,MOBILE,AL,TORNADO,,99.00,99.00,0.00,,0.00,,,5
";

    fn fixture(strategy: Strategy, by_state: bool) -> (ImpactReport, Option<ImpactReport>, RunInfo) {
        let load = read_records(CSV.as_bytes(), cutoff_date()).unwrap();
        let categorizer = Categorizer::new(strategy).unwrap();
        let rows_read = load.rows_read;
        let before_cutoff = load.before_cutoff;
        let clean = normalize_records(load.records, &categorizer);
        let run = RunInfo {
            source: "fixture.csv".to_string(),
            checksum: None,
            strategy,
            rows_read,
            kept: clean.len(),
            before_cutoff,
            issues: 0,
            corrected_states: clean.iter().filter(|r| r.state_resolution.is_corrected()).count(),
            generated: "2024-01-01 00:00".to_string(),
        };
        let states = by_state.then(|| summarize(&clean, true));
        (summarize(&clean, false), states, run)
    }

    #[test]
    fn test_document_has_two_figures_by_default() {
        let (report, _, run) = fixture(Strategy::Keyword, false);
        let doc = build_document(&report, None, &run, 5).unwrap();
        assert_eq!(doc.figures().len(), 2);
        assert!(doc.synopsis.contains("TORNADO caused the most fatalities"));
        assert!(doc.synopsis.contains("4 events"));
    }

    #[test]
    fn test_state_figure_is_third() {
        let (report, states, run) = fixture(Strategy::Keyword, true);
        let doc = build_document(&report, states.as_ref(), &run, 5).unwrap();
        assert_eq!(doc.figures().len(), MAX_FIGURES);
        let fig = &doc.figures()[2];
        assert_eq!(fig.panels[0].bars[0].label, "AL");
        assert_eq!(fig.panels[0].bars[1].label, "MO");
        assert_eq!(doc.results.tables[0].rows[0][0], "TORNADO (AL)");
    }

    #[test]
    fn test_figure_limit_enforced() {
        let (report, states, run) = fixture(Strategy::Keyword, true);
        let mut doc = build_document(&report, states.as_ref(), &run, 5).unwrap();
        let extra = doc.figures()[0].clone();
        let err = doc.add_figure(extra).unwrap_err();
        assert!(matches!(err, StormError::TooManyFigures { max: 3 }));
        assert_eq!(doc.figures().len(), 3);
    }

    #[test]
    fn test_unknown_codes_listed_in_results() {
        let (report, _, run) = fixture(Strategy::Keyword, false);
        let doc = build_document(&report, None, &run, 5).unwrap();
        let tables = &doc.results.tables;
        let by_code = &tables[tables.len() - 2];
        assert_eq!(by_code.rows, vec![vec!["Z".to_string(), "1".to_string(), "3.00".to_string()]]);

        let records = tables.last().unwrap();
        assert_eq!(records.title, "Unknown exponent contributions (1 of 1)");
        assert_eq!(
            records.rows,
            vec![vec!["4", "5", "HAIL", "MO", "property", "3.00", "Z"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()]
        );
        let md = render_markdown(&doc, &run);
        assert!(md.contains("| 4 | 5 | HAIL | MO | property | 3.00 | Z |"));
    }

    #[test]
    fn test_markdown_shows_transformation_tables() {
        let (report, _, run) = fixture(Strategy::Keyword, false);
        let doc = build_document(&report, None, &run, 5).unwrap();
        let md = render_markdown(&doc, &run);
        assert!(md.starts_with("# Health and Economic Impact"));
        assert!(md.contains("## Synopsis"));
        assert!(md.contains("| HAIL | contains | HAIL |"));
        assert!(md.contains(r"| WIND\|TSTM\|THUNDERSTORM"));
        assert!(md.contains("| 46 | SC | SD |"));
        assert!(md.contains("| K | 1,000 |"));
        assert!(md.contains("### Figure 2: Economic consequences"));
        assert!(!md.contains("Figure 3"));
    }

    #[test]
    fn test_markdown_vocabulary_narrative() {
        let (report, _, run) = fixture(Strategy::Vocabulary { max_distance: 3 }, false);
        let doc = build_document(&report, None, &run, 5).unwrap();
        let events = &doc.processing[3];
        assert!(events.paragraphs[0].contains("closest of the 48 official event names"));
        assert_eq!(events.tables[0].title, "Aliases");
        assert!(!render_markdown(&doc, &run).contains("Keyword rules"));
    }

    #[test]
    fn test_ascii_panel_scales_bars() {
        let panel = Panel {
            title: "Fatalities".to_string(),
            unit: Unit::Count,
            bars: vec![
                Bar { label: "HEAT".to_string(), value: 1000.0 },
                Bar { label: "WIND".to_string(), value: 250.0 },
            ],
        };
        let text = ascii_panel(&panel);
        assert!(text.contains(&format!("HEAT  {} 1,000", "#".repeat(BAR_WIDTH))));
        assert!(text.contains(&format!("WIND  {} 250", "#".repeat(BAR_WIDTH / 4))));
    }
}
