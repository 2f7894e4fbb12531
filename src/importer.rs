use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use bzip2::read::MultiBzDecoder;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Result, StormError};
use crate::models::{RawRow, StormRecord};

/// Columns the loader reads. Any other column in the file is ignored.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "STATE__",
    "BGN_DATE",
    "COUNTYNAME",
    "STATE",
    "EVTYPE",
    "BGN_LOCATI",
    "FATALITIES",
    "INJURIES",
    "PROPDMG",
    "PROPDMGEXP",
    "CROPDMG",
    "CROPDMGEXP",
    "REMARKS",
    "REFNUM",
];

/// Events before this date were recorded for a subset of event types only.
pub fn cutoff_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1996, 1, 1).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse the date part of `M/D/YYYY H:MM:SS`. The time, when present, must
/// be well formed but is otherwise ignored.
pub fn parse_begin_date(raw: &str) -> Option<NaiveDate> {
    let mut tokens = raw.split_whitespace();
    let date_part = tokens.next()?;
    if let Some(time) = tokens.next() {
        NaiveTime::parse_from_str(time, "%H:%M:%S").ok()?;
    }
    if tokens.next().is_some() {
        return None;
    }
    let parts: Vec<&str> = date_part.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let m: u32 = parts[0].parse().ok()?;
    let d: u32 = parts[1].parse().ok()?;
    let y: i32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Non-negative finite number; blank is zero.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.trim().replace(',', "");
    if s.is_empty() {
        return Some(0.0);
    }
    let v: f64 = s.parse().ok()?;
    (v.is_finite() && v >= 0.0).then_some(v)
}

/// Largest count or code accepted from a row.
const MAX_COUNT: f64 = u32::MAX as f64;

/// Counts and codes are stored as decimals such as `"1.00"`.
pub fn parse_count(raw: &str) -> Option<u64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let v: f64 = s.parse().ok()?;
    (v.is_finite() && (0.0..=MAX_COUNT).contains(&v) && v.fract() == 0.0).then_some(v as u64)
}

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let mut file = File::open(file_path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn field_error(column: &'static str, value: &str) -> LoadIssueKind {
    LoadIssueKind::InvalidField {
        column,
        value: value.trim().to_string(),
    }
}

fn to_record(line: u64, raw: RawRow) -> std::result::Result<StormRecord, LoadIssueKind> {
    let begin_date =
        parse_begin_date(&raw.begin_date).ok_or_else(|| field_error("BGN_DATE", &raw.begin_date))?;
    let state_code = parse_count(&raw.state_code)
        .and_then(|c| u32::try_from(c).ok())
        .ok_or_else(|| field_error("STATE__", &raw.state_code))?;
    let fatalities =
        parse_count(&raw.fatalities).ok_or_else(|| field_error("FATALITIES", &raw.fatalities))?;
    let injuries = parse_count(&raw.injuries).ok_or_else(|| field_error("INJURIES", &raw.injuries))?;
    let prop_dmg = parse_amount(&raw.prop_dmg).ok_or_else(|| field_error("PROPDMG", &raw.prop_dmg))?;
    let crop_dmg = parse_amount(&raw.crop_dmg).ok_or_else(|| field_error("CROPDMG", &raw.crop_dmg))?;
    let refnum = parse_count(&raw.refnum);

    Ok(StormRecord {
        line,
        refnum,
        event_type: raw.event_type.trim().to_string(),
        begin_date,
        state: raw.state.trim().to_string(),
        state_code,
        county: raw.county.trim().to_string(),
        fatalities,
        injuries,
        prop_dmg,
        prop_dmg_exp: raw.prop_dmg_exp.trim().to_string(),
        crop_dmg,
        crop_dmg_exp: raw.crop_dmg_exp.trim().to_string(),
        remarks: raw.remarks,
        location: raw.location.trim().to_string(),
    })
}

// ---------------------------------------------------------------------------
// load_records
// ---------------------------------------------------------------------------

/// Why a row was skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadIssueKind {
    /// The row could not be read as a record of the header's shape.
    Csv { message: String },
    /// A column held a value that does not parse.
    InvalidField { column: &'static str, value: String },
}

impl std::fmt::Display for LoadIssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadIssueKind::Csv { message } => write!(f, "{message}"),
            LoadIssueKind::InvalidField { column, value } => write!(f, "invalid {column}: '{value}'"),
        }
    }
}

/// A row that could not be parsed. The load continues past it.
#[derive(Debug, Clone, Serialize)]
pub struct LoadIssue {
    pub line: u64,
    pub kind: LoadIssueKind,
}

#[derive(Debug, Default)]
pub struct LoadResult {
    pub records: Vec<StormRecord>,
    pub issues: Vec<LoadIssue>,
    pub rows_read: usize,
    pub before_cutoff: usize,
}

/// Open the source, decompressing `.bz2` archives on the fly.
pub fn open_source(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => StormError::MissingSource(path.display().to_string()),
        _ => StormError::Io(e),
    })?;
    let reader = BufReader::new(file);
    let is_bz2 = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("bz2"));
    if is_bz2 {
        Ok(Box::new(MultiBzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

pub fn load_records(path: &Path, cutoff: NaiveDate) -> Result<LoadResult> {
    tracing::info!(path = %path.display(), "loading storm events");
    read_records(open_source(path)?, cutoff)
}

/// Parse every row, keeping records dated on or after `cutoff` in file order.
pub fn read_records<R: Read>(reader: R, cutoff: NaiveDate) -> Result<LoadResult> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers = rdr.byte_headers()?.clone();
    let headers = csv::StringRecord::from_byte_record_lossy(headers);
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(StormError::MissingColumn(column.to_string()));
        }
    }
    let headers: csv::StringRecord = headers.iter().map(str::trim).collect();

    let mut result = LoadResult::default();
    let mut raw = csv::ByteRecord::new();
    loop {
        let more = match rdr.read_byte_record(&mut raw) {
            Ok(more) => more,
            Err(e) => {
                if let csv::ErrorKind::Io(_) = e.kind() {
                    return Err(e.into());
                }
                result.rows_read += 1;
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                tracing::debug!(line, error = %e, "skipping malformed row");
                result.issues.push(LoadIssue {
                    line,
                    kind: LoadIssueKind::Csv {
                        message: e.to_string(),
                    },
                });
                continue;
            }
        };
        if !more {
            break;
        }
        result.rows_read += 1;
        let line = raw.position().map(|p| p.line()).unwrap_or(0);
        let row = csv::StringRecord::from_byte_record_lossy(raw.clone());
        let parsed = row
            .deserialize::<RawRow>(Some(&headers))
            .map_err(|e| LoadIssueKind::Csv {
                message: e.to_string(),
            })
            .and_then(|r| to_record(line, r));
        match parsed {
            Ok(record) if record.begin_date < cutoff => result.before_cutoff += 1,
            Ok(record) => result.records.push(record),
            Err(kind) => {
                tracing::debug!(line, reason = %kind, "skipping malformed row");
                result.issues.push(LoadIssue { line, kind });
            }
        }
    }

    if !result.issues.is_empty() {
        tracing::warn!(count = result.issues.len(), "rows skipped during load");
    }
    tracing::info!(
        rows = result.rows_read,
        kept = result.records.len(),
        before_cutoff = result.before_cutoff,
        "load complete"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "\"STATE__\",\"BGN_DATE\",\"BGN_TIME\",\"COUNTYNAME\",\"STATE\",\"EVTYPE\",\"BGN_LOCATI\",\"FATALITIES\",\"INJURIES\",\"PROPDMG\",\"PROPDMGEXP\",\"CROPDMG\",\"CROPDMGEXP\",\"REMARKS\",\"REFNUM\"\n";

    fn csv_of(rows: &[&str]) -> String {
        let mut s = HEADER.to_string();
        for r in rows {
            s.push_str(r);
            s.push('\n');
        }
        s
    }

    fn cutoff() -> NaiveDate {
        cutoff_date()
    }

    #[test]
    fn test_parse_begin_date() {
        assert_eq!(
            parse_begin_date("4/18/1950 0:00:00"),
            NaiveDate::from_ymd_opt(1950, 4, 18)
        );
        assert_eq!(
            parse_begin_date("11/15/2011 0:00:00"),
            NaiveDate::from_ymd_opt(2011, 11, 15)
        );
        assert_eq!(parse_begin_date("2011-11-15"), None);
        assert_eq!(parse_begin_date("4/18/1996 garbage"), None);
        assert_eq!(parse_begin_date("4/18/1996 25:00:00"), None);
        assert_eq!(parse_begin_date("4/18/1996 0:00:00 extra"), None);
        assert_eq!(
            parse_begin_date("4/18/1996"),
            NaiveDate::from_ymd_opt(1996, 4, 18)
        );
        assert_eq!(parse_begin_date("13/40/2011 0:00:00"), None);
        assert_eq!(parse_begin_date(""), None);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_count("1.00"), Some(1));
        assert_eq!(parse_count("0"), Some(0));
        assert_eq!(parse_count("-1"), None);
        assert_eq!(parse_count("2.5"), None);
        assert_eq!(parse_count("abc"), None);
        assert_eq!(parse_count("1e20"), None);
        assert_eq!(parse_count("4294967296"), None);
        assert_eq!(parse_count("4294967295"), Some(4_294_967_295));
        assert_eq!(parse_amount("25.5"), Some(25.5));
        assert_eq!(parse_amount(""), Some(0.0));
        assert_eq!(parse_amount("-3"), None);
    }

    #[test]
    fn test_reads_typed_records() {
        let data = csv_of(&[
            r#"1.00,"4/18/1996 0:00:00","0130","MOBILE","AL","TSTM WIND","",0.00,2.00,10.00,"K",0.00,"","Trees down",1"#,
        ]);
        let result = read_records(data.as_bytes(), cutoff()).unwrap();
        assert_eq!(result.rows_read, 1);
        assert_eq!(result.records.len(), 1);
        let r = &result.records[0];
        assert_eq!(r.state_code, 1);
        assert_eq!(r.state, "AL");
        assert_eq!(r.event_type, "TSTM WIND");
        assert_eq!(r.injuries, 2);
        assert_eq!(r.prop_dmg, 10.0);
        assert_eq!(r.prop_dmg_exp, "K");
        assert_eq!(r.refnum, Some(1));
        assert_eq!(r.line, 2);
        assert_eq!(r.begin_date, NaiveDate::from_ymd_opt(1996, 4, 18).unwrap());
    }

    #[test]
    fn test_rows_before_cutoff_are_excluded() {
        let data = csv_of(&[
            r#"1.00,"12/31/1995 0:00:00","0130","MOBILE","AL","TORNADO","",5.00,0.00,0.00,"",0.00,"","",1"#,
            r#"1.00,"1/1/1996 0:00:00","0130","MOBILE","AL","TORNADO","",1.00,0.00,0.00,"",0.00,"","",2"#,
        ]);
        let result = read_records(data.as_bytes(), cutoff()).unwrap();
        assert_eq!(result.before_cutoff, 1);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].refnum, Some(2));
    }

    #[test]
    fn test_malformed_rows_are_recorded_not_fatal() {
        let data = csv_of(&[
            r#"1.00,"not a date","0130","MOBILE","AL","HAIL","",0.00,0.00,0.00,"",0.00,"","",1"#,
            r#"1.00,"5/1/1997 0:00:00","0130""#,
            r#"1.00,"5/1/1997 0:00:00","0130","MOBILE","AL","HAIL","",x,0.00,0.00,"",0.00,"","",3"#,
            r#"1.00,"5/1/1997 0:00:00","0130","MOBILE","AL","HAIL","",0.00,0.00,0.00,"",0.00,"","",4"#,
        ]);
        let result = read_records(data.as_bytes(), cutoff()).unwrap();
        assert_eq!(result.rows_read, 4);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.issues.len(), 3);
        assert_eq!(
            result.issues[0].kind,
            LoadIssueKind::InvalidField {
                column: "BGN_DATE",
                value: "not a date".to_string(),
            }
        );
        assert!(matches!(result.issues[1].kind, LoadIssueKind::Csv { .. }));
        assert_eq!(
            result.issues[2].kind,
            LoadIssueKind::InvalidField {
                column: "FATALITIES",
                value: "x".to_string(),
            }
        );
        assert_eq!(result.issues[2].kind.to_string(), "invalid FATALITIES: 'x'");
    }

    #[test]
    fn test_oversized_count_is_an_issue() {
        let data = csv_of(&[
            r#"1.00,"5/1/1997 0:00:00","0130","MOBILE","AL","TORNADO","",1e20,0.00,0.00,"",0.00,"","",1"#,
            r#"1.00,"5/1/1997 0:00:00","0130","MOBILE","AL","TORNADO","",1.00,0.00,0.00,"",0.00,"","",2"#,
        ]);
        let result = read_records(data.as_bytes(), cutoff()).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].fatalities, 1);
        assert_eq!(
            result.issues[0].kind,
            LoadIssueKind::InvalidField {
                column: "FATALITIES",
                value: "1e20".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let data = "\"STATE__\",\"BGN_DATE\"\n1.00,\"1/1/1996 0:00:00\"\n";
        let err = read_records(data.as_bytes(), cutoff()).unwrap_err();
        assert!(matches!(err, StormError::MissingColumn(c) if c == "COUNTYNAME"));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = load_records(Path::new("/nonexistent/StormData.csv.bz2"), cutoff()).unwrap_err();
        assert!(matches!(err, StormError::MissingSource(p) if p.contains("StormData")));
    }

    #[test]
    fn test_checksum_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "abc").unwrap();
        assert_eq!(
            compute_checksum(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
