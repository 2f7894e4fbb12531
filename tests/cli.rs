use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/storm_sample.csv");

/// The binary with settings and cache isolated under a scratch home.
fn storm_report(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("storm-report").unwrap();
    cmd.env("HOME", home.path())
        .env("STORM_REPORT_CACHE", home.path().join("cache"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn report_json_totals_and_audit() {
    let home = TempDir::new().unwrap();
    let output = storm_report(&home)
        .args(["report", "--file", FIXTURE, "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["run"]["rows_read"], 8);
    assert_eq!(json["run"]["kept"], 6);
    assert_eq!(json["run"]["before_cutoff"], 1);
    assert_eq!(json["run"]["issues"], 1);
    assert_eq!(json["run"]["corrected_states"], 1);
    assert_eq!(json["report"]["totals"]["fatalities"], 84);
    assert_eq!(json["report"]["totals"]["injuries"], 1601);

    let unknown = json["report"]["unknown_damage"].as_array().unwrap();
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0]["code"], "Z");
    assert_eq!(unknown[0]["field"], "property");
    assert_eq!(unknown[0]["refnum"], 6);

    let groups = json["report"]["groups"].as_array().unwrap();
    let wind = groups.iter().find(|g| g["label"] == "WIND").unwrap();
    assert_eq!(wind["property_damage"], 10000.0);
    let hail = groups.iter().find(|g| g["label"] == "HAIL").unwrap();
    assert_eq!(hail["property_damage"], 0.0);
    assert_eq!(hail["unknown_contributions"], 1);
}

#[test]
fn report_json_by_state_uses_corrected_state() {
    let home = TempDir::new().unwrap();
    let output = storm_report(&home)
        .args(["report", "--file", FIXTURE, "--format", "json", "--by-state"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let groups = json["report"]["groups"].as_array().unwrap();
    let wind = groups.iter().find(|g| g["label"] == "WIND").unwrap();
    assert_eq!(wind["state"], "SD");
    let states = json["states"].as_array().unwrap();
    assert!(states.iter().any(|s| s["state"] == "SD"));
    assert!(!states.iter().any(|s| s["state"] == "SC"));
}

#[test]
fn report_markdown_to_file() {
    let home = TempDir::new().unwrap();
    let out = home.path().join("report.md");
    storm_report(&home)
        .args(["report", "--file", FIXTURE, "--format", "markdown", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let md = std::fs::read_to_string(&out).unwrap();
    assert!(md.contains("## Synopsis"));
    assert!(md.contains("## Data Processing"));
    assert!(md.contains("### Figure 1: Population health"));
    assert!(md.contains("### Figure 2: Economic consequences"));
    assert!(!md.contains("### Figure 3"));
    assert!(md.contains("| TORNADO | 1 | 64 | 1,500 | 1,564 |"));
}

#[test]
fn report_text_ranks_tornado_first() {
    let home = TempDir::new().unwrap();
    storm_report(&home)
        .args(["report", "--file", FIXTURE, "--top", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Most harmful to population health"))
        .stdout(predicate::str::contains("TORNADO"))
        .stdout(predicate::str::contains("Figure 2: Economic consequences"));
}

#[test]
fn report_rejects_unknown_strategy() {
    let home = TempDir::new().unwrap();
    storm_report(&home)
        .args(["report", "--file", FIXTURE, "--strategy", "fuzzy"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:"));
}

#[test]
fn report_missing_file_fails() {
    let home = TempDir::new().unwrap();
    storm_report(&home)
        .args(["report", "--format", "json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Source file not found"));
}

#[test]
fn events_lists_labels() {
    let home = TempDir::new().unwrap();
    storm_report(&home)
        .args(["events", "--file", FIXTURE])
        .assert()
        .success()
        .stdout(predicate::str::contains("keyword strategy"))
        .stdout(predicate::str::contains("STORM SURGE"));
}

#[test]
fn events_vocabulary_strategy() {
    let home = TempDir::new().unwrap();
    storm_report(&home)
        .args(["events", "--file", FIXTURE, "--strategy", "vocabulary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vocabulary strategy"))
        .stdout(predicate::str::contains("THUNDERSTORM WIND"));
}

#[test]
fn states_audit_runs() {
    let home = TempDir::new().unwrap();
    storm_report(&home)
        .args(["states", "--file", FIXTURE])
        .assert()
        .success();
}

#[test]
fn status_reports_missing_download() {
    let home = TempDir::new().unwrap();
    storm_report(&home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Data file not found"));
}
