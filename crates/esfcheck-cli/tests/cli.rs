use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CLEAN_JSON: &str = r#"{
    "supplier_BIN": "220629802628",
    "buyer_BIN": "990101400039",
    "date_issue": "23.09.2025",
    "turnover_date": "23.09.2025",
    "total_amount": "150000",
    "lines": [
        {"line_no": 1, "name": "Консультации", "amount": "100000"},
        {"line_no": 2, "name": "Сопровождение", "amount": "50000"}
    ]
}"#;

const BROKEN_JSON: &str = r#"{
    "supplier_BIN": "220629802628",
    "buyer_BIN": "220629802628",
    "total_amount": "-100"
}"#;

fn esfcheck() -> Command {
    Command::cargo_bin("esfcheck").unwrap()
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path.display().to_string()
}

/// Config file in the temp dir so a per-user config never leaks into tests.
fn config(dir: &Path) -> String {
    write(dir, "config.json", "{}")
}

#[test]
fn check_clean_json_prints_text_report() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "esf.json", CLEAN_JSON);

    esfcheck()
        .args(["-c", &config(dir.path()), "check", &input])
        .assert()
        .success()
        .stdout(predicate::str::contains("Supplier BIN:  220629802628"))
        .stdout(predicate::str::contains("Issue date:    2025-09-23"))
        .stdout(predicate::str::contains("Summary: 0 error(s), 0 warning(s)"));
}

#[test]
fn check_json_output_is_machine_readable() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "esf.json", BROKEN_JSON);

    let output = esfcheck()
        .args(["-c", &config(dir.path()), "check", &input, "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let findings = report["findings"].as_array().unwrap();
    assert_eq!(findings[0]["level"], "ERROR");

    let codes: Vec<&str> = findings.iter().filter_map(|f| f["code"].as_str()).collect();
    assert!(codes.contains(&"BIN007"));
    assert!(codes.contains(&"NEG001"));
}

#[test]
fn check_strict_fails_on_errors() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "esf.json", BROKEN_JSON);

    esfcheck()
        .args(["-c", &config(dir.path()), "check", &input, "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error finding(s)"));
}

#[test]
fn check_reads_sheet_export() {
    let dir = TempDir::new().unwrap();
    let input = write(
        dir.path(),
        "esf.csv",
        "Счет-фактура\nДата выписки;45923\n\nБИН поставщика;;220629802628\nБИН покупателя;;990101400039\nИтого с НДС;150000\n",
    );

    esfcheck()
        .args(["-c", &config(dir.path()), "check", &input, "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("file,code,level,"))
        .stdout(predicate::str::contains("D000,OK"));
}

#[test]
fn check_writes_audit_log() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "esf.json", BROKEN_JSON);
    let log = dir.path().join("logs").join("results.log");

    esfcheck()
        .args(["-c", &config(dir.path()), "check", &input, "--audit-log"])
        .arg(&log)
        .assert()
        .success();

    let content = fs::read_to_string(&log).unwrap();
    assert!(content.lines().next().unwrap().contains("[BIN001]"));
    assert!(content.contains("[ERROR] [NEG001]"));
}

#[test]
fn check_missing_file_fails() {
    let dir = TempDir::new().unwrap();

    esfcheck()
        .args(["-c", &config(dir.path()), "check", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn broken_config_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "esf.json", CLEAN_JSON);
    let config = write(dir.path(), "broken.json", "{ not json");

    esfcheck()
        .args(["-c", &config, "check", &input])
        .assert()
        .success()
        .stdout(predicate::str::contains("Summary: 0 error(s)"));
}

#[test]
fn batch_writes_outputs_and_summary() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    fs::create_dir(&docs).unwrap();
    write(&docs, "a.json", CLEAN_JSON);
    write(&docs, "b.json", BROKEN_JSON);
    write(&docs, "notes.md", "ignored");
    let out = dir.path().join("out");
    let pattern = docs.join("*.*").display().to_string();

    esfcheck()
        .args(["-c", &config(dir.path()), "batch", &pattern, "--summary", "-j", "2", "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Checked 2 files"));

    assert!(out.join("a.json.json").exists());
    assert!(out.join("b.json.json").exists());

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert!(summary.starts_with("file,status,errors,warnings"));
    assert!(summary.lines().any(|l| l.contains("a.json") && l.contains(",valid,")));
    assert!(summary.lines().any(|l| l.contains("b.json") && l.contains(",invalid,")));
}

#[test]
fn config_init_get_set() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("esfcheck").join("config.json").display().to_string();

    esfcheck()
        .args(["-c", &path, "config", "init"])
        .assert()
        .success();

    esfcheck()
        .args(["-c", &path, "config", "set", "dates.allow_future_days", "3"])
        .assert()
        .success();

    esfcheck()
        .args(["-c", &path, "config", "get", "dates.allow_future_days"])
        .assert()
        .success()
        .stdout(predicate::str::diff("3\n"));

    esfcheck()
        .args(["-c", &path, "config", "get", "dates.no_such_key"])
        .assert()
        .failure();

    esfcheck()
        .args(["-c", &path, "config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Future days:        3"));
}

#[test]
fn config_validate_rejects_broken_file() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "config.json", r#"{"dates": {"allow_future_days": "many"}}"#);

    esfcheck()
        .args(["-c", &path, "config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}
