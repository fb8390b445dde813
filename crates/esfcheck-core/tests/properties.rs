use chrono::{NaiveDate, NaiveDateTime};
use esfcheck_core::extract::{checksum_valid, is_valid_tax_id, parse_date_text};
use esfcheck_core::models::document::fields;
use esfcheck_core::*;
use pretty_assertions::assert_eq;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 9, 23).unwrap().and_hms_opt(10, 0, 0).unwrap()
}

fn valid_parties() -> Document {
    let mut doc = Document::new();
    doc.set(fields::SUPPLIER_TAX_ID, "220629802628", "FIELD:supplier_BIN");
    doc.set(fields::BUYER_TAX_ID, "990101400039", "FIELD:buyer_BIN");
    doc
}

fn level_of(findings: &[Finding], code: &str) -> Option<Level> {
    findings.iter().find(|f| f.code == code).map(|f| f.level)
}

fn evaluate(doc: &Document, config: Config) -> Vec<Finding> {
    let evaluator = RuleEvaluator::new(config);
    compose(evaluator.evaluate_at(doc, now()), evaluator.config())
}

// --- Tax IDs ---

#[test]
fn identical_digit_ids_are_never_valid() {
    for d in '0'..='9' {
        let id: String = std::iter::repeat_n(d, 12).collect();
        assert!(!is_valid_tax_id(&id), "{} accepted", id);
    }
}

#[test]
fn checksum_two_rounds() {
    // round one
    assert!(checksum_valid("422525832959"));
    assert!(checksum_valid("220629802628"));
    // round one remainder 10, round two decides
    assert!(checksum_valid("123456789013"));
    assert!(!checksum_valid("987650000000"));
    assert!(!checksum_valid("220629802621"));
}

#[test]
fn checksum_rule_reports_each_role() {
    let mut config = Config::default();
    config.tax_id.checksum_enabled = true;
    let mut doc = valid_parties();
    doc.set(fields::BUYER_TAX_ID, "987650000000", "FIELD:buyer_BIN");

    let findings = evaluate(&doc, config);
    let checksum: Vec<Level> = findings.iter().filter(|f| f.code == "BIN012").map(|f| f.level).collect();
    assert_eq!(checksum, vec![Level::Error, Level::Ok]);
}

// --- Dates ---

#[test]
fn numeric_and_long_dates_normalize_to_iso() {
    let expected = NaiveDate::from_ymd_opt(2025, 9, 23);
    assert_eq!(parse_date_text("2025-09-23"), expected);
    assert_eq!(parse_date_text("23 сентября 2025"), expected);
    assert_eq!(parse_date_text("23.09.2025"), expected);
    assert_eq!(parse_date_text("2025/09/23"), expected);
}

#[test]
fn future_date_respects_tolerance() {
    let mut doc = valid_parties();
    doc.set(fields::ISSUE_DATE, "2025-09-24", "TEXT:label@0");

    let findings = evaluate(&doc, Config::default());
    assert_eq!(level_of(&findings, "D001"), Some(Level::Error));

    let mut config = Config::default();
    config.dates.allow_future_days = 5;
    let findings = evaluate(&doc, config);
    assert_eq!(level_of(&findings, "D001"), Some(Level::Ok));
}

#[test]
fn future_date_silent_when_date_unparsable() {
    let source = SourceRecord::new()
        .with_field("supplier_BIN", "220629802628")
        .with_field("date_issue", "31.02.2025");
    let validator = Validator::new(Config::default());
    let report = validator.validate_source_at(&source, now());

    assert_eq!(level_of(&report.findings, "D000"), Some(Level::Error));
    assert_eq!(level_of(&report.findings, "D001"), None);
    let d000 = report.findings.iter().find(|f| f.code == "D000").unwrap();
    assert_eq!(d000.value.as_deref(), Some("31.02.2025"));
}

// --- Totals ---

fn with_lines(total: &str) -> Document {
    let mut doc = valid_parties();
    doc.set(fields::ISSUE_DATE, "2025-09-20", "TEXT:label@0");
    if !total.is_empty() {
        doc.set(fields::TOTAL_AMOUNT, total, "FIELD:total_amount");
    }
    doc.lines = vec![
        LineItem::new(1, "Консультации", "100000"),
        LineItem::new(2, "Сопровождение", "50000"),
    ];
    doc
}

#[test]
fn line_sum_reconciliation() {
    let config = Config::default();
    assert_eq!(level_of(&evaluate(&with_lines("150000"), config.clone()), "TOT001"), Some(Level::Ok));
    assert_eq!(level_of(&evaluate(&with_lines("150010"), config.clone()), "TOT001"), Some(Level::Error));
    assert_eq!(level_of(&evaluate(&with_lines("150000.3"), config.clone()), "TOT001"), Some(Level::Ok));
    assert_eq!(level_of(&evaluate(&with_lines(""), config), "TOT001"), Some(Level::Warn));
}

#[test]
fn negative_and_absent_totals() {
    let mut doc = valid_parties();
    doc.set(fields::TOTAL_AMOUNT, "-100", "FIELD:total_amount");
    assert_eq!(level_of(&evaluate(&doc, Config::default()), "NEG001"), Some(Level::Error));

    let findings = evaluate(&valid_parties(), Config::default());
    assert_eq!(level_of(&findings, "NEG001"), Some(Level::Warn));
}

// --- Composition ---

#[test]
fn error_sorts_before_warning_regardless_of_code() {
    let findings = vec![
        Finding::new("AMT001", Level::Warn, "сумма"),
        Finding::new("D000", Level::Error, "дата"),
    ];
    let ordered = compose(findings, &Config::default());
    assert_eq!(ordered[0].code, "D000");

    // the same through the evaluator: missing date (ERROR) and missing total (WARN)
    let findings = evaluate(&valid_parties(), Config::default());
    let d000 = findings.iter().position(|f| f.code == "D000").unwrap();
    let neg001 = findings.iter().position(|f| f.code == "NEG001").unwrap();
    assert!(d000 < neg001);
    assert_eq!(findings[0].level, Level::Error);
}

#[test]
fn evaluation_is_idempotent() {
    let doc = with_lines("150010");
    let config = Config::default();
    let first = evaluate(&doc, config.clone());
    let second = evaluate(&doc, config);
    assert_eq!(first, second);
}

#[test]
fn clean_document_yields_only_passes() {
    let mut doc = with_lines("150000");
    doc.set(fields::TURNOVER_DATE, "2025-09-20", "TEXT:label@0");
    let findings = evaluate(&doc, Config::default());
    assert!(findings.iter().all(|f| f.level == Level::Ok), "{:?}", findings);
}

#[test]
fn empty_finding_list_becomes_single_pass() {
    let findings = compose(Vec::new(), &Config::default());
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].level, Level::Info);
}
