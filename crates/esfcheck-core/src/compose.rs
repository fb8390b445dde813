//! Deterministic ordering of findings.

use crate::models::config::Config;
use crate::models::finding::Finding;
use crate::rules::texts;

/// Default ordering weight of a rule code by its group: tax IDs, then
/// dates, then money, then everything else.
pub fn group_weight(code: &str) -> i32 {
    let prefix: String = code
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    match prefix.as_str() {
        "BIN" | "ID" => 0,
        "D" | "DATE" => 1,
        "TOT" | "AMT" | "SUM" | "VAT" | "NEG" | "ROUND" => 2,
        _ => 3,
    }
}

/// Sort findings by severity, then configured priority or group weight, then
/// code. The sort is stable, so equal keys keep their input order.
///
/// An empty input yields a single informational "all checks passed" finding.
pub fn compose(mut findings: Vec<Finding>, config: &Config) -> Vec<Finding> {
    if findings.is_empty() {
        return vec![texts::all_passed(config)];
    }
    findings.sort_by_cached_key(|finding| {
        let priority = config
            .priority_for(&finding.code)
            .unwrap_or_else(|| group_weight(&finding.code));
        (finding.level.rank(), priority, finding.code.clone())
    });
    findings
}
