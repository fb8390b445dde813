//! End-to-end validation: extraction, rule evaluation, audit and ordering.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{info, warn};

use crate::audit::{AuditRecord, AuditSink, FileAuditSink};
use crate::compose::compose;
use crate::extract::DocumentParser;
use crate::models::config::Config;
use crate::models::document::Document;
use crate::models::finding::{Finding, Level};
use crate::models::source::SourceRecord;
use crate::rules::RuleEvaluator;

/// Outcome of validating one source.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Canonical document the rules ran against.
    pub document: Document,
    /// Ordered findings.
    pub findings: Vec<Finding>,
    /// Fields the extractors could not locate.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn count(&self, level: Level) -> usize {
        self.findings.iter().filter(|f| f.level == level).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Level::Error) > 0
    }
}

/// Validates documents against one immutable configuration.
///
/// Holds no per-document state, so one instance can be shared across threads.
pub struct Validator {
    config: Arc<Config>,
    parser: DocumentParser,
    evaluator: RuleEvaluator,
    audit: Option<Arc<dyn AuditSink>>,
}

impl Validator {
    /// Create a validator. A file audit sink is attached when the
    /// configuration enables auditing.
    pub fn new(config: impl Into<Arc<Config>>) -> Self {
        let config: Arc<Config> = config.into();
        let audit = config
            .audit
            .enabled
            .then(|| Arc::new(FileAuditSink::new(config.audit.path.clone())) as Arc<dyn AuditSink>);
        Self {
            parser: DocumentParser::new(&config),
            evaluator: RuleEvaluator::new(Arc::clone(&config)),
            audit,
            config,
        }
    }

    /// Replace the audit sink.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Disable auditing.
    pub fn without_audit(mut self) -> Self {
        self.audit = None;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn parser(&self) -> &DocumentParser {
        &self.parser
    }

    /// Extract a document from a source and validate it.
    pub fn validate_source(&self, source: &SourceRecord) -> ValidationReport {
        self.validate_source_at(source, Local::now().naive_local())
    }

    pub fn validate_source_at(&self, source: &SourceRecord, now: NaiveDateTime) -> ValidationReport {
        let parsed = self.parser.parse_detailed(source);
        let findings = self.validate_at(&parsed.document, now);
        ValidationReport {
            document: parsed.document,
            findings,
            warnings: parsed.warnings,
        }
    }

    /// Validate an already canonical document.
    pub fn validate(&self, doc: &Document) -> Vec<Finding> {
        self.validate_at(doc, Local::now().naive_local())
    }

    /// Evaluate the rules, audit every finding in evaluation order, then sort.
    pub fn validate_at(&self, doc: &Document, now: NaiveDateTime) -> Vec<Finding> {
        let findings = self.evaluator.evaluate_at(doc, now);
        self.audit_findings(&findings, now);

        let findings = compose(findings, &self.config);
        info!(
            "Validation finished: {} error(s), {} warning(s), {} finding(s) total",
            findings.iter().filter(|f| f.level == Level::Error).count(),
            findings.iter().filter(|f| f.level == Level::Warn).count(),
            findings.len()
        );
        findings
    }

    fn audit_findings(&self, findings: &[Finding], now: NaiveDateTime) {
        let Some(sink) = &self.audit else {
            return;
        };
        for finding in findings {
            if let Err(e) = sink.append(&AuditRecord::from_finding(finding, now)) {
                warn!("Audit record for {} not written: {}", finding.code, e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::models::document::{LineItem, fields};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 1).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn test_audit_records_written_before_sorting() {
        let sink = Arc::new(MemoryAuditSink::new());
        let validator = Validator::new(Config::default()).with_audit_sink(sink.clone());

        let mut doc = Document::new();
        doc.set(fields::SUPPLIER_TAX_ID, "220629802621", "FIELD:supplier_BIN");
        doc.set(fields::TOTAL_AMOUNT, "-100", "FIELD:total_amount");

        let findings = validator.validate_at(&doc, now());
        let audited: Vec<String> = sink.records().into_iter().map(|r| r.code).collect();

        assert_eq!(audited, vec!["BIN001", "BIN002", "D000", "TOT001", "NEG001", "TOT002"]);
        let ordered: Vec<&str> = findings.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(ordered, vec!["BIN002", "D000", "NEG001", "TOT002", "TOT001", "BIN001"]);
    }

    #[test]
    fn test_validate_source_reports_document() {
        let validator = Validator::new(Config::default());
        let source = SourceRecord::new()
            .with_field("supplier_BIN", "220629802621")
            .with_field("buyer_BIN", "990101400039")
            .with_field("date_issue", "23.09.2025")
            .with_field("total_amount", "150 000,00")
            .with_lines(vec![LineItem::new(1, "Консультации", "150000")]);

        let report = validator.validate_source_at(&source, now());
        assert_eq!(report.document.issue_date, "2025-09-23");
        assert!(!report.has_errors());
        assert!(report.findings.iter().all(|f| f.level == Level::Ok));
    }

    #[test]
    fn test_total_without_lines_warns_instead_of_passing() {
        let validator = Validator::new(Config::default());
        let source = SourceRecord::new()
            .with_field("supplier_BIN", "220629802621")
            .with_field("buyer_BIN", "990101400039")
            .with_field("date_issue", "23.09.2025")
            .with_field("total_amount", "150 000,00");

        let report = validator.validate_source_at(&source, now());
        assert!(!report.has_errors());
        let tot001 = report.findings.iter().find(|f| f.code == "TOT001").unwrap();
        assert_eq!(tot001.level, Level::Warn);
        assert_eq!(tot001.value.as_deref(), Some("150000.00"));
    }
}
