//! Business rules over a canonical [`Document`].
//!
//! Every rule is an independent check returning one finding, several, or an
//! explicit suppression. The catalogue runs in a fixed order, and a rule that
//! faults or panics is reported as an ERROR finding without stopping the rest.

pub mod dates;
pub mod taxid;
pub mod texts;
pub mod totals;

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, warn};

use crate::error::RuleFault;
use crate::extract::{AmountExtractor, SectionFinder};
use crate::models::config::Config;
use crate::models::document::Document;
use crate::models::finding::Finding;

pub use dates::{FutureIssueDate, IssueDatePresence};
pub use taxid::{TaxIdChecksum, TaxIdEquality, TaxIdFormat};
pub use totals::{LineSum, TotalNonNegative, TotalSanity};

/// What a rule produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    One(Finding),
    Many(Vec<Finding>),
    /// The rule does not apply; another rule reports the underlying problem.
    Suppressed,
}

impl RuleOutcome {
    pub fn into_findings(self) -> Vec<Finding> {
        match self {
            RuleOutcome::One(finding) => vec![finding],
            RuleOutcome::Many(findings) => findings,
            RuleOutcome::Suppressed => Vec::new(),
        }
    }
}

impl From<Finding> for RuleOutcome {
    fn from(finding: Finding) -> Self {
        RuleOutcome::One(finding)
    }
}

/// Read-only inputs shared by every rule in one evaluation.
pub struct RuleContext<'a> {
    pub config: &'a Config,
    /// Reference time for date checks.
    pub now: NaiveDateTime,
    /// Used to re-search a mis-extracted total in the raw text.
    pub amounts: &'a AmountExtractor,
    pub sections: &'a SectionFinder,
}

/// A single business rule.
pub trait Rule: Send + Sync {
    /// Stable rule code, e.g. `BIN001`.
    fn code(&self) -> &'static str;

    /// Check the document. Must not have side effects.
    fn check(&self, doc: &Document, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleFault>;
}

/// The rule catalogue in execution order.
pub fn catalog() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(TaxIdFormat::supplier()),
        Box::new(TaxIdFormat::buyer()),
        Box::new(TaxIdEquality),
        Box::new(TaxIdChecksum),
        Box::new(IssueDatePresence),
        Box::new(FutureIssueDate),
        Box::new(LineSum),
        Box::new(TotalNonNegative),
        Box::new(TotalSanity),
    ]
}

/// Runs the rule catalogue against documents.
pub struct RuleEvaluator {
    config: Arc<Config>,
    rules: Vec<Box<dyn Rule>>,
    amounts: AmountExtractor,
    sections: SectionFinder,
}

impl RuleEvaluator {
    pub fn new(config: impl Into<Arc<Config>>) -> Self {
        let config = config.into();
        Self {
            amounts: AmountExtractor::new(&config),
            sections: SectionFinder::new(&config.sections),
            rules: catalog(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Codes of the catalogue, in execution order.
    pub fn codes(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.code()).collect()
    }

    /// Evaluate against the current local time.
    pub fn evaluate(&self, doc: &Document) -> Vec<Finding> {
        self.evaluate_at(doc, Local::now().naive_local())
    }

    /// Evaluate every rule in catalogue order. Findings are not sorted.
    pub fn evaluate_at(&self, doc: &Document, now: NaiveDateTime) -> Vec<Finding> {
        let ctx = RuleContext {
            config: &self.config,
            now,
            amounts: &self.amounts,
            sections: &self.sections,
        };

        let mut findings = Vec::new();
        for rule in &self.rules {
            let code = rule.code();
            let outcome = catch_unwind(AssertUnwindSafe(|| rule.check(doc, &ctx)))
                .unwrap_or_else(|panic| Err(RuleFault::new(code, panic_message(panic.as_ref()))));

            match outcome {
                Ok(outcome) => {
                    let produced = outcome.into_findings();
                    debug!("{} produced {} finding(s)", code, produced.len());
                    findings.extend(produced);
                }
                Err(fault) => {
                    warn!("Rule {} failed: {}", code, fault.reason);
                    findings.push(texts::fault(code, &fault.reason));
                }
            }
        }
        findings
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::finding::Level;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    struct Faulty;

    impl Rule for Faulty {
        fn code(&self) -> &'static str {
            "FLT001"
        }

        fn check(&self, _doc: &Document, _ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleFault> {
            Err(RuleFault::new("FLT001", "broken"))
        }
    }

    struct Panicking;

    impl Rule for Panicking {
        fn code(&self) -> &'static str {
            "PAN001"
        }

        fn check(&self, _doc: &Document, _ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleFault> {
            panic!("boom")
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_catalogue_order() {
        let evaluator = RuleEvaluator::new(Config::default());
        assert_eq!(
            evaluator.codes(),
            vec!["BIN001", "BIN002", "BIN007", "BIN012", "D000", "D001", "TOT001", "NEG001", "TOT002"]
        );
    }

    #[test]
    fn test_faults_become_findings_and_do_not_stop_others() {
        let mut evaluator = RuleEvaluator::new(Config::default());
        evaluator.rules.insert(0, Box::new(Faulty));
        evaluator.rules.insert(1, Box::new(Panicking));

        let findings = evaluator.evaluate_at(&Document::new(), noon());

        assert_eq!(findings[0].code, "FLT001");
        assert_eq!(findings[0].level, Level::Error);
        assert!(findings[0].description.contains("broken"));
        assert_eq!(findings[1].code, "PAN001");
        assert!(findings[1].description.contains("boom"));
        assert!(findings.iter().any(|f| f.code == "BIN001"));
        assert!(findings.iter().any(|f| f.code == "NEG001"));
    }

    #[test]
    fn test_empty_document() {
        let evaluator = RuleEvaluator::new(Config::default());
        let findings = evaluator.evaluate_at(&Document::new(), noon());
        let summary: Vec<(&str, Level)> = findings.iter().map(|f| (f.code.as_str(), f.level)).collect();

        assert_eq!(
            summary,
            vec![
                ("BIN001", Level::Error),
                ("BIN002", Level::Error),
                ("D000", Level::Error),
                ("TOT001", Level::Warn),
                ("NEG001", Level::Warn),
            ]
        );
    }
}
