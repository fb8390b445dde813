//! Monetary rules: line reconciliation, sign and sanity of the declared total.

use rust_decimal::Decimal;
use tracing::debug;

use super::texts::{failure, success};
use super::{Rule, RuleContext, RuleOutcome};
use crate::error::RuleFault;
use crate::extract::amounts::is_suspicious_index;
use crate::models::document::{Document, fields};
use crate::models::finding::Level;
use crate::normalize::parse_amount;

const ABSENT: &str = "Итоговая сумма документа не найдена";
const NO_LINES: &str = "Строки документа не найдены, сверка с итогом невозможна";

/// The document total as the monetary rules see it.
#[derive(Debug, Clone, PartialEq)]
enum DeclaredTotal {
    Absent,
    NonNumeric(String),
    Value {
        amount: Decimal,
        raw: String,
        locator: Option<String>,
        /// Replaced by a re-search of the raw text.
        recovered: bool,
    },
}

/// Resolve the declared total. A bare 1–12 integer is treated as a
/// mis-extracted column index and re-searched in the raw text; it is kept
/// only when the search finds nothing better.
fn declared_total(doc: &Document, ctx: &RuleContext<'_>) -> DeclaredTotal {
    let raw = doc.total_amount.trim();
    if raw.is_empty() {
        return DeclaredTotal::Absent;
    }
    let Some(amount) = parse_amount(raw) else {
        return DeclaredTotal::NonNumeric(raw.to_string());
    };
    let locator = doc.locator(fields::TOTAL_AMOUNT).map(str::to_string);

    if is_suspicious_index(amount) {
        let recovered = doc
            .raw_text
            .as_deref()
            .and_then(|text| ctx.amounts.search_total(text, ctx.sections))
            .filter(|hit| hit.value > Decimal::ZERO && !is_suspicious_index(hit.value));
        if let Some(hit) = recovered {
            debug!("Total {} looks like a column index, recovered {} at {}", raw, hit.value, hit.locator);
            return DeclaredTotal::Value {
                amount: hit.value,
                raw: hit.value.to_string(),
                locator: Some(hit.locator),
                recovered: true,
            };
        }
    }

    DeclaredTotal::Value {
        amount,
        raw: raw.to_string(),
        locator,
        recovered: false,
    }
}

/// TOT001: line amounts add up to the declared total within the tolerance.
pub struct LineSum;

impl Rule for LineSum {
    fn code(&self) -> &'static str {
        "TOT001"
    }

    fn check(&self, doc: &Document, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleFault> {
        let code = self.code();
        let (total, raw, locator) = match declared_total(doc, ctx) {
            DeclaredTotal::Value { amount, raw, locator, .. } => (amount, raw, locator),
            DeclaredTotal::Absent | DeclaredTotal::NonNumeric(_) => {
                return Ok(failure(ctx.config, code, Level::Warn).with_description(ABSENT).into());
            }
        };

        if doc.lines.is_empty() {
            return Ok(failure(ctx.config, code, Level::Warn)
                .with_description(NO_LINES)
                .with_value(raw)
                .with_provenance(locator.as_deref())
                .into());
        }

        let mut sum = Decimal::ZERO;
        for line in &doc.lines {
            let Some(amount) = parse_amount(&line.amount) else {
                debug!("Line {} has no numeric amount: {:?}", line.line_no, line.amount);
                continue;
            };
            sum = sum
                .checked_add(amount)
                .ok_or_else(|| RuleFault::new(code, "line sum overflow"))?;
        }

        let difference = (sum - total).abs();
        let finding = if difference > ctx.config.totals.line_tolerance {
            failure(ctx.config, code, ctx.config.severity_for(code, Level::Error))
        } else {
            success(ctx.config, code, Level::Ok)
        };
        Ok(finding
            .with_value(format!("{} / {}", sum, total))
            .with_provenance(locator.as_deref())
            .into())
    }
}

/// NEG001: the declared total is not negative.
///
/// An absent total is a warning; a non-numeric one is left to TOT002.
pub struct TotalNonNegative;

impl Rule for TotalNonNegative {
    fn code(&self) -> &'static str {
        "NEG001"
    }

    fn check(&self, doc: &Document, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleFault> {
        let code = self.code();
        match declared_total(doc, ctx) {
            DeclaredTotal::Absent => Ok(failure(ctx.config, code, Level::Warn).with_description(ABSENT).into()),
            DeclaredTotal::NonNumeric(_) => Ok(RuleOutcome::Suppressed),
            DeclaredTotal::Value { amount, raw, locator, .. } => {
                let finding = if amount.is_sign_negative() && !amount.is_zero() {
                    failure(ctx.config, code, ctx.config.severity_for(code, Level::Error))
                } else {
                    success(ctx.config, code, Level::Ok)
                };
                Ok(finding.with_value(raw).with_provenance(locator.as_deref()).into())
            }
        }
    }
}

/// TOT002: the declared total is a positive number and not a stray index.
pub struct TotalSanity;

impl Rule for TotalSanity {
    fn code(&self) -> &'static str {
        "TOT002"
    }

    fn check(&self, doc: &Document, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleFault> {
        let code = self.code();
        let severity = ctx.config.severity_for(code, Level::Error);
        match declared_total(doc, ctx) {
            DeclaredTotal::Absent => Ok(RuleOutcome::Suppressed),
            DeclaredTotal::NonNumeric(raw) => Ok(failure(ctx.config, code, severity)
                .with_value(raw)
                .with_provenance(doc.locator(fields::TOTAL_AMOUNT))
                .into()),
            DeclaredTotal::Value {
                amount,
                raw,
                locator,
                recovered,
            } => {
                let finding = if amount <= Decimal::ZERO || is_suspicious_index(amount) {
                    failure(ctx.config, code, severity)
                } else if recovered {
                    success(ctx.config, code, Level::Ok)
                        .with_description(format!("Итог уточнён повторным поиском вместо {}", doc.total_amount.trim()))
                } else {
                    success(ctx.config, code, Level::Ok)
                };
                Ok(finding.with_value(raw).with_provenance(locator.as_deref()).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{AmountExtractor, SectionFinder};
    use crate::models::config::Config;
    use crate::models::document::LineItem;
    use crate::models::finding::Finding;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn run(rule: &dyn Rule, doc: &Document) -> Vec<Finding> {
        let config = Config::default();
        let amounts = AmountExtractor::new(&config);
        let sections = SectionFinder::new(&config.sections);
        let ctx = RuleContext {
            config: &config,
            now: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            amounts: &amounts,
            sections: &sections,
        };
        rule.check(doc, &ctx).unwrap().into_findings()
    }

    fn with_total(total: &str) -> Document {
        let mut doc = Document::new();
        doc.set(fields::TOTAL_AMOUNT, total, "FIELD:total_amount");
        doc
    }

    fn with_lines(total: &str, amounts: &[&str]) -> Document {
        let mut doc = with_total(total);
        doc.lines = amounts
            .iter()
            .zip(1..)
            .map(|(amount, n)| LineItem::new(n, format!("Позиция {}", n), *amount))
            .collect();
        doc
    }

    #[test]
    fn test_line_sum_tolerance() {
        let lines = ["100000", "50000,00"];
        assert_eq!(run(&LineSum, &with_lines("150000", &lines))[0].level, Level::Ok);
        assert_eq!(run(&LineSum, &with_lines("150000.3", &lines))[0].level, Level::Ok);

        let findings = run(&LineSum, &with_lines("150010", &lines));
        assert_eq!(findings[0].level, Level::Error);
        assert_eq!(findings[0].value.as_deref(), Some("150000.00 / 150010"));
    }

    #[test]
    fn test_line_sum_without_lines_or_total() {
        let findings = run(&LineSum, &with_total("150000"));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].level, Level::Warn);
        assert_eq!(findings[0].description, NO_LINES);
        assert_eq!(findings[0].value.as_deref(), Some("150000"));

        let findings = run(&LineSum, &with_lines("", &["100"]));
        assert_eq!(findings[0].level, Level::Warn);
        assert_eq!(findings[0].description, ABSENT);
    }

    #[test]
    fn test_line_sum_reports_absent_total_before_missing_lines() {
        for doc in [Document::new(), with_total("n/a")] {
            let findings = run(&LineSum, &doc);
            assert_eq!(findings.len(), 1);
            assert_eq!(findings[0].level, Level::Warn);
            assert_eq!(findings[0].description, ABSENT);
        }
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(run(&TotalNonNegative, &with_total("-100"))[0].level, Level::Error);
        assert_eq!(run(&TotalNonNegative, &with_total("0"))[0].level, Level::Ok);
        assert_eq!(run(&TotalNonNegative, &Document::new())[0].level, Level::Warn);
        assert!(run(&TotalNonNegative, &with_total("n/a")).is_empty());
    }

    #[test]
    fn test_sanity() {
        assert!(run(&TotalSanity, &Document::new()).is_empty());

        let findings = run(&TotalSanity, &with_total("сто тысяч"));
        assert_eq!(findings[0].level, Level::Error);
        assert_eq!(findings[0].value.as_deref(), Some("сто тысяч"));

        assert_eq!(run(&TotalSanity, &with_total("0"))[0].level, Level::Error);
        assert_eq!(run(&TotalSanity, &with_total("7"))[0].level, Level::Error);
        assert_eq!(run(&TotalSanity, &with_total("150000.00"))[0].level, Level::Ok);
    }

    #[test]
    fn test_sanity_recovers_column_index_from_raw_text() {
        let mut doc = with_total("8");
        doc.raw_text = Some("Итого с НДС: 8\nВсего к оплате: 150 000,00".to_string());

        let findings = run(&TotalSanity, &doc);
        assert_eq!(findings[0].level, Level::Ok);
        assert_eq!(findings[0].value.as_deref(), Some("150000.00"));
        assert!(findings[0].provenance.as_deref().unwrap().starts_with("TEXT:gross@"));

        let mut doc = with_lines("8", &["150000"]);
        doc.raw_text = Some("Всего к оплате: 150 000,00".to_string());
        assert_eq!(run(&LineSum, &doc)[0].level, Level::Ok);
    }
}
