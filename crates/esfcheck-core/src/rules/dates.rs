//! Issue-date rules.

use chrono::{NaiveTime, TimeDelta};

use super::texts::{failure, success};
use super::{Rule, RuleContext, RuleOutcome};
use crate::error::RuleFault;
use crate::models::document::{Document, fields};
use crate::models::finding::Level;

/// D000: the issue date is present and parseable.
pub struct IssueDatePresence;

impl Rule for IssueDatePresence {
    fn code(&self) -> &'static str {
        "D000"
    }

    fn check(&self, doc: &Document, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleFault> {
        let code = self.code();
        let provenance = doc.locator(fields::ISSUE_DATE);

        if doc.issue_date_value().is_some() {
            let finding = success(ctx.config, code, Level::Ok)
                .with_value(doc.issue_date.trim())
                .with_provenance(provenance);
            return Ok(finding.into());
        }

        let level = if ctx.config.dates.require_issue_date {
            ctx.config.severity_for(code, Level::Error)
        } else {
            Level::Info
        };
        let mut finding = failure(ctx.config, code, level).with_provenance(provenance);
        let raw = doc
            .unparsed
            .get(fields::ISSUE_DATE)
            .map(String::as_str)
            .unwrap_or(doc.issue_date.as_str())
            .trim();
        if !raw.is_empty() {
            finding = finding.with_value(raw);
        }
        Ok(finding.into())
    }
}

/// D001: the issue date is not later than now plus the configured tolerance.
///
/// Suppressed when the date is missing or unparsable; D000 reports that.
pub struct FutureIssueDate;

impl Rule for FutureIssueDate {
    fn code(&self) -> &'static str {
        "D001"
    }

    fn check(&self, doc: &Document, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleFault> {
        let code = self.code();
        let Some(date) = doc.issue_date_value() else {
            return Ok(RuleOutcome::Suppressed);
        };

        let dates = &ctx.config.dates;
        let tolerance = TimeDelta::try_days(dates.allow_future_days)
            .zip(TimeDelta::try_minutes(dates.tolerance_minutes))
            .and_then(|(days, minutes)| days.checked_add(&minutes))
            .ok_or_else(|| RuleFault::new(code, "future-date tolerance out of range"))?;
        let limit = ctx
            .now
            .checked_add_signed(tolerance)
            .ok_or_else(|| RuleFault::new(code, "future-date limit out of range"))?;

        let finding = if date.and_time(NaiveTime::MIN) > limit {
            failure(ctx.config, code, ctx.config.severity_for(code, Level::Error))
        } else {
            success(ctx.config, code, Level::Ok)
        };
        Ok(finding
            .with_value(doc.issue_date.trim())
            .with_provenance(doc.locator(fields::ISSUE_DATE))
            .into())
    }
}
