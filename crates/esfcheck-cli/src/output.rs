//! Report rendering for the check and batch commands.

use std::path::Path;

use esfcheck_core::{Document, Finding, Level, ValidationReport};
use serde::Serialize;

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per finding
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

#[derive(Serialize)]
struct FileReport {
    file: String,
    document: Document,
    findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

pub fn format_report(path: &Path, report: &ValidationReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => format_json(path, report),
        OutputFormat::Csv => format_csv(path, report),
        OutputFormat::Text => Ok(format_text(path, report)),
    }
}

fn format_json(path: &Path, report: &ValidationReport) -> anyhow::Result<String> {
    // The raw text layer is an input, not a result.
    let mut document = report.document.clone();
    document.raw_text = None;

    let file_report = FileReport {
        file: path.display().to_string(),
        document,
        findings: report.findings.clone(),
        warnings: report.warnings.clone(),
    };
    Ok(serde_json::to_string_pretty(&file_report)?)
}

fn format_csv(path: &Path, report: &ValidationReport) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "file",
        "code",
        "level",
        "title",
        "description",
        "recommendation",
        "value",
        "provenance",
    ])?;

    let file = path.display().to_string();
    for finding in &report.findings {
        wtr.write_record([
            file.as_str(),
            &finding.code,
            finding.level.as_str(),
            &finding.title,
            &finding.description,
            &finding.recommendation,
            finding.value.as_deref().unwrap_or(""),
            finding.provenance.as_deref().unwrap_or(""),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(path: &Path, report: &ValidationReport) -> String {
    let doc = &report.document;
    let mut output = String::new();

    output.push_str(&format!("File: {}\n", path.display()));
    output.push('\n');

    output.push_str("Document:\n");
    output.push_str(&format!("  Supplier BIN:  {}\n", or_dash(&doc.supplier_tax_id)));
    output.push_str(&format!("  Buyer BIN:     {}\n", or_dash(&doc.buyer_tax_id)));
    output.push_str(&format!("  Issue date:    {}\n", or_dash(&doc.issue_date)));
    output.push_str(&format!("  Turnover date: {}\n", or_dash(&doc.turnover_date)));
    output.push_str(&format!("  Total:         {}\n", or_dash(&doc.total_amount)));
    if !doc.lines.is_empty() {
        output.push_str(&format!("  Lines:         {}\n", doc.lines.len()));
    }
    output.push('\n');

    output.push_str("Findings:\n");
    for finding in &report.findings {
        output.push_str(&format!("  [{}] {} {}", finding.level, finding.code, finding.title));
        if let Some(value) = &finding.value {
            output.push_str(&format!(" [{}]", value));
        }
        if let Some(provenance) = &finding.provenance {
            output.push_str(&format!(" ({})", provenance));
        }
        output.push('\n');
        if !finding.description.is_empty() {
            output.push_str(&format!("      {}\n", finding.description));
        }
        if !finding.recommendation.is_empty() {
            output.push_str(&format!("      > {}\n", finding.recommendation));
        }
    }
    output.push('\n');

    output.push_str(&format!(
        "Summary: {} error(s), {} warning(s), {} info\n",
        report.count(Level::Error),
        report.count(Level::Warn),
        report.count(Level::Info)
    ));

    output
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}
