//! Batch command - validate many documents concurrently.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use futures_util::{StreamExt, stream};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use esfcheck_core::{Level, ValidationReport, Validator};

use crate::input::{self, InputKind};
use crate::output::{self, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    /// Append audit records to this file
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Exit with an error status when any document has ERROR findings
    #[arg(long)]
    strict: bool,
}

/// Result of checking a single file.
struct CheckResult {
    path: PathBuf,
    report: Option<ValidationReport>,
    error: Option<String>,
    processing_time_ms: u64,
}

impl CheckResult {
    fn status(&self) -> &'static str {
        match &self.report {
            None => "failed",
            Some(report) if report.has_errors() => "invalid",
            Some(_) => "valid",
        }
    }
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = super::load_config(config_path);
    super::apply_audit_override(&mut config, args.audit_log.as_deref());
    let validator = Arc::new(Validator::new(config));

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| InputKind::detect(p).is_some())
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to check",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(output_dir) = &args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    // Documents are independent; each runs on a blocking worker and results
    // come back in input order.
    let mut checks = stream::iter(files.into_iter().map(|path| {
        let validator = Arc::clone(&validator);
        tokio::task::spawn_blocking(move || check_file(path, &validator))
    }))
    .buffered(args.jobs.max(1));

    let mut results = Vec::new();
    while let Some(joined) = checks.next().await {
        let result = joined?;
        if let Some(error_msg) = &result.error {
            if args.continue_on_error {
                warn!("Failed to check {}: {}", result.path.display(), error_msg);
            } else {
                error!("Failed to check {}: {}", result.path.display(), error_msg);
                overall_pb.abandon();
                anyhow::bail!("Checking failed: {}", error_msg);
            }
        }
        overall_pb.inc(1);
        results.push(result);
    }

    overall_pb.finish_and_clear();

    for result in &results {
        let Some(report) = &result.report else {
            continue;
        };

        println!(
            "  {} {}: {} error(s), {} warning(s)",
            if report.has_errors() { style("✗").red() } else { style("✓").green() },
            result.path.display(),
            report.count(Level::Error),
            report.count(Level::Warn)
        );

        if let Some(output_dir) = &args.output_dir {
            let output_name = result.path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("document");
            let output_path = output_dir.join(format!("{}.{}", output_name, args.format.extension()));

            let content = output::format_report(&result.path, report, args.format)?;
            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args.output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let valid = results.iter().filter(|r| r.status() == "valid").count();
    let invalid = results.iter().filter(|r| r.status() == "invalid").count();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    println!();
    println!(
        "{} Checked {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} valid, {} with errors, {} failed",
        style(valid).green(),
        style(invalid).yellow(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if args.strict && invalid > 0 {
        anyhow::bail!("{} document(s) with error findings", invalid);
    }

    Ok(())
}

fn check_file(path: PathBuf, validator: &Validator) -> CheckResult {
    let file_start = Instant::now();
    let (report, error) = match input::load_source(&path, None) {
        Ok(source) => (Some(validator.validate_source(&source)), None),
        Err(e) => (None, Some(e.to_string())),
    };
    CheckResult {
        path,
        report,
        error,
        processing_time_ms: file_start.elapsed().as_millis() as u64,
    }
}

fn write_summary(path: &Path, results: &[CheckResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "file",
        "status",
        "errors",
        "warnings",
        "supplier_tax_id",
        "buyer_tax_id",
        "issue_date",
        "total_amount",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let (errors, warnings, doc) = match &result.report {
            Some(report) => (
                report.count(Level::Error).to_string(),
                report.count(Level::Warn).to_string(),
                Some(&report.document),
            ),
            None => (String::new(), String::new(), None),
        };

        wtr.write_record([
            result.path.display().to_string().as_str(),
            result.status(),
            &errors,
            &warnings,
            doc.map(|d| d.supplier_tax_id.as_str()).unwrap_or(""),
            doc.map(|d| d.buyer_tax_id.as_str()).unwrap_or(""),
            doc.map(|d| d.issue_date.as_str()).unwrap_or(""),
            doc.map(|d| d.total_amount.as_str()).unwrap_or(""),
            &result.processing_time_ms.to_string(),
            result.error.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
