//! Check command - validate a single document.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use esfcheck_core::{Level, Validator};

use crate::input::{self, InputKind};
use crate::output::{self, OutputFormat};

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Input file (PDF, JSON, CSV sheet export or plain text)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Read the input as this kind instead of guessing from the extension
    #[arg(long, value_enum)]
    kind: Option<InputKind>,

    /// Append audit records to this file
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Exit with an error status when any ERROR finding is reported
    #[arg(long)]
    strict: bool,

    /// Print extraction warnings
    #[arg(long)]
    show_warnings: bool,
}

pub async fn run(args: CheckArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = super::load_config(config_path);
    super::apply_audit_override(&mut config, args.audit_log.as_deref());

    info!("Checking file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );

    pb.set_message("Reading input...");
    let source = input::load_source(&args.input, args.kind)?;

    pb.set_message("Validating...");
    let validator = Validator::new(config);
    let report = validator.validate_source(&source);

    pb.finish_and_clear();

    if args.show_warnings && !report.warnings.is_empty() {
        eprintln!("{}", style("Extraction warnings:").yellow());
        for warning in &report.warnings {
            eprintln!("  - {}", warning);
        }
    }

    let rendered = output::format_report(&args.input, &report, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &rendered)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", rendered);
    }

    let errors = report.count(Level::Error);
    let warnings = report.count(Level::Warn);
    let marker = if errors > 0 {
        style("✗").red()
    } else if warnings > 0 {
        style("!").yellow()
    } else {
        style("✓").green()
    };
    eprintln!(
        "{} {} error(s), {} warning(s) in {:?}",
        marker,
        errors,
        warnings,
        start.elapsed()
    );

    if args.strict && errors > 0 {
        anyhow::bail!("{} error finding(s) in {}", errors, args.input.display());
    }

    Ok(())
}
