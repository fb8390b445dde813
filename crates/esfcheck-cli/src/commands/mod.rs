//! Subcommands.

pub mod batch;
pub mod check;
pub mod config;

use std::path::{Path, PathBuf};

use esfcheck_core::Config;
use tracing::debug;

/// Per-user configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("esfcheck")
        .join("config.json")
}

/// Resolve the configuration for a validation run.
///
/// An explicit path that is missing or broken falls back to defaults with a
/// warning; validation always runs.
pub fn load_config(config_path: Option<&str>) -> Config {
    match config_path {
        Some(path) => Config::load_or_default(Path::new(path)),
        None => {
            let path = default_config_path();
            if path.exists() {
                debug!("Using configuration at {}", path.display());
                Config::load_or_default(&path)
            } else {
                Config::default()
            }
        }
    }
}

/// Audit overrides shared by `check` and `batch`.
pub fn apply_audit_override(config: &mut Config, audit_log: Option<&Path>) {
    if let Some(path) = audit_log {
        config.audit.enabled = true;
        config.audit.path = path.to_path_buf();
    }
}
