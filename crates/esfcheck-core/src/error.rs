//! Error types for the esfcheck-core library.

use thiserror::Error;

/// Main error type for the esfcheck library.
#[derive(Error, Debug)]
pub enum EsfError {
    /// PDF text adapter error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Audit sink error.
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// Structured payload could not be decoded.
    #[error("invalid document payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to PDF text extraction.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors related to configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::Config`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A configured label pattern is not a valid regex.
    #[error("invalid pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },
}

/// Errors raised by an audit sink.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Writing the audit record failed.
    #[error("failed to append audit record: {0}")]
    Write(#[from] std::io::Error),
}

/// An unexpected fault inside a single rule.
///
/// Never propagates past the evaluator; it is turned into an ERROR finding
/// naming the rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{rule}: {reason}")]
pub struct RuleFault {
    /// Code of the failing rule.
    pub rule: String,
    /// What went wrong.
    pub reason: String,
}

impl RuleFault {
    pub fn new(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for the esfcheck library.
pub type Result<T> = std::result::Result<T, EsfError>;
