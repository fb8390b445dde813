//! Core library for e-invoice (ESF) checking.
//!
//! This crate provides:
//! - Text/key normalization and encoding repair
//! - Field extraction (supplier/buyer tax IDs, issue and turnover dates, totals)
//!   from linear text, spreadsheet cell grids, or pre-structured records
//! - A fixed catalogue of business rules producing severity-ranked findings
//! - Deterministic ordering of findings and an optional audit sink

pub mod audit;
pub mod compose;
pub mod error;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod pdf;
pub mod rules;
pub mod validator;

pub use audit::{AuditRecord, AuditSink, FileAuditSink, MemoryAuditSink};
pub use compose::compose;
pub use error::{EsfError, Result};
pub use extract::DocumentParser;
pub use models::config::Config;
pub use models::document::{Document, LineItem};
pub use models::finding::{Finding, Level};
pub use models::source::{Cell, FieldValue, SourceRecord};
pub use pdf::{PdfExtractor, PdfProcessor};
pub use rules::RuleEvaluator;
pub use validator::{ValidationReport, Validator};
