//! Data models for documents, source records, findings and configuration.

pub mod config;
pub mod document;
pub mod finding;
pub mod source;

pub use config::Config;
pub use document::{Document, LineItem};
pub use finding::{Finding, Level};
pub use source::{Cell, CellGrid, FieldValue, SourceRecord};
