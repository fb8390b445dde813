//! PDF text adapter.

mod extractor;

pub use extractor::PdfExtractor;

use tracing::debug;

use crate::error::PdfError;
use crate::models::source::SourceRecord;

/// Type of PDF content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfType {
    /// Contains an extractable text layer.
    Text,
    /// No usable text, e.g. a scanned document.
    Empty,
}

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF processing implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Analyze the PDF to determine whether it carries text.
    fn analyze(&self) -> PdfType;

    /// Extract text from the entire PDF.
    fn extract_text(&self) -> Result<String>;

    /// Extract text from a specific page (1-indexed).
    fn extract_page_text(&self, page: u32) -> Result<String>;

    /// Extracted text as a source for the document parser.
    fn to_source_record(&self) -> Result<SourceRecord>;

    /// Pages (1-indexed) without extractable text, e.g. scanned inserts.
    fn blank_pages(&self) -> Vec<u32> {
        (1..=self.page_count())
            .filter(|&page| match self.extract_page_text(page) {
                Ok(text) => text.trim().is_empty(),
                Err(e) => {
                    debug!("Page {} text not extracted: {}", page, e);
                    true
                }
            })
            .collect()
    }
}
