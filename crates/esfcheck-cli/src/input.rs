//! Turning input files into source records.

use std::fs;
use std::path::Path;

use esfcheck_core::pdf::PdfType;
use esfcheck_core::{PdfExtractor, PdfProcessor, SourceRecord};
use tracing::{debug, warn};

use crate::grid;

/// How an input file is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum InputKind {
    /// PDF with a text layer
    Pdf,
    /// Structured JSON object
    Json,
    /// Sheet exported as CSV
    Csv,
    /// Plain text
    Text,
}

impl InputKind {
    /// Detect the kind from the file extension.
    pub fn detect(path: &Path) -> Option<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "pdf" => Some(InputKind::Pdf),
            "json" => Some(InputKind::Json),
            "csv" => Some(InputKind::Csv),
            "txt" | "text" => Some(InputKind::Text),
            _ => None,
        }
    }
}

/// Read a file into a source record.
pub fn load_source(path: &Path, kind: Option<InputKind>) -> anyhow::Result<SourceRecord> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }

    let kind = match kind.or_else(|| InputKind::detect(path)) {
        Some(kind) => kind,
        None => anyhow::bail!("Unsupported file format: {}", path.display()),
    };
    debug!("Reading {} as {:?}", path.display(), kind);

    match kind {
        InputKind::Pdf => {
            let data = fs::read(path)?;
            let extractor = PdfExtractor::from_bytes(&data)?;
            debug!("{} has {} page(s)", path.display(), extractor.page_count());
            if extractor.analyze() == PdfType::Empty {
                warn!("{} has no usable text layer", path.display());
            } else {
                for page in extractor.blank_pages() {
                    warn!("{} page {} has no text layer", path.display(), page);
                }
            }
            Ok(extractor.to_source_record()?)
        }
        InputKind::Json => {
            let payload = fs::read_to_string(path)?;
            Ok(SourceRecord::from_json(&payload)?)
        }
        InputKind::Csv => {
            let content = decode_text(&fs::read(path)?);
            Ok(SourceRecord::from_cells(grid::parse_cells(&content)?))
        }
        InputKind::Text => Ok(SourceRecord::from_text(decode_text(&fs::read(path)?))),
    }
}

/// UTF-8 when valid, otherwise Windows-1251, the usual legacy encoding of
/// Russian-language exports.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{feff}').to_string(),
        Err(_) => {
            debug!("Input is not UTF-8, decoding as windows-1251");
            encoding_rs::WINDOWS_1251.decode(bytes).0.into_owned()
        }
    }
}
