//! Field extraction from structured records, cell grids and linear text.

pub mod amounts;
pub mod dates;
pub mod parser;
pub mod patterns;
pub mod section;
pub mod taxid;

pub use amounts::{AmountCategory, AmountExtractor, Totals};
pub use dates::{DateExtractor, DateRole, parse_date_text, parse_date_value};
pub use parser::DocumentParser;
pub use section::{SectionFinder, TextView};
pub use taxid::{Role, TaxIdHit, TaxIdLocator, TaxIds, checksum_valid, find_tax_id, is_valid_tax_id};

use std::collections::BTreeMap;

use crate::models::source::FieldValue;
use crate::normalize::normalize_key;

/// Trait for extractors that work over linear text.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Best match in the text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Every match in the text, in document order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A located value together with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Locator trail, e.g. `TEXT:label@120` or `DATE@R3C2`.
    pub locator: String,
    /// Byte range in the source text, for text matches.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, locator: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            value,
            locator: locator.into(),
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}

/// First non-blank structured field matching an alias, in alias order.
///
/// An exact key match is tried before a normalized-key match for each alias.
pub fn lookup_field<'a>(
    fields: &'a BTreeMap<String, FieldValue>,
    aliases: &[String],
) -> Option<(&'a str, &'a FieldValue)> {
    for alias in aliases {
        if let Some((key, value)) = fields.get_key_value(alias.as_str()) {
            if !value.is_blank() {
                return Some((key.as_str(), value));
            }
        }
        let wanted = normalize_key(alias);
        if let Some((key, value)) = fields
            .iter()
            .find(|(key, value)| !value.is_blank() && normalize_key(key) == wanted)
        {
            return Some((key.as_str(), value));
        }
    }
    None
}
