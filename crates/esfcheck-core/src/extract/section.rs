//! Isolation of the e-invoice section inside a multi-document text.
//!
//! PDF exports often bundle the ESF with acts, appendices or payment
//! invoices. Text extractors search the ESF section first, then the full text.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::models::config::SectionConfig;

lazy_static! {
    /// Headers of documents that commonly follow the ESF in the same file.
    static ref NEXT_DOCUMENT_HEADER: Regex = Regex::new(
        r"(?im)^[ \t]*(?:акт[ \t]+(?:выполненных|оказанных|при[её]ма)|приложение\b|накладная\b|доверенность\b|сч[её]т[ \t]+на[ \t]+оплату|certificate[ \t]+of[ \t]+completion|appendix\b)"
    )
    .unwrap();
}

/// A slice of text to search, tagged for locator strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextView<'t> {
    pub text: &'t str,
    /// `ESF` for the isolated section, `TEXT` for the full text.
    pub tag: &'static str,
    /// Byte offset of `text` inside the full text.
    pub offset: usize,
}

/// Finds the ESF section using configured header patterns.
#[derive(Debug, Clone)]
pub struct SectionFinder {
    enabled: bool,
    headers: Vec<Regex>,
}

impl SectionFinder {
    /// Compile the configured headers. Invalid patterns are skipped with a warning.
    pub fn new(config: &SectionConfig) -> Self {
        let headers = config
            .esf_headers
            .iter()
            .filter_map(|pattern| {
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(re) => Some(re),
                    Err(e) => {
                        let err = ConfigError::Pattern {
                            pattern: pattern.clone(),
                            reason: e.to_string(),
                        };
                        warn!("Skipping section header: {}", err);
                        None
                    }
                }
            })
            .collect();

        Self {
            enabled: config.prefer_esf_section,
            headers,
        }
    }

    /// The ESF section: from the earliest header to the next document header
    /// after it, or to the end of the text.
    pub fn esf_section<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.esf_span(text).map(|(start, end)| &text[start..end])
    }

    fn esf_span(&self, text: &str) -> Option<(usize, usize)> {
        let start = self
            .headers
            .iter()
            .filter_map(|re| re.find(text).map(|m| m.start()))
            .min()?;

        // Skip the header's own line so a title like "Счёт-фактура" never stops itself.
        let body = text[start..].find('\n').map(|i| start + i).unwrap_or(text.len());
        let end = NEXT_DOCUMENT_HEADER
            .find_at(text, body)
            .map(|m| m.start())
            .unwrap_or(text.len());

        debug!("ESF section spans bytes {}..{}", start, end);
        Some((start, end))
    }

    /// Views to search in order: the ESF section (when enabled and distinct),
    /// then the full text.
    pub fn views<'t>(&self, text: &'t str) -> Vec<TextView<'t>> {
        let mut views = Vec::with_capacity(2);
        if self.enabled {
            if let Some((start, end)) = self.esf_span(text) {
                if end - start < text.len() {
                    views.push(TextView {
                        text: &text[start..end],
                        tag: "ESF",
                        offset: start,
                    });
                }
            }
        }
        views.push(TextView {
            text,
            tag: "TEXT",
            offset: 0,
        });
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BUNDLE: &str = "Счет на оплату № 5\nИтого: 7\nСЧЁТ-ФАКТУРА № 12 от 23.09.2025\nВсего к оплате: 150 000,00\nАкт выполненных работ\nИтого: 3";

    #[test]
    fn test_section_runs_until_next_document() {
        let finder = SectionFinder::new(&SectionConfig::default());
        let section = finder.esf_section(BUNDLE).unwrap();
        assert_eq!(
            section,
            "СЧЁТ-ФАКТУРА № 12 от 23.09.2025\nВсего к оплате: 150 000,00\n"
        );
    }

    #[test]
    fn test_views_order() {
        let finder = SectionFinder::new(&SectionConfig::default());
        let views = finder.views(BUNDLE);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].tag, "ESF");
        assert_eq!(views[0].offset, BUNDLE.find("СЧЁТ").unwrap());
        assert_eq!(views[1].text, BUNDLE);
    }

    #[test]
    fn test_disabled_or_missing_section_uses_full_text() {
        let config = SectionConfig {
            prefer_esf_section: false,
            ..SectionConfig::default()
        };
        assert_eq!(SectionFinder::new(&config).views(BUNDLE).len(), 1);

        let finder = SectionFinder::new(&SectionConfig::default());
        assert_eq!(finder.views("Итого: 5").len(), 1);
    }

    #[test]
    fn test_invalid_header_pattern_is_skipped() {
        let config = SectionConfig {
            prefer_esf_section: true,
            esf_headers: vec!["(unclosed".into(), "эсф".into()],
        };
        let finder = SectionFinder::new(&config);
        assert_eq!(finder.esf_section("шапка\nЭСФ\nтело"), Some("ЭСФ\nтело"));
    }
}
