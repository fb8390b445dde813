//! Document parser combining the tax-ID, date and amount extractors.

use std::time::Instant;

use tracing::{debug, info};

use super::amounts::{AmountCategory, AmountExtractor};
use super::dates::{DateExtractor, DateRole};
use super::section::SectionFinder;
use super::taxid::{Role, TaxIdLocator};
use crate::models::config::{Config, TotalPreference};
use crate::models::document::{Document, fields};
use crate::models::source::SourceRecord;
use crate::normalize::{fix_encoding, normalize_multiline};

/// Result of parsing one source.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Canonical document.
    pub document: Document,
    /// Fields that could not be located.
    pub warnings: Vec<String>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Builds a canonical [`Document`] from a [`SourceRecord`].
///
/// Extraction never fails: a field that cannot be located stays empty.
#[derive(Debug, Clone)]
pub struct DocumentParser {
    tax_ids: TaxIdLocator,
    dates: DateExtractor,
    amounts: AmountExtractor,
    sections: SectionFinder,
    prefer_total: TotalPreference,
}

impl DocumentParser {
    pub fn new(config: &Config) -> Self {
        Self {
            tax_ids: TaxIdLocator::new(config),
            dates: DateExtractor::new(config),
            amounts: AmountExtractor::new(config),
            sections: SectionFinder::new(&config.sections),
            prefer_total: config.totals.prefer_total,
        }
    }

    pub fn amounts(&self) -> &AmountExtractor {
        &self.amounts
    }

    pub fn sections(&self) -> &SectionFinder {
        &self.sections
    }

    /// Parse a source into a document.
    pub fn parse(&self, source: &SourceRecord) -> Document {
        self.parse_detailed(source).document
    }

    /// Parse a source, also reporting which fields were not located.
    pub fn parse_detailed(&self, source: &SourceRecord) -> ParsedDocument {
        let start = Instant::now();
        let mut doc = Document::new();
        let mut warnings = Vec::new();

        let text = source
            .text
            .as_deref()
            .map(|t| normalize_multiline(&fix_encoding(t)))
            .filter(|t| !t.is_empty());
        let views = text.as_deref().map(|t| self.sections.views(t)).unwrap_or_default();

        info!(
            "Parsing document: {} structured fields, {} cells, {} characters of text",
            source.fields.len(),
            source.cells.len(),
            text.as_ref().map_or(0, |t| t.chars().count())
        );

        // Tax IDs
        let tax_ids = self.tax_ids.locate(source, &views);
        for role in Role::ALL {
            match tax_ids.get(role) {
                Some(hit) => doc.set(role.field(), hit.value.clone(), hit.locator.clone()),
                None => warnings.push(format!("Could not locate {} tax ID", role)),
            }
        }

        // Dates
        let dates = self.dates.locate(source, &views);
        for role in [DateRole::Issue, DateRole::Turnover] {
            if let Some(hit) = dates.get(role) {
                doc.set(role.field(), hit.value.format("%Y-%m-%d").to_string(), hit.locator.clone());
            }
        }
        doc.unparsed.extend(dates.unparsed.clone());
        if doc.issue_date.is_empty() {
            warnings.push("Could not extract issue date".to_string());
        }

        // Totals
        let totals = self.amounts.locate(source, &views);
        for category in [AmountCategory::Net, AmountCategory::Vat, AmountCategory::Gross] {
            if let Some(hit) = totals.get(category) {
                doc.set(category.field(), hit.value.to_string(), hit.locator.clone());
            } else if let Some((raw, locator)) = totals.unparsed.get(&category) {
                doc.set(category.field(), raw.clone(), locator.clone());
            }
        }
        match totals.canonical(self.prefer_total) {
            Some(hit) => doc.set(fields::TOTAL_AMOUNT, hit.value.to_string(), hit.locator.clone()),
            None => {
                // A declared but non-numeric total is still the declared total.
                if let Some((raw, locator)) = totals.unparsed.get(&AmountCategory::Amount) {
                    doc.set(fields::TOTAL_AMOUNT, raw.clone(), locator.clone());
                } else {
                    warnings.push("Could not extract document total".to_string());
                }
            }
        }

        doc.lines = source.lines.clone();
        doc.raw_text = text;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        debug!("Parsed document in {}ms with {} warnings", processing_time_ms, warnings.len());

        ParsedDocument {
            document: doc,
            warnings,
            processing_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::LineItem;
    use crate::models::source::{Cell, FieldValue};
    use pretty_assertions::assert_eq;

    const ESF_TEXT: &str = "\
ЭЛЕКТРОННЫЙ СЧЕТ-ФАКТУРА № 0000123 от 23.09.2025
Дата совершения оборота: 20.09.2025
Поставщик: ТОО «Ромашка»
ИИН/БИН поставщика: 220629802621
Получатель: ТОО «Лютик»
ИИН/БИН получателя: 990101400039
№ Наименование Кол-во Стоимость
1 Консультационные услуги 1 133 928,57
Итого без НДС: 133 928,57
НДС 12%: 16 071,43
Всего к оплате: 150 000,00";

    fn parser() -> DocumentParser {
        DocumentParser::new(&Config::default())
    }

    #[test]
    fn test_parse_text_document() {
        let parsed = parser().parse_detailed(&SourceRecord::from_text(ESF_TEXT));
        let doc = parsed.document;

        assert_eq!(doc.supplier_tax_id, "220629802621");
        assert_eq!(doc.buyer_tax_id, "990101400039");
        assert_eq!(doc.issue_date, "2025-09-23");
        assert_eq!(doc.turnover_date, "2025-09-20");
        assert_eq!(doc.total_net, "133928.57");
        assert_eq!(doc.total_vat, "16071.43");
        assert_eq!(doc.total_gross, "150000.00");
        assert_eq!(doc.total_amount, "150000.00");
        assert!(doc.locator(fields::TOTAL_AMOUNT).unwrap().contains(":gross@"));
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_parse_structured_record() {
        let source = SourceRecord::new()
            .with_field("supplier_BIN", "220629802621")
            .with_field("buyer_BIN", FieldValue::Number(990101400039.0))
            .with_field("date_issue", "2025-09-23")
            .with_field("total_amount", FieldValue::Number(150000.0))
            .with_lines(vec![LineItem::new(1, "Услуга", "150000")]);

        let doc = parser().parse(&source);
        assert_eq!(doc.supplier_tax_id, "220629802621");
        assert_eq!(doc.buyer_tax_id, "990101400039");
        assert_eq!(doc.issue_date, "2025-09-23");
        assert_eq!(doc.total_amount, "150000");
        assert_eq!(doc.locator(fields::TOTAL_AMOUNT), Some("FIELD:total_amount"));
        assert_eq!(doc.lines.len(), 1);
        assert!(doc.raw_text.is_none());
    }

    #[test]
    fn test_parse_grid() {
        let source = SourceRecord::from_cells(vec![
            Cell::new(1, 1, "БИН поставщика"),
            Cell::new(1, 2, "220629802621"),
            Cell::new(2, 1, "БИН покупателя"),
            Cell::new(2, 2, "990101400039"),
            Cell::new(3, 1, "Дата выписки"),
            Cell::new(3, 2, FieldValue::Number(45923.0)),
            Cell::new(10, 1, "Итого"),
            Cell::new(10, 4, FieldValue::Number(150000.0)),
        ]);

        let doc = parser().parse(&source);
        assert_eq!(doc.supplier_tax_id, "220629802621");
        assert_eq!(doc.buyer_tax_id, "990101400039");
        assert_eq!(doc.issue_date, "2025-09-23");
        assert_eq!(doc.total_amount, "150000");
        assert_eq!(doc.locator(fields::ISSUE_DATE), Some("DATE@R3C2"));
    }

    #[test]
    fn test_missing_fields_stay_empty() {
        let parsed = parser().parse_detailed(&SourceRecord::from_text("Просто текст"));
        let doc = parsed.document;
        assert_eq!(doc.supplier_tax_id, "");
        assert_eq!(doc.issue_date, "");
        assert_eq!(doc.total_amount, "");
        assert_eq!(parsed.warnings.len(), 4);
    }

    #[test]
    fn test_non_numeric_declared_total_is_kept() {
        let source = SourceRecord::new().with_field("total_amount", "сто тысяч");
        let doc = parser().parse(&source);
        assert_eq!(doc.total_amount, "сто тысяч");
    }
}
