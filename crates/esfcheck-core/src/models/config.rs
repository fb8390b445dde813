//! Configuration for extraction thresholds, rule policy and auditing.
//!
//! Loaded once at process start and shared by reference afterwards.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::finding::Level;
use crate::error::ConfigError;

/// Upper bound on cells walked from a label in either direction.
pub const MAX_REACH: u32 = 50;

/// Main configuration for esfcheck.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Label matching thresholds.
    pub matching: MatchingConfig,

    /// Tax-ID search and policy.
    pub tax_id: TaxIdConfig,

    /// Date policy.
    pub dates: DateConfig,

    /// Total search and reconciliation.
    pub totals: TotalsConfig,

    /// Alias lists per canonical field.
    pub aliases: AliasConfig,

    /// E-invoice section isolation for linear text.
    pub sections: SectionConfig,

    /// Rule code to severity used when the rule fails.
    pub severity_overrides: BTreeMap<String, Level>,

    /// Rule code to sort priority; lower sorts earlier.
    pub rule_priority: BTreeMap<String, i32>,

    /// Rule code to user-facing text overrides.
    pub checklist: BTreeMap<String, ChecklistEntry>,

    /// Audit log settings.
    pub audit: AuditConfig,
}

/// Fuzzy label matching configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum label similarity (0.0 - 1.0).
    pub fuzzy_threshold: f64,

    /// Minimum similarity for date labels; the lower of the two thresholds applies.
    pub date_label_threshold: f64,

    /// Neighborhood radius in cells for context fallbacks.
    pub context_radius: u32,

    /// Neighborhood radius in characters for linear-text context fallbacks.
    pub text_context_chars: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.82,
            date_label_threshold: 0.75,
            context_radius: 3,
            text_context_chars: 60,
        }
    }
}

impl MatchingConfig {
    /// Threshold used for date labels.
    pub fn date_threshold(&self) -> f64 {
        self.fuzzy_threshold.min(self.date_label_threshold)
    }

    /// Context radius, capped so a neighborhood stays a neighborhood.
    pub fn radius(&self) -> u32 {
        self.context_radius.min(20)
    }
}

/// Tax-ID configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxIdConfig {
    /// Run the modulo-11 checksum rule.
    pub checksum_enabled: bool,

    /// Equal supplier and buyer IDs produce an informational pass.
    pub allow_equal: bool,

    /// Cells to search right of a label cell.
    pub search_right: u32,

    /// Cells to search below a label cell.
    pub search_down: u32,

    /// Maximum characters between a text label and its digit run.
    pub label_gap: usize,

    /// Tokens identifying the supplier role.
    pub supplier_tokens: Vec<String>,

    /// Tokens identifying the buyer role.
    pub buyer_tokens: Vec<String>,

    /// Tokens identifying a tax identifier.
    pub id_tokens: Vec<String>,
}

impl TaxIdConfig {
    /// Cells searched right of and below a label, capped.
    pub fn reach(&self) -> (u32, u32) {
        (self.search_right.min(MAX_REACH), self.search_down.min(MAX_REACH))
    }
}

impl Default for TaxIdConfig {
    fn default() -> Self {
        Self {
            checksum_enabled: false,
            allow_equal: false,
            search_right: 8,
            search_down: 4,
            label_gap: 80,
            supplier_tokens: strings(&["поставщик", "продав", "отправител", "supplier", "seller"]),
            buyer_tokens: strings(&["покупател", "получател", "заказчик", "buyer", "customer", "recipient"]),
            id_tokens: strings(&["бин", "иин", "bin", "iin"]),
        }
    }
}

/// Date policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateConfig {
    /// A missing issue date is a failure.
    pub require_issue_date: bool,

    /// Days an issue date may lie in the future.
    pub allow_future_days: i64,

    /// Extra minutes of tolerance for the future-date check.
    pub tolerance_minutes: i64,

    /// Invoice header keywords used by the context fallback.
    pub header_keywords: Vec<String>,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            require_issue_date: true,
            allow_future_days: 0,
            tolerance_minutes: 0,
            header_keywords: strings(&["счет фактура", "счет", "сф", "эсф", "invoice"]),
        }
    }
}

/// Which category becomes the canonical total when no generic total is present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalPreference {
    Net,
    Vat,
    #[default]
    Gross,
}

/// Totals configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TotalsConfig {
    pub prefer_total: TotalPreference,

    /// Absolute tolerance between the line sum and the declared total.
    pub line_tolerance: Decimal,

    /// Maximum characters between a text label and its number.
    pub max_gap: usize,

    /// Cells to search right of a label cell.
    pub search_right: u32,

    /// Cells to search below a label cell.
    pub search_down: u32,
}

impl Default for TotalsConfig {
    fn default() -> Self {
        Self {
            prefer_total: TotalPreference::Gross,
            line_tolerance: Decimal::new(5, 1),
            max_gap: 140,
            search_right: 5,
            search_down: 3,
        }
    }
}

impl TotalsConfig {
    /// Label-to-number gap, clamped to a sane range.
    pub fn gap(&self) -> usize {
        self.max_gap.clamp(20, 300)
    }

    /// Cells searched right of and below a label, capped.
    pub fn reach(&self) -> (u32, u32) {
        (self.search_right.min(MAX_REACH), self.search_down.min(MAX_REACH))
    }
}

/// Ordered alias lists for each canonical field.
///
/// Used both as structured-field keys and as grid labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasConfig {
    pub supplier_tax_id: Vec<String>,
    pub buyer_tax_id: Vec<String>,
    pub issue_date: Vec<String>,
    pub turnover_date: Vec<String>,
    pub total_net: Vec<String>,
    pub total_vat: Vec<String>,
    pub total_gross: Vec<String>,
    pub total_amount: Vec<String>,
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            supplier_tax_id: strings(&[
                "supplier_tax_id",
                "supplier_BIN",
                "supplierBin",
                "seller_BIN",
                "sellerBin",
                "БИН поставщика",
                "ИИН/БИН поставщика",
                "БИН продавца",
            ]),
            buyer_tax_id: strings(&[
                "buyer_tax_id",
                "buyer_BIN",
                "buyerBin",
                "recipient_BIN",
                "recipientBin",
                "customer_BIN",
                "БИН покупателя",
                "ИИН/БИН покупателя",
                "БИН получателя",
            ]),
            issue_date: strings(&[
                "issue_date",
                "date_issue",
                "invoice_date",
                "documentDate",
                "Дата выписки",
                "Дата выписки ЭСФ",
                "Дата выставления",
                "Дата составления",
                "Дата",
                "Date of issue",
                "Invoice date",
            ]),
            turnover_date: strings(&[
                "turnover_date",
                "Дата совершения оборота",
                "Дата оборота",
                "Turnover date",
            ]),
            total_net: strings(&[
                "total_net",
                "Итого без НДС",
                "Всего без НДС",
                "Стоимость без НДС",
                "Net total",
            ]),
            total_vat: strings(&["total_vat", "Сумма НДС", "Итого НДС", "НДС", "VAT amount"]),
            total_gross: strings(&[
                "total_gross",
                "Итого с НДС",
                "Всего с НДС",
                "Всего к оплате",
                "Всего стоимость реализации",
                "Gross total",
            ]),
            total_amount: strings(&[
                "total_amount",
                "total_sum",
                "total",
                "amount",
                "Итого к оплате",
                "Сумма документа",
                "Итого",
                "Всего",
                "Total",
                "Amount due",
            ]),
        }
    }
}

/// E-invoice section isolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionConfig {
    /// Search the e-invoice section before the full text.
    pub prefer_esf_section: bool,

    /// Case-insensitive regexes marking the start of the e-invoice section.
    pub esf_headers: Vec<String>,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            prefer_esf_section: true,
            esf_headers: strings(&[
                r"сч[её]т[\s\-]*фактур",
                r"электронн\w*\s+сч[её]т",
                r"\bэсф\b",
                r"electronic\s+(?:tax\s+)?invoice",
            ]),
        }
    }
}

/// User-facing texts for one rule code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistEntry {
    pub title: Option<String>,
    pub description: Option<String>,
    pub recommendation: Option<String>,
    /// Title used when the rule passes.
    pub ok_title: Option<String>,
}

/// Audit log settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("data/results.log"),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load configuration, falling back to defaults on any failure.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Using default configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Severity for a failing rule, honoring overrides.
    ///
    /// Only ERROR, WARN and INFO are accepted as overrides.
    pub fn severity_for(&self, code: &str, default: Level) -> Level {
        self.severity_overrides
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(code))
            .map(|(_, level)| *level)
            .filter(|level| *level != Level::Ok)
            .unwrap_or(default)
    }

    /// Configured sort priority for a rule code.
    pub fn priority_for(&self, code: &str) -> Option<i32> {
        self.rule_priority
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(code))
            .map(|(_, priority)| *priority)
    }

    /// Text overrides for a rule code.
    pub fn checklist_for(&self, code: &str) -> Option<&ChecklistEntry> {
        self.checklist
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(code))
            .map(|(_, entry)| entry)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
