//! Normalized document produced by field extraction.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field names used for provenance keys and structured output.
pub mod fields {
    pub const SUPPLIER_TAX_ID: &str = "supplier_tax_id";
    pub const BUYER_TAX_ID: &str = "buyer_tax_id";
    pub const ISSUE_DATE: &str = "issue_date";
    pub const TURNOVER_DATE: &str = "turnover_date";
    pub const TOTAL_NET: &str = "total_net";
    pub const TOTAL_VAT: &str = "total_vat";
    pub const TOTAL_GROSS: &str = "total_gross";
    pub const TOTAL_AMOUNT: &str = "total_amount";
}

/// A normalized ESF document.
///
/// Every scalar field is a string and empty when absent. Tax IDs keep the
/// located raw value so malformed identifiers can be reported verbatim.
/// Dates are ISO `YYYY-MM-DD` when they could be parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    #[serde(deserialize_with = "lenient_string")]
    pub supplier_tax_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub buyer_tax_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub issue_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub turnover_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub total_net: String,
    #[serde(deserialize_with = "lenient_string")]
    pub total_vat: String,
    #[serde(deserialize_with = "lenient_string")]
    pub total_gross: String,
    /// Canonical document total.
    #[serde(deserialize_with = "lenient_string")]
    pub total_amount: String,
    pub lines: Vec<LineItem>,
    /// Field name to locator string describing where the value came from.
    pub provenance: BTreeMap<String, String>,
    /// Raw values that were located but could not be parsed.
    pub unparsed: BTreeMap<String, String>,
    /// Source text after encoding repair, kept for re-search by rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a scalar field by name together with its locator.
    pub fn set(&mut self, field: &str, value: impl Into<String>, locator: impl Into<String>) {
        let value = value.into();
        let slot = match field {
            fields::SUPPLIER_TAX_ID => &mut self.supplier_tax_id,
            fields::BUYER_TAX_ID => &mut self.buyer_tax_id,
            fields::ISSUE_DATE => &mut self.issue_date,
            fields::TURNOVER_DATE => &mut self.turnover_date,
            fields::TOTAL_NET => &mut self.total_net,
            fields::TOTAL_VAT => &mut self.total_vat,
            fields::TOTAL_GROSS => &mut self.total_gross,
            fields::TOTAL_AMOUNT => &mut self.total_amount,
            _ => return,
        };
        *slot = value;
        self.provenance.insert(field.to_string(), locator.into());
    }

    /// Locator of a field, if one was recorded.
    pub fn locator(&self, field: &str) -> Option<&str> {
        self.provenance.get(field).map(String::as_str)
    }

    /// The issue date as a calendar date, when it is a valid ISO date.
    pub fn issue_date_value(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.issue_date.trim(), "%Y-%m-%d").ok()
    }
}

/// A single invoice line as supplied by the source.
///
/// Values are kept as text; numeric interpretation happens in the rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    pub line_no: u32,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub quantity: String,
    #[serde(deserialize_with = "lenient_string")]
    pub unit_price: String,
    #[serde(deserialize_with = "lenient_string")]
    pub amount: String,
    #[serde(deserialize_with = "lenient_string")]
    pub vat_rate: String,
    #[serde(deserialize_with = "lenient_string")]
    pub vat_amount: String,
}

impl LineItem {
    pub fn new(line_no: u32, name: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            line_no,
            name: name.into(),
            amount: amount.into(),
            ..Self::default()
        }
    }
}

/// Accept strings, numbers, booleans and null where a string is expected.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    })
}
