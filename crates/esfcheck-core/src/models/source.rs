//! Raw source records handed to the document parser.
//!
//! A source is any combination of pre-structured fields, linear text (PDF or
//! plain text) and a spreadsheet-like cell grid.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::document::LineItem;
use crate::error::Result;

/// A single value as it appears in a cell or a structured field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Empty,
    Bool(bool),
    Number(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
}

impl FieldValue {
    /// Convert a JSON value. Arrays and objects have no scalar meaning and map to `Empty`.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Empty,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Empty),
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => FieldValue::Empty,
        }
    }

    /// Render the value as text, the way a spreadsheet would display it.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Empty => String::new(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }

    /// True when the value carries no visible content.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

/// Integral floats print without a fractional part (`150000`, not `150000.0`).
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A cell of a spreadsheet-like grid. Rows and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    pub value: FieldValue,
}

impl Cell {
    pub fn new(row: u32, col: u32, value: impl Into<FieldValue>) -> Self {
        Self {
            row,
            col,
            value: value.into(),
        }
    }
}

/// Indexed, row-major view over a set of cells.
#[derive(Debug, Clone, Default)]
pub struct CellGrid {
    cells: Vec<Cell>,
    index: HashMap<(u32, u32), usize>,
}

impl CellGrid {
    /// Build a grid, dropping blank cells and ordering the rest row-major.
    pub fn new(cells: &[Cell]) -> Self {
        let mut cells: Vec<Cell> = cells.iter().filter(|c| !c.value.is_blank()).cloned().collect();
        cells.sort_by_key(|c| (c.row, c.col));
        let index = cells
            .iter()
            .enumerate()
            .map(|(i, c)| ((c.row, c.col), i))
            .collect();
        Self { cells, index }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&FieldValue> {
        self.index.get(&(row, col)).map(|&i| &self.cells[i].value)
    }

    /// Display text of a cell, empty when the cell is absent.
    pub fn text(&self, row: u32, col: u32) -> String {
        self.get(row, col).map(FieldValue::as_text).unwrap_or_default()
    }

    /// Concatenated text of every cell within `radius` rows and columns.
    pub fn neighborhood_text(&self, row: u32, col: u32, radius: u32) -> String {
        self.cells
            .iter()
            .filter(|cell| cell.row.abs_diff(row) <= radius && cell.col.abs_diff(col) <= radius)
            .map(|cell| cell.value.as_text())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Everything known about one input document before field extraction.
#[derive(Debug, Clone, Default)]
pub struct SourceRecord {
    /// Already-structured fields keyed by their original names.
    pub fields: BTreeMap<String, FieldValue>,
    /// Linear text, if the source had any.
    pub text: Option<String>,
    /// Spreadsheet cells, if the source was tabular.
    pub cells: Vec<Cell>,
    /// Line items supplied by the source.
    pub lines: Vec<LineItem>,
}

impl SourceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source backed by linear text only.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Source backed by a cell grid only.
    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            ..Self::default()
        }
    }

    /// Decode a structured JSON object.
    ///
    /// `raw_text` becomes the linear text, `lines` the line items, and every
    /// other scalar key a structured field.
    pub fn from_json(payload: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(payload)?;
        let mut record = Self::default();

        let Value::Object(map) = value else {
            return Ok(record);
        };

        for (key, value) in map {
            match key.as_str() {
                "raw_text" => {
                    if let Value::String(text) = value {
                        record.text = Some(text);
                    }
                }
                "lines" => {
                    record.lines = serde_json::from_value(value)?;
                }
                _ => {
                    record.fields.insert(key, FieldValue::from_json(&value));
                }
            }
        }

        Ok(record)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_lines(mut self, lines: Vec<LineItem>) -> Self {
        self.lines = lines;
        self
    }

    pub fn grid(&self) -> CellGrid {
        CellGrid::new(&self.cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_number_display() {
        assert_eq!(FieldValue::Number(150000.0).as_text(), "150000");
        assert_eq!(FieldValue::Number(1234.5).as_text(), "1234.5");
    }

    #[test]
    fn test_grid_lookup_and_neighborhood() {
        let grid = CellGrid::new(&[
            Cell::new(1, 1, "БИН поставщика"),
            Cell::new(1, 2, "220629802621"),
            Cell::new(2, 1, ""),
            Cell::new(3, 3, "далеко"),
        ]);

        assert_eq!(grid.text(1, 2), "220629802621");
        assert!(grid.get(2, 1).is_none());
        assert_eq!(grid.neighborhood_text(1, 1, 1), "БИН поставщика 220629802621");
    }

    #[test]
    fn test_neighborhood_at_grid_edge_with_huge_radius() {
        let grid = CellGrid::new(&[
            Cell::new(1, 1, "БИН поставщика"),
            Cell::new(u32::MAX, u32::MAX, "край"),
        ]);

        assert_eq!(grid.neighborhood_text(1, 1, u32::MAX), "БИН поставщика край");
        assert_eq!(grid.neighborhood_text(u32::MAX, u32::MAX, 2), "край");
    }

    #[test]
    fn test_from_json_splits_fields_text_and_lines() {
        let record = SourceRecord::from_json(
            r#"{
                "supplier_BIN": "220629802621",
                "total_amount": 150000,
                "raw_text": "Итого: 150 000,00",
                "lines": [{"line_no": 1, "name": "Услуга", "amount": 150000}]
            }"#,
        )
        .unwrap();

        assert_eq!(record.fields["supplier_BIN"], FieldValue::Text("220629802621".into()));
        assert_eq!(record.fields["total_amount"], FieldValue::Number(150000.0));
        assert_eq!(record.text.as_deref(), Some("Итого: 150 000,00"));
        assert_eq!(record.lines.len(), 1);
        assert_eq!(record.lines[0].amount, "150000");
    }

    #[test]
    fn test_from_json_rejects_malformed_payload() {
        assert!(SourceRecord::from_json("{not json").is_err());
    }
}
