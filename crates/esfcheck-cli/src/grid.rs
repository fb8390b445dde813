//! Spreadsheet-cell adapter: a CSV export of a sheet becomes a cell grid.

use esfcheck_core::{Cell, FieldValue};

const SNIFF_LINES: usize = 10;

/// Parse a sheet exported as CSV into 1-based, row-major cells.
///
/// The delimiter is sniffed from the leading lines (`;` exports are common
/// for Russian-locale spreadsheets). Blank cells are dropped; rows keep their
/// line numbers even across blank lines.
pub fn parse_cells(content: &str) -> anyhow::Result<Vec<Cell>> {
    let (semicolons, commas) = content
        .lines()
        .take(SNIFF_LINES)
        .fold((0, 0), |(s, c), line| (s + line.matches(';').count(), c + line.matches(',').count()));
    let delimiter = if semicolons > commas { b';' } else { b',' };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let mut cells = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = record
            .position()
            .map(|p| p.line() as u32)
            .unwrap_or(i as u32 + 1);
        for (c, field) in record.iter().enumerate() {
            let value = cell_value(field);
            if value.is_blank() {
                continue;
            }
            cells.push(Cell::new(row, c as u32 + 1, value));
        }
    }
    Ok(cells)
}

/// Plain numbers become numeric cells so serial dates and totals survive.
/// Zero-padded digit strings such as tax IDs stay text.
fn cell_value(field: &str) -> FieldValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return FieldValue::Empty;
    }
    let zero_padded = trimmed.len() > 1 && trimmed.starts_with('0') && !trimmed.starts_with("0.");
    let plain = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == '-');
    if plain && !zero_padded {
        if let Ok(n) = trimmed.parse::<f64>() {
            return FieldValue::Number(n);
        }
    }
    FieldValue::Text(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_comma_sheet() {
        let cells = parse_cells("Дата выписки,45923\n\nИтого с НДС,150000.50\n").unwrap();
        assert_eq!(
            cells,
            vec![
                Cell::new(1, 1, "Дата выписки"),
                Cell::new(1, 2, FieldValue::Number(45923.0)),
                Cell::new(3, 1, "Итого с НДС"),
                Cell::new(3, 2, FieldValue::Number(150000.5)),
            ]
        );
    }

    #[test]
    fn test_semicolon_sheet_keeps_text() {
        let cells = parse_cells("БИН поставщика;;012345678901\nСумма;150 000,00\n").unwrap();
        assert_eq!(cells[1], Cell::new(1, 3, "012345678901"));
        assert_eq!(cells[3], Cell::new(2, 2, "150 000,00"));
    }
}
