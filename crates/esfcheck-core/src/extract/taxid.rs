//! Supplier and buyer tax-ID (BIN/IIN) location and validation.
//!
//! Sources are searched in a fixed order and the first hit per role wins:
//! structured fields, labelled grid cells, labelled text, then grid and text
//! context windows. A cell or text position taken by one role is never given
//! to the other.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use tracing::debug;

use super::patterns::{BUYER_TAX_ID_LABEL, DIGIT_GROUP_RUN, DIGIT_RUN, SUPPLIER_TAX_ID_LABEL};
use super::section::TextView;
use super::lookup_field;
use crate::models::config::Config;
use crate::models::document::fields;
use crate::models::source::{CellGrid, SourceRecord};
use crate::normalize::{contains_any, only_digits};

/// Party whose identifier is being located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Supplier,
    Buyer,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Supplier, Role::Buyer];

    /// Canonical document field for this role.
    pub fn field(self) -> &'static str {
        match self {
            Role::Supplier => fields::SUPPLIER_TAX_ID,
            Role::Buyer => fields::BUYER_TAX_ID,
        }
    }

    fn text_label(self) -> &'static Regex {
        match self {
            Role::Supplier => &SUPPLIER_TAX_ID_LABEL,
            Role::Buyer => &BUYER_TAX_ID_LABEL,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Supplier => f.write_str("supplier"),
            Role::Buyer => f.write_str("buyer"),
        }
    }
}

/// Validity predicate: exactly 12 ASCII digits, not all identical.
pub fn is_valid_tax_id(s: &str) -> bool {
    s.len() == 12
        && s.bytes().all(|b| b.is_ascii_digit())
        && s.bytes().any(|b| b != s.as_bytes()[0])
}

/// Two-round modulo-11 check over the first eleven digits.
///
/// Round one weighs digit `i` by `i + 1`; a remainder of 10 triggers round
/// two with weights `i + 3`. The twelfth digit must equal the remainder.
pub fn checksum_valid(s: &str) -> bool {
    if s.len() != 12 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = s.bytes().map(|b| u32::from(b - b'0')).collect();
    let weighted = |offset: u32| -> u32 {
        digits[..11]
            .iter()
            .zip(0u32..)
            .map(|(d, i)| d * (i + offset))
            .sum::<u32>()
            % 11
    };

    let mut remainder = weighted(1);
    if remainder == 10 {
        remainder = weighted(3);
    }
    remainder == digits[11]
}

/// First valid 12-digit identifier inside a piece of text.
///
/// Tries the text as a whole, then separator-joined digit groups, then plain
/// digit runs.
pub fn find_tax_id(text: &str) -> Option<String> {
    let all = only_digits(text);
    if is_valid_tax_id(&all) {
        return Some(all);
    }
    DIGIT_GROUP_RUN
        .find_iter(text)
        .chain(DIGIT_RUN.find_iter(text))
        .map(|m| only_digits(m.as_str()))
        .find(|d| is_valid_tax_id(d))
}

/// A located identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxIdHit {
    /// 12 digits when valid, otherwise the raw located value.
    pub value: String,
    /// Where the value was found.
    pub locator: String,
    pub valid: bool,
}

impl TaxIdHit {
    fn valid(value: String, locator: String) -> Self {
        Self {
            value,
            locator,
            valid: true,
        }
    }

    fn raw(value: &str, locator: String) -> Self {
        let value = find_tax_id(value).unwrap_or_else(|| value.trim().to_string());
        let valid = is_valid_tax_id(&value);
        Self {
            value,
            locator,
            valid,
        }
    }
}

/// Identifiers located for both roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxIds {
    pub supplier: Option<TaxIdHit>,
    pub buyer: Option<TaxIdHit>,
}

impl TaxIds {
    pub fn get(&self, role: Role) -> Option<&TaxIdHit> {
        match role {
            Role::Supplier => self.supplier.as_ref(),
            Role::Buyer => self.buyer.as_ref(),
        }
    }

    fn slot(&mut self, role: Role) -> &mut Option<TaxIdHit> {
        match role {
            Role::Supplier => &mut self.supplier,
            Role::Buyer => &mut self.buyer,
        }
    }

    fn is_open(&self, role: Role) -> bool {
        self.get(role).is_none()
    }

    fn open_roles(&self) -> Vec<Role> {
        Role::ALL.into_iter().filter(|r| self.is_open(*r)).collect()
    }
}

/// Positions already assigned to a role.
#[derive(Debug, Default)]
struct Claims {
    cells: HashSet<(u32, u32)>,
    offsets: HashSet<usize>,
}

/// Locates supplier and buyer identifiers.
#[derive(Debug, Clone)]
pub struct TaxIdLocator {
    supplier_aliases: Vec<String>,
    buyer_aliases: Vec<String>,
    supplier_tokens: Vec<String>,
    buyer_tokens: Vec<String>,
    id_tokens: Vec<String>,
    search_right: u32,
    search_down: u32,
    label_gap: usize,
    context_radius: u32,
    context_chars: usize,
}

impl TaxIdLocator {
    pub fn new(config: &Config) -> Self {
        Self {
            supplier_aliases: config.aliases.supplier_tax_id.clone(),
            buyer_aliases: config.aliases.buyer_tax_id.clone(),
            supplier_tokens: config.tax_id.supplier_tokens.clone(),
            buyer_tokens: config.tax_id.buyer_tokens.clone(),
            id_tokens: config.tax_id.id_tokens.clone(),
            search_right: config.tax_id.reach().0,
            search_down: config.tax_id.reach().1,
            label_gap: config.tax_id.label_gap,
            context_radius: config.matching.radius(),
            context_chars: config.matching.text_context_chars,
        }
    }

    fn aliases(&self, role: Role) -> &[String] {
        match role {
            Role::Supplier => &self.supplier_aliases,
            Role::Buyer => &self.buyer_aliases,
        }
    }

    fn tokens(&self, role: Role) -> &[String] {
        match role {
            Role::Supplier => &self.supplier_tokens,
            Role::Buyer => &self.buyer_tokens,
        }
    }

    /// Run every strategy over a source and its text views.
    pub fn locate(&self, source: &SourceRecord, views: &[TextView<'_>]) -> TaxIds {
        let mut found = TaxIds::default();
        let mut fallback = TaxIds::default();
        let mut claims = Claims::default();

        for role in Role::ALL {
            *found.slot(role) = self.from_fields(role, source);
        }

        let grid = source.grid();
        if !grid.is_empty() {
            self.scan_grid_labels(&grid, &mut found, &mut fallback, &mut claims);
        }
        for view in views {
            self.scan_text_labels(view, &mut found, &mut fallback, &mut claims);
        }
        if !grid.is_empty() {
            self.scan_grid_context(&grid, &mut found, &mut claims);
        }
        for view in views {
            self.scan_text_context(view, &mut found, &mut claims);
        }

        // A labelled but malformed value is still worth reporting.
        for role in Role::ALL {
            if found.is_open(role) {
                *found.slot(role) = fallback.slot(role).take();
            }
        }

        for role in Role::ALL {
            if let Some(hit) = found.get(role) {
                debug!("{} tax ID {} at {} (valid: {})", role, hit.value, hit.locator, hit.valid);
            }
        }
        found
    }

    /// Step 1: structured fields, first non-empty alias wins.
    pub fn from_fields(&self, role: Role, source: &SourceRecord) -> Option<TaxIdHit> {
        let (key, value) = lookup_field(&source.fields, self.aliases(role))?;
        Some(TaxIdHit::raw(&value.as_text(), format!("FIELD:{}", key)))
    }

    /// Step 2: a cell naming both the role and a tax-ID token anchors a search
    /// in the same cell, then to the right, then downwards.
    fn scan_grid_labels(
        &self,
        grid: &CellGrid,
        found: &mut TaxIds,
        fallback: &mut TaxIds,
        claims: &mut Claims,
    ) {
        for role in found.open_roles() {
            for cell in grid.iter() {
                let label = cell.value.as_text();
                if !contains_any(&label, &self.id_tokens) || !contains_any(&label, self.tokens(role)) {
                    continue;
                }

                let mut candidates = vec![(cell.row, cell.col)];
                candidates.extend(self.walk(grid, cell.row, cell.col, 0, 1, self.search_right));
                candidates.extend(self.walk(grid, cell.row, cell.col, 1, 0, self.search_down));

                for (row, col) in candidates {
                    if claims.cells.contains(&(row, col)) {
                        continue;
                    }
                    let text = grid.text(row, col);
                    let locator = format!("LABEL@R{}C{}->R{}C{}", cell.row, cell.col, row, col);
                    if let Some(value) = find_tax_id(&text) {
                        claims.cells.insert((row, col));
                        *found.slot(role) = Some(TaxIdHit::valid(value, locator));
                        break;
                    }
                    if (row, col) != (cell.row, cell.col)
                        && !only_digits(&text).is_empty()
                        && fallback.is_open(role)
                    {
                        *fallback.slot(role) = Some(TaxIdHit::raw(&text, locator));
                    }
                }

                if !found.is_open(role) {
                    break;
                }
            }
        }
    }

    /// Cells reached by stepping from a label; stops at the next label cell.
    fn walk(&self, grid: &CellGrid, row: u32, col: u32, d_row: u32, d_col: u32, steps: u32) -> Vec<(u32, u32)> {
        let mut cells = Vec::new();
        for step in 1..=steps {
            let (Some(r), Some(c)) = (
                row.checked_add(d_row.saturating_mul(step)),
                col.checked_add(d_col.saturating_mul(step)),
            ) else {
                break;
            };
            let Some(value) = grid.get(r, c) else {
                continue;
            };
            let text = value.as_text();
            if only_digits(&text).is_empty() && contains_any(&text, &self.id_tokens) {
                break;
            }
            cells.push((r, c));
        }
        cells
    }

    /// Step 3: a role label followed by a digit run within the label gap.
    fn scan_text_labels(
        &self,
        view: &TextView<'_>,
        found: &mut TaxIds,
        fallback: &mut TaxIds,
        claims: &mut Claims,
    ) {
        for role in found.open_roles() {
            for label in role.text_label().find_iter(view.text) {
                let Some((start, run)) = digit_run_after(view.text, label.end(), self.label_gap) else {
                    continue;
                };
                let offset = view.offset + start;
                if claims.offsets.contains(&offset) {
                    continue;
                }
                let locator = format!("{}:label@{}", view.tag, offset);
                match find_tax_id(run) {
                    Some(value) => {
                        claims.offsets.insert(offset);
                        *found.slot(role) = Some(TaxIdHit::valid(value, locator));
                        break;
                    }
                    None if fallback.is_open(role) => {
                        *fallback.slot(role) = Some(TaxIdHit::raw(run, locator));
                    }
                    None => {}
                }
            }
        }
    }

    /// Step 4 on grids: any valid candidate whose neighborhood names a role
    /// and a tax-ID token.
    fn scan_grid_context(&self, grid: &CellGrid, found: &mut TaxIds, claims: &mut Claims) {
        for cell in grid.iter() {
            if found.open_roles().is_empty() {
                return;
            }
            if claims.cells.contains(&(cell.row, cell.col)) {
                continue;
            }
            let Some(value) = find_tax_id(&cell.value.as_text()) else {
                continue;
            };
            let context = grid.neighborhood_text(cell.row, cell.col, self.context_radius);
            if let Some(role) = self.context_role(&context, found) {
                claims.cells.insert((cell.row, cell.col));
                let locator = format!("CTX@R{}C{}", cell.row, cell.col);
                *found.slot(role) = Some(TaxIdHit::valid(value, locator));
            }
        }
    }

    /// Step 4 on text: a character window around each 12-digit run.
    fn scan_text_context(&self, view: &TextView<'_>, found: &mut TaxIds, claims: &mut Claims) {
        for m in DIGIT_RUN.find_iter(view.text) {
            if found.open_roles().is_empty() {
                return;
            }
            let offset = view.offset + m.start();
            if !is_valid_tax_id(m.as_str()) || claims.offsets.contains(&offset) {
                continue;
            }
            let context = char_window(view.text, m.start(), m.end(), self.context_chars);
            if let Some(role) = self.context_role(context, found) {
                claims.offsets.insert(offset);
                let locator = format!("{}:ctx@{}", view.tag, offset);
                *found.slot(role) = Some(TaxIdHit::valid(m.as_str().to_string(), locator));
            }
        }
    }

    fn context_role(&self, context: &str, found: &TaxIds) -> Option<Role> {
        if !contains_any(context, &self.id_tokens) {
            return None;
        }
        found
            .open_roles()
            .into_iter()
            .find(|role| contains_any(context, self.tokens(*role)))
    }
}

/// First digit group after `from`, if it starts within `gap` characters.
fn digit_run_after(text: &str, from: usize, gap: usize) -> Option<(usize, &str)> {
    let (i, _) = text[from..]
        .char_indices()
        .take(gap + 1)
        .find(|(_, c)| c.is_ascii_digit())?;
    let m = DIGIT_GROUP_RUN.find_at(text, from + i)?;
    Some((m.start(), m.as_str()))
}

/// Slice of `text` extending `radius` characters around a byte range.
pub(crate) fn char_window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let lo = text[..start]
        .char_indices()
        .rev()
        .nth(radius.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let hi = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[lo..hi]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::section::SectionFinder;
    use crate::models::source::Cell;
    use pretty_assertions::assert_eq;

    fn locator() -> TaxIdLocator {
        TaxIdLocator::new(&Config::default())
    }

    fn locate_text(text: &str) -> TaxIds {
        let config = Config::default();
        let views = SectionFinder::new(&config.sections).views(text);
        locator().locate(&SourceRecord::from_text(text), &views)
    }

    #[test]
    fn test_validity_rejects_identical_digits() {
        for d in 0..=9 {
            let s = d.to_string().repeat(12);
            assert!(!is_valid_tax_id(&s), "{} should be invalid", s);
        }
        assert!(is_valid_tax_id("220629802621"));
        assert!(!is_valid_tax_id("22062980262"));
        assert!(!is_valid_tax_id("22062980262a"));
    }

    #[test]
    fn test_checksum() {
        assert!(checksum_valid("220629802628"));
        assert!(checksum_valid("422525832959"));
        // Round-one remainder is 10, so the second round decides.
        assert!(checksum_valid("123456789013"));
        assert!(!checksum_valid("987650000000"));
        assert!(!checksum_valid("220629802621"));
        assert!(!checksum_valid("12345"));
    }

    #[test]
    fn test_find_tax_id_in_noisy_text() {
        assert_eq!(find_tax_id("БИН: 2206 2980 2621").as_deref(), Some("220629802621"));
        assert_eq!(find_tax_id("220629802621 от 2025").as_deref(), Some("220629802621"));
        assert_eq!(find_tax_id("12345"), None);
    }

    #[test]
    fn test_structured_fields_win() {
        let source = SourceRecord::new()
            .with_field("supplier_BIN", "220629802621")
            .with_field("recipient_BIN", "123456789013")
            .with_text("БИН поставщика: 990101400039");

        let found = locator().locate(&source, &[]);
        let supplier = found.supplier.unwrap();
        assert_eq!(supplier.value, "220629802621");
        assert_eq!(supplier.locator, "FIELD:supplier_BIN");
        assert_eq!(found.buyer.unwrap().value, "123456789013");
    }

    #[test]
    fn test_structured_invalid_value_is_kept_raw() {
        let source = SourceRecord::new().with_field("supplier_tax_id", "12345");
        let hit = locator().locate(&source, &[]).supplier.unwrap();
        assert_eq!(hit.value, "12345");
        assert!(!hit.valid);
    }

    #[test]
    fn test_grid_label_scan() {
        let source = SourceRecord::from_cells(vec![
            Cell::new(1, 1, "ИИН/БИН поставщика"),
            Cell::new(1, 3, "220629802621"),
            Cell::new(2, 1, "БИН получателя"),
            Cell::new(3, 1, "123456789013"),
        ]);

        let found = locator().locate(&source, &[]);
        let supplier = found.supplier.unwrap();
        assert_eq!(supplier.value, "220629802621");
        assert_eq!(supplier.locator, "LABEL@R1C1->R1C3");
        let buyer = found.buyer.unwrap();
        assert_eq!(buyer.value, "123456789013");
        assert_eq!(buyer.locator, "LABEL@R2C1->R3C1");
    }

    #[test]
    fn test_grid_claimed_cell_is_not_reused() {
        // One label cell naming both roles; each role gets a different value.
        let source = SourceRecord::from_cells(vec![
            Cell::new(1, 1, "БИН поставщика / покупателя"),
            Cell::new(1, 2, "220629802621"),
            Cell::new(1, 3, "123456789013"),
        ]);

        let found = locator().locate(&source, &[]);
        assert_eq!(found.supplier.unwrap().value, "220629802621");
        assert_eq!(found.buyer.unwrap().value, "123456789013");
    }

    #[test]
    fn test_grid_context_fallback() {
        let source = SourceRecord::from_cells(vec![
            Cell::new(1, 1, "Поставщик"),
            Cell::new(2, 1, "БИН"),
            Cell::new(2, 2, "220629802621"),
        ]);

        let hit = locator().locate(&source, &[]).supplier.unwrap();
        assert_eq!(hit.value, "220629802621");
        assert_eq!(hit.locator, "CTX@R2C2");
    }

    #[test]
    fn test_text_label_scan() {
        let found = locate_text(
            "Поставщик: ТОО «Ромашка», БИН 220629802621\nПокупатель: ТОО «Лютик»\nБИН покупателя: 1234 5678 9013",
        );
        let supplier = found.supplier.unwrap();
        assert_eq!(supplier.value, "220629802621");
        assert!(supplier.locator.starts_with("TEXT:label@"));
        assert_eq!(found.buyer.unwrap().value, "123456789013");
    }

    #[test]
    fn test_text_context_fallback() {
        let found = locate_text("Сведения о поставщике\nРеквизиты: БИН 220629802621\n");
        let hit = found.supplier.unwrap();
        assert_eq!(hit.value, "220629802621");
        assert!(hit.locator.starts_with("TEXT:ctx@"));
        assert!(found.buyer.is_none());
    }

    #[test]
    fn test_malformed_labelled_value_is_reported_raw() {
        let hit = locate_text("БИН поставщика: 12345").supplier.unwrap();
        assert_eq!(hit.value, "12345");
        assert!(!hit.valid);
    }

    #[test]
    fn test_nothing_found() {
        assert_eq!(locate_text("Итого: 150 000,00"), TaxIds::default());
    }

    #[test]
    fn test_char_window() {
        let text = "абв 123 где";
        let start = text.find("123").unwrap();
        assert_eq!(char_window(text, start, start + 3, 2), "в 123 г");
    }
}
