//! Net, VAT, gross and generic total extraction.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::{debug, trace};

use super::dates::date_spans;
use super::patterns::{AMOUNT_TOKEN, PLAIN_AMOUNT, PRIORITY_TOTAL_LABEL, TAX_ID_TOKEN, TOTAL_LABEL};
use super::section::{SectionFinder, TextView};
use super::taxid::char_window;
use super::{ExtractionMatch, FieldExtractor, lookup_field};
use crate::models::config::{Config, TotalPreference};
use crate::models::document::fields;
use crate::models::source::{CellGrid, FieldValue, SourceRecord};
use crate::normalize::{label_similarity, only_digits, parse_amount};

/// Characters around a number searched for a tax-ID label.
const TAX_ID_RADIUS: usize = 40;

/// Bare integers this long are identifiers or account numbers, not amounts.
const MAX_BARE_DIGITS: usize = 10;

/// Kind of total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AmountCategory {
    Net,
    Vat,
    Gross,
    /// Generic "total" / "amount due".
    Amount,
}

impl AmountCategory {
    /// Grid label matching order; on equal similarity the earlier category wins.
    pub const ALL: [AmountCategory; 4] = [
        AmountCategory::Gross,
        AmountCategory::Net,
        AmountCategory::Vat,
        AmountCategory::Amount,
    ];

    pub fn field(self) -> &'static str {
        match self {
            AmountCategory::Net => fields::TOTAL_NET,
            AmountCategory::Vat => fields::TOTAL_VAT,
            AmountCategory::Gross => fields::TOTAL_GROSS,
            AmountCategory::Amount => fields::TOTAL_AMOUNT,
        }
    }

    fn group(self) -> &'static str {
        match self {
            AmountCategory::Net => "net",
            AmountCategory::Vat => "vat",
            AmountCategory::Gross => "gross",
            AmountCategory::Amount => "amount",
        }
    }

    fn grid_tag(self) -> &'static str {
        match self {
            AmountCategory::Net => "TOTAL_NET",
            AmountCategory::Vat => "TOTAL_VAT",
            AmountCategory::Gross => "TOTAL_GROSS",
            AmountCategory::Amount => "TOTAL",
        }
    }
}

impl From<TotalPreference> for AmountCategory {
    fn from(preference: TotalPreference) -> Self {
        match preference {
            TotalPreference::Net => AmountCategory::Net,
            TotalPreference::Vat => AmountCategory::Vat,
            TotalPreference::Gross => AmountCategory::Gross,
        }
    }
}

/// An integer from 1 to 12, typically a column or row index picked up by mistake.
pub fn is_suspicious_index(amount: Decimal) -> bool {
    amount.fract().is_zero() && amount >= Decimal::ONE && amount <= Decimal::from(12)
}

/// A scored number next to a total label.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountCandidate {
    pub category: AmountCategory,
    pub amount: Decimal,
    pub score: i32,
    /// Label preceded the number (`false` for right-aligned layouts).
    pub forward: bool,
}

impl AmountCandidate {
    fn new(category: AmountCategory, amount: Decimal, raw: &str, priority: bool, forward: bool) -> Self {
        let has_separator = raw.trim_start_matches('-').contains([' ', ',', '.', '\'']);
        let mut score = 0;
        if has_separator {
            score += 2;
        }
        if only_digits(raw).len() >= 4 {
            score += 1;
        }
        if priority {
            score += 4;
        }
        if !has_separator && is_suspicious_index(amount) {
            score -= 10;
        }
        Self {
            category,
            amount,
            score,
            forward,
        }
    }
}

/// Totals found for each category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    found: BTreeMap<AmountCategory, ExtractionMatch<Decimal>>,
    /// Structured values that could not be parsed, with their locator.
    pub unparsed: BTreeMap<AmountCategory, (String, String)>,
}

impl Totals {
    pub fn get(&self, category: AmountCategory) -> Option<&ExtractionMatch<Decimal>> {
        self.found.get(&category)
    }

    fn set(&mut self, category: AmountCategory, hit: ExtractionMatch<Decimal>) {
        self.found.entry(category).or_insert(hit);
    }

    /// Canonical document total.
    ///
    /// A structured generic total (`total_amount` field) wins outright.
    /// Otherwise the preferred category, then gross, then a generic label
    /// match from the grid or text. "Всего к оплате" labels count as gross.
    pub fn canonical(&self, preference: TotalPreference) -> Option<&ExtractionMatch<Decimal>> {
        if let Some(hit) = self.get(AmountCategory::Amount) {
            if hit.locator.starts_with("FIELD:") {
                return Some(hit);
            }
        }
        [preference.into(), AmountCategory::Gross, AmountCategory::Amount]
            .into_iter()
            .find_map(|category| self.get(category))
    }
}

/// Amount extractor over structured fields, grids and text.
#[derive(Debug, Clone)]
pub struct AmountExtractor {
    aliases: BTreeMap<AmountCategory, Vec<String>>,
    threshold: f64,
    search_right: u32,
    search_down: u32,
    gap: usize,
    preference: TotalPreference,
}

impl AmountExtractor {
    pub fn new(config: &Config) -> Self {
        let aliases = BTreeMap::from([
            (AmountCategory::Net, config.aliases.total_net.clone()),
            (AmountCategory::Vat, config.aliases.total_vat.clone()),
            (AmountCategory::Gross, config.aliases.total_gross.clone()),
            (AmountCategory::Amount, config.aliases.total_amount.clone()),
        ]);
        Self {
            aliases,
            threshold: config.matching.fuzzy_threshold,
            search_right: config.totals.reach().0,
            search_down: config.totals.reach().1,
            gap: config.totals.gap(),
            preference: config.totals.prefer_total,
        }
    }

    fn aliases(&self, category: AmountCategory) -> &[String] {
        self.aliases.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// Locate every category: structured fields, then the grid, then text.
    pub fn locate(&self, source: &SourceRecord, views: &[TextView<'_>]) -> Totals {
        let mut totals = Totals::default();

        for category in AmountCategory::ALL {
            let Some((key, value)) = lookup_field(&source.fields, self.aliases(category)) else {
                continue;
            };
            let locator = format!("FIELD:{}", key);
            match cell_amount(value) {
                Some(amount) => totals.set(category, ExtractionMatch::new(amount, locator, value.as_text())),
                None => {
                    totals.unparsed.insert(category, (value.as_text().trim().to_string(), locator));
                }
            }
        }

        let grid = source.grid();
        if !grid.is_empty() {
            self.scan_grid(&grid, &mut totals);
        }
        for view in views {
            self.scan_text(view, &mut totals);
        }

        for (category, hit) in &totals.found {
            debug!("{} = {} at {}", category.field(), hit.value, hit.locator);
        }
        totals
    }

    /// Canonical total re-searched in raw text, ESF section first.
    pub fn search_total(&self, text: &str, sections: &SectionFinder) -> Option<ExtractionMatch<Decimal>> {
        let mut totals = Totals::default();
        for view in sections.views(text) {
            self.scan_text(&view, &mut totals);
        }
        totals.canonical(self.preference).cloned()
    }

    /// Grid strategy: a label cell anchors a search in the same cell, then to
    /// the right, then downwards. The first match per category wins.
    pub fn scan_grid(&self, grid: &CellGrid, totals: &mut Totals) {
        for cell in grid.iter() {
            let FieldValue::Text(text) = &cell.value else {
                continue;
            };
            let label: String = text.chars().filter(|c| !c.is_ascii_digit()).collect();

            let best = AmountCategory::ALL
                .into_iter()
                .map(|category| (category, label_similarity(&label, self.aliases(category))))
                .filter(|(_, score)| *score >= self.threshold)
                .fold(None, |best: Option<(AmountCategory, f64)>, (category, score)| match best {
                    Some((_, top)) if top >= score => best,
                    _ => Some((category, score)),
                });
            let Some((category, _)) = best else {
                continue;
            };
            if totals.get(category).is_some() {
                continue;
            }

            let right = (1..=self.search_right).map(|d| (cell.row, cell.col.saturating_add(d)));
            let down = (1..=self.search_down).map(|d| (cell.row.saturating_add(d), cell.col));
            let mut positions = std::iter::once((cell.row, cell.col)).chain(right).chain(down);

            let hit = positions.find_map(|(row, col)| {
                let value = grid.get(row, col)?;
                let amount = if (row, col) == (cell.row, cell.col) {
                    first_amount(text)
                } else {
                    cell_amount(value)
                }?;
                let locator = format!("{}@R{}C{}", category.grid_tag(), row, col);
                Some(ExtractionMatch::new(amount, locator, value.as_text()))
            });

            if let Some(hit) = hit {
                trace!("grid label {:?} -> {}", text, hit.locator);
                totals.set(category, hit);
            }
        }
    }

    /// Text strategy: best-scoring candidate per category.
    pub fn scan_text(&self, view: &TextView<'_>, totals: &mut Totals) {
        let mut best: BTreeMap<AmountCategory, ExtractionMatch<AmountCandidate>> = BTreeMap::new();
        for candidate in self.extract_all(view.text) {
            let category = candidate.value.category;
            let better = match best.get(&category) {
                None => true,
                Some(current) => outranks(&candidate, current),
            };
            if better {
                best.insert(category, candidate);
            }
        }

        for (category, candidate) in best {
            if totals.get(category).is_some() {
                continue;
            }
            let offset = view.offset + candidate.position.map_or(0, |p| p.0);
            let locator = format!("{}:{}@{}", view.tag, category.group(), offset);
            let mut hit = ExtractionMatch::new(candidate.value.amount, locator, candidate.source);
            if let Some((start, end)) = candidate.position {
                hit = hit.with_position(view.offset + start, view.offset + end);
            }
            totals.set(category, hit);
        }
    }

    fn label_candidates(
        &self,
        text: &str,
        labels: &[(AmountCategory, Range<usize>)],
        index: usize,
        rejected: &[Range<usize>],
    ) -> Vec<ExtractionMatch<AmountCandidate>> {
        let (category, label) = (labels[index].0, labels[index].1.clone());
        let priority = PRIORITY_TOTAL_LABEL.is_match(&text[label.clone()]);

        let line_start = text[..label.start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = text[label.end..].find('\n').map_or(text.len(), |i| label.end + i);
        let next_label = labels.get(index + 1).map(|(_, r)| r.start).filter(|s| *s < line_end);
        let prev_label = index
            .checked_sub(1)
            .map(|i| labels[i].1.end)
            .filter(|e| *e > line_start);

        let accept = |start: usize, end: usize| -> Option<Decimal> {
            let raw = &text[start..end];
            if rejected.iter().any(|r| r.start < end && start < r.end) {
                return None;
            }
            if text[end..].trim_start_matches(' ').starts_with('%') {
                return None;
            }
            if !raw.contains([' ', ',', '.', '\'']) && only_digits(raw).len() >= MAX_BARE_DIGITS {
                return None;
            }
            let line = &text[line_start..line_end];
            if TAX_ID_TOKEN.is_match(char_window(line, start - line_start, end - line_start, TAX_ID_RADIUS)) {
                return None;
            }
            parse_amount(raw)
        };

        let mut out = Vec::new();

        // Label, then number.
        let forward_end = next_label.unwrap_or(line_end);
        for (start, end) in number_tokens(text, label.end, forward_end) {
            if text[label.end..start].chars().count() > self.gap {
                break;
            }
            if let Some(amount) = accept(start, end) {
                let candidate = AmountCandidate::new(category, amount, &text[start..end], priority, true);
                out.push(ExtractionMatch::new(candidate, "", &text[start..end]).with_position(start, end));
            }
        }
        if !out.is_empty() {
            return out;
        }

        // Number, then label.
        let backward_start = prev_label.unwrap_or(line_start);
        let last = number_tokens(text, backward_start, label.start)
            .into_iter()
            .rev()
            .find(|(_, end)| text[*end..label.start].chars().count() <= self.gap);
        if let Some((start, end)) = last {
            if let Some(amount) = accept(start, end) {
                let candidate = AmountCandidate::new(category, amount, &text[start..end], priority, false);
                out.push(ExtractionMatch::new(candidate, "", &text[start..end]).with_position(start, end));
            }
        }
        out
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = ExtractionMatch<AmountCandidate>;

    /// Best candidate of any category.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text)
            .into_iter()
            .fold(None, |best, candidate| match best {
                Some(current) if !outranks(&candidate, &current) => Some(current),
                _ => Some(candidate),
            })
    }

    /// Every scored candidate next to a total label, in label order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let labels: Vec<(AmountCategory, Range<usize>)> = TOTAL_LABEL
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let category = [
                    AmountCategory::Gross,
                    AmountCategory::Net,
                    AmountCategory::Vat,
                    AmountCategory::Amount,
                ]
                .into_iter()
                .find(|c| caps.name(c.group()).is_some())?;
                Some((category, whole.range()))
            })
            .collect();
        let rejected: Vec<Range<usize>> = date_spans(text).into_iter().map(|(s, e, _)| s..e).collect();

        (0..labels.len())
            .flat_map(|i| self.label_candidates(text, &labels, i, &rejected))
            .collect()
    }
}

/// Higher score wins; ties go to the larger magnitude, then the earlier position.
fn outranks(a: &ExtractionMatch<AmountCandidate>, b: &ExtractionMatch<AmountCandidate>) -> bool {
    let pos = |m: &ExtractionMatch<AmountCandidate>| m.position.map_or(usize::MAX, |p| p.0);
    (a.value.score, a.value.amount.abs(), std::cmp::Reverse(pos(a)))
        > (b.value.score, b.value.amount.abs(), std::cmp::Reverse(pos(b)))
}

/// Number-shaped tokens within `text[from..to]`, as absolute byte ranges.
fn number_tokens(text: &str, from: usize, to: usize) -> Vec<(usize, usize)> {
    let mut tokens = Vec::new();
    let mut at = from;
    while let Some(m) = AMOUNT_TOKEN.find_at(text, at) {
        if m.start() >= to {
            break;
        }
        let mut end = m.end();
        // A grouped match cut inside a longer digit run falls back to the plain form.
        if text[end..].starts_with(|c: char| c.is_ascii_digit()) {
            if let Some(plain) = PLAIN_AMOUNT.find_at(text, m.start()).filter(|p| p.start() == m.start()) {
                end = plain.end();
            }
        }
        let end = end.min(to);
        tokens.push((m.start(), end));
        at = end.max(m.start() + 1);
    }
    tokens
}

/// First usable amount inside a piece of text.
fn first_amount(text: &str) -> Option<Decimal> {
    let rejected: Vec<(usize, usize)> = date_spans(text).into_iter().map(|(s, e, _)| (s, e)).collect();
    number_tokens(text, 0, text.len())
        .into_iter()
        .filter(|(start, end)| !rejected.iter().any(|(s, e)| s < end && start < e))
        .filter(|(_, end)| !text[*end..].trim_start().starts_with('%'))
        .find_map(|(start, end)| parse_amount(&text[start..end]))
}

/// Amount held by a cell or structured field.
fn cell_amount(value: &FieldValue) -> Option<Decimal> {
    match value {
        FieldValue::Number(n) => Decimal::try_from(*n).ok(),
        FieldValue::Text(s) => {
            if s.trim().is_empty() {
                None
            } else if date_spans(s).is_empty() {
                parse_amount(s)
            } else {
                None
            }
        }
        _ => None,
    }
}
