//! Issue and turnover date extraction and normalization.

use chrono::{Duration, NaiveDate};
use regex::Captures;
use std::collections::BTreeMap;
use tracing::debug;

use super::patterns::{
    DATE_DMY, DATE_LONG, DATE_YMD, INVOICE_HEADER_FROM, ISSUE_DATE_LABEL, TURNOVER_DATE_LABEL,
};
use super::section::TextView;
use super::{ExtractionMatch, FieldExtractor, lookup_field};
use crate::models::config::Config;
use crate::models::document::fields;
use crate::models::source::{CellGrid, FieldValue, SourceRecord};
use crate::normalize::{contains_any, label_similarity, normalize_key};

/// Genitive month names as written in long-form dates.
const MONTHS: [&str; 12] = [
    "января", "февраля", "марта", "апреля", "мая", "июня", "июля", "августа", "сентября",
    "октября", "ноября", "декабря",
];

/// Serial day counts outside this range are not treated as dates.
const SERIAL_RANGE: std::ops::RangeInclusive<f64> = 20_000.0..=60_000.0;

/// Characters after a label in which its date must start.
const LABEL_WINDOW: usize = 40;

/// Which date a value stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRole {
    Issue,
    Turnover,
}

impl DateRole {
    pub fn field(self) -> &'static str {
        match self {
            DateRole::Issue => fields::ISSUE_DATE,
            DateRole::Turnover => fields::TURNOVER_DATE,
        }
    }
}

/// Convert a spreadsheet serial day count (epoch 1899-12-30).
///
/// The epoch absorbs the 1900 leap-year quirk for every date after
/// February 1900, which is all the supported range covers.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !SERIAL_RANGE.contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Parse a cell or field value into a calendar date.
pub fn parse_date_value(value: &FieldValue) -> Option<NaiveDate> {
    match value {
        FieldValue::Date(d) => Some(*d),
        FieldValue::DateTime(dt) => Some(dt.date()),
        FieldValue::Number(n) => serial_to_date(*n),
        FieldValue::Text(s) => parse_date_text(s),
        FieldValue::Empty | FieldValue::Bool(_) => None,
    }
}

/// Parse the earliest date written anywhere in `s`.
pub fn parse_date_text(s: &str) -> Option<NaiveDate> {
    date_spans(s).into_iter().next().map(|(_, _, date)| date)
}

/// Every valid date in the text as `(start, end, date)`, ordered by start.
pub(crate) fn date_spans(text: &str) -> Vec<(usize, usize, NaiveDate)> {
    let mut spans = Vec::new();

    for caps in DATE_YMD.captures_iter(text) {
        push_numeric(&mut spans, text, &caps, 1, 2, 3);
    }
    for caps in DATE_DMY.captures_iter(text) {
        push_numeric(&mut spans, text, &caps, 3, 2, 1);
    }
    for caps in DATE_LONG.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let month = MONTHS
            .iter()
            .position(|m| caps[2].to_lowercase() == *m)
            .map(|i| i as u32 + 1);
        let date = month.and_then(|month| {
            NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month, caps[1].parse().ok()?)
        });
        if let Some(date) = date {
            spans.push((whole.start(), whole.end(), date));
        }
    }

    spans.sort_by_key(|(start, end, _)| (*start, std::cmp::Reverse(*end)));
    spans
}

fn push_numeric(
    spans: &mut Vec<(usize, usize, NaiveDate)>,
    text: &str,
    caps: &Captures<'_>,
    year: usize,
    month: usize,
    day: usize,
) {
    let Some(whole) = caps.get(0) else { return };
    let digit_before = text[..whole.start()].chars().next_back().is_some_and(|c| c.is_ascii_digit());
    let digit_after = text[whole.end()..].chars().next().is_some_and(|c| c.is_ascii_digit());
    if digit_before || digit_after {
        return;
    }
    let date = NaiveDate::from_ymd_opt(
        caps[year].parse().unwrap_or(0),
        caps[month].parse().unwrap_or(0),
        caps[day].parse().unwrap_or(0),
    );
    if let Some(date) = date {
        spans.push((whole.start(), whole.end(), date));
    }
}

/// Dates located for both roles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dates {
    pub issue: Option<ExtractionMatch<NaiveDate>>,
    pub turnover: Option<ExtractionMatch<NaiveDate>>,
    /// Field name to raw value located but not parseable as a date.
    pub unparsed: BTreeMap<String, String>,
}

impl Dates {
    pub fn get(&self, role: DateRole) -> Option<&ExtractionMatch<NaiveDate>> {
        match role {
            DateRole::Issue => self.issue.as_ref(),
            DateRole::Turnover => self.turnover.as_ref(),
        }
    }

    fn set(&mut self, role: DateRole, hit: ExtractionMatch<NaiveDate>) {
        let slot = match role {
            DateRole::Issue => &mut self.issue,
            DateRole::Turnover => &mut self.turnover,
        };
        if slot.is_none() {
            *slot = Some(hit);
        }
    }

    fn unparsed(&mut self, role: DateRole, raw: &str) {
        let raw = raw.trim();
        if !raw.is_empty() {
            self.unparsed.entry(role.field().to_string()).or_insert_with(|| raw.to_string());
        }
    }
}

/// Date extractor over structured fields, grids and text.
#[derive(Debug, Clone)]
pub struct DateExtractor {
    issue_aliases: Vec<String>,
    turnover_aliases: Vec<String>,
    header_keywords: Vec<String>,
    threshold: f64,
    context_radius: u32,
}

impl DateExtractor {
    pub fn new(config: &Config) -> Self {
        Self {
            issue_aliases: config.aliases.issue_date.clone(),
            turnover_aliases: config.aliases.turnover_date.clone(),
            header_keywords: config.dates.header_keywords.clone(),
            threshold: config.matching.date_threshold(),
            context_radius: config.matching.radius(),
        }
    }

    fn aliases(&self, role: DateRole) -> &[String] {
        match role {
            DateRole::Issue => &self.issue_aliases,
            DateRole::Turnover => &self.turnover_aliases,
        }
    }

    /// Locate both dates. Values found in structured fields win, then the
    /// grid, then the text views in order.
    pub fn locate(&self, source: &SourceRecord, views: &[TextView<'_>]) -> Dates {
        let mut dates = Dates::default();

        for role in [DateRole::Issue, DateRole::Turnover] {
            if let Some((key, value)) = lookup_field(&source.fields, self.aliases(role)) {
                match parse_date_value(value) {
                    Some(date) => dates.set(role, ExtractionMatch::new(date, format!("FIELD:{}", key), value.as_text())),
                    None => dates.unparsed(role, &value.as_text()),
                }
            }
        }

        let grid = source.grid();
        if !grid.is_empty() {
            self.scan_grid(&grid, &mut dates);
        }
        for view in views {
            self.scan_text(view, &mut dates);
        }

        // A parsed date supersedes a raw leftover for the same field.
        for role in [DateRole::Issue, DateRole::Turnover] {
            if let Some(hit) = dates.get(role) {
                debug!("{} = {} at {}", role.field(), hit.value, hit.locator);
                dates.unparsed.remove(role.field());
            }
        }
        dates
    }

    /// Grid strategy.
    ///
    /// The first pass accepts a date whose left or upper neighbor, or whose
    /// own text, names a date label. The second pass accepts a text date
    /// surrounded by invoice-header keywords as the issue date.
    pub fn scan_grid(&self, grid: &CellGrid, dates: &mut Dates) {
        for cell in grid.iter() {
            let Some(date) = parse_date_value(&cell.value) else {
                continue;
            };
            let raw = cell.value.as_text();

            let left = if cell.col > 1 { grid.text(cell.row, cell.col - 1) } else { String::new() };
            let up = if cell.row > 1 { grid.text(cell.row - 1, cell.col) } else { String::new() };
            let score = |role: DateRole| {
                label_similarity(&left, self.aliases(role)).max(label_similarity(&up, self.aliases(role)))
            };
            let issue = score(DateRole::Issue);
            let turnover = score(DateRole::Turnover);

            let role = if issue.max(turnover) >= self.threshold {
                Some(if turnover > issue { DateRole::Turnover } else { DateRole::Issue })
            } else if matches!(cell.value, FieldValue::Text(_)) {
                self.same_cell_role(&raw)
            } else {
                None
            };

            if let Some(role) = role {
                if dates.get(role).is_none() {
                    let locator = format!("DATE@R{}C{}", cell.row, cell.col);
                    dates.set(role, ExtractionMatch::new(date, locator, raw));
                }
            }
        }

        if dates.issue.is_some() {
            return;
        }
        for cell in grid.iter() {
            if !matches!(cell.value, FieldValue::Text(_)) {
                continue;
            }
            let Some(date) = parse_date_value(&cell.value) else {
                continue;
            };
            let context = grid.neighborhood_text(cell.row, cell.col, self.context_radius);
            if contains_any(&context, &self.header_keywords) {
                let locator = format!("DATE:ctx@R{}C{}", cell.row, cell.col);
                dates.set(DateRole::Issue, ExtractionMatch::new(date, locator, cell.value.as_text()));
                return;
            }
        }
    }

    /// Role named by a cell's own text, e.g. `Дата выписки: 23.09.2025`.
    fn same_cell_role(&self, text: &str) -> Option<DateRole> {
        let key = normalize_key(text);
        let names = |aliases: &[String]| {
            aliases.iter().any(|alias| {
                let alias = normalize_key(alias);
                alias.chars().count() >= 5 && key.contains(&alias)
            })
        };
        if names(&self.turnover_aliases) {
            Some(DateRole::Turnover)
        } else if names(&self.issue_aliases) || contains_any(text, &self.header_keywords) {
            Some(DateRole::Issue)
        } else {
            None
        }
    }

    /// Text strategy: explicit labels, then `<invoice title> ... от <date>`,
    /// then a bare long-form date.
    pub fn scan_text(&self, view: &TextView<'_>, dates: &mut Dates) {
        if dates.turnover.is_none() {
            if let Some(hit) = self.labelled(view, DateRole::Turnover, dates) {
                dates.set(DateRole::Turnover, hit);
            }
        }
        if dates.issue.is_some() {
            return;
        }
        if let Some(hit) = self.labelled(view, DateRole::Issue, dates) {
            dates.set(DateRole::Issue, hit);
            return;
        }
        for m in INVOICE_HEADER_FROM.find_iter(view.text) {
            if let Some((start, end, date)) = date_right_after(view.text, m.end()) {
                let locator = format!("{}:header@{}", view.tag, view.offset + m.start());
                let hit = ExtractionMatch::new(date, locator, &view.text[start..end])
                    .with_position(view.offset + start, view.offset + end);
                dates.set(DateRole::Issue, hit);
                return;
            }
        }
        if let Some(hit) = self.extract(view.text) {
            let locator = format!("{}:long@{}", view.tag, view.offset + hit.position.map_or(0, |p| p.0));
            dates.set(DateRole::Issue, ExtractionMatch { locator, ..hit });
        }
    }

    fn labelled(
        &self,
        view: &TextView<'_>,
        role: DateRole,
        dates: &mut Dates,
    ) -> Option<ExtractionMatch<NaiveDate>> {
        let label = match role {
            DateRole::Issue => &*ISSUE_DATE_LABEL,
            DateRole::Turnover => &*TURNOVER_DATE_LABEL,
        };
        for m in label.find_iter(view.text) {
            if let Some((start, end, date)) = date_right_after(view.text, m.end()) {
                let locator = format!("{}:label@{}", view.tag, view.offset + m.start());
                return Some(
                    ExtractionMatch::new(date, locator, &view.text[start..end])
                        .with_position(view.offset + start, view.offset + end),
                );
            }
            let rest = view.text[m.end()..].lines().next().unwrap_or_default();
            let raw: String = rest.trim().chars().take(20).collect();
            dates.unparsed(role, &raw);
        }
        None
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    /// First long-form date in the text.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        DATE_LONG
            .find_iter(text)
            .filter_map(|m| {
                let date = parse_date_text(m.as_str())?;
                Some(
                    ExtractionMatch::new(date, format!("TEXT:long@{}", m.start()), m.as_str())
                        .with_position(m.start(), m.end()),
                )
            })
            .collect()
    }
}

/// A date starting on the same line within a few characters of `from`.
fn date_right_after(text: &str, from: usize) -> Option<(usize, usize, NaiveDate)> {
    let line_end = text[from..].find('\n').map_or(text.len(), |i| from + i);
    let window_end = text[from..line_end]
        .char_indices()
        .nth(LABEL_WINDOW + 20)
        .map_or(line_end, |(i, _)| from + i);
    let window = &text[from..window_end];

    let (start, end, date) = date_spans(window).into_iter().next()?;
    if window[..start].chars().count() > LABEL_WINDOW {
        return None;
    }
    Some((from + start, from + end, date))
}
