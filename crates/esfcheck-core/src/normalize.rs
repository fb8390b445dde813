//! Text and label normalization, encoding repair and amount parsing.
//!
//! Every extractor goes through these helpers so that labels coming from a
//! PDF, a spreadsheet cell or a structured key compare the same way.

use encoding_rs::{WINDOWS_1251, WINDOWS_1252};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Invisible or non-breaking characters that are treated as whitespace.
const INVISIBLE: &[char] = &[
    '\u{00A0}', '\u{2007}', '\u{202F}', '\u{200B}', '\u{200C}', '\u{200D}', '\u{200E}',
    '\u{200F}', '\u{2060}', '\u{FEFF}',
];

/// Label synonyms applied after lowercasing, in order.
const KEY_SYNONYMS: &[(&str, &str)] = &[
    ("№", " номер "),
    ("ё", "е"),
    ("иин/бин", "бин"),
    ("бин/иин", "бин"),
    ("iin/bin", "bin"),
    ("bin/iin", "bin"),
    ("получател", "покупател"),
    ("recipient", "buyer"),
    ("customer", "buyer"),
    ("seller", "supplier"),
];

/// Strip invisible characters, collapse whitespace runs and trim.
pub fn normalize_text(s: &str) -> String {
    s.chars()
        .map(|c| if INVISIBLE.contains(&c) { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize multi-line text line by line, dropping blank lines.
pub fn normalize_multiline(s: &str) -> String {
    s.lines()
        .map(|line| normalize_text(&line.replace(['•', '▪', '■'], " ")))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Matching key: lowercase, synonyms unified, punctuation stripped.
///
/// Keys are only ever compared, never displayed.
pub fn normalize_key(s: &str) -> String {
    let mut key = normalize_text(s).to_lowercase();
    for (from, to) in KEY_SYNONYMS {
        if key.contains(from) {
            key = key.replace(from, to);
        }
    }
    let stripped: String = key
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();
    normalize_text(&stripped)
}

/// True when the key of `s` contains the key of any token.
pub fn contains_any(s: &str, tokens: &[String]) -> bool {
    let key = normalize_key(s);
    tokens.iter().any(|token| {
        let token = normalize_key(token);
        !token.is_empty() && key.contains(&token)
    })
}

/// Best positional character similarity between a label and an alias list.
///
/// An exact key match scores 1.0; otherwise the score is the number of
/// positions holding the same character divided by the longer length.
pub fn label_similarity(label: &str, aliases: &[String]) -> f64 {
    let key = normalize_key(label);
    if key.is_empty() {
        return 0.0;
    }
    aliases
        .iter()
        .map(|alias| {
            let alias = normalize_key(alias);
            if alias == key {
                return 1.0;
            }
            let same = key.chars().zip(alias.chars()).filter(|(a, b)| a == b).count();
            let longest = key.chars().count().max(alias.chars().count()).max(1);
            same as f64 / longest as f64
        })
        .fold(0.0, f64::max)
}

/// Keep ASCII digits only.
pub fn only_digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// Parse a monetary amount written with spaces or apostrophes as thousands
/// separators and either comma or dot as decimal separator.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let trimmed = normalize_text(s);
    let negative = trimmed.starts_with('-') || trimmed.starts_with('\u{2212}');

    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == ',' || c == '.');
    if cleaned.is_empty() {
        return None;
    }

    let commas = cleaned.matches(',').count();
    let dots = cleaned.matches('.').count();

    let normalized = if commas > 0 && dots > 0 {
        // The last separator is the decimal one.
        let last_comma = cleaned.rfind(',').unwrap_or(0);
        let last_dot = cleaned.rfind('.').unwrap_or(0);
        if last_comma > last_dot {
            cleaned.replace('.', "").replace(',', ".")
        } else {
            cleaned.replace(',', "")
        }
    } else if commas == 1 {
        cleaned.replace(',', ".")
    } else if commas > 1 {
        cleaned.replace(',', "")
    } else if dots > 1 {
        cleaned.replace('.', "")
    } else {
        cleaned.to_string()
    };

    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

/// Repair text that went through a wrong single-byte decoding.
///
/// A fixed set of re-interpretations is tried and the one with the most
/// Cyrillic letters wins; ties keep the earlier candidate, so the original
/// text is returned unless a candidate is strictly better.
pub fn fix_encoding(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let candidates = [
        Some(s.to_string()),
        latin1_bytes(s).and_then(|b| decode_cp1251(&b)),
        cp1252_bytes(s).and_then(|b| String::from_utf8(b).ok()),
        cp1252_bytes(s)
            .and_then(|b| String::from_utf8(b).ok())
            .and_then(|t| latin1_bytes(&t))
            .and_then(|b| decode_cp1251(&b)),
        latin1_bytes(s)
            .and_then(|b| decode_cp1251(&b))
            .and_then(|t| cp1252_bytes(&t))
            .and_then(|b| String::from_utf8(b).ok()),
    ];

    let mut best = s.to_string();
    let mut best_score = cyrillic_count(s);
    for candidate in candidates.into_iter().flatten().skip(1) {
        let score = cyrillic_count(&candidate);
        if score > best_score {
            best_score = score;
            best = candidate;
        }
    }
    best
}

fn latin1_bytes(s: &str) -> Option<Vec<u8>> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect()
}

fn cp1252_bytes(s: &str) -> Option<Vec<u8>> {
    let (bytes, _, unmappable) = WINDOWS_1252.encode(s);
    (!unmappable).then(|| bytes.into_owned())
}

fn decode_cp1251(bytes: &[u8]) -> Option<String> {
    WINDOWS_1251
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

fn cyrillic_count(s: &str) -> usize {
    s.chars()
        .filter(|c| matches!(c, 'А'..='я' | 'Ё' | 'ё' | 'І' | 'і' | 'Ә' | 'ә' | 'Ғ' | 'ғ' | 'Қ' | 'қ' | 'Ң' | 'ң' | 'Ө' | 'ө' | 'Ұ' | 'ұ' | 'Ү' | 'ү' | 'Һ' | 'һ'))
        .count()
}
