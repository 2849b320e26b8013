//! Shorthand number parsing for table cells ("12.3K", "1,234", "4.5M", "--").

use serde::{Deserialize, Serialize};

/// Placeholder the site renders for missing values.
pub const PLACEHOLDER: &str = "--";

/// Parses a cell token into a number.
///
/// Thousands separators and whitespace are dropped, a trailing `K` or `M`
/// multiplies by 1e3 or 1e6. Placeholders, empty tokens and anything else
/// that does not parse give `None`.
pub fn parse_number(token: &str) -> Option<f64> {
    let cleaned: String = token
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() || cleaned == PLACEHOLDER {
        return None;
    }

    let (digits, multiplier) = if let Some(rest) = cleaned.strip_suffix('K') {
        (rest, 1e3)
    } else if let Some(rest) = cleaned.strip_suffix('M') {
        (rest, 1e6)
    } else {
        (cleaned.as_str(), 1.0)
    };

    // f64::from_str also accepts "inf" and "NaN"
    if !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.' || c == '+' || c == '-') {
        return None;
    }

    digits
        .parse::<f64>()
        .ok()
        .map(|n| n * multiplier)
        .filter(|n| n.is_finite())
}

/// Like [`parse_number`] but rounded to a whole count.
pub fn parse_count(token: &str) -> Option<i64> {
    parse_number(token).map(|n| n.round() as i64)
}

/// A profile statistic: numeric when the text parses, otherwise the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Number(f64),
    Text(String),
}

impl StatValue {
    pub fn from_text(text: &str) -> Option<StatValue> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match parse_number(trimmed) {
            Some(n) => StatValue::Number(n),
            None => StatValue::Text(trimmed.to_string()),
        })
    }
}
