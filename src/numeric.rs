//! Numeric coercion and display formatting
//!
//! Cells arrive as whatever the spreadsheet export produced: numbers, numeric
//! strings, `"45%"`, blanks, or free text. Coercion keeps "no data" (`None`)
//! apart from "zero activity" (`Some(0.0)`); the only place a missing value
//! becomes zero is [`or_zero`], called at summation time.
//!
//! [`format_cell`] is the single formatting policy. The HTML table, its
//! tooltips and every export format go through it so what is exported matches
//! what is on screen.

use crate::dataset::{number_text, Cell};
use serde::Serialize;

/// Dash shown for an exact zero.
pub const ZERO_GLYPH: &str = "\u{2014}";

/// Tooltip annotation attached to zero cells.
pub const NO_ACTIVITY: &str = "No activity";

/// Coerce a cell to a finite number.
///
/// Text is parsed with leading-prefix semantics: `"45%"` is 45, `"12 visits"`
/// is 12, `"n/a"` is `None`. Null and empty strings are `None`, never zero.
pub fn to_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Null => None,
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Number(_) => None,
        Cell::Text(s) => parse_float_prefix(s),
    }
}

/// The explicit zero-substitution point.
#[inline]
pub fn or_zero(value: Option<f64>) -> f64 {
    value.unwrap_or(0.0)
}

/// Parse the longest numeric prefix of `s` (after leading whitespace).
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    // Exponent only counts when followed by at least one digit
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// How a formatted value was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    Empty,
    Text,
    Percent,
    Zero,
    Thousands,
    Decimal,
    Integer,
}

impl DisplayKind {
    pub fn is_numeric(self) -> bool {
        !matches!(self, DisplayKind::Empty | DisplayKind::Text)
    }
}

/// A cell ready for display or export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayValue {
    pub text: String,
    pub kind: DisplayKind,
    /// Numeric value behind the text, when there is one
    pub value: Option<f64>,
    /// Tooltip annotation
    pub note: Option<&'static str>,
}

impl DisplayValue {
    fn plain(text: String, kind: DisplayKind) -> Self {
        Self { text, kind, value: None, note: None }
    }
}

/// Format a cell for display. Precedence: percentage, zero, thousands,
/// decimal, integer.
///
/// Only cells whose whole text is numeric (a trailing `%` and thousands
/// commas allowed) are formatted as numbers; anything else is shown verbatim.
pub fn format_cell(cell: &Cell) -> DisplayValue {
    if cell.is_blank() {
        return DisplayValue::plain(String::new(), DisplayKind::Empty);
    }

    let original = cell.to_text();
    let value = match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Number(_) => None,
        _ => whole_number(&original),
    };

    let Some(v) = value else {
        return DisplayValue::plain(original, DisplayKind::Text);
    };

    let (text, kind, note) = if original.contains('%')
        || ((0.0..=100.0).contains(&v) && original.contains('.'))
    {
        (percent_text(v), DisplayKind::Percent, None)
    } else if v == 0.0 {
        (ZERO_GLYPH.to_string(), DisplayKind::Zero, Some(NO_ACTIVITY))
    } else if v.abs() >= 1000.0 {
        (group_thousands(v), DisplayKind::Thousands, None)
    } else if v.fract() != 0.0 {
        (format!("{:.2}", v), DisplayKind::Decimal, None)
    } else {
        (number_text(v), DisplayKind::Integer, None)
    };

    DisplayValue { text, kind, value: Some(v), note }
}

/// Format an aggregate (total, average, projection).
///
/// Unlike [`format_cell`] there is no percentage or zero-dash detection: an
/// average of `37.5` is a count, not a rate.
pub fn format_amount(value: f64) -> String {
    if value.abs() >= 1000.0 {
        group_thousands(value)
    } else if value.fract() != 0.0 {
        format!("{:.2}", value)
    } else {
        number_text(value)
    }
}

/// Signed percentage for deltas, e.g. `+12.5%`.
pub fn format_percent_delta(value: f64) -> String {
    format!("{:+.1}%", value)
}

/// Signed delta with thousands separators, e.g. `+1,200` or `-5`.
pub fn format_signed(value: f64) -> String {
    let body = format_amount(value.abs());
    if value > 0.0 {
        format!("+{}", body)
    } else if value < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

fn whole_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn percent_text(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}%", number_text(v))
    } else {
        format!("{:.1}%", v)
    }
}

/// `1234567.891` → `1,234,567.89`; integral values get no fraction.
fn group_thousands(v: f64) -> String {
    let negative = v < 0.0;
    let fixed = if v.fract() == 0.0 {
        format!("{:.0}", v.abs())
    } else {
        format!("{:.2}", v.abs())
    };
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 + 4);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(f) = frac_part {
        out.push('.');
        out.push_str(f);
    }
    out
}
