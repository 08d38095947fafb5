//! Column classification
//!
//! Tabs have no schema. Column roles are inferred from names:
//!
//! - **Identifier**: the first column (usually the provider name, sometimes a
//!   pandas artefact such as `Unnamed: 0`)
//! - **Time bucket**: a reporting week, named like `Week of 12/6` or `12/6`
//! - **Other**: everything else
//!
//! Bucket order is the order the columns appear in. It is never re-sorted by
//! date, so the "latest" week is simply the last bucket column.

use crate::dataset::Row;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static WEEK_OF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)week\s+of\s+\d+/\d+").expect("week-of pattern"));

static BARE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+/\d+(/\d{2,4})?\s*$").expect("bare date pattern"));

static ISO_DATETIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("iso datetime pattern"));

/// Role assignment for one tab.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnLayout {
    pub identifier: Option<String>,
    pub time_buckets: Vec<String>,
    pub others: Vec<String>,
}

impl ColumnLayout {
    /// Last bucket in column order.
    pub fn latest_bucket(&self) -> Option<&str> {
        self.time_buckets.last().map(String::as_str)
    }

    /// Bucket before the latest one.
    pub fn previous_bucket(&self) -> Option<&str> {
        let n = self.time_buckets.len();
        if n >= 2 {
            Some(self.time_buckets[n - 2].as_str())
        } else {
            None
        }
    }

    /// Week-over-week figures need at least two buckets.
    pub fn has_trend(&self) -> bool {
        self.time_buckets.len() >= 2
    }

    /// Number of columns that survived the emptiness filter.
    pub fn column_count(&self) -> usize {
        self.identifier.iter().count() + self.time_buckets.len() + self.others.len()
    }
}

/// Assigns roles to the columns of a tab.
pub trait ColumnClassifier {
    /// Is `name` a reporting-period column?
    fn is_time_bucket(&self, name: &str) -> bool;

    fn classify(&self, rows: &[Row]) -> ColumnLayout {
        let columns = union_columns(rows);
        let mut layout = ColumnLayout::default();

        for (idx, column) in columns.into_iter().enumerate() {
            if is_empty_column(rows, &column) {
                continue;
            }
            if idx == 0 {
                layout.identifier = Some(column);
            } else if self.is_time_bucket(&column) {
                layout.time_buckets.push(column);
            } else {
                layout.others.push(column);
            }
        }

        layout
    }
}

/// Name-pattern classifier used by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternClassifier;

impl ColumnClassifier for PatternClassifier {
    fn is_time_bucket(&self, name: &str) -> bool {
        if name.to_lowercase().contains("unnamed") {
            return false;
        }
        WEEK_OF.is_match(name) || BARE_DATE.is_match(name)
    }
}

/// Classify with the default [`PatternClassifier`].
pub fn classify(rows: &[Row]) -> ColumnLayout {
    PatternClassifier.classify(rows)
}

/// Union of all rows' keys in first-seen order.
pub fn union_columns(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.to_string());
            }
        }
    }
    columns
}

/// Columns with at least one non-blank value, in union order.
pub fn meaningful_columns(rows: &[Row]) -> Vec<String> {
    union_columns(rows)
        .into_iter()
        .filter(|c| !is_empty_column(rows, c))
        .collect()
}

/// Identifier column as seen before sanitizing: the first key of the first row.
pub fn identifier_column(rows: &[Row]) -> Option<&str> {
    rows.first().and_then(|r| r.keys().next())
}

fn is_empty_column(rows: &[Row], column: &str) -> bool {
    rows.iter().all(|r| r.cell(column).is_blank())
}

/// Header text for display and export.
///
/// `Unnamed: N` headers render blank; pandas datetime headers such as
/// `2025-12-13 00:00:00` render as the date alone.
pub fn clean_column_name(name: &str) -> String {
    if name.starts_with("Unnamed:") {
        return String::new();
    }
    if ISO_DATETIME.is_match(name) {
        return name.split(' ').next().unwrap_or(name).to_string();
    }
    name.to_string()
}
