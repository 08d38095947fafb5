//! Week-over-week aggregation
//!
//! Everything here works on sanitized rows and a [`ColumnLayout`]. The
//! current week is the last bucket column and the previous week the one
//! before it.
//!
//! # Zero vs missing
//!
//! Bucket totals substitute zero for missing cells (a blank week contributes
//! nothing to the sum). Rankings do not: a row with no value for the current
//! week is left out of the top-N entirely, while a row with an explicit `0`
//! is ranked with value 0.
//!
//! # Anomalies
//!
//! Each row is judged only against its own previous week:
//!
//! | Condition | Kind |
//! |-----------|------|
//! | current = 0, previous > 0 | `ZeroAfterNonzero` |
//! | drop strictly greater than the drop threshold (50%) | `LargeDrop` |
//! | rise strictly greater than the rise threshold (100%) | `LargeIncrease` |
//!
//! A row with either week missing is never flagged.

use super::Thresholds;
use crate::classify::ColumnLayout;
use crate::dataset::Row;
use crate::numeric::{or_zero, to_number};
use serde::Serialize;
use std::cmp::Ordering;

/// Week-over-week classification of a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnomalyKind {
    None,
    LargeDrop,
    LargeIncrease,
    ZeroAfterNonzero,
}

impl AnomalyKind {
    pub fn label(&self) -> &'static str {
        match self {
            AnomalyKind::None => "",
            AnomalyKind::LargeDrop => "Large drop",
            AnomalyKind::LargeIncrease => "Large increase",
            AnomalyKind::ZeroAfterNonzero => "Went to zero",
        }
    }

    /// CSS-friendly slug
    pub fn slug(&self) -> &'static str {
        match self {
            AnomalyKind::None => "none",
            AnomalyKind::LargeDrop => "drop",
            AnomalyKind::LargeIncrease => "increase",
            AnomalyKind::ZeroAfterNonzero => "zero",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketTotal {
    pub bucket: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked {
    pub identifier: String,
    pub value: f64,
}

/// One row's change between the previous and the current week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowDelta {
    pub identifier: String,
    pub current: Option<f64>,
    pub previous: Option<f64>,
    pub delta: f64,
    pub delta_percent: f64,
    pub anomaly: AnomalyKind,
}

/// Figures that need at least two buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub latest_bucket: String,
    pub previous_bucket: String,
    pub latest_total: f64,
    pub previous_total: f64,
    pub delta: f64,
    pub delta_percent: f64,
    /// Top rows by current value
    pub top: Vec<Ranked>,
    /// Longer top list for charts
    pub chart_top: Vec<Ranked>,
    pub gainers: Vec<RowDelta>,
    pub decliners: Vec<RowDelta>,
    /// Every row, in row order
    pub rows: Vec<RowDelta>,
}

impl Trend {
    /// Rows with an anomaly, in row order.
    pub fn anomalies(&self) -> impl Iterator<Item = &RowDelta> {
        self.rows.iter().filter(|r| r.anomaly != AnomalyKind::None)
    }

    pub fn anomaly_for(&self, identifier: &str) -> AnomalyKind {
        self.rows
            .iter()
            .find(|r| r.identifier == identifier)
            .map(|r| r.anomaly)
            .unwrap_or(AnomalyKind::None)
    }
}

/// Aggregate snapshot of one tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Per-bucket totals in column order
    pub totals: Vec<BucketTotal>,
    /// `None` with fewer than two buckets
    pub trend: Option<Trend>,
}

/// Sum of every bucket column, missing cells counted as zero.
pub fn bucket_totals(rows: &[Row], buckets: &[String]) -> Vec<BucketTotal> {
    buckets
        .iter()
        .map(|bucket| BucketTotal {
            bucket: bucket.clone(),
            total: rows.iter().map(|r| or_zero(to_number(r.cell(bucket)))).sum(),
        })
        .collect()
}

/// `(current - previous) / previous * 100`, or 0 when there is no baseline.
pub fn percent_delta(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    let pct = (current - previous) / previous * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

/// Classify one row's change against the thresholds.
///
/// Both weeks must be present; a missing week is "no data", not zero.
pub fn classify_anomaly(
    current: Option<f64>,
    previous: Option<f64>,
    thresholds: &Thresholds,
) -> AnomalyKind {
    let (Some(current), Some(previous)) = (current, previous) else {
        return AnomalyKind::None;
    };
    if previous <= 0.0 {
        return AnomalyKind::None;
    }
    if current == 0.0 {
        return AnomalyKind::ZeroAfterNonzero;
    }

    let change = (current - previous) / previous * 100.0;
    if -change > thresholds.drop_pct {
        AnomalyKind::LargeDrop
    } else if change > thresholds.rise_pct {
        AnomalyKind::LargeIncrease
    } else {
        AnomalyKind::None
    }
}

/// Rows ranked by their value in `bucket`, highest first.
///
/// Rows without a numeric value are excluded. The sort is stable, so equal
/// values keep their original order.
pub fn top_n(rows: &[Row], identifier: &str, bucket: &str, n: usize) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = rows
        .iter()
        .filter_map(|r| {
            to_number(r.cell(bucket)).map(|value| Ranked {
                identifier: r.cell(identifier).to_text(),
                value,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    ranked.truncate(n);
    ranked
}

/// Per-row deltas between two buckets, in row order.
pub fn row_deltas(
    rows: &[Row],
    identifier: &str,
    current_bucket: &str,
    previous_bucket: &str,
    thresholds: &Thresholds,
) -> Vec<RowDelta> {
    rows.iter()
        .map(|r| {
            let current = to_number(r.cell(current_bucket));
            let previous = to_number(r.cell(previous_bucket));
            let (cur, prev) = (or_zero(current), or_zero(previous));
            RowDelta {
                identifier: r.cell(identifier).to_text(),
                current,
                previous,
                delta: cur - prev,
                delta_percent: percent_delta(cur, prev),
                anomaly: classify_anomaly(current, previous, thresholds),
            }
        })
        .collect()
}

/// Biggest gainers (largest delta first) and decliners (most negative first).
pub fn movers(deltas: &[RowDelta], n: usize) -> (Vec<RowDelta>, Vec<RowDelta>) {
    let mut gainers: Vec<RowDelta> = deltas.iter().filter(|d| d.delta > 0.0).cloned().collect();
    let mut decliners: Vec<RowDelta> = deltas.iter().filter(|d| d.delta < 0.0).cloned().collect();

    gainers.sort_by(|a, b| b.delta.partial_cmp(&a.delta).unwrap_or(Ordering::Equal));
    decliners.sort_by(|a, b| a.delta.partial_cmp(&b.delta).unwrap_or(Ordering::Equal));

    gainers.truncate(n);
    decliners.truncate(n);
    (gainers, decliners)
}

/// Build the snapshot for a tab; `None` when there is no identifier column or
/// no bucket column.
pub fn snapshot(
    rows: &[Row],
    layout: &ColumnLayout,
    thresholds: &Thresholds,
    top_n_len: usize,
    chart_top_len: usize,
) -> Option<Snapshot> {
    let identifier = layout.identifier.as_deref()?;
    if layout.time_buckets.is_empty() {
        return None;
    }

    let totals = bucket_totals(rows, &layout.time_buckets);

    let trend = match (layout.latest_bucket(), layout.previous_bucket()) {
        (Some(latest), Some(previous)) => {
            let n = totals.len();
            let latest_total = totals[n - 1].total;
            let previous_total = totals[n - 2].total;
            let deltas = row_deltas(rows, identifier, latest, previous, thresholds);
            let (gainers, decliners) = movers(&deltas, top_n_len);

            Some(Trend {
                latest_bucket: latest.to_string(),
                previous_bucket: previous.to_string(),
                latest_total,
                previous_total,
                delta: latest_total - previous_total,
                delta_percent: percent_delta(latest_total, previous_total),
                top: top_n(rows, identifier, latest, top_n_len),
                chart_top: top_n(rows, identifier, latest, chart_top_len),
                gainers,
                decliners,
                rows: deltas,
            })
        }
        _ => None,
    };

    Some(Snapshot { totals, trend })
}
