//! Period rollups: total, weekly average, half-over-half trend, projection.
//!
//! The trend is a plain split at `floor(n / 2)` comparing the average of the
//! earlier buckets against the later ones. The projection assumes a
//! four-week month.

use super::weekly::BucketTotal;
use serde::Serialize;

/// Weeks per projected month.
pub const WEEKS_PER_MONTH: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    pub fn arrow(&self) -> &'static str {
        match self {
            TrendDirection::Up => "\u{2191}",
            TrendDirection::Down => "\u{2193}",
            TrendDirection::Flat => "\u{2192}",
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Up => write!(f, "Up"),
            TrendDirection::Down => write!(f, "Down"),
            TrendDirection::Flat => write!(f, "Flat"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rollup {
    pub bucket_count: usize,
    pub total: f64,
    pub average: f64,
    pub first_half_average: f64,
    pub second_half_average: f64,
    pub trend: TrendDirection,
    pub projection: f64,
}

/// Roll up bucket totals; `None` when there are no buckets.
pub fn rollup(totals: &[BucketTotal]) -> Option<Rollup> {
    let n = totals.len();
    if n == 0 {
        return None;
    }

    let total: f64 = totals.iter().map(|t| t.total).sum();
    let average = total / n as f64;

    let (first, second) = totals.split_at(n / 2);
    let first_half_average = mean(first);
    let second_half_average = mean(second);

    let trend = if first.is_empty() || second_half_average == first_half_average {
        TrendDirection::Flat
    } else if second_half_average > first_half_average {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    };

    Some(Rollup {
        bucket_count: n,
        total,
        average,
        first_half_average,
        second_half_average,
        trend,
        projection: average * WEEKS_PER_MONTH,
    })
}

fn mean(totals: &[BucketTotal]) -> f64 {
    if totals.is_empty() {
        0.0
    } else {
        totals.iter().map(|t| t.total).sum::<f64>() / totals.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(values: &[f64]) -> Vec<BucketTotal> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| BucketTotal { bucket: format!("{}/1", i + 1), total: *v })
            .collect()
    }

    #[test]
    fn test_rollup_basic() {
        let r = rollup(&totals(&[10.0, 20.0, 30.0, 40.0])).unwrap();
        assert_eq!(r.total, 100.0);
        assert_eq!(r.average, 25.0);
        assert_eq!(r.first_half_average, 15.0);
        assert_eq!(r.second_half_average, 35.0);
        assert_eq!(r.trend, TrendDirection::Up);
        assert_eq!(r.projection, 100.0);
    }

    #[test]
    fn test_odd_split_puts_extra_bucket_in_second_half() {
        // floor(5/2) = 2: [50, 40] vs [30, 20, 10]
        let r = rollup(&totals(&[50.0, 40.0, 30.0, 20.0, 10.0])).unwrap();
        assert_eq!(r.first_half_average, 45.0);
        assert_eq!(r.second_half_average, 20.0);
        assert_eq!(r.trend, TrendDirection::Down);
    }

    #[test]
    fn test_single_bucket_is_flat() {
        let r = rollup(&totals(&[7.0])).unwrap();
        assert_eq!(r.trend, TrendDirection::Flat);
        assert_eq!(r.projection, 28.0);
    }

    #[test]
    fn test_no_buckets() {
        assert!(rollup(&[]).is_none());
    }
}
