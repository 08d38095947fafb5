//! Per-tab analytics with name-based dispatch
//!
//! Different tabs want different summaries. Which summary a tab gets is
//! decided by an ordered rule table matched against the tab name (first
//! match wins), with a generic fallback that only counts rows and columns:
//!
//! | Rule | Strategy |
//! |------|----------|
//! | name is `Doxy Visits` | weekly activity |
//! | name contains `over 20 minutes` | weekly activity |
//! | name contains `doxy` | weekly activity |
//! | name contains `oncehub` | weekly activity |
//! | name contains `monthly` | rollup |
//! | name contains `summary` | rollup |
//! | anything else | generic |
//!
//! Matching is case-insensitive. A tab that lacks the columns a strategy
//! needs gets a neutral result (counts only), never an error.
//!
//! # Example
//!
//! ```ignore
//! use weekboard::{Analytics, Dataset};
//!
//! let dataset = Dataset::load("data.json")?;
//! let analytics = Analytics::new().with_thresholds(50.0, 100.0).with_top_n(5);
//!
//! for result in analytics.analyze_dataset(&dataset) {
//!     println!("{}: {:?}", result.tab, result.strategy);
//! }
//! ```

pub mod rollup;
pub mod weekly;

pub use rollup::{rollup, Rollup, TrendDirection};
pub use weekly::{AnomalyKind, BucketTotal, Ranked, RowDelta, Snapshot, Trend};

use crate::classify::{ColumnClassifier, ColumnLayout, PatternClassifier};
use crate::dataset::{Dataset, Row, Tab};
use crate::sanitize::sanitize_tab;
use log::debug;
use rayon::prelude::*;
use serde::Serialize;

/// Default length of ranked lists on cards.
pub const DEFAULT_TOP_N: usize = 5;

/// Default length of ranked lists in charts.
pub const DEFAULT_CHART_TOP_N: usize = 10;

/// Anomaly thresholds in percent. Both comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    /// Drop larger than this flags `LargeDrop`
    pub drop_pct: f64,
    /// Rise larger than this flags `LargeIncrease`
    pub rise_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { drop_pct: 50.0, rise_pct: 100.0 }
    }
}

/// What kind of summary a tab gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    /// Bucket totals, week-over-week deltas, rankings, movers, anomalies and rollup
    WeeklyActivity,
    /// Bucket totals and rollup only
    Rollup,
    /// Row, column and bucket counts
    Generic,
}

/// Tab-name predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabMatcher {
    Exact(String),
    Contains(String),
}

impl TabMatcher {
    pub fn matches(&self, tab: &str) -> bool {
        let tab = tab.to_lowercase();
        match self {
            TabMatcher::Exact(name) => tab == name.to_lowercase(),
            TabMatcher::Contains(part) => tab.contains(&part.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRule {
    pub matcher: TabMatcher,
    pub strategy: Strategy,
}

impl DispatchRule {
    pub fn exact(name: &str, strategy: Strategy) -> Self {
        Self { matcher: TabMatcher::Exact(name.to_string()), strategy }
    }

    pub fn contains(part: &str, strategy: Strategy) -> Self {
        Self { matcher: TabMatcher::Contains(part.to_string()), strategy }
    }
}

/// The built-in rule table.
pub fn default_rules() -> Vec<DispatchRule> {
    vec![
        DispatchRule::exact("Doxy Visits", Strategy::WeeklyActivity),
        DispatchRule::contains("over 20 minutes", Strategy::WeeklyActivity),
        DispatchRule::contains("doxy", Strategy::WeeklyActivity),
        DispatchRule::contains("oncehub", Strategy::WeeklyActivity),
        DispatchRule::contains("monthly", Strategy::Rollup),
        DispatchRule::contains("summary", Strategy::Rollup),
    ]
}

/// Analytics for one tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabAnalytics {
    pub tab: String,
    pub strategy: Strategy,
    pub row_count: usize,
    pub column_count: usize,
    pub bucket_count: usize,
    pub snapshot: Option<Snapshot>,
    pub rollup: Option<Rollup>,
}

impl TabAnalytics {
    /// Nothing beyond counts: the dashboard hides the analytics section.
    pub fn is_neutral(&self) -> bool {
        self.snapshot.is_none() && self.rollup.is_none()
    }

    pub fn trend(&self) -> Option<&Trend> {
        self.snapshot.as_ref().and_then(|s| s.trend.as_ref())
    }
}

/// A tab after sanitizing, classification and aggregation.
#[derive(Debug, Clone)]
pub struct AnalyzedTab {
    pub name: String,
    pub rows: Vec<Row>,
    pub layout: ColumnLayout,
    pub analytics: TabAnalytics,
}

/// Analytics engine: dispatch table, classifier and tunables.
pub struct Analytics {
    rules: Vec<DispatchRule>,
    classifier: Box<dyn ColumnClassifier + Send + Sync>,
    pub thresholds: Thresholds,
    pub top_n: usize,
    pub chart_top_n: usize,
}

impl Default for Analytics {
    fn default() -> Self {
        Self::new()
    }
}

impl Analytics {
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
            classifier: Box::new(PatternClassifier),
            thresholds: Thresholds::default(),
            top_n: DEFAULT_TOP_N,
            chart_top_n: DEFAULT_CHART_TOP_N,
        }
    }

    /// Replace the dispatch table. The generic fallback always remains.
    pub fn with_rules(mut self, rules: Vec<DispatchRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_classifier<C: ColumnClassifier + Send + Sync + 'static>(mut self, classifier: C) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn with_thresholds(mut self, drop_pct: f64, rise_pct: f64) -> Self {
        self.thresholds = Thresholds { drop_pct, rise_pct };
        self
    }

    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    pub fn with_chart_top_n(mut self, n: usize) -> Self {
        self.chart_top_n = n;
        self
    }

    pub fn classifier(&self) -> &dyn ColumnClassifier {
        self.classifier.as_ref()
    }

    /// Classify rows with the configured classifier.
    pub fn classify(&self, rows: &[Row]) -> ColumnLayout {
        self.classifier.classify(rows)
    }

    /// First matching rule's strategy, or `Generic`.
    pub fn strategy_for(&self, tab: &str) -> Strategy {
        self.rules
            .iter()
            .find(|r| r.matcher.matches(tab))
            .map(|r| r.strategy)
            .unwrap_or(Strategy::Generic)
    }

    /// Aggregate already-sanitized rows.
    pub fn aggregate(&self, tab: &str, rows: &[Row], layout: &ColumnLayout) -> TabAnalytics {
        let strategy = self.strategy_for(tab);
        debug!("tab '{}' -> {:?} ({} rows, {} buckets)", tab, strategy, rows.len(), layout.time_buckets.len());

        let mut result = TabAnalytics {
            tab: tab.to_string(),
            strategy,
            row_count: rows.len(),
            column_count: layout.column_count(),
            bucket_count: layout.time_buckets.len(),
            snapshot: None,
            rollup: None,
        };

        match strategy {
            Strategy::WeeklyActivity => {
                let snapshot = weekly::snapshot(rows, layout, &self.thresholds, self.top_n, self.chart_top_n);
                result.rollup = snapshot.as_ref().and_then(|s| rollup(&s.totals));
                if snapshot.as_ref().is_some_and(|s| s.trend.is_none()) {
                    debug!("tab '{}' has fewer than two buckets; skipping trend", tab);
                }
                result.snapshot = snapshot;
            }
            Strategy::Rollup => {
                if layout.identifier.is_some() {
                    let totals = weekly::bucket_totals(rows, &layout.time_buckets);
                    result.rollup = rollup(&totals);
                    if result.rollup.is_some() {
                        result.snapshot = Some(Snapshot { totals, trend: None });
                    }
                }
            }
            Strategy::Generic => {}
        }

        result
    }

    /// Sanitize, classify and aggregate a whole tab.
    pub fn analyze_tab(&self, tab: &Tab) -> AnalyzedTab {
        let rows = sanitize_tab(&tab.rows);
        let layout = self.classify(&rows);
        let analytics = self.aggregate(&tab.name, &rows, &layout);
        AnalyzedTab { name: tab.name.clone(), rows, layout, analytics }
    }

    /// Analyze every tab in parallel; results keep tab order.
    pub fn analyze_dataset(&self, dataset: &Dataset) -> Vec<AnalyzedTab> {
        dataset.tabs().par_iter().map(|tab| self.analyze_tab(tab)).collect()
    }
}
