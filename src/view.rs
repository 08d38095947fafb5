//! Sort, search and filter over a tab, plus the view state that drives them
//!
//! Every operation returns a new row vector; the loaded dataset is never
//! touched. [`ViewState`] is an immutable value: transitions return a new
//! state and [`ViewState::render`] derives the [`RenderModel`] that the HTML
//! dashboard and every export format consume.
//!
//! Pipeline for one render:
//!
//! ```text
//! sanitized rows → search → column filters → quick filter → analytics
//!                                                          → sort → column pruning
//! ```

use crate::analytics::{Analytics, TabAnalytics};
use crate::classify::{clean_column_name, meaningful_columns, ColumnLayout};
use crate::dataset::{Cell, Dataset, Row};
use crate::numeric::{or_zero, to_number};
use crate::sanitize::sanitize_tab;
use log::debug;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Rows kept by the top-10 quick filter.
pub const QUICK_TOP_LEN: usize = 10;

// ============================================================================
// Sort
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "\u{25b2}",
            SortDirection::Descending => "\u{25bc}",
        }
    }
}

/// Active sort column and direction. No column means source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SortState {
    pub column: Option<String>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn by(column: &str, direction: SortDirection) -> Self {
        Self { column: Some(column.to_string()), direction }
    }

    /// Clicking the same column flips direction; a new column starts ascending.
    pub fn toggle(&self, column: &str) -> Self {
        match &self.column {
            Some(current) if current == column => Self {
                column: Some(column.to_string()),
                direction: self.direction.flip(),
            },
            _ => Self::by(column, SortDirection::Ascending),
        }
    }
}

/// Sort rows by one column. Stable; null or missing cells sort last in both
/// directions. An empty string is ordinary text and sorts first ascending.
///
/// Two finite numbers compare numerically, anything else compares as
/// lowercased text. Descending reverses only the non-null comparison.
pub fn sort_rows(rows: &[Row], column: &str, direction: SortDirection) -> Vec<Row> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| compare_cells(a.cell(column), b.cell(column), direction));
    sorted
}

fn compare_cells(a: &Cell, b: &Cell, direction: SortDirection) -> Ordering {
    match (matches!(a, Cell::Null), matches!(b, Cell::Null)) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    let ord = match (to_number(a), to_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_text().to_lowercase().cmp(&b.to_text().to_lowercase()),
    };

    match direction {
        SortDirection::Ascending => ord,
        SortDirection::Descending => ord.reverse(),
    }
}

// ============================================================================
// Filters
// ============================================================================

/// Case-insensitive substring match against every cell. An empty term keeps
/// everything.
pub fn search(rows: &[Row], term: &str) -> Vec<Row> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|row| {
            row.values()
                .any(|cell| !matches!(cell, Cell::Null) && cell.to_text().to_lowercase().contains(&term))
        })
        .cloned()
        .collect()
}

/// Rows whose `column` text equals `value` exactly.
pub fn column_filter(rows: &[Row], column: &str, value: &str) -> Vec<Row> {
    rows.iter()
        .filter(|row| row.cell(column).to_text() == value)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuickFilter {
    #[default]
    All,
    /// Current week above zero
    Active,
    /// Ten highest current-week rows
    Top10,
    /// Current week above previous
    Growth,
    /// Current week below a non-zero previous week
    Declining,
}

impl QuickFilter {
    pub const ALL: [QuickFilter; 5] = [
        QuickFilter::All,
        QuickFilter::Active,
        QuickFilter::Top10,
        QuickFilter::Growth,
        QuickFilter::Declining,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuickFilter::All => "all",
            QuickFilter::Active => "active",
            QuickFilter::Top10 => "top10",
            QuickFilter::Growth => "growth",
            QuickFilter::Declining => "declining",
        }
    }
}

impl fmt::Display for QuickFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuickFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "" => Ok(QuickFilter::All),
            "active" => Ok(QuickFilter::Active),
            "top10" | "top" => Ok(QuickFilter::Top10),
            "growth" => Ok(QuickFilter::Growth),
            "declining" | "decline" => Ok(QuickFilter::Declining),
            other => Err(format!(
                "unknown quick filter '{}' (expected all, active, top10, growth or declining)",
                other
            )),
        }
    }
}

/// Apply a quick filter using the tab's latest and previous bucket columns.
///
/// When a filter needs a bucket that does not exist, the rows come back
/// unchanged.
pub fn quick_filter(
    rows: &[Row],
    kind: QuickFilter,
    latest: Option<&str>,
    previous: Option<&str>,
) -> Vec<Row> {
    match (kind, latest, previous) {
        (QuickFilter::All, _, _) => rows.to_vec(),

        (QuickFilter::Active, Some(latest), _) => rows
            .iter()
            .filter(|r| to_number(r.cell(latest)).is_some_and(|v| v > 0.0))
            .cloned()
            .collect(),

        (QuickFilter::Top10, Some(latest), _) => {
            let mut ranked: Vec<(f64, &Row)> = rows
                .iter()
                .filter_map(|r| to_number(r.cell(latest)).map(|v| (v, r)))
                .collect();
            ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
            ranked.into_iter().take(QUICK_TOP_LEN).map(|(_, r)| r.clone()).collect()
        }

        (QuickFilter::Growth, Some(latest), Some(previous)) => rows
            .iter()
            .filter(|r| or_zero(to_number(r.cell(latest))) > or_zero(to_number(r.cell(previous))))
            .cloned()
            .collect(),

        (QuickFilter::Declining, Some(latest), Some(previous)) => rows
            .iter()
            .filter(|r| {
                let cur = or_zero(to_number(r.cell(latest)));
                let prev = or_zero(to_number(r.cell(previous)));
                cur < prev && prev > 0.0
            })
            .cloned()
            .collect(),

        _ => rows.to_vec(),
    }
}

/// Rows whose identifier is one of `names`, in row order.
///
/// A comparison is only meaningful with at least two matches; callers check.
pub fn compare_rows(rows: &[Row], identifier: &str, names: &[String]) -> Vec<Row> {
    rows.iter()
        .filter(|r| {
            let id = r.cell(identifier).to_text();
            names.iter().any(|n| n.trim().eq_ignore_ascii_case(id.trim()))
        })
        .cloned()
        .collect()
}

/// Search term, per-column equality filters and one quick filter. All apply
/// together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    pub search: String,
    /// At most one value per column, in the order they were set
    pub column_filters: Vec<(String, String)>,
    pub quick: QuickFilter,
}

impl FilterState {
    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty() || !self.column_filters.is_empty() || self.quick != QuickFilter::All
    }

    /// Set or replace the filter on `column`; an empty value removes it.
    pub fn with_column(&self, column: &str, value: &str) -> Self {
        let mut next = self.clone();
        next.column_filters.retain(|(c, _)| c != column);
        if !value.is_empty() {
            next.column_filters.push((column.to_string(), value.to_string()));
        }
        next
    }

    /// Apply search, then column filters, then the quick filter.
    pub fn apply(&self, rows: &[Row], latest: Option<&str>, previous: Option<&str>) -> Vec<Row> {
        let mut out = search(rows, &self.search);
        for (column, value) in &self.column_filters {
            out = column_filter(&out, column, value);
        }
        quick_filter(&out, self.quick, latest, previous)
    }
}

// ============================================================================
// View state
// ============================================================================

/// What the user is looking at. Transitions return new values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    /// Active tab; `None` means the first tab of the dataset
    pub tab: Option<String>,
    pub sort: SortState,
    pub filter: FilterState,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch tabs. Sort and filters reset.
    pub fn select_tab(&self, tab: &str) -> Self {
        Self { tab: Some(tab.to_string()), ..Self::default() }
    }

    pub fn sort_by(&self, column: &str) -> Self {
        Self { sort: self.sort.toggle(column), ..self.clone() }
    }

    pub fn with_sort(&self, sort: SortState) -> Self {
        Self { sort, ..self.clone() }
    }

    pub fn with_search(&self, term: &str) -> Self {
        let mut next = self.clone();
        next.filter.search = term.to_string();
        next
    }

    pub fn with_column_filter(&self, column: &str, value: &str) -> Self {
        Self { filter: self.filter.with_column(column, value), ..self.clone() }
    }

    pub fn with_quick_filter(&self, quick: QuickFilter) -> Self {
        let mut next = self.clone();
        next.filter.quick = quick;
        next
    }

    /// Clear filters but keep the tab and sort.
    pub fn clear_filters(&self) -> Self {
        Self { filter: FilterState::default(), ..self.clone() }
    }

    /// Name of the tab this state resolves to in `dataset`.
    pub fn resolve_tab<'a>(&'a self, dataset: &'a Dataset) -> Option<&'a str> {
        match &self.tab {
            Some(name) => Some(name.as_str()),
            None => dataset.tab_names().next(),
        }
    }

    /// Derive the display model for the active tab.
    ///
    /// A tab that does not exist renders as an empty view.
    pub fn render(&self, dataset: &Dataset, analytics: &Analytics) -> RenderModel {
        let tab = self.resolve_tab(dataset).unwrap_or_default().to_string();
        let sanitized = sanitize_tab(dataset.rows(&tab));
        let tab_layout = analytics.classify(&sanitized);

        let filtered = self.filter.apply(
            &sanitized,
            tab_layout.latest_bucket(),
            tab_layout.previous_bucket(),
        );

        let layout = analytics.classify(&filtered);
        let tab_analytics = analytics.aggregate(&tab, &filtered, &layout);

        let rows = match &self.sort.column {
            Some(column) => sort_rows(&filtered, column, self.sort.direction),
            None => filtered,
        };

        let columns = meaningful_columns(&rows);
        let headers = columns.iter().map(|c| clean_column_name(c)).collect();

        debug!(
            "render '{}': {} of {} rows, {} columns",
            tab,
            rows.len(),
            sanitized.len(),
            columns.len()
        );

        RenderModel {
            tab,
            columns,
            headers,
            total_rows: sanitized.len(),
            rows,
            layout,
            analytics: tab_analytics,
            sort: self.sort.clone(),
            filter: self.filter.clone(),
        }
    }
}

/// Display-ready view of one tab.
#[derive(Debug, Clone, Serialize)]
pub struct RenderModel {
    pub tab: String,
    /// Column keys in display order, empty columns pruned
    pub columns: Vec<String>,
    /// Header text for each column
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    /// Rows in the tab after sanitizing, before filters
    pub total_rows: usize,
    pub layout: ColumnLayout,
    pub analytics: TabAnalytics,
    pub sort: SortState,
    pub filter: FilterState,
}

impl RenderModel {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// Cells of `row` in column order.
    pub fn cells<'a>(&'a self, row: &'a Row) -> impl Iterator<Item = &'a Cell> + 'a {
        self.columns.iter().map(move |c| row.cell(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(rows: &[Row], column: &str) -> Vec<String> {
        rows.iter().map(|r| r.cell(column).to_text()).collect()
    }

    fn weekly(name: &str, prev: impl Into<Cell>, cur: impl Into<Cell>) -> Row {
        Row::new().with("Provider", name).with("1/1", prev).with("1/8", cur)
    }

    // ==========================================================================
    // SORT TESTS
    // ==========================================================================

    #[test]
    fn test_sort_numeric_with_null_last() {
        let rows = vec![
            Row::new().with("v", 3),
            Row::new().with("v", Cell::Null),
            Row::new().with("v", 1),
            Row::new().with("v", 2),
        ];
        let asc = sort_rows(&rows, "v", SortDirection::Ascending);
        assert_eq!(ids(&asc, "v"), vec!["1", "2", "3", ""]);

        let desc = sort_rows(&rows, "v", SortDirection::Descending);
        assert_eq!(ids(&desc, "v"), vec!["3", "2", "1", ""]);
    }

    #[test]
    fn test_sort_empty_string_is_text_not_null() {
        let rows = vec![
            Row::new().with("v", "b"),
            Row::new().with("v", Cell::Null),
            Row::new().with("v", ""),
            Row::new().with("v", "a"),
        ];
        let asc = sort_rows(&rows, "v", SortDirection::Ascending);
        assert_eq!(asc[0].cell("v"), &Cell::Text(String::new()));
        assert_eq!(ids(&asc[1..3], "v"), vec!["a", "b"]);
        assert_eq!(asc[3].cell("v"), &Cell::Null);

        let desc = sort_rows(&rows, "v", SortDirection::Descending);
        assert_eq!(ids(&desc[..2], "v"), vec!["b", "a"]);
        assert_eq!(desc[2].cell("v"), &Cell::Text(String::new()));
        assert_eq!(desc[3].cell("v"), &Cell::Null);
    }

    #[test]
    fn test_sort_numeric_strings_numerically() {
        let rows = vec![Row::new().with("v", "10"), Row::new().with("v", "9"), Row::new().with("v", 100)];
        let asc = sort_rows(&rows, "v", SortDirection::Ascending);
        assert_eq!(ids(&asc, "v"), vec!["9", "10", "100"]);
    }

    #[test]
    fn test_sort_text_case_insensitive() {
        let rows = vec![
            Row::new().with("name", "bob"),
            Row::new().with("name", "Alice"),
            Row::new().with("name", "carol"),
        ];
        let asc = sort_rows(&rows, "name", SortDirection::Ascending);
        assert_eq!(ids(&asc, "name"), vec!["Alice", "bob", "carol"]);
    }

    #[test]
    fn test_sort_missing_column_keeps_order() {
        let rows = vec![Row::new().with("a", 2), Row::new().with("a", 1)];
        let sorted = sort_rows(&rows, "nope", SortDirection::Descending);
        assert_eq!(sorted, rows);
    }

    #[test]
    fn test_sort_state_toggle() {
        let s = SortState::default().toggle("A");
        assert_eq!(s, SortState::by("A", SortDirection::Ascending));
        let s = s.toggle("A");
        assert_eq!(s.direction, SortDirection::Descending);
        let s = s.toggle("B");
        assert_eq!(s, SortState::by("B", SortDirection::Ascending));
    }

    // ==========================================================================
    // FILTER TESTS
    // ==========================================================================

    #[test]
    fn test_search_case_insensitive_all_cells() {
        let rows = vec![
            Row::new().with("Provider", "Dr. Smith").with("Site", "North"),
            Row::new().with("Provider", "Dr. Jones").with("Site", "Smithfield"),
            Row::new().with("Provider", "Dr. Brown").with("Site", Cell::Null),
        ];
        assert_eq!(search(&rows, "SMITH").len(), 2);
        assert_eq!(search(&rows, "").len(), 3);
        assert_eq!(search(&rows, "   ").len(), 3);
        assert!(search(&rows, "null").is_empty());
    }

    #[test]
    fn test_search_matches_number_text() {
        let rows = vec![Row::new().with("v", 1234), Row::new().with("v", 5)];
        assert_eq!(search(&rows, "23").len(), 1);
    }

    #[test]
    fn test_column_filter_exact() {
        let rows = vec![
            Row::new().with("Site", "North"),
            Row::new().with("Site", "North East"),
            Row::new().with("Site", "north"),
        ];
        assert_eq!(column_filter(&rows, "Site", "North").len(), 1);
    }

    #[test]
    fn test_quick_filters() {
        let rows = vec![
            weekly("A", 10, 20),
            weekly("B", 30, 15),
            weekly("C", 5, 0),
            weekly("D", Cell::Null, 3),
            weekly("E", 0, Cell::Null),
        ];
        let l = Some("1/8");
        let p = Some("1/1");

        assert_eq!(ids(&quick_filter(&rows, QuickFilter::All, l, p), "Provider").len(), 5);
        assert_eq!(ids(&quick_filter(&rows, QuickFilter::Active, l, p), "Provider"), vec!["A", "B", "D"]);
        assert_eq!(ids(&quick_filter(&rows, QuickFilter::Top10, l, p), "Provider"), vec!["A", "B", "D", "C"]);
        assert_eq!(ids(&quick_filter(&rows, QuickFilter::Growth, l, p), "Provider"), vec!["A", "D"]);
        assert_eq!(ids(&quick_filter(&rows, QuickFilter::Declining, l, p), "Provider"), vec!["B", "C"]);
    }

    #[test]
    fn test_quick_filter_without_buckets_is_noop() {
        let rows = vec![weekly("A", 1, 2)];
        assert_eq!(quick_filter(&rows, QuickFilter::Growth, Some("1/8"), None), rows);
        assert_eq!(quick_filter(&rows, QuickFilter::Active, None, None), rows);
    }

    #[test]
    fn test_quick_filter_parse() {
        assert_eq!("Top10".parse::<QuickFilter>(), Ok(QuickFilter::Top10));
        assert_eq!("declining".parse::<QuickFilter>(), Ok(QuickFilter::Declining));
        assert!("sideways".parse::<QuickFilter>().is_err());
        for q in QuickFilter::ALL {
            assert_eq!(q.as_str().parse::<QuickFilter>(), Ok(q));
        }
    }

    #[test]
    fn test_compare_rows() {
        let rows = vec![weekly("Alice", 1, 2), weekly("Bob", 3, 4), weekly("Carol", 5, 6)];
        let picked = compare_rows(&rows, "Provider", &["carol".into(), "Alice".into()]);
        assert_eq!(ids(&picked, "Provider"), vec!["Alice", "Carol"]);
    }

    // ==========================================================================
    // VIEW STATE TESTS
    // ==========================================================================

    fn dataset() -> Dataset {
        Dataset::from_json_str(
            r#"{
                "Doxy Visits": [
                    {"Provider": "Alice", "1/1": 10, "1/8": 20, "Notes": null},
                    {"Provider": "Bob", "1/1": 30, "1/8": 15, "Notes": null},
                    {"Provider": "Total", "1/1": 40, "1/8": 35, "Notes": null}
                ],
                "Other": [{"Name": "x"}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_render_defaults_to_first_tab() {
        let model = ViewState::new().render(&dataset(), &Analytics::new());
        assert_eq!(model.tab, "Doxy Visits");
        assert_eq!(model.total_rows, 2);
        // Notes column is empty everywhere and pruned
        assert_eq!(model.columns, vec!["Provider", "1/1", "1/8"]);
        assert_eq!(model.analytics.trend().unwrap().latest_total, 35.0);
    }

    #[test]
    fn test_render_filters_before_analytics_and_sort() {
        let view = ViewState::new()
            .select_tab("Doxy Visits")
            .with_quick_filter(QuickFilter::Growth)
            .sort_by("1/8");
        let model = view.render(&dataset(), &Analytics::new());
        assert_eq!(ids(&model.rows, "Provider"), vec!["Alice"]);
        assert_eq!(model.analytics.row_count, 1);
        assert_eq!(model.analytics.trend().unwrap().latest_total, 20.0);
        assert_eq!(model.total_rows, 2);
    }

    #[test]
    fn test_render_sorted_descending() {
        let view = ViewState::new().sort_by("1/1").sort_by("1/1");
        let model = view.render(&dataset(), &Analytics::new());
        assert_eq!(ids(&model.rows, "Provider"), vec!["Bob", "Alice"]);
    }

    #[test]
    fn test_select_tab_resets_sort_and_filter() {
        let view = ViewState::new().with_search("bob").sort_by("1/8").select_tab("Other");
        assert_eq!(view.sort, SortState::default());
        assert!(!view.filter.is_active());
    }

    #[test]
    fn test_render_missing_tab_is_empty() {
        let model = ViewState::new().select_tab("Nope").render(&dataset(), &Analytics::new());
        assert!(model.is_empty());
        assert!(model.analytics.is_neutral());
    }

    #[test]
    fn test_column_filter_replaces_and_removes() {
        let f = FilterState::default().with_column("Site", "North").with_column("Site", "South");
        assert_eq!(f.column_filters, vec![("Site".to_string(), "South".to_string())]);
        assert!(f.with_column("Site", "").column_filters.is_empty());
    }

    // ==========================================================================
    // PROPERTY TESTS
    // ==========================================================================

    fn cell_strategy() -> impl Strategy<Value = Cell> {
        prop_oneof![
            Just(Cell::Null),
            Just(Cell::Text(String::new())),
            (-50i32..50).prop_map(|n| Cell::Number(n as f64)),
            "[a-e]{1,3}".prop_map(Cell::Text),
        ]
    }

    proptest! {
        #[test]
        fn prop_sort_keeps_nulls_last(cells in proptest::collection::vec(cell_strategy(), 0..30), desc in any::<bool>()) {
            let rows: Vec<Row> = cells.into_iter().map(|c| Row::new().with("v", c)).collect();
            let dir = if desc { SortDirection::Descending } else { SortDirection::Ascending };
            let sorted = sort_rows(&rows, "v", dir);

            prop_assert_eq!(sorted.len(), rows.len());
            let first_null = sorted.iter().position(|r| matches!(r.cell("v"), Cell::Null)).unwrap_or(sorted.len());
            prop_assert!(sorted[first_null..].iter().all(|r| matches!(r.cell("v"), Cell::Null)));
        }

        #[test]
        fn prop_sort_is_stable(values in proptest::collection::vec(0i32..4, 0..30)) {
            let rows: Vec<Row> = values
                .iter()
                .enumerate()
                .map(|(i, v)| Row::new().with("v", *v).with("seq", i as i64))
                .collect();
            let sorted = sort_rows(&rows, "v", SortDirection::Ascending);
            for pair in sorted.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                if a.cell("v") == b.cell("v") {
                    prop_assert!(to_number(a.cell("seq")) < to_number(b.cell("seq")));
                }
            }
        }

        #[test]
        fn prop_search_never_grows(terms in "[a-z]{0,3}", names in proptest::collection::vec("[a-z]{1,6}", 0..15)) {
            let rows: Vec<Row> = names.iter().map(|n| Row::new().with("Provider", n.as_str())).collect();
            let found = search(&rows, &terms);
            prop_assert!(found.len() <= rows.len());
        }
    }
}
