//! End-to-end checks over a realistic multi-tab dataset

use std::fs;
use weekboard::analytics::AnomalyKind;
use weekboard::numeric::format_cell;
use weekboard::report::{self, html, Dashboard};
use weekboard::{Analytics, Dataset, QuickFilter, Settings, SettingsStore, Strategy, Theme, ViewState};

const DATASET: &str = r#"{
    "Doxy Visits": [
        {"Provider": "Alice", "Unnamed: 1": null, "Week of 1/1": 10, "Week of 1/8": 20},
        {"Provider": "Bob", "Unnamed: 1": null, "Week of 1/1": 30, "Week of 1/8": 15},
        {"Provider": "Cara", "Unnamed: 1": null, "Week of 1/1": 1200, "Week of 1/8": 0},
        {"Provider": "Total", "Unnamed: 1": null, "Week of 1/1": 1240, "Week of 1/8": 35}
    ],
    "Monthly Summary": [
        {"Clinic": "North", "1/1": 100, "1/8": 80, "1/15": 60, "1/22": 40}
    ],
    "Staff": [
        {"Name": "Dee", "Role": "RN"},
        {"Name": "Eli", "Role": "MD"}
    ]
}"#;

fn dataset() -> Dataset {
    Dataset::from_json_str(DATASET).unwrap()
}

// ============================================================================
// ANALYTICS
// ============================================================================

#[test]
fn test_weekly_tab_end_to_end() {
    let model = ViewState::new().render(&dataset(), &Analytics::new());

    assert_eq!(model.tab, "Doxy Visits");
    assert_eq!(model.total_rows, 3);
    assert!(!model.columns.iter().any(|c| c.starts_with("Unnamed")));

    let trend = model.analytics.trend().unwrap();
    assert_eq!(trend.previous_total, 1240.0);
    assert_eq!(trend.latest_total, 35.0);
    assert_eq!(trend.top[0].identifier, "Alice");
    assert_eq!(trend.anomaly_for("Cara"), AnomalyKind::ZeroAfterNonzero);
    // exactly 50% is not past the threshold
    assert_eq!(trend.anomaly_for("Bob"), AnomalyKind::None);
}

#[test]
fn test_rollup_tab() {
    let model = ViewState::new().select_tab("Monthly Summary").render(&dataset(), &Analytics::new());
    assert_eq!(model.analytics.strategy, Strategy::Rollup);

    let rollup = model.analytics.rollup.as_ref().unwrap();
    assert_eq!(rollup.total, 280.0);
    assert_eq!(rollup.average, 70.0);
    assert_eq!(rollup.projection, 280.0);
}

#[test]
fn test_lower_threshold_flags_bob() {
    let analytics = Analytics::new().with_thresholds(40.0, 100.0);
    let model = ViewState::new().render(&dataset(), &analytics);
    assert_eq!(model.analytics.trend().unwrap().anomaly_for("Bob"), AnomalyKind::LargeDrop);
}

// ============================================================================
// VIEW
// ============================================================================

#[test]
fn test_search_narrows_rows_and_analytics() {
    let model = ViewState::new().with_search("ali").render(&dataset(), &Analytics::new());
    assert_eq!(model.rows.len(), 1);
    assert_eq!(model.total_rows, 3);
    assert_eq!(model.analytics.trend().unwrap().latest_total, 20.0);
}

#[test]
fn test_quick_filters() {
    let ds = dataset();
    let a = Analytics::new();

    let growth = ViewState::new().with_quick_filter(QuickFilter::Growth).render(&ds, &a);
    let names: Vec<String> = growth.rows.iter().map(|r| r.cell("Provider").to_text()).collect();
    assert_eq!(names, ["Alice"]);

    let declining = ViewState::new().with_quick_filter(QuickFilter::Declining).render(&ds, &a);
    assert_eq!(declining.rows.len(), 2);
}

#[test]
fn test_sort_descending_by_latest_week() {
    let model = ViewState::new()
        .sort_by("Week of 1/8")
        .sort_by("Week of 1/8")
        .render(&dataset(), &Analytics::new());
    let names: Vec<String> = model.rows.iter().map(|r| r.cell("Provider").to_text()).collect();
    assert_eq!(names, ["Alice", "Bob", "Cara"]);
}

// ============================================================================
// EXPORT CONSISTENCY
// ============================================================================

#[test]
fn test_csv_cells_match_dashboard_cells() {
    let ds = dataset();
    let dashboard = Dashboard::build(&ds, &ViewState::new(), &Analytics::new(), Settings::default(), "test");
    let model = dashboard.current().unwrap();

    let mut page = Vec::new();
    html::write_dashboard(&mut page, &dashboard).unwrap();
    let page = String::from_utf8(page).unwrap();

    let mut csv_out = Vec::new();
    report::csv::write(&mut csv_out, model).unwrap();
    let mut reader = csv::Reader::from_reader(csv_out.as_slice());

    for (record, row) in reader.records().zip(&model.rows) {
        let record = record.unwrap();
        for (field, cell) in record.iter().zip(model.cells(row)) {
            assert_eq!(field, format_cell(cell).text);
            if !field.is_empty() {
                assert!(page.contains(&html::escape_html(field)), "missing {}", field);
            }
        }
    }

    let tsv = report::csv::to_tsv(model).unwrap();
    assert!(tsv.contains("Cara\t1,200\t\u{2014}"));
}

#[test]
fn test_generate_every_format() {
    let ds = dataset();
    let dashboard = Dashboard::build(&ds, &ViewState::new(), &Analytics::new(), Settings::default(), "test");
    let dir = tempfile::tempdir().unwrap();

    for name in ["out.html", "out.csv", "out.tsv", "out.json", "out.xlsx"] {
        let path = dir.path().join(name);
        report::generate(&path, &dashboard, &ds).unwrap();
        assert!(fs::metadata(&path).unwrap().len() > 0, "{} is empty", name);
    }
}

#[test]
fn test_empty_view_exports_nothing() {
    let ds = dataset();
    let view = ViewState::new().with_search("nobody");
    let dashboard = Dashboard::build(&ds, &view, &Analytics::new(), Settings::default(), "test");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");

    let err = report::generate(&path, &dashboard, &ds).unwrap_err();
    assert_eq!(err.to_string(), "no data available to export");
}

// ============================================================================
// PREFERENCES
// ============================================================================

#[test]
fn test_preferences_shape_the_dashboard() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::open_at(dir.path().join("prefs.db")).unwrap();
    store.update(|s| s.theme = Theme::Dark).unwrap();
    store.toggle_favorite("Staff").unwrap();
    store.save_preset("dee", "Staff", "dee").unwrap();

    let settings = store.load().unwrap();
    let view = settings.filter_presets["dee"].view();
    let ds = dataset();
    let dashboard = Dashboard::build(&ds, &view, &Analytics::new(), settings, "test");

    assert_eq!(dashboard.current().unwrap().tab, "Staff");
    assert_eq!(dashboard.current().unwrap().rows.len(), 1);

    let mut page = Vec::new();
    html::write_dashboard(&mut page, &dashboard).unwrap();
    let page = String::from_utf8(page).unwrap();
    assert!(page.contains("dark-mode"));
    assert!(page.contains(r#"<span class="favorite-star">&#11088;</span>Staff"#));
}
