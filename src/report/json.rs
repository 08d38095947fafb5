//! JSON export of the current view

use super::{display_table, Dashboard, Result};
use crate::analytics::TabAnalytics;
use crate::dataset::Row;
use crate::view::{FilterState, SortState};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: &'a str,
    source: &'a str,
    tab: &'a str,
    total_rows: usize,
    columns: &'a [String],
    headers: &'a [String],
    /// Formatted cell text, as displayed
    display: Vec<Vec<String>>,
    rows: &'a [Row],
    analytics: &'a TabAnalytics,
    sort: &'a SortState,
    filter: &'a FilterState,
}

pub fn write<W: Write>(writer: &mut W, dashboard: &Dashboard) -> Result<()> {
    let model = dashboard.exportable()?;
    let (_, display) = display_table(model);

    let report = JsonReport {
        generated_at: &dashboard.generated_at,
        source: &dashboard.source,
        tab: &model.tab,
        total_rows: model.total_rows,
        columns: &model.columns,
        headers: &model.headers,
        display,
        rows: &model.rows,
        analytics: &model.analytics,
        sort: &model.sort,
        filter: &model.filter,
    };

    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;
    Ok(())
}
