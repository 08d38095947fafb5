//! Excel workbook export
//!
//! The first sheet is the current tab exactly as displayed (filtered, sorted,
//! pruned), with number formats chosen to reproduce the on-screen text. Every
//! other non-empty tab follows as raw source rows.

use super::{Dashboard, Result};
use crate::classify::union_columns;
use crate::dataset::{Cell, Dataset};
use crate::numeric::{format_cell, DisplayKind, DisplayValue};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::Path;

/// Excel's sheet name limit.
pub const MAX_SHEET_NAME: usize = 31;

pub fn write(path: &Path, dashboard: &Dashboard, dataset: &Dataset) -> Result<()> {
    let model = dashboard.exportable()?;
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let mut used: Vec<String> = Vec::new();

    let name = unique_sheet_name(&model.tab, &mut used);
    let worksheet = workbook.add_worksheet().set_name(&name)?;
    for (col, text) in model.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, text, &header)?;
    }
    for (r, row) in model.rows.iter().enumerate() {
        for (col, cell) in model.cells(row).enumerate() {
            write_display(worksheet, r as u32 + 1, col as u16, &format_cell(cell))?;
        }
    }
    worksheet.set_freeze_panes(1, 0)?;

    for tab in dataset.tabs() {
        if tab.name == model.tab || tab.rows.is_empty() {
            continue;
        }
        let name = unique_sheet_name(&tab.name, &mut used);
        let worksheet = workbook.add_worksheet().set_name(&name)?;
        let columns = union_columns(&tab.rows);

        for (col, column) in columns.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, column, &header)?;
        }
        for (r, row) in tab.rows.iter().enumerate() {
            for (col, column) in columns.iter().enumerate() {
                let (r, c) = (r as u32 + 1, col as u16);
                match row.cell(column) {
                    Cell::Null => {}
                    Cell::Number(n) if n.is_finite() => {
                        worksheet.write_number(r, c, *n)?;
                    }
                    other => {
                        worksheet.write_string(r, c, other.to_text())?;
                    }
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn write_display(worksheet: &mut Worksheet, row: u32, col: u16, display: &DisplayValue) -> Result<()> {
    match (display.kind, display.value) {
        (DisplayKind::Empty, _) => {}
        (kind, Some(value)) if kind.is_numeric() => {
            let format = Format::new().set_num_format(num_format(kind, value));
            worksheet.write_number_with_format(row, col, value, &format)?;
        }
        _ => {
            worksheet.write_string(row, col, &display.text)?;
        }
    }
    Ok(())
}

/// Excel number format that renders `value` the way the dashboard does.
pub fn num_format(kind: DisplayKind, value: f64) -> &'static str {
    let integral = value.fract() == 0.0;
    match kind {
        DisplayKind::Percent if integral => "0\"%\"",
        DisplayKind::Percent => "0.0\"%\"",
        DisplayKind::Zero => "0;-0;\"\u{2014}\"",
        DisplayKind::Thousands if integral => "#,##0",
        DisplayKind::Thousands => "#,##0.00",
        DisplayKind::Decimal => "0.00",
        _ => "0",
    }
}

/// Strip characters Excel rejects, truncate, and de-duplicate.
pub fn unique_sheet_name(name: &str, used: &mut Vec<String>) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim();
    let base: String = if cleaned.is_empty() { "Sheet".to_string() } else { cleaned.to_string() };

    let mut candidate: String = base.chars().take(MAX_SHEET_NAME).collect();
    let mut n = 2;
    while used.iter().any(|u| u.eq_ignore_ascii_case(&candidate)) {
        let suffix = format!(" ({})", n);
        let keep = MAX_SHEET_NAME - suffix.chars().count();
        candidate = base.chars().take(keep).collect::<String>() + &suffix;
        n += 1;
    }
    used.push(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_names_truncated_and_cleaned() {
        let mut used = Vec::new();
        let long = "Doxy - Over 20 minutes by provider and week";
        let name = unique_sheet_name(long, &mut used);
        assert_eq!(name.chars().count(), 31);
        assert!(long.starts_with(&name));

        assert_eq!(unique_sheet_name("Q1/Q2 [draft]", &mut used), "Q1_Q2 _draft_");
        assert_eq!(unique_sheet_name("''", &mut used), "Sheet");
    }

    #[test]
    fn test_sheet_names_deduplicated() {
        let mut used = Vec::new();
        let a = unique_sheet_name("Doxy - Over 20 minutes by provider A", &mut used);
        let b = unique_sheet_name("Doxy - Over 20 minutes by provider B", &mut used);
        assert_ne!(a, b);
        assert!(b.ends_with(" (2)"));
        assert_eq!(b.chars().count(), 31);
    }

    #[test]
    fn test_num_format_matches_display_kind() {
        assert_eq!(num_format(DisplayKind::Percent, 45.0), "0\"%\"");
        assert_eq!(num_format(DisplayKind::Percent, 12.5), "0.0\"%\"");
        assert_eq!(num_format(DisplayKind::Thousands, 1234.0), "#,##0");
        assert_eq!(num_format(DisplayKind::Thousands, 1234.5), "#,##0.00");
        assert_eq!(num_format(DisplayKind::Decimal, 3.14159), "0.00");
        assert_eq!(num_format(DisplayKind::Integer, 7.0), "0");
    }

    #[test]
    fn test_write_produces_workbook() {
        use crate::analytics::Analytics;
        use crate::store::Settings;
        use crate::view::ViewState;

        let ds = Dataset::from_json_str(
            r#"{
                "Doxy Visits": [{"Provider": "Alice", "1/1": 10, "1/8": "45%"}],
                "Staff": [{"Name": "Dee", "Note": null}],
                "Empty": []
            }"#,
        )
        .unwrap();
        let d = Dashboard::build(&ds, &ViewState::new(), &Analytics::new(), Settings::default(), "x");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        write(&path, &d, &ds).unwrap();

        // xlsx files are zip archives
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
