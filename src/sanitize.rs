//! Row sanitizing
//!
//! Spreadsheet exports carry rows that are not data: totals lines and header
//! rows repeated inside the body. They are recognised by the identifier value
//! alone and excluded. Rows are never modified.

use crate::classify::identifier_column;
use crate::dataset::Row;

/// Identifier values (lowercased, trimmed) that mark a non-data row.
const EXCLUDED_IDENTIFIERS: &[&str] = &["total", "provider", "provider name"];

/// Identifier substring that marks a grand-total row.
const GRAND_TOTAL: &str = "grand total";

/// Keep only data rows, in their original order.
///
/// Without an identifier column there is nothing to judge rows by and they
/// pass through unchanged.
pub fn sanitize(rows: &[Row], identifier: Option<&str>) -> Vec<Row> {
    match identifier {
        Some(column) => rows.iter().filter(|r| is_data_row(r, column)).cloned().collect(),
        None => rows.to_vec(),
    }
}

/// [`sanitize`] using the tab's own identifier column.
pub fn sanitize_tab(rows: &[Row]) -> Vec<Row> {
    sanitize(rows, identifier_column(rows))
}

/// Whether a row carries real data for `identifier`.
pub fn is_data_row(row: &Row, identifier: &str) -> bool {
    let cell = row.cell(identifier);
    if cell.is_blank() {
        return false;
    }
    let value = cell.to_text().trim().to_lowercase();
    if value.is_empty() {
        return false;
    }
    !(EXCLUDED_IDENTIFIERS.contains(&value.as_str()) || value.contains(GRAND_TOTAL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Cell;
    use proptest::prelude::*;

    fn provider(name: &str) -> Row {
        Row::new().with("Provider", name).with("1/1", 1)
    }

    fn names(rows: &[Row]) -> Vec<String> {
        rows.iter().map(|r| r.cell("Provider").to_text()).collect()
    }

    // ==========================================================================
    // EXCLUSION TESTS
    // ==========================================================================

    #[test]
    fn test_drops_totals_and_header_rows() {
        let rows = vec![
            provider("Alice"),
            provider("Total"),
            provider("PROVIDER"),
            provider("Provider Name"),
            provider("Q4 Grand Total"),
            provider("Bob"),
        ];
        assert_eq!(names(&sanitize(&rows, Some("Provider"))), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_drops_blank_identifiers() {
        let rows = vec![
            provider("Alice"),
            Row::new().with("Provider", Cell::Null).with("1/1", 5),
            Row::new().with("Provider", "").with("1/1", 5),
            Row::new().with("1/1", 5),
        ];
        assert_eq!(names(&sanitize(&rows, Some("Provider"))), vec!["Alice"]);
    }

    #[test]
    fn test_substring_total_is_kept() {
        // Only "grand total" is a substring rule; "Totally Fine Clinic" stays
        let rows = vec![provider("Totally Fine Clinic"), provider("Subtotal")];
        assert_eq!(sanitize(&rows, Some("Provider")).len(), 2);
    }

    #[test]
    fn test_no_identifier_passes_through() {
        let rows = vec![provider("Total")];
        assert_eq!(sanitize(&rows, None), rows);
    }

    #[test]
    fn test_sanitize_tab_uses_first_key() {
        let rows = vec![
            Row::new().with("Unnamed: 0", "Dr. A").with("Week of 1/1", 3),
            Row::new().with("Unnamed: 0", "Total").with("Week of 1/1", 3),
        ];
        assert_eq!(sanitize_tab(&rows).len(), 1);
    }

    #[test]
    fn test_numeric_identifier_kept() {
        let rows = vec![Row::new().with("Provider", 1234).with("1/1", 1)];
        assert_eq!(sanitize(&rows, Some("Provider")).len(), 1);
    }

    // ==========================================================================
    // PROPERTY TESTS
    // ==========================================================================

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(ids in proptest::collection::vec(
            prop_oneof![
                Just("Total".to_string()),
                Just("provider".to_string()),
                Just("".to_string()),
                Just("Grand Total 2024".to_string()),
                "[A-Za-z ]{1,12}",
            ],
            0..20,
        )) {
            let rows: Vec<Row> = ids.iter().map(|s| provider(s)).collect();
            let once = sanitize(&rows, Some("Provider"));
            let twice = sanitize(&once, Some("Provider"));
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_sanitize_preserves_order(ids in proptest::collection::vec("[A-Za-z]{1,8}", 0..20)) {
            let rows: Vec<Row> = ids.iter().map(|s| provider(s)).collect();
            let kept = names(&sanitize(&rows, Some("Provider")));
            let expected: Vec<String> = ids
                .iter()
                .filter(|s| {
                    let l = s.to_lowercase();
                    l != "total" && l != "provider"
                })
                .cloned()
                .collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
