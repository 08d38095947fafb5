//! CSV and TSV export of the current view
//!
//! CSV quotes every field (embedded quotes doubled). TSV is the plain
//! clipboard-style text: tab-separated, no quoting.

use super::{display_table, Result};
use crate::view::RenderModel;
use std::io::Write;

pub fn write<W: Write>(writer: &mut W, model: &RenderModel) -> Result<()> {
    let (headers, rows) = display_table(model);
    let wtr = ::csv::WriterBuilder::new()
        .quote_style(::csv::QuoteStyle::Always)
        .from_writer(writer);
    write_records(wtr, &headers, &rows)
}

pub fn write_tsv<W: Write>(writer: &mut W, model: &RenderModel) -> Result<()> {
    let (headers, rows) = display_table(model);
    let rows: Vec<Vec<String>> = rows.iter().map(|r| tsv_line(r)).collect();

    let wtr = ::csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(::csv::QuoteStyle::Never)
        .from_writer(writer);
    write_records(wtr, &tsv_line(&headers), &rows)
}

/// Tab-separated text of the view, one line per row.
pub fn to_tsv(model: &RenderModel) -> Result<String> {
    let mut buf = Vec::new();
    write_tsv(&mut buf, model)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_records<W: Write>(mut wtr: ::csv::Writer<W>, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    wtr.write_record(headers)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn tsv_line(fields: &[String]) -> Vec<String> {
    fields.iter().map(|f| tsv_field(f)).collect()
}

/// Tabs and line breaks inside a value would break the layout.
fn tsv_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}
