//! Dashboard rendering and export
//!
//! Every output format consumes the same [`Dashboard`]: one [`RenderModel`]
//! per tab plus the persisted settings. Cell text always comes from
//! [`format_cell`], so an export says exactly what the dashboard shows.
//!
//! - **HTML**: self-contained dashboard (cards, SVG charts, table, print styles)
//! - **CSV** / **TSV**: the current tab as displayed
//! - **JSON**: the current tab's render model and analytics
//! - **XLSX**: the current tab as displayed, then every other non-empty tab
//!
//! # Usage
//!
//! ```ignore
//! use weekboard::report;
//!
//! // Picks the format from the extension
//! report::generate("dashboard.html", &dashboard, &dataset)?;
//! report::generate("visits.csv", &dashboard, &dataset)?;
//! report::generate("reports.xlsx", &dashboard, &dataset)?;
//! ```

pub mod csv;
pub mod html;
pub mod json;
pub mod xlsx;

use crate::analytics::{Analytics, Strategy};
use crate::dataset::Dataset;
use crate::error::ExportError;
use crate::numeric::format_cell;
use crate::store::Settings;
use crate::view::{RenderModel, ViewState};
use log::info;
use rayon::prelude::*;
use std::io::Write;
use std::path::Path;

pub type Result<T> = std::result::Result<T, ExportError>;

/// Output format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    Csv,
    Tsv,
    Json,
    Xlsx,
}

impl Format {
    /// Unknown extensions fall back to CSV.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "html" | "htm" => Format::Html,
            "json" => Format::Json,
            "tsv" | "txt" => Format::Tsv,
            "xlsx" => Format::Xlsx,
            _ => Format::Csv,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Csv => "csv",
            Format::Tsv => "tsv",
            Format::Json => "json",
            Format::Xlsx => "xlsx",
        }
    }
}

/// Everything a report needs: one panel per tab, the active one, settings.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub panels: Vec<RenderModel>,
    pub active: usize,
    pub settings: Settings,
    /// Where the data came from, shown in the header
    pub source: String,
    pub generated_at: String,
}

impl Dashboard {
    /// Render every tab. The active tab gets `view`; the others their default view.
    pub fn build(
        dataset: &Dataset,
        view: &ViewState,
        analytics: &Analytics,
        settings: Settings,
        source: &str,
    ) -> Self {
        Self::build_with(dataset, view, analytics, settings, source, |_| {})
    }

    /// [`Dashboard::build`] with a callback after each tab (for progress bars).
    pub fn build_with<F>(
        dataset: &Dataset,
        view: &ViewState,
        analytics: &Analytics,
        settings: Settings,
        source: &str,
        on_tab: F,
    ) -> Self
    where
        F: Fn(&str) + Sync,
    {
        let active_name = view.resolve_tab(dataset).map(str::to_string);
        let names: Vec<&str> = dataset.tab_names().collect();

        let panels: Vec<RenderModel> = names
            .par_iter()
            .map(|name| {
                let model = if active_name.as_deref() == Some(*name) {
                    view.render(dataset, analytics)
                } else {
                    ViewState::new().select_tab(name).render(dataset, analytics)
                };
                on_tab(*name);
                model
            })
            .collect();

        let active = active_name
            .as_deref()
            .and_then(|a| names.iter().position(|n| *n == a))
            .unwrap_or(0);

        Self {
            panels,
            active,
            settings,
            source: source.to_string(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M").to_string(),
        }
    }

    pub fn current(&self) -> Option<&RenderModel> {
        self.panels.get(self.active)
    }

    /// Current panel, or `NoData` when there is nothing to export.
    pub fn exportable(&self) -> Result<&RenderModel> {
        match self.current() {
            Some(model) if !model.is_empty() => Ok(model),
            _ => Err(ExportError::NoData),
        }
    }
}

/// Header and cell text of a model, exactly as displayed.
pub fn display_table(model: &RenderModel) -> (Vec<String>, Vec<Vec<String>>) {
    let rows = model
        .rows
        .iter()
        .map(|row| model.cells(row).map(|c| format_cell(c).text).collect())
        .collect();
    (model.headers.clone(), rows)
}

/// Write `dashboard` to `path` in the format its extension names.
pub fn generate<P: AsRef<Path>>(path: P, dashboard: &Dashboard, dataset: &Dataset) -> Result<()> {
    let path = path.as_ref();
    let format = Format::from_path(path);

    // Fail before creating an empty file
    if format != Format::Html {
        dashboard.exportable()?;
    }

    match format {
        Format::Xlsx => xlsx::write(path, dashboard, dataset)?,
        _ => {
            let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
            match format {
                Format::Html => html::write_dashboard(&mut file, dashboard)?,
                Format::Json => json::write(&mut file, dashboard)?,
                Format::Tsv => csv::write_tsv(&mut file, dashboard.exportable()?)?,
                _ => csv::write(&mut file, dashboard.exportable()?)?,
            }
            file.flush()?;
        }
    }

    info!("wrote {} report to {}", format.extension(), path.display());
    Ok(())
}

/// Summary counts across all panels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub tabs: usize,
    pub rows: usize,
    pub weekly: usize,
    pub rollup: usize,
    pub generic: usize,
    pub anomalies: usize,
}

impl Summary {
    pub fn from_panels(panels: &[RenderModel]) -> Self {
        let mut summary = Self { tabs: panels.len(), ..Self::default() };

        for p in panels {
            summary.rows += p.rows.len();
            match p.analytics.strategy {
                Strategy::WeeklyActivity => summary.weekly += 1,
                Strategy::Rollup => summary.rollup += 1,
                Strategy::Generic => summary.generic += 1,
            }
            if let Some(trend) = p.analytics.trend() {
                summary.anomalies += trend.anomalies().count();
            }
        }

        summary
    }
}
