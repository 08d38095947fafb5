//! Weekboard - Weekly activity dashboards from spreadsheet exports
//!
//! Weekboard reads a JSON document of named tabs (each a list of row objects,
//! as exported from a spreadsheet), works out which columns are identifiers
//! and which are weekly time buckets, and turns every tab into a dashboard
//! panel with week-over-week analytics.
//!
//! # Overview
//!
//! Spreadsheet exports are messy: total rows mixed in with data rows,
//! `"Unnamed: 3"` columns, percentages stored as text, blanks that mean
//! "no data" next to zeros that mean "no activity". Weekboard classifies the
//! columns by name, drops the summary rows, and keeps the difference between
//! a missing value and a real zero until the moment values are summed.
//!
//! # Quick Start
//!
//! ```no_run
//! use weekboard::{Analytics, Dataset, ViewState};
//!
//! let dataset = Dataset::load("weekly.json")?;
//! let analytics = Analytics::new().with_thresholds(50.0, 100.0);
//!
//! let model = ViewState::new()
//!     .select_tab("Doxy Visits")
//!     .sort_by("Provider")
//!     .render(&dataset, &analytics);
//!
//! if let Some(trend) = model.analytics.trend() {
//!     println!("{} → {}: {:+.1}%", trend.previous_total, trend.latest_total, trend.delta_percent);
//! }
//! # Ok::<(), weekboard::LoadError>(())
//! ```
//!
//! # Analytics
//!
//! Each tab is routed to one strategy by name:
//!
//! | Strategy | Produces |
//! |----------|----------|
//! | Weekly activity | totals per week, latest vs previous, top-N, movers, anomalies, rollup |
//! | Rollup | total, weekly average, trend direction, projected month |
//! | Generic | table only |
//!
//! # Modules
//!
//! - [`dataset`]: Loading and the cell/row/tab model
//! - [`classify`]: Identifier and time-bucket column detection
//! - [`sanitize`]: Removal of total and blank rows
//! - [`numeric`]: Coercion and display formatting
//! - [`analytics`]: Per-tab aggregation and dispatch
//! - [`view`]: Sort, search, filters and the render model
//! - [`report`]: HTML dashboard and CSV/TSV/JSON/XLSX export
//! - [`store`]: Persisted preferences (SQLite)
//! - [`serve`]: Local dashboard server

pub mod analytics;
pub mod classify;
pub mod dataset;
pub mod error;
pub mod numeric;
pub mod report;
pub mod sanitize;
pub mod schema;
pub mod serve;
pub mod store;
pub mod theme;
pub mod view;

pub use analytics::{Analytics, Strategy, TabAnalytics, Thresholds};
pub use classify::{ColumnClassifier, ColumnLayout, PatternClassifier};
pub use dataset::{Cell, Dataset, Row, Tab};
pub use error::{ExportError, LoadError};
pub use report::Dashboard;
pub use store::{Settings, SettingsStore};
pub use theme::{Density, Theme};
pub use view::{QuickFilter, RenderModel, SortDirection, ViewState};
