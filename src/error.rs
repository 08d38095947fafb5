//! Error types
//!
//! Only transport and output can fail. Bad *data* never produces an error:
//! classification, aggregation and coercion degrade to neutral results.

use std::time::Duration;
use thiserror::Error;

/// Failure to obtain a dataset. Surfaced once; there is no automatic retry.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("could not read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("dataset must be a JSON object of tab name to rows")]
    NotAnObject,

    #[error("dataset contains no tabs")]
    Empty,

    #[error("dataset load timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure while writing an export or report.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no data available to export")]
    NoData,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LoadError>;
