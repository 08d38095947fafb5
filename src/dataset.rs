//! Dataset model and loader
//!
//! A dataset is a JSON object mapping tab names to arrays of row objects:
//!
//! ```text
//! {
//!   "Doxy Visits": [
//!     { "Provider": "Alice", "Week of 1/1": 10, "Week of 1/8": 20 },
//!     { "Provider": "Total", "Week of 1/1": 40, "Week of 1/8": 35 }
//!   ]
//! }
//! ```
//!
//! Key order matters everywhere (the identifier column is the first key, the
//! latest week is the last bucket column), so tabs and rows keep the order
//! they had in the source document.

use crate::error::{LoadError, Result};
use log::{debug, warn};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Default time allowed for reading and parsing the dataset.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Null, or a string that is empty.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Text(s) => s.is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Raw string form of the value, as used by search, equality filters and
    /// the sort fallback. Integral numbers print without a fraction.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => number_text(*n),
        }
    }
}

pub(crate) fn number_text(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Null),
            Value::String(s) => Cell::Text(s),
            Value::Bool(b) => Cell::Text(b.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n as f64)
    }
}

impl From<i32> for Cell {
    fn from(n: i32) -> Self {
        Cell::Number(n as f64)
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_none(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Cell::Number(n) => serializer.serialize_f64(*n),
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// One record: column name to cell, in source order.
///
/// Rows of the same tab need not share a column set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct Row {
    cells: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used heavily by tests and fixtures.
    pub fn with(mut self, column: &str, cell: impl Into<Cell>) -> Self {
        self.insert(column, cell.into());
        self
    }

    /// Insert or replace a cell, keeping the original position on replace.
    pub fn insert(&mut self, column: &str, cell: Cell) {
        match self.cells.iter_mut().find(|(k, _)| k == column) {
            Some(slot) => slot.1 = cell,
            None => self.cells.push((column.to_string(), cell)),
        }
    }

    /// The cell for `column`; `None` when the row has no such key.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.iter().find(|(k, _)| k == column).map(|(_, v)| v)
    }

    /// Missing keys read as `Cell::Null`.
    pub fn cell(&self, column: &str) -> &Cell {
        self.get(column).unwrap_or(&Cell::Null)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl From<Map<String, Value>> for Row {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            cells: map.into_iter().map(|(k, v)| (k, Cell::from(v))).collect(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (k, v) in &self.cells {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// One named table.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Tab {
    pub name: String,
    pub rows: Vec<Row>,
}

/// All tabs of a loaded document. Read-only after load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    tabs: Vec<Tab>,
}

impl Dataset {
    pub fn new(tabs: Vec<Tab>) -> Self {
        Self { tabs }
    }

    /// Parse a dataset document.
    ///
    /// Tabs that are not arrays load as empty tabs and array entries that are
    /// not objects are skipped; both are logged rather than rejected.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(map) = value else {
            return Err(LoadError::NotAnObject);
        };
        if map.is_empty() {
            return Err(LoadError::Empty);
        }

        let mut tabs = Vec::with_capacity(map.len());
        for (name, rows) in map {
            let rows = match rows {
                Value::Array(items) => {
                    let total = items.len();
                    let rows: Vec<Row> = items
                        .into_iter()
                        .filter_map(|item| match item {
                            Value::Object(obj) => Some(Row::from(obj)),
                            _ => None,
                        })
                        .collect();
                    if rows.len() < total {
                        warn!(
                            "tab '{}': skipped {} entries that are not row objects",
                            name,
                            total - rows.len()
                        );
                    }
                    rows
                }
                other => {
                    warn!("tab '{}' is not an array (found {}); treating as empty", name, kind_of(&other));
                    Vec::new()
                }
            };
            debug!("loaded tab '{}' with {} rows", name, rows.len());
            tabs.push(Tab { name, rows });
        }

        Ok(Self { tabs })
    }

    /// Read and parse a dataset file with the default timeout.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_timeout(path, DEFAULT_LOAD_TIMEOUT)
    }

    /// Read and parse on a worker thread; give up after `timeout`.
    ///
    /// An abandoned load is not retried and its worker result is discarded.
    pub fn load_with_timeout<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = std::fs::read_to_string(&path)
                .map_err(LoadError::from)
                .and_then(|text| Self::from_json_str(&text));
            // Receiver may already have given up
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(LoadError::Timeout(timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(LoadError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "dataset loader stopped unexpectedly",
            ))),
        }
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab(&self, name: &str) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.name == name)
    }

    /// Rows of `name`, empty when the tab does not exist.
    pub fn rows(&self, name: &str) -> &[Row] {
        self.tab(name).map(|t| t.rows.as_slice()).unwrap_or(&[])
    }

    pub fn tab_names(&self) -> impl Iterator<Item = &str> {
        self.tabs.iter().map(|t| t.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.tabs.len()))?;
        for tab in &self.tabs {
            map.serialize_entry(&tab.name, &tab.rows)?;
        }
        map.end()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
