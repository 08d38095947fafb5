//! Persisted dashboard preferences (SQLite via Diesel)
//!
//! All preferences live in one JSON blob under a fixed key, so a partial or
//! older blob simply merges over the defaults when it is read back.

use crate::schema::preferences;
use crate::theme::{Density, Theme};
use crate::view::ViewState;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_DB_PATH: &str = "weekboard.db";

/// Key the settings blob is stored under.
pub const SETTINGS_KEY: &str = "dashboard-settings";

// ============================================================================
// Settings
// ============================================================================

/// A saved search for one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPreset {
    pub tab: String,
    #[serde(default)]
    pub search: String,
    /// RFC 3339 time the preset was saved
    #[serde(default)]
    pub timestamp: String,
}

impl FilterPreset {
    /// View state that re-applies this preset.
    pub fn view(&self) -> ViewState {
        ViewState::new().select_tab(&self.tab).with_search(&self.search)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub theme: Theme,
    pub density: Density,
    pub animations: bool,
    pub rows_per_page: usize,
    pub auto_refresh: bool,
    pub favorites: Vec<String>,
    pub filter_presets: BTreeMap<String, FilterPreset>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            density: Density::default(),
            animations: true,
            rows_per_page: 100,
            auto_refresh: false,
            favorites: Vec::new(),
            filter_presets: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Parse a stored blob; anything unreadable falls back to defaults.
    pub fn from_blob(blob: &str) -> Self {
        match serde_json::from_str(blob) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("ignoring unreadable settings blob: {}", e);
                Self::default()
            }
        }
    }

    pub fn is_favorite(&self, tab: &str) -> bool {
        self.favorites.iter().any(|f| f == tab)
    }

    /// Add or remove `tab` from favorites. Returns whether it is now a favorite.
    pub fn toggle_favorite(&mut self, tab: &str) -> bool {
        if let Some(idx) = self.favorites.iter().position(|f| f == tab) {
            self.favorites.remove(idx);
            false
        } else {
            self.favorites.push(tab.to_string());
            true
        }
    }

    pub fn save_preset(&mut self, name: &str, tab: &str, search: &str) {
        self.filter_presets.insert(
            name.to_string(),
            FilterPreset {
                tab: tab.to_string(),
                search: search.to_string(),
                timestamp: chrono::Local::now().to_rfc3339(),
            },
        );
    }
}

// ============================================================================
// Store
// ============================================================================

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] diesel::r2d2::Error),

    #[error("Settings encoding error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Backup failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Insertable)]
#[diesel(table_name = preferences)]
struct NewPreference<'a> {
    key: &'a str,
    value: &'a str,
    updated_at: &'a str,
}

/// Settings store backed by a small SQLite file.
pub struct SettingsStore {
    pool: DbPool,
    path: PathBuf,
}

impl SettingsStore {
    pub fn db_path() -> PathBuf {
        PathBuf::from(DEFAULT_DB_PATH)
    }

    /// Open the store at the default path
    pub fn open() -> Result<Self> {
        Self::open_at(DEFAULT_DB_PATH)
    }

    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(&path_str);
        let pool = Pool::builder()
            .max_size(2)
            .build(manager)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self { pool, path: path.as_ref().to_path_buf() };
        store.init_schema()?;
        debug!("settings store at {}", path_str);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(|e| StoreError::Connection(e.to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let mut conn = self.get_conn()?;
        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&mut conn)?;
        Ok(())
    }

    fn read_blob(&self) -> Result<Option<String>> {
        let mut conn = self.get_conn()?;
        let value = preferences::table
            .filter(preferences::key.eq(SETTINGS_KEY))
            .select(preferences::value)
            .first::<String>(&mut conn)
            .optional()?;
        Ok(value)
    }

    /// Current settings, or defaults when nothing usable is stored.
    pub fn load(&self) -> Result<Settings> {
        Ok(match self.read_blob()? {
            Some(blob) => Settings::from_blob(&blob),
            None => Settings::default(),
        })
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        let blob = serde_json::to_string(settings)?;
        let now = chrono::Local::now().to_rfc3339();
        let mut conn = self.get_conn()?;

        diesel::replace_into(preferences::table)
            .values(&NewPreference { key: SETTINGS_KEY, value: &blob, updated_at: &now })
            .execute(&mut conn)?;
        Ok(())
    }

    /// Load, modify and save in one step.
    pub fn update<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Settings) -> T,
    {
        let mut settings = self.load()?;
        let out = f(&mut settings);
        self.save(&settings)?;
        Ok(out)
    }

    pub fn toggle_favorite(&self, tab: &str) -> Result<bool> {
        self.update(|s| s.toggle_favorite(tab))
    }

    pub fn save_preset(&self, name: &str, tab: &str, search: &str) -> Result<()> {
        self.update(|s| s.save_preset(name, tab, search))
    }

    /// Returns whether a preset was removed.
    pub fn delete_preset(&self, name: &str) -> Result<bool> {
        self.update(|s| s.filter_presets.remove(name).is_some())
    }

    pub fn preset(&self, name: &str) -> Result<Option<FilterPreset>> {
        Ok(self.load()?.filter_presets.get(name).cloned())
    }

    /// Drop every stored preference.
    pub fn reset(&self) -> Result<usize> {
        let mut conn = self.get_conn()?;
        let deleted = diesel::delete(preferences::table).execute(&mut conn)?;
        Ok(deleted)
    }

    /// Copy the database file to `dest`. Returns bytes copied.
    pub fn backup<P: AsRef<Path>>(&self, dest: P) -> Result<u64> {
        Ok(std::fs::copy(&self.path, dest)?)
    }
}
