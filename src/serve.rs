//! HTTP server for the interactive dashboard
//!
//! `weekboard serve data.json` → starts server, opens browser, shows the dashboard

use crate::analytics::Analytics;
use crate::dataset::{Dataset, DEFAULT_LOAD_TIMEOUT};
use crate::report::html;
use crate::store::{Settings, SettingsStore};
use crate::view::{QuickFilter, ViewState};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};

pub const DEFAULT_PORT: u16 = 8787;

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self { ok: true, data: Some(data), error: None }
    }
}

impl ApiResponse<()> {
    fn failure(error: impl ToString) -> Self {
        Self { ok: false, data: None, error: Some(error.to_string()) }
    }
}

/// Query parameters accepted by the dashboard page.
#[derive(Deserialize, Debug, Default)]
pub struct PageParams {
    pub tab: Option<String>,
    #[serde(default)]
    pub search: String,
    pub quick: Option<String>,
    /// Any value re-attempts a failed load
    pub reload: Option<String>,
}

pub struct ServeOptions {
    pub analytics: Analytics,
    pub timeout: Duration,
    /// Preferences file; `None` uses the default location
    pub store_path: Option<PathBuf>,
    pub open_browser: bool,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            analytics: Analytics::new(),
            timeout: DEFAULT_LOAD_TIMEOUT,
            store_path: None,
            open_browser: true,
        }
    }
}

/// Server state: the dataset as last loaded, plus the settings store.
pub struct App {
    dataset_path: PathBuf,
    options: ServeOptions,
    dataset: std::result::Result<Dataset, String>,
    store: Option<SettingsStore>,
}

/// A response before it is handed to tiny_http.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    fn html(body: String) -> Self {
        Self { status: 200, content_type: "text/html; charset=utf-8", body }
    }

    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_string(value)
            .unwrap_or_else(|e| format!(r#"{{"ok":false,"data":null,"error":"{}"}}"#, e));
        Self { status, content_type: "application/json", body }
    }

    fn not_found() -> Self {
        Self { status: 404, content_type: "text/plain", body: "Not found".to_string() }
    }
}

impl App {
    pub fn new(dataset_path: &Path, options: ServeOptions) -> Self {
        let store = match &options.store_path {
            Some(p) => SettingsStore::open_at(p),
            None => SettingsStore::open(),
        };
        let store = match store {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("settings store unavailable, using defaults: {}", e);
                None
            }
        };

        let mut app = Self {
            dataset_path: dataset_path.to_path_buf(),
            options,
            dataset: Err(String::new()),
            store,
        };
        app.reload();
        app
    }

    /// Load (or re-load) the dataset from disk.
    pub fn reload(&mut self) {
        self.dataset = Dataset::load_with_timeout(&self.dataset_path, self.options.timeout).map_err(|e| {
            warn!("failed to load {}: {}", self.dataset_path.display(), e);
            e.to_string()
        });
        if let Ok(ds) = &self.dataset {
            info!("loaded {} tabs from {}", ds.tabs().len(), self.dataset_path.display());
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.dataset.is_ok()
    }

    fn settings(&self) -> Settings {
        match &self.store {
            Some(store) => store.load().unwrap_or_else(|e| {
                warn!("could not read settings: {}", e);
                Settings::default()
            }),
            None => Settings::default(),
        }
    }

    /// Dispatch one request. `query` is the part after `?`.
    pub fn route(&mut self, method: &Method, path: &str, query: &str, body: &str) -> Reply {
        match (method, path) {
            (&Method::Get, "/") => {
                let params: PageParams = serde_urlencoded::from_str(query).unwrap_or_else(|e| {
                    debug!("ignoring bad query '{}': {}", query, e);
                    PageParams::default()
                });
                if params.reload.is_some() && !self.is_loaded() {
                    self.reload();
                }
                self.dashboard_page(&params)
            }

            (&Method::Get, "/data.json") => match &self.dataset {
                Ok(ds) => Reply::json(200, ds),
                Err(e) => Reply::json(503, &ApiResponse::failure(e)),
            },

            (&Method::Get, "/api/settings") => Reply::json(200, &ApiResponse::success(self.settings())),

            (&Method::Post, "/api/settings") => {
                let Some(store) = &self.store else {
                    return Reply::json(503, &ApiResponse::failure("settings store unavailable"));
                };
                let settings = match serde_json::from_str::<Settings>(body) {
                    Ok(s) => s,
                    Err(e) => return Reply::json(400, &ApiResponse::failure(e)),
                };
                match store.save(&settings) {
                    Ok(()) => Reply::json(200, &ApiResponse::success(settings)),
                    Err(e) => Reply::json(500, &ApiResponse::failure(e)),
                }
            }

            _ => Reply::not_found(),
        }
    }

    fn dashboard_page(&self, params: &PageParams) -> Reply {
        let mut buf = Vec::new();

        let written = match &self.dataset {
            Err(message) => html::write_error_page(&mut buf, message, "/?reload=1"),
            Ok(dataset) => {
                let mut view = ViewState::new();
                if let Some(tab) = &params.tab {
                    view = view.select_tab(tab);
                }
                view = view.with_search(&params.search);
                if let Some(quick) = params.quick.as_deref().and_then(|q| q.parse::<QuickFilter>().ok()) {
                    view = view.with_quick_filter(quick);
                }
                let source = self.dataset_path.display().to_string();
                let dashboard = crate::report::Dashboard::build(
                    dataset,
                    &view,
                    &self.options.analytics,
                    self.settings(),
                    &source,
                );
                html::write_dashboard(&mut buf, &dashboard)
            }
        };

        match written {
            Ok(()) => Reply::html(String::from_utf8_lossy(&buf).into_owned()),
            Err(e) => Reply::json(500, &ApiResponse::failure(e)),
        }
    }
}

/// Start server, open browser, serve the dashboard
pub fn start(port: u16, dataset_path: &Path, options: ServeOptions) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let url = format!("http://localhost:{}", port);
    let open_browser = options.open_browser;
    let mut app = App::new(dataset_path, options);

    eprintln!("\n\x1b[1;32m📊 Weekboard\x1b[0m");
    eprintln!("   {}", url);
    eprintln!("   Serving: {}", dataset_path.display());
    if !app.is_loaded() {
        eprintln!("   \x1b[33mDataset failed to load; the page offers a reload\x1b[0m");
    }
    eprintln!();

    if open_browser {
        let _ = open::that(&url);
    }

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &mut app) {
            eprintln!("Error: {}", e);
        }
    }

    Ok(())
}

fn handle_request(mut request: Request, app: &mut App) -> std::io::Result<()> {
    let url = request.url().to_string();
    let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
    let method = request.method().clone();

    let mut body = String::new();
    if method == Method::Post {
        request.as_reader().read_to_string(&mut body)?;
    }

    debug!("{} {}", method, url);
    let reply = app.route(&method, path, query, &body);

    let mut response = Response::from_string(reply.body).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes()) {
        response = response.with_header(header);
    }
    request.respond(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    const DATA: &str = r#"{
        "Doxy Visits": [
            {"Provider": "Alice", "Week of 1/1": 10, "Week of 1/8": 20},
            {"Provider": "Bob", "Week of 1/1": 30, "Week of 1/8": 15}
        ],
        "Staff": [{"Name": "Dee"}]
    }"#;

    fn app_with(data: &str) -> (TempDir, App) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, data).unwrap();
        let options = ServeOptions {
            store_path: Some(dir.path().join("prefs.db")),
            open_browser: false,
            ..ServeOptions::default()
        };
        let app = App::new(&path, options);
        (dir, app)
    }

    // ==========================================================================
    // PAGE TESTS
    // ==========================================================================

    #[test]
    fn test_dashboard_page() {
        let (_dir, mut app) = app_with(DATA);
        let reply = app.route(&Method::Get, "/", "", "");
        assert_eq!(reply.status, 200);
        assert!(reply.content_type.starts_with("text/html"));
        assert!(reply.body.contains(r#"<button class="tab-button active" data-tab="Doxy Visits">"#));
    }

    #[test]
    fn test_tab_query_selects_tab() {
        let (_dir, mut app) = app_with(DATA);
        let reply = app.route(&Method::Get, "/", "tab=Staff", "");
        assert!(reply.body.contains(r#"<button class="tab-button active" data-tab="Staff">"#));
    }

    #[test]
    fn test_failed_load_then_reload() {
        let (dir, mut app) = app_with("{not json");
        assert!(!app.is_loaded());

        let reply = app.route(&Method::Get, "/", "", "");
        assert!(reply.body.contains("Error loading data."));
        assert!(reply.body.contains("/?reload=1"));

        std::fs::write(dir.path().join("data.json"), DATA).unwrap();
        let reply = app.route(&Method::Get, "/", "reload=1", "");
        assert!(app.is_loaded());
        assert!(reply.body.contains("Doxy Visits"));
    }

    // ==========================================================================
    // API TESTS
    // ==========================================================================

    #[test]
    fn test_data_json_preserves_order() {
        let (_dir, mut app) = app_with(DATA);
        let reply = app.route(&Method::Get, "/data.json", "", "");
        assert_eq!(reply.status, 200);
        let v: Value = serde_json::from_str(&reply.body).unwrap();
        let keys: Vec<&String> = v.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["Doxy Visits", "Staff"]);
    }

    #[test]
    fn test_settings_roundtrip() {
        let (_dir, mut app) = app_with(DATA);

        let reply = app.route(&Method::Get, "/api/settings", "", "");
        let v: Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(v["ok"], true);
        assert_eq!(v["data"]["theme"], "light");

        let reply = app.route(&Method::Post, "/api/settings", "", r#"{"theme": "ocean", "favorites": ["Staff"]}"#);
        assert_eq!(reply.status, 200);

        let reply = app.route(&Method::Get, "/api/settings", "", "");
        let v: Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(v["data"]["theme"], "ocean");
        assert_eq!(v["data"]["favorites"][0], "Staff");
        assert_eq!(v["data"]["rowsPerPage"], 100);
    }

    #[test]
    fn test_bad_settings_body() {
        let (_dir, mut app) = app_with(DATA);
        let reply = app.route(&Method::Post, "/api/settings", "", r#""not settings""#);
        assert_eq!(reply.status, 400);
        let v: Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(v["ok"], false);
    }

    #[test]
    fn test_unknown_route() {
        let (_dir, mut app) = app_with(DATA);
        assert_eq!(app.route(&Method::Get, "/nope", "", "").status, 404);
        assert_eq!(app.route(&Method::Delete, "/api/settings", "", "").status, 404);
    }
}
