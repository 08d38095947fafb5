use chrono::Local;
use clap::{Args as ClapArgs, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use weekboard::analytics::{Analytics, Strategy, DEFAULT_TOP_N};
use weekboard::classify::clean_column_name;
use weekboard::numeric::{format_amount, format_cell, format_percent_delta, format_signed, or_zero, to_number};
use weekboard::report::{self, Dashboard, Summary};
use weekboard::sanitize::sanitize_tab;
use weekboard::serve::{self, ServeOptions, DEFAULT_PORT};
use weekboard::store::{Settings, SettingsStore};
use weekboard::view::{compare_rows, QuickFilter, RenderModel, SortDirection, SortState, ViewState};
use weekboard::{Dataset, Density, Theme};

#[derive(Parser, Debug)]
#[command(name = "weekboard")]
#[command(author, version, about = "Weekly activity dashboards from spreadsheet exports")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Dataset JSON file (optional in GUI mode)
    path: Option<PathBuf>,

    /// Launch GUI file picker (auto-enabled when double-clicked)
    #[arg(long)]
    gui: bool,

    /// Output report file (.html, .csv, .tsv, .json, .xlsx)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for auto-generated reports
    #[arg(long, default_value = "weekboard-reports")]
    report_dir: PathBuf,

    /// Don't auto-generate an HTML report
    #[arg(long)]
    no_report: bool,

    /// Don't prompt to open report
    #[arg(long)]
    no_open: bool,

    #[command(flatten)]
    view: ViewArgs,

    /// Show debug logging and per-tab detail
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only show summary
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Options shaping the view and analytics, shared by every command that renders.
#[derive(ClapArgs, Debug, Clone)]
struct ViewArgs {
    /// Tab to show first (default: first tab)
    #[arg(long)]
    tab: Option<String>,

    /// Case-insensitive search across all cells
    #[arg(long)]
    search: Option<String>,

    /// Quick filter: all, active, top10, growth, declining
    #[arg(long)]
    quick: Option<QuickFilter>,

    /// Column to sort by
    #[arg(long)]
    sort: Option<String>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    desc: bool,

    /// Exact-match column filter, COL=VALUE (repeatable)
    #[arg(long = "filter", value_parser = parse_filter)]
    filters: Vec<(String, String)>,

    /// Apply a saved filter preset
    #[arg(long)]
    preset: Option<String>,

    /// Seconds to wait for the dataset to load
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// Week-over-week drop (%) flagged as an anomaly
    #[arg(long, default_value = "50")]
    drop_threshold: f64,

    /// Week-over-week rise (%) flagged as an anomaly
    #[arg(long, default_value = "100")]
    rise_threshold: f64,

    /// Entries in the top-N and mover lists
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    top: usize,

    /// Preferences database (default: weekboard.db)
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the interactive dashboard on localhost
    Serve {
        /// Dataset JSON file
        path: PathBuf,

        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Don't open a browser
        #[arg(long)]
        no_open: bool,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Export the current view (TSV to stdout when no output is given)
    Export {
        /// Dataset JSON file
        path: PathBuf,

        /// Output file (.csv, .tsv, .json, .xlsx, .html)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Compare rows side by side
    Compare {
        /// Dataset JSON file
        path: PathBuf,

        /// Identifiers to compare (at least two)
        #[arg(required = true, num_args = 2..)]
        names: Vec<String>,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Show or change saved preferences
    Settings {
        #[command(subcommand)]
        action: SettingsAction,

        /// Preferences database (default: weekboard.db)
        #[arg(long, global = true)]
        db: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print current settings as JSON
    Show,

    /// Set the theme: light, dark, midnight, ocean, sunset
    Theme { theme: Theme },

    /// Set table density: comfortable, compact
    Density { density: Density },

    /// Toggle a tab as favorite
    Favorite { tab: String },

    /// Manage filter presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },

    /// Restore defaults
    Reset,

    /// Copy the preferences database
    Backup {
        /// Output path (default: weekboard_backup_<timestamp>.db)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum PresetAction {
    /// List saved presets
    List,

    /// Save a search for a tab
    Save {
        name: String,
        #[arg(long)]
        tab: String,
        #[arg(long, default_value = "")]
        search: String,
    },

    /// Delete a preset
    Delete { name: String },
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((col, value)) if !col.trim().is_empty() => Ok((col.trim().to_string(), value.to_string())),
        _ => Err(format!("expected COL=VALUE, got '{}'", s)),
    }
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    // Handle subcommands first
    if let Some(cmd) = args.command {
        match cmd {
            Command::Serve { path, port, no_open, view } => {
                let options = ServeOptions {
                    analytics: analytics_for(&view),
                    timeout: Duration::from_secs(view.timeout),
                    store_path: view.db.clone(),
                    open_browser: !no_open,
                };
                if let Err(e) = serve::start(port, &path, options) {
                    eprintln!("Server error: {}", e);
                    std::process::exit(1);
                }
            }
            Command::Export { path, output, view } => run_export(&path, output.as_deref(), &view),
            Command::Compare { path, names, view } => run_compare(&path, &names, &view),
            Command::Settings { action, db } => handle_settings_action(action, db.as_deref()),
        }
        return;
    }

    // With GUI feature: launch GUI if --gui flag OR no path provided
    #[cfg(feature = "gui")]
    let use_gui = args.gui || args.path.is_none();

    #[cfg(not(feature = "gui"))]
    let use_gui = false;

    let path = match args.path.clone() {
        Some(p) if !use_gui => p,
        _ => match pick_path(use_gui) {
            Some(p) => p,
            None => std::process::exit(0),
        },
    };

    let dataset = load_or_exit(&path, &args.view);
    let store = open_store(args.view.db.as_deref());
    let settings = store.as_ref().and_then(|s| s.load().ok()).unwrap_or_default();
    let view = view_for(&args.view, store.as_ref());
    let analytics = analytics_for(&args.view);

    if !args.quiet {
        eprintln!("\x1b[1mWeekboard\x1b[0m");
        eprintln!("{}", "─".repeat(70));
        eprintln!("Loaded {} tab(s) from {}\n", dataset.tabs().len(), path.display());
    }

    let pb = if !args.quiet && dataset.tabs().len() > 1 {
        let pb = ProgressBar::new(dataset.tabs().len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    let source = path.display().to_string();
    let dashboard = Dashboard::build_with(&dataset, &view, &analytics, settings, &source, |name| {
        if let Some(ref pb) = pb {
            pb.inc(1);
            pb.set_message(name.to_string());
        }
    });

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if !args.quiet {
        for (i, panel) in dashboard.panels.iter().enumerate() {
            print_panel(panel, i == dashboard.active, args.verbose);
        }
    }

    let summary = Summary::from_panels(&dashboard.panels);
    if !args.quiet {
        eprintln!("\n{}", "─".repeat(70));
        eprintln!("\x1b[1mSummary:\x1b[0m");
        eprintln!("  Tabs:           {}", summary.tabs);
        eprintln!("  Rows shown:     {}", summary.rows);
        eprintln!("  \x1b[36mWeekly:\x1b[0m         {}", summary.weekly);
        eprintln!("  \x1b[35mRollup:\x1b[0m         {}", summary.rollup);
        if summary.anomalies > 0 {
            eprintln!("  \x1b[31m⚠ Anomalies:\x1b[0m    {}", summary.anomalies);
        }
    }

    let report_path = if let Some(ref output) = args.output {
        Some(output.clone())
    } else if !args.no_report {
        std::fs::create_dir_all(&args.report_dir).ok();
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        Some(args.report_dir.join(format!("weekboard_{}.html", timestamp)))
    } else {
        None
    };

    if let Some(ref output_path) = report_path {
        match report::generate(output_path, &dashboard, &dataset) {
            Ok(()) => {
                if !args.quiet {
                    eprintln!("\n\x1b[32mReport saved: {}\x1b[0m", output_path.display());
                }
                if !args.no_open {
                    offer_open(output_path, use_gui, args.quiet);
                }
            }
            Err(e) => eprintln!("\n\x1b[31mExport failed: {}\x1b[0m", e),
        }
    }

    if !args.quiet {
        eprintln!("\n\x1b[90mDone.\x1b[0m");
    }
}

fn load_or_exit(path: &Path, view: &ViewArgs) -> Dataset {
    match Dataset::load_with_timeout(path, Duration::from_secs(view.timeout)) {
        Ok(ds) => ds,
        Err(e) => {
            eprintln!("\x1b[31mError loading data:\x1b[0m {}", e);
            std::process::exit(1);
        }
    }
}

fn open_store(db: Option<&Path>) -> Option<SettingsStore> {
    let opened = match db {
        Some(p) => SettingsStore::open_at(p),
        None => SettingsStore::open(),
    };
    match opened {
        Ok(s) => Some(s),
        Err(e) => {
            log::warn!("preferences unavailable: {}", e);
            None
        }
    }
}

fn analytics_for(view: &ViewArgs) -> Analytics {
    Analytics::new()
        .with_thresholds(view.drop_threshold, view.rise_threshold)
        .with_top_n(view.top)
}

/// Preset first, then explicit flags on top.
fn view_for(args: &ViewArgs, store: Option<&SettingsStore>) -> ViewState {
    let mut view = ViewState::new();

    if let Some(name) = &args.preset {
        match store.map(|s| s.preset(name)) {
            Some(Ok(Some(preset))) => view = preset.view(),
            Some(Err(e)) => eprintln!("\x1b[33mCould not read preset '{}': {}\x1b[0m", name, e),
            _ => eprintln!("\x1b[33mNo preset named '{}'\x1b[0m", name),
        }
    }

    if let Some(tab) = &args.tab {
        view = view.select_tab(tab);
    }
    if let Some(term) = &args.search {
        view = view.with_search(term);
    }
    for (column, value) in &args.filters {
        view = view.with_column_filter(column, value);
    }
    if let Some(quick) = args.quick {
        view = view.with_quick_filter(quick);
    }
    if let Some(column) = &args.sort {
        let direction = if args.desc { SortDirection::Descending } else { SortDirection::Ascending };
        view = view.with_sort(SortState::by(column, direction));
    }
    view
}

fn print_panel(panel: &RenderModel, active: bool, verbose: bool) {
    let (color, label) = match panel.analytics.strategy {
        Strategy::WeeklyActivity => ("\x1b[36m", "weekly"),
        Strategy::Rollup => ("\x1b[35m", "rollup"),
        Strategy::Generic => ("\x1b[90m", "table"),
    };
    let reset = "\x1b[0m";
    let marker = if active { "▶" } else { " " };

    let trend = match panel.analytics.trend() {
        Some(t) => {
            let c = if t.delta < 0.0 { "\x1b[31m" } else { "\x1b[32m" };
            format!("{}{:>8}{} {:>9}", c, format_signed(t.delta), reset, format_percent_delta(t.delta_percent))
        }
        None => format!("{:>8} {:>9}", "-", "-"),
    };
    let anomalies = panel.analytics.trend().map(|t| t.anomalies().count()).unwrap_or(0);

    println!(
        "{} {}{:<8}{} {:>6} rows  {}  {:<3} {}",
        marker,
        color,
        format!("[{}]", label),
        reset,
        panel.rows.len(),
        trend,
        if anomalies > 0 { format!("⚠{}", anomalies) } else { String::new() },
        truncate(&panel.tab, 40)
    );

    if verbose {
        if let Some(rollup) = &panel.analytics.rollup {
            eprintln!(
                "    total={} avg={} trend={} {} projected={}",
                format_amount(rollup.total),
                format_amount(rollup.average),
                rollup.trend.arrow(),
                rollup.trend,
                format_amount(rollup.projection)
            );
        }
        if let Some(t) = panel.analytics.trend() {
            for d in t.anomalies() {
                eprintln!("    {} {}: {} → {}", d.anomaly.label(), d.identifier,
                    d.previous.map(format_amount).unwrap_or_else(|| "-".into()),
                    d.current.map(format_amount).unwrap_or_else(|| "-".into()));
            }
        }
    }
}

fn run_export(path: &Path, output: Option<&Path>, args: &ViewArgs) {
    let dataset = load_or_exit(path, args);
    let store = open_store(args.db.as_deref());
    let settings = store.as_ref().and_then(|s| s.load().ok()).unwrap_or_default();
    let view = view_for(args, store.as_ref());
    let dashboard = Dashboard::build(&dataset, &view, &analytics_for(args), settings, &path.display().to_string());

    let result = match output {
        Some(out) => report::generate(out, &dashboard, &dataset).map(|()| {
            eprintln!("\x1b[32mExported: {}\x1b[0m", out.display());
        }),
        None => dashboard.exportable().and_then(|model| {
            let mut stdout = io::stdout().lock();
            report::csv::write_tsv(&mut stdout, model)?;
            stdout.flush()?;
            Ok(())
        }),
    };

    if let Err(e) = result {
        eprintln!("\x1b[31mExport failed: {}\x1b[0m", e);
    }
}

fn run_compare(path: &Path, names: &[String], args: &ViewArgs) {
    let dataset = load_or_exit(path, args);
    let analytics = analytics_for(args);
    let view = view_for(args, open_store(args.db.as_deref()).as_ref());
    let Some(tab) = view.resolve_tab(&dataset).map(str::to_string) else {
        eprintln!("Dataset has no tabs.");
        std::process::exit(2);
    };

    let rows = sanitize_tab(dataset.rows(&tab));
    let layout = analytics.classify(&rows);
    let Some(identifier) = layout.identifier.as_deref() else {
        eprintln!("Tab '{}' has no identifier column to compare by.", tab);
        std::process::exit(2);
    };

    let selected = compare_rows(&rows, identifier, names);
    if selected.len() < 2 {
        eprintln!("Select at least 2 items to compare ({} matched in '{}').", selected.len(), tab);
        std::process::exit(2);
    }

    let width = selected.iter().map(|r| r.cell(identifier).to_text().chars().count()).max().unwrap_or(0).max(12);
    print!("{:<width$}", clean_column_name(identifier), width = width);
    for bucket in &layout.time_buckets {
        print!("  {:>12}", truncate(&clean_column_name(bucket), 12));
    }
    if layout.has_trend() {
        print!("  {:>9}", "Change");
    }
    println!();

    for row in &selected {
        print!("{:<width$}", row.cell(identifier).to_text(), width = width);
        for bucket in &layout.time_buckets {
            print!("  {:>12}", format_cell(row.cell(bucket)).text);
        }
        if let (Some(latest), Some(previous)) = (layout.latest_bucket(), layout.previous_bucket()) {
            let delta = or_zero(to_number(row.cell(latest))) - or_zero(to_number(row.cell(previous)));
            print!("  {:>9}", format_signed(delta));
        }
        println!();
    }
}

fn handle_settings_action(action: SettingsAction, db: Option<&Path>) {
    let store = match db {
        Some(p) => SettingsStore::open_at(p),
        None => SettingsStore::open(),
    };
    let store = match store {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open preferences: {}", e);
            std::process::exit(1);
        }
    };

    match action {
        SettingsAction::Show => match store.load() {
            Ok(settings) => match serde_json::to_string_pretty(&settings) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Error serializing settings: {}", e),
            },
            Err(e) => eprintln!("Error: {}", e),
        },

        SettingsAction::Theme { theme } => {
            match store.update(|s: &mut Settings| s.theme = theme) {
                Ok(()) => println!("Theme set to {}", theme.display_name()),
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        SettingsAction::Density { density } => {
            match store.update(|s: &mut Settings| s.density = density) {
                Ok(()) => println!("Density set to {}", density),
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        SettingsAction::Favorite { tab } => match store.toggle_favorite(&tab) {
            Ok(true) => println!("⭐ Added '{}' to favorites", tab),
            Ok(false) => println!("Removed '{}' from favorites", tab),
            Err(e) => eprintln!("Error: {}", e),
        },

        SettingsAction::Preset { action } => match action {
            PresetAction::List => match store.load() {
                Ok(settings) if settings.filter_presets.is_empty() => println!("No presets saved."),
                Ok(settings) => {
                    println!("{:<20} {:<30} {:<20} {}", "NAME", "TAB", "SEARCH", "SAVED");
                    println!("{}", "-".repeat(90));
                    for (name, p) in &settings.filter_presets {
                        println!("{:<20} {:<30} {:<20} {}", name, truncate(&p.tab, 30), p.search, p.timestamp);
                    }
                }
                Err(e) => eprintln!("Error: {}", e),
            },
            PresetAction::Save { name, tab, search } => match store.save_preset(&name, &tab, &search) {
                Ok(()) => println!("Saved preset '{}'", name),
                Err(e) => eprintln!("Error: {}", e),
            },
            PresetAction::Delete { name } => match store.delete_preset(&name) {
                Ok(true) => println!("Deleted preset '{}'", name),
                Ok(false) => println!("No preset named '{}'", name),
                Err(e) => eprintln!("Error: {}", e),
            },
        },

        SettingsAction::Reset => match store.reset() {
            Ok(_) => println!("Preferences reset to defaults"),
            Err(e) => eprintln!("Error: {}", e),
        },

        SettingsAction::Backup { output } => {
            let backup_path = output.unwrap_or_else(|| {
                let timestamp = Local::now().format("%Y%m%d_%H%M%S");
                PathBuf::from(format!("weekboard_backup_{}.db", timestamp))
            });
            match store.backup(&backup_path) {
                Ok(bytes) => println!("Backup created: {} ({} bytes)", backup_path.display(), bytes),
                Err(e) => {
                    eprintln!("Failed to create backup: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn offer_open(path: &Path, use_gui: bool, quiet: bool) {
    if use_gui {
        let _ = open::that(path);
    } else if !quiet {
        eprint!("\nOpen report? [Y/n] ");
        io::stderr().flush().ok();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_ok() {
            let input = input.trim().to_lowercase();
            if input.is_empty() || input == "y" || input == "yes" {
                if let Err(e) = open::that(path) {
                    eprintln!("Failed to open report: {}", e);
                }
            }
        }
    }
}

#[cfg(feature = "gui")]
fn pick_path(_use_gui: bool) -> Option<PathBuf> {
    let picked = rfd::FileDialog::new()
        .set_title("Select dataset to open")
        .add_filter("JSON", &["json"])
        .pick_file();
    if picked.is_none() {
        eprintln!("No file selected.");
    }
    picked
}

#[cfg(not(feature = "gui"))]
fn pick_path(_use_gui: bool) -> Option<PathBuf> {
    eprintln!("Usage: weekboard <PATH>");
    eprintln!("Run 'weekboard --help' for more options.");
    eprintln!("Note: GUI mode not available in this build.");
    std::process::exit(1);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
