//! HTML dashboard with inline SVG charts

use super::{Dashboard, Summary};
use crate::analytics::{AnomalyKind, BucketTotal, TabAnalytics, Trend};
use crate::classify::clean_column_name;
use crate::numeric::{format_amount, format_cell, format_percent_delta, format_signed, to_number};
use crate::theme::{Density, Theme};
use crate::view::{QuickFilter, RenderModel};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{self, Write};

/// Keyboard shortcuts listed in the help overlay.
pub const SHORTCUTS: &[(&str, &str)] = &[
    ("1 \u{2013} 9", "Jump to tab"),
    ("\u{2190} \u{2192}", "Previous / next tab"),
    ("/ or Ctrl+K", "Focus search"),
    ("d", "Toggle dark mode"),
    ("r", "Reload"),
    ("?", "Show this help"),
    ("Esc", "Close dialogs"),
    ("Ctrl+P", "Print"),
];

static WEEK_OF_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)week\s+of\s*").expect("week-of prefix pattern"));

/// Seconds between reloads when auto-refresh is on.
const AUTO_REFRESH_SECS: u32 = 300;

pub fn write_dashboard<W: Write>(writer: &mut W, dashboard: &Dashboard) -> io::Result<()> {
    let settings = &dashboard.settings;
    let summary = Summary::from_panels(&dashboard.panels);

    let mut body_class = vec![format!("density-{}", settings.density)];
    if settings.theme.is_dark() {
        body_class.push("dark-mode".to_string());
    }
    if !settings.animations {
        body_class.push("no-animations".to_string());
    }

    write_head(writer, settings.theme, settings.density, settings.auto_refresh)?;

    write!(writer, r#"<body class="{body_class}">
    <div class="container">
        <div class="header">
            <div class="logo">Weekboard</div>
            <div class="subtitle">{source} &middot; generated {generated}</div>
            <button class="help-btn" onclick="openHelp()" title="Keyboard shortcuts">?</button>
        </div>

        <div class="stats">
            <div class="stat"><div class="stat-value">{tabs}</div><div class="stat-label">Tabs</div></div>
            <div class="stat"><div class="stat-value">{rows}</div><div class="stat-label">Rows</div></div>
            <div class="stat"><div class="stat-value">{weekly}</div><div class="stat-label">Weekly Reports</div></div>
            <div class="stat{anomaly_class}"><div class="stat-value">{anomalies}</div><div class="stat-label">Anomalies</div></div>
        </div>
"#,
        body_class = body_class.join(" "),
        source = escape_html(&dashboard.source),
        generated = escape_html(&dashboard.generated_at),
        tabs = summary.tabs,
        rows = format_amount(summary.rows as f64),
        weekly = summary.weekly,
        anomaly_class = if summary.anomalies > 0 { " alert" } else { "" },
        anomalies = summary.anomalies,
    )?;

    writeln!(writer, r#"        <nav class="tabs">"#)?;
    for (i, panel) in dashboard.panels.iter().enumerate() {
        let star = if settings.is_favorite(&panel.tab) {
            r#"<span class="favorite-star">&#11088;</span>"#
        } else {
            ""
        };
        writeln!(
            writer,
            r#"            <button class="tab-button{}" data-tab="{}">{}{}</button>"#,
            if i == dashboard.active { " active" } else { "" },
            escape_html(&panel.tab),
            star,
            escape_html(&panel.tab)
        )?;
    }
    writeln!(writer, "        </nav>")?;

    writeln!(
        writer,
        r#"        <div class="toolbar"><input type="search" id="searchInput" placeholder="Search this tab... (press /)" autocomplete="off"></div>"#
    )?;

    for (i, panel) in dashboard.panels.iter().enumerate() {
        write_panel(writer, i, panel, i == dashboard.active, settings.rows_per_page)?;
    }

    write_help(writer)?;

    writeln!(
        writer,
        r#"        <div class="footer">Generated by Weekboard</div>
    </div>"#
    )?;

    write_script(writer, settings.theme)?;
    writeln!(writer, "</body>\n</html>")?;
    Ok(())
}

/// Full-page error shown instead of the dashboard when loading failed.
pub fn write_error_page<W: Write>(writer: &mut W, message: &str, reload_href: &str) -> io::Result<()> {
    write_head(writer, Theme::default(), Density::default(), false)?;
    write!(writer, r#"<body>
    <div class="container">
        <div class="header"><div class="logo">Weekboard</div></div>
        <div class="error-card">
            <p class="no-results">Error loading data.</p>
            <pre class="error-detail">{message}</pre>
            <a class="reload" href="{href}">Reload</a>
        </div>
    </div>
</body>
</html>
"#,
        message = escape_html(message),
        href = escape_html(reload_href),
    )
}

fn write_head<W: Write>(writer: &mut W, theme: Theme, density: Density, auto_refresh: bool) -> io::Result<()> {
    let refresh = if auto_refresh {
        format!(r#"<meta http-equiv="refresh" content="{}">"#, AUTO_REFRESH_SECS)
    } else {
        String::new()
    };

    write!(writer, r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    {refresh}
    <title>Weekboard</title>
    <style>
        :root {{
            {theme_vars}
            --cell-pad: {pad}rem;
            --up: #16a34a;
            --down: #dc2626;
            --warn: #d97706;
            --border: rgba(100, 116, 139, 0.25);
        }}
        * {{ box-sizing: border-box; margin: 0; padding: 0; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Noto Sans', Helvetica, Arial, sans-serif;
            background: var(--theme-background);
            background-attachment: fixed;
            color: var(--theme-text);
            line-height: 1.5;
            min-height: 100vh;
        }}
        .container {{ max-width: 1600px; margin: 0 auto; padding: 2rem; }}
        body:not(.no-animations) .panel.active {{ animation: fade 0.2s ease-in; }}
        @keyframes fade {{ from {{ opacity: 0; }} to {{ opacity: 1; }} }}

        /* Header */
        .header {{
            display: flex;
            align-items: center;
            gap: 1rem;
            margin-bottom: 1.5rem;
            padding: 1rem 1.5rem;
            background: var(--theme-surface);
            border-radius: 12px;
        }}
        .logo {{ font-size: 2rem; font-weight: 800; color: var(--theme-primary); }}
        .subtitle {{ color: var(--theme-textSecondary); font-size: 0.95rem; flex: 1; }}
        .help-btn {{
            width: 2rem; height: 2rem; border-radius: 50%; border: none; cursor: pointer;
            background: var(--theme-primary); color: #fff; font-weight: 700;
        }}

        /* Stats Row */
        .stats {{
            display: grid;
            grid-template-columns: repeat(4, 1fr);
            gap: 1rem;
            margin-bottom: 1.5rem;
        }}
        .stat, .card, .chart-card, .list-card, .table-wrap, .error-card {{
            background: var(--theme-surface);
            border-radius: 12px;
            padding: 1.25rem;
        }}
        .stat {{ text-align: center; }}
        .stat-value {{ font-size: 2.5rem; font-weight: 700; line-height: 1; color: var(--theme-primary); }}
        .stat.alert .stat-value {{ color: var(--down); }}
        .stat-label, .card-label {{
            color: var(--theme-textSecondary); font-size: 0.8rem;
            text-transform: uppercase; letter-spacing: 0.05em; margin-top: 0.4rem;
        }}

        /* Tabs */
        .tabs {{ display: flex; flex-wrap: wrap; gap: 0.5rem; margin-bottom: 1rem; }}
        .tab-button {{
            border: none; cursor: pointer; padding: 0.6rem 1.1rem; border-radius: 999px;
            background: var(--theme-surface); color: var(--theme-text); font-size: 0.95rem;
        }}
        .tab-button.active {{ background: var(--theme-primary); color: #fff; }}
        .favorite-star {{ margin-right: 0.35rem; }}
        .toolbar {{ margin-bottom: 1rem; }}
        #searchInput {{
            width: 100%; max-width: 420px; padding: 0.6rem 1rem; border-radius: 8px;
            border: 1px solid var(--border); background: var(--theme-surface); color: var(--theme-text);
        }}

        /* Panels */
        .panel {{ display: none; }}
        .panel.active {{ display: block; }}
        .cards {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(170px, 1fr)); gap: 1rem; margin-bottom: 1rem; }}
        .card-value {{ font-size: 1.6rem; font-weight: 700; }}
        .card-sub {{ color: var(--theme-textSecondary); font-size: 0.8rem; }}
        .up {{ color: var(--up); }}
        .down {{ color: var(--down); }}
        .charts {{ display: grid; grid-template-columns: 2fr 1fr; gap: 1rem; margin-bottom: 1rem; }}
        .chart-title {{ font-size: 0.95rem; font-weight: 600; margin-bottom: 0.75rem; color: var(--theme-textSecondary); }}
        .bar {{ fill: var(--theme-primary); }}
        .bar-label {{ fill: var(--theme-textSecondary); font-size: 10px; }}
        .lists {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); gap: 1rem; margin-bottom: 1rem; }}
        .list-card ol, .list-card ul {{ padding-left: 1.25rem; }}
        .list-card li {{ display: flex; justify-content: space-between; gap: 0.5rem; }}
        .badge {{ display: inline-block; padding: 0 0.45rem; border-radius: 999px; font-size: 0.7rem; font-weight: 600; color: #fff; margin-left: 0.35rem; }}
        .badge-drop {{ background: var(--down); }}
        .badge-increase {{ background: var(--up); }}
        .badge-zero {{ background: var(--warn); }}

        /* Table */
        .table-meta {{ display: flex; gap: 1rem; color: var(--theme-textSecondary); font-size: 0.85rem; margin-bottom: 0.5rem; }}
        .table-wrap {{ overflow-x: auto; padding: 0; }}
        table {{ width: 100%; border-collapse: collapse; font-size: 0.9rem; }}
        th, td {{ padding: var(--cell-pad) 0.9rem; border-bottom: 1px solid var(--border); text-align: left; white-space: nowrap; }}
        th {{ color: var(--theme-textSecondary); font-weight: 600; position: sticky; top: 0; background: var(--theme-surface); }}
        th.sort-asc::after {{ content: ' \25B2'; }}
        th.sort-desc::after {{ content: ' \25BC'; }}
        td.number {{ text-align: right; font-variant-numeric: tabular-nums; }}
        td.zero {{ color: var(--theme-textSecondary); }}
        tr.anomaly-drop td:first-child, tr.anomaly-zero td:first-child {{ border-left: 3px solid var(--down); }}
        tr.anomaly-increase td:first-child {{ border-left: 3px solid var(--up); }}
        .spark polyline {{ fill: none; stroke: var(--theme-primary); stroke-width: 1.5; }}
        .no-results {{ padding: 2rem; text-align: center; color: var(--theme-textSecondary); }}
        .dim {{ color: var(--theme-textSecondary); }}

        /* Help */
        .modal {{ display: none; position: fixed; inset: 0; background: rgba(0,0,0,0.5); align-items: center; justify-content: center; }}
        .modal.show {{ display: flex; }}
        .modal-content {{ background: var(--theme-surface); border-radius: 12px; padding: 1.5rem; min-width: 320px; }}
        .modal-content td {{ padding: 0.3rem 0.8rem; }}
        kbd {{ font-family: monospace; padding: 0.1rem 0.4rem; border: 1px solid var(--border); border-radius: 4px; }}
        .error-card {{ text-align: center; }}
        .error-detail {{ white-space: pre-wrap; margin-bottom: 1rem; }}
        .reload {{ color: var(--theme-primary); font-weight: 600; }}
        .footer {{ text-align: center; color: var(--theme-textSecondary); font-size: 0.8rem; margin-top: 2rem; }}

        @media print {{
            body {{ background: #fff; color: #000; }}
            .tabs, .toolbar, .help-btn, .modal, .footer {{ display: none !important; }}
            .panel {{ display: block !important; page-break-after: always; }}
            .stat, .card, .chart-card, .list-card, .table-wrap, .header {{ background: #fff; border: 1px solid #ccc; }}
            th {{ position: static; }}
        }}
    </style>
</head>
"#,
        refresh = refresh,
        theme_vars = theme.css_variables(),
        pad = density.cell_padding(),
    )
}

fn write_panel<W: Write>(
    writer: &mut W,
    idx: usize,
    model: &RenderModel,
    active: bool,
    rows_per_page: usize,
) -> io::Result<()> {
    writeln!(
        writer,
        r#"        <section class="panel{}" id="panel-{}" data-tab="{}">"#,
        if active { " active" } else { "" },
        idx,
        escape_html(&model.tab)
    )?;

    if !model.analytics.is_neutral() {
        write_analytics(writer, &model.analytics)?;
    }
    write_table(writer, model, rows_per_page)?;

    writeln!(writer, "        </section>")
}

fn write_analytics<W: Write>(writer: &mut W, analytics: &TabAnalytics) -> io::Result<()> {
    writeln!(writer, r#"        <div class="cards">"#)?;

    if let Some(trend) = analytics.trend() {
        let sign = sign_class(trend.delta);
        write_card(writer, "Latest week", &format_amount(trend.latest_total), &clean_column_name(&trend.latest_bucket), "")?;
        write_card(writer, "Previous week", &format_amount(trend.previous_total), &clean_column_name(&trend.previous_bucket), "")?;
        write_card(writer, "Change", &format_signed(trend.delta), "week over week", sign)?;
        write_card(writer, "Change %", &format_percent_delta(trend.delta_percent), "week over week", sign)?;
    }

    if let Some(rollup) = &analytics.rollup {
        let trend_class = match rollup.trend {
            crate::analytics::TrendDirection::Up => "up",
            crate::analytics::TrendDirection::Down => "down",
            crate::analytics::TrendDirection::Flat => "",
        };
        write_card(writer, "Total", &format_amount(rollup.total), &format!("{} weeks", rollup.bucket_count), "")?;
        write_card(writer, "Weekly average", &format_amount(rollup.average), "", "")?;
        write_card(writer, "Trend", &format!("{} {}", rollup.trend.arrow(), rollup.trend), "second half vs first", trend_class)?;
        write_card(writer, "Projected month", &format_amount(rollup.projection), "average \u{00d7} 4", "")?;
    }

    writeln!(writer, "        </div>")?;

    let Some(snapshot) = &analytics.snapshot else {
        return Ok(());
    };

    writeln!(writer, r#"        <div class="charts">"#)?;
    writeln!(
        writer,
        r#"            <div class="chart-card"><div class="chart-title">Weekly totals</div>{}</div>"#,
        bar_chart_svg(&snapshot.totals)
    )?;
    if let Some(trend) = &snapshot.trend {
        write_ranked(writer, "Top providers", trend)?;
    }
    writeln!(writer, "        </div>")?;

    if let Some(trend) = &snapshot.trend {
        write_movers(writer, trend)?;
    }
    Ok(())
}

fn write_card<W: Write>(writer: &mut W, label: &str, value: &str, sub: &str, class: &str) -> io::Result<()> {
    writeln!(
        writer,
        r#"            <div class="card"><div class="card-label">{}</div><div class="card-value {}">{}</div><div class="card-sub">{}</div></div>"#,
        escape_html(label),
        class,
        escape_html(value),
        escape_html(sub)
    )
}

fn write_ranked<W: Write>(writer: &mut W, title: &str, trend: &Trend) -> io::Result<()> {
    writeln!(writer, r#"            <div class="list-card"><div class="chart-title">{}</div><ol>"#, escape_html(title))?;
    for r in &trend.top {
        writeln!(
            writer,
            "                <li><span>{}</span><span>{}</span></li>",
            escape_html(&r.identifier),
            format_amount(r.value)
        )?;
    }
    writeln!(writer, "            </ol></div>")
}

fn write_movers<W: Write>(writer: &mut W, trend: &Trend) -> io::Result<()> {
    writeln!(writer, r#"        <div class="lists">"#)?;

    for (title, list, class) in [
        ("Biggest gainers", &trend.gainers, "up"),
        ("Biggest decliners", &trend.decliners, "down"),
    ] {
        writeln!(writer, r#"            <div class="list-card"><div class="chart-title">{}</div><ol>"#, title)?;
        if list.is_empty() {
            writeln!(writer, r#"                <li class="dim">None</li>"#)?;
        }
        for d in list.iter() {
            writeln!(
                writer,
                r#"                <li><span>{}</span><span class="{}">{}</span></li>"#,
                escape_html(&d.identifier),
                class,
                format_signed(d.delta)
            )?;
        }
        writeln!(writer, "            </ol></div>")?;
    }

    writeln!(writer, r#"            <div class="list-card"><div class="chart-title">Anomalies</div><ul>"#)?;
    let mut any = false;
    for d in trend.anomalies() {
        any = true;
        writeln!(
            writer,
            r#"                <li><span>{}{}</span><span class="dim">{} &rarr; {}</span></li>"#,
            escape_html(&d.identifier),
            badge(d.anomaly),
            d.previous.map(format_amount).unwrap_or_default(),
            d.current.map(format_amount).unwrap_or_default()
        )?;
    }
    if !any {
        writeln!(writer, r#"                <li class="dim">None</li>"#)?;
    }
    writeln!(writer, "            </ul></div>")?;

    writeln!(writer, "        </div>")
}

fn write_table<W: Write>(writer: &mut W, model: &RenderModel, rows_per_page: usize) -> io::Result<()> {
    let shown = model.rows.len().min(rows_per_page.max(1));

    write!(
        writer,
        r#"        <div class="table-meta"><span class="row-count" data-total="{total}">Showing {count} of {total} rows</span>"#,
        count = model.rows.len(),
        total = model.total_rows
    )?;
    if shown < model.rows.len() {
        write!(writer, r#"<span>first {} displayed</span>"#, shown)?;
    }
    if let Some(desc) = filter_description(model) {
        write!(writer, r#"<span>{}</span>"#, escape_html(&desc))?;
    }
    writeln!(writer, "</div>")?;

    if model.is_empty() {
        writeln!(writer, r#"        <div class="table-wrap"><p class="no-results">No data available for this tab.</p></div>"#)?;
        return Ok(());
    }

    let identifier = model.layout.identifier.as_deref();
    let trend = model.analytics.trend();
    let sparklines = model.layout.has_trend();

    writeln!(writer, r#"        <div class="table-wrap"><table><thead><tr>"#)?;
    for (column, header) in model.columns.iter().zip(&model.headers) {
        let class = match &model.sort.column {
            Some(c) if c == column => match model.sort.direction {
                crate::view::SortDirection::Ascending => "sort-asc",
                crate::view::SortDirection::Descending => "sort-desc",
            },
            _ => "",
        };
        writeln!(writer, r#"            <th class="{}">{}</th>"#, class, escape_html(header))?;
    }
    if sparklines {
        writeln!(writer, "            <th>Trend</th>")?;
    }
    writeln!(writer, "        </tr></thead><tbody>")?;

    for row in model.rows.iter().take(shown) {
        let anomaly = match (trend, identifier) {
            (Some(t), Some(id)) => t.anomaly_for(&row.cell(id).to_text()),
            _ => AnomalyKind::None,
        };
        if anomaly == AnomalyKind::None {
            write!(writer, "        <tr>")?;
        } else {
            write!(writer, r#"        <tr class="anomaly-{}">"#, anomaly.slug())?;
        }

        for column in &model.columns {
            let display = format_cell(row.cell(column));
            let mut class = String::new();
            if display.kind.is_numeric() {
                class.push_str("number");
            }
            if display.kind == crate::numeric::DisplayKind::Zero {
                class.push_str(" zero");
            }
            let title = display
                .note
                .map(|n| format!(r#" title="{}""#, escape_html(n)))
                .unwrap_or_default();
            let extra = if Some(column.as_str()) == identifier { badge(anomaly) } else { String::new() };
            write!(
                writer,
                r#"<td class="{}"{}>{}{}</td>"#,
                class.trim(),
                title,
                escape_html(&display.text),
                extra
            )?;
        }

        if sparklines {
            let values: Vec<Option<f64>> = model
                .layout
                .time_buckets
                .iter()
                .map(|b| to_number(row.cell(b)))
                .collect();
            write!(writer, r#"<td class="spark">{}</td>"#, sparkline_svg(&values))?;
        }
        writeln!(writer, "</tr>")?;
    }

    writeln!(writer, "        </tbody></table></div>")
}

fn write_help<W: Write>(writer: &mut W) -> io::Result<()> {
    writeln!(
        writer,
        r#"        <div class="modal" id="helpModal"><div class="modal-content"><div class="chart-title">Keyboard shortcuts</div><table>"#
    )?;
    for (keys, action) in SHORTCUTS {
        writeln!(writer, "            <tr><td><kbd>{}</kbd></td><td>{}</td></tr>", escape_html(keys), escape_html(action))?;
    }
    writeln!(writer, "        </table></div></div>")
}

fn write_script<W: Write>(writer: &mut W, theme: Theme) -> io::Result<()> {
    let other = theme.toggled();
    let mut themes = serde_json::Map::new();
    for t in [theme, other] {
        themes.insert(t.id().to_string(), serde_json::Value::String(t.css_variables()));
    }
    writeln!(
        writer,
        "    <script>\n    const THEME_CSS = {};\n    const THEMES = [{:?}, {:?}];\n    </script>",
        serde_json::Value::Object(themes),
        theme.id(),
        other.id()
    )?;
    writeln!(writer, "    <script>{}</script>", SCRIPT)
}

const SCRIPT: &str = r#"
    const tabs = Array.from(document.querySelectorAll('.tab-button'));
    const panels = Array.from(document.querySelectorAll('.panel'));
    const search = document.getElementById('searchInput');
    let themeIndex = 0;

    function activeIndex() {
        return tabs.findIndex(t => t.classList.contains('active'));
    }

    function showTab(i) {
        if (!tabs.length) return;
        i = (i + tabs.length) % tabs.length;
        tabs.forEach((t, j) => t.classList.toggle('active', j === i));
        panels.forEach((p, j) => p.classList.toggle('active', j === i));
        search.value = '';
        applySearch();
    }

    function applySearch() {
        const term = search.value.trim().toLowerCase();
        const panel = panels[activeIndex()];
        if (!panel) return;
        let shown = 0;
        panel.querySelectorAll('tbody tr').forEach(tr => {
            const hit = !term || tr.textContent.toLowerCase().includes(term);
            tr.style.display = hit ? '' : 'none';
            if (hit) shown++;
        });
        const count = panel.querySelector('.row-count');
        if (count && term) count.textContent = `Showing ${shown} of ${count.dataset.total} rows`;
    }

    function openHelp() { document.getElementById('helpModal').classList.add('show'); }
    function closeHelp() { document.getElementById('helpModal').classList.remove('show'); }

    function toggleTheme() {
        themeIndex = 1 - themeIndex;
        const id = THEMES[themeIndex];
        document.documentElement.style.cssText = THEME_CSS[id];
        document.body.classList.toggle('dark-mode', id === 'dark' || id === 'midnight');
    }

    tabs.forEach((t, i) => t.addEventListener('click', () => showTab(i)));
    search.addEventListener('input', applySearch);
    document.getElementById('helpModal').addEventListener('click', e => {
        if (e.target.classList.contains('modal')) closeHelp();
    });

    document.addEventListener('keydown', e => {
        const typing = ['INPUT', 'TEXTAREA', 'SELECT'].includes(e.target.tagName);
        if (typing && e.key !== 'Escape') return;

        if (e.ctrlKey || e.metaKey) {
            if (e.key === 'p') { e.preventDefault(); window.print(); }
            if (e.key === 'k') { e.preventDefault(); search.focus(); }
            return;
        }

        if (e.key >= '1' && e.key <= '9') { showTab(Number(e.key) - 1); return; }
        switch (e.key) {
            case 'ArrowLeft': showTab(activeIndex() - 1); break;
            case 'ArrowRight': showTab(activeIndex() + 1); break;
            case '/': e.preventDefault(); search.focus(); break;
            case '?': openHelp(); break;
            case 'Escape': closeHelp(); search.blur(); break;
            case 'd': toggleTheme(); break;
            case 'r': location.reload(); break;
            default: return;
        }
    });
"#;

fn filter_description(model: &RenderModel) -> Option<String> {
    let f = &model.filter;
    let mut parts = Vec::new();
    if !f.search.trim().is_empty() {
        parts.push(format!("search \u{201c}{}\u{201d}", f.search.trim()));
    }
    for (column, value) in &f.column_filters {
        parts.push(format!("{} = {}", clean_column_name(column), value));
    }
    if f.quick != QuickFilter::All {
        parts.push(format!("quick filter: {}", f.quick));
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("Filtered by {}", parts.join(", ")))
    }
}

fn sign_class(value: f64) -> &'static str {
    if value > 0.0 {
        "up"
    } else if value < 0.0 {
        "down"
    } else {
        ""
    }
}

fn badge(kind: AnomalyKind) -> String {
    if kind == AnomalyKind::None {
        String::new()
    } else {
        format!(r#"<span class="badge badge-{}">{}</span>"#, kind.slug(), kind.label())
    }
}

/// Vertical bar chart of bucket totals.
pub fn bar_chart_svg(totals: &[BucketTotal]) -> String {
    const WIDTH: f64 = 640.0;
    const HEIGHT: f64 = 180.0;
    const LABEL: f64 = 28.0;

    if totals.is_empty() {
        return String::new();
    }

    let max = totals.iter().map(|t| t.total).fold(0.0_f64, f64::max);
    let slot = WIDTH / totals.len() as f64;
    let bar_width = (slot * 0.7).max(1.0);
    let plot = HEIGHT - LABEL;

    let mut svg = format!(
        r#"<svg class="bar-chart" viewBox="0 0 {} {}" width="100%" role="img">"#,
        WIDTH, HEIGHT
    );
    for (i, t) in totals.iter().enumerate() {
        let h = if max > 0.0 { (t.total.max(0.0) / max) * (plot - 12.0) } else { 0.0 };
        let x = i as f64 * slot + (slot - bar_width) / 2.0;
        let y = plot - h;
        svg.push_str(&format!(
            r#"<rect class="bar" x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}"><title>{}: {}</title></rect>"#,
            x,
            y,
            bar_width,
            h,
            escape_html(&clean_column_name(&t.bucket)),
            format_amount(t.total)
        ));
        svg.push_str(&format!(
            r#"<text class="bar-label" x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
            x + bar_width / 2.0,
            HEIGHT - 10.0,
            escape_html(&short_bucket(&t.bucket))
        ));
    }
    svg.push_str("</svg>");
    svg
}

/// Tiny line chart of one row's bucket values. Missing weeks are gaps.
pub fn sparkline_svg(values: &[Option<f64>]) -> String {
    const WIDTH: f64 = 80.0;
    const HEIGHT: f64 = 20.0;

    let present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    if present.len() < 2 || values.len() < 2 {
        return String::new();
    }

    let min = present.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max = present.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let range = if max > min { max - min } else { 1.0 };
    let step = WIDTH / (values.len() - 1) as f64;

    let points: Vec<String> = present
        .iter()
        .map(|(i, v)| {
            let x = *i as f64 * step;
            let y = HEIGHT - 2.0 - ((v - min) / range) * (HEIGHT - 4.0);
            format!("{:.1},{:.1}", x, y)
        })
        .collect();

    format!(
        r#"<svg class="spark" viewBox="0 0 {} {}" width="{}" height="{}"><polyline points="{}"/></svg>"#,
        WIDTH,
        HEIGHT,
        WIDTH,
        HEIGHT,
        points.join(" ")
    )
}

/// `Week of 12/6` → `12/6` for axis labels.
fn short_bucket(bucket: &str) -> String {
    let cleaned = clean_column_name(bucket);
    match WEEK_OF_PREFIX.find(&cleaned) {
        Some(m) => cleaned[m.end()..].trim().to_string(),
        None => cleaned,
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Analytics;
    use crate::dataset::Dataset;
    use crate::store::Settings;
    use crate::view::ViewState;

    fn render(dataset: &Dataset, view: &ViewState, settings: Settings) -> String {
        let d = Dashboard::build(dataset, view, &Analytics::new(), settings, "data.json");
        let mut buf = Vec::new();
        write_dashboard(&mut buf, &d).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn dataset() -> Dataset {
        Dataset::from_json_str(
            r#"{
                "Doxy Visits": [
                    {"Provider": "Alice <b>", "Week of 1/1": 10, "Week of 1/8": 20},
                    {"Provider": "Bob", "Week of 1/1": 30, "Week of 1/8": 0},
                    {"Provider": "Total", "Week of 1/1": 40, "Week of 1/8": 20}
                ],
                "Staff": [{"Name": "Dee", "Role": "RN"}]
            }"#,
        )
        .unwrap()
    }

    // ==========================================================================
    // ESCAPING TESTS
    // ==========================================================================

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">O'Neil & co</a>"#), "&lt;a href=&quot;x&quot;&gt;O&#039;Neil &amp; co&lt;/a&gt;");
    }

    #[test]
    fn test_cell_text_is_escaped() {
        let html = render(&dataset(), &ViewState::new(), Settings::default());
        assert!(html.contains("Alice &lt;b&gt;"));
        assert!(!html.contains("Alice <b>"));
    }

    // ==========================================================================
    // DASHBOARD CONTENT TESTS
    // ==========================================================================

    #[test]
    fn test_dashboard_structure() {
        let html = render(&dataset(), &ViewState::new(), Settings::default());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<button class="tab-button active" data-tab="Doxy Visits">"#));
        assert!(html.contains(r#"id="panel-1""#));
        assert!(html.contains("Showing 2 of 2 rows"));
        assert!(html.contains("@media print"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_zero_cell_has_dash_and_tooltip() {
        let html = render(&dataset(), &ViewState::new(), Settings::default());
        assert!(html.contains("<td class=\"number zero\" title=\"No activity\">\u{2014}</td>"));
    }

    #[test]
    fn test_anomaly_badge_and_cards() {
        let html = render(&dataset(), &ViewState::new(), Settings::default());
        assert!(html.contains(r#"<tr class="anomaly-zero">"#));
        assert!(html.contains(r#"badge-zero">Went to zero</span>"#));
        assert!(html.contains("Latest week"));
        assert!(html.contains("-50.0%"));
        assert!(html.contains("Projected month"));
    }

    #[test]
    fn test_generic_tab_has_no_cards() {
        let ds = Dataset::from_json_str(r#"{"Staff": [{"Name": "Dee"}]}"#).unwrap();
        let html = render(&ds, &ViewState::new(), Settings::default());
        assert!(!html.contains(r#"<div class="cards">"#));
    }

    #[test]
    fn test_settings_shape_page() {
        let mut settings = Settings::default();
        settings.theme = Theme::Midnight;
        settings.animations = false;
        settings.auto_refresh = true;
        settings.rows_per_page = 1;
        settings.favorites.push("Staff".into());

        let html = render(&dataset(), &ViewState::new(), settings);
        assert!(html.contains("dark-mode"));
        assert!(html.contains("no-animations"));
        assert!(html.contains(r#"http-equiv="refresh""#));
        assert!(html.contains("first 1 displayed"));
        assert!(html.contains(r#"<span class="favorite-star">&#11088;</span>Staff"#));
    }

    #[test]
    fn test_sorted_header_marked() {
        let html = render(&dataset(), &ViewState::new().sort_by("Week of 1/8").sort_by("Week of 1/8"), Settings::default());
        assert!(html.contains(r#"<th class="sort-desc">Week of 1/8</th>"#));
    }

    #[test]
    fn test_empty_view_message() {
        let html = render(&dataset(), &ViewState::new().with_search("zzz"), Settings::default());
        assert!(html.contains("No data available for this tab."));
        assert!(html.contains("Filtered by search"));
    }

    #[test]
    fn test_error_page() {
        let mut buf = Vec::new();
        write_error_page(&mut buf, "dataset is not valid JSON <eof>", "/?reload=1").unwrap();
        let html = String::from_utf8(buf).unwrap();
        assert!(html.contains("Error loading data."));
        assert!(html.contains("&lt;eof&gt;"));
        assert!(html.contains(r#"href="/?reload=1">Reload</a>"#));
    }

    // ==========================================================================
    // SVG TESTS
    // ==========================================================================

    #[test]
    fn test_sparkline_skips_missing() {
        let svg = sparkline_svg(&[Some(1.0), None, Some(3.0)]);
        assert!(svg.contains(r#"points="0.0,18.0 80.0,2.0""#));
        assert!(sparkline_svg(&[Some(1.0), None]).is_empty());
    }

    #[test]
    fn test_short_bucket_labels() {
        assert_eq!(short_bucket("Week of 12/6"), "12/6");
        assert_eq!(short_bucket("WEEK  OF 1/8"), "1/8");
        assert_eq!(short_bucket("1/15"), "1/15");
        assert_eq!(short_bucket("\u{130}\u{130}Week of\u{3000}1/1"), "1/1");
    }

    #[test]
    fn test_non_ascii_bucket_names_render() {
        let ds = Dataset::from_json_str(
            r#"{"Doxy Visits": [
                {"Provider": "Alice", "\u0130\u0130Week of\u30001/1": 10, "Week of 1/8": 20},
                {"Provider": "Bob", "\u0130\u0130Week of\u30001/1": 30, "Week of 1/8": 15}
            ]}"#,
        )
        .unwrap();
        let html = render(&ds, &ViewState::new(), Settings::default());
        assert!(html.contains(">1/1</text>"));
        assert!(html.contains(">1/8</text>"));
    }

    #[test]
    fn test_bar_chart_has_bar_per_bucket() {
        let totals = vec![
            BucketTotal { bucket: "Week of 1/1".into(), total: 40.0 },
            BucketTotal { bucket: "Week of 1/8".into(), total: 0.0 },
        ];
        let svg = bar_chart_svg(&totals);
        assert_eq!(svg.matches("<rect").count(), 2);
        assert!(svg.contains(">1/8</text>"));
        assert!(bar_chart_svg(&[]).is_empty());
    }
}
