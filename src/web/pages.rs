// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Server-rendered dashboard pages

use crate::config::AppConfig;
use crate::gateway::AuditStatus;
use crate::panels::analytics::{AnalyticsPhase, AnalyticsState, ChartRow, ViewMode};
use crate::panels::audit::AuditQueue;
use crate::panels::extraction::ExtractionState;
use crate::panels::visuals::VisualsState;
use crate::panels::AppSection;

pub(super) fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Page shell. `refresh` adds a meta refresh while work is in flight.
fn base_template(section: AppSection, content: &str, refresh: bool) -> String {
    let nav: String = AppSection::ALL
        .iter()
        .map(|s| {
            let class = if *s == section { " class=\"active\"" } else { "" };
            format!(r#"<a href="/section/{}"{}>{}</a>"#, s.slug(), class, escape_html(s.title()))
        })
        .collect();

    let refresh_tag = if refresh { r#"<meta http-equiv="refresh" content="1">"# } else { "" };
    let title = escape_html(section.title());

    format!(r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    {}
    <title>{} - AetherPulse</title>
    <style>
        :root {{
            --bg-primary: #0b1220;
            --bg-secondary: #111a2e;
            --bg-card: #16223d;
            --text-primary: #e8eef8;
            --text-secondary: #94a3b8;
            --accent: #38bdf8;
            --success: #34d399;
            --danger: #f87171;
            --border: #1f2d4a;
        }}
        * {{ box-sizing: border-box; margin: 0; padding: 0; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.6;
        }}
        .container {{ max-width: 1200px; margin: 0 auto; padding: 20px; }}
        nav {{
            background: var(--bg-secondary);
            padding: 15px 20px;
            display: flex;
            align-items: center;
            gap: 30px;
            border-bottom: 1px solid var(--border);
        }}
        nav .logo {{ font-size: 1.4em; font-weight: bold; color: var(--accent); }}
        nav a {{ color: var(--text-secondary); text-decoration: none; }}
        nav a.active, nav a:hover {{ color: var(--text-primary); }}
        .card {{
            background: var(--bg-card);
            border-radius: 12px;
            padding: 20px;
            margin-bottom: 20px;
        }}
        .card h2 {{ margin-bottom: 15px; color: var(--accent); }}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ padding: 10px; text-align: left; border-bottom: 1px solid var(--border); }}
        th {{ color: var(--text-secondary); font-weight: 500; }}
        .bar {{ height: 8px; background: var(--accent); border-radius: 4px; }}
        .notice {{ color: var(--danger); }}
        .safe {{ color: var(--success); }}
        .flagged {{ color: var(--danger); }}
        input, textarea {{
            width: 100%;
            padding: 8px;
            margin: 6px 0 12px;
            background: var(--bg-secondary);
            color: var(--text-primary);
            border: 1px solid var(--border);
            border-radius: 6px;
        }}
        button {{
            background: var(--accent);
            border: none;
            padding: 8px 16px;
            border-radius: 6px;
            cursor: pointer;
        }}
        button:disabled {{ opacity: 0.5; cursor: wait; }}
        img.asset {{ max-width: 100%; border-radius: 8px; }}
        pre {{ white-space: pre-wrap; }}
    </style>
</head>
<body>
    <nav>
        <span class="logo">AetherPulse</span>
        {}
    </nav>
    <main class="container">
        <h1>{}</h1>
        {}
    </main>
</body>
</html>"#, refresh_tag, title, nav, title, content)
}

pub(super) fn render_analytics(state: &AnalyticsState, config: &AppConfig) -> String {
    let (body, loading) = match &state.phase {
        AnalyticsPhase::Idle => ("<p>No analysis yet.</p>".to_string(), false),
        AnalyticsPhase::Loading => ("<p>Analyzing customer feedback...</p>".to_string(), true),
        AnalyticsPhase::Ready { trends } if trends.is_empty() => {
            ("<p>No topics could be derived from the reviews.</p>".to_string(), false)
        }
        AnalyticsPhase::Ready { .. } => {
            let rows = state.chart_rows();
            let rendered = match state.view {
                ViewMode::Table => render_trend_table(&rows),
                ViewMode::Chart => render_trend_bars(&rows),
            };
            (rendered, false)
        }
    };

    let content = format!(r#"
        <div class="card">
            <p>Topic mentions over the last {} days.
               View: <a href="/section/analytics?view=chart">chart</a> |
               <a href="/section/analytics?view=table">table</a></p>
            <form method="post" action="/actions/analytics/refresh">
                <button type="submit"{}>Re-analyze</button>
            </form>
        </div>
        <div class="card">
            {}
        </div>
    "#,
        config.analytics.history_days,
        if loading { " disabled" } else { "" },
        body,
    );

    base_template(AppSection::ThermalAnalytics, &content, loading)
}

fn render_trend_table(rows: &[ChartRow]) -> String {
    let topics: String = rows
        .first()
        .map(|row| {
            row.values
                .iter()
                .map(|(topic, _)| format!("<th>{}</th>", escape_html(topic)))
                .collect()
        })
        .unwrap_or_default();

    let body: String = rows
        .iter()
        .map(|row| {
            let cells: String = row.values.iter().map(|(_, count)| format!("<td>{}</td>", count)).collect();
            format!("<tr><td>{}</td>{}</tr>", escape_html(&row.date), cells)
        })
        .collect();

    format!("<table><tr><th>Date</th>{}</tr>{}</table>", topics, body)
}

fn render_trend_bars(rows: &[ChartRow]) -> String {
    let max = rows
        .iter()
        .flat_map(|row| row.values.iter().map(|(_, count)| *count))
        .max()
        .unwrap_or(0)
        .max(1);

    rows.iter()
        .map(|row| {
            let bars: String = row
                .values
                .iter()
                .map(|(topic, count)| {
                    format!(
                        r#"<tr><td>{}</td><td style="width: 70%"><div class="bar" style="width: {}%"></div></td><td>{}</td></tr>"#,
                        escape_html(topic),
                        count * 100 / max,
                        count
                    )
                })
                .collect();
            format!("<h3>{}</h3><table>{}</table>", escape_html(&row.date), bars)
        })
        .collect()
}

pub(super) fn render_visuals(state: &VisualsState) -> String {
    let generating = state.is_generating();
    let view = state.view();

    let output = match (&view.image, view.notice.as_deref()) {
        (Some(uri), _) => format!(
            r#"<img class="asset" src="{}" alt="{}">
            <p><a href="/api/visuals/export">Export asset</a></p>"#,
            escape_html(uri),
            escape_html(view.prompt.as_deref().unwrap_or_default())
        ),
        (None, Some(notice)) => format!(r#"<p class="notice">{}</p>"#, escape_html(notice)),
        (None, None) if generating => "<p>Generating...</p>".to_string(),
        (None, None) => "<p>Describe a scene to render.</p>".to_string(),
    };

    let content = format!(r#"
        <div class="card">
            <form method="post" action="/actions/visuals">
                <label for="prompt">Prompt</label>
                <input id="prompt" name="prompt" value="{}">
                <button type="submit"{}>Generate</button>
            </form>
        </div>
        <div class="card">{}</div>
    "#,
        escape_html(view.prompt.as_deref().unwrap_or_default()),
        if generating { " disabled" } else { "" },
        output,
    );

    base_template(AppSection::AssetGen, &content, generating)
}

pub(super) fn render_extraction(state: &ExtractionState) -> String {
    let loading = matches!(state, ExtractionState::Loading { .. });

    let output = match state {
        ExtractionState::Idle => "<p>Submit a documentation URL or paste its text.</p>".to_string(),
        ExtractionState::Loading { .. } => "<p>Extracting modules...</p>".to_string(),
        ExtractionState::Failed { message } => format!(r#"<p class="notice">{}</p>"#, escape_html(message)),
        ExtractionState::Displaying { source, modules } => {
            let tree: String = modules
                .iter()
                .map(|m| {
                    let subs: String = m
                        .submodules
                        .iter()
                        .map(|(name, description)| {
                            format!("<li><strong>{}</strong>: {}</li>", escape_html(name), escape_html(description))
                        })
                        .collect();
                    format!(
                        "<li><strong>{}</strong>: {}<ul>{}</ul></li>",
                        escape_html(&m.module),
                        escape_html(&m.description),
                        subs
                    )
                })
                .collect();
            let json = state.pretty_json().unwrap_or_default();
            format!(
                "<p>Source: {}</p><ul>{}</ul><h2>JSON</h2><pre>{}</pre>",
                escape_html(source.as_deref().unwrap_or("pasted text")),
                tree,
                escape_html(&json)
            )
        }
    };

    let content = format!(r#"
        <div class="card">
            <form method="post" action="/actions/extraction">
                <label for="url">Documentation URL</label>
                <input id="url" name="url">
                <label for="text">Documentation text</label>
                <textarea id="text" name="text" rows="6"></textarea>
                <button type="submit"{}>Extract</button>
            </form>
        </div>
        <div class="card">{}</div>
    "#, if loading { " disabled" } else { "" }, output);

    base_template(AppSection::ExtractionAgent, &content, loading)
}

pub(super) fn render_security(queue: &AuditQueue) -> String {
    let rows: String = queue
        .entries()
        .iter()
        .map(|video| {
            let status = video.status();
            let result = match video.sensitivity_score() {
                Some(score) => format!("{:.0}%", score),
                None => format!("{}%", video.progress()),
            };
            let class = match status {
                AuditStatus::Safe => "safe",
                AuditStatus::Flagged => "flagged",
                AuditStatus::Processing => "",
            };
            format!(
                r#"<tr><td>{}</td><td>{}</td><td>{}</td><td class="{}">{}</td><td>{}</td></tr>"#,
                escape_html(&video.name),
                video.size,
                video.uploaded_at.format("%-I:%M:%S %p"),
                class,
                status.as_str(),
                result
            )
        })
        .collect();

    let table = if rows.is_empty() {
        "<p>No footage audited yet.</p>".to_string()
    } else {
        format!(
            "<table><tr><th>File</th><th>Size</th><th>Uploaded</th><th>Status</th><th>Progress / Risk</th></tr>{}</table>",
            rows
        )
    };

    let content = format!(r#"
        <div class="card">
            <form method="post" action="/actions/security/upload" enctype="multipart/form-data">
                <label for="file">R&amp;D footage</label>
                <input id="file" type="file" name="file" multiple>
                <button type="submit">Upload for audit</button>
            </form>
        </div>
        <div class="card">{}</div>
    "#, table);

    base_template(AppSection::RdPipeline, &content, queue.in_flight() > 0)
}
