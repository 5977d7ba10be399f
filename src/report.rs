//! Table and chart output for result rows.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Settings;
use crate::domain::ResultRow;
use crate::error::Result;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const HEADERS: [&str; 5] = ["Timestamp", "Project", "Query", "Old count", "New count"];
const ECHARTS_URL: &str = "https://cdn.jsdelivr.net/npm/echarts@5/dist/echarts.min.js";

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Write rows as a plain-text table, sorted by query name.
pub fn write_table<W: Write>(
    out: &mut W,
    title: &str,
    rows: &[ResultRow],
    settings: &Settings,
) -> Result<()> {
    let mut sorted: Vec<&ResultRow> = rows.iter().collect();
    sorted.sort_by(|a, b| {
        a.query_name
            .cmp(&b.query_name)
            .then(a.timestamp.cmp(&b.timestamp))
    });

    let cells: Vec<[String; 5]> = sorted
        .iter()
        .map(|row| {
            [
                format_timestamp(&row.timestamp),
                settings.project_name(row.project_id),
                row.query_name.clone(),
                row.old_count.to_string(),
                row.new_count.to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for line in &cells {
        for (width, cell) in widths.iter_mut().zip(line) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let separator = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+", separator);

    writeln!(out, "{}", title)?;
    writeln!(out, "{}", separator)?;
    write_line(out, &HEADERS.map(String::from), &widths)?;
    writeln!(out, "{}", separator)?;
    for line in &cells {
        write_line(out, line, &widths)?;
    }
    writeln!(out, "{}", separator)?;
    Ok(())
}

fn write_line<W: Write>(out: &mut W, cells: &[String; 5], widths: &[usize; 5]) -> Result<()> {
    write!(out, "|")?;
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        // counts are right-aligned
        if i >= 3 {
            write!(out, " {:>width$} |", cell, width = *width)?;
        } else {
            write!(out, " {:<width$} |", cell, width = *width)?;
        }
    }
    writeln!(out)?;
    Ok(())
}

/// ECharts option for a line chart: one x-axis point per run timestamp,
/// an old and a new series per query name. Missing points are null.
pub fn chart_option(title: &str, rows: &[ResultRow]) -> Value {
    let timestamps: BTreeSet<DateTime<Utc>> = rows.iter().map(|r| r.timestamp).collect();
    let mut by_query: BTreeMap<&str, BTreeMap<DateTime<Utc>, &ResultRow>> = BTreeMap::new();
    for row in rows {
        by_query
            .entry(row.query_name.as_str())
            .or_default()
            .insert(row.timestamp, row);
    }

    let mut series = Vec::new();
    for (name, points) in &by_query {
        let old: Vec<Option<i64>> = timestamps
            .iter()
            .map(|ts| points.get(ts).map(|r| r.old_count))
            .collect();
        let new: Vec<Option<i64>> = timestamps
            .iter()
            .map(|ts| points.get(ts).map(|r| r.new_count))
            .collect();
        series.push(json!({ "name": format!("{} old", name), "type": "line", "data": old }));
        series.push(json!({ "name": format!("{} new", name), "type": "line", "data": new }));
    }

    let dates: Vec<String> = timestamps.iter().map(format_timestamp).collect();

    json!({
        "title": { "text": title },
        "tooltip": { "trigger": "axis" },
        "legend": { "top": "bottom" },
        "xAxis": { "type": "category", "data": dates },
        "yAxis": { "type": "value" },
        "series": series,
    })
}

/// Render the chart as a standalone HTML page.
pub fn chart_html(title: &str, rows: &[ResultRow]) -> String {
    let option = chart_option(title, rows).to_string();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{script}"></script>
</head>
<body>
<div id="chart" style="width:1200px;height:600px;"></div>
<script>
echarts.init(document.getElementById("chart")).setOption({option});
</script>
</body>
</html>
"#,
        title = html_escape(title),
        script = ECHARTS_URL,
        option = option.replace("</", "<\\/"),
    )
}

/// Write the chart HTML to `path`.
pub fn write_chart(path: &Path, title: &str, rows: &[ResultRow]) -> Result<PathBuf> {
    let html = chart_html(title, rows);
    std::fs::write(path, html)?;
    info!("generated chart at {}", path.display());
    Ok(path.to_path_buf())
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
