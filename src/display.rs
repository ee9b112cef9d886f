use chrono::{DateTime, Utc};
use owo_colors::{OwoColorize, Stream, Style};
use serde::Serialize;

use crate::registry::CaseSource;
use crate::stats::StatsReport;
use crate::types::StatsRow;

/// Width of the label column in the live stats table.
const LABEL_WIDTH: usize = 20;

fn style_header() -> Style {
    Style::new().bold().dimmed()
}

/// Header line of the live stats table: `{xlabel}` padded, then `Time (s)`.
pub fn format_table_header(xlabel: &str) -> String {
    let header = format!("{:<width$}{}", xlabel, "Time (s)", width = LABEL_WIDTH);
    format!(
        "{}\n",
        header.if_supports_color(Stream::Stdout, |s| s.style(style_header()))
    )
}

pub fn format_table_row(row: &StatsRow) -> String {
    let label = format!("{:<width$}", row.label, width = LABEL_WIDTH);
    let time = format!("{:.4}", row.seconds);
    format!(
        "{}{}\n",
        label.if_supports_color(Stream::Stdout, |s| s.cyan()),
        time.if_supports_color(Stream::Stdout, |s| s.yellow())
    )
}

/// One line per registered benchmark: name, original and candidates.
pub fn format_benchmark_list<'a>(benchmarks: impl Iterator<Item = &'a dyn CaseSource>) -> String {
    let mut out = String::new();
    for b in benchmarks {
        let def = b.definition();
        out.push_str(&format!(
            "{}  {} -> {}  ({} cases x {})\n",
            def.name
                .if_supports_color(Stream::Stdout, |s| s.style(Style::new().cyan().bold())),
            def.target.if_supports_color(Stream::Stdout, |s| s.green()),
            def.candidates.join(", "),
            def.instances,
            def.executions
        ));
    }
    out
}

/// Speedup of `candidate` over `original` per shared label, in candidate order.
pub fn speedups(original: &StatsReport, candidate: &StatsReport) -> Vec<(String, Option<f64>)> {
    candidate
        .rows
        .iter()
        .map(|row| {
            let ratio = original
                .rows
                .iter()
                .find(|o| o.label == row.label)
                .and_then(|o| (row.seconds > 0.0).then(|| o.seconds / row.seconds));
            (row.label.clone(), ratio)
        })
        .collect()
}

/// `candidate: 2.31x vs original` lines, one per candidate report.
pub fn format_speedup_summary(reports: &[StatsReport]) -> String {
    let Some((original, rest)) = reports.split_first() else {
        return String::new();
    };

    let mut out = String::new();
    for candidate in rest {
        let ratios: Vec<f64> = speedups(original, candidate)
            .into_iter()
            .filter_map(|(_, r)| r)
            .collect();
        if ratios.is_empty() {
            out.push_str(&format!("{}: no comparable cases\n", candidate.artifact));
            continue;
        }
        let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
        let speed = format!("{:.2}x", mean);
        out.push_str(&format!(
            "{}: {} vs {} over {} cases\n",
            candidate
                .artifact
                .if_supports_color(Stream::Stdout, |s| s.cyan()),
            speed.if_supports_color(Stream::Stdout, |s| s.style(Style::new().yellow().bold())),
            original.artifact,
            ratios.len()
        ));
    }
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    benchmark: &'a str,
    artifact: &'a str,
    role: &'a str,
    stats_file: String,
    rows: &'a [StatsRow],
    mean_seconds: f64,
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    finished_at: String,
    reports: Vec<JsonReport<'a>>,
}

/// JSON summary of every report of a run.
pub fn format_json(reports: &[StatsReport], now: DateTime<Utc>) -> String {
    let summary = JsonSummary {
        finished_at: now.to_rfc3339(),
        reports: reports
            .iter()
            .map(|r| JsonReport {
                benchmark: &r.benchmark,
                artifact: &r.artifact,
                role: r.role.as_str(),
                stats_file: r.path.display().to_string(),
                rows: &r.rows,
                mean_seconds: if r.rows.is_empty() {
                    0.0
                } else {
                    r.rows.iter().map(|row| row.seconds).sum::<f64>() / r.rows.len() as f64
                },
            })
            .collect(),
    };
    let mut out = serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string());
    out.push('\n');
    out
}
