use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::artifact::Artifact;
use crate::cases::CaseSet;
use crate::display;
use crate::errors::{FastError, Result};
use crate::log::Section;
use crate::naming;
use crate::types::{ArtifactRole, StatsRow};

/// Ordered `(label, average seconds)` rows for one artifact.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub benchmark: String,
    pub artifact: String,
    pub role: ArtifactRole,
    pub path: PathBuf,
    pub rows: Vec<StatsRow>,
}

/// Arithmetic mean in seconds. Zero for no samples.
pub fn mean_seconds(samples: &[Duration]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f64 = samples.iter().map(|d| d.as_secs_f64()).sum();
    total / samples.len() as f64
}

/// Runs `artifact` `executions` times per case, output discarded, and records
/// the mean time of each case.
///
/// Each row is written to `{benchmark}_{artifact}.stats` as soon as it is
/// known, so a failure later in the pass leaves the earlier rows on disk.
/// When `table` is given, rows are echoed there as well.
pub fn collect(
    artifact: &Artifact,
    cases: &mut CaseSet<'_>,
    executions: usize,
    xlabel: &str,
    mut table: Option<&mut dyn Write>,
) -> Result<StatsReport> {
    let benchmark = cases.benchmark().to_string();
    if executions == 0 || cases.is_empty() {
        return Err(FastError::InvalidArgument {
            detail: format!(
                "Benchmark {} needs at least one case and one execution (got {} cases, {} executions)",
                benchmark,
                cases.len(),
                executions
            ),
        });
    }
    let path = cases
        .workdir()
        .join(naming::stats_file(&benchmark, &artifact.name));

    let section = Section::enter(format!("Generating stats for {}", artifact));
    let mut file = File::create(&path).map_err(|e| FastError::io(&path, e))?;

    if let Some(out) = table.as_deref_mut() {
        let _ = out.write_all(display::format_table_header(xlabel).as_bytes());
    }

    let mut rows = Vec::with_capacity(cases.len());
    for index in 1..=cases.len() {
        let case = cases.case(index)?;
        let mut samples = Vec::with_capacity(executions);
        for _ in 0..executions {
            samples.push(artifact.run(case, &benchmark, false)?.elapsed);
        }

        let row = StatsRow {
            label: case.label.clone(),
            seconds: mean_seconds(&samples),
        };
        file.write_all(row.to_line().as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| FastError::io(&path, e))?;
        if let Some(out) = table.as_deref_mut() {
            let _ = out.write_all(display::format_table_row(&row).as_bytes());
        }
        rows.push(row);
    }

    section.done();
    Ok(StatsReport {
        benchmark,
        artifact: artifact.name.clone(),
        role: artifact.role,
        path,
        rows,
    })
}

/// Parses a `.stats` file back into rows.
pub fn read_rows(path: &Path) -> Result<Vec<StatsRow>> {
    let text = std::fs::read_to_string(path).map_err(|e| FastError::io(path, e))?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(n, line)| {
            let mut parts = line.split_whitespace();
            let (label, seconds) = match (parts.next(), parts.next(), parts.next()) {
                (Some(label), Some(seconds), None) => (label, seconds),
                _ => {
                    return Err(FastError::InvalidArgument {
                        detail: format!("{}:{}: expected '<label> <seconds>'", path.display(), n + 1),
                    });
                }
            };
            let seconds: f64 = seconds.parse().map_err(|_| FastError::InvalidArgument {
                detail: format!("{}:{}: bad duration '{}'", path.display(), n + 1, seconds),
            })?;
            Ok(StatsRow {
                label: label.to_string(),
                seconds,
            })
        })
        .collect()
}
