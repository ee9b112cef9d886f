//! File names shared between phases, and read by humans and gnuplot.
//!
//! - input: `{benchmark}_{label}.in`
//! - output: `{artifact}_{role}_{benchmark}_{label}.out`
//! - stats: `{benchmark}_{artifact}.stats`

use crate::types::ArtifactRole;

pub const INPUT_EXT: &str = "in";
pub const OUTPUT_EXT: &str = "out";
pub const STATS_EXT: &str = "stats";
pub const PLOT_EXT: &str = "pdf";

pub fn input_file(benchmark: &str, label: &str) -> String {
    format!("{}_{}.{}", benchmark, label, INPUT_EXT)
}

pub fn output_file(artifact: &str, role: ArtifactRole, benchmark: &str, label: &str) -> String {
    format!(
        "{}_{}_{}_{}.{}",
        artifact,
        role.as_str(),
        benchmark,
        label,
        OUTPUT_EXT
    )
}

pub fn stats_file(benchmark: &str, artifact: &str) -> String {
    format!("{}_{}.{}", benchmark, artifact, STATS_EXT)
}

pub fn time_plot(benchmark: &str) -> String {
    format!("{}_time.{}", benchmark, PLOT_EXT)
}

pub fn speedup_plot(benchmark: &str) -> String {
    format!("{}_speedup.{}", benchmark, PLOT_EXT)
}

/// Benchmark name for an ad-hoc run: the executable's file stem.
pub fn stem(executable: &str) -> String {
    let path = std::path::Path::new(executable);
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| executable.to_string())
}
