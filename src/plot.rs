use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{info, warn};

use crate::errors::{FastError, Result};
use crate::log::Section;
use crate::naming;
use crate::stats::StatsReport;

const POINTS: [u32; 6] = [1, 12, 2, 3, 4, 5];
const COLORS: [u32; 4] = [3, 2, 4, 5];

/// Renders stats reports to PDF through gnuplot, when it is installed.
pub struct Plotter {
    gnuplot: String,
    workdir: PathBuf,
}

impl Plotter {
    pub fn new(gnuplot: &str, workdir: &Path) -> Self {
        Plotter {
            gnuplot: gnuplot.to_string(),
            workdir: workdir.to_path_buf(),
        }
    }

    /// `Err(MissingOptionalTool)` when gnuplot cannot be started.
    pub fn check(&self) -> Result<()> {
        let found = Command::new(&self.gnuplot)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok();
        if found {
            Ok(())
        } else {
            Err(FastError::MissingOptionalTool {
                tool: self.gnuplot.clone(),
            })
        }
    }

    /// Writes `{benchmark}_time.pdf` and, with two or more reports, `{benchmark}_speedup.pdf`.
    ///
    /// A missing gnuplot is logged and skipped. Returns the plots written.
    pub fn plot(&self, benchmark: &str, xlabel: &str, reports: &[StatsReport]) -> Result<Vec<PathBuf>> {
        if let Err(e) = self.check() {
            warn!("{}. Skipping plot generation...", e);
            return Ok(Vec::new());
        }
        if reports.is_empty() {
            return Ok(Vec::new());
        }

        let section = Section::enter(format!("Generating plots for {}", benchmark));
        let mut written = Vec::new();

        info!("Generating plot: {} vs Time (s)", xlabel);
        let time = naming::time_plot(benchmark);
        self.run(&time_script(&time, xlabel, reports))?;
        written.push(self.workdir.join(time));

        match speedup_script(&naming::speedup_plot(benchmark), xlabel, reports) {
            Some(script) => {
                info!("Generating plot: Speedup");
                self.run(&script)?;
                written.push(self.workdir.join(naming::speedup_plot(benchmark)));
            }
            None => info!("Too few stats. Skipping speedup plot..."),
        }

        section.done();
        Ok(written)
    }

    fn run(&self, script: &[String]) -> Result<()> {
        let status = Command::new(&self.gnuplot)
            .arg("-e")
            .arg(script.join(";"))
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| FastError::Spawn {
                program: self.gnuplot.clone(),
                source,
            })?;
        if !status.success() {
            warn!("{} exited with {}", self.gnuplot, status);
        }
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn preamble(ylabel: &str, xlabel: &str, output: &str) -> Vec<String> {
    vec![
        format!("set ylabel \"{}\"", ylabel),
        format!("set xlabel \"{}\"", xlabel),
        "set key below".to_string(),
        "set term pdf color".to_string(),
        format!("set output \"{}\"", output),
    ]
}

/// One series per report, titled by artifact.
pub fn time_script(output: &str, xlabel: &str, reports: &[StatsReport]) -> Vec<String> {
    let series: Vec<String> = reports
        .iter()
        .zip(POINTS.iter().cycle())
        .map(|(r, pt)| format!("'{}' title '{}' pt {}", file_name(&r.path), r.artifact, pt))
        .collect();

    let mut script = preamble("Time (s)", xlabel, output);
    script.push(format!("plot {}", series.join(", ")));
    script
}

/// Ratio of the first report over every other one. `None` with fewer than two reports.
pub fn speedup_script(output: &str, xlabel: &str, reports: &[StatsReport]) -> Option<Vec<String>> {
    let (base, rest) = reports.split_first()?;
    if rest.is_empty() {
        return None;
    }

    let series: Vec<String> = rest
        .iter()
        .zip(COLORS.iter().cycle())
        .map(|(r, lc)| {
            format!(
                "'< paste {} {}' using 1:($2/$4) title '{}/{}' lc {}",
                file_name(&base.path),
                file_name(&r.path),
                base.artifact,
                r.artifact,
                lc
            )
        })
        .collect();

    let mut script = preamble("Speedup", xlabel, output);
    script.push(format!("plot {}", series.join(", ")));
    Some(script)
}
