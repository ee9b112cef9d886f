use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::cases::CaseSet;
use crate::config::Defaults;
use crate::differ::{self, Comparator, DiffTool};
use crate::errors::Result;
use crate::log::Section;
use crate::naming;
use crate::plot::Plotter;
use crate::registry::CaseSource;
use crate::stats::{self, StatsReport};
use crate::types::ArtifactRole;

/// Progress of one benchmark run. Errors abort from whichever phase was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    Built,
    Verified,
    Measured,
    Cleaned,
}

/// Per-invocation switches, mostly from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub build: bool,
    pub check_diffs: bool,
    pub plots: bool,
    /// Measure the original even when a checkpoint exists.
    pub remeasure: bool,
    /// Echo the stats table to stdout.
    pub table: bool,
    pub instances: Option<usize>,
    pub executions: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            build: true,
            check_diffs: true,
            plots: true,
            remeasure: false,
            table: true,
            instances: None,
            executions: None,
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub benchmark: String,
    pub phase: Phase,
    /// Original first, then candidates in declaration order.
    pub reports: Vec<StatsReport>,
    pub plots: Vec<PathBuf>,
}

/// Drives benchmarks through build, verification, measurement and cleanup.
pub struct Driver {
    workdir: PathBuf,
    build: Vec<String>,
    comparator: Box<dyn Comparator>,
    plotter: Plotter,
}

impl Driver {
    pub fn new(workdir: &Path, defaults: &Defaults) -> Self {
        Driver {
            workdir: workdir.to_path_buf(),
            build: defaults.build.clone(),
            comparator: Box::new(DiffTool::new(defaults.diff.clone())),
            plotter: Plotter::new(&defaults.gnuplot, workdir),
        }
    }

    pub fn with_comparator(mut self, comparator: Box<dyn Comparator>) -> Self {
        self.comparator = comparator;
        self
    }

    fn artifacts(&self, source: &dyn CaseSource) -> (Artifact, Vec<Artifact>) {
        let def = source.definition();
        let original = Artifact::new(&self.workdir, &def.target, ArtifactRole::Original);
        let candidates = def
            .candidates
            .iter()
            .map(|c| Artifact::new(&self.workdir, c, ArtifactRole::Candidate))
            .collect();
        (original, candidates)
    }

    fn cases<'a>(&self, source: &'a dyn CaseSource, opts: &RunOptions) -> CaseSet<'a> {
        let cases = CaseSet::new(source, &self.workdir);
        match opts.instances {
            Some(n) => cases.with_instances(n),
            None => cases,
        }
    }

    fn build_all(&self, artifacts: &[&Artifact]) -> Result<()> {
        let section = Section::enter("Making executables");
        for artifact in artifacts {
            artifact.build(&self.build)?;
        }
        section.done();
        Ok(())
    }

    fn measure(
        &self,
        artifact: &Artifact,
        cases: &mut CaseSet<'_>,
        executions: usize,
        xlabel: &str,
        opts: &RunOptions,
    ) -> Result<StatsReport> {
        let mut stdout = std::io::stdout();
        let table: Option<&mut dyn Write> = if opts.table { Some(&mut stdout) } else { None };
        stats::collect(artifact, cases, executions, xlabel, table)
    }

    /// Reuses `{benchmark}_{target}.stats` when its rows carry exactly the current case labels.
    fn checkpoint_report(&self, original: &Artifact, benchmark: &str, labels: &[String]) -> Option<StatsReport> {
        let path = self.workdir.join(naming::stats_file(benchmark, &original.name));
        if !path.is_file() {
            return None;
        }
        match stats::read_rows(&path) {
            Ok(rows) if rows.iter().map(|r| &r.label).eq(labels.iter()) => {
                info!("Using checkpoint {}", path.display());
                Some(StatsReport {
                    benchmark: benchmark.to_string(),
                    artifact: original.name.clone(),
                    role: ArtifactRole::Original,
                    path,
                    rows,
                })
            }
            Ok(_) => {
                warn!(
                    "Checkpoint {} does not match the current cases. Measuring the original again",
                    path.display()
                );
                None
            }
            Err(e) => {
                warn!("Ignoring checkpoint: {}", e);
                None
            }
        }
    }

    /// Build, diff, measure and clean up one benchmark, then plot.
    pub fn full(&self, source: &dyn CaseSource, opts: &RunOptions) -> Result<RunOutcome> {
        let def = source.definition();
        let executions = opts.executions.unwrap_or(def.executions);
        let mut run = Run::new(&def.name);

        // Created before anything else so every exit path removes the inputs.
        let mut cases = self.cases(source, opts);
        let (original, candidates) = self.artifacts(source);

        let section = Section::enter(format!("Benchmarking {}", def.name));

        if opts.build {
            let mut all = vec![&original];
            all.extend(candidates.iter());
            self.build_all(&all)?;
        }
        run.advance(Phase::Built);

        if opts.check_diffs && !candidates.is_empty() {
            match &def.diff_script {
                Some(script) => differ::run_diff_script(&self.workdir, script, &def.name)?,
                None => {
                    for candidate in &candidates {
                        differ::diff(&original, candidate, &mut cases, self.comparator.as_ref())?;
                    }
                }
            }
        } else {
            debug!("Difference check skipped for {}", def.name);
        }
        run.advance(Phase::Verified);

        let mut reports = Vec::with_capacity(candidates.len() + 1);
        let baseline = if opts.remeasure {
            None
        } else {
            let labels: Vec<String> = cases.all()?.into_iter().map(|c| c.label).collect();
            self.checkpoint_report(&original, &def.name, &labels)
        };
        match baseline {
            Some(report) => reports.push(report),
            None => reports.push(self.measure(&original, &mut cases, executions, &def.xlabel, opts)?),
        }
        for candidate in &candidates {
            if candidate.same_program(&original) {
                info!("Candidate {} is the original. Skipping its stats...", candidate);
                continue;
            }
            reports.push(self.measure(candidate, &mut cases, executions, &def.xlabel, opts)?);
        }
        run.advance(Phase::Measured);

        cases.clean();
        run.advance(Phase::Cleaned);

        let plots = if opts.plots {
            self.plotter.plot(&def.name, &def.xlabel, &reports)?
        } else {
            Vec::new()
        };

        section.done();
        Ok(RunOutcome {
            benchmark: def.name.clone(),
            phase: run.phase,
            reports,
            plots,
        })
    }

    /// Build and measure the original only, writing the baseline stats file.
    pub fn checkpoint(&self, source: &dyn CaseSource, opts: &RunOptions) -> Result<StatsReport> {
        let def = source.definition();
        let executions = opts.executions.unwrap_or(def.executions);
        let mut run = Run::new(&def.name);
        let mut cases = self.cases(source, opts);
        let (original, _) = self.artifacts(source);

        let section = Section::enter(format!("Checkpoint {}", def.name));
        if opts.build {
            self.build_all(&[&original])?;
        }
        run.advance(Phase::Built);
        run.advance(Phase::Verified);

        let report = self.measure(&original, &mut cases, executions, &def.xlabel, opts)?;
        run.advance(Phase::Measured);

        cases.clean();
        run.advance(Phase::Cleaned);
        section.done();
        Ok(report)
    }

    /// Diff pass only: original against every candidate.
    pub fn verify(&self, source: &dyn CaseSource, opts: &RunOptions) -> Result<()> {
        let def = source.definition();
        let mut cases = self.cases(source, opts);
        let (original, candidates) = self.artifacts(source);

        if opts.build {
            let mut all = vec![&original];
            all.extend(candidates.iter());
            self.build_all(&all)?;
        }
        if let Some(script) = &def.diff_script {
            return differ::run_diff_script(&self.workdir, script, &def.name);
        }
        for candidate in &candidates {
            differ::diff(&original, candidate, &mut cases, self.comparator.as_ref())?;
        }
        cases.clean();
        Ok(())
    }

    /// Writes the inputs of the given instances and leaves them on disk.
    pub fn generate(&self, source: &dyn CaseSource, instances: &[usize]) -> Result<Vec<PathBuf>> {
        let mut cases = CaseSet::new(source, &self.workdir);
        for &instance in instances {
            let section = Section::enter(format!("Generating input for instance {}", instance));
            let case = cases.case(instance)?;
            info!("Generated: {}", case.input.display());
            section.done();
        }
        Ok(cases.persist())
    }
}

struct Run<'a> {
    benchmark: &'a str,
    phase: Phase,
}

impl<'a> Run<'a> {
    fn new(benchmark: &'a str) -> Self {
        Run {
            benchmark,
            phase: Phase::Idle,
        }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(next > self.phase);
        debug!("{}: {:?} -> {:?}", self.benchmark, self.phase, next);
        self.phase = next;
    }
}
