use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::artifact::Artifact;
use crate::cases::CaseSet;
use crate::errors::{FastError, Result};
use crate::log::Section;

/// Decides whether two captured outputs match.
pub trait Comparator {
    fn same(&self, original: &Path, candidate: &Path) -> Result<bool>;
}

/// An external textual diff, `diff -u` by default. Its report goes to the terminal.
pub struct DiffTool {
    command: Vec<String>,
}

impl DiffTool {
    pub fn new(command: Vec<String>) -> Self {
        DiffTool { command }
    }
}

impl Comparator for DiffTool {
    fn same(&self, original: &Path, candidate: &Path) -> Result<bool> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| FastError::InvalidArgument {
                detail: "Empty diff command".to_string(),
            })?;

        let status = Command::new(program)
            .args(args)
            .arg(original)
            .arg(candidate)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| FastError::Spawn {
                program: program.clone(),
                source,
            })?;
        Ok(status.success())
    }
}

/// In-process byte comparison.
pub struct ByteCompare;

impl Comparator for ByteCompare {
    fn same(&self, original: &Path, candidate: &Path) -> Result<bool> {
        let a = std::fs::read(original).map_err(|e| FastError::io(original, e))?;
        let b = std::fs::read(candidate).map_err(|e| FastError::io(candidate, e))?;
        Ok(a == b)
    }
}

/// Runs both artifacts over every case and stops at the first mismatch.
///
/// Comparing an artifact with itself is skipped without running anything.
/// Captured outputs are removed on every path.
pub fn diff(
    original: &Artifact,
    candidate: &Artifact,
    cases: &mut CaseSet<'_>,
    comparator: &dyn Comparator,
) -> Result<()> {
    if original.same_program(candidate) {
        info!("Candidate is the original. Skipping diff check...");
        return Ok(());
    }

    let section = Section::enter(format!(
        "Checking differences between {} and {}",
        original, candidate
    ));
    let benchmark = cases.benchmark().to_string();

    for index in 1..=cases.len() {
        let case = cases.case(index)?;
        debug!(
            "Checking input {} with args {:?}",
            case.input.display(),
            case.argv
        );

        let ours = original.run(case, &benchmark, true)?;
        let theirs = candidate.run(case, &benchmark, true)?;

        let which = format!("{} input {}", benchmark, case.label);
        let a = ours.captured(&original.name, &which)?;
        let b = theirs.captured(&candidate.name, &which)?;
        if !comparator.same(a.path(), b.path())? {
            return Err(FastError::DifferenceDetected {
                original: original.name.clone(),
                candidate: candidate.name.clone(),
                case: which,
            });
        }
    }

    section.done();
    Ok(())
}

/// Runs a user-supplied script in place of per-case diffing. Non-zero exit is a mismatch.
pub fn run_diff_script(workdir: &Path, script: &str, benchmark: &str) -> Result<()> {
    let section = Section::enter(format!("Executing differences script: {}", script));
    let status = Command::new(workdir.join(script))
        .current_dir(workdir)
        .stdin(Stdio::null())
        .status()
        .map_err(|source| FastError::Spawn {
            program: script.to_string(),
            source,
        })?;

    if !status.success() {
        return Err(FastError::DifferenceDetected {
            original: benchmark.to_string(),
            candidate: script.to_string(),
            case: format!("script exit {}", status),
        });
    }
    section.done();
    Ok(())
}
