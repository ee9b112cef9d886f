use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use tracing::{debug, trace};

use crate::errors::{FastError, Result};
use crate::naming;
use crate::types::{ArtifactRole, BenchmarkCase, ExecutionResult};

/// Longest stderr excerpt carried in an execution failure.
const STDERR_EXCERPT: usize = 2000;

/// A runnable program under test.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// The name as given by the user; passed to the build step.
    pub target: String,
    /// File name component, used in generated file names.
    pub name: String,
    pub role: ArtifactRole,
    pub path: PathBuf,
    workdir: PathBuf,
}

impl Artifact {
    /// Resolves `target` relative to `workdir`, the way `./target` would be.
    pub fn new(workdir: &Path, target: &str, role: ArtifactRole) -> Self {
        let path = workdir.join(target);
        let name = Path::new(target)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| target.to_string());
        Artifact {
            target: target.to_string(),
            name,
            role,
            path,
            workdir: workdir.to_path_buf(),
        }
    }

    /// Whether two artifacts denote the same program, regardless of role.
    pub fn same_program(&self, other: &Artifact) -> bool {
        self.path == other.path
    }

    /// Runs `build... target` in the working directory. Zero exit required.
    pub fn build(&self, build: &[String]) -> Result<()> {
        let (program, args) = build.split_first().ok_or_else(|| FastError::InvalidArgument {
            detail: "Empty build command".to_string(),
        })?;

        debug!("{} {} {}", program, args.join(" "), self.target);
        let status = Command::new(program)
            .args(args)
            .arg(&self.target)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| FastError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(FastError::BuildFailure {
                target: self.target.clone(),
                status,
            });
        }
        Ok(())
    }

    /// Runs the artifact once against `case`, timing the spawn/wait boundary.
    ///
    /// With `capture`, stdout goes to the case's `.out` file, which is handed
    /// back to the caller and removed when dropped. Otherwise stdout is discarded.
    pub fn run(&self, case: &BenchmarkCase, benchmark: &str, capture: bool) -> Result<ExecutionResult> {
        let stdin = File::open(&case.input).map_err(|e| FastError::io(&case.input, e))?;

        let (stdout, output) = if capture {
            let path = self.workdir.join(naming::output_file(
                &self.name,
                self.role,
                benchmark,
                &case.label,
            ));
            let file = File::create(&path).map_err(|e| FastError::io(&path, e))?;
            (Stdio::from(file), Some(OutputFile { path }))
        } else {
            (Stdio::null(), None)
        };

        trace!("{} {}", self.path.display(), case.argv.join(" "));

        let mut cmd = Command::new(&self.path);
        cmd.args(&case.argv)
            .current_dir(&self.workdir)
            .stdin(Stdio::from(stdin))
            .stdout(stdout)
            .stderr(Stdio::piped());

        let start = Instant::now();
        let result = cmd.output();
        let elapsed = start.elapsed();

        let finished = result.map_err(|source| FastError::Spawn {
            program: self.path.display().to_string(),
            source,
        })?;

        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            let mut detail = finished.status.to_string();
            let excerpt = stderr.trim();
            if !excerpt.is_empty() {
                let cut = excerpt
                    .char_indices()
                    .nth(STDERR_EXCERPT)
                    .map(|(i, _)| i)
                    .unwrap_or(excerpt.len());
                detail.push_str(": ");
                detail.push_str(&excerpt[..cut]);
            }
            return Err(FastError::ExecutionFailure {
                artifact: self.name.clone(),
                case: case
                    .input
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| case.label.clone()),
                detail,
            });
        }

        Ok(ExecutionResult { elapsed, output })
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A captured stdout file. Removed from disk when dropped.
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
}

impl OutputFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| FastError::io(&self.path, e))
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!("Could not remove {}: {}", self.path.display(), e);
        }
    }
}
