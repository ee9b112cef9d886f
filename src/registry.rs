use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::{BenchmarkEntry, Config, Defaults, InputSpec};
use crate::errors::{FastError, Result};
use crate::types::{BenchmarkDefinition, LabelSource, Value};

/// The per-benchmark hooks the generic driver needs.
pub trait CaseSource {
    fn definition(&self) -> &BenchmarkDefinition;

    fn name(&self) -> &str {
        &self.definition().name
    }

    /// Payload written to the case's `.in` file.
    fn generate_input(&self, case: usize, label: &str) -> Result<String>;

    /// Rendered invocation arguments, passed to the program as they are.
    fn generate_args(&self, case: usize) -> Result<Vec<String>> {
        let _ = case;
        Ok(Vec::new())
    }

    /// `args` are the typed form of [`CaseSource::generate_args`].
    fn label_for(&self, case: usize, args: &[Value]) -> String {
        let _ = args;
        case.to_string()
    }
}

/// Substitutes `{case}` and `{value}` in an argument or input template.
pub fn render(template: &str, case: usize, value: i64) -> String {
    template
        .replace("{case}", &case.to_string())
        .replace("{value}", &value.to_string())
}

/// A benchmark declared in `fast.toml`.
pub struct ConfiguredBenchmark {
    definition: BenchmarkDefinition,
    input: Option<InputSpec>,
    args: Vec<String>,
    label: LabelSource,
    start: i64,
    step: i64,
    workdir: PathBuf,
}

impl ConfiguredBenchmark {
    pub fn new(entry: &BenchmarkEntry, defaults: &Defaults, workdir: &Path) -> Self {
        let candidates = entry
            .candidates
            .clone()
            .unwrap_or_else(|| vec![format!("{}_fast", entry.target)]);

        ConfiguredBenchmark {
            definition: BenchmarkDefinition {
                name: entry.name.clone(),
                target: entry.target.clone(),
                candidates,
                instances: entry.instances.unwrap_or(defaults.instances),
                executions: entry.executions.unwrap_or(defaults.executions),
                xlabel: entry.xlabel.clone().unwrap_or_else(|| defaults.xlabel.clone()),
                constant_input: entry.constant_input,
                diff_script: entry.diff_script.clone(),
            },
            input: entry.input.clone(),
            args: entry.args.clone(),
            label: entry.label,
            start: entry.start,
            step: entry.step,
            workdir: workdir.to_path_buf(),
        }
    }

    /// `start + (case - 1) * step`, or `InvalidArgument` when it overflows.
    fn value(&self, case: usize) -> Result<i64> {
        i64::try_from(case)
            .ok()
            .and_then(|c| (c - 1).checked_mul(self.step))
            .and_then(|offset| self.start.checked_add(offset))
            .ok_or_else(|| FastError::InvalidArgument {
                detail: format!(
                    "Benchmark {}: value of case {} overflows (start {}, step {})",
                    self.definition.name, case, self.start, self.step
                ),
            })
    }

    fn run_generator(&self, command: &[String], case: usize, label: &str) -> Result<String> {
        let value = self.value(case)?;
        let rendered: Vec<String> = command
            .iter()
            .map(|part| render(part, case, value).replace("{label}", label))
            .collect();
        let (program, args) = rendered.split_first().ok_or_else(|| {
            FastError::unsupported(&self.definition.name, "empty input command")
        })?;

        let output = Command::new(program)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| FastError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(FastError::ExecutionFailure {
                artifact: program.clone(),
                case: format!("{} case {}", self.definition.name, case),
                detail: output.status.to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl CaseSource for ConfiguredBenchmark {
    fn definition(&self) -> &BenchmarkDefinition {
        &self.definition
    }

    fn generate_input(&self, case: usize, label: &str) -> Result<String> {
        match &self.input {
            None => Err(FastError::unsupported(
                &self.definition.name,
                "input() not implemented",
            )),
            Some(InputSpec::Text { text }) => {
                Ok(render(text, case, self.value(case)?).replace("{label}", label))
            }
            Some(InputSpec::Command { command }) => self.run_generator(command, case, label),
        }
    }

    fn generate_args(&self, case: usize) -> Result<Vec<String>> {
        let value = self.value(case)?;
        Ok(self.args.iter().map(|a| render(a, case, value)).collect())
    }

    fn label_for(&self, case: usize, args: &[Value]) -> String {
        match (self.label, args.first()) {
            (LabelSource::FirstArg, Some(first)) => first.to_string(),
            _ => case.to_string(),
        }
    }
}

/// A benchmark built from the command line for an existing executable.
///
/// Input is empty and constant. When the first `--arg` varies with `{case}`,
/// its value labels the case.
pub struct AdHocBenchmark {
    definition: BenchmarkDefinition,
    args: Vec<String>,
}

impl AdHocBenchmark {
    pub fn new(
        name: &str,
        original: &str,
        candidates: Vec<String>,
        instances: usize,
        executions: usize,
        args: Vec<String>,
    ) -> Self {
        AdHocBenchmark {
            definition: BenchmarkDefinition {
                name: name.to_string(),
                target: original.to_string(),
                candidates,
                instances,
                executions,
                xlabel: "Input".to_string(),
                constant_input: true,
                diff_script: None,
            },
            args,
        }
    }
}

impl CaseSource for AdHocBenchmark {
    fn definition(&self) -> &BenchmarkDefinition {
        &self.definition
    }

    fn generate_input(&self, _case: usize, _label: &str) -> Result<String> {
        Ok(String::new())
    }

    fn generate_args(&self, case: usize) -> Result<Vec<String>> {
        Ok(self
            .args
            .iter()
            .map(|a| render(a, case, case as i64))
            .collect())
    }

    fn label_for(&self, case: usize, args: &[Value]) -> String {
        match (self.args.first(), args.first()) {
            (Some(template), Some(first)) if template.contains("{case}") => first.to_string(),
            _ => case.to_string(),
        }
    }
}

/// Named benchmarks available to the CLI, in registration order.
#[derive(Default)]
pub struct Registry {
    benchmarks: Vec<Box<dyn CaseSource>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config, workdir: &Path) -> Result<Registry> {
        let mut registry = Registry::new();
        for entry in &config.benchmarks {
            registry.register(Box::new(ConfiguredBenchmark::new(
                entry,
                &config.defaults,
                workdir,
            )))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, benchmark: Box<dyn CaseSource>) -> Result<()> {
        if self.get(benchmark.name()).is_some() {
            return Err(FastError::InvalidArgument {
                detail: format!("Benchmark '{}' registered twice", benchmark.name()),
            });
        }
        self.benchmarks.push(benchmark);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn CaseSource> {
        self.benchmarks
            .iter()
            .find(|b| b.name() == name)
            .map(|b| b.as_ref())
    }

    pub fn lookup(&self, name: &str) -> Result<&dyn CaseSource> {
        self.get(name)
            .ok_or_else(|| FastError::unsupported(name, "no benchmark with that name is registered"))
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn CaseSource> {
        self.benchmarks.iter().map(|b| b.as_ref())
    }

    pub fn len(&self) -> usize {
        self.benchmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.benchmarks.is_empty()
    }

    /// Registered benchmarks matching `names`, in registration order. Empty selects all.
    pub fn select(&self, names: &[String]) -> Result<Vec<&dyn CaseSource>> {
        for name in names {
            self.lookup(name)?;
        }
        Ok(self
            .iter()
            .filter(|b| names.is_empty() || names.iter().any(|n| n == b.name()))
            .collect())
    }
}
