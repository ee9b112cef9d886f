use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::artifact::OutputFile;
use crate::errors::{FastError, Result};

/// A typed invocation argument.
///
/// Parsed from user text by trying an integer, then a float, then falling back
/// to the raw string. Nothing is ever evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn parse(text: &str) -> Value {
        let trimmed = text.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        // `f64::from_str` accepts "inf" and "nan"; those stay strings.
        if let Ok(f) = trimmed.parse::<f64>()
            && f.is_finite()
        {
            return Value::Float(f);
        }
        Value::Str(text.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// Where a case takes its label from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelSource {
    /// The 1-based case index.
    #[default]
    Case,
    /// The first invocation argument, falling back to the index when there is none.
    FirstArg,
}

/// One labeled input/argument instance, shared by the diff and stats passes.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkCase {
    pub index: usize,
    pub label: String,
    /// Arguments exactly as rendered; passed to the program unchanged.
    pub argv: Vec<String>,
    /// The same arguments, typed.
    pub args: Vec<Value>,
    pub input: PathBuf,
}

/// Which side of a comparison an artifact is on. Part of output file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactRole {
    Original,
    Candidate,
}

impl ArtifactRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactRole::Original => "original",
            ArtifactRole::Candidate => "candidate",
        }
    }
}

/// Elapsed wall-clock time of one run, plus the captured stdout file if requested.
#[derive(Debug)]
pub struct ExecutionResult {
    pub elapsed: Duration,
    pub output: Option<OutputFile>,
}

impl ExecutionResult {
    /// The captured stdout. A run made without capture has none to compare.
    pub fn captured(&self, artifact: &str, case: &str) -> Result<&OutputFile> {
        self.output.as_ref().ok_or_else(|| FastError::InvalidArgument {
            detail: format!("No captured output from {} for {}", artifact, case),
        })
    }
}

/// A single `(label, average seconds)` line of a stats report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsRow {
    pub label: String,
    pub seconds: f64,
}

impl StatsRow {
    /// The `.stats` line format read back by gnuplot.
    pub fn to_line(&self) -> String {
        format!("{} {:.4}\n", self.label, self.seconds)
    }
}

/// Static configuration of one benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkDefinition {
    pub name: String,
    pub target: String,
    pub candidates: Vec<String>,
    pub instances: usize,
    pub executions: usize,
    pub xlabel: String,
    pub constant_input: bool,
    pub diff_script: Option<String>,
}
