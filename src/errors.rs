use std::path::PathBuf;
use std::process::ExitStatus;

pub type Result<T> = std::result::Result<T, FastError>;

#[derive(thiserror::Error, Debug)]
pub enum FastError {
    #[error("Build of '{target}' failed ({status})")]
    BuildFailure { target: String, status: ExitStatus },

    #[error("Error when executing {artifact} with input {case}: {detail}")]
    ExecutionFailure {
        artifact: String,
        case: String,
        detail: String,
    },

    #[error("Differences detected between {original} and {candidate} for {case}")]
    DifferenceDetected {
        original: String,
        candidate: String,
        case: String,
    },

    #[error("Benchmark '{name}' is not supported: {reason}")]
    UnsupportedBenchmark { name: String, reason: String },

    #[error("{tool} not found")]
    MissingOptionalTool { tool: String },

    #[error("Could not start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    #[error("No benchmark config found at {path}. Create one or use `fast stats <executable>`")]
    NoConfig { path: PathBuf },

    #[error("{detail}")]
    InvalidArgument { detail: String },
}

impl FastError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FastError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unsupported(name: &str, reason: impl Into<String>) -> Self {
        FastError::UnsupportedBenchmark {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
