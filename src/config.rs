use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{FastError, Result};
use crate::types::LabelSource;

/// Project benchmark file, looked up in the working directory.
pub const CONFIG_FILE: &str = "fast.toml";

const DEFAULT_INSTANCES: usize = 20;
const DEFAULT_EXECUTIONS: usize = 1;
const DEFAULT_XLABEL: &str = "Input";
const DEFAULT_GNUPLOT: &str = "gnuplot";

/// `[defaults]` as written in a file; every field optional so layers can merge.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialDefaults {
    pub instances: Option<usize>,
    pub executions: Option<usize>,
    pub build: Option<Vec<String>>,
    pub diff: Option<Vec<String>>,
    pub gnuplot: Option<String>,
    pub xlabel: Option<String>,
}

impl PartialDefaults {
    /// Fields set in `over` win.
    pub fn merge(self, over: PartialDefaults) -> PartialDefaults {
        PartialDefaults {
            instances: over.instances.or(self.instances),
            executions: over.executions.or(self.executions),
            build: over.build.or(self.build),
            diff: over.diff.or(self.diff),
            gnuplot: over.gnuplot.or(self.gnuplot),
            xlabel: over.xlabel.or(self.xlabel),
        }
    }

    pub fn resolve(self) -> Defaults {
        Defaults {
            instances: self.instances.unwrap_or(DEFAULT_INSTANCES),
            executions: self.executions.unwrap_or(DEFAULT_EXECUTIONS),
            build: self.build.unwrap_or_else(|| vec!["make".to_string()]),
            diff: self
                .diff
                .unwrap_or_else(|| vec!["diff".to_string(), "-u".to_string()]),
            gnuplot: self.gnuplot.unwrap_or_else(|| DEFAULT_GNUPLOT.to_string()),
            xlabel: self.xlabel.unwrap_or_else(|| DEFAULT_XLABEL.to_string()),
        }
    }
}

/// Resolved defaults for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    pub instances: usize,
    pub executions: usize,
    pub build: Vec<String>,
    pub diff: Vec<String>,
    pub gnuplot: String,
    pub xlabel: String,
}

impl Default for Defaults {
    fn default() -> Self {
        PartialDefaults::default().resolve()
    }
}

/// How a benchmark produces the payload fed to stdin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InputSpec {
    /// A template; `{case}`, `{value}` and `{label}` are substituted.
    Text { text: String },
    /// A generator program whose stdout becomes the payload. Arguments are templates.
    Command { command: Vec<String> },
}

/// One `[[benchmark]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkEntry {
    pub name: String,
    pub target: String,
    pub candidates: Option<Vec<String>>,
    pub instances: Option<usize>,
    pub executions: Option<usize>,
    pub xlabel: Option<String>,
    pub input: Option<InputSpec>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub label: LabelSource,
    #[serde(default)]
    pub constant_input: bool,
    #[serde(default = "one")]
    pub start: i64,
    #[serde(default = "one")]
    pub step: i64,
    pub diff_script: Option<String>,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    defaults: PartialDefaults,
    #[serde(default, rename = "benchmark")]
    benchmarks: Vec<BenchmarkEntry>,
}

/// Everything read from disk for one invocation.
#[derive(Debug)]
pub struct Config {
    pub defaults: Defaults,
    pub benchmarks: Vec<BenchmarkEntry>,
    /// The project file, if one was found.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Reads the user defaults (if any) then `fast.toml` in `workdir` (if any).
    pub fn load(workdir: &Path, user_file: Option<&Path>) -> Result<Config> {
        let mut defaults = PartialDefaults::default();

        if let Some(user) = user_file
            && user.is_file()
        {
            let file = read_file(user)?;
            if !file.benchmarks.is_empty() {
                return Err(FastError::ConfigParse {
                    path: user.to_path_buf(),
                    detail: "user config may only contain [defaults]".to_string(),
                });
            }
            defaults = defaults.merge(file.defaults);
        }

        let project = workdir.join(CONFIG_FILE);
        let (benchmarks, path) = if project.is_file() {
            let file = read_file(&project)?;
            defaults = defaults.merge(file.defaults);
            (file.benchmarks, Some(project.clone()))
        } else {
            (Vec::new(), None)
        };

        let defaults = defaults.resolve();
        validate(&defaults, &benchmarks, path.as_deref().unwrap_or(&project))?;

        Ok(Config {
            defaults,
            benchmarks,
            path,
        })
    }

    /// Fails with `NoConfig` when no project file was found.
    pub fn require_project(&self, workdir: &Path) -> Result<&Path> {
        self.path.as_deref().ok_or_else(|| FastError::NoConfig {
            path: workdir.join(CONFIG_FILE),
        })
    }
}

/// `<config_dir>/fast/config.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fast").join("config.toml"))
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| FastError::io(path, e))?;
    parse(&text, path)
}

fn parse(text: &str, path: &Path) -> Result<FileConfig> {
    toml::from_str(text).map_err(|e| FastError::ConfigParse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

fn validate(defaults: &Defaults, benchmarks: &[BenchmarkEntry], path: &Path) -> Result<()> {
    let invalid = |detail: String| FastError::ConfigParse {
        path: path.to_path_buf(),
        detail,
    };

    if defaults.instances == 0 || defaults.executions == 0 {
        return Err(invalid(
            "defaults.instances and defaults.executions must be at least 1".to_string(),
        ));
    }
    if defaults.build.is_empty() || defaults.diff.is_empty() {
        return Err(invalid("defaults.build and defaults.diff must not be empty".to_string()));
    }

    for entry in benchmarks {
        if !is_valid_name(&entry.name) {
            return Err(invalid(format!(
                "benchmark name '{}' must be non-empty and contain only letters, digits, '-' or '_'",
                entry.name
            )));
        }
        if entry.instances == Some(0) || entry.executions == Some(0) {
            return Err(invalid(format!(
                "benchmark '{}': instances and executions must be at least 1",
                entry.name
            )));
        }
        if entry.target.is_empty() {
            return Err(invalid(format!("benchmark '{}' has an empty target", entry.name)));
        }
        if let Some(InputSpec::Command { command }) = &entry.input
            && command.is_empty()
        {
            return Err(invalid(format!(
                "benchmark '{}' has an empty input command",
                entry.name
            )));
        }
    }
    Ok(())
}

/// Names end up in file names, so keep them to a safe alphabet.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    const SAMPLE: &str = r#"
[defaults]
instances = 5
build = ["true"]

[[benchmark]]
name = "pi"
target = "pi"
candidates = ["pi_fast", "pi_o3"]
executions = 3
xlabel = "Decimals"
input = { text = "{value}\n" }
args = ["{value}"]
label = "first-arg"
start = 500
step = 500

[[benchmark]]
name = "sort"
target = "sort"
input = { command = ["python3", "gen.py", "{case}"] }
constant_input = true
"#;

    #[test]
    fn parses_sample() {
        let file = parse(SAMPLE, Path::new("fast.toml")).unwrap();
        assert_eq!(file.defaults.instances, Some(5));
        assert_eq!(file.benchmarks.len(), 2);

        let pi = &file.benchmarks[0];
        assert_eq!(pi.candidates.as_deref().unwrap(), ["pi_fast", "pi_o3"]);
        assert_eq!(pi.label, LabelSource::FirstArg);
        assert_eq!(pi.start, 500);
        assert_eq!(
            pi.input,
            Some(InputSpec::Text {
                text: "{value}\n".to_string()
            })
        );

        let sort = &file.benchmarks[1];
        assert!(sort.constant_input);
        assert_eq!(sort.start, 1);
        assert_eq!(sort.step, 1);
        assert_eq!(sort.label, LabelSource::Case);
        assert!(matches!(sort.input, Some(InputSpec::Command { .. })));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse("[defaults]\ninstancez = 3\n", Path::new("fast.toml")).unwrap_err();
        assert!(matches!(err, FastError::ConfigParse { .. }));
    }

    #[test]
    fn resolve_fills_builtin_defaults() {
        let d = PartialDefaults::default().resolve();
        assert_eq!(d.instances, 20);
        assert_eq!(d.executions, 1);
        assert_eq!(d.build, vec!["make"]);
        assert_eq!(d.diff, vec!["diff", "-u"]);
        assert_eq!(d.gnuplot, "gnuplot");
        assert_eq!(d.xlabel, "Input");
    }

    #[test]
    fn project_defaults_override_user_defaults() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let user = tmp.path().join("user.toml");
        fs::write(&user, "[defaults]\ninstances = 7\nexecutions = 4\n").unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[defaults]\ninstances = 2\n").unwrap();

        let config = Config::load(tmp.path(), Some(&user)).unwrap();
        assert_eq!(config.defaults.instances, 2);
        assert_eq!(config.defaults.executions, 4);
        assert_eq!(
            config.path.as_deref(),
            Some(tmp.path().join(CONFIG_FILE).as_path())
        );
    }

    #[test]
    fn missing_project_file_is_not_an_error_until_required() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let config = Config::load(tmp.path(), None).unwrap();
        assert!(config.benchmarks.is_empty());
        assert!(matches!(
            config.require_project(tmp.path()),
            Err(FastError::NoConfig { .. })
        ));
    }

    #[test]
    fn user_file_cannot_declare_benchmarks() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let mut user = tempfile::NamedTempFile::new().unwrap();
        user.write_all(b"[[benchmark]]\nname = \"a\"\ntarget = \"a\"\n").unwrap();
        assert!(matches!(
            Config::load(tmp.path(), Some(user.path())),
            Err(FastError::ConfigParse { .. })
        ));
    }

    #[test]
    fn zero_instances_rejected() {
        let tmp = assert_fs::TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            "[[benchmark]]\nname = \"a\"\ntarget = \"a\"\ninstances = 0\n",
        )
        .unwrap();
        assert!(matches!(
            Config::load(tmp.path(), None),
            Err(FastError::ConfigParse { .. })
        ));
    }

    #[test]
    fn names_are_restricted() {
        assert!(is_valid_name("pi_digits-2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("../pi"));
        assert!(!is_valid_name("pi digits"));
    }
}
