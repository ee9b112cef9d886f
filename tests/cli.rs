#![cfg(unix)]

use assert_cmd::Command;
use assert_fs::TempDir;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// A project directory with `fast.toml`, a copying candidate script, and
/// a private config home so user defaults never leak in.
fn setup_project(config: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("xdg")).unwrap();
    fs::write(tmp.path().join("fast.toml"), config).unwrap();
    write_script(tmp.path(), "copycat", "exec cat");
    tmp
}

fn write_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// `/bin/cat` as original; `candidate` as the optimized build.
fn project_config(candidate: &str, build: &str) -> String {
    format!(
        r#"
[defaults]
build = ["{build}"]
gnuplot = "definitely-not-gnuplot-xyz"

[[benchmark]]
name = "echo"
target = "/bin/cat"
candidates = ["{candidate}"]
instances = 3
executions = 2
xlabel = "Lines"
input = {{ text = "line {{value}}\n" }}
start = 100
step = 100
"#
    )
}

fn fast_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fast").unwrap();
    cmd.current_dir(dir.path());
    cmd.env("XDG_CONFIG_HOME", dir.path().join("xdg"));
    cmd.env("HOME", dir.path());
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("FAST_LOG");
    cmd
}

fn files_with_ext(dir: &Path, ext: &str) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(ext))
        .collect();
    names.sort();
    names
}

// ---- list ----

#[test]
fn list_shows_benchmarks() {
    let tmp = setup_project(&project_config("copycat", "true"));

    fast_cmd(&tmp)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("echo"))
        .stdout(predicate::str::contains("/bin/cat -> copycat"));
}

#[test]
fn missing_config_is_an_error() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("xdg")).unwrap();

    fast_cmd(&tmp)
        .arg("benchmark")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No benchmark config found"));
}

// ---- benchmark ----

#[test]
fn benchmark_writes_stats_and_cleans_inputs() {
    let tmp = setup_project(&project_config("copycat", "true"));

    fast_cmd(&tmp)
        .arg("benchmark")
        .assert()
        .success()
        .stdout(predicate::str::contains("Lines"))
        .stdout(predicate::str::contains("Time (s)"))
        .stdout(predicate::str::contains("copycat:"))
        .stderr(predicate::str::contains("Skipping plot generation"));

    assert_eq!(
        files_with_ext(tmp.path(), ".stats"),
        ["echo_cat.stats", "echo_copycat.stats"]
    );
    assert!(files_with_ext(tmp.path(), ".in").is_empty());
    assert!(files_with_ext(tmp.path(), ".out").is_empty());

    let stats = fs::read_to_string(tmp.path().join("echo_copycat.stats")).unwrap();
    let labels: Vec<&str> = stats.lines().map(|l| l.split(' ').next().unwrap()).collect();
    assert_eq!(labels, ["1", "2", "3"]);
}

#[test]
fn benchmark_json_summary() {
    let tmp = setup_project(&project_config("copycat", "true"));

    let output = fast_cmd(&tmp)
        .args(["benchmark", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("Output should be valid JSON");
    let reports = parsed["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["role"], "original");
    assert_eq!(reports[1]["artifact"], "copycat");
    assert_eq!(reports[1]["rows"].as_array().unwrap().len(), 3);
    assert!(parsed["finished_at"].is_string());
}

#[test]
fn benchmark_detects_differences() {
    // `echo` ignores stdin, so its output never matches `cat`.
    let tmp = setup_project(&project_config("/bin/echo", "true"));

    fast_cmd(&tmp)
        .arg("benchmark")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Differences detected between cat and echo"));

    assert!(files_with_ext(tmp.path(), ".stats").is_empty());
    assert!(files_with_ext(tmp.path(), ".in").is_empty());
    assert!(files_with_ext(tmp.path(), ".out").is_empty());
}

#[test]
fn benchmark_no_diffs_measures_anyway() {
    let tmp = setup_project(&project_config("/bin/echo", "true"));

    fast_cmd(&tmp)
        .args(["benchmark", "--no-diffs", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Time (s)").not());

    assert_eq!(
        files_with_ext(tmp.path(), ".stats"),
        ["echo_cat.stats", "echo_echo.stats"]
    );
}

#[test]
fn benchmark_build_failure() {
    let tmp = setup_project(&project_config("copycat", "false"));

    fast_cmd(&tmp)
        .arg("benchmark")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Build of '/bin/cat' failed"));
    assert!(files_with_ext(tmp.path(), ".stats").is_empty());
}

#[test]
fn benchmark_unknown_name() {
    let tmp = setup_project(&project_config("copycat", "true"));

    fast_cmd(&tmp)
        .args(["benchmark", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Benchmark 'nope' is not supported"));
}

#[test]
fn benchmark_without_input_is_unsupported() {
    let tmp = setup_project(
        r#"
[defaults]
build = ["true"]

[[benchmark]]
name = "bare"
target = "/bin/cat"
"#,
    );

    fast_cmd(&tmp)
        .args(["benchmark", "--no-plots"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input() not implemented"));
}

#[test]
fn cases_override() {
    let tmp = setup_project(&project_config("copycat", "true"));

    fast_cmd(&tmp)
        .args(["benchmark", "--cases", "5", "--executions", "1", "--no-plots"])
        .assert()
        .success();

    let stats = fs::read_to_string(tmp.path().join("echo_cat.stats")).unwrap();
    assert_eq!(stats.lines().count(), 5);
}

#[test]
fn zero_cases_or_executions_rejected() {
    let tmp = setup_project(&project_config("copycat", "true"));

    for flag in ["--cases", "--executions"] {
        fast_cmd(&tmp)
            .args(["benchmark", flag, "0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("0"));
    }
    fast_cmd(&tmp)
        .args(["stats", "/bin/echo", "-c", "0"])
        .assert()
        .failure();

    assert!(files_with_ext(tmp.path(), ".stats").is_empty());
}

// ---- checkpoint ----

#[test]
fn checkpoint_measures_original_only() {
    let tmp = setup_project(&project_config("copycat", "true"));

    fast_cmd(&tmp)
        .args(["checkpoint", "echo", "-q"])
        .assert()
        .success();

    assert_eq!(files_with_ext(tmp.path(), ".stats"), ["echo_cat.stats"]);
    assert!(files_with_ext(tmp.path(), ".in").is_empty());
}

// ---- generate / clean ----

#[test]
fn generate_then_clean() {
    let tmp = setup_project(&project_config("copycat", "true"));

    fast_cmd(&tmp)
        .args(["generate", "echo", "2", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("echo_2.in"))
        .stdout(predicate::str::contains("echo_3.in"));

    assert_eq!(
        fs::read_to_string(tmp.path().join("echo_3.in")).unwrap(),
        "line 300\n"
    );
    fs::write(tmp.path().join("echo_cat.stats"), "1 0.1000\n").unwrap();

    fast_cmd(&tmp)
        .arg("clean")
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed"));
    assert!(files_with_ext(tmp.path(), ".in").is_empty());
    assert_eq!(files_with_ext(tmp.path(), ".stats"), ["echo_cat.stats"]);

    fast_cmd(&tmp).args(["clean", "--stats"]).assert().success();
    assert!(files_with_ext(tmp.path(), ".stats").is_empty());
    assert!(tmp.path().join("fast.toml").exists());
}

#[test]
fn generate_defaults_to_first_instance() {
    let tmp = setup_project(&project_config("copycat", "true"));

    fast_cmd(&tmp)
        .args(["generate", "echo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("echo_1.in"));
    assert_eq!(files_with_ext(tmp.path(), ".in"), ["echo_1.in"]);
}

// ---- ad-hoc commands ----

#[test]
fn stats_for_an_executable() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("xdg")).unwrap();

    fast_cmd(&tmp)
        .args(["stats", "/bin/echo", "-c", "3", "-a", "{case}0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Time (s)"));

    let stats = fs::read_to_string(tmp.path().join("echo_echo.stats")).unwrap();
    let labels: Vec<&str> = stats.lines().map(|l| l.split(' ').next().unwrap()).collect();
    assert_eq!(labels, ["10", "20", "30"]);
    assert!(files_with_ext(tmp.path(), ".in").is_empty());
}

#[test]
fn diff_identical_executables() {
    let tmp = setup_project("");

    fast_cmd(&tmp)
        .args(["diff", "/bin/cat", "copycat", "-c", "5"])
        .assert()
        .success();
    assert!(files_with_ext(tmp.path(), ".out").is_empty());
    assert!(files_with_ext(tmp.path(), ".in").is_empty());
}

#[test]
fn diff_same_executable_skips() {
    let tmp = setup_project("");

    fast_cmd(&tmp)
        .args(["diff", "/bin/cat", "/bin/cat"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Skipping diff check"));
}

#[test]
fn diff_reports_mismatch() {
    let tmp = setup_project("");

    fast_cmd(&tmp)
        .args(["diff", "/bin/echo", "/bin/true", "-a", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Differences detected"));
    assert!(files_with_ext(tmp.path(), ".out").is_empty());
}

#[test]
fn exe_compares_and_measures() {
    let tmp = setup_project("");

    fast_cmd(&tmp)
        .args(["exe", "/bin/cat", "copycat", "-c", "2", "--no-plots"])
        .assert()
        .success()
        .stdout(predicate::str::contains("copycat:"));

    assert_eq!(
        files_with_ext(tmp.path(), ".stats"),
        ["cat_cat.stats", "cat_copycat.stats"]
    );
}
