use std::path::{Path, PathBuf};
use std::process;

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use fast::clean;
use fast::config::{self, Config};
use fast::display;
use fast::driver::{Driver, RunOptions};
use fast::log;
use fast::naming;
use fast::registry::{AdHocBenchmark, Registry};

#[derive(Parser)]
#[command(
    name = "fast",
    version,
    about = "Test the optimizations performed to a program"
)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only warnings and errors in the log
    #[arg(long, global = true)]
    silent: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Default)]
struct Overrides {
    /// Number of cases (instances) per benchmark
    #[arg(short = 'c', long = "cases", value_parser = clap::value_parser!(u64).range(1..))]
    cases: Option<u64>,

    /// Number of executions per case
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    executions: Option<u64>,

    /// Don't print the stats table
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Check differences, generate stats and plots for benchmarks in fast.toml
    Benchmark {
        /// Benchmarks to run (default: all)
        names: Vec<String>,

        /// Disable difference check
        #[arg(long)]
        no_diffs: bool,

        /// Skip plot generation
        #[arg(long)]
        no_plots: bool,

        /// Measure the original even if a checkpoint exists
        #[arg(long)]
        remeasure: bool,

        /// Print a JSON summary instead of tables
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Create a checkpoint (baseline stats) for the original targets
    Checkpoint {
        names: Vec<String>,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Generate and keep the input files of a benchmark
    Generate {
        name: String,

        /// Instances to generate (default: 1)
        instances: Vec<usize>,
    },
    /// Remove generated .in and .out files
    Clean {
        /// Also remove .stats files and plots
        #[arg(short, long)]
        stats: bool,
    },
    /// List benchmarks declared in fast.toml
    List,
    /// Generate stats with the real time for an executable
    Stats {
        executable: String,

        /// Argument passed to the executable; `{case}` is substituted
        #[arg(short, long = "arg", allow_hyphen_values = true)]
        arg: Vec<String>,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Check output differences between two executables
    Diff {
        original: String,
        candidate: String,

        #[arg(short, long = "arg", allow_hyphen_values = true)]
        arg: Vec<String>,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Check differences, then generate stats and plots for one or two executables
    Exe {
        original: String,
        optimized: Option<String>,

        #[arg(short, long = "arg", allow_hyphen_values = true)]
        arg: Vec<String>,

        #[arg(long)]
        no_plots: bool,

        #[command(flatten)]
        overrides: Overrides,
    },
}

fn options(overrides: &Overrides) -> RunOptions {
    RunOptions {
        table: !overrides.quiet,
        instances: overrides.cases.map(|n| n as usize),
        executions: overrides.executions.map(|n| n as usize),
        ..RunOptions::default()
    }
}

fn ad_hoc(
    original: &str,
    candidates: Vec<String>,
    args: Vec<String>,
    overrides: &Overrides,
    config: &Config,
) -> Result<AdHocBenchmark> {
    let name = naming::stem(original);
    if !config::is_valid_name(&name) {
        anyhow::bail!("Cannot derive a benchmark name from '{}'", original);
    }
    Ok(AdHocBenchmark::new(
        &name,
        original,
        candidates,
        overrides.cases.map_or(config.defaults.instances, |n| n as usize),
        overrides.executions.map_or(config.defaults.executions, |n| n as usize),
        args,
    ))
}

fn project_registry(config: &Config, workdir: &Path) -> Result<Registry> {
    config.require_project(workdir)?;
    Ok(Registry::from_config(config, workdir)?)
}

fn run(cli: Cli, workdir: PathBuf) -> Result<()> {
    let user_file = config::user_config_path();
    let config = Config::load(&workdir, user_file.as_deref())?;
    let driver = Driver::new(&workdir, &config.defaults);

    match cli.command {
        Command::Benchmark {
            names,
            no_diffs,
            no_plots,
            remeasure,
            json,
            overrides,
        } => {
            let registry = project_registry(&config, &workdir)?;
            let opts = RunOptions {
                check_diffs: !no_diffs,
                plots: !no_plots,
                remeasure,
                table: !overrides.quiet && !json,
                ..options(&overrides)
            };

            let mut reports = Vec::new();
            for source in registry.select(&names)? {
                let outcome = driver.full(source, &opts)?;
                if !json {
                    print!("{}", display::format_speedup_summary(&outcome.reports));
                }
                reports.extend(outcome.reports);
            }

            if json {
                print!("{}", display::format_json(&reports, Utc::now()));
            }
            info!("Done.");
        }
        Command::Checkpoint { names, overrides } => {
            let registry = project_registry(&config, &workdir)?;
            let opts = options(&overrides);
            for source in registry.select(&names)? {
                driver.checkpoint(source, &opts)?;
            }
            info!("Done.");
        }
        Command::Generate { name, instances } => {
            let registry = project_registry(&config, &workdir)?;
            let source = registry.lookup(&name)?;
            let instances = if instances.is_empty() { vec![1] } else { instances };
            for file in driver.generate(source, &instances)? {
                println!("{}", file.display());
            }
        }
        Command::Clean { stats } => {
            clean::clean(&workdir, stats)?;
        }
        Command::List => {
            let registry = project_registry(&config, &workdir)?;
            print!("{}", display::format_benchmark_list(registry.iter()));
        }
        Command::Stats {
            executable,
            arg,
            overrides,
        } => {
            let source = ad_hoc(&executable, Vec::new(), arg, &overrides, &config)?;
            let opts = RunOptions {
                build: false,
                ..options(&overrides)
            };
            driver.checkpoint(&source, &opts)?;
        }
        Command::Diff {
            original,
            candidate,
            arg,
            overrides,
        } => {
            let source = ad_hoc(&original, vec![candidate], arg, &overrides, &config)?;
            let opts = RunOptions {
                build: false,
                ..options(&overrides)
            };
            driver.verify(&source, &opts)?;
        }
        Command::Exe {
            original,
            optimized,
            arg,
            no_plots,
            overrides,
        } => {
            let candidates: Vec<String> = optimized.into_iter().collect();
            let source = ad_hoc(&original, candidates, arg, &overrides, &config)?;
            let opts = RunOptions {
                build: false,
                remeasure: true,
                plots: !no_plots,
                ..options(&overrides)
            };
            let outcome = driver.full(&source, &opts)?;
            print!("{}", display::format_speedup_summary(&outcome.reports));
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let level = match (cli.silent, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    log::init(level);

    let result = std::env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|dir| run(cli, dir));

    if let Err(err) = result {
        eprintln!("{}", err);
        process::exit(1);
    }
}
