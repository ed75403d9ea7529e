#![warn(missing_docs)]
//! PhaseBench CLI Library
//!
//! Suite configuration, the execution engine and the command line surface.
//! Benchmark binaries call `phasebench::run()` (or `phasebench_cli::run()`)
//! from `main` to run suite files against every `#[driver]` they link.
//!
//! # Example
//!
//! ```ignore
//! use phasebench::prelude::*;
//!
//! #[driver(library = "collections")]
//! #[derive(Default)]
//! struct VecPush(Vec<u64>);
//!
//! impl BenchmarkDriver for VecPush {
//!     fn run(&mut self, _tc: &TestCase) -> anyhow::Result<()> {
//!         self.0.push(1);
//!         Ok(())
//!     }
//! }
//!
//! fn main() {
//!     std::process::exit(phasebench_cli::run().unwrap_or(1));
//! }
//! ```

mod config;
pub mod engine;
mod planner;

pub use config::*;
pub use engine::{Console, Engine, EngineError, SharedBuffer, build_report};
pub use planner::{PlanOptions, build_suite, build_suite_with};

use anyhow::Context;
use chrono::Local;
use clap::{Args, CommandFactory, Parser, Subcommand};
use phasebench_core::constants::{DEFAULT_REPORTS_DIRECTORY, REPORTS_DIRECTORY};
use phasebench_core::{DriverLoader, registered_drivers};
use phasebench_report::{copy_to_last, create_run_directory, write_report};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// PhaseBench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "phasebench")]
#[command(author, version, about = "PhaseBench - micro-benchmark harness")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Optional subcommand; defaults to `run`
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Arguments of the implicit `run`
    #[command(flatten)]
    pub run: RunArgs,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one or more suite files (default)
    Run(RunArgs),
    /// List every registered driver class
    List,
}

/// Switches of a suite run
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Emit per-phase diagnostic lines
    #[arg(long)]
    pub verbose: bool,

    /// Do not print errors of failed test cases
    #[arg(long)]
    pub silent: bool,

    /// Skip the HTML report
    #[arg(long)]
    pub nohtml: bool,

    /// Put every test case result on its own line
    #[arg(long)]
    pub line: bool,

    /// One measured iteration per test case, nothing persisted
    #[arg(long)]
    pub test: bool,

    /// Also copy the report directory to `<reportsDirectory>/last`
    #[arg(long)]
    pub last: bool,

    /// Merge several suite files into one suite
    #[arg(long)]
    pub merge: bool,

    /// Suite configuration files
    #[arg(value_name = "CONFIG_FILE")]
    pub files: Vec<PathBuf>,
}

/// Accept the single-dash long flags (`-nohtml`) next to `--nohtml`.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(index, arg)| match arg.to_str() {
            Some(s) if index > 0 && s.len() > 2 && s.starts_with('-') && !s.starts_with("--") => {
                OsString::from(format!("-{s}"))
            }
            _ => arg,
        })
        .collect()
}

/// Run the PhaseBench CLI with the process arguments.
///
/// # Returns
/// The recoverable error count, to be used as the exit status.
pub fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    run_with_cli(cli)
}

/// Run the PhaseBench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Some(Commands::List) => {
            init_tracing(false);
            list_drivers();
            Ok(0)
        }
        Some(Commands::Run(args)) => run_command(&args),
        None => run_command(&cli.run),
    }
}

fn run_command(args: &RunArgs) -> anyhow::Result<i32> {
    init_tracing(args.verbose);

    if args.files.is_empty() || (args.files.len() > 1 && !args.merge) {
        let mut command = Cli::command();
        command.print_help()?;
        println!();
        if args.files.len() > 1 {
            eprintln!("Running more than one suite file requires -merge");
        }
        return Ok(1);
    }

    let errors = run_files(args, DriverLoader::new())?;
    Ok(i32::try_from(errors).unwrap_or(i32::MAX))
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "phasebench=debug" } else { "phasebench=info" };
    // A subscriber may already be installed by an embedding binary or test
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn list_drivers() {
    let mut drivers = registered_drivers();
    drivers.sort_by_key(|d| (d.library, d.class));
    for def in &drivers {
        println!("{}::{} ({}:{})", def.library, def.class, def.file, def.line);
    }
    println!("{} drivers registered.", drivers.len());
}

/// Load, run and report the suite files of `args` with a prepared loader.
///
/// Embedders that register resource sets on `loader` call this directly.
/// Returns the number of recoverable errors.
pub fn run_files(args: &RunArgs, loader: DriverLoader) -> anyhow::Result<usize> {
    let configs = args
        .files
        .iter()
        .map(|path| {
            SuiteConfig::load(path)
                .with_context(|| format!("Failed to load suite file {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let config = SuiteConfig::merge(configs);

    let config_file = args
        .files
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(",");
    let options = PlanOptions {
        test_mode: args.test,
        config_file,
        env_overrides: true,
    };
    let mut suite = build_suite(&config, &options).context("Invalid suite configuration")?;

    let mut engine = Engine::new(loader)
        .with_console(Console::stdout(args.line))
        .silent(args.silent);
    let errors = engine.run(&mut suite).context("Suite run failed")?;

    if args.test {
        info!(suite = suite.name(), errors, "Test mode, no report written");
        return Ok(errors);
    }

    let report = build_report(&suite, errors);
    let base = suite
        .params()
        .get(REPORTS_DIRECTORY)
        .unwrap_or_else(|| DEFAULT_REPORTS_DIRECTORY.to_string());
    let base = Path::new(&base);

    let directory = create_run_directory(base, &Local::now())
        .with_context(|| format!("Failed to create report directory under {}", base.display()))?;
    let written = write_report(&directory, &report, !args.nohtml)
        .with_context(|| format!("Failed to write report into {}", directory.display()))?;
    for path in &written {
        info!(path = %path.display(), "Report written");
    }

    if args.last {
        let last = copy_to_last(base, &directory).context("Failed to update last report")?;
        info!(path = %last.display(), "Copied report");
    }

    Ok(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_single_dash_flags() {
        let args = normalize_args(["phasebench", "-nohtml", "--line", "-v", "suite.toml", "-merge"]);
        let args: Vec<&str> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(args, ["phasebench", "--nohtml", "--line", "-v", "suite.toml", "--merge"]);
    }

    #[test]
    fn test_implicit_run_arguments() {
        let cli = Cli::parse_from(normalize_args(["phasebench", "-test", "-last", "a.toml"]));
        assert!(cli.command.is_none());
        assert!(cli.run.test && cli.run.last);
        assert_eq!(cli.run.files, vec![PathBuf::from("a.toml")]);
    }

    #[test]
    fn test_explicit_subcommands() {
        let cli = Cli::parse_from(normalize_args(["phasebench", "run", "-merge", "a.toml", "b.toml"]));
        match cli.command {
            Some(Commands::Run(args)) => {
                assert!(args.merge);
                assert_eq!(args.files.len(), 2);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::parse_from(["phasebench", "list"]);
        assert!(matches!(cli.command, Some(Commands::List)));
    }

    #[test]
    fn test_usage_errors_return_one() {
        let none = RunArgs::default();
        assert_eq!(run_command(&none).unwrap(), 1);

        let unmerged = RunArgs {
            files: vec![PathBuf::from("a.toml"), PathBuf::from("b.toml")],
            ..RunArgs::default()
        };
        assert_eq!(run_command(&unmerged).unwrap(), 1);
    }

    #[test]
    fn test_missing_suite_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let args = RunArgs {
            files: vec![dir.path().join("absent.toml")],
            ..RunArgs::default()
        };
        let err = run_files(&args, DriverLoader::new()).unwrap_err();
        assert!(err.to_string().contains("Failed to load suite file"));
    }
}
