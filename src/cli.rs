// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `steadybuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "steadybuild",
    version,
    about = "Run build tasks in dependency order and compile sources incrementally.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the build definition (TOML).
    #[arg(long, value_name = "PATH", default_value = "Steadybuild.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STEADYBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the task graph, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Run only the dependencies of the requested tasks.
    #[arg(long)]
    pub deps_only: bool,

    /// After the first run, re-run the requested tasks whenever sources change.
    #[arg(long)]
    pub watch: bool,

    /// Print the tests found by the compiler after the run.
    #[arg(long)]
    pub list_tests: bool,

    /// Tasks to run, in order. Defaults to `compile` when `[compile]` is set.
    #[arg(value_name = "TASK")]
    pub tasks: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
