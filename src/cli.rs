// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::loader::DEFAULT_CONFIG_FILE;
use crate::types::FailureMode;

/// Command-line arguments for `taskpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskpipe",
    version,
    about = "Build a static web front-end from a task graph of file stages.",
    long_about = None
)]
pub struct CliArgs {
    /// What to run. Defaults to `watch`.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the config file (TOML).
    ///
    /// A missing file at the default location is fine: built-in defaults
    /// are used instead.
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKPIPE_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Override `[config].failure_mode` (`continue_siblings` or
    /// `cancel_siblings`).
    #[arg(long, global = true, value_name = "MODE")]
    pub failure_mode: Option<FailureMode>,

    /// Parse + validate, print the task graph, but don't run anything.
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Clean the build dir, then rebuild on every change under the source dir.
    Watch,
    /// Clean, then run the production pipeline (bundles + injection).
    Compile,
    /// Run a single registered task and its dependencies.
    Run {
        /// Task name, e.g. `local:build`.
        task: String,
    },
    /// Print all registered tasks with their dependencies.
    List,
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
