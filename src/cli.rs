// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for `steprun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "steprun",
    version,
    about = "Run numbered job steps in sequence, same-numbered steps in parallel.",
    long_about = None,
    group(ArgGroup::new("source").required(true).args(["dir", "exec"]))
)]
pub struct CliArgs {
    /// Job name. Defaults to the source directory or command name.
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Directory containing step files named `NNN_*`.
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Run a single command instead of a step directory.
    #[arg(long, value_name = "CMD")]
    pub exec: Option<String>,

    /// Really run the job. Without this, only the plan is shown.
    #[arg(long)]
    pub run: bool,

    /// Suppress periodic status output while running.
    #[arg(long)]
    pub quiet: bool,

    /// Send a completion report to this address, regardless of outcome.
    ///
    /// Implies --quiet.
    #[arg(long, value_name = "ADDR")]
    pub email: Option<String>,

    /// Send a completion report to this address only on failure.
    ///
    /// Implies --quiet.
    #[arg(long, value_name = "ADDR")]
    pub email_error: Option<String>,

    /// Path to a TOML file with `[flags.<step>]` override tables.
    #[arg(long, value_name = "PATH")]
    pub flags: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STEPRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
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
