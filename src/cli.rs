// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `pollwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pollwatch",
    version,
    about = "Poll directories for changes and dispatch them to file handlers.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Pollwatch.toml` in the current working directory. The file
    /// may be absent when at least one `--root` is given.
    #[arg(long, value_name = "PATH", default_value = "Pollwatch.toml")]
    pub config: String,

    /// Directory to watch. Repeatable; replaces `[watch].roots` when given.
    #[arg(long = "root", value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `POLLWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print roots and handlers, but don't watch anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Stop after this many ticks instead of running until Ctrl-C.
    #[arg(long, value_name = "N")]
    pub ticks: Option<u64>,
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
