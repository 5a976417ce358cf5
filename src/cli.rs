// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `ngshell`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ngshell",
    version,
    about = "Serve a desktop shell app: keep the front-end build, the native sources and the shell process in sync.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the project config file (JSON).
    ///
    /// `angular.json` and `ngshell.toml` are looked up next to it.
    #[arg(long, value_name = "PATH", default_value = "ngshell.json")]
    pub config: PathBuf,

    /// Front-end project to build (defaults to `defaultProject` in angular.json).
    #[arg(long, value_name = "NAME")]
    pub project: Option<String>,

    /// Clear and recreate the output directories before starting.
    #[arg(long)]
    pub fresh: bool,

    /// Attach an inspector to the shell process on the given port (5858 when
    /// no port is given).
    #[arg(
        long,
        value_name = "PORT",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "5858"
    )]
    pub inspect: Option<u16>,

    /// Seconds to wait after the last change before restarting the shell.
    #[arg(long, value_name = "SECONDS")]
    pub delay: Option<f64>,

    /// Build the front-end with the production configuration.
    #[arg(long)]
    pub prod: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `NGSHELL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve configuration and print the commands, but don't spawn anything.
    #[arg(long)]
    pub dry_run: bool,
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
