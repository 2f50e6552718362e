//! trip: make C-library calls fail at random.
//!
//! # Quick Start
//!
//! ```bash
//! # Fail half of all open() calls with ENOENT
//! trip open:0.5:ENOENT ./target --flag
//!
//! # Several rules, each as its own argument
//! trip malloc:0.01 write:EIO -- ./target
//!
//! # What can be tripped, and how?
//! trip --list
//! trip --errors open
//! trip --scan ./target
//! ```

mod commands;
mod style;

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;
use trip_config::{ConfigLoader, TripConfig};

use crate::style::print_error;

/// trip - make libc calls in a program fail at random.
///
/// Each SPEC is `func[:chance[:error]]`: fail `func` with probability `chance`
/// (default 1), reporting `error` (default: any error `func` may plausibly
/// return). Several SPECs can be joined with commas, or given as separate
/// arguments ended by `--`.
#[derive(Parser, Debug)]
#[command(name = "trip")]
#[command(version, about, long_about)]
#[command(override_usage = "trip [OPTIONS] SPEC[,SPEC...] [--] COMMAND [ARGS...]")]
struct Cli {
    /// List the functions that can be tripped.
    #[arg(short, long, conflicts_with_all = ["errors", "scan", "show_config"])]
    list: bool,

    /// List the errors FUNC may be tripped with.
    #[arg(short, long, value_name = "FUNC", conflicts_with_all = ["scan", "show_config"])]
    errors: Option<String>,

    /// List the trippable functions an executable imports.
    #[arg(short, long, value_name = "EXE", conflicts_with = "show_config")]
    scan: Option<PathBuf>,

    /// Log what trip decides, here and in the target.
    #[arg(short, long)]
    debug: bool,

    /// Read settings from FILE on top of the usual config files.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    show_config: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,

    /// Fault rules followed by the command to run.
    #[arg(
        value_name = "ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    args: Vec<OsString>,
}

fn main() -> ExitCode {
    // Refuse to nest: the target would inherit two layers of rules.
    if trip::relaunch::configuration_present() {
        eprintln!("Don't trip me");
        return ExitCode::FAILURE;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    style::set_no_color(cli.no_color);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_file(path);
    }
    let config = loader.load().context("Failed to load trip configuration")?;

    init_logging(&config, cli.debug);

    if cli.show_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }
    if cli.list {
        commands::list::run();
        return Ok(());
    }
    if let Some(function) = &cli.errors {
        return commands::errors::run(function);
    }
    if let Some(path) = &cli.scan {
        return commands::scan::run(path);
    }
    if cli.args.len() == 1 && cli.args[0] == "version" {
        commands::version::run();
        return Ok(());
    }

    let invocation = commands::run::Invocation::split(&cli.args)?;
    commands::run::run(&config, &invocation, cli.debug)
}

fn init_logging(config: &TripConfig, debug: bool) {
    let directive = if debug { "debug" } else { config.log.filter.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
