//! Remove the PIE flag from an ELF64 executable.
//!
//! ```bash
//! trip-fix-pie target/release/trip
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Clear DF_1_PIE in DT_FLAGS_1 so glibc will dlopen the file.
#[derive(Parser, Debug)]
#[command(name = "trip-fix-pie")]
#[command(version, about, long_about = None)]
struct Cli {
    /// The executable ELF64 file to patch in place.
    #[arg(value_name = "ELF64-FILE")]
    path: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

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

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("trip-fix-pie: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let entry = trip_fix_pie::clear_pie_flag(&cli.path)
        .with_context(|| format!("Failed to patch {}", cli.path.display()))?;
    info!(
        path = %cli.path.display(),
        offset = entry.offset,
        flags = format_args!("{:#x}", entry.value),
        "cleared PIE flag"
    );
    Ok(())
}
