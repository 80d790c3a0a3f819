//! `flowclone` command line tool.
//!
//! Copies the rows of a Postgres table into another Postgres table with a bounded number of
//! concurrent writes, then prints how many records succeeded and failed.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use flowclone_config::{DEFAULT_CONFIG_FILE_NAME, usage_template};
use flowclone_telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::load_clone_config;
use crate::core::{CloneReport, run_clone};
use crate::error::{CliError, CliResult};

mod config;
mod core;
mod error;

/// Exit code used when the run was interrupted with Ctrl+C.
const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Copies records between two Postgres tables with bounded concurrency.
#[derive(Parser, Debug)]
#[command(name = "flowclone", version)]
#[command(about = "Copies records between two Postgres tables with bounded concurrency")]
struct Args {
    /// Path of the configuration file.
    #[arg(default_value = DEFAULT_CONFIG_FILE_NAME)]
    config: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if !args.config.is_file() {
        print_usage(&args.config);
        return ExitCode::FAILURE;
    }

    match main_impl(&args.config) {
        Ok(report) => {
            println!("{}", report.summary());

            if report.interrupted {
                ExitCode::from(INTERRUPTED_EXIT_CODE)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            error!("{err}");
            eprint!("{}", err.render_report());

            ExitCode::FAILURE
        }
    }
}

fn main_impl(config_path: &Path) -> CliResult<CloneReport> {
    init_tracing(env!("CARGO_BIN_NAME")).map_err(CliError::config)?;

    let config = load_clone_config(config_path)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run_clone(config))
}

fn print_usage(config_path: &Path) {
    let file_name = config_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE_NAME.to_string());

    print!(
        "{}",
        usage_template(&file_name, chrono::Local::now().date_naive())
    );
}
