//! vmb - Vermintide Mod Builder
//!
//! Main entry point for the command-line tool.
//!
//! # Execution Flow
//!
//! 1. Parse arguments with clap
//! 2. Initialize logging (stderr, plus daily files under `--log-dir`)
//! 3. Load `.vmbrc`, creating it with defaults on first run, and apply the
//!    per-run overrides
//! 4. Run the selected task on a current-thread tokio runtime
//!
//! # Exit Codes
//!
//! - `0`: every mod succeeded
//! - `1`: the task or at least one mod failed
//! - `2`: the config couldn't be loaded

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use std::process::ExitCode;
use vmb::cli::Cli;
use vmb::tasks::{self, EXIT_CONFIG_FAILED, EXIT_TASK_FAILED, TaskContext};
use vmb::{APP_NAME, VERSION};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug = cli.global.debug;

    let _guard = match vmb::logging::setup_logging(debug, cli.global.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            report_error(&e, debug);
            return ExitCode::from(EXIT_TASK_FAILED);
        }
    };

    tracing::debug!("Starting {} v{}", APP_NAME, VERSION);

    let cwd = match current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            report_error(&e, debug);
            return ExitCode::from(EXIT_TASK_FAILED);
        }
    };

    let mut ctx = match TaskContext::load(&cli.global, &cwd) {
        Ok(ctx) => ctx,
        Err(e) => {
            report_error(&anyhow::Error::new(e), debug);
            return ExitCode::from(EXIT_CONFIG_FAILED);
        }
    };

    // Every task is sequential, so a single-threaded runtime is enough
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")
    {
        Ok(runtime) => runtime,
        Err(e) => {
            report_error(&e, debug);
            return ExitCode::from(EXIT_TASK_FAILED);
        }
    };

    match runtime.block_on(tasks::run(&mut ctx, &cli.command)) {
        Ok(summary) => ExitCode::from(summary.exit_code()),
        Err(e) => {
            report_error(&e, debug);
            ExitCode::from(EXIT_TASK_FAILED)
        }
    }
}

fn current_dir() -> anyhow::Result<Utf8PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Utf8PathBuf::from_path_buf(cwd).map_err(|path| anyhow::anyhow!("Current directory {} is not UTF-8", path.display()))
}

/// Message only by default, the whole chain with `--debug`.
fn report_error(error: &anyhow::Error, debug: bool) {
    if debug {
        eprintln!("error: {error:?}");
    } else {
        eprintln!("error: {error:#}");
    }
}
