//! FILENAME: app/runner/src/main.rs
// PURPOSE: Command-line entry point with unified logging.
// FORMAT: seq|level|category|message

use std::process::ExitCode;

use app_lib::{logging, Args};
use clap::Parser;
use log::LevelFilter;

fn main() -> ExitCode {
    let args = Args::parse();

    let level = logging::parse_level(&args.log_level).unwrap_or_else(|| {
        eprintln!("[LOG_INIT] Unknown log level '{}', using info", args.log_level);
        LevelFilter::Info
    });
    if let Err(e) = logging::init(level) {
        eprintln!("[LOG_INIT] Logger already installed: {}", e);
    }

    match app_lib::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
