//! FILENAME: app/runner/src/args.rs

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Command-line arguments of the registry-reports binary
#[derive(Debug, Parser)]
#[command(
    name = "registry-reports",
    about = "Turns retrieved search aggregation documents into XLSX reports",
    version
)]
pub struct Args {
    /// Directory holding the retrieved input documents
    #[arg(long, env = "DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Directory the workbooks are written to
    #[arg(long, env = "OUTPUT_DIR", default_value = "output", global = true)]
    pub output_dir: PathBuf,

    /// Directory for per-report log files
    #[arg(long, env = "LOG_DIR", default_value = "logs", global = true)]
    pub log_dir: PathBuf,

    /// Log level: error, warn, info, debug, trace or off
    #[arg(long, env = "REPORTS_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Date ages are measured against (YYYY-MM-DD); defaults to today
    #[arg(long, value_parser = parse_date, global = true)]
    pub reference_date: Option<NaiveDate>,

    /// Seconds to wait between attempts of retrying reports
    #[arg(long, env = "REPORTS_RETRY_DELAY", default_value_t = 10, global = true)]
    pub retry_delay: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the built-in reports
    List,

    /// Run one report
    Run {
        /// Report name (a trailing `.py` is accepted)
        report: Option<String>,

        /// Input file name, relative to the data directory (repeatable)
        #[arg(long = "input", env = "INPUT_FILE")]
        inputs: Vec<String>,

        /// Baseline input for coverage reports
        #[arg(long)]
        baseline: Option<String>,

        /// Output file name, relative to the output directory
        #[arg(long, env = "OUTPUT_FILE")]
        output: Option<String>,

        /// Run a report described by a JSON descriptor file instead
        #[arg(long)]
        descriptor: Option<PathBuf>,
    },

    /// Run every built-in report, continuing past failures
    RunAll,

    /// Print the sheets and metadata of a written workbook
    Inspect {
        file: PathBuf,
    },
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}
