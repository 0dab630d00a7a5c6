//! FILENAME: app/runner/src/lib.rs
// PURPOSE: Report runner: catalog, per-run context, pipeline and CLI dispatch.

use std::time::Duration;

use persistence::load_xlsx;
use serde_json::json;

pub mod args;
pub mod catalog;
pub mod context;
pub mod error;
pub mod logging;
pub mod runner;

pub use args::{Args, Command};
pub use catalog::ReportDescriptor;
pub use context::{RetryPolicy, RunContext, RunOverrides, Settings};
pub use error::RunError;
pub use runner::{run_batch, run_report, with_retry, RunOutcome, RunStatus, RunSummary};

impl Args {
    /// Process-wide settings shared by every run of this invocation.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::new(&self.data_dir, &self.output_dir)
            .with_log_dir(&self.log_dir)
            .with_retry(RetryPolicy::new(
                RetryPolicy::DEFAULT_ATTEMPTS,
                Duration::from_secs(self.retry_delay),
            ));
        if let Some(date) = self.reference_date {
            settings = settings.with_reference_date(date);
        }
        settings
    }
}

/// Executes the parsed command line.
pub fn run(args: Args) -> Result<(), RunError> {
    let settings = args.settings();

    match args.command {
        Command::List => {
            for descriptor in catalog::all() {
                let marker = match runner::existing_output(descriptor, &settings.output_dir) {
                    Some(_) => "*",
                    None => " ",
                };
                println!("{} {:<50} {}", marker, descriptor.name(), descriptor.description);
            }
            Ok(())
        }

        Command::Run {
            report,
            inputs,
            baseline,
            output,
            descriptor,
        } => {
            let descriptor = match (descriptor, report) {
                (Some(path), _) => ReportDescriptor::load(&path)?,
                (None, Some(name)) => catalog::find(&name)?,
                (None, None) => {
                    return Err(RunError::Usage(
                        "name a report or pass --descriptor".to_string(),
                    ))
                }
            };
            let overrides = RunOverrides {
                inputs,
                baseline,
                output,
            };
            let ctx = RunContext::resolve(&settings, &descriptor, &overrides)?;
            let outcome = run_report(&descriptor, &ctx)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }

        Command::RunAll => {
            let defaults = RunOverrides::default();
            let results = run_batch(
                catalog::all()
                    .iter()
                    .map(|d| (d, RunContext::resolve(&settings, d, &defaults))),
            );
            let failed = results.iter().filter(|r| r.status == RunStatus::Failed).count();

            let summary = json!({
                "message": "All reports executed",
                "results": results,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);

            if failed > 0 {
                return Err(RunError::BatchFailed {
                    failed,
                    total: results.len(),
                });
            }
            Ok(())
        }

        Command::Inspect { file } => {
            let workbook = load_xlsx(&file)?;
            for sheet in &workbook.sheets {
                println!("{:<32} {:>8} rows  {}", sheet.name, sheet.row_count(), sheet.headers.join(", "));
            }
            if let Some(meta) = &workbook.meta {
                println!("{}", serde_json::to_string_pretty(meta)?);
            }
            Ok(())
        }
    }
}
