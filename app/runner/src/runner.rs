//! FILENAME: app/runner/src/runner.rs
//! The report pipeline: load, flatten, assemble, write.
//!
//! The workbook is written once, as the last step, after every table has been
//! built in memory. A run that fails at any earlier point leaves no output.

use std::path::{Path, PathBuf};
use std::thread;

use bucket_tree::{flatten, flatten_hits, FlattenContext, FlattenError, Flattened, SearchResponse};
use chrono::Utc;
use persistence::{save_xlsx, ReportMeta, Workbook};
use report_engine::{assemble, ReportRows, RowSource};
use serde::Serialize;

use crate::catalog::ReportDescriptor;
use crate::context::{RetryPolicy, RunContext};
use crate::error::RunError;
use crate::logging;

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub report: String,
    pub output: PathBuf,
    pub sheets: Vec<String>,
    pub rows: usize,
    pub total_hits: u64,
    pub partial: bool,
}

/// Rows of one run plus the document totals that travel into the metadata.
struct LoadedRows {
    rows: ReportRows,
    total_hits: u64,
    partial: bool,
}

/// Runs one report, writing its log lines to the context's log file if set.
pub fn run_report(descriptor: &ReportDescriptor, ctx: &RunContext) -> Result<RunOutcome, RunError> {
    if let Some(path) = &ctx.log_path {
        if let Err(e) = logging::open_log_file(path) {
            log::warn!("could not open log file {}: {}", path.display(), e);
        }
    }

    let result = execute(descriptor, ctx);
    match &result {
        Ok(_) => log::info!("Report {} completed successfully", ctx.report),
        Err(e) => log::error!("Error: {}", e),
    }

    if ctx.log_path.is_some() {
        logging::close_log_file();
    }
    result
}

fn execute(descriptor: &ReportDescriptor, ctx: &RunContext) -> Result<RunOutcome, RunError> {
    log::info!("Running report {} ({})", ctx.report, descriptor.description);

    for path in ctx.all_inputs() {
        if !path.exists() {
            log::error!("Input file not found at {}", path.display());
            return Err(FlattenError::MissingInputFile(path.to_path_buf()).into());
        }
    }

    let loaded = with_retry(&ctx.retry, || load_rows(descriptor, ctx))?;

    if loaded.partial {
        log::warn!("The query timed out. Partial results may be present.");
    }
    log::info!("Total hits: {}", loaded.total_hits);
    if loaded.rows.row_count() == 0 {
        log::info!("No data matches the criteria. Empty results will be saved.");
    } else {
        log::info!("Data processed: {} rows", loaded.rows.row_count());
    }

    let tables = assemble(&descriptor.definition, &loaded.rows)?;
    let sheets = tables.iter().map(|t| t.name.clone()).collect();

    let meta = ReportMeta::new(
        &ctx.report,
        Utc::now().to_rfc3339(),
        loaded.total_hits,
        loaded.partial,
    );
    save_xlsx(&Workbook::from_tables(tables, meta), &ctx.output)?;
    log::info!("Results saved to {}", ctx.output.display());

    Ok(RunOutcome {
        report: ctx.report.clone(),
        output: ctx.output.clone(),
        sheets,
        rows: loaded.rows.row_count(),
        total_hits: loaded.total_hits,
        partial: loaded.partial,
    })
}

fn load_rows(descriptor: &ReportDescriptor, ctx: &RunContext) -> Result<LoadedRows, RunError> {
    match &descriptor.definition.source {
        RowSource::Buckets { spec, baseline } => {
            let flatten_ctx = FlattenContext::new(ctx.reference_date);

            let mut main = Flattened::default();
            for path in &ctx.inputs {
                let response = SearchResponse::load(path)?;
                log::debug!("{}: {} hits", path.display(), response.total_hits);
                main.extend(flatten(&response, spec, &flatten_ctx)?);
            }

            let baseline = match (baseline, &ctx.baseline) {
                (Some(spec), Some(path)) => {
                    let response = SearchResponse::load(path)?;
                    Some(flatten(&response, spec, &flatten_ctx)?)
                }
                (Some(_), None) => {
                    return Err(RunError::Usage(format!("{}: no baseline input configured", ctx.report)));
                }
                (None, _) => None,
            };

            let total_hits = main.total_hits;
            let partial = main.partial || baseline.as_ref().map_or(false, |b| b.partial);
            Ok(LoadedRows {
                rows: ReportRows::Buckets { main, baseline },
                total_hits,
                partial,
            })
        }
        RowSource::Hits(spec) => {
            let mut docs = Vec::new();
            let mut total_hits = 0;
            let mut partial = false;
            for path in &ctx.inputs {
                let response = SearchResponse::load(path)?;
                total_hits += response.total_hits;
                partial |= response.partial;
                docs.extend(flatten_hits(&response, spec));
            }
            Ok(LoadedRows {
                rows: ReportRows::Hits(docs),
                total_hits,
                partial,
            })
        }
    }
}

/// Calls `op` until it succeeds or the policy's attempts are used up,
/// sleeping `delay` between attempts. The last error is returned.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    mut op: impl FnMut() -> Result<T, RunError>,
) -> Result<T, RunError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                log::error!("Query failed. Retry attempt {}/{}: {}", attempt, attempts, e);
                thread::sleep(policy.delay);
                attempt += 1;
            }
            Err(e) => {
                if attempts > 1 {
                    log::error!("Query failed. Retry attempt {}/{}: {}", attempt, attempts, e);
                }
                return Err(e);
            }
        }
    }
}

// ============================================================================
// BATCH
// ============================================================================

/// One entry of a batch summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub report: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

/// Runs every `(descriptor, context)` pair in order, continuing past
/// failures.
pub fn run_batch<'a>(
    runs: impl IntoIterator<Item = (&'a ReportDescriptor, Result<RunContext, RunError>)>,
) -> Vec<RunSummary> {
    runs.into_iter()
        .map(|(descriptor, ctx)| {
            let result = ctx.and_then(|ctx| run_report(descriptor, &ctx));
            match result {
                Ok(outcome) => RunSummary {
                    report: outcome.report,
                    status: RunStatus::Success,
                    output: Some(outcome.output),
                    error: None,
                },
                Err(e) => RunSummary {
                    report: descriptor.name().to_string(),
                    status: RunStatus::Failed,
                    output: None,
                    error: Some(e.to_string()),
                },
            }
        })
        .collect()
}

/// Existing output file of `descriptor` under `dir`, if a previous run left one.
pub fn existing_output(descriptor: &ReportDescriptor, dir: &Path) -> Option<PathBuf> {
    let path = dir.join(descriptor.output_file());
    path.exists().then_some(path)
}
