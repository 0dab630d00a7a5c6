//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for report runner integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use app_lib::{catalog, run_report, RetryPolicy, RunContext, RunError, RunOutcome, RunOverrides, Settings};
use chrono::NaiveDate;
use engine::{CellValue, ReportTable};
use persistence::{load_xlsx, Workbook};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Scratch data/output/log directories for one test.
pub struct TestHarness {
    pub root: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(root.path().join("data")).expect("create data dir");
        TestHarness { root }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.path().join("data")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("output")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.path().join("logs")
    }

    pub fn settings(&self) -> Settings {
        Settings::new(self.data_dir(), self.output_dir())
            .with_log_dir(self.log_dir())
            .with_reference_date(NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date"))
            .with_retry(RetryPolicy::new(3, Duration::ZERO))
    }

    /// Writes a retrieved document into the data directory.
    pub fn write_input(&self, name: &str, doc: &Value) -> PathBuf {
        let path = self.data_dir().join(name);
        fs::write(&path, serde_json::to_string_pretty(doc).expect("serialize")).expect("write input");
        path
    }

    pub fn write_raw_input(&self, name: &str, raw: &str) -> PathBuf {
        let path = self.data_dir().join(name);
        fs::write(&path, raw).expect("write input");
        path
    }

    pub fn run(&self, report: &str) -> Result<RunOutcome, RunError> {
        self.run_with(report, RunOverrides::default())
    }

    pub fn run_with(&self, report: &str, overrides: RunOverrides) -> Result<RunOutcome, RunError> {
        let descriptor = catalog::find(report)?;
        let ctx = RunContext::resolve(&self.settings(), &descriptor, &overrides)?;
        run_report(&descriptor, &ctx)
    }

    pub fn output_path(&self, file: &str) -> PathBuf {
        self.output_dir().join(file)
    }

    /// Names of every file left in the output directory.
    pub fn output_files(&self) -> Vec<String> {
        match fs::read_dir(self.output_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub fn read_workbook(path: &Path) -> Workbook {
    load_xlsx(path).expect("read back workbook")
}

/// Value cell of a `{Metric, Value}` line.
pub fn metric<'a>(table: &'a ReportTable, label: &str) -> &'a CellValue {
    table
        .metric(label)
        .unwrap_or_else(|| panic!("no summary line '{}' in {}", label, table.name))
}

/// Cells of a row rendered as display strings.
pub fn row_text(table: &ReportTable, idx: usize) -> Vec<String> {
    table.rows[idx].iter().map(CellValue::display_value).collect()
}

// ============================================================================
// FIXTURES
// ============================================================================

pub fn hits_total(value: u64) -> Value {
    json!({ "total": { "value": value, "relation": "eq" }, "hits": [] })
}

pub fn bucket(key: Value, doc_count: u64) -> Value {
    json!({ "key": key, "doc_count": doc_count })
}

/// Adds a named child aggregation to a bucket.
pub fn with_child(mut bucket: Value, name: &str, buckets: Vec<Value>) -> Value {
    bucket[name] = json!({ "buckets": buckets });
    bucket
}

pub fn response(total: u64, root: &str, buckets: Vec<Value>) -> Value {
    json!({
        "timed_out": false,
        "hits": hits_total(total),
        "aggregations": { root: { "buckets": buckets } }
    })
}

/// Municipality 101 with 100 units: usage 120 holds 80 of them, 50 of which
/// have medium 1.
pub fn null_heating_document() -> Value {
    let usage = with_child(bucket(json!(120), 80), "heatingMediums", vec![bucket(json!(1), 50)]);
    let municipality = with_child(bucket(json!("101"), 100), "units_usage", vec![usage]);
    response(100, "municipalities", vec![municipality])
}

pub fn address_document(sources: Vec<Value>) -> Value {
    let total = sources.len() as u64;
    let hits: Vec<Value> = sources.into_iter().map(|s| json!({ "_source": s })).collect();
    json!({
        "timed_out": false,
        "hits": { "total": { "value": total, "relation": "eq" }, "hits": hits }
    })
}

pub fn upstream_error_document() -> Value {
    json!({
        "error": {
            "type": "search_phase_execution_exception",
            "reason": "all shards failed"
        },
        "status": 400
    })
}
