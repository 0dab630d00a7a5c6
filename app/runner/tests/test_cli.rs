//! FILENAME: tests/test_cli.rs
//! Command-line parsing and dispatch.

mod common;

use std::time::Duration;

use app_lib::{Args, Command, RunError};
use chrono::NaiveDate;
use clap::Parser;
use common::*;

fn args(harness: &TestHarness, rest: &[&str]) -> Args {
    let data = harness.data_dir();
    let output = harness.output_dir();
    let logs = harness.log_dir();
    let mut argv = vec![
        "registry-reports".to_string(),
        "--data-dir".to_string(),
        data.display().to_string(),
        "--output-dir".to_string(),
        output.display().to_string(),
        "--log-dir".to_string(),
        logs.display().to_string(),
        "--retry-delay".to_string(),
        "0".to_string(),
    ];
    argv.extend(rest.iter().map(|s| s.to_string()));
    Args::try_parse_from(argv).unwrap()
}

#[test]
fn test_run_arguments() {
    let parsed = Args::try_parse_from([
        "registry-reports",
        "run",
        "unit_areas",
        "--input",
        "below.txt",
        "--input",
        "above.txt",
        "--output",
        "areas.xlsx",
        "--reference-date",
        "2024-06-01",
    ])
    .unwrap();

    assert_eq!(parsed.reference_date, NaiveDate::from_ymd_opt(2024, 6, 1));
    match parsed.command {
        Command::Run { report, inputs, output, descriptor, .. } => {
            assert_eq!(report.as_deref(), Some("unit_areas"));
            assert_eq!(inputs, vec!["below.txt", "above.txt"]);
            assert_eq!(output.as_deref(), Some("areas.xlsx"));
            assert!(descriptor.is_none());
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_bad_reference_date_is_rejected() {
    let parsed = Args::try_parse_from(["registry-reports", "list", "--reference-date", "01/06/2024"]);
    assert!(parsed.is_err());
}

#[test]
fn test_settings_follow_arguments() {
    let harness = TestHarness::new();
    let parsed = args(&harness, &["--reference-date", "2023-01-31", "list"]);
    let settings = parsed.settings();

    assert_eq!(settings.data_dir, harness.data_dir());
    assert_eq!(settings.log_dir, Some(harness.log_dir()));
    assert_eq!(settings.reference_date, NaiveDate::from_ymd_opt(2023, 1, 31).unwrap());
    assert_eq!(settings.retry.delay, Duration::ZERO);
}

#[test]
fn test_run_command_writes_workbook() {
    let harness = TestHarness::new();
    harness.write_input("null_heating_installation.txt", &null_heating_document());

    app_lib::run(args(&harness, &["run", "null_heating_installation"])).unwrap();

    let workbook = read_workbook(&harness.output_path("null_heating_installation.xlsx"));
    assert_eq!(workbook.sheet_names(), vec!["Detailed Data", "Summary"]);
    assert!(harness.log_dir().join("null_heating_installation.log").exists());
}

#[test]
fn test_run_requires_report_or_descriptor() {
    let harness = TestHarness::new();
    let err = app_lib::run(args(&harness, &["run"])).unwrap_err();
    assert!(matches!(err, RunError::Usage(_)));
}

#[test]
fn test_run_from_descriptor_file() {
    let harness = TestHarness::new();
    let mut descriptor = app_lib::catalog::find("null_heating_installation").unwrap();
    descriptor.definition.name = "null_heating_custom".to_string();
    descriptor.inputs = vec!["custom.txt".to_string()];
    let path = harness.root.path().join("custom.json");
    std::fs::write(&path, serde_json::to_string(&descriptor).unwrap()).unwrap();
    harness.write_input("custom.txt", &null_heating_document());

    app_lib::run(args(&harness, &["run", "--descriptor", path.to_str().unwrap()])).unwrap();

    let workbook = read_workbook(&harness.output_path("null_heating_custom.xlsx"));
    assert_eq!(workbook.meta.unwrap().report, "null_heating_custom");
}

#[test]
fn test_run_all_continues_past_failures() {
    let harness = TestHarness::new();
    harness.write_input("null_heating_installation.txt", &null_heating_document());

    let err = app_lib::run(args(&harness, &["run-all"])).unwrap_err();
    match err {
        RunError::BatchFailed { failed, total } => {
            assert_eq!(total, 22);
            assert_eq!(failed, 21);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(harness.output_files(), vec!["null_heating_installation.xlsx".to_string()]);
}

#[test]
fn test_inspect_reads_written_workbook() {
    let harness = TestHarness::new();
    harness.write_input("null_heating_installation.txt", &null_heating_document());
    app_lib::run(args(&harness, &["run", "null_heating_installation"])).unwrap();

    let file = harness.output_path("null_heating_installation.xlsx");
    app_lib::run(args(&harness, &["inspect", file.to_str().unwrap()])).unwrap();
}
