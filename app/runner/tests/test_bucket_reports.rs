//! FILENAME: tests/test_bucket_reports.rs
//! End-to-end runs of aggregation-tree reports: input document to workbook.

mod common;

use common::*;
use engine::CellValue;
use serde_json::json;

// ============================================================================
// HEATING REPORTS
// ============================================================================

#[test]
fn test_null_heating_installation_workbook() {
    let harness = TestHarness::new();
    harness.write_input("null_heating_installation.txt", &null_heating_document());

    let outcome = harness.run("null_heating_installation").unwrap();
    assert_eq!(outcome.output, harness.output_path("null_heating_installation.xlsx"));
    assert_eq!(outcome.rows, 3);
    assert_eq!(outcome.total_hits, 100);
    assert!(!outcome.partial);

    let workbook = read_workbook(&outcome.output);
    assert_eq!(workbook.sheet_names(), vec!["Detailed Data", "Summary"]);

    let detail = workbook.sheet("Detailed Data").unwrap();
    assert_eq!(detail.headers, vec!["municipality_code", "unit_usage", "heating_medium", "count"]);
    assert_eq!(row_text(detail, 0), vec!["101", "No specific usage", "No medium", "20"]);
    assert_eq!(row_text(detail, 1), vec!["101", "120", "No specific medium", "30"]);
    assert_eq!(row_text(detail, 2), vec!["101", "120", "1", "50"]);

    let summary = workbook.sheet("Summary").unwrap();
    assert_eq!(metric(summary, "Total units with Null Heating Installation"), &CellValue::Number(100.0));
    assert_eq!(metric(summary, "Unit Usage 120"), &CellValue::Number(80.0));
    assert_eq!(metric(summary, "Unit Usage No specific usage"), &CellValue::Number(20.0));
    assert_eq!(metric(summary, "Heating Medium 1"), &CellValue::Number(50.0));
    assert_eq!(metric(summary, "Heating Medium No medium"), &CellValue::Number(20.0));
    assert_eq!(metric(summary, "Top Combination 1"), &CellValue::text("120,1: 50"));
    assert_eq!(metric(summary, "Top Combination 2"), &CellValue::text("120,No specific medium: 30"));
    assert_eq!(metric(summary, "Top Combination 4"), &CellValue::text("n/a"));
}

#[test]
fn test_detail_counts_add_up_to_hits() {
    let harness = TestHarness::new();
    harness.write_input("null_heating_installation.txt", &null_heating_document());

    let outcome = harness.run("null_heating_installation").unwrap();
    let workbook = read_workbook(&outcome.output);
    let detail = workbook.sheet("Detailed Data").unwrap();

    let sum: f64 = detail
        .column("count")
        .into_iter()
        .filter_map(CellValue::as_number)
        .sum();
    assert_eq!(sum, 100.0);
}

#[test]
fn test_metadata_sheet_is_hidden_from_tables() {
    let harness = TestHarness::new();
    harness.write_input("null_heating_installation.txt", &null_heating_document());

    let outcome = harness.run("null_heating_installation").unwrap();
    let workbook = read_workbook(&outcome.output);

    let meta = workbook.meta.as_ref().expect("metadata present");
    assert_eq!(meta.report, "null_heating_installation");
    assert_eq!(meta.total_hits, 100);
    assert!(!meta.partial);
    assert!(!workbook.sheet_names().contains(&persistence::META_SHEET_NAME));
}

#[test]
fn test_zero_hits_writes_empty_report() {
    let harness = TestHarness::new();
    harness.write_input("heating_matrix.txt", &response(0, "municipalities", vec![]));

    let outcome = harness.run("heating_matrix").unwrap();
    assert_eq!(outcome.rows, 0);

    let workbook = read_workbook(&outcome.output);
    let detail = workbook.sheet("Detailed Data").unwrap();
    assert_eq!(detail.headers, vec!["municipality_code", "installation_code", "medium_code", "count"]);
    assert!(detail.is_empty());

    let summary = workbook.sheet("Summary").unwrap();
    assert_eq!(metric(summary, "Total Installations"), &CellValue::Number(0.0));
    assert_eq!(metric(summary, "Top Combination 1"), &CellValue::text("n/a"));
    assert_eq!(metric(summary, "Top Combination 5"), &CellValue::text("n/a"));
}

#[test]
fn test_timed_out_document_still_produces_report() {
    let harness = TestHarness::new();
    let mut doc = null_heating_document();
    doc["timed_out"] = json!(true);
    harness.write_input("null_heating_installation.txt", &doc);

    let outcome = harness.run("null_heating_installation").unwrap();
    assert!(outcome.partial);

    let workbook = read_workbook(&outcome.output);
    assert!(workbook.meta.unwrap().partial);
}

// ============================================================================
// AREA REPORTS
// ============================================================================

#[test]
fn test_unit_areas_concatenates_both_inputs() {
    let harness = TestHarness::new();

    let below = {
        let areas = vec![bucket(json!(40), 6), bucket(json!(60), 4)];
        let usage = with_child(bucket(json!(120), 10), "unit_areas", areas);
        let municipality = with_child(bucket(json!("101"), 10), "unit_usage", vec![usage]);
        response(10, "municipalities", vec![municipality])
    };
    let above = {
        let mut usage = bucket(json!(120), 2);
        usage["unit_areas"] = json!({ "buckets": [] });
        usage["large_units"] = json!({ "doc_count": 2 });
        let municipality = with_child(bucket(json!("101"), 2), "unit_usage", vec![usage]);
        response(2, "municipalities", vec![municipality])
    };
    harness.write_input("unit_areas_below_900.txt", &below);
    harness.write_input("unit_areas_above_900.txt", &above);

    let outcome = harness.run("unit_areas").unwrap();
    assert_eq!(outcome.total_hits, 12);

    let workbook = read_workbook(&outcome.output);
    let detail = workbook.sheet("Detailed Data").unwrap();
    let ranges: Vec<String> = detail.column("area_range").iter().map(|c| c.display_value()).collect();
    assert_eq!(ranges, vec!["40-60", "60-80", "900+"]);

    let stats = workbook.sheet("Summary Statistics").unwrap();
    assert_eq!(stats.headers, vec!["Unit Usage", "Area Range", "Avg Units", "Max Units", "Min Units"]);
    let last = stats.row_count() - 1;
    assert_eq!(stats.rows[last][0], CellValue::text("Total"));
}

// ============================================================================
// ENERGY LABEL REPORTS
// ============================================================================

#[test]
fn test_energy_labels_coverage_against_total_units() {
    let harness = TestHarness::new();

    let labels = response(
        15,
        "municipalities",
        vec![
            with_child(
                bucket(json!("101"), 10),
                "energy_label",
                vec![bucket(json!("A"), 4), bucket(json!("B"), 6)],
            ),
            with_child(bucket(json!("202"), 5), "energy_label", vec![bucket(json!("A"), 5)]),
        ],
    );
    let units = response(
        70,
        "municipalities",
        vec![
            bucket(json!("101"), 40),
            bucket(json!("202"), 10),
            bucket(json!("303"), 20),
        ],
    );
    harness.write_input("energy_labels.txt", &labels);
    harness.write_input("total_units.txt", &units);

    let outcome = harness.run("energy_labels").unwrap();
    let workbook = read_workbook(&outcome.output);
    assert_eq!(workbook.sheet_names(), vec!["Detailed Data", "Summary", "Municipality Data"]);

    let coverage = workbook.sheet("Municipality Data").unwrap();
    assert_eq!(
        coverage.headers,
        vec!["municipality_code", "total_units", "labeled_buildings", "label_percentage", "label_A", "label_B"]
    );
    assert_eq!(row_text(coverage, 0), vec!["101", "40", "10", "25", "4", "6"]);
    assert_eq!(coverage.rows[1][0], CellValue::text("303"));
    assert_eq!(coverage.rows[1][2], CellValue::Number(0.0));
    assert_eq!(coverage.rows[2][3], CellValue::Number(50.0));

    let summary = workbook.sheet("Summary").unwrap();
    assert_eq!(metric(summary, "Total Units"), &CellValue::Number(70.0));
    assert_eq!(metric(summary, "Total Labeled Buildings"), &CellValue::Number(15.0));
    assert_eq!(metric(summary, "Overall Label Percentage"), &CellValue::text("21.43%"));
    assert_eq!(metric(summary, "Total A"), &CellValue::Number(9.0));
    assert_eq!(metric(summary, "A Percentage"), &CellValue::text("60.00%"));
    assert_eq!(metric(summary, "B Percentage"), &CellValue::text("40.00%"));
}

#[test]
fn test_energy_labels_summary_ignores_unlabeled_units() {
    let harness = TestHarness::new();

    // 30 units in 101, only 20 of them carry a label bucket.
    let labels = response(
        30,
        "municipalities",
        vec![with_child(bucket(json!("101"), 30), "energy_label", vec![bucket(json!("B"), 20)])],
    );
    let units = response(40, "municipalities", vec![bucket(json!("101"), 40)]);
    harness.write_input("energy_labels.txt", &labels);
    harness.write_input("total_units.txt", &units);

    let outcome = harness.run("energy_labels").unwrap();
    let workbook = read_workbook(&outcome.output);

    let coverage = workbook.sheet("Municipality Data").unwrap();
    assert_eq!(row_text(coverage, 0), vec!["101", "40", "20", "50", "20"]);

    let summary = workbook.sheet("Summary").unwrap();
    assert_eq!(metric(summary, "Total Labeled Buildings"), &CellValue::Number(20.0));
    assert_eq!(metric(summary, "Overall Label Percentage"), &CellValue::text("50.00%"));
    assert_eq!(metric(summary, "Total B"), &CellValue::Number(20.0));
    assert_eq!(metric(summary, "B Percentage"), &CellValue::text("100.00%"));
    assert!(summary.metric("Total No specific value").is_none());
    assert!(summary.metric("No specific value Percentage").is_none());
}

#[test]
fn test_validity_ratio_and_overall_summary() {
    let harness = TestHarness::new();

    let validity = |valid: u64, invalid: u64| {
        vec![
            json!({ "key": 1, "key_as_string": "true", "doc_count": valid }),
            json!({ "key": 0, "key_as_string": "false", "doc_count": invalid }),
        ]
    };
    let doc = response(
        10,
        "municipalities",
        vec![
            with_child(bucket(json!("101"), 8), "energy_label_validity", validity(2, 6)),
            with_child(bucket(json!("202"), 2), "energy_label_validity", validity(2, 0)),
        ],
    );
    harness.write_input("unit_usage_140_vs_energy_label_validity.txt", &doc);

    let outcome = harness.run("unit_usage_140_vs_energy_label_validity").unwrap();
    assert_eq!(outcome.output, harness.output_path("unit_usage_140_energy_label_analysis.xlsx"));

    let workbook = read_workbook(&outcome.output);
    let ratio = workbook.sheet("Municipality Data").unwrap();
    assert_eq!(
        ratio.headers,
        vec!["municipality_code", "total_units", "valid_energy_labels", "percentage_valid"]
    );
    assert_eq!(row_text(ratio, 0), vec!["202", "2", "2", "100"]);
    assert_eq!(row_text(ratio, 1), vec!["101", "8", "2", "25"]);

    let summary = workbook.sheet("Summary").unwrap();
    assert_eq!(metric(summary, "Total Units"), &CellValue::Number(10.0));
    assert_eq!(metric(summary, "Total Valid Energy Labels"), &CellValue::Number(4.0));
    assert_eq!(metric(summary, "Overall Percentage"), &CellValue::text("40.00%"));
}

#[test]
fn test_energy_label_age_uses_reference_date() {
    let harness = TestHarness::new();

    let ages = vec![
        json!({ "key": 1_559_347_200_000_i64, "key_as_string": "2019-06-01", "doc_count": 10 }),
        json!({ "key": 1_401_580_800_000_i64, "key_as_string": "2014-06-01", "doc_count": 30 }),
    ];
    let label = with_child(bucket(json!("C"), 40), "label_age", ages);
    let doc = response(40, "municipalities", vec![with_child(bucket(json!("101"), 40), "energy_label", vec![label])]);
    harness.write_input("energy_labels.txt", &doc);

    let outcome = harness.run("energy_label_age").unwrap();
    let workbook = read_workbook(&outcome.output);

    let summary = workbook.sheet("Summary").unwrap();
    assert_eq!(metric(summary, "Total Energy Labels"), &CellValue::Number(40.0));
    assert_eq!(metric(summary, "Average Label Age"), &CellValue::Number(8.75));

    let detail = workbook.sheet("Municipality Data").unwrap();
    let ages: Vec<String> = detail.column("label_age").iter().map(|c| c.display_value()).collect();
    assert_eq!(ages, vec!["10", "5"]);
}

#[test]
fn test_energy_label_age_averages_only_recent_labels() {
    let harness = TestHarness::new();

    let ages = vec![
        json!({ "key": 1_559_347_200_000_i64, "key_as_string": "2019-06-01", "doc_count": 10 }),
        json!({ "key": 1_401_580_800_000_i64, "key_as_string": "2014-06-01", "doc_count": 30 }),
        json!({ "key": 1_275_350_400_000_i64, "key_as_string": "2010-06-01", "doc_count": 20 }),
        json!({ "key": 1_735_689_600_000_i64, "key_as_string": "2025-01-01", "doc_count": 5 }),
    ];
    let label = with_child(bucket(json!("C"), 65), "label_age", ages);
    let doc = response(65, "municipalities", vec![with_child(bucket(json!("101"), 65), "energy_label", vec![label])]);
    harness.write_input("energy_labels.txt", &doc);

    let outcome = harness.run("energy_label_age").unwrap();
    let workbook = read_workbook(&outcome.output);

    // Out-of-window buckets still count towards the totals.
    let summary = workbook.sheet("Summary").unwrap();
    assert_eq!(metric(summary, "Total Energy Labels"), &CellValue::Number(65.0));
    assert_eq!(metric(summary, "Average Label Age"), &CellValue::Number(8.75));
    assert_eq!(metric(summary, "Oldest Label Age"), &CellValue::Number(8.75));

    let detail = workbook.sheet("Municipality Data").unwrap();
    let ages: Vec<String> = detail.column("label_age").iter().map(|c| c.display_value()).collect();
    assert_eq!(ages, vec!["10", "14", "5", "-1"]);
    let averages: Vec<String> = detail
        .column("weighted_avg_energy_label_age")
        .iter()
        .map(|c| c.display_value())
        .collect();
    assert!(averages.iter().all(|a| a == "8.75"));
}
