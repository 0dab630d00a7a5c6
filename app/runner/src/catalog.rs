//! FILENAME: app/runner/src/catalog.rs
//! Built-in report descriptors.
//!
//! Each descriptor pairs a `ReportDefinition` with the input files it reads
//! by default. Descriptors are plain data: a JSON file with the same shape
//! can be run in place of a catalog entry.

use std::fs;
use std::path::Path;

use bucket_tree::{BinScheme, FlattenSpec, HitsSpec, KeyLabel, Level, MetricRule};
use once_cell::sync::Lazy;
use report_engine::{
    AnomalyRule, CountStat, DetailColumn, DetailOrder, DetailSpec, Extreme, MetricLine,
    ReportDefinition, RowSource, SortKey, TableSpec,
};
use serde::{Deserialize, Serialize};

use crate::error::RunError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDescriptor {
    pub description: String,
    /// Input file names, relative to the data directory. Reports with
    /// several inputs concatenate their rows in this order.
    pub inputs: Vec<String>,
    /// Denominator document for coverage reports.
    #[serde(default)]
    pub baseline_input: Option<String>,
    /// Output file name; `<name>.xlsx` when omitted.
    #[serde(default)]
    pub output: Option<String>,
    /// Load and flatten under the retry policy.
    #[serde(default)]
    pub retry: bool,
    pub definition: ReportDefinition,
}

impl ReportDescriptor {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn output_file(&self) -> String {
        self.output
            .clone()
            .unwrap_or_else(|| format!("{}.xlsx", self.definition.name))
    }

    /// Reads a descriptor from a JSON file and checks its definition.
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let raw = fs::read_to_string(path)?;
        let descriptor: ReportDescriptor = serde_json::from_str(&raw)?;
        descriptor.definition.validate()?;
        Ok(descriptor)
    }
}

static CATALOG: Lazy<Vec<ReportDescriptor>> = Lazy::new(build_catalog);

pub fn all() -> &'static [ReportDescriptor] {
    &CATALOG
}

pub fn find(name: &str) -> Result<ReportDescriptor, RunError> {
    let name = name.trim_end_matches(".py");
    CATALOG
        .iter()
        .find(|d| d.name() == name)
        .cloned()
        .ok_or_else(|| RunError::UnknownReport(name.to_string()))
}

// ============================================================================
// BUILDING BLOCKS
// ============================================================================

fn descriptor(description: &str, input: &str, definition: ReportDefinition) -> ReportDescriptor {
    ReportDescriptor {
        description: description.to_string(),
        inputs: vec![input.to_string()],
        baseline_input: None,
        output: None,
        retry: false,
        definition,
    }
}

fn buckets(levels: Vec<Level>) -> RowSource {
    RowSource::Buckets {
        spec: FlattenSpec::new(levels),
        baseline: None,
    }
}

fn hits(columns: &[(&str, &str)]) -> RowSource {
    RowSource::Hits(HitsSpec::new(columns))
}

fn municipalities() -> Level {
    Level::terms("municipality_code", "municipalities")
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn total(label: &str) -> MetricLine {
    MetricLine::Total { label: label.to_string() }
}

fn sum_by(prefix: &str, dims: &[usize]) -> MetricLine {
    MetricLine::SumBy {
        prefix: prefix.to_string(),
        dims: dims.to_vec(),
        limit: None,
    }
}

fn top_sum_by(prefix: &str, dims: &[usize], limit: usize) -> MetricLine {
    MetricLine::SumBy {
        prefix: prefix.to_string(),
        dims: dims.to_vec(),
        limit: Some(limit),
    }
}

fn top_combinations(dims: &[usize], n: usize, separator: &str) -> MetricLine {
    MetricLine::TopCombinations {
        dims: dims.to_vec(),
        n,
        separator: separator.to_string(),
    }
}

fn group_count(label: &str, dims: &[usize]) -> MetricLine {
    MetricLine::GroupCount {
        label: label.to_string(),
        dims: dims.to_vec(),
    }
}

fn count_stat(label: &str, stat: CountStat, per: &[usize]) -> MetricLine {
    MetricLine::CountStat {
        label: label.to_string(),
        stat,
        per: per.to_vec(),
    }
}

fn area_stats() -> TableSpec {
    TableSpec::GroupStats {
        sheet: "Summary Statistics".to_string(),
        dims: vec![1, 2],
        headers: strings(&["Unit Usage", "Area Range", "Avg Units", "Max Units", "Min Units"]),
    }
}

/// Totals over a boolean validity level at index `dim`.
fn validity_summary(dim: usize) -> Vec<MetricLine> {
    vec![
        total("Total Units"),
        MetricLine::MatchingTotal {
            label: "Total Valid Energy Labels".to_string(),
            dim,
            matching: "true".to_string(),
        },
        MetricLine::OverallPercentage {
            label: "Overall Percentage".to_string(),
            dim,
            matching: "true".to_string(),
        },
    ]
}

fn validity_table(sheet: &str, dims: &[usize], dimension: usize, keys: &[&str]) -> TableSpec {
    let mut headers = strings(keys);
    headers.extend(strings(&["total_units", "valid_energy_labels", "percentage_valid"]));
    TableSpec::Ratio {
        sheet: sheet.to_string(),
        dims: dims.to_vec(),
        dimension,
        matching: "true".to_string(),
        headers,
    }
}

const ADDRESS: (&str, &str) = ("Address", "dar_address.address_designation");
const UNIT_USAGE: (&str, &str) = ("Unit Usage", "bbr_unit.enh020_units_usage");
const SUPPLEMENTARY: (&str, &str) = ("Sup heating", "bbr_building.byg058_supplementary_heating");

// ============================================================================
// CATALOG
// ============================================================================

fn build_catalog() -> Vec<ReportDescriptor> {
    let mut reports = vec![
        heating_matrix(),
        supplementary_heating(),
        null_heating_installation(),
        null_heating_mediums(),
        building_area(),
        building_area_small(),
        unit_areas(),
        construction_years(),
        wood_stoves(),
        buildings_1000(),
        large_buildings_energy_labels(),
        energy_label_age(),
        energy_labels_year_of_construction(),
        energy_labels(),
        units_usage_energy_label_validity(),
        unit_usage_140_energy_label_validity(),
    ];
    reports.extend(address_reports());
    reports
}

fn heating_matrix() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "heating_matrix",
        buckets(vec![
            municipalities(),
            Level::terms("installation_code", "heatingInstallations").gap_as("No specific installation"),
            Level::terms("medium_code", "heatingMediums")
                .empty_as("")
                .gap_as("No specific medium"),
        ]),
        "Detailed Data",
    )
    .with_summary(
        "Summary",
        vec![
            total("Total Installations"),
            sum_by("Installation Type", &[1]),
            sum_by("Medium Type", &[2]),
            top_combinations(&[1, 2], 5, ","),
        ],
    );
    descriptor("Analyzes heating installation types and mediums", "heating_matrix.txt", def)
}

fn supplementary_heating() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "supplementary_heating",
        buckets(vec![
            municipalities(),
            Level::terms("installation_code", "heatingInstallations").gap_as("No specific installation"),
            Level::terms("medium_code", "supplementary_heating")
                .empty_as("")
                .gap_as("No supplementary"),
        ]),
        "Detailed Data",
    )
    .with_summary(
        "Summary",
        vec![
            total("Total Supplementary Heating"),
            sum_by("Supplementary Type", &[2]),
            top_combinations(&[1, 2], 5, ","),
        ],
    );
    descriptor("Examines supplementary heating systems", "supplementary_heating.txt", def)
}

fn null_heating_installation() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "null_heating_installation",
        buckets(vec![
            municipalities(),
            Level::terms("unit_usage", "units_usage").sentinel("No specific usage"),
            Level::terms("heating_medium", "heatingMediums")
                .empty_as("No medium")
                .gap_as("No specific medium"),
        ]),
        "Detailed Data",
    )
    .with_summary(
        "Summary",
        vec![
            total("Total units with Null Heating Installation"),
            sum_by("Unit Usage", &[1]),
            sum_by("Heating Medium", &[2]),
            top_combinations(&[1, 2], 5, ","),
        ],
    );
    descriptor(
        "Analyzes mediums with no heating installation types",
        "null_heating_installation.txt",
        def,
    )
}

fn null_heating_mediums() -> ReportDescriptor {
    // The query filters mediums out, so the medium level is always empty.
    let def = ReportDefinition::new(
        "9_heating_installation_null_mediums",
        buckets(vec![
            municipalities(),
            Level::terms("unit_usage", "units_usage").sentinel("No specific usage"),
            Level::terms("heating_medium", "heatingMediums").sentinel("No medium"),
        ]),
        "Detailed Data",
    )
    .with_summary(
        "Summary",
        vec![
            total("Total units with Null Heating Medium"),
            sum_by("Unit Usage", &[1]),
            sum_by("Municipality", &[0]),
        ],
    );
    descriptor(
        "Analyzes where no mediums or heating installation types are",
        "9_heating_installation_null_mediums.txt",
        def,
    )
}

fn building_area() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "building_area",
        buckets(vec![
            municipalities(),
            Level::terms("unit_usage", "unit_usage"),
            Level::terms("area_range", "building_areas")
                .labelled(KeyLabel::Range {
                    width: 300.0,
                    inclusive: false,
                })
                .with_fixed("large_buildings", "900+"),
        ]),
        "Detailed Data",
    )
    .with_table(area_stats());
    descriptor("Processes building area information", "building_area.txt", def)
}

fn building_area_small() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "building_area_small",
        buckets(vec![
            municipalities(),
            Level::terms("unit_usage", "unit_usage"),
            Level::terms("building_area", "building_areas")
                .labelled(KeyLabel::Bins(BinScheme::uniform(0.0, 100.0, 5.0))),
        ]),
        "Detailed Data",
    )
    .with_detail(DetailSpec {
        merge_duplicates: true,
        ..DetailSpec::default()
    })
    .with_table(area_stats());
    descriptor(
        "Processes building area information for buildings up to 100 m²",
        "building_area_small.txt",
        def,
    )
}

fn unit_areas() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "unit_areas",
        buckets(vec![
            municipalities(),
            Level::terms("unit_usage", "unit_usage"),
            Level::terms("area_range", "unit_areas")
                .labelled(KeyLabel::Range {
                    width: 20.0,
                    inclusive: false,
                })
                .with_fixed("large_units", "900+"),
        ]),
        "Detailed Data",
    )
    .with_table(area_stats());
    ReportDescriptor {
        inputs: strings(&["unit_areas_below_900.txt", "unit_areas_above_900.txt"]),
        ..descriptor("Processes unit area information", "", def)
    }
}

fn construction_years() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "construction_years",
        buckets(vec![
            municipalities(),
            Level::terms("construction_year", "construction_years"),
        ]),
        "Municipality Data",
    )
    .with_summary(
        "Summary",
        vec![
            total("Total Units"),
            MetricLine::MostCommon {
                label: "Median Construction Year".to_string(),
                dims: vec![1],
            },
            count_stat("Avg Units per Year", CountStat::Mean, &[1]),
            count_stat("Max Units in a Year", CountStat::Max, &[1]),
            count_stat("Min Units in a Year", CountStat::Min, &[1]),
        ],
    );
    descriptor(
        "Analyzes building construction years. Reads the shared parse_elasticsearch.txt export \
         and writes construction_years.xlsx instead of parse_elasticsearch.xlsx",
        "parse_elasticsearch.txt",
        def,
    )
}

fn wood_stoves() -> ReportDescriptor {
    let def = ReportDefinition::new("brændeovn", buckets(vec![municipalities()]), "Municipality Data")
        .with_detail(DetailSpec {
            order: DetailOrder::Sorted(vec![SortKey::CountDesc]),
            merge_duplicates: false,
            extra_columns: vec![DetailColumn::ShareOfTotalHits {
                header: "percentage_of_all_brændovn".to_string(),
            }],
        })
        .with_summary(
            "Summary",
            vec![
                total("Total Brændovn"),
                count_stat("Avg Brændovn per Municipality", CountStat::Mean, &[]),
                count_stat("Max Brændovn in a Municipality", CountStat::Max, &[]),
                count_stat("Min Brændovn in a Municipality", CountStat::Min, &[]),
            ],
        );
    descriptor(
        "Analyzes wood stove data. Reads the shared parse_elasticsearch.txt export \
         and writes brændeovn.xlsx instead of parse_elasticsearch.xlsx",
        "parse_elasticsearch.txt",
        def,
    )
}

fn buildings_1000() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "buildings_1000",
        buckets(vec![
            municipalities(),
            Level::terms("energy_label", "energy_label"),
        ]),
        "Detailed Data",
    )
    .with_summary(
        "Summary",
        vec![
            total("Total buildings from year 1000 with energy labels"),
            group_count("Number of municipalities", &[0]),
            sum_by("Municipality", &[0]),
            sum_by("Energy Label", &[1]),
        ],
    );
    descriptor(
        "Analyzes building energy label where construction year = 1000",
        "buildings_1000.txt",
        def,
    )
}

fn large_buildings_energy_labels() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "large_buildings_energy_labels",
        buckets(vec![
            municipalities(),
            Level::terms("unit_usage", "unit_usage"),
            Level::terms("energy_label", "energy_label"),
        ]),
        "Detailed Data",
    )
    .with_summary(
        "Summary",
        vec![
            total("Total large buildings with energy labels"),
            group_count("Number of municipalities", &[0]),
            group_count("Number of unit usage types", &[1]),
            group_count("Number of energy label types", &[2]),
            top_sum_by("Top Municipality", &[0], 5),
            top_sum_by("Top Unit Usage", &[1], 5),
            sum_by("Energy Label", &[2]),
            top_combinations(&[0, 1, 2], 10, ", "),
        ],
    );
    descriptor(
        "analysis of energy labels for large buildings (1000+ m²), excluding private unit usage codes",
        "large_buildings_energy_labels.txt",
        def,
    )
}

fn energy_label_age() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "energy_label_age",
        buckets(vec![
            municipalities(),
            Level::terms("energy_label", "energy_label"),
            Level::terms("label_age", "label_age")
                .labelled(KeyLabel::AgeInYears)
                .with_metric(MetricRule::age_within(0, 10)),
        ]),
        "Municipality Data",
    )
    .with_detail(DetailSpec {
        order: DetailOrder::Sorted(vec![SortKey::Dim(0), SortKey::CountDesc]),
        merge_duplicates: false,
        extra_columns: vec![
            DetailColumn::GroupWeightedAverage {
                header: "weighted_avg_energy_label_age".to_string(),
                dims: vec![0, 1],
            },
            DetailColumn::GroupRollup {
                header: "municipality_weighted_avg_energy_label_age".to_string(),
                leaf_dims: vec![0, 1],
                depth: 1,
            },
        ],
    })
    .with_summary(
        "Summary",
        vec![
            total("Total Energy Labels"),
            MetricLine::WeightedAverage {
                label: "Average Label Age".to_string(),
                leaf_dims: vec![0, 1],
            },
            MetricLine::WeightedAverageExtreme {
                label: "Newest Label Age".to_string(),
                dims: vec![0, 1],
                extreme: Extreme::Min,
            },
            MetricLine::WeightedAverageExtreme {
                label: "Oldest Label Age".to_string(),
                dims: vec![0, 1],
                extreme: Extreme::Max,
            },
        ],
    );
    ReportDescriptor {
        output: Some("energy_label_analysis.xlsx".to_string()),
        ..descriptor("Examines the age of energy labels", "energy_labels.txt", def)
    }
}

fn energy_labels_year_of_construction() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "energy_labels_year_of_construction",
        buckets(vec![
            municipalities(),
            Level::terms("energy_label", "energy_label"),
            Level::terms("construction_year_range", "construction_year_histogram")
                .labelled(KeyLabel::Range {
                    width: 10.0,
                    inclusive: true,
                })
                .with_metric(MetricRule::MidpointAge { offset: 5.0 }),
        ]),
        "Detailed Data",
    )
    .with_detail(DetailSpec {
        order: DetailOrder::Sorted(vec![SortKey::Dim(0), SortKey::Dim(1), SortKey::Dim(2)]),
        merge_duplicates: false,
        extra_columns: vec![
            DetailColumn::Metric {
                header: "avg_building_age".to_string(),
            },
            DetailColumn::GroupWeightedAverage {
                header: "energy_label_weighted_avg_building_age".to_string(),
                dims: vec![0, 1],
            },
            DetailColumn::GroupWeightedAverage {
                header: "municipality_weighted_avg_building_age".to_string(),
                dims: vec![0],
            },
            DetailColumn::LabelAnomaly {
                header: "anomaly_flag".to_string(),
                label_dim: 1,
                ranking: strings(&["A2020", "A2015", "A2010", "B", "C", "D", "E", "F", "G"]),
                rules: vec![
                    AnomalyRule {
                        rank_below: 3,
                        metric_above: 100.0,
                    },
                    AnomalyRule {
                        rank_below: 5,
                        metric_above: 150.0,
                    },
                ],
            },
        ],
    });
    descriptor(
        "Correlates energy labels with construction years",
        "energy_labels_year_of_construction.txt",
        def,
    )
}

fn energy_labels() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "energy_labels",
        RowSource::Buckets {
            spec: FlattenSpec::new(vec![
                municipalities(),
                Level::terms("energy_label", "energy_label"),
            ]),
            baseline: Some(FlattenSpec::new(vec![municipalities()])),
        },
        "Detailed Data",
    )
    .with_table(TableSpec::Coverage {
        sheet: "Municipality Data".to_string(),
        dim: 0,
        breakdown: Some(1),
        breakdown_prefix: "label_".to_string(),
        headers: strings(&["municipality_code", "total_units", "labeled_buildings", "label_percentage"]),
    })
    .with_summary(
        "Summary",
        vec![
            MetricLine::BaselineTotal {
                label: "Total Units".to_string(),
            },
            MetricLine::CoverageTotal {
                label: "Total Labeled Buildings".to_string(),
                dim: 0,
            },
            MetricLine::CoveragePercentage {
                label: "Overall Label Percentage".to_string(),
                dim: 0,
            },
            MetricLine::CoverageBreakdown {
                dim: 0,
                breakdown: 1,
                total_prefix: "Total".to_string(),
                share_suffix: "Percentage".to_string(),
            },
        ],
    );
    ReportDescriptor {
        baseline_input: Some("total_units.txt".to_string()),
        ..descriptor("Provides an overview of energy label distribution", "energy_labels.txt", def)
    }
}

fn units_usage_energy_label_validity() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "units_usage_energy_label_validity",
        buckets(vec![
            municipalities(),
            Level::terms("unit_usage", "unit_usage"),
            Level::terms("energy_label_validity", "energy_label_validity").labelled(KeyLabel::KeyAsString),
        ]),
        "Detailed Data",
    )
    .with_table(validity_table(
        "Municipality Data",
        &[0, 1],
        2,
        &["municipality_code", "unit_usage"],
    ))
    .with_summary("Overall Summary", validity_summary(2))
    .with_table(validity_table("Usage Summary", &[1], 2, &["unit_usage"]));
    descriptor(
        "Examines energy label validity across different unit usages [120, 121, 122, 130, 131, 132]",
        "units_usage_energy_label_validity.txt",
        def,
    )
}

fn unit_usage_140_energy_label_validity() -> ReportDescriptor {
    let def = ReportDefinition::new(
        "unit_usage_140_vs_energy_label_validity",
        buckets(vec![
            municipalities(),
            Level::terms("energy_label_validity", "energy_label_validity").labelled(KeyLabel::KeyAsString),
        ]),
        "Detailed Data",
    )
    .with_table(validity_table("Municipality Data", &[0], 1, &["municipality_code"]))
    .with_summary("Summary", validity_summary(1));
    ReportDescriptor {
        output: Some("unit_usage_140_energy_label_analysis.xlsx".to_string()),
        ..descriptor(
            "Analyzes energy label validity for specific unit usage [140]",
            "unit_usage_140_vs_energy_label_validity.txt",
            def,
        )
    }
}

fn address_reports() -> Vec<ReportDescriptor> {
    let address = |name: &str, description: &str, sheet: &str, columns: &[(&str, &str)]| {
        descriptor(
            description,
            &format!("{}.txt", name),
            ReportDefinition::new(name, hits(columns), sheet),
        )
    };

    let heating = ReportDescriptor {
        retry: true,
        ..address(
            "address_heating_matrix_query",
            "Processes heating installation and medium address information",
            "Heating Matrix with Address",
            &[
                ADDRESS,
                ("Heating Installation", "bbr_building.byg056_heating_installation"),
                ("Heating Medium", "bbr_building.byg057_heating_medium"),
            ],
        )
    };

    let large_buildings = ReportDescriptor {
        retry: true,
        ..address(
            "address_large_buildings_energy_labels_query",
            "Processes large building energy label address information",
            "Large Buildings Energy Labels",
            &[
                ADDRESS,
                ("Building Area (m²)", "bbr_building.byg038_total_building_area"),
                ("Energy Label", "emoweb_energy_label.current_energy_label"),
            ],
        )
    };

    let unit_areas = address(
        "address_unit_areass_query",
        "Processes unit area adress information",
        "Addresses",
        &[ADDRESS, UNIT_USAGE, ("Unit Area", "bbr_unit.enh026_unit_total_area")],
    );

    let mut wood_stoves = address(
        "address_brændeovn_pejs_query",
        "Processes wood stove data adress information",
        "Address Data",
        &[ADDRESS, UNIT_USAGE, SUPPLEMENTARY],
    );
    wood_stoves.definition.detail.order = DetailOrder::Sorted(vec![SortKey::Dim(0)]);

    let null_mediums = address(
        "address_9_heating_installation_null_mediums_query",
        "Processes the data where no mediums or heating installation types are adress information",
        "Address Data",
        &[
            ADDRESS,
            UNIT_USAGE,
            ("Supplementary Heating", SUPPLEMENTARY.1),
        ],
    );

    let extensions = address(
        "address_year_extension_vs_construction_query",
        "Compares year of extension with year of construction per address",
        "Year Comparison Data",
        &[
            ADDRESS,
            ("Year of Extension", "bbr_building.byg027_year_of_extension"),
            ("Year of Construction", "bbr_building.byg026_year_of_construction"),
        ],
    );

    vec![heating, large_buildings, unit_areas, wood_stoves, null_mediums, extensions]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_descriptor_validates() {
        for descriptor in all() {
            if let Err(e) = descriptor.definition.validate() {
                panic!("{} is invalid: {}", descriptor.name(), e);
            }
        }
    }

    #[test]
    fn names_are_unique() {
        let names: HashSet<&str> = all().iter().map(|d| d.name()).collect();
        assert_eq!(names.len(), all().len());
        assert_eq!(all().len(), 22);
    }

    #[test]
    fn find_accepts_script_names() {
        assert_eq!(find("heating_matrix.py").unwrap().name(), "heating_matrix");
        assert!(matches!(find("request_data"), Err(RunError::UnknownReport(_))));
    }

    #[test]
    fn only_two_reports_retry() {
        let retrying: Vec<&str> = all().iter().filter(|d| d.retry).map(|d| d.name()).collect();
        assert_eq!(
            retrying,
            vec!["address_heating_matrix_query", "address_large_buildings_energy_labels_query"]
        );
    }

    #[test]
    fn output_defaults_to_report_name() {
        assert_eq!(find("buildings_1000").unwrap().output_file(), "buildings_1000.xlsx");
        assert_eq!(find("energy_label_age").unwrap().output_file(), "energy_label_analysis.xlsx");
    }

    #[test]
    fn shared_export_reports_write_their_own_workbooks() {
        let years = find("construction_years").unwrap();
        let stoves = find("brændeovn").unwrap();
        assert_eq!(years.inputs, vec!["parse_elasticsearch.txt".to_string()]);
        assert_eq!(stoves.inputs, years.inputs);
        assert_eq!(years.output_file(), "construction_years.xlsx");
        assert_eq!(stoves.output_file(), "brændeovn.xlsx");
        assert!(years.description.contains("parse_elasticsearch.xlsx"));
        assert!(stoves.description.contains("parse_elasticsearch.xlsx"));

        let outputs: HashSet<String> = all().iter().map(ReportDescriptor::output_file).collect();
        assert_eq!(outputs.len(), all().len());
    }

    #[test]
    fn energy_label_age_averages_recent_labels_only() {
        let descriptor = find("energy_label_age").unwrap();
        match &descriptor.definition.source {
            RowSource::Buckets { spec, .. } => {
                assert_eq!(spec.levels[2].metric, Some(MetricRule::age_within(0, 10)));
            }
            other => panic!("unexpected source: {:?}", other),
        }
    }

    #[test]
    fn validity_lines_point_at_validity_level() {
        let descriptor = find("unit_usage_140_vs_energy_label_validity").unwrap();
        assert!(descriptor.definition.metrics.iter().all(|line| match line {
            MetricLine::MatchingTotal { dim, .. } | MetricLine::OverallPercentage { dim, .. } => *dim == 1,
            _ => true,
        }));
    }

    #[test]
    fn descriptor_round_trips_through_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("energy_labels.json");
        let original = find("energy_labels").unwrap();
        std::fs::write(&path, serde_json::to_string_pretty(&original).unwrap()).unwrap();

        let loaded = ReportDescriptor::load(&path).unwrap();
        assert_eq!(loaded, original);
    }
}
