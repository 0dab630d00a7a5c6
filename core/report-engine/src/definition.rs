//! FILENAME: core/report-engine/src/definition.rs
//! Report Definition - what a report IS: where its rows come from and which
//! tables are derived from them.
//!
//! All structures are serializable so a report can be described by a JSON
//! file as well as by the built-in catalog.

use bucket_tree::{FlattenSpec, HitsSpec};
use serde::{Deserialize, Serialize};

use crate::error::AssembleError;

/// Sheet names longer than this are rejected by spreadsheet applications.
pub const MAX_SHEET_NAME_LEN: usize = 31;

// ============================================================================
// ROW SOURCE
// ============================================================================

/// How the input documents turn into rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowSource {
    /// Aggregation tree flattened into count rows. `baseline`, when set,
    /// flattens an additional denominator document (e.g. all units per
    /// municipality) for coverage tables.
    Buckets {
        spec: FlattenSpec,
        #[serde(default)]
        baseline: Option<FlattenSpec>,
    },
    /// One row per returned document.
    Hits(HitsSpec),
}

// ============================================================================
// DETAIL TABLE
// ============================================================================

/// A component of the detail-table sort order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SortKey {
    /// Ascending by a dimension (numbers before text).
    Dim(usize),
    /// Largest count first.
    CountDesc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum DetailOrder {
    /// Rows exactly as flattened.
    #[default]
    Source,
    /// Stable sort by the given keys, most significant first.
    Sorted(Vec<SortKey>),
}

/// Derived per-row columns appended after the count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DetailColumn {
    /// The row's own metric value.
    Metric { header: String },
    /// `count / hits.total.value * 100`.
    ShareOfTotalHits { header: String },
    /// Count-weighted metric average of the row's group.
    GroupWeightedAverage { header: String, dims: Vec<usize> },
    /// Leaf-group averages over `leaf_dims`, re-averaged onto the first
    /// `depth` leaf dimensions using each leaf's full count.
    GroupRollup {
        header: String,
        leaf_dims: Vec<usize>,
        depth: usize,
    },
    /// Flags rows whose label ranks well while the metric (an age) is
    /// implausibly high.
    LabelAnomaly {
        header: String,
        label_dim: usize,
        ranking: Vec<String>,
        rules: Vec<AnomalyRule>,
    },
}

impl DetailColumn {
    pub fn header(&self) -> &str {
        match self {
            DetailColumn::Metric { header }
            | DetailColumn::ShareOfTotalHits { header }
            | DetailColumn::GroupWeightedAverage { header, .. }
            | DetailColumn::GroupRollup { header, .. }
            | DetailColumn::LabelAnomaly { header, .. } => header.as_str(),
        }
    }
}

/// A label ranked strictly better than `rank_below` with a metric above
/// `metric_above` is an anomaly. Labels missing from the ranking rank ahead
/// of every rule, so they are flagged as soon as the metric passes any
/// `metric_above`. Rows without a metric are never flagged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRule {
    pub rank_below: usize,
    pub metric_above: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DetailSpec {
    #[serde(default)]
    pub order: DetailOrder,
    /// Sum rows sharing the same dimension tuple (after relabelling,
    /// e.g. binning, several buckets can land on one tuple).
    #[serde(default)]
    pub merge_duplicates: bool,
    #[serde(default)]
    pub extra_columns: Vec<DetailColumn>,
}

// ============================================================================
// SUMMARY LINES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountStat {
    Mean,
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extreme {
    Min,
    Max,
}

/// One or more `{Metric, Value}` lines of the summary sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricLine {
    /// Sum of all row counts.
    Total { label: String },
    /// Sum of the baseline document's row counts.
    BaselineTotal { label: String },
    /// Number of distinct groups.
    GroupCount { label: String, dims: Vec<usize> },
    /// One line per group, `"{prefix} {key}"`, largest first.
    SumBy {
        prefix: String,
        dims: Vec<usize>,
        #[serde(default)]
        limit: Option<usize>,
    },
    /// `n` lines `"Top Combination i"` valued `"a{sep}b: count"`.
    TopCombinations {
        dims: Vec<usize>,
        n: usize,
        separator: String,
    },
    /// Per `per`-group mean / max / min of row counts, then the mean of
    /// means, the max of maxima or the min of minima.
    CountStat {
        label: String,
        stat: CountStat,
        per: Vec<usize>,
    },
    /// Key of the largest group.
    MostCommon { label: String, dims: Vec<usize> },
    /// Sum of rows whose `dim` equals `matching`.
    MatchingTotal {
        label: String,
        dim: usize,
        matching: String,
    },
    /// Matching rows as a percentage of all rows.
    OverallPercentage {
        label: String,
        dim: usize,
        matching: String,
    },
    /// Covered share of the baseline, joined on `dim`.
    CoveragePercentage { label: String, dim: usize },
    /// Overall rollup of leaf-group averages.
    WeightedAverage { label: String, leaf_dims: Vec<usize> },
    /// Smallest or largest group average.
    WeightedAverageExtreme {
        label: String,
        dims: Vec<usize>,
        extreme: Extreme,
    },
    /// Covered count of the baseline join on `dim`. Sentinel rows and keys
    /// missing from the baseline do not count.
    CoverageTotal { label: String, dim: usize },
    /// For each `breakdown` value of the covered rows, a
    /// `"{total_prefix} {value}"` line with its count, then a
    /// `"{value} {share_suffix}"` line with its share of the covered count
    /// as `"12.34%"`.
    CoverageBreakdown {
        dim: usize,
        breakdown: usize,
        total_prefix: String,
        share_suffix: String,
    },
}

// ============================================================================
// EXTRA TABLES
// ============================================================================

/// An additional sheet derived from the rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableSpec {
    /// Key columns, then mean / max / min of row counts; trailing `Total` row.
    GroupStats {
        sheet: String,
        dims: Vec<usize>,
        headers: Vec<String>,
    },
    /// Key columns, then total / matching / percentage.
    Ratio {
        sheet: String,
        dims: Vec<usize>,
        dimension: usize,
        matching: String,
        headers: Vec<String>,
    },
    /// Baseline key, total, covered, percentage, then one column per
    /// breakdown value named `"{breakdown_prefix}{value}"`.
    Coverage {
        sheet: String,
        dim: usize,
        #[serde(default)]
        breakdown: Option<usize>,
        #[serde(default)]
        breakdown_prefix: String,
        headers: Vec<String>,
    },
}

impl TableSpec {
    pub fn sheet(&self) -> &str {
        match self {
            TableSpec::GroupStats { sheet, .. }
            | TableSpec::Ratio { sheet, .. }
            | TableSpec::Coverage { sheet, .. } => sheet.as_str(),
        }
    }

    /// Number of headers the table expects.
    fn expected_headers(&self) -> usize {
        match self {
            TableSpec::GroupStats { dims, .. } => dims.len() + 3,
            TableSpec::Ratio { dims, .. } => dims.len() + 3,
            TableSpec::Coverage { .. } => 4,
        }
    }

    fn headers(&self) -> &[String] {
        match self {
            TableSpec::GroupStats { headers, .. }
            | TableSpec::Ratio { headers, .. }
            | TableSpec::Coverage { headers, .. } => headers.as_slice(),
        }
    }
}

// ============================================================================
// REPORT DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDefinition {
    pub name: String,
    pub source: RowSource,
    pub detail_sheet: String,
    #[serde(default)]
    pub detail: DetailSpec,
    /// Omitted when the report has no `{Metric, Value}` sheet.
    #[serde(default)]
    pub summary_sheet: Option<String>,
    #[serde(default)]
    pub metrics: Vec<MetricLine>,
    #[serde(default)]
    pub tables: Vec<TableSpec>,
}

impl ReportDefinition {
    pub fn new(name: &str, source: RowSource, detail_sheet: &str) -> Self {
        ReportDefinition {
            name: name.to_string(),
            source,
            detail_sheet: detail_sheet.to_string(),
            detail: DetailSpec::default(),
            summary_sheet: None,
            metrics: Vec::new(),
            tables: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: DetailSpec) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_summary(mut self, sheet: &str, metrics: Vec<MetricLine>) -> Self {
        self.summary_sheet = Some(sheet.to_string());
        self.metrics = metrics;
        self
    }

    pub fn with_table(mut self, table: TableSpec) -> Self {
        self.tables.push(table);
        self
    }

    /// Sheet names in output order.
    pub fn sheet_names(&self) -> Vec<&str> {
        let mut names = vec![self.detail_sheet.as_str()];
        if let Some(summary) = &self.summary_sheet {
            names.push(summary);
        }
        names.extend(self.tables.iter().map(TableSpec::sheet));
        names
    }

    /// Number of dimensions each row carries.
    pub fn width(&self) -> usize {
        match &self.source {
            RowSource::Buckets { spec, .. } => spec.levels.len(),
            RowSource::Hits(spec) => spec.columns.len(),
        }
    }

    pub fn has_baseline(&self) -> bool {
        matches!(&self.source, RowSource::Buckets { baseline: Some(_), .. })
    }

    /// Checks dimension indices, sheet names and header counts.
    pub fn validate(&self) -> Result<(), AssembleError> {
        let invalid = |msg: String| Err(AssembleError::InvalidDefinition(format!("{}: {}", self.name, msg)));

        let mut seen: Vec<&str> = Vec::new();
        for name in self.sheet_names() {
            if name.is_empty() || name.chars().count() > MAX_SHEET_NAME_LEN {
                return invalid(format!("sheet name '{}' is empty or too long", name));
            }
            if seen.iter().any(|s| s.eq_ignore_ascii_case(name)) {
                return invalid(format!("duplicate sheet name '{}'", name));
            }
            seen.push(name);
        }

        match &self.source {
            RowSource::Buckets { spec, baseline } => {
                spec.validate()
                    .map_err(|e| AssembleError::InvalidDefinition(e.to_string()))?;
                if let Some(b) = baseline {
                    b.validate()
                        .map_err(|e| AssembleError::InvalidDefinition(e.to_string()))?;
                }
            }
            RowSource::Hits(_) => {
                if !self.metrics.is_empty() || !self.tables.is_empty() {
                    return invalid("document listings carry no summaries".to_string());
                }
                if !self.detail.extra_columns.is_empty() || self.detail.merge_duplicates {
                    return invalid("document listings have no derived columns".to_string());
                }
            }
        }

        let width = self.width();
        let out_of_range = |dims: &[usize]| dims.iter().any(|&d| d >= width);

        if let DetailOrder::Sorted(keys) = &self.detail.order {
            if keys.iter().any(|k| matches!(k, SortKey::Dim(d) if *d >= width)) {
                return invalid("sort key out of range".to_string());
            }
        }

        for column in &self.detail.extra_columns {
            let bad = match column {
                DetailColumn::GroupWeightedAverage { dims, .. } => out_of_range(dims),
                DetailColumn::GroupRollup { leaf_dims, depth, .. } => {
                    out_of_range(leaf_dims) || *depth > leaf_dims.len()
                }
                DetailColumn::LabelAnomaly { label_dim, .. } => *label_dim >= width,
                DetailColumn::Metric { .. } | DetailColumn::ShareOfTotalHits { .. } => false,
            };
            if bad {
                return invalid(format!("column '{}' refers to a missing dimension", column.header()));
            }
        }

        for line in &self.metrics {
            let bad = match line {
                MetricLine::Total { .. } => false,
                MetricLine::BaselineTotal { .. }
                | MetricLine::CoveragePercentage { .. }
                | MetricLine::CoverageTotal { .. }
                | MetricLine::CoverageBreakdown { .. }
                    if !self.has_baseline() =>
                {
                    return invalid("baseline metric without a baseline document".to_string());
                }
                MetricLine::BaselineTotal { .. } => false,
                MetricLine::CoveragePercentage { dim, .. } | MetricLine::CoverageTotal { dim, .. } => {
                    *dim >= width
                }
                MetricLine::CoverageBreakdown { dim, breakdown, .. } => *dim >= width || *breakdown >= width,
                MetricLine::GroupCount { dims, .. }
                | MetricLine::SumBy { dims, .. }
                | MetricLine::TopCombinations { dims, .. }
                | MetricLine::MostCommon { dims, .. }
                | MetricLine::WeightedAverageExtreme { dims, .. } => out_of_range(dims),
                MetricLine::CountStat { per, .. } => out_of_range(per),
                MetricLine::MatchingTotal { dim, .. } | MetricLine::OverallPercentage { dim, .. } => {
                    *dim >= width
                }
                MetricLine::WeightedAverage { leaf_dims, .. } => out_of_range(leaf_dims),
            };
            if bad {
                return invalid("summary line refers to a missing dimension".to_string());
            }
        }

        for table in &self.tables {
            let bad = match table {
                TableSpec::GroupStats { dims, .. } => out_of_range(dims),
                TableSpec::Ratio { dims, dimension, .. } => out_of_range(dims) || *dimension >= width,
                TableSpec::Coverage { dim, breakdown, .. } => {
                    if !self.has_baseline() {
                        return invalid(format!("'{}' needs a baseline document", table.sheet()));
                    }
                    *dim >= width || breakdown.map_or(false, |b| b >= width)
                }
            };
            if bad {
                return invalid(format!("'{}' refers to a missing dimension", table.sheet()));
            }
            if table.headers().len() != table.expected_headers() {
                return invalid(format!(
                    "'{}' expects {} headers, got {}",
                    table.sheet(),
                    table.expected_headers(),
                    table.headers().len()
                ));
            }
        }

        Ok(())
    }
}
