//! FILENAME: core/bucket-tree/src/definition.rs
//! Flatten Definition - the declarative shape of one report's bucket tree.
//!
//! These structures DESCRIBE a traversal; they hold no data. They are
//! serializable so a report descriptor can be kept as a JSON file next to the
//! query it belongs to.

use serde::{Deserialize, Serialize};

use crate::error::FlattenError;

// ============================================================================
// KEY LABELS
// ============================================================================

/// How a bucket key becomes the dimension value written to a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyLabel {
    /// The key itself (integral numbers without decimals).
    Raw,
    /// `key_as_string` when present (dates, booleans), else the key.
    KeyAsString,
    /// Numeric lower bound turned into `"start-end"`.
    /// `end = start + width`, or `start + width - 1` when `inclusive`.
    Range { width: f64, inclusive: bool },
    /// Numeric key placed into explicit bins.
    Bins(BinScheme),
    /// Date key turned into whole years before the reference date.
    AgeInYears,
}

impl Default for KeyLabel {
    fn default() -> Self {
        KeyLabel::Raw
    }
}

/// Right-closed bins over explicit edges; the lowest edge is included in the
/// first bin. `labels[i]` names the bin `(edges[i], edges[i + 1]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinScheme {
    pub edges: Vec<f64>,
    pub labels: Vec<String>,
    /// Label for values below the first edge.
    #[serde(default = "default_underflow_label")]
    pub underflow_label: String,
    /// Label for values above the last edge.
    #[serde(default = "default_overflow_label")]
    pub overflow_label: String,
}

fn default_underflow_label() -> String {
    "Below range".to_string()
}

fn default_overflow_label() -> String {
    "Above range".to_string()
}

impl BinScheme {
    /// Equal-width bins from `start` to `end`. The first bin is labelled
    /// `"start-(start+step)"`, later ones `"(lo+1)-hi"` since their lower edge
    /// belongs to the previous bin.
    pub fn uniform(start: f64, end: f64, step: f64) -> Self {
        let mut edges = vec![start];
        let mut labels = Vec::new();
        if step > 0.0 && end > start {
            let mut lo = start;
            while lo < end {
                let hi = (lo + step).min(end);
                let label = if labels.is_empty() {
                    format!("{}-{}", engine::format_number(lo), engine::format_number(hi))
                } else {
                    format!("{}-{}", engine::format_number(lo + 1.0), engine::format_number(hi))
                };
                labels.push(label);
                edges.push(hi);
                lo = hi;
            }
        }
        BinScheme {
            edges,
            labels,
            underflow_label: format!("<{}", engine::format_number(start)),
            overflow_label: format!(">{}", engine::format_number(end)),
        }
    }

    /// Returns the label of the bin holding `value`.
    pub fn label_for(&self, value: f64) -> &str {
        let (Some(first), Some(last)) = (self.edges.first(), self.edges.last()) else {
            return &self.overflow_label;
        };
        if value < *first {
            return &self.underflow_label;
        }
        if value > *last {
            return &self.overflow_label;
        }
        // First bin includes its lower edge.
        for (idx, upper) in self.edges.iter().skip(1).enumerate() {
            if value <= *upper {
                return &self.labels[idx];
            }
        }
        &self.overflow_label
    }

    fn validate(&self) -> Result<(), FlattenError> {
        if self.edges.len() < 2 || self.labels.len() + 1 != self.edges.len() {
            return Err(FlattenError::InvalidDescriptor(format!(
                "bin scheme needs one label per interval ({} edges, {} labels)",
                self.edges.len(),
                self.labels.len()
            )));
        }
        if self.edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FlattenError::InvalidDescriptor(
                "bin edges must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// A numeric attribute derived from the bucket key and carried on each row
/// of the level that declares it (used for weighted averages).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MetricRule {
    /// Whole years between the key date and the reference date. Ages outside
    /// `window` carry no metric: the row keeps its count but takes no part
    /// in averages.
    AgeInYears {
        #[serde(default)]
        window: Option<AgeWindow>,
    },
    /// `reference_year - (bucket_start + offset)`: age of a building whose
    /// construction year is assumed to sit `offset` years into the bucket.
    MidpointAge { offset: f64 },
}

impl MetricRule {
    /// Age metric for every bucket.
    pub fn age() -> Self {
        MetricRule::AgeInYears { window: None }
    }

    /// Age metric only for ages in `min..=max`.
    pub fn age_within(min: i64, max: i64) -> Self {
        MetricRule::AgeInYears {
            window: Some(AgeWindow { min, max }),
        }
    }
}

/// Inclusive range of whole years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeWindow {
    pub min: i64,
    pub max: i64,
}

impl AgeWindow {
    pub fn contains(&self, age: i64) -> bool {
        (self.min..=self.max).contains(&age)
    }
}

// ============================================================================
// LEVELS
// ============================================================================

/// A single-bucket sibling aggregation emitted as one extra child
/// (e.g. a `large_buildings` filter shown as the `"900+"` range).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedBucket {
    pub aggregation: String,
    pub label: String,
}

/// One dimension of the traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Column header in the detail table.
    pub column: String,

    /// Name of the multi-bucket aggregation holding this level's children.
    /// `None` for levels made only of fixed buckets.
    #[serde(default)]
    pub aggregation: Option<String>,

    #[serde(default)]
    pub label: KeyLabel,

    /// Value used when the parent has documents but no children at this level.
    #[serde(default = "default_empty_label")]
    pub empty_label: String,

    /// Value used for the remainder when the children undercount the parent.
    #[serde(default = "default_gap_label")]
    pub gap_label: String,

    #[serde(default)]
    pub fixed_buckets: Vec<FixedBucket>,

    #[serde(default)]
    pub metric: Option<MetricRule>,
}

fn default_empty_label() -> String {
    "No value".to_string()
}

fn default_gap_label() -> String {
    "No specific value".to_string()
}

impl Level {
    /// A level read from a multi-bucket aggregation.
    pub fn terms(column: &str, aggregation: &str) -> Self {
        Level {
            column: column.to_string(),
            aggregation: Some(aggregation.to_string()),
            label: KeyLabel::Raw,
            empty_label: default_empty_label(),
            gap_label: default_gap_label(),
            fixed_buckets: Vec::new(),
            metric: None,
        }
    }

    /// A level made only of single-bucket aggregations.
    pub fn fixed(column: &str, buckets: Vec<FixedBucket>) -> Self {
        Level {
            aggregation: None,
            fixed_buckets: buckets,
            ..Level::terms(column, "")
        }
    }

    pub fn labelled(mut self, label: KeyLabel) -> Self {
        self.label = label;
        self
    }

    /// Uses the same sentinel for "no children" and "children undercount".
    pub fn sentinel(mut self, label: &str) -> Self {
        self.empty_label = label.to_string();
        self.gap_label = label.to_string();
        self
    }

    pub fn empty_as(mut self, label: &str) -> Self {
        self.empty_label = label.to_string();
        self
    }

    pub fn gap_as(mut self, label: &str) -> Self {
        self.gap_label = label.to_string();
        self
    }

    pub fn with_fixed(mut self, aggregation: &str, label: &str) -> Self {
        self.fixed_buckets.push(FixedBucket {
            aggregation: aggregation.to_string(),
            label: label.to_string(),
        });
        self
    }

    pub fn with_metric(mut self, metric: MetricRule) -> Self {
        self.metric = Some(metric);
        self
    }
}

// ============================================================================
// FLATTEN SPEC
// ============================================================================

/// Ordered dimensions of one bucket-tree report, root first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenSpec {
    pub levels: Vec<Level>,
    #[serde(default = "default_count_column")]
    pub count_column: String,
}

fn default_count_column() -> String {
    "count".to_string()
}

impl FlattenSpec {
    pub fn new(levels: Vec<Level>) -> Self {
        FlattenSpec {
            levels,
            count_column: default_count_column(),
        }
    }

    pub fn with_count_column(mut self, column: &str) -> Self {
        self.count_column = column.to_string();
        self
    }

    /// Detail table headers: one per level plus the count column.
    pub fn columns(&self) -> Vec<String> {
        self.levels
            .iter()
            .map(|l| l.column.clone())
            .chain(std::iter::once(self.count_column.clone()))
            .collect()
    }

    pub fn validate(&self) -> Result<(), FlattenError> {
        let Some(root) = self.levels.first() else {
            return Err(FlattenError::InvalidDescriptor("no levels configured".to_string()));
        };
        if root.aggregation.is_none() {
            return Err(FlattenError::InvalidDescriptor(
                "the root level must name an aggregation".to_string(),
            ));
        }
        for level in &self.levels {
            if level.aggregation.as_deref().map_or(true, str::is_empty) && level.fixed_buckets.is_empty() {
                return Err(FlattenError::InvalidDescriptor(format!(
                    "level '{}' has neither an aggregation nor fixed buckets",
                    level.column
                )));
            }
            match &level.label {
                KeyLabel::Bins(scheme) => scheme.validate()?,
                KeyLabel::Range { width, .. } if *width <= 0.0 => {
                    return Err(FlattenError::InvalidDescriptor(format!(
                        "level '{}' has a non-positive range width",
                        level.column
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

// ============================================================================
// HITS SPEC
// ============================================================================

/// One output column of a row-per-document report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitColumn {
    pub header: String,
    /// Source field, either a flat dotted key or a nested path.
    pub field: String,
}

/// Row-per-document extraction from `hits.hits[]._source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitsSpec {
    pub columns: Vec<HitColumn>,
    #[serde(default = "default_missing")]
    pub missing: String,
}

fn default_missing() -> String {
    "N/A".to_string()
}

impl HitsSpec {
    pub fn new(columns: &[(&str, &str)]) -> Self {
        HitsSpec {
            columns: columns
                .iter()
                .map(|(header, field)| HitColumn {
                    header: header.to_string(),
                    field: field.to_string(),
                })
                .collect(),
            missing: default_missing(),
        }
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.clone()).collect()
    }
}
