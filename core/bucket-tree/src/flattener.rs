//! FILENAME: core/bucket-tree/src/flattener.rs
//! Bucket-Tree Flattener - turns a nested aggregation tree into count rows.
//!
//! Algorithm (one recursion step per configured level):
//! 1. Collect the node's children for the current level, in source order,
//!    plus any fixed single-bucket siblings.
//! 2. No children but documents: emit one row with the level's empty label.
//! 3. Children undercount the node: emit one gap row for the remainder,
//!    ahead of the children.
//! 4. Terminal level: emit one row per child. Otherwise recurse into each
//!    child with the dimension tuple extended by the child's label.
//!
//! A synthetic row fills every deeper dimension with that level's empty
//! label, so the counts of all rows emitted beneath a node always add up to
//! the node's own document count.

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::definition::{FlattenSpec, KeyLabel, Level, MetricRule};
use crate::document::{Aggregation, Bucket, SearchResponse};
use crate::error::FlattenError;

/// Dimension values of one row, root first.
pub type DimTuple = SmallVec<[String; 4]>;

// ============================================================================
// OUTPUT
// ============================================================================

/// One fully-qualified path through the tree plus its document count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRow {
    pub dims: DimTuple,
    pub count: u64,
    /// Numeric attribute from the terminal level's metric rule, if any.
    pub metric: Option<f64>,
    /// True for empty/gap sentinel rows.
    pub synthetic: bool,
}

impl FlatRow {
    pub fn new(dims: &[&str], count: u64) -> Self {
        FlatRow {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            count,
            metric: None,
            synthetic: false,
        }
    }

    pub fn with_metric(mut self, metric: f64) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn dim(&self, idx: usize) -> &str {
        self.dims.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// Result of flattening one response document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flattened {
    pub rows: Vec<FlatRow>,
    pub total_hits: u64,
    pub partial: bool,
}

impl Flattened {
    /// Appends another document's rows; totals add up, partial is sticky.
    pub fn extend(&mut self, other: Flattened) {
        self.rows.extend(other.rows);
        self.total_hits += other.total_hits;
        self.partial |= other.partial;
    }
}

/// Inputs to key/metric conversions that do not come from the document.
#[derive(Debug, Clone, Copy)]
pub struct FlattenContext {
    pub reference_date: NaiveDate,
}

impl FlattenContext {
    pub fn new(reference_date: NaiveDate) -> Self {
        FlattenContext { reference_date }
    }
}

// ============================================================================
// FLATTENER
// ============================================================================

/// A child of the current node at the current level.
struct Child<'a> {
    label: String,
    count: u64,
    metric: Option<f64>,
    bucket: Bucket<'a>,
}

struct Flattener<'s> {
    spec: &'s FlattenSpec,
    ctx: &'s FlattenContext,
    rows: Vec<FlatRow>,
}

impl<'s> Flattener<'s> {
    fn run(mut self, response: &SearchResponse) -> Result<Vec<FlatRow>, FlattenError> {
        let spec = self.spec;
        let root = &spec.levels[0];
        let root_name = root.aggregation.as_deref().unwrap_or_default();

        let root_buckets = match response.aggregation(root_name)? {
            Some(agg) => agg.buckets().to_vec(),
            None if response.total_hits == 0 => return Ok(Vec::new()),
            None => {
                return Err(FlattenError::malformed(
                    "aggregations",
                    format!("expected root aggregation '{}'", root_name),
                ));
            }
        };

        let mut children = Vec::with_capacity(root_buckets.len());
        for bucket in root_buckets {
            children.push(self.make_child(root, bucket)?);
        }

        // A lower-bound total cannot be reconciled against the buckets.
        let account_root = response.total_is_exact;
        let mut prefix = DimTuple::new();
        self.visit(0, response.total_hits, children, &mut prefix, account_root)?;
        Ok(self.rows)
    }

    fn visit<'a>(
        &mut self,
        depth: usize,
        parent_count: u64,
        children: Vec<Child<'a>>,
        prefix: &mut DimTuple,
        reconcile: bool,
    ) -> Result<(), FlattenError> {
        let spec = self.spec;
        let level = &spec.levels[depth];

        if children.is_empty() {
            if reconcile && parent_count > 0 {
                self.emit_synthetic(depth, prefix, &level.empty_label, parent_count);
            }
            return Ok(());
        }

        let child_sum: u64 = children.iter().map(|c| c.count).sum();
        if reconcile && child_sum < parent_count {
            self.emit_synthetic(depth, prefix, &level.gap_label, parent_count - child_sum);
        } else if child_sum > parent_count && depth > 0 {
            log::debug!(
                "children of [{}] overcount their parent ({} > {})",
                prefix.join(", "),
                child_sum,
                parent_count
            );
        }

        let terminal = depth + 1 == spec.levels.len();
        for child in children {
            prefix.push(child.label);
            if terminal {
                self.rows.push(FlatRow {
                    dims: prefix.clone(),
                    count: child.count,
                    metric: child.metric,
                    synthetic: false,
                });
            } else {
                let next = &spec.levels[depth + 1];
                let grandchildren = self.collect_children(&child.bucket, next)?;
                self.visit(depth + 1, child.count, grandchildren, prefix, true)?;
            }
            prefix.pop();
        }
        Ok(())
    }

    /// Children of `bucket` for `level`: the named aggregation's buckets in
    /// source order, then any fixed single-bucket siblings that are present.
    fn collect_children<'a>(
        &self,
        bucket: &Bucket<'a>,
        level: &Level,
    ) -> Result<Vec<Child<'a>>, FlattenError> {
        let mut children = Vec::new();

        if let Some(name) = level.aggregation.as_deref() {
            if let Some(agg) = bucket.child(name)? {
                for child in agg.buckets() {
                    children.push(self.make_child(level, child.clone())?);
                }
            }
        }

        for fixed in &level.fixed_buckets {
            if let Some(agg) = bucket.child(&fixed.aggregation)? {
                let single = match agg {
                    Aggregation::Single(b) => b,
                    Aggregation::Buckets(_) => {
                        return Err(FlattenError::malformed(
                            bucket.path(),
                            format!("'{}' is not a single-bucket aggregation", fixed.aggregation),
                        ));
                    }
                };
                children.push(Child {
                    label: fixed.label.clone(),
                    count: single.doc_count,
                    metric: None,
                    bucket: single,
                });
            }
        }

        Ok(children)
    }

    fn make_child<'a>(&self, level: &Level, bucket: Bucket<'a>) -> Result<Child<'a>, FlattenError> {
        let label = key_label(&level.label, &bucket, self.ctx)?;
        let metric = match level.metric {
            Some(rule) => metric_value(rule, &bucket, self.ctx)?,
            None => None,
        };
        Ok(Child {
            label,
            count: bucket.doc_count,
            metric,
            bucket,
        })
    }

    fn emit_synthetic(&mut self, depth: usize, prefix: &DimTuple, label: &str, count: u64) {
        let spec = self.spec;
        let mut dims = prefix.clone();
        dims.push(label.to_string());
        for deeper in &spec.levels[depth + 1..] {
            dims.push(deeper.empty_label.clone());
        }
        self.rows.push(FlatRow {
            dims,
            count,
            metric: None,
            synthetic: true,
        });
    }
}

/// Flattens one response document according to `spec`.
///
/// Zero hits yield no rows. A lower-bound hit total (`relation: "gte"`) is
/// not reconciled against the root buckets; every deeper level is.
pub fn flatten(
    response: &SearchResponse,
    spec: &FlattenSpec,
    ctx: &FlattenContext,
) -> Result<Flattened, FlattenError> {
    spec.validate()?;

    let flattener = Flattener {
        spec,
        ctx,
        rows: Vec::new(),
    };
    let rows = flattener.run(response)?;

    Ok(Flattened {
        rows,
        total_hits: response.total_hits,
        partial: response.partial,
    })
}

// ============================================================================
// KEY CONVERSIONS
// ============================================================================

fn key_label(label: &KeyLabel, bucket: &Bucket<'_>, ctx: &FlattenContext) -> Result<String, FlattenError> {
    match label {
        KeyLabel::Raw => Ok(bucket.key.as_label()),
        KeyLabel::KeyAsString => Ok(bucket
            .key_as_string
            .map(str::to_string)
            .unwrap_or_else(|| bucket.key.as_label())),
        KeyLabel::Range { width, inclusive } => {
            let start = numeric_key(bucket)?;
            let end = if *inclusive { start + width - 1.0 } else { start + width };
            Ok(format!("{}-{}", engine::format_number(start), engine::format_number(end)))
        }
        KeyLabel::Bins(scheme) => Ok(scheme.label_for(numeric_key(bucket)?).to_string()),
        KeyLabel::AgeInYears => Ok(age_in_years(bucket, ctx)?.to_string()),
    }
}

fn metric_value(rule: MetricRule, bucket: &Bucket<'_>, ctx: &FlattenContext) -> Result<Option<f64>, FlattenError> {
    match rule {
        MetricRule::AgeInYears { window } => {
            let age = age_in_years(bucket, ctx)?;
            Ok(match window {
                Some(w) if !w.contains(age) => None,
                _ => Some(age as f64),
            })
        }
        MetricRule::MidpointAge { offset } => {
            let start = numeric_key(bucket)?;
            Ok(Some(ctx.reference_date.year() as f64 - (start + offset)))
        }
    }
}

fn numeric_key(bucket: &Bucket<'_>) -> Result<f64, FlattenError> {
    bucket
        .key
        .as_number()
        .ok_or_else(|| FlattenError::malformed(bucket.path(), "expected a numeric bucket key"))
}

/// Whole years (365-day periods) between the bucket's date and the reference
/// date. Reads `key_as_string` as `YYYY-MM-DD...`, else the key as epoch
/// milliseconds.
fn age_in_years(bucket: &Bucket<'_>, ctx: &FlattenContext) -> Result<i64, FlattenError> {
    let date = bucket
        .key_as_string
        .and_then(|s| s.get(..10))
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .or_else(|| {
            bucket
                .key
                .as_number()
                .and_then(|ms| DateTime::from_timestamp_millis(ms as i64))
                .map(|dt| dt.date_naive())
        })
        .ok_or_else(|| FlattenError::malformed(bucket.path(), "expected a date bucket key"))?;

    let days = (ctx.reference_date - date).num_days();
    Ok(days.div_euclid(365))
}
