//! FILENAME: core/report-engine/src/assembler.rs
//! Report Assembler - turns flattened rows into the named tables of a report.
//!
//! Output order is fixed: the detail table, then the `{Metric, Value}`
//! summary (when the definition has one), then each extra table in
//! definition order. Empty input still yields every table, with headers
//! and zero or placeholder values.

use std::cmp::Ordering;

use bucket_tree::{FlatRow, FlattenSpec, Flattened, HitsSpec};
use engine::{format_percentage, CellValue, ReportTable};
use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::aggregate::{
    compare_labels, coverage, group_key, group_stats, percentage, ratio_by, rollup, sum_by, top_n,
    total, weighted_average_by, GroupKey,
};
use crate::definition::{
    CountStat, DetailColumn, DetailOrder, Extreme, MetricLine, ReportDefinition, RowSource,
    SortKey, TableSpec,
};
use crate::error::AssembleError;

/// Placeholder for summary values that have no data to describe.
pub const PLACEHOLDER: &str = "n/a";

const METRIC_HEADERS: [&str; 2] = ["Metric", "Value"];

/// The rows one report run feeds into the assembler.
#[derive(Debug, Clone)]
pub enum ReportRows {
    Buckets {
        main: Flattened,
        baseline: Option<Flattened>,
    },
    Hits(Vec<Vec<String>>),
}

impl ReportRows {
    fn kind(&self) -> &'static str {
        match self {
            ReportRows::Buckets { .. } => "bucket",
            ReportRows::Hits(_) => "document",
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            ReportRows::Buckets { main, .. } => main.rows.len(),
            ReportRows::Hits(rows) => rows.len(),
        }
    }
}

/// Builds every table of `def` from `rows`.
pub fn assemble(def: &ReportDefinition, rows: &ReportRows) -> Result<Vec<ReportTable>, AssembleError> {
    def.validate()?;

    let tables = match (&def.source, rows) {
        (RowSource::Buckets { spec, .. }, ReportRows::Buckets { main, baseline }) => {
            let empty = Vec::new();
            let base = baseline.as_ref().map(|b| &b.rows).unwrap_or(&empty);
            BucketReport::new(def, spec, main, base).tables()
        }
        (RowSource::Hits(spec), ReportRows::Hits(docs)) => vec![hits_table(def, spec, docs)],
        (source, received) => {
            let expected = match source {
                RowSource::Buckets { .. } => "bucket",
                RowSource::Hits(_) => "document",
            };
            return Err(AssembleError::SourceMismatch {
                report: def.name.clone(),
                expected,
                received: received.kind(),
            });
        }
    };

    log::debug!(
        "assembled {} table(s) for {} from {} row(s)",
        tables.len(),
        def.name,
        rows.row_count()
    );
    Ok(tables)
}

// ============================================================================
// BUCKET REPORTS
// ============================================================================

struct BucketReport<'a> {
    def: &'a ReportDefinition,
    spec: &'a FlattenSpec,
    /// Merged rows in source order; aggregates run over these.
    rows: Vec<FlatRow>,
    baseline: &'a [FlatRow],
    total_hits: u64,
}

impl<'a> BucketReport<'a> {
    fn new(def: &'a ReportDefinition, spec: &'a FlattenSpec, main: &Flattened, baseline: &'a [FlatRow]) -> Self {
        let rows = if def.detail.merge_duplicates {
            merge_duplicates(&main.rows)
        } else {
            main.rows.clone()
        };
        BucketReport {
            def,
            spec,
            rows,
            baseline,
            total_hits: main.total_hits,
        }
    }

    fn tables(&self) -> Vec<ReportTable> {
        let mut tables = vec![self.detail_table()];
        if let Some(sheet) = &self.def.summary_sheet {
            tables.push(self.summary_table(sheet));
        }
        for spec in &self.def.tables {
            tables.push(self.extra_table(spec));
        }
        tables
    }

    // ------------------------------------------------------------------
    // Detail
    // ------------------------------------------------------------------

    fn detail_table(&self) -> ReportTable {
        let mut headers = self.spec.columns();
        headers.extend(self.def.detail.extra_columns.iter().map(|c| c.header().to_string()));
        let mut table = ReportTable::with_headers(&self.def.detail_sheet, &headers);

        let lookups: Vec<ColumnLookup> = self
            .def
            .detail
            .extra_columns
            .iter()
            .map(|c| ColumnLookup::build(c, &self.rows))
            .collect();

        let mut ordered: Vec<&FlatRow> = self.rows.iter().collect();
        if let DetailOrder::Sorted(keys) = &self.def.detail.order {
            ordered.sort_by(|a, b| compare_rows(a, b, keys));
        }

        for row in ordered {
            let mut cells: Vec<CellValue> = row.dims.iter().map(|d| CellValue::text(d.as_str())).collect();
            cells.push(CellValue::count(row.count));
            for (column, lookup) in self.def.detail.extra_columns.iter().zip(&lookups) {
                cells.push(self.extra_cell(column, lookup, row));
            }
            table.push_row(cells);
        }
        table
    }

    fn extra_cell(&self, column: &DetailColumn, lookup: &ColumnLookup, row: &FlatRow) -> CellValue {
        match column {
            DetailColumn::Metric { .. } => row.metric.map(CellValue::Number).unwrap_or_default(),
            DetailColumn::ShareOfTotalHits { .. } => {
                CellValue::Number(percentage(row.count as f64, self.total_hits as f64))
            }
            DetailColumn::GroupWeightedAverage { .. } | DetailColumn::GroupRollup { .. } => {
                CellValue::Number(lookup.average(row))
            }
            DetailColumn::LabelAnomaly {
                label_dim,
                ranking,
                rules,
                ..
            } => {
                let rank = ranking.iter().position(|l| l == row.dim(*label_dim));
                let flagged = match row.metric {
                    Some(age) => rules
                        .iter()
                        .any(|r| rank.map_or(true, |k| k < r.rank_below) && age > r.metric_above),
                    None => false,
                };
                CellValue::text(if flagged { "Potential anomaly" } else { "Normal" })
            }
        }
    }

    // ------------------------------------------------------------------
    // Summary
    // ------------------------------------------------------------------

    fn summary_table(&self, sheet: &str) -> ReportTable {
        let mut table = ReportTable::with_headers(sheet, &METRIC_HEADERS);
        for line in &self.def.metrics {
            for (label, value) in self.metric_lines(line) {
                table.push_row(vec![CellValue::Text(label), value]);
            }
        }
        table
    }

    fn metric_lines(&self, line: &MetricLine) -> Vec<(String, CellValue)> {
        let rows = &self.rows;
        match line {
            MetricLine::Total { label } => vec![(label.clone(), CellValue::count(total(rows)))],

            MetricLine::BaselineTotal { label } => {
                let base: u64 = self.baseline.iter().filter(|r| !r.synthetic).map(|r| r.count).sum();
                vec![(label.clone(), CellValue::count(base))]
            }

            MetricLine::GroupCount { label, dims } => {
                vec![(label.clone(), CellValue::count(sum_by(rows, dims).len() as u64))]
            }

            MetricLine::SumBy { prefix, dims, limit } => {
                let mut sums = sum_by(rows, dims);
                if let Some(n) = limit {
                    sums.truncate(*n);
                }
                sums.into_iter()
                    .map(|s| (format!("{} {}", prefix, s.key.join(", ")), CellValue::count(s.count)))
                    .collect()
            }

            MetricLine::TopCombinations { dims, n, separator } => {
                let top = top_n(rows, dims, *n);
                (0..*n)
                    .map(|i| {
                        let value = match top.get(i) {
                            Some(s) => CellValue::Text(format!("{}: {}", s.key.join(separator), s.count)),
                            None => CellValue::text(PLACEHOLDER),
                        };
                        (format!("Top Combination {}", i + 1), value)
                    })
                    .collect()
            }

            MetricLine::CountStat { label, stat, per } => {
                let stats = group_stats(rows, per);
                let value = if stats.is_empty() {
                    0.0
                } else {
                    match stat {
                        CountStat::Mean => stats.iter().map(|s| s.mean).sum::<f64>() / stats.len() as f64,
                        CountStat::Max => stats.iter().map(|s| s.max).max().unwrap_or(0) as f64,
                        CountStat::Min => stats.iter().map(|s| s.min).min().unwrap_or(0) as f64,
                    }
                };
                vec![(label.clone(), CellValue::Number(value))]
            }

            MetricLine::MostCommon { label, dims } => {
                let value = sum_by(rows, dims)
                    .first()
                    .map(|s| CellValue::Text(s.key.join(", ")))
                    .unwrap_or_else(|| CellValue::text(PLACEHOLDER));
                vec![(label.clone(), value)]
            }

            MetricLine::MatchingTotal { label, dim, matching } => {
                vec![(label.clone(), CellValue::count(matching_total(rows, *dim, matching)))]
            }

            MetricLine::OverallPercentage { label, dim, matching } => {
                let pct = percentage(matching_total(rows, *dim, matching) as f64, total(rows) as f64);
                vec![(label.clone(), CellValue::Text(format_percentage(pct)))]
            }

            MetricLine::CoveragePercentage { label, dim } => {
                let joined = coverage(self.baseline, rows, *dim, None);
                let base: u64 = joined.iter().map(|c| c.total).sum();
                let covered: u64 = joined.iter().map(|c| c.covered).sum();
                let pct = percentage(covered as f64, base as f64);
                vec![(label.clone(), CellValue::Text(format_percentage(pct)))]
            }

            MetricLine::WeightedAverage { label, leaf_dims } => {
                let overall = rollup(&weighted_average_by(rows, leaf_dims), 0);
                let value = overall.first().map(|g| g.average).unwrap_or(0.0);
                vec![(label.clone(), CellValue::Number(value))]
            }

            MetricLine::WeightedAverageExtreme { label, dims, extreme } => {
                let averages = weighted_average_by(rows, dims).into_iter().map(|g| g.average);
                let value = match extreme {
                    Extreme::Min => averages.min_by(f64::total_cmp),
                    Extreme::Max => averages.max_by(f64::total_cmp),
                };
                vec![(label.clone(), CellValue::Number(value.unwrap_or(0.0)))]
            }

            MetricLine::CoverageTotal { label, dim } => {
                let covered: u64 = coverage(self.baseline, rows, *dim, None).iter().map(|c| c.covered).sum();
                vec![(label.clone(), CellValue::count(covered))]
            }

            MetricLine::CoverageBreakdown {
                dim,
                breakdown,
                total_prefix,
                share_suffix,
            } => {
                let joined = coverage(self.baseline, rows, *dim, Some(*breakdown));
                let covered: u64 = joined.iter().map(|c| c.covered).sum();

                let mut totals: IndexMap<&str, u64, FxBuildHasher> = IndexMap::default();
                for row in &joined {
                    for (value, count) in &row.breakdown {
                        *totals.entry(value.as_str()).or_insert(0) += count;
                    }
                }

                let mut lines: Vec<(String, CellValue)> = totals
                    .iter()
                    .map(|(value, count)| (format!("{} {}", total_prefix, value), CellValue::count(*count)))
                    .collect();
                lines.extend(totals.iter().map(|(value, count)| {
                    let share = percentage(*count as f64, covered as f64);
                    (format!("{} {}", value, share_suffix), CellValue::Text(format_percentage(share)))
                }));
                lines
            }
        }
    }

    // ------------------------------------------------------------------
    // Extra tables
    // ------------------------------------------------------------------

    fn extra_table(&self, spec: &TableSpec) -> ReportTable {
        let rows = &self.rows;
        match spec {
            TableSpec::GroupStats { sheet, dims, headers } => {
                let mut table = ReportTable::with_headers(sheet, headers);
                for stats in group_stats(rows, dims) {
                    let mut cells = key_cells(&stats.key);
                    cells.push(CellValue::Number(stats.mean));
                    cells.push(CellValue::count(stats.max));
                    cells.push(CellValue::count(stats.min));
                    table.push_row(cells);
                }
                let mut total_row = vec![CellValue::text("Total")];
                total_row.extend((1..dims.len()).map(|_| CellValue::text("")));
                total_row.push(CellValue::count(total(rows)));
                table.push_row(total_row);
                table
            }

            TableSpec::Ratio {
                sheet,
                dims,
                dimension,
                matching,
                headers,
            } => {
                let mut table = ReportTable::with_headers(sheet, headers);
                for ratio in ratio_by(rows, dims, *dimension, matching) {
                    let mut cells = key_cells(&ratio.key);
                    cells.push(CellValue::count(ratio.total));
                    cells.push(CellValue::count(ratio.matching));
                    cells.push(CellValue::Number(ratio.percentage));
                    table.push_row(cells);
                }
                table
            }

            TableSpec::Coverage {
                sheet,
                dim,
                breakdown,
                breakdown_prefix,
                headers,
            } => {
                let joined = coverage(self.baseline, rows, *dim, *breakdown);

                let mut labels: IndexMap<&str, usize, FxBuildHasher> = IndexMap::default();
                for row in &joined {
                    for (label, _) in &row.breakdown {
                        let next = labels.len();
                        labels.entry(label.as_str()).or_insert(next);
                    }
                }

                let mut all_headers = headers.clone();
                all_headers.extend(labels.keys().map(|l| format!("{}{}", breakdown_prefix, l)));
                let mut table = ReportTable::with_headers(sheet, &all_headers);

                for row in &joined {
                    let mut cells = vec![
                        CellValue::text(row.key.as_str()),
                        CellValue::count(row.total),
                        CellValue::count(row.covered),
                        CellValue::Number(row.percentage),
                    ];
                    let mut split = vec![CellValue::Empty; labels.len()];
                    for (label, count) in &row.breakdown {
                        if let Some(&idx) = labels.get(label.as_str()) {
                            split[idx] = CellValue::count(*count);
                        }
                    }
                    cells.extend(split);
                    table.push_row(cells);
                }
                table
            }
        }
    }
}

/// Pre-computed group averages for one derived detail column.
enum ColumnLookup {
    None,
    Averages {
        key_dims: Vec<usize>,
        values: FxHashMap<GroupKey, f64>,
    },
}

impl ColumnLookup {
    fn build(column: &DetailColumn, rows: &[FlatRow]) -> Self {
        match column {
            DetailColumn::GroupWeightedAverage { dims, .. } => ColumnLookup::Averages {
                key_dims: dims.clone(),
                values: weighted_average_by(rows, dims)
                    .into_iter()
                    .map(|g| (g.key, g.average))
                    .collect(),
            },
            DetailColumn::GroupRollup { leaf_dims, depth, .. } => ColumnLookup::Averages {
                key_dims: leaf_dims[..*depth].to_vec(),
                values: rollup(&weighted_average_by(rows, leaf_dims), *depth)
                    .into_iter()
                    .map(|g| (g.key, g.average))
                    .collect(),
            },
            _ => ColumnLookup::None,
        }
    }

    fn average(&self, row: &FlatRow) -> f64 {
        match self {
            ColumnLookup::Averages { key_dims, values } => {
                values.get(&group_key(row, key_dims)).copied().unwrap_or(0.0)
            }
            ColumnLookup::None => 0.0,
        }
    }
}

fn key_cells(key: &GroupKey) -> Vec<CellValue> {
    key.iter().map(|k| CellValue::text(k.as_str())).collect()
}

fn matching_total(rows: &[FlatRow], dim: usize, matching: &str) -> u64 {
    rows.iter().filter(|r| r.dim(dim) == matching).map(|r| r.count).sum()
}

/// Sums rows with identical dimension tuples, keeping first-seen order and
/// the first row's metric.
fn merge_duplicates(rows: &[FlatRow]) -> Vec<FlatRow> {
    let mut merged: IndexMap<&[String], FlatRow, FxBuildHasher> = IndexMap::default();
    for row in rows {
        match merged.get_mut(row.dims.as_slice()) {
            Some(existing) => {
                existing.count += row.count;
                existing.synthetic &= row.synthetic;
            }
            None => {
                merged.insert(row.dims.as_slice(), row.clone());
            }
        }
    }
    merged.into_values().collect()
}

fn compare_rows(a: &FlatRow, b: &FlatRow, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ord = match key {
            SortKey::Dim(d) => compare_labels(a.dim(*d), b.dim(*d)),
            SortKey::CountDesc => b.count.cmp(&a.count),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

// ============================================================================
// DOCUMENT LISTINGS
// ============================================================================

fn hits_table(def: &ReportDefinition, spec: &HitsSpec, docs: &[Vec<String>]) -> ReportTable {
    let mut table = ReportTable::with_headers(&def.detail_sheet, &spec.headers());

    let mut ordered: Vec<&Vec<String>> = docs.iter().collect();
    if let DetailOrder::Sorted(keys) = &def.detail.order {
        ordered.sort_by(|a, b| {
            for key in keys {
                if let SortKey::Dim(d) = key {
                    let left = a.get(*d).map(String::as_str).unwrap_or("");
                    let right = b.get(*d).map(String::as_str).unwrap_or("");
                    let ord = compare_labels(left, right);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
            Ordering::Equal
        });
    }

    for doc in ordered {
        table.push_row(doc.iter().map(|v| CellValue::text(v.as_str())).collect());
    }
    table
}
