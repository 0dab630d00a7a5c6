//! FILENAME: core/report-engine/src/aggregate.rs
//! Aggregate primitives over flattened rows.
//!
//! Every function here is pure and total: empty input gives empty output,
//! and any division by a zero denominator yields 0.
//!
//! Groups are keyed by a subset of the row's dimensions (`dims` holds level
//! indices). Group order is first-seen unless a function states otherwise,
//! and every sort is stable so ties keep that order.

use std::cmp::Ordering;

use bucket_tree::FlatRow;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;

/// Dimension values identifying one group.
pub type GroupKey = SmallVec<[String; 4]>;

type GroupMap<V> = IndexMap<GroupKey, V, FxBuildHasher>;

/// Projects a row onto the requested dimensions.
pub fn group_key(row: &FlatRow, dims: &[usize]) -> GroupKey {
    dims.iter().map(|&d| row.dim(d).to_string()).collect()
}

fn group_rows<'r>(rows: &'r [FlatRow], dims: &[usize]) -> GroupMap<Vec<&'r FlatRow>> {
    let mut groups: GroupMap<Vec<&FlatRow>> = GroupMap::default();
    for row in rows {
        groups.entry(group_key(row, dims)).or_default().push(row);
    }
    groups
}

// ============================================================================
// SUMS AND RANKING
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSum {
    pub key: GroupKey,
    pub count: u64,
}

/// Total count per group, largest first.
pub fn sum_by(rows: &[FlatRow], dims: &[usize]) -> Vec<GroupSum> {
    let mut groups: GroupMap<u64> = GroupMap::default();
    for row in rows {
        *groups.entry(group_key(row, dims)).or_insert(0) += row.count;
    }
    let mut sums: Vec<GroupSum> = groups
        .into_iter()
        .map(|(key, count)| GroupSum { key, count })
        .collect();
    sums.sort_by(|a, b| b.count.cmp(&a.count));
    sums
}

/// The `n` largest groups.
pub fn top_n(rows: &[FlatRow], dims: &[usize], n: usize) -> Vec<GroupSum> {
    let mut sums = sum_by(rows, dims);
    sums.truncate(n);
    sums
}

pub fn total(rows: &[FlatRow]) -> u64 {
    rows.iter().map(|r| r.count).sum()
}

// ============================================================================
// RATIOS AND AVERAGES
// ============================================================================

/// `part / whole * 100`, or 0 when `whole` is 0.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

/// `Σ(value × count) / Σ(count)`, or 0 when no counts.
pub fn weighted_average<I>(pairs: I) -> f64
where
    I: IntoIterator<Item = (f64, u64)>,
{
    let (weighted, weight) = pairs
        .into_iter()
        .fold((0.0, 0u64), |(sum, n), (value, count)| (sum + value * count as f64, n + count));
    if weight == 0 {
        0.0
    } else {
        weighted / weight as f64
    }
}

/// A group's metric average together with the group's full count.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAverage {
    pub key: GroupKey,
    /// Count-weighted mean of `metric` over the rows that carry one.
    pub average: f64,
    /// Count of every row in the group, including rows without a metric.
    pub count: u64,
}

/// Count-weighted metric average per group.
pub fn weighted_average_by(rows: &[FlatRow], dims: &[usize]) -> Vec<GroupAverage> {
    group_rows(rows, dims)
        .into_iter()
        .map(|(key, members)| GroupAverage {
            average: weighted_average(
                members.iter().filter_map(|r| r.metric.map(|m| (m, r.count))),
            ),
            count: members.iter().map(|r| r.count).sum(),
            key,
        })
        .collect()
}

/// Re-aggregates leaf averages onto the first `depth` key parts, weighting
/// each leaf by its own full count.
pub fn rollup(leaves: &[GroupAverage], depth: usize) -> Vec<GroupAverage> {
    let mut parents: GroupMap<Vec<&GroupAverage>> = GroupMap::default();
    for leaf in leaves {
        let key: GroupKey = leaf.key.iter().take(depth).cloned().collect();
        parents.entry(key).or_default().push(leaf);
    }
    parents
        .into_iter()
        .map(|(key, members)| GroupAverage {
            average: weighted_average(members.iter().map(|l| (l.average, l.count))),
            count: members.iter().map(|l| l.count).sum(),
            key,
        })
        .collect()
}

// ============================================================================
// GROUP STATISTICS
// ============================================================================

/// Distribution of row counts within one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub key: GroupKey,
    pub mean: f64,
    pub max: u64,
    pub min: u64,
    pub rows: usize,
}

/// Mean / max / min of the individual row counts in each group.
pub fn group_stats(rows: &[FlatRow], dims: &[usize]) -> Vec<GroupStats> {
    group_rows(rows, dims)
        .into_iter()
        .map(|(key, members)| {
            let counts: Vec<u64> = members.iter().map(|r| r.count).collect();
            let sum: u64 = counts.iter().sum();
            GroupStats {
                key,
                mean: if counts.is_empty() { 0.0 } else { sum as f64 / counts.len() as f64 },
                max: counts.iter().copied().max().unwrap_or(0),
                min: counts.iter().copied().min().unwrap_or(0),
                rows: counts.len(),
            }
        })
        .collect()
}

// ============================================================================
// MATCHING RATIOS AND COVERAGE
// ============================================================================

/// Share of a group whose `dimension` equals a given value.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioRow {
    pub key: GroupKey,
    pub total: u64,
    pub matching: u64,
    pub percentage: f64,
}

/// Per group: total count, count of rows whose `dimension` equals
/// `matching`, and their percentage. Highest percentage first.
pub fn ratio_by(rows: &[FlatRow], dims: &[usize], dimension: usize, matching: &str) -> Vec<RatioRow> {
    let mut ratios: Vec<RatioRow> = group_rows(rows, dims)
        .into_iter()
        .map(|(key, members)| {
            let total: u64 = members.iter().map(|r| r.count).sum();
            let hit: u64 = members
                .iter()
                .filter(|r| r.dim(dimension) == matching)
                .map(|r| r.count)
                .sum();
            RatioRow {
                key,
                total,
                matching: hit,
                percentage: percentage(hit as f64, total as f64),
            }
        })
        .collect();
    ratios.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    ratios
}

/// How much of a baseline population a second document covers.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageRow {
    pub key: String,
    pub total: u64,
    pub covered: u64,
    pub percentage: f64,
    /// Covered count split by a second dimension, first-seen order.
    pub breakdown: Vec<(String, u64)>,
}

/// Joins `rows` onto `baseline` by the baseline's root dimension and the
/// rows' `dim`. Keys absent from the baseline are ignored; synthetic rows
/// are ignored on both sides. Largest baseline total first.
pub fn coverage(
    baseline: &[FlatRow],
    rows: &[FlatRow],
    dim: usize,
    breakdown_dim: Option<usize>,
) -> Vec<CoverageRow> {
    let mut totals: IndexMap<&str, u64, FxBuildHasher> = IndexMap::default();
    for row in baseline.iter().filter(|r| !r.synthetic) {
        *totals.entry(row.dim(0)).or_insert(0) += row.count;
    }

    let mut covered: IndexMap<&str, GroupMap<u64>, FxBuildHasher> = IndexMap::default();
    for row in rows.iter().filter(|r| !r.synthetic) {
        let split: GroupKey = breakdown_dim
            .map(|d| row.dim(d).to_string())
            .into_iter()
            .collect();
        *covered
            .entry(row.dim(dim))
            .or_default()
            .entry(split)
            .or_insert(0) += row.count;
    }

    let mut out: Vec<CoverageRow> = totals
        .into_iter()
        .map(|(key, total)| {
            let parts = covered.get(key);
            let covered_count: u64 = parts.map(|p| p.values().sum()).unwrap_or(0);
            let breakdown = match (breakdown_dim, parts) {
                (Some(_), Some(p)) => p
                    .iter()
                    .map(|(k, c)| (k.first().cloned().unwrap_or_default(), *c))
                    .collect(),
                _ => Vec::new(),
            };
            CoverageRow {
                key: key.to_string(),
                total,
                covered: covered_count,
                percentage: percentage(covered_count as f64, total as f64),
                breakdown,
            }
        })
        .collect();
    out.sort_by(|a, b| b.total.cmp(&a.total));
    out
}

// ============================================================================
// ORDERING
// ============================================================================

/// Orders labels numerically when both parse as numbers, numbers before
/// text otherwise, then plain string order. A total order, so it is safe
/// for `sort_by` even on labels such as `"NaN"`.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        _ => a.cmp(b),
    }
}
