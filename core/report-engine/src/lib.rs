//! FILENAME: core/report-engine/src/lib.rs
//! Report assembly for registry statistics.
//!
//! Consumes the rows produced by `bucket-tree` and derives the tables a
//! report workbook holds. Depends on `engine` for the shared table and cell
//! types.
//!
//! Layers:
//! - `definition`: Serializable report configuration (what a report IS)
//! - `aggregate`: Pure group-by primitives (HOW numbers are derived)
//! - `assembler`: Detail, summary and extra tables (WHAT is written)

pub mod aggregate;
pub mod assembler;
pub mod definition;
pub mod error;

pub use aggregate::{
    coverage, group_stats, percentage, ratio_by, rollup, sum_by, top_n, weighted_average,
    weighted_average_by, GroupKey, GroupSum,
};
pub use assembler::{assemble, ReportRows, PLACEHOLDER};
pub use definition::*;
pub use error::AssembleError;
