//! FILENAME: core/bucket-tree/src/lib.rs
//! Bucket-tree flattening for registry reports.
//!
//! A retrieved search response is a nested tree of aggregation buckets. This
//! crate turns that tree into flat rows of dimension values plus a document
//! count, inserting sentinel rows wherever children do not account for their
//! parent's documents.
//!
//! Layers:
//! - `document`: Read-only view over a response file (WHAT was retrieved)
//! - `definition`: Serializable traversal descriptor (WHAT to extract)
//! - `flattener`: Tree walk producing `FlatRow`s (HOW counts are reconciled)
//! - `hits`: Row-per-document extraction for record listings

pub mod definition;
pub mod document;
pub mod error;
pub mod flattener;
pub mod hits;

pub use definition::*;
pub use document::{Aggregation, Bucket, BucketKey, SearchResponse};
pub use error::FlattenError;
pub use flattener::{flatten, DimTuple, FlatRow, FlattenContext, Flattened};
pub use hits::flatten_hits;
