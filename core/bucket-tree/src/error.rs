//! FILENAME: core/bucket-tree/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlattenError {
    #[error("Input file not found: {}", .0.display())]
    MissingInputFile(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Source query failed: {0}")]
    UpstreamQueryError(String),

    #[error("Malformed aggregation tree at {path}: {reason}")]
    MalformedTree { path: String, reason: String },

    #[error("Invalid flatten descriptor: {0}")]
    InvalidDescriptor(String),
}

impl FlattenError {
    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        FlattenError::MalformedTree {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
