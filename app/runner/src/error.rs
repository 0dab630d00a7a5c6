//! FILENAME: app/runner/src/error.rs

use bucket_tree::FlattenError;
use persistence::PersistenceError;
use report_engine::AssembleError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Unknown report: {0}")]
    UnknownReport(String),

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Flatten(#[from] FlattenError),

    #[error("Report assembly failed: {0}")]
    Assemble(#[from] AssembleError),

    #[error("Could not write workbook: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Invalid descriptor file: {0}")]
    Descriptor(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{failed} of {total} reports failed")]
    BatchFailed { failed: usize, total: usize },
}
