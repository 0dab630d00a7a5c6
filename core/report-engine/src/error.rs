//! FILENAME: core/report-engine/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("Invalid report definition: {0}")]
    InvalidDefinition(String),

    #[error("Report '{report}' expects {expected} rows but received {received}")]
    SourceMismatch {
        report: String,
        expected: &'static str,
        received: &'static str,
    },
}
