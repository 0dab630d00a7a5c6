//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Shared value types for the report pipeline.
//! CONTEXT: Re-exports the cell and table types used by the assembler and
//! the persistence layer.

pub mod cell;
pub mod table;

// Re-export commonly used types at the crate root
pub use cell::{format_number, format_percentage, CellValue};
pub use table::ReportTable;
