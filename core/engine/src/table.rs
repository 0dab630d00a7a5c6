//! FILENAME: core/engine/src/table.rs
//! PURPOSE: The named, immutable-once-built table that every report produces.
//! CONTEXT: A transform emits one detail table and one or more summary tables.
//! Tables are built row by row during assembly and never mutated afterwards;
//! persistence turns each one into a worksheet.

use serde::{Deserialize, Serialize};
use crate::cell::CellValue;

/// A named table of rows with column headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ReportTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        ReportTable {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Builds a table from string-like headers.
    pub fn with_headers<S: AsRef<str>>(name: impl Into<String>, headers: &[S]) -> Self {
        Self::new(name, headers.iter().map(|h| h.as_ref().to_string()).collect())
    }

    /// Appends a row. Short rows are padded with `Empty`, long rows truncated,
    /// so every row has exactly one cell per header.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.headers.len(), CellValue::Empty);
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Returns all values of the named column, top to bottom.
    pub fn column(&self, header: &str) -> Vec<&CellValue> {
        match self.column_index(header) {
            Some(idx) => self.rows.iter().map(|r| &r[idx]).collect(),
            None => Vec::new(),
        }
    }

    /// Looks up the value cell of a `{Metric, Value}` summary row by its label.
    pub fn metric(&self, label: &str) -> Option<&CellValue> {
        self.rows
            .iter()
            .find(|r| r.first().and_then(|c| c.as_text()) == Some(label))
            .and_then(|r| r.get(1))
    }
}
