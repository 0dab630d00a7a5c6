//! FILENAME: core/engine/src/cell.rs
//! PURPOSE: Defines the value held by a single report cell.
//! CONTEXT: Report tables are plain grids of `CellValue`. Counts are stored as
//! numbers so spreadsheet consumers can sum them; labels and composite
//! summaries ("A,Y: 30") are text.

use serde::{Deserialize, Serialize};

/// Represents the raw data within a report cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl CellValue {
    pub fn count(n: u64) -> Self {
        CellValue::Number(n as f64)
    }

    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Returns the numeric content, if any.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the display value of the cell as a String.
    pub fn display_value(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(b) => String::from(if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl From<u64> for CellValue {
    fn from(n: u64) -> Self {
        CellValue::count(n)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

/// Formats a number without unnecessary decimal places.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// Formats a percentage value (already scaled to 0..100) as "12.34%".
pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", value)
}
