//! FILENAME: core/persistence/src/lib.rs
//! Report Persistence Module
//!
//! Writes report tables to XLSX workbooks and reads them back. Each table
//! becomes one worksheet with a header row; run metadata travels in a hidden
//! sheet so a workbook can be traced back to the run that produced it.

mod error;
mod xlsx_reader;
mod xlsx_writer;

pub use error::PersistenceError;
pub use xlsx_reader::load_xlsx;
pub use xlsx_writer::save_xlsx;

use engine::ReportTable;
use serde::{Deserialize, Serialize};

// ============================================================================
// METADATA SHEET NAME
// ============================================================================

/// Hidden metadata sheet name. Filtered out during load, written last on save.
pub const META_SHEET_NAME: &str = "_report_meta";

// ============================================================================
// WORKBOOK
// ============================================================================

/// A complete report workbook: visible sheets in order, plus metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<ReportTable>,
    pub meta: Option<ReportMeta>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(sheets: Vec<ReportTable>, meta: ReportMeta) -> Self {
        Self {
            sheets,
            meta: Some(meta),
        }
    }

    pub fn sheet(&self, name: &str) -> Result<&ReportTable, PersistenceError> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| PersistenceError::SheetNotFound(name.to_string()))
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

// ============================================================================
// REPORT METADATA
// ============================================================================

/// Run metadata stored as JSON in cell A1 of the hidden metadata sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub version: u32,
    pub report: String,
    /// RFC 3339 timestamp of the run.
    pub generated_at: String,
    pub total_hits: u64,
    /// The source document was marked as incomplete.
    pub partial: bool,
}

impl ReportMeta {
    pub fn new(report: &str, generated_at: String, total_hits: u64, partial: bool) -> Self {
        Self {
            version: 1,
            report: report.to_string(),
            generated_at,
            total_hits,
            partial,
        }
    }

    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::CellValue;

    fn sample() -> Workbook {
        let mut detail = ReportTable::with_headers("Detailed Data", &["municipality_code", "unit_usage", "count"]);
        detail.push_row(vec![CellValue::text("101"), CellValue::text("No specific usage"), CellValue::count(20)]);
        detail.push_row(vec![CellValue::text("101"), CellValue::text("120"), CellValue::count(80)]);

        let mut summary = ReportTable::with_headers("Summary", &["Metric", "Value"]);
        summary.push_row(vec![CellValue::text("Total Units"), CellValue::count(100)]);
        summary.push_row(vec![CellValue::text("Overall Percentage"), CellValue::text("80.00%")]);

        Workbook::from_tables(
            vec![detail, summary],
            ReportMeta::new("null_heating_installation", "2024-06-01T12:00:00+00:00".into(), 100, false),
        )
    }

    #[test]
    fn saved_workbook_reads_back_with_meta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let workbook = sample();

        save_xlsx(&workbook, &path).unwrap();
        let loaded = load_xlsx(&path).unwrap();

        assert_eq!(loaded.sheet_names(), vec!["Detailed Data", "Summary"]);
        assert_eq!(loaded.meta, workbook.meta);

        let detail = loaded.sheet("Detailed Data").unwrap();
        assert_eq!(detail.headers, vec!["municipality_code", "unit_usage", "count"]);
        assert_eq!(detail.rows[1][1], CellValue::text("120"));
        assert_eq!(detail.rows[1][2], CellValue::Number(80.0));

        let summary = loaded.sheet("Summary").unwrap();
        assert_eq!(summary.metric("Overall Percentage"), Some(&CellValue::text("80.00%")));
    }

    #[test]
    fn headers_only_table_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        let workbook = Workbook::from_tables(
            vec![ReportTable::with_headers("Addresses", &["Address", "Unit Usage", "Unit Area"])],
            ReportMeta::new("address_unit_areass_query", "2024-06-01T12:00:00+00:00".into(), 0, false),
        );

        save_xlsx(&workbook, &path).unwrap();
        let loaded = load_xlsx(&path).unwrap();
        let sheet = loaded.sheet("Addresses").unwrap();
        assert_eq!(sheet.headers.len(), 3);
        assert!(sheet.is_empty());
    }

    #[test]
    fn failed_save_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        let workbook = Workbook::from_tables(
            vec![ReportTable::with_headers("Bad/Name", &["a"])],
            ReportMeta::new("broken", "2024-06-01T12:00:00+00:00".into(), 0, false),
        );

        assert!(save_xlsx(&workbook, &path).is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn workbook_without_sheets_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.xlsx");
        let err = save_xlsx(&Workbook::new(), &path).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidFormat(_)));
    }

    #[test]
    fn missing_sheet_is_reported() {
        let err = sample().sheet("Usage Summary").unwrap_err();
        assert!(matches!(err, PersistenceError::SheetNotFound(name) if name == "Usage Summary"));
    }
}
