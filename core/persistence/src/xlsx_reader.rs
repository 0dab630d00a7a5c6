//! FILENAME: core/persistence/src/xlsx_reader.rs

use crate::{PersistenceError, ReportMeta, Workbook, META_SHEET_NAME};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use engine::{CellValue, ReportTable};
use std::path::Path;

/// Reads a workbook written by `save_xlsx`. The first row of each sheet is
/// taken as its headers; the metadata sheet is returned separately.
pub fn load_xlsx(path: &Path) -> Result<Workbook, PersistenceError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_names = workbook.sheet_names().to_vec();

    if sheet_names.is_empty() {
        return Err(PersistenceError::InvalidFormat(
            "Workbook contains no sheets".to_string(),
        ));
    }

    let mut sheets = Vec::new();
    let mut meta = None;

    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| PersistenceError::InvalidFormat(e.to_string()))?;

        if sheet_name == META_SHEET_NAME {
            if let Some(Data::String(json)) = range.get_value((0, 0)) {
                meta = Some(ReportMeta::from_json(json)?);
            }
            continue;
        }

        sheets.push(read_table(sheet_name, &range));
    }

    Ok(Workbook { sheets, meta })
}

fn read_table(name: &str, range: &Range<Data>) -> ReportTable {
    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|header| header.iter().map(|c| to_value(c).display_value()).collect())
        .unwrap_or_default();

    let mut table = ReportTable::new(name, headers);
    for row in rows {
        table.push_row(row.iter().map(to_value).collect());
    }
    table
}

fn to_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::Error(e) => CellValue::Text(format!("{:?}", e)),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
