//! FILENAME: core/persistence/src/xlsx_writer.rs

use crate::{PersistenceError, Workbook, META_SHEET_NAME};
use engine::{CellValue, ReportTable};
use rust_xlsxwriter::{Workbook as XlsxWorkbook, Worksheet};
use std::fs;
use std::path::Path;

/// Writes `workbook` to `path`.
///
/// The file is built next to its destination and renamed into place only
/// after it was written completely, so `path` never holds a partial workbook.
pub fn save_xlsx(workbook: &Workbook, path: &Path) -> Result<(), PersistenceError> {
    if workbook.sheets.is_empty() {
        return Err(PersistenceError::InvalidFormat(
            "Workbook contains no sheets".to_string(),
        ));
    }

    let mut xlsx = XlsxWorkbook::new();

    for table in &workbook.sheets {
        let worksheet = xlsx.add_worksheet();
        write_table(worksheet, table)?;
    }

    if let Some(meta) = &workbook.meta {
        let worksheet = xlsx.add_worksheet();
        worksheet.set_name(META_SHEET_NAME)?;
        worksheet.write_string(0, 0, meta.to_json()?)?;
        worksheet.set_hidden(true);
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let temp = tempfile::Builder::new()
        .prefix(".report-")
        .suffix(".xlsx.tmp")
        .tempfile_in(dir)?;
    xlsx.save(temp.path())?;
    temp.persist(path).map_err(|e| PersistenceError::Io(e.error))?;

    log::debug!("wrote {} sheet(s) to {}", workbook.sheets.len(), path.display());
    Ok(())
}

fn write_table(worksheet: &mut Worksheet, table: &ReportTable) -> Result<(), PersistenceError> {
    worksheet.set_name(&table.name)?;

    for (col, header) in table.headers.iter().enumerate() {
        worksheet.write_string(0, column(col)?, header)?;
    }

    for (idx, row) in table.rows.iter().enumerate() {
        let row_num = u32::try_from(idx + 1)
            .map_err(|_| PersistenceError::InvalidFormat(format!("{}: too many rows", table.name)))?;
        for (col, cell) in row.iter().enumerate() {
            let col = column(col)?;
            match cell {
                CellValue::Empty => {}
                CellValue::Number(n) => {
                    worksheet.write_number(row_num, col, *n)?;
                }
                CellValue::Text(s) => {
                    worksheet.write_string(row_num, col, s)?;
                }
                CellValue::Boolean(b) => {
                    worksheet.write_boolean(row_num, col, *b)?;
                }
            }
        }
    }
    Ok(())
}

fn column(idx: usize) -> Result<u16, PersistenceError> {
    u16::try_from(idx).map_err(|_| PersistenceError::InvalidFormat(format!("column {} out of range", idx)))
}
