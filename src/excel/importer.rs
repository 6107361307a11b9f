//! Excel importer implementation - Excel (.xlsx) → in-memory workbook

use crate::error::{TransporterError, TransporterResult};
use crate::store::{MemorySheet, MemoryWorkbook, WorkbookId};
use crate::types::CellValue;
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::path::Path;

/// Excel importer reading every sheet of a .xlsx file
pub struct ExcelImporter {
    path: std::path::PathBuf,
}

impl ExcelImporter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Import the file as a workbook with the given id and display name
    pub fn import(&self, id: WorkbookId, name: &str) -> TransporterResult<MemoryWorkbook> {
        let mut workbook: Xlsx<_> = open_workbook(&self.path).map_err(|e| {
            TransporterError::Excel(format!(
                "Failed to open {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut result = MemoryWorkbook::new(id, name);
        for sheet_name in workbook.sheet_names() {
            let values = workbook.worksheet_range(&sheet_name).map_err(|e| {
                TransporterError::Excel(format!("Failed to read sheet '{}': {}", sheet_name, e))
            })?;
            // Formula ranges are optional; a sheet without formulas may report none
            let formulas = workbook.worksheet_formula(&sheet_name).ok();
            result
                .sheets
                .push(Self::process_sheet(&sheet_name, &values, formulas.as_ref()));
        }

        Ok(result)
    }

    fn process_sheet(
        sheet_name: &str,
        values: &Range<Data>,
        formulas: Option<&Range<String>>,
    ) -> MemorySheet {
        let mut sheet = MemorySheet::new(sheet_name);

        if let Some((start_row, start_col)) = values.start() {
            for (row, col, cell) in values.used_cells() {
                let value = convert_cell(cell);
                if !value.is_blank() {
                    sheet.set_value(
                        start_row + row as u32 + 1,
                        start_col + col as u32 + 1,
                        value,
                    );
                }
            }
        }

        if let Some(formulas) = formulas {
            if let Some((start_row, start_col)) = formulas.start() {
                for (row, col, formula) in formulas.used_cells() {
                    if formula.is_empty() {
                        continue;
                    }
                    let (r, c) = (start_row + row as u32 + 1, start_col + col as u32 + 1);
                    // calamine strips the leading '='
                    let text = if formula.starts_with('=') {
                        formula.clone()
                    } else {
                        format!("={}", formula)
                    };
                    let cached = sheet.value(r, c);
                    sheet.set_formula(r, c, &text, cached);
                }
            }
        }

        sheet
    }
}

/// Convert a calamine cell to a [`CellValue`]
pub fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => serial_to_datetime(dt.as_f64())
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => parse_iso(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

fn excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Excel serial date (days since 1899-12-30) → datetime, rounded to the second
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    // 9999-12-31 is the last date Excel can represent
    if !serial.is_finite() || serial.abs() > 2_958_466.0 {
        return None;
    }
    let seconds = (serial * 86_400.0).round() as i64;
    excel_epoch()?.checked_add_signed(Duration::seconds(seconds))
}

/// Datetime → Excel serial date
pub fn datetime_to_serial(dt: &NaiveDateTime) -> f64 {
    match excel_epoch() {
        Some(epoch) => (*dt - epoch).num_seconds() as f64 / 86_400.0,
        None => 0.0,
    }
}

fn parse_iso(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
