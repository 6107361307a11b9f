//! Excel exporter implementation - in-memory workbook → Excel (.xlsx)

use crate::error::{TransporterError, TransporterResult};
use crate::store::{CellFormat, MemorySheet, MemoryWorkbook};
use crate::types::CellValue;
use chrono::NaiveTime;
use rust_xlsxwriter::{Color, Format, Formula, Workbook, Worksheet, XlsxError};
use std::path::Path;

use super::importer::datetime_to_serial;

const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Writes one workbook, all sheets in order, to a .xlsx file
pub struct ExcelExporter<'a> {
    workbook: &'a MemoryWorkbook,
}

impl<'a> ExcelExporter<'a> {
    pub fn new(workbook: &'a MemoryWorkbook) -> Self {
        Self { workbook }
    }

    pub fn export(&self, output_path: &Path) -> TransporterResult<()> {
        let mut workbook = Workbook::new();

        for sheet in &self.workbook.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet
                .set_name(&sheet.name)
                .map_err(|e| export_error("set worksheet name", e))?;
            Self::export_sheet(worksheet, sheet)?;
        }

        workbook.save(output_path).map_err(|e| {
            TransporterError::Excel(format!(
                "Failed to save {}: {}",
                output_path.display(),
                e
            ))
        })?;

        Ok(())
    }

    fn export_sheet(worksheet: &mut Worksheet, sheet: &MemorySheet) -> TransporterResult<()> {
        for ((row, col), cell) in sheet.cells() {
            let (r, c) = excel_position(row, col)?;
            let format = to_xlsx_format(cell.format.as_ref(), &cell.value);

            if let Some(formula) = &cell.formula {
                let mut formula = Formula::new(formula);
                if !cell.value.is_blank() {
                    formula = formula.set_result(cell.value.to_string());
                }
                worksheet
                    .write_formula_with_format(r, c, formula, &format)
                    .map_err(|e| export_error("write formula", e))?;
                continue;
            }

            match &cell.value {
                CellValue::Empty => worksheet.write_blank(r, c, &format),
                CellValue::Bool(b) => worksheet.write_boolean_with_format(r, c, *b, &format),
                CellValue::Number(n) => worksheet.write_number_with_format(r, c, *n, &format),
                CellValue::Text(s) => worksheet.write_string_with_format(r, c, s, &format),
                CellValue::Date(dt) => {
                    worksheet.write_number_with_format(r, c, datetime_to_serial(dt), &format)
                }
            }
            .map_err(|e| export_error("write cell", e))?;
        }

        if sheet.frozen_rows > 0 || sheet.frozen_columns > 0 {
            let columns = u16::try_from(sheet.frozen_columns)
                .map_err(|_| TransporterError::Excel("Too many frozen columns".to_string()))?;
            worksheet
                .set_freeze_panes(sheet.frozen_rows, columns)
                .map_err(|e| export_error("freeze panes", e))?;
        }

        if sheet.protected {
            worksheet.protect();
        }

        Ok(())
    }
}

fn export_error(action: &str, e: XlsxError) -> TransporterError {
    TransporterError::Excel(format!("Failed to {}: {}", action, e))
}

/// 1-based grid position → 0-based worksheet position
fn excel_position(row: u32, col: u32) -> TransporterResult<(u32, u16)> {
    let c = u16::try_from(col.saturating_sub(1))
        .map_err(|_| TransporterError::Excel(format!("Column {} is out of range", col)))?;
    Ok((row.saturating_sub(1), c))
}

fn to_xlsx_format(format: Option<&CellFormat>, value: &CellValue) -> Format {
    let mut result = Format::new();
    let plain = CellFormat::default();
    let format = format.unwrap_or(&plain);

    if format.bold {
        result = result.set_bold();
    }
    if format.italic {
        result = result.set_italic();
    }
    if let Some(color) = format.font_color.as_deref().and_then(parse_color) {
        result = result.set_font_color(color);
    }
    if let Some(color) = format.background.as_deref().and_then(parse_color) {
        result = result.set_background_color(color);
    }

    match (&format.number_format, value) {
        (Some(num_format), _) => result = result.set_num_format(num_format),
        (None, CellValue::Date(dt)) if dt.time() == NaiveTime::MIN => {
            result = result.set_num_format(DATE_FORMAT)
        }
        (None, CellValue::Date(_)) => result = result.set_num_format(DATETIME_FORMAT),
        _ => {}
    }

    result
}

/// Parse `#RRGGBB` (or `RRGGBB`) into a color
pub fn parse_color(text: &str) -> Option<Color> {
    let hex = text.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().map(Color::RGB)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excel::ExcelImporter;
    use crate::store::WorkbookId;
    use crate::types::text_row;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_workbook() -> MemoryWorkbook {
        let mut data = MemorySheet::with_values(
            "Orders",
            vec![
                text_row(&["Item", "Qty", "Shipped"]),
                vec!["Widget".into(), 4.0.into(), true.into()],
                vec![
                    "Gadget".into(),
                    2.0.into(),
                    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().into(),
                ],
            ],
        );
        data.set_formula(4, 2, "=SUM(B2:B3)", CellValue::Number(6.0));
        data.frozen_rows = 1;
        MemoryWorkbook::new(WorkbookId::new("wb"), "Orders")
            .with_sheet(data)
            .with_sheet(MemorySheet::new("Notes"))
    }

    #[test]
    fn test_parse_color() {
        assert!(matches!(parse_color("#FF0000"), Some(Color::RGB(0xFF0000))));
        assert!(matches!(parse_color("00ff00"), Some(Color::RGB(0x00FF00))));
        assert!(parse_color("red").is_none());
        assert!(parse_color("#FFF").is_none());
    }

    #[test]
    fn test_export_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.xlsx");
        ExcelExporter::new(&sample_workbook()).export(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_export_then_import_keeps_cells_and_formulas() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.xlsx");
        ExcelExporter::new(&sample_workbook()).export(&path).unwrap();

        let imported = ExcelImporter::new(&path)
            .import(WorkbookId::new("wb"), "Orders")
            .unwrap();
        let names: Vec<&str> = imported.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Orders", "Notes"]);

        let orders = &imported.sheets[0];
        assert_eq!(orders.value(2, 1), CellValue::from("Widget"));
        assert_eq!(orders.value(2, 2), CellValue::Number(4.0));
        assert_eq!(orders.value(2, 3), CellValue::Bool(true));
        assert_eq!(
            orders.value(3, 3),
            CellValue::from(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        );
        assert_eq!(orders.formula(4, 2), Some("=SUM(B2:B3)"));
    }

    #[test]
    fn test_export_to_nonexistent_directory_fails() {
        let path = Path::new("/nonexistent/dir/out.xlsx");
        let result = ExcelExporter::new(&sample_workbook()).export(path);
        assert!(result.is_err());
    }
}
