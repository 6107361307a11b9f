//! Excel (.xlsx) conversion for the file-backed store
//!
//! - Import: .xlsx → in-memory workbook (calamine)
//! - Export: in-memory workbook → .xlsx (rust_xlsxwriter)

mod exporter;
mod importer;

pub use exporter::{parse_color, ExcelExporter};
pub use importer::{convert_cell, datetime_to_serial, serial_to_datetime, ExcelImporter};
