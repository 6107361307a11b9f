//! Trailing blank row/column removal

use tracing::warn;

use crate::error::{TransporterError, TransporterResult};
use crate::store::{RangeSpec, SheetRef, TabularStore, WorkbookId};

/// Result of compacting every sheet of a workbook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// At least one delete succeeded
    pub succeeded_any: bool,
    pub warnings: Vec<String>,
}

impl CleanupReport {
    pub fn message(&self) -> String {
        if self.warnings.is_empty() {
            "Cleanup completed successfully".to_string()
        } else {
            format!("Cleanup completed with warnings: {}", self.warnings.join("; "))
        }
    }
}

/// Store errors carry their own wording; other errors keep their prefix
fn reason(err: &TransporterError) -> String {
    match err {
        TransporterError::Store(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Compact every sheet; failures become warnings, never errors
pub fn compact_workbook<S: TabularStore + ?Sized>(
    store: &mut S,
    workbook: &WorkbookId,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    let sheets = match store.sheets(workbook) {
        Ok(sheets) => sheets,
        Err(e) => {
            report.warnings.push(format!("Workbook \"{}\": {}", workbook, reason(&e)));
            return report;
        }
    };

    for sheet in sheets {
        let name = store
            .sheet_name(&sheet)
            .unwrap_or_else(|_| format!("#{}", sheet.sheet.0));
        if let Err(e) = compact_sheet(store, &sheet, &name, &mut report) {
            report.warnings.push(format!("Sheet \"{}\": {}", name, reason(&e)));
        }
    }

    for warning in &report.warnings {
        warn!(workbook = %workbook, "{}", warning);
    }
    report
}

fn compact_sheet<S: TabularStore + ?Sized>(
    store: &mut S,
    sheet: &SheetRef,
    name: &str,
    report: &mut CleanupReport,
) -> TransporterResult<()> {
    if store.is_protected(sheet)? {
        report
            .warnings
            .push(format!("Sheet \"{}\" is protected - skipped", name));
        return Ok(());
    }

    let dims = store.dimensions(sheet)?;
    if dims.max_rows == 0 || dims.max_columns == 0 {
        return Ok(());
    }

    let values = store.read_range(sheet, &RangeSpec::DataRange)?.values;
    if values.is_empty() {
        return Ok(());
    }

    let last_row = values
        .iter()
        .rposition(|row| row.iter().any(|c| !c.is_blank()))
        .map_or(0, |i| i as u32 + 1);
    let width = values[0].len();
    let last_col = (0..width)
        .rev()
        .find(|&j| values.iter().any(|row| row.get(j).is_some_and(|c| !c.is_blank())))
        .map_or(0, |j| j as u32 + 1);

    if last_row > 0 && last_row < dims.max_rows {
        if last_row < dims.frozen_rows {
            report.warnings.push(format!(
                "Sheet \"{}\" has frozen rows - cannot delete all blank rows",
                name
            ));
        } else {
            match store.delete_rows(sheet, last_row + 1, dims.max_rows - last_row) {
                Ok(()) => report.succeeded_any = true,
                Err(e) => report
                    .warnings
                    .push(format!("Sheet \"{}\" rows: {}", name, reason(&e))),
            }
        }
    }

    if last_col > 0 && last_col < dims.max_columns {
        if last_col < dims.frozen_columns {
            report.warnings.push(format!(
                "Sheet \"{}\" has frozen columns - cannot delete all blank columns",
                name
            ));
        } else {
            match store.delete_columns(sheet, last_col + 1, dims.max_columns - last_col) {
                Ok(()) => report.succeeded_any = true,
                Err(e) => report
                    .warnings
                    .push(format!("Sheet \"{}\" columns: {}", name, reason(&e))),
            }
        }
    }

    Ok(())
}
