//! Dispatch by configuration mode, plus the sheet/column lookups used by UIs

use tracing::{info, warn};

use super::archive::run_archive;
use super::migration::run_migration;
use super::{extract_file_id, RunContext};
use crate::config::{ConfigStore, Configuration};
use crate::error::{TransporterError, TransporterResult};
use crate::store::{GridArea, RangeSpec, Store, TabularStore};
use crate::types::RunOutcome;

/// Run a configuration against a store
pub fn execute<S: Store + ?Sized>(
    store: &mut S,
    config: &Configuration,
    ctx: &RunContext,
) -> RunOutcome {
    info!(mode = config.mode(), id = config.id().unwrap_or("-"), "executing configuration");
    match config {
        Configuration::Transfer(transfer) => run_migration(store, transfer, ctx),
        Configuration::Archive(archive) => run_archive(store, archive, ctx),
    }
}

/// Run a configuration and stamp its saved record, if it has one.
/// Bookkeeping failures are logged, never returned.
pub fn run_execution<S: Store + ?Sized>(
    store: &mut S,
    config: &Configuration,
    ctx: &RunContext,
    configs: Option<&ConfigStore>,
) -> RunOutcome {
    let outcome = execute(store, config, ctx);

    if let (Some(configs), Some(id)) = (configs, config.id()) {
        match configs.record_run(id, &outcome) {
            Ok(true) => {}
            Ok(false) => warn!(id, "run not recorded: no saved configuration with this id"),
            Err(e) => warn!(id, error = %e, "failed to record run"),
        }
    }

    outcome
}

/// Sheet names of a workbook, in order
pub fn sheet_names<S: TabularStore + ?Sized>(
    store: &mut S,
    locator: &str,
) -> TransporterResult<Vec<String>> {
    let workbook = store
        .open_by_id(&extract_file_id(locator))
        .map_err(|e| TransporterError::missing_source_workbook(locator, &e))?;
    store.sheet_names(&workbook)
}

/// Trimmed, non-empty labels of a sheet's header row (row 0 reads as 1)
pub fn sheet_columns<S: TabularStore + ?Sized>(
    store: &mut S,
    locator: &str,
    sheet_name: &str,
    header_row: u32,
) -> TransporterResult<Vec<String>> {
    let workbook = store
        .open_by_id(&extract_file_id(locator))
        .map_err(|e| TransporterError::missing_source_workbook(locator, &e))?;
    let workbook_name = store.workbook_name(&workbook)?;
    let sheet = store
        .sheet_by_name(&workbook, sheet_name)?
        .ok_or_else(|| TransporterError::missing_source_sheet(sheet_name, &workbook_name))?;

    let dims = store.dimensions(&sheet)?;
    let row = header_row.max(1);
    if dims.last_column == 0 || row > dims.max_rows {
        return Ok(Vec::new());
    }

    let header = store.read_range(&sheet, &RangeSpec::Area(GridArea::new(row, 1, 1, dims.last_column)))?;
    Ok(header
        .values
        .into_iter()
        .next()
        .unwrap_or_default()
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .filter(|label| !label.is_empty())
        .collect())
}
