//! Migration orchestrator: sources → projection → strategy → destination

use tracing::{debug, info, warn};

use super::projection::{project, Projection, ProjectionOptions, UnmatchedColumnPolicy, TIMESTAMP_FORMAT};
use super::strategy::Strategy;
use super::{extract_file_id, RunContext};
use crate::config::{DataMode, DestinationLocator, SourceSpec, TransferConfig};
use crate::error::{TransporterError, TransporterResult};
use crate::store::{a1, GridArea, RangeSpec, SheetRef, TabularStore, WorkbookId};
use crate::types::{Cursor, RunOutcome};

pub const TABLE_SYNC_MESSAGE: &str = "Table Style synced successfully";

//==============================================================================
// Temporary sheet guard
//==============================================================================

/// Owns a temporary sheet and deletes it when dropped, unless kept
pub struct TempSheetGuard<'a, S: TabularStore + ?Sized> {
    store: &'a mut S,
    sheet: Option<SheetRef>,
}

impl<'a, S: TabularStore + ?Sized> TempSheetGuard<'a, S> {
    pub fn new(store: &'a mut S, sheet: SheetRef) -> Self {
        Self {
            store,
            sheet: Some(sheet),
        }
    }

    pub fn store(&mut self) -> &mut S {
        self.store
    }

    pub fn sheet(&self) -> Option<&SheetRef> {
        self.sheet.as_ref()
    }

    /// Disarm the guard; the sheet survives
    pub fn keep(mut self) -> Option<SheetRef> {
        self.sheet.take()
    }
}

impl<S: TabularStore + ?Sized> Drop for TempSheetGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(sheet) = self.sheet.take() {
            if let Err(e) = self.store.delete_sheet(&sheet) {
                warn!(error = %e, "failed to delete temporary sheet");
            }
        }
    }
}

fn temp_sheet_name(prefix: &str, ctx: &RunContext) -> String {
    format!("{}{}", prefix, ctx.now.timestamp_millis())
}

//==============================================================================
// Orchestrator
//==============================================================================

/// Accumulator threaded through the per-source fold
#[derive(Debug, Clone, Copy)]
struct MigrationState {
    cursor: Cursor,
    headers_written: bool,
    /// Row the header was written at in this run
    header_write_row: Option<u32>,
    total_written: usize,
}

enum MigrationSummary {
    TableSynced,
    Migrated { rows: usize, label: &'static str },
}

/// Run a transfer; every failure becomes an error outcome
pub fn run_migration<S: TabularStore + ?Sized>(
    store: &mut S,
    config: &TransferConfig,
    ctx: &RunContext,
) -> RunOutcome {
    match migrate(store, config, ctx) {
        Ok(MigrationSummary::TableSynced) => RunOutcome::success(TABLE_SYNC_MESSAGE),
        Ok(MigrationSummary::Migrated { rows, label }) => {
            info!(rows, "migration complete");
            RunOutcome::success(format!("Migration complete{}. Rows written: {}", label, rows))
        }
        Err(e) => {
            warn!(error = %e, "migration failed");
            // Keep whatever was already written
            if let Err(flush_err) = store.flush() {
                warn!(error = %flush_err, "flush after failed migration");
            }
            RunOutcome::error(e.to_string())
        }
    }
}

fn migrate<S: TabularStore + ?Sized>(
    store: &mut S,
    config: &TransferConfig,
    ctx: &RunContext,
) -> TransporterResult<MigrationSummary> {
    config.validate()?;

    let destination = resolve_destination(store, &config.destination, ctx)?;
    let sheet_name = config.destination_sheet();
    let dest_sheet = match store.sheet_by_name(&destination, sheet_name)? {
        Some(sheet) => sheet,
        None => store.insert_sheet(&destination, sheet_name)?,
    };
    if store.is_protected(&dest_sheet)? {
        return Err(TransporterError::ProtectedSheet(sheet_name.to_string()));
    }
    info!(workbook = %destination, sheet = sheet_name, "destination resolved");

    if config.include_table_format_sync {
        if let Some(first) = config.sources.first() {
            sync_table_format(store, &destination, first, ctx)?;
            store.flush()?;
            return Ok(MigrationSummary::TableSynced);
        }
    }

    let (start_row, start_column) = a1::parse_cell(config.start_cell())?;
    let initial = match config.data_mode {
        DataMode::Replace => {
            store.clear(&dest_sheet)?;
            MigrationState {
                cursor: Cursor::new(start_row, start_column),
                headers_written: false,
                header_write_row: None,
                total_written: 0,
            }
        }
        DataMode::Append => {
            let last_row = store.dimensions(&dest_sheet)?.last_row;
            let row = if last_row == 0 {
                start_row
            } else {
                (last_row + 1).max(start_row)
            };
            MigrationState {
                cursor: Cursor::new(row, start_column),
                headers_written: last_row > 0,
                header_write_row: None,
                total_written: 0,
            }
        }
    };

    let strategy = Strategy::from_config(config.execution_strategy, config.batch_size());
    let final_state = config.sources.iter().try_fold(initial, |state, source| {
        process_source(store, config, ctx, &dest_sheet, strategy, source, state)
    })?;

    store.flush()?;
    Ok(MigrationSummary::Migrated {
        rows: final_state.total_written,
        label: strategy.label(),
    })
}

fn resolve_destination<S: TabularStore + ?Sized>(
    store: &mut S,
    destination: &DestinationLocator,
    ctx: &RunContext,
) -> TransporterResult<WorkbookId> {
    match destination {
        DestinationLocator::New => {
            let name = format!("Migrated Data - {}", ctx.now.format("%Y-%m-%d %H:%M"));
            store.create_workbook(&name)
        }
        DestinationLocator::Current => {
            let active = ctx.active_workbook.as_ref().ok_or_else(|| {
                TransporterError::DestinationResolution("no active workbook".to_string())
            })?;
            store
                .open_by_id(active.as_str())
                .map_err(|e| TransporterError::DestinationResolution(e.to_string()))
        }
        DestinationLocator::Id(locator) => store
            .open_by_id(&extract_file_id(locator))
            .map_err(|e| TransporterError::DestinationResolution(format!("{}: {}", locator, e))),
    }
}

fn open_source_workbook<S: TabularStore + ?Sized>(
    store: &mut S,
    locator: &str,
) -> TransporterResult<WorkbookId> {
    store
        .open_by_id(&extract_file_id(locator))
        .map_err(|e| TransporterError::missing_source_workbook(locator, &e))
}

/// Replace the destination's copy of the first source sheet with a fresh clone
fn sync_table_format<S: TabularStore + ?Sized>(
    store: &mut S,
    destination: &WorkbookId,
    source: &SourceSpec,
    ctx: &RunContext,
) -> TransporterResult<()> {
    let source_wb = open_source_workbook(store, &source.source_locator)?;
    let source_sheet = match store.sheet_by_name(&source_wb, &source.sheet_name)? {
        Some(sheet) => sheet,
        None => store
            .first_sheet(&source_wb)?
            .ok_or_else(|| TransporterError::missing_source_sheet(&source.sheet_name, source_wb.as_str()))?,
    };
    let name = store.sheet_name(&source_sheet)?;

    let clone = store.copy_into(&source_sheet, destination)?;
    let mut guard = TempSheetGuard::new(store, clone.clone());
    guard
        .store()
        .rename_sheet(&clone, &temp_sheet_name("__TEMP_SYNC__", ctx))?;

    if let Some(existing) = guard.store().sheet_by_name(destination, &name)? {
        guard.store().delete_sheet(&existing)?;
    }
    guard.store().rename_sheet(&clone, &name)?;
    guard.keep();

    info!(sheet = %name, "table style synced");
    Ok(())
}

fn process_source<S: TabularStore + ?Sized>(
    store: &mut S,
    config: &TransferConfig,
    ctx: &RunContext,
    dest_sheet: &SheetRef,
    strategy: Strategy,
    source: &SourceSpec,
    mut state: MigrationState,
) -> TransporterResult<MigrationState> {
    let source_wb = open_source_workbook(store, &source.source_locator)?;
    let source_sheet = store
        .sheet_by_name(&source_wb, &source.sheet_name)?
        .ok_or_else(|| {
            let workbook = store
                .workbook_name(&source_wb)
                .unwrap_or_else(|_| source_wb.to_string());
            TransporterError::missing_source_sheet(&source.sheet_name, &workbook)
        })?;

    let range = match &source.range {
        Some(range) if !range.trim().is_empty() => RangeSpec::A1(range.clone()),
        _ => RangeSpec::DataRange,
    };
    let data = store.read_range(&source_sheet, &range)?;

    let timestamp = ctx.now.format(TIMESTAMP_FORMAT).to_string();
    let projection = project(
        &data.values,
        config.include_formulas.then_some(&data.formulas),
        &ProjectionOptions {
            header_row_index: source.header_row_index,
            included_columns: source.included_columns.as_deref(),
            add_timestamp: config.add_timestamp,
            already_has_headers: state.headers_written,
            timestamp: &timestamp,
            unmatched: UnmatchedColumnPolicy::Drop,
        },
    )?;

    // Nothing to write; later sources still get the header
    if projection.column_indices.is_empty() {
        warn!(sheet = %source.sheet_name, "no included column matches the header row, source skipped");
        return Ok(state);
    }

    if config.include_headers && !state.headers_written {
        store.write_range(
            dest_sheet,
            state.cursor.row,
            state.cursor.column,
            std::slice::from_ref(&projection.headers),
        )?;
        state.header_write_row = Some(state.cursor.row);
        state.cursor.advance(1)?;
        state.headers_written = true;
    }

    let body_start = state.cursor.row;
    let written = strategy.write(store, dest_sheet, &mut state.cursor, &projection.data_rows)?;
    state.total_written += written;
    debug!(sheet = %source.sheet_name, rows = written, "source processed");

    if config.wants_format_copy() {
        let layout = FormatLayout {
            source_area: data.area,
            header_row_index: source.header_row_index,
            header_write_row: state.header_write_row,
            body_start,
            body_rows: written as u32,
            dest_column: state.cursor.column,
        };
        copy_formats(store, config, ctx, &source_sheet, dest_sheet, &projection, &layout)?;
    }

    Ok(state)
}

/// Where formats come from and go to for one source
struct FormatLayout {
    source_area: GridArea,
    header_row_index: u32,
    header_write_row: Option<u32>,
    body_start: u32,
    body_rows: u32,
    dest_column: u32,
}

/// Copy formats through a temporary clone of the source sheet living in the
/// destination workbook. Each projected column takes the formats of the source
/// column it came from; the timestamp column is left alone.
fn copy_formats<S: TabularStore + ?Sized>(
    store: &mut S,
    config: &TransferConfig,
    ctx: &RunContext,
    source_sheet: &SheetRef,
    dest_sheet: &SheetRef,
    projection: &Projection,
    layout: &FormatLayout,
) -> TransporterResult<()> {
    let temp = store.copy_into(source_sheet, &dest_sheet.workbook)?;
    let mut guard = TempSheetGuard::new(store, temp.clone());
    guard
        .store()
        .rename_sheet(&temp, &temp_sheet_name("__FORMAT_TEMP__", ctx))?;

    let source_header_row = layout.source_area.row + layout.header_row_index - 1;
    let offset = projection.column_offset() as u32;
    let columns = projection.column_indices.iter().enumerate().map(|(j, &raw)| {
        (
            layout.source_area.column + raw as u32,
            layout.dest_column + offset + j as u32,
        )
    });

    for (source_column, dest_column) in columns {
        if config.include_formatting && layout.body_rows > 0 {
            guard.store().copy_format_only(
                &temp,
                GridArea::new(source_header_row + 1, source_column, layout.body_rows, 1),
                dest_sheet,
                GridArea::new(layout.body_start, dest_column, layout.body_rows, 1),
            )?;
        }
        if let (true, Some(header_row)) = (config.include_header_formats, layout.header_write_row) {
            guard.store().copy_format_only(
                &temp,
                GridArea::new(source_header_row, source_column, 1, 1),
                dest_sheet,
                GridArea::new(header_row, dest_column, 1, 1),
            )?;
        }
    }

    if config.include_conditional_formats {
        let rules = guard.store().conditional_format_rules(&temp)?;
        guard.store().set_conditional_format_rules(dest_sheet, rules)?;
    }

    Ok(())
}
