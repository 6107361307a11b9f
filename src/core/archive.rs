//! Archive orchestrator: clone, keep a sheet subset, filter rows, compact

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::compactor::compact_workbook;
use super::filter::matches_on;
use super::{extract_file_id, RunContext};
use crate::config::{ArchiveConfig, DestinationMode, FilterDescriptor, SourceType};
use crate::error::{TransporterError, TransporterResult};
use crate::store::{DriveFolder, RangeSpec, Store, TabularStore, WorkbookId};
use crate::types::RunOutcome;

/// Shortest id accepted from a pasted folder reference
const MIN_PASTED_FOLDER_ID: usize = 20;

/// Replace characters that are not allowed in file names with `-`
pub fn sanitize_file_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '?' | '*' | ':' | '<' | '>' | '|' | '"' => '-',
            other => other,
        })
        .collect()
}

/// Name of the archived copy
pub fn archive_name(config: &ArchiveConfig, source_name: &str, date: NaiveDate) -> String {
    let suffix = format!("_Archived_{}", date.format("%Y-%m-%d"));
    if let Some(name) = config
        .file_name_override
        .as_deref()
        .filter(|n| !n.trim().is_empty())
    {
        return format!("{}{}", sanitize_file_name(name), suffix);
    }
    match config.sheet_subset() {
        Some(sheets) => format!("{} ({}){}", source_name, sheets.join(", "), suffix),
        None => format!("{}{}", source_name, suffix),
    }
}

/// Run an archive; every failure becomes an error outcome
pub fn run_archive<S: Store + ?Sized>(
    store: &mut S,
    config: &ArchiveConfig,
    ctx: &RunContext,
) -> RunOutcome {
    match archive(store, config, ctx) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "archive failed");
            if let Err(flush_err) = store.flush() {
                warn!(error = %flush_err, "flush after failed archive");
            }
            RunOutcome::error(e.to_string())
        }
    }
}

fn archive<S: Store + ?Sized>(
    store: &mut S,
    config: &ArchiveConfig,
    ctx: &RunContext,
) -> TransporterResult<RunOutcome> {
    config.validate()?;

    let source_id = extract_file_id(&config.source_locator);
    let source = store
        .file_by_id(&source_id)
        .map_err(|e| TransporterError::missing_source_workbook(&config.source_locator, &e))?;
    let folder = resolve_folder(store, config)?;

    let source_name = config
        .source_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(&source.name);
    let name = archive_name(config, source_name, ctx.today());

    let copy = store.copy_file(&source, &name, folder.as_ref())?;
    info!(source = %source.id, copy = %copy.id, name = %name, "archive copy created");

    if let (SourceType::Sheet, Some(keep)) = (config.source_type, config.sheets.as_deref()) {
        retain_sheets(store, &copy.id, keep)?;
    }

    let today = ctx.today();
    for filter in &config.filters {
        apply_filter(store, &copy.id, filter, today)?;
    }

    let mut note = String::new();
    if config.cleanup {
        let report = compact_workbook(store, &copy.id);
        if !report.warnings.is_empty() {
            note = format!(" Note: {}", report.message());
        }
    }

    store.flush()?;
    Ok(RunOutcome::success(format!("Archive created successfully: {}{}", name, note))
        .with_file_url(copy.url))
}

fn resolve_folder<S: Store + ?Sized>(
    store: &mut S,
    config: &ArchiveConfig,
) -> TransporterResult<Option<DriveFolder>> {
    let locator = match config.folder_locator.as_deref().map(str::trim) {
        Some(locator) if !locator.is_empty() => locator,
        _ => return Ok(None),
    };

    match config.destination_mode {
        DestinationMode::Root => Ok(None),
        DestinationMode::Select => store
            .folder_by_id(locator)
            .map(Some)
            .map_err(|e| TransporterError::FolderAccess(e.to_string())),
        DestinationMode::Paste => {
            let id = extract_file_id(locator);
            if id.len() < MIN_PASTED_FOLDER_ID {
                return Err(TransporterError::InvalidFolderReference(format!(
                    "'{}' is not a folder id",
                    locator
                )));
            }
            store
                .folder_by_id(&id)
                .map(Some)
                .map_err(|e| TransporterError::InvalidFolderReference(e.to_string()))
        }
    }
}

/// Delete every sheet whose name is not in `keep`
fn retain_sheets<S: TabularStore + ?Sized>(
    store: &mut S,
    workbook: &WorkbookId,
    keep: &[String],
) -> TransporterResult<()> {
    if keep.is_empty() {
        return Ok(());
    }
    for sheet in store.sheets(workbook)? {
        let name = store.sheet_name(&sheet)?;
        if !keep.iter().any(|k| *k == name) {
            debug!(sheet = %name, "dropping sheet from archive");
            store.delete_sheet(&sheet)?;
        }
    }
    Ok(())
}

/// Keep the header row plus the rows matching `filter`, as values
fn apply_filter<S: TabularStore + ?Sized>(
    store: &mut S,
    workbook: &WorkbookId,
    filter: &FilterDescriptor,
    today: NaiveDate,
) -> TransporterResult<()> {
    let Some(sheet) = store.sheet_by_name(workbook, &filter.sheet)? else {
        debug!(sheet = %filter.sheet, "filter sheet missing, skipped");
        return Ok(());
    };

    let values = store.read_range(&sheet, &RangeSpec::DataRange)?.values;
    let Some((header, rows)) = values.split_first() else {
        return Ok(());
    };
    if rows.is_empty() {
        return Ok(());
    }
    let Some(column) = header.iter().position(|h| h.to_string() == filter.column) else {
        debug!(sheet = %filter.sheet, column = %filter.column, "filter column missing, skipped");
        return Ok(());
    };

    let retained: Vec<_> = std::iter::once(header.to_vec())
        .chain(
            rows.iter()
                .filter(|row| {
                    let cell = row.get(column).cloned().unwrap_or_default();
                    matches_on(&cell, filter, today)
                })
                .cloned(),
        )
        .collect();

    debug!(
        sheet = %filter.sheet,
        kept = retained.len() - 1,
        total = rows.len(),
        "filter applied"
    );
    store.clear(&sheet)?;
    store.write_range(&sheet, 1, 1, &retained)
}
