//! End-to-end archive runs against the in-memory store

use chrono::{Duration, Local, TimeZone};
use pretty_assertions::assert_eq;
use royalbit_transporter::config::{
    ArchiveConfig, DestinationMode, FilterDescriptor, FilterOperator, FilterType, SourceType,
};
use royalbit_transporter::core::{run_archive, RunContext};
use royalbit_transporter::store::{
    MemorySheet, MemoryStore, MemoryWorkbook, TabularStore, WorkbookId,
};
use royalbit_transporter::types::{text_row, CellValue, RunOutcome, RunStatus, ValueMatrix};

// ═══════════════════════════════════════════════════════════════════════════
// FIXTURES
// ═══════════════════════════════════════════════════════════════════════════

const FOLDER_ID: &str = "0BxFolderIdAbCdEfGhIjKlMnOp";

fn ctx() -> RunContext {
    RunContext::at(Local.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap())
}

fn num(n: f64) -> CellValue {
    CellValue::Number(n)
}

fn days_ago(days: i64) -> CellValue {
    CellValue::from(ctx().today() - Duration::days(days))
}

fn orders() -> ValueMatrix {
    vec![
        text_row(&["Id", "Customer", "Total", "Placed"]),
        vec![num(1.0), "Ada".into(), num(10.0), days_ago(0)],
        vec![num(2.0), "Grace".into(), num(20.0), days_ago(3)],
        vec![num(3.0), "ada lovelace".into(), num(30.0), days_ago(10)],
    ]
}

fn store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.insert_workbook(
        MemoryWorkbook::new(WorkbookId::new("src"), "Sales")
            .with_sheet(MemorySheet::with_values("Orders", orders()))
            .with_sheet(MemorySheet::with_values("Notes", vec![text_row(&["memo"])]))
            .with_sheet(MemorySheet::with_values("Q1", vec![text_row(&["q1"])])),
    );
    store.add_folder(FOLDER_ID, "Archives");
    store
}

fn copy_id(outcome: &RunOutcome) -> WorkbookId {
    let url = outcome.file_url.as_deref().expect("file url");
    WorkbookId::new(url.trim_start_matches("memory://"))
}

fn sheet_values(store: &MemoryStore, workbook: &WorkbookId, sheet: &str) -> ValueMatrix {
    let sheet = store.sheet_by_name(workbook, sheet).unwrap().unwrap();
    store.sheet(&sheet).unwrap().values()
}

fn filter(column: &str, filter_type: FilterType, op: &str, value: &str) -> FilterDescriptor {
    FilterDescriptor::new("Orders", column, filter_type, FilterOperator::from(op.to_string()), value)
}

// ═══════════════════════════════════════════════════════════════════════════
// COPY AND NAMING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_whole_file_archive() {
    let mut store = store();
    let outcome = run_archive(&mut store, &ArchiveConfig::new("src"), &ctx());

    assert_eq!(outcome.status, RunStatus::Success, "{}", outcome.message);
    assert_eq!(outcome.message, "Archive created successfully: Sales_Archived_2024-01-15");

    let copy = copy_id(&outcome);
    assert_ne!(copy.as_str(), "src");
    assert_eq!(store.workbook_name(&copy).unwrap(), "Sales_Archived_2024-01-15");
    assert_eq!(store.sheet_names(&copy).unwrap(), vec!["Orders", "Notes", "Q1"]);
    assert_eq!(store.flush_count(), 1);
}

#[test]
fn test_source_from_url() {
    let mut store = MemoryStore::new();
    let id = "1AbCdEfGhIjKlMnOpQrStUvWxYz012";
    store.insert_workbook(
        MemoryWorkbook::new(WorkbookId::new(id), "Budget").with_sheet(MemorySheet::new("Sheet1")),
    );
    let config = ArchiveConfig::new(&format!("https://docs.example.com/spreadsheets/d/{}/edit", id));
    let outcome = run_archive(&mut store, &config, &ctx());
    assert!(outcome.is_success(), "{}", outcome.message);
}

#[test]
fn test_sheet_subset_keeps_only_listed_sheets() {
    let mut store = store();
    let mut config = ArchiveConfig::new("src");
    config.source_type = SourceType::Sheet;
    config.sheets = Some(vec!["Orders".into(), "Q1".into()]);

    let outcome = run_archive(&mut store, &config, &ctx());
    assert_eq!(
        outcome.message,
        "Archive created successfully: Sales (Orders, Q1)_Archived_2024-01-15"
    );
    let copy = copy_id(&outcome);
    assert_eq!(store.sheet_names(&copy).unwrap(), vec!["Orders", "Q1"]);

    // source untouched
    assert_eq!(store.sheet_names(&WorkbookId::new("src")).unwrap().len(), 3);
}

#[test]
fn test_subset_matching_nothing_fails() {
    let mut store = store();
    let mut config = ArchiveConfig::new("src");
    config.source_type = SourceType::Sheet;
    config.sheets = Some(vec!["Missing".into()]);

    let outcome = run_archive(&mut store, &config, &ctx());
    assert_eq!(outcome.status, RunStatus::Error);
}

#[test]
fn test_source_name_and_override() {
    let mut store = store();
    let mut config = ArchiveConfig::new("src");
    config.source_name = Some("FY24 Sales".into());
    let outcome = run_archive(&mut store, &config, &ctx());
    assert_eq!(
        outcome.message,
        "Archive created successfully: FY24 Sales_Archived_2024-01-15"
    );

    config.file_name_override = Some("Closing: Q4/2024".into());
    let outcome = run_archive(&mut store, &config, &ctx());
    assert_eq!(
        outcome.message,
        "Archive created successfully: Closing- Q4-2024_Archived_2024-01-15"
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// FOLDERS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_selected_folder_receives_copy() {
    let mut store = store();
    let mut config = ArchiveConfig::new("src");
    config.destination_mode = DestinationMode::Select;
    config.folder_locator = Some(FOLDER_ID.into());

    let outcome = run_archive(&mut store, &config, &ctx());
    assert!(outcome.is_success(), "{}", outcome.message);
    let copy = store.workbook(&copy_id(&outcome)).unwrap();
    assert_eq!(copy.folder.as_deref(), Some(FOLDER_ID));
}

#[test]
fn test_selected_folder_inaccessible() {
    let mut store = store();
    let mut config = ArchiveConfig::new("src");
    config.destination_mode = DestinationMode::Select;
    config.folder_locator = Some("gone".into());

    let outcome = run_archive(&mut store, &config, &ctx());
    assert_eq!(outcome.status, RunStatus::Error);
    assert!(outcome.message.starts_with("Cannot access the selected folder"));
}

#[test]
fn test_pasted_folder_url() {
    let mut store = store();
    let mut config = ArchiveConfig::new("src");
    config.destination_mode = DestinationMode::Paste;
    config.folder_locator = Some(format!("https://drive.example.com/drive/folders/{}?usp=sharing", FOLDER_ID));

    let outcome = run_archive(&mut store, &config, &ctx());
    assert!(outcome.is_success(), "{}", outcome.message);
    let copy = store.workbook(&copy_id(&outcome)).unwrap();
    assert_eq!(copy.folder.as_deref(), Some(FOLDER_ID));
}

#[test]
fn test_pasted_folder_too_short_or_unknown() {
    let mut store = store();
    let mut config = ArchiveConfig::new("src");
    config.destination_mode = DestinationMode::Paste;

    config.folder_locator = Some("short".into());
    let outcome = run_archive(&mut store, &config, &ctx());
    assert!(outcome.message.starts_with("Invalid folder URL/ID pasted"));

    config.folder_locator = Some("0BxUnknownFolderIdAbCdEfGhIj".into());
    let outcome = run_archive(&mut store, &config, &ctx());
    assert!(outcome.message.starts_with("Invalid folder URL/ID pasted"));
}

#[test]
fn test_root_mode_and_empty_locator_ignore_folder() {
    let mut store = store();
    let mut config = ArchiveConfig::new("src");
    config.folder_locator = Some("gone".into());
    let outcome = run_archive(&mut store, &config, &ctx());
    assert!(outcome.is_success());
    assert_eq!(store.workbook(&copy_id(&outcome)).unwrap().folder, None);

    config.destination_mode = DestinationMode::Select;
    config.folder_locator = Some("  ".into());
    assert!(run_archive(&mut store, &config, &ctx()).is_success());
}

// ═══════════════════════════════════════════════════════════════════════════
// FILTERS
// ═══════════════════════════════════════════════════════════════════════════

fn archive_with(filters: Vec<FilterDescriptor>) -> (MemoryStore, WorkbookId) {
    let mut store = store();
    let mut config = ArchiveConfig::new("src");
    config.filters = filters;
    let outcome = run_archive(&mut store, &config, &ctx());
    assert!(outcome.is_success(), "{}", outcome.message);
    let copy = copy_id(&outcome);
    (store, copy)
}

#[test]
fn test_text_filter_keeps_header_and_matches() {
    let (store, copy) = archive_with(vec![filter("Customer", FilterType::Text, "starts_with", "ADA")]);
    let values = sheet_values(&store, &copy, "Orders");
    assert_eq!(values.len(), 3);
    assert_eq!(values[0][0], CellValue::from("Id"));
    assert_eq!(values[1][1], CellValue::from("Ada"));
    assert_eq!(values[2][1], CellValue::from("ada lovelace"));
}

#[test]
fn test_number_filter() {
    let (store, copy) = archive_with(vec![filter("Total", FilterType::Number, "greater_than", "15")]);
    let values = sheet_values(&store, &copy, "Orders");
    let ids: Vec<CellValue> = values[1..].iter().map(|r| r[0].clone()).collect();
    assert_eq!(ids, vec![num(2.0), num(3.0)]);
}

#[test]
fn test_date_filter_last_n_days() {
    let (store, copy) = archive_with(vec![filter("Placed", FilterType::Date, "last_n_days", "7")]);
    let values = sheet_values(&store, &copy, "Orders");
    assert_eq!(values.len(), 3);
    assert_eq!(values[2][1], CellValue::from("Grace"));
}

#[test]
fn test_filters_combine() {
    let (store, copy) = archive_with(vec![
        filter("Placed", FilterType::Date, "last_n_days", "7"),
        filter("Customer", FilterType::Text, "equals", "grace"),
    ]);
    let values = sheet_values(&store, &copy, "Orders");
    assert_eq!(values.len(), 2);
    assert_eq!(values[1][0], num(2.0));
}

#[test]
fn test_filters_on_missing_sheet_or_column_are_skipped() {
    let mut missing_sheet = filter("Customer", FilterType::Text, "equals", "x");
    missing_sheet.sheet = "Nope".into();
    let (store, copy) = archive_with(vec![
        missing_sheet,
        filter("Nope", FilterType::Text, "equals", "x"),
    ]);
    assert_eq!(sheet_values(&store, &copy, "Orders"), orders());
}

#[test]
fn test_filtered_sheet_keeps_values_not_formulas() {
    let mut store = store();
    let orders = store.sheet_by_name(&WorkbookId::new("src"), "Orders").unwrap().unwrap();
    store
        .sheet_mut(&orders)
        .unwrap()
        .set_formula(2, 3, "=A2*10", num(10.0));

    let mut config = ArchiveConfig::new("src");
    config.filters = vec![filter("Total", FilterType::Number, "less_than", "15")];
    let outcome = run_archive(&mut store, &config, &ctx());
    let copy = copy_id(&outcome);

    let sheet = store.sheet_by_name(&copy, "Orders").unwrap().unwrap();
    let sheet = store.sheet(&sheet).unwrap();
    assert_eq!(sheet.value(2, 3), num(10.0));
    assert_eq!(sheet.formula(2, 3), None);
}

// ═══════════════════════════════════════════════════════════════════════════
// CLEANUP
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cleanup_trims_blank_space() {
    let mut store = store();
    let mut config = ArchiveConfig::new("src");
    config.cleanup = true;

    let outcome = run_archive(&mut store, &config, &ctx());
    assert_eq!(outcome.message, "Archive created successfully: Sales_Archived_2024-01-15");

    let copy = copy_id(&outcome);
    let orders = store.sheet_by_name(&copy, "Orders").unwrap().unwrap();
    let dims = store.dimensions(&orders).unwrap();
    assert_eq!((dims.max_rows, dims.max_columns), (4, 4));
}

#[test]
fn test_cleanup_warnings_become_a_note() {
    let mut store = store();
    let notes = store.sheet_by_name(&WorkbookId::new("src"), "Notes").unwrap().unwrap();
    store.sheet_mut(&notes).unwrap().protected = true;

    let mut config = ArchiveConfig::new("src");
    config.cleanup = true;
    let outcome = run_archive(&mut store, &config, &ctx());

    assert!(outcome.is_success());
    assert_eq!(
        outcome.message,
        "Archive created successfully: Sales_Archived_2024-01-15 Note: Cleanup completed with warnings: Sheet \"Notes\" is protected - skipped"
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_missing_source_locator() {
    let mut store = store();
    let outcome = run_archive(&mut store, &ArchiveConfig::default(), &ctx());
    assert_eq!(outcome.status, RunStatus::Error);
    assert_eq!(
        outcome.message,
        "Configuration error: Archive source spreadsheet is missing"
    );
}

#[test]
fn test_unknown_source_file() {
    let mut store = store();
    let outcome = run_archive(&mut store, &ArchiveConfig::new("unknown"), &ctx());
    assert_eq!(outcome.status, RunStatus::Error);
    assert!(outcome.message.contains("\"unknown\""));
    assert!(outcome.file_url.is_none());
}
