//! Store abstractions consumed by the engine
//!
//! The engine never constructs a store; it receives one from the host and talks
//! to it through two traits:
//! - [`TabularStore`]: workbooks, sheets, ranges, formats
//! - [`DriveStore`]: files and folders (used by archiving)
//!
//! Workbooks and sheets are addressed by handles ([`WorkbookId`], [`SheetRef`])
//! so several of them can be in play at once without borrowing the store.
//!
//! Two backends ship with the crate:
//! - [`MemoryStore`]: everything in memory (tests, staging)
//! - [`XlsxStore`]: a directory of `.xlsx` files acting as a drive

pub mod a1;
mod memory;
mod xlsx;

pub use memory::{MemorySheet, MemoryStore, MemoryWorkbook};
pub use xlsx::XlsxStore;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransporterResult;
use crate::types::{CellValue, FormulaMatrix, ValueMatrix};

//==============================================================================
// Handles
//==============================================================================

/// Identifier of a workbook (a spreadsheet file)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkbookId(pub String);

impl WorkbookId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkbookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable sheet identifier; survives renames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SheetId(pub u64);

/// A sheet inside a specific workbook
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetRef {
    pub workbook: WorkbookId,
    pub sheet: SheetId,
}

impl SheetRef {
    pub fn new(workbook: WorkbookId, sheet: SheetId) -> Self {
        Self { workbook, sheet }
    }
}

//==============================================================================
// Ranges and sheet metadata
//==============================================================================

/// Rectangular area of a sheet (1-based origin)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridArea {
    pub row: u32,
    pub column: u32,
    pub rows: u32,
    pub columns: u32,
}

impl GridArea {
    pub fn new(row: u32, column: u32, rows: u32, columns: u32) -> Self {
        Self {
            row,
            column,
            rows,
            columns,
        }
    }

    pub fn last_row(&self) -> u32 {
        self.row + self.rows.saturating_sub(1)
    }

    pub fn last_column(&self) -> u32 {
        self.column + self.columns.saturating_sub(1)
    }
}

/// What to read from a sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSpec {
    /// From A1 to the last row/column holding content (at least one cell)
    DataRange,
    /// A1 notation, e.g. `A1:D20` or `B:D`
    A1(String),
    Area(GridArea),
}

/// Values and formulas of a range, with the area they were read from
#[derive(Debug, Clone, PartialEq)]
pub struct RangeData {
    pub area: GridArea,
    pub values: ValueMatrix,
    pub formulas: FormulaMatrix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SheetDimensions {
    /// Last row holding a value or formula (0 for an empty sheet)
    pub last_row: u32,
    pub last_column: u32,
    /// Grid size, including trailing blank rows/columns
    pub max_rows: u32,
    pub max_columns: u32,
    pub frozen_rows: u32,
    pub frozen_columns: u32,
}

/// Visual cell format (format-only copies move these, never values)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellFormat {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
}

impl CellFormat {
    pub fn is_plain(&self) -> bool {
        *self == CellFormat::default()
    }
}

/// Conditional-format rule; opaque to the engine, copied wholesale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalRule {
    pub range: String,
    pub condition: String,
    #[serde(default)]
    pub format: CellFormat,
}

//==============================================================================
// Drive entities
//==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriveFile {
    pub id: WorkbookId,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriveFolder {
    pub id: String,
    pub name: String,
    pub url: String,
}

//==============================================================================
// Collaborator traits
//==============================================================================

/// Spreadsheet access used by the migration and archive engines
pub trait TabularStore {
    /// Open a workbook by id; fails if it does not exist
    fn open_by_id(&mut self, id: &str) -> TransporterResult<WorkbookId>;
    /// Create a workbook with a single default sheet
    fn create_workbook(&mut self, name: &str) -> TransporterResult<WorkbookId>;
    fn workbook_name(&self, workbook: &WorkbookId) -> TransporterResult<String>;
    fn workbook_url(&self, workbook: &WorkbookId) -> TransporterResult<String>;

    fn sheets(&self, workbook: &WorkbookId) -> TransporterResult<Vec<SheetRef>>;
    fn sheet_by_name(&self, workbook: &WorkbookId, name: &str)
        -> TransporterResult<Option<SheetRef>>;
    fn sheet_name(&self, sheet: &SheetRef) -> TransporterResult<String>;

    fn first_sheet(&self, workbook: &WorkbookId) -> TransporterResult<Option<SheetRef>> {
        Ok(self.sheets(workbook)?.into_iter().next())
    }

    fn sheet_names(&self, workbook: &WorkbookId) -> TransporterResult<Vec<String>> {
        self.sheets(workbook)?
            .iter()
            .map(|sheet| self.sheet_name(sheet))
            .collect()
    }

    fn insert_sheet(&mut self, workbook: &WorkbookId, name: &str) -> TransporterResult<SheetRef>;
    fn delete_sheet(&mut self, sheet: &SheetRef) -> TransporterResult<()>;
    fn rename_sheet(&mut self, sheet: &SheetRef, name: &str) -> TransporterResult<()>;

    fn read_range(&self, sheet: &SheetRef, range: &RangeSpec) -> TransporterResult<RangeData>;
    /// Write a rectangular block with its top-left corner at (row, column).
    /// Text starting with `=` is stored as a formula.
    fn write_range(
        &mut self,
        sheet: &SheetRef,
        row: u32,
        column: u32,
        values: &[Vec<CellValue>],
    ) -> TransporterResult<()>;
    /// Remove all content and formats
    fn clear(&mut self, sheet: &SheetRef) -> TransporterResult<()>;

    fn dimensions(&self, sheet: &SheetRef) -> TransporterResult<SheetDimensions>;
    fn is_protected(&self, sheet: &SheetRef) -> TransporterResult<bool>;
    fn delete_rows(&mut self, sheet: &SheetRef, start: u32, count: u32) -> TransporterResult<()>;
    fn delete_columns(&mut self, sheet: &SheetRef, start: u32, count: u32)
        -> TransporterResult<()>;

    /// Copy a sheet (content, formats, rules) into another workbook
    fn copy_into(&mut self, sheet: &SheetRef, target: &WorkbookId) -> TransporterResult<SheetRef>;
    /// Copy formats only from `source_area` of `source` onto `dest_area` of `dest`
    fn copy_format_only(
        &mut self,
        source: &SheetRef,
        source_area: GridArea,
        dest: &SheetRef,
        dest_area: GridArea,
    ) -> TransporterResult<()>;
    fn conditional_format_rules(&self, sheet: &SheetRef) -> TransporterResult<Vec<ConditionalRule>>;
    fn set_conditional_format_rules(
        &mut self,
        sheet: &SheetRef,
        rules: Vec<ConditionalRule>,
    ) -> TransporterResult<()>;

    /// Make pending changes visible/durable
    fn flush(&mut self) -> TransporterResult<()>;
}

/// File-level access used by the archive engine
pub trait DriveStore {
    fn file_by_id(&mut self, id: &str) -> TransporterResult<DriveFile>;
    /// Copy a file under a new name, optionally into a folder
    fn copy_file(
        &mut self,
        file: &DriveFile,
        name: &str,
        folder: Option<&DriveFolder>,
    ) -> TransporterResult<DriveFile>;
    fn folder_by_id(&mut self, id: &str) -> TransporterResult<DriveFolder>;
}

/// A backend offering both capabilities
pub trait Store: TabularStore + DriveStore {}

impl<T: TabularStore + DriveStore + ?Sized> Store for T {}
