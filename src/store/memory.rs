//! In-memory store: workbooks, sheets and folders held in maps

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::{TransporterError, TransporterResult};
use crate::types::{CellValue, ValueMatrix};

use super::a1;
use super::{
    CellFormat, ConditionalRule, DriveFile, DriveFolder, DriveStore, GridArea, RangeData,
    RangeSpec, SheetDimensions, SheetId, SheetRef, TabularStore, WorkbookId,
};

pub const DEFAULT_MAX_ROWS: u32 = 1000;
pub const DEFAULT_MAX_COLUMNS: u32 = 26;

//==============================================================================
// Sheet
//==============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub formula: Option<String>,
    pub format: Option<CellFormat>,
}

impl Cell {
    fn has_content(&self) -> bool {
        !self.value.is_blank() || self.formula.is_some()
    }

    fn is_vacant(&self) -> bool {
        !self.has_content() && self.format.is_none()
    }
}

/// A sparse grid plus the sheet-level metadata the engine queries
#[derive(Debug, Clone)]
pub struct MemorySheet {
    pub id: SheetId,
    pub name: String,
    cells: BTreeMap<(u32, u32), Cell>,
    pub max_rows: u32,
    pub max_columns: u32,
    pub frozen_rows: u32,
    pub frozen_columns: u32,
    pub protected: bool,
    pub conditional_rules: Vec<ConditionalRule>,
}

impl MemorySheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SheetId(0),
            name: name.into(),
            cells: BTreeMap::new(),
            max_rows: DEFAULT_MAX_ROWS,
            max_columns: DEFAULT_MAX_COLUMNS,
            frozen_rows: 0,
            frozen_columns: 0,
            protected: false,
            conditional_rules: Vec::new(),
        }
    }

    /// Sheet pre-filled from A1 with `rows`
    pub fn with_values(name: impl Into<String>, rows: ValueMatrix) -> Self {
        let mut sheet = Self::new(name);
        sheet.write(1, 1, &rows);
        sheet
    }

    pub fn value(&self, row: u32, column: u32) -> CellValue {
        self.cells
            .get(&(row, column))
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    pub fn formula(&self, row: u32, column: u32) -> Option<&str> {
        self.cells
            .get(&(row, column))
            .and_then(|c| c.formula.as_deref())
    }

    pub fn format(&self, row: u32, column: u32) -> Option<&CellFormat> {
        self.cells.get(&(row, column)).and_then(|c| c.format.as_ref())
    }

    pub fn set_format(&mut self, row: u32, column: u32, format: Option<CellFormat>) {
        self.grow_to(row, column);
        let cell = self.cells.entry((row, column)).or_default();
        cell.format = format.filter(|f| !f.is_plain());
        if cell.is_vacant() {
            self.cells.remove(&(row, column));
        }
    }

    /// Store a literal value; text starting with `=` stays text
    pub fn set_value(&mut self, row: u32, column: u32, value: CellValue) {
        self.grow_to(row, column);
        let cell = self.cells.entry((row, column)).or_default();
        cell.value = value;
        cell.formula = None;
        if cell.is_vacant() {
            self.cells.remove(&(row, column));
        }
    }

    /// Store a formula together with its last computed value
    pub fn set_formula(&mut self, row: u32, column: u32, formula: &str, value: CellValue) {
        self.grow_to(row, column);
        let cell = self.cells.entry((row, column)).or_default();
        cell.formula = Some(formula.to_string());
        cell.value = value;
    }

    /// All occupied cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = ((u32, u32), &Cell)> {
        self.cells.iter().map(|(pos, cell)| (*pos, cell))
    }

    pub fn last_row(&self) -> u32 {
        self.cells
            .iter()
            .filter(|(_, c)| c.has_content())
            .map(|((r, _), _)| *r)
            .max()
            .unwrap_or(0)
    }

    pub fn last_column(&self) -> u32 {
        self.cells
            .iter()
            .filter(|(_, c)| c.has_content())
            .map(|((_, col), _)| *col)
            .max()
            .unwrap_or(0)
    }

    pub fn dimensions(&self) -> SheetDimensions {
        SheetDimensions {
            last_row: self.last_row(),
            last_column: self.last_column(),
            max_rows: self.max_rows,
            max_columns: self.max_columns,
            frozen_rows: self.frozen_rows,
            frozen_columns: self.frozen_columns,
        }
    }

    /// Values of rows 1..=last_row, columns 1..=last_column
    pub fn values(&self) -> ValueMatrix {
        let (rows, columns) = (self.last_row(), self.last_column());
        (1..=rows)
            .map(|r| (1..=columns).map(|c| self.value(r, c)).collect())
            .collect()
    }

    fn grow_to(&mut self, row: u32, column: u32) {
        self.max_rows = self.max_rows.max(row);
        self.max_columns = self.max_columns.max(column);
    }

    fn write(&mut self, row: u32, column: u32, values: &[Vec<CellValue>]) {
        for (r, cells) in values.iter().enumerate() {
            for (c, input) in cells.iter().enumerate() {
                let pos = (row + r as u32, column + c as u32);
                self.grow_to(pos.0, pos.1);
                let cell = self.cells.entry(pos).or_default();
                match input.as_formula() {
                    Some(formula) => {
                        cell.formula = Some(formula.to_string());
                        cell.value = CellValue::Empty;
                    }
                    None => {
                        cell.formula = None;
                        cell.value = input.clone();
                    }
                }
                if cell.is_vacant() {
                    self.cells.remove(&pos);
                }
            }
        }
    }

    fn resolve(&self, spec: &RangeSpec) -> TransporterResult<GridArea> {
        let area = match spec {
            RangeSpec::DataRange => {
                GridArea::new(1, 1, self.last_row().max(1), self.last_column().max(1))
            }
            RangeSpec::A1(text) => a1::parse_range(text, self.max_rows, self.max_columns)?,
            RangeSpec::Area(area) => *area,
        };
        if area.row == 0
            || area.column == 0
            || area.rows == 0
            || area.columns == 0
            || area.last_row() > self.max_rows
            || area.last_column() > self.max_columns
        {
            return Err(TransporterError::InvalidRange(format!(
                "{}!{}:{} is outside the sheet dimensions ({} x {})",
                self.name,
                a1::cell_name(area.row, area.column),
                a1::cell_name(area.last_row(), area.last_column()),
                self.max_rows,
                self.max_columns
            )));
        }
        Ok(area)
    }

    fn read(&self, spec: &RangeSpec) -> TransporterResult<RangeData> {
        let area = self.resolve(spec)?;
        let rows = area.row..=area.last_row();
        let values = rows
            .clone()
            .map(|r| {
                (area.column..=area.last_column())
                    .map(|c| self.value(r, c))
                    .collect()
            })
            .collect();
        let formulas = rows
            .map(|r| {
                (area.column..=area.last_column())
                    .map(|c| self.formula(r, c).unwrap_or_default().to_string())
                    .collect()
            })
            .collect();
        Ok(RangeData {
            area,
            values,
            formulas,
        })
    }

    fn clear(&mut self) {
        self.cells.clear();
        self.conditional_rules.clear();
    }

    fn delete_rows(&mut self, start: u32, count: u32) -> Result<(), String> {
        if count == 0 {
            return Ok(());
        }
        let end = start + count - 1;
        if start == 0 || end > self.max_rows {
            return Err(format!(
                "Rows {}-{} are out of bounds ({} rows)",
                start, end, self.max_rows
            ));
        }
        if start <= self.frozen_rows {
            return Err("Frozen rows cannot be deleted".to_string());
        }
        if self.max_rows - count <= self.frozen_rows {
            return Err("Sorry, it is not possible to delete all non-frozen rows.".to_string());
        }
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter(|((r, _), _)| *r < start || *r > end)
            .map(|((r, c), cell)| if r > end { ((r - count, c), cell) } else { ((r, c), cell) })
            .collect();
        self.max_rows -= count;
        Ok(())
    }

    fn delete_columns(&mut self, start: u32, count: u32) -> Result<(), String> {
        if count == 0 {
            return Ok(());
        }
        let end = start + count - 1;
        if start == 0 || end > self.max_columns {
            return Err(format!(
                "Columns {}-{} are out of bounds ({} columns)",
                start, end, self.max_columns
            ));
        }
        if start <= self.frozen_columns {
            return Err("Frozen columns cannot be deleted".to_string());
        }
        if self.max_columns - count <= self.frozen_columns {
            return Err("Sorry, it is not possible to delete all non-frozen columns.".to_string());
        }
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter(|((_, c), _)| *c < start || *c > end)
            .map(|((r, c), cell)| if c > end { ((r, c - count), cell) } else { ((r, c), cell) })
            .collect();
        self.max_columns -= count;
        Ok(())
    }
}

//==============================================================================
// Workbook
//==============================================================================

#[derive(Debug, Clone)]
pub struct MemoryWorkbook {
    pub id: WorkbookId,
    pub name: String,
    /// Folder id holding the file (None = drive root)
    pub folder: Option<String>,
    pub sheets: Vec<MemorySheet>,
}

impl MemoryWorkbook {
    pub fn new(id: WorkbookId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            folder: None,
            sheets: Vec::new(),
        }
    }

    pub fn with_sheet(mut self, sheet: MemorySheet) -> Self {
        self.sheets.push(sheet);
        self
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&MemorySheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    fn unique_sheet_name(&self, base: &str) -> String {
        if self.sheet_by_name(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{} {}", base, n))
            .find(|candidate| self.sheet_by_name(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }
}

//==============================================================================
// Store
//==============================================================================

/// Store keeping every workbook and folder in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    workbooks: BTreeMap<WorkbookId, MemoryWorkbook>,
    folders: BTreeMap<String, DriveFolder>,
    next_sheet_id: u64,
    flush_count: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workbook; its sheets get fresh ids
    pub fn insert_workbook(&mut self, mut workbook: MemoryWorkbook) -> WorkbookId {
        for sheet in &mut workbook.sheets {
            sheet.id = self.allocate_sheet_id();
        }
        let id = workbook.id.clone();
        self.workbooks.insert(id.clone(), workbook);
        id
    }

    pub fn add_folder(&mut self, id: &str, name: &str) -> DriveFolder {
        let folder = DriveFolder {
            id: id.to_string(),
            name: name.to_string(),
            url: format!("memory://folders/{}", id),
        };
        self.folders.insert(id.to_string(), folder.clone());
        folder
    }

    pub fn contains(&self, id: &str) -> bool {
        self.workbooks.contains_key(&WorkbookId::new(id))
    }

    pub fn workbook(&self, id: &WorkbookId) -> Option<&MemoryWorkbook> {
        self.workbooks.get(id)
    }

    pub fn workbook_mut(&mut self, id: &WorkbookId) -> Option<&mut MemoryWorkbook> {
        self.workbooks.get_mut(id)
    }

    pub fn workbooks(&self) -> impl Iterator<Item = &MemoryWorkbook> {
        self.workbooks.values()
    }

    pub fn sheet(&self, sheet: &SheetRef) -> Option<&MemorySheet> {
        self.workbooks
            .get(&sheet.workbook)?
            .sheets
            .iter()
            .find(|s| s.id == sheet.sheet)
    }

    pub fn sheet_mut(&mut self, sheet: &SheetRef) -> Option<&mut MemorySheet> {
        self.workbooks
            .get_mut(&sheet.workbook)?
            .sheets
            .iter_mut()
            .find(|s| s.id == sheet.sheet)
    }

    /// Number of `flush()` calls so far
    pub fn flush_count(&self) -> usize {
        self.flush_count
    }

    fn allocate_sheet_id(&mut self) -> SheetId {
        self.next_sheet_id += 1;
        SheetId(self.next_sheet_id)
    }

    fn wb(&self, id: &WorkbookId) -> TransporterResult<&MemoryWorkbook> {
        self.workbooks
            .get(id)
            .ok_or_else(|| TransporterError::store(format!("No workbook with id '{}'", id)))
    }

    fn wb_mut(&mut self, id: &WorkbookId) -> TransporterResult<&mut MemoryWorkbook> {
        self.workbooks
            .get_mut(id)
            .ok_or_else(|| TransporterError::store(format!("No workbook with id '{}'", id)))
    }

    fn sh(&self, sheet: &SheetRef) -> TransporterResult<&MemorySheet> {
        self.sheet(sheet).ok_or_else(|| missing_sheet(sheet))
    }

    fn sh_mut(&mut self, sheet: &SheetRef) -> TransporterResult<&mut MemorySheet> {
        self.sheet_mut(sheet).ok_or_else(|| missing_sheet(sheet))
    }

    fn drive_file(&self, workbook: &MemoryWorkbook) -> DriveFile {
        DriveFile {
            id: workbook.id.clone(),
            name: workbook.name.clone(),
            url: format!("memory://{}", workbook.id),
        }
    }
}

fn missing_sheet(sheet: &SheetRef) -> TransporterError {
    TransporterError::store(format!(
        "Sheet #{} no longer exists in workbook '{}'",
        sheet.sheet.0, sheet.workbook
    ))
}

pub(crate) fn new_file_id() -> String {
    Uuid::new_v4().simple().to_string()
}

impl TabularStore for MemoryStore {
    fn open_by_id(&mut self, id: &str) -> TransporterResult<WorkbookId> {
        let id = WorkbookId::new(id);
        self.wb(&id)?;
        Ok(id)
    }

    fn create_workbook(&mut self, name: &str) -> TransporterResult<WorkbookId> {
        let workbook = MemoryWorkbook::new(WorkbookId::new(new_file_id()), name)
            .with_sheet(MemorySheet::new("Sheet1"));
        Ok(self.insert_workbook(workbook))
    }

    fn workbook_name(&self, workbook: &WorkbookId) -> TransporterResult<String> {
        Ok(self.wb(workbook)?.name.clone())
    }

    fn workbook_url(&self, workbook: &WorkbookId) -> TransporterResult<String> {
        Ok(self.drive_file(self.wb(workbook)?).url)
    }

    fn sheets(&self, workbook: &WorkbookId) -> TransporterResult<Vec<SheetRef>> {
        Ok(self
            .wb(workbook)?
            .sheets
            .iter()
            .map(|s| SheetRef::new(workbook.clone(), s.id))
            .collect())
    }

    fn sheet_by_name(
        &self,
        workbook: &WorkbookId,
        name: &str,
    ) -> TransporterResult<Option<SheetRef>> {
        Ok(self
            .wb(workbook)?
            .sheet_by_name(name)
            .map(|s| SheetRef::new(workbook.clone(), s.id)))
    }

    fn sheet_name(&self, sheet: &SheetRef) -> TransporterResult<String> {
        Ok(self.sh(sheet)?.name.clone())
    }

    fn insert_sheet(&mut self, workbook: &WorkbookId, name: &str) -> TransporterResult<SheetRef> {
        if self.wb(workbook)?.sheet_by_name(name).is_some() {
            return Err(TransporterError::store(format!(
                "A sheet with the name \"{}\" already exists",
                name
            )));
        }
        let mut sheet = MemorySheet::new(name);
        sheet.id = self.allocate_sheet_id();
        let sheet_ref = SheetRef::new(workbook.clone(), sheet.id);
        self.wb_mut(workbook)?.sheets.push(sheet);
        Ok(sheet_ref)
    }

    fn delete_sheet(&mut self, sheet: &SheetRef) -> TransporterResult<()> {
        let workbook = self.wb_mut(&sheet.workbook)?;
        let index = workbook
            .sheets
            .iter()
            .position(|s| s.id == sheet.sheet)
            .ok_or_else(|| missing_sheet(sheet))?;
        if workbook.sheets.len() == 1 {
            return Err(TransporterError::store(
                "A workbook must contain at least one sheet",
            ));
        }
        workbook.sheets.remove(index);
        Ok(())
    }

    fn rename_sheet(&mut self, sheet: &SheetRef, name: &str) -> TransporterResult<()> {
        let workbook = self.wb(&sheet.workbook)?;
        if let Some(existing) = workbook.sheet_by_name(name) {
            if existing.id != sheet.sheet {
                return Err(TransporterError::store(format!(
                    "A sheet with the name \"{}\" already exists",
                    name
                )));
            }
        }
        self.sh_mut(sheet)?.name = name.to_string();
        Ok(())
    }

    fn read_range(&self, sheet: &SheetRef, range: &RangeSpec) -> TransporterResult<RangeData> {
        self.sh(sheet)?.read(range)
    }

    fn write_range(
        &mut self,
        sheet: &SheetRef,
        row: u32,
        column: u32,
        values: &[Vec<CellValue>],
    ) -> TransporterResult<()> {
        let width = values.iter().map(Vec::len).max().unwrap_or(0);
        let fits = |start: u32, len: usize| {
            u32::try_from(len)
                .ok()
                .and_then(|n| start.checked_add(n))
                .is_some()
        };
        if row == 0 || column == 0 || !fits(row, values.len()) || !fits(column, width) {
            return Err(TransporterError::InvalidRange(format!(
                "row {}, column {}",
                row, column
            )));
        }
        self.sh_mut(sheet)?.write(row, column, values);
        Ok(())
    }

    fn clear(&mut self, sheet: &SheetRef) -> TransporterResult<()> {
        self.sh_mut(sheet)?.clear();
        Ok(())
    }

    fn dimensions(&self, sheet: &SheetRef) -> TransporterResult<SheetDimensions> {
        Ok(self.sh(sheet)?.dimensions())
    }

    fn is_protected(&self, sheet: &SheetRef) -> TransporterResult<bool> {
        Ok(self.sh(sheet)?.protected)
    }

    fn delete_rows(&mut self, sheet: &SheetRef, start: u32, count: u32) -> TransporterResult<()> {
        self.sh_mut(sheet)?
            .delete_rows(start, count)
            .map_err(TransporterError::Store)
    }

    fn delete_columns(
        &mut self,
        sheet: &SheetRef,
        start: u32,
        count: u32,
    ) -> TransporterResult<()> {
        self.sh_mut(sheet)?
            .delete_columns(start, count)
            .map_err(TransporterError::Store)
    }

    fn copy_into(&mut self, sheet: &SheetRef, target: &WorkbookId) -> TransporterResult<SheetRef> {
        let mut copy = self.sh(sheet)?.clone();
        let target_wb = self.wb(target)?;
        copy.name = target_wb.unique_sheet_name(&format!("Copy of {}", copy.name));
        copy.protected = false;
        copy.id = self.allocate_sheet_id();
        let sheet_ref = SheetRef::new(target.clone(), copy.id);
        self.wb_mut(target)?.sheets.push(copy);
        Ok(sheet_ref)
    }

    fn copy_format_only(
        &mut self,
        source: &SheetRef,
        source_area: GridArea,
        dest: &SheetRef,
        dest_area: GridArea,
    ) -> TransporterResult<()> {
        if source_area.rows == 0 || source_area.columns == 0 {
            return Ok(());
        }
        let src = self.sh(source)?;
        let formats: Vec<((u32, u32), Option<CellFormat>)> = (0..dest_area.rows)
            .flat_map(|dr| (0..dest_area.columns).map(move |dc| (dr, dc)))
            .map(|(dr, dc)| {
                let from = (
                    source_area.row + dr % source_area.rows,
                    source_area.column + dc % source_area.columns,
                );
                let to = (dest_area.row + dr, dest_area.column + dc);
                (to, src.format(from.0, from.1).cloned())
            })
            .collect();

        let dst = self.sh_mut(dest)?;
        for ((row, column), format) in formats {
            dst.set_format(row, column, format);
        }
        Ok(())
    }

    fn conditional_format_rules(
        &self,
        sheet: &SheetRef,
    ) -> TransporterResult<Vec<ConditionalRule>> {
        Ok(self.sh(sheet)?.conditional_rules.clone())
    }

    fn set_conditional_format_rules(
        &mut self,
        sheet: &SheetRef,
        rules: Vec<ConditionalRule>,
    ) -> TransporterResult<()> {
        self.sh_mut(sheet)?.conditional_rules = rules;
        Ok(())
    }

    fn flush(&mut self) -> TransporterResult<()> {
        self.flush_count += 1;
        Ok(())
    }
}

impl DriveStore for MemoryStore {
    fn file_by_id(&mut self, id: &str) -> TransporterResult<DriveFile> {
        let workbook = self.wb(&WorkbookId::new(id))?;
        Ok(self.drive_file(workbook))
    }

    fn copy_file(
        &mut self,
        file: &DriveFile,
        name: &str,
        folder: Option<&DriveFolder>,
    ) -> TransporterResult<DriveFile> {
        let mut copy = self.wb(&file.id)?.clone();
        copy.id = WorkbookId::new(new_file_id());
        copy.name = name.to_string();
        copy.folder = folder.map(|f| f.id.clone());
        let id = self.insert_workbook(copy);
        let workbook = self.wb(&id)?;
        Ok(self.drive_file(workbook))
    }

    fn folder_by_id(&mut self, id: &str) -> TransporterResult<DriveFolder> {
        self.folders
            .get(id)
            .cloned()
            .ok_or_else(|| TransporterError::store(format!("No folder with id '{}'", id)))
    }
}
