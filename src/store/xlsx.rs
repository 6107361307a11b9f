//! File-backed store: a directory of `.xlsx` files acting as a drive
//!
//! Layout:
//! ```text
//! <root>/
//!   catalog.json          names + sheet metadata xlsx readers cannot recover
//!   <id>.xlsx             workbook at the drive root
//!   <folder>/<id>.xlsx    workbook inside a folder
//! ```
//!
//! Workbooks load lazily on `open_by_id`/`file_by_id` and live in an inner
//! [`MemoryStore`]. Changes stay in memory until `flush()`, which rewrites
//! every workbook touched since the previous flush.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TransporterError, TransporterResult};
use crate::excel::{ExcelExporter, ExcelImporter};
use crate::types::CellValue;

use super::memory::MemoryStore;
use super::{
    CellFormat, ConditionalRule, DriveFile, DriveFolder, DriveStore, GridArea, MemorySheet,
    MemoryWorkbook, RangeData, RangeSpec, SheetDimensions, SheetRef, TabularStore, WorkbookId,
};

const CATALOG_FILE: &str = "catalog.json";
const EXTENSION: &str = "xlsx";

//==============================================================================
// Catalog
//==============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct Catalog {
    #[serde(default)]
    files: BTreeMap<String, FileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    folder: Option<String>,
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetMeta {
    name: String,
    max_rows: u32,
    max_columns: u32,
    #[serde(default)]
    frozen_rows: u32,
    #[serde(default)]
    frozen_columns: u32,
    #[serde(default)]
    protected: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    formats: Vec<FormatEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    conditional_rules: Vec<ConditionalRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FormatEntry {
    row: u32,
    column: u32,
    format: CellFormat,
}

impl SheetMeta {
    fn capture(sheet: &MemorySheet) -> Self {
        Self {
            name: sheet.name.clone(),
            max_rows: sheet.max_rows,
            max_columns: sheet.max_columns,
            frozen_rows: sheet.frozen_rows,
            frozen_columns: sheet.frozen_columns,
            protected: sheet.protected,
            formats: sheet
                .cells()
                .filter_map(|((row, column), cell)| {
                    cell.format.clone().map(|format| FormatEntry {
                        row,
                        column,
                        format,
                    })
                })
                .collect(),
            conditional_rules: sheet.conditional_rules.clone(),
        }
    }

    fn apply(&self, sheet: &mut MemorySheet) {
        sheet.max_rows = self.max_rows.max(sheet.last_row());
        sheet.max_columns = self.max_columns.max(sheet.last_column());
        sheet.frozen_rows = self.frozen_rows;
        sheet.frozen_columns = self.frozen_columns;
        sheet.protected = self.protected;
        sheet.conditional_rules = self.conditional_rules.clone();
        for entry in &self.formats {
            sheet.set_format(entry.row, entry.column, Some(entry.format.clone()));
        }
    }
}

//==============================================================================
// Store
//==============================================================================

/// Store persisting workbooks as `.xlsx` files under a root directory
#[derive(Debug)]
pub struct XlsxStore {
    root: PathBuf,
    inner: MemoryStore,
    catalog: Catalog,
    dirty: BTreeSet<WorkbookId>,
}

impl XlsxStore {
    /// Open (creating if needed) a drive rooted at `root`
    pub fn open<P: AsRef<Path>>(root: P) -> TransporterResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let root = root.canonicalize()?;

        let catalog_path = root.join(CATALOG_FILE);
        let catalog = if catalog_path.exists() {
            serde_json::from_str(&fs::read_to_string(&catalog_path)?)?
        } else {
            Catalog::default()
        };

        Ok(Self {
            root,
            inner: MemoryStore::new(),
            catalog,
            dirty: BTreeSet::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loaded workbooks, including unsaved changes
    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    /// Every workbook file on the drive (root and folders)
    pub fn files(&self) -> TransporterResult<Vec<DriveFile>> {
        let mut files = Vec::new();
        for dir in self.search_dirs()? {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if let Some(id) = workbook_stem(&path) {
                    files.push(DriveFile {
                        name: self.display_name(&id),
                        url: file_url(&path),
                        id: WorkbookId::new(id),
                    });
                }
            }
        }
        files.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(files)
    }

    /// Path a workbook is (or will be) saved at
    pub fn path_of(&self, id: &WorkbookId) -> PathBuf {
        let folder = self
            .inner
            .workbook(id)
            .and_then(|wb| wb.folder.clone())
            .or_else(|| {
                self.catalog
                    .files
                    .get(id.as_str())
                    .and_then(|e| e.folder.clone())
            });
        let dir = match folder {
            Some(folder) => self.root.join(folder),
            None => self.root.clone(),
        };
        dir.join(format!("{}.{}", id, EXTENSION))
    }

    fn display_name(&self, id: &str) -> String {
        self.catalog
            .files
            .get(id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn search_dirs(&self) -> TransporterResult<Vec<PathBuf>> {
        let mut dirs = vec![self.root.clone()];
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        Ok(dirs)
    }

    /// Find an existing file for `id`: catalog folder first, then a scan
    fn locate(&self, id: &str) -> TransporterResult<Option<(PathBuf, Option<String>)>> {
        let file_name = format!("{}.{}", id, EXTENSION);
        if let Some(folder) = self.catalog.files.get(id).and_then(|e| e.folder.clone()) {
            let path = self.root.join(&folder).join(&file_name);
            if path.is_file() {
                return Ok(Some((path, Some(folder))));
            }
        }
        for dir in self.search_dirs()? {
            let path = dir.join(&file_name);
            if path.is_file() {
                let folder = (dir != self.root)
                    .then(|| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
                    .flatten();
                return Ok(Some((path, folder)));
            }
        }
        Ok(None)
    }

    fn ensure_loaded(&mut self, id: &str) -> TransporterResult<WorkbookId> {
        if !is_plain_name(id) {
            return Err(TransporterError::store(format!("Invalid file id '{}'", id)));
        }
        let workbook_id = WorkbookId::new(id);
        if self.inner.contains(id) {
            return Ok(workbook_id);
        }

        let (path, folder) = self
            .locate(id)?
            .ok_or_else(|| TransporterError::store(format!("No workbook with id '{}'", id)))?;
        debug!(path = %path.display(), "loading workbook");

        let entry = self.catalog.files.get(id).cloned();
        let name = entry
            .as_ref()
            .map(|e| e.name.clone())
            .unwrap_or_else(|| id.to_string());
        let mut workbook = ExcelImporter::new(&path).import(workbook_id.clone(), &name)?;
        workbook.folder = folder;
        if let Some(entry) = entry {
            for sheet in &mut workbook.sheets {
                if let Some(meta) = entry.sheets.iter().find(|m| m.name == sheet.name) {
                    meta.apply(sheet);
                }
            }
        }
        Ok(self.inner.insert_workbook(workbook))
    }

    fn touch(&mut self, workbook: &WorkbookId) {
        self.dirty.insert(workbook.clone());
    }

    fn save_workbook(&mut self, workbook: &MemoryWorkbook) -> TransporterResult<()> {
        let path = self.path_of(&workbook.id);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        ExcelExporter::new(workbook).export(&path)?;
        debug!(path = %path.display(), "saved workbook");

        self.catalog.files.insert(
            workbook.id.to_string(),
            FileEntry {
                name: workbook.name.clone(),
                folder: workbook.folder.clone(),
                sheets: workbook.sheets.iter().map(SheetMeta::capture).collect(),
            },
        );
        Ok(())
    }

    fn save_catalog(&self) -> TransporterResult<()> {
        let json = serde_json::to_string_pretty(&self.catalog)?;
        fs::write(self.root.join(CATALOG_FILE), json)?;
        Ok(())
    }
}

fn is_plain_name(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\'])
}

fn workbook_stem(path: &Path) -> Option<String> {
    if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
        return None;
    }
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

impl TabularStore for XlsxStore {
    fn open_by_id(&mut self, id: &str) -> TransporterResult<WorkbookId> {
        self.ensure_loaded(id)
    }

    fn create_workbook(&mut self, name: &str) -> TransporterResult<WorkbookId> {
        let id = self.inner.create_workbook(name)?;
        self.touch(&id);
        Ok(id)
    }

    fn workbook_name(&self, workbook: &WorkbookId) -> TransporterResult<String> {
        self.inner.workbook_name(workbook)
    }

    fn workbook_url(&self, workbook: &WorkbookId) -> TransporterResult<String> {
        self.inner.workbook_name(workbook)?;
        Ok(file_url(&self.path_of(workbook)))
    }

    fn sheets(&self, workbook: &WorkbookId) -> TransporterResult<Vec<SheetRef>> {
        self.inner.sheets(workbook)
    }

    fn sheet_by_name(
        &self,
        workbook: &WorkbookId,
        name: &str,
    ) -> TransporterResult<Option<SheetRef>> {
        self.inner.sheet_by_name(workbook, name)
    }

    fn sheet_name(&self, sheet: &SheetRef) -> TransporterResult<String> {
        self.inner.sheet_name(sheet)
    }

    fn insert_sheet(&mut self, workbook: &WorkbookId, name: &str) -> TransporterResult<SheetRef> {
        let sheet = self.inner.insert_sheet(workbook, name)?;
        self.touch(workbook);
        Ok(sheet)
    }

    fn delete_sheet(&mut self, sheet: &SheetRef) -> TransporterResult<()> {
        self.inner.delete_sheet(sheet)?;
        self.touch(&sheet.workbook);
        Ok(())
    }

    fn rename_sheet(&mut self, sheet: &SheetRef, name: &str) -> TransporterResult<()> {
        self.inner.rename_sheet(sheet, name)?;
        self.touch(&sheet.workbook);
        Ok(())
    }

    fn read_range(&self, sheet: &SheetRef, range: &RangeSpec) -> TransporterResult<RangeData> {
        self.inner.read_range(sheet, range)
    }

    fn write_range(
        &mut self,
        sheet: &SheetRef,
        row: u32,
        column: u32,
        values: &[Vec<CellValue>],
    ) -> TransporterResult<()> {
        self.inner.write_range(sheet, row, column, values)?;
        self.touch(&sheet.workbook);
        Ok(())
    }

    fn clear(&mut self, sheet: &SheetRef) -> TransporterResult<()> {
        self.inner.clear(sheet)?;
        self.touch(&sheet.workbook);
        Ok(())
    }

    fn dimensions(&self, sheet: &SheetRef) -> TransporterResult<SheetDimensions> {
        self.inner.dimensions(sheet)
    }

    fn is_protected(&self, sheet: &SheetRef) -> TransporterResult<bool> {
        self.inner.is_protected(sheet)
    }

    fn delete_rows(&mut self, sheet: &SheetRef, start: u32, count: u32) -> TransporterResult<()> {
        self.inner.delete_rows(sheet, start, count)?;
        self.touch(&sheet.workbook);
        Ok(())
    }

    fn delete_columns(
        &mut self,
        sheet: &SheetRef,
        start: u32,
        count: u32,
    ) -> TransporterResult<()> {
        self.inner.delete_columns(sheet, start, count)?;
        self.touch(&sheet.workbook);
        Ok(())
    }

    fn copy_into(&mut self, sheet: &SheetRef, target: &WorkbookId) -> TransporterResult<SheetRef> {
        let copy = self.inner.copy_into(sheet, target)?;
        self.touch(target);
        Ok(copy)
    }

    fn copy_format_only(
        &mut self,
        source: &SheetRef,
        source_area: GridArea,
        dest: &SheetRef,
        dest_area: GridArea,
    ) -> TransporterResult<()> {
        self.inner
            .copy_format_only(source, source_area, dest, dest_area)?;
        self.touch(&dest.workbook);
        Ok(())
    }

    fn conditional_format_rules(
        &self,
        sheet: &SheetRef,
    ) -> TransporterResult<Vec<ConditionalRule>> {
        self.inner.conditional_format_rules(sheet)
    }

    fn set_conditional_format_rules(
        &mut self,
        sheet: &SheetRef,
        rules: Vec<ConditionalRule>,
    ) -> TransporterResult<()> {
        self.inner.set_conditional_format_rules(sheet, rules)?;
        self.touch(&sheet.workbook);
        Ok(())
    }

    fn flush(&mut self) -> TransporterResult<()> {
        if self.dirty.is_empty() {
            return Ok(());
        }
        let dirty = std::mem::take(&mut self.dirty);
        for id in &dirty {
            if let Some(workbook) = self.inner.workbook(id).cloned() {
                self.save_workbook(&workbook)?;
            }
        }
        self.save_catalog()?;
        self.inner.flush()
    }
}

impl DriveStore for XlsxStore {
    fn file_by_id(&mut self, id: &str) -> TransporterResult<DriveFile> {
        let id = self.ensure_loaded(id)?;
        Ok(DriveFile {
            name: self.inner.workbook_name(&id)?,
            url: file_url(&self.path_of(&id)),
            id,
        })
    }

    fn copy_file(
        &mut self,
        file: &DriveFile,
        name: &str,
        folder: Option<&DriveFolder>,
    ) -> TransporterResult<DriveFile> {
        self.ensure_loaded(file.id.as_str())?;
        let copy = self.inner.copy_file(file, name, folder)?;
        self.touch(&copy.id);
        Ok(DriveFile {
            url: file_url(&self.path_of(&copy.id)),
            ..copy
        })
    }

    fn folder_by_id(&mut self, id: &str) -> TransporterResult<DriveFolder> {
        let path = self.root.join(id);
        if !is_plain_name(id) || !path.is_dir() {
            return Err(TransporterError::store(format!("No folder with id '{}'", id)));
        }
        Ok(DriveFolder {
            id: id.to_string(),
            name: id.to_string(),
            url: file_url(&path),
        })
    }
}
