//! Write strategies: how projected rows reach the destination sheet

use tracing::debug;

use crate::config::ExecutionStrategy;
use crate::error::TransporterResult;
use crate::store::{SheetRef, TabularStore};
use crate::types::{CellValue, Cursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One bulk write, no intermediate flush
    Atomic,
    /// One write and one flush per row
    RowByRow,
    /// One write and one flush per chunk
    Batched { batch_size: usize },
}

impl Strategy {
    pub fn from_config(strategy: ExecutionStrategy, batch_size: u32) -> Self {
        match strategy {
            ExecutionStrategy::Atomic => Strategy::Atomic,
            ExecutionStrategy::RowByRow => Strategy::RowByRow,
            ExecutionStrategy::Batched => Strategy::Batched {
                batch_size: batch_size.max(1) as usize,
            },
        }
    }

    /// Suffix used in the run summary
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Atomic => "",
            Strategy::RowByRow => " (Row-by-Row)",
            Strategy::Batched { .. } => " (Batch)",
        }
    }

    /// Write `rows` at the cursor, advancing it; returns rows written
    pub fn write<S: TabularStore + ?Sized>(
        &self,
        store: &mut S,
        sheet: &SheetRef,
        cursor: &mut Cursor,
        rows: &[Vec<CellValue>],
    ) -> TransporterResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        match *self {
            Strategy::Atomic => {
                store.write_range(sheet, cursor.row, cursor.column, rows)?;
                cursor.advance(rows.len())?;
            }
            Strategy::RowByRow => {
                for row in rows {
                    store.write_range(sheet, cursor.row, cursor.column, std::slice::from_ref(row))?;
                    cursor.advance(1)?;
                    store.flush()?;
                }
                debug!(rows = rows.len(), "row-by-row write flushed");
            }
            Strategy::Batched { batch_size } => {
                for chunk in rows.chunks(batch_size.max(1)) {
                    store.write_range(sheet, cursor.row, cursor.column, chunk)?;
                    cursor.advance(chunk.len())?;
                    store.flush()?;
                    debug!(rows = chunk.len(), "batch flushed");
                }
            }
        }

        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemorySheet, MemoryStore, MemoryWorkbook, WorkbookId};
    use pretty_assertions::assert_eq;

    fn setup() -> (MemoryStore, SheetRef) {
        let mut store = MemoryStore::new();
        let wb = store.insert_workbook(
            MemoryWorkbook::new(WorkbookId::new("dest"), "Dest").with_sheet(MemorySheet::new("Out")),
        );
        let sheet = store.first_sheet(&wb).unwrap().unwrap();
        (store, sheet)
    }

    fn rows(n: usize) -> Vec<Vec<CellValue>> {
        (0..n)
            .map(|i| vec![CellValue::from(format!("r{}", i)), CellValue::Number(i as f64)])
            .collect()
    }

    fn run(strategy: Strategy, n: usize) -> (MemoryStore, SheetRef, Cursor) {
        let (mut store, sheet) = setup();
        let mut cursor = Cursor::new(2, 2);
        let written = strategy
            .write(&mut store, &sheet, &mut cursor, &rows(n))
            .unwrap();
        assert_eq!(written, n);
        (store, sheet, cursor)
    }

    #[test]
    fn test_flush_counts_per_strategy() {
        assert_eq!(run(Strategy::Atomic, 5).0.flush_count(), 0);
        assert_eq!(run(Strategy::RowByRow, 5).0.flush_count(), 5);
        assert_eq!(run(Strategy::Batched { batch_size: 2 }, 5).0.flush_count(), 3);
        assert_eq!(run(Strategy::Batched { batch_size: 100 }, 5).0.flush_count(), 1);
    }

    #[test]
    fn test_strategies_produce_identical_contents() {
        let contents: Vec<_> = [
            Strategy::Atomic,
            Strategy::RowByRow,
            Strategy::Batched { batch_size: 3 },
        ]
        .into_iter()
        .map(|s| {
            let (store, sheet, cursor) = run(s, 7);
            assert_eq!(cursor, Cursor::new(9, 2));
            store.sheet(&sheet).unwrap().values()
        })
        .collect();
        assert_eq!(contents[0], contents[1]);
        assert_eq!(contents[0], contents[2]);
        assert_eq!(contents[0][1][1], CellValue::from("r0"));
    }

    #[test]
    fn test_empty_rows_write_nothing() {
        let (store, sheet, cursor) = run(Strategy::RowByRow, 0);
        assert_eq!(cursor, Cursor::new(2, 2));
        assert_eq!(store.flush_count(), 0);
        assert_eq!(store.dimensions(&sheet).unwrap().last_row, 0);
    }

    #[test]
    fn test_labels_and_batch_floor() {
        assert_eq!(Strategy::Atomic.label(), "");
        assert_eq!(Strategy::RowByRow.label(), " (Row-by-Row)");
        assert_eq!(
            Strategy::from_config(ExecutionStrategy::Batched, 0),
            Strategy::Batched { batch_size: 1 }
        );
        assert_eq!(Strategy::from_config(ExecutionStrategy::Batched, 0).label(), " (Batch)");
    }
}
