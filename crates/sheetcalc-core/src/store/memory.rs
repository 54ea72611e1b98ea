//! In-memory [`CellStore`]
//!
//! Stands in for the relational store in tests and embedded use. Cells are
//! kept per sheet in a map ordered by `(row, column)`, so range reads come out
//! in row-major order without sorting.

use super::{CellStore, SheetInfo, StoreResult};
use crate::cell::{
    Cell, CellAddress, CellKey, CellRecord, FormulaCell, SheetId, SheetRange, Value, WorkbookId,
};
use crate::error::StoreError;
use ahash::AHashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe in-memory cell store
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    available: AtomicBool,
}

#[derive(Debug, Default)]
struct Inner {
    sheets: BTreeMap<SheetId, SheetInfo>,
    cells: AHashMap<SheetId, BTreeMap<CellAddress, Cell>>,
    next_sheet: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Register a sheet and return its id
    pub fn add_sheet(&self, workbook: WorkbookId, name: &str) -> SheetId {
        let mut inner = self.write();
        inner.next_sheet += 1;
        let id = SheetId(inner.next_sheet);
        inner.sheets.insert(
            id,
            SheetInfo {
                id,
                workbook,
                name: name.to_string(),
            },
        );
        inner.cells.entry(id).or_default();
        id
    }

    /// Bulk-load records, e.g. the output of a spreadsheet extractor
    ///
    /// Records for unregistered sheets are stored anyway; only sheet-name
    /// resolution needs the registry.
    pub fn load<I>(&self, records: I)
    where
        I: IntoIterator<Item = CellRecord>,
    {
        let mut inner = self.write();
        for record in records {
            inner
                .cells
                .entry(record.key.sheet)
                .or_default()
                .insert(record.key.addr, record.cell);
        }
    }

    /// Make every subsequent call succeed (`true`) or fail as unavailable (`false`)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Current value at an address (`Empty` when nothing is stored)
    pub fn value(&self, key: CellKey) -> Value {
        self.read()
            .cells
            .get(&key.sheet)
            .and_then(|cells| cells.get(&key.addr))
            .map(|cell| cell.value().clone())
            .unwrap_or_default()
    }

    /// Number of stored cells on a sheet
    pub fn cell_count(&self, sheet: SheetId) -> usize {
        self.read().cells.get(&sheet).map_or(0, BTreeMap::len)
    }

    fn check(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable("memory store switched off"))
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CellStore for MemoryStore {
    fn get_cell(&self, key: CellKey) -> StoreResult<Option<CellRecord>> {
        self.check()?;
        Ok(self
            .read()
            .cells
            .get(&key.sheet)
            .and_then(|cells| cells.get(&key.addr))
            .map(|cell| CellRecord::new(key, cell.clone())))
    }

    fn get_range(&self, range: SheetRange) -> StoreResult<Vec<CellRecord>> {
        self.check()?;
        let inner = self.read();
        let Some(cells) = inner.cells.get(&range.sheet) else {
            return Ok(Vec::new());
        };
        Ok(cells
            .range(range.range.start..=range.range.end)
            .filter(|(addr, _)| range.range.contains(addr))
            .map(|(addr, cell)| CellRecord::new(CellKey::new(range.sheet, *addr), cell.clone()))
            .collect())
    }

    fn put_value(&self, key: CellKey, value: Value) -> StoreResult<()> {
        self.check()?;
        let mut inner = self.write();
        let cells = inner.cells.entry(key.sheet).or_default();
        if value.is_empty() {
            cells.remove(&key.addr);
        } else {
            cells.insert(key.addr, Cell::Literal(value));
        }
        Ok(())
    }

    fn put_formula(&self, key: CellKey, formula: FormulaCell) -> StoreResult<()> {
        self.check()?;
        self.write()
            .cells
            .entry(key.sheet)
            .or_default()
            .insert(key.addr, Cell::Formula(formula));
        Ok(())
    }

    fn resolve_sheet_id(&self, workbook: WorkbookId, name: &str) -> StoreResult<Option<SheetId>> {
        self.check()?;
        Ok(self
            .read()
            .sheets
            .values()
            .find(|s| s.workbook == workbook && s.name.eq_ignore_ascii_case(name))
            .map(|s| s.id))
    }

    fn sheet(&self, sheet: SheetId) -> StoreResult<Option<SheetInfo>> {
        self.check()?;
        Ok(self.read().sheets.get(&sheet).cloned())
    }

    fn formula_cells(&self, sheet: SheetId) -> StoreResult<Vec<CellRecord>> {
        self.check()?;
        let inner = self.read();
        Ok(inner
            .cells
            .get(&sheet)
            .into_iter()
            .flat_map(|cells| cells.iter())
            .filter(|(_, cell)| cell.is_formula())
            .map(|(addr, cell)| CellRecord::new(CellKey::new(sheet, *addr), cell.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellRange;
    use pretty_assertions::assert_eq;

    fn key(sheet: SheetId, a1: &str) -> CellKey {
        CellKey::new(sheet, CellAddress::parse(a1).unwrap())
    }

    #[test]
    fn test_literal_and_formula_replace_each_other() {
        let store = MemoryStore::new();
        let sheet = store.add_sheet(WorkbookId(1), "Data");
        let a1 = key(sheet, "A1");

        store.put_value(a1, Value::Number(3.0)).unwrap();
        store
            .put_formula(a1, FormulaCell::new("=1+1").with_result(Value::Number(2.0)))
            .unwrap();
        let record = store.get_cell(a1).unwrap().unwrap();
        assert!(record.cell.is_formula());
        assert_eq!(store.formula_cells(sheet).unwrap().len(), 1);

        store.put_value(a1, Value::text("x")).unwrap();
        assert_eq!(store.value(a1), Value::text("x"));
        assert!(store.formula_cells(sheet).unwrap().is_empty());

        store.put_value(a1, Value::Empty).unwrap();
        assert_eq!(store.get_cell(a1).unwrap(), None);
        assert_eq!(store.cell_count(sheet), 0);
    }

    #[test]
    fn test_get_range_is_row_major_and_clipped() {
        let store = MemoryStore::new();
        let sheet = store.add_sheet(WorkbookId(1), "Data");
        store.load([
            CellRecord::literal(key(sheet, "B2"), 4.0),
            CellRecord::literal(key(sheet, "A2"), 3.0),
            CellRecord::literal(key(sheet, "B1"), 2.0),
            CellRecord::literal(key(sheet, "A1"), 1.0),
            CellRecord::literal(key(sheet, "C1"), 99.0),
        ]);

        let range = SheetRange::new(sheet, CellRange::parse("A1:B2").unwrap());
        let values: Vec<_> = store
            .get_range(range)
            .unwrap()
            .into_iter()
            .map(|r| r.formatted_value())
            .collect();
        assert_eq!(values, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_resolve_sheet_id_is_scoped_to_workbook() {
        let store = MemoryStore::new();
        let lookup = store.add_sheet(WorkbookId(1), "Lookup Table");
        store.add_sheet(WorkbookId(2), "Lookup Table");

        assert_eq!(
            store.resolve_sheet_id(WorkbookId(1), "lookup table").unwrap(),
            Some(lookup)
        );
        assert_eq!(store.resolve_sheet_id(WorkbookId(1), "Missing").unwrap(), None);
    }

    #[test]
    fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        let sheet = store.add_sheet(WorkbookId(1), "Data");
        store.set_available(false);

        assert!(matches!(
            store.get_cell(key(sheet, "A1")),
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.put_value(key(sheet, "A1"), Value::Number(1.0)).is_err());

        store.set_available(true);
        assert!(store.get_cell(key(sheet, "A1")).is_ok());
    }
}
