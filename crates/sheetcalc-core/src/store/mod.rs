//! The Cell Store Adapter
//!
//! The engine never talks to the relational backing store directly; it reads
//! and writes cells through [`CellStore`]. Implementations are expected to be
//! shareable between threads: concurrent recalculation requests on different
//! sheets go through the same store.

mod memory;

pub use memory::MemoryStore;

use crate::cell::{CellKey, CellRecord, FormulaCell, SheetId, SheetRange, Value, WorkbookId};
use crate::error::StoreError;
use std::sync::Arc;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A sheet as registered in the store
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SheetInfo {
    pub id: SheetId,
    pub workbook: WorkbookId,
    pub name: String,
}

/// Read/write access to persisted cells
pub trait CellStore: Send + Sync {
    /// Read a single cell; `None` when nothing is stored at the address
    fn get_cell(&self, key: CellKey) -> StoreResult<Option<CellRecord>>;

    /// Read every stored cell inside a range, in row-major order
    ///
    /// Addresses with nothing stored are omitted.
    fn get_range(&self, range: SheetRange) -> StoreResult<Vec<CellRecord>>;

    /// Store a literal value, retiring any formula at the address
    ///
    /// Writing [`Value::Empty`] removes the cell.
    fn put_value(&self, key: CellKey, value: Value) -> StoreResult<()>;

    /// Store a formula with its computed result, retiring any literal at the address
    fn put_formula(&self, key: CellKey, formula: FormulaCell) -> StoreResult<()>;

    /// Look up a sheet by name within a workbook
    fn resolve_sheet_id(&self, workbook: WorkbookId, name: &str) -> StoreResult<Option<SheetId>>;

    /// Look up a sheet by id
    fn sheet(&self, sheet: SheetId) -> StoreResult<Option<SheetInfo>>;

    /// Every formula cell of a sheet
    fn formula_cells(&self, sheet: SheetId) -> StoreResult<Vec<CellRecord>>;
}

impl<S: CellStore + ?Sized> CellStore for Arc<S> {
    fn get_cell(&self, key: CellKey) -> StoreResult<Option<CellRecord>> {
        (**self).get_cell(key)
    }

    fn get_range(&self, range: SheetRange) -> StoreResult<Vec<CellRecord>> {
        (**self).get_range(range)
    }

    fn put_value(&self, key: CellKey, value: Value) -> StoreResult<()> {
        (**self).put_value(key, value)
    }

    fn put_formula(&self, key: CellKey, formula: FormulaCell) -> StoreResult<()> {
        (**self).put_formula(key, formula)
    }

    fn resolve_sheet_id(&self, workbook: WorkbookId, name: &str) -> StoreResult<Option<SheetId>> {
        (**self).resolve_sheet_id(workbook, name)
    }

    fn sheet(&self, sheet: SheetId) -> StoreResult<Option<SheetInfo>> {
        (**self).sheet(sheet)
    }

    fn formula_cells(&self, sheet: SheetId) -> StoreResult<Vec<CellRecord>> {
        (**self).formula_cells(sheet)
    }
}
