//! # sheetcalc-core
//!
//! Core data structures for the sheetcalc recalculation engine.
//!
//! This crate provides the fundamental types used throughout sheetcalc:
//! - [`Value`] and [`ErrorKind`] - Tagged cell values and spreadsheet errors
//! - [`CellAddress`] and [`CellRange`] - A1 addressing and range arithmetic
//! - [`CellRecord`] - Literal and formula cells as exchanged with storage
//! - [`CellStore`] - The adapter the engine uses to reach the backing store
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc_core::{CellKey, CellRecord, CellStore, MemoryStore, Value, WorkbookId};
//!
//! let store = MemoryStore::new();
//! let sheet = store.add_sheet(WorkbookId(1), "Sheet1");
//! let a1 = CellKey::new(sheet, "A1".parse().unwrap());
//!
//! store.load([CellRecord::literal(a1, 42.0)]);
//! assert_eq!(store.get_cell(a1).unwrap().unwrap().value(), &Value::Number(42.0));
//! ```

pub mod cell;
pub mod error;
pub mod store;

// Re-exports for convenience
pub use cell::{
    column_letters, column_number, Cell, CellAddress, CellKey, CellRange, CellRecord, ErrorKind,
    FormulaCell, SheetId, SheetRange, Value, ValueType, WorkbookId,
};
pub use error::{Error, Result, StoreError};
pub use store::{CellStore, MemoryStore, SheetInfo, StoreResult};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u32 = 16_384;
