//! Cell-related types and utilities
//!
//! This module contains:
//! - [`Value`] - The value held by a cell or produced by a formula
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A range of cells (e.g., "A1:B10")
//! - [`CellKey`] / [`SheetRange`] - Addresses and ranges bound to a sheet
//! - [`CellRecord`] - Complete cell contents as exchanged with the store

mod address;
mod key;
mod record;
mod value;

pub use address::{column_letters, column_number, CellAddress, CellRange, CellRangeIterator};
pub use key::{CellKey, SheetId, SheetRange, WorkbookId};
pub use record::{Cell, CellRecord, FormulaCell};
pub use value::{ErrorKind, Value, ValueType};
