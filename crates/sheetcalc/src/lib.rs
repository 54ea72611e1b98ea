//! # sheetcalc
//!
//! Keeps spreadsheet formula cells consistent with the values they depend on,
//! for cells that live in an external store.
//!
//! ## Features
//!
//! - Formulas with cell, range and cross-sheet references
//! - SUM, IF, IFERROR, VLOOKUP, MATCH, CONCATENATE, arithmetic and comparison
//! - Exact reverse-edge dependency tracking, including range containment
//! - Depth-ordered recalculation of everything an edit affects
//! - Circular references reported as `#CIRCULAR!` instead of looping
//! - Per-sheet locking for concurrent requests on different sheets
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc::prelude::*;
//!
//! let store = MemoryStore::new();
//! let sheet = store.add_sheet(WorkbookId(1), "Sheet1");
//! let engine = Engine::new(store);
//!
//! let cell = |a1: &str| CellKey::new(sheet, a1.parse().unwrap());
//! engine.set_cell(cell("B1"), "=A1+1").unwrap();
//! engine.set_cell(cell("C1"), "=SUM(A1:A2)").unwrap();
//!
//! let report = engine.set_cell(cell("A1"), "10").unwrap();
//! assert_eq!(report.value(cell("B1")), Some(&Value::Number(11.0)));
//! assert_eq!(report.value(cell("C1")), Some(&Value::Number(10.0)));
//! ```

pub mod calculation;
pub mod config;
pub mod context;
pub mod error;
pub mod locks;
pub mod prelude;
pub mod report;
pub mod request;

pub use calculation::Engine;
pub use config::RecalcOptions;
pub use context::EvaluationContext;
pub use error::{Error, Result};
pub use locks::{SheetGuard, SheetLocks};
pub use report::{CellOutcome, DependencyReport, RecalcReport};
pub use request::{BatchRequest, CellInput, RecalcRequest};

// Re-export core types
pub use sheetcalc_core::{
    Cell, CellAddress, CellKey, CellRange, CellRecord, CellStore, ErrorKind, FormulaCell,
    MemoryStore, SheetId, SheetInfo, SheetRange, StoreError, StoreResult, Value, ValueType,
    WorkbookId,
};

// Re-export formula types
pub use sheetcalc_formula::{
    evaluate, parse_formula, CompiledFormula, DefinedNames, DependencyGraph, FormulaExpr,
};
