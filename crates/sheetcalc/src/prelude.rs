//! Prelude module - common imports for sheetcalc users
//!
//! ```rust
//! use sheetcalc::prelude::*;
//! ```

pub use crate::{
    // Requests and reports
    BatchRequest,
    CellAddress,
    CellInput,
    CellKey,
    CellOutcome,
    CellRange,
    CellRecord,
    // Storage
    CellStore,
    DefinedNames,
    DependencyReport,
    // Engine
    Engine,
    // Error types
    Error,
    ErrorKind,
    MemoryStore,
    RecalcOptions,
    RecalcReport,
    RecalcRequest,
    Result,
    SheetId,
    SheetRange,
    StoreError,
    // Values
    Value,
    WorkbookId,
};
