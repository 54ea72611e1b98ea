//! Formula error types

use sheetcalc_core::StoreError;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing or evaluation
///
/// Spreadsheet-level failures (`#N/A`, `#DIV/0!`, ...) are values, not errors;
/// evaluation only fails when the cells behind a reference cannot be read.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// The cell store could not serve a reference
    #[error(transparent)]
    Store(#[from] StoreError),
}
