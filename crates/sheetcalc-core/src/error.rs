//! Error types for sheetcalc-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sheetcalc-core
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid cell address format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid cell range format
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// Row number out of bounds
    #[error("Row {0} out of bounds (valid: 1..={1})")]
    RowOutOfBounds(u32, u32),

    /// Column number out of bounds
    #[error("Column {0} out of bounds (valid: 1..={1})")]
    ColumnOutOfBounds(u32, u32),

    /// Backing store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure reported by a [`CellStore`](crate::store::CellStore)
///
/// Stores own their retry and timeout policy; whatever is left after that is
/// surfaced to the engine as a single "unavailable" condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the operation
    #[error("Cell store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Create a new "unavailable" error with a reason
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        StoreError::Unavailable(reason.into())
    }
}
