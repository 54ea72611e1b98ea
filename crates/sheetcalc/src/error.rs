//! Error types for recalculation requests

use sheetcalc_core::StoreError;
use thiserror::Error;

/// Result type alias for sheetcalc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a recalculation request
///
/// Broken formulas never end up here: they produce error values in the
/// report. Only failures that make every result untrustworthy do.
#[derive(Debug, Error)]
pub enum Error {
    /// The cell store could not be reached
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Check if this is a store outage
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Error::Store(StoreError::Unavailable(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_convert() {
        let err = Error::from(StoreError::unavailable("connection refused"));
        assert!(err.is_store_unavailable());
        assert_eq!(err.to_string(), "Cell store unavailable: connection refused");
    }
}
