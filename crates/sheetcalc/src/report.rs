//! What a recalculation request hands back

use sheetcalc_core::{CellKey, ErrorKind, SheetRange, Value};
use std::time::Duration;

/// The new state of one recalculated cell
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellOutcome {
    pub key: CellKey,
    pub value: Value,
    /// Display text of `value`
    pub formatted_value: String,
    pub error: Option<ErrorKind>,
}

impl CellOutcome {
    pub fn new(key: CellKey, value: Value) -> Self {
        Self {
            key,
            formatted_value: value.to_text(),
            error: value.error(),
            value,
        }
    }
}

/// Result of a recalculation request
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecalcReport {
    /// Evaluated cells, in evaluation order
    pub cells: Vec<CellOutcome>,
    /// Cells of the closure left untouched because the deadline passed
    pub not_evaluated: Vec<CellKey>,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl RecalcReport {
    /// Outcome for a cell, if it was evaluated
    pub fn get(&self, key: CellKey) -> Option<&CellOutcome> {
        self.cells.iter().find(|c| c.key == key)
    }

    /// New value of a cell, if it was evaluated
    pub fn value(&self, key: CellKey) -> Option<&Value> {
        self.get(key).map(|c| &c.value)
    }

    /// Evaluated cells in order
    pub fn keys(&self) -> Vec<CellKey> {
        self.cells.iter().map(|c| c.key).collect()
    }

    /// Number of evaluated cells holding an error
    pub fn error_count(&self) -> usize {
        self.cells.iter().filter(|c| c.error.is_some()).count()
    }

    /// Check if every cell of the closure was evaluated
    pub fn is_complete(&self) -> bool {
        !self.timed_out
    }
}

/// How a cell sits in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DependencyReport {
    pub cell: CellKey,
    /// References in the cell's formula (empty for literals)
    pub precedents: Vec<SheetRange>,
    /// Formulas reading the cell directly
    pub dependents: Vec<CellKey>,
    /// Every formula an edit of the cell recalculates, in evaluation order
    pub recalc_order: Vec<CellKey>,
    /// The circular reference through the cell, if there is one
    pub cycle: Option<Vec<CellKey>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetcalc_core::{CellAddress, SheetId};

    fn key(a1: &str) -> CellKey {
        CellKey::new(SheetId(1), CellAddress::parse(a1).unwrap())
    }

    #[test]
    fn test_outcome_formatting() {
        let outcome = CellOutcome::new(key("B1"), Value::Number(3.0));
        assert_eq!(outcome.formatted_value, "3");
        assert_eq!(outcome.error, None);

        let outcome = CellOutcome::new(key("C1"), Value::Error(ErrorKind::NotAvailable));
        assert_eq!(outcome.formatted_value, "#N/A");
        assert_eq!(outcome.error, Some(ErrorKind::NotAvailable));
    }

    #[test]
    fn test_report_lookup() {
        let report = RecalcReport {
            cells: vec![
                CellOutcome::new(key("B1"), Value::Number(2.0)),
                CellOutcome::new(key("C1"), Value::Error(ErrorKind::DivideByZero)),
            ],
            ..Default::default()
        };
        assert_eq!(report.value(key("B1")), Some(&Value::Number(2.0)));
        assert_eq!(report.value(key("D1")), None);
        assert_eq!(report.keys(), vec![key("B1"), key("C1")]);
        assert_eq!(report.error_count(), 1);
        assert!(report.is_complete());
    }
}
