//! Cell contents as held by the backing store

use super::key::{CellKey, SheetRange};
use super::value::{ErrorKind, Value, ValueType};

/// Contents of a single cell: either a literal or a formula, never both
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cell {
    /// A value typed directly into the cell
    Literal(Value),
    /// A formula with its last computed result
    Formula(FormulaCell),
}

impl Cell {
    /// The value other formulas see when they reference this cell
    pub fn value(&self) -> &Value {
        match self {
            Cell::Literal(v) => v,
            Cell::Formula(f) => &f.result,
        }
    }

    /// Get the formula text if this is a formula cell
    pub fn formula_text(&self) -> Option<&str> {
        match self {
            Cell::Formula(f) => Some(&f.source),
            Cell::Literal(_) => None,
        }
    }

    /// Check if the cell contains a formula
    pub fn is_formula(&self) -> bool {
        matches!(self, Cell::Formula(_))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Cell::Literal(v) => v.value_type(),
            Cell::Formula(_) => ValueType::Formula,
        }
    }
}

/// A formula cell
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormulaCell {
    /// Formula source text, including the leading `=`
    pub source: String,
    /// Last computed result
    pub result: Value,
    /// Error state of the last computation
    pub error: Option<ErrorKind>,
    /// References extracted from the source, resolved to sheets
    pub references: Vec<SheetRange>,
}

impl FormulaCell {
    /// A formula that has not been computed yet
    pub fn new<S: Into<String>>(source: S) -> Self {
        Self {
            source: source.into(),
            result: Value::Empty,
            error: None,
            references: Vec::new(),
        }
    }

    /// Set the computed result, deriving the error state from it
    pub fn with_result(mut self, result: Value) -> Self {
        self.error = result.error();
        self.result = result;
        self
    }

    pub fn with_references(mut self, references: Vec<SheetRange>) -> Self {
        self.references = references;
        self
    }
}

/// A cell as read from or written to the store
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRecord {
    pub key: CellKey,
    pub cell: Cell,
}

impl CellRecord {
    pub fn new(key: CellKey, cell: Cell) -> Self {
        Self { key, cell }
    }

    /// Record for a literal cell
    pub fn literal(key: CellKey, value: impl Into<Value>) -> Self {
        Self::new(key, Cell::Literal(value.into()))
    }

    /// Record for a formula cell with no computed result yet
    pub fn formula(key: CellKey, source: impl Into<String>) -> Self {
        Self::new(key, Cell::Formula(FormulaCell::new(source)))
    }

    pub fn value(&self) -> &Value {
        self.cell.value()
    }

    /// Display text of the cell's value
    pub fn formatted_value(&self) -> String {
        self.cell.value().to_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CellAddress, SheetId};

    #[test]
    fn test_formula_cell_exposes_cached_result() {
        let key = CellKey::new(SheetId(1), CellAddress::parse("C3").unwrap());
        let cell = Cell::Formula(FormulaCell::new("=A1/0").with_result(ErrorKind::DivideByZero.into()));
        let record = CellRecord::new(key, cell);

        assert_eq!(record.value(), &Value::Error(ErrorKind::DivideByZero));
        assert_eq!(record.formatted_value(), "#DIV/0!");
        assert_eq!(record.cell.formula_text(), Some("=A1/0"));
        assert_eq!(record.cell.value_type(), ValueType::Formula);
        if let Cell::Formula(f) = &record.cell {
            assert_eq!(f.error, Some(ErrorKind::DivideByZero));
        }
    }

    #[test]
    fn test_literal_record() {
        let key = CellKey::new(SheetId(1), CellAddress::parse("A1").unwrap());
        let record = CellRecord::literal(key, 12.5);
        assert_eq!(record.formatted_value(), "12.5");
        assert_eq!(record.cell.value_type(), ValueType::Number);
        assert!(!record.cell.is_formula());
    }
}
