//! Recalculation requests

use sheetcalc_core::{CellAddress, CellKey, SheetId, Value};

/// New contents for a cell
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellInput {
    /// A literal value; [`Value::Empty`] clears the cell
    Value(Value),
    /// Formula text, including the leading `=`
    Formula(String),
}

impl CellInput {
    /// Interpret text the way a user typed it
    ///
    /// Text starting with `=` is a formula; anything else is a literal,
    /// classified by [`Value::parse_literal`].
    pub fn parse(text: &str) -> Self {
        if text.starts_with('=') {
            CellInput::Formula(text.to_string())
        } else {
            CellInput::Value(Value::parse_literal(text))
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellInput::Formula(_))
    }
}

impl From<Value> for CellInput {
    fn from(value: Value) -> Self {
        CellInput::Value(value)
    }
}

impl From<&str> for CellInput {
    fn from(text: &str) -> Self {
        CellInput::parse(text)
    }
}

/// A single-cell edit followed by recalculation of its dependents
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecalcRequest {
    pub sheet: SheetId,
    pub address: CellAddress,
    pub input: CellInput,
}

impl RecalcRequest {
    pub fn new(sheet: SheetId, address: CellAddress, input: impl Into<CellInput>) -> Self {
        Self {
            sheet,
            address,
            input: input.into(),
        }
    }

    /// The edited cell
    pub fn key(&self) -> CellKey {
        CellKey::new(self.sheet, self.address)
    }
}

/// Recalculation seeded with several cells at once, without editing any
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchRequest {
    pub sheet: SheetId,
    pub addresses: Vec<CellAddress>,
}

impl BatchRequest {
    pub fn new(sheet: SheetId, addresses: impl IntoIterator<Item = CellAddress>) -> Self {
        Self {
            sheet,
            addresses: addresses.into_iter().collect(),
        }
    }

    /// The seed cells
    pub fn keys(&self) -> Vec<CellKey> {
        self.addresses
            .iter()
            .map(|addr| CellKey::new(self.sheet, *addr))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetcalc_core::ErrorKind;

    #[test]
    fn test_cell_input_parse() {
        assert_eq!(CellInput::parse("=A1+1"), CellInput::Formula("=A1+1".into()));
        assert!(CellInput::parse("=").is_formula());
        assert_eq!(CellInput::parse("42"), CellInput::Value(Value::Number(42.0)));
        assert_eq!(CellInput::parse("true"), CellInput::Value(Value::Boolean(true)));
        assert_eq!(CellInput::parse("#N/A"), CellInput::Value(Value::Error(ErrorKind::NotAvailable)));
        assert_eq!(CellInput::parse(""), CellInput::Value(Value::Empty));
        assert_eq!(CellInput::parse(" =1"), CellInput::Value(Value::text(" =1")));
    }

    #[test]
    fn test_batch_keys() {
        let batch = BatchRequest::new(
            SheetId(3),
            [CellAddress::parse("A1").unwrap(), CellAddress::parse("B2").unwrap()],
        );
        assert_eq!(
            batch.keys(),
            vec![
                CellKey::new(SheetId(3), CellAddress::parse("A1").unwrap()),
                CellKey::new(SheetId(3), CellAddress::parse("B2").unwrap()),
            ]
        );
    }
}
