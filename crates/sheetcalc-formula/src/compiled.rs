//! Parsed formulas ready for repeated evaluation

use crate::ast::{FormulaExpr, CUSTOM_KIND};
use crate::dependency::{extract_references, Reference};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{EvalPath, Evaluator, ReferenceResolver};
use crate::names::DefinedNames;
use crate::parser::parse_formula_with;
use sheetcalc_core::{ErrorKind, SheetId, Value};
use tracing::warn;

/// A formula parsed once, with its references and kind
///
/// Text that fails to parse still compiles: it has no references and always
/// evaluates to `#ERROR!`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFormula {
    source: String,
    expr: Result<FormulaExpr, String>,
    references: Vec<Reference>,
    kind: String,
}

impl CompiledFormula {
    /// Parse formula text, substituting defined names
    pub fn compile(source: &str, names: &DefinedNames) -> Self {
        match parse_formula_with(source, names) {
            Ok(expr) => Self {
                source: source.to_string(),
                references: extract_references(&expr),
                kind: expr.kind().to_string(),
                expr: Ok(expr),
            },
            Err(e) => {
                let message = match e {
                    FormulaError::Parse(message) => message,
                    other => other.to_string(),
                };
                warn!(formula = %source, error = %message, "formula does not parse");
                Self {
                    source: source.to_string(),
                    expr: Err(message),
                    references: Vec::new(),
                    kind: CUSTOM_KIND.to_string(),
                }
            }
        }
    }

    /// The formula text as given
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> Option<&FormulaExpr> {
        self.expr.as_ref().ok()
    }

    /// Why the formula did not parse
    pub fn parse_error(&self) -> Option<&str> {
        self.expr.as_ref().err().map(String::as_str)
    }

    pub fn is_valid(&self) -> bool {
        self.expr.is_ok()
    }

    /// References in first-occurrence order
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// See [`FormulaExpr::kind`]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Evaluate for a cell on `sheet`, nested under `path`
    pub fn evaluate(
        &self,
        resolver: &mut dyn ReferenceResolver,
        sheet: SheetId,
        path: EvalPath<'_>,
    ) -> FormulaResult<Value> {
        match &self.expr {
            Ok(expr) => Evaluator::new(resolver, sheet, path).evaluate(expr),
            Err(_) => Ok(Value::Error(ErrorKind::FormulaSyntax)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::MapResolver;
    use pretty_assertions::assert_eq;
    use sheetcalc_core::{CellAddress, CellKey};

    #[test]
    fn test_compile_valid() {
        let compiled = CompiledFormula::compile("=VLOOKUP(A1,Prices,2,FALSE)", &DefinedNames::new().with("prices", "B1:C9"));
        assert!(compiled.is_valid());
        assert_eq!(compiled.kind(), "VLOOKUP");
        assert_eq!(compiled.references().len(), 2);
        assert_eq!(compiled.source(), "=VLOOKUP(A1,Prices,2,FALSE)");
    }

    #[test]
    fn test_compile_invalid() {
        let compiled = CompiledFormula::compile("=SUM(1,", &DefinedNames::new());
        assert!(!compiled.is_valid());
        assert!(compiled.parse_error().is_some());
        assert!(compiled.references().is_empty());
        assert_eq!(compiled.kind(), CUSTOM_KIND);

        let mut cells = MapResolver::new();
        assert_eq!(
            compiled.evaluate(&mut cells, SheetId(1), EvalPath::root()).unwrap(),
            Value::Error(ErrorKind::FormulaSyntax)
        );
    }

    #[test]
    fn test_evaluate() {
        let sheet = SheetId(1);
        let mut cells = MapResolver::new();
        cells.set(CellKey::new(sheet, CellAddress::parse("A1").unwrap()), 4.0);

        let compiled = CompiledFormula::compile("=A1*A1", &DefinedNames::new());
        assert_eq!(compiled.kind(), CUSTOM_KIND);
        assert_eq!(
            compiled.evaluate(&mut cells, sheet, EvalPath::root()).unwrap(),
            Value::Number(16.0)
        );
    }
}
