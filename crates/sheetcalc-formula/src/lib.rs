//! # sheetcalc-formula
//!
//! Formula parser, evaluator and dependency graph for sheetcalc.
//!
//! This crate provides:
//! - Formula parsing (text → AST), with either `,` or `;` argument separators
//! - Formula evaluation (AST → value) against any [`ReferenceResolver`]
//! - Built-in functions: SUM, IF, IFERROR, VLOOKUP, MATCH, CONCATENATE
//! - Reference extraction and a reverse-edge [`DependencyGraph`]
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc_core::{CellAddress, CellKey, SheetId, Value};
//! use sheetcalc_formula::{evaluate, parse_formula, MapResolver};
//!
//! let sheet = SheetId(1);
//! let mut cells = MapResolver::new();
//! cells.set(CellKey::new(sheet, CellAddress::parse("A1").unwrap()), 0.0);
//!
//! let ast = parse_formula("=IFERROR(1/A1,-1)").unwrap();
//! assert_eq!(evaluate(&ast, &mut cells, sheet).unwrap(), Value::Number(-1.0));
//! ```

pub mod ast;
pub mod compiled;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod names;
pub mod parser;

pub use ast::{
    BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator, CUSTOM_KIND,
};
pub use compiled::CompiledFormula;
pub use dependency::{extract_references, DependencyGraph, Reference, ReferenceTarget};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{
    evaluate, to_number, Arg, EvalPath, Evaluator, MapResolver, RangeValues, ReferenceResolver,
};
pub use names::DefinedNames;
pub use parser::{parse_formula, parse_formula_with};
