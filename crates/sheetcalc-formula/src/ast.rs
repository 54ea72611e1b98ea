//! Formula Abstract Syntax Tree types

use sheetcalc_core::{CellAddress, CellRange, ErrorKind};

/// Name reported for formulas whose outermost node is not a function call
pub const CUSTOM_KIND: &str = "CUSTOM";

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    Text(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal
    Error(ErrorKind),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference
    RangeRef(RangeReference),
    /// Bare name that matched no defined name
    NameRef(String),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },
}

impl FormulaExpr {
    /// Upper-cased name of the outermost function, or [`CUSTOM_KIND`]
    ///
    /// ```
    /// use sheetcalc_formula::parse_formula;
    ///
    /// assert_eq!(parse_formula("=vlookup(A1,B1:C9,2)").unwrap().kind(), "VLOOKUP");
    /// assert_eq!(parse_formula("=SUM(A1:A3)*2").unwrap().kind(), "CUSTOM");
    /// ```
    pub fn kind(&self) -> &str {
        match self {
            FormulaExpr::Function { name, .. } => name,
            _ => CUSTOM_KIND,
        }
    }

    /// Check if the expression is a literal (no references, no calls)
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            FormulaExpr::Number(_)
                | FormulaExpr::Text(_)
                | FormulaExpr::Boolean(_)
                | FormulaExpr::Error(_)
        )
    }
}

/// Cell reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub address: CellAddress,
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub range: CellRange,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,
}

impl BinaryOperator {
    /// Check if this operator yields a Boolean
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterEqual
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
}
