//! Formula evaluator
//!
//! Evaluates formula ASTs to produce values. References are answered by a
//! [`ReferenceResolver`], which is free to evaluate the referenced cell on
//! demand; the [`EvalPath`] handed along with every lookup lists the formula
//! cells currently being evaluated, innermost first, so a resolver can tell a
//! circular reference from an ordinary one without any shared mutable stack.

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, UnaryOperator};
use crate::error::FormulaResult;
use crate::functions::registry;
use ahash::AHashMap;
use sheetcalc_core::{CellAddress, CellKey, CellRange, ErrorKind, SheetId, SheetRange, Value};
use std::cmp::Ordering;
use tracing::debug;

static EMPTY: Value = Value::Empty;

/// Source of cell values for the evaluator
pub trait ReferenceResolver {
    /// Current value of a single cell
    fn cell_value(&mut self, key: CellKey, path: &EvalPath<'_>) -> FormulaResult<Value>;

    /// Current values of every non-empty cell in a range
    fn range_values(&mut self, range: SheetRange, path: &EvalPath<'_>) -> FormulaResult<RangeValues>;

    /// Resolve a sheet name as seen from `from` (names are workbook-scoped)
    fn sheet_id(&mut self, from: SheetId, name: &str) -> FormulaResult<Option<SheetId>>;
}

/// The chain of formula cells under evaluation, innermost first
///
/// Each nested evaluation pushes a new link that borrows its parent, so the
/// path unwinds by itself on every exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalPath<'a> {
    head: Option<CellKey>,
    parent: Option<&'a EvalPath<'a>>,
}

impl<'a> EvalPath<'a> {
    /// An empty path
    pub fn root() -> Self {
        Self::default()
    }

    /// A path extended by `key`
    pub fn push(&self, key: CellKey) -> EvalPath<'_> {
        EvalPath {
            head: Some(key),
            parent: Some(self),
        }
    }

    /// The innermost cell
    pub fn current(&self) -> Option<CellKey> {
        self.iter().next()
    }

    pub fn contains(&self, key: &CellKey) -> bool {
        self.iter().any(|k| k == *key)
    }

    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    /// Cells on the path, innermost first
    pub fn iter(&self) -> EvalPathIter<'_> {
        EvalPathIter { next: Some(self) }
    }
}

/// Iterator over an [`EvalPath`]
pub struct EvalPathIter<'a> {
    next: Option<&'a EvalPath<'a>>,
}

impl<'a> Iterator for EvalPathIter<'a> {
    type Item = CellKey;

    fn next(&mut self) -> Option<CellKey> {
        loop {
            let node = self.next?;
            self.next = node.parent;
            if let Some(key) = node.head {
                return Some(key);
            }
        }
    }
}

/// Values of the non-empty cells of a range, in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct RangeValues {
    range: CellRange,
    cells: Vec<(CellAddress, Value)>,
}

impl RangeValues {
    /// Build from arbitrary cells; empties and cells outside the range are dropped
    pub fn new(range: CellRange, cells: impl IntoIterator<Item = (CellAddress, Value)>) -> Self {
        let mut cells: Vec<_> = cells
            .into_iter()
            .filter(|(addr, value)| range.contains(addr) && !value.is_empty())
            .collect();
        cells.sort_by_key(|(addr, _)| *addr);
        cells.dedup_by_key(|(addr, _)| *addr);
        Self { range, cells }
    }

    pub fn range(&self) -> CellRange {
        self.range
    }

    /// Number of columns in the range
    pub fn width(&self) -> u32 {
        self.range.col_count()
    }

    /// Value at an address (`Empty` when absent)
    pub fn get(&self, addr: CellAddress) -> &Value {
        self.cells
            .binary_search_by_key(&addr, |(a, _)| *a)
            .map(|i| &self.cells[i].1)
            .unwrap_or(&EMPTY)
    }

    /// Non-empty cells, row-major
    pub fn iter(&self) -> impl Iterator<Item = (CellAddress, &Value)> + '_ {
        self.cells.iter().map(|(a, v)| (*a, v))
    }

    /// Non-empty cells of one absolute column, top to bottom
    pub fn column(&self, col: u32) -> impl Iterator<Item = (CellAddress, &Value)> + '_ {
        self.iter().filter(move |(a, _)| a.col == col)
    }

    /// 1-based row-major position of an address within the range
    pub fn position(&self, addr: CellAddress) -> Option<u64> {
        addr.index_in(&self.range).map(|i| i + 1)
    }
}

/// A function argument as seen by functions that accept ranges
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Scalar(Value),
    Range(RangeValues),
    /// A reference to a sheet that does not exist
    Unresolved,
}

/// Formula evaluator bound to a resolver, a current sheet and a path
pub struct Evaluator<'r, 'p> {
    resolver: &'r mut dyn ReferenceResolver,
    sheet: SheetId,
    path: EvalPath<'p>,
}

impl<'r, 'p> Evaluator<'r, 'p> {
    pub fn new(resolver: &'r mut dyn ReferenceResolver, sheet: SheetId, path: EvalPath<'p>) -> Self {
        Self {
            resolver,
            sheet,
            path,
        }
    }

    /// Sheet that unqualified references point at
    pub fn sheet(&self) -> SheetId {
        self.sheet
    }

    /// Evaluate an expression to a single value
    ///
    /// A multi-cell range in scalar position is `#VALUE!`.
    pub fn evaluate(&mut self, expr: &FormulaExpr) -> FormulaResult<Value> {
        match expr {
            // === Literals ===
            FormulaExpr::Number(n) => Ok(Value::Number(*n)),
            FormulaExpr::Text(s) => Ok(Value::Text(s.clone())),
            FormulaExpr::Boolean(b) => Ok(Value::Boolean(*b)),
            FormulaExpr::Error(e) => Ok(Value::Error(*e)),

            // === References ===
            FormulaExpr::CellRef(cell_ref) => match self.resolve_cell(cell_ref)? {
                Some(key) => self.resolver.cell_value(key, &self.path),
                None => Ok(Value::Error(ErrorKind::Ref)),
            },

            FormulaExpr::RangeRef(range_ref) => {
                match self.resolve_sheet(range_ref.sheet.as_deref())? {
                    None => Ok(Value::Error(ErrorKind::Ref)),
                    Some(sheet) if range_ref.range.is_single() => self
                        .resolver
                        .cell_value(CellKey::new(sheet, range_ref.range.start), &self.path),
                    Some(_) => Ok(Value::Error(ErrorKind::Value)),
                }
            }

            FormulaExpr::NameRef(name) => {
                debug!(name = %name, "undefined name");
                Ok(Value::Error(ErrorKind::Ref))
            }

            // === Operators ===
            FormulaExpr::BinaryOp { op, left, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(binary_op(*op, &left, &right))
            }

            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand,
            } => {
                let value = self.evaluate(operand)?;
                Ok(match to_number(&value) {
                    Ok(n) => Value::Number(-n),
                    Err(e) => Value::Error(e),
                })
            }

            // === Functions ===
            FormulaExpr::Function { name, args } => self.call(name, args),
        }
    }

    /// Evaluate an argument, keeping ranges intact
    pub fn evaluate_arg(&mut self, expr: &FormulaExpr) -> FormulaResult<Arg> {
        match expr {
            FormulaExpr::CellRef(cell_ref) => match self.resolve_cell(cell_ref)? {
                Some(key) => Ok(Arg::Scalar(self.resolver.cell_value(key, &self.path)?)),
                None => Ok(Arg::Unresolved),
            },
            FormulaExpr::RangeRef(range_ref) => {
                match self.resolve_sheet(range_ref.sheet.as_deref())? {
                    Some(sheet) => Ok(Arg::Range(
                        self.resolver
                            .range_values(SheetRange::new(sheet, range_ref.range), &self.path)?,
                    )),
                    None => Ok(Arg::Unresolved),
                }
            }
            other => Ok(Arg::Scalar(self.evaluate(other)?)),
        }
    }

    /// Evaluate an argument that must denote a range
    ///
    /// A single cell reference is a 1×1 range. Anything else yields the error
    /// it evaluated to, or `#VALUE!`; an unknown sheet yields `#REF!`.
    pub fn evaluate_range(
        &mut self,
        expr: &FormulaExpr,
    ) -> FormulaResult<std::result::Result<RangeValues, ErrorKind>> {
        let (sheet, range) = match expr {
            FormulaExpr::CellRef(r) => (r.sheet.as_deref(), CellRange::single(r.address)),
            FormulaExpr::RangeRef(r) => (r.sheet.as_deref(), r.range),
            other => {
                let value = self.evaluate(other)?;
                return Ok(Err(value.error().unwrap_or(ErrorKind::Value)));
            }
        };
        match self.resolve_sheet(sheet)? {
            Some(sheet) => Ok(Ok(self
                .resolver
                .range_values(SheetRange::new(sheet, range), &self.path)?)),
            None => Ok(Err(ErrorKind::Ref)),
        }
    }

    fn call(&mut self, name: &str, args: &[FormulaExpr]) -> FormulaResult<Value> {
        let Some(func) = registry().get(name) else {
            debug!(function = %name, "unknown function");
            return Ok(Value::Error(ErrorKind::FormulaSyntax));
        };

        if !func.accepts(args.len()) {
            debug!(function = %name, args = args.len(), "wrong number of arguments");
            return Ok(Value::Error(ErrorKind::Value));
        }

        (func.implementation)(args, self)
    }

    fn resolve_cell(&mut self, cell_ref: &CellReference) -> FormulaResult<Option<CellKey>> {
        Ok(self
            .resolve_sheet(cell_ref.sheet.as_deref())?
            .map(|sheet| CellKey::new(sheet, cell_ref.address)))
    }

    fn resolve_sheet(&mut self, name: Option<&str>) -> FormulaResult<Option<SheetId>> {
        match name {
            None => Ok(Some(self.sheet)),
            Some(name) => self.resolver.sheet_id(self.sheet, name),
        }
    }
}

/// Evaluate an expression at the top level for a cell on `sheet`
pub fn evaluate(
    expr: &FormulaExpr,
    resolver: &mut dyn ReferenceResolver,
    sheet: SheetId,
) -> FormulaResult<Value> {
    Evaluator::new(resolver, sheet, EvalPath::root()).evaluate(expr)
}

/// Numeric coercion for operators: `#VALUE!` for non-numeric text
pub fn to_number(value: &Value) -> std::result::Result<f64, ErrorKind> {
    match value {
        Value::Error(e) => Err(*e),
        v => v.as_number().ok_or(ErrorKind::Value),
    }
}

/// Apply a binary operator to two evaluated operands
fn binary_op(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    // Propagate errors, left operand first
    if let Some(e) = left.error().or_else(|| right.error()) {
        return Value::Error(e);
    }

    if op == BinaryOperator::Concat {
        return Value::Text(left.to_text() + &right.to_text());
    }

    if op.is_comparison() {
        let ord = compare_values(left, right);
        return Value::Boolean(match op {
            BinaryOperator::Equal => ord == Ordering::Equal,
            BinaryOperator::NotEqual => ord != Ordering::Equal,
            BinaryOperator::LessThan => ord == Ordering::Less,
            BinaryOperator::LessEqual => ord != Ordering::Greater,
            BinaryOperator::GreaterThan => ord == Ordering::Greater,
            _ => ord != Ordering::Less,
        });
    }

    let (l, r) = match (to_number(left), to_number(right)) {
        (Ok(l), Ok(r)) => (l, r),
        (Err(e), _) | (_, Err(e)) => return Value::Error(e),
    };

    let result = match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide if r == 0.0 => return Value::Error(ErrorKind::DivideByZero),
        _ => l / r,
    };
    finite(result)
}

/// `#VALUE!` for results that overflowed
pub(crate) fn finite(n: f64) -> Value {
    if n.is_finite() {
        Value::Number(n)
    } else {
        Value::Error(ErrorKind::Value)
    }
}

/// Compare two non-error values for the relational operators
///
/// An empty operand stands for the zero value of the other operand's type.
/// Across types, numbers sort before text and text before booleans; text
/// compares case-insensitively.
fn compare_values(left: &Value, right: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Number(_) | Value::Empty => 0,
            Value::Text(_) => 1,
            Value::Boolean(_) => 2,
            Value::Error(_) => 3,
        }
    }

    fn zero_like(v: &Value) -> Value {
        match v {
            Value::Text(_) => Value::Text(String::new()),
            Value::Boolean(_) => Value::Boolean(false),
            _ => Value::Number(0.0),
        }
    }

    let left = if left.is_empty() { zero_like(right) } else { left.clone() };
    let right = if right.is_empty() { zero_like(&left) } else { right.clone() };

    match (&left, &right) {
        (Value::Number(l), Value::Number(r)) => l.partial_cmp(r).unwrap_or(Ordering::Equal),
        (Value::Text(l), Value::Text(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (Value::Boolean(l), Value::Boolean(r)) => l.cmp(r),
        (l, r) => rank(l).cmp(&rank(r)),
    }
}

/// A [`ReferenceResolver`] over a fixed map of values
///
/// Useful for evaluating formulas outside the engine and in tests.
///
/// ```
/// use sheetcalc_core::{CellAddress, CellKey, SheetId, Value};
/// use sheetcalc_formula::{evaluate, parse_formula, MapResolver};
///
/// let sheet = SheetId(1);
/// let mut cells = MapResolver::new().with_sheet("Sheet1", sheet);
/// cells.set(CellKey::new(sheet, CellAddress::parse("A1").unwrap()), 20.0);
///
/// let ast = parse_formula("=A1*2+1").unwrap();
/// assert_eq!(evaluate(&ast, &mut cells, sheet).unwrap(), Value::Number(41.0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    cells: AHashMap<CellKey, Value>,
    sheets: AHashMap<String, SheetId>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sheet name
    pub fn with_sheet(mut self, name: &str, sheet: SheetId) -> Self {
        self.sheets.insert(name.to_uppercase(), sheet);
        self
    }

    /// Set a cell value
    pub fn set(&mut self, key: CellKey, value: impl Into<Value>) {
        self.cells.insert(key, value.into());
    }
}

impl ReferenceResolver for MapResolver {
    fn cell_value(&mut self, key: CellKey, _path: &EvalPath<'_>) -> FormulaResult<Value> {
        Ok(self.cells.get(&key).cloned().unwrap_or_default())
    }

    fn range_values(&mut self, range: SheetRange, _path: &EvalPath<'_>) -> FormulaResult<RangeValues> {
        let cells = self
            .cells
            .iter()
            .filter(|(key, _)| range.contains(key))
            .map(|(key, value)| (key.addr, value.clone()));
        Ok(RangeValues::new(range.range, cells))
    }

    fn sheet_id(&mut self, _from: SheetId, name: &str) -> FormulaResult<Option<SheetId>> {
        Ok(self.sheets.get(&name.to_uppercase()).copied())
    }
}
