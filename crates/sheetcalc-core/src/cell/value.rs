//! Cell value types

use lazy_regex::regex_is_match;
use std::cmp::Ordering;
use std::fmt;

/// A cell value, used uniformly by the store, the evaluator and the scheduler
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Numeric value
    Number(f64),
    /// Text value
    Text(String),
    /// Boolean value (TRUE/FALSE)
    Boolean(bool),
    /// Empty cell (no value)
    #[default]
    Empty,
    /// Error value (#N/A, #REF!, etc.)
    Error(ErrorKind),
}

impl Value {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        Value::Text(s.into())
    }

    /// Classify raw literal text the way it would be typed into a cell
    ///
    /// Blank text is `Empty`, `TRUE`/`FALSE` are booleans (any case), strict
    /// decimal syntax is a number, an error spelling is an error and anything
    /// else is kept as text.
    ///
    /// ```
    /// use sheetcalc_core::{ErrorKind, Value};
    ///
    /// assert_eq!(Value::parse_literal("42.5"), Value::Number(42.5));
    /// assert_eq!(Value::parse_literal("true"), Value::Boolean(true));
    /// assert_eq!(Value::parse_literal("#N/A"), Value::Error(ErrorKind::NotAvailable));
    /// assert_eq!(Value::parse_literal("inf"), Value::text("inf"));
    /// ```
    pub fn parse_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Empty;
        }
        if trimmed.eq_ignore_ascii_case("TRUE") {
            return Value::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("FALSE") {
            return Value::Boolean(false);
        }
        if let Some(n) = parse_number(trimmed) {
            return Value::Number(n);
        }
        if let Some(kind) = ErrorKind::from_str(trimmed) {
            return Value::Error(kind);
        }
        Value::Text(raw.to_string())
    }

    /// Check if the value is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Get the error kind if this is one
    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Numeric coercion used by arithmetic and scalar SUM arguments
    ///
    /// Booleans count as 1/0, empty as 0 and text only when it is strictly
    /// numeric. Errors never coerce.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(true) => Some(1.0),
            Value::Boolean(false) => Some(0.0),
            Value::Empty => Some(0.0),
            Value::Text(s) => parse_number(s.trim()),
            Value::Error(_) => None,
        }
    }

    /// Truthiness as used by IF
    ///
    /// Non-zero numbers and TRUE are true; text is true unless it is empty,
    /// `"FALSE"` (any case) or `"0"`. Empty cells and errors are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Boolean(b) => *b,
            Value::Text(s) => {
                let s = s.trim();
                !s.is_empty() && !s.eq_ignore_ascii_case("FALSE") && s != "0"
            }
            Value::Empty | Value::Error(_) => false,
        }
    }

    /// Text representation used by `&`, CONCATENATE and formatted output
    pub fn to_text(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Boolean(true) => "TRUE".to_string(),
            Value::Boolean(false) => "FALSE".to_string(),
            Value::Empty => String::new(),
            Value::Error(e) => e.as_str().to_string(),
        }
    }

    /// Type-aware equality used by VLOOKUP and MATCH
    ///
    /// Numbers compare numerically, text case-insensitively and booleans by
    /// value. Values of different variants, empties and errors are never equal.
    pub fn lookup_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a.to_lowercase() == b.to_lowercase(),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering used by approximate VLOOKUP and MATCH
    ///
    /// Defined only between two numbers or two texts (case-insensitive);
    /// every other pairing is unordered.
    pub fn lookup_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.to_lowercase().cmp(&b.to_lowercase())),
            _ => None,
        }
    }

    /// Classification of a literal value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Empty => ValueType::Null,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Number(_) => ValueType::Number,
            Value::Text(_) => ValueType::String,
            Value::Error(_) => ValueType::Error,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<ErrorKind> for Value {
    fn from(e: ErrorKind) -> Self {
        Value::Error(e)
    }
}

/// Strict decimal number syntax; rejects `inf`, `NaN`, hex and the like that
/// `f64::from_str` would accept.
fn parse_number(s: &str) -> Option<f64> {
    if regex_is_match!(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?$", s) {
        s.parse().ok()
    } else {
        None
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Spreadsheet error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// #ERROR! - Formula text could not be parsed
    FormulaSyntax,
    /// #REF! - Range, column or sheet resolution failure
    Ref,
    /// #N/A - Lookup or match found nothing
    NotAvailable,
    /// #VALUE! - Wrong argument count or type
    Value,
    /// #DIV/0! - Division by zero
    DivideByZero,
    /// #CIRCULAR! - Cell takes part in a reference cycle
    CircularReference,
}

impl ErrorKind {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FormulaSyntax => "#ERROR!",
            ErrorKind::Ref => "#REF!",
            ErrorKind::NotAvailable => "#N/A",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::DivideByZero => "#DIV/0!",
            ErrorKind::CircularReference => "#CIRCULAR!",
        }
    }

    /// Parse an error string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "#ERROR!" => Some(ErrorKind::FormulaSyntax),
            "#REF!" => Some(ErrorKind::Ref),
            "#N/A" => Some(ErrorKind::NotAvailable),
            "#VALUE!" => Some(ErrorKind::Value),
            "#DIV/0!" => Some(ErrorKind::DivideByZero),
            "#CIRCULAR!" => Some(ErrorKind::CircularReference),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse cell classification, as persisted next to a cell's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueType {
    Null,
    Boolean,
    Number,
    String,
    Error,
    Formula,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Error => "error",
            ValueType::Formula => "formula",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
