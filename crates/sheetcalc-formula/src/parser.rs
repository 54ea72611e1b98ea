//! Formula parser
//!
//! A recursive descent parser with operator precedence. The argument separator
//! is chosen per formula: a `;` anywhere outside a string literal or quoted
//! sheet name switches the formula to the semicolon convention, where `,`
//! becomes the decimal mark.

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::names::DefinedNames;
use sheetcalc_core::{CellAddress, CellRange, ErrorKind};

/// Nesting limit for parentheses and function calls
const MAX_DEPTH: usize = 128;

/// Most operator and function nodes in one formula
///
/// Every such node can add a level to the tree, and evaluating the tree
/// recurses once per level.
const MAX_NODES: usize = 1024;

/// Longest accepted formula text, in characters (Excel limit)
const MAX_LENGTH: usize = 8192;

/// Parse a formula string into an AST
///
/// The leading `=` is optional.
///
/// # Example
/// ```rust
/// use sheetcalc_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0;\"Yes\";\"No\")").unwrap();
/// let ast = parse_formula("VLOOKUP(A2,'Price List'!$A$1:$C$50,3,FALSE)").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    parse_formula_with(formula, &DefinedNames::default())
}

/// Parse a formula, substituting defined names
pub fn parse_formula_with(formula: &str, names: &DefinedNames) -> FormulaResult<FormulaExpr> {
    let formula = formula.trim();
    let formula = formula.strip_prefix('=').unwrap_or(formula);
    if formula.trim().is_empty() {
        return Err(FormulaError::Parse("Empty formula".into()));
    }
    if formula.chars().count() > MAX_LENGTH {
        return Err(FormulaError::Parse(format!(
            "Formula exceeds {MAX_LENGTH} characters"
        )));
    }

    let mut parser = FormulaParser::new(formula, names)?;
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    if parser.current_token != Token::Eof {
        return Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression",
            parser.current_token
        )));
    }

    Ok(expr)
}

/// Pick the argument separator for a formula
fn detect_separator(input: &str) -> char {
    let mut in_string = false;
    let mut in_sheet_name = false;
    for c in input.chars() {
        match c {
            '"' if !in_sheet_name => in_string = !in_string,
            '\'' if !in_string => in_sheet_name = !in_sheet_name,
            ';' if !in_string && !in_sheet_name => return ';',
            _ => {}
        }
    }
    ','
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(ErrorKind),

    // Identifiers and references
    Identifier(String), // Function name or defined name
    CellRef(CellAddress),
    SheetRef(String), // Sheet prefix like Sheet1! or 'My Sheet'!

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Separator,

    // Delimiters
    LeftParen,
    RightParen,

    // End of input
    Eof,
}

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    separator: char,
    names: &'a DefinedNames,
    current_token: Token,
    depth: usize,
    nodes: usize,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str, names: &'a DefinedNames) -> FormulaResult<Self> {
        let mut parser = Self {
            input,
            pos: 0,
            separator: detect_separator(input),
            names,
            current_token: Token::Eof,
            depth: 0,
            nodes: 0,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> FormulaResult<()> {
        self.current_token = self.scan_token()?;
        Ok(())
    }

    fn scan_token(&mut self) -> FormulaResult<Token> {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Ok(Token::Eof);
        };

        if c == self.separator {
            self.advance();
            return Ok(Token::Separator);
        }

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '&' => Some(Token::Ampersand),
            ':' => Some(Token::Colon),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '=' => Some(Token::Equal),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        // Two-character operators
        if c == '<' {
            self.advance();
            return Ok(match self.peek_char() {
                Some('=') => {
                    self.advance();
                    Token::LessEqual
                }
                Some('>') => {
                    self.advance();
                    Token::NotEqual
                }
                _ => Token::LessThan,
            });
        }

        if c == '>' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Ok(Token::GreaterEqual);
            }
            return Ok(Token::GreaterThan);
        }

        if c == '"' {
            return self.scan_string();
        }

        if c == '\'' {
            return self.scan_quoted_sheet();
        }

        if c == '#' {
            return self.scan_error();
        }

        if c.is_ascii_digit() || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            return self.scan_identifier_or_ref();
        }

        Err(FormulaError::Parse(format!(
            "Unexpected character '{}' at position {}",
            c, self.pos
        )))
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Ok(Token::Text(s));
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => return Err(FormulaError::Parse("Unterminated string literal".into())),
            }
        }
    }

    fn scan_quoted_sheet(&mut self) -> FormulaResult<Token> {
        self.advance(); // Skip opening quote

        let mut name = String::new();
        loop {
            match self.peek_char() {
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    name.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
                None => return Err(FormulaError::Parse("Unterminated sheet name".into())),
            }
        }

        if self.peek_char() != Some('!') {
            return Err(FormulaError::Parse(format!(
                "Expected '!' after sheet name '{}'",
                name
            )));
        }
        self.advance();
        Ok(Token::SheetRef(name))
    }

    fn scan_error(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // Skip '#'
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || matches!(c, '!' | '/' | '?'))
        {
            self.advance();
        }
        let text = &self.input[start..self.pos];
        ErrorKind::from_str(text)
            .map(Token::Error)
            .ok_or_else(|| FormulaError::Parse(format!("Unknown error literal '{}'", text)))
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let mut digits = String::new();
        self.take_digits(&mut digits);

        // Decimal part; with ';' separators a ',' between digits is the decimal mark
        let decimal = match self.peek_char() {
            Some('.') => true,
            Some(',') => {
                self.separator == ';' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())
            }
            _ => false,
        };
        if decimal {
            self.advance();
            digits.push('.');
            self.take_digits(&mut digits);
        }

        // Exponent part, only when digits actually follow
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let signed = matches!(self.peek_char_at(1), Some('+' | '-'));
            let first_digit = if signed { 2 } else { 1 };
            if self
                .peek_char_at(first_digit)
                .map_or(false, |c| c.is_ascii_digit())
            {
                digits.push('e');
                self.advance();
                if signed {
                    digits.extend(self.peek_char());
                    self.advance();
                }
                self.take_digits(&mut digits);
            }
        }

        digits
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| FormulaError::Parse(format!("Invalid number '{}'", digits)))
    }

    fn take_digits(&mut self, out: &mut String) {
        while let Some(c) = self.peek_char().filter(|c| c.is_ascii_digit()) {
            out.push(c);
            self.advance();
        }
    }

    fn scan_identifier_or_ref(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];

        // Unquoted sheet prefix
        if self.peek_char() == Some('!') {
            self.advance();
            return Ok(Token::SheetRef(text.to_string()));
        }

        // A following '(' always makes this a function call (LOG10(...) is not a cell)
        if self.peek_char() == Some('(') {
            return Ok(Token::Identifier(text.to_string()));
        }

        if text.eq_ignore_ascii_case("TRUE") {
            return Ok(Token::Boolean(true));
        }
        if text.eq_ignore_ascii_case("FALSE") {
            return Ok(Token::Boolean(false));
        }

        if Self::is_cell_reference(text) {
            if let Ok(addr) = CellAddress::parse(text) {
                return Ok(Token::CellRef(addr));
            }
        }

        Ok(Token::Identifier(text.to_string()))
    }

    /// `[$]letters[$]digits`
    fn is_cell_reference(text: &str) -> bool {
        let rest = text.strip_prefix('$').unwrap_or(text);
        let letters = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        if letters == 0 {
            return false;
        }
        let rest = &rest[letters..];
        let rest = rest.strip_prefix('$').unwrap_or(rest);
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn consume(&mut self) -> FormulaResult<Token> {
        let token = std::mem::replace(&mut self.current_token, Token::Eof);
        self.advance_token()?;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if &self.current_token == expected {
            self.consume()?;
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected, self.current_token
            )))
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Unary: -, +
    // 6. Range: :
    // 7. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::Parse("Formula is nested too deeply".into()));
        }
        let expr = self.parse_comparison();
        self.depth -= 1;
        expr
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_token {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume()?;
            self.add_node()?;
            let right = self.parse_concatenation()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while self.current_token == Token::Ampersand {
            self.consume()?;
            self.add_node()?;
            let right = self.parse_additive()?;
            left = binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume()?;
            self.add_node()?;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume()?;
            self.add_node()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        // Prefix signs; '+' is a no-op
        let mut negations = 0usize;
        loop {
            match self.current_token {
                Token::Minus => {
                    self.add_node()?;
                    negations += 1;
                }
                Token::Plus => {}
                _ => break,
            }
            self.consume()?;
        }

        let mut expr = self.parse_range()?;
        for _ in 0..negations {
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(expr),
            };
        }
        Ok(expr)
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;

        if self.current_token != Token::Colon {
            return Ok(left);
        }
        self.consume()?;
        let right = self.parse_primary()?;

        match (left, right) {
            (FormulaExpr::CellRef(start), FormulaExpr::CellRef(end)) => {
                // The end of `Sheet1!A1:B2` inherits the start's sheet
                let sheet = match (start.sheet, end.sheet) {
                    (Some(a), Some(b)) if !a.eq_ignore_ascii_case(&b) => {
                        return Err(FormulaError::Parse(
                            "Range references must be on the same sheet".into(),
                        ))
                    }
                    (a, b) => a.or(b),
                };
                Ok(FormulaExpr::RangeRef(RangeReference {
                    sheet,
                    range: CellRange::new(start.address, end.address),
                }))
            }
            _ => Err(FormulaError::Parse(
                "Both ends of a range must be cell references".into(),
            )),
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.consume()? {
            Token::Number(n) => Ok(FormulaExpr::Number(n)),
            Token::Text(s) => Ok(FormulaExpr::Text(s)),
            Token::Boolean(b) => Ok(FormulaExpr::Boolean(b)),
            Token::Error(e) => Ok(FormulaExpr::Error(e)),

            Token::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::SheetRef(sheet) => match self.consume()? {
                Token::CellRef(address) => Ok(FormulaExpr::CellRef(CellReference {
                    sheet: Some(sheet),
                    address,
                })),
                other => Err(FormulaError::Parse(format!(
                    "Expected cell reference after '{}!', got {:?}",
                    sheet, other
                ))),
            },

            Token::CellRef(address) => Ok(FormulaExpr::CellRef(CellReference {
                sheet: None,
                address,
            })),

            Token::Identifier(name) => {
                if self.current_token == Token::LeftParen {
                    self.parse_function_call(name)
                } else if let Some(reference) = self.names.get(&name) {
                    parse_formula(reference).map_err(|e| {
                        FormulaError::Parse(format!("In defined name '{}': {}", name, e))
                    })
                } else {
                    Ok(FormulaExpr::NameRef(name))
                }
            }

            token => Err(FormulaError::Parse(format!("Unexpected token: {:?}", token))),
        }
    }

    fn add_node(&mut self) -> FormulaResult<()> {
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(FormulaError::Parse(format!(
                "Formula has more than {MAX_NODES} operators"
            )));
        }
        Ok(())
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftParen)?;
        self.add_node()?;
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::Parse("Formula is nested too deeply".into()));
        }

        let mut args = Vec::new();
        if self.current_token != Token::RightParen {
            args.push(self.parse_expression()?);

            while self.current_token == Token::Separator {
                self.consume()?;
                args.push(self.parse_expression()?);
            }
        }

        self.expect(&Token::RightParen)?;
        self.depth -= 1;

        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }
}

fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
