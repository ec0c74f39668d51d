//! Statement and expression parsing for source text.

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, space0, space1},
    combinator::recognize,
    error::ErrorKind,
    multi::many0,
    number::complete::double,
    sequence::pair,
    IResult, Parser,
};

use super::SourceError;

type Parsed<'a, T> = IResult<&'a str, T>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant number
    Number(f64),

    /// Variable reference
    Variable(String),

    /// Array literal `[a, b, ...]`
    Array(Vec<Expression>),

    /// Unary operations
    Unary(UnaryOp, Box<Expression>),

    /// Binary operations
    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Function call
    Call(String, Vec<Expression>),
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Power (`^` or `**`)
    Pow,
}

impl BinaryOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 4,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => " + ",
            BinaryOp::Sub => " - ",
            BinaryOp::Mul => " * ",
            BinaryOp::Div => " / ",
            BinaryOp::Pow => "^",
        }
    }
}

const NEG_PRECEDENCE: u8 = 3;
const ATOM_PRECEDENCE: u8 = 5;

/// One top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `def name(x, p1, ...) = body`
    Define {
        name: String,
        params: Vec<String>,
        body: Expression,
    },

    /// `name = value`
    Assign { name: String, value: Expression },
}

impl Statement {
    pub fn name(&self) -> &str {
        match self {
            Statement::Define { name, .. } | Statement::Assign { name, .. } => name,
        }
    }
}

impl Expression {
    fn precedence(&self) -> u8 {
        match self {
            Expression::Binary(op, _, _) => op.precedence(),
            Expression::Unary(..) => NEG_PRECEDENCE,
            _ => ATOM_PRECEDENCE,
        }
    }

    /// Parse a single expression.
    pub fn parse(input: &str) -> Result<Self, SourceError> {
        match expression(input) {
            Ok((rest, expr)) if rest.trim().is_empty() => Ok(expr),
            Ok((rest, _)) => Err(SourceError::Parse {
                line: 1,
                message: format!("unexpected trailing input '{}'", rest.trim()),
            }),
            Err(e) => Err(SourceError::Parse {
                line: 1,
                message: describe(e),
            }),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expression, parens: bool) -> fmt::Result {
    if parens {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

/// Prints source that parses back to the same tree. Numbers use the
/// shortest representation that round-trips exactly.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Number(n) => write!(f, "{:?}", n),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::Array(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Expression::Call(name, args) => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expression::Unary(UnaryOp::Neg, operand) => {
                write!(f, "-")?;
                write_operand(f, operand, operand.precedence() < NEG_PRECEDENCE)
            }
            Expression::Binary(op, left, right) => {
                let p = op.precedence();
                let (left_parens, right_parens) = match op {
                    BinaryOp::Pow => (
                        left.precedence() < ATOM_PRECEDENCE,
                        right.precedence() < NEG_PRECEDENCE,
                    ),
                    _ => (left.precedence() < p, right.precedence() <= p),
                };
                write_operand(f, left, left_parens)?;
                write!(f, "{}", op.symbol())?;
                write_operand(f, right, right_parens)
            }
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Define { name, params, body } => {
                write!(f, "def {}({}) = {}", name, params.join(", "), body)
            }
            Statement::Assign { name, value } => write!(f, "{} = {}", name, value),
        }
    }
}

/// Split source text into statements tagged with their 1-based line number.
///
/// `#` starts a comment running to the end of the line; `;` separates
/// statements on one line.
pub fn parse_program(text: &str) -> Result<Vec<(usize, Statement)>, SourceError> {
    let mut statements = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let code = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        for piece in code.split(';') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            statements.push((index + 1, parse_statement(piece, index + 1)?));
        }
    }
    Ok(statements)
}

fn parse_statement(input: &str, line: usize) -> Result<Statement, SourceError> {
    match statement(input) {
        Ok((rest, stmt)) if rest.trim().is_empty() => Ok(stmt),
        Ok((rest, _)) => Err(SourceError::Parse {
            line,
            message: format!("unexpected trailing input '{}'", rest.trim()),
        }),
        Err(e) => Err(SourceError::Parse {
            line,
            message: describe(e),
        }),
    }
}

fn describe(error: nom::Err<nom::error::Error<&str>>) -> String {
    match error {
        nom::Err::Incomplete(_) => "incomplete input".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let near = e.input.trim();
            if near.is_empty() {
                "unexpected end of statement".to_string()
            } else {
                format!("unexpected input near '{}'", near)
            }
        }
    }
}

// Parser functions using nom

fn ws(input: &str) -> Parsed<'_, &str> {
    space0(input)
}

fn symbol(input: &str, c: char) -> Parsed<'_, char> {
    let (input, _) = ws(input)?;
    char(c).parse(input)
}

fn keyword<'a>(input: &'a str, word: &'static str) -> Parsed<'a, &'a str> {
    let (input, _) = ws(input)?;
    let (input, matched) = tag(word).parse(input)?;
    let (input, _) = space1(input)?;
    Ok((input, matched))
}

/// Parse an identifier (variable or function name)
fn identifier(input: &str) -> Parsed<'_, String> {
    let (input, _) = ws(input)?;
    let (input, matched) = raw_identifier(input)?;
    Ok((input, matched.to_string()))
}

fn raw_identifier(input: &str) -> Parsed<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

fn float(input: &str) -> Parsed<'_, f64> {
    double(input)
}

/// Parse an unsigned number literal. Signs are handled as unary operators.
fn number(input: &str) -> Parsed<'_, Expression> {
    let (input, _) = ws(input)?;
    if !input.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return Err(nom::Err::Error(nom::error::Error::new(input, ErrorKind::Digit)));
    }
    let (input, value) = float(input)?;
    Ok((input, Expression::Number(value)))
}

/// Parse comma-separated expressions up to and including `close`.
fn arguments(input: &str, close: char) -> Parsed<'_, Vec<Expression>> {
    let mut args = Vec::new();
    if let Ok((rest, _)) = symbol(input, close) {
        return Ok((rest, args));
    }

    let (mut input, first) = expression(input)?;
    args.push(first);
    while let Ok((rest, _)) = symbol(input, ',') {
        let (rest, next) = expression(rest)?;
        args.push(next);
        input = rest;
    }

    let (input, _) = symbol(input, close)?;
    Ok((input, args))
}

/// Parse a primary expression (number, parenthesized expression, array
/// literal, function call or variable)
fn primary(input: &str) -> Parsed<'_, Expression> {
    let (input, _) = ws(input)?;

    if let Ok(result) = number(input) {
        return Ok(result);
    }

    if let Ok((rest, _)) = symbol(input, '(') {
        let (rest, inner) = expression(rest)?;
        let (rest, _) = symbol(rest, ')')?;
        return Ok((rest, inner));
    }

    if let Ok((rest, _)) = symbol(input, '[') {
        let (rest, items) = arguments(rest, ']')?;
        return Ok((rest, Expression::Array(items)));
    }

    let (input, name) = identifier(input)?;
    if let Ok((rest, _)) = symbol(input, '(') {
        let (rest, args) = arguments(rest, ')')?;
        return Ok((rest, Expression::Call(name, args)));
    }
    Ok((input, Expression::Variable(name)))
}

fn power_operator(input: &str) -> Parsed<'_, &str> {
    let (input, _) = ws(input)?;
    alt((tag("**"), tag("^"))).parse(input)
}

/// Parse a power expression. `^` binds tighter than unary minus on its left
/// and is right-associative, so `-2^2` is `-(2^2)` and `2^3^2` is `2^(3^2)`.
fn power(input: &str) -> Parsed<'_, Expression> {
    let (input, base) = primary(input)?;
    match power_operator(input) {
        Ok((rest, _)) => {
            let (rest, exponent) = unary(rest)?;
            Ok((
                rest,
                Expression::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
            ))
        }
        Err(_) => Ok((input, base)),
    }
}

/// Parse a unary expression (-expr, +expr)
fn unary(input: &str) -> Parsed<'_, Expression> {
    if let Ok((rest, _)) = symbol(input, '-') {
        let (rest, operand) = unary(rest)?;
        return Ok((rest, Expression::Unary(UnaryOp::Neg, Box::new(operand))));
    }
    if let Ok((rest, _)) = symbol(input, '+') {
        return unary(rest);
    }
    power(input)
}

/// Parse a multiplicative chain, folding to the left.
fn term(input: &str) -> Parsed<'_, Expression> {
    let (mut input, mut left) = unary(input)?;
    loop {
        let (rest, _) = ws(input)?;
        let op = if rest.starts_with('*') {
            BinaryOp::Mul
        } else if rest.starts_with('/') {
            BinaryOp::Div
        } else {
            break;
        };
        let (rest, right) = unary(&rest[1..])?;
        left = Expression::Binary(op, Box::new(left), Box::new(right));
        input = rest;
    }
    Ok((input, left))
}

/// Parse an additive chain, folding to the left.
fn expression(input: &str) -> Parsed<'_, Expression> {
    let (mut input, mut left) = term(input)?;
    loop {
        let (rest, _) = ws(input)?;
        let op = if rest.starts_with('+') {
            BinaryOp::Add
        } else if rest.starts_with('-') {
            BinaryOp::Sub
        } else {
            break;
        };
        let (rest, right) = term(&rest[1..])?;
        left = Expression::Binary(op, Box::new(left), Box::new(right));
        input = rest;
    }
    Ok((input, left))
}

fn parameter_list(input: &str) -> Parsed<'_, Vec<String>> {
    let mut params = Vec::new();
    if let Ok((rest, _)) = symbol(input, ')') {
        return Ok((rest, params));
    }

    let (mut input, first) = identifier(input)?;
    params.push(first);
    while let Ok((rest, _)) = symbol(input, ',') {
        let (rest, next) = identifier(rest)?;
        params.push(next);
        input = rest;
    }

    let (input, _) = symbol(input, ')')?;
    Ok((input, params))
}

/// Accepts `= body` as well as `: return body`.
fn body_separator(input: &str) -> Parsed<'_, ()> {
    if let Ok((rest, _)) = symbol(input, '=') {
        return Ok((rest, ()));
    }
    let (input, _) = symbol(input, ':')?;
    let input = match keyword(input, "return") {
        Ok((rest, _)) => rest,
        Err(_) => input,
    };
    Ok((input, ()))
}

fn definition(input: &str) -> Parsed<'_, Statement> {
    let (input, name) = identifier(input)?;
    let (input, _) = symbol(input, '(')?;
    let (input, params) = parameter_list(input)?;
    let (input, _) = body_separator(input)?;
    let (input, body) = expression(input)?;
    Ok((input, Statement::Define { name, params, body }))
}

fn assignment(input: &str) -> Parsed<'_, Statement> {
    let (input, name) = identifier(input)?;
    let (input, _) = symbol(input, '=')?;
    let (input, value) = expression(input)?;
    Ok((input, Statement::Assign { name, value }))
}

fn statement(input: &str) -> Parsed<'_, Statement> {
    if let Ok((rest, _)) = keyword(input, "def") {
        return definition(rest);
    }
    assignment(input)
}
