//! The source environment: a small formula language for defining target
//! functions and data sequences.
//!
//! Source text is a list of statements separated by newlines or `;`:
//!
//! ```text
//! # comment
//! def f(x, m, b, c) = m * sin(b * x) + c
//! xs = linspace(0, 2 * pi, 100)
//! data = sin(xs) + rand(100) * 3
//! ```
//!
//! `def` statements produce callables, assignments produce data sequences.
//! Nothing outside this language can be executed.

mod builtins;
mod environment;
mod expression;
mod value;

pub use environment::{ExprFunction, SourceEnvironment};
pub use expression::{parse_program, BinaryOp, Expression, Statement, UnaryOp};
pub use value::Value;

/// Source loaded when the user provides none: a sine model and noisy data.
pub const DEMO_SOURCE: &str = "\
def f(x, m, b, c) = m * sin(b * x) + c
xs = linspace(0, 2 * pi, 100)
data = sin(xs) + rand(100) * 0.3
";

use thiserror::Error;

/// Error raised while parsing or evaluating source text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("line {line}: failed to parse statement: {message}")]
    Parse { line: usize, message: String },

    #[error("Undefined name: {name}")]
    UndefinedName { name: String },

    #[error("'{name}' is a function, not a value")]
    NotAValue { name: String },

    #[error("'{name}' is not callable")]
    NotCallable { name: String },

    #[error("'{name}' takes {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("Shape mismatch: cannot broadcast arrays of length {left} and {right}")]
    ShapeMismatch { left: usize, right: usize },

    #[error("Invalid argument to {function}: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("'{name}' is not a data sequence")]
    NotASequence { name: String },

    #[error("line {line}: {error}")]
    AtLine { line: usize, error: Box<SourceError> },
}

impl SourceError {
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            SourceError::Parse { .. } | SourceError::AtLine { .. } => self,
            other => SourceError::AtLine {
                line,
                error: Box::new(other),
            },
        }
    }
}
