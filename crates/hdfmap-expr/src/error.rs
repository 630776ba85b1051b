//! Error types for expression compilation and evaluation.

use hdfmap_tree::TreeError;

/// Errors raised while compiling or evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// Malformed input, with a 1-based position.
    #[error("syntax error at line {line}, col {col}: {message}")]
    Syntax { message: String, line: usize, col: usize },

    /// A construct the grammar deliberately leaves out (attribute access,
    /// assignment, lambdas, imports).
    #[error("not allowed in expressions: {0}")]
    Unsafe(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// A registered macro that expands to itself.
    #[error("macro '{0}' expands recursively")]
    MacroCycle(String),

    #[error("name '{0}' is not defined")]
    Undefined(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("value error: {0}")]
    Value(String),

    #[error("division by zero")]
    ZeroDivision,

    #[error("operands could not be broadcast together with shapes {left:?} {right:?}")]
    Broadcast { left: Vec<usize>, right: Vec<usize> },

    #[error("format error: {0}")]
    Format(String),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

pub type Result<T> = std::result::Result<T, ExprError>;
