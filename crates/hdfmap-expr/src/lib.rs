//! Expression language for dataset namespaces.
//!
//! Plain expressions cover literals, names, tuples, arithmetic with
//! broadcasting, comparisons, boolean logic, conditionals, indexing and calls
//! to a fixed set of numeric functions. There is no attribute access, no
//! assignment and no way to call anything outside [`Builtin`].
//!
//! On top of that, [`compile`] understands dataset-aware markers and lowers
//! them against a [`Namespace`]:
//!
//! | syntax          | meaning                                             |
//! |-----------------|-----------------------------------------------------|
//! | `name@attr`     | attribute `attr` of the dataset behind `name`       |
//! | `name?(expr)`   | `name` if it exists, otherwise `expr`               |
//! | `(a\|b\|c)`     | first alternative that exists, otherwise the last   |
//! | registered name | macro body, expanded in parentheses                 |
//!
//! ```
//! use std::collections::HashMap;
//! use hdfmap_expr::{compile, Interpreter, Namespace, Value};
//!
//! struct Empty;
//! impl Namespace for Empty {
//!     fn contains(&self, _: &str) -> bool { false }
//!     fn attribute(&self, _: &str, _: &str) -> Option<Value> { None }
//!     fn macro_body(&self, _: &str) -> Option<String> { None }
//! }
//!
//! let compiled = compile("(foo|bar?(5)) * 2", &Empty).unwrap();
//! let symbols = HashMap::new();
//! assert_eq!(Interpreter::new(&symbols).eval(&compiled.expr).unwrap(), Value::Int(10));
//! ```

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interp;
pub mod ops;
pub mod parser;
pub mod rewrite;
pub mod template;
pub mod token;
pub mod value;

pub use ast::{BinaryOp, CompareOp, Expr, IndexItem, Literal, UnaryOp};
pub use builtins::Builtin;
pub use error::{ExprError, Result};
pub use interp::{subscript, Interpreter};
pub use rewrite::{attribute_key, compile, Compiled, Ir, Namespace};
pub use template::{format_value, parse_template, FormatSpec, Piece};
pub use token::{tokenize, Span, Token, TokenKind};
pub use value::{datetime_text, Value};
