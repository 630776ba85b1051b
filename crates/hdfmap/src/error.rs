//! Error types for building and querying a namespace map.

use hdfmap_expr::ExprError;
use hdfmap_tree::TreeError;

/// Errors raised by [`HdfMap`](crate::HdfMap) and the [`Loader`](crate::Loader).
///
/// Missing identifiers, broken links and convention fallbacks are not
/// errors; they are logged and recovered from where they occur.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Malformed or disallowed expression, reported before evaluation.
    #[error(transparent)]
    Expr(#[from] ExprError),

    /// No array has more than one element, so there is no scan to find.
    #[error("cannot determine the scan length: no array has more than one element")]
    UnresolvableScanLength,

    /// The container has no group of the entry class.
    #[error("no {class} group found in {location}")]
    NoEntry { class: String, location: String },

    /// Evaluation failed and the caller asked for errors to be raised.
    #[error("failed to evaluate '{expression}': {source}")]
    Evaluation {
        expression: String,
        #[source]
        source: ExprError,
    },

    /// A name that cannot be used as an identifier.
    #[error("'{0}' is not a valid identifier")]
    InvalidName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
