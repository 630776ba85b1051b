//! Error types for container access.

/// Errors raised by a [`Container`](crate::Container) or its datasets.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    /// The location handed to an opener is unknown.
    #[error("cannot open container: {0}")]
    NotFound(String),

    /// A soft or external link whose target does not resolve.
    #[error("broken link: {path} -> {target}")]
    BrokenLink { path: String, target: String },

    /// Link chain exceeded the resolution depth.
    #[error("too many levels of links resolving {0}")]
    LinkDepth(String),

    /// The path names a group where a dataset was expected.
    #[error("not a dataset: {0}")]
    NotADataset(String),

    /// The path does not exist.
    #[error("no such object: {0}")]
    NoSuchObject(String),

    /// An integer index fell outside an axis.
    #[error("index {index} is out of bounds for axis {axis} with size {size}")]
    IndexOutOfBounds { index: isize, axis: usize, size: usize },

    /// More indices than dimensions.
    #[error("too many indices: {given} for array of rank {rank}")]
    TooManyIndices { given: usize, rank: usize },

    /// More than one `...` in an index expression.
    #[error("an index can only have a single ellipsis")]
    MultipleEllipsis,

    /// A slice with a zero step.
    #[error("slice step cannot be zero")]
    ZeroStep,

    /// Data length does not match a declared shape.
    #[error("data of length {len} does not fit shape {shape:?}")]
    ShapeMismatch { len: usize, shape: Vec<usize> },

    /// A name was added twice to one group.
    #[error("duplicate member '{name}' in group '{group}'")]
    Duplicate { group: String, name: String },
}

pub type Result<T> = std::result::Result<T, TreeError>;
