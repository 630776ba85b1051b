//! Options for building maps and evaluating expressions.

use hdfmap_expr::Value;

/// Placeholder for identifiers that cannot be resolved.
pub const DEFAULT_SENTINEL: &str = "--";

/// Options for populating an [`HdfMap`](crate::HdfMap).
#[derive(Debug, Clone, PartialEq)]
pub struct MapOptions {
    /// Only index these top-level groups (by name or class tag).
    pub groups: Option<Vec<String>>,
    /// Both trailing extents of an image must exceed this.
    pub min_image_extent: usize,
    /// Scan length to use instead of the most common array size.
    pub scan_length: Option<usize>,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self { groups: None, min_image_extent: 4, scan_length: None }
    }
}

impl MapOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_min_image_extent(mut self, extent: usize) -> Self {
        self.min_image_extent = extent;
        self
    }

    pub fn with_scan_length(mut self, length: usize) -> Self {
        self.scan_length = Some(length);
        self
    }
}

/// Options for [`HdfMap::evaluate`](crate::HdfMap::evaluate) and friends.
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Value given to identifiers that do not resolve.
    pub default: Value,
    /// Return evaluation failures as errors instead of error text.
    pub raise_on_error: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self { default: Value::Text(DEFAULT_SENTINEL.to_string()), raise_on_error: true }
    }
}

impl EvalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn raise_on_error(mut self, raise: bool) -> Self {
        self.raise_on_error = raise;
        self
    }

    /// Report failures as `error: ...` text.
    pub fn tolerant() -> Self {
        Self::default().raise_on_error(false)
    }
}
