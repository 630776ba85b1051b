//! Backend-agnostic access to a hierarchical container.
//!
//! The mapper never touches a file format directly. It talks to a
//! [`Container`], obtained from an [`Opener`], and reads data through
//! [`DatasetHandle`]s. Backends plug in behind these traits:
//!
//! ```text
//! ┌───────────────────────────┐
//! │   HdfMap / expressions    │
//! ├───────────────────────────┤
//! │ Opener → Container →      │  ← traits defined here
//! │          DatasetHandle    │
//! ├─────────────┬─────────────┤
//! │  in-memory  │  HDF5 file  │  ← pluggable backends
//! └─────────────┴─────────────┘
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TreeError};
use crate::node::{DatasetInfo, Node, RawData};
use crate::selection::Selection;
use crate::types::LinkKind;

/// An opened, read-only container.
pub trait Container: fmt::Debug {
    /// Location the container was opened from, e.g. a file path.
    fn location(&self) -> &str;

    /// Resolve an absolute path.
    ///
    /// Returns `Ok(None)` when nothing exists at the path and
    /// [`TreeError::BrokenLink`] when a link on the way does not resolve.
    fn get(&self, path: &str) -> Result<Option<Node>>;

    /// Kind of link that attaches the final path segment to its parent.
    /// The root has no link and yields `None`, as does a missing path.
    fn link_kind(&self, path: &str) -> Option<LinkKind>;

    /// Handle for reading the dataset at `path`.
    fn dataset(&self, path: &str) -> Result<Arc<dyn DatasetHandle>>;

    /// Read a selection of the dataset at `path`.
    fn read(&self, path: &str, selection: &Selection) -> Result<RawData> {
        self.dataset(path)?.read(selection)
    }

    /// Dataset metadata at `path`, or an error if it is missing or a group.
    fn dataset_info(&self, path: &str) -> Result<DatasetInfo> {
        match self.get(path)? {
            Some(Node::Dataset(info)) => Ok(info),
            Some(Node::Group(_)) => Err(TreeError::NotADataset(path.to_string())),
            None => Err(TreeError::NoSuchObject(path.to_string())),
        }
    }
}

/// A readable dataset.
///
/// A handle owns whatever it needs to read, so it stays usable after the
/// [`Container`] it came from has been dropped.
pub trait DatasetHandle: fmt::Debug + Send + Sync {
    fn info(&self) -> &DatasetInfo;

    fn read(&self, selection: &Selection) -> Result<RawData>;

    fn path(&self) -> &str {
        &self.info().path
    }

    fn shape(&self) -> &[usize] {
        &self.info().shape
    }
}

/// Opens containers by location.
pub trait Opener {
    fn open(&self, location: &str) -> Result<Arc<dyn Container>>;
}

/// Join a group path and a member name.
pub fn join_path(group: &str, name: &str) -> String {
    let group = group.trim_end_matches('/');
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("{group}/{name}")
    }
}

/// Final segment of a path, `""` for the root.
pub fn base_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Parent group of a path, `"/"` at the top.
pub fn parent_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &trimmed[..i],
    }
}
