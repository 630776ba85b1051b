//! Read-only access to hierarchical scientific data containers.
//!
//! This crate defines the interface the namespace mapper consumes: a
//! [`Container`] of groups and datasets resolved by absolute path, link-kind
//! introspection, and [`DatasetHandle`]s that read [`Selection`]s of data into
//! [`RawData`] arrays. An in-memory backend ([`MemoryFile`], built with
//! [`FileBuilder`]) implements it for tests and for pre-loaded data.

pub mod container;
pub mod error;
pub mod memory;
pub mod node;
pub mod selection;
pub mod types;

pub use container::{base_name, join_path, parent_path, Container, DatasetHandle, Opener};
pub use error::{Result, TreeError};
pub use memory::{DatasetBuilder, FileBuilder, FinishedGroup, GroupBuilder, MemoryDataset, MemoryFile, MemoryStore};
pub use node::{squeeze, DatasetInfo, GroupInfo, Node, RawData};
pub use selection::{slice_indices, Selection, SliceArg};
pub use types::{float_repr, shape_repr, AttrValue, Attributes, DType, LinkKind};
