//! The namespace map and its generic building blocks.
//!
//! ```text
//!   Container ──index──▶ groups / datasets / classes
//!                            │
//!                            ├─ values       ndim 0 or empty
//!                            ├─ arrays       ndim ≥ 1
//!                            ├─ scannables   arrays with the scan length
//!                            └─ image_data   stacks of large 2-D frames
//!                                      │
//!                          merge_combined (values < arrays < images < scannables)
//!                                      ▼
//!                                  combined
//! ```
//!
//! Convention policies drive these steps; see [`ConventionPolicy`].

use std::collections::HashMap;

use hdfmap_expr::{tokenize, Value};
use hdfmap_tree::{base_name, join_path, AttrValue, Attributes, Container, DType, GroupInfo, LinkKind, Node, TreeError};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifier::{alias_names, expression_safe_name, generate_identifier};
use crate::logger::Logger;
use crate::options::MapOptions;
use crate::policy::{ConventionPolicy, GenericPolicy};
use crate::table::{NameTable, Table};

/// Group attribute holding the class tag.
pub const CLASS_ATTR: &str = "NX_class";
/// Class tag of groups without one.
pub const GENERIC_CLASS: &str = "Group";
/// Dataset attribute declaring an extra alias.
pub const LOCAL_NAME_ATTR: &str = "local_name";
/// Shortcut name for the default image.
pub const DEFAULT_IMAGE: &str = "IMAGE";

/// Deepest group nesting followed, guarding against link cycles.
const MAX_DEPTH: usize = 64;

/// An indexed group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRecord {
    /// Absolute path in the container.
    pub path: String,
    /// `NX_class` value, or `"Group"` when absent.
    pub class_tag: String,
    /// Last path segment, `"/"` for the root.
    pub display_name: String,
    /// Group attributes as read.
    pub attributes: Attributes,
    /// Member names that resolved to datasets, in container order.
    pub child_dataset_names: Vec<String>,
}

/// An indexed dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    /// Absolute path of the stored dataset.
    pub path: String,
    /// Identifier derived from the path.
    pub display_name: String,
    /// Every name the dataset is registered under, in lookup order.
    pub alias_names: Vec<String>,
    /// Total element count.
    pub size: usize,
    /// Extent of each dimension; empty for scalars.
    pub shape: Vec<usize>,
    /// Stored element type.
    pub dtype: DType,
    /// Dataset attributes as read.
    pub attributes: Attributes,
}

impl DatasetRecord {
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
}

/// Class tag from a group's attributes.
pub fn class_tag(attrs: &Attributes) -> String {
    attrs
        .get(CLASS_ATTR)
        .and_then(AttrValue::to_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| GENERIC_CLASS.to_string())
}

/// Whether `shape` looks like a stack of frames.
pub fn is_image_shape(shape: &[usize], scan_rank: Option<usize>, min_extent: usize) -> bool {
    let ndim = shape.len();
    let min_rank = scan_rank.map_or(3, |r| r + 2);
    ndim >= min_rank.max(2) && shape[ndim - 2] > min_extent && shape[ndim - 1] > min_extent
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && expression_safe_name(name) == name
        && !name.starts_with(|c: char| c.is_numeric())
}

/// Map from a container's hierarchy to a flat namespace.
///
/// Built once with [`populate`](HdfMap::populate) and reusable for every
/// container with the same layout. Only `local_values` and `named_macros`
/// change afterwards.
#[derive(Debug, Clone, Default)]
pub struct HdfMap {
    pub(crate) filename: String,
    pub(crate) groups: Table<GroupRecord>,
    pub(crate) datasets: Table<DatasetRecord>,
    pub(crate) classes: Table<Vec<String>>,
    /// Soft-linked dataset path to target path.
    pub(crate) links: HashMap<String, String>,
    pub(crate) values: NameTable,
    pub(crate) arrays: NameTable,
    pub(crate) scannables: NameTable,
    pub(crate) image_data: NameTable,
    pub(crate) combined: NameTable,
    pub(crate) scan_length: Option<usize>,
    pub(crate) local_values: HashMap<String, Value>,
    pub(crate) named_macros: HashMap<String, String>,
    pub(crate) options: MapOptions,
    pub(crate) logger: Logger,
}

impl HdfMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: MapOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_logger(mut self, logger: impl Into<Logger>) -> Self {
        self.logger = logger.into();
        self
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    // -----------------------------------------------------------------------
    // Population
    // -----------------------------------------------------------------------

    /// Populate with the generic convention.
    pub fn populate(&mut self, container: &dyn Container) -> Result<()> {
        self.populate_with(&GenericPolicy, container)
    }

    /// Populate with a convention policy, replacing any previous contents.
    pub fn populate_with(&mut self, policy: &dyn ConventionPolicy, container: &dyn Container) -> Result<()> {
        let logger = self.logger.clone();
        logger.scope(|| {
            self.reset(container.location());
            policy.populate(self, container)?;
            info!(
                policy = policy.name(),
                file = %self.filename,
                datasets = self.datasets.len(),
                scannables = self.scannables.len(),
                images = self.image_data.len(),
                "populated map"
            );
            Ok(())
        })
    }

    /// Clear every table built from a container. Locals and macros stay.
    pub fn reset(&mut self, location: &str) {
        self.filename = location.to_string();
        self.groups.clear();
        self.datasets.clear();
        self.classes.clear();
        self.links.clear();
        self.values.clear();
        self.arrays.clear();
        self.scannables.clear();
        self.image_data.clear();
        self.combined.clear();
        self.scan_length = None;
    }

    /// Index the tree below `start`. When `allow` is given, only direct
    /// child groups of `start` whose name or class tag is listed are entered.
    /// Nodes that cannot be resolved are skipped with a warning.
    pub fn index(&mut self, container: &dyn Container, start: &str, allow: Option<&[String]>) -> Result<()> {
        match container.get(start)? {
            Some(Node::Group(group)) => {
                self.visit_group(container, start, group, allow, 0);
                Ok(())
            }
            Some(Node::Dataset(_)) | None => Err(TreeError::NoSuchObject(format!("group {start}")).into()),
        }
    }

    fn visit_group(
        &mut self,
        container: &dyn Container,
        path: &str,
        info: GroupInfo,
        allow: Option<&[String]>,
        depth: usize,
    ) {
        if depth > MAX_DEPTH {
            warn!(path, "group nesting too deep, not descending");
            return;
        }
        let tag = class_tag(&info.attrs);
        let group_name = base_name(path).to_string();
        self.classes.get_or_insert_with(&tag, Vec::new).push(path.to_string());
        self.groups.insert(
            path,
            GroupRecord {
                path: path.to_string(),
                class_tag: tag.clone(),
                display_name: if group_name.is_empty() { "/".to_string() } else { group_name.clone() },
                attributes: info.attrs,
                child_dataset_names: Vec::new(),
            },
        );

        for child in &info.children {
            let child_path = join_path(path, child);
            let node = match container.get(&child_path) {
                Ok(Some(node)) => node,
                Ok(None) => {
                    warn!(path = %child_path, "skipping node that does not resolve");
                    continue;
                }
                Err(e) => {
                    warn!(path = %child_path, error = %e, "skipping unreadable node");
                    continue;
                }
            };
            let link = container.link_kind(&child_path);
            match node {
                Node::Group(sub) => {
                    if link == Some(LinkKind::Soft) {
                        debug!(path = %child_path, target = %sub.path, "not descending into soft-linked group");
                        continue;
                    }
                    if let Some(allow) = allow {
                        let sub_tag = class_tag(&sub.attrs);
                        if !allow.iter().any(|a| a == child || *a == sub_tag) {
                            continue;
                        }
                    }
                    self.visit_group(container, &child_path, sub, None, depth + 1);
                }
                Node::Dataset(ds) => {
                    if let Some(record) = self.groups.get_mut(path) {
                        record.child_dataset_names.push(child.clone());
                    }
                    if link == Some(LinkKind::Soft) {
                        self.links.insert(child_path, ds.path);
                        continue;
                    }
                    let name = generate_identifier(&child_path);
                    let local = ds.attrs.get(LOCAL_NAME_ATTR).and_then(AttrValue::to_text);
                    let aliases = alias_names(&name, &group_name, &tag, local.as_deref());
                    let size = ds.size();
                    let is_value = ds.ndim() == 0 || size == 0;
                    for alias in &aliases {
                        let table = if is_value { &mut self.values } else { &mut self.arrays };
                        table.insert(alias.clone(), child_path.clone());
                    }
                    self.datasets.insert(
                        child_path.clone(),
                        DatasetRecord {
                            path: child_path,
                            display_name: name,
                            alias_names: aliases,
                            size,
                            shape: ds.shape,
                            dtype: ds.dtype,
                            attributes: ds.attrs,
                        },
                    );
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    fn check_registered(&self, name: &str, path: &str) -> Option<String> {
        let target = self.resolve_link(path);
        if self.datasets.contains_key(target) {
            Some(target.to_string())
        } else {
            warn!(name, path, "not registering unindexed dataset");
            None
        }
    }

    /// Add a name for an indexed dataset to `arrays`.
    pub fn register_array(&mut self, name: &str, path: &str) -> bool {
        match self.check_registered(name, path) {
            Some(target) => {
                self.arrays.insert(name, target);
                true
            }
            None => false,
        }
    }

    /// Add a name for an indexed dataset to `values`.
    pub fn register_value(&mut self, name: &str, path: &str) -> bool {
        match self.check_registered(name, path) {
            Some(target) => {
                self.values.insert(name, target);
                true
            }
            None => false,
        }
    }

    /// Add a name for an indexed dataset to `image_data`.
    pub fn register_image(&mut self, name: &str, path: &str) -> bool {
        match self.check_registered(name, path) {
            Some(target) => {
                self.image_data.insert(name, target);
                true
            }
            None => false,
        }
    }

    pub fn clear_images(&mut self) {
        self.image_data.clear();
    }

    /// Point [`DEFAULT_IMAGE`] at the first image, unless already set.
    pub fn set_default_image(&mut self) -> Option<&str> {
        if !self.image_data.contains_key(DEFAULT_IMAGE) {
            let first = self.image_data.first().map(|(_, p)| p.clone())?;
            self.image_data.insert(DEFAULT_IMAGE, first);
        }
        self.image_data.get(DEFAULT_IMAGE).map(String::as_str)
    }

    /// Rebuild `image_data` from the shapes of all indexed arrays, using the
    /// scan rank when scannables are known.
    pub fn classify_images(&mut self) -> usize {
        let rank = self.scan_rank();
        let min = self.options.min_image_extent;
        let found: Vec<(String, String)> = self
            .datasets
            .values()
            .filter(|d| is_image_shape(&d.shape, rank, min))
            .map(|d| (d.display_name.clone(), d.path.clone()))
            .collect();
        self.image_data.clear();
        for (name, path) in found {
            self.image_data.insert(name, path);
        }
        self.image_data.len()
    }

    // -----------------------------------------------------------------------
    // Scannables
    // -----------------------------------------------------------------------

    fn arrays_in_order(&self) -> impl Iterator<Item = &DatasetRecord> {
        self.datasets.values().filter(|d| d.ndim() >= 1)
    }

    /// Most frequent size among arrays with more than one element; ties go
    /// to the size seen first.
    pub fn most_common_size(&self) -> Option<usize> {
        let mut counts: Vec<(usize, usize)> = Vec::new();
        for d in self.arrays_in_order().filter(|d| d.size > 1) {
            match counts.iter_mut().find(|(size, _)| *size == d.size) {
                Some((_, n)) => *n += 1,
                None => counts.push((d.size, 1)),
            }
        }
        mode(counts)
    }

    /// Most frequent shape among arrays with more than one element.
    pub fn most_common_shape(&self) -> Option<Vec<usize>> {
        let mut counts: Vec<(Vec<usize>, usize)> = Vec::new();
        for d in self.arrays_in_order().filter(|d| d.size > 1) {
            match counts.iter_mut().find(|(shape, _)| *shape == d.shape) {
                Some((_, n)) => *n += 1,
                None => counts.push((d.shape.clone(), 1)),
            }
        }
        mode(counts)
    }

    fn set_scannables(&mut self, members: Vec<(String, String)>, length: usize) {
        self.scannables.clear();
        for (name, path) in members {
            self.scannables.insert(name, path);
        }
        self.scan_length = Some(length);
        self.merge_combined();
    }

    /// Every array of `length` elements becomes a scannable, keyed by its
    /// identifier.
    pub fn resolve_scannables(&mut self, length: usize) -> usize {
        let members: Vec<(String, String)> = self
            .arrays_in_order()
            .filter(|d| d.size == length)
            .map(|d| (d.display_name.clone(), d.path.clone()))
            .collect();
        let count = members.len();
        self.set_scannables(members, length);
        debug!(length, count, "resolved scannables by size");
        count
    }

    /// Scannables from the direct dataset children of one group, optionally
    /// limited to `names` in that order. The first array sets the length.
    /// Fewer than two matching arrays leaves the scannables empty.
    pub fn resolve_scannables_from_group(&mut self, group: &str, names: Option<&[String]>) -> bool {
        let Some(record) = self.groups.get(group) else {
            warn!(group, "scannable group is not indexed");
            return false;
        };
        let children: Vec<String> = match names {
            Some(names) => names
                .iter()
                .filter(|n| record.child_dataset_names.contains(n))
                .cloned()
                .collect(),
            None => record.child_dataset_names.clone(),
        };
        let mut length = None;
        let mut members = Vec::new();
        for child in children {
            let path = self.resolve_link(&join_path(group, &child)).to_string();
            let Some(ds) = self.datasets.get(&path) else { continue };
            if ds.ndim() == 0 {
                continue;
            }
            match length {
                None => length = Some(ds.size),
                Some(n) if n != ds.size => continue,
                Some(_) => {}
            }
            members.push((generate_identifier(&child), path));
        }
        match length {
            Some(length) if members.len() >= 2 => {
                self.set_scannables(members, length);
                true
            }
            _ => {
                warn!(group, found = members.len(), "too few consistent arrays in group for a scan");
                self.scannables.clear();
                self.merge_combined();
                false
            }
        }
    }

    /// Scannables from an ordered list of array names. The first name that
    /// resolves sets the length; names of other sizes are dropped.
    pub fn resolve_scannables_from_names(&mut self, names: &[String]) -> bool {
        let mut length = None;
        let mut members = Vec::new();
        for name in names {
            let Some(path) = self.arrays.get(name) else {
                debug!(name = %name, "scan field is not an array");
                continue;
            };
            let Some(ds) = self.datasets.get(path) else { continue };
            match length {
                None => length = Some(ds.size),
                Some(n) if n != ds.size => {
                    debug!(name = %name, size = ds.size, length = n, "scan field has a different length");
                    continue;
                }
                Some(_) => {}
            }
            members.push((name.clone(), path.clone()));
        }
        match length {
            Some(length) => {
                self.set_scannables(members, length);
                true
            }
            None => {
                warn!(count = names.len(), "no scan field names resolve to arrays");
                false
            }
        }
    }

    /// Default scannable rule: the configured scan length, or the most
    /// common array size.
    pub fn generate_scannables(&mut self) -> Result<usize> {
        let length = self
            .options
            .scan_length
            .or_else(|| self.most_common_size())
            .ok_or(Error::UnresolvableScanLength)?;
        Ok(self.resolve_scannables(length))
    }

    /// Number of points in the scan, once resolved.
    pub fn scannables_length(&self) -> Option<usize> {
        self.scan_length
    }

    /// Rank of the scan: dimensions of the first scannable.
    pub fn scan_rank(&self) -> Option<usize> {
        let (_, path) = self.scannables.first()?;
        self.datasets.get(path).map(DatasetRecord::ndim)
    }

    /// Shape of the first scannable.
    pub fn scan_shape(&self) -> Option<&[usize]> {
        let (_, path) = self.scannables.first()?;
        self.datasets.get(path).map(|d| d.shape.as_slice())
    }

    /// Rebuild `combined`: values, then arrays, images and scannables, each
    /// overriding the names before it.
    pub fn merge_combined(&mut self) {
        let mut combined = NameTable::new();
        for table in [&self.values, &self.arrays, &self.image_data, &self.scannables] {
            for (name, path) in table.iter() {
                combined.insert(name, path.clone());
            }
        }
        self.combined = combined;
    }

    // -----------------------------------------------------------------------
    // Extension points
    // -----------------------------------------------------------------------

    /// Add or replace a caller-supplied value.
    pub fn add_local(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if !is_identifier(name) {
            return Err(Error::InvalidName(name.to_string()));
        }
        self.local_values.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn add_locals<I, S, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
        V: Into<Value>,
    {
        values.into_iter().try_for_each(|(name, value)| self.add_local(name.as_ref(), value))
    }

    /// Register `name` as shorthand for `expression`.
    pub fn add_named_expression(&mut self, name: &str, expression: &str) -> Result<()> {
        if !is_identifier(name) {
            return Err(Error::InvalidName(name.to_string()));
        }
        tokenize(expression)?;
        self.named_macros.insert(name.to_string(), expression.to_string());
        Ok(())
    }

    pub fn add_named_expressions<I, S, E>(&mut self, expressions: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, E)>,
        S: AsRef<str>,
        E: AsRef<str>,
    {
        expressions
            .into_iter()
            .try_for_each(|(name, expr)| self.add_named_expression(name.as_ref(), expr.as_ref()))
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn groups(&self) -> &Table<GroupRecord> {
        &self.groups
    }

    pub fn datasets(&self) -> &Table<DatasetRecord> {
        &self.datasets
    }

    pub fn classes(&self) -> &Table<Vec<String>> {
        &self.classes
    }

    pub fn values(&self) -> &NameTable {
        &self.values
    }

    pub fn arrays(&self) -> &NameTable {
        &self.arrays
    }

    pub fn scannables(&self) -> &NameTable {
        &self.scannables
    }

    pub fn image_data(&self) -> &NameTable {
        &self.image_data
    }

    pub fn combined(&self) -> &NameTable {
        &self.combined
    }

    pub fn local_values(&self) -> &HashMap<String, Value> {
        &self.local_values
    }

    pub fn named_macros(&self) -> &HashMap<String, String> {
        &self.named_macros
    }

    fn resolve_link<'a>(&'a self, path: &'a str) -> &'a str {
        self.links.get(path).map_or(path, String::as_str)
    }

    /// Dataset path for a name or path.
    pub fn get_path(&self, name_or_path: &str) -> Option<&str> {
        let target = self.resolve_link(name_or_path);
        if let Some(ds) = self.datasets.get(target) {
            return Some(&ds.path);
        }
        self.combined.get(name_or_path).map(String::as_str)
    }

    /// Group path for a path, class tag or group name.
    pub fn get_group_path(&self, name_or_path: &str) -> Option<&str> {
        if let Some(g) = self.groups.get(name_or_path) {
            return Some(&g.path);
        }
        if let Some(path) = self.get_class_path(name_or_path) {
            return Some(path);
        }
        self.groups
            .values()
            .filter(|g| g.display_name == name_or_path)
            .last()
            .map(|g| g.path.as_str())
    }

    /// First group of a class.
    pub fn get_class_path(&self, class: &str) -> Option<&str> {
        self.classes.get(class)?.first().map(String::as_str)
    }

    /// Every group of a class, in traversal order.
    pub fn get_class_paths(&self, class: &str) -> &[String] {
        self.classes.get(class).map_or(&[], Vec::as_slice)
    }

    pub fn get_dataset(&self, name_or_path: &str) -> Option<&DatasetRecord> {
        self.datasets.get(self.get_path(name_or_path)?)
    }

    pub fn get_attrs(&self, name_or_path: &str) -> Option<&Attributes> {
        if let Some(ds) = self.get_dataset(name_or_path) {
            return Some(&ds.attributes);
        }
        let group = self.get_group_path(name_or_path)?;
        self.groups.get(group).map(|g| &g.attributes)
    }

    pub fn get_attribute(&self, name_or_path: &str, attr: &str) -> Option<&AttrValue> {
        self.get_attrs(name_or_path)?.get(attr)
    }

    pub fn get_size(&self, name_or_path: &str) -> Option<usize> {
        self.get_dataset(name_or_path).map(|d| d.size)
    }

    pub fn get_shape(&self, name_or_path: &str) -> Option<&[usize]> {
        self.get_dataset(name_or_path).map(|d| d.shape.as_slice())
    }

    /// Paths of the datasets directly inside a group.
    pub fn get_group_datasets(&self, name_or_path: &str) -> Option<Vec<String>> {
        let path = self.get_group_path(name_or_path)?;
        let group = self.groups.get(path)?;
        Some(
            group
                .child_dataset_names
                .iter()
                .map(|child| self.resolve_link(&join_path(path, child)).to_string())
                .collect(),
        )
    }

    /// Dataset paths containing `fragment`.
    pub fn find_paths(&self, fragment: &str) -> Vec<&str> {
        self.datasets.keys().filter(|p| p.contains(fragment)).collect()
    }

    /// Namespace names containing `fragment`.
    pub fn find_names(&self, fragment: &str) -> Vec<&str> {
        self.combined.keys().filter(|n| n.contains(fragment)).collect()
    }

    /// Group and dataset paths carrying attribute `attr`.
    pub fn find_attr(&self, attr: &str) -> Vec<&str> {
        let groups = self.groups.values().filter(|g| g.attributes.contains_key(attr)).map(|g| g.path.as_str());
        let datasets = self.datasets.values().filter(|d| d.attributes.contains_key(attr)).map(|d| d.path.as_str());
        groups.chain(datasets).collect()
    }

    /// Path of the default image.
    pub fn get_image_path(&self) -> Option<&str> {
        self.image_data
            .get(DEFAULT_IMAGE)
            .or_else(|| self.image_data.first().map(|(_, p)| p))
            .map(String::as_str)
    }
}

fn mode<K>(counts: Vec<(K, usize)>) -> Option<K> {
    let mut best: Option<(K, usize)> = None;
    for (key, n) in counts {
        if best.as_ref().map_or(true, |(_, top)| n > *top) {
            best = Some((key, n));
        }
    }
    best.map(|(k, _)| k)
}
