//! In-memory container backend.
//!
//! Files are assembled with [`FileBuilder`] the same way an HDF5 writer
//! lays them out: root attributes, datasets, nested groups and links.
//!
//! ```
//! use hdfmap_tree::{AttrValue, Container, FileBuilder};
//!
//! let mut b = FileBuilder::new();
//! let mut entry = b.create_group("entry");
//! entry.set_attr("NX_class", AttrValue::String("NXentry".into()));
//! entry.create_dataset("energy").with_f64_value(3.58);
//! b.add_group(entry.finish());
//! let file = b.finish("1234.nxs").unwrap();
//!
//! assert!(file.get("/entry/energy").unwrap().unwrap().is_dataset());
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};

use crate::container::{base_name, join_path, parent_path, Container, DatasetHandle, Opener};
use crate::error::{Result, TreeError};
use crate::node::{DatasetInfo, GroupInfo, Node, RawData};
use crate::selection::Selection;
use crate::types::{AttrValue, Attributes, DType, LinkKind};

const MAX_LINK_DEPTH: usize = 16;

#[derive(Debug)]
enum Stored {
    Group { attrs: Attributes, children: Vec<String> },
    Dataset { info: DatasetInfo, data: Arc<RawData> },
    SoftLink(String),
    ExternalLink { file: MemoryFile, path: String },
}

/// A complete container held in memory. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    location: String,
    objects: Arc<HashMap<String, Stored>>,
}

enum Step {
    Hard,
    Soft(String),
    External(MemoryFile, String),
}

impl MemoryFile {
    /// Follow links along `path`, returning the file and path that hold the object.
    fn resolve(&self, path: &str, depth: usize) -> Result<Option<(MemoryFile, String)>> {
        if depth > MAX_LINK_DEPTH {
            return Err(TreeError::LinkDepth(path.to_string()));
        }
        let mut file = self.clone();
        let mut current = "/".to_string();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let candidate = join_path(&current, segment);
            let step = match file.objects.get(&candidate) {
                None => return Ok(None),
                Some(Stored::SoftLink(target)) => Step::Soft(target.clone()),
                Some(Stored::ExternalLink { file: ext, path }) => Step::External(ext.clone(), path.clone()),
                Some(_) => Step::Hard,
            };
            match step {
                Step::Hard => current = candidate,
                Step::Soft(target) => match file.resolve(&target, depth + 1)? {
                    Some((f, p)) => {
                        file = f;
                        current = p;
                    }
                    None => return Err(TreeError::BrokenLink { path: candidate, target }),
                },
                Step::External(ext, target) => match ext.resolve(&target, depth + 1)? {
                    Some((f, p)) => {
                        file = f;
                        current = p;
                    }
                    None => {
                        return Err(TreeError::BrokenLink {
                            path: candidate,
                            target: format!("{}:{}", ext.location, target),
                        })
                    }
                },
            }
        }
        Ok(Some((file, current)))
    }

    fn same_file(&self, other: &MemoryFile) -> bool {
        Arc::ptr_eq(&self.objects, &other.objects)
    }

    /// Path reported for an object: the link target inside this file, the
    /// requested path when the object lives in another file.
    fn reported_path(&self, requested: &str, file: &MemoryFile, real: &str) -> String {
        if self.same_file(file) {
            real.to_string()
        } else {
            requested.to_string()
        }
    }
}

fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

impl Container for MemoryFile {
    fn location(&self) -> &str {
        &self.location
    }

    fn get(&self, path: &str) -> Result<Option<Node>> {
        let requested = normalize(path);
        let Some((file, real)) = self.resolve(&requested, 0)? else {
            return Ok(None);
        };
        let reported = self.reported_path(&requested, &file, &real);
        Ok(match file.objects.get(&real) {
            Some(Stored::Group { attrs, children }) => Some(Node::Group(GroupInfo {
                path: reported,
                attrs: attrs.clone(),
                children: children.clone(),
            })),
            Some(Stored::Dataset { info, .. }) => Some(Node::Dataset(DatasetInfo {
                path: reported,
                ..info.clone()
            })),
            _ => None,
        })
    }

    fn link_kind(&self, path: &str) -> Option<LinkKind> {
        let requested = normalize(path);
        if requested == "/" {
            return None;
        }
        let (file, parent) = self.resolve(parent_path(&requested), 0).ok()??;
        match file.objects.get(&join_path(&parent, base_name(&requested)))? {
            Stored::Group { .. } | Stored::Dataset { .. } => Some(LinkKind::Hard),
            Stored::SoftLink(_) => Some(LinkKind::Soft),
            Stored::ExternalLink { .. } => Some(LinkKind::External),
        }
    }

    fn dataset(&self, path: &str) -> Result<Arc<dyn DatasetHandle>> {
        let requested = normalize(path);
        let (file, real) = self
            .resolve(&requested, 0)?
            .ok_or_else(|| TreeError::NoSuchObject(requested.clone()))?;
        match file.objects.get(&real) {
            Some(Stored::Dataset { info, data }) => Ok(Arc::new(MemoryDataset {
                info: DatasetInfo {
                    path: self.reported_path(&requested, &file, &real),
                    ..info.clone()
                },
                data: Arc::clone(data),
            })),
            Some(_) => Err(TreeError::NotADataset(requested)),
            None => Err(TreeError::NoSuchObject(requested)),
        }
    }
}

/// Handle to an in-memory dataset; shares the data with its file.
#[derive(Debug)]
pub struct MemoryDataset {
    info: DatasetInfo,
    data: Arc<RawData>,
}

impl DatasetHandle for MemoryDataset {
    fn info(&self) -> &DatasetInfo {
        &self.info
    }

    fn read(&self, selection: &Selection) -> Result<RawData> {
        Ok(match self.data.as_ref() {
            RawData::Float(a) => RawData::Float(selection.apply(a.clone())?),
            RawData::Int(a) => RawData::Int(selection.apply(a.clone())?),
            RawData::Text(a) => RawData::Text(selection.apply(a.clone())?),
        })
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Payload {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Text(Vec<String>),
}

/// Builder for one dataset; obtained from `create_dataset`.
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    payload: Payload,
    shape: Option<Vec<usize>>,
    dtype: Option<DType>,
    attrs: Attributes,
}

impl DatasetBuilder {
    fn new() -> Self {
        Self { payload: Payload::Float(Vec::new()), shape: None, dtype: None, attrs: Attributes::new() }
    }

    pub fn with_f64_data(&mut self, data: &[f64]) -> &mut Self {
        self.payload = Payload::Float(data.to_vec());
        self
    }

    pub fn with_i64_data(&mut self, data: &[i64]) -> &mut Self {
        self.payload = Payload::Int(data.to_vec());
        self
    }

    pub fn with_strings(&mut self, data: &[&str]) -> &mut Self {
        self.payload = Payload::Text(data.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Scalar float dataset.
    pub fn with_f64_value(&mut self, value: f64) -> &mut Self {
        self.payload = Payload::Float(vec![value]);
        self.shape = Some(Vec::new());
        self
    }

    /// Scalar integer dataset.
    pub fn with_i64_value(&mut self, value: i64) -> &mut Self {
        self.payload = Payload::Int(vec![value]);
        self.shape = Some(Vec::new());
        self
    }

    /// Scalar string dataset.
    pub fn with_string_value(&mut self, value: &str) -> &mut Self {
        self.payload = Payload::Text(vec![value.to_string()]);
        self.shape = Some(Vec::new());
        self
    }

    pub fn with_shape(&mut self, shape: &[usize]) -> &mut Self {
        self.shape = Some(shape.to_vec());
        self
    }

    /// Override the stored type, e.g. `DType::F32` or fixed-length `DType::String`.
    pub fn with_dtype(&mut self, dtype: DType) -> &mut Self {
        self.dtype = Some(dtype);
        self
    }

    pub fn set_attr(&mut self, name: &str, value: AttrValue) -> &mut Self {
        self.attrs.insert(name.to_string(), value);
        self
    }

    fn build(&self, path: String) -> Result<(DatasetInfo, RawData)> {
        fn shaped<T>(shape: &[usize], data: Vec<T>) -> Result<ArrayD<T>> {
            let len = data.len();
            ArrayD::from_shape_vec(IxDyn(shape), data)
                .map_err(|_| TreeError::ShapeMismatch { len, shape: shape.to_vec() })
        }
        let len = match &self.payload {
            Payload::Float(v) => v.len(),
            Payload::Int(v) => v.len(),
            Payload::Text(v) => v.len(),
        };
        let shape = self.shape.clone().unwrap_or_else(|| vec![len]);
        let (data, default_dtype) = match &self.payload {
            Payload::Float(v) => (RawData::Float(shaped(&shape, v.clone())?), DType::F64),
            Payload::Int(v) => (RawData::Int(shaped(&shape, v.clone())?), DType::I64),
            Payload::Text(v) => (RawData::Text(shaped(&shape, v.clone())?), DType::VariableLengthString),
        };
        let info = DatasetInfo {
            path,
            shape,
            dtype: self.dtype.clone().unwrap_or(default_dtype),
            attrs: self.attrs.clone(),
        };
        Ok((info, data))
    }
}

#[derive(Debug, Clone)]
enum Member {
    Dataset(usize),
    Group(FinishedGroup),
    SoftLink(String),
    ExternalLink(MemoryFile, String),
}

/// Builder for a group; attach it to its parent with `add_group(g.finish())`.
#[derive(Debug, Clone)]
pub struct GroupBuilder {
    name: String,
    attrs: Attributes,
    members: Vec<(String, Member)>,
    datasets: Vec<DatasetBuilder>,
}

/// A completed group ready to be added to a parent.
#[derive(Debug, Clone)]
pub struct FinishedGroup {
    name: String,
    attrs: Attributes,
    members: Vec<(String, Member)>,
    datasets: Vec<DatasetBuilder>,
}

impl GroupBuilder {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), attrs: Attributes::new(), members: Vec::new(), datasets: Vec::new() }
    }

    pub fn set_attr(&mut self, name: &str, value: AttrValue) -> &mut Self {
        self.attrs.insert(name.to_string(), value);
        self
    }

    pub fn create_dataset(&mut self, name: &str) -> &mut DatasetBuilder {
        self.datasets.push(DatasetBuilder::new());
        let idx = self.datasets.len() - 1;
        self.members.push((name.to_string(), Member::Dataset(idx)));
        &mut self.datasets[idx]
    }

    /// Start a child group. It is not attached until passed to [`add_group`](Self::add_group).
    pub fn create_group(&mut self, name: &str) -> GroupBuilder {
        GroupBuilder::new(name)
    }

    pub fn add_group(&mut self, group: FinishedGroup) {
        self.members.push((group.name.clone(), Member::Group(group)));
    }

    /// Soft link to an absolute path in the same file; the target may be missing.
    pub fn soft_link(&mut self, name: &str, target: &str) {
        self.members.push((name.to_string(), Member::SoftLink(target.to_string())));
    }

    /// Link to an object inside another file.
    pub fn external_link(&mut self, name: &str, file: &MemoryFile, path: &str) {
        self.members.push((name.to_string(), Member::ExternalLink(file.clone(), path.to_string())));
    }

    pub fn finish(self) -> FinishedGroup {
        FinishedGroup { name: self.name, attrs: self.attrs, members: self.members, datasets: self.datasets }
    }
}

/// Builder for an in-memory file, mirroring the layout calls of an HDF5 writer.
#[derive(Debug, Clone)]
pub struct FileBuilder {
    root: GroupBuilder,
}

impl FileBuilder {
    pub fn new() -> Self {
        Self { root: GroupBuilder::new("") }
    }

    /// Set an attribute on the root group.
    pub fn set_attr(&mut self, name: &str, value: AttrValue) {
        self.root.set_attr(name, value);
    }

    pub fn create_dataset(&mut self, name: &str) -> &mut DatasetBuilder {
        self.root.create_dataset(name)
    }

    pub fn create_group(&mut self, name: &str) -> GroupBuilder {
        GroupBuilder::new(name)
    }

    pub fn add_group(&mut self, group: FinishedGroup) {
        self.root.add_group(group);
    }

    pub fn soft_link(&mut self, name: &str, target: &str) {
        self.root.soft_link(name, target);
    }

    pub fn external_link(&mut self, name: &str, file: &MemoryFile, path: &str) {
        self.root.external_link(name, file, path);
    }

    /// Assemble the file. `location` is the name reported by the container.
    pub fn finish(self, location: &str) -> Result<MemoryFile> {
        let mut objects = HashMap::new();
        store_group(&mut objects, "/", self.root.finish())?;
        Ok(MemoryFile { location: location.to_string(), objects: Arc::new(objects) })
    }
}

impl Default for FileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn store_group(objects: &mut HashMap<String, Stored>, path: &str, group: FinishedGroup) -> Result<()> {
    let mut children = Vec::with_capacity(group.members.len());
    for (name, member) in group.members {
        if children.contains(&name) {
            return Err(TreeError::Duplicate { group: path.to_string(), name });
        }
        let child = join_path(path, &name);
        match member {
            Member::Dataset(idx) => {
                let builder = group
                    .datasets
                    .get(idx)
                    .ok_or_else(|| TreeError::NoSuchObject(child.clone()))?;
                let (info, data) = builder.build(child.clone())?;
                objects.insert(child, Stored::Dataset { info, data: Arc::new(data) });
            }
            Member::Group(sub) => store_group(objects, &child, sub)?,
            Member::SoftLink(target) => {
                objects.insert(child, Stored::SoftLink(normalize(&target)));
            }
            Member::ExternalLink(file, target) => {
                objects.insert(child, Stored::ExternalLink { file, path: normalize(&target) });
            }
        }
        children.push(name);
    }
    objects.insert(path.to_string(), Stored::Group { attrs: group.attrs, children });
    Ok(())
}

// ---------------------------------------------------------------------------
// Opener
// ---------------------------------------------------------------------------

/// A set of in-memory files addressable by location.
///
/// Counts how many containers were opened and how many are still alive, so
/// callers can check that per-call handles are released.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: HashMap<String, MemoryFile>,
    opened: AtomicUsize,
    live: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: MemoryFile) {
        self.files.insert(file.location.clone(), file);
    }

    pub fn with(mut self, file: MemoryFile) -> Self {
        self.insert(file);
        self
    }

    /// Total number of successful `open` calls.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Containers opened and not yet dropped.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl Opener for MemoryStore {
    fn open(&self, location: &str) -> Result<Arc<dyn Container>> {
        let file = self
            .files
            .get(location)
            .ok_or_else(|| TreeError::NotFound(location.to_string()))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(OpenedFile { file: file.clone(), live: Arc::clone(&self.live) }))
    }
}

#[derive(Debug)]
struct OpenedFile {
    file: MemoryFile,
    live: Arc<AtomicUsize>,
}

impl Drop for OpenedFile {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Container for OpenedFile {
    fn location(&self) -> &str {
        self.file.location()
    }

    fn get(&self, path: &str) -> Result<Option<Node>> {
        self.file.get(path)
    }

    fn link_kind(&self, path: &str) -> Option<LinkKind> {
        self.file.link_kind(path)
    }

    fn dataset(&self, path: &str) -> Result<Arc<dyn DatasetHandle>> {
        self.file.dataset(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryFile {
        let mut b = FileBuilder::new();
        b.set_attr("default", AttrValue::String("entry".into()));
        let mut entry = b.create_group("entry");
        entry.set_attr("NX_class", AttrValue::String("NXentry".into()));
        entry.create_dataset("title").with_string_value("scan");
        let mut data = entry.create_group("data");
        data.create_dataset("x").with_f64_data(&[1.0, 2.0, 3.0]);
        entry.add_group(data.finish());
        entry.soft_link("x_link", "/entry/data/x");
        entry.soft_link("dangling", "/entry/missing");
        b.add_group(entry.finish());
        b.finish("sample.nxs").unwrap()
    }

    #[test]
    fn children_keep_insertion_order() {
        let file = sample();
        match file.get("/entry").unwrap() {
            Some(Node::Group(g)) => assert_eq!(g.children, vec!["title", "data", "x_link", "dangling"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn soft_link_reports_target_path() {
        let file = sample();
        let node = file.get("/entry/x_link").unwrap().unwrap();
        assert_eq!(node.path(), "/entry/data/x");
        assert_eq!(file.link_kind("/entry/x_link"), Some(LinkKind::Soft));
        assert_eq!(file.link_kind("/entry/data/x"), Some(LinkKind::Hard));
    }

    #[test]
    fn broken_link_is_an_error_missing_path_is_none() {
        let file = sample();
        assert!(matches!(file.get("/entry/dangling"), Err(TreeError::BrokenLink { .. })));
        assert_eq!(file.get("/entry/nothing").unwrap(), None);
    }

    #[test]
    fn external_link_reports_requested_path() {
        let mut eb = FileBuilder::new();
        eb.create_dataset("frames").with_f64_data(&[0.0; 8]).with_shape(&[2, 2, 2]);
        let external = eb.finish("frames.h5").unwrap();

        let mut b = FileBuilder::new();
        b.external_link("images", &external, "/frames");
        let file = b.finish("main.nxs").unwrap();

        let node = file.get("/images").unwrap().unwrap();
        assert_eq!(node.path(), "/images");
        assert_eq!(file.link_kind("/images"), Some(LinkKind::External));
        let handle = file.dataset("/images").unwrap();
        assert_eq!(handle.shape(), &[2, 2, 2]);
    }

    #[test]
    fn handle_outlives_file() {
        let handle = {
            let file = sample();
            file.dataset("/entry/data/x").unwrap()
        };
        let data = handle.read(&Selection::index(-1)).unwrap();
        assert_eq!(data.to_f64().unwrap()[IxDyn(&[])], 3.0);
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let mut b = FileBuilder::new();
        b.create_dataset("bad").with_f64_data(&[1.0, 2.0]).with_shape(&[3]);
        assert!(matches!(b.finish("bad.h5"), Err(TreeError::ShapeMismatch { .. })));
    }

    #[test]
    fn store_tracks_live_containers() {
        let store = MemoryStore::new().with(sample());
        {
            let c = store.open("sample.nxs").unwrap();
            assert_eq!(c.location(), "sample.nxs");
            assert_eq!(store.live_count(), 1);
        }
        assert_eq!(store.live_count(), 0);
        assert_eq!(store.open_count(), 1);
        assert!(matches!(store.open("other.nxs"), Err(TreeError::NotFound(_))));
    }
}
