//! Node descriptions returned by a container.

use ndarray::{ArrayD, IxDyn};

use crate::types::{AttrValue, Attributes, DType};

/// A group or dataset resolved at a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Group(GroupInfo),
    Dataset(DatasetInfo),
}

impl Node {
    pub fn is_group(&self) -> bool {
        matches!(self, Node::Group(_))
    }

    pub fn is_dataset(&self) -> bool {
        matches!(self, Node::Dataset(_))
    }

    pub fn attrs(&self) -> &Attributes {
        match self {
            Node::Group(g) => &g.attrs,
            Node::Dataset(d) => &d.attrs,
        }
    }

    /// Resolved path of the object. For a soft link this is the link target.
    pub fn path(&self) -> &str {
        match self {
            Node::Group(g) => &g.path,
            Node::Dataset(d) => &d.path,
        }
    }
}

/// Metadata of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupInfo {
    pub path: String,
    pub attrs: Attributes,
    /// Member names in the container's iteration order.
    pub children: Vec<String>,
}

/// Metadata of a dataset; reading the data goes through a handle.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub path: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub attrs: Attributes,
}

impl DatasetInfo {
    /// Number of elements. Scalars have size 1.
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }
}

/// Typed data read from a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum RawData {
    Float(ArrayD<f64>),
    Int(ArrayD<i64>),
    Text(ArrayD<String>),
}

impl RawData {
    pub fn shape(&self) -> &[usize] {
        match self {
            RawData::Float(a) => a.shape(),
            RawData::Int(a) => a.shape(),
            RawData::Text(a) => a.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric view of the data as floats; text yields `None`.
    pub fn to_f64(&self) -> Option<ArrayD<f64>> {
        match self {
            RawData::Float(a) => Some(a.clone()),
            RawData::Int(a) => Some(a.mapv(|v| v as f64)),
            RawData::Text(_) => None,
        }
    }

    /// Remove every axis of length one.
    pub fn squeeze(self) -> RawData {
        match self {
            RawData::Float(a) => RawData::Float(squeeze(a)),
            RawData::Int(a) => RawData::Int(squeeze(a)),
            RawData::Text(a) => RawData::Text(squeeze(a)),
        }
    }
}

/// Drop all singleton axes of an array.
pub fn squeeze<T: Clone>(array: ArrayD<T>) -> ArrayD<T> {
    let shape: Vec<usize> = array.shape().iter().copied().filter(|&d| d != 1).collect();
    if shape.len() == array.ndim() {
        return array;
    }
    let data: Vec<T> = array.iter().cloned().collect();
    // Same element count, only unit axes dropped.
    match ArrayD::from_shape_vec(IxDyn(&shape), data) {
        Ok(out) => out,
        Err(_) => array,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squeeze_drops_unit_axes() {
        let a = ArrayD::from_shape_vec(IxDyn(&[1, 3, 1]), vec![1.0, 2.0, 3.0]).unwrap();
        let s = squeeze(a);
        assert_eq!(s.shape(), &[3]);
        let b = ArrayD::from_shape_vec(IxDyn(&[1, 1]), vec![7_i64]).unwrap();
        assert_eq!(squeeze(b).ndim(), 0);
    }

    #[test]
    fn dataset_size_counts_scalars_as_one() {
        let info = DatasetInfo {
            path: "/x".into(),
            shape: vec![],
            dtype: DType::F64,
            attrs: Attributes::new(),
        };
        assert_eq!(info.size(), 1);
        assert_eq!(info.ndim(), 0);
    }
}
