//! Index selections for partial dataset reads.
//!
//! A [`Selection`] is an ordered list of per-axis arguments in the style of
//! array indexing: integer indices remove an axis, ranges keep it, `...`
//! stands for all remaining axes and `NewAxis` inserts a unit axis.
//!
//! # Example
//!
//! ```
//! use hdfmap_tree::{Selection, SliceArg};
//!
//! // frames 2..5 of an image stack, every column of row 10
//! let sel = Selection::new(vec![
//!     SliceArg::range(Some(2), Some(5), None),
//!     SliceArg::Index(10),
//! ]);
//! assert_eq!(sel.out_shape(&[8, 64, 32]).unwrap(), vec![3, 32]);
//! ```

use ndarray::{ArrayD, Axis};

use crate::error::{Result, TreeError};

/// One indexing argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceArg {
    /// Single position; negative values count from the end.
    Index(isize),
    /// `start:stop:step`, each part optional.
    Range {
        start: Option<isize>,
        stop: Option<isize>,
        step: Option<isize>,
    },
    /// `...`
    Ellipsis,
    /// Insert a new unit axis.
    NewAxis,
}

impl SliceArg {
    pub fn range(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> Self {
        SliceArg::Range { start, stop, step }
    }

    /// `:`
    pub fn full() -> Self {
        SliceArg::Range { start: None, stop: None, step: None }
    }

    fn consumes_axis(&self) -> bool {
        matches!(self, SliceArg::Index(_) | SliceArg::Range { .. })
    }
}

/// A selection over a dataset. The empty selection selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    args: Vec<SliceArg>,
}

impl Selection {
    pub fn new(args: Vec<SliceArg>) -> Self {
        Self { args }
    }

    /// Select the whole dataset.
    pub fn all() -> Self {
        Self::default()
    }

    /// Select a single position along the first axis.
    pub fn index(i: isize) -> Self {
        Self { args: vec![SliceArg::Index(i)] }
    }

    /// Append an argument.
    pub fn then(mut self, arg: SliceArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn args(&self) -> &[SliceArg] {
        &self.args
    }

    pub fn is_all(&self) -> bool {
        self.args.iter().all(|a| matches!(a, SliceArg::Ellipsis))
            && self.args.len() <= 1
    }

    /// Shape of the result of applying this selection to `shape`.
    pub fn out_shape(&self, shape: &[usize]) -> Result<Vec<usize>> {
        let mut out = Vec::with_capacity(shape.len());
        let mut axis = 0;
        for arg in self.expand(shape.len())? {
            match arg {
                SliceArg::Index(i) => {
                    let len = shape.get(axis).copied().unwrap_or(0);
                    normalize_index(i, axis, len)?;
                    axis += 1;
                }
                SliceArg::Range { start, stop, step } => {
                    let len = shape.get(axis).copied().unwrap_or(0);
                    out.push(slice_indices(len, start, stop, step)?.len());
                    axis += 1;
                }
                SliceArg::NewAxis => out.push(1),
                SliceArg::Ellipsis => {}
            }
        }
        Ok(out)
    }

    /// Apply the selection to an in-memory array.
    pub fn apply<T: Clone>(&self, array: ArrayD<T>) -> Result<ArrayD<T>> {
        let mut out = array;
        let mut axis = 0;
        for arg in self.expand(out.ndim())? {
            match arg {
                SliceArg::Index(i) => {
                    let idx = normalize_index(i, axis, out.len_of(Axis(axis)))?;
                    out = out.index_axis_move(Axis(axis), idx);
                }
                SliceArg::Range { start, stop, step } => {
                    let len = out.len_of(Axis(axis));
                    let indices = slice_indices(len, start, stop, step)?;
                    let whole = indices.len() == len && indices.iter().enumerate().all(|(k, &v)| k == v);
                    if !whole {
                        out = out.select(Axis(axis), &indices);
                    }
                    axis += 1;
                }
                SliceArg::NewAxis => {
                    out = out.insert_axis(Axis(axis));
                    axis += 1;
                }
                SliceArg::Ellipsis => {}
            }
        }
        Ok(out)
    }

    /// Replace `...` (or the implicit trailing `...`) with full ranges.
    fn expand(&self, rank: usize) -> Result<Vec<SliceArg>> {
        let consumed = self.args.iter().filter(|a| a.consumes_axis()).count();
        if consumed > rank {
            return Err(TreeError::TooManyIndices { given: consumed, rank });
        }
        let ellipses = self.args.iter().filter(|a| matches!(a, SliceArg::Ellipsis)).count();
        if ellipses > 1 {
            return Err(TreeError::MultipleEllipsis);
        }
        let fill = rank - consumed;
        let mut out = Vec::with_capacity(self.args.len() + fill);
        for arg in &self.args {
            if matches!(arg, SliceArg::Ellipsis) {
                out.extend(std::iter::repeat(SliceArg::full()).take(fill));
            } else {
                out.push(*arg);
            }
        }
        if ellipses == 0 {
            out.extend(std::iter::repeat(SliceArg::full()).take(fill));
        }
        Ok(out)
    }
}

impl From<Vec<SliceArg>> for Selection {
    fn from(args: Vec<SliceArg>) -> Self {
        Self::new(args)
    }
}

fn normalize_index(i: isize, axis: usize, len: usize) -> Result<usize> {
    let n = len as isize;
    let idx = if i < 0 { i + n } else { i };
    if idx < 0 || idx >= n {
        return Err(TreeError::IndexOutOfBounds { index: i, axis, size: len });
    }
    Ok(idx as usize)
}

/// Positions picked by `start:stop:step` on an axis of length `len`.
///
/// Bounds are clamped the way sequence slicing clamps them, so any range is
/// valid; only a zero step is rejected.
pub fn slice_indices(
    len: usize,
    start: Option<isize>,
    stop: Option<isize>,
    step: Option<isize>,
) -> Result<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(TreeError::ZeroStep);
    }
    let n = len as isize;
    let wrap = |v: isize| if v < 0 { v + n } else { v };
    let mut out = Vec::new();
    if step > 0 {
        let lo = start.map(wrap).unwrap_or(0).clamp(0, n);
        let hi = stop.map(wrap).unwrap_or(n).clamp(0, n);
        let mut i = lo;
        while i < hi {
            out.push(i as usize);
            i += step;
        }
    } else {
        let hi = start.map(wrap).unwrap_or(n - 1).clamp(-1, n - 1);
        let lo = stop.map(wrap).unwrap_or(-1).clamp(-1, n - 1);
        let mut i = hi;
        while i > lo {
            out.push(i as usize);
            i += step;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use proptest::prelude::*;

    fn stack() -> ArrayD<f64> {
        ArrayD::from_shape_vec(IxDyn(&[3, 4, 5]), (0..60).map(|v| v as f64).collect()).unwrap()
    }

    #[test]
    fn slice_indices_follow_sequence_rules() {
        assert_eq!(slice_indices(5, None, None, None).unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(slice_indices(5, Some(-2), None, None).unwrap(), vec![3, 4]);
        assert_eq!(slice_indices(5, None, None, Some(-1)).unwrap(), vec![4, 3, 2, 1, 0]);
        assert_eq!(slice_indices(5, Some(1), Some(100), Some(2)).unwrap(), vec![1, 3]);
        assert_eq!(slice_indices(5, Some(-10), Some(2), None).unwrap(), vec![0, 1]);
        assert!(slice_indices(5, Some(4), Some(1), None).unwrap().is_empty());
        assert_eq!(slice_indices(5, None, None, Some(0)), Err(TreeError::ZeroStep));
    }

    #[test]
    fn index_removes_axis() {
        let out = Selection::index(1).apply(stack()).unwrap();
        assert_eq!(out.shape(), &[4, 5]);
        assert_eq!(out[[0, 0]], 20.0);
    }

    #[test]
    fn negative_index_counts_from_end() {
        let out = Selection::index(-1).apply(stack()).unwrap();
        assert_eq!(out[[0, 0]], 40.0);
    }

    #[test]
    fn ellipsis_addresses_trailing_axes() {
        let sel = Selection::new(vec![
            SliceArg::Ellipsis,
            SliceArg::range(Some(1), Some(3), None),
            SliceArg::range(Some(0), Some(2), None),
        ]);
        let out = sel.apply(stack()).unwrap();
        assert_eq!(out.shape(), &[3, 2, 2]);
        assert_eq!(out[[0, 0, 0]], 5.0);
        assert_eq!(sel.out_shape(&[3, 4, 5]).unwrap(), vec![3, 2, 2]);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let err = Selection::index(3).apply(stack()).unwrap_err();
        assert_eq!(err, TreeError::IndexOutOfBounds { index: 3, axis: 0, size: 3 });
    }

    #[test]
    fn too_many_indices_is_an_error() {
        let sel = Selection::new(vec![SliceArg::Index(0); 4]);
        assert!(matches!(sel.apply(stack()), Err(TreeError::TooManyIndices { .. })));
    }

    #[test]
    fn scalar_accepts_empty_and_ellipsis() {
        let scalar = ArrayD::from_elem(IxDyn(&[]), 2.5);
        assert_eq!(Selection::all().apply(scalar.clone()).unwrap()[IxDyn(&[])], 2.5);
        let sel = Selection::new(vec![SliceArg::Ellipsis]);
        assert_eq!(sel.apply(scalar).unwrap().ndim(), 0);
    }

    fn arg_strategy() -> impl Strategy<Value = SliceArg> {
        prop_oneof![
            (-8isize..8).prop_map(SliceArg::Index),
            (
                proptest::option::of(-8isize..8),
                proptest::option::of(-8isize..8),
                proptest::option::of(-3isize..4),
            )
                .prop_map(|(a, b, c)| SliceArg::range(a, b, c)),
            Just(SliceArg::Ellipsis),
            Just(SliceArg::NewAxis),
        ]
    }

    proptest! {
        #[test]
        fn selection_never_panics_and_matches_out_shape(
            args in proptest::collection::vec(arg_strategy(), 0..4)
        ) {
            let sel = Selection::new(args);
            let planned = sel.out_shape(&[3, 4, 5]);
            match sel.apply(stack()) {
                Ok(out) => prop_assert_eq!(planned.unwrap(), out.shape().to_vec()),
                Err(_) => prop_assert!(planned.is_err()),
            }
        }
    }
}
