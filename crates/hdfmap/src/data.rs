//! Reading mapped datasets from an open container.

use hdfmap_expr::{datetime_text, Value};
use hdfmap_tree::{float_repr, Container, DatasetHandle, Node, Selection, SliceArg};
use ndarray::Array2;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::coerce::{coerce, summarize};
use crate::error::Result;
use crate::map::HdfMap;
use crate::table::Table;

impl HdfMap {
    fn handle(&self, container: &dyn Container, name_or_path: &str) -> Result<Option<Arc<dyn DatasetHandle>>> {
        let Some(path) = self.get_path(name_or_path) else {
            debug!(name = name_or_path, "name is not in the namespace");
            return Ok(None);
        };
        match container.get(path)? {
            Some(Node::Dataset(_)) => Ok(Some(container.dataset(path)?)),
            _ => {
                warn!(name = name_or_path, path, "mapped dataset is missing from container");
                Ok(None)
            }
        }
    }

    /// Read `selection` of a named dataset. `None` when the name does not
    /// resolve in this container; `direct` skips text interpretation and
    /// squeezing.
    pub fn get_data(
        &self,
        container: &dyn Container,
        name_or_path: &str,
        selection: &Selection,
        direct: bool,
    ) -> Result<Option<Value>> {
        self.logger.scope(|| match self.handle(container, name_or_path)? {
            Some(handle) => Ok(Some(coerce(handle.as_ref(), selection, direct)?)),
            None => Ok(None),
        })
    }

    /// One-line summary of a named dataset, optionally with its units.
    pub fn get_string(&self, container: &dyn Container, name_or_path: &str, units: bool) -> Result<Option<String>> {
        self.logger.scope(|| match self.handle(container, name_or_path)? {
            Some(handle) => Ok(Some(summarize(handle.as_ref(), units)?)),
            None => Ok(None),
        })
    }

    /// Read the default image. Without a selection the middle frame of the
    /// stack is returned.
    pub fn get_image(&self, container: &dyn Container, selection: Option<&Selection>) -> Result<Option<Value>> {
        let Some(path) = self.get_image_path() else {
            return Ok(None);
        };
        let middle;
        let selection = match selection {
            Some(selection) => selection,
            None => {
                let shape = self.get_shape(path).unwrap_or_default();
                let leading = shape.len().saturating_sub(2);
                middle = Selection::new(shape[..leading].iter().map(|n| SliceArg::Index((n / 2) as isize)).collect());
                &middle
            }
        };
        self.get_data(container, path, selection, false)
    }

    /// Every entry of `values`, read and coerced. Unreadable entries are
    /// skipped with a warning.
    pub fn get_metadata(&self, container: &dyn Container) -> Result<Table<Value>> {
        self.read_table(container, self.values.iter())
    }

    /// Every scannable, read in full.
    pub fn get_scannables(&self, container: &dyn Container) -> Result<Table<Value>> {
        self.read_table(container, self.scannables.iter())
    }

    fn read_table<'a>(
        &self,
        container: &dyn Container,
        entries: impl Iterator<Item = (&'a str, &'a String)>,
    ) -> Result<Table<Value>> {
        self.logger.scope(|| {
            let mut out = Table::new();
            for (name, path) in entries {
                match self.get_data(container, path, &Selection::all(), false) {
                    Ok(Some(value)) => {
                        out.insert(name, value);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(name, path = %path, error = %e, "skipping unreadable dataset"),
                }
            }
            Ok(out)
        })
    }

    /// Scannables as rows of a `(count, scan length)` array, flattened.
    /// Rows that are not numeric, or have another length, are NaN.
    pub fn get_scannables_array(&self, container: &dyn Container) -> Result<Array2<f64>> {
        let length = self.scan_length.unwrap_or(0);
        let mut out = Array2::from_elem((self.scannables.len(), length), f64::NAN);
        let scannables = self.get_scannables(container)?;
        for (mut row, (name, value)) in out.rows_mut().into_iter().zip(scannables.iter()) {
            match value.to_array() {
                Ok(data) if data.len() == length => {
                    row.iter_mut().zip(data.iter()).for_each(|(o, v)| *o = *v);
                }
                _ => warn!(name, kind = value.type_name(), "scannable has no numeric row"),
            }
        }
        Ok(out)
    }

    /// Scannables as delimited text: a header of names, then one line per
    /// scan point.
    pub fn get_scannables_str(&self, container: &dyn Container, delimiter: &str) -> Result<String> {
        let scannables = self.get_scannables(container)?;
        let columns: Vec<Vec<String>> = scannables.values().map(element_strings).collect();
        let rows = columns.iter().map(Vec::len).max().unwrap_or(0);
        let mut out = scannables.keys().collect::<Vec<_>>().join(delimiter);
        for i in 0..rows {
            out.push('\n');
            let line: Vec<&str> = columns.iter().map(|c| c.get(i).map_or("", String::as_str)).collect();
            out.push_str(&line.join(delimiter));
        }
        Ok(out)
    }

    /// `path: summary` for every indexed dataset.
    pub fn create_dataset_summary(&self, container: &dyn Container) -> Result<String> {
        self.logger.scope(|| {
            let mut lines = Vec::with_capacity(self.datasets.len());
            for path in self.datasets.keys() {
                if let Some(summary) = self.get_string(container, path, true)? {
                    lines.push(format!("{path}: {summary}"));
                }
            }
            Ok(lines.join("\n"))
        })
    }
}

fn element_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(a) => a.iter().map(|v| float_repr(*v)).collect(),
        Value::TextArray(a) => a.iter().cloned().collect(),
        Value::DatetimeArray(a) => a.iter().map(datetime_text).collect(),
        other => vec![other.to_string()],
    }
}
