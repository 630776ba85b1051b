//! Opening containers per call, and running one map over many of them.

use hdfmap_expr::Value;
use hdfmap_tree::{Container, Opener, Selection};
use tracing::debug;

use crate::error::Result;
use crate::logger::Logger;
use crate::map::HdfMap;
use crate::options::EvalOptions;
use crate::policy::{ConventionPolicy, GenericPolicy};
use crate::table::Table;

/// Open `location`, populate `map` with `policy` and close it again.
pub fn populate_from(
    opener: &dyn Opener,
    location: &str,
    mut map: HdfMap,
    policy: &dyn ConventionPolicy,
) -> Result<HdfMap> {
    let container = opener.open(location)?;
    map.populate_with(policy, container.as_ref())?;
    Ok(map)
}

/// Generic map of the container at `location`.
pub fn create_hdf_map(opener: &dyn Opener, location: &str) -> Result<HdfMap> {
    populate_from(opener, location, HdfMap::new(), &GenericPolicy)
}

/// One location and its map. Every call opens the container, uses it and
/// drops it before returning, on error paths too.
pub struct Loader<'a> {
    opener: &'a dyn Opener,
    location: String,
    map: HdfMap,
    logger: Logger,
}

impl<'a> Loader<'a> {
    /// Loader with a generic map built from the location itself.
    pub fn new(opener: &'a dyn Opener, location: &str) -> Result<Self> {
        let map = create_hdf_map(opener, location)?;
        Ok(Self::with_map(opener, location, map))
    }

    /// Loader using a map built elsewhere, e.g. from a sibling file.
    pub fn with_map(opener: &'a dyn Opener, location: &str, map: HdfMap) -> Self {
        let logger = map.logger().clone();
        Self { opener, location: location.to_string(), map, logger }
    }

    /// Route this loader's events, and its map's, to `logger`.
    pub fn with_logger(mut self, logger: impl Into<Logger>) -> Self {
        self.logger = logger.into();
        self.map.logger = self.logger.clone();
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn map(&self) -> &HdfMap {
        &self.map
    }

    /// Mutable access for adding locals, macros and ROIs.
    pub fn map_mut(&mut self) -> &mut HdfMap {
        &mut self.map
    }

    fn with_container<R>(&self, f: impl FnOnce(&HdfMap, &dyn Container) -> Result<R>) -> Result<R> {
        self.logger.scope(|| {
            let container = self.opener.open(&self.location)?;
            debug!(location = %self.location, "opened container");
            f(&self.map, container.as_ref())
        })
    }

    pub fn get_data(&self, name_or_path: &str, selection: &Selection, direct: bool) -> Result<Option<Value>> {
        self.with_container(|map, c| map.get_data(c, name_or_path, selection, direct))
    }

    pub fn get_string(&self, name_or_path: &str, units: bool) -> Result<Option<String>> {
        self.with_container(|map, c| map.get_string(c, name_or_path, units))
    }

    pub fn get_image(&self, selection: Option<&Selection>) -> Result<Option<Value>> {
        self.with_container(|map, c| map.get_image(c, selection))
    }

    pub fn get_metadata(&self) -> Result<Table<Value>> {
        self.with_container(|map, c| map.get_metadata(c))
    }

    pub fn get_scannables(&self) -> Result<Table<Value>> {
        self.with_container(|map, c| map.get_scannables(c))
    }

    /// Evaluate with the default options: errors raised, `--` for unknown names.
    pub fn eval(&self, expression: &str) -> Result<Value> {
        self.eval_with(expression, &EvalOptions::default())
    }

    pub fn eval_with(&self, expression: &str, options: &EvalOptions) -> Result<Value> {
        self.with_container(|map, c| map.evaluate(c, expression, options))
    }

    pub fn format(&self, template: &str) -> Result<String> {
        self.format_with(template, &EvalOptions::default())
    }

    pub fn format_with(&self, template: &str, options: &EvalOptions) -> Result<String> {
        self.with_container(|map, c| map.format(c, template, options))
    }

    /// `path: summary` line for every dataset.
    pub fn summary(&self) -> Result<String> {
        self.with_container(|map, c| map.create_dataset_summary(c))
    }
}

// ---------------------------------------------------------------------------
// Many containers, one map
// ---------------------------------------------------------------------------

fn each<S, R>(
    opener: &dyn Opener,
    map: &HdfMap,
    locations: &[S],
    mut f: impl FnMut(&dyn Container) -> Result<R>,
) -> Result<Vec<R>>
where
    S: AsRef<str>,
{
    map.logger().scope(|| {
        locations
            .iter()
            .map(|location| {
                let container = opener.open(location.as_ref())?;
                f(container.as_ref())
            })
            .collect()
    })
}

/// Evaluate one expression in each container, in order.
pub fn multi_eval<S: AsRef<str>>(
    opener: &dyn Opener,
    map: &HdfMap,
    locations: &[S],
    expression: &str,
    options: &EvalOptions,
) -> Result<Vec<Value>> {
    each(opener, map, locations, |c| map.evaluate(c, expression, options))
}

/// Render one template for each container, in order.
pub fn multi_format<S: AsRef<str>>(
    opener: &dyn Opener,
    map: &HdfMap,
    locations: &[S],
    template: &str,
    options: &EvalOptions,
) -> Result<Vec<String>> {
    each(opener, map, locations, |c| map.format(c, template, options))
}

/// Read one named dataset from each container, in order.
pub fn multi_get_data<S: AsRef<str>>(
    opener: &dyn Opener,
    map: &HdfMap,
    locations: &[S],
    name_or_path: &str,
    selection: &Selection,
    direct: bool,
) -> Result<Vec<Option<Value>>> {
    each(opener, map, locations, |c| map.get_data(c, name_or_path, selection, direct))
}

/// Read the default image from each container, in order. Without a
/// selection each read takes the middle frame of that container's stack.
pub fn multi_get_image<S: AsRef<str>>(
    opener: &dyn Opener,
    map: &HdfMap,
    locations: &[S],
    selection: Option<&Selection>,
) -> Result<Vec<Option<Value>>> {
    each(opener, map, locations, |c| map.get_image(c, selection))
}
