//! Convention policies decide how a map is populated from a container.

use hdfmap_tree::Container;
use tracing::debug;

use crate::error::Result;
use crate::map::HdfMap;

/// Strategy for populating an [`HdfMap`].
///
/// [`HdfMap::populate_with`] clears the map before calling
/// [`populate`](ConventionPolicy::populate) and logs a summary after it. A
/// policy composes the building blocks on `HdfMap` (indexing, scannable
/// resolution, image classification, `merge_combined`).
pub trait ConventionPolicy {
    /// Short name used in log events.
    fn name(&self) -> &str;

    fn populate(&self, map: &mut HdfMap, container: &dyn Container) -> Result<()>;
}

/// Convention-free policy: index everything, take the most common array
/// size as the scan length and find images by shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericPolicy;

impl ConventionPolicy for GenericPolicy {
    fn name(&self) -> &str {
        "generic"
    }

    fn populate(&self, map: &mut HdfMap, container: &dyn Container) -> Result<()> {
        let groups = map.options().groups.clone();
        map.index(container, "/", groups.as_deref())?;
        map.classify_images();
        let count = map.generate_scannables()?;
        debug!(count, "generic scannables");
        // scan rank is known now
        map.classify_images();
        map.set_default_image();
        map.merge_combined();
        Ok(())
    }
}
