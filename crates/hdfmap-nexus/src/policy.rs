//! The NeXus convention policy.

use hdfmap::{ConventionPolicy, HdfMap, Result};
use hdfmap_tree::{base_name, Container};
use tracing::{debug, info, warn};

use crate::conventions::{
    default_axes_and_signal, default_data_group, default_entry, default_image_source, entries, register_numbered,
    scan_fields, AXES_ATTR, SIGNAL_ATTR,
};

/// Options for [`NexusPolicy`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NexusOptions {
    /// Inside each entry, only index these groups (by name or class tag).
    /// Falls back to the map's own `groups` option.
    pub groups: Option<Vec<String>>,
    /// Index the default entry only, instead of every `NXentry`.
    pub default_entry_only: bool,
    /// Limit scannables from the data group to its declared axes and signals.
    pub restrict_scannables_to_defaults: bool,
}

impl NexusOptions {
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

    pub fn default_entry_only(mut self, only: bool) -> Self {
        self.default_entry_only = only;
        self
    }

    pub fn restrict_scannables_to_defaults(mut self, restrict: bool) -> Self {
        self.restrict_scannables_to_defaults = restrict;
        self
    }
}

/// Populates a map using NeXus defaults.
///
/// 1. Index the default entry, or every entry.
/// 2. Register the default data group's `axes`/`signal` fields.
/// 3. Scannables from `scan_fields`, else from the data group, else the
///    generic most-common-size rule.
/// 4. Images from `NXdetector` groups, else by shape.
#[derive(Debug, Clone, Default)]
pub struct NexusPolicy {
    options: NexusOptions,
}

impl NexusPolicy {
    pub fn new(options: NexusOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &NexusOptions {
        &self.options
    }

    fn resolve_scannables(
        &self,
        map: &mut HdfMap,
        container: &dyn Container,
        entry: &str,
        data_group: Option<&str>,
        declared: &[String],
    ) -> Result<()> {
        if let Some(fields) = scan_fields(map, container, entry) {
            if map.resolve_scannables_from_names(&fields) {
                debug!(entry, "scannables from scan_fields");
                return Ok(());
            }
            warn!(entry, "scan_fields names no arrays, using the data group");
        }
        if let Some(group) = data_group {
            let names: Option<Vec<String>> = self
                .options
                .restrict_scannables_to_defaults
                .then(|| declared.iter().map(|p| base_name(p).to_string()).collect());
            if map.resolve_scannables_from_group(group, names.as_deref()) {
                debug!(group, "scannables from data group");
                return Ok(());
            }
        }
        warn!(entry, "no scannables from NeXus defaults, using the most common array size");
        map.generate_scannables()?;
        Ok(())
    }
}

impl ConventionPolicy for NexusPolicy {
    fn name(&self) -> &str {
        "nexus"
    }

    fn populate(&self, map: &mut HdfMap, container: &dyn Container) -> Result<()> {
        let entry = default_entry(container)?;
        let groups = self.options.groups.clone().or_else(|| map.options().groups.clone());
        let indexed = if self.options.default_entry_only { vec![entry.clone()] } else { entries(container) };
        for path in &indexed {
            map.index(container, path, groups.as_deref())?;
        }
        info!(entry = %entry, entries = indexed.len(), "indexed NeXus entries");

        let data_group = default_data_group(container, &entry);
        let mut declared = Vec::new();
        if let Some(group) = &data_group {
            let (axes, signals) = default_axes_and_signal(container, group);
            register_numbered(map, AXES_ATTR, &axes);
            register_numbered(map, SIGNAL_ATTR, &signals);
            declared.extend(signals);
            declared.extend(axes);
        }

        self.resolve_scannables(map, container, &entry, data_group.as_deref(), &declared)?;

        map.clear_images();
        if default_image_source(map) == 0 {
            warn!(entry = %entry, "no NXdetector images, classifying images by shape");
            map.classify_images();
        }
        map.set_default_image();
        map.merge_combined();
        Ok(())
    }
}
