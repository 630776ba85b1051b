//! NeXus default-discovery rules.
//!
//! Each rule degrades to the next candidate with a warning. Only a missing
//! `NXentry` is an error.

use hdfmap::{class_tag, generate_identifier, Error, HdfMap, Result};
use hdfmap_tree::{base_name, join_path, Container, Node, RawData, Selection};
use tracing::{debug, warn};

pub const NX_ENTRY: &str = "NXentry";
pub const NX_DATA: &str = "NXdata";
pub const NX_DETECTOR: &str = "NXdetector";

/// Group attribute naming the default child.
pub const DEFAULT_ATTR: &str = "default";
pub const AXES_ATTR: &str = "axes";
pub const SIGNAL_ATTR: &str = "signal";
pub const AUXILIARY_SIGNALS_ATTR: &str = "auxiliary_signals";

/// Conventional name of the measurement group.
pub const MEASUREMENT: &str = "measurement";
/// Conventional name of a detector's image dataset.
pub const DETECTOR_DATA: &str = "data";
/// Dataset listing the fields written at each scan point.
pub const SCAN_FIELDS: &str = "scan_fields";

/// Placeholder for an axis without a dataset.
const NO_AXIS: &str = ".";

fn group_class(container: &dyn Container, path: &str) -> Option<String> {
    match container.get(path) {
        Ok(Some(Node::Group(g))) => Some(class_tag(&g.attrs)),
        _ => None,
    }
}

fn is_dataset(container: &dyn Container, path: &str) -> bool {
    matches!(container.get(path), Ok(Some(Node::Dataset(_))))
}

fn child_groups(container: &dyn Container, path: &str) -> Vec<(String, String)> {
    let Ok(Some(Node::Group(group))) = container.get(path) else {
        return Vec::new();
    };
    group
        .children
        .iter()
        .filter_map(|child| {
            let child_path = join_path(path, child);
            group_class(container, &child_path).map(|class| (child_path, class))
        })
        .collect()
}

fn default_child(container: &dyn Container, path: &str) -> Option<String> {
    let node = container.get(path).ok().flatten()?;
    node.attrs().get(DEFAULT_ATTR).and_then(|a| a.to_text())
}

/// Every `NXentry` group directly under the root.
pub fn entries(container: &dyn Container) -> Vec<String> {
    child_groups(container, "/")
        .into_iter()
        .filter(|(_, class)| class == NX_ENTRY)
        .map(|(path, _)| path)
        .collect()
}

/// The root's `default` entry when it names an `NXentry`, else the first
/// `NXentry`.
pub fn default_entry(container: &dyn Container) -> Result<String> {
    if let Some(name) = default_child(container, "/") {
        let path = join_path("/", &name);
        if group_class(container, &path).as_deref() == Some(NX_ENTRY) {
            return Ok(path);
        }
        warn!(default = %name, "root default does not name an NXentry");
    }
    entries(container).into_iter().next().ok_or_else(|| Error::NoEntry {
        class: NX_ENTRY.to_string(),
        location: container.location().to_string(),
    })
}

/// The entry's `default` group, else its `measurement` group, else its
/// first `NXdata` group.
pub fn default_data_group(container: &dyn Container, entry: &str) -> Option<String> {
    match default_child(container, entry) {
        Some(name) => {
            let path = join_path(entry, &name);
            if group_class(container, &path).is_some() {
                return Some(path);
            }
            warn!(entry, default = %name, "entry default is not a group");
        }
        None => warn!(entry, "entry has no default data group"),
    }
    let measurement = join_path(entry, MEASUREMENT);
    if group_class(container, &measurement).is_some() {
        return Some(measurement);
    }
    warn!(entry, "entry has no measurement group");
    let first = child_groups(container, entry)
        .into_iter()
        .find(|(_, class)| class == NX_DATA)
        .map(|(path, _)| path);
    if first.is_none() {
        warn!(entry, "entry has no NXdata group");
    }
    first
}

fn attr_names(container: &dyn Container, group: &str, attr: &str) -> Vec<String> {
    match container.get(group) {
        Ok(Some(node)) => node.attrs().get(attr).and_then(|a| a.as_string_list()).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn existing_paths(container: &dyn Container, group: &str, names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| name != NO_AXIS && !name.is_empty())
        .filter_map(|name| {
            let path = join_path(group, &name);
            if is_dataset(container, &path) {
                Some(path)
            } else {
                warn!(group, name = %name, "declared field is not a dataset");
                None
            }
        })
        .collect()
}

/// Axes and signals declared on a data group, as paths under the group.
/// Signals are the `signal` field followed by any `auxiliary_signals`.
pub fn default_axes_and_signal(container: &dyn Container, data_group: &str) -> (Vec<String>, Vec<String>) {
    let axes = existing_paths(container, data_group, attr_names(container, data_group, AXES_ATTR));
    let mut signal_names = attr_names(container, data_group, SIGNAL_ATTR);
    signal_names.extend(attr_names(container, data_group, AUXILIARY_SIGNALS_ATTR));
    let signals = existing_paths(container, data_group, signal_names);
    debug!(data_group, ?axes, ?signals, "default axes and signals");
    (axes, signals)
}

/// Register `axes`, `axes1`, ... (`prefix` = `"axes"`) with `axes0` also
/// naming the first.
pub fn register_numbered(map: &mut HdfMap, prefix: &str, paths: &[String]) -> usize {
    let mut count = 0;
    for (i, path) in paths.iter().enumerate() {
        let name = if i == 0 { prefix.to_string() } else { format!("{prefix}{i}") };
        if map.register_array(&name, path) {
            count += 1;
            if i == 0 {
                map.register_array(&format!("{prefix}0"), path);
            }
        }
    }
    count
}

/// Register one image per `NXdetector` group: its `data` dataset when that
/// has the rank of an image stack, else the first dataset in the group with
/// that rank. Returns how many were found.
pub fn default_image_source(map: &mut HdfMap) -> usize {
    let min_rank = map.scan_rank().map_or(3, |r| r + 2);
    let detectors = map.get_class_paths(NX_DETECTOR).to_vec();
    let mut found = 0;
    for detector in detectors {
        let members = map.get_group_datasets(&detector).unwrap_or_default();
        let stack_rank = |path: &str| map.get_shape(path).is_some_and(|s| s.len() >= min_rank);
        let chosen = map
            .get_path(&join_path(&detector, DETECTOR_DATA))
            .filter(|&p| stack_rank(p))
            .map(str::to_string)
            .or_else(|| members.iter().find(|p| stack_rank(p.as_str())).cloned());
        let Some(path) = chosen else {
            debug!(detector = %detector, "detector has no image dataset");
            continue;
        };
        let name = format!("{}_{}", generate_identifier(&detector), generate_identifier(&path));
        if map.register_image(&name, &path) {
            found += 1;
        }
    }
    found
}

/// Field names listed by a `scan_fields` dataset in `entry`, with any
/// `class.` prefix removed.
pub fn scan_fields(map: &HdfMap, container: &dyn Container, entry: &str) -> Option<Vec<String>> {
    let prefix = format!("{}/", entry.trim_end_matches('/'));
    let path = map
        .datasets()
        .keys()
        .find(|p| p.starts_with(&prefix) && base_name(p) == SCAN_FIELDS)?
        .to_string();
    match container.read(&path, &Selection::all()) {
        Ok(RawData::Text(fields)) => Some(
            fields
                .iter()
                .map(|f| f.rsplit('.').next().unwrap_or(f.as_str()).trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
        ),
        Ok(_) => {
            warn!(path = %path, "scan_fields is not text");
            None
        }
        Err(e) => {
            warn!(path = %path, error = %e, "cannot read scan_fields");
            None
        }
    }
}
