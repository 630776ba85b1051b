//! NeXus conventions for [`hdfmap`].
//!
//! [`NexusPolicy`] populates an [`HdfMap`] from the defaults a NeXus file
//! declares: the default `NXentry`, its default data group with `axes` and
//! `signal` fields, `NXdetector` image stacks and an optional `scan_fields`
//! list.
//!
//! ```
//! use hdfmap_nexus::{create_nexus_map, NexusOptions};
//! use hdfmap_tree::{AttrValue, FileBuilder, MemoryStore};
//!
//! let mut b = FileBuilder::new();
//! let mut entry = b.create_group("entry");
//! entry.set_attr("NX_class", AttrValue::String("NXentry".into()));
//! let mut data = entry.create_group("measurement");
//! data.set_attr("NX_class", AttrValue::String("NXdata".into()));
//! data.set_attr("signal", AttrValue::String("sum".into()));
//! data.set_attr("axes", AttrValue::String("x".into()));
//! data.create_dataset("x").with_f64_data(&[1.0, 2.0, 3.0]);
//! data.create_dataset("sum").with_f64_data(&[4.0, 5.0, 6.0]);
//! entry.add_group(data.finish());
//! b.add_group(entry.finish());
//! let store = MemoryStore::new().with(b.finish("1.nxs").unwrap());
//!
//! let map = create_nexus_map(&store, "1.nxs", NexusOptions::default()).unwrap();
//! assert_eq!(map.get_path("signal"), Some("/entry/measurement/sum"));
//! assert_eq!(map.get_path("axes"), Some("/entry/measurement/x"));
//! ```

pub mod conventions;
pub mod policy;

use hdfmap::{populate_from, HdfMap, Result};
use hdfmap_tree::Opener;

pub use conventions::{
    default_axes_and_signal, default_data_group, default_entry, default_image_source, entries, register_numbered,
    scan_fields,
};
pub use policy::{NexusOptions, NexusPolicy};

/// NeXus map of the container at `location`.
pub fn create_nexus_map(opener: &dyn Opener, location: &str, options: NexusOptions) -> Result<HdfMap> {
    populate_from(opener, location, HdfMap::new(), &NexusPolicy::new(options))
}
