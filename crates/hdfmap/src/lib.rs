//! Flat identifier namespaces for hierarchical scientific data files.
//!
//! An [`HdfMap`] walks a container once and gives every dataset short
//! names: its identifier (`energy` for `/entry/sample/energy`), the
//! group-qualified and class-qualified forms, and any declared `local_name`.
//! Datasets are sorted into values, arrays, scannables (the arrays that share
//! the scan length) and images. The map is then reused for any container with
//! the same layout, to read data and evaluate expressions:
//!
//! ```
//! use hdfmap::{EvalOptions, HdfMap};
//! use hdfmap_expr::Value;
//! use hdfmap_tree::FileBuilder;
//!
//! let mut b = FileBuilder::new();
//! let mut scan = b.create_group("scan");
//! scan.create_dataset("eta").with_f64_data(&[1.0, 2.0, 3.0]);
//! scan.create_dataset("sum").with_f64_data(&[10.0, 20.0, 30.0]);
//! b.add_group(scan.finish());
//! let file = b.finish("1234.nxs").unwrap();
//!
//! let mut map = HdfMap::new();
//! map.populate(&file).unwrap();
//! assert_eq!(map.scannables_length(), Some(3));
//!
//! let total = map.evaluate(&file, "np.sum(sum) / len(eta)", &EvalOptions::default()).unwrap();
//! assert_eq!(total, Value::Float(20.0));
//! ```
//!
//! File conventions plug in through [`ConventionPolicy`]; [`GenericPolicy`]
//! is used by [`HdfMap::populate`]. Events are emitted with `tracing`, routed
//! to an injected [`Logger`] when one is set.

pub mod coerce;
pub mod data;
pub mod error;
pub mod eval;
pub mod identifier;
pub mod info;
pub mod loader;
pub mod logger;
pub mod map;
pub mod options;
pub mod policy;
pub mod roi;
pub mod table;

pub use coerce::{coerce, parse_datetime, round_string_floats, summarize};
pub use error::{Error, Result};
pub use eval::attr_to_value;
pub use identifier::{alias_names, expression_safe_name, generate_identifier};
pub use loader::{create_hdf_map, multi_eval, multi_format, multi_get_data, multi_get_image, populate_from, Loader};
pub use logger::Logger;
pub use map::{
    class_tag, is_image_shape, DatasetRecord, GroupRecord, HdfMap, CLASS_ATTR, DEFAULT_IMAGE, GENERIC_CLASS,
    LOCAL_NAME_ATTR,
};
pub use options::{EvalOptions, MapOptions, DEFAULT_SENTINEL};
pub use policy::{ConventionPolicy, GenericPolicy};
pub use roi::roi_macros;
pub use table::{NameTable, Table};
