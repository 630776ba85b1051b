//! NeXus policy against in-memory files laid out like beamline scans.

use std::io;
use std::sync::{Arc, Mutex};

use hdfmap::{ConventionPolicy, Error, EvalOptions, HdfMap, Logger, DEFAULT_IMAGE};
use hdfmap_expr::Value;
use hdfmap_nexus::{
    create_nexus_map, default_axes_and_signal, default_data_group, default_entry, NexusOptions, NexusPolicy,
};
use hdfmap_tree::{AttrValue, FileBuilder, GroupBuilder, MemoryFile, MemoryStore};

fn text(s: &str) -> AttrValue {
    AttrValue::String(s.into())
}

fn texts(items: &[&str]) -> AttrValue {
    AttrValue::StringArray(items.iter().map(|s| s.to_string()).collect())
}

fn entry_group(f: &mut FileBuilder, name: &str, points: usize) -> GroupBuilder {
    let mut entry = f.create_group(name);
    entry.set_attr("NX_class", text("NXentry"));
    entry.set_attr("default", text("data"));
    let at = |path: &str| format!("/{name}/{path}");

    let mut before = entry.create_group("before_scan");
    before.create_dataset("eta").with_f64_value(30.0);
    entry.add_group(before.finish());

    let ramp: Vec<f64> = (0..points).map(|i| i as f64).collect();
    let mut meas = entry.create_group("measurement");
    meas.set_attr("NX_class", text("NXcollection"));
    meas.create_dataset("eta").with_f64_data(&ramp);
    meas.create_dataset("sum").with_f64_data(&ramp.iter().map(|v| v * 10.0).collect::<Vec<_>>());
    meas.create_dataset("roi1_total").with_f64_data(&ramp);
    meas.create_dataset("short").with_f64_data(&[1.0, 2.0]);
    entry.add_group(meas.finish());

    let mut data = entry.create_group("data");
    data.set_attr("NX_class", text("NXdata"));
    data.set_attr("signal", text("sum"));
    data.set_attr("axes", texts(&["eta", "."]));
    data.set_attr("auxiliary_signals", texts(&["roi1_total", "missing"]));
    data.soft_link("eta", &at("measurement/eta"));
    data.soft_link("sum", &at("measurement/sum"));
    data.soft_link("roi1_total", &at("measurement/roi1_total"));
    entry.add_group(data.finish());

    let mut instrument = entry.create_group("instrument");
    instrument.set_attr("NX_class", text("NXinstrument"));
    let mut detector = instrument.create_group("pil3_100k");
    detector.set_attr("NX_class", text("NXdetector"));
    detector.create_dataset("count_time").with_f64_data(&vec![1.0; points]);
    detector.create_dataset("data")
        .with_f64_data(&vec![1.0; points * 10 * 12])
        .with_shape(&[points, 10, 12]);
    instrument.add_group(detector.finish());
    entry.add_group(instrument.finish());
    entry
}

fn i16_file(location: &str) -> MemoryFile {
    let mut f = FileBuilder::new();
    f.set_attr("default", text("entry1"));
    let entry1 = entry_group(&mut f, "entry1", 5);
    f.add_group(entry1.finish());
    let mut entry2 = f.create_group("entry2");
    entry2.set_attr("NX_class", text("NXentry"));
    entry2.create_dataset("only_in_two").with_f64_value(1.0);
    f.add_group(entry2.finish());
    f.finish(location).unwrap()
}

fn nexus_map(file: &MemoryFile, options: NexusOptions) -> HdfMap {
    let mut map = HdfMap::new();
    map.populate_with(&NexusPolicy::new(options), file).unwrap();
    map
}

#[test]
fn defaults_are_discovered() {
    let file = i16_file("i16.nxs");
    assert_eq!(default_entry(&file).unwrap(), "/entry1");
    assert_eq!(default_data_group(&file, "/entry1").as_deref(), Some("/entry1/data"));
    let (axes, signals) = default_axes_and_signal(&file, "/entry1/data");
    assert_eq!(axes, vec!["/entry1/data/eta"]);
    assert_eq!(signals, vec!["/entry1/data/sum", "/entry1/data/roi1_total"]);
}

#[test]
fn axes_and_signals_are_named() {
    let file = i16_file("i16.nxs");
    let map = nexus_map(&file, NexusOptions::default());
    assert_eq!(map.get_path("axes"), Some("/entry1/measurement/eta"));
    assert_eq!(map.get_path("axes0"), Some("/entry1/measurement/eta"));
    assert_eq!(map.get_path("signal"), Some("/entry1/measurement/sum"));
    assert_eq!(map.get_path("signal1"), Some("/entry1/measurement/roi1_total"));
    assert_eq!(map.evaluate(&file, "np.max(signal)", &EvalOptions::default()).unwrap(), Value::Float(40.0));
}

#[test]
fn scannables_come_from_the_data_group() {
    let file = i16_file("i16.nxs");
    let map = nexus_map(&file, NexusOptions::default());
    assert_eq!(map.scannables().keys().collect::<Vec<_>>(), vec!["eta", "sum", "roi1_total"]);
    assert_eq!(map.scannables_length(), Some(5));
    // count_time has the scan length but sits outside the data group
    assert!(!map.scannables().contains_key("count_time"));
    assert_eq!(map.get_path("eta"), Some("/entry1/measurement/eta"));

    let restricted = nexus_map(&file, NexusOptions::new().restrict_scannables_to_defaults(true));
    assert_eq!(restricted.scannables().len(), 3);
}

#[test]
fn detector_images() {
    let file = i16_file("i16.nxs");
    let map = nexus_map(&file, NexusOptions::default());
    let path = "/entry1/instrument/pil3_100k/data";
    assert_eq!(map.image_data().get("pil3_100k_data").map(String::as_str), Some(path));
    assert_eq!(map.get_image_path(), Some(path));
    assert_eq!(map.get_path(DEFAULT_IMAGE), Some(path));
}

#[test]
fn entry_selection() {
    let file = i16_file("i16.nxs");
    let all = nexus_map(&file, NexusOptions::default());
    assert!(all.get_path("only_in_two").is_some());
    let one = nexus_map(&file, NexusOptions::new().default_entry_only(true));
    assert!(one.get_path("only_in_two").is_none());

    let grouped = nexus_map(
        &file,
        NexusOptions::new().default_entry_only(true).with_groups(["measurement", "NXdata"]),
    );
    assert!(grouped.get_path("count_time").is_none());
    assert_eq!(grouped.scannables().len(), 3);
}

#[test]
fn scan_fields_drive_scannables() {
    let mut f = FileBuilder::new();
    let mut entry = entry_group(&mut f, "entry", 4);
    let mut scan = entry.create_group("diamond_scan");
    scan.create_dataset("scan_fields").with_strings(&["eta.eta", "pil3_100k.count_time"]);
    entry.add_group(scan.finish());
    f.add_group(entry.finish());
    let store = MemoryStore::new().with(f.finish("scan.nxs").unwrap());

    let map = create_nexus_map(&store, "scan.nxs", NexusOptions::default()).unwrap();
    assert_eq!(map.scannables().keys().collect::<Vec<_>>(), vec!["eta", "count_time"]);
    assert_eq!(store.live_count(), 0);
}

#[test]
fn missing_entry_is_fatal() {
    let mut f = FileBuilder::new();
    f.create_dataset("x").with_f64_data(&[1.0, 2.0]);
    let file = f.finish("plain.h5").unwrap();
    let mut map = HdfMap::new();
    let err = map.populate_with(&NexusPolicy::default(), &file).unwrap_err();
    assert!(matches!(err, Error::NoEntry { .. }), "{err:?}");
    assert_eq!(NexusPolicy::default().name(), "nexus");
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut out) = self.0.lock() {
            out.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn fallbacks_warn_through_the_injected_logger() {
    let mut f = FileBuilder::new();
    let mut entry = f.create_group("scan");
    entry.set_attr("NX_class", text("NXentry"));
    let mut group = entry.create_group("counters");
    group.create_dataset("x").with_f64_data(&[1.0, 2.0, 3.0]);
    group.create_dataset("y").with_f64_data(&[2.0, 4.0, 6.0]);
    entry.add_group(group.finish());
    f.add_group(entry.finish());
    let file = f.finish("bare.nxs").unwrap();

    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let mut map = HdfMap::new().with_logger(Logger::new(tracing::Dispatch::new(subscriber)));
    map.populate_with(&NexusPolicy::default(), &file).unwrap();

    assert_eq!(map.scannables_length(), Some(3));
    let log = capture.0.lock().map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
    assert!(log.contains("entry has no default data group"), "{log}");
    assert!(log.contains("using the most common array size"), "{log}");
    assert!(log.contains("no NXdetector images"), "{log}");
}
