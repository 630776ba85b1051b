//! End-to-end tests: build containers in memory, map them, evaluate against them.

use std::io;
use std::sync::{Arc, Mutex};

use hdfmap::{
    create_hdf_map, multi_eval, multi_format, multi_get_data, multi_get_image, EvalOptions, HdfMap, Loader, Logger, MapOptions,
    DEFAULT_IMAGE,
};
use hdfmap_expr::Value;
use hdfmap_tree::{AttrValue, FileBuilder, MemoryFile, MemoryStore, Selection};

const FRAMES: usize = 3;
const ROWS: usize = 100;
const COLS: usize = 80;

fn pixel(k: usize, i: usize, j: usize) -> f64 {
    (k * 7 + i * 3 + j) as f64
}

fn scan_file(location: &str, energy: f64) -> MemoryFile {
    let mut f = FileBuilder::new();
    let mut entry = f.create_group("entry");
    entry.set_attr("NX_class", AttrValue::String("NXentry".into()));

    let mut before = entry.create_group("before_scan");
    before.create_dataset("eta").with_f64_value(12.5);
    before.create_dataset("chi").with_f64_value(90.0);
    entry.add_group(before.finish());

    let mut meas = entry.create_group("measurement");
    meas.set_attr("NX_class", AttrValue::String("NXcollection".into()));
    meas.create_dataset("energy")
        .with_f64_value(energy)
        .set_attr("units", AttrValue::String("eV".into()));
    meas.create_dataset("eta")
        .with_f64_data(&[12.0, 12.5, 13.0])
        .set_attr("units", AttrValue::String("deg".into()));
    meas.create_dataset("sum").with_f64_data(&[5.0, 9.0, 4.0]);
    let mut pixels = Vec::with_capacity(FRAMES * ROWS * COLS);
    for k in 0..FRAMES {
        for i in 0..ROWS {
            for j in 0..COLS {
                pixels.push(pixel(k, i, j));
            }
        }
    }
    meas.create_dataset("frames").with_f64_data(&pixels).with_shape(&[FRAMES, ROWS, COLS]);
    meas.soft_link("broken", "/entry/not_here");
    entry.add_group(meas.finish());

    f.add_group(entry.finish());
    f.finish(location).unwrap()
}

fn mapped(file: &MemoryFile) -> HdfMap {
    let mut map = HdfMap::new();
    map.populate(file).unwrap();
    map
}

// ---------------------------------------------------------------------------
// Namespace
// ---------------------------------------------------------------------------

#[test]
fn scalar_dataset_evaluates_to_its_value() {
    let file = scan_file("1234.nxs", 3.58);
    let map = mapped(&file);
    assert_eq!(map.evaluate(&file, "energy", &EvalOptions::default()).unwrap(), Value::Float(3.58));
}

#[test]
fn later_dataset_with_same_name_wins() {
    let file = scan_file("1234.nxs", 3.58);
    let map = mapped(&file);
    assert_eq!(map.get_path("eta"), Some("/entry/measurement/eta"));
    assert_eq!(map.get_path("before_scan_eta"), Some("/entry/before_scan/eta"));
    // value and scannable share a name; the scannable takes it
    assert!(map.values().contains_key("eta"));
    assert_eq!(map.combined().get("eta"), map.scannables().get("eta"));
}

#[test]
fn combined_names_point_at_datasets() {
    let file = scan_file("1234.nxs", 3.58);
    let map = mapped(&file);
    for name in map.combined().keys() {
        let path = map.get_path(name).unwrap();
        assert!(map.datasets().contains_key(path) || map.image_data().values().any(|p| p == path), "{name}");
    }
}

#[test]
fn scannables_share_the_scan_length() {
    let file = scan_file("1234.nxs", 3.58);
    let map = mapped(&file);
    let length = map.scannables_length().unwrap();
    assert_eq!(length, 3);
    for path in map.scannables().values() {
        assert_eq!(map.get_shape(path).unwrap()[0], length);
    }
    assert_eq!(map.get_image_path(), Some("/entry/measurement/frames"));
    assert!(map.combined().contains_key(DEFAULT_IMAGE));
}

#[test]
fn explicit_scan_length_overrides_the_mode() {
    let file = scan_file("1234.nxs", 3.58);
    let mut map = HdfMap::new().with_options(MapOptions::new().with_scan_length(FRAMES * ROWS * COLS));
    map.populate(&file).unwrap();
    assert_eq!(map.scannables().keys().collect::<Vec<_>>(), vec!["frames"]);
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[test]
fn missing_names_take_the_default() {
    let file = scan_file("1234.nxs", 3.58);
    let map = mapped(&file);
    let tolerant = EvalOptions::tolerant();
    assert_eq!(map.evaluate(&file, "no_such_thing", &tolerant).unwrap(), Value::from("--"));
    let custom = EvalOptions::tolerant().with_default(0.0);
    assert_eq!(map.evaluate(&file, "no_such_thing + 1", &custom).unwrap(), Value::Float(1.0));
}

#[test]
fn alternation_falls_through_to_the_last_choice() {
    let file = scan_file("1234.nxs", 3.58);
    let map = mapped(&file);
    let eval = |e: &str| map.evaluate(&file, e, &EvalOptions::default()).unwrap();
    assert_eq!(eval("(foo|bar?(5))"), Value::Int(5));
    assert_eq!(eval("(foo|energy|sum)"), Value::Float(3.58));
    assert_eq!(eval("(foo|bar|'none')"), Value::from("none"));
    assert_eq!(eval("np.max((foo|sum))"), Value::Float(9.0));
}

#[test]
fn format_renders_fields() {
    let file = scan_file("1234.nxs", 3.58);
    let map = mapped(&file);
    let text = map.format(&file, "{filename}: {energy:.2f} eV", &EvalOptions::default()).unwrap();
    assert_eq!(text, "1234.nxs: 3.58 eV");
    let text = map
        .format(&file, "eta={np.mean(eta):.2f} {eta@units} {{raw}}", &EvalOptions::default())
        .unwrap();
    assert_eq!(text, "eta=12.50 deg {raw}");
}

#[test]
fn named_expressions_expand() {
    let file = scan_file("1234.nxs", 3.58);
    let mut map = mapped(&file);
    map.add_local("scale", 2).unwrap();
    map.add_named_expression("norm_sum", "sum / np.max(sum) * scale").unwrap();
    let value = map.evaluate(&file, "norm_sum[1]", &EvalOptions::default()).unwrap();
    assert_eq!(value, Value::Float(2.0));
}

#[test]
fn roi_total_sums_each_frame() {
    let file = scan_file("1234.nxs", 3.58);
    let mut map = mapped(&file);
    map.add_roi("nroi", 50, 40, 20, 10, None).unwrap();

    let total = map.evaluate(&file, "nroi_total", &EvalOptions::default()).unwrap();
    let total = total.as_array().expect("array of sums").clone();
    assert_eq!(total.shape(), &[FRAMES]);

    let expected: Vec<f64> = (0..FRAMES)
        .map(|k| (40..60).flat_map(|i| (35..45).map(move |j| pixel(k, i, j))).sum())
        .collect();
    assert_eq!(total.iter().copied().collect::<Vec<_>>(), expected);
    let best = expected.iter().copied().fold(f64::MIN, f64::max);
    let max = map.evaluate(&file, "np.max(nroi_total)", &EvalOptions::default()).unwrap();
    assert_eq!(max, Value::Float(best));

    let window = map.evaluate(&file, "nroi", &EvalOptions::default()).unwrap();
    assert_eq!(window.shape(), vec![FRAMES, 20, 10]);
    let rmbkg = map.evaluate(&file, "nroi_rmbkg", &EvalOptions::default()).unwrap();
    assert_eq!(rmbkg.shape(), vec![FRAMES]);
    let corners = map.evaluate(&file, "nroi_box", &EvalOptions::default()).unwrap();
    assert_eq!(corners.to_string(), "((40, 35), (40, 45), (60, 45), (60, 35))");
}

#[test]
fn roi_centre_can_use_namespace_values() {
    let file = scan_file("1234.nxs", 3.58);
    let mut map = mapped(&file);
    map.add_local("cen", 50).unwrap();
    map.add_roi("r", "cen", "cen - 10", 20, 10, None).unwrap();
    let fixed = {
        let mut m = mapped(&file);
        m.add_roi("r", 50, 40, 20, 10, None).unwrap();
        m.evaluate(&file, "r_total", &EvalOptions::default()).unwrap()
    };
    assert_eq!(map.evaluate(&file, "r_total", &EvalOptions::default()).unwrap(), fixed);
}

#[test]
fn handles_read_partially() {
    let file = scan_file("1234.nxs", 3.58);
    let map = mapped(&file);
    let v = map.evaluate(&file, "d_frames[1, 2, 3]", &EvalOptions::default()).unwrap();
    assert_eq!(v, Value::Float(pixel(1, 2, 3)));
    let image = map.get_image(&file, Some(&Selection::index(2))).unwrap().unwrap();
    assert_eq!(image.shape(), vec![ROWS, COLS]);
}

#[test]
fn non_ascii_names_evaluate() {
    let mut f = FileBuilder::new();
    let mut scan = f.create_group("scan");
    scan.create_dataset("température").with_f64_data(&[280.0, 290.0, 300.0]);
    scan.create_dataset("sum").with_f64_data(&[1.0, 2.0, 3.0]);
    f.add_group(scan.finish());
    let file = f.finish("temp.h5").unwrap();

    let mut map = mapped(&file);
    assert_eq!(map.scannables().keys().collect::<Vec<_>>(), vec!["température", "sum"]);
    assert_eq!(map.evaluate(&file, "np.max(température)", &EvalOptions::default()).unwrap(), Value::Float(300.0));
    map.add_local("Δt", 2.0).unwrap();
    assert_eq!(map.evaluate(&file, "sum[-1] * Δt", &EvalOptions::default()).unwrap(), Value::Float(6.0));
    assert_eq!(map.format(&file, "{_température}", &EvalOptions::default()).unwrap(), "/scan/température");
}

// ---------------------------------------------------------------------------
// Loader and logging
// ---------------------------------------------------------------------------

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

impl Capture {
    fn text(&self) -> String {
        self.0.lock().map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default()
    }
}

fn capturing_logger(capture: &Capture) -> Logger {
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    Logger::new(tracing::Dispatch::new(subscriber))
}

#[test]
fn injected_logger_sees_broken_links() {
    let file = scan_file("1234.nxs", 3.58);
    let capture = Capture::default();
    let mut map = HdfMap::new().with_logger(capturing_logger(&capture));
    map.populate(&file).unwrap();
    let text = capture.text();
    assert!(text.contains("skipping unreadable node"), "{text}");
    assert!(text.contains("/entry/measurement/broken"), "{text}");
    assert!(text.contains("populated map"), "{text}");
}

#[test]
fn tolerant_errors_are_logged() {
    let file = scan_file("1234.nxs", 3.58);
    let capture = Capture::default();
    let map = mapped(&file).with_logger(capturing_logger(&capture));
    let value = map.evaluate(&file, "sum + 'text'", &EvalOptions::tolerant()).unwrap();
    assert!(matches!(value, Value::Text(ref s) if s.starts_with("error: ")));
    assert!(capture.text().contains("evaluation failed"));
}

#[test]
fn loader_releases_the_container_every_call() {
    let store = MemoryStore::new().with(scan_file("1234.nxs", 3.58));
    let loader = Loader::new(&store, "1234.nxs").unwrap();
    assert_eq!(store.live_count(), 0);

    assert_eq!(loader.eval("energy").unwrap(), Value::Float(3.58));
    assert_eq!(store.live_count(), 0);

    assert!(loader.eval("sum + 'x'").is_err());
    assert!(loader.eval("energy +").is_err());
    assert_eq!(store.live_count(), 0);

    assert_eq!(loader.format("{energy} {energy@units}").unwrap(), "3.58 eV");
    assert_eq!(loader.get_string("energy", true).unwrap().as_deref(), Some("3.58 eV"));
    assert_eq!(loader.get_scannables().unwrap().len(), 2);
    assert!(loader.get_metadata().unwrap().contains_key("chi"));
    assert!(loader.summary().unwrap().contains("/entry/measurement/energy: 3.58"));
    assert_eq!(store.live_count(), 0);
    assert_eq!(store.open_count(), 9);
}

#[test]
fn one_map_many_files() {
    let store = MemoryStore::new()
        .with(scan_file("1.nxs", 3.58))
        .with(scan_file("2.nxs", 4.0));
    let map = create_hdf_map(&store, "1.nxs").unwrap();
    let files = ["1.nxs", "2.nxs"];

    let energies = multi_eval(&store, &map, &files, "energy", &EvalOptions::default()).unwrap();
    assert_eq!(energies, vec![Value::Float(3.58), Value::Float(4.0)]);

    let titles = multi_format(&store, &map, &files, "{filename}={energy}", &EvalOptions::default()).unwrap();
    assert_eq!(titles, vec!["1.nxs=3.58", "2.nxs=4.0"]);

    let sums = multi_get_data(&store, &map, &files, "sum", &Selection::index(0), false).unwrap();
    assert_eq!(sums, vec![Some(Value::Float(5.0)), Some(Value::Float(5.0))]);

    let middles = multi_get_image(&store, &map, &files, None).unwrap();
    assert_eq!(middles.len(), 2);
    for image in &middles {
        let image = image.as_ref().unwrap();
        assert_eq!(image.shape(), vec![ROWS, COLS]);
        assert_eq!(image.as_array().unwrap()[[2, 3]], pixel(1, 2, 3));
    }
    let last = multi_get_image(&store, &map, &files, Some(&Selection::index(-1))).unwrap();
    assert_eq!(last[1].as_ref().unwrap().as_array().unwrap()[[0, 0]], pixel(2, 0, 0));
    assert_eq!(store.live_count(), 0);

    assert!(multi_eval(&store, &map, &["missing.nxs"], "energy", &EvalOptions::default()).is_err());
}
