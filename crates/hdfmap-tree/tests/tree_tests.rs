use hdfmap_tree::{
    AttrValue, Container, DType, FileBuilder, LinkKind, Node, Opener, RawData, Selection, SliceArg, TreeError,
};

fn detector_file() -> hdfmap_tree::MemoryFile {
    let mut b = FileBuilder::new();
    let mut entry = b.create_group("entry");
    entry.set_attr("NX_class", AttrValue::String("NXentry".into()));
    let mut det = entry.create_group("detector");
    det.set_attr("NX_class", AttrValue::String("NXdetector".into()));
    det.create_dataset("data")
        .with_f64_data(&(0..24).map(|v| v as f64).collect::<Vec<_>>())
        .with_shape(&[2, 3, 4])
        .set_attr("units", AttrValue::String("counts".into()));
    det.create_dataset("mode").with_strings(&["fast", "slow"]);
    det.create_dataset("gain").with_i64_value(3).with_dtype(DType::I32);
    entry.add_group(det.finish());
    entry.soft_link("frames", "/entry/detector/data");
    entry.soft_link("loop_a", "/entry/loop_b");
    entry.soft_link("loop_b", "/entry/loop_a");
    b.add_group(entry.finish());
    b.finish("det.nxs").unwrap()
}

#[test]
fn reads_through_soft_links_with_selections() {
    let file = detector_file();
    assert_eq!(file.link_kind("/entry/frames"), Some(LinkKind::Soft));
    let sel = Selection::new(vec![SliceArg::Index(1), SliceArg::Ellipsis, SliceArg::range(None, None, Some(2))]);
    let data = file.read("/entry/frames", &sel).unwrap();
    assert_eq!(data.shape(), &[3, 2]);
    let values: Vec<f64> = data.to_f64().unwrap().iter().copied().collect();
    assert_eq!(values, vec![12.0, 14.0, 16.0, 18.0, 20.0, 22.0]);
}

#[test]
fn metadata_without_reading() {
    let file = detector_file();
    let info = file.dataset_info("/entry/frames").unwrap();
    assert_eq!(info.path, "/entry/detector/data");
    assert_eq!((info.ndim(), info.size()), (3, 24));
    assert_eq!(info.attr("units").and_then(AttrValue::to_text).as_deref(), Some("counts"));

    let gain = file.dataset_info("/entry/detector/gain").unwrap();
    assert_eq!((gain.ndim(), gain.dtype), (0, DType::I32));
    assert!(matches!(file.dataset_info("/entry/detector"), Err(TreeError::NotADataset(_))));
}

#[test]
fn text_datasets_keep_strings() {
    let file = detector_file();
    match file.read("/entry/detector/mode", &Selection::index(-1)).unwrap() {
        RawData::Text(a) => assert_eq!(a.iter().next().map(String::as_str), Some("slow")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn link_cycles_stop() {
    let file = detector_file();
    assert!(matches!(file.get("/entry/loop_a"), Err(TreeError::LinkDepth(_))));
    match file.get("/entry").unwrap() {
        Some(Node::Group(g)) => assert_eq!(g.children.len(), 4),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn out_of_range_selection_is_an_error() {
    let store = hdfmap_tree::MemoryStore::new().with(detector_file());
    let container = store.open("det.nxs").unwrap();
    let handle = container.dataset("/entry/detector/data").unwrap();
    drop(container);
    assert_eq!(store.live_count(), 0);
    assert!(matches!(handle.read(&Selection::index(2)), Err(TreeError::IndexOutOfBounds { .. })));
    let too_many = Selection::new(vec![SliceArg::Index(0); 4]);
    assert!(matches!(handle.read(&too_many), Err(TreeError::TooManyIndices { .. })));
}
