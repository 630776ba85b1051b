//! Human-readable listings of a map.

use std::fmt;

use hdfmap_tree::shape_repr;

use crate::map::HdfMap;
use crate::table::NameTable;

impl HdfMap {
    fn header(&self) -> String {
        format!("HdfMap based on '{}'", self.filename)
    }

    fn name_lines(&self, title: &str, table: &NameTable) -> String {
        let mut out = format!("{title}:\n");
        for (name, path) in table.iter() {
            let shape = self.datasets.get(path).map(|d| shape_repr(&d.shape)).unwrap_or_default();
            out.push_str(&format!("{name:>20}: {shape:12} : {path}\n"));
        }
        out
    }

    /// Groups with their class tags, then the class index.
    pub fn info_groups(&self) -> String {
        let mut out = format!("{}\nGroups:\n", self.header());
        for group in self.groups.values() {
            out.push_str(&format!(
                "{:>40}: {} ({} datasets)\n",
                group.path,
                group.class_tag,
                group.child_dataset_names.len()
            ));
        }
        out.push_str("Classes:\n");
        for (class, paths) in self.classes.iter() {
            out.push_str(&format!("{class:>20}: {}\n", paths.join(", ")));
        }
        out
    }

    /// Every indexed dataset with dtype, shape and aliases.
    pub fn info_datasets(&self) -> String {
        let mut out = format!("{}\nDatasets:\n", self.header());
        for ds in self.datasets.values() {
            out.push_str(&format!(
                "{:>40}: {} {} [{}]\n",
                ds.path,
                ds.dtype,
                shape_repr(&ds.shape),
                ds.alias_names.join(", ")
            ));
        }
        out
    }

    /// The combined namespace.
    pub fn info_names(&self) -> String {
        self.name_lines("Combined Namespace", &self.combined)
    }

    pub fn info_scannables(&self) -> String {
        let title = match self.scan_length {
            Some(n) => format!("Scannables Namespace (length {n})"),
            None => "Scannables Namespace".to_string(),
        };
        self.name_lines(&title, &self.scannables)
    }
}

impl fmt::Display for HdfMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        writeln!(
            f,
            "  {} groups, {} datasets, {} values, {} arrays, {} scannables, {} images",
            self.groups.len(),
            self.datasets.len(),
            self.values.len(),
            self.arrays.len(),
            self.scannables.len(),
            self.image_data.len()
        )?;
        write!(f, "{}", self.info_names())
    }
}

#[cfg(test)]
mod tests {
    use crate::map::HdfMap;
    use hdfmap_tree::FileBuilder;

    #[test]
    fn listings_mention_every_name() {
        let mut f = FileBuilder::new();
        let mut g = f.create_group("scan");
        g.create_dataset("x").with_f64_data(&[1.0, 2.0]);
        g.create_dataset("y").with_f64_data(&[3.0, 4.0]);
        f.add_group(g.finish());
        let file = f.finish("listing.h5").unwrap();
        let mut map = HdfMap::new();
        map.populate(&file).unwrap();

        let text = map.to_string();
        assert!(text.starts_with("HdfMap based on 'listing.h5'"));
        assert!(text.contains("/scan/x"));
        assert!(map.info_scannables().contains("(length 2)"));
        assert!(map.info_groups().contains("/scan: Group (2 datasets)"));
        assert!(map.info_datasets().contains("float64 (2,)"));
    }
}
