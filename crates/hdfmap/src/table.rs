//! Insertion-ordered name tables.

use std::collections::HashMap;

/// A map that iterates in first-insertion order.
///
/// Re-inserting a key replaces its value but keeps its original position,
/// so a later write wins without reordering the table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

/// Name to dataset path.
pub type NameTable = Table<String>;

impl<V> Table<V> {
    pub fn new() -> Self {
        Table { entries: Vec::new(), index: HashMap::new() }
    }

    /// Insert or replace; returns the replaced value.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    /// Value for `key`, inserting `make()` first if absent.
    pub fn get_or_insert_with(&mut self, key: &str, make: impl FnOnce() -> V) -> &mut V {
        let i = match self.index.get(key) {
            Some(&i) => i,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), make()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[i].1
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn first(&self) -> Option<(&str, &V)> {
        self.entries.first().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Table<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Table::new();
        for (k, v) in iter {
            table.insert(k, v);
        }
        table
    }
}

impl<V> IntoIterator for Table<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_write_wins_in_place() {
        let mut t = NameTable::new();
        t.insert("eta", "/entry/before_scan/eta".to_string());
        t.insert("mu", "/entry/mu".to_string());
        let old = t.insert("eta", "/entry/measurement/eta".to_string());
        assert_eq!(old.as_deref(), Some("/entry/before_scan/eta"));
        assert_eq!(t.get("eta").map(String::as_str), Some("/entry/measurement/eta"));
        assert_eq!(t.keys().collect::<Vec<_>>(), vec!["eta", "mu"]);
    }

    #[test]
    fn get_or_insert_appends_once() {
        let mut t: Table<Vec<String>> = Table::new();
        t.get_or_insert_with("NXentry", Vec::new).push("/entry".into());
        t.get_or_insert_with("NXentry", Vec::new).push("/entry2".into());
        assert_eq!(t.len(), 1);
        assert_eq!(t.get("NXentry").map(Vec::len), Some(2));
        t.clear();
        assert!(t.is_empty());
        assert!(!t.contains_key("NXentry"));
    }
}
