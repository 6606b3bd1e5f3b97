//! The two-taxonomy record tree.
//!
//! Both the persisted state file and the bucketed catalog share one shape:
//! `{ "Project": { parent: { child: T } }, "Plugin": { ... } }`. A root entry
//! is keyed under itself (`parent == child`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::{CatalogEntry, InstalledRecord};
use crate::types::Taxonomy;

/// Child records of one root, keyed by child name.
pub type Bucket<T> = BTreeMap<String, T>;

/// Generic `Project`/`Plugin` tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree<T> {
    /// Project bundles by root name.
    #[serde(rename = "Project", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub project: BTreeMap<String, Bucket<T>>,
    /// Standalone plugins by root name.
    #[serde(rename = "Plugin", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub plugin: BTreeMap<String, Bucket<T>>,
}

/// Persisted install state.
pub type StateTree = Tree<InstalledRecord>;

/// Catalog grouped by taxonomy, each entry keyed under itself.
pub type CatalogTree = Tree<CatalogEntry>;

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self {
            project: BTreeMap::new(),
            plugin: BTreeMap::new(),
        }
    }
}

impl<T> Tree<T> {
    /// Empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when neither taxonomy has a root.
    pub fn is_empty(&self) -> bool {
        self.project.is_empty() && self.plugin.is_empty()
    }

    /// Roots of one taxonomy.
    pub fn taxonomy(&self, taxonomy: Taxonomy) -> &BTreeMap<String, Bucket<T>> {
        match taxonomy {
            Taxonomy::Project => &self.project,
            Taxonomy::Plugin => &self.plugin,
        }
    }

    /// Mutable roots of one taxonomy.
    pub fn taxonomy_mut(&mut self, taxonomy: Taxonomy) -> &mut BTreeMap<String, Bucket<T>> {
        match taxonomy {
            Taxonomy::Project => &mut self.project,
            Taxonomy::Plugin => &mut self.plugin,
        }
    }

    /// All children of one root.
    pub fn bucket(&self, taxonomy: Taxonomy, parent: &str) -> Option<&Bucket<T>> {
        self.taxonomy(taxonomy).get(parent)
    }

    /// One entry by its full key.
    pub fn get(&self, taxonomy: Taxonomy, parent: &str, child: &str) -> Option<&T> {
        self.bucket(taxonomy, parent)?.get(child)
    }

    /// Mutable entry by its full key.
    pub fn get_mut(&mut self, taxonomy: Taxonomy, parent: &str, child: &str) -> Option<&mut T> {
        self.taxonomy_mut(taxonomy).get_mut(parent)?.get_mut(child)
    }

    /// The root record of `name`, i.e. the entry keyed `name -> name`.
    pub fn root(&self, taxonomy: Taxonomy, name: &str) -> Option<&T> {
        self.get(taxonomy, name, name)
    }

    /// Insert an entry, creating the bucket if needed. Returns the replaced value.
    pub fn insert(&mut self, taxonomy: Taxonomy, parent: &str, child: &str, value: T) -> Option<T> {
        self.taxonomy_mut(taxonomy)
            .entry(parent.to_string())
            .or_default()
            .insert(child.to_string(), value)
    }

    /// Remove a root together with every child it brought in.
    pub fn remove_root(&mut self, taxonomy: Taxonomy, name: &str) -> Option<Bucket<T>> {
        self.taxonomy_mut(taxonomy).remove(name)
    }

    /// Remove one child; the bucket stays even if it becomes empty.
    pub fn remove_child(&mut self, taxonomy: Taxonomy, parent: &str, child: &str) -> Option<T> {
        self.taxonomy_mut(taxonomy).get_mut(parent)?.remove(child)
    }

    /// Every entry as `(taxonomy, parent, child, value)`, `Project` first.
    pub fn entries(&self) -> impl Iterator<Item = (Taxonomy, &str, &str, &T)> {
        Taxonomy::ALL.into_iter().flat_map(move |taxonomy| {
            self.taxonomy(taxonomy).iter().flat_map(move |(parent, bucket)| {
                bucket
                    .iter()
                    .map(move |(child, value)| (taxonomy, parent.as_str(), child.as_str(), value))
            })
        })
    }

    /// Number of entries across both taxonomies.
    pub fn len(&self) -> usize {
        self.project.values().chain(self.plugin.values()).map(BTreeMap::len).sum()
    }
}

impl CatalogTree {
    /// Group normalized entries by taxonomy, each keyed under itself.
    /// Ordinary modules have no taxonomy and are left out.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut tree = Self::new();
        for entry in entries {
            if let Some(taxonomy) = Taxonomy::for_type(entry.package_type) {
                let name = entry.name.clone();
                tree.insert(taxonomy, &name, &name, entry);
            }
        }
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PackageType;

    fn record(name: &str) -> InstalledRecord {
        InstalledRecord {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_taxonomies_are_omitted() {
        let mut tree = StateTree::new();
        assert_eq!(serde_json::to_string(&tree).unwrap(), "{}");

        tree.insert(Taxonomy::Plugin, "a", "a", record("a"));
        let json = serde_json::to_value(&tree).unwrap();
        assert!(json.get("Project").is_none());
        assert_eq!(json["Plugin"]["a"]["a"]["name"], "a");
    }

    #[test]
    fn test_root_removal_takes_children() {
        let mut tree = StateTree::new();
        tree.insert(Taxonomy::Project, "demo", "demo", record("demo"));
        tree.insert(Taxonomy::Project, "demo", "helper", record("helper"));
        tree.insert(Taxonomy::Plugin, "other", "other", record("other"));
        assert_eq!(tree.len(), 3);

        let removed = tree.remove_root(Taxonomy::Project, "demo").unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(tree.len(), 1);
        assert!(tree.root(Taxonomy::Plugin, "other").is_some());
    }

    #[test]
    fn test_entries_visit_project_first() {
        let mut tree = StateTree::new();
        tree.insert(Taxonomy::Plugin, "b", "b", record("b"));
        tree.insert(Taxonomy::Project, "a", "a", record("a"));
        let order: Vec<_> = tree.entries().map(|(t, _, c, _)| (t, c.to_string())).collect();
        assert_eq!(
            order,
            vec![(Taxonomy::Project, "a".into()), (Taxonomy::Plugin, "b".into())]
        );
    }

    #[test]
    fn test_catalog_grouping_skips_modules() {
        let entries = vec![
            CatalogEntry {
                name: "p".into(),
                package_type: PackageType::ProjectBundle,
                ..Default::default()
            },
            CatalogEntry {
                name: "q".into(),
                package_type: PackageType::StandalonePlugin,
                ..Default::default()
            },
            CatalogEntry {
                name: "m".into(),
                package_type: PackageType::OrdinaryModule,
                ..Default::default()
            },
        ];
        let tree = CatalogTree::from_entries(entries);
        assert!(tree.root(Taxonomy::Project, "p").is_some());
        assert!(tree.root(Taxonomy::Plugin, "q").is_some());
        assert_eq!(tree.len(), 2);
    }
}
