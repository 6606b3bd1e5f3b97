//! Persisted install state.
//!
//! One JSON file per namespace holds the whole [`StateTree`]. Every operation
//! is a full read-modify-write of that file. Within a process the store
//! serializes its own sequences behind a mutex; across processes there is no
//! locking, so only one process may mutate a namespace at a time.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use extmarket_schema::{StateTree, Taxonomy};
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::StateError;
use crate::paths::Namespace;

/// The persisted install state file. Every mutation is a locked
/// read-modify-write followed by an atomic replace.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StateStore {
    /// Store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store for a namespace's state file.
    pub fn for_namespace(namespace: &Namespace) -> Self {
        Self::new(namespace.state_file())
    }

    /// Location of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted tree, creating an empty file when absent. A file
    /// that fails to parse is renamed to `<file>.<millis>` and replaced by an
    /// empty tree.
    pub fn read(&self) -> Result<StateTree, StateError> {
        let _guard = self.lock.lock().map_err(|_| StateError::Lock)?;
        self.read_value().and_then(into_tree)
    }

    /// Deep-merge `partial` into the stored tree, or replace the tree with it
    /// when `reset` is set. Returns the tree actually written.
    pub fn update<P: Serialize + ?Sized>(
        &self,
        partial: &P,
        reset: bool,
    ) -> Result<StateTree, StateError> {
        let _guard = self.lock.lock().map_err(|_| StateError::Lock)?;
        let partial = serde_json::to_value(partial)?;

        let next = if reset {
            partial
        } else {
            let mut current = self.read_value()?;
            deep_merge(&mut current, partial);
            current
        };

        self.write_value(&next)?;
        into_tree(next)
    }

    /// Remove a root and all of its children from one taxonomy.
    pub fn delete_root(&self, name: &str, taxonomy: Taxonomy) -> Result<StateTree, StateError> {
        let _guard = self.lock.lock().map_err(|_| StateError::Lock)?;
        let mut current = self.read_value()?;

        if let Some(bucket) = current
            .get_mut(taxonomy.as_str())
            .and_then(Value::as_object_mut)
        {
            bucket.remove(name);
        }

        self.write_value(&current)?;
        into_tree(current)
    }

    fn read_value(&self) -> Result<Value, StateError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty = empty_tree();
                self.write_value(&empty)?;
                return Ok(empty);
            }
            Err(e) => return Err(e.into()),
        };

        // Parse against the typed shape so a structurally wrong file heals too.
        match serde_json::from_slice::<StateTree>(&bytes) {
            Ok(_) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) => {
                let aside = self.aside_path();
                tracing::warn!(
                    "State file {} is corrupt ({e}); moved to {}",
                    self.path.display(),
                    aside.display()
                );
                std::fs::rename(&self.path, &aside)?;
                let empty = empty_tree();
                self.write_value(&empty)?;
                Ok(empty)
            }
        }
    }

    fn write_value(&self, value: &Value) -> Result<(), StateError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, value)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn aside_path(&self) -> PathBuf {
        let millis = chrono::Utc::now().timestamp_millis();
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{millis}"));
        PathBuf::from(name)
    }
}

fn empty_tree() -> Value {
    Value::Object(serde_json::Map::new())
}

fn into_tree(value: Value) -> Result<StateTree, StateError> {
    Ok(serde_json::from_value(value)?)
}

/// Recursive object merge. Objects merge key by key; every other value in
/// `patch` (arrays included) replaces the target wholesale.
pub fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extmarket_schema::{InstallStatus, InstalledRecord, RecordPatch, SubPlugin, Tree};
    use serde_json::json;

    fn store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::for_namespace(&Namespace::new(dir.path(), "TEST"));
        (dir, store)
    }

    fn record(name: &str, aversion: &str) -> InstalledRecord {
        InstalledRecord {
            name: name.to_string(),
            version: aversion.to_string(),
            aversion: aversion.to_string(),
            status: Some(InstallStatus::Installed),
            enable: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_deep_merge_replaces_arrays() {
        let mut target = json!({"a": {"b": 1, "list": [1, 2, 3]}, "keep": true});
        deep_merge(&mut target, json!({"a": {"c": 2, "list": [9]}}));
        assert_eq!(
            target,
            json!({"a": {"b": 1, "c": 2, "list": [9]}, "keep": true})
        );
    }

    #[test]
    fn test_read_absent_creates_empty_file() {
        let (_dir, store) = store();
        assert!(!store.path().exists());
        let tree = store.read().unwrap();
        assert!(tree.is_empty());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap().trim(), "{}");
    }

    #[test]
    fn test_corrupt_file_is_moved_aside() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), b"\x00{not json").unwrap();

        let tree = store.read().unwrap();
        assert!(tree.is_empty());

        let parent = store.path().parent().unwrap();
        let file_name = store.path().file_name().unwrap().to_string_lossy().to_string();
        let asides: Vec<_> = std::fs::read_dir(parent)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.starts_with(&format!("{file_name}.")))
            .collect();
        assert_eq!(asides.len(), 1);
        assert_eq!(
            std::fs::read(parent.join(&asides[0])).unwrap(),
            b"\x00{not json"
        );

        let fresh: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(fresh, json!({}));
    }

    #[test]
    fn test_update_merge_is_idempotent() {
        let (_dir, store) = store();
        let mut partial = StateTree::new();
        partial.insert(Taxonomy::Project, "demo", "demo", record("demo", "1.0.0"));
        partial.insert(Taxonomy::Project, "demo", "helper", record("helper", "1.0.0"));

        let once = store.update(&partial, false).unwrap();
        let twice = store.update(&partial, false).unwrap();
        assert_eq!(once, twice);
        assert_eq!(store.read().unwrap(), once);
    }

    #[test]
    fn test_update_merges_nested_keys() {
        let (_dir, store) = store();
        let mut first = StateTree::new();
        first.insert(Taxonomy::Plugin, "a", "a", record("a", "1.0.0"));
        store.update(&first, false).unwrap();

        let mut second = StateTree::new();
        second.insert(Taxonomy::Plugin, "b", "b", record("b", "2.0.0"));
        let merged = store.update(&second, false).unwrap();

        assert!(merged.root(Taxonomy::Plugin, "a").is_some());
        assert!(merged.root(Taxonomy::Plugin, "b").is_some());
    }

    #[test]
    fn test_patch_touches_only_named_fields() {
        let (_dir, store) = store();
        let mut rec = record("a", "1.0.0");
        rec.ide_deps = vec![SubPlugin {
            name: "x".into(),
            version: "^1.0.0".into(),
        }];
        let mut initial = StateTree::new();
        initial.insert(Taxonomy::Plugin, "a", "a", rec);
        store.update(&initial, false).unwrap();

        let mut patch: Tree<RecordPatch> = Tree::new();
        patch.insert(
            Taxonomy::Plugin,
            "a",
            "a",
            RecordPatch {
                status: InstallStatus::Outdate,
                enable: Some(false),
            },
        );
        let tree = store.update(&patch, false).unwrap();
        let updated = tree.root(Taxonomy::Plugin, "a").unwrap();
        assert_eq!(updated.status, Some(InstallStatus::Outdate));
        assert!(!updated.enable);
        assert_eq!(updated.aversion, "1.0.0");
        assert_eq!(updated.ide_deps.len(), 1);
    }

    #[test]
    fn test_reset_replaces_tree() {
        let (_dir, store) = store();
        let mut partial = StateTree::new();
        partial.insert(Taxonomy::Project, "demo", "demo", record("demo", "1.0.0"));
        store.update(&partial, false).unwrap();

        let tree = store.update(&StateTree::new(), true).unwrap();
        assert!(tree.is_empty());
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn test_delete_root_removes_children() {
        let (_dir, store) = store();
        let mut partial = StateTree::new();
        partial.insert(Taxonomy::Project, "demo", "demo", record("demo", "1.0.0"));
        partial.insert(Taxonomy::Project, "demo", "helper", record("helper", "1.0.0"));
        partial.insert(Taxonomy::Plugin, "demo", "demo", record("demo", "1.0.0"));
        store.update(&partial, false).unwrap();

        let tree = store.delete_root("demo", Taxonomy::Project).unwrap();
        assert!(tree.bucket(Taxonomy::Project, "demo").is_none());
        assert!(tree.root(Taxonomy::Plugin, "demo").is_some());
    }
}
