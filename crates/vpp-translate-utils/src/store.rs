//! Mapping store: transaction-scoped key/value persistence for contexts.
//!
//! Every registry and context manager keeps its mappings in a
//! [`MappingContext`]. The reference implementation is [`MappingStore`], an
//! ordered in-memory map shared across transactions. Writers work through a
//! [`MappingTransaction`], which overlays its own puts and deletes on the
//! store (reads see them immediately) and applies them on [`commit`].
//!
//! Keys are structured ([`ContextKey`]); a delete removes the key and every
//! key below it, so dropping a parent scope drops its children.
//!
//! [`commit`]: MappingTransaction::commit

use crate::error::{ContextError, ContextResult};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Hierarchical key into the mapping store, e.g.
/// `naming-context/interface-context/mappings/eth0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextKey {
    segments: Vec<String>,
}

impl ContextKey {
    /// Creates a single-segment key.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            segments: vec![root.into()],
        }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a key one level below this one.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, i.e. the entry name within its parent.
    pub fn last(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// True if `prefix` is this key or one of its ancestors.
    pub fn starts_with(&self, prefix: &ContextKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// True if `prefix` is a strict ancestor of this key.
    pub fn is_under(&self, prefix: &ContextKey) -> bool {
        self.segments.len() > prefix.segments.len() && self.starts_with(prefix)
    }

    /// True if this key is exactly one level below `parent`.
    pub fn is_child_of(&self, parent: &ContextKey) -> bool {
        self.segments.len() == parent.segments.len() + 1 && self.starts_with(parent)
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Key/value access used by every context.
///
/// Implementations use interior mutability; a context takes `&dyn
/// MappingContext` and never holds on to it past one call.
pub trait MappingContext: Send + Sync {
    fn read(&self, key: &ContextKey) -> Option<Value>;

    /// Every entry strictly below `prefix`, in key order.
    fn list(&self, prefix: &ContextKey) -> Vec<(ContextKey, Value)>;

    fn put(&self, key: &ContextKey, value: Value);

    /// Removes `key` and everything below it.
    fn delete(&self, key: &ContextKey);
}

/// Typed access on top of [`MappingContext`].
pub trait MappingContextExt: MappingContext {
    fn read_as<T: DeserializeOwned>(&self, key: &ContextKey) -> ContextResult<Option<T>> {
        self.read(key).map(|value| decode(key, value)).transpose()
    }

    fn list_as<T: DeserializeOwned>(&self, prefix: &ContextKey) -> ContextResult<Vec<(ContextKey, T)>> {
        self.list(prefix)
            .into_iter()
            .map(|(key, value)| {
                let decoded = decode(&key, value)?;
                Ok((key, decoded))
            })
            .collect()
    }

    fn put_as<T: Serialize + ?Sized>(&self, key: &ContextKey, value: &T) -> ContextResult<()> {
        let encoded = serde_json::to_value(value).map_err(|source| ContextError::Codec {
            key: key.to_string(),
            source,
        })?;
        self.put(key, encoded);
        Ok(())
    }
}

impl<C: MappingContext + ?Sized> MappingContextExt for C {}

fn decode<T: DeserializeOwned>(key: &ContextKey, value: Value) -> ContextResult<T> {
    serde_json::from_value(value).map_err(|source| ContextError::Codec {
        key: key.to_string(),
        source,
    })
}

type Entries = BTreeMap<ContextKey, Value>;

fn remove_subtree(entries: &mut Entries, prefix: &ContextKey) {
    entries.retain(|key, _| !key.starts_with(prefix));
}

fn entries_under<'a>(
    entries: &'a Entries,
    prefix: &'a ContextKey,
) -> impl Iterator<Item = (ContextKey, Value)> + 'a {
    // Keys sharing a segment prefix are contiguous in key order.
    entries
        .range::<ContextKey, _>((Bound::Excluded(prefix), Bound::Unbounded))
        .take_while(move |(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.clone(), value.clone()))
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    key: ContextKey,
    value: Value,
}

const SNAPSHOT_VERSION: u32 = 1;

/// Durable mapping storage shared by all transactions.
///
/// Cloning yields another handle to the same storage. Used directly as a
/// [`MappingContext`] every write is applied immediately.
#[derive(Debug, Clone, Default)]
pub struct MappingStore {
    entries: Arc<RwLock<Entries>>,
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a transaction over this store.
    pub fn begin(&self) -> MappingTransaction {
        MappingTransaction {
            store: self.clone(),
            overlay: Mutex::new(Overlay::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Writes a JSON snapshot of every mapping to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> ContextResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ContextError::persistence(path, e))?;
        }

        let snapshot = {
            let entries = self.entries.read();
            Snapshot {
                version: SNAPSHOT_VERSION,
                entries: entries
                    .iter()
                    .map(|(key, value)| SnapshotEntry {
                        key: key.clone(),
                        value: value.clone(),
                    })
                    .collect(),
            }
        };

        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| ContextError::persistence(path, e))?;
        fs::write(path, json).map_err(|e| ContextError::persistence(path, e))?;

        debug!(path = %path.display(), entries = snapshot.entries.len(), "Saved mapping store snapshot");
        Ok(())
    }

    /// Loads a snapshot written by [`save`](Self::save), or returns an empty
    /// store if `path` does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> ContextResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No mapping store snapshot, starting empty");
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path).map_err(|e| ContextError::persistence(path, e))?;
        let snapshot: Snapshot =
            serde_json::from_str(&json).map_err(|e| ContextError::persistence(path, e))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(ContextError::persistence(
                path,
                format!("unsupported snapshot version {}", snapshot.version),
            ));
        }

        let entries: Entries = snapshot
            .entries
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect();
        debug!(path = %path.display(), entries = entries.len(), "Loaded mapping store snapshot");

        Ok(Self {
            entries: Arc::new(RwLock::new(entries)),
        })
    }
}

impl MappingContext for MappingStore {
    fn read(&self, key: &ContextKey) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn list(&self, prefix: &ContextKey) -> Vec<(ContextKey, Value)> {
        entries_under(&self.entries.read(), prefix).collect()
    }

    fn put(&self, key: &ContextKey, value: Value) {
        self.entries.write().insert(key.clone(), value);
    }

    fn delete(&self, key: &ContextKey) {
        remove_subtree(&mut self.entries.write(), key);
    }
}

/// Pending changes of one transaction.
///
/// A put that follows a delete of its subtree stays in `puts`; a delete
/// drops every earlier put below it. Applying all deletes before all puts is
/// therefore equivalent to replaying the operations in order.
#[derive(Debug, Default)]
struct Overlay {
    puts: Entries,
    deletes: Vec<ContextKey>,
}

impl Overlay {
    fn is_deleted(&self, key: &ContextKey) -> bool {
        self.deletes.iter().any(|prefix| key.starts_with(prefix))
    }
}

/// One transaction's view of a [`MappingStore`].
///
/// Reads see the transaction's own writes. Nothing reaches the store until
/// [`commit`](Self::commit); dropping the transaction discards its changes.
#[derive(Debug)]
pub struct MappingTransaction {
    store: MappingStore,
    overlay: Mutex<Overlay>,
}

impl MappingTransaction {
    /// Applies every pending change to the store atomically.
    pub fn commit(self) {
        let overlay = self.overlay.into_inner();
        let mut entries = self.store.entries.write();
        for prefix in &overlay.deletes {
            remove_subtree(&mut entries, prefix);
        }
        let puts = overlay.puts.len();
        entries.extend(overlay.puts);
        debug!(puts, deletes = overlay.deletes.len(), "Committed mapping transaction");
    }

    /// True if the transaction has no pending changes.
    pub fn is_clean(&self) -> bool {
        let overlay = self.overlay.lock();
        overlay.puts.is_empty() && overlay.deletes.is_empty()
    }
}

impl MappingContext for MappingTransaction {
    fn read(&self, key: &ContextKey) -> Option<Value> {
        let overlay = self.overlay.lock();
        if let Some(value) = overlay.puts.get(key) {
            return Some(value.clone());
        }
        if overlay.is_deleted(key) {
            return None;
        }
        self.store.read(key)
    }

    fn list(&self, prefix: &ContextKey) -> Vec<(ContextKey, Value)> {
        let overlay = self.overlay.lock();
        let mut merged: Entries = self
            .store
            .list(prefix)
            .into_iter()
            .filter(|(key, _)| !overlay.is_deleted(key))
            .collect();
        merged.extend(entries_under(&overlay.puts, prefix));
        merged.into_iter().collect()
    }

    fn put(&self, key: &ContextKey, value: Value) {
        self.overlay.lock().puts.insert(key.clone(), value);
    }

    fn delete(&self, key: &ContextKey) {
        let mut overlay = self.overlay.lock();
        remove_subtree(&mut overlay.puts, key);
        overlay.deletes.push(key.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn key(path: &str) -> ContextKey {
        ContextKey::from_segments(path.split('/'))
    }

    #[test]
    fn test_key_relations() {
        let root = key("naming-context/ifc/mappings");
        let entry = root.child("eth0");

        assert_eq!(entry.to_string(), "naming-context/ifc/mappings/eth0");
        assert_eq!(entry.last(), "eth0");
        assert!(entry.starts_with(&root));
        assert!(entry.is_under(&root));
        assert!(entry.is_child_of(&root));
        assert!(!root.is_under(&root));
        assert!(!entry.child("x").is_child_of(&root));
        // Segment-wise, not string-wise.
        assert!(!key("naming-context/ifc2/mappings").starts_with(&key("naming-context/ifc")));
    }

    #[test]
    fn test_list_is_strictly_under_prefix() {
        let store = MappingStore::new();
        store.put(&key("a"), json!(0));
        store.put(&key("a/x"), json!(1));
        store.put(&key("a/y/z"), json!(2));
        store.put(&key("ab"), json!(3));
        store.put(&key("b/x"), json!(4));

        let listed: Vec<String> = store
            .list(&key("a"))
            .into_iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(listed, vec!["a/x".to_string(), "a/y/z".to_string()]);
    }

    #[test]
    fn test_delete_removes_subtree() {
        let store = MappingStore::new();
        store.put(&key("a/x"), json!(1));
        store.put(&key("a/x/child"), json!(2));
        store.put(&key("a/y"), json!(3));

        store.delete(&key("a/x"));

        assert_eq!(store.read(&key("a/x")), None);
        assert_eq!(store.read(&key("a/x/child")), None);
        assert_eq!(store.read(&key("a/y")), Some(json!(3)));
    }

    #[test]
    fn test_typed_helpers() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Entry {
            name: String,
            index: u32,
        }

        let store = MappingStore::new();
        let entry = Entry {
            name: "eth0".to_string(),
            index: 1,
        };
        store.put_as(&key("m/eth0"), &entry).unwrap();
        assert_eq!(store.read_as::<Entry>(&key("m/eth0")).unwrap(), Some(entry));
        assert_eq!(store.read_as::<Entry>(&key("m/eth1")).unwrap(), None);

        store.put(&key("m/bad"), json!("not an entry"));
        let err = store.list_as::<Entry>(&key("m")).unwrap_err();
        assert!(matches!(err, ContextError::Codec { ref key, .. } if key == "m/bad"));
    }

    #[test]
    fn test_transaction_read_your_writes() {
        let store = MappingStore::new();
        store.put(&key("a/x"), json!(1));
        store.put(&key("a/y"), json!(2));

        let tx = store.begin();
        tx.put(&key("a/z"), json!(3));
        tx.delete(&key("a/x"));

        assert_eq!(tx.read(&key("a/z")), Some(json!(3)));
        assert_eq!(tx.read(&key("a/x")), None);
        let listed: Vec<String> = tx.list(&key("a")).into_iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(listed, vec!["a/y".to_string(), "a/z".to_string()]);

        // Store untouched until commit.
        assert_eq!(store.read(&key("a/x")), Some(json!(1)));
        assert_eq!(store.read(&key("a/z")), None);

        tx.commit();
        assert_eq!(store.read(&key("a/x")), None);
        assert_eq!(store.read(&key("a/z")), Some(json!(3)));
    }

    #[test]
    fn test_transaction_delete_then_put() {
        let store = MappingStore::new();
        store.put(&key("a/x"), json!(1));
        store.put(&key("a/y"), json!(2));

        let tx = store.begin();
        tx.delete(&key("a"));
        tx.put(&key("a/y"), json!(20));
        assert_eq!(tx.read(&key("a/x")), None);
        assert_eq!(tx.read(&key("a/y")), Some(json!(20)));
        tx.commit();

        assert_eq!(store.len(), 1);
        assert_eq!(store.read(&key("a/y")), Some(json!(20)));
    }

    #[test]
    fn test_dropped_transaction_is_discarded() {
        let store = MappingStore::new();
        {
            let tx = store.begin();
            tx.put(&key("a"), json!(1));
            assert!(!tx.is_clean());
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("mappings.json");

        let store = MappingStore::new();
        store.put(&key("naming-context/ifc/mappings/eth0"), json!({"name": "eth0", "index": 1}));
        store.put(&key("naming-context/ifc/next-index"), json!(2));
        store.save(&path).unwrap();

        let loaded = MappingStore::load_or_default(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.read(&key("naming-context/ifc/next-index")),
            Some(json!(2))
        );
    }

    #[test]
    fn test_load_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MappingStore::load_or_default(dir.path().join("absent.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_corrupt_snapshot_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        fs::write(&path, "{ not json").unwrap();

        let err = MappingStore::load_or_default(&path).unwrap_err();
        assert!(matches!(err, ContextError::Persistence { .. }));
    }
}
