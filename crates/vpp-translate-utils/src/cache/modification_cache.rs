//! Transaction-scoped heterogeneous cache.

use parking_lot::Mutex;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A cached value together with the name of its concrete type.
#[derive(Clone)]
pub(crate) struct CachedValue {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl CachedValue {
    pub(crate) fn new<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            type_name: type_name::<T>(),
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The value if it is a `T`.
    pub(crate) fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }
}

pub(crate) type Slot = Arc<OnceCell<CachedValue>>;

/// Values cached for the lifetime of one transaction.
///
/// Keys are strings; values of any type live side by side and are read back
/// with their type. Each key owns a [`OnceCell`] so that concurrent first
/// loads of one key are collapsed into a single load.
#[derive(Default)]
pub struct ModificationCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl ModificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `key`, created empty if missing.
    pub(crate) fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(key.to_string()).or_default())
    }

    fn loaded(&self, key: &str) -> Option<CachedValue> {
        self.slots.lock().get(key).and_then(|slot| slot.get().cloned())
    }

    /// Value under `key` if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.loaded(key).and_then(|value| value.downcast::<T>())
    }

    /// Stores `value` under `key`, replacing whatever was there.
    pub fn put<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        let cell = OnceCell::new_with(Some(CachedValue::new(Arc::new(value))));
        self.slots.lock().insert(key.into(), Arc::new(cell));
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.loaded(key).is_some()
    }

    pub fn remove(&self, key: &str) {
        self.slots.lock().remove(key);
    }

    /// Number of loaded entries.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}

impl fmt::Debug for ModificationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        let mut keys: Vec<&String> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key)
            .collect();
        keys.sort();
        f.debug_struct("ModificationCache").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_typed_get() {
        let cache = ModificationCache::new();
        cache.put("numbers", vec![1u32, 2, 3]);

        assert_eq!(cache.get::<Vec<u32>>("numbers").as_deref(), Some(&vec![1, 2, 3]));
        assert!(cache.get::<String>("numbers").is_none());
        assert!(cache.get::<Vec<u32>>("missing").is_none());
    }

    #[test]
    fn test_put_replaces() {
        let cache = ModificationCache::new();
        cache.put("key", 1u8);
        cache.put("key", "text".to_string());

        assert!(cache.get::<u8>("key").is_none());
        assert_eq!(cache.get::<String>("key").as_deref().map(String::as_str), Some("text"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = ModificationCache::new();
        cache.put("a", 1u8);
        cache.put("b", 2u8);
        assert!(cache.contains_key("a"));

        cache.remove("a");
        assert!(!cache.contains_key("a"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_empty_slot_is_not_an_entry() {
        let cache = ModificationCache::new();
        let _slot = cache.slot("pending");
        assert!(!cache.contains_key("pending"));
        assert_eq!(cache.len(), 0);
    }
}
