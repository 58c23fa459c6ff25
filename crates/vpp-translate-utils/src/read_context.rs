//! Per-transaction state handed to readers.

use crate::cache::ModificationCache;
use crate::store::{MappingContext, MappingStore, MappingTransaction};

/// Everything a reader needs for one transaction: the dump cache and a
/// transactional view of the mapping store.
///
/// Both live exactly as long as the transaction. Mappings created while
/// reading (learned names, artificial names) reach the store only on
/// [`commit`](Self::commit).
#[derive(Debug)]
pub struct ReadContext {
    cache: ModificationCache,
    mappings: MappingTransaction,
}

impl ReadContext {
    pub fn new(store: &MappingStore) -> Self {
        Self {
            cache: ModificationCache::new(),
            mappings: store.begin(),
        }
    }

    pub fn modification_cache(&self) -> &ModificationCache {
        &self.cache
    }

    pub fn mapping_context(&self) -> &dyn MappingContext {
        &self.mappings
    }

    /// Persists mappings written during the transaction and drops the cache.
    pub fn commit(self) {
        self.mappings.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NamingContext;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_commit_persists_mappings() {
        let store = MappingStore::new();
        let naming = NamingContext::new("interface", "interface-context");

        let ctx = ReadContext::new(&store);
        assert_eq!(naming.get_name(4, ctx.mapping_context()).unwrap(), "interface4");
        assert!(naming.find_name(4, &store).unwrap().is_none());
        ctx.commit();

        assert_eq!(naming.find_name(4, &store).unwrap().as_deref(), Some("interface4"));
    }

    #[test]
    fn test_drop_discards_mappings() {
        let store = MappingStore::new();
        let naming = NamingContext::new("interface", "interface-context");

        {
            let ctx = ReadContext::new(&store);
            naming.add_name(1, "eth0", ctx.mapping_context()).unwrap();
            ctx.modification_cache().put("dump", vec![1u32]);
        }

        assert!(!naming.contains_name("eth0", &store));
        assert!(ReadContext::new(&store).modification_cache().is_empty());
    }
}
