//! Dump cache manager.
//!
//! Readers ask for a whole dump whenever they need one item of it. The
//! manager answers from the transaction's [`ModificationCache`] when it can
//! and otherwise runs the dump once, post-processes it, and caches it under
//! the key its [`CacheKeyFactory`] derives.

use super::key_factory::{CacheKeyFactory, IdentifierCacheKeyFactory};
use super::modification_cache::{CachedValue, ModificationCache};
use async_trait::async_trait;
use std::any::{type_name, Any};
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use vpp_api::ReadFailedError;
use vpp_types::InstanceId;

/// Runs the engine dump behind a [`DumpCacheManager`].
#[async_trait]
pub trait DumpExecutor<D, P = ()>: Send + Sync {
    async fn execute_dump(&self, id: &InstanceId, params: &P) -> Result<D, ReadFailedError>;
}

/// Transformation applied once to a fresh dump before it is cached.
pub type PostProcessing<D> = Box<dyn Fn(D) -> D + Send + Sync>;

/// Per-transaction cache in front of one dump executor.
pub struct DumpCacheManager<D, P = ()> {
    executor: Box<dyn DumpExecutor<D, P>>,
    key_factory: Box<dyn CacheKeyFactory<P>>,
    post_processing: Option<PostProcessing<D>>,
}

impl<D, P> DumpCacheManager<D, P>
where
    D: Any + Send + Sync,
    P: Hash + Send + Sync + 'static,
{
    pub fn builder<E>(executor: E) -> DumpCacheManagerBuilder<D, P>
    where
        E: DumpExecutor<D, P> + 'static,
    {
        DumpCacheManagerBuilder {
            executor: Box::new(executor),
            key_factory: Box::new(IdentifierCacheKeyFactory::new()),
            post_processing: None,
        }
    }

    /// Returns the dump for `id`, running the executor only if this
    /// transaction has not cached one under the derived key yet.
    ///
    /// Concurrent first requests for one key share a single execution. A
    /// failed execution is not cached; the next request runs it again. If the
    /// key holds a value of another type, `Ok(None)` is returned. An `id` the
    /// key factory cannot derive a key from fails without running the dump.
    pub async fn get_dump(
        &self,
        id: &InstanceId,
        cache: &ModificationCache,
        params: &P,
    ) -> Result<Option<Arc<D>>, ReadFailedError> {
        let key = self.key_factory.create_key(id, params)?;
        let slot = cache.slot(&key);

        let cached = match slot.get() {
            Some(cached) => {
                trace!(key = %key, "Dump cache hit");
                cached.clone()
            }
            None => slot
                .get_or_try_init(|| async {
                    debug!(id = %id, key = %key, "Dump cache miss, executing dump");
                    let dump = self.executor.execute_dump(id, params).await?;
                    let dump = match &self.post_processing {
                        Some(post_processing) => post_processing(dump),
                        None => dump,
                    };
                    Ok::<_, ReadFailedError>(CachedValue::new(Arc::new(dump)))
                })
                .await?
                .clone(),
        };

        match cached.downcast::<D>() {
            Some(dump) => Ok(Some(dump)),
            None => {
                warn!(
                    key = %key,
                    expected = type_name::<D>(),
                    found = cached.type_name(),
                    "Cached value has unexpected type, ignoring"
                );
                Ok(None)
            }
        }
    }
}

/// Builder for [`DumpCacheManager`].
pub struct DumpCacheManagerBuilder<D, P = ()> {
    executor: Box<dyn DumpExecutor<D, P>>,
    key_factory: Box<dyn CacheKeyFactory<P>>,
    post_processing: Option<PostProcessing<D>>,
}

impl<D, P> DumpCacheManagerBuilder<D, P> {
    pub fn with_cache_key_factory<F>(mut self, key_factory: F) -> Self
    where
        F: CacheKeyFactory<P> + 'static,
    {
        self.key_factory = Box::new(key_factory);
        self
    }

    pub fn with_post_processing<F>(mut self, post_processing: F) -> Self
    where
        F: Fn(D) -> D + Send + Sync + 'static,
    {
        self.post_processing = Some(Box::new(post_processing));
        self
    }

    pub fn build(self) -> DumpCacheManager<D, P> {
        DumpCacheManager {
            executor: self.executor,
            key_factory: self.key_factory,
            post_processing: self.post_processing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key_factory::{StaticCacheKeyFactory, TypeAwareIdentifierCacheKeyFactory};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use vpp_api::ApiError;

    #[derive(Debug, Clone, PartialEq)]
    struct Dump(Vec<u32>);

    /// Returns the next of a fixed sequence of dumps and counts calls.
    struct SequenceExecutor {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DumpExecutor<Dump> for SequenceExecutor {
        async fn execute_dump(&self, _id: &InstanceId, _params: &()) -> Result<Dump, ReadFailedError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Dump(vec![call as u32]))
        }
    }

    fn counting() -> (SequenceExecutor, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            SequenceExecutor {
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    fn address_id(ifc: &str, addr: &str) -> InstanceId {
        InstanceId::create("interfaces")
            .keyed_child("interface", ifc)
            .child("ipv4")
            .keyed_child("address", addr)
    }

    #[tokio::test]
    async fn test_second_read_is_cached() {
        let (executor, calls) = counting();
        let manager: DumpCacheManager<Dump> = DumpCacheManager::builder(executor).build();
        let cache = ModificationCache::new();
        let id = address_id("eth0", "10.0.0.1");

        let first = manager.get_dump(&id, &cache, &()).await.unwrap().unwrap();
        let second = manager.get_dump(&id, &cache, &()).await.unwrap().unwrap();

        assert_eq!(*first, Dump(vec![0]));
        assert_eq!(*second, Dump(vec![0]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_new_transaction_fetches_again() {
        let (executor, calls) = counting();
        let manager: DumpCacheManager<Dump> = DumpCacheManager::builder(executor).build();
        let id = address_id("eth0", "10.0.0.1");

        let first = manager.get_dump(&id, &ModificationCache::new(), &()).await.unwrap();
        let second = manager.get_dump(&id, &ModificationCache::new(), &()).await.unwrap();

        assert_eq!(first.as_deref(), Some(&Dump(vec![0])));
        assert_eq!(second.as_deref(), Some(&Dump(vec![1])));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_scoped_keys_share_per_parent() {
        let (executor, calls) = counting();
        let manager: DumpCacheManager<Dump> = DumpCacheManager::builder(executor)
            .with_cache_key_factory(TypeAwareIdentifierCacheKeyFactory::interface_scoped::<Dump>())
            .build();
        let cache = ModificationCache::new();

        for addr in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            manager.get_dump(&address_id("eth0", addr), &cache, &()).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        for ifc in ["eth1", "eth2"] {
            manager.get_dump(&address_id(ifc, "10.0.0.1"), &cache, &()).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unscoped_identifier_is_rejected() {
        let (executor, calls) = counting();
        let manager: DumpCacheManager<Dump> = DumpCacheManager::builder(executor)
            .with_cache_key_factory(TypeAwareIdentifierCacheKeyFactory::interface_scoped::<Dump>())
            .build();
        let cache = ModificationCache::new();
        let fib = |bd: &str| {
            InstanceId::create("bridge-domains")
                .keyed_child("bridge-domain", bd)
                .child("l2-fib")
        };

        for bd in ["bd1", "bd2"] {
            let err = manager.get_dump(&fib(bd), &cache, &()).await.unwrap_err();
            assert_eq!(err.id(), &fib(bd));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_post_processing_runs_once() {
        let (executor, _calls) = counting();
        let processed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&processed);
        let manager: DumpCacheManager<Dump> = DumpCacheManager::builder(executor)
            .with_post_processing(move |mut dump: Dump| {
                counter.fetch_add(1, Ordering::SeqCst);
                dump.0.push(100);
                dump
            })
            .build();
        let cache = ModificationCache::new();
        let id = address_id("eth0", "10.0.0.1");

        manager.get_dump(&id, &cache, &()).await.unwrap();
        let dump = manager.get_dump(&id, &cache, &()).await.unwrap().unwrap();

        assert_eq!(*dump, Dump(vec![0, 100]));
        assert_eq!(processed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_type_guard() {
        let (executor, calls) = counting();
        let manager: DumpCacheManager<Dump> = DumpCacheManager::builder(executor)
            .with_cache_key_factory(StaticCacheKeyFactory::new::<Dump>("shared"))
            .build();
        let cache = ModificationCache::new();
        let id = address_id("eth0", "10.0.0.1");

        let key = CacheKeyFactory::<()>::create_key(&StaticCacheKeyFactory::new::<Dump>("shared"), &id, &()).unwrap();
        cache.put(key, "someone else's value".to_string());

        let result = manager.get_dump(&id, &cache, &()).await.unwrap();
        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct FlakyExecutor {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DumpExecutor<Dump> for FlakyExecutor {
        async fn execute_dump(&self, id: &InstanceId, _params: &()) -> Result<Dump, ReadFailedError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ReadFailedError::Timeout {
                    id: id.clone(),
                    timeout: Duration::from_secs(5),
                })
            } else {
                Ok(Dump(vec![7]))
            }
        }
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let manager: DumpCacheManager<Dump> = DumpCacheManager::builder(FlakyExecutor {
            calls: Arc::clone(&calls),
        })
        .build();
        let cache = ModificationCache::new();
        let id = address_id("eth0", "10.0.0.1");

        let err = manager.get_dump(&id, &cache, &()).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.id(), &id);

        let dump = manager.get_dump(&id, &cache, &()).await.unwrap().unwrap();
        assert_eq!(*dump, Dump(vec![7]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct ParamsExecutor;

    #[async_trait]
    impl DumpExecutor<Dump, u32> for ParamsExecutor {
        async fn execute_dump(&self, id: &InstanceId, params: &u32) -> Result<Dump, ReadFailedError> {
            if *params == 0 {
                return Err(ReadFailedError::failed(id, ApiError::from_retval("test_dump", -7)));
            }
            Ok(Dump(vec![*params]))
        }
    }

    #[tokio::test]
    async fn test_params_select_entry() {
        let manager: DumpCacheManager<Dump, u32> = DumpCacheManager::builder(ParamsExecutor).build();
        let cache = ModificationCache::new();
        let id = InstanceId::create("tables");

        let one = manager.get_dump(&id, &cache, &1).await.unwrap().unwrap();
        let two = manager.get_dump(&id, &cache, &2).await.unwrap().unwrap();
        assert_eq!(*one, Dump(vec![1]));
        assert_eq!(*two, Dump(vec![2]));

        assert!(manager.get_dump(&id, &cache, &0).await.is_err());
    }
}
