//! Per-transaction caching of engine dumps.

mod key_factory;
mod manager;
mod modification_cache;

pub use key_factory::{
    CacheKeyFactory, IdentifierCacheKeyFactory, StaticCacheKeyFactory, TypeAwareIdentifierCacheKeyFactory,
};
pub use manager::{DumpCacheManager, DumpCacheManagerBuilder, DumpExecutor, PostProcessing};
pub use modification_cache::ModificationCache;
