//! Identity mapping and dump caching for VPP translators.
//!
//! The engine identifies resources by small integer handles it assigns; the
//! configuration model identifies them by names the user chose. This crate
//! bridges the two and keeps engine dumps from being repeated within one
//! transaction:
//!
//! - [`MappingStore`]: durable key/value storage, read and written through
//!   transactional [`MappingContext`] views
//! - [`NamingContext`] / [`MultiNamingContext`]: name to index registries with
//!   artificial names for indices nobody named
//! - [`context`]: registries keyed by normalized identities (EIDs, NAT address
//!   pairs) or scoped under a parent (ACEs, classify nodes, GPE locators)
//! - [`cache`]: [`DumpCacheManager`] and the per-transaction
//!   [`ModificationCache`]
//! - [`InterfaceCacheDumpManager`]: interface dumps that also learn names
//!
//! # Example
//!
//! ```
//! use vpp_translate_utils::{MappingStore, NamingContext, ReadContext};
//!
//! let store = MappingStore::new();
//! let interfaces = NamingContext::new("interface", "interface-context");
//!
//! let ctx = ReadContext::new(&store);
//! interfaces.add_name(1, "eth0", ctx.mapping_context()).unwrap();
//! assert_eq!(interfaces.get_name(2, ctx.mapping_context()).unwrap(), "interface2");
//! ctx.commit();
//!
//! assert_eq!(interfaces.get_index("eth0", &store).unwrap(), 1);
//! ```

mod allocator;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
mod interfaces;
mod multi_naming;
mod naming;
mod read_context;
pub mod store;

pub use cache::{DumpCacheManager, DumpExecutor, ModificationCache};
pub use config::TranslateConfig;
pub use error::{ContextError, ContextResult, TranslateError};
pub use interfaces::InterfaceCacheDumpManager;
pub use multi_naming::MultiNamingContext;
pub use naming::{Mapping, NamingContext};
pub use read_context::ReadContext;
pub use store::{ContextKey, MappingContext, MappingContextExt, MappingStore, MappingTransaction};
