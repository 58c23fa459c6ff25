//! Name to engine index registry.
//!
//! The engine identifies interfaces, tables, tunnels and the like by small
//! integer indices; the data model uses names. A [`NamingContext`] keeps the
//! two in step for one namespace (one instance name). When the engine reports
//! an index nobody named, [`NamingContext::get_name`] invents a name from the
//! configured prefix and persists it, so the same index reads back under the
//! same name from then on.

use crate::allocator::HighWaterMark;
use crate::error::{ContextError, ContextResult};
use crate::store::{ContextKey, MappingContext, MappingContextExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One name/index pair as stored in the mapping store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub name: String,
    pub index: u32,
}

impl Mapping {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

/// Bidirectional name/index registry for one namespace.
///
/// All operations hold a per-instance lock for their whole check-then-write
/// sequence; this is the contention point when many translators share one
/// namespace.
#[derive(Debug)]
pub struct NamingContext {
    artificial_name_prefix: String,
    instance_name: String,
    mappings: ContextKey,
    allocator: HighWaterMark,
    lock: Mutex<()>,
}

impl NamingContext {
    pub const START_INDEX: u32 = 0;

    pub fn new(artificial_name_prefix: impl Into<String>, instance_name: impl Into<String>) -> Self {
        let instance_name = instance_name.into();
        let root = ContextKey::from_segments(["naming-context", instance_name.as_str()]);
        Self {
            artificial_name_prefix: artificial_name_prefix.into(),
            mappings: root.child("mappings"),
            allocator: HighWaterMark::new(root.child("next-index"), Self::START_INDEX),
            instance_name,
            lock: Mutex::new(()),
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn artificial_name_prefix(&self) -> &str {
        &self.artificial_name_prefix
    }

    fn context(&self) -> String {
        format!("naming-context/{}", self.instance_name)
    }

    fn mapping_key(&self, name: &str) -> ContextKey {
        self.mappings.child(name)
    }

    fn artificial_name(&self, index: u32) -> String {
        format!("{}{}", self.artificial_name_prefix, index)
    }

    fn all_mappings(&self, ctx: &dyn MappingContext) -> ContextResult<Vec<Mapping>> {
        Ok(ctx
            .list_as::<Mapping>(&self.mappings)?
            .into_iter()
            .map(|(_, mapping)| mapping)
            .collect())
    }

    fn put_mapping(&self, ctx: &dyn MappingContext, index: u32, name: &str) -> ContextResult<()> {
        ctx.put_as(&self.mapping_key(name), &Mapping::new(name, index))?;
        self.allocator.observe(ctx, index)
    }

    fn find_name_locked(&self, index: u32, ctx: &dyn MappingContext) -> ContextResult<Option<String>> {
        let mut matching = self
            .all_mappings(ctx)?
            .into_iter()
            .filter(|mapping| mapping.index == index);

        match (matching.next(), matching.next()) {
            (None, _) => Ok(None),
            (Some(mapping), None) => Ok(Some(mapping.name)),
            (Some(first), Some(second)) => Err(ContextError::invariant(
                self.context(),
                format!(
                    "multiple mappings defined with index {}: {}, {}",
                    index, first.name, second.name
                ),
            )),
        }
    }

    /// Stores `name` for `index`, replacing any previous mapping of `name`.
    ///
    /// Uniqueness of `index` is not checked; callers add a name only after
    /// the engine has handed out the index.
    pub fn add_name(&self, index: u32, name: &str, ctx: &dyn MappingContext) -> ContextResult<()> {
        let _guard = self.lock.lock();
        self.put_mapping(ctx, index, name)
    }

    /// Stores `name` for `index` unless some name is already mapped to
    /// `index`. Returns whether the mapping was added.
    pub fn add_name_if_index_absent(
        &self,
        index: u32,
        name: &str,
        ctx: &dyn MappingContext,
    ) -> ContextResult<bool> {
        let _guard = self.lock.lock();
        if self.all_mappings(ctx)?.iter().any(|mapping| mapping.index == index) {
            return Ok(false);
        }
        self.put_mapping(ctx, index, name)?;
        Ok(true)
    }

    /// Stores `name` under the next never-used index and returns that index.
    pub fn add_name_with_next_index(&self, name: &str, ctx: &dyn MappingContext) -> ContextResult<u32> {
        let _guard = self.lock.lock();
        let in_use = self.all_mappings(ctx)?.into_iter().map(|mapping| mapping.index);
        let index = self.allocator.next(ctx, in_use)?;
        self.put_mapping(ctx, index, name)?;
        debug!(context = %self.instance_name, name = %name, index, "Allocated index for name");
        Ok(index)
    }

    pub fn contains_name(&self, name: &str, ctx: &dyn MappingContext) -> bool {
        let _guard = self.lock.lock();
        ctx.read(&self.mapping_key(name)).is_some()
    }

    pub fn contains_index(&self, index: u32, ctx: &dyn MappingContext) -> ContextResult<bool> {
        let _guard = self.lock.lock();
        Ok(self
            .all_mappings(ctx)?
            .iter()
            .any(|mapping| mapping.index == index))
    }

    /// Index stored for `name`.
    ///
    /// # Errors
    ///
    /// [`ContextError::NotFound`] if `name` has no mapping.
    pub fn get_index(&self, name: &str, ctx: &dyn MappingContext) -> ContextResult<u32> {
        self.find_index(name, ctx)?
            .ok_or_else(|| ContextError::not_found(self.context(), name))
    }

    pub fn find_index(&self, name: &str, ctx: &dyn MappingContext) -> ContextResult<Option<u32>> {
        let _guard = self.lock.lock();
        Ok(ctx
            .read_as::<Mapping>(&self.mapping_key(name))?
            .map(|mapping| mapping.index))
    }

    /// Name stored for `index`, without synthesizing one.
    pub fn find_name(&self, index: u32, ctx: &dyn MappingContext) -> ContextResult<Option<String>> {
        let _guard = self.lock.lock();
        self.find_name_locked(index, ctx)
    }

    /// Name stored for `index`.
    ///
    /// If none is stored, `<prefix><index>` is stored and returned. Repeated
    /// calls, and calls on a fresh instance over the same store, return the
    /// same name.
    pub fn get_name(&self, index: u32, ctx: &dyn MappingContext) -> ContextResult<String> {
        let _guard = self.lock.lock();
        if let Some(name) = self.find_name_locked(index, ctx)? {
            return Ok(name);
        }

        let name = self.artificial_name(index);
        debug!(context = %self.instance_name, index, name = %name, "Synthesized artificial name");
        self.put_mapping(ctx, index, &name)?;
        Ok(name)
    }

    /// Removes the mapping for `name`. Removing an absent name is a no-op.
    pub fn remove_name(&self, name: &str, ctx: &dyn MappingContext) {
        let _guard = self.lock.lock();
        ctx.delete(&self.mapping_key(name));
    }
}
