//! Parent-scoped child name/index tables.
//!
//! Some engine objects are numbered within a parent rather than globally,
//! e.g. sub-interfaces per interface or entries per table. A
//! [`MultiNamingContext`] keeps one child table per parent name; child names
//! and indices of different parents never collide.

use crate::allocator::HighWaterMark;
use crate::error::{ContextError, ContextResult};
use crate::naming::Mapping;
use crate::store::{ContextKey, MappingContext, MappingContextExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct ParentScope {
    name: String,
}

#[derive(Debug)]
pub struct MultiNamingContext {
    instance_name: String,
    start_index: u32,
    root: ContextKey,
    lock: Mutex<()>,
}

impl MultiNamingContext {
    pub fn new(instance_name: impl Into<String>, start_index: u32) -> Self {
        let instance_name = instance_name.into();
        let root = ContextKey::from_segments(["multi-naming-context", instance_name.as_str()]);
        Self {
            instance_name,
            start_index,
            root,
            lock: Mutex::new(()),
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn start_index(&self) -> u32 {
        self.start_index
    }

    fn context(&self) -> String {
        format!("multi-naming-context/{}", self.instance_name)
    }

    fn parent_key(&self, parent: &str) -> ContextKey {
        self.root.child("mappings").child(parent)
    }

    fn allocator(&self, parent: &str) -> HighWaterMark {
        HighWaterMark::new(
            self.root.child("next-index").child(parent),
            self.start_index,
        )
    }

    /// Children of `parent`, or `None` if the parent scope was never created.
    fn children(&self, parent: &str, ctx: &dyn MappingContext) -> ContextResult<Option<Vec<Mapping>>> {
        let parent_key = self.parent_key(parent);
        if ctx.read(&parent_key).is_none() {
            return Ok(None);
        }
        let children = ctx
            .list_as::<Mapping>(&parent_key)?
            .into_iter()
            .map(|(_, mapping)| mapping)
            .collect();
        Ok(Some(children))
    }

    fn existing_children(&self, parent: &str, ctx: &dyn MappingContext) -> ContextResult<Vec<Mapping>> {
        self.children(parent, ctx)?.ok_or_else(|| {
            ContextError::invariant(self.context(), format!("mapping for parent {} not present", parent))
        })
    }

    fn add_child_locked(
        &self,
        parent: &str,
        index: u32,
        child: &str,
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        if index < self.start_index {
            return Err(ContextError::invalid_argument(
                self.context(),
                format!("index {} is lower than start index {}", index, self.start_index),
            ));
        }

        let parent_key = self.parent_key(parent);
        ctx.put_as(
            &parent_key,
            &ParentScope {
                name: parent.to_string(),
            },
        )?;
        ctx.put_as(&parent_key.child(child), &Mapping::new(child, index))?;
        self.allocator(parent).observe(ctx, index)
    }

    /// Stores `child` under `parent` with `index`. Siblings are preserved.
    pub fn add_child(
        &self,
        parent: &str,
        index: u32,
        child: &str,
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        let _guard = self.lock.lock();
        self.add_child_locked(parent, index, child, ctx)
    }

    /// Stores `child` under `parent` with the next never-used index of that
    /// parent and returns the index.
    pub fn add_child_with_next_index(
        &self,
        parent: &str,
        child: &str,
        ctx: &dyn MappingContext,
    ) -> ContextResult<u32> {
        let _guard = self.lock.lock();
        let in_use = self
            .children(parent, ctx)?
            .unwrap_or_default()
            .into_iter()
            .map(|mapping| mapping.index);
        let index = self.allocator(parent).next(ctx, in_use)?;
        self.add_child_locked(parent, index, child, ctx)?;
        debug!(context = %self.instance_name, parent, child, index, "Allocated child index");
        Ok(index)
    }

    /// Name of the child of `parent` with `index`.
    ///
    /// # Errors
    ///
    /// [`ContextError::InvariantViolation`] if `parent` has no scope,
    /// [`ContextError::NotFound`] if it has no such child.
    pub fn get_child_name(&self, parent: &str, index: u32, ctx: &dyn MappingContext) -> ContextResult<String> {
        self.find_child_name(parent, index, ctx)?
            .ok_or_else(|| ContextError::not_found(self.context(), format!("{}/{}", parent, index)))
    }

    /// Like [`get_child_name`](Self::get_child_name), but a missing child is
    /// `Ok(None)`.
    pub fn find_child_name(
        &self,
        parent: &str,
        index: u32,
        ctx: &dyn MappingContext,
    ) -> ContextResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self
            .existing_children(parent, ctx)?
            .into_iter()
            .find(|mapping| mapping.index == index)
            .map(|mapping| mapping.name))
    }

    pub fn get_child_index(&self, parent: &str, child: &str, ctx: &dyn MappingContext) -> ContextResult<u32> {
        let _guard = self.lock.lock();
        self.existing_children(parent, ctx)?
            .into_iter()
            .find(|mapping| mapping.name == child)
            .map(|mapping| mapping.index)
            .ok_or_else(|| ContextError::not_found(self.context(), format!("{}/{}", parent, child)))
    }

    /// Removes `child` from `parent`. A missing parent or child is ignored.
    pub fn remove_child(&self, parent: &str, child: &str, ctx: &dyn MappingContext) {
        let _guard = self.lock.lock();
        let parent_key = self.parent_key(parent);
        if ctx.read(&parent_key).is_some() {
            ctx.delete(&parent_key.child(child));
        }
    }
}
