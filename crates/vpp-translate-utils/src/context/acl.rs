//! ACL and ACE naming.
//!
//! ACLs are numbered globally by the engine, their rules (ACEs) by position
//! within the ACL. Rule names are therefore kept per ACL.

use crate::error::{ContextError, ContextResult};
use crate::naming::Mapping;
use crate::store::{ContextKey, MappingContext, MappingContextExt};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug)]
pub struct AclContextManager {
    artificial_name_prefix: String,
    instance_name: String,
    acls: ContextKey,
    lock: Mutex<()>,
}

impl AclContextManager {
    pub fn new(artificial_name_prefix: impl Into<String>, instance_name: impl Into<String>) -> Self {
        let instance_name = instance_name.into();
        let acls = ContextKey::from_segments(["vpp-acl-context", instance_name.as_str(), "acl"]);
        Self {
            artificial_name_prefix: artificial_name_prefix.into(),
            instance_name,
            acls,
            lock: Mutex::new(()),
        }
    }

    fn context(&self) -> String {
        format!("vpp-acl-context/{}", self.instance_name)
    }

    fn acl_key(&self, name: &str) -> ContextKey {
        self.acls.child(name)
    }

    fn ace_key(&self, acl_name: &str, ace_name: &str) -> ContextKey {
        self.acl_key(acl_name).child("ace").child(ace_name)
    }

    fn acl_mappings(&self, ctx: &dyn MappingContext) -> ContextResult<Vec<Mapping>> {
        // ACE entries live below their ACL; only direct children are ACLs.
        ctx.list(&self.acls)
            .into_iter()
            .filter(|(key, _)| key.is_child_of(&self.acls))
            .map(|(key, value)| {
                serde_json::from_value::<Mapping>(value).map_err(|source| ContextError::Codec {
                    key: key.to_string(),
                    source,
                })
            })
            .collect()
    }

    fn add_acl_locked<S: AsRef<str>>(
        &self,
        index: u32,
        name: &str,
        ace_names: &[S],
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        let acl_key = self.acl_key(name);
        // Replaces the whole ACL, rules included.
        ctx.delete(&acl_key);
        ctx.put_as(&acl_key, &Mapping::new(name, index))?;
        for (ace_index, ace_name) in (0u32..).zip(ace_names) {
            let ace_name = ace_name.as_ref();
            ctx.put_as(&self.ace_key(name, ace_name), &Mapping::new(ace_name, ace_index))?;
        }
        Ok(())
    }

    /// Stores ACL `name` under `index` with its rules numbered 0.. in order.
    pub fn add_acl<S: AsRef<str>>(
        &self,
        index: u32,
        name: &str,
        ace_names: &[S],
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        let _guard = self.lock.lock();
        self.add_acl_locked(index, name, ace_names, ctx)
    }

    pub fn contains_acl(&self, name: &str, ctx: &dyn MappingContext) -> bool {
        let _guard = self.lock.lock();
        ctx.read(&self.acl_key(name)).is_some()
    }

    pub fn get_acl_index(&self, name: &str, ctx: &dyn MappingContext) -> ContextResult<u32> {
        let _guard = self.lock.lock();
        ctx.read_as::<Mapping>(&self.acl_key(name))?
            .map(|mapping| mapping.index)
            .ok_or_else(|| ContextError::not_found(self.context(), name))
    }

    /// Name of the ACL with `index`, synthesizing `<prefix><index>` for an
    /// ACL nobody named.
    pub fn get_acl_name(&self, index: u32, ctx: &dyn MappingContext) -> ContextResult<String> {
        let _guard = self.lock.lock();
        let mut named = self
            .acl_mappings(ctx)?
            .into_iter()
            .filter(|mapping| mapping.index == index);

        match (named.next(), named.next()) {
            (Some(mapping), None) => Ok(mapping.name),
            (Some(first), Some(second)) => Err(ContextError::invariant(
                self.context(),
                format!("multiple acls with index {}: {}, {}", index, first.name, second.name),
            )),
            (None, _) => {
                let name = format!("{}{}", self.artificial_name_prefix, index);
                debug!(context = %self.instance_name, index, name = %name, "Synthesized artificial acl name");
                self.add_acl_locked::<&str>(index, &name, &[], ctx)?;
                Ok(name)
            }
        }
    }

    pub fn remove_acl(&self, name: &str, ctx: &dyn MappingContext) {
        let _guard = self.lock.lock();
        ctx.delete(&self.acl_key(name));
    }

    /// Name of rule `ace_index` of ACL `acl_name`, synthesizing
    /// `<prefix>rule<index>` for a rule nobody named.
    pub fn get_ace_name(&self, acl_name: &str, ace_index: u32, ctx: &dyn MappingContext) -> ContextResult<String> {
        let _guard = self.lock.lock();
        let aces = self.acl_key(acl_name).child("ace");
        let existing = ctx
            .list_as::<Mapping>(&aces)?
            .into_iter()
            .map(|(_, mapping)| mapping)
            .find(|mapping| mapping.index == ace_index);
        if let Some(mapping) = existing {
            return Ok(mapping.name);
        }

        let name = format!("{}rule{}", self.artificial_name_prefix, ace_index);
        debug!(context = %self.instance_name, acl = acl_name, ace_index, name = %name, "Synthesized artificial ace name");
        ctx.put_as(&self.ace_key(acl_name, &name), &Mapping::new(name.as_str(), ace_index))?;
        Ok(name)
    }
}
