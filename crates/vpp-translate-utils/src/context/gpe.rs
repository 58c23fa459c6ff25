//! GPE entry and locator-pair identification.
//!
//! The engine lists GPE forwarding entries, and the locator pairs of each
//! entry, without any id; the model keys both by id. Unknown entries get the
//! id `<vni>_<local>_<remote>` and unknown pairs `<entry>_<local>_<remote>`.

use super::eid::{AsEid, Eid};
use crate::error::{ContextError, ContextResult};
use crate::store::{ContextKey, MappingContext, MappingContextExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vpp_types::IpAddress;

/// Identity of a GPE forwarding entry: its virtual network and the local and
/// remote EID it forwards between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GpeEntryIdentifier {
    pub vni: u32,
    pub local_eid: Eid,
    pub remote_eid: Eid,
}

impl GpeEntryIdentifier {
    pub fn new<L: AsEid + ?Sized, R: AsEid + ?Sized>(vni: u32, local_eid: &L, remote_eid: &R) -> Self {
        Self {
            vni,
            local_eid: *local_eid.as_eid(),
            remote_eid: *remote_eid.as_eid(),
        }
    }

    /// Both EIDs with their host bits dropped.
    pub fn normalized(&self) -> Self {
        Self {
            vni: self.vni,
            local_eid: self.local_eid.normalized(),
            remote_eid: self.remote_eid.normalized(),
        }
    }

    /// True if both identify the same entry once normalized.
    pub fn is_same(&self, other: &GpeEntryIdentifier) -> bool {
        self.normalized() == other.normalized()
    }

    fn artificial_id(&self) -> String {
        let normalized = self.normalized();
        format!(
            "{}_{}_{}",
            normalized.vni, normalized.local_eid.address, normalized.remote_eid.address
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GpeEntryMapping {
    id: String,
    identifier: GpeEntryIdentifier,
}

/// GPE entry id to entry identity registry for one namespace.
#[derive(Debug)]
pub struct GpeEntryMappingContext {
    instance_name: String,
    mappings: ContextKey,
    lock: Mutex<()>,
}

impl GpeEntryMappingContext {
    pub fn new(instance_name: impl Into<String>) -> Self {
        let instance_name = instance_name.into();
        let mappings = ContextKey::from_segments([
            "gpe-entry-identification-context",
            instance_name.as_str(),
            "mappings",
        ]);
        Self {
            instance_name,
            mappings,
            lock: Mutex::new(()),
        }
    }

    fn context(&self) -> String {
        format!("gpe-entry-identification-context/{}", self.instance_name)
    }

    fn add_mapping_locked(
        &self,
        id: &str,
        identifier: &GpeEntryIdentifier,
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        let mapping = GpeEntryMapping {
            id: id.to_string(),
            identifier: identifier.normalized(),
        };
        ctx.put_as(&self.mappings.child(id), &mapping)
    }

    /// Stores `identifier` (normalized) under entry `id`, replacing any
    /// previous identity of `id`.
    pub fn add_mapping(
        &self,
        id: &str,
        identifier: &GpeEntryIdentifier,
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        let _guard = self.lock.lock();
        debug!(context = %self.instance_name, id, ?identifier, "Adding gpe entry mapping");
        self.add_mapping_locked(id, identifier, ctx)
    }

    pub fn remove_mapping(&self, id: &str, ctx: &dyn MappingContext) {
        let _guard = self.lock.lock();
        debug!(context = %self.instance_name, id, "Removing gpe entry mapping");
        ctx.delete(&self.mappings.child(id));
    }

    /// Identity stored for entry `id`.
    ///
    /// # Errors
    ///
    /// [`ContextError::InvariantViolation`] if `id` has no mapping.
    pub fn get_identificator_by_id(&self, id: &str, ctx: &dyn MappingContext) -> ContextResult<GpeEntryIdentifier> {
        let _guard = self.lock.lock();
        ctx.read_as::<GpeEntryMapping>(&self.mappings.child(id))?
            .map(|mapping| mapping.identifier)
            .ok_or_else(|| ContextError::invariant(self.context(), format!("no mapping for id {}", id)))
    }

    /// Entry id stored for `identifier`.
    ///
    /// An identity with no stored id gets `<vni>_<local>_<remote>`, which is
    /// stored before returning.
    pub fn get_id_by_entry_identifier(
        &self,
        identifier: &GpeEntryIdentifier,
        ctx: &dyn MappingContext,
    ) -> ContextResult<String> {
        let _guard = self.lock.lock();
        if let Some((_, mapping)) = ctx
            .list_as::<GpeEntryMapping>(&self.mappings)?
            .into_iter()
            .find(|(_, mapping)| identifier.is_same(&mapping.identifier))
        {
            return Ok(mapping.id);
        }

        let id = identifier.artificial_id();
        debug!(context = %self.instance_name, id = %id, "Synthesized gpe entry id");
        self.add_mapping_locked(&id, identifier, ctx)?;
        Ok(id)
    }
}

/// Local and remote locator address of one GPE path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GpeLocatorPair {
    pub local_address: IpAddress,
    pub remote_address: IpAddress,
}

impl GpeLocatorPair {
    pub fn new(local_address: IpAddress, remote_address: IpAddress) -> Self {
        Self {
            local_address,
            remote_address,
        }
    }
}

/// A locator pair together with its locator id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorPairMapping {
    pub id: String,
    pub pair: GpeLocatorPair,
}

#[derive(Debug)]
pub struct GpeLocatorPairMappingContext {
    instance_name: String,
    mappings: ContextKey,
    lock: Mutex<()>,
}

impl GpeLocatorPairMappingContext {
    pub fn new(instance_name: impl Into<String>) -> Self {
        let instance_name = instance_name.into();
        let mappings = ContextKey::from_segments([
            "gpe-locator-pair-context",
            instance_name.as_str(),
            "mappings",
        ]);
        Self {
            instance_name,
            mappings,
            lock: Mutex::new(()),
        }
    }

    fn context(&self) -> String {
        format!("gpe-locator-pair-context/{}", self.instance_name)
    }

    fn entry_mappings(&self, entry_id: &str, ctx: &dyn MappingContext) -> ContextResult<Vec<LocatorPairMapping>> {
        Ok(ctx
            .list_as::<LocatorPairMapping>(&self.mappings.child(entry_id))?
            .into_iter()
            .map(|(_, mapping)| mapping)
            .collect())
    }

    fn add_mapping_locked(
        &self,
        entry_id: &str,
        locator_id: &str,
        pair: &GpeLocatorPair,
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        let mapping = LocatorPairMapping {
            id: locator_id.to_string(),
            pair: *pair,
        };
        ctx.put_as(&self.mappings.child(entry_id).child(locator_id), &mapping)
    }

    /// Stores `pair` as locator `locator_id` of GPE entry `entry_id`.
    /// Other locators of the entry are kept.
    pub fn add_mapping(
        &self,
        entry_id: &str,
        locator_id: &str,
        pair: &GpeLocatorPair,
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        let _guard = self.lock.lock();
        debug!(context = %self.instance_name, entry_id, locator_id, "Adding locator pair mapping");
        self.add_mapping_locked(entry_id, locator_id, pair, ctx)
    }

    /// Removes every locator mapping of `entry_id`.
    pub fn remove_mapping(&self, entry_id: &str, ctx: &dyn MappingContext) {
        let _guard = self.lock.lock();
        debug!(context = %self.instance_name, entry_id, "Removing all locator pair mappings");
        ctx.delete(&self.mappings.child(entry_id));
    }

    /// Mapping of `pair` within `entry_id`, created with an artificial
    /// locator id when the pair is unknown.
    pub fn get_mapping(
        &self,
        entry_id: &str,
        pair: &GpeLocatorPair,
        ctx: &dyn MappingContext,
    ) -> ContextResult<LocatorPairMapping> {
        let _guard = self.lock.lock();
        if let Some(mapping) = self
            .entry_mappings(entry_id, ctx)?
            .into_iter()
            .find(|mapping| mapping.pair == *pair)
        {
            return Ok(mapping);
        }

        let locator_id = format!("{}_{}_{}", entry_id, pair.local_address, pair.remote_address);
        debug!(context = %self.instance_name, entry_id, locator_id = %locator_id, "Synthesized locator id");
        self.add_mapping_locked(entry_id, &locator_id, pair, ctx)?;
        Ok(LocatorPairMapping {
            id: locator_id,
            pair: *pair,
        })
    }

    pub fn get_mapping_by_id(
        &self,
        entry_id: &str,
        locator_id: &str,
        ctx: &dyn MappingContext,
    ) -> ContextResult<LocatorPairMapping> {
        let _guard = self.lock.lock();
        ctx.read_as::<LocatorPairMapping>(&self.mappings.child(entry_id).child(locator_id))?
            .ok_or_else(|| ContextError::not_found(self.context(), format!("{}|{}", entry_id, locator_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::eid::{EidAddress, LocalEid, RemoteEid};
    use crate::store::MappingStore;
    use pretty_assertions::assert_eq;

    fn entry(vni: u32, local: &str, remote: &str) -> GpeEntryIdentifier {
        let eid = |prefix: &str| Eid::new(vni, EidAddress::Prefix(prefix.parse().unwrap()));
        GpeEntryIdentifier::new(vni, &LocalEid(eid(local)), &RemoteEid(eid(remote)))
    }

    fn pair(local: &str, remote: &str) -> GpeLocatorPair {
        GpeLocatorPair::new(local.parse().unwrap(), remote.parse().unwrap())
    }

    #[test]
    fn test_add_and_get() {
        let store = MappingStore::new();
        let context = GpeLocatorPairMappingContext::new("gpe-ctx");
        let p = pair("10.0.0.1", "10.0.0.2");

        context.add_mapping("entry-1", "locator-1", &p, &store).unwrap();

        let mapping = context.get_mapping("entry-1", &p, &store).unwrap();
        assert_eq!(mapping.id, "locator-1");
        assert_eq!(
            context.get_mapping_by_id("entry-1", "locator-1", &store).unwrap(),
            mapping
        );
    }

    #[test]
    fn test_artificial_locator_id() {
        let store = MappingStore::new();
        let context = GpeLocatorPairMappingContext::new("gpe-ctx");
        let p = pair("10.0.0.1", "10.0.0.2");

        let mapping = context.get_mapping("entry-1", &p, &store).unwrap();
        assert_eq!(mapping.id, "entry-1_10.0.0.1_10.0.0.2");
        assert_eq!(
            context
                .get_mapping_by_id("entry-1", "entry-1_10.0.0.1_10.0.0.2", &store)
                .unwrap()
                .pair,
            p
        );
    }

    #[test]
    fn test_remove_mapping() {
        let store = MappingStore::new();
        let context = GpeLocatorPairMappingContext::new("gpe-ctx");

        context
            .add_mapping("entry-1", "l1", &pair("10.0.0.1", "10.0.0.2"), &store)
            .unwrap();
        context
            .add_mapping("entry-1", "l2", &pair("10.0.0.3", "10.0.0.4"), &store)
            .unwrap();
        context
            .add_mapping("entry-2", "l1", &pair("10.0.0.1", "10.0.0.2"), &store)
            .unwrap();

        context.remove_mapping("entry-1", &store);
        assert!(context.get_mapping_by_id("entry-1", "l2", &store).unwrap_err().is_not_found());
        assert_eq!(context.get_mapping_by_id("entry-2", "l1", &store).unwrap().id, "l1");
    }

    #[test]
    fn test_entry_mapping_by_id() {
        let store = MappingStore::new();
        let context = GpeEntryMappingContext::new("gpe-entry-ctx");
        let identifier = entry(3, "10.0.0.0/24", "10.1.0.0/24");

        context.add_mapping("entry-1", &identifier, &store).unwrap();
        assert_eq!(
            context.get_identificator_by_id("entry-1", &store).unwrap(),
            identifier
        );

        context.remove_mapping("entry-1", &store);
        let err = context.get_identificator_by_id("entry-1", &store).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_entry_id_matches_normalized_identity() {
        let store = MappingStore::new();
        let context = GpeEntryMappingContext::new("gpe-entry-ctx");

        context
            .add_mapping("entry-1", &entry(3, "10.0.0.5/24", "10.1.0.0/24"), &store)
            .unwrap();

        let engine_view = entry(3, "10.0.0.0/24", "10.1.0.9/24");
        assert_eq!(
            context.get_id_by_entry_identifier(&engine_view, &store).unwrap(),
            "entry-1"
        );
        assert!(!engine_view.is_same(&entry(4, "10.0.0.0/24", "10.1.0.0/24")));
    }

    #[test]
    fn test_artificial_entry_id() {
        let store = MappingStore::new();
        let context = GpeEntryMappingContext::new("gpe-entry-ctx");
        let identifier = entry(3, "10.0.0.5/24", "10.1.0.0/16");

        let id = context.get_id_by_entry_identifier(&identifier, &store).unwrap();
        assert_eq!(id, "3_10.0.0.0/24_10.1.0.0/16");
        assert_eq!(context.get_id_by_entry_identifier(&identifier, &store).unwrap(), id);
        assert!(context
            .get_identificator_by_id(&id, &store)
            .unwrap()
            .is_same(&identifier));
    }
}
