//! NAT static mapping entry context.
//!
//! The engine numbers NAT mappings by position only, so the model's entry id
//! is kept per NAT instance keyed by the (external, internal) address pair.
//! Model entries carry prefixes while engine dumps carry plain host
//! addresses; both are normalized into a [`MappingEntryKey`] so the two
//! sides meet on the same stored entry.

use crate::allocator::HighWaterMark;
use crate::error::{ContextError, ContextResult};
use crate::store::{ContextKey, MappingContext, MappingContextExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};
use vpp_api::{Nat44StaticMappingDetails, Nat64BibDetails};
use vpp_types::IpPrefix;

/// Normalized identity of a NAT mapping entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingEntryKey {
    external: IpPrefix,
    internal: IpPrefix,
}

impl MappingEntryKey {
    /// Builds a key from model prefixes, dropping host bits.
    pub fn new(external: IpPrefix, internal: IpPrefix) -> Self {
        Self {
            external: external.normalized(),
            internal: internal.normalized(),
        }
    }

    pub fn external(&self) -> &IpPrefix {
        &self.external
    }

    pub fn internal(&self) -> &IpPrefix {
        &self.internal
    }

    fn segment(&self) -> String {
        format!("{}|{}", self.external, self.internal)
    }
}

impl fmt::Display for MappingEntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.external, self.internal)
    }
}

/// Engine-side or model-side description of a mapping entry.
pub trait MappingEntryDetails {
    fn entry_key(&self) -> MappingEntryKey;
}

impl MappingEntryDetails for MappingEntryKey {
    fn entry_key(&self) -> MappingEntryKey {
        *self
    }
}

impl MappingEntryDetails for Nat44StaticMappingDetails {
    fn entry_key(&self) -> MappingEntryKey {
        MappingEntryKey::new(
            IpPrefix::host(self.external_ip_address),
            IpPrefix::host(self.local_ip_address),
        )
    }
}

impl MappingEntryDetails for Nat64BibDetails {
    fn entry_key(&self) -> MappingEntryKey {
        MappingEntryKey::new(IpPrefix::host(self.o_addr), IpPrefix::host(self.i_addr))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    #[serde(flatten)]
    key: MappingEntryKey,
    index: u32,
}

#[derive(Debug, Default)]
pub struct MappingEntryContext {
    lock: Mutex<()>,
}

impl MappingEntryContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn instance_root(nat_instance: u32) -> ContextKey {
        ContextKey::from_segments(["nat-mapping-entry-context".to_string(), nat_instance.to_string()])
    }

    fn table_key(nat_instance: u32) -> ContextKey {
        Self::instance_root(nat_instance).child("mapping-table")
    }

    fn entry_key(nat_instance: u32, key: &MappingEntryKey) -> ContextKey {
        Self::table_key(nat_instance).child(key.segment())
    }

    fn allocator(nat_instance: u32) -> HighWaterMark {
        HighWaterMark::new(Self::instance_root(nat_instance).child("next-index"), 0)
    }

    fn context(nat_instance: u32) -> String {
        format!("nat-mapping-entry-context/{}", nat_instance)
    }

    fn stored(&self, nat_instance: u32, ctx: &dyn MappingContext) -> ContextResult<Vec<StoredEntry>> {
        Ok(ctx
            .list_as::<StoredEntry>(&Self::table_key(nat_instance))?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect())
    }

    fn put_entry(
        &self,
        nat_instance: u32,
        index: u32,
        key: MappingEntryKey,
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        ctx.put_as(&Self::entry_key(nat_instance, &key), &StoredEntry { key, index })?;
        Self::allocator(nat_instance).observe(ctx, index)
    }

    /// Stores `entry` under `index`.
    ///
    /// # Errors
    ///
    /// [`ContextError::AlreadyExists`] if the entry is already stored.
    pub fn add_entry<E: MappingEntryDetails + ?Sized>(
        &self,
        nat_instance: u32,
        index: u32,
        entry: &E,
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        let _guard = self.lock.lock();
        let key = entry.entry_key();
        if ctx.read(&Self::entry_key(nat_instance, &key)).is_some() {
            return Err(ContextError::already_exists(Self::context(nat_instance), key));
        }
        self.put_entry(nat_instance, index, key, ctx)
    }

    pub fn contains_entry<E: MappingEntryDetails + ?Sized>(
        &self,
        nat_instance: u32,
        entry: &E,
        ctx: &dyn MappingContext,
    ) -> bool {
        let _guard = self.lock.lock();
        ctx.read(&Self::entry_key(nat_instance, &entry.entry_key())).is_some()
    }

    pub fn get_stored_index<E: MappingEntryDetails + ?Sized>(
        &self,
        nat_instance: u32,
        entry: &E,
        ctx: &dyn MappingContext,
    ) -> ContextResult<Option<u32>> {
        let _guard = self.lock.lock();
        Ok(ctx
            .read_as::<StoredEntry>(&Self::entry_key(nat_instance, &entry.entry_key()))?
            .map(|stored| stored.index))
    }

    /// Index stored for an engine entry, or a freshly allocated one that is
    /// stored before returning.
    pub fn get_stored_or_artificial_index<E: MappingEntryDetails + fmt::Debug + ?Sized>(
        &self,
        nat_instance: u32,
        details: &E,
        ctx: &dyn MappingContext,
    ) -> ContextResult<u32> {
        let _guard = self.lock.lock();
        let key = details.entry_key();
        if let Some(stored) = ctx.read_as::<StoredEntry>(&Self::entry_key(nat_instance, &key))? {
            return Ok(stored.index);
        }

        trace!(nat_instance, ?details, "Assigning artificial index");
        let in_use = self.stored(nat_instance, ctx)?.into_iter().map(|entry| entry.index);
        let index = Self::allocator(nat_instance).next(ctx, in_use)?;
        self.put_entry(nat_instance, index, key, ctx)?;
        debug!(nat_instance, index, entry = %key, "Artificial index assigned");
        Ok(index)
    }

    pub fn remove_entry<E: MappingEntryDetails + ?Sized>(
        &self,
        nat_instance: u32,
        entry: &E,
        ctx: &dyn MappingContext,
    ) {
        let _guard = self.lock.lock();
        ctx.delete(&Self::entry_key(nat_instance, &entry.entry_key()));
    }

    /// Picks the engine detail that the entry stored under `index` describes.
    ///
    /// # Errors
    ///
    /// [`ContextError::InvariantViolation`] if nothing is stored under
    /// `index`.
    pub fn find_details<'a, D: MappingEntryDetails>(
        &self,
        details: &'a [D],
        nat_instance: u32,
        index: u32,
        ctx: &dyn MappingContext,
    ) -> ContextResult<Option<&'a D>> {
        let _guard = self.lock.lock();
        let stored = self
            .stored(nat_instance, ctx)?
            .into_iter()
            .find(|entry| entry.index == index)
            .ok_or_else(|| {
                ContextError::invariant(
                    Self::context(nat_instance),
                    format!("unable to find context mapping for index {}", index),
                )
            })?;

        Ok(details.iter().find(|detail| detail.entry_key() == stored.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MappingStore;
    use pretty_assertions::assert_eq;
    use vpp_types::Ipv4Address;

    fn entry(external: &str, internal: &str) -> MappingEntryKey {
        MappingEntryKey::new(external.parse().unwrap(), internal.parse().unwrap())
    }

    fn nat44(external: [u8; 4], local: [u8; 4]) -> Nat44StaticMappingDetails {
        Nat44StaticMappingDetails {
            external_ip_address: Ipv4Address::from_octets(external),
            local_ip_address: Ipv4Address::from_octets(local),
            external_port: 0,
            local_port: 0,
            protocol: 0,
            vrf_id: 0,
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let store = MappingStore::new();
        let context = MappingEntryContext::new();
        let model = entry("1.2.3.4/32", "192.168.1.5/32");

        context.add_entry(0, 1, &model, &store).unwrap();

        assert!(context.contains_entry(0, &model, &store));
        assert!(!context.contains_entry(1, &model, &store));
        assert_eq!(context.get_stored_index(0, &model, &store).unwrap(), Some(1));

        let err = context.add_entry(0, 2, &model, &store).unwrap_err();
        assert!(matches!(err, ContextError::AlreadyExists { .. }));
    }

    #[test]
    fn test_prefix_normalization() {
        let store = MappingStore::new();
        let context = MappingEntryContext::new();

        context
            .add_entry(0, 3, &entry("10.0.0.5/24", "192.168.1.0/24"), &store)
            .unwrap();
        assert_eq!(
            context
                .get_stored_index(0, &entry("10.0.0.0/24", "192.168.1.9/24"), &store)
                .unwrap(),
            Some(3)
        );
    }

    #[test]
    fn test_engine_host_matches_model_prefix() {
        let store = MappingStore::new();
        let context = MappingEntryContext::new();

        context
            .add_entry(0, 7, &entry("1.2.3.4/32", "192.168.1.5/32"), &store)
            .unwrap();

        let details = nat44([1, 2, 3, 4], [192, 168, 1, 5]);
        assert_eq!(
            context.get_stored_or_artificial_index(0, &details, &store).unwrap(),
            7
        );
    }

    #[test]
    fn test_artificial_index_allocated_and_stored() {
        let store = MappingStore::new();
        let context = MappingEntryContext::new();

        context
            .add_entry(0, 4, &entry("1.2.3.4/32", "192.168.1.5/32"), &store)
            .unwrap();

        let unknown = nat44([5, 6, 7, 8], [192, 168, 1, 6]);
        assert_eq!(context.get_stored_or_artificial_index(0, &unknown, &store).unwrap(), 5);
        assert_eq!(context.get_stored_or_artificial_index(0, &unknown, &store).unwrap(), 5);
        assert!(context.contains_entry(0, &unknown, &store));
    }

    #[test]
    fn test_nat64_details() {
        let store = MappingStore::new();
        let context = MappingEntryContext::new();

        context
            .add_entry(0, 0, &entry("10.1.1.1/32", "2001:db8::1/128"), &store)
            .unwrap();
        let details = Nat64BibDetails {
            i_addr: "2001:db8::1".parse().unwrap(),
            o_addr: "10.1.1.1".parse().unwrap(),
            i_port: 0,
            o_port: 0,
            proto: 6,
            vrf_id: 0,
            is_static: true,
        };
        assert_eq!(context.get_stored_index(0, &details, &store).unwrap(), Some(0));
    }

    #[test]
    fn test_find_details() {
        let store = MappingStore::new();
        let context = MappingEntryContext::new();

        context
            .add_entry(0, 1, &entry("1.2.3.4/32", "192.168.1.5/32"), &store)
            .unwrap();
        let details = vec![
            nat44([9, 9, 9, 9], [192, 168, 1, 9]),
            nat44([1, 2, 3, 4], [192, 168, 1, 5]),
        ];

        let found = context.find_details(&details, 0, 1, &store).unwrap();
        assert_eq!(found, Some(&details[1]));

        let err = context.find_details(&details, 0, 42, &store).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_remove_entry() {
        let store = MappingStore::new();
        let context = MappingEntryContext::new();
        let model = entry("1.2.3.4/32", "192.168.1.5/32");

        context.add_entry(0, 1, &model, &store).unwrap();
        context.remove_entry(0, &model, &store);
        assert!(!context.contains_entry(0, &model, &store));
        // Removed indices are not handed out again.
        assert_eq!(context.get_stored_or_artificial_index(0, &model, &store).unwrap(), 2);
    }
}
