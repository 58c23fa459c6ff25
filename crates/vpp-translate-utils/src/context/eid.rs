//! LISP EID to mapping-id context.
//!
//! Local and remote mappings carry the same EID shape; the role wrapper is
//! dropped and the address normalized before anything is compared or stored,
//! so `10.0.0.5/24` as a local EID and `10.0.0.0/24` as a remote EID are the
//! same identity.

use crate::error::{ContextError, ContextResult};
use crate::store::{ContextKey, MappingContext, MappingContextExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use vpp_types::{IpAddress, IpPrefix, MacAddress};

/// Address part of an EID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum EidAddress {
    Ip(IpAddress),
    Prefix(IpPrefix),
    Mac(MacAddress),
}

impl EidAddress {
    /// Canonical form: prefixes lose their host bits. MACs are canonical by
    /// construction.
    pub fn normalized(&self) -> Self {
        match self {
            EidAddress::Prefix(prefix) => EidAddress::Prefix(prefix.normalized()),
            other => *other,
        }
    }
}

impl fmt::Display for EidAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EidAddress::Ip(ip) => write!(f, "{}", ip),
            EidAddress::Prefix(prefix) => write!(f, "{}", prefix),
            EidAddress::Mac(mac) => write!(f, "{}", mac),
        }
    }
}

/// An endpoint identifier within a virtual network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Eid {
    pub virtual_network_id: u32,
    pub address: EidAddress,
}

impl Eid {
    pub fn new(virtual_network_id: u32, address: EidAddress) -> Self {
        Self {
            virtual_network_id,
            address,
        }
    }

    pub fn normalized(&self) -> Self {
        Self {
            virtual_network_id: self.virtual_network_id,
            address: self.address.normalized(),
        }
    }
}

impl fmt::Display for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.virtual_network_id, self.address)
    }
}

/// EID of a local mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalEid(pub Eid);

/// EID of a remote mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteEid(pub Eid);

/// Anything that carries an EID.
pub trait AsEid {
    fn as_eid(&self) -> &Eid;
}

impl AsEid for Eid {
    fn as_eid(&self) -> &Eid {
        self
    }
}

impl AsEid for LocalEid {
    fn as_eid(&self) -> &Eid {
        &self.0
    }
}

impl AsEid for RemoteEid {
    fn as_eid(&self) -> &Eid {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EidMapping {
    id: String,
    eid: Eid,
}

/// Mapping-id to EID registry for one namespace.
#[derive(Debug)]
pub struct EidMappingContext {
    instance_name: String,
    mappings: ContextKey,
    lock: Mutex<()>,
}

impl EidMappingContext {
    pub fn new(instance_name: impl Into<String>) -> Self {
        let instance_name = instance_name.into();
        let mappings = ContextKey::from_segments([
            "eid-mapping-context",
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
        format!("eid-mapping-context/{}", self.instance_name)
    }

    fn matching_ids<E: AsEid + ?Sized>(&self, eid: &E, ctx: &dyn MappingContext) -> ContextResult<Vec<String>> {
        let wanted = eid.as_eid().normalized();
        Ok(ctx
            .list_as::<EidMapping>(&self.mappings)?
            .into_iter()
            .filter(|(_, mapping)| mapping.eid.normalized() == wanted)
            .map(|(_, mapping)| mapping.id)
            .collect())
    }

    /// Stores `eid` (normalized, role stripped) under mapping `id`.
    pub fn add_eid<E: AsEid + ?Sized>(&self, id: &str, eid: &E, ctx: &dyn MappingContext) -> ContextResult<()> {
        let _guard = self.lock.lock();
        let mapping = EidMapping {
            id: id.to_string(),
            eid: eid.as_eid().normalized(),
        };
        ctx.put_as(&self.mappings.child(id), &mapping)
    }

    /// True if some mapping id is stored for `eid`.
    pub fn contains_id<E: AsEid + ?Sized>(&self, eid: &E, ctx: &dyn MappingContext) -> ContextResult<bool> {
        let _guard = self.lock.lock();
        Ok(!self.matching_ids(eid, ctx)?.is_empty())
    }

    /// Mapping id stored for `eid`.
    ///
    /// No artificial id is ever invented: an EID the engine knows but the
    /// context does not is an [`InvariantViolation`](ContextError::InvariantViolation).
    pub fn get_id<E: AsEid + ?Sized>(&self, eid: &E, ctx: &dyn MappingContext) -> ContextResult<String> {
        self.find_id(eid, ctx)?.ok_or_else(|| {
            ContextError::invariant(
                self.context(),
                format!("mapping for eid {} is not present", eid.as_eid()),
            )
        })
    }

    pub fn find_id<E: AsEid + ?Sized>(&self, eid: &E, ctx: &dyn MappingContext) -> ContextResult<Option<String>> {
        let _guard = self.lock.lock();
        let mut ids = self.matching_ids(eid, ctx)?;
        if ids.len() > 1 {
            return Err(ContextError::invariant(
                self.context(),
                format!("multiple mappings for eid {}: {}", eid.as_eid(), ids.join(", ")),
            ));
        }
        Ok(ids.pop())
    }

    /// True if mapping `id` has an EID.
    pub fn contains_eid(&self, id: &str, ctx: &dyn MappingContext) -> bool {
        let _guard = self.lock.lock();
        ctx.read(&self.mappings.child(id)).is_some()
    }

    pub fn get_eid(&self, id: &str, ctx: &dyn MappingContext) -> ContextResult<Eid> {
        let _guard = self.lock.lock();
        ctx.read_as::<EidMapping>(&self.mappings.child(id))?
            .map(|mapping| mapping.eid)
            .ok_or_else(|| ContextError::not_found(self.context(), id))
    }

    pub fn remove_eid(&self, id: &str, ctx: &dyn MappingContext) {
        let _guard = self.lock.lock();
        ctx.delete(&self.mappings.child(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MappingStore;
    use pretty_assertions::assert_eq;

    fn prefix_eid(vni: u32, prefix: &str) -> Eid {
        Eid::new(vni, EidAddress::Prefix(prefix.parse().unwrap()))
    }

    #[test]
    fn test_local_and_remote_collide() {
        let store = MappingStore::new();
        let context = EidMappingContext::new("eid-ctx");

        context
            .add_eid("mapping-1", &LocalEid(prefix_eid(12, "10.0.0.5/24")), &store)
            .unwrap();

        let remote = RemoteEid(prefix_eid(12, "10.0.0.0/24"));
        assert!(context.contains_id(&remote, &store).unwrap());
        assert_eq!(context.get_id(&remote, &store).unwrap(), "mapping-1");
        assert_eq!(
            context.get_eid("mapping-1", &store).unwrap(),
            prefix_eid(12, "10.0.0.0/24")
        );
    }

    #[test]
    fn test_virtual_network_is_part_of_identity() {
        let store = MappingStore::new();
        let context = EidMappingContext::new("eid-ctx");

        context.add_eid("mapping-1", &prefix_eid(1, "10.0.0.0/24"), &store).unwrap();
        assert!(!context.contains_id(&prefix_eid(2, "10.0.0.0/24"), &store).unwrap());
    }

    #[test]
    fn test_mac_eid() {
        let store = MappingStore::new();
        let context = EidMappingContext::new("eid-ctx");

        let upper = Eid::new(0, EidAddress::Mac("AA-BB-CC-DD-EE-FF".parse().unwrap()));
        let lower = Eid::new(0, EidAddress::Mac("aa:bb:cc:dd:ee:ff".parse().unwrap()));
        context.add_eid("mac-1", &upper, &store).unwrap();
        assert_eq!(context.get_id(&lower, &store).unwrap(), "mac-1");
    }

    #[test]
    fn test_missing_eid_is_invariant_violation() {
        let store = MappingStore::new();
        let context = EidMappingContext::new("eid-ctx");

        let err = context.get_id(&prefix_eid(0, "192.168.0.0/16"), &store).unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(context.find_id(&prefix_eid(0, "192.168.0.0/16"), &store).unwrap(), None);

        let err = context.get_eid("missing", &store).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_remove() {
        let store = MappingStore::new();
        let context = EidMappingContext::new("eid-ctx");
        let eid = Eid::new(0, EidAddress::Ip("10.1.1.1".parse().unwrap()));

        context.add_eid("m", &eid, &store).unwrap();
        assert!(context.contains_eid("m", &store));
        context.remove_eid("m", &store);
        assert!(!context.contains_eid("m", &store));
        assert!(!context.contains_id(&eid, &store).unwrap());
    }
}
