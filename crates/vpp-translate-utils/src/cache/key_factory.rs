//! Cache key strategies.
//!
//! The key decides how widely a dump is shared within a transaction: per
//! requested node, per parent scope (e.g. one IP address dump per
//! interface), or once for everything.

use std::any::type_name;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use vpp_api::ReadFailedError;
use vpp_types::InstanceId;

const SEPARATOR: &str = "|";

/// Derives the cache key for a dump request.
pub trait CacheKeyFactory<P>: Send + Sync {
    /// Fails if `id` cannot be told apart from unrelated requests, which
    /// would make them share one dump.
    fn create_key(&self, id: &InstanceId, params: &P) -> Result<String, ReadFailedError>;
}

fn params_digest<P: Hash>(params: &P) -> String {
    let mut hasher = DefaultHasher::new();
    params.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Identifier part of a key: the full path, or only the keyed steps of the
/// scope nodes followed by the target node.
///
/// Every scope node must appear keyed on `id`.
fn scoped_path(id: &InstanceId, scope: &[String]) -> Result<String, ReadFailedError> {
    if scope.is_empty() {
        return Ok(id.to_string());
    }
    if let Some(missing) = scope.iter().find(|node| id.first_key_of(node).is_none()) {
        return Err(ReadFailedError::invalid_identifier(
            id,
            format!("no key for scope node {} to derive a cache key from", missing),
        ));
    }
    let mut parts: Vec<String> = id.keyed_steps(scope).map(|arg| arg.to_string()).collect();
    parts.push(id.target().to_string());
    Ok(parts.join("/"))
}

/// Key made of the identifier and a parameter digest.
///
/// Without a scope every node gets its own key. With a scope only the keys
/// of the listed parent nodes count, so siblings below one parent share.
#[derive(Debug, Clone, Default)]
pub struct IdentifierCacheKeyFactory {
    scope: Vec<String>,
}

impl IdentifierCacheKeyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope<I, S>(scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scope: scope.into_iter().map(Into::into).collect(),
        }
    }
}

impl<P: Hash> CacheKeyFactory<P> for IdentifierCacheKeyFactory {
    fn create_key(&self, id: &InstanceId, params: &P) -> Result<String, ReadFailedError> {
        Ok([scoped_path(id, &self.scope)?, params_digest(params)].join(SEPARATOR))
    }
}

/// Like [`IdentifierCacheKeyFactory`], prefixed with the dump type so that
/// different dumps for the same node never share a key.
#[derive(Debug, Clone)]
pub struct TypeAwareIdentifierCacheKeyFactory {
    type_name: &'static str,
    scope: Vec<String>,
}

impl TypeAwareIdentifierCacheKeyFactory {
    pub fn new<D>() -> Self {
        Self {
            type_name: type_name::<D>(),
            scope: Vec::new(),
        }
    }

    pub fn with_scope<D, I, S>(scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            type_name: type_name::<D>(),
            scope: scope.into_iter().map(Into::into).collect(),
        }
    }

    /// One dump of type `D` per interface.
    pub fn interface_scoped<D>() -> Self {
        Self::with_scope::<D, _, _>(["interface"])
    }
}

impl<P: Hash> CacheKeyFactory<P> for TypeAwareIdentifierCacheKeyFactory {
    fn create_key(&self, id: &InstanceId, params: &P) -> Result<String, ReadFailedError> {
        Ok([
            self.type_name.to_string(),
            scoped_path(id, &self.scope)?,
            params_digest(params),
        ]
        .join(SEPARATOR))
    }
}

/// The same key for every request. For dumps that list everything
/// regardless of what was asked for.
#[derive(Debug, Clone)]
pub struct StaticCacheKeyFactory {
    key: String,
}

impl StaticCacheKeyFactory {
    pub fn new<D>(key: impl AsRef<str>) -> Self {
        Self {
            key: [key.as_ref(), type_name::<D>()].join(SEPARATOR),
        }
    }
}

impl<P> CacheKeyFactory<P> for StaticCacheKeyFactory {
    fn create_key(&self, _id: &InstanceId, _params: &P) -> Result<String, ReadFailedError> {
        Ok(self.key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct AddressDump;
    struct NeighborDump;

    fn address_id(ifc: &str, addr: &str) -> InstanceId {
        InstanceId::create("interfaces")
            .keyed_child("interface", ifc)
            .child("ipv4")
            .keyed_child("address", addr)
    }

    #[test]
    fn test_identifier_key_per_node() {
        let factory = IdentifierCacheKeyFactory::new();
        let a = factory.create_key(&address_id("eth0", "10.0.0.1"), &()).unwrap();
        let b = factory.create_key(&address_id("eth0", "10.0.0.2"), &()).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("/interfaces/interface[eth0]/ipv4/address[10.0.0.1]|"));
    }

    #[test]
    fn test_params_are_part_of_key() {
        let factory = IdentifierCacheKeyFactory::new();
        let id = address_id("eth0", "10.0.0.1");
        assert_ne!(factory.create_key(&id, &1u32).unwrap(), factory.create_key(&id, &2u32).unwrap());
        assert_eq!(factory.create_key(&id, &1u32).unwrap(), factory.create_key(&id, &1u32).unwrap());
    }

    #[test]
    fn test_scoped_keys() {
        let factory = TypeAwareIdentifierCacheKeyFactory::interface_scoped::<AddressDump>();
        let a = factory.create_key(&address_id("eth0", "10.0.0.1"), &()).unwrap();
        let b = factory.create_key(&address_id("eth0", "10.0.0.2"), &()).unwrap();
        let c = factory.create_key(&address_id("eth1", "10.0.0.1"), &()).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_type_is_part_of_key() {
        let id = address_id("eth0", "10.0.0.1");
        let addresses = TypeAwareIdentifierCacheKeyFactory::interface_scoped::<AddressDump>();
        let neighbors = TypeAwareIdentifierCacheKeyFactory::interface_scoped::<NeighborDump>();
        assert_ne!(addresses.create_key(&id, &()).unwrap(), neighbors.create_key(&id, &()).unwrap());
    }

    #[test]
    fn test_static_key() {
        let factory = StaticCacheKeyFactory::new::<AddressDump>("tap_dump");
        let a = factory.create_key(&address_id("eth0", "10.0.0.1"), &()).unwrap();
        let b = factory.create_key(&address_id("eth1", "10.0.0.9"), &5u32).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("tap_dump|"));
    }

    #[test]
    fn test_scope_node_must_be_keyed() {
        let factory = TypeAwareIdentifierCacheKeyFactory::interface_scoped::<AddressDump>();
        let fib = InstanceId::create("bridge-domains")
            .keyed_child("bridge-domain", "bd1")
            .child("l2-fib");

        let err = factory.create_key(&fib, &()).unwrap_err();
        assert!(matches!(err, ReadFailedError::InvalidIdentifier { .. }));
        assert_eq!(err.id(), &fib);

        let unkeyed = InstanceId::create("interfaces").child("interface").child("ipv4");
        assert!(factory.create_key(&unkeyed, &()).is_err());
    }
}
