//! Specialized context managers.
//!
//! Same contract as [`NamingContext`](crate::NamingContext), generalized to
//! identities that need normalization (EIDs, NAT address pairs) or scoping
//! under a parent (ACE names per ACL, node names per classify table, locator
//! ids per GPE entry). GPE entries themselves are identified by their
//! normalized EID pair.

mod acl;
mod adjacency;
mod classifier;
mod eid;
mod gpe;
mod nat;

pub use acl::AclContextManager;
pub use adjacency::{AdjacenciesMappingContext, EidIdentificatorPair};
pub use classifier::ClassifierContextManager;
pub use eid::{AsEid, Eid, EidAddress, EidMappingContext, LocalEid, RemoteEid};
pub use gpe::{
    GpeEntryIdentifier, GpeEntryMappingContext, GpeLocatorPair, GpeLocatorPairMappingContext,
    LocatorPairMapping,
};
pub use nat::{MappingEntryContext, MappingEntryDetails, MappingEntryKey};
