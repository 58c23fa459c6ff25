//! Common value types for VPP translation.
//!
//! This crate provides type-safe representations of the primitives shared
//! by the engine API layer and the naming contexts:
//!
//! - [`IpAddress`], [`IpPrefix`]: addresses and prefixes with canonical
//!   (masked) normalization
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`InstanceId`]: paths into the declarative data tree

mod iid;
mod ip;
mod mac;

pub use iid::{InstanceId, PathArgument};
pub use ip::{IpAddress, IpPrefix, Ipv4Address, Ipv6Address};
pub use mac::MacAddress;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),
}
