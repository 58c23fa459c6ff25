//! Engine messages used by the translation layer.

use crate::client::ApiRequest;
use vpp_types::{Ipv4Address, Ipv6Address, MacAddress};

/// Dumps interface details, optionally only those whose name matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwInterfaceDump {
    pub name_filter: Option<String>,
}

impl SwInterfaceDump {
    /// Dump of every interface.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name_filter: Some(name.into()),
        }
    }
}

impl ApiRequest for SwInterfaceDump {
    type Reply = Vec<SwInterfaceDetails>;
    const NAME: &'static str = "sw_interface_dump";
}

/// One interface as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwInterfaceDetails {
    pub sw_if_index: u32,
    /// Engine name; fixed-width on the wire, so it may carry trailing NULs.
    pub interface_name: String,
    pub l2_address: MacAddress,
    pub admin_up: bool,
    pub link_up: bool,
    pub sup_sw_if_index: u32,
    pub mtu: u32,
}

impl SwInterfaceDetails {
    /// Interface name without wire padding.
    pub fn name(&self) -> &str {
        self.interface_name.trim_end_matches('\0')
    }
}

/// Dumps NAT44 static mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nat44StaticMappingDump;

impl ApiRequest for Nat44StaticMappingDump {
    type Reply = Vec<Nat44StaticMappingDetails>;
    const NAME: &'static str = "nat44_static_mapping_dump";
}

/// One NAT44 static mapping. Addresses are plain hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nat44StaticMappingDetails {
    pub external_ip_address: Ipv4Address,
    pub local_ip_address: Ipv4Address,
    pub external_port: u16,
    pub local_port: u16,
    pub protocol: u8,
    pub vrf_id: u32,
}

/// Dumps NAT64 binding entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nat64BibDump {
    pub proto: u8,
}

impl ApiRequest for Nat64BibDump {
    type Reply = Vec<Nat64BibDetails>;
    const NAME: &'static str = "nat64_bib_dump";
}

/// One NAT64 binding: IPv6 inside, IPv4 outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nat64BibDetails {
    pub i_addr: Ipv6Address,
    pub o_addr: Ipv4Address,
    pub i_port: u16,
    pub o_port: u16,
    pub proto: u8,
    pub vrf_id: u32,
    pub is_static: bool,
}
