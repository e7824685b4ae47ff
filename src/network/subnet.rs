//! Local interface selection
//!
//! Finds the address this machine uses on the router's /24, skipping
//! tunnel/VPN adapters whose addresses would otherwise win on machines with a
//! VPN client installed.

use crate::network::types::{NetworkError, SubnetPrefix};
use pnet::datalink;
use pnet::ipnetwork::IpNetwork;
use std::net::Ipv4Addr;
use tracing::{debug, info};

/// Name/description fragments of virtual adapters (case-insensitive)
pub const VIRTUAL_ADAPTER_PATTERNS: &[&str] = &["vpn", "tap-windows", "tunnel", "tun", "tap"];

/// A local interface as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    /// OS interface name (`eth0`, `en0`, `{GUID}`)
    pub name: String,
    /// Adapter description; empty where the OS has none
    pub description: String,
    /// IPv4 addresses assigned to the interface
    pub ipv4: Vec<Ipv4Addr>,
}

impl InterfaceInfo {
    /// Convenience constructor for an interface without a description
    pub fn new(name: impl Into<String>, ipv4: Vec<Ipv4Addr>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            ipv4,
        }
    }
}

/// True when the interface name or description looks like a tunnel/VPN adapter
pub fn is_virtual_adapter(interface: &InterfaceInfo) -> bool {
    let name = interface.name.to_lowercase();
    let description = interface.description.to_lowercase();
    VIRTUAL_ADAPTER_PATTERNS
        .iter()
        .any(|pattern| name.contains(pattern) || description.contains(pattern))
}

/// Pick the local address sharing the gateway's /24
///
/// Interfaces are visited in the order given (OS enumeration order), so the
/// result is stable for a fixed machine state.
pub fn find_subnet_address(
    gateway: Ipv4Addr,
    interfaces: &[InterfaceInfo],
) -> Result<Ipv4Addr, NetworkError> {
    let prefix = SubnetPrefix::of(gateway);

    for interface in interfaces {
        if is_virtual_adapter(interface) {
            debug!("Skipping virtual adapter {}", interface.name);
            continue;
        }

        let matching = interface
            .ipv4
            .iter()
            .copied()
            .find(|ip| !ip.is_loopback() && prefix.contains(*ip));

        if let Some(ip) = matching {
            info!("Found matching adapter {} with address {}", interface.name, ip);
            return Ok(ip);
        }
    }

    Err(NetworkError::NoMatchingSubnet { gateway })
}

/// Enumerate local interfaces in OS order
pub fn system_interfaces() -> Vec<InterfaceInfo> {
    datalink::interfaces()
        .into_iter()
        .map(|interface| InterfaceInfo {
            ipv4: interface
                .ips
                .iter()
                .filter_map(|net| match net {
                    IpNetwork::V4(v4) => Some(v4.ip()),
                    IpNetwork::V6(_) => None,
                })
                .collect(),
            description: interface.description,
            name: interface.name,
        })
        .collect()
}
