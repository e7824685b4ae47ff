//! Local network inspection
//!
//! This module covers everything the session needs to know about the LAN:
//! - Default gateway lookup from the OS routing table
//! - Selection of the local address on the gateway's /24
//! - Relay discovery by ARP sweep, reverse DNS and port probing

pub mod arp;
pub mod discovery;
pub mod gateway;
pub mod probe;
pub mod subnet;
pub mod types;

pub use discovery::{HostDiscoveryEngine, validate_manual_address};
pub use gateway::find_default_gateway;
pub use probe::{NetworkProbe, SystemProbe};
pub use subnet::{InterfaceInfo, find_subnet_address, is_virtual_adapter};
pub use types::{
    ArpReply, DiscoveryCandidate, DiscoveryOutcome, MatchSignal, NetworkError, SubnetPrefix,
};

use std::net::Ipv4Addr;
use std::sync::Arc;

/// Host-level network facts the session depends on
pub trait HostNetwork: Send + Sync {
    /// Default gateway from the routing table
    fn default_gateway(&self) -> Result<Ipv4Addr, NetworkError>;

    /// Local interfaces in OS enumeration order
    fn interfaces(&self) -> Vec<InterfaceInfo>;

    /// Probe used for discovery, bound to the local address on the subnet
    fn probe_for(&self, local_ip: Ipv4Addr) -> Arc<dyn NetworkProbe>;
}

/// [`HostNetwork`] backed by the running operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNetwork;

impl HostNetwork for SystemNetwork {
    fn default_gateway(&self) -> Result<Ipv4Addr, NetworkError> {
        find_default_gateway()
    }

    fn interfaces(&self) -> Vec<InterfaceInfo> {
        subnet::system_interfaces()
    }

    fn probe_for(&self, local_ip: Ipv4Addr) -> Arc<dyn NetworkProbe> {
        Arc::new(SystemProbe::for_local_address(local_ip))
    }
}
