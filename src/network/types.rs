//! Common types for the network module

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

/// First three octets of a /24 network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubnetPrefix([u8; 3]);

impl SubnetPrefix {
    /// Prefix of the /24 containing `ip`
    pub fn of(ip: Ipv4Addr) -> Self {
        let [a, b, c, _] = ip.octets();
        Self([a, b, c])
    }

    /// Address `prefix.suffix`
    pub fn host(&self, suffix: u8) -> Ipv4Addr {
        let [a, b, c] = self.0;
        Ipv4Addr::new(a, b, c, suffix)
    }

    /// True when `ip` shares the first three octets
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        Self::of(ip) == *self
    }

    /// Usable host addresses `.1` to `.254`
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        (1..=254u8).map(move |suffix| self.host(suffix))
    }

    /// CIDR notation (`a.b.c.0/24`)
    pub fn cidr(&self) -> String {
        format!("{}/24", self.host(0))
    }
}

impl fmt::Display for SubnetPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{}.{}.{}", a, b, c)
    }
}

impl Serialize for SubnetPrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Errors raised while inspecting the local network
#[derive(Debug, Error)]
pub enum NetworkError {
    /// No default gateway could be read from the routing table
    #[error("No default gateway found")]
    NotFound,

    /// No local interface shares the gateway's /24
    #[error("No local interface on the {gateway} subnet")]
    NoMatchingSubnet {
        /// Gateway the subnet was derived from
        gateway: Ipv4Addr,
    },

    /// Discovery finished without a qualifying device
    #[error("No matching device found on {prefix}.0/24")]
    DeviceNotFound {
        /// Swept subnet
        prefix: SubnetPrefix,
    },

    /// A manually supplied address is outside the local subnet
    #[error("Address {address} is not on the local subnet {prefix}.0/24")]
    SubnetMismatch {
        /// Rejected address
        address: Ipv4Addr,
        /// Expected subnet
        prefix: SubnetPrefix,
    },

    /// Raw link-layer access is not possible (privileges, no interface)
    #[error("Link-layer sweep unavailable: {0}")]
    LinkLayerUnavailable(String),

    /// IO error while probing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Evidence that made a host a discovery candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSignal {
    /// MAC address starts with a known vendor prefix
    Mac,
    /// Reverse DNS name contains a known pattern
    Hostname,
    /// A known service port accepted a TCP connection
    Port,
}

/// A host that matched at least one discovery signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryCandidate {
    /// Host address
    pub ip: Ipv4Addr,
    /// Hardware address from the ARP reply, when swept at link layer
    pub mac: Option<String>,
    /// Reverse DNS name, when one resolved
    pub hostname: Option<String>,
    /// Signals that matched
    pub matched_by: BTreeSet<MatchSignal>,
    /// Known service ports found open
    pub open_ports: Vec<u16>,
}

impl DiscoveryCandidate {
    /// True when the candidate matched on `signal`
    pub fn matched(&self, signal: MatchSignal) -> bool {
        self.matched_by.contains(&signal)
    }
}

/// Result of a successful sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// Exactly one host qualified
    Found(DiscoveryCandidate),
    /// Several hosts qualified; the caller must pick one (discovery order)
    Ambiguous(Vec<DiscoveryCandidate>),
}

/// One ARP reply collected during a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpReply {
    /// Sender protocol address
    pub ip: Ipv4Addr,
    /// Sender hardware address (`aa:bb:cc:dd:ee:ff`)
    pub mac: String,
}
