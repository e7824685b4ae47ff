//! Host probing primitives used by discovery
//!
//! [`NetworkProbe`] is the seam between the discovery algorithm and the OS:
//! the system implementation talks ARP through pnet, reverse DNS through the
//! platform resolver and TCP through tokio.

use crate::network::arp;
use crate::network::types::{ArpReply, NetworkError};
use async_trait::async_trait;
use pnet::datalink::{self, MacAddr, NetworkInterface};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Upper bound for a single reverse DNS lookup
const REVERSE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(1);

/// Probing operations needed by the discovery engine
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// ARP-resolve `targets`, waiting up to `timeout`
    ///
    /// Returns `LinkLayerUnavailable` when raw sockets cannot be used, which
    /// makes the engine switch to its TCP-only fallback.
    async fn arp_sweep(
        &self,
        targets: &[Ipv4Addr],
        timeout: Duration,
    ) -> Result<Vec<ArpReply>, NetworkError>;

    /// Reverse DNS name of `ip`, if any
    async fn reverse_lookup(&self, ip: Ipv4Addr) -> Option<String>;

    /// True when a TCP connection to `ip:port` succeeds within `timeout`
    async fn tcp_probe(&self, ip: Ipv4Addr, port: u16, timeout: Duration) -> bool;
}

/// Link-layer identity of the interface used for ARP
#[derive(Debug, Clone)]
struct LinkEndpoint {
    interface: NetworkInterface,
    mac: MacAddr,
    ip: Ipv4Addr,
}

/// Probe backed by the host's network stack
#[derive(Debug, Clone, Default)]
pub struct SystemProbe {
    endpoint: Option<LinkEndpoint>,
}

impl SystemProbe {
    /// Probe that sweeps from the interface owning `local_ip`
    ///
    /// When no such interface (or no MAC) exists the probe still works, but
    /// `arp_sweep` reports the link layer as unavailable.
    pub fn for_local_address(local_ip: Ipv4Addr) -> Self {
        let endpoint = datalink::interfaces().into_iter().find_map(|interface| {
            let owns_ip = interface.ips.iter().any(|net| net.ip() == IpAddr::V4(local_ip));
            match (owns_ip, interface.mac) {
                (true, Some(mac)) => Some(LinkEndpoint {
                    interface,
                    mac,
                    ip: local_ip,
                }),
                _ => None,
            }
        });

        if endpoint.is_none() {
            warn!("No link-layer interface owns {}; ARP sweep disabled", local_ip);
        }

        Self { endpoint }
    }

    /// Probe without link-layer access (TCP and DNS only)
    pub fn tcp_only() -> Self {
        Self { endpoint: None }
    }
}

#[async_trait]
impl NetworkProbe for SystemProbe {
    async fn arp_sweep(
        &self,
        targets: &[Ipv4Addr],
        timeout: Duration,
    ) -> Result<Vec<ArpReply>, NetworkError> {
        let Some(endpoint) = self.endpoint.clone() else {
            return Err(NetworkError::LinkLayerUnavailable(
                "no interface for ARP".to_string(),
            ));
        };
        let targets = targets.to_vec();

        tokio::task::spawn_blocking(move || {
            arp::sweep_batch(
                &endpoint.interface,
                endpoint.mac,
                endpoint.ip,
                &targets,
                timeout,
            )
        })
        .await
        .map_err(|e| NetworkError::LinkLayerUnavailable(format!("Task join error: {}", e)))?
    }

    async fn reverse_lookup(&self, ip: Ipv4Addr) -> Option<String> {
        let lookup = tokio::task::spawn_blocking(move || {
            dns_lookup::lookup_addr(&IpAddr::V4(ip)).ok()
        });

        match timeout(REVERSE_LOOKUP_TIMEOUT, lookup).await {
            Ok(Ok(Some(name))) if name.parse::<IpAddr>().is_err() => Some(name),
            Ok(_) => None,
            Err(_) => {
                debug!("Reverse lookup of {} timed out", ip);
                None
            }
        }
    }

    async fn tcp_probe(&self, ip: Ipv4Addr, port: u16, probe_timeout: Duration) -> bool {
        matches!(
            timeout(probe_timeout, TcpStream::connect((ip, port))).await,
            Ok(Ok(_))
        )
    }
}
