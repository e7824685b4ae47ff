//! Relay discovery on the local /24
//!
//! The subnet is swept in ARP batches; every responding host is checked
//! against three independent signals (MAC vendor prefix, reverse DNS name,
//! open service port). When link-layer access is unavailable a sequential
//! TCP sweep covers the hosts not yet swept, using only the port signal.

use crate::config::DiscoveryConfig;
use crate::network::probe::NetworkProbe;
use crate::network::types::{
    ArpReply, DiscoveryCandidate, DiscoveryOutcome, MatchSignal, NetworkError, SubnetPrefix,
};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sweeps a subnet for the relay device
pub struct HostDiscoveryEngine {
    config: DiscoveryConfig,
    probe: Arc<dyn NetworkProbe>,
}

impl HostDiscoveryEngine {
    /// Create an engine using `probe` for all network access
    pub fn new(config: DiscoveryConfig, probe: Arc<dyn NetworkProbe>) -> Self {
        Self { config, probe }
    }

    /// Sweep `prefix` and select the relay
    ///
    /// `exclude` is the local machine's own address, never reported as a
    /// candidate. Candidates keep discovery order: batch order, ascending
    /// address within a batch.
    pub async fn discover(
        &self,
        prefix: SubnetPrefix,
        exclude: Option<Ipv4Addr>,
    ) -> Result<DiscoveryOutcome, NetworkError> {
        info!("Scanning {} for the relay device", prefix.cidr());

        let hosts: Vec<Ipv4Addr> = prefix.hosts().collect();
        let batch_size = self.config.batch_size.max(1);
        let mut candidates = Vec::new();

        for (index, batch) in hosts.chunks(batch_size).enumerate() {
            debug!(
                "ARP batch {} ({} - {})",
                index + 1,
                batch[0],
                batch[batch.len() - 1]
            );

            match self.probe.arp_sweep(batch, self.config.arp_timeout()).await {
                Ok(replies) => {
                    let evaluations = replies
                        .into_iter()
                        .filter(|reply| Some(reply.ip) != exclude)
                        .map(|reply| self.evaluate(reply));

                    candidates.extend(join_all(evaluations).await.into_iter().flatten());
                }
                Err(NetworkError::LinkLayerUnavailable(reason)) => {
                    // Hosts already swept keep their candidates
                    warn!("ARP sweep unavailable ({}), falling back to TCP probing", reason);
                    let remaining = &hosts[index * batch_size..];
                    candidates.extend(self.fallback_sweep(remaining, exclude).await);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        select(candidates, prefix)
    }

    /// Check every signal for one responding host
    async fn evaluate(&self, reply: ArpReply) -> Option<DiscoveryCandidate> {
        let ArpReply { ip, mac } = reply;

        let (hostname, open_ports) = futures::join!(
            self.probe.reverse_lookup(ip),
            self.open_ports(ip, self.config.port_probe_timeout())
        );

        let mut matched_by = BTreeSet::new();
        if mac_matches(&mac, &self.config.mac_prefixes) {
            matched_by.insert(MatchSignal::Mac);
        }
        if hostname
            .as_deref()
            .is_some_and(|name| hostname_matches(name, &self.config.hostname_patterns))
        {
            matched_by.insert(MatchSignal::Hostname);
        }
        if !open_ports.is_empty() {
            matched_by.insert(MatchSignal::Port);
        }

        if matched_by.is_empty() {
            return None;
        }

        info!("Candidate {} matched by {:?}", ip, matched_by);
        Some(DiscoveryCandidate {
            ip,
            mac: Some(mac),
            hostname,
            matched_by,
            open_ports,
        })
    }

    async fn open_ports(&self, ip: Ipv4Addr, timeout: std::time::Duration) -> Vec<u16> {
        let probes = self.config.known_ports.iter().map(|&port| async move {
            self.probe.tcp_probe(ip, port, timeout).await.then_some(port)
        });
        join_all(probes).await.into_iter().flatten().collect()
    }

    /// Sequential per-host, per-port sweep used without link-layer access
    async fn fallback_sweep(
        &self,
        hosts: &[Ipv4Addr],
        exclude: Option<Ipv4Addr>,
    ) -> Vec<DiscoveryCandidate> {
        let timeout = self.config.fallback_probe_timeout();
        let mut candidates = Vec::new();

        for &ip in hosts.iter().filter(|ip| Some(**ip) != exclude) {
            let mut open_ports = Vec::new();
            for &port in &self.config.known_ports {
                if self.probe.tcp_probe(ip, port, timeout).await {
                    open_ports.push(port);
                }
            }

            if !open_ports.is_empty() {
                info!("Candidate {} has open ports {:?}", ip, open_ports);
                candidates.push(DiscoveryCandidate {
                    ip,
                    mac: None,
                    hostname: None,
                    matched_by: BTreeSet::from([MatchSignal::Port]),
                    open_ports,
                });
            }
        }

        candidates
    }
}

fn select(
    mut candidates: Vec<DiscoveryCandidate>,
    prefix: SubnetPrefix,
) -> Result<DiscoveryOutcome, NetworkError> {
    match candidates.len() {
        0 => Err(NetworkError::DeviceNotFound { prefix }),
        1 => Ok(DiscoveryOutcome::Found(candidates.remove(0))),
        n => {
            info!("{} candidates found; caller must choose", n);
            Ok(DiscoveryOutcome::Ambiguous(candidates))
        }
    }
}

/// Accept a caller-supplied address if it is a host on `prefix`
pub fn validate_manual_address(
    address: Ipv4Addr,
    prefix: SubnetPrefix,
) -> Result<Ipv4Addr, NetworkError> {
    let suffix = address.octets()[3];
    if prefix.contains(address) && (1..=254).contains(&suffix) {
        Ok(address)
    } else {
        Err(NetworkError::SubnetMismatch { address, prefix })
    }
}

/// True when `mac` starts with one of the OUI `prefixes` (case-insensitive)
pub fn mac_matches(mac: &str, prefixes: &[String]) -> bool {
    let mac = mac.replace('-', ":").to_uppercase();
    prefixes
        .iter()
        .any(|prefix| mac.starts_with(&prefix.replace('-', ":").to_uppercase()))
}

/// True when `hostname` contains one of `patterns` (case-insensitive)
pub fn hostname_matches(hostname: &str, patterns: &[String]) -> bool {
    let hostname = hostname.to_lowercase();
    patterns
        .iter()
        .any(|pattern| hostname.contains(&pattern.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mac_prefix_is_case_insensitive() {
        let prefixes = strings(&["B8:27:EB"]);
        assert!(mac_matches("b8:27:eb:12:34:56", &prefixes));
        assert!(mac_matches("B8-27-EB-12-34-56", &prefixes));
        assert!(!mac_matches("00:11:22:33:44:55", &prefixes));
    }

    #[test]
    fn test_hostname_pattern_substring() {
        let patterns = strings(&["dreampi", "raspberrypi"]);
        assert!(hostname_matches("DreamPi.lan", &patterns));
        assert!(hostname_matches("my-raspberrypi", &patterns));
        assert!(!hostname_matches("laptop.lan", &patterns));
    }

    #[test]
    fn test_manual_address_rejects_network_and_broadcast() {
        let prefix = SubnetPrefix::of(Ipv4Addr::new(192, 168, 1, 1));
        assert!(validate_manual_address(Ipv4Addr::new(192, 168, 1, 0), prefix).is_err());
        assert!(validate_manual_address(Ipv4Addr::new(192, 168, 1, 255), prefix).is_err());
        assert!(validate_manual_address(Ipv4Addr::new(192, 168, 1, 77), prefix).is_ok());
    }
}
