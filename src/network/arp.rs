//! ARP request/reply frames and the blocking batch sweep

use crate::network::types::{ArpReply, NetworkError};
use pnet::datalink::{self, Channel, Config, MacAddr, NetworkInterface};
use pnet::packet::Packet;
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Ethernet header length
pub const ETH_HDR_LEN: usize = 14;
/// ARP payload length for IPv4 over Ethernet
pub const ARP_LEN: usize = 28;

/// Poll interval of the receive loop
const READ_POLL: Duration = Duration::from_millis(50);

/// Build a broadcast ARP "who-has" frame for `dst_addr`
pub fn create_request(
    src_mac: MacAddr,
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
) -> Result<Vec<u8>, NetworkError> {
    let mut buffer = vec![0u8; ETH_HDR_LEN + ARP_LEN];

    {
        let mut eth = MutableEthernetPacket::new(&mut buffer).ok_or_else(|| {
            NetworkError::LinkLayerUnavailable("failed to create Ethernet frame".to_string())
        })?;
        eth.set_destination(MacAddr::broadcast());
        eth.set_source(src_mac);
        eth.set_ethertype(EtherTypes::Arp);
    }

    let mut arp = MutableArpPacket::new(&mut buffer[ETH_HDR_LEN..]).ok_or_else(|| {
        NetworkError::LinkLayerUnavailable("failed to create ARP packet".to_string())
    })?;
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    arp.set_operation(ArpOperations::Request);
    arp.set_sender_hw_addr(src_mac);
    arp.set_sender_proto_addr(src_addr);
    arp.set_target_hw_addr(MacAddr::zero());
    arp.set_target_proto_addr(dst_addr);

    Ok(buffer)
}

/// Extract sender address and MAC from an ARP reply frame
///
/// Returns `None` for anything that is not a well-formed ARP reply.
pub fn parse_reply(frame: &[u8]) -> Option<ArpReply> {
    let eth = EthernetPacket::new(frame)?;
    if eth.get_ethertype() != EtherTypes::Arp {
        return None;
    }

    let arp = ArpPacket::new(eth.payload())?;
    if arp.get_operation() != ArpOperations::Reply {
        return None;
    }

    Some(ArpReply {
        ip: arp.get_sender_proto_addr(),
        mac: arp.get_sender_hw_addr().to_string(),
    })
}

/// Resolve `targets` on `interface`, waiting up to `timeout` for replies
///
/// Blocking; call from `spawn_blocking`. Replies are returned sorted by
/// address, one per host, restricted to the requested targets.
pub fn sweep_batch(
    interface: &NetworkInterface,
    src_mac: MacAddr,
    src_addr: Ipv4Addr,
    targets: &[Ipv4Addr],
    timeout: Duration,
) -> Result<Vec<ArpReply>, NetworkError> {
    let config = Config {
        read_timeout: Some(READ_POLL),
        ..Default::default()
    };

    let (mut tx, mut rx) = match datalink::channel(interface, config) {
        Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
        Ok(_) => {
            return Err(NetworkError::LinkLayerUnavailable(format!(
                "unsupported channel type on {}",
                interface.name
            )));
        }
        Err(e) => {
            return Err(NetworkError::LinkLayerUnavailable(format!(
                "cannot open {}: {}",
                interface.name, e
            )));
        }
    };

    for target in targets {
        let frame = create_request(src_mac, src_addr, *target)?;
        if let Some(Err(e)) = tx.send_to(&frame, None) {
            warn!("Failed to send ARP request for {}: {}", target, e);
        }
    }

    let wanted: HashSet<Ipv4Addr> = targets.iter().copied().collect();
    let mut seen: HashSet<Ipv4Addr> = HashSet::new();
    let mut replies = Vec::new();
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline && seen.len() < wanted.len() {
        match rx.next() {
            Ok(frame) => {
                if let Some(reply) = parse_reply(frame) {
                    if wanted.contains(&reply.ip) && seen.insert(reply.ip) {
                        debug!("ARP reply from {} ({})", reply.ip, reply.mac);
                        replies.push(reply);
                    }
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
            Err(e) => {
                warn!("ARP receive error on {}: {}", interface.name, e);
                break;
            }
        }
    }

    replies.sort_by_key(|reply| reply.ip);
    Ok(replies)
}
