use crate::config::DiscoveryConfig;
use crate::network::arp::{self, ETH_HDR_LEN};
use crate::network::gateway::*;
use crate::network::*;
use async_trait::async_trait;
use pnet::datalink::MacAddr;
use pnet::packet::arp::{ArpOperations, MutableArpPacket};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 1, last)
}

fn prefix() -> SubnetPrefix {
    SubnetPrefix::of(ip(1))
}

/// Probe answering from fixed tables
#[derive(Default)]
struct ScriptedProbe {
    link_layer: bool,
    macs: HashMap<Ipv4Addr, String>,
    names: HashMap<Ipv4Addr, String>,
    open: HashSet<(Ipv4Addr, u16)>,
    /// Link-layer access is lost after this many batches
    link_layer_batches: Option<usize>,
    sweeps: AtomicUsize,
}

impl ScriptedProbe {
    fn with_link_layer() -> Self {
        Self {
            link_layer: true,
            ..Default::default()
        }
    }

    fn losing_link_layer_after(mut self, batches: usize) -> Self {
        self.link_layer_batches = Some(batches);
        self
    }

    fn host(mut self, last: u8, mac: &str) -> Self {
        self.macs.insert(ip(last), mac.to_string());
        self
    }

    fn name(mut self, last: u8, name: &str) -> Self {
        self.names.insert(ip(last), name.to_string());
        self
    }

    fn port(mut self, last: u8, port: u16) -> Self {
        self.open.insert((ip(last), port));
        self
    }
}

#[async_trait]
impl NetworkProbe for ScriptedProbe {
    async fn arp_sweep(
        &self,
        targets: &[Ipv4Addr],
        _timeout: Duration,
    ) -> Result<Vec<ArpReply>, NetworkError> {
        if !self.link_layer {
            return Err(NetworkError::LinkLayerUnavailable("no raw sockets".to_string()));
        }
        let done = self.sweeps.fetch_add(1, Ordering::SeqCst);
        if self.link_layer_batches.is_some_and(|limit| done >= limit) {
            return Err(NetworkError::LinkLayerUnavailable("interface went down".to_string()));
        }
        Ok(targets
            .iter()
            .filter_map(|target| {
                self.macs.get(target).map(|mac| ArpReply {
                    ip: *target,
                    mac: mac.clone(),
                })
            })
            .collect())
    }

    async fn reverse_lookup(&self, ip: Ipv4Addr) -> Option<String> {
        self.names.get(&ip).cloned()
    }

    async fn tcp_probe(&self, ip: Ipv4Addr, port: u16, _timeout: Duration) -> bool {
        self.open.contains(&(ip, port))
    }
}

fn engine(probe: ScriptedProbe) -> (HostDiscoveryEngine, Arc<ScriptedProbe>) {
    let probe = Arc::new(probe);
    (
        HostDiscoveryEngine::new(DiscoveryConfig::default(), probe.clone()),
        probe,
    )
}

const PI_MAC: &str = "b8:27:eb:aa:bb:cc";
const OTHER_MAC: &str = "00:11:22:33:44:55";

#[tokio::test]
async fn test_discovery_single_mac_match() {
    let (engine, probe) = engine(
        ScriptedProbe::with_link_layer()
            .host(1, OTHER_MAC)
            .host(42, PI_MAC)
            .host(77, OTHER_MAC),
    );

    let outcome = engine.discover(prefix(), None).await.expect("Discovery failed");

    match outcome {
        DiscoveryOutcome::Found(candidate) => {
            assert_eq!(candidate.ip, ip(42));
            assert!(candidate.matched(MatchSignal::Mac));
            assert!(!candidate.matched(MatchSignal::Port));
            assert_eq!(candidate.mac.as_deref(), Some(PI_MAC));
        }
        other => panic!("Expected a single candidate, got {:?}", other),
    }

    // 254 hosts in batches of 50
    assert_eq!(probe.sweeps.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_discovery_hostname_and_port_signals() {
    let (engine, _) = engine(
        ScriptedProbe::with_link_layer()
            .host(30, OTHER_MAC)
            .name(30, "DreamPi.lan")
            .port(30, 65432)
            .port(30, 20002),
    );

    let outcome = engine.discover(prefix(), None).await.expect("Discovery failed");

    let DiscoveryOutcome::Found(candidate) = outcome else {
        panic!("Expected a single candidate");
    };
    assert!(candidate.matched(MatchSignal::Hostname));
    assert!(candidate.matched(MatchSignal::Port));
    assert!(!candidate.matched(MatchSignal::Mac));
    assert_eq!(candidate.hostname.as_deref(), Some("DreamPi.lan"));
    assert_eq!(candidate.open_ports, vec![65432, 20002]);
}

#[tokio::test]
async fn test_discovery_ambiguous_keeps_discovery_order() {
    let (engine, _) = engine(
        ScriptedProbe::with_link_layer()
            .host(120, PI_MAC)
            .host(20, OTHER_MAC)
            .port(20, 65432),
    );

    let outcome = engine.discover(prefix(), None).await.expect("Discovery failed");

    let DiscoveryOutcome::Ambiguous(candidates) = outcome else {
        panic!("Expected several candidates");
    };
    let ips: Vec<Ipv4Addr> = candidates.iter().map(|c| c.ip).collect();
    assert_eq!(ips, vec![ip(20), ip(120)]);
}

#[tokio::test]
async fn test_discovery_excludes_local_address() {
    let (engine, _) = engine(
        ScriptedProbe::with_link_layer()
            .host(10, PI_MAC)
            .host(55, PI_MAC),
    );

    let outcome = engine
        .discover(prefix(), Some(ip(10)))
        .await
        .expect("Discovery failed");

    assert!(matches!(outcome, DiscoveryOutcome::Found(c) if c.ip == ip(55)));
}

#[tokio::test]
async fn test_discovery_unmatched_hosts_are_not_candidates() {
    let (engine, _) = engine(
        ScriptedProbe::with_link_layer()
            .host(2, OTHER_MAC)
            .host(3, OTHER_MAC)
            .name(3, "laptop.lan"),
    );

    let result = engine.discover(prefix(), None).await;
    assert!(matches!(result, Err(NetworkError::DeviceNotFound { .. })));
}

#[tokio::test]
async fn test_discovery_falls_back_to_tcp_sweep() {
    let (engine, probe) = engine(ScriptedProbe::default().port(200, 20001));

    let outcome = engine.discover(prefix(), None).await.expect("Discovery failed");

    let DiscoveryOutcome::Found(candidate) = outcome else {
        panic!("Expected a single candidate");
    };
    assert_eq!(candidate.ip, ip(200));
    assert!(candidate.mac.is_none());
    assert!(candidate.hostname.is_none());
    assert_eq!(candidate.matched_by.len(), 1);
    assert!(candidate.matched(MatchSignal::Port));
    assert_eq!(probe.sweeps.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_discovery_keeps_batches_swept_before_link_layer_loss() {
    // .10 answers ARP in the first batch; .5 has the port open but never
    // answered ARP, so only the swept-by-TCP tail may report port hits
    let (engine, probe) = engine(
        ScriptedProbe::with_link_layer()
            .losing_link_layer_after(1)
            .host(10, PI_MAC)
            .port(5, 65432)
            .port(120, 20001),
    );

    let outcome = engine.discover(prefix(), None).await.expect("Discovery failed");

    let DiscoveryOutcome::Ambiguous(candidates) = outcome else {
        panic!("Expected both candidates");
    };
    let ips: Vec<Ipv4Addr> = candidates.iter().map(|c| c.ip).collect();
    assert_eq!(ips, vec![ip(10), ip(120)]);
    assert!(candidates[0].matched(MatchSignal::Mac));
    assert!(candidates[1].matched(MatchSignal::Port));
    assert!(candidates[1].mac.is_none());
    assert_eq!(probe.sweeps.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_discovery_mac_match_survives_link_layer_loss() {
    let (engine, _) = engine(
        ScriptedProbe::with_link_layer()
            .losing_link_layer_after(1)
            .host(10, PI_MAC),
    );

    let outcome = engine.discover(prefix(), None).await.expect("Discovery failed");

    let DiscoveryOutcome::Found(candidate) = outcome else {
        panic!("Expected a single candidate");
    };
    assert_eq!(candidate.ip, ip(10));
    assert!(candidate.matched(MatchSignal::Mac));
}

#[tokio::test]
async fn test_fallback_sweep_respects_exclude() {
    let (engine, _) = engine(ScriptedProbe::default().port(9, 65432));

    let result = engine.discover(prefix(), Some(ip(9))).await;
    assert!(matches!(result, Err(NetworkError::DeviceNotFound { .. })));
}

#[test]
fn test_subnet_prefix() {
    let prefix = SubnetPrefix::of(Ipv4Addr::new(10, 0, 5, 1));
    assert_eq!(prefix.to_string(), "10.0.5");
    assert_eq!(prefix.cidr(), "10.0.5.0/24");
    assert_eq!(prefix.host(98), Ipv4Addr::new(10, 0, 5, 98));
    assert!(prefix.contains(Ipv4Addr::new(10, 0, 5, 200)));
    assert!(!prefix.contains(Ipv4Addr::new(10, 0, 6, 200)));

    let hosts: Vec<Ipv4Addr> = prefix.hosts().collect();
    assert_eq!(hosts.len(), 254);
    assert_eq!(hosts[0], Ipv4Addr::new(10, 0, 5, 1));
    assert_eq!(hosts[253], Ipv4Addr::new(10, 0, 5, 254));
}

#[test]
fn test_subnet_address_skips_tunnel_adapters() {
    let interfaces = vec![
        InterfaceInfo::new("lo", vec![Ipv4Addr::LOCALHOST]),
        InterfaceInfo::new("tun0", vec![ip(200)]),
        InterfaceInfo {
            name: "{4D36E972}".to_string(),
            description: "TAP-Windows Adapter V9".to_string(),
            ipv4: vec![ip(201)],
        },
        InterfaceInfo::new("eth0", vec![Ipv4Addr::new(10, 0, 0, 5), ip(42)]),
    ];

    assert_eq!(find_subnet_address(ip(1), &interfaces).unwrap(), ip(42));
}

#[test]
fn test_subnet_address_first_interface_wins() {
    let interfaces = vec![
        InterfaceInfo::new("eth0", vec![ip(42)]),
        InterfaceInfo::new("wlan0", vec![ip(43)]),
    ];

    assert_eq!(find_subnet_address(ip(1), &interfaces).unwrap(), ip(42));
}

#[test]
fn test_subnet_address_no_match() {
    let interfaces = vec![InterfaceInfo::new("eth0", vec![Ipv4Addr::new(10, 0, 0, 5)])];

    let result = find_subnet_address(ip(1), &interfaces);
    assert!(matches!(
        result,
        Err(NetworkError::NoMatchingSubnet { gateway }) if gateway == ip(1)
    ));
}

#[test]
fn test_virtual_adapter_detection() {
    assert!(is_virtual_adapter(&InterfaceInfo::new("utun3", vec![])));
    assert!(is_virtual_adapter(&InterfaceInfo {
        name: "Ethernet 2".to_string(),
        description: "Cisco AnyConnect VPN Virtual Miniport".to_string(),
        ipv4: vec![],
    }));
    assert!(!is_virtual_adapter(&InterfaceInfo::new("en0", vec![])));
}

#[test]
fn test_parse_proc_net_route() {
    let table = "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\n\
                 eth0\t0001A8C0\t00000000\t0001\t0\t0\t0\t00FFFFFF\n\
                 eth0\t00000000\t0101A8C0\t0003\t0\t0\t0\t00000000\n";
    assert_eq!(parse_proc_net_route(table), Some(ip(1)));
    assert_eq!(parse_proc_net_route("Iface\tDestination\tGateway\n"), None);
}

#[test]
fn test_parse_ip_route() {
    let output = "default via 192.168.1.254 dev wlan0 proto dhcp metric 600\n\
                  192.168.1.0/24 dev wlan0 proto kernel scope link src 192.168.1.42\n";
    assert_eq!(parse_ip_route(output), Some(ip(254)));
    assert_eq!(parse_ip_route("10.0.0.0/8 dev eth0\n"), None);
}

#[test]
fn test_parse_netstat() {
    let output = "Routing tables\n\nInternet:\n\
                  Destination        Gateway            Flags        Netif Expire\n\
                  default            192.168.1.1        UGScg          en0\n";
    assert_eq!(parse_netstat(output), Some(ip(1)));
}

#[test]
fn test_parse_route_print() {
    let output = "IPv4 Route Table\n\
                  ===========================================================================\n\
                  Active Routes:\n\
                  Network Destination        Netmask          Gateway       Interface  Metric\n\
                  \x20         0.0.0.0          0.0.0.0      192.168.1.1    192.168.1.42     25\n";
    assert_eq!(parse_route_print(output), Some(ip(1)));
}

#[test]
fn test_parse_ipconfig_ipv6_then_ipv4() {
    let output = "Ethernet adapter Ethernet:\n\n\
                  \x20  IPv4 Address. . . . . . . . . . . : 192.168.1.42\n\
                  \x20  Default Gateway . . . . . . . . . : fe80::1%12\n\
                  \x20                                      192.168.1.1\n";
    assert_eq!(parse_ipconfig(output), Some(ip(1)));
}

#[test]
fn test_parse_ipconfig_skips_empty_gateway() {
    let output = "Wireless LAN adapter Wi-Fi:\n\n\
                  \x20  Default Gateway . . . . . . . . . : \n\n\
                  Ethernet adapter Ethernet:\n\n\
                  \x20  Default Gateway . . . . . . . . . : 10.0.0.1\n";
    assert_eq!(parse_ipconfig(output), Some(Ipv4Addr::new(10, 0, 0, 1)));
}

#[test]
fn test_arp_reply_parsing() {
    let src_mac = MacAddr::new(0xb8, 0x27, 0xeb, 0x01, 0x02, 0x03);
    let mut frame =
        arp::create_request(src_mac, ip(42), ip(1)).expect("Failed to build ARP request");

    // A request is not a reply
    assert!(arp::parse_reply(&frame).is_none());

    {
        let mut packet =
            MutableArpPacket::new(&mut frame[ETH_HDR_LEN..]).expect("Failed to view ARP packet");
        packet.set_operation(ArpOperations::Reply);
    }

    let reply = arp::parse_reply(&frame).expect("Failed to parse reply");
    assert_eq!(reply.ip, ip(42));
    assert_eq!(reply.mac, "b8:27:eb:01:02:03");
}

#[test]
fn test_arp_parse_rejects_garbage() {
    assert!(arp::parse_reply(&[0u8; 10]).is_none());
}

#[tokio::test]
async fn test_tcp_only_probe_reports_link_layer_unavailable() {
    let probe = SystemProbe::tcp_only();

    let result = probe.arp_sweep(&[ip(1)], Duration::from_millis(10)).await;
    assert!(matches!(result, Err(NetworkError::LinkLayerUnavailable(_))));
}

#[tokio::test]
async fn test_tcp_probe_against_local_listener() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let port = listener.local_addr().expect("No local address").port();

    let probe = SystemProbe::tcp_only();
    assert!(
        probe
            .tcp_probe(Ipv4Addr::LOCALHOST, port, Duration::from_millis(500))
            .await
    );

    drop(listener);
    assert!(
        !probe
            .tcp_probe(Ipv4Addr::LOCALHOST, port, Duration::from_millis(500))
            .await
    );
}
