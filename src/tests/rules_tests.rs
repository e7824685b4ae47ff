// Rules Tests - Testing PortRule, RuleSet and the built-in catalog

use crate::rules::*;
use std::collections::HashSet;
use std::net::Ipv4Addr;

#[test]
fn test_rule_label_is_deterministic() {
    let rule = PortRule::udp(20001);
    assert_eq!(rule.label(), "RetroFwd_UDP_20001");
    assert_eq!(rule.label(), PortRule::udp(20001).label());
    assert_ne!(rule.label(), PortRule::tcp(20001).label());
}

#[test]
fn test_rule_display() {
    assert_eq!(PortRule::tcp(65432).to_string(), "TCP 65432");
    assert_eq!(
        PortRule::new(Protocol::Udp, 20001, 30001).to_string(),
        "UDP 20001->30001"
    );
}

#[test]
fn test_rule_instruction() {
    let target = Ipv4Addr::new(192, 168, 1, 98);
    assert_eq!(
        PortRule::tcp(37001).instruction(target),
        "Forward TCP port 37001 to 192.168.1.98:37001"
    );
}

#[test]
fn test_rule_set_drops_duplicates_in_order() {
    let set = RuleSet::new([
        PortRule::udp(5656),
        PortRule::tcp(5011),
        PortRule::udp(5656),
        PortRule::udp(5656),
    ]);

    assert_eq!(set.len(), 2);
    assert_eq!(set.rules(), &[PortRule::udp(5656), PortRule::tcp(5011)]);
}

#[test]
fn test_rule_set_remaining_after() {
    let set = RuleSet::new(SATURN_RULES);

    let remaining = set.remaining_after(&[PortRule::udp(20001)]);
    assert_eq!(remaining.rules(), &[PortRule::tcp(65432), PortRule::udp(20002)]);

    assert!(set.remaining_after(set.rules()).is_empty());
}

#[test]
fn test_saturn_catalog() {
    let rules = BuiltinCatalog.lookup_rules(ConsoleType::Saturn);
    assert_eq!(
        rules.rules(),
        &[PortRule::tcp(65432), PortRule::udp(20001), PortRule::udp(20002)]
    );
}

#[test]
fn test_dreamcast_catalog_is_unique() {
    let rules = BuiltinCatalog.lookup_rules(ConsoleType::Dreamcast);

    let unique: HashSet<_> = rules.iter().collect();
    assert_eq!(unique.len(), rules.len());
    assert!(rules.len() < DREAMCAST_RULES.len());

    // First occurrence order is kept
    assert_eq!(rules.rules()[0], PortRule::udp(7980));
    assert!(rules.iter().any(|rule| *rule == PortRule::tcp(17219)));
    assert!(rules.iter().any(|rule| *rule == PortRule::tcp(47624)));
}

#[test]
fn test_rule_serialization() {
    let json = serde_json::to_string(&PortRule::udp(20001)).expect("Failed to serialize");
    assert_eq!(json, r#"{"protocol":"UDP","externalPort":20001,"internalPort":20001}"#);

    let set: RuleSet = serde_json::from_str(
        r#"[{"protocol":"TCP","externalPort":1,"internalPort":1},
            {"protocol":"TCP","externalPort":1,"internalPort":1}]"#,
    )
    .expect("Failed to deserialize");
    assert_eq!(set.len(), 1);
}

#[test]
fn test_console_type_names() {
    assert_eq!(ConsoleType::Dreamcast.to_string(), "dreamcast");
    let console: ConsoleType = serde_json::from_str(r#""saturn""#).expect("Failed to parse");
    assert_eq!(console, ConsoleType::Saturn);
}
