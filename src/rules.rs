//! Port forwarding rules and the per-console rule catalog

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of every rule label written to a router
pub const RULE_LABEL_PREFIX: &str = "RetroFwd";

/// Transport protocol of a forwarded port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
}

impl Protocol {
    /// Upper-case wire name (`TCP`/`UDP`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }

    /// Lower-case wire name, used by Linux-based firmwares
    pub fn as_lower(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single inbound forwarding rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRule {
    /// Transport protocol
    pub protocol: Protocol,
    /// Port opened on the router's WAN side
    pub external_port: u16,
    /// Port on the target device
    pub internal_port: u16,
}

impl PortRule {
    /// Create a rule with distinct external and internal ports
    pub const fn new(protocol: Protocol, external_port: u16, internal_port: u16) -> Self {
        Self {
            protocol,
            external_port,
            internal_port,
        }
    }

    /// Shorthand for a TCP rule forwarding a port to itself
    pub const fn tcp(port: u16) -> Self {
        Self::new(Protocol::Tcp, port, port)
    }

    /// Shorthand for a UDP rule forwarding a port to itself
    pub const fn udp(port: u16) -> Self {
        Self::new(Protocol::Udp, port, port)
    }

    /// Deterministic name used for this rule on the router
    ///
    /// Two applications of the same rule always carry the same label, which is
    /// what lets a router (and our own ledger) recognise a repeat.
    pub fn label(&self) -> String {
        format!("{}_{}_{}", RULE_LABEL_PREFIX, self.protocol, self.external_port)
    }

    /// Human-readable manual configuration line for this rule
    pub fn instruction(&self, target: std::net::Ipv4Addr) -> String {
        format!(
            "Forward {} port {} to {}:{}",
            self.protocol, self.external_port, target, self.internal_port
        )
    }
}

impl fmt::Display for PortRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.external_port == self.internal_port {
            write!(f, "{} {}", self.protocol, self.external_port)
        } else {
            write!(
                f,
                "{} {}->{}",
                self.protocol, self.external_port, self.internal_port
            )
        }
    }
}

/// Ordered, immutable group of rules for one console/target
///
/// Exact duplicates are dropped on construction (first occurrence wins) so a
/// rule set never asks a router for the same entry twice.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<PortRule>", into = "Vec<PortRule>")]
pub struct RuleSet {
    rules: Vec<PortRule>,
}

impl RuleSet {
    /// Build a rule set from an ordered sequence
    pub fn new<I: IntoIterator<Item = PortRule>>(rules: I) -> Self {
        let mut unique: Vec<PortRule> = Vec::new();
        for rule in rules {
            if !unique.contains(&rule) {
                unique.push(rule);
            }
        }
        Self { rules: unique }
    }

    /// Rules in application order
    pub fn rules(&self) -> &[PortRule] {
        &self.rules
    }

    /// Iterate rules in application order
    pub fn iter(&self) -> std::slice::Iter<'_, PortRule> {
        self.rules.iter()
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when there is nothing to apply
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules of this set not present in `applied`, order preserved
    pub fn remaining_after(&self, applied: &[PortRule]) -> RuleSet {
        RuleSet {
            rules: self
                .rules
                .iter()
                .filter(|rule| !applied.contains(rule))
                .copied()
                .collect(),
        }
    }

    /// Manual configuration lines for every rule, in order
    pub fn instructions(&self, target: std::net::Ipv4Addr) -> Vec<String> {
        self.rules.iter().map(|rule| rule.instruction(target)).collect()
    }
}

impl From<Vec<PortRule>> for RuleSet {
    fn from(rules: Vec<PortRule>) -> Self {
        RuleSet::new(rules)
    }
}

impl From<RuleSet> for Vec<PortRule> {
    fn from(set: RuleSet) -> Self {
        set.rules
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a PortRule;
    type IntoIter = std::slice::Iter<'a, PortRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// Console the ports are opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleType {
    /// Sega Dreamcast (always reached at a fixed host address)
    Dreamcast,
    /// Sega Saturn via a relay device or this machine
    Saturn,
}

impl fmt::Display for ConsoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleType::Dreamcast => f.write_str("dreamcast"),
            ConsoleType::Saturn => f.write_str("saturn"),
        }
    }
}

/// Source of the rule set for a console
pub trait RuleCatalog: Send + Sync {
    /// Ordered rules to open for `console`
    fn lookup_rules(&self, console: ConsoleType) -> RuleSet;
}

/// Catalog compiled into the crate
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

/// Saturn relay ports (NetLink emulation over the DreamPi)
pub const SATURN_RULES: [PortRule; 3] = [
    PortRule::tcp(65432),
    PortRule::udp(20001),
    PortRule::udp(20002),
];

/// Dreamcast game ports, grouped by title
///
/// Titles share several ports; [`RuleSet::new`] collapses the repeats.
pub const DREAMCAST_RULES: &[PortRule] = &[
    // Alien Front Online
    PortRule::udp(7980),
    // ChuChu Rocket!
    PortRule::udp(9789),
    // ClassiCube
    PortRule::udp(25565),
    // Daytona USA
    PortRule::udp(20675),
    PortRule::udp(12079),
    // Dee Dee Planet
    PortRule::udp(9879),
    // Driving Strikers
    PortRule::udp(30099),
    // Floigan Bros.
    PortRule::tcp(37001),
    // Golf Shiyouyo 2
    PortRule::udp(20675),
    PortRule::udp(12079),
    // Internet Game Pack
    PortRule::udp(5656),
    PortRule::tcp(5011),
    PortRule::tcp(10500),
    PortRule::tcp(10501),
    PortRule::tcp(10502),
    PortRule::tcp(10503),
    // NBA/NFL/NCAA 2K series
    PortRule::udp(5502),
    PortRule::udp(5503),
    PortRule::udp(5656),
    PortRule::tcp(5011),
    PortRule::tcp(6666),
    // The Next Tetris: Online Edition
    PortRule::tcp(3512),
    PortRule::udp(3512),
    // Ooga Booga
    PortRule::udp(6001),
    // PBA Tour Bowling 2001
    PortRule::tcp(2300),
    PortRule::udp(2300),
    PortRule::tcp(2400),
    PortRule::udp(2400),
    PortRule::udp(6500),
    PortRule::tcp(47624),
    PortRule::udp(13139),
    // Planet Ring
    PortRule::udp(7648),
    PortRule::udp(1285),
    PortRule::udp(1028),
    // Sega Tetris
    PortRule::udp(20675),
    PortRule::udp(12079),
    // Starlancer
    PortRule::tcp(2300),
    PortRule::udp(2300),
    PortRule::tcp(2400),
    PortRule::udp(2400),
    PortRule::udp(6500),
    PortRule::tcp(47624),
    // World Series Baseball 2K2
    PortRule::udp(37171),
    PortRule::udp(13713),
    // Worms World Party
    PortRule::tcp(17219),
];

impl RuleCatalog for BuiltinCatalog {
    fn lookup_rules(&self, console: ConsoleType) -> RuleSet {
        match console {
            ConsoleType::Dreamcast => RuleSet::new(DREAMCAST_RULES.iter().copied()),
            ConsoleType::Saturn => RuleSet::new(SATURN_RULES),
        }
    }
}
