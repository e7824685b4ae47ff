//! Gateway discovery for different platforms
//!
//! The routing table is read from whatever the platform offers and every
//! listing is parsed defensively: anything unparsable counts as "no gateway"
//! rather than an error.

use crate::network::types::NetworkError;
use std::net::Ipv4Addr;
use std::process::Command;
use tracing::{debug, info};

/// Find the default gateway IPv4 address
///
/// On Linux the kernel table in `/proc/net/route` is read first, then
/// `ip route`. macOS uses `netstat`. Windows uses `route print`, then
/// `ipconfig`.
pub fn find_default_gateway() -> Result<Ipv4Addr, NetworkError> {
    #[cfg(target_os = "linux")]
    let found = find_gateway_linux();

    #[cfg(any(target_os = "macos", target_os = "freebsd", target_os = "openbsd"))]
    let found = find_gateway_bsd();

    #[cfg(target_os = "windows")]
    let found = find_gateway_windows();

    #[cfg(not(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "windows"
    )))]
    let found: Option<Ipv4Addr> = None;

    match found {
        Some(gateway) => {
            info!("Found default gateway {}", gateway);
            Ok(gateway)
        }
        None => Err(NetworkError::NotFound),
    }
}

#[cfg(target_os = "linux")]
fn find_gateway_linux() -> Option<Ipv4Addr> {
    match std::fs::read_to_string("/proc/net/route") {
        Ok(table) => {
            if let Some(gateway) = parse_proc_net_route(&table) {
                return Some(gateway);
            }
        }
        Err(e) => debug!("Failed to read /proc/net/route: {}", e),
    }

    run_command("ip", &["-4", "route", "show", "default"]).and_then(|out| parse_ip_route(&out))
}

#[cfg(any(target_os = "macos", target_os = "freebsd", target_os = "openbsd"))]
fn find_gateway_bsd() -> Option<Ipv4Addr> {
    run_command("netstat", &["-rn", "-f", "inet"]).and_then(|out| parse_netstat(&out))
}

#[cfg(target_os = "windows")]
fn find_gateway_windows() -> Option<Ipv4Addr> {
    run_command("route", &["print", "0.0.0.0"])
        .and_then(|out| parse_route_print(&out))
        .or_else(|| run_command("ipconfig", &[]).and_then(|out| parse_ipconfig(&out)))
}

/// Run a command and return its stdout, or `None` if it could not run
fn run_command(program: &str, args: &[&str]) -> Option<String> {
    match Command::new(program).args(args).output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            debug!("{} exited with {}", program, output.status);
            None
        }
        Err(e) => {
            debug!("Failed to run {}: {}", program, e);
            None
        }
    }
}

/// Parse the Linux kernel routing table (`/proc/net/route`)
///
/// The default route has destination `00000000`; the gateway column is a
/// little-endian hex address.
pub fn parse_proc_net_route(table: &str) -> Option<Ipv4Addr> {
    for line in table.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 || fields[1] != "00000000" {
            continue;
        }

        let Ok(raw) = u32::from_str_radix(fields[2], 16) else {
            continue;
        };
        let gateway = Ipv4Addr::from(raw.to_le_bytes());
        if !gateway.is_unspecified() {
            return Some(gateway);
        }
    }
    None
}

/// Parse `ip route` output (`default via 192.168.1.1 dev eth0 ...`)
pub fn parse_ip_route(output: &str) -> Option<Ipv4Addr> {
    output
        .lines()
        .filter(|line| line.trim_start().starts_with("default"))
        .find_map(|line| {
            let mut fields = line.split_whitespace();
            fields.find(|field| *field == "via")?;
            fields.next()?.parse().ok()
        })
}

/// Parse BSD/macOS `netstat -rn` output (`default  192.168.1.1  UGScg  en0`)
pub fn parse_netstat(output: &str) -> Option<Ipv4Addr> {
    output
        .lines()
        .filter(|line| line.starts_with("default"))
        .find_map(|line| line.split_whitespace().nth(1)?.parse().ok())
}

/// Parse Windows `route print` output
///
/// Active default routes look like
/// `0.0.0.0          0.0.0.0      192.168.1.1    192.168.1.42     25`.
pub fn parse_route_print(output: &str) -> Option<Ipv4Addr> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("0.0.0.0"))
        .find_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() >= 3 && fields[1] == "0.0.0.0" {
                fields[2].parse().ok()
            } else {
                None
            }
        })
}

/// Parse Windows `ipconfig` output
///
/// The gateway value may be an IPv6 address with the IPv4 one on the next,
/// indented line, or empty for disconnected adapters.
pub fn parse_ipconfig(output: &str) -> Option<Ipv4Addr> {
    let mut lines = output.lines().peekable();

    while let Some(line) = lines.next() {
        if !line.contains("Default Gateway") {
            continue;
        }

        if let Some((_, value)) = line.split_once(": ") {
            if let Ok(gateway) = value.trim().parse::<Ipv4Addr>() {
                return Some(gateway);
            }
        }

        // Continuation lines carry no label, only an address
        while let Some(next) = lines.peek() {
            let value = next.trim();
            if value.is_empty() || next.contains(" : ") {
                break;
            }
            if let Ok(gateway) = value.parse::<Ipv4Addr>() {
                return Some(gateway);
            }
            lines.next();
        }
    }
    None
}
