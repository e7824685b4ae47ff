//! Session configuration
//!
//! Everything tunable about a session lives here and is handed to
//! [`RouterSession`](crate::session::RouterSession) explicitly. Nothing in the
//! crate reads configuration from global state.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Browser User-Agent sent to router admin pages
///
/// Several embedded HTTP stacks reject requests without a browser-looking agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Top-level configuration for one router session
///
/// # Example
/// ```rust,no_run
/// use retro_forward::SessionConfig;
///
/// // Missing file falls back to defaults
/// let config = SessionConfig::load("retro-forward.json").expect("Failed to load");
/// assert_eq!(config.max_auth_attempts, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum login attempts before the session fails with `AuthFailed`
    pub max_auth_attempts: u32,
    /// How many times rule application is resumed after a timeout
    pub apply_timeout_retries: u32,
    /// Host suffix used for the Dreamcast on the router subnet
    pub dreamcast_host_suffix: u8,
    /// Subnet discovery tuning
    pub discovery: DiscoveryConfig,
    /// HTTP client settings shared by every router driver
    pub http: HttpConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_auth_attempts: 3,
            apply_timeout_retries: 1,
            dreamcast_host_suffix: 98,
            discovery: DiscoveryConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a JSON file
    ///
    /// Returns the defaults when the file does not exist or is empty.
    /// Missing fields take their default values.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a session unable to run
    pub fn validate(&self) -> Result<()> {
        if self.max_auth_attempts == 0 {
            return Err(Error::Config("max_auth_attempts must be at least 1".to_string()));
        }
        if self.discovery.batch_size == 0 {
            return Err(Error::Config("discovery.batch_size must be at least 1".to_string()));
        }
        if matches!(self.dreamcast_host_suffix, 0 | 255) {
            return Err(Error::Config(
                "dreamcast_host_suffix must be a host address (1-254)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Relay discovery tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Addresses per ARP batch
    pub batch_size: usize,
    /// How long to wait for ARP replies per batch
    pub arp_timeout_ms: u64,
    /// TCP connect timeout for each known-port probe
    pub port_probe_timeout_ms: u64,
    /// TCP connect timeout per port in the sequential fallback sweep
    pub fallback_probe_timeout_ms: u64,
    /// Service ports the relay is known to listen on
    pub known_ports: Vec<u16>,
    /// MAC OUI prefixes of the relay hardware (`AA:BB:CC`)
    pub mac_prefixes: Vec<String>,
    /// Hostname substrings that identify the relay
    pub hostname_patterns: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            arp_timeout_ms: 1000,
            port_probe_timeout_ms: 100,
            fallback_probe_timeout_ms: 100,
            known_ports: vec![65432, 20001, 20002],
            mac_prefixes: vec![
                "B8:27:EB".to_string(), // Raspberry Pi 1-3
                "DC:A6:32".to_string(), // Raspberry Pi 4
                "E4:5F:01".to_string(), // Raspberry Pi 4
                "D8:3A:DD".to_string(), // Raspberry Pi 5
                "B8:81:98".to_string(),
            ],
            hostname_patterns: vec![
                "dreampi".to_string(),
                "dream-pi".to_string(),
                "dream_pi".to_string(),
                "rpi".to_string(),
                "raspberrypi".to_string(),
                "raspberry-pi".to_string(),
            ],
        }
    }
}

impl DiscoveryConfig {
    /// ARP reply window per batch
    pub fn arp_timeout(&self) -> Duration {
        Duration::from_millis(self.arp_timeout_ms)
    }

    /// Connect timeout for known-port probes
    pub fn port_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.port_probe_timeout_ms)
    }

    /// Connect timeout for the sequential fallback sweep
    pub fn fallback_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_probe_timeout_ms)
    }
}

/// HTTP client settings for router drivers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout for vendor calls
    pub request_timeout_secs: u64,
    /// Per-request timeout for the generic handler's login probes
    pub probe_timeout_secs: u64,
    /// Accept self-signed router certificates
    pub accept_invalid_certs: bool,
    /// User-Agent header
    pub user_agent: String,
    /// Accept header
    pub accept: String,
    /// Accept-Language header
    pub accept_language: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            probe_timeout_secs: 5,
            accept_invalid_certs: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
                .to_string(),
            accept_language: "en-US,en;q=0.5".to_string(),
        }
    }
}

impl HttpConfig {
    /// Timeout for regular vendor calls
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Timeout for generic login probes
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
