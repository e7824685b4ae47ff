// Config Tests - Testing SessionConfig loading and validation

use crate::config::{DEFAULT_USER_AGENT, DiscoveryConfig, HttpConfig, SessionConfig};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_config_default() {
    let config = SessionConfig::default();

    assert_eq!(config.max_auth_attempts, 3);
    assert_eq!(config.apply_timeout_retries, 1);
    assert_eq!(config.dreamcast_host_suffix, 98);
    assert_eq!(config.discovery.batch_size, 50);
    assert_eq!(config.discovery.known_ports, vec![65432, 20001, 20002]);
    assert_eq!(config.http.request_timeout(), Duration::from_secs(10));
    assert_eq!(config.http.probe_timeout(), Duration::from_secs(5));
    assert_eq!(config.http.user_agent, DEFAULT_USER_AGENT);
    assert!(config.http.accept_invalid_certs);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let config = SessionConfig::load("/nonexistent/retro-forward.json").expect("Failed to load");
    assert_eq!(config, SessionConfig::default());
}

#[test]
fn test_config_empty_file_uses_defaults() {
    let file = NamedTempFile::new().expect("Failed to create temp file");

    let config = SessionConfig::load(file.path()).expect("Failed to load");
    assert_eq!(config, SessionConfig::default());
}

#[test]
fn test_config_partial_file() {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    write!(
        file,
        r#"{{"max_auth_attempts": 5, "discovery": {{"batch_size": 25}}, "http": {{"probe_timeout_secs": 2}}}}"#
    )
    .expect("Failed to write config");

    let config = SessionConfig::load(file.path()).expect("Failed to load");

    assert_eq!(config.max_auth_attempts, 5);
    assert_eq!(config.discovery.batch_size, 25);
    assert_eq!(config.discovery.arp_timeout_ms, DiscoveryConfig::default().arp_timeout_ms);
    assert_eq!(config.http.probe_timeout(), Duration::from_secs(2));
    assert_eq!(config.http.request_timeout_secs, HttpConfig::default().request_timeout_secs);
    assert_eq!(config.dreamcast_host_suffix, 98);
}

#[test]
fn test_config_invalid_json() {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    write!(file, "{{ not json").expect("Failed to write config");

    assert!(SessionConfig::load(file.path()).is_err());
}

#[test]
fn test_config_validation() {
    let mut config = SessionConfig::default();
    config.max_auth_attempts = 0;
    assert!(config.validate().is_err());

    let mut config = SessionConfig::default();
    config.discovery.batch_size = 0;
    assert!(config.validate().is_err());

    let mut config = SessionConfig::default();
    config.dreamcast_host_suffix = 255;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_rejects_invalid_values_on_load() {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    write!(file, r#"{{"max_auth_attempts": 0}}"#).expect("Failed to write config");

    assert!(SessionConfig::load(file.path()).is_err());
}

#[test]
fn test_discovery_timeouts() {
    let discovery = DiscoveryConfig {
        arp_timeout_ms: 1500,
        port_probe_timeout_ms: 80,
        fallback_probe_timeout_ms: 120,
        ..Default::default()
    };

    assert_eq!(discovery.arp_timeout(), Duration::from_millis(1500));
    assert_eq!(discovery.port_probe_timeout(), Duration::from_millis(80));
    assert_eq!(discovery.fallback_probe_timeout(), Duration::from_millis(120));
}
