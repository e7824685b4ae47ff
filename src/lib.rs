//! Retro Forward - router port forwarding for online retro consoles
//!
//! This library provides the core of the port-forwarding setup flow:
//! - Default gateway and local subnet discovery
//! - Relay device (DreamPi) discovery on the local /24
//! - Vendor router drivers behind a single capability interface
//! - The session state machine tying authentication and rule application together

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod network;
pub mod router;
pub mod rules;
pub mod session;

pub use config::SessionConfig;
pub use rules::{ConsoleType, PortRule, Protocol, RuleSet};
pub use session::{RouterSession, SessionRequest, SessionResult};

/// Result type alias for Retro Forward operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Retro Forward operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),

    /// Local network inspection error
    #[error("Network error: {0}")]
    Network(#[from] network::NetworkError),

    /// Router transport error
    #[error("Transport error: {0}")]
    Transport(#[from] router::TransportError),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

/// Install a `tracing` subscriber writing to stderr
///
/// `default_filter` is used when `RUST_LOG` is not set (e.g. `"info"` or
/// `"retro_forward=debug"`). Calling this more than once is harmless; later
/// calls are ignored.
pub fn init_logging(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests;
