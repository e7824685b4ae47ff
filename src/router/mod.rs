//! Router drivers
//!
//! One capability interface ([`RouterCapability`]) covers every supported
//! router family. Vendor drivers are data: a [`templates::VendorProfile`]
//! describes the login and rule-application dialects, and
//! [`handler::TemplateHandler`] executes it. Unknown routers get
//! [`generic::GenericHandler`], which logs in heuristically and hands back
//! manual instructions instead of touching the configuration.

pub mod digest;
pub mod encoding;
pub mod generic;
pub mod handler;
pub mod registry;
pub mod templates;
pub mod transport;

pub use generic::GenericHandler;
pub use handler::TemplateHandler;
pub use registry::{CapabilityResolver, HandlerRegistry};
pub use transport::{HardenedClientFactory, HttpClientFactory, RouterTransport, TransportError};

use crate::rules::{PortRule, RuleSet};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::net::Ipv4Addr;
use tokio_util::sync::CancellationToken;

/// Vendor tag of the fallback driver
pub const GENERIC_VENDOR: &str = "Generic";

/// Router admin credentials
///
/// Held in memory for one session only. `Debug` hides the password and the
/// type cannot be serialized.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Admin user name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Admin password
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The router a capability is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterTarget {
    /// Router LAN address
    pub ip: Ipv4Addr,
    /// Vendor tag as chosen by the user
    pub vendor_tag: String,
    /// Admin UI port when not the scheme default
    pub port: Option<u16>,
}

impl RouterTarget {
    /// Target on the default ports
    pub fn new(ip: Ipv4Addr, vendor_tag: impl Into<String>) -> Self {
        Self {
            ip,
            vendor_tag: vendor_tag.into(),
            port: None,
        }
    }

    /// Same target with an explicit admin port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// `host[:port]` part of router URLs
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.ip, port),
            None => self.ip.to_string(),
        }
    }
}

/// Outcome of one login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// Logged in; `method` names the dialect or strategy that worked
    Authenticated {
        /// Dialect or strategy description
        method: String,
    },
    /// The router answered but did not accept the login
    Rejected {
        /// Status of the last login response
        last_status: Option<u16>,
    },
    /// No usable answer from the router
    Unreachable(TransportError),
}

impl AuthResult {
    /// True for `Authenticated`
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthResult::Authenticated { .. })
    }
}

/// Why rule application stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyFailure {
    /// `apply_rules` was called before a successful login
    NotAuthenticated,
    /// The router answered, but not with the expected success marker
    Rejected {
        /// Status of the failing response
        status: u16,
    },
    /// A request timed out
    Timeout,
    /// Connection-level failure
    Transport(String),
}

impl From<TransportError> for ApplyFailure {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout => ApplyFailure::Timeout,
            other => ApplyFailure::Transport(other.to_string()),
        }
    }
}

/// Terminal state of one `apply_rules` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyStatus {
    /// Every rule is in place
    Complete,
    /// Nothing was sent; the user has to enter these rules by hand
    ManualInstructions(Vec<String>),
    /// Application stopped at `rule`
    Failed {
        /// First rule that did not go through
        rule: PortRule,
        /// Cause
        failure: ApplyFailure,
    },
    /// The cancellation token fired between two rules
    Cancelled,
}

/// What `apply_rules` achieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyResult {
    /// Rules confirmed on the router, in application order
    pub applied: Vec<PortRule>,
    /// How the call ended
    pub status: ApplyStatus,
}

impl ApplyResult {
    /// All rules applied
    pub fn complete(applied: Vec<PortRule>) -> Self {
        Self {
            applied,
            status: ApplyStatus::Complete,
        }
    }

    /// Stopped at `rule`
    pub fn failed(applied: Vec<PortRule>, rule: PortRule, failure: impl Into<ApplyFailure>) -> Self {
        Self {
            applied,
            status: ApplyStatus::Failed {
                rule,
                failure: failure.into(),
            },
        }
    }

    /// Cancelled with `applied` already in place
    pub fn cancelled(applied: Vec<PortRule>) -> Self {
        Self {
            applied,
            status: ApplyStatus::Cancelled,
        }
    }
}

/// Login and rule application for one router family
///
/// An instance owns one transport context (cookies, tokens) and belongs to
/// exactly one session.
#[async_trait]
pub trait RouterCapability: Send {
    /// Vendor tag this capability was built for
    fn vendor(&self) -> &str;

    /// Attempt a login, starting from a fresh transport context
    async fn authenticate(&mut self, credentials: &Credentials) -> AuthResult;

    /// Forward every rule in `rules` to `target`
    ///
    /// Rules already applied by this instance are skipped, so calling this
    /// twice with the same set does not create duplicate router entries.
    async fn apply_rules(
        &mut self,
        target: Ipv4Addr,
        rules: &RuleSet,
        cancel: &CancellationToken,
    ) -> ApplyResult;
}
