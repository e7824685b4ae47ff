//! Router session state machine
//!
//! A [`RouterSession`] runs one port-forwarding request end to end:
//!
//! ```text
//! Idle -> LocatingGateway -> ResolvingHandler -> Authenticating
//!      -> ResolvingTarget -> ApplyingRules -> Succeeded | Failed
//! ```
//!
//! Every outcome, including every failure, is returned as a [`SessionResult`];
//! nothing here panics or exits the process. Cancellation is checked between
//! states and between rule calls.

use crate::config::SessionConfig;
use crate::network::{
    DiscoveryCandidate, DiscoveryOutcome, HostDiscoveryEngine, HostNetwork, NetworkError,
    SubnetPrefix, SystemNetwork, find_subnet_address, validate_manual_address,
};
use crate::router::{
    ApplyFailure, ApplyStatus, AuthResult, CapabilityResolver, Credentials, GENERIC_VENDOR,
    HandlerRegistry, RouterCapability, RouterTarget, TransportError,
};
use crate::rules::{BuiltinCatalog, ConsoleType, PortRule, RuleCatalog, RuleSet};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// Created, not started
    Idle,
    /// Reading the default gateway
    LocatingGateway,
    /// Picking the router driver
    ResolvingHandler,
    /// Logging in to the router
    Authenticating,
    /// Working out which address the rules point at
    ResolvingTarget,
    /// Writing rules to the router
    ApplyingRules,
    /// Finished successfully
    Succeeded,
    /// Finished with an error
    Failed,
}

impl SessionState {
    /// True for `Succeeded` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Failed)
    }
}

/// Which device receives the Saturn rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSelector {
    /// Discover the relay (DreamPi) on the subnet
    #[default]
    #[serde(alias = "dreampi")]
    Relay,
    /// This machine's address on the router subnet
    #[serde(alias = "pc")]
    ThisMachine,
    /// An explicit address, validated against the router subnet
    Address(Ipv4Addr),
}

fn default_vendor_tag() -> String {
    GENERIC_VENDOR.to_string()
}

/// Input from the UI layer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    /// Console the ports are for
    pub console_type: ConsoleType,
    /// Router vendor tag; unknown tags use the generic driver
    #[serde(default = "default_vendor_tag")]
    pub router_vendor_tag: String,
    /// Router address; located from the routing table when absent
    #[serde(default)]
    pub router_ip: Option<Ipv4Addr>,
    /// Admin UI port when not the scheme default
    #[serde(default)]
    pub router_port: Option<u16>,
    /// Router admin credentials
    pub credentials: Credentials,
    /// Target device for Saturn requests
    #[serde(default)]
    pub target_device: TargetSelector,
}

/// Why a session failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ErrorKind {
    /// No gateway found and no router address given
    #[error("Unable to locate the router on the network")]
    NoRouter,

    /// This machine has no address on the router's subnet
    #[error("No local network adapter on the {gateway} subnet")]
    #[serde(rename_all = "camelCase")]
    NoMatchingSubnet {
        /// Router address
        gateway: Ipv4Addr,
    },

    /// Every login attempt failed, whether rejected or unanswered
    #[error("Router login failed after {attempts} attempts ({vendor})")]
    #[serde(rename_all = "camelCase")]
    AuthFailed {
        /// Driver in use
        vendor: String,
        /// Attempts made
        attempts: u32,
        /// Status of the last login response
        last_status: Option<u16>,
        /// Last transport failure, if any attempt got no answer
        last_error: Option<String>,
    },

    /// Discovery found no relay
    #[error("Could not find the relay device on {subnet}")]
    #[serde(rename_all = "camelCase")]
    DeviceNotFound {
        /// Swept subnet in CIDR notation
        subnet: String,
    },

    /// Discovery found several relays; retry with an explicit address
    #[error("Found {} possible relay devices; choose one", .candidates.len())]
    #[serde(rename_all = "camelCase")]
    AmbiguousTarget {
        /// Candidates in discovery order
        candidates: Vec<DiscoveryCandidate>,
    },

    /// The router refused a rule
    #[error("Failed to configure port forwarding ({vendor})")]
    #[serde(rename_all = "camelCase")]
    ApplyFailed {
        /// Driver in use
        vendor: String,
        /// Rules in place before the failure
        applied: Vec<PortRule>,
        /// Rule that was refused
        failed_rule: Option<PortRule>,
        /// Status of the failing response
        last_status: Option<u16>,
    },

    /// The router stopped answering
    #[error("Router did not respond in time ({vendor})")]
    #[serde(rename_all = "camelCase")]
    TransportTimeout {
        /// Driver in use
        vendor: String,
        /// Rules in place before the timeout
        applied: Vec<PortRule>,
    },

    /// Connection-level failure
    #[error("Connection to the router failed: {message}")]
    #[serde(rename_all = "camelCase")]
    TransportError {
        /// Driver in use
        vendor: String,
        /// Transport error text
        message: String,
        /// Rules in place before the failure
        applied: Vec<PortRule>,
    },

    /// The request itself is unusable
    #[error("Invalid request: {reason}")]
    #[serde(rename_all = "camelCase")]
    InvalidRequest {
        /// What is wrong
        reason: String,
    },

    /// The caller cancelled the session
    #[error("Cancelled")]
    #[serde(rename_all = "camelCase")]
    Cancelled {
        /// Rules in place when the session stopped
        applied: Vec<PortRule>,
    },
}

impl ErrorKind {
    fn from_transport(vendor: &str, error: TransportError, applied: Vec<PortRule>) -> Self {
        match error {
            TransportError::Timeout => ErrorKind::TransportTimeout {
                vendor: vendor.to_string(),
                applied,
            },
            other => ErrorKind::TransportError {
                vendor: vendor.to_string(),
                message: other.to_string(),
                applied,
            },
        }
    }
}

/// Output for the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    /// Session identifier (also the log span id)
    pub session_id: Uuid,
    /// True for `Succeeded`
    pub success: bool,
    /// Terminal state
    pub final_state: SessionState,
    /// Address the rules point at, once resolved
    pub resolved_ip: Option<Ipv4Addr>,
    /// Rules confirmed on the router
    pub applied_rules: Vec<PortRule>,
    /// Nothing was written; `instructions` must be applied by hand
    pub manual_instructions_only: bool,
    /// Manual configuration lines
    pub instructions: Vec<String>,
    /// Driver that handled the router
    pub vendor: Option<String>,
    /// Failure detail
    pub error: Option<ErrorKind>,
    /// Completion time, Unix milliseconds
    pub finished_at_ms: i64,
}

/// Collaborators injected into a session
#[derive(Clone)]
pub struct SessionDeps {
    /// Routing table, interfaces and discovery probes
    pub network: Arc<dyn HostNetwork>,
    /// Vendor tag to driver resolution
    pub resolver: Arc<dyn CapabilityResolver>,
    /// Rules per console
    pub catalog: Arc<dyn RuleCatalog>,
}

impl SessionDeps {
    /// System network, hardened HTTP drivers and the built-in catalog
    pub fn system(config: &SessionConfig) -> Self {
        Self {
            network: Arc::new(SystemNetwork),
            resolver: Arc::new(HandlerRegistry::with_http_config(config.http.clone())),
            catalog: Arc::new(BuiltinCatalog),
        }
    }
}

/// Partial results carried into the final report
#[derive(Default)]
struct Progress {
    vendor: Option<String>,
    resolved_ip: Option<Ipv4Addr>,
    applied: Vec<PortRule>,
}

enum Completion {
    Applied,
    Manual(Vec<String>),
}

/// Single-use orchestrator for one request
pub struct RouterSession {
    id: Uuid,
    config: SessionConfig,
    deps: SessionDeps,
    state: SessionState,
}

impl RouterSession {
    /// New idle session
    pub fn new(config: SessionConfig, deps: SessionDeps) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            deps,
            state: SessionState::Idle,
        }
    }

    /// Session identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the request to a terminal state
    ///
    /// Consumes the session. `cancel` may fire at any time; the result then
    /// lists the rules that were applied before the session stopped.
    pub async fn run(mut self, request: SessionRequest, cancel: CancellationToken) -> SessionResult {
        let span = info_span!("session", id = %self.id);
        async move {
            info!(
                "Starting {} session (router: {})",
                request.console_type, request.router_vendor_tag
            );

            let mut progress = Progress::default();
            let outcome = self.execute(&request, &cancel, &mut progress).await;
            self.finish(outcome, progress)
        }
        .instrument(span)
        .await
    }

    fn transition(&mut self, next: SessionState) {
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn checkpoint(&self, cancel: &CancellationToken, progress: &Progress) -> Result<(), ErrorKind> {
        if cancel.is_cancelled() {
            info!("Session cancelled in state {:?}", self.state);
            return Err(ErrorKind::Cancelled {
                applied: progress.applied.clone(),
            });
        }
        Ok(())
    }

    async fn execute(
        &mut self,
        request: &SessionRequest,
        cancel: &CancellationToken,
        progress: &mut Progress,
    ) -> Result<Completion, ErrorKind> {
        validate_request(request)?;

        self.transition(SessionState::LocatingGateway);
        self.checkpoint(cancel, progress)?;
        let router_ip = match request.router_ip {
            Some(ip) => {
                info!("Using manual router IP: {}", ip);
                ip
            }
            None => self.deps.network.default_gateway().map_err(|e| {
                error!("Could not find router: {}", e);
                ErrorKind::NoRouter
            })?,
        };

        self.transition(SessionState::ResolvingHandler);
        self.checkpoint(cancel, progress)?;
        let mut target = RouterTarget::new(router_ip, request.router_vendor_tag.clone());
        if let Some(port) = request.router_port {
            target = target.with_port(port);
        }
        let mut capability = self
            .deps
            .resolver
            .resolve(&target)
            .map_err(|e| ErrorKind::from_transport(&request.router_vendor_tag, e, Vec::new()))?;
        progress.vendor = Some(capability.vendor().to_string());

        self.transition(SessionState::Authenticating);
        self.checkpoint(cancel, progress)?;
        self.authenticate(capability.as_mut(), &request.credentials, cancel)
            .await?;

        self.transition(SessionState::ResolvingTarget);
        self.checkpoint(cancel, progress)?;
        let target_ip = self.resolve_target(request, router_ip, cancel).await?;
        progress.resolved_ip = Some(target_ip);

        self.transition(SessionState::ApplyingRules);
        self.checkpoint(cancel, progress)?;
        let rules = self.deps.catalog.lookup_rules(request.console_type);
        info!("Setting up {} rules for {}", rules.len(), target_ip);
        self.apply(capability.as_mut(), target_ip, &rules, cancel, progress)
            .await
    }

    /// Up to `max_auth_attempts` logins, each from a fresh transport context
    async fn authenticate(
        &self,
        capability: &mut dyn RouterCapability,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<(), ErrorKind> {
        let vendor = capability.vendor().to_string();
        let max_attempts = self.config.max_auth_attempts.max(1);
        let mut last_status = None;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(ErrorKind::Cancelled {
                    applied: Vec::new(),
                });
            }

            info!("Login attempt {}/{} ({})", attempt, max_attempts, vendor);
            match capability.authenticate(credentials).await {
                AuthResult::Authenticated { method } => {
                    info!("Router login successful via {}", method);
                    return Ok(());
                }
                AuthResult::Rejected { last_status: status } => {
                    warn!("Login attempt {} rejected (status {:?})", attempt, status);
                    last_status = status.or(last_status);
                }
                AuthResult::Unreachable(e) => {
                    warn!("Login attempt {} failed: {}", attempt, e);
                    last_error = Some(e.to_string());
                }
            }
        }

        error!("Router login failed after {} attempts", max_attempts);
        Err(ErrorKind::AuthFailed {
            vendor,
            attempts: max_attempts,
            last_status,
            last_error,
        })
    }

    async fn resolve_target(
        &self,
        request: &SessionRequest,
        router_ip: Ipv4Addr,
        cancel: &CancellationToken,
    ) -> Result<Ipv4Addr, ErrorKind> {
        let prefix = SubnetPrefix::of(router_ip);

        match (request.console_type, request.target_device) {
            (ConsoleType::Dreamcast, _) => {
                let ip = prefix.host(self.config.dreamcast_host_suffix);
                info!("Using Dreamcast IP: {}", ip);
                Ok(ip)
            }
            (ConsoleType::Saturn, TargetSelector::Address(ip)) => {
                validate_manual_address(ip, prefix).map_err(|e| ErrorKind::InvalidRequest {
                    reason: e.to_string(),
                })
            }
            (ConsoleType::Saturn, TargetSelector::ThisMachine) => {
                let ip = self.local_address(router_ip)?;
                info!("Using local PC IP: {}", ip);
                Ok(ip)
            }
            (ConsoleType::Saturn, TargetSelector::Relay) => {
                let local_ip = self.local_address(router_ip)?;
                let engine = HostDiscoveryEngine::new(
                    self.config.discovery.clone(),
                    self.deps.network.probe_for(local_ip),
                );

                let outcome = tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(ErrorKind::Cancelled { applied: Vec::new() });
                    }
                    outcome = engine.discover(prefix, Some(local_ip)) => outcome,
                };

                match outcome {
                    Ok(DiscoveryOutcome::Found(candidate)) => {
                        info!("Found relay at: {}", candidate.ip);
                        Ok(candidate.ip)
                    }
                    Ok(DiscoveryOutcome::Ambiguous(candidates)) => {
                        warn!("{} relay candidates; caller must choose", candidates.len());
                        Err(ErrorKind::AmbiguousTarget { candidates })
                    }
                    Err(e @ NetworkError::DeviceNotFound { .. }) => {
                        error!("{}", e);
                        Err(ErrorKind::DeviceNotFound {
                            subnet: prefix.cidr(),
                        })
                    }
                    Err(e) => {
                        error!("Relay discovery failed: {}", e);
                        Err(ErrorKind::DeviceNotFound {
                            subnet: prefix.cidr(),
                        })
                    }
                }
            }
        }
    }

    fn local_address(&self, router_ip: Ipv4Addr) -> Result<Ipv4Addr, ErrorKind> {
        find_subnet_address(router_ip, &self.deps.network.interfaces()).map_err(|e| {
            error!("{}", e);
            ErrorKind::NoMatchingSubnet { gateway: router_ip }
        })
    }

    /// Apply `rules`, resuming once per allowed retry after a timeout
    async fn apply(
        &self,
        capability: &mut dyn RouterCapability,
        target_ip: Ipv4Addr,
        rules: &RuleSet,
        cancel: &CancellationToken,
        progress: &mut Progress,
    ) -> Result<Completion, ErrorKind> {
        let vendor = capability.vendor().to_string();
        let mut remaining = rules.clone();
        let mut retries_left = self.config.apply_timeout_retries;

        loop {
            let result = capability.apply_rules(target_ip, &remaining, cancel).await;
            progress.applied.extend(result.applied.iter().copied());

            match result.status {
                ApplyStatus::Complete => return Ok(Completion::Applied),
                ApplyStatus::ManualInstructions(lines) => return Ok(Completion::Manual(lines)),
                ApplyStatus::Cancelled => {
                    return Err(ErrorKind::Cancelled {
                        applied: progress.applied.clone(),
                    });
                }
                ApplyStatus::Failed {
                    rule,
                    failure: ApplyFailure::Timeout,
                } if retries_left > 0 => {
                    retries_left -= 1;
                    remaining = rules.remaining_after(&progress.applied);
                    warn!(
                        "Timed out on {}; retrying the {} remaining rules",
                        rule,
                        remaining.len()
                    );
                    self.checkpoint(cancel, progress)?;
                }
                ApplyStatus::Failed { rule, failure } => {
                    let applied = progress.applied.clone();
                    return Err(match failure {
                        ApplyFailure::Timeout => {
                            ErrorKind::from_transport(&vendor, TransportError::Timeout, applied)
                        }
                        ApplyFailure::Transport(message) => ErrorKind::TransportError {
                            vendor,
                            message,
                            applied,
                        },
                        ApplyFailure::Rejected { status } => ErrorKind::ApplyFailed {
                            vendor,
                            applied,
                            failed_rule: Some(rule),
                            last_status: Some(status),
                        },
                        ApplyFailure::NotAuthenticated => ErrorKind::ApplyFailed {
                            vendor,
                            applied,
                            failed_rule: Some(rule),
                            last_status: None,
                        },
                    });
                }
            }
        }
    }

    fn finish(&mut self, outcome: Result<Completion, ErrorKind>, progress: Progress) -> SessionResult {
        let Progress {
            vendor,
            resolved_ip,
            applied,
        } = progress;

        let (success, manual, instructions, error) = match outcome {
            Ok(Completion::Applied) => {
                info!("Port forwarding setup successful ({} rules)", applied.len());
                (true, false, Vec::new(), None)
            }
            Ok(Completion::Manual(lines)) => {
                info!("Manual configuration required ({} rules)", lines.len());
                (true, true, lines, None)
            }
            Err(kind) => {
                error!("Session failed: {}", kind);
                (false, false, Vec::new(), Some(kind))
            }
        };

        self.transition(if success {
            SessionState::Succeeded
        } else {
            SessionState::Failed
        });

        SessionResult {
            session_id: self.id,
            success,
            final_state: self.state,
            resolved_ip,
            applied_rules: applied,
            manual_instructions_only: manual,
            instructions,
            vendor,
            error,
            finished_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

fn validate_request(request: &SessionRequest) -> Result<(), ErrorKind> {
    let credentials = &request.credentials;
    if credentials.username().trim().is_empty() || credentials.password().is_empty() {
        return Err(ErrorKind::InvalidRequest {
            reason: "username and password are required".to_string(),
        });
    }
    Ok(())
}
