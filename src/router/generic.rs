//! Fallback driver for routers without a vendor profile
//!
//! Login is heuristic: HTTP Basic, then a cascade of common login forms,
//! then HTTP Digest. Rule application never touches the router; it returns
//! the lines the user has to enter in the admin UI by hand.

use crate::router::digest::DigestChallenge;
use crate::router::transport::{RouterTransport, Scheme, TransportError};
use crate::router::{ApplyResult, ApplyStatus, AuthResult, Credentials, RouterCapability};
use crate::rules::RuleSet;
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use std::fmt;
use std::net::Ipv4Addr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Login paths tried by the form cascade, in order
pub const FORM_LOGIN_PATHS: &[&str] = &[
    "/login.cgi",
    "/login.asp",
    "/login.htm",
    "/login",
    "/cgi-bin/login",
];

/// (user field, password field) pairs tried on every form path, in order
pub const FORM_FIELD_SETS: &[(&str, &str)] = &[
    ("username", "password"),
    ("user", "pass"),
    ("login", "password"),
    ("admin_name", "admin_pwd"),
];

/// Login strategies of the generic driver, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericStrategy {
    /// HTTP Basic on `/`
    Basic,
    /// POST to a common login form
    Form,
    /// HTTP Digest on `/`
    Digest,
}

impl fmt::Display for GenericStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenericStrategy::Basic => write!(f, "basic"),
            GenericStrategy::Form => write!(f, "form"),
            GenericStrategy::Digest => write!(f, "digest"),
        }
    }
}

/// Outcome of one strategy
enum StrategyOutcome {
    Success(String),
    Failed {
        last_status: Option<u16>,
        error: Option<TransportError>,
    },
}

/// Driver for unknown routers
pub struct GenericHandler {
    vendor: String,
    transport: RouterTransport,
    method: Option<String>,
}

impl GenericHandler {
    /// Generic driver reporting `vendor` as its tag
    ///
    /// `transport` should use the short probe timeout.
    pub fn new(vendor: impl Into<String>, transport: RouterTransport) -> Self {
        Self {
            vendor: vendor.into(),
            transport,
            method: None,
        }
    }

    /// Strategy that last authenticated, if any
    pub(crate) fn authenticated_with(&self) -> Option<&str> {
        self.method.as_deref()
    }

    async fn try_basic(&self, credentials: &Credentials) -> StrategyOutcome {
        let request = self
            .transport
            .request(Method::GET, Scheme::Http, "/")
            .basic_auth(credentials.username(), Some(credentials.password()));

        match self.transport.execute(request).await {
            Ok(response) if response.status < 400 => {
                StrategyOutcome::Success(GenericStrategy::Basic.to_string())
            }
            Ok(response) => StrategyOutcome::Failed {
                last_status: Some(response.status),
                error: None,
            },
            Err(e) => StrategyOutcome::Failed {
                last_status: None,
                error: Some(e),
            },
        }
    }

    async fn try_forms(&self, credentials: &Credentials) -> StrategyOutcome {
        let mut last_status = None;
        let mut error = None;

        for path in FORM_LOGIN_PATHS {
            for (user_field, pass_field) in FORM_FIELD_SETS {
                let form = [
                    (*user_field, credentials.username()),
                    (*pass_field, credentials.password()),
                ];
                let request = self
                    .transport
                    .request(Method::POST, Scheme::Http, path)
                    .form(&form);

                match self.transport.execute(request).await {
                    Ok(response) if response.status < 400 => {
                        return StrategyOutcome::Success(format!(
                            "{} {}",
                            GenericStrategy::Form,
                            path
                        ));
                    }
                    Ok(response) => last_status = Some(response.status),
                    Err(e) => {
                        // Unreachable path: skip its remaining field sets
                        debug!("Form login on {} failed: {}", path, e);
                        error = Some(e);
                        break;
                    }
                }
            }
        }

        StrategyOutcome::Failed { last_status, error }
    }

    async fn try_digest(&self, credentials: &Credentials) -> StrategyOutcome {
        let challenge_response = match self
            .transport
            .execute(self.transport.request(Method::GET, Scheme::Http, "/"))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return StrategyOutcome::Failed {
                    last_status: None,
                    error: Some(e),
                };
            }
        };

        let Some(challenge) = challenge_response
            .header(WWW_AUTHENTICATE.as_str())
            .and_then(DigestChallenge::parse)
        else {
            // An unchallenged page below 400 is already open to us
            if challenge_response.status < 400 {
                return StrategyOutcome::Success(GenericStrategy::Digest.to_string());
            }
            debug!("Router sent no Digest challenge");
            return StrategyOutcome::Failed {
                last_status: Some(challenge_response.status),
                error: None,
            };
        };

        let authorization =
            challenge.authorization("GET", "/", credentials.username(), credentials.password());
        let request = self
            .transport
            .request(Method::GET, Scheme::Http, "/")
            .header(AUTHORIZATION, authorization);

        match self.transport.execute(request).await {
            Ok(response) if response.status < 400 => {
                StrategyOutcome::Success(GenericStrategy::Digest.to_string())
            }
            Ok(response) => StrategyOutcome::Failed {
                last_status: Some(response.status),
                error: None,
            },
            Err(e) => StrategyOutcome::Failed {
                last_status: None,
                error: Some(e),
            },
        }
    }
}

#[async_trait]
impl RouterCapability for GenericHandler {
    fn vendor(&self) -> &str {
        &self.vendor
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> AuthResult {
        self.method = None;
        if let Err(e) = self.transport.reset() {
            return AuthResult::Unreachable(e);
        }

        let mut last_status = None;
        let mut last_error = None;

        for strategy in [
            GenericStrategy::Basic,
            GenericStrategy::Form,
            GenericStrategy::Digest,
        ] {
            info!("Attempting {} login...", strategy);
            let outcome = match strategy {
                GenericStrategy::Basic => self.try_basic(credentials).await,
                GenericStrategy::Form => self.try_forms(credentials).await,
                GenericStrategy::Digest => self.try_digest(credentials).await,
            };

            match outcome {
                StrategyOutcome::Success(method) => {
                    info!("Generic login succeeded ({})", method);
                    self.method = Some(method.clone());
                    return AuthResult::Authenticated { method };
                }
                StrategyOutcome::Failed {
                    last_status: status,
                    error,
                } => {
                    debug!("{} login failed", strategy);
                    last_status = status.or(last_status);
                    last_error = error.or(last_error);
                }
            }
        }

        match (last_status, last_error) {
            (None, Some(e)) => AuthResult::Unreachable(e),
            (status, _) => AuthResult::Rejected {
                last_status: status,
            },
        }
    }

    async fn apply_rules(
        &mut self,
        target: Ipv4Addr,
        rules: &RuleSet,
        _cancel: &CancellationToken,
    ) -> ApplyResult {
        let instructions = rules.instructions(target);

        info!(
            "Generic router ({} login) - manual configuration required",
            self.authenticated_with().unwrap_or("no")
        );
        for line in &instructions {
            info!("{}", line);
        }

        ApplyResult {
            applied: Vec::new(),
            status: ApplyStatus::ManualInstructions(instructions),
        }
    }
}
