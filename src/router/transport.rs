//! HTTP transport shared by all router drivers
//!
//! Every driver talks to the router through a [`RouterTransport`]: one
//! reqwest client with its own cookie jar, bound to one router address.
//! [`RouterTransport::reset`] swaps in a fresh client so a new login attempt
//! never inherits cookies from a failed one.

use crate::config::HttpConfig;
use crate::router::RouterTarget;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised while talking to the router
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within the timeout
    #[error("Request timed out")]
    Timeout,

    /// Connection refused, reset, TLS failure and similar
    #[error("Connection error: {0}")]
    Connection(String),

    /// The HTTP client could not be built
    #[error("Client setup error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}

/// URL scheme of a router endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain HTTP
    Http,
    /// HTTPS (self-signed certificates accepted)
    Https,
}

impl Scheme {
    /// Scheme name as used in URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Builds HTTP clients for router drivers
pub trait HttpClientFactory: Send + Sync {
    /// A new client with an empty cookie jar and the given request timeout
    fn build(&self, timeout: Duration) -> Result<Client, TransportError>;

    /// Timeout for regular vendor calls
    fn request_timeout(&self) -> Duration;

    /// Timeout for generic login probes
    fn probe_timeout(&self) -> Duration;
}

/// Client factory applying the uniform router hardening
///
/// Certificate verification off (router admin UIs are self-signed), browser
/// headers on, cookie store per client.
#[derive(Debug, Clone, Default)]
pub struct HardenedClientFactory {
    config: HttpConfig,
}

impl HardenedClientFactory {
    /// Factory using `config`
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let entries = [
            (header::ACCEPT, &self.config.accept),
            (header::ACCEPT_LANGUAGE, &self.config.accept_language),
        ];
        for (name, value) in entries {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(name, value);
            }
        }
        headers
    }
}

impl HttpClientFactory for HardenedClientFactory {
    fn build(&self, timeout: Duration) -> Result<Client, TransportError> {
        Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(self.config.accept_invalid_certs)
            .timeout(timeout)
            .user_agent(self.config.user_agent.clone())
            .default_headers(self.default_headers())
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))
    }

    fn request_timeout(&self) -> Duration {
        self.config.request_timeout()
    }

    fn probe_timeout(&self) -> Duration {
        self.config.probe_timeout()
    }
}

/// A fully read router response
#[derive(Debug, Clone)]
pub struct RouterResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Body as text (lossy)
    pub body: String,
}

impl RouterResponse {
    /// Exactly HTTP 200
    ///
    /// Most drivers treat 200 as "the router accepted it". Admin UIs often
    /// answer 200 with an error page, so this is a heuristic.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// First value of `name` as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Value of cookie `name` set by this response
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|value| {
                let pair = value.split(';').next()?;
                let (key, val) = pair.split_once('=')?;
                (key.trim() == name && !val.trim().is_empty()).then(|| val.trim().to_string())
            })
    }

    /// Body parsed as JSON
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Per-capability HTTP context bound to one router
pub struct RouterTransport {
    factory: Arc<dyn HttpClientFactory>,
    target: RouterTarget,
    timeout: Duration,
    client: Client,
}

impl RouterTransport {
    /// Transport for `target` with the given request timeout
    pub fn new(
        factory: Arc<dyn HttpClientFactory>,
        target: RouterTarget,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = factory.build(timeout)?;
        Ok(Self {
            factory,
            target,
            timeout,
            client,
        })
    }

    /// Router this transport talks to
    pub fn target(&self) -> &RouterTarget {
        &self.target
    }

    /// Drop cookies and connections by rebuilding the client
    pub fn reset(&mut self) -> Result<(), TransportError> {
        self.client = self.factory.build(self.timeout)?;
        Ok(())
    }

    /// Absolute URL of `path` on the router
    pub fn url(&self, scheme: Scheme, path: &str) -> String {
        format!("{}://{}{}", scheme.as_str(), self.target.authority(), path)
    }

    /// Start a request to `path`
    pub fn request(&self, method: Method, scheme: Scheme, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(scheme, path))
    }

    /// Send a request and read the whole response
    pub async fn execute(&self, request: RequestBuilder) -> Result<RouterResponse, TransportError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        debug!("Router answered {} ({} bytes)", status, body.len());
        Ok(RouterResponse {
            status,
            headers,
            body,
        })
    }
}
