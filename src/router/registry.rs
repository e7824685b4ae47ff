//! Vendor tag to driver resolution

use crate::config::HttpConfig;
use crate::router::generic::GenericHandler;
use crate::router::handler::TemplateHandler;
use crate::router::templates::{self, PROFILES};
use crate::router::transport::{
    HardenedClientFactory, HttpClientFactory, RouterTransport, TransportError,
};
use crate::router::{GENERIC_VENDOR, RouterCapability, RouterTarget};
use std::sync::Arc;
use tracing::info;

/// Produces a fresh capability bound to a router
///
/// Each call returns a new instance with its own transport context, so no
/// two sessions ever share cookies or tokens.
pub trait CapabilityResolver: Send + Sync {
    /// Driver for `target.vendor_tag`, falling back to the generic driver
    fn resolve(&self, target: &RouterTarget) -> Result<Box<dyn RouterCapability>, TransportError>;
}

/// Static table of vendor drivers
#[derive(Clone)]
pub struct HandlerRegistry {
    factory: Arc<dyn HttpClientFactory>,
}

impl HandlerRegistry {
    /// Registry building transports with `factory`
    pub fn new(factory: Arc<dyn HttpClientFactory>) -> Self {
        Self { factory }
    }

    /// Registry using the hardened reqwest client
    pub fn with_http_config(config: HttpConfig) -> Self {
        Self::new(Arc::new(HardenedClientFactory::new(config)))
    }

    /// True when `tag` has a dedicated driver (case-insensitive)
    pub fn is_supported(tag: &str) -> bool {
        templates::find_profile(tag).is_some()
    }

    /// Tags of every dedicated driver plus `Generic`
    pub fn vendor_tags() -> Vec<&'static str> {
        PROFILES
            .iter()
            .map(|profile| profile.tag)
            .chain(std::iter::once(GENERIC_VENDOR))
            .collect()
    }
}

impl CapabilityResolver for HandlerRegistry {
    fn resolve(&self, target: &RouterTarget) -> Result<Box<dyn RouterCapability>, TransportError> {
        match templates::find_profile(&target.vendor_tag) {
            Some(profile) => {
                info!("Using {} driver for {}", profile.tag, target.ip);
                let transport = RouterTransport::new(
                    self.factory.clone(),
                    target.clone(),
                    self.factory.request_timeout(),
                )?;
                Ok(Box::new(TemplateHandler::new(profile, transport)))
            }
            None => {
                info!(
                    "No driver for '{}', using generic driver for {}",
                    target.vendor_tag, target.ip
                );
                let transport = RouterTransport::new(
                    self.factory.clone(),
                    target.clone(),
                    self.factory.probe_timeout(),
                )?;
                Ok(Box::new(GenericHandler::new(GENERIC_VENDOR, transport)))
            }
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_http_config(HttpConfig::default())
    }
}
