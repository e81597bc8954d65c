//! Registry layer for fetching tags and digests
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Gateway   │────▶│    Retry    │────▶│ImageRegistry│
//! │(fatal errs) │     │  (backoff)  │     │ (HTTP API)  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`client`]: `ImageRegistry` trait for listing tags and looking up digests
//! - [`docker`]: Docker Registry HTTP API v2 implementation
//! - [`retry`]: Bounded retry helper with capped exponential backoff
//! - [`gateway`]: Retrying front that turns exhausted failures into fatal errors
//! - [`error`]: Registry error kinds and their transient classification

pub mod client;
pub mod docker;
pub mod error;
pub mod gateway;
pub mod retry;

pub use client::ImageRegistry;
pub use docker::{ClientOptions, Credentials, DockerRegistry};
pub use error::RegistryError;
pub use gateway::RegistryGateway;
pub use retry::RetryPolicy;

use crate::config::{ResolverConfig, https_proxy, is_public_registry};

/// Builds a retrying gateway to `hostname` using the given configuration
pub fn connect(
    config: &ResolverConfig,
    hostname: &str,
    credentials: Option<Credentials>,
) -> Result<RegistryGateway, RegistryError> {
    let options = ClientOptions {
        read_timeout: config.read_timeout(),
        https_proxy: https_proxy(),
        credentials,
    };
    let registry = DockerRegistry::new(&config.base_url(hostname), options)?;

    Ok(RegistryGateway::new(
        Box::new(registry),
        hostname,
        is_public_registry(hostname),
        RetryPolicy::from(&config.retry),
    ))
}
