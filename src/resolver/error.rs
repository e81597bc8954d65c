use thiserror::Error;

use crate::config::ConfigError;
use crate::registry::error::RegistryError;

/// Fatal outcomes of an update check
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Authentication failed for private source {hostname}")]
    PrivateSourceAuthenticationFailure { hostname: String },

    #[error("Timed out talking to private source {hostname}")]
    PrivateSourceTimedOut { hostname: String },

    #[error("All updates for {dependency} are ignored")]
    AllVersionsIgnored { dependency: String },

    #[error("Registry {hostname} failed: {source}")]
    Registry {
        hostname: String,
        #[source]
        source: RegistryError,
    },
}

impl ResolveError {
    /// Translates a registry error that survived retries into a fatal error
    ///
    /// Timeouts against the public Docker Hub stay generic registry errors;
    /// everywhere else they mean the private source is unreachable.
    pub fn from_registry(error: RegistryError, hostname: &str, is_public_registry: bool) -> Self {
        let hostname = hostname.to_string();

        if error.is_auth_failure() {
            ResolveError::PrivateSourceAuthenticationFailure { hostname }
        } else if error.is_timeout() && !is_public_registry {
            ResolveError::PrivateSourceTimedOut { hostname }
        } else {
            ResolveError::Registry {
                hostname,
                source: error,
            }
        }
    }
}

/// Anything that can stop a single dependency check
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to set up registry client: {0}")]
    Client(#[from] RegistryError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_registry_maps_auth_failures_with_hostname() {
        let error = ResolveError::from_registry(RegistryError::Forbidden, "ghcr.io", false);

        assert!(matches!(
            error,
            ResolveError::PrivateSourceAuthenticationFailure { ref hostname } if hostname == "ghcr.io"
        ));
        assert_eq!(
            error.to_string(),
            "Authentication failed for private source ghcr.io"
        );
    }

    #[test]
    fn from_registry_maps_private_timeouts() {
        let error =
            ResolveError::from_registry(RegistryError::Timeout("read".into()), "ghcr.io", false);

        assert!(matches!(error, ResolveError::PrivateSourceTimedOut { .. }));
    }

    #[test]
    fn from_registry_keeps_public_registry_timeouts_generic() {
        let error = ResolveError::from_registry(
            RegistryError::Timeout("read".into()),
            "registry.hub.docker.com",
            true,
        );

        assert!(matches!(
            error,
            ResolveError::Registry {
                source: RegistryError::Timeout(_),
                ..
            }
        ));
    }

    #[test]
    fn from_registry_keeps_auth_failures_fatal_on_public_registry() {
        let error =
            ResolveError::from_registry(RegistryError::Unauthorized, "registry.hub.docker.com", true);

        assert!(matches!(
            error,
            ResolveError::PrivateSourceAuthenticationFailure { .. }
        ));
    }
}
