//! Registry trait for fetching tags and digests from an image registry

#[cfg(test)]
use mockall::automock;

use crate::registry::error::RegistryError;

/// Trait for talking to an image registry
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ImageRegistry: Send + Sync {
    /// Fetches every tag published for a repository
    ///
    /// # Arguments
    /// * `repository` - Repository path as the registry expects it (e.g., "library/nginx")
    ///
    /// # Returns
    /// * `Ok(Vec<String>)` - All tag names, with pagination already exhausted
    /// * `Err(RegistryError)` - If the fetch fails
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError>;

    /// Fetches the manifest digest for a tag
    ///
    /// # Returns
    /// * `Ok(Some(digest))` - Digest as reported by the registry (e.g., "sha256:…")
    /// * `Ok(None)` - The registry answered but did not report a digest
    /// * `Err(RegistryError)` - If the lookup fails
    async fn digest_of(&self, repository: &str, tag: &str)
    -> Result<Option<String>, RegistryError>;
}
