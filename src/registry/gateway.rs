//! Retrying front for a registry client
//!
//! All transient failures are absorbed here. Callers only ever see a result
//! or a fatal [`ResolveError`] naming the registry host.

use tracing::{debug, info};

use crate::registry::client::ImageRegistry;
use crate::registry::error::{Operation, RegistryError};
use crate::registry::retry::{RetryPolicy, with_retries};
use crate::resolver::error::ResolveError;

pub struct RegistryGateway {
    registry: Box<dyn ImageRegistry>,
    hostname: String,
    is_public_registry: bool,
    policy: RetryPolicy,
}

impl RegistryGateway {
    pub fn new(
        registry: Box<dyn ImageRegistry>,
        hostname: &str,
        is_public_registry: bool,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            hostname: hostname.to_string(),
            is_public_registry,
            policy,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Public hosts do not report timeouts as a broken private source
    pub fn is_public_registry(&self) -> bool {
        self.is_public_registry
    }

    pub async fn list_tags(&self, repository: &str) -> Result<Vec<String>, ResolveError> {
        let tags = with_retries(
            &self.policy,
            |e: &RegistryError| e.is_transient(Operation::ListTags),
            || self.registry.list_tags(repository),
        )
        .await
        .map_err(|e| self.fatal(e))?;

        info!(
            "Fetched {} tags for {} from {}",
            tags.len(),
            repository,
            self.hostname
        );
        Ok(tags)
    }

    /// Looks up the digest of `tag`. A manifest that is still missing after
    /// the last attempt yields `None` instead of failing the check.
    pub async fn digest_of(
        &self,
        repository: &str,
        tag: &str,
    ) -> Result<Option<String>, ResolveError> {
        let result = with_retries(
            &self.policy,
            |e: &RegistryError| e.is_transient(Operation::DigestOf),
            || self.registry.digest_of(repository, tag),
        )
        .await;

        match result {
            Ok(digest) => Ok(digest),
            Err(RegistryError::NotFound(_)) => {
                debug!(
                    "No manifest for {}:{} on {}, treating digest as unavailable",
                    repository, tag, self.hostname
                );
                Ok(None)
            }
            Err(e) => Err(self.fatal(e)),
        }
    }

    fn fatal(&self, error: RegistryError) -> ResolveError {
        ResolveError::from_registry(error, &self.hostname, self.is_public_registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::client::MockImageRegistry;

    fn gateway(mock: MockImageRegistry, is_public_registry: bool) -> RegistryGateway {
        RegistryGateway::new(
            Box::new(mock),
            "registry.example.com",
            is_public_registry,
            RetryPolicy::immediate(3),
        )
    }

    #[tokio::test]
    async fn list_tags_succeeds_after_two_transient_failures() {
        let mut mock = MockImageRegistry::new();
        let mut calls = 0;
        mock.expect_list_tags().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Err(RegistryError::Status {
                    status: 503,
                    url: "https://registry.example.com/v2/app/tags/list".to_string(),
                })
            } else {
                Ok(vec!["1.0".to_string()])
            }
        });

        let tags = gateway(mock, false).list_tags("app").await.unwrap();

        assert_eq!(tags, vec!["1.0".to_string()]);
    }

    #[tokio::test]
    async fn list_tags_propagates_after_three_transient_failures() {
        let mut mock = MockImageRegistry::new();
        mock.expect_list_tags()
            .times(3)
            .returning(|_| Err(RegistryError::Connection("reset by peer".to_string())));

        let result = gateway(mock, false).list_tags("app").await;

        assert!(matches!(
            result,
            Err(ResolveError::Registry {
                source: RegistryError::Connection(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn list_tags_does_not_retry_not_found() {
        let mut mock = MockImageRegistry::new();
        mock.expect_list_tags()
            .times(1)
            .returning(|repo| Err(RegistryError::NotFound(repo.to_string())));

        let result = gateway(mock, false).list_tags("app").await;

        assert!(matches!(
            result,
            Err(ResolveError::Registry {
                source: RegistryError::NotFound(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn auth_failures_are_not_retried() {
        let mut mock = MockImageRegistry::new();
        mock.expect_list_tags()
            .times(1)
            .returning(|_| Err(RegistryError::Unauthorized));

        let result = gateway(mock, true).list_tags("app").await;

        assert!(matches!(
            result,
            Err(ResolveError::PrivateSourceAuthenticationFailure { ref hostname })
                if hostname == "registry.example.com"
        ));
    }

    #[tokio::test]
    async fn timeouts_on_private_registry_become_private_source_timed_out() {
        let mut mock = MockImageRegistry::new();
        mock.expect_list_tags()
            .times(3)
            .returning(|_| Err(RegistryError::Timeout("read timed out".to_string())));

        let result = gateway(mock, false).list_tags("app").await;

        assert!(matches!(
            result,
            Err(ResolveError::PrivateSourceTimedOut { .. })
        ));
    }

    #[tokio::test]
    async fn timeouts_on_public_registry_stay_generic() {
        let mut mock = MockImageRegistry::new();
        mock.expect_list_tags()
            .times(3)
            .returning(|_| Err(RegistryError::Timeout("read timed out".to_string())));

        let result = gateway(mock, true).list_tags("app").await;

        assert!(matches!(
            result,
            Err(ResolveError::Registry {
                source: RegistryError::Timeout(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn digest_of_degrades_to_none_after_persistent_not_found() {
        let mut mock = MockImageRegistry::new();
        mock.expect_digest_of()
            .times(3)
            .returning(|_, tag| Err(RegistryError::NotFound(tag.to_string())));

        let digest = gateway(mock, false).digest_of("app", "1.0").await.unwrap();

        assert_eq!(digest, None);
    }

    #[tokio::test]
    async fn digest_of_recovers_from_transient_not_found() {
        let mut mock = MockImageRegistry::new();
        let mut calls = 0;
        mock.expect_digest_of()
            .times(2)
            .returning(move |_, tag| {
                calls += 1;
                if calls == 1 {
                    Err(RegistryError::NotFound(tag.to_string()))
                } else {
                    Ok(Some("sha256:abc".to_string()))
                }
            });

        let digest = gateway(mock, false).digest_of("app", "1.0").await.unwrap();

        assert_eq!(digest, Some("sha256:abc".to_string()));
    }

    #[tokio::test]
    async fn digest_of_translates_forbidden() {
        let mut mock = MockImageRegistry::new();
        mock.expect_digest_of()
            .times(1)
            .returning(|_, _| Err(RegistryError::Forbidden));

        let result = gateway(mock, false).digest_of("app", "1.0").await;

        assert!(matches!(
            result,
            Err(ResolveError::PrivateSourceAuthenticationFailure { .. })
        ));
    }
}
