//! Per-check memoization of registry data
//!
//! A context lives for exactly one update check. The tag list is fetched at
//! most once and every distinct tag's digest at most once.

use std::collections::HashMap;

use tracing::debug;

use crate::dependency::strip_digest_prefix;
use crate::registry::gateway::RegistryGateway;
use crate::resolver::error::ResolveError;
use crate::version::tag::{CANONICAL_TAGS, Tag};

pub struct ResolutionContext {
    gateway: RegistryGateway,
    repository: String,
    tags: Option<Vec<Tag>>,
    /// Digests keyed by tag name, stored without the `sha256:` prefix
    digests: HashMap<String, Option<String>>,
    /// Bare version tag the canonical marker points at
    latest_tag: Option<Option<Tag>>,
}

impl ResolutionContext {
    pub fn new(gateway: RegistryGateway, repository: &str) -> Self {
        Self {
            gateway,
            repository: repository.to_string(),
            tags: None,
            digests: HashMap::new(),
            latest_tag: None,
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn hostname(&self) -> &str {
        self.gateway.hostname()
    }

    /// All tags published for the repository
    pub async fn tags(&mut self) -> Result<&[Tag], ResolveError> {
        if self.tags.is_none() {
            let names = self.gateway.list_tags(&self.repository).await?;
            self.tags = Some(names.iter().map(|name| Tag::parse(name)).collect());
        }
        Ok(self.tags.as_deref().unwrap_or_default())
    }

    /// Digest of `tag` without the `sha256:` prefix, `None` when the registry has none
    pub async fn digest_of(&mut self, tag: &str) -> Result<Option<String>, ResolveError> {
        if let Some(digest) = self.digests.get(tag) {
            return Ok(digest.clone());
        }

        let digest = self
            .gateway
            .digest_of(&self.repository, tag)
            .await?
            .map(|d| strip_digest_prefix(&d).to_string());
        self.digests.insert(tag.to_string(), digest.clone());
        Ok(digest)
    }

    /// Canonical marker published by the registry, `latest` preferred
    pub async fn canonical_tag(&mut self) -> Result<Option<Tag>, ResolveError> {
        let tags = self.tags().await?;
        Ok(CANONICAL_TAGS.iter().find_map(|marker| {
            tags.iter()
                .find(|t| t.is_canonical() && t.name().eq_ignore_ascii_case(marker))
                .cloned()
        }))
    }

    /// Digest the canonical marker currently points at
    pub async fn latest_digest(&mut self) -> Result<Option<String>, ResolveError> {
        match self.canonical_tag().await? {
            Some(marker) => self.digest_of(marker.name()).await,
            None => Ok(None),
        }
    }

    /// Highest bare version tag sharing the canonical marker's digest
    pub async fn latest_tag(&mut self) -> Result<Option<Tag>, ResolveError> {
        if let Some(latest) = &self.latest_tag {
            return Ok(latest.clone());
        }

        let resolved = match self.latest_digest().await? {
            Some(latest_digest) => {
                let mut candidates: Vec<Tag> = self
                    .tags()
                    .await?
                    .iter()
                    .filter(|t| t.is_bare_version())
                    .cloned()
                    .collect();
                candidates.sort_by(|a, b| b.version().cmp(&a.version()));

                let mut found = None;
                for tag in candidates {
                    if self.digest_of(tag.name()).await?.as_deref() == Some(latest_digest.as_str())
                    {
                        found = Some(tag);
                        break;
                    }
                }
                found
            }
            None => None,
        };

        debug!(
            "Canonical marker of {} resolves to {:?}",
            self.repository,
            resolved.as_ref().map(Tag::name)
        );
        self.latest_tag = Some(resolved.clone());
        Ok(resolved)
    }
}
