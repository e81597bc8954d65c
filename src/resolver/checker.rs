//! Update check for one dependency
//!
//! Combines tag resolution with digest reconciliation. A digest always
//! follows the resolved tag; digest-only pins follow the canonical marker.

use serde::Serialize;
use tracing::debug;

use crate::dependency::{Dependency, Requirement, format_digest_like, strip_digest_prefix};
use crate::resolver::context::ResolutionContext;
use crate::resolver::engine::TagResolver;
use crate::resolver::error::ResolveError;
use crate::version::ignore::IgnoreFilter;
use crate::version::tag::Tag;

/// Result of checking one dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReport {
    pub name: String,
    pub current_version: Option<String>,
    pub latest_version: Option<String>,
    pub can_update: bool,
    pub updated_requirements: Vec<Requirement>,
}

pub struct UpdateChecker {
    dependency: Dependency,
    resolver: TagResolver,
}

impl UpdateChecker {
    pub fn new(dependency: Dependency, context: ResolutionContext, ignore: IgnoreFilter) -> Self {
        let resolver = TagResolver::new(
            context,
            &dependency.name,
            ignore,
            dependency.has_digest_requirement(),
        );
        Self {
            dependency,
            resolver,
        }
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    /// Tag that should replace the dependency's current version
    pub async fn latest_version(&mut self) -> Result<Option<String>, ResolveError> {
        let Some(version) = self.dependency.version.clone() else {
            return Ok(None);
        };
        let tag = self.resolver.resolve(&Tag::parse(&version)).await?;
        Ok(Some(tag.name().to_string()))
    }

    /// Images have no resolvability constraints, so this is [`Self::latest_version`]
    pub async fn latest_resolvable_version(&mut self) -> Result<Option<String>, ResolveError> {
        self.latest_version().await
    }

    /// There is nothing to unlock for an image
    pub fn latest_resolvable_version_with_no_unlock(&self) -> Option<&str> {
        self.dependency.version.as_deref()
    }

    pub async fn can_update(&mut self) -> Result<bool, ResolveError> {
        if self.dependency.has_digest_requirement() {
            Ok(!self.digest_up_to_date().await?)
        } else {
            Ok(!self.version_tag_up_to_date().await?)
        }
    }

    pub async fn up_to_date(&mut self) -> Result<bool, ResolveError> {
        let tag_up_to_date = self.version_tag_up_to_date().await?;
        if self.dependency.has_digest_requirement() {
            Ok(tag_up_to_date && self.digest_up_to_date().await?)
        } else {
            Ok(tag_up_to_date)
        }
    }

    pub async fn version_tag_up_to_date(&mut self) -> Result<bool, ResolveError> {
        let Some(version) = self.dependency.version.clone() else {
            return Ok(false);
        };

        let current = Tag::parse(&version);
        let Some(current_version) = current.version().cloned() else {
            return Ok(true);
        };

        let latest = self.resolver.resolve(&current).await?;
        Ok(latest.version().is_none_or(|v| *v <= current_version))
    }

    /// Every digest requirement still matches the digest of the resolved tag.
    /// Missing digest data never forces an update.
    pub async fn digest_up_to_date(&mut self) -> Result<bool, ResolveError> {
        let Some(updated) = self.updated_digest().await? else {
            return Ok(true);
        };

        Ok(self
            .dependency
            .digest_requirements()
            .filter_map(|r| r.source.digest.as_deref())
            .all(|digest| strip_digest_prefix(digest) == updated))
    }

    /// Digest the dependency should be pinned to, without the `sha256:` prefix
    pub async fn updated_digest(&mut self) -> Result<Option<String>, ResolveError> {
        let Some(version) = self.dependency.version.clone() else {
            return self.resolver.context_mut().latest_digest().await;
        };

        let current = Tag::parse(&version);
        if current.is_digest() {
            return self.resolver.context_mut().latest_digest().await;
        }

        let resolved = self.resolver.resolve(&current).await?;
        self.resolver.context_mut().digest_of(resolved.name()).await
    }

    /// Requirements with tags replaced by their resolution and digests
    /// following the tag. Digests are only written where one was present.
    pub async fn updated_requirements(&mut self) -> Result<Vec<Requirement>, ResolveError> {
        let mut updated = Vec::with_capacity(self.dependency.requirements.len());

        for requirement in self.dependency.requirements.clone() {
            let mut source = requirement.source.clone();

            if let Some(tag) = &requirement.source.tag {
                let resolved = self.resolver.resolve(&Tag::parse(tag)).await?;
                source.tag = Some(resolved.name().to_string());

                if let Some(old_digest) = &requirement.source.digest {
                    let digest = self.resolver.context_mut().digest_of(resolved.name()).await?;
                    source.digest = Some(follow_digest(old_digest, digest));
                }
            } else if let Some(old_digest) = &requirement.source.digest {
                let digest = self.resolver.context_mut().latest_digest().await?;
                source.digest = Some(follow_digest(old_digest, digest));
            }

            updated.push(Requirement { source });
        }

        Ok(updated)
    }

    pub async fn report(&mut self) -> Result<UpdateReport, ResolveError> {
        let latest_version = self.latest_version().await?;
        let can_update = self.can_update().await?;
        let updated_requirements = if can_update {
            self.updated_requirements().await?
        } else {
            self.dependency.requirements.clone()
        };

        debug!(
            "{}: {:?} -> {:?} (can update: {})",
            self.dependency.name, self.dependency.version, latest_version, can_update
        );

        Ok(UpdateReport {
            name: self.dependency.name.clone(),
            current_version: self.dependency.version.clone(),
            latest_version,
            can_update,
            updated_requirements,
        })
    }
}

/// New digest in the stored digest's format; the stored one when none was found
fn follow_digest(old_digest: &str, digest: Option<String>) -> String {
    match digest {
        Some(digest) => format_digest_like(old_digest, &digest),
        None => old_digest.to_string(),
    }
}
