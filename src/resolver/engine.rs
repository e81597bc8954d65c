//! Tag selection
//!
//! Picks the best replacement for a tag. The candidates are the registry
//! tags with the same decoration that are not downgrades, prereleases or
//! ignored. The highest one wins, and precision is only widened when the
//! wider tag is a genuinely different image.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::resolver::context::ResolutionContext;
use crate::resolver::error::ResolveError;
use crate::version::ignore::IgnoreFilter;
use crate::version::tag::Tag;

pub struct TagResolver {
    context: ResolutionContext,
    dependency_name: String,
    ignore: IgnoreFilter,
    has_digest_requirement: bool,
    /// Resolutions keyed by the tag they started from
    resolved: HashMap<String, Tag>,
}

impl TagResolver {
    pub fn new(
        context: ResolutionContext,
        dependency_name: &str,
        ignore: IgnoreFilter,
        has_digest_requirement: bool,
    ) -> Self {
        Self {
            context,
            dependency_name: dependency_name.to_string(),
            ignore,
            has_digest_requirement,
            resolved: HashMap::new(),
        }
    }

    pub fn context_mut(&mut self) -> &mut ResolutionContext {
        &mut self.context
    }

    /// Resolves the tag that should replace `current`.
    ///
    /// Always returns a tag, `current` itself when nothing better exists, so
    /// callers can still look up its digest.
    pub async fn resolve(&mut self, current: &Tag) -> Result<Tag, ResolveError> {
        if let Some(tag) = self.resolved.get(current.name()) {
            return Ok(tag.clone());
        }

        let tag = self.fetch_latest_tag(current).await?;
        debug!("Resolved {} to {}", current, tag);
        self.resolved.insert(current.name().to_string(), tag.clone());
        Ok(tag)
    }

    async fn fetch_latest_tag(&mut self, current: &Tag) -> Result<Tag, ResolveError> {
        if current.is_digest() {
            return Ok(self
                .context
                .latest_digest()
                .await?
                .map(|digest| Tag::parse(&digest))
                .unwrap_or_else(|| current.clone()));
        }

        let Some(current_version) = current.version().cloned() else {
            debug!("{} is not comparable, keeping it", current);
            return Ok(current.clone());
        };

        // Downgrades are pruned before prerelease checks, which may cost a
        // registry round trip per tag
        let candidates: Vec<Tag> = self
            .context
            .tags()
            .await?
            .iter()
            .filter(|tag| tag.comparable_to(current))
            .filter(|tag| tag.version().is_some_and(|v| *v >= current_version))
            .cloned()
            .collect();

        let candidates = self.remove_prereleases(candidates, current).await?;

        let mut candidates = self
            .ignore
            .apply(candidates, &current_version, self.has_digest_requirement)
            .map_err(|_| ResolveError::AllVersionsIgnored {
                dependency: self.dependency_name.clone(),
            })?;

        sort_candidates(&mut candidates, current);

        let Some(absolute_latest) = candidates.last().cloned() else {
            return Ok(current.clone());
        };

        if absolute_latest.same_precision(current) {
            return Ok(absolute_latest);
        }

        let Some(same_precision_latest) = candidates
            .iter()
            .rev()
            .find(|tag| tag.same_precision(current))
            .cloned()
        else {
            return Ok(absolute_latest);
        };

        // Registries may omit digests; two missing digests still count as equal
        // and the version prefix check decides on its own
        let same_precision_digest = self.context.digest_of(same_precision_latest.name()).await?;
        let latest_digest = self.context.digest_of(absolute_latest.name()).await?;

        if same_precision_digest == latest_digest
            && same_precision_latest.same_but_less_precise(&absolute_latest)
        {
            Ok(same_precision_latest)
        } else {
            Ok(absolute_latest)
        }
    }

    async fn remove_prereleases(
        &mut self,
        candidates: Vec<Tag>,
        current: &Tag,
    ) -> Result<Vec<Tag>, ResolveError> {
        if current.looks_like_prerelease() {
            return Ok(candidates);
        }

        let latest = self.context.latest_tag().await?;
        if latest.as_ref().is_some_and(|l| sorts_above_latest(current, l)) {
            return Ok(candidates);
        }

        Ok(candidates
            .into_iter()
            .filter(|tag| {
                if tag.looks_like_prerelease() {
                    debug!("Skipping {}: prerelease name", tag);
                    return false;
                }
                match &latest {
                    Some(latest) if sorts_above_latest(tag, latest) => {
                        info!(
                            "Tag with non-prerelease version name {} detected as prerelease, because it sorts higher than {}.",
                            tag, latest
                        );
                        false
                    }
                    _ => true,
                }
            })
            .collect())
    }
}

/// True if `tag` is numerically newer than the version `latest` points at
pub fn sorts_above_latest(tag: &Tag, latest: &Tag) -> bool {
    match (tag.version(), latest.version()) {
        (Some(version), Some(latest_version)) => version > latest_version,
        _ => false,
    }
}

/// Sorts by version; among equal versions, tags with `current`'s precision go last
pub fn sort_candidates(candidates: &mut [Tag], current: &Tag) {
    candidates.sort_by(|a, b| {
        a.version()
            .cmp(&b.version())
            .then_with(|| a.same_precision(current).cmp(&b.same_precision(current)))
    });
}
