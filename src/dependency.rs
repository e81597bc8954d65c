//! Dependency tuples exchanged with the manifest collaborators

use serde::{Deserialize, Serialize};

/// Prefix registries put in front of sha256 manifest digests
pub const DIGEST_PREFIX: &str = "sha256:";

/// A container image dependency found in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Repository path (e.g., "nginx", "grafana/grafana")
    pub name: String,
    /// Currently recorded tag, or digest for digest-only pins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Declared pin sites of this image in the manifest
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

/// One pin site of a dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub source: Source,
}

/// Where and how an image is pinned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl Dependency {
    /// Registry named by the first requirement, if any
    pub fn registry(&self) -> Option<&str> {
        self.requirements
            .first()
            .and_then(|r| r.source.registry.as_deref())
    }

    pub fn digest_requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements
            .iter()
            .filter(|r| r.source.digest.is_some())
    }

    pub fn has_digest_requirement(&self) -> bool {
        self.digest_requirements().next().is_some()
    }
}

/// Strips the `sha256:` prefix registries put in front of digests
pub fn strip_digest_prefix(digest: &str) -> &str {
    digest.strip_prefix(DIGEST_PREFIX).unwrap_or(digest)
}

/// Formats `digest` the way `template` was written, with or without the prefix
pub fn format_digest_like(template: &str, digest: &str) -> String {
    let bare = strip_digest_prefix(digest);
    if template.starts_with(DIGEST_PREFIX) {
        format!("{}{}", DIGEST_PREFIX, bare)
    } else {
        bare.to_string()
    }
}
