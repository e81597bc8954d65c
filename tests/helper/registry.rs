//! Registry test utilities

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use image_tag_resolver::dependency::{Dependency, Requirement, Source};
use image_tag_resolver::registry::error::RegistryError;
use image_tag_resolver::registry::{ImageRegistry, RegistryGateway, RetryPolicy};
use image_tag_resolver::resolver::{ResolutionContext, TagResolver, UpdateChecker};
use image_tag_resolver::version::ignore::IgnoreFilter;

pub const HOSTNAME: &str = "registry.example.com";

/// Call counts shared with a [`FakeRegistry`] after it is boxed
#[derive(Debug, Clone, Default)]
pub struct CallCounts {
    list_tags: Arc<AtomicUsize>,
    digest_of: Arc<AtomicUsize>,
}

impl CallCounts {
    pub fn list_tags(&self) -> usize {
        self.list_tags.load(Ordering::SeqCst)
    }

    pub fn digest_of(&self) -> usize {
        self.digest_of.load(Ordering::SeqCst)
    }
}

/// In-memory registry with scripted failures
#[derive(Default)]
pub struct FakeRegistry {
    tags: Vec<String>,
    digests: HashMap<String, String>,
    list_failures: Mutex<VecDeque<RegistryError>>,
    digest_failures: Mutex<VecDeque<RegistryError>>,
    counts: CallCounts,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `tag` pointing at `sha256:<digest>`
    pub fn with_tag(mut self, tag: &str, digest: &str) -> Self {
        self.tags.push(tag.to_string());
        self.digests
            .insert(tag.to_string(), format!("sha256:{}", digest));
        self
    }

    /// Publishes `tag` without a digest
    pub fn with_undigested_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// The next `list_tags` calls fail with these errors, in order
    pub fn failing_list_tags(self, errors: Vec<RegistryError>) -> Self {
        self.list_failures
            .lock()
            .unwrap()
            .extend(errors);
        self
    }

    /// The next `digest_of` calls fail with these errors, in order
    pub fn failing_digest_of(self, errors: Vec<RegistryError>) -> Self {
        self.digest_failures
            .lock()
            .unwrap()
            .extend(errors);
        self
    }

    pub fn counts(&self) -> CallCounts {
        self.counts.clone()
    }
}

#[async_trait]
impl ImageRegistry for FakeRegistry {
    async fn list_tags(&self, _repository: &str) -> Result<Vec<String>, RegistryError> {
        self.counts.list_tags.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.list_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.tags.clone())
    }

    async fn digest_of(
        &self,
        _repository: &str,
        tag: &str,
    ) -> Result<Option<String>, RegistryError> {
        self.counts.digest_of.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.digest_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.digests.get(tag).cloned())
    }
}

pub fn create_gateway(registry: FakeRegistry) -> RegistryGateway {
    RegistryGateway::new(Box::new(registry), HOSTNAME, false, RetryPolicy::immediate(3))
}

pub fn create_resolver(
    registry: FakeRegistry,
    ignore: IgnoreFilter,
    has_digest_requirement: bool,
) -> TagResolver {
    let context = ResolutionContext::new(create_gateway(registry), "app");
    TagResolver::new(context, "app", ignore, has_digest_requirement)
}

pub fn create_checker(
    registry: FakeRegistry,
    dependency: Dependency,
    ignore: IgnoreFilter,
) -> UpdateChecker {
    let context = ResolutionContext::new(create_gateway(registry), "app");
    UpdateChecker::new(dependency, context, ignore)
}

/// Dependency pinned at `tag`, optionally with a digest
pub fn pinned_dependency(tag: &str, digest: Option<&str>) -> Dependency {
    Dependency {
        name: "app".to_string(),
        version: Some(tag.to_string()),
        requirements: vec![Requirement {
            source: Source {
                registry: None,
                tag: Some(tag.to_string()),
                digest: digest.map(str::to_string),
            },
        }],
    }
}
