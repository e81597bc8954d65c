//! Tag resolution and digest reconciliation
//!
//! # Modules
//!
//! - [`context`]: Per-check memoization of tags, digests and the canonical marker
//! - [`engine`]: Selection of the best replacement tag
//! - [`checker`]: Update decisions and rewritten requirements for one dependency
//! - [`error`]: Fatal check outcomes

pub mod checker;
pub mod context;
pub mod engine;
pub mod error;

pub use checker::{UpdateChecker, UpdateReport};
pub use context::ResolutionContext;
pub use engine::TagResolver;
pub use error::{CheckError, ResolveError};

use tracing::info;

use crate::config::ResolverConfig;
use crate::dependency::Dependency;
use crate::registry::{self, Credentials};
use crate::version::ignore::IgnoreFilter;

/// Runs a complete update check for `dependency` against its registry.
///
/// `extra_ignores` are appended to the ignore conditions configured for the
/// dependency.
pub async fn check_dependency(
    config: &ResolverConfig,
    dependency: Dependency,
    extra_ignores: &[String],
    credentials: Option<Credentials>,
) -> Result<UpdateReport, CheckError> {
    let hostname = dependency
        .registry()
        .unwrap_or(&config.default_registry)
        .to_string();
    let repository = config.repository_naming(&hostname).apply(&dependency.name);

    let rules = config.ignore_rules(&dependency.name, extra_ignores)?;
    let ignore = IgnoreFilter::new(rules, config.raise_on_ignored);

    info!("Checking {} ({}) on {}", dependency.name, repository, hostname);

    let gateway = registry::connect(config, &hostname, credentials)?;
    let context = ResolutionContext::new(gateway, &repository);
    let mut checker = UpdateChecker::new(dependency, context, ignore);

    Ok(checker.report().await?)
}
