use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::version::error::RangeError;
use crate::version::ignore::{IgnoreRule, parse_ignore_rules};

// =============================================================================
// Registry constants
// =============================================================================

/// Public default registry host
pub const DEFAULT_REGISTRY: &str = "registry.hub.docker.com";

/// Docker Hub hosts that store official images under `library/`
pub const DOCKER_HUB_HOSTS: &[&str] = &["registry.hub.docker.com", "registry-1.docker.io", "docker.io"];

/// Read timeout for registry connections in milliseconds (10 seconds)
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10_000;

/// Total attempts per registry call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay after the first failed attempt in milliseconds
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 250;

/// Upper bound for the delay between attempts in milliseconds
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 2_000;

const APP_NAME: &str = "image-tag-resolver";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid ignore condition for {dependency}: {source}")]
    InvalidIgnore {
        dependency: String,
        #[source]
        source: RangeError,
    },
}

/// Resolver configuration structure
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    /// Registry used when a requirement names none
    pub default_registry: String,
    /// Read timeout for registry connections in milliseconds
    pub read_timeout_ms: u64,
    pub retry: RetryConfig,
    /// Per-host overrides keyed by registry hostname
    pub registries: IndexMap<String, RegistryConfig>,
    /// Fail when ignore conditions suppress every available update
    pub raise_on_ignored: bool,
    /// Ignore conditions keyed by dependency name
    pub ignore: IndexMap<String, Vec<String>>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_registry: DEFAULT_REGISTRY.to_string(),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            retry: RetryConfig::default(),
            registries: IndexMap::new(),
            raise_on_ignored: false,
            ignore: IndexMap::new(),
        }
    }
}

/// Retry-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

/// Individual registry configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Repository name rule; unset falls back to the built-in rule for the host
    pub naming: Option<RepositoryNaming>,
    /// Talk plain HTTP instead of HTTPS
    pub insecure: bool,
}

/// How a dependency name maps to the repository path a registry expects
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RepositoryNaming {
    /// Use the name as-is
    Identity,
    /// Prefix un-namespaced names with `library/` (Docker Hub official images)
    LibraryPrefix,
}

impl RepositoryNaming {
    pub fn apply(&self, name: &str) -> String {
        match self {
            RepositoryNaming::LibraryPrefix if !name.contains('/') => format!("library/{}", name),
            _ => name.to_string(),
        }
    }
}

impl ResolverConfig {
    /// Loads configuration from `path`, or from the default location when
    /// `path` is `None`. A missing default file yields the default config.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::read(path),
            None => {
                let path = config_path();
                if path.exists() {
                    Self::read(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn repository_naming(&self, hostname: &str) -> RepositoryNaming {
        self.registries
            .get(hostname)
            .and_then(|r| r.naming)
            .unwrap_or_else(|| {
                if is_public_registry(hostname) {
                    RepositoryNaming::LibraryPrefix
                } else {
                    RepositoryNaming::Identity
                }
            })
    }

    pub fn base_url(&self, hostname: &str) -> String {
        let insecure = self.registries.get(hostname).is_some_and(|r| r.insecure);
        let scheme = if insecure { "http" } else { "https" };
        format!("{}://{}", scheme, hostname)
    }

    /// Parses the ignore conditions configured for a dependency, appending `extra`
    pub fn ignore_rules(
        &self,
        dependency: &str,
        extra: &[String],
    ) -> Result<Vec<Box<dyn IgnoreRule>>, ConfigError> {
        let mut conditions = self.ignore.get(dependency).cloned().unwrap_or_default();
        conditions.extend_from_slice(extra);

        parse_ignore_rules(&conditions).map_err(|source| ConfigError::InvalidIgnore {
            dependency: dependency.to_string(),
            source,
        })
    }
}

/// True for the public Docker Hub hosts, whatever registry is configured as default
pub fn is_public_registry(hostname: &str) -> bool {
    DOCKER_HUB_HOSTS
        .iter()
        .any(|host| host.eq_ignore_ascii_case(hostname))
}

/// Returns the HTTPS proxy URL from `HTTPS_PROXY` or `https_proxy`, if set.
pub fn https_proxy() -> Option<String> {
    std::env::var("HTTPS_PROXY")
        .or_else(|_| std::env::var("https_proxy"))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Returns the path to the config file.
/// Uses $XDG_CONFIG_HOME/image-tag-resolver/config.json if XDG_CONFIG_HOME is set,
/// otherwise falls back to ~/.config/image-tag-resolver/config.json.
pub fn config_path() -> PathBuf {
    app_dir_with_env(
        std::env::var("XDG_CONFIG_HOME").ok(),
        dirs::home_dir(),
        ".config",
    )
    .join("config.json")
}

/// Returns the path to the data directory for image-tag-resolver.
pub fn data_dir() -> PathBuf {
    app_dir_with_env(
        std::env::var("XDG_DATA_HOME").ok(),
        dirs::home_dir(),
        ".local/share",
    )
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join(format!("{}.log", APP_NAME))
}

fn app_dir_with_env(xdg_dir: Option<String>, home_dir: Option<PathBuf>, home_relative: &str) -> PathBuf {
    let base = xdg_dir
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(home_relative)))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn resolver_config_from_partial_object_uses_defaults_for_missing_fields() {
        let result = serde_json::from_value::<ResolverConfig>(json!({
            "retry": {
                "maxAttempts": 5
            }
        }))
        .unwrap();

        assert_eq!(result.retry.max_attempts, 5);
        assert_eq!(result.retry.initial_backoff_ms, DEFAULT_INITIAL_BACKOFF_MS);
        assert_eq!(result.default_registry, DEFAULT_REGISTRY);
        assert_eq!(result.read_timeout_ms, DEFAULT_READ_TIMEOUT_MS);
        assert!(result.registries.is_empty());
    }

    #[test]
    fn resolver_config_from_full_object_parses_all_fields() {
        let result = serde_json::from_value::<ResolverConfig>(json!({
            "defaultRegistry": "registry.example.com",
            "readTimeoutMs": 2000,
            "retry": {
                "maxAttempts": 2,
                "initialBackoffMs": 0,
                "maxBackoffMs": 0
            },
            "registries": {
                "registry.example.com": { "naming": "libraryPrefix", "insecure": true }
            },
            "raiseOnIgnored": true,
            "ignore": {
                "nginx": [">= 2"]
            }
        }))
        .unwrap();

        let mut registries = IndexMap::new();
        registries.insert(
            "registry.example.com".to_string(),
            RegistryConfig {
                naming: Some(RepositoryNaming::LibraryPrefix),
                insecure: true,
            },
        );
        let mut ignore = IndexMap::new();
        ignore.insert("nginx".to_string(), vec![">= 2".to_string()]);

        assert_eq!(
            result,
            ResolverConfig {
                default_registry: "registry.example.com".to_string(),
                read_timeout_ms: 2000,
                retry: RetryConfig {
                    max_attempts: 2,
                    initial_backoff_ms: 0,
                    max_backoff_ms: 0,
                },
                registries,
                raise_on_ignored: true,
                ignore,
            }
        );
    }

    #[test]
    fn repository_naming_prefixes_library_only_on_docker_hub() {
        let config = ResolverConfig::default();

        assert_eq!(
            config.repository_naming(DEFAULT_REGISTRY).apply("nginx"),
            "library/nginx"
        );
        assert_eq!(
            config.repository_naming(DEFAULT_REGISTRY).apply("grafana/grafana"),
            "grafana/grafana"
        );
        assert_eq!(
            config.repository_naming("ghcr.io").apply("nginx"),
            "nginx"
        );
    }

    #[test]
    fn repository_naming_honors_configured_override() {
        let config = serde_json::from_value::<ResolverConfig>(json!({
            "registries": {
                "registry.hub.docker.com": { "naming": "identity" },
                "mirror.internal": { "naming": "libraryPrefix" }
            }
        }))
        .unwrap();

        assert_eq!(config.repository_naming(DEFAULT_REGISTRY).apply("nginx"), "nginx");
        assert_eq!(
            config.repository_naming("mirror.internal").apply("nginx"),
            "library/nginx"
        );
    }

    #[rstest]
    #[case("registry.hub.docker.com", true)]
    #[case("registry-1.docker.io", true)]
    #[case("Docker.io", true)]
    #[case("registry.internal", false)]
    #[case("ghcr.io", false)]
    fn is_public_registry_matches_docker_hub_hosts(#[case] hostname: &str, #[case] expected: bool) {
        assert_eq!(is_public_registry(hostname), expected);
    }

    #[test]
    fn configured_default_registry_is_still_private() {
        let config = serde_json::from_value::<ResolverConfig>(json!({
            "defaultRegistry": "registry.internal"
        }))
        .unwrap();

        assert_eq!(config.default_registry, "registry.internal");
        assert!(!is_public_registry(&config.default_registry));
    }

    #[test]
    fn base_url_uses_http_for_insecure_registries() {
        let config = serde_json::from_value::<ResolverConfig>(json!({
            "registries": { "localhost:5000": { "insecure": true } }
        }))
        .unwrap();

        assert_eq!(config.base_url("localhost:5000"), "http://localhost:5000");
        assert_eq!(config.base_url("ghcr.io"), "https://ghcr.io");
    }

    #[test]
    fn ignore_rules_merges_config_and_extra_conditions() {
        let config = serde_json::from_value::<ResolverConfig>(json!({
            "ignore": { "nginx": ["1.25.*"] }
        }))
        .unwrap();

        let rules = config.ignore_rules("nginx", &["2.0".to_string()]).unwrap();

        assert_eq!(rules.len(), 2);
        assert!(config.ignore_rules("redis", &[]).unwrap().is_empty());
    }

    #[test]
    fn ignore_rules_reports_invalid_condition() {
        let result = ResolverConfig::default().ignore_rules("nginx", &[">= banana".to_string()]);

        assert!(matches!(
            result,
            Err(ConfigError::InvalidIgnore { dependency, .. }) if dependency == "nginx"
        ));
    }

    #[test]
    fn load_reads_explicit_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"raiseOnIgnored": true}}"#).unwrap();

        let config = ResolverConfig::load(Some(file.path())).unwrap();

        assert!(config.raise_on_ignored);
    }

    #[test]
    fn load_fails_for_missing_explicit_file() {
        let result = ResolverConfig::load(Some(Path::new("/nonexistent/config.json")));

        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    #[serial]
    fn https_proxy_reads_environment() {
        // SAFETY: serialized with other environment-dependent tests
        unsafe {
            std::env::set_var("HTTPS_PROXY", "http://proxy.internal:3128");
        }
        assert_eq!(https_proxy(), Some("http://proxy.internal:3128".to_string()));

        unsafe {
            std::env::remove_var("HTTPS_PROXY");
            std::env::remove_var("https_proxy");
        }
        assert_eq!(https_proxy(), None);
    }

    #[test]
    fn app_dir_with_env_uses_xdg_dir_when_set() {
        let path = app_dir_with_env(
            Some("/tmp/test-config".to_string()),
            Some(PathBuf::from("/home/user")),
            ".config",
        );

        assert_eq!(path, PathBuf::from("/tmp/test-config/image-tag-resolver"));
    }

    #[test]
    fn app_dir_with_env_falls_back_to_home_relative_dir() {
        let path = app_dir_with_env(None, Some(PathBuf::from("/home/user")), ".local/share");

        assert_eq!(path, PathBuf::from("/home/user/.local/share/image-tag-resolver"));
    }

    #[test]
    fn app_dir_with_env_falls_back_to_current_dir_when_no_dirs_available() {
        let path = app_dir_with_env(None, None, ".config");
        assert_eq!(path, PathBuf::from("./image-tag-resolver"));
    }
}
