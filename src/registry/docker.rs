//! Docker Registry HTTP API v2 implementation

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use regex::Regex;
use reqwest::header::{ACCEPT, WWW_AUTHENTICATE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::config::DEFAULT_READ_TIMEOUT_MS;
use crate::registry::client::ImageRegistry;
use crate::registry::error::RegistryError;

const USER_AGENT: &str = "image-tag-resolver";

/// Page size requested from the tag listing endpoint
const TAGS_PAGE_SIZE: usize = 1000;

/// Manifest media types accepted when resolving digests, lists and indexes first
const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.oci.image.manifest.v1+json";

const DIGEST_HEADER: &str = "docker-content-digest";

static CHALLENGE_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("challenge pattern is valid"));

/// Response from the tag listing endpoint
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Response from a token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Username and password handed in by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Connection settings for [`DockerRegistry`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub read_timeout: Duration,
    pub https_proxy: Option<String>,
    pub credentials: Option<Credentials>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            https_proxy: None,
            credentials: None,
        }
    }
}

/// Bearer challenge from a `WWW-Authenticate` header
#[derive(Debug, Clone, PartialEq, Eq)]
struct BearerChallenge {
    realm: String,
    service: Option<String>,
    scope: Option<String>,
}

impl BearerChallenge {
    fn parse(header: &str) -> Option<Self> {
        let (scheme, params) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut values: HashMap<String, String> = CHALLENGE_PARAM_RE
            .captures_iter(params)
            .map(|c| (c[1].to_ascii_lowercase(), c[2].to_string()))
            .collect();

        Some(Self {
            realm: values.remove("realm")?,
            service: values.remove("service"),
            scope: values.remove("scope"),
        })
    }
}

/// Registry implementation for the Docker Registry HTTP API v2
pub struct DockerRegistry {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
    /// Bearer token obtained from the registry's auth endpoint
    bearer_token: Mutex<Option<String>>,
}

impl DockerRegistry {
    /// Creates a client for the registry at `base_url` (e.g., "https://ghcr.io")
    pub fn new(base_url: &str, options: ClientOptions) -> Result<Self, RegistryError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(options.read_timeout)
            .read_timeout(options.read_timeout);

        if let Some(proxy) = &options.https_proxy {
            debug!("Using HTTPS proxy {}", proxy);
            builder = builder.proxy(reqwest::Proxy::https(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: options.credentials,
            bearer_token: Mutex::new(None),
        })
    }

    fn cached_token(&self) -> Option<String> {
        self.bearer_token.lock().ok().and_then(|token| token.clone())
    }

    fn store_token(&self, token: String) {
        if let Ok(mut cached) = self.bearer_token.lock() {
            *cached = Some(token);
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = self.cached_token() {
            request.bearer_auth(token)
        } else if let Some(credentials) = &self.credentials {
            request.basic_auth(&credentials.username, Some(&credentials.password))
        } else {
            request
        }
    }

    /// Sends a request, answering one bearer challenge if the registry asks for it
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, RegistryError> {
        let response = self.authorize(build()).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(BearerChallenge::parse)
            .ok_or(RegistryError::Unauthorized)?;

        let token = self.fetch_token(&challenge).await?;
        self.store_token(token);

        let response = self.authorize(build()).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(RegistryError::Unauthorized);
        }
        Ok(response)
    }

    async fn fetch_token(&self, challenge: &BearerChallenge) -> Result<String, RegistryError> {
        let mut url = reqwest::Url::parse(&challenge.realm)
            .map_err(|e| RegistryError::InvalidResponse(format!("Invalid token realm: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(service) = &challenge.service {
                query.append_pair("service", service);
            }
            if let Some(scope) = &challenge.scope {
                query.append_pair("scope", scope);
            }
        }

        debug!("Requesting registry token from {}", url);

        let mut request = self.client.get(url.as_str());
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        let response = check_status(request.send().await?, url.as_str())?;

        let body: TokenResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse token response: {}", e);
            RegistryError::InvalidResponse(e.to_string())
        })?;

        body.token
            .or(body.access_token)
            .ok_or_else(|| RegistryError::InvalidResponse("Token response without token".into()))
    }
}

#[async_trait::async_trait]
impl ImageRegistry for DockerRegistry {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError> {
        let mut all_tags = Vec::new();
        let mut url = format!(
            "{}/v2/{}/tags/list?n={}",
            self.base_url, repository, TAGS_PAGE_SIZE
        );

        loop {
            debug!("Listing tags from: {}", url);

            let response = self.send(|| self.client.get(&url)).await?;
            let response = check_status(response, &url)?;

            let next_url = response
                .headers()
                .get("link")
                .and_then(|h| h.to_str().ok())
                .and_then(|link| parse_link_header(link, &self.base_url));

            let page: TagsResponse = response.json().await.map_err(|e| {
                warn!("Failed to parse tags response: {}", e);
                RegistryError::InvalidResponse(e.to_string())
            })?;

            all_tags.extend(page.tags.unwrap_or_default());

            match next_url {
                Some(next) => url = next,
                None => break,
            }
        }

        trace!("Found {} tags total", all_tags.len());
        Ok(all_tags)
    }

    async fn digest_of(
        &self,
        repository: &str,
        tag: &str,
    ) -> Result<Option<String>, RegistryError> {
        let url = format!("{}/v2/{}/manifests/{}", self.base_url, repository, tag);
        debug!("Fetching manifest digest from: {}", url);

        let response = self
            .send(|| self.client.head(&url).header(ACCEPT, MANIFEST_ACCEPT))
            .await?;
        let response = check_status(response, &url)?;

        let digest = response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if digest.is_none() {
            debug!("Registry did not report a digest for {}:{}", repository, tag);
        }
        Ok(digest)
    }
}

fn check_status(response: Response, url: &str) -> Result<Response, RegistryError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(RegistryError::Unauthorized),
        StatusCode::FORBIDDEN => Err(RegistryError::Forbidden),
        StatusCode::NOT_FOUND => Err(RegistryError::NotFound(url.to_string())),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            Err(RegistryError::RateLimited {
                retry_after_secs: retry_after,
            })
        }
        _ => {
            warn!("Registry returned status {}: {}", status, url);
            Err(RegistryError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }
}

/// Parse Link header for pagination
/// Format: </v2/repo/tags/list?n=100&last=tag>; rel="next"
fn parse_link_header(link: &str, base_url: &str) -> Option<String> {
    link.split(',')
        .map(str::trim)
        .filter(|part| part.contains("rel=\"next\""))
        .find_map(|part| {
            let start = part.find('<')?;
            let end = part.find('>')?;
            let url = part.get(start + 1..end)?;
            if url.starts_with('/') {
                Some(format!("{}{}", base_url, url))
            } else {
                Some(url.to_string())
            }
        })
}
