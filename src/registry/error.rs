use thiserror::Error;

/// Registry call that produced an error; transient classification depends on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListTags,
    DigestOf,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Authentication failed")]
    Unauthorized,

    #[error("Access forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),
}

impl From<reqwest::Error> for RegistryError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            RegistryError::Timeout(error.to_string())
        } else if error.is_connect() || error.is_body() {
            RegistryError::Connection(error.to_string())
        } else {
            RegistryError::Network(error)
        }
    }
}

impl RegistryError {
    /// Errors worth another attempt. Registries sometimes 404 a manifest
    /// transiently, so not-found is retried for digest lookups only.
    pub fn is_transient(&self, operation: Operation) -> bool {
        match self {
            RegistryError::Timeout(_)
            | RegistryError::Connection(_)
            | RegistryError::RateLimited { .. } => true,
            RegistryError::Status { status, .. } => matches!(status, 500 | 502 | 503),
            RegistryError::NotFound(_) => operation == Operation::DigestOf,
            _ => false,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, RegistryError::Unauthorized | RegistryError::Forbidden)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RegistryError::Timeout(_))
    }
}
