//! Error types for npm-registry

use thiserror::Error;

/// Errors that can occur while querying package metadata
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The registry has no such package
    #[error("Package not found: {0}")]
    NotFound(String),

    /// Metadata was returned but carried no usable version
    #[error("No resolvable version for {0}")]
    NoVersion(String),

    /// The registry answered with a non-success status
    #[error("Registry returned status {status} for {package}")]
    Status { package: String, status: u16 },

    /// Query did not complete within the allotted time
    #[error("Registry query for {package} timed out after {timeout_ms}ms")]
    Timeout { package: String, timeout_ms: u64 },

    /// Registry transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Query tool (e.g. `npm view`) failed
    #[error("Registry command failed: {0}")]
    Command(String),

    /// Response body was not valid JSON
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        RegistryError::Http(err.to_string())
    }
}
