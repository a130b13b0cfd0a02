//! Registry client over the public registry HTTP API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::RegistryError;
use crate::query::{QueryShape, RegistryQuery};
use crate::Result;

/// Default public registry.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// HTTP registry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpRegistryConfig {
    /// Registry base URL (no trailing slash needed)
    pub base_url: String,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for HttpRegistryConfig {
    fn default() -> Self {
        HttpRegistryConfig {
            base_url: DEFAULT_REGISTRY_URL.to_string(),
            user_agent: format!("hostbuddy-npm-registry/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpRegistryConfig {
    /// Config pointing at a specific registry
    pub fn new(base_url: &str) -> Self {
        HttpRegistryConfig {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }
}

/// Registry client issuing `GET /<pkg>/latest` (narrow) and `GET /<pkg>` (full).
pub struct HttpRegistry {
    config: HttpRegistryConfig,
    http_client: reqwest::Client,
}

impl HttpRegistry {
    /// Create a new registry client
    pub fn new(config: HttpRegistryConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(HttpRegistry {
            config,
            http_client,
        })
    }

    /// URL queried for `package` with the given shape.
    pub fn url_for(&self, package: &str, shape: QueryShape) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        // Scoped names are addressed as `@scope%2fname`.
        let encoded = package.replace('/', "%2f");
        match shape {
            QueryShape::Narrow => format!("{}/{}/latest", base, encoded),
            QueryShape::Full => format!("{}/{}", base, encoded),
        }
    }
}

#[async_trait]
impl RegistryQuery for HttpRegistry {
    async fn query(&self, package: &str, shape: QueryShape) -> Result<Value> {
        let url = self.url_for(package, shape);
        debug!(url = %url, shape = shape.as_str(), "Querying registry");

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RegistryError::NotFound(package.to_string())),
            status if !status.is_success() => Err(RegistryError::Status {
                package: package.to_string(),
                status: status.as_u16(),
            }),
            _ => Ok(response.json::<Value>().await?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_and_full_urls() {
        let registry = HttpRegistry::new(HttpRegistryConfig::new("https://r.example/")).unwrap();
        assert_eq!(
            registry.url_for("zustand", QueryShape::Narrow),
            "https://r.example/zustand/latest"
        );
        assert_eq!(
            registry.url_for("zustand", QueryShape::Full),
            "https://r.example/zustand"
        );
    }

    #[test]
    fn test_scoped_name_is_encoded() {
        let registry = HttpRegistry::new(HttpRegistryConfig::default()).unwrap();
        assert_eq!(
            registry.url_for("@tanstack/react-query", QueryShape::Full),
            "https://registry.npmjs.org/@tanstack%2freact-query"
        );
    }

    #[test]
    fn test_default_config() {
        let config = HttpRegistryConfig::default();
        assert_eq!(config.base_url, DEFAULT_REGISTRY_URL);
        assert!(config.user_agent.starts_with("hostbuddy-npm-registry/"));
    }
}
