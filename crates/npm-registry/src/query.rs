//! Registry query trait and the bounded narrow→full lookup.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::RegistryError;
use crate::metadata::PackageMetadata;
use crate::Result;

/// Shape of a metadata query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryShape {
    /// Only the fields needed for admission (version and size).
    Narrow,
    /// The whole metadata document.
    Full,
}

impl QueryShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryShape::Narrow => "narrow",
            QueryShape::Full => "full",
        }
    }
}

/// A source of package metadata.
///
/// Implementations return the raw JSON document; interpretation happens in
/// [`PackageMetadata::from_value`].
#[async_trait]
pub trait RegistryQuery: Send + Sync {
    async fn query(&self, package: &str, shape: QueryShape) -> Result<Value>;
}

/// Look up a package: narrow query first, full query only if the narrow one
/// fails or yields something other than a JSON object.
///
/// Every individual call is bounded by `timeout`; an expired call counts as a
/// failed query.
pub async fn lookup_package(
    registry: &dyn RegistryQuery,
    package: &str,
    timeout: Duration,
) -> Result<PackageMetadata> {
    let meta = match bounded_query(registry, package, QueryShape::Narrow, timeout).await {
        Ok(value) if value.is_object() => value,
        Ok(_) => {
            debug!(package = %package, "narrow query returned a non-object, retrying with full query");
            bounded_query(registry, package, QueryShape::Full, timeout).await?
        }
        Err(err) => {
            debug!(package = %package, error = %err, "narrow query failed, retrying with full query");
            bounded_query(registry, package, QueryShape::Full, timeout).await?
        }
    };

    PackageMetadata::from_value(&meta).ok_or_else(|| RegistryError::NoVersion(package.to_string()))
}

async fn bounded_query(
    registry: &dyn RegistryQuery,
    package: &str,
    shape: QueryShape,
    timeout: Duration,
) -> Result<Value> {
    tokio::time::timeout(timeout, registry.query(package, shape))
        .await
        .map_err(|_| RegistryError::Timeout {
            package: package.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })?
}
