//! In-memory registry fake (testing only)
//!
//! `StaticRegistry` answers from a fixed table and records every query so
//! tests can assert how many lookups were issued and in which shape.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::RegistryError;
use crate::query::{QueryShape, RegistryQuery};
use crate::Result;

#[derive(Debug, Clone)]
enum Entry {
    Document(Value),
    NarrowFails(Value),
    Hangs,
}

/// Registry backed by a `HashMap<package, document>`.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    calls: Mutex<Vec<(String, QueryShape)>>,
    offline: bool,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose every query fails, as if the network were down.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Register `package` at `version` with a declared unpacked size.
    pub fn with_package(self, package: &str, version: &str, size_bytes: u64) -> Self {
        self.with_document(
            package,
            json!({ "version": version, "dist.unpackedSize": size_bytes }),
        )
    }

    /// Register an arbitrary metadata document for `package`.
    pub fn with_document(self, package: &str, document: Value) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert(package.to_string(), Entry::Document(document));
        self
    }

    /// Register a package whose narrow query fails but whose full query
    /// returns `document`.
    pub fn with_narrow_failure(self, package: &str, document: Value) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert(package.to_string(), Entry::NarrowFails(document));
        self
    }

    /// Register a package whose queries never complete.
    pub fn with_hanging(self, package: &str) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert(package.to_string(), Entry::Hangs);
        self
    }

    /// Every query issued so far, in order.
    pub fn calls(&self) -> Vec<(String, QueryShape)> {
        self.calls.lock().unwrap().clone()
    }

    /// Distinct packages queried so far.
    pub fn queried_packages(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for (name, _) in self.calls() {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }
}

#[async_trait]
impl RegistryQuery for StaticRegistry {
    async fn query(&self, package: &str, shape: QueryShape) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((package.to_string(), shape));

        if self.offline {
            return Err(RegistryError::Http("registry unreachable".to_string()));
        }

        let entry = self.entries.lock().unwrap().get(package).cloned();
        match entry {
            None => Err(RegistryError::NotFound(package.to_string())),
            Some(Entry::Document(doc)) => Ok(doc),
            Some(Entry::NarrowFails(doc)) => match shape {
                QueryShape::Narrow => Err(RegistryError::Command(format!(
                    "narrow query unsupported for {package}"
                ))),
                QueryShape::Full => Ok(doc),
            },
            Some(Entry::Hangs) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(RegistryError::Http("unreachable".to_string()))
            }
        }
    }
}
