//! Greedy, order-dependent admission of candidate packages.
//!
//! Registry lookups may run concurrently, but results are consumed in
//! discovery order and admission is decided one candidate at a time, so the
//! accepted set depends only on the candidate order and registry state.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use npm_registry::{lookup_package, RegistryError, RegistryQuery};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SafetyLimits;
use crate::imports::ImportCandidate;

/// Why a candidate was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RejectionReason {
    /// No version could be resolved (lookup failed, timed out, or had none).
    Unresolved { detail: String },
    /// Declared size exceeds the per-package cap.
    PackageTooLarge { size_bytes: u64, limit: u64 },
    /// Admitting the package would push the running total over the aggregate cap.
    TotalExceeded {
        size_bytes: u64,
        running_total: u64,
        limit: u64,
    },
}

/// Admission decision for one examined candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSafetyRecord {
    pub name: String,
    pub version: Option<String>,
    pub size_bytes: u64,
    pub accepted: bool,
    pub rejection: Option<RejectionReason>,
}

/// Every examined candidate, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub records: Vec<PackageSafetyRecord>,
}

impl Resolution {
    pub fn accepted(&self) -> impl Iterator<Item = &PackageSafetyRecord> {
        self.records.iter().filter(|r| r.accepted)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &PackageSafetyRecord> {
        self.records.iter().filter(|r| !r.accepted)
    }

    /// `(name, version)` of every accepted package.
    pub fn accepted_versions(&self) -> Vec<(String, String)> {
        self.accepted()
            .filter_map(|r| r.version.clone().map(|v| (r.name.clone(), v)))
            .collect()
    }

    pub fn accepted_bytes(&self) -> u64 {
        self.accepted().map(|r| r.size_bytes).sum()
    }
}

/// Validates and bounds a candidate set against registry metadata.
pub struct PackageSafetyResolver {
    registry: Arc<dyn RegistryQuery>,
    limits: SafetyLimits,
    timeout: Duration,
    concurrency: usize,
}

impl PackageSafetyResolver {
    pub fn new(registry: Arc<dyn RegistryQuery>, limits: SafetyLimits, timeout: Duration) -> Self {
        Self {
            registry,
            limits,
            timeout,
            concurrency: 1,
        }
    }

    /// Allow up to `n` registry lookups in flight. Admission order is unaffected.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub async fn resolve(&self, candidates: &[ImportCandidate]) -> Resolution {
        let examined = &candidates[..candidates.len().min(self.limits.max_packages)];

        let lookups: Vec<Result<npm_registry::PackageMetadata, RegistryError>> =
            stream::iter(examined)
                .map(|candidate| {
                    lookup_package(self.registry.as_ref(), &candidate.name, self.timeout)
                })
                .buffered(self.concurrency)
                .collect::<Vec<_>>()
                .boxed()
                .await;

        let mut running_total = 0u64;
        let mut records = Vec::with_capacity(examined.len());

        for (candidate, lookup) in examined.iter().zip(lookups) {
            let record = match lookup {
                Err(err) => rejected(&candidate.name, None, 0, RejectionReason::Unresolved {
                    detail: err.to_string(),
                }),
                Ok(meta) => {
                    let size = meta.size_bytes;
                    if size > self.limits.max_package_bytes {
                        rejected(&candidate.name, Some(meta.version), size, RejectionReason::PackageTooLarge {
                            size_bytes: size,
                            limit: self.limits.max_package_bytes,
                        })
                    } else if running_total.saturating_add(size) > self.limits.max_total_bytes {
                        rejected(&candidate.name, Some(meta.version), size, RejectionReason::TotalExceeded {
                            size_bytes: size,
                            running_total,
                            limit: self.limits.max_total_bytes,
                        })
                    } else {
                        running_total = running_total.saturating_add(size);
                        PackageSafetyRecord {
                            name: candidate.name.clone(),
                            version: Some(meta.version),
                            size_bytes: size,
                            accepted: true,
                            rejection: None,
                        }
                    }
                }
            };

            debug!(
                package = %record.name,
                accepted = record.accepted,
                size_bytes = record.size_bytes,
                "package admission decided"
            );
            records.push(record);
        }

        let resolution = Resolution { records };
        info!(
            examined = examined.len(),
            accepted = resolution.accepted().count(),
            accepted_bytes = resolution.accepted_bytes(),
            "dependency resolution finished"
        );
        resolution
    }
}

fn rejected(
    name: &str,
    version: Option<String>,
    size_bytes: u64,
    reason: RejectionReason,
) -> PackageSafetyRecord {
    PackageSafetyRecord {
        name: name.to_string(),
        version,
        size_bytes,
        accepted: false,
        rejection: Some(reason),
    }
}
