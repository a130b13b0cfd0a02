//! npm-registry: package metadata queries for HostBuddy
//!
//! Provides the metadata side of dependency admission: a narrow
//! [`RegistryQuery`] trait, an HTTP implementation against the public
//! registry API, and [`lookup_package`], which issues a narrow query first and
//! falls back to the full document, each call bounded by a timeout.
//!
//! ## Key Components
//!
//! - `RegistryQuery`: async capability returning raw metadata JSON
//! - `HttpRegistry`: reqwest-backed registry client
//! - `PackageMetadata`: version + declared size parsed from any document shape
//! - `fakes::StaticRegistry`: in-memory registry for tests

mod error;
pub mod fakes;
mod http;
mod metadata;
mod query;

pub use error::RegistryError;
pub use http::{HttpRegistry, HttpRegistryConfig, DEFAULT_REGISTRY_URL};
pub use metadata::PackageMetadata;
pub use query::{lookup_package, QueryShape, RegistryQuery};

/// Result type for npm-registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
