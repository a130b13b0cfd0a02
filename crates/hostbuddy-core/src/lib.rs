//! HostBuddy Core Library
//!
//! Runs untrusted front-end source through classification, dependency
//! admission, scaffolding, install and bundling, and renders the result in an
//! isolated surface. Every run ends in a render: stage failures fall back to
//! loading the raw source as a document.
//!
//! ## Key Components
//!
//! - `PipelineOrchestrator`: sequences stages and owns the fallback policy
//! - `ImportExtractor` / `PackageSafetyResolver`: bounded dependency discovery
//! - `ProjectScaffolder`, `DependencyInstaller`, `Bundler`: project build
//! - `ExecutionSandbox`: isolated surface loading
//! - `fakes`: in-memory capabilities for tests

pub mod artifact;
pub mod bundler;
pub mod classifier;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fakes;
pub mod imports;
pub mod installer;
pub mod lock;
pub mod npm_view;
pub mod obs;
pub mod pipeline;
pub mod process;
pub mod resolver;
pub mod sandbox;
pub mod scaffold;
pub mod telemetry;

pub use artifact::{PersistenceMode, ProjectId, SourceArtifact};
pub use bundler::{build_project, BundleArtifact, BundleRequest, Bundler, EsbuildBundler};
pub use classifier::{classify, classify_with_rule, ArtifactKind};
pub use config::{PipelineConfig, SafetyLimits};
pub use diagnostics::{DiagnosticRecord, DiagnosticsSink, JsonlDiagnostics, NullDiagnostics, Severity};
pub use error::{HostBuddyError, ProcessError, Result};
pub use imports::{ExtractionReport, IgnoreReason, IgnoredSpecifier, ImportCandidate, ImportExtractor};
pub use installer::{DependencyInstaller, InstallOutcome, InstallReport, InstallRequest, Installer, NpmInstaller};
pub use lock::{ProjectLock, ProjectLocks};
pub use npm_view::NpmViewRegistry;
pub use pipeline::{PipelineOrchestrator, PipelineServices, PipelineState, RunOutcome, RunReport};
pub use resolver::{PackageSafetyRecord, PackageSafetyResolver, RejectionReason, Resolution};
pub use sandbox::{
    ensure_document, ExecutionSandbox, ExecutionSession, LoadedResource, RenderSurface,
    SurfaceConfig, SurfaceFactory,
};
pub use scaffold::{ProjectScaffolder, ScaffoldedProject};

pub use npm_registry::{HttpRegistry, HttpRegistryConfig, QueryShape, RegistryQuery};

/// Crate version, reported by the CLI and in logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
