//! Sandbox: loading previews into an isolated rendering surface.
//!
//! Every run gets a freshly opened surface configured without a native
//! bridge. The success path loads the bundle's HTML shell; the fallback path
//! loads an inline document built from the raw source and cannot fail from
//! the caller's point of view.
//!
//! # Modules
//!
//! - [`surface`]: `RenderSurface`, `SurfaceFactory`, `SurfaceConfig`
//! - [`document`]: `ensure_document()` fallback synthesis

pub mod document;
pub mod surface;

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{error, info};
use uuid::Uuid;

use crate::bundler::BundleArtifact;
use crate::error::Result;
use crate::scaffold::ScaffoldedProject;

pub use document::ensure_document;
pub use surface::{RenderSurface, SurfaceConfig, SurfaceFactory};

/// What a session's surface was asked to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedResource {
    /// The bundle's HTML shell.
    Bundle {
        shell_path: PathBuf,
        bundle_path: PathBuf,
    },
    /// Inline fallback document.
    Fallback { document: String },
}

impl LoadedResource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, LoadedResource::Fallback { .. })
    }
}

/// A surface plus the resource it loaded. Never shared between runs.
pub struct ExecutionSession {
    id: Uuid,
    config: SurfaceConfig,
    surface: Option<Box<dyn RenderSurface>>,
    resource: LoadedResource,
    load_error: Option<String>,
    workspace: Option<TempDir>,
}

impl ExecutionSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn resource(&self) -> &LoadedResource {
        &self.resource
    }

    pub fn surface(&self) -> Option<&dyn RenderSurface> {
        self.surface.as_deref()
    }

    /// Error the surface reported while loading the fallback, if any.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Ephemeral scaffold directory kept alive for the session's lifetime.
    pub fn workspace(&self) -> Option<&std::path::Path> {
        self.workspace.as_ref().map(|t| t.path())
    }

    /// Detach the ephemeral workspace so it outlives the session.
    pub fn keep_workspace(&mut self) -> Option<PathBuf> {
        self.workspace.take().map(TempDir::keep)
    }
}

impl std::fmt::Debug for ExecutionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSession")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("resource", &self.resource)
            .field("has_surface", &self.surface.is_some())
            .field("load_error", &self.load_error)
            .finish()
    }
}

/// Opens surfaces and loads bundles or fallback documents into them.
#[derive(Clone)]
pub struct ExecutionSandbox {
    factory: Arc<dyn SurfaceFactory>,
    dev_tools: bool,
}

impl ExecutionSandbox {
    pub fn new(factory: Arc<dyn SurfaceFactory>) -> Self {
        Self {
            factory,
            dev_tools: true,
        }
    }

    pub fn with_dev_tools(mut self, enabled: bool) -> Self {
        self.dev_tools = enabled;
        self
    }

    fn config(&self, title: &str) -> SurfaceConfig {
        SurfaceConfig {
            dev_tools: self.dev_tools,
            ..SurfaceConfig::isolated(title)
        }
    }

    async fn open(&self, config: &SurfaceConfig) -> Result<Box<dyn RenderSurface>> {
        config.validate()?;
        self.factory.open(config).await
    }

    /// Success path: load the bundle's HTML shell.
    ///
    /// Takes ownership of the scaffold so an ephemeral directory lives exactly
    /// as long as the session that renders it.
    pub async fn load_bundle(
        &self,
        title: &str,
        mut project: ScaffoldedProject,
        artifact: &BundleArtifact,
    ) -> Result<ExecutionSession> {
        let config = self.config(title);
        let surface = self.open(&config).await?;
        let shell_path = project.shell_path();
        surface.load_file(&shell_path).await?;

        info!(shell = %shell_path.display(), "bundle loaded into surface");
        Ok(ExecutionSession {
            id: Uuid::new_v4(),
            config,
            surface: Some(surface),
            resource: LoadedResource::Bundle {
                shell_path,
                bundle_path: artifact.output_path.clone(),
            },
            load_error: None,
            workspace: project.take_temp_dir(),
        })
    }

    /// Fallback path: load the raw source as a document. Never fails; surface
    /// problems are recorded on the session instead.
    pub async fn load_fallback(&self, title: &str, raw: &str) -> ExecutionSession {
        let config = self.config(title);
        let document = ensure_document(raw);

        let (surface, load_error) = match self.open(&config).await {
            Ok(surface) => match surface.load_document(&document).await {
                Ok(()) => (Some(surface), None),
                Err(err) => (Some(surface), Some(err.to_string())),
            },
            Err(err) => (None, Some(err.to_string())),
        };

        match &load_error {
            Some(err) => error!(error = %err, "surface failed to load fallback document"),
            None => info!(bytes = document.len(), "fallback document loaded into surface"),
        }

        ExecutionSession {
            id: Uuid::new_v4(),
            config,
            surface,
            resource: LoadedResource::Fallback { document },
            load_error,
            workspace: None,
        }
    }
}
