//! The isolated rendering surface, supplied by the host.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{HostBuddyError, Result};

/// Isolation settings a surface is opened with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// Window or tab title.
    pub title: String,
    /// Expose host-native APIs to page scripts. Must stay off.
    pub native_bridge: bool,
    /// Run page scripts in an isolated context. Must stay on.
    pub context_isolation: bool,
    /// Run the renderer in the OS sandbox. Must stay on.
    pub sandboxed_renderer: bool,
    /// Enforce same-origin and content security defaults. Must stay on.
    pub web_security: bool,
    /// Allow developer tools.
    pub dev_tools: bool,
}

impl SurfaceConfig {
    /// Fully isolated configuration.
    pub fn isolated(title: &str) -> Self {
        Self {
            title: title.to_string(),
            native_bridge: false,
            context_isolation: true,
            sandboxed_renderer: true,
            web_security: true,
            dev_tools: true,
        }
    }

    /// Refuse any configuration that weakens isolation.
    pub fn validate(&self) -> Result<()> {
        let violation = if self.native_bridge {
            Some("native bridge enabled")
        } else if !self.context_isolation {
            Some("context isolation disabled")
        } else if !self.sandboxed_renderer {
            Some("renderer sandbox disabled")
        } else if !self.web_security {
            Some("web security disabled")
        } else {
            None
        };

        match violation {
            Some(v) => Err(HostBuddyError::Surface(format!("refusing surface: {v}"))),
            None => Ok(()),
        }
    }
}

/// A rendering surface instance. One per run.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Begin loading a local file (the bundle's HTML shell).
    async fn load_file(&self, path: &Path) -> Result<()>;

    /// Begin loading an inline document.
    async fn load_document(&self, html: &str) -> Result<()>;
}

/// Opens fresh surfaces.
#[async_trait]
pub trait SurfaceFactory: Send + Sync {
    async fn open(&self, config: &SurfaceConfig) -> Result<Box<dyn RenderSurface>>;
}
