//! A rendering surface that writes previews to disk.
//!
//! The CLI has no window of its own. Bundle shells are reported by path and
//! inline documents are written next to them, so any browser can open the
//! result.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hostbuddy_core::{HostBuddyError, RenderSurface, Result, SurfaceConfig, SurfaceFactory};
use tracing::info;
use uuid::Uuid;

/// Where the last surface pointed.
#[derive(Debug, Clone, Default)]
pub struct PreviewLog {
    entries: Arc<Mutex<Vec<PathBuf>>>,
}

impl PreviewLog {
    pub fn last(&self) -> Option<PathBuf> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    fn push(&self, path: PathBuf) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path);
    }
}

/// Opens [`FileSurface`]s writing into `out_dir`.
#[derive(Debug, Clone)]
pub struct FileSurfaceFactory {
    out_dir: PathBuf,
    log: PreviewLog,
}

impl FileSurfaceFactory {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            log: PreviewLog::default(),
        }
    }

    pub fn log(&self) -> PreviewLog {
        self.log.clone()
    }
}

#[async_trait]
impl SurfaceFactory for FileSurfaceFactory {
    async fn open(&self, config: &SurfaceConfig) -> Result<Box<dyn RenderSurface>> {
        config.validate()?;
        Ok(Box::new(FileSurface {
            id: Uuid::new_v4(),
            out_dir: self.out_dir.clone(),
            log: self.log.clone(),
        }))
    }
}

struct FileSurface {
    id: Uuid,
    out_dir: PathBuf,
    log: PreviewLog,
}

#[async_trait]
impl RenderSurface for FileSurface {
    async fn load_file(&self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(HostBuddyError::Surface(format!(
                "no such file: {}",
                path.display()
            )));
        }
        info!(surface = %self.id, path = %path.display(), "preview ready");
        self.log.push(path.to_path_buf());
        Ok(())
    }

    async fn load_document(&self, html: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.out_dir).await?;
        let path = self.out_dir.join(format!("preview-{}.html", self.id));
        tokio::fs::write(&path, html).await?;
        info!(surface = %self.id, path = %path.display(), "preview document written");
        self.log.push(path);
        Ok(())
    }
}
