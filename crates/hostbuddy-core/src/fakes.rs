//! In-memory fakes for the pipeline's external capabilities (testing only)
//!
//! Provides `FakeInstaller`, `FakeBundler`, `RecordingSurfaceFactory` and
//! `MemoryDiagnostics`. None of them spawn processes or touch the network;
//! the installer and bundler only create the files a real tool would leave
//! behind so the rest of the pipeline can observe them.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::bundler::{BundleArtifact, BundleRequest, Bundler};
use crate::diagnostics::{DiagnosticRecord, DiagnosticsSink};
use crate::error::{HostBuddyError, ProcessError, Result};
use crate::installer::{InstallOutcome, InstallRequest, Installer};
use crate::sandbox::{RenderSurface, SurfaceConfig, SurfaceFactory};
use crate::scaffold::DEPENDENCY_CACHE_DIR;

// ---------------------------------------------------------------------------
// FakeInstaller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum InstallBehavior {
    Succeed,
    Fail(String),
    Unavailable,
}

/// Installer that succeeds by creating `node_modules/` or fails on demand.
#[derive(Debug)]
pub struct FakeInstaller {
    behavior: InstallBehavior,
    requests: Mutex<Vec<InstallRequest>>,
}

impl FakeInstaller {
    /// Succeeds and leaves a dependency cache in the project directory.
    pub fn succeeding() -> Self {
        Self::with_behavior(InstallBehavior::Succeed)
    }

    /// Runs but reports failure with `diagnostics`.
    pub fn failing(diagnostics: &str) -> Self {
        Self::with_behavior(InstallBehavior::Fail(diagnostics.to_string()))
    }

    /// Cannot be started at all, as if the package manager were missing.
    pub fn unavailable() -> Self {
        Self::with_behavior(InstallBehavior::Unavailable)
    }

    fn with_behavior(behavior: InstallBehavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<InstallRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Installer for FakeInstaller {
    async fn install(&self, request: &InstallRequest) -> Result<InstallOutcome> {
        self.requests.lock().unwrap().push(request.clone());

        match &self.behavior {
            InstallBehavior::Succeed => {
                let marker = request.project_dir.join(DEPENDENCY_CACHE_DIR).join(".package-lock.json");
                tokio::fs::create_dir_all(request.project_dir.join(DEPENDENCY_CACHE_DIR)).await?;
                tokio::fs::write(marker, "{}").await?;
                Ok(InstallOutcome {
                    success: true,
                    diagnostics: String::new(),
                })
            }
            InstallBehavior::Fail(diagnostics) => Ok(InstallOutcome {
                success: false,
                diagnostics: diagnostics.clone(),
            }),
            InstallBehavior::Unavailable => Err(ProcessError::Spawn {
                program: "npm".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }
            .into()),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeBundler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum BundleBehavior {
    Succeed,
    Fail(String),
    NoOutput,
}

/// Bundler that writes a placeholder `bundle.js` or fails on demand.
#[derive(Debug)]
pub struct FakeBundler {
    behavior: BundleBehavior,
    requests: Mutex<Vec<BundleRequest>>,
}

impl FakeBundler {
    pub fn succeeding() -> Self {
        Self::with_behavior(BundleBehavior::Succeed)
    }

    /// Reports a failed build with `diagnostics`.
    pub fn failing(diagnostics: &str) -> Self {
        Self::with_behavior(BundleBehavior::Fail(diagnostics.to_string()))
    }

    /// Claims success without writing the output file.
    pub fn without_output() -> Self {
        Self::with_behavior(BundleBehavior::NoOutput)
    }

    fn with_behavior(behavior: BundleBehavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<BundleRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Bundler for FakeBundler {
    async fn bundle(&self, request: &BundleRequest) -> Result<BundleArtifact> {
        self.requests.lock().unwrap().push(request.clone());

        let (success, diagnostics) = match &self.behavior {
            BundleBehavior::Succeed => {
                tokio::fs::write(&request.output_path, "export {};\n").await?;
                (true, String::new())
            }
            BundleBehavior::Fail(diagnostics) => (false, diagnostics.clone()),
            BundleBehavior::NoOutput => (true, String::new()),
        };
        Ok(BundleArtifact {
            output_path: request.output_path.clone(),
            success,
            diagnostics,
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingSurfaceFactory
// ---------------------------------------------------------------------------

/// Something a recorded surface was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Opened { surface: usize, config: SurfaceConfig },
    LoadedFile { surface: usize, path: PathBuf },
    LoadedDocument { surface: usize, html: String },
}

#[derive(Debug, Default)]
struct SurfaceLog {
    events: Vec<SurfaceEvent>,
    opened: usize,
}

/// Surface factory that records every open and load.
#[derive(Debug, Default)]
pub struct RecordingSurfaceFactory {
    log: Arc<Mutex<SurfaceLog>>,
    fail_open: bool,
    fail_file_loads: bool,
    fail_document_loads: bool,
}

impl RecordingSurfaceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `open` fails.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Loading a file (the bundle shell) fails.
    pub fn failing_file_loads(mut self) -> Self {
        self.fail_file_loads = true;
        self
    }

    /// Loading an inline document fails.
    pub fn failing_document_loads(mut self) -> Self {
        self.fail_document_loads = true;
        self
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.log.lock().unwrap().events.clone()
    }

    /// Number of surfaces opened so far.
    pub fn opened(&self) -> usize {
        self.log.lock().unwrap().opened
    }

    /// Every inline document loaded, in order.
    pub fn documents(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SurfaceEvent::LoadedDocument { html, .. } => Some(html),
                _ => None,
            })
            .collect()
    }

    /// Every file loaded, in order.
    pub fn files(&self) -> Vec<PathBuf> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SurfaceEvent::LoadedFile { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SurfaceFactory for RecordingSurfaceFactory {
    async fn open(&self, config: &SurfaceConfig) -> Result<Box<dyn RenderSurface>> {
        if self.fail_open {
            return Err(HostBuddyError::Surface("surface unavailable".to_string()));
        }
        let mut log = self.log.lock().unwrap();
        let surface = log.opened;
        log.opened += 1;
        log.events.push(SurfaceEvent::Opened {
            surface,
            config: config.clone(),
        });
        Ok(Box::new(RecordingSurface {
            id: surface,
            log: self.log.clone(),
            fail_file_loads: self.fail_file_loads,
            fail_document_loads: self.fail_document_loads,
        }))
    }
}

struct RecordingSurface {
    id: usize,
    log: Arc<Mutex<SurfaceLog>>,
    fail_file_loads: bool,
    fail_document_loads: bool,
}

#[async_trait]
impl RenderSurface for RecordingSurface {
    async fn load_file(&self, path: &Path) -> Result<()> {
        if self.fail_file_loads {
            return Err(HostBuddyError::Surface(format!(
                "failed to load {}",
                path.display()
            )));
        }
        self.log.lock().unwrap().events.push(SurfaceEvent::LoadedFile {
            surface: self.id,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    async fn load_document(&self, html: &str) -> Result<()> {
        if self.fail_document_loads {
            return Err(HostBuddyError::Surface("document rejected".to_string()));
        }
        self.log.lock().unwrap().events.push(SurfaceEvent::LoadedDocument {
            surface: self.id,
            html: html.to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryDiagnostics
// ---------------------------------------------------------------------------

/// Diagnostics sink that keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    records: Mutex<Vec<DiagnosticRecord>>,
    failing: bool,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose writes always fail.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosticsSink for MemoryDiagnostics {
    async fn record(&self, record: &DiagnosticRecord) -> Result<()> {
        if self.failing {
            return Err(HostBuddyError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "diagnostics sink unavailable",
            )));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
