//! Compiling the scaffold's bootstrap into one browser-runnable ES module.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HostBuddyError, Result};
use crate::process::{run_command, CommandSpec};
use crate::scaffold::ScaffoldedProject;

/// Extensions tried, in order, when resolving extensionless imports.
pub const RESOLVE_EXTENSIONS: &[&str] = &[".tsx", ".ts", ".jsx", ".js", ".json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Browser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleFormat {
    Esm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsxTransform {
    Automatic,
}

/// One bundler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRequest {
    pub working_dir: PathBuf,
    pub entry_path: PathBuf,
    pub output_path: PathBuf,
    pub platform: Platform,
    pub format: ModuleFormat,
    pub jsx: JsxTransform,
    /// File extension → loader name.
    pub loaders: BTreeMap<String, String>,
    /// Import prefix → replacement path.
    pub aliases: BTreeMap<String, String>,
    /// Identifier → replacement expression.
    pub defines: BTreeMap<String, String>,
    pub resolve_extensions: Vec<String>,
    pub timeout_secs: u64,
}

impl BundleRequest {
    /// The standard request for a scaffold: `index.tsx` → `bundle.js`, UI-kit
    /// alias mapped to the scaffold root, production runtime mode.
    pub fn for_project(project: &ScaffoldedProject, timeout_secs: u64) -> Self {
        let map = |pairs: &[(&str, &str)]| -> BTreeMap<String, String> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };

        Self {
            working_dir: project.root().to_path_buf(),
            entry_path: project.bootstrap_path(),
            output_path: project.bundle_path(),
            platform: Platform::Browser,
            format: ModuleFormat::Esm,
            jsx: JsxTransform::Automatic,
            loaders: map(&[(".ts", "ts"), (".tsx", "tsx")]),
            aliases: map(&[("@", ".")]),
            defines: map(&[("process.env.NODE_ENV", "\"production\"")]),
            resolve_extensions: RESOLVE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            timeout_secs,
        }
    }
}

/// Compiled output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleArtifact {
    pub output_path: PathBuf,
    pub success: bool,
    pub diagnostics: String,
}

/// Capability to compile a bundle request.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn bundle(&self, request: &BundleRequest) -> Result<BundleArtifact>;
}

/// The `esbuild` command-line bundler.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    program: String,
}

impl EsbuildBundler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Full argument vector for `request`.
    pub fn command(&self, request: &BundleRequest) -> Vec<String> {
        let mut command = vec![
            self.program.clone(),
            request.entry_path.to_string_lossy().to_string(),
            "--bundle".to_string(),
            format!("--outfile={}", request.output_path.to_string_lossy()),
            format!(
                "--platform={}",
                match request.platform {
                    Platform::Browser => "browser",
                }
            ),
            format!(
                "--format={}",
                match request.format {
                    ModuleFormat::Esm => "esm",
                }
            ),
            format!(
                "--jsx={}",
                match request.jsx {
                    JsxTransform::Automatic => "automatic",
                }
            ),
            "--log-level=error".to_string(),
            format!("--resolve-extensions={}", request.resolve_extensions.join(",")),
        ];
        command.extend(request.loaders.iter().map(|(ext, loader)| format!("--loader:{ext}={loader}")));
        command.extend(request.aliases.iter().map(|(from, to)| format!("--alias:{from}={to}")));
        command.extend(request.defines.iter().map(|(key, value)| format!("--define:{key}={value}")));
        command
    }
}

impl Default for EsbuildBundler {
    fn default() -> Self {
        Self::new("esbuild")
    }
}

#[async_trait]
impl Bundler for EsbuildBundler {
    async fn bundle(&self, request: &BundleRequest) -> Result<BundleArtifact> {
        let spec = CommandSpec::new(
            "esbuild",
            self.command(request),
            &request.working_dir,
            request.timeout_secs,
        );
        let output = run_command(&spec).await?;
        Ok(BundleArtifact {
            output_path: request.output_path.clone(),
            success: output.success,
            diagnostics: output.diagnostics(),
        })
    }
}

/// Bundle `project`; any unsuccessful build is a `BuildFailed` error.
pub async fn build_project(
    bundler: &dyn Bundler,
    project: &ScaffoldedProject,
    timeout_secs: u64,
) -> Result<BundleArtifact> {
    let request = BundleRequest::for_project(project, timeout_secs);
    let artifact = bundler.bundle(&request).await.map_err(|err| match err {
        HostBuddyError::BuildFailed { .. } => err,
        other => HostBuddyError::BuildFailed {
            reason: other.to_string(),
        },
    })?;

    if !artifact.success {
        return Err(HostBuddyError::BuildFailed {
            reason: artifact.diagnostics,
        });
    }
    if !artifact.output_path.is_file() {
        return Err(HostBuddyError::BuildFailed {
            reason: format!("bundler produced no output at {}", artifact.output_path.display()),
        });
    }

    info!(output = %artifact.output_path.display(), "bundle built");
    Ok(artifact)
}
