//! Dependency installation under strict safety flags.
//!
//! [`Installer`] is the narrow capability that talks to a package manager;
//! [`DependencyInstaller`] owns the lifecycle policy (fresh install for
//! ephemeral runs, cache-tolerant refresh for persistent ones).

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifact::PersistenceMode;
use crate::error::{HostBuddyError, Result};
use crate::process::{run_command, CommandSpec};
use crate::scaffold::ScaffoldedProject;

/// One package manager invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRequest {
    /// Directory holding the manifest.
    pub project_dir: PathBuf,
    /// Registry to install from.
    pub registry_url: String,
    /// Prefer cached tarballs over network fetches.
    pub prefer_offline: bool,
    /// Package manager cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Wall-clock bound.
    pub timeout_secs: u64,
}

/// What the package manager reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOutcome {
    pub success: bool,
    pub diagnostics: String,
}

/// Capability to install a manifest's dependencies.
///
/// Implementations must disable lifecycle scripts, install production
/// dependencies only, and never prompt.
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self, request: &InstallRequest) -> Result<InstallOutcome>;
}

/// `npm install` with lifecycle scripts disabled.
#[derive(Debug, Clone)]
pub struct NpmInstaller {
    program: String,
}

impl NpmInstaller {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Full argument vector for `request`.
    pub fn command(&self, request: &InstallRequest) -> Vec<String> {
        let mut command: Vec<String> = [
            self.program.as_str(),
            "install",
            "--ignore-scripts",
            "--omit=dev",
            "--no-audit",
            "--no-fund",
            "--no-progress",
            "--silent",
            "--registry",
            request.registry_url.as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if request.prefer_offline {
            command.push("--prefer-offline".to_string());
        }
        if let Some(cache) = &request.cache_dir {
            command.push("--cache".to_string());
            command.push(cache.to_string_lossy().to_string());
        }
        command
    }
}

impl Default for NpmInstaller {
    fn default() -> Self {
        Self::new("npm")
    }
}

#[async_trait]
impl Installer for NpmInstaller {
    async fn install(&self, request: &InstallRequest) -> Result<InstallOutcome> {
        let spec = CommandSpec::new(
            "npm_install",
            self.command(request),
            &request.project_dir,
            request.timeout_secs,
        )
        .env("npm_config_update_notifier", "false")
        .env("npm_config_yes", "true");

        let output = run_command(&spec).await?;
        Ok(InstallOutcome {
            success: output.success,
            diagnostics: output.diagnostics(),
        })
    }
}

/// How the install stage concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallReport {
    /// Dependencies installed from scratch.
    Installed,
    /// Existing cache refreshed successfully.
    Refreshed,
    /// Refresh failed; the existing cache is used as-is.
    ReusedCache { warning: String },
}

/// Install-stage policy on top of an [`Installer`].
pub struct DependencyInstaller<'a> {
    installer: &'a dyn Installer,
    registry_url: String,
    prefer_offline: bool,
    cache_dir: Option<PathBuf>,
    timeout_secs: u64,
}

impl<'a> DependencyInstaller<'a> {
    pub fn new(installer: &'a dyn Installer, registry_url: &str, timeout_secs: u64) -> Self {
        Self {
            installer,
            registry_url: registry_url.to_string(),
            prefer_offline: false,
            cache_dir: None,
            timeout_secs,
        }
    }

    pub fn with_cache(mut self, prefer_offline: bool, cache_dir: Option<PathBuf>) -> Self {
        self.prefer_offline = prefer_offline;
        self.cache_dir = cache_dir;
        self
    }

    /// Install dependencies for `project`.
    ///
    /// Ephemeral: any failure is fatal. Persistent: fatal only when no
    /// dependency cache existed before the attempt.
    pub async fn install(&self, project: &ScaffoldedProject) -> Result<InstallReport> {
        let request = InstallRequest {
            project_dir: project.root().to_path_buf(),
            registry_url: self.registry_url.clone(),
            prefer_offline: self.prefer_offline,
            cache_dir: self.cache_dir.clone(),
            timeout_secs: self.timeout_secs,
        };

        let had_cache =
            project.mode() == PersistenceMode::Persistent && project.has_dependency_cache();

        let failure = match self.installer.install(&request).await {
            Ok(outcome) if outcome.success => None,
            Ok(outcome) => Some(outcome.diagnostics),
            Err(err) => Some(err.to_string()),
        };

        match (failure, had_cache) {
            (None, false) => {
                info!(dir = %request.project_dir.display(), "dependencies installed");
                Ok(InstallReport::Installed)
            }
            (None, true) => {
                info!(dir = %request.project_dir.display(), "dependency cache refreshed");
                Ok(InstallReport::Refreshed)
            }
            (Some(reason), true) => {
                warn!(dir = %request.project_dir.display(), reason = %reason, "refresh failed, reusing dependency cache");
                Ok(InstallReport::ReusedCache { warning: reason })
            }
            (Some(reason), false) => Err(HostBuddyError::InstallFailed { reason }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeInstaller;

    fn request() -> InstallRequest {
        InstallRequest {
            project_dir: PathBuf::from("/tmp/hb-run-x"),
            registry_url: "https://registry.npmjs.org".to_string(),
            prefer_offline: false,
            cache_dir: None,
            timeout_secs: 180,
        }
    }

    #[test]
    fn test_npm_command_has_safety_flags() {
        let command = NpmInstaller::default().command(&request());
        assert_eq!(command[0], "npm");
        assert_eq!(command[1], "install");
        for flag in ["--ignore-scripts", "--omit=dev", "--no-audit", "--no-fund", "--silent"] {
            assert!(command.contains(&flag.to_string()), "missing {flag}");
        }
        let registry_at = command.iter().position(|a| a == "--registry").unwrap();
        assert_eq!(command[registry_at + 1], "https://registry.npmjs.org");
        assert!(!command.contains(&"--prefer-offline".to_string()));
    }

    #[test]
    fn test_npm_command_optional_cache_flags() {
        let mut req = request();
        req.prefer_offline = true;
        req.cache_dir = Some(PathBuf::from("/var/cache/npm"));
        let command = NpmInstaller::new("/usr/bin/npm").command(&req);
        assert_eq!(command[0], "/usr/bin/npm");
        assert!(command.contains(&"--prefer-offline".to_string()));
        assert_eq!(command[command.len() - 2..], ["--cache", "/var/cache/npm"]);
    }

    async fn scaffold(base: &std::path::Path, mode: PersistenceMode) -> ScaffoldedProject {
        crate::scaffold::ProjectScaffolder::new(base.join("runs"), base.join("offline"))
            .scaffold(
                &crate::artifact::ProjectId::new("demo").unwrap(),
                mode,
                "export default 1",
                &[],
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ephemeral_failure_is_fatal() {
        let base = tempfile::tempdir().unwrap();
        let project = scaffold(base.path(), PersistenceMode::Ephemeral).await;
        let fake = FakeInstaller::failing("npm ERR! 404");

        let err = DependencyInstaller::new(&fake, "https://r.example", 5)
            .install(&project)
            .await
            .unwrap_err();
        assert!(matches!(err, HostBuddyError::InstallFailed { ref reason } if reason.contains("404")));
    }

    #[tokio::test]
    async fn test_ephemeral_ignores_stray_cache() {
        let base = tempfile::tempdir().unwrap();
        let project = scaffold(base.path(), PersistenceMode::Ephemeral).await;
        std::fs::create_dir_all(project.dependency_cache()).unwrap();
        let fake = FakeInstaller::unavailable();

        let result = DependencyInstaller::new(&fake, "https://r.example", 5)
            .install(&project)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_persistent_policy_depends_on_existing_cache() {
        let base = tempfile::tempdir().unwrap();
        let project = scaffold(base.path(), PersistenceMode::Persistent).await;
        let failing = FakeInstaller::failing("offline");

        // No cache yet: fatal.
        assert!(DependencyInstaller::new(&failing, "https://r.example", 5)
            .install(&project)
            .await
            .is_err());

        // Cache in place: refresh failure is tolerated.
        let ok = FakeInstaller::succeeding();
        let first = DependencyInstaller::new(&ok, "https://r.example", 5)
            .install(&project)
            .await
            .unwrap();
        assert_eq!(first, InstallReport::Installed);

        let report = DependencyInstaller::new(&failing, "https://r.example", 5)
            .install(&project)
            .await
            .unwrap();
        assert_eq!(
            report,
            InstallReport::ReusedCache {
                warning: "offline".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_request_carries_cache_settings() {
        let base = tempfile::tempdir().unwrap();
        let project = scaffold(base.path(), PersistenceMode::Ephemeral).await;
        let fake = FakeInstaller::succeeding();

        DependencyInstaller::new(&fake, "https://r.example", 42)
            .with_cache(true, Some(PathBuf::from("/var/cache/npm")))
            .install(&project)
            .await
            .unwrap();

        let request = &fake.requests()[0];
        assert_eq!(request.project_dir, project.root());
        assert_eq!(request.registry_url, "https://r.example");
        assert!(request.prefer_offline);
        assert_eq!(request.timeout_secs, 42);
    }
}
