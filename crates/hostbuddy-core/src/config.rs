//! Pipeline configuration.
//!
//! Defaults match the admission caps and timeouts the pipeline was tuned with;
//! every field can be overridden through `HOSTBUDDY_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use npm_registry::DEFAULT_REGISTRY_URL;
use serde::{Deserialize, Serialize};

use crate::error::{HostBuddyError, Result};

/// Bounds on the dependency set admitted for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// Maximum number of candidate packages examined.
    pub max_packages: usize,
    /// Maximum declared size of any single accepted package.
    pub max_package_bytes: u64,
    /// Maximum summed declared size of all accepted packages.
    pub max_total_bytes: u64,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_packages: 20,
            max_package_bytes: 12 * 1024 * 1024,
            max_total_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Configuration shared by every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root for run directories, offline projects and logs.
    pub base_dir: PathBuf,
    /// Registry used for metadata queries and installs.
    pub registry_url: String,
    /// Package manager executable.
    pub npm_program: String,
    /// Bundler executable.
    pub esbuild_program: String,
    /// Optional package manager cache directory.
    pub npm_cache_dir: Option<PathBuf>,
    /// Prefer cached packages over network fetches during install.
    pub prefer_offline: bool,
    /// Dependency admission caps.
    pub limits: SafetyLimits,
    /// Per-call bound on registry metadata queries.
    pub registry_timeout_ms: u64,
    /// Concurrent registry lookups in flight during resolution.
    pub registry_concurrency: usize,
    /// Bound on one package manager invocation.
    pub install_timeout_secs: u64,
    /// Bound on one bundler invocation.
    pub bundle_timeout_secs: u64,
    /// Whether rendering surfaces expose developer tools.
    pub dev_tools: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir().join("HostBuddy"),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            npm_program: "npm".to_string(),
            esbuild_program: "esbuild".to_string(),
            npm_cache_dir: None,
            prefer_offline: false,
            limits: SafetyLimits::default(),
            registry_timeout_ms: 8_000,
            registry_concurrency: 4,
            install_timeout_secs: 180,
            bundle_timeout_secs: 120,
            dev_tools: true,
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by any `HOSTBUDDY_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("HOSTBUDDY_BASE_DIR") {
            config.base_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("HOSTBUDDY_REGISTRY_URL") {
            config.registry_url = url;
        }
        if let Ok(npm) = std::env::var("HOSTBUDDY_NPM") {
            config.npm_program = npm;
        }
        if let Ok(esbuild) = std::env::var("HOSTBUDDY_ESBUILD") {
            config.esbuild_program = esbuild;
        }
        if let Ok(cache) = std::env::var("HOSTBUDDY_NPM_CACHE") {
            config.npm_cache_dir = Some(PathBuf::from(cache));
        }
        if let Some(flag) = env_parse::<bool>("HOSTBUDDY_PREFER_OFFLINE")? {
            config.prefer_offline = flag;
        }
        if let Some(n) = env_parse("HOSTBUDDY_MAX_PACKAGES")? {
            config.limits.max_packages = n;
        }
        if let Some(n) = env_parse("HOSTBUDDY_MAX_PACKAGE_BYTES")? {
            config.limits.max_package_bytes = n;
        }
        if let Some(n) = env_parse("HOSTBUDDY_MAX_TOTAL_BYTES")? {
            config.limits.max_total_bytes = n;
        }
        if let Some(n) = env_parse("HOSTBUDDY_REGISTRY_TIMEOUT_MS")? {
            config.registry_timeout_ms = n;
        }
        if let Some(n) = env_parse("HOSTBUDDY_INSTALL_TIMEOUT_SECS")? {
            config.install_timeout_secs = n;
        }
        if let Some(n) = env_parse("HOSTBUDDY_BUNDLE_TIMEOUT_SECS")? {
            config.bundle_timeout_secs = n;
        }
        if let Some(flag) = env_parse::<bool>("HOSTBUDDY_DEV_TOOLS")? {
            config.dev_tools = flag;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would disable a bound.
    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("limits.max_packages", self.limits.max_packages as u64),
            ("limits.max_package_bytes", self.limits.max_package_bytes),
            ("limits.max_total_bytes", self.limits.max_total_bytes),
            ("registry_timeout_ms", self.registry_timeout_ms),
            ("registry_concurrency", self.registry_concurrency as u64),
            ("install_timeout_secs", self.install_timeout_secs),
            ("bundle_timeout_secs", self.bundle_timeout_secs),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        if let Some((field, _)) = zero {
            return Err(HostBuddyError::InvalidConfig(format!(
                "{field} must be greater than zero"
            )));
        }
        if self.registry_url.trim().is_empty() {
            return Err(HostBuddyError::InvalidConfig(
                "registry_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_base_dir(mut self, base_dir: impl AsRef<Path>) -> Self {
        self.base_dir = base_dir.as_ref().to_path_buf();
        self
    }

    /// Parent of the fresh per-run directories.
    pub fn ephemeral_root(&self) -> PathBuf {
        self.base_dir.join("react-runs")
    }

    /// Parent of the per-project persistent directories.
    pub fn persistent_root(&self) -> PathBuf {
        self.base_dir.join("offline-runs")
    }

    /// Diagnostics log location.
    pub fn diagnostics_path(&self) -> PathBuf {
        self.base_dir.join("logs").join("diagnostics.jsonl")
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_millis(self.registry_timeout_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| HostBuddyError::InvalidConfig(format!("{key}={raw:?} is not valid"))),
        Err(_) => Ok(None),
    }
}
