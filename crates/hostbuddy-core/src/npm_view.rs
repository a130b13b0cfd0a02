//! Registry metadata through the package manager's `view` command.
//!
//! Used when the host should honour the package manager's own registry,
//! proxy and auth configuration instead of talking HTTP directly.

use std::path::PathBuf;

use async_trait::async_trait;
use npm_registry::{QueryShape, RegistryError, RegistryQuery};
use serde_json::Value;

use crate::process::{run_command, CommandSpec};

/// `npm view <pkg> … --json` as a [`RegistryQuery`].
#[derive(Debug, Clone)]
pub struct NpmViewRegistry {
    program: String,
    cwd: PathBuf,
    registry_url: Option<String>,
    timeout_secs: u64,
}

impl NpmViewRegistry {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            cwd: cwd.into(),
            registry_url: None,
            timeout_secs,
        }
    }

    pub fn with_registry(mut self, registry_url: impl Into<String>) -> Self {
        self.registry_url = Some(registry_url.into());
        self
    }

    /// Argument vector for one query.
    pub fn command(&self, package: &str, shape: QueryShape) -> Vec<String> {
        let mut command = vec![self.program.clone(), "view".to_string(), package.to_string()];
        if shape == QueryShape::Narrow {
            command.extend(["version", "dist.unpackedSize", "dist.size"].map(String::from));
        }
        command.push("--json".to_string());
        if let Some(url) = &self.registry_url {
            command.push("--registry".to_string());
            command.push(url.clone());
        }
        command
    }
}

#[async_trait]
impl RegistryQuery for NpmViewRegistry {
    async fn query(&self, package: &str, shape: QueryShape) -> npm_registry::Result<Value> {
        let spec = CommandSpec::new(
            "npm_view",
            self.command(package, shape),
            &self.cwd,
            self.timeout_secs,
        )
        .env("npm_config_update_notifier", "false");

        let output = run_command(&spec)
            .await
            .map_err(|err| RegistryError::Command(err.to_string()))?;

        if !output.success {
            return Err(RegistryError::Command(format!(
                "npm view {package} exited with code {}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }
        if output.stdout.trim().is_empty() {
            return Err(RegistryError::NotFound(package.to_string()));
        }
        Ok(serde_json::from_str(output.stdout.trim())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_command_requests_only_admission_fields() {
        let registry = NpmViewRegistry::new("npm", "/tmp", 8);
        assert_eq!(
            registry.command("zustand", QueryShape::Narrow),
            vec!["npm", "view", "zustand", "version", "dist.unpackedSize", "dist.size", "--json"]
        );
    }

    #[test]
    fn test_full_command_with_registry() {
        let registry =
            NpmViewRegistry::new("npm", "/tmp", 8).with_registry("https://registry.example.com");
        assert_eq!(
            registry.command("@scope/pkg", QueryShape::Full),
            vec![
                "npm",
                "view",
                "@scope/pkg",
                "--json",
                "--registry",
                "https://registry.example.com"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_command_error() {
        let registry = NpmViewRegistry::new("hostbuddy-definitely-not-installed", ".", 2);
        let err = registry.query("react", QueryShape::Narrow).await.unwrap_err();
        assert!(matches!(err, RegistryError::Command(_)));
    }
}
