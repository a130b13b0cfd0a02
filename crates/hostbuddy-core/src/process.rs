//! Time-bounded external command execution.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::error::ProcessError;

/// A command to run in a working directory with a wall-clock bound.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Human-readable label used in logs and errors.
    pub label: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Working directory.
    pub cwd: PathBuf,

    /// Extra environment variables.
    pub envs: Vec<(String, String)>,

    /// Timeout in seconds.
    pub timeout_secs: u64,
}

impl CommandSpec {
    pub fn new(label: &str, command: Vec<String>, cwd: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            label: label.to_string(),
            command,
            cwd: cwd.into(),
            envs: Vec::new(),
            timeout_secs,
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the process exited successfully.
    pub success: bool,
}

impl CommandOutput {
    /// Combined diagnostic text, stderr first.
    pub fn diagnostics(&self) -> String {
        match (self.stderr.trim(), self.stdout.trim()) {
            ("", out) => out.to_string(),
            (err, "") => err.to_string(),
            (err, out) => format!("{err}\n{out}"),
        }
    }
}

/// Run a command to completion, killing it if the timeout expires.
pub async fn run_command(spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
    let start = Instant::now();

    let (exe, args) = spec
        .command
        .split_first()
        .ok_or_else(|| ProcessError::EmptyCommand {
            label: spec.label.clone(),
        })?;

    debug!(label = %spec.label, cwd = %spec.cwd.display(), command = ?spec.command, "spawning command");

    let child = Command::new(exe)
        .args(args)
        .current_dir(&spec.cwd)
        .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: exe.clone(),
            source,
        })?;

    let output = tokio::time::timeout(
        Duration::from_secs(spec.timeout_secs),
        child.wait_with_output(),
    )
    .await
    .map_err(|_| ProcessError::Timeout {
        label: spec.label.clone(),
        timeout_secs: spec.timeout_secs,
    })?
    .map_err(|source| ProcessError::Wait {
        label: spec.label.clone(),
        source,
    })?;

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
        success: output.status.success(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_prefers_stderr() {
        let output = CommandOutput {
            exit_code: 1,
            stdout: "building\n".to_string(),
            stderr: "error: missing module\n".to_string(),
            duration_ms: 5,
            success: false,
        };
        assert_eq!(output.diagnostics(), "error: missing module\nbuilding");
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let spec = CommandSpec::new("empty", vec![], ".", 5);
        let err = run_command(&spec).await.unwrap_err();
        assert!(matches!(err, ProcessError::EmptyCommand { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_simple_command() {
        let spec = CommandSpec::new(
            "echo_test",
            vec!["echo".to_string(), "hello".to_string()],
            ".",
            60,
        );
        let output = run_command(&spec).await.expect("execute failed");
        assert!(output.success);
        assert_eq!(output.exit_code, 0);
        assert!(output.stdout.contains("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_failing_command() {
        let spec = CommandSpec::new("false_test", vec!["false".to_string()], ".", 60);
        let output = run_command(&spec).await.expect("execute failed");
        assert!(!output.success);
        assert_ne!(output.exit_code, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_times_out() {
        let spec = CommandSpec::new(
            "sleepy",
            vec!["sleep".to_string(), "5".to_string()],
            ".",
            1,
        );
        let err = run_command(&spec).await.unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { timeout_secs: 1, .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let spec = CommandSpec::new(
            "ghost",
            vec!["hostbuddy-definitely-not-installed".to_string()],
            ".",
            5,
        );
        let err = run_command(&spec).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
