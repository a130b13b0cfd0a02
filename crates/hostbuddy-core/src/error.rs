//! Error taxonomy for the preview pipeline.
//!
//! Only the fatal kinds live here. Ignored specifiers and rejected packages are
//! not errors: they are reported as [`crate::imports::IgnoredSpecifier`] and
//! [`crate::resolver::RejectionReason`] and never stop a run.

/// Errors produced by the external-process layer.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("command {label} is empty")]
    EmptyCommand { label: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command {label} timed out after {timeout_secs} seconds")]
    Timeout { label: String, timeout_secs: u64 },

    #[error("io error while waiting for {label}: {source}")]
    Wait {
        label: String,
        #[source]
        source: std::io::Error,
    },
}

/// HostBuddy pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum HostBuddyError {
    #[error("invalid project id: {0:?}")]
    InvalidProjectId(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("dependency install failed: {reason}")]
    InstallFailed { reason: String },

    #[error("bundle build failed: {reason}")]
    BuildFailed { reason: String },

    #[error("render surface error: {0}")]
    Surface(String),

    #[error("could not lock project {project_id}: {reason}")]
    Lock { project_id: String, reason: String },

    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    #[error("registry error: {0}")]
    Registry(#[from] npm_registry::RegistryError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for HostBuddy operations.
pub type Result<T> = std::result::Result<T, HostBuddyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_failed_display() {
        let err = HostBuddyError::InstallFailed {
            reason: "npm exited with code 1".to_string(),
        };
        assert!(err.to_string().contains("dependency install failed"));
        assert!(err.to_string().contains("code 1"));
    }

    #[test]
    fn test_process_error_converts() {
        let err: HostBuddyError = ProcessError::Timeout {
            label: "esbuild".to_string(),
            timeout_secs: 120,
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("esbuild"));
        assert!(msg.contains("120"));
    }
}
