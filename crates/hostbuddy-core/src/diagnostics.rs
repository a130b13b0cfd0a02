//! Run diagnostics and the sinks they are persisted to.
//!
//! Every non-fatal report (ignored specifiers, rejected packages, tolerated
//! install failures) and every fatal stage failure becomes a
//! [`DiagnosticRecord`]. The orchestrator hands each record to an injected
//! [`DiagnosticsSink`] and also returns the full list in the run report.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::artifact::ProjectId;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One diagnostic emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub run_id: Uuid,
    pub project_id: ProjectId,
    /// Pipeline stage that produced the record, e.g. `extracting`.
    pub stage: String,
    pub severity: Severity,
    pub message: String,
    /// Structured payload (rejection reason, tool output, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticRecord {
    pub fn new(
        run_id: Uuid,
        project_id: &ProjectId,
        stage: &str,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            project_id: project_id.clone(),
            stage: stage.to_string(),
            severity,
            message: message.into(),
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Destination for diagnostic records.
#[async_trait]
pub trait DiagnosticsSink: Send + Sync {
    async fn record(&self, record: &DiagnosticRecord) -> Result<()>;
}

/// Appends records as JSON lines to a file, creating parent directories.
#[derive(Debug)]
pub struct JsonlDiagnostics {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlDiagnostics {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DiagnosticsSink for JsonlDiagnostics {
    async fn record(&self, record: &DiagnosticRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Drops every record. For callers that only want the run report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnostics;

#[async_trait]
impl DiagnosticsSink for NullDiagnostics {
    async fn record(&self, _record: &DiagnosticRecord) -> Result<()> {
        Ok(())
    }
}
