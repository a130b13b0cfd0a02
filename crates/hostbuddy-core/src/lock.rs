//! Per-project mutual exclusion for persistent scaffolds.
//!
//! Two layers: an async mutex per project identity serializes runs inside the
//! process, and an exclusive OS lock on `<project dir>/.hostbuddy.lock`
//! serializes separate processes sharing the same base directory.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

use fs2::FileExt;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::artifact::ProjectId;
use crate::error::{HostBuddyError, Result};

/// File created inside each persistent project directory.
pub const LOCK_FILE: &str = ".hostbuddy.lock";

/// Registry of per-identity locks. Shared by every run in the process.
#[derive(Debug, Default)]
pub struct ProjectLocks {
    locks: Mutex<HashMap<ProjectId, Arc<AsyncMutex<()>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or create the mutex for `project_id`. Entries nobody holds or
    /// waits on are pruned first so the registry tracks only live identities.
    fn entry(&self, project_id: &ProjectId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(project_id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for exclusive access to `project_dir`, creating it if needed.
    ///
    /// The returned guard releases both layers on drop.
    pub async fn acquire(&self, project_id: &ProjectId, project_dir: &Path) -> Result<ProjectLock> {
        let local = self.entry(project_id).lock_owned().await;

        tokio::fs::create_dir_all(project_dir).await?;
        let lock_path = project_dir.join(LOCK_FILE);
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|err| lock_error(project_id, err))?
        .map_err(|err| lock_error(project_id, err))?;

        debug!(project_id = %project_id, dir = %project_dir.display(), "project lock acquired");
        Ok(ProjectLock {
            file,
            _local: local,
        })
    }
}

fn lock_error(project_id: &ProjectId, err: impl std::fmt::Display) -> HostBuddyError {
    HostBuddyError::Lock {
        project_id: project_id.to_string(),
        reason: err.to_string(),
    }
}

/// Held for the duration of a persistent run's scaffold, install and bundle.
pub struct ProjectLock {
    file: File,
    _local: OwnedMutexGuard<()>,
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_creates_dir_and_lock_file() {
        let base = tempfile::tempdir().unwrap();
        let dir = base.path().join("offline-runs").join("demo");
        let locks = ProjectLocks::new();

        let guard = locks
            .acquire(&ProjectId::new("demo").unwrap(), &dir)
            .await
            .unwrap();
        assert!(dir.join(LOCK_FILE).is_file());
        drop(guard);
    }

    #[tokio::test]
    async fn test_same_identity_serializes() {
        let base = tempfile::tempdir().unwrap();
        let dir = base.path().join("demo");
        let id = ProjectId::new("demo").unwrap();
        let locks = Arc::new(ProjectLocks::new());

        let first = locks.acquire(&id, &dir).await.unwrap();

        let contender = {
            let locks = locks.clone();
            let id = id.clone();
            let dir = dir.clone();
            tokio::spawn(async move { locks.acquire(&id, &dir).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(5), contender)
            .await
            .expect("second acquire should proceed after release")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_released_identities_are_pruned() {
        let base = tempfile::tempdir().unwrap();
        let locks = ProjectLocks::new();

        for name in ["p1", "p2", "p3"] {
            let guard = locks
                .acquire(&ProjectId::new(name).unwrap(), &base.path().join(name))
                .await
                .unwrap();
            drop(guard);
        }
        let held = locks
            .acquire(&ProjectId::new("p4").unwrap(), &base.path().join("p4"))
            .await
            .unwrap();

        let tracked: Vec<String> = locks
            .locks
            .lock()
            .unwrap()
            .keys()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(tracked, vec!["p4".to_string()]);
        drop(held);
    }

    #[tokio::test]
    async fn test_distinct_identities_do_not_block() {
        let base = tempfile::tempdir().unwrap();
        let locks = ProjectLocks::new();

        let _a = locks
            .acquire(&ProjectId::new("a").unwrap(), &base.path().join("a"))
            .await
            .unwrap();
        let b = tokio::time::timeout(
            Duration::from_secs(5),
            locks.acquire(&ProjectId::new("b").unwrap(), &base.path().join("b")),
        )
        .await;
        assert!(b.is_ok());
    }
}
