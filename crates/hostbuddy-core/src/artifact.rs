//! The untrusted source submitted for preview.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{HostBuddyError, Result};

/// How the scaffolded project outlives a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    /// Fresh directory per run, removed with the session.
    Ephemeral,
    /// Directory keyed by project identity, reused across runs (offline mode).
    Persistent,
}

impl PersistenceMode {
    pub fn from_offline_flag(offline: bool) -> Self {
        if offline {
            PersistenceMode::Persistent
        } else {
            PersistenceMode::Ephemeral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PersistenceMode::Ephemeral => "ephemeral",
            PersistenceMode::Persistent => "persistent",
        }
    }
}

/// Project identity, usable as a single directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// Validate a project identity.
    ///
    /// Identities become directory names under the offline-runs root, so only
    /// `[A-Za-z0-9_-]` and interior dots are accepted.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let valid_chars = id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if id.is_empty() || id.len() > 128 || !valid_chars || id.starts_with('.') {
            return Err(HostBuddyError::InvalidProjectId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ProjectId {
    type Error = HostBuddyError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

/// Raw source text plus identity. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceArtifact {
    project_id: ProjectId,
    mode: PersistenceMode,
    text: String,
}

impl SourceArtifact {
    pub fn new(project_id: ProjectId, mode: PersistenceMode, text: impl Into<String>) -> Self {
        Self {
            project_id,
            mode,
            text: text.into(),
        }
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn mode(&self) -> PersistenceMode {
        self.mode
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// SHA-256 of the source text, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_id_accepts_uuid_and_slug() {
        assert!(ProjectId::new("3f1c2a9e-0b7d-4c55-9a61-2f0e8d4b7c10").is_ok());
        assert!(ProjectId::new("p_k2j3h4.v2").is_ok());
    }

    #[test]
    fn test_project_id_rejects_path_tricks() {
        for bad in ["", "..", ".hidden", "a/b", "a\\b", "with space", "C:"] {
            assert!(ProjectId::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_project_id_deserialize_validates() {
        let ok: ProjectId = serde_json::from_str("\"demo\"").unwrap();
        assert_eq!(ok.as_str(), "demo");
        assert!(serde_json::from_str::<ProjectId>("\"../etc\"").is_err());
    }

    #[test]
    fn test_digest_is_stable_and_content_sensitive() {
        let id = ProjectId::new("demo").unwrap();
        let a = SourceArtifact::new(id.clone(), PersistenceMode::Ephemeral, "<p>hi</p>");
        let b = SourceArtifact::new(id.clone(), PersistenceMode::Persistent, "<p>hi</p>");
        let c = SourceArtifact::new(id, PersistenceMode::Ephemeral, "<p>bye</p>");
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_mode_from_offline_flag() {
        assert_eq!(
            PersistenceMode::from_offline_flag(true),
            PersistenceMode::Persistent
        );
        assert_eq!(
            PersistenceMode::from_offline_flag(false).as_str(),
            "ephemeral"
        );
    }
}
