//! Materializes a buildable project directory from source + accepted deps.
//!
//! Layout of a scaffold:
//!
//! ```text
//! <root>/
//!   package.json        baseline + accepted dependencies
//!   index.html          shell loading ./bundle.js into #root
//!   App.tsx             the submitted source, alias imports rewritten
//!   index.tsx           bootstrap: styling runtime + mount
//!   components/ui/*.tsx only when the source uses the UI-kit alias
//!   node_modules/       installed later; never touched here
//! ```

pub mod stubs;
pub mod templates;

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::artifact::{PersistenceMode, ProjectId};
use crate::error::Result;

pub use templates::{
    baseline_names, Manifest, BASELINE_DEPENDENCIES, BOOTSTRAP_FILE, BUNDLE_FILE,
    DEPENDENCY_CACHE_DIR, ENTRY_FILE, MANIFEST_FILE, SHELL_FILE,
};

/// A generated project directory.
///
/// Ephemeral scaffolds own their temporary directory; it is removed when the
/// scaffold (or whatever it was moved into) is dropped.
#[derive(Debug)]
pub struct ScaffoldedProject {
    root: PathBuf,
    mode: PersistenceMode,
    manifest: Manifest,
    has_stubs: bool,
    temp: Option<TempDir>,
}

impl ScaffoldedProject {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> PersistenceMode {
        self.mode
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn has_stubs(&self) -> bool {
        self.has_stubs
    }

    pub fn shell_path(&self) -> PathBuf {
        self.root.join(SHELL_FILE)
    }

    pub fn bootstrap_path(&self) -> PathBuf {
        self.root.join(BOOTSTRAP_FILE)
    }

    pub fn bundle_path(&self) -> PathBuf {
        self.root.join(BUNDLE_FILE)
    }

    pub fn dependency_cache(&self) -> PathBuf {
        self.root.join(DEPENDENCY_CACHE_DIR)
    }

    pub fn has_dependency_cache(&self) -> bool {
        self.dependency_cache().is_dir()
    }

    /// Hand over the temporary directory guard, if any.
    pub fn take_temp_dir(&mut self) -> Option<TempDir> {
        self.temp.take()
    }
}

/// Writes scaffolds under the configured roots.
#[derive(Debug, Clone)]
pub struct ProjectScaffolder {
    ephemeral_root: PathBuf,
    persistent_root: PathBuf,
}

impl ProjectScaffolder {
    pub fn new(ephemeral_root: impl Into<PathBuf>, persistent_root: impl Into<PathBuf>) -> Self {
        Self {
            ephemeral_root: ephemeral_root.into(),
            persistent_root: persistent_root.into(),
        }
    }

    /// Directory a persistent project lives in.
    pub fn persistent_dir(&self, project_id: &ProjectId) -> PathBuf {
        self.persistent_root.join(project_id.as_str())
    }

    /// Scaffold `source` with the accepted `(name, version)` dependencies.
    ///
    /// Persistent scaffolds must be written while holding the project lock.
    pub async fn scaffold(
        &self,
        project_id: &ProjectId,
        mode: PersistenceMode,
        source: &str,
        accepted: &[(String, String)],
    ) -> Result<ScaffoldedProject> {
        let (root, temp) = match mode {
            PersistenceMode::Ephemeral => {
                tokio::fs::create_dir_all(&self.ephemeral_root).await?;
                let temp = tempfile::Builder::new()
                    .prefix("hb-run-")
                    .tempdir_in(&self.ephemeral_root)?;
                (temp.path().to_path_buf(), Some(temp))
            }
            PersistenceMode::Persistent => {
                let root = self.persistent_dir(project_id);
                tokio::fs::create_dir_all(&root).await?;
                (root, None)
            }
        };

        let manifest = Manifest::with_accepted(accepted);
        write_file(&root, MANIFEST_FILE, &manifest.to_json()?).await?;
        write_file(&root, SHELL_FILE, &templates::html_shell()).await?;
        write_file(&root, ENTRY_FILE, &templates::rewrite_alias_imports(source)).await?;
        write_file(&root, BOOTSTRAP_FILE, &templates::bootstrap_module()).await?;

        let has_stubs = stubs::references_ui_kit(source);
        if has_stubs {
            let ui_dir = root.join(stubs::UI_KIT_DIR);
            tokio::fs::create_dir_all(&ui_dir).await?;
            for (file, contents) in stubs::ui_kit_stubs() {
                write_file(&ui_dir, file, &contents).await?;
            }
            debug!(dir = %ui_dir.display(), "wrote UI-kit stubs");
        }

        info!(
            project_id = %project_id,
            mode = mode.as_str(),
            root = %root.display(),
            dependencies = manifest.dependencies.len(),
            "scaffold written"
        );

        Ok(ScaffoldedProject {
            root,
            mode,
            manifest,
            has_stubs,
            temp,
        })
    }
}

async fn write_file(dir: &Path, name: &str, contents: &str) -> Result<()> {
    tokio::fs::write(dir.join(name), contents).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaffolder(base: &Path) -> ProjectScaffolder {
        ProjectScaffolder::new(base.join("react-runs"), base.join("offline-runs"))
    }

    #[tokio::test]
    async fn test_ephemeral_scaffold_is_fresh_and_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let id = ProjectId::new("demo").unwrap();
        let s = scaffolder(base.path());

        let first = s
            .scaffold(&id, PersistenceMode::Ephemeral, "export default () => null", &[])
            .await
            .unwrap();
        let second = s
            .scaffold(&id, PersistenceMode::Ephemeral, "export default () => null", &[])
            .await
            .unwrap();

        assert_ne!(first.root(), second.root());
        assert!(first
            .root()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("hb-run-"));
        for file in [MANIFEST_FILE, SHELL_FILE, ENTRY_FILE, BOOTSTRAP_FILE] {
            assert!(first.root().join(file).is_file(), "{file} missing");
        }

        let root = first.root().to_path_buf();
        drop(first);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_persistent_scaffold_preserves_dependency_cache() {
        let base = tempfile::tempdir().unwrap();
        let id = ProjectId::new("offline-1").unwrap();
        let s = scaffolder(base.path());

        let project = s
            .scaffold(&id, PersistenceMode::Persistent, "export default 1", &[])
            .await
            .unwrap();
        assert_eq!(project.root(), base.path().join("offline-runs").join("offline-1"));

        let marker = project.dependency_cache().join("react").join("package.json");
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, "{}").unwrap();

        let again = s
            .scaffold(&id, PersistenceMode::Persistent, "export default 2", &[])
            .await
            .unwrap();
        assert!(marker.is_file());
        assert!(again.has_dependency_cache());
        let entry = std::fs::read_to_string(again.root().join(ENTRY_FILE)).unwrap();
        assert_eq!(entry, "export default 2");

        drop(again);
        assert!(base.path().join("offline-runs").join("offline-1").is_dir());
    }

    #[tokio::test]
    async fn test_stubs_only_when_ui_kit_referenced() {
        let base = tempfile::tempdir().unwrap();
        let id = ProjectId::new("demo").unwrap();
        let s = scaffolder(base.path());

        let plain = s
            .scaffold(&id, PersistenceMode::Ephemeral, "export default () => null", &[])
            .await
            .unwrap();
        assert!(!plain.has_stubs());
        assert!(!plain.root().join("components").exists());

        let src = "import { Button } from '@/components/ui/button';\nexport default () => <Button/>;";
        let kit = s
            .scaffold(&id, PersistenceMode::Ephemeral, src, &[])
            .await
            .unwrap();
        assert!(kit.has_stubs());
        assert!(kit.root().join("components/ui/button.tsx").is_file());
        let entry = std::fs::read_to_string(kit.root().join(ENTRY_FILE)).unwrap();
        assert!(entry.contains("from './components/ui/button'"));
    }

    #[tokio::test]
    async fn test_manifest_written_with_accepted_deps() {
        let base = tempfile::tempdir().unwrap();
        let id = ProjectId::new("demo").unwrap();
        let project = scaffolder(base.path())
            .scaffold(
                &id,
                PersistenceMode::Ephemeral,
                "export default 1",
                &[("dayjs".to_string(), "1.11.10".to_string())],
            )
            .await
            .unwrap();

        let raw = std::fs::read_to_string(project.root().join(MANIFEST_FILE)).unwrap();
        let manifest: Manifest = serde_json::from_str(&raw).unwrap();
        assert_eq!(manifest.dependencies["dayjs"], "^1.11.10");
        assert_eq!(&manifest, project.manifest());
    }
}
