//! Per-build workspaces and the source materialization seam.

use async_trait::async_trait;
use gantry_core::BuildId;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

use crate::EngineResult;

/// An isolated filesystem workspace owned exclusively by one build.
///
/// The directory is created on acquisition and removed when the workspace is
/// dropped, so release is guaranteed on every exit path.
pub struct Workspace {
    build_id: BuildId,
    dir: TempDir,
}

impl Workspace {
    pub fn acquire(build_id: BuildId) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("gantry-build-").tempdir()?;
        debug!(build_id = %build_id, path = %dir.path().display(), "Workspace acquired");
        Ok(Self { build_id, dir })
    }

    pub fn build_id(&self) -> BuildId {
        self.build_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Materializes source content for a build into its workspace.
///
/// Actual source-control cloning lives behind this trait; the engine only
/// depends on the contract.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, workspace: &Path, branch: &str, revision: &str) -> EngineResult<()>;
}

/// Fetcher that prepares nothing beyond the workspace directory itself.
pub struct NoopFetcher;

#[async_trait]
impl SourceFetcher for NoopFetcher {
    async fn fetch(&self, workspace: &Path, branch: &str, revision: &str) -> EngineResult<()> {
        debug!(
            path = %workspace.display(),
            branch,
            revision,
            "No source fetcher configured, leaving workspace empty"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_directory_removed_on_drop() {
        let workspace = Workspace::acquire(BuildId::new()).unwrap();
        let path = workspace.path().to_path_buf();
        assert!(path.is_dir());

        std::fs::write(path.join("artifact.txt"), "data").unwrap();
        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn test_concurrent_builds_get_distinct_workspaces() {
        let a = Workspace::acquire(BuildId::new()).unwrap();
        let b = Workspace::acquire(BuildId::new()).unwrap();
        assert_ne!(a.path(), b.path());
    }
}
