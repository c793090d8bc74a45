//! Command execution seam.
//!
//! The executor talks to build steps and test suites only through
//! [`CommandRunner`]. Container backends plug in here; the default runner
//! executes commands as local processes.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tracing::debug;

use crate::EngineResult;

/// Exit information for one executed command.
#[derive(Debug, Clone, Copy)]
pub struct CommandStatus {
    pub success: bool,
    pub exit_code: Option<i32>,
}

/// Runs a single command against a prepared workspace.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Name of this runner.
    fn name(&self) -> &'static str;

    /// Execute `command` with `workspace` as the working directory.
    ///
    /// A non-zero exit is reported through [`CommandStatus`], not as an
    /// error; errors are reserved for failures to execute at all.
    async fn run(&self, image: &str, command: &str, workspace: &Path)
    -> EngineResult<CommandStatus>;
}

/// Runs commands as local `sh -c` processes on the host.
pub struct LocalProcessRunner;

#[async_trait]
impl CommandRunner for LocalProcessRunner {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn run(
        &self,
        image: &str,
        command: &str,
        workspace: &Path,
    ) -> EngineResult<CommandStatus> {
        // The image is a container concern; local execution runs on the host.
        debug!(image, command, workspace = %workspace.display(), "Spawning command");

        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let status = child.wait().await?;
        Ok(CommandStatus {
            success: status.success(),
            exit_code: status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_command_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        let runner = LocalProcessRunner;
        let status = runner.run("alpine", "true", dir.path()).await.unwrap();
        assert!(status.success);
        assert_eq!(status.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_failing_command_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = LocalProcessRunner;
        let status = runner.run("alpine", "exit 3", dir.path()).await.unwrap();
        assert!(!status.success);
        assert_eq!(status.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_command_runs_in_workspace_directory() {
        let dir = tempfile::tempdir().unwrap();
        let runner = LocalProcessRunner;
        runner
            .run("alpine", "echo marker > out.txt", dir.path())
            .await
            .unwrap();
        let contents = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(contents.trim(), "marker");
    }
}
