//! Build worker.
//!
//! Claims queued builds and drives each one to a terminal state: transition
//! to `running`, acquire a workspace, fetch source, resolve the pipeline
//! config, execute, finalize. Finalization is guaranteed on every path.

use gantry_core::{Build, BuildStatus, TestOutcome};
use gantry_store::BuildStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::executor::{ExecutionOutcome, PipelineExecutor};
use crate::lifecycle::Lifecycle;
use crate::workspace::{SourceFetcher, Workspace};
use crate::EngineResult;

const RECOVERY_SUMMARY: &str = "Error: build interrupted by orchestrator restart";

/// Processes queued builds one at a time.
pub struct Worker {
    lifecycle: Arc<Lifecycle>,
    executor: Arc<PipelineExecutor>,
    fetcher: Arc<dyn SourceFetcher>,
    store: Arc<dyn BuildStore>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        lifecycle: Arc<Lifecycle>,
        executor: Arc<PipelineExecutor>,
        fetcher: Arc<dyn SourceFetcher>,
        store: Arc<dyn BuildStore>,
    ) -> Self {
        Self {
            lifecycle,
            executor,
            fetcher,
            store,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Mark builds left in `running` by a previous process as `error`.
    ///
    /// Called once on startup, before the poll loop begins.
    pub async fn recover(&self) -> EngineResult<usize> {
        let swept = self.store.mark_running_as_error(RECOVERY_SUMMARY).await?;
        if !swept.is_empty() {
            warn!(count = swept.len(), "Marked interrupted builds as error");
        }
        Ok(swept.len())
    }

    /// Run the worker loop.
    pub async fn run(&self) {
        info!("Starting build worker");

        loop {
            match self.store.next_queued().await {
                Ok(Some(build)) => {
                    self.process(build).await;
                }
                Ok(None) => {
                    sleep(self.poll_interval).await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to poll for queued builds");
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    /// Run one build end to end and finalize it to a terminal state.
    pub async fn process(&self, build: Build) {
        let build_id = build.id;
        if let Err(e) = self.lifecycle.transition(build_id, BuildStatus::Running).await {
            warn!(build_id = %build_id, error = %e, "Skipping build that is no longer queued");
            return;
        }

        let outcome = self.execute(&build).await;
        let (status, summary) = match &outcome {
            Ok(outcome) if outcome.success => {
                let total = outcome.results.len();
                (BuildStatus::Success, format!("{}/{} suites passed", total, total))
            }
            Ok(outcome) => {
                let total = outcome.results.len();
                let failed = outcome
                    .results
                    .iter()
                    .filter(|r| r.outcome == TestOutcome::Failed)
                    .count();
                (
                    BuildStatus::Failure,
                    format!("{} of {} suites failed", failed, total),
                )
            }
            Err(e) => (BuildStatus::Error, format!("Error: {}", e)),
        };

        if let Err(e) = self.lifecycle.finalize(build_id, status, &summary).await {
            error!(build_id = %build_id, error = %e, "Failed to finalize build");
        }
    }

    /// Everything between `running` and the terminal transition. Any error
    /// here is an orchestration fault; the caller maps it to `error`.
    async fn execute(&self, build: &Build) -> EngineResult<ExecutionOutcome> {
        let workspace = Workspace::acquire(build.id)?;
        self.fetcher
            .fetch(workspace.path(), &build.branch, &build.revision)
            .await?;

        let config = gantry_config::resolve(workspace.path());
        self.executor
            .run(build.id, workspace.path(), &config)
            .await
        // Workspace is released when it drops, on success and failure alike.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandRunner, CommandStatus};
    use async_trait::async_trait;
    use gantry_store::MemoryBuildStore;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    struct ScriptedRunner {
        outcomes: HashMap<String, (bool, Duration)>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new() -> Self {
            Self {
                outcomes: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with(mut self, command: &str, success: bool, delay: Duration) -> Self {
            self.outcomes
                .insert(command.to_string(), (success, delay));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn run(
            &self,
            _image: &str,
            command: &str,
            _workspace: &Path,
        ) -> EngineResult<CommandStatus> {
            self.calls.lock().unwrap().push(command.to_string());
            let (success, delay) = self
                .outcomes
                .get(command)
                .copied()
                .unwrap_or((true, Duration::ZERO));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(CommandStatus {
                success,
                exit_code: Some(if success { 0 } else { 1 }),
            })
        }
    }

    /// Fetcher that installs fixture files into the workspace.
    struct FixtureFetcher {
        files: Vec<(String, String)>,
    }

    #[async_trait]
    impl SourceFetcher for FixtureFetcher {
        async fn fetch(
            &self,
            workspace: &Path,
            _branch: &str,
            _revision: &str,
        ) -> EngineResult<()> {
            for (name, contents) in &self.files {
                std::fs::write(workspace.join(name), contents)?;
            }
            Ok(())
        }
    }

    fn harness(
        runner: ScriptedRunner,
        fetcher: FixtureFetcher,
    ) -> (Arc<MemoryBuildStore>, Arc<Lifecycle>, Worker) {
        let store = Arc::new(MemoryBuildStore::new());
        let lifecycle = Arc::new(Lifecycle::new(store.clone()));
        let executor = Arc::new(PipelineExecutor::new(
            Arc::new(runner),
            store.clone(),
            4,
        ));
        let worker = Worker::new(
            lifecycle.clone(),
            executor,
            Arc::new(fetcher),
            store.clone(),
        );
        (store, lifecycle, worker)
    }

    fn two_suite_config() -> (String, String) {
        (
            "gantry.kdl".to_string(),
            r#"
            build {
                image "alpine"
                step "make build"
            }
            suite "unit" timeout=10 {
                run "make test-unit"
            }
            suite "integration" timeout=10 {
                run "make test-int"
            }
            "#
            .to_string(),
        )
    }

    #[tokio::test]
    async fn test_all_passing_build_finalizes_success() {
        let (store, lifecycle, worker) =
            harness(ScriptedRunner::new(), FixtureFetcher { files: vec![two_suite_config()] });
        let build = lifecycle.create("main", "abc123").await.unwrap();

        worker.process(build.clone()).await;

        let finished = store.get_build(build.id).await.unwrap();
        assert_eq!(finished.status, BuildStatus::Success);
        assert!(finished.duration_secs.is_some());
        assert_eq!(finished.summary.as_deref(), Some("2/2 suites passed"));
        assert_eq!(store.list_test_results(build.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_build_step_finalizes_error_with_no_results() {
        let runner = ScriptedRunner::new().with("make build", false, Duration::ZERO);
        let (store, lifecycle, worker) =
            harness(runner, FixtureFetcher { files: vec![two_suite_config()] });
        let build = lifecycle.create("main", "abc123").await.unwrap();

        worker.process(build.clone()).await;

        let finished = store.get_build(build.id).await.unwrap();
        assert_eq!(finished.status, BuildStatus::Error);
        let summary = finished.summary.unwrap();
        assert!(summary.starts_with("Error:"), "summary was {:?}", summary);
        assert!(summary.contains("make build"));
        assert!(store.list_test_results(build.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_suite_failure_finalizes_failure_with_all_results() {
        let runner = ScriptedRunner::new().with("make test-int", false, Duration::ZERO);
        let (store, lifecycle, worker) =
            harness(runner, FixtureFetcher { files: vec![two_suite_config()] });
        let build = lifecycle.create("main", "abc123").await.unwrap();

        worker.process(build.clone()).await;

        let finished = store.get_build(build.id).await.unwrap();
        assert_eq!(finished.status, BuildStatus::Failure);
        assert_eq!(finished.summary.as_deref(), Some("1 of 2 suites failed"));

        let results = store.list_test_results(build.id).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|r| r.outcome == TestOutcome::Passed));
        assert!(results.iter().any(|r| r.outcome == TestOutcome::Failed));
    }

    #[tokio::test]
    async fn test_suite_timeout_finalizes_failure_not_error() {
        let kdl = r#"
            build {
                image "alpine"
            }
            suite "slow" timeout=1 {
                run "make test-slow"
            }
        "#;
        let runner =
            ScriptedRunner::new().with("make test-slow", true, Duration::from_secs(5));
        let (store, lifecycle, worker) = harness(
            runner,
            FixtureFetcher {
                files: vec![("gantry.kdl".to_string(), kdl.to_string())],
            },
        );
        let build = lifecycle.create("main", "abc123").await.unwrap();

        worker.process(build.clone()).await;

        let finished = store.get_build(build.id).await.unwrap();
        assert_eq!(finished.status, BuildStatus::Failure);

        let results = store.list_test_results(build.id).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, TestOutcome::Failed);
        // Recorded execution time sits at the timeout bound.
        assert!(results[0].duration_secs >= 1.0);
        assert!(results[0].duration_secs < 2.0);
    }

    #[tokio::test]
    async fn test_malformed_config_falls_back_and_reaches_terminal_state() {
        let runner = ScriptedRunner::new();
        let (store, lifecycle, worker) = harness(
            runner,
            FixtureFetcher {
                files: vec![("gantry.kdl".to_string(), "build { image \"broken".to_string())],
            },
        );
        let build = lifecycle.create("main", "abc123").await.unwrap();

        worker.process(build.clone()).await;

        // Default config applied: two suites, everything scripted to pass.
        let finished = store.get_build(build.id).await.unwrap();
        assert_eq!(finished.status, BuildStatus::Success);
        assert_eq!(store.list_test_results(build.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_worker_ignores_build_no_longer_queued() {
        let runner = ScriptedRunner::new();
        let (store, lifecycle, worker) =
            harness(runner, FixtureFetcher { files: vec![] });
        let build = lifecycle.create("main", "abc123").await.unwrap();
        lifecycle
            .transition(build.id, BuildStatus::Running)
            .await
            .unwrap();
        lifecycle
            .finalize(build.id, BuildStatus::Success, "done")
            .await
            .unwrap();

        worker.process(build.clone()).await;

        let unchanged = store.get_build(build.id).await.unwrap();
        assert_eq!(unchanged.status, BuildStatus::Success);
        assert_eq!(unchanged.summary.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_recover_sweeps_stuck_running_builds() {
        let runner = ScriptedRunner::new();
        let (store, lifecycle, worker) =
            harness(runner, FixtureFetcher { files: vec![] });
        let stuck = lifecycle.create("main", "abc123").await.unwrap();
        lifecycle
            .transition(stuck.id, BuildStatus::Running)
            .await
            .unwrap();

        let swept = worker.recover().await.unwrap();
        assert_eq!(swept, 1);

        let finished = store.get_build(stuck.id).await.unwrap();
        assert_eq!(finished.status, BuildStatus::Error);
        assert!(finished.summary.unwrap().starts_with("Error:"));
    }
}
