//! Pipeline executor.
//!
//! Turns a resolved [`PipelineConfig`] into ordered build steps followed by
//! concurrent test suites. Build steps are fail-fast; suite failures are
//! partial failures that never abort sibling suites.

use gantry_config::{PipelineConfig, SuiteConfig};
use gantry_core::{BuildId, TestOutcome, TestResult};
use gantry_store::BuildStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::runner::CommandRunner;
use crate::{EngineError, EngineResult};

/// Aggregate of one pipeline execution: every suite result plus the overall
/// pass/fail flag.
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// True iff every suite passed (vacuously true with no suites).
    pub success: bool,
    /// All suite results, in completion order.
    pub results: Vec<TestResult>,
}

/// Executes pipelines against prepared workspaces.
///
/// Suites from all builds share one bounded worker pool, capping total suite
/// concurrency system-wide.
pub struct PipelineExecutor {
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn BuildStore>,
    pool: Arc<Semaphore>,
}

impl PipelineExecutor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn BuildStore>,
        max_concurrent_suites: usize,
    ) -> Self {
        Self {
            runner,
            store,
            pool: Arc::new(Semaphore::new(max_concurrent_suites)),
        }
    }

    /// Run the configured pipeline for `build_id` against `workspace`.
    ///
    /// Build steps run strictly in declared order on the calling task; the
    /// first failure aborts the rest and surfaces as an error, so suites
    /// never run against a workspace that failed to build. Suites are then
    /// dispatched concurrently, each bounded by its own timeout; results are
    /// persisted as they complete, in whatever order they land.
    pub async fn run(
        &self,
        build_id: BuildId,
        workspace: &Path,
        config: &PipelineConfig,
    ) -> EngineResult<ExecutionOutcome> {
        for step in &config.steps {
            info!(build_id = %build_id, step, "Running build step");
            let status = self.runner.run(&config.image, step, workspace).await?;
            if !status.success {
                warn!(build_id = %build_id, step, exit_code = ?status.exit_code, "Build step failed");
                return Err(EngineError::StepFailed(step.clone()));
            }
        }

        let mut tasks = JoinSet::new();
        for suite in config.suites.clone() {
            let permit = self
                .pool
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::PoolClosed)?;
            tasks.spawn(run_suite(
                permit,
                self.runner.clone(),
                config.image.clone(),
                suite,
                workspace.to_path_buf(),
                build_id,
            ));
        }

        // Aggregation is commutative: the outcome depends only on the set of
        // results, not their arrival order.
        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| EngineError::SuiteTask(e.to_string()))?;
            self.store.insert_test_result(&result).await?;
            results.push(result);
        }

        let success = results.iter().all(|r| r.outcome == TestOutcome::Passed);
        Ok(ExecutionOutcome { success, results })
    }
}

/// Run one suite to completion or timeout.
///
/// The timer starts once the pool permit is held, so queue wait does not
/// count against the suite's budget. A timeout or a failure inside the suite
/// is contained to this suite's result.
async fn run_suite(
    permit: OwnedSemaphorePermit,
    runner: Arc<dyn CommandRunner>,
    image: String,
    suite: SuiteConfig,
    workspace: PathBuf,
    build_id: BuildId,
) -> TestResult {
    let _permit = permit;
    info!(build_id = %build_id, suite = %suite.name, "Running test suite");

    let started = Instant::now();
    let outcome = match tokio::time::timeout(
        suite.timeout,
        runner.run(&image, &suite.command, &workspace),
    )
    .await
    {
        Ok(Ok(status)) if status.success => TestOutcome::Passed,
        Ok(Ok(status)) => {
            info!(build_id = %build_id, suite = %suite.name, exit_code = ?status.exit_code, "Suite failed");
            TestOutcome::Failed
        }
        Ok(Err(e)) => {
            warn!(build_id = %build_id, suite = %suite.name, error = %e, "Suite could not execute");
            TestOutcome::Failed
        }
        Err(_) => {
            warn!(build_id = %build_id, suite = %suite.name, timeout = ?suite.timeout, "Suite timed out");
            TestOutcome::Failed
        }
    };

    TestResult {
        build_id,
        suite: suite.name,
        outcome,
        duration_secs: started.elapsed().as_secs_f64(),
    }
}
