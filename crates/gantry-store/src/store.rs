//! The build store trait.

use async_trait::async_trait;
use gantry_core::{Build, BuildId, BuildStatus, TestResult};

use crate::StoreResult;

/// Durable record of builds and their test results.
///
/// Every write is an independent, atomic persistence operation: no
/// multi-row transaction spans a build and its suite results.
#[async_trait]
pub trait BuildStore: Send + Sync {
    /// Insert a freshly created build record.
    async fn insert_build(&self, build: &Build) -> StoreResult<()>;

    /// Fetch a build by id.
    async fn get_build(&self, id: BuildId) -> StoreResult<Build>;

    /// List builds in reverse-chronological order.
    async fn list_builds(&self, limit: i64) -> StoreResult<Vec<Build>>;

    /// Persist a non-terminal status change.
    async fn update_status(&self, id: BuildId, status: BuildStatus) -> StoreResult<()>;

    /// Persist the terminal status, duration, and summary in one write.
    async fn finalize_build(
        &self,
        id: BuildId,
        status: BuildStatus,
        duration_secs: f64,
        summary: &str,
    ) -> StoreResult<()>;

    /// Record one completed test suite.
    async fn insert_test_result(&self, result: &TestResult) -> StoreResult<()>;

    /// All test results recorded for a build.
    async fn list_test_results(&self, build_id: BuildId) -> StoreResult<Vec<TestResult>>;

    /// The oldest build still in `queued` state, if any.
    async fn next_queued(&self) -> StoreResult<Option<Build>>;

    /// Mark every build stuck in `running` as `error` with the given summary,
    /// setting duration from creation time. Returns the ids swept.
    async fn mark_running_as_error(&self, summary: &str) -> StoreResult<Vec<BuildId>>;
}
