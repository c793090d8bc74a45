//! In-memory build store for tests and local development.

use async_trait::async_trait;
use chrono::Utc;
use gantry_core::{Build, BuildId, BuildStatus, TestResult};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::store::BuildStore;
use crate::{StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    builds: HashMap<BuildId, Build>,
    results: Vec<TestResult>,
}

/// Build store held entirely in memory. Not durable; useful where a database
/// is unavailable.
#[derive(Default)]
pub struct MemoryBuildStore {
    inner: Mutex<Inner>,
}

impl MemoryBuildStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BuildStore for MemoryBuildStore {
    async fn insert_build(&self, build: &Build) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.builds.contains_key(&build.id) {
            return Err(StoreError::Duplicate(format!("build {}", build.id)));
        }
        inner.builds.insert(build.id, build.clone());
        Ok(())
    }

    async fn get_build(&self, id: BuildId) -> StoreResult<Build> {
        let inner = self.inner.lock().await;
        inner
            .builds
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("build {}", id)))
    }

    async fn list_builds(&self, limit: i64) -> StoreResult<Vec<Build>> {
        let inner = self.inner.lock().await;
        let mut builds: Vec<Build> = inner.builds.values().cloned().collect();
        builds.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        builds.truncate(limit.max(0) as usize);
        Ok(builds)
    }

    async fn update_status(&self, id: BuildId, status: BuildStatus) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let build = inner
            .builds
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("build {}", id)))?;
        build.status = status;
        Ok(())
    }

    async fn finalize_build(
        &self,
        id: BuildId,
        status: BuildStatus,
        duration_secs: f64,
        summary: &str,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let build = inner
            .builds
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("build {}", id)))?;
        build.status = status;
        build.duration_secs = Some(duration_secs);
        build.summary = Some(summary.to_string());
        Ok(())
    }

    async fn insert_test_result(&self, result: &TestResult) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.builds.contains_key(&result.build_id) {
            return Err(StoreError::NotFound(format!("build {}", result.build_id)));
        }
        if inner
            .results
            .iter()
            .any(|r| r.build_id == result.build_id && r.suite == result.suite)
        {
            return Err(StoreError::Duplicate(format!(
                "suite '{}' for build {}",
                result.suite, result.build_id
            )));
        }
        inner.results.push(result.clone());
        Ok(())
    }

    async fn list_test_results(&self, build_id: BuildId) -> StoreResult<Vec<TestResult>> {
        let inner = self.inner.lock().await;
        let mut results: Vec<TestResult> = inner
            .results
            .iter()
            .filter(|r| r.build_id == build_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| a.suite.cmp(&b.suite));
        Ok(results)
    }

    async fn next_queued(&self) -> StoreResult<Option<Build>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .builds
            .values()
            .filter(|b| b.status == BuildStatus::Queued)
            .min_by_key(|b| b.created_at)
            .cloned())
    }

    async fn mark_running_as_error(&self, summary: &str) -> StoreResult<Vec<BuildId>> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut swept = Vec::new();
        for build in inner.builds.values_mut() {
            if build.status == BuildStatus::Running {
                build.status = BuildStatus::Error;
                build.summary = Some(summary.to_string());
                build.duration_secs =
                    Some((now - build.created_at).num_milliseconds() as f64 / 1000.0);
                swept.push(build.id);
            }
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::TestOutcome;

    #[tokio::test]
    async fn test_insert_and_get_build() {
        let store = MemoryBuildStore::new();
        let build = Build::new("main", "abc123");
        store.insert_build(&build).await.unwrap();

        let fetched = store.get_build(build.id).await.unwrap();
        assert_eq!(fetched.branch, "main");
        assert_eq!(fetched.status, BuildStatus::Queued);
    }

    #[tokio::test]
    async fn test_get_missing_build_is_not_found() {
        let store = MemoryBuildStore::new();
        let result = store.get_build(BuildId::new()).await;
        assert!(matches!(result.unwrap_err(), StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_builds_reverse_chronological_with_limit() {
        let store = MemoryBuildStore::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            let mut build = Build::new("main", format!("rev{}", i));
            build.created_at = Utc::now() + chrono::Duration::seconds(i);
            ids.push(build.id);
            store.insert_build(&build).await.unwrap();
        }

        let listed = store.list_builds(3).await.unwrap();
        assert_eq!(listed.len(), 3);
        // Newest first.
        assert_eq!(listed[0].id, ids[4]);
        assert_eq!(listed[1].id, ids[3]);
        assert_eq!(listed[2].id, ids[2]);
    }

    #[tokio::test]
    async fn test_finalize_sets_all_fields_in_one_write() {
        let store = MemoryBuildStore::new();
        let build = Build::new("main", "abc123");
        store.insert_build(&build).await.unwrap();

        store
            .finalize_build(build.id, BuildStatus::Success, 12.5, "2/2 suites passed")
            .await
            .unwrap();

        let fetched = store.get_build(build.id).await.unwrap();
        assert_eq!(fetched.status, BuildStatus::Success);
        assert_eq!(fetched.duration_secs, Some(12.5));
        assert_eq!(fetched.summary.as_deref(), Some("2/2 suites passed"));
    }

    #[tokio::test]
    async fn test_duplicate_suite_for_same_build_rejected() {
        let store = MemoryBuildStore::new();
        let build = Build::new("main", "abc123");
        store.insert_build(&build).await.unwrap();

        let result = TestResult {
            build_id: build.id,
            suite: "unit".to_string(),
            outcome: TestOutcome::Passed,
            duration_secs: 1.0,
        };
        store.insert_test_result(&result).await.unwrap();
        let dup = store.insert_test_result(&result).await;
        assert!(matches!(dup.unwrap_err(), StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_test_result_requires_existing_build() {
        let store = MemoryBuildStore::new();
        let result = TestResult {
            build_id: BuildId::new(),
            suite: "unit".to_string(),
            outcome: TestOutcome::Passed,
            duration_secs: 1.0,
        };
        let inserted = store.insert_test_result(&result).await;
        assert!(matches!(inserted.unwrap_err(), StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_next_queued_returns_oldest() {
        let store = MemoryBuildStore::new();
        let mut older = Build::new("main", "old");
        older.created_at = Utc::now() - chrono::Duration::seconds(60);
        let newer = Build::new("main", "new");
        store.insert_build(&newer).await.unwrap();
        store.insert_build(&older).await.unwrap();

        let next = store.next_queued().await.unwrap().unwrap();
        assert_eq!(next.id, older.id);

        store
            .update_status(older.id, BuildStatus::Running)
            .await
            .unwrap();
        let next = store.next_queued().await.unwrap().unwrap();
        assert_eq!(next.id, newer.id);
    }

    #[tokio::test]
    async fn test_sweep_marks_only_running_builds() {
        let store = MemoryBuildStore::new();
        let queued = Build::new("main", "a");
        let mut running = Build::new("main", "b");
        running.status = BuildStatus::Running;
        let mut done = Build::new("main", "c");
        done.status = BuildStatus::Success;
        store.insert_build(&queued).await.unwrap();
        store.insert_build(&running).await.unwrap();
        store.insert_build(&done).await.unwrap();

        let swept = store.mark_running_as_error("interrupted").await.unwrap();
        assert_eq!(swept, vec![running.id]);

        let fetched = store.get_build(running.id).await.unwrap();
        assert_eq!(fetched.status, BuildStatus::Error);
        assert!(fetched.duration_secs.is_some());
        assert_eq!(
            store.get_build(queued.id).await.unwrap().status,
            BuildStatus::Queued
        );
        assert_eq!(
            store.get_build(done.id).await.unwrap().status,
            BuildStatus::Success
        );
    }
}
