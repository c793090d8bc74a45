//! PostgreSQL implementation of the build store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gantry_core::{Build, BuildId, BuildStatus, TestResult};
use sqlx::PgPool;
use std::str::FromStr;

use crate::store::BuildStore;
use crate::{StoreError, StoreResult};

/// A build row as stored.
#[derive(Debug, sqlx::FromRow)]
struct BuildRow {
    id: uuid::Uuid,
    created_at: DateTime<Utc>,
    branch: String,
    revision: String,
    status: String,
    duration_secs: Option<f64>,
    summary: Option<String>,
}

impl TryFrom<BuildRow> for Build {
    type Error = StoreError;

    fn try_from(row: BuildRow) -> StoreResult<Build> {
        let status =
            BuildStatus::from_str(&row.status).map_err(|e| StoreError::Invalid(e.to_string()))?;
        Ok(Build {
            id: BuildId::from_uuid(row.id),
            created_at: row.created_at,
            branch: row.branch,
            revision: row.revision,
            status,
            duration_secs: row.duration_secs,
            summary: row.summary,
        })
    }
}

/// A test result row as stored.
#[derive(Debug, sqlx::FromRow)]
struct TestResultRow {
    build_id: uuid::Uuid,
    suite: String,
    outcome: String,
    duration_secs: f64,
}

impl TryFrom<TestResultRow> for TestResult {
    type Error = StoreError;

    fn try_from(row: TestResultRow) -> StoreResult<TestResult> {
        let outcome = row
            .outcome
            .parse()
            .map_err(|e: gantry_core::Error| StoreError::Invalid(e.to_string()))?;
        Ok(TestResult {
            build_id: BuildId::from_uuid(row.build_id),
            suite: row.suite,
            outcome,
            duration_secs: row.duration_secs,
        })
    }
}

/// PostgreSQL-backed build store.
pub struct PgBuildStore {
    pool: PgPool,
}

impl PgBuildStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BuildStore for PgBuildStore {
    async fn insert_build(&self, build: &Build) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO builds (id, created_at, branch, revision, status, duration_secs, summary)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(build.id.as_uuid())
        .bind(build.created_at)
        .bind(&build.branch)
        .bind(&build.revision)
        .bind(build.status.as_str())
        .bind(build.duration_secs)
        .bind(&build.summary)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_build(&self, id: BuildId) -> StoreResult<Build> {
        let row = sqlx::query_as::<_, BuildRow>("SELECT * FROM builds WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("build {}", id)))?;
        row.try_into()
    }

    async fn list_builds(&self, limit: i64) -> StoreResult<Vec<Build>> {
        let rows = sqlx::query_as::<_, BuildRow>(
            "SELECT * FROM builds ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Build::try_from).collect()
    }

    async fn update_status(&self, id: BuildId, status: BuildStatus) -> StoreResult<()> {
        let result = sqlx::query("UPDATE builds SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("build {}", id)));
        }
        Ok(())
    }

    async fn finalize_build(
        &self,
        id: BuildId,
        status: BuildStatus,
        duration_secs: f64,
        summary: &str,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE builds SET status = $2, duration_secs = $3, summary = $4
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(duration_secs)
        .bind(summary)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("build {}", id)));
        }
        Ok(())
    }

    async fn insert_test_result(&self, result: &TestResult) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO test_results (id, build_id, suite, outcome, duration_secs)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(uuid::Uuid::now_v7())
        .bind(result.build_id.as_uuid())
        .bind(&result.suite)
        .bind(result.outcome.as_str())
        .bind(result.duration_secs)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Duplicate(
                format!("suite '{}' for build {}", result.suite, result.build_id),
            ),
            other => StoreError::Database(other),
        })?;
        Ok(())
    }

    async fn list_test_results(&self, build_id: BuildId) -> StoreResult<Vec<TestResult>> {
        let rows = sqlx::query_as::<_, TestResultRow>(
            "SELECT build_id, suite, outcome, duration_secs FROM test_results WHERE build_id = $1 ORDER BY suite",
        )
        .bind(build_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TestResult::try_from).collect()
    }

    async fn next_queued(&self) -> StoreResult<Option<Build>> {
        let row = sqlx::query_as::<_, BuildRow>(
            "SELECT * FROM builds WHERE status = 'queued' ORDER BY created_at ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.map(Build::try_from).transpose()
    }

    async fn mark_running_as_error(&self, summary: &str) -> StoreResult<Vec<BuildId>> {
        let rows: Vec<(uuid::Uuid,)> = sqlx::query_as(
            r#"
            UPDATE builds
            SET status = 'error',
                summary = $1,
                duration_secs = EXTRACT(EPOCH FROM (NOW() - created_at))
            WHERE status = 'running'
            RETURNING id
            "#,
        )
        .bind(summary)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| BuildId::from_uuid(id)).collect())
    }
}
