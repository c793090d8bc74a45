//! Build trigger and query endpoints.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use gantry_core::{Build, BuildId, TestResult};

const DEFAULT_LIST_LIMIT: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trigger-build", post(trigger_build))
        .route("/builds", get(list_builds))
        .route("/builds/{id}", get(get_build))
}

#[derive(Debug, Deserialize)]
struct TriggerBuildRequest {
    #[serde(default = "default_branch")]
    branch: String,
    #[serde(default)]
    commit_hash: String,
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Serialize)]
struct TriggerBuildResponse {
    message: String,
    build_id: String,
}

async fn trigger_build(
    State(state): State<AppState>,
    Json(req): Json<TriggerBuildRequest>,
) -> Result<Json<TriggerBuildResponse>, ApiError> {
    let build = state.lifecycle.create(&req.branch, &req.commit_hash).await?;
    Ok(Json(TriggerBuildResponse {
        message: "Build queued successfully".to_string(),
        build_id: build.id.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct ListBuildsQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct BuildSummary {
    id: String,
    timestamp: DateTime<Utc>,
    branch: String,
    revision: String,
    status: String,
    duration: Option<f64>,
    summary: Option<String>,
}

impl From<Build> for BuildSummary {
    fn from(build: Build) -> Self {
        Self {
            id: build.id.to_string(),
            timestamp: build.created_at,
            branch: build.branch,
            revision: build.revision,
            status: build.status.to_string(),
            duration: build.duration_secs,
            summary: build.summary,
        }
    }
}

async fn list_builds(
    State(state): State<AppState>,
    Query(query): Query<ListBuildsQuery>,
) -> Result<Json<Vec<BuildSummary>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let builds = state.lifecycle.list(limit).await?;
    Ok(Json(builds.into_iter().map(BuildSummary::from).collect()))
}

#[derive(Debug, Serialize)]
struct TestResultResponse {
    name: String,
    result: String,
    execution_time: f64,
}

impl From<TestResult> for TestResultResponse {
    fn from(result: TestResult) -> Self {
        Self {
            name: result.suite,
            result: result.outcome.to_string(),
            execution_time: result.duration_secs,
        }
    }
}

#[derive(Debug, Serialize)]
struct BuildDetail {
    #[serde(flatten)]
    build: BuildSummary,
    tests: Vec<TestResultResponse>,
}

async fn get_build(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BuildDetail>, ApiError> {
    let id = BuildId::from_uuid(id);
    let build = state.lifecycle.get(id).await?;
    let tests = state.store.list_test_results(id).await?;
    Ok(Json(BuildDetail {
        build: build.into(),
        tests: tests.into_iter().map(TestResultResponse::from).collect(),
    }))
}
