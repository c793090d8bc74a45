//! Build records, the status state machine, and test suite results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::BuildId;
use crate::{Error, Result};

/// Lifecycle status of a build.
///
/// `Error` denotes a fault in the orchestration itself (workspace, config,
/// infrastructure), as distinct from `Failure`, which is a clean run where at
/// least one test suite failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    /// Waiting to be picked up by a worker.
    Queued,
    /// Currently executing.
    Running,
    /// All build steps and test suites passed.
    Success,
    /// At least one test suite failed or timed out.
    Failure,
    /// A build step or the orchestration itself failed.
    Error,
}

impl BuildStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStatus::Success | BuildStatus::Failure | BuildStatus::Error
        )
    }

    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// `queued -> running` and `running -> {success, failure, error}` are the
    /// only legal edges. Terminal states have no outgoing edges.
    pub fn can_transition_to(&self, next: BuildStatus) -> bool {
        match self {
            BuildStatus::Queued => next == BuildStatus::Running,
            BuildStatus::Running => next.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Queued => "queued",
            BuildStatus::Running => "running",
            BuildStatus::Success => "success",
            BuildStatus::Failure => "failure",
            BuildStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for BuildStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(BuildStatus::Queued),
            "running" => Ok(BuildStatus::Running),
            "success" => Ok(BuildStatus::Success),
            "failure" => Ok(BuildStatus::Failure),
            "error" => Ok(BuildStatus::Error),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One CI run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    /// Unique identifier, assigned at creation.
    pub id: BuildId,
    /// When the build was enqueued.
    pub created_at: DateTime<Utc>,
    /// Source branch name.
    pub branch: String,
    /// Source revision: a commit hash, or a `PR-<n>` tag for pull requests.
    pub revision: String,
    /// Current lifecycle status.
    pub status: BuildStatus,
    /// Wall-clock duration in seconds, set once at the terminal transition.
    pub duration_secs: Option<f64>,
    /// Free-text result summary.
    pub summary: Option<String>,
}

impl Build {
    /// Create a new build in `queued` state with the current timestamp.
    pub fn new(branch: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            id: BuildId::new(),
            created_at: Utc::now(),
            branch: branch.into(),
            revision: revision.into(),
            status: BuildStatus::Queued,
            duration_secs: None,
            summary: None,
        }
    }
}

/// Outcome of a single test suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    Passed,
    Failed,
}

impl TestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestOutcome::Passed => "passed",
            TestOutcome::Failed => "failed",
        }
    }
}

impl std::str::FromStr for TestOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "passed" => Ok(TestOutcome::Passed),
            "failed" => Ok(TestOutcome::Failed),
            other => Err(Error::UnknownOutcome(other.to_string())),
        }
    }
}

impl std::fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One test-suite outcome within a build. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    /// The build this result belongs to.
    pub build_id: BuildId,
    /// Suite name, unique within a build.
    pub suite: String,
    /// Pass/fail outcome. A timeout is recorded as `Failed`.
    pub outcome: TestOutcome,
    /// Execution time in seconds.
    pub duration_secs: f64,
}
