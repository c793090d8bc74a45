//! Build lifecycle manager.
//!
//! Owns the state machine `queued -> running -> {success, failure, error}`.
//! All mutations go through this type; every transition is persisted before
//! execution proceeds to the next stage.

use chrono::Utc;
use gantry_core::{Build, BuildId, BuildStatus, Error};
use gantry_store::BuildStore;
use std::sync::Arc;
use tracing::info;

use crate::{EngineError, EngineResult};

/// Manages build records and their status transitions.
pub struct Lifecycle {
    store: Arc<dyn BuildStore>,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn BuildStore>) -> Self {
        Self { store }
    }

    /// Create a build in `queued` state with the current timestamp.
    ///
    /// This is the single enqueue operation both ingress triggers normalize
    /// into.
    pub async fn create(&self, branch: &str, revision: &str) -> EngineResult<Build> {
        let build = Build::new(branch, revision);
        self.store.insert_build(&build).await?;
        info!(build_id = %build.id, branch, revision, "Build enqueued");
        Ok(build)
    }

    /// Move a build to `next`, rejecting any edge the state machine does not
    /// permit. The new status is persisted before this returns.
    pub async fn transition(&self, id: BuildId, next: BuildStatus) -> EngineResult<()> {
        let build = self.store.get_build(id).await?;
        if !build.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: build.status,
                to: next,
            }
            .into());
        }
        self.store.update_status(id, next).await?;
        info!(build_id = %id, from = %build.status, to = %next, "Build transitioned");
        Ok(())
    }

    /// Finalize a build: compute its duration and persist status, duration,
    /// and summary atomically.
    ///
    /// Duration is wall-clock elapsed since creation, set exactly once; a
    /// second finalize on an already-terminal build is rejected and does not
    /// overwrite it.
    pub async fn finalize(
        &self,
        id: BuildId,
        status: BuildStatus,
        summary: &str,
    ) -> EngineResult<Build> {
        if !status.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "finalize requires a terminal status, got {}",
                status
            ))
            .into());
        }
        let build = self.store.get_build(id).await?;
        if !build.status.can_transition_to(status) {
            return Err(Error::InvalidTransition {
                from: build.status,
                to: status,
            }
            .into());
        }

        let duration_secs = (Utc::now() - build.created_at).num_milliseconds() as f64 / 1000.0;
        self.store
            .finalize_build(id, status, duration_secs, summary)
            .await?;
        info!(
            build_id = %id,
            status = %status,
            duration_secs,
            summary,
            "Build finalized"
        );
        Ok(self.store.get_build(id).await?)
    }

    pub async fn get(&self, id: BuildId) -> EngineResult<Build> {
        Ok(self.store.get_build(id).await?)
    }

    /// Builds in reverse-chronological order.
    pub async fn list(&self, limit: i64) -> EngineResult<Vec<Build>> {
        Ok(self.store.list_builds(limit).await?)
    }
}
