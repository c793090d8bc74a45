//! Engine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Core(#[from] gantry_core::Error),

    #[error("store error: {0}")]
    Store(#[from] gantry_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source fetch failed: {0}")]
    Fetch(String),

    #[error("build step failed: {0}")]
    StepFailed(String),

    #[error("suite task failed: {0}")]
    SuiteTask(String),

    #[error("worker pool unavailable")]
    PoolClosed,
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
