//! Build orchestration engine for the Gantry CI orchestrator.
//!
//! Owns the build lifecycle state machine, the pipeline executor that turns a
//! resolved configuration into ordered build steps and concurrent test
//! suites, and the worker loop that drives queued builds to a terminal state.

pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod runner;
pub mod worker;
pub mod workspace;

pub use error::{EngineError, EngineResult};
pub use executor::{ExecutionOutcome, PipelineExecutor};
pub use lifecycle::Lifecycle;
pub use runner::{CommandRunner, CommandStatus, LocalProcessRunner};
pub use worker::Worker;
pub use workspace::{NoopFetcher, SourceFetcher, Workspace};
