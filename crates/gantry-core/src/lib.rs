//! Core domain types for the Gantry CI orchestrator.
//!
//! This crate contains:
//! - Build identifiers
//! - The build record and its status state machine
//! - Test suite results
//! - Shared error types

pub mod build;
pub mod error;
pub mod id;

pub use build::{Build, BuildStatus, TestOutcome, TestResult};
pub use error::{Error, Result};
pub use id::BuildId;
