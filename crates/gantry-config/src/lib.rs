//! Pipeline configuration for the Gantry CI orchestrator.
//!
//! A repository describes its pipeline in a `gantry.kdl` file at its root:
//! a build image, ordered build steps, named test suites with commands and
//! timeouts, and cache paths. When the file is absent or malformed, the
//! resolver falls back to a built-in default so a broken config never blocks
//! triage of a build.

pub mod error;
pub mod pipeline;

pub use error::{ConfigError, ConfigResult};
pub use pipeline::{
    CONFIG_FILE, DEFAULT_SUITE_TIMEOUT_SECS, PipelineConfig, SuiteConfig, parse_config, resolve,
};
