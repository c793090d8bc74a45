//! Pipeline configuration parsing.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Repository-relative path of the pipeline configuration file.
pub const CONFIG_FILE: &str = "gantry.kdl";

/// Timeout applied to a suite that does not declare one.
pub const DEFAULT_SUITE_TIMEOUT_SECS: u64 = 300;

/// Resolved pipeline configuration for one build. Transient: produced at the
/// start of execution and discarded after.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Container image the pipeline runs in.
    pub image: String,
    /// Build-step commands, executed strictly in order.
    pub steps: Vec<String>,
    /// Named test suites, executed concurrently after the build steps.
    pub suites: Vec<SuiteConfig>,
    /// Paths to cache between builds.
    pub cache_paths: Vec<String>,
}

/// A named, independently executable test suite.
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteConfig {
    pub name: String,
    pub command: String,
    pub timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image: "python:3.9".to_string(),
            steps: vec![
                "pip install -r requirements.txt".to_string(),
                "python -m pytest".to_string(),
            ],
            suites: vec![
                SuiteConfig {
                    name: "unit".to_string(),
                    command: "python -m pytest tests/unit".to_string(),
                    timeout: Duration::from_secs(300),
                },
                SuiteConfig {
                    name: "integration".to_string(),
                    command: "python -m pytest tests/integration".to_string(),
                    timeout: Duration::from_secs(600),
                },
            ],
            cache_paths: vec!["~/.cache/pip".to_string()],
        }
    }
}

/// Resolve the pipeline configuration for a prepared workspace.
///
/// Looks for [`CONFIG_FILE`] at the workspace root. A missing file yields the
/// built-in default. An unreadable or malformed file is logged and also
/// yields the default: parse errors are recoverable, not fatal.
pub fn resolve(workspace: &Path) -> PipelineConfig {
    let path = workspace.join(CONFIG_FILE);
    if !path.exists() {
        return PipelineConfig::default();
    }

    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read pipeline config, using default");
            return PipelineConfig::default();
        }
    };

    match parse_config(&text) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to parse pipeline config, using default");
            PipelineConfig::default()
        }
    }
}

/// Parse a pipeline configuration from KDL text.
pub fn parse_config(kdl: &str) -> ConfigResult<PipelineConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let default = PipelineConfig::default();
    let mut image = None;
    let mut steps = None;
    let mut suites: Vec<SuiteConfig> = Vec::new();
    let mut cache_paths = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "build" => {
                let (img, stps) = parse_build(node)?;
                image = img;
                steps = Some(stps);
            }
            "suite" => {
                let suite = parse_suite(node)?;
                if suites.iter().any(|s| s.name == suite.name) {
                    return Err(ConfigError::Duplicate(format!("suite '{}'", suite.name)));
                }
                suites.push(suite);
            }
            "cache" => {
                cache_paths.extend(get_child_string_args(node, "path"));
            }
            _ => {} // Ignore unknown nodes
        }
    }

    // A file without a build block inherits the default image and steps; a
    // file without suites runs none.
    Ok(PipelineConfig {
        image: image.unwrap_or_else(|| default.image.clone()),
        steps: steps.unwrap_or_else(|| default.steps.clone()),
        suites,
        cache_paths,
    })
}

fn parse_build(node: &KdlNode) -> ConfigResult<(Option<String>, Vec<String>)> {
    let mut image = None;
    let mut steps = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "image" => {
                    image = get_first_string_arg(child);
                }
                "step" => {
                    if let Some(cmd) = get_first_string_arg(child) {
                        steps.push(cmd);
                    }
                }
                _ => {}
            }
        }
    }

    Ok((image, steps))
}

fn parse_suite(node: &KdlNode) -> ConfigResult<SuiteConfig> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("suite name".to_string()))?;

    let timeout_secs = match get_i64_prop(node, "timeout") {
        Some(secs) if secs > 0 => secs as u64,
        Some(secs) => {
            return Err(ConfigError::InvalidValue {
                field: format!("timeout for suite '{}'", name),
                message: format!("must be positive, got {}", secs),
            });
        }
        None => DEFAULT_SUITE_TIMEOUT_SECS,
    };

    let mut command = None;
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "run" {
                command = get_first_string_arg(child);
            }
        }
    }

    let command =
        command.ok_or_else(|| ConfigError::MissingField(format!("run for suite '{}'", name)))?;

    Ok(SuiteConfig {
        name,
        command,
        timeout: Duration::from_secs(timeout_secs),
    })
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_i64_prop(node: &KdlNode, name: &str) -> Option<i64> {
    node.get(name).and_then(|v| v.as_integer()).map(|v| v as i64)
}

fn get_child_string_args(node: &KdlNode, child_name: &str) -> Vec<String> {
    let mut result = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == child_name {
                if let Some(value) = get_first_string_arg(child) {
                    result.push(value);
                }
            }
        }
    }
    result
}
