use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::adb::runner::DEFAULT_COMMAND_TIMEOUT;
use crate::app::error::AppError;
use crate::app::workflow::interpreter::{
    InterpreterOptions, DEFAULT_MAX_SCROLL_ATTEMPTS, DEFAULT_MAX_SWIPE_ATTEMPTS,
};
use crate::app::workflow::merge::MergeMode;
use crate::app::workflow::store::ConfigSources;

const MAX_SEARCH_ATTEMPTS: u32 = 500;
const MAX_COMMAND_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdbSettings {
    pub command_path: String,
    pub serial: String,
    pub command_timeout_secs: u64,
}

impl Default for AdbSettings {
    fn default() -> Self {
        Self {
            command_path: String::new(),
            serial: String::new(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT.as_secs(),
        }
    }
}

impl AdbSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Bundled workflow config; required for anything to run.
    pub default_config_path: String,
    /// Overlay that may add new entries.
    pub extension_config_path: String,
    /// Overlay that may only override existing entries.
    pub runtime_config_path: String,
    pub max_scroll_attempts: u32,
    pub max_swipe_attempts: u32,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            default_config_path: "workflow_config.json".to_string(),
            extension_config_path: String::new(),
            runtime_config_path: String::new(),
            max_scroll_attempts: DEFAULT_MAX_SCROLL_ATTEMPTS,
            max_swipe_attempts: DEFAULT_MAX_SWIPE_ATTEMPTS,
        }
    }
}

impl WorkflowSettings {
    pub fn config_sources(&self) -> ConfigSources {
        let mut sources = ConfigSources::new(&self.default_config_path);
        if !self.extension_config_path.trim().is_empty() {
            sources = sources.with_overlay(
                "extension",
                &self.extension_config_path,
                MergeMode::Extend,
            );
        }
        if !self.runtime_config_path.trim().is_empty() {
            sources = sources.with_overlay("runtime", &self.runtime_config_path, MergeMode::Strict);
        }
        sources
    }

    pub fn interpreter_options(&self) -> InterpreterOptions {
        InterpreterOptions {
            max_scroll_attempts: self.max_scroll_attempts,
            max_swipe_attempts: self.max_swipe_attempts,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunnerConfig {
    #[serde(default)]
    pub adb: AdbSettings,
    #[serde(default)]
    pub workflow: WorkflowSettings,
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("SPECTATIO_RUNNER_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".spectatio_runner.json")
}

pub fn load_config(trace_id: &str) -> Result<RunnerConfig, AppError> {
    load_config_from_path(&config_path(), trace_id)
}

pub fn load_config_from_path(path: &Path, trace_id: &str) -> Result<RunnerConfig, AppError> {
    if !path.exists() {
        return Ok(RunnerConfig::default());
    }
    let raw = fs::read_to_string(path).map_err(|err| {
        AppError::config(
            format!("Failed to read runner settings {}: {err}", path.display()),
            trace_id,
        )
    })?;
    let config: RunnerConfig = serde_json::from_str(&raw).map_err(|err| {
        AppError::config(
            format!("Failed to parse runner settings {}: {err}", path.display()),
            trace_id,
        )
    })?;
    Ok(validate_config(config))
}

fn validate_config(mut config: RunnerConfig) -> RunnerConfig {
    if !(1..=MAX_COMMAND_TIMEOUT_SECS).contains(&config.adb.command_timeout_secs) {
        config.adb.command_timeout_secs = DEFAULT_COMMAND_TIMEOUT.as_secs();
    }
    if !(1..=MAX_SEARCH_ATTEMPTS).contains(&config.workflow.max_scroll_attempts) {
        config.workflow.max_scroll_attempts = DEFAULT_MAX_SCROLL_ATTEMPTS;
    }
    if !(1..=MAX_SEARCH_ATTEMPTS).contains(&config.workflow.max_swipe_attempts) {
        config.workflow.max_swipe_attempts = DEFAULT_MAX_SWIPE_ATTEMPTS;
    }
    if config.workflow.default_config_path.trim().is_empty() {
        config.workflow.default_config_path = WorkflowSettings::default().default_config_path;
    }
    config
}
