use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::app::error::AppError;

use super::merge::{merge_config, MergeMode};
use super::model::{ConfigOverlay, ElementSpec, Task, TaskAction, WorkflowConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySource {
    pub label: String,
    pub path: PathBuf,
    pub mode: MergeMode,
}

/// Where the merged configuration comes from, in merge order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSources {
    pub default_path: PathBuf,
    pub overlays: Vec<OverlaySource>,
}

impl ConfigSources {
    pub fn new(default_path: impl Into<PathBuf>) -> Self {
        Self {
            default_path: default_path.into(),
            overlays: Vec::new(),
        }
    }

    pub fn with_overlay(
        mut self,
        label: impl Into<String>,
        path: impl Into<PathBuf>,
        mode: MergeMode,
    ) -> Self {
        self.overlays.push(OverlaySource {
            label: label.into(),
            path: path.into(),
            mode,
        });
        self
    }
}

/// Merged, read-only workflow configuration.
///
/// An empty store (no default config found) is valid to hold but every lookup
/// on it fails with a config error.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    config: Option<WorkflowConfig>,
    loaded_from: Vec<PathBuf>,
}

impl ConfigStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config: Some(config),
            loaded_from: Vec::new(),
        }
    }

    pub fn from_json(raw: &str, trace_id: &str) -> Result<Self, AppError> {
        Ok(Self::new(parse_base(raw, "inline config", trace_id)?))
    }

    pub fn load(sources: &ConfigSources, trace_id: &str) -> Result<Self, AppError> {
        if !sources.default_path.exists() {
            warn!(
                trace_id = %trace_id,
                path = %sources.default_path.display(),
                "default workflow config not found; lookups will fail"
            );
            return Ok(Self::empty());
        }

        let raw = read_source(&sources.default_path, trace_id)?;
        let mut config = parse_base(&raw, &sources.default_path.display().to_string(), trace_id)?;
        let mut loaded_from = vec![sources.default_path.clone()];

        for overlay in &sources.overlays {
            if !overlay.path.exists() {
                debug!(
                    trace_id = %trace_id,
                    source = %overlay.label,
                    path = %overlay.path.display(),
                    "optional workflow config not present"
                );
                continue;
            }
            let raw = read_source(&overlay.path, trace_id)?;
            let parsed = parse_overlay(&raw, &overlay.label, trace_id)?;
            config = merge_config(config, parsed, overlay.mode).map_err(|err| {
                AppError::config(format!("Failed to merge {} config: {err}", overlay.label), trace_id)
            })?;
            loaded_from.push(overlay.path.clone());
        }

        info!(
            trace_id = %trace_id,
            sources = loaded_from.len(),
            workflows = config.workflows.len(),
            ui_elements = config.ui_elements.len(),
            "workflow config loaded"
        );

        Ok(Self {
            config: Some(config),
            loaded_from,
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.config.is_some()
    }

    pub fn loaded_from(&self) -> &[PathBuf] {
        &self.loaded_from
    }

    pub fn config(&self, trace_id: &str) -> Result<&WorkflowConfig, AppError> {
        self.config.as_ref().ok_or_else(|| {
            AppError::config(
                "Workflow config not loaded: no default config was found",
                trace_id,
            )
        })
    }

    pub fn action(&self, name: &str, trace_id: &str) -> Result<&str, AppError> {
        self.config(trace_id)?
            .actions
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AppError::lookup("action", name, trace_id))
    }

    pub fn command(&self, name: &str, trace_id: &str) -> Result<&str, AppError> {
        self.config(trace_id)?
            .commands
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AppError::lookup("command", name, trace_id))
    }

    pub fn package(&self, name: &str, trace_id: &str) -> Result<&str, AppError> {
        self.config(trace_id)?
            .packages
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AppError::lookup("package", name, trace_id))
    }

    pub fn ui_element(&self, name: &str, trace_id: &str) -> Result<&ElementSpec, AppError> {
        self.config(trace_id)?
            .ui_elements
            .get(name)
            .ok_or_else(|| AppError::lookup("UI element", name, trace_id))
    }

    pub fn workflow(&self, name: &str, trace_id: &str) -> Result<&[Task], AppError> {
        self.config(trace_id)?
            .workflows
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| AppError::lookup("workflow", name, trace_id))
    }

    pub fn workflow_names(&self) -> Vec<&str> {
        self.config
            .as_ref()
            .map(|config| config.workflows.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Task payloads that name entries the merged config does not define.
    pub fn dangling_references(&self) -> Vec<String> {
        let Some(config) = &self.config else {
            return Vec::new();
        };
        let mut problems = Vec::new();
        for (workflow, tasks) in &config.workflows {
            for (index, task) in tasks.iter().enumerate() {
                let task_type = task.task_type();
                for element in task.action.element_refs() {
                    if !config.ui_elements.contains_key(element) {
                        problems.push(format!(
                            "{workflow} task #{index} ({task_type}): unknown UI element '{element}'"
                        ));
                    }
                }
                match &task.action {
                    TaskAction::Command { command } if !config.commands.contains_key(command) => {
                        problems.push(format!(
                            "{workflow} task #{index} ({task_type}): unknown command '{command}'"
                        ));
                    }
                    TaskAction::HasPackageInForeground { package }
                        if !config.packages.contains_key(package) =>
                    {
                        problems.push(format!(
                            "{workflow} task #{index} ({task_type}): unknown package '{package}'"
                        ));
                    }
                    _ => {}
                }
            }
        }
        problems
    }
}

fn read_source(path: &Path, trace_id: &str) -> Result<String, AppError> {
    fs::read_to_string(path).map_err(|err| {
        AppError::config(
            format!("Failed to read workflow config '{}': {err}", path.display()),
            trace_id,
        )
    })
}

fn parse_base(raw: &str, label: &str, trace_id: &str) -> Result<WorkflowConfig, AppError> {
    serde_json::from_str(raw).map_err(|err| {
        AppError::config(format!("Invalid workflow config ({label}): {err}"), trace_id)
    })
}

fn parse_overlay(raw: &str, label: &str, trace_id: &str) -> Result<ConfigOverlay, AppError> {
    serde_json::from_str(raw).map_err(|err| {
        AppError::config(format!("Invalid {label} workflow config: {err}"), trace_id)
    })
}
