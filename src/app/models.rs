use serde::{Deserialize, Serialize};

use crate::app::workflow::model::TaskType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.left + self.width() / 2,
            self.top + self.height() / 2,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// One node of a UI hierarchy snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UiNode {
    pub index: usize,
    pub depth: usize,
    pub class: String,
    pub package: String,
    pub resource_id: String,
    pub text: String,
    pub content_desc: String,
    pub clickable: bool,
    pub long_clickable: bool,
    pub scrollable: bool,
    pub enabled: bool,
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed,
    /// An `_IF_EXIST` task whose target never showed up.
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecord {
    pub index: usize,
    pub task_type: TaskType,
    pub outcome: TaskOutcome,
    pub repeats: u32,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowReport {
    pub workflow: String,
    pub trace_id: String,
    pub started_at: String,
    pub duration_ms: u128,
    pub tasks: Vec<TaskRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_center_and_emptiness() {
        let bounds = Bounds {
            left: 0,
            top: 100,
            right: 1080,
            bottom: 300,
        };
        assert_eq!(bounds.center(), (540, 200));
        assert!(!bounds.is_empty());
        let flat = Bounds {
            left: 10,
            top: 10,
            right: 10,
            bottom: 50,
        };
        assert!(flat.is_empty());
    }
}
