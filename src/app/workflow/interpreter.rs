//! Sequential workflow execution.
//!
//! A workflow runs task by task on the calling thread and stops at the first
//! strict task that cannot complete. `_IF_EXIST` variants are the only soft
//! failures: a missing target turns them into a skipped task.

use std::fmt;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::app::error::AppError;
use crate::app::models::{TaskOutcome, TaskRecord, UiNode, WorkflowReport};

use super::accessor::UiAccessor;
use super::model::{ScrollAction, ScrollConfig, SwipeConfig, Task, TaskAction, TaskType};
use super::resolver::{resolve_named, Selector};
use super::store::ConfigStore;

pub const DEFAULT_MAX_SCROLL_ATTEMPTS: u32 = 20;
pub const DEFAULT_MAX_SWIPE_ATTEMPTS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterOptions {
    /// Upper bound on scroll increments per SCROLL_TO_FIND_AND_CLICK task, applied
    /// separately to the rewind and to the forward search.
    pub max_scroll_attempts: u32,
    /// Upper bound on swipes per SWIPE_TO_FIND_AND_CLICK task.
    pub max_swipe_attempts: u32,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            max_scroll_attempts: DEFAULT_MAX_SCROLL_ATTEMPTS,
            max_swipe_attempts: DEFAULT_MAX_SWIPE_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heading {
    Forward,
    Backward,
}

/// Result of a bounded search; `attempts` counts the increments issued.
enum Search {
    Found(UiNode),
    Exhausted { attempts: u32 },
}

impl Search {
    fn found(self) -> Option<UiNode> {
        match self {
            Search::Found(node) => Some(node),
            Search::Exhausted { .. } => None,
        }
    }
}

/// Where in a workflow a task sits; used to label errors.
#[derive(Debug, Clone, Copy)]
struct Step<'w> {
    workflow: &'w str,
    index: usize,
    task_type: TaskType,
}

impl fmt::Display for Step<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Workflow '{}' task #{} ({})",
            self.workflow, self.index, self.task_type
        )
    }
}

pub struct WorkflowInterpreter<'a, A: UiAccessor + ?Sized> {
    store: &'a ConfigStore,
    accessor: &'a A,
    options: InterpreterOptions,
    trace_id: String,
}

impl<'a, A: UiAccessor + ?Sized> WorkflowInterpreter<'a, A> {
    pub fn new(store: &'a ConfigStore, accessor: &'a A, trace_id: impl Into<String>) -> Self {
        Self {
            store,
            accessor,
            options: InterpreterOptions::default(),
            trace_id: trace_id.into(),
        }
    }

    pub fn with_options(mut self, options: InterpreterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn execute_workflow(&self, name: &str) -> Result<WorkflowReport, AppError> {
        let tasks = self.store.workflow(name, &self.trace_id)?;
        info!(trace_id = %self.trace_id, workflow = %name, tasks = tasks.len(), "workflow started");

        let started_at = Utc::now();
        let start = Instant::now();
        let mut records = Vec::with_capacity(tasks.len());

        for (index, task) in tasks.iter().enumerate() {
            let step = Step {
                workflow: name,
                index,
                task_type: task.task_type(),
            };
            let task_start = Instant::now();
            let mut outcome = TaskOutcome::Completed;
            for repeat in 0..task.repeat_count {
                debug!(
                    trace_id = %self.trace_id,
                    workflow = %name,
                    index,
                    repeat,
                    task_type = %step.task_type,
                    "executing task"
                );
                if self.execute_task(step, task)? == TaskOutcome::Skipped {
                    outcome = TaskOutcome::Skipped;
                }
            }
            records.push(TaskRecord {
                index,
                task_type: step.task_type,
                outcome,
                repeats: task.repeat_count,
                duration_ms: task_start.elapsed().as_millis(),
            });
        }

        let duration_ms = start.elapsed().as_millis();
        info!(
            trace_id = %self.trace_id,
            workflow = %name,
            duration_ms = duration_ms as u64,
            "workflow completed"
        );

        Ok(WorkflowReport {
            workflow: name.to_string(),
            trace_id: self.trace_id.clone(),
            started_at: started_at.to_rfc3339(),
            duration_ms,
            tasks: records,
        })
    }

    fn execute_task(&self, step: Step<'_>, task: &Task) -> Result<TaskOutcome, AppError> {
        match &task.action {
            TaskAction::Command { command } => {
                let shell = self.store.command(command, &self.trace_id).map_err(|err| err.context(step))?;
                let output = self
                    .accessor
                    .execute_shell_command(shell)
                    .map_err(|err| err.context(step))?;
                debug!(trace_id = %self.trace_id, command = %command, output_len = output.len(), "command finished");
            }
            TaskAction::Press { key } => {
                self.accessor.press_key(key).map_err(|err| err.context(step))?;
            }
            TaskAction::LongPress { key } => {
                self.accessor.long_press_key(key).map_err(|err| err.context(step))?;
            }
            TaskAction::Click { element } => {
                let node = self.require_element(step, element)?;
                self.accessor.click(&node).map_err(|err| err.context(step))?;
            }
            TaskAction::LongClick { element } => {
                let node = self.require_element(step, element)?;
                self.accessor.long_click(&node).map_err(|err| err.context(step))?;
            }
            TaskAction::ClickIfExist { element } => {
                let selector = self.selector(step, element)?;
                match self.find(step, &selector)? {
                    Some(node) => self.accessor.click(&node).map_err(|err| err.context(step))?,
                    None => return Ok(self.skip(step, element)),
                }
            }
            TaskAction::HasPackageInForeground { package } => {
                let package_id = self.store.package(package, &self.trace_id).map_err(|err| err.context(step))?;
                let present = self
                    .accessor
                    .has_package_in_foreground(package_id)
                    .map_err(|err| err.context(step))?;
                if !present {
                    return Err(self.failure(
                        step,
                        format!("package '{package}' ({package_id}) is not in the foreground"),
                    ));
                }
            }
            TaskAction::HasUiElementInForeground { element } => {
                let selector = self.selector(step, element)?;
                let present = self
                    .accessor
                    .has_element(&selector)
                    .map_err(|err| err.context(step))?;
                if !present {
                    return Err(self.failure(
                        step,
                        format!("UI element '{element}' is not in the foreground"),
                    ));
                }
            }
            TaskAction::ScrollToFindAndClick {
                element,
                scroll,
                if_exist,
            } => {
                let target = self.selector(step, element)?;
                match self.scroll_to_find(step, &target, scroll)? {
                    Search::Found(node) => {
                        self.accessor.click(&node).map_err(|err| err.context(step))?
                    }
                    Search::Exhausted { .. } if *if_exist => return Ok(self.skip(step, element)),
                    Search::Exhausted { attempts } => {
                        return Err(self.failure(
                            step,
                            format!(
                                "UI element '{element}' not found after scrolling {}",
                                times(attempts)
                            ),
                        ))
                    }
                }
            }
            TaskAction::Swipe { swipe } => {
                self.swipe_once(step, swipe)?;
            }
            TaskAction::SwipeToFindAndClick {
                element,
                swipe,
                if_exist,
            } => {
                let target = self.selector(step, element)?;
                match self.swipe_to_find(step, &target, swipe)? {
                    Search::Found(node) => {
                        self.accessor.click(&node).map_err(|err| err.context(step))?
                    }
                    Search::Exhausted { .. } if *if_exist => return Ok(self.skip(step, element)),
                    Search::Exhausted { attempts } => {
                        return Err(self.failure(
                            step,
                            format!(
                                "UI element '{element}' not found after swiping {}",
                                times(attempts)
                            ),
                        ))
                    }
                }
            }
            TaskAction::WaitMs { duration_ms } => {
                self.accessor.sleep(*duration_ms);
            }
        }
        Ok(TaskOutcome::Completed)
    }

    fn selector(&self, step: Step<'_>, element: &str) -> Result<Selector, AppError> {
        resolve_named(self.store, element, &self.trace_id).map_err(|err| err.context(step))
    }

    fn find(&self, step: Step<'_>, selector: &Selector) -> Result<Option<UiNode>, AppError> {
        self.accessor
            .find_element(selector)
            .map_err(|err| err.context(step))
    }

    fn require_element(&self, step: Step<'_>, element: &str) -> Result<UiNode, AppError> {
        let selector = self.selector(step, element)?;
        self.find(step, &selector)?
            .ok_or_else(|| self.failure(step, format!("missing UI element '{element}'")))
    }

    fn failure(&self, step: Step<'_>, message: String) -> AppError {
        AppError::execution(
            step.workflow,
            step.index,
            step.task_type.as_str(),
            message,
            self.trace_id.clone(),
        )
    }

    fn skip(&self, step: Step<'_>, element: &str) -> TaskOutcome {
        warn!(
            trace_id = %self.trace_id,
            workflow = %step.workflow,
            index = step.index,
            task_type = %step.task_type,
            element = %element,
            "UI element not found; task skipped"
        );
        TaskOutcome::Skipped
    }

    /// Rewinds toward the start of the list, then pages forward. The target is
    /// checked before the first increment and after every increment in either
    /// direction.
    fn scroll_to_find(
        &self,
        step: Step<'_>,
        target: &Selector,
        scroll: &ScrollConfig,
    ) -> Result<Search, AppError> {
        if let Some(node) = self.find(step, target)? {
            return Ok(Search::Found(node));
        }
        if let Some(node) = self.scroll_search(step, target, scroll, Heading::Backward)?.found() {
            return Ok(Search::Found(node));
        }
        self.scroll_search(step, target, scroll, Heading::Forward)
    }

    fn scroll_search(
        &self,
        step: Step<'_>,
        target: &Selector,
        scroll: &ScrollConfig,
        heading: Heading,
    ) -> Result<Search, AppError> {
        let mut attempts = 0;
        while attempts < self.options.max_scroll_attempts {
            let moved = match scroll.scroll_action {
                ScrollAction::UseGesture => self.scroll_gesture(step, scroll, heading)?,
                ScrollAction::UseButton => {
                    let button = match heading {
                        Heading::Forward => scroll.scroll_forward.as_deref(),
                        Heading::Backward => scroll.scroll_backward.as_deref(),
                    };
                    self.scroll_button(step, button)?
                }
            };
            attempts += 1;
            if !moved {
                debug!(trace_id = %self.trace_id, attempts, heading = ?heading, "scroll reached the end");
                break;
            }
            self.accessor.sleep(scroll.scroll_wait_time);
            if let Some(node) = self.find(step, target)? {
                return Ok(Search::Found(node));
            }
        }
        Ok(Search::Exhausted { attempts })
    }

    fn scroll_gesture(
        &self,
        step: Step<'_>,
        scroll: &ScrollConfig,
        heading: Heading,
    ) -> Result<bool, AppError> {
        let container = match &scroll.scroll_element {
            Some(name) => {
                let selector = self.selector(step, name)?;
                match self.find(step, &selector)? {
                    Some(node) => Some(node),
                    None => {
                        warn!(trace_id = %self.trace_id, container = %name, "scroll container not on screen");
                        return Ok(false);
                    }
                }
            }
            None => None,
        };
        let (direction, margin) = (scroll.scroll_direction, scroll.scroll_margin);
        let scrolled = match heading {
            Heading::Forward => self.accessor.scroll(container.as_ref(), direction, margin),
            Heading::Backward => self
                .accessor
                .scroll_backward(container.as_ref(), direction, margin),
        };
        scrolled.map_err(|err| err.context(step))
    }

    /// Clicks the named button; `false` when none is configured or it is gone.
    fn scroll_button(&self, step: Step<'_>, button: Option<&str>) -> Result<bool, AppError> {
        let Some(name) = button else {
            return Ok(false);
        };
        let selector = self.selector(step, name)?;
        match self.find(step, &selector)? {
            Some(button) => {
                self.accessor.click(&button).map_err(|err| err.context(step))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn swipe_once(&self, step: Step<'_>, swipe: &SwipeConfig) -> Result<(), AppError> {
        self.accessor
            .swipe(swipe.swipe_direction, swipe.swipe_fraction, swipe.number_of_steps)
            .map_err(|err| err.context(step))?;
        self.accessor.sleep(swipe.swipe_wait_time);
        Ok(())
    }

    fn swipe_to_find(
        &self,
        step: Step<'_>,
        target: &Selector,
        swipe: &SwipeConfig,
    ) -> Result<Search, AppError> {
        if let Some(node) = self.find(step, target)? {
            return Ok(Search::Found(node));
        }
        for attempt in 1..=self.options.max_swipe_attempts {
            self.swipe_once(step, swipe)?;
            if let Some(node) = self.find(step, target)? {
                debug!(trace_id = %self.trace_id, attempt, "swipe search found target");
                return Ok(Search::Found(node));
            }
        }
        Ok(Search::Exhausted {
            attempts: self.options.max_swipe_attempts,
        })
    }
}

fn times(count: u32) -> String {
    if count == 1 {
        "1 time".to_string()
    } else {
        format!("{count} times")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::error::ErrorKind;
    use crate::app::workflow::model::{KeyCode, ScrollDirection, SwipeDirection, SwipeFraction};
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Click(String),
        LongClick(String),
        Key(u32),
        LongKey(u32),
        Swipe(SwipeDirection),
        Scroll,
        ScrollBack,
        Shell(String),
        Sleep(u64),
    }

    /// Screen made of named nodes keyed by selector value.
    #[derive(Default)]
    struct FakeAccessor {
        visible: Mutex<HashSet<String>>,
        /// Values that appear after this many scroll/swipe increments.
        reveal_after: Mutex<Vec<(String, u32)>>,
        /// Values that disappear after this many increments.
        conceal_after: Mutex<Vec<(String, u32)>>,
        increments: Mutex<u32>,
        /// Pages a backward gesture can still move before hitting the top.
        back_pages: Mutex<u32>,
        foreground: Option<String>,
        scroll_moves: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeAccessor {
        fn with_visible(values: &[&str]) -> Self {
            Self {
                visible: Mutex::new(values.iter().map(|v| v.to_string()).collect()),
                scroll_moves: true,
                ..Self::default()
            }
        }

        fn reveal(self, value: &str, after: u32) -> Self {
            self.reveal_after
                .lock()
                .expect("reveal")
                .push((value.to_string(), after));
            self
        }

        fn conceal(self, value: &str, after: u32) -> Self {
            self.conceal_after
                .lock()
                .expect("conceal")
                .push((value.to_string(), after));
            self
        }

        fn scrolled_down(self, pages: u32) -> Self {
            *self.back_pages.lock().expect("back pages") = pages;
            self
        }

        fn count(&self, call: &Call) -> usize {
            self.calls().iter().filter(|c| *c == call).count()
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("calls").clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().expect("calls").push(call);
        }

        fn advance(&self) {
            let mut increments = self.increments.lock().expect("increments");
            *increments += 1;
            let mut visible = self.visible.lock().expect("visible");
            for (value, after) in self.reveal_after.lock().expect("reveal").iter() {
                if *increments >= *after {
                    visible.insert(value.clone());
                }
            }
            for (value, after) in self.conceal_after.lock().expect("conceal").iter() {
                if *increments >= *after {
                    visible.remove(value);
                }
            }
        }
    }

    impl UiAccessor for FakeAccessor {
        fn find_elements(&self, selector: &Selector) -> Result<Vec<UiNode>, AppError> {
            let visible = self.visible.lock().expect("visible");
            if visible.contains(&selector.value) {
                Ok(vec![UiNode {
                    resource_id: selector.value.clone(),
                    ..UiNode::default()
                }])
            } else {
                Ok(Vec::new())
            }
        }

        fn click(&self, node: &UiNode) -> Result<(), AppError> {
            self.record(Call::Click(node.resource_id.clone()));
            self.advance();
            Ok(())
        }

        fn long_click(&self, node: &UiNode) -> Result<(), AppError> {
            self.record(Call::LongClick(node.resource_id.clone()));
            Ok(())
        }

        fn press_key(&self, key: &KeyCode) -> Result<(), AppError> {
            self.record(Call::Key(key.code));
            Ok(())
        }

        fn long_press_key(&self, key: &KeyCode) -> Result<(), AppError> {
            self.record(Call::LongKey(key.code));
            Ok(())
        }

        fn swipe(
            &self,
            direction: SwipeDirection,
            _fraction: SwipeFraction,
            _steps: u32,
        ) -> Result<(), AppError> {
            self.record(Call::Swipe(direction));
            self.advance();
            Ok(())
        }

        fn scroll(
            &self,
            _container: Option<&UiNode>,
            _direction: ScrollDirection,
            _margin: u32,
        ) -> Result<bool, AppError> {
            self.record(Call::Scroll);
            if self.scroll_moves {
                self.advance();
            }
            Ok(self.scroll_moves)
        }

        fn scroll_backward(
            &self,
            _container: Option<&UiNode>,
            _direction: ScrollDirection,
            _margin: u32,
        ) -> Result<bool, AppError> {
            self.record(Call::ScrollBack);
            let mut pages = self.back_pages.lock().expect("back pages");
            if *pages == 0 {
                return Ok(false);
            }
            *pages -= 1;
            drop(pages);
            self.advance();
            Ok(true)
        }

        fn execute_shell_command(&self, command: &str) -> Result<String, AppError> {
            self.record(Call::Shell(command.to_string()));
            Ok(String::new())
        }

        fn has_package_in_foreground(&self, package: &str) -> Result<bool, AppError> {
            Ok(self.foreground.as_deref() == Some(package))
        }

        fn sleep(&self, duration_ms: u64) {
            self.record(Call::Sleep(duration_ms));
        }
    }

    const CONFIG: &str = r#"{
        "ACTIONS": {},
        "COMMANDS": { "GO_HOME": "input keyevent 3" },
        "PACKAGES": { "SETTINGS": "com.android.car.settings" },
        "UI_ELEMENTS": {
            "SETTINGS_BUTTON": { "RESOURCE_ID": "com.app:id/settings" },
            "BLUETOOTH": { "TEXT": "Bluetooth" },
            "LIST": { "CLASS": "android.widget.ListView" },
            "NEXT_PAGE": { "DESCRIPTION": "Scroll down" },
            "PREV_PAGE": { "DESCRIPTION": "Scroll up" }
        },
        "WORKFLOWS": {
            "OPEN_SETTINGS": [ { "TYPE": "CLICK", "CONFIG": { "UI_ELEMENT": "SETTINGS_BUTTON" } } ],
            "SOFT_THEN_HOME": [
                { "TYPE": "CLICK_IF_EXIST", "CONFIG": { "UI_ELEMENT": "SETTINGS_BUTTON" } },
                { "TYPE": "PRESS", "CONFIG": { "TEXT": "HOME" } }
            ],
            "FIND_BLUETOOTH": [
                { "TYPE": "SCROLL_TO_FIND_AND_CLICK", "CONFIG": { "UI_ELEMENT": "BLUETOOTH" },
                  "SCROLL_CONFIG": { "SCROLL_ACTION": "USE_GESTURE", "SCROLL_ELEMENT": "LIST", "SCROLL_WAIT_TIME": 5 } }
            ],
            "MAYBE_BLUETOOTH": [
                { "TYPE": "SCROLL_TO_FIND_AND_CLICK_IF_EXIST", "CONFIG": { "UI_ELEMENT": "BLUETOOTH" },
                  "SCROLL_CONFIG": { "SCROLL_ACTION": "USE_GESTURE", "SCROLL_WAIT_TIME": 5 } },
                { "TYPE": "WAIT_MS", "CONFIG": { "TEXT": "100" } }
            ],
            "BUTTON_BLUETOOTH": [
                { "TYPE": "SCROLL_TO_FIND_AND_CLICK", "CONFIG": { "UI_ELEMENT": "BLUETOOTH" },
                  "SCROLL_CONFIG": { "SCROLL_ACTION": "USE_BUTTON", "SCROLL_FORWARD": "NEXT_PAGE", "SCROLL_WAIT_TIME": 5 } }
            ],
            "REWIND_BLUETOOTH": [
                { "TYPE": "SCROLL_TO_FIND_AND_CLICK", "CONFIG": { "UI_ELEMENT": "BLUETOOTH" },
                  "SCROLL_CONFIG": { "SCROLL_ACTION": "USE_BUTTON", "SCROLL_FORWARD": "NEXT_PAGE", "SCROLL_BACKWARD": "PREV_PAGE", "SCROLL_WAIT_TIME": 5 } }
            ],
            "SWIPE_LEFT": [
                { "TYPE": "SWIPE", "SWIPE_CONFIG": { "SWIPE_DIRECTION": "RIGHT_TO_LEFT", "SWIPE_WAIT_TIME": 7 } }
            ],
            "MAYBE_SWIPE_BLUETOOTH": [
                { "TYPE": "SWIPE_TO_FIND_AND_CLICK_IF_EXIST", "CONFIG": { "UI_ELEMENT": "BLUETOOTH" },
                  "SWIPE_CONFIG": { "SWIPE_DIRECTION": "BOTTOM_TO_TOP", "SWIPE_WAIT_TIME": 5 } },
                { "TYPE": "PRESS", "CONFIG": { "TEXT": "HOME" } }
            ],
            "SWIPE_BLUETOOTH": [
                { "TYPE": "SWIPE_TO_FIND_AND_CLICK", "CONFIG": { "UI_ELEMENT": "BLUETOOTH" },
                  "SWIPE_CONFIG": { "SWIPE_DIRECTION": "BOTTOM_TO_TOP", "SWIPE_WAIT_TIME": 5 } }
            ],
            "CHECK_SETTINGS": [
                { "TYPE": "COMMAND", "CONFIG": { "TEXT": "GO_HOME" } },
                { "TYPE": "HAS_PACKAGE_IN_FOREGROUND", "CONFIG": { "TEXT": "SETTINGS" } }
            ],
            "ASSERT_BUTTON": [
                { "TYPE": "HAS_UI_ELEMENT_IN_FOREGROUND", "CONFIG": { "UI_ELEMENT": "SETTINGS_BUTTON" } }
            ],
            "BACK_TWICE": [
                { "TYPE": "LONG_PRESS", "CONFIG": { "TEXT": "BACK" }, "REPEAT_COUNT": 2 },
                { "TYPE": "LONG_CLICK", "CONFIG": { "UI_ELEMENT": "SETTINGS_BUTTON" } }
            ],
            "DANGLING": [ { "TYPE": "CLICK", "CONFIG": { "UI_ELEMENT": "GHOST" } } ]
        }
    }"#;

    fn store() -> ConfigStore {
        ConfigStore::from_json(CONFIG, "trace-test").expect("store")
    }

    fn options() -> InterpreterOptions {
        InterpreterOptions {
            max_scroll_attempts: 5,
            max_swipe_attempts: 4,
        }
    }

    #[test]
    fn click_on_present_element_clicks_once() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&["com.app:id/settings"]);
        let report = WorkflowInterpreter::new(&store, &accessor, "t")
            .execute_workflow("OPEN_SETTINGS")
            .expect("workflow");

        assert_eq!(accessor.calls(), vec![Call::Click("com.app:id/settings".to_string())]);
        assert_eq!(report.tasks.len(), 1);
        assert_eq!(report.tasks[0].outcome, TaskOutcome::Completed);
        assert_eq!(report.trace_id, "t");
    }

    #[test]
    fn click_on_missing_element_names_workflow_and_element() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&[]);
        let err = WorkflowInterpreter::new(&store, &accessor, "t")
            .execute_workflow("OPEN_SETTINGS")
            .expect_err("missing element");

        assert_eq!(err.kind, ErrorKind::Execution);
        assert!(err.error.contains("OPEN_SETTINGS"));
        assert!(err.error.contains("SETTINGS_BUTTON"));
        assert!(accessor.calls().is_empty());
    }

    #[test]
    fn click_if_exist_skips_and_continues() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&[]);
        let report = WorkflowInterpreter::new(&store, &accessor, "t")
            .execute_workflow("SOFT_THEN_HOME")
            .expect("workflow");

        assert_eq!(accessor.calls(), vec![Call::Key(3)]);
        assert_eq!(report.tasks[0].outcome, TaskOutcome::Skipped);
        assert_eq!(report.tasks[1].outcome, TaskOutcome::Completed);
    }

    #[test]
    fn scroll_search_finds_element_revealed_later() {
        let store = store();
        let accessor =
            FakeAccessor::with_visible(&["android.widget.ListView"]).reveal("Bluetooth", 2);
        WorkflowInterpreter::new(&store, &accessor, "t")
            .with_options(options())
            .execute_workflow("FIND_BLUETOOTH")
            .expect("workflow");

        assert_eq!(
            accessor.calls(),
            vec![
                Call::ScrollBack,
                Call::Scroll,
                Call::Sleep(5),
                Call::Scroll,
                Call::Sleep(5),
                Call::Click("Bluetooth".to_string()),
            ]
        );
    }

    #[test]
    fn scroll_search_is_bounded_when_target_never_appears() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&["android.widget.ListView"]);
        let err = WorkflowInterpreter::new(&store, &accessor, "t")
            .with_options(options())
            .execute_workflow("FIND_BLUETOOTH")
            .expect_err("not found");

        assert_eq!(err.kind, ErrorKind::Execution);
        assert!(err.error.contains("not found after scrolling 5 times"));
        assert!(err.error.contains("FIND_BLUETOOTH"));
        assert_eq!(accessor.count(&Call::Scroll), 5);
        assert_eq!(accessor.count(&Call::Sleep(5)), 5);
    }

    #[test]
    fn scroll_if_exist_terminates_silently() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&[]);
        let report = WorkflowInterpreter::new(&store, &accessor, "t")
            .with_options(options())
            .execute_workflow("MAYBE_BLUETOOTH")
            .expect("workflow");

        assert_eq!(report.tasks[0].outcome, TaskOutcome::Skipped);
        assert_eq!(accessor.calls().last(), Some(&Call::Sleep(100)));
    }

    #[test]
    fn scroll_stops_early_when_content_stops_moving() {
        let store = store();
        let accessor = FakeAccessor {
            scroll_moves: false,
            ..FakeAccessor::with_visible(&["android.widget.ListView"])
        };
        let err = WorkflowInterpreter::new(&store, &accessor, "t")
            .with_options(options())
            .execute_workflow("FIND_BLUETOOTH")
            .expect_err("not found");

        assert_eq!(err.kind, ErrorKind::Execution);
        assert!(err.error.contains("not found after scrolling 1 time"));
        assert_eq!(accessor.calls(), vec![Call::ScrollBack, Call::Scroll]);
    }

    #[test]
    fn gesture_search_rewinds_before_paging_forward() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&["android.widget.ListView"])
            .scrolled_down(2)
            .reveal("Bluetooth", 3);
        WorkflowInterpreter::new(&store, &accessor, "t")
            .with_options(options())
            .execute_workflow("FIND_BLUETOOTH")
            .expect("workflow");

        assert_eq!(
            accessor.calls(),
            vec![
                Call::ScrollBack,
                Call::Sleep(5),
                Call::ScrollBack,
                Call::Sleep(5),
                Call::ScrollBack,
                Call::Scroll,
                Call::Sleep(5),
                Call::Click("Bluetooth".to_string()),
            ]
        );
    }

    #[test]
    fn backward_button_is_pressed_until_it_disappears() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&["Scroll up", "Scroll down"])
            .conceal("Scroll up", 2)
            .reveal("Bluetooth", 3);
        WorkflowInterpreter::new(&store, &accessor, "t")
            .with_options(options())
            .execute_workflow("REWIND_BLUETOOTH")
            .expect("workflow");

        assert_eq!(
            accessor.calls(),
            vec![
                Call::Click("Scroll up".to_string()),
                Call::Sleep(5),
                Call::Click("Scroll up".to_string()),
                Call::Sleep(5),
                Call::Click("Scroll down".to_string()),
                Call::Sleep(5),
                Call::Click("Bluetooth".to_string()),
            ]
        );
    }

    #[test]
    fn target_found_while_rewinding_is_clicked() {
        let store = store();
        let accessor =
            FakeAccessor::with_visible(&["Scroll up", "Scroll down"]).reveal("Bluetooth", 1);
        WorkflowInterpreter::new(&store, &accessor, "t")
            .with_options(options())
            .execute_workflow("REWIND_BLUETOOTH")
            .expect("workflow");

        assert_eq!(
            accessor.calls(),
            vec![
                Call::Click("Scroll up".to_string()),
                Call::Sleep(5),
                Call::Click("Bluetooth".to_string()),
            ]
        );
    }

    #[test]
    fn both_buttons_are_bounded_when_target_never_appears() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&["Scroll up", "Scroll down"]);
        let err = WorkflowInterpreter::new(&store, &accessor, "t")
            .with_options(options())
            .execute_workflow("REWIND_BLUETOOTH")
            .expect_err("not found");

        assert_eq!(err.kind, ErrorKind::Execution);
        assert!(err.error.contains("not found after scrolling 5 times"));
        assert_eq!(accessor.count(&Call::Click("Scroll up".to_string())), 5);
        assert_eq!(accessor.count(&Call::Click("Scroll down".to_string())), 5);
        let calls = accessor.calls();
        let last_back = calls
            .iter()
            .rposition(|c| *c == Call::Click("Scroll up".to_string()));
        let first_forward = calls
            .iter()
            .position(|c| *c == Call::Click("Scroll down".to_string()));
        assert!(last_back < first_forward);
    }

    #[test]
    fn button_scroll_clicks_forward_button() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&["Scroll down"]).reveal("Bluetooth", 2);
        WorkflowInterpreter::new(&store, &accessor, "t")
            .with_options(options())
            .execute_workflow("BUTTON_BLUETOOTH")
            .expect("workflow");

        assert_eq!(
            accessor.calls(),
            vec![
                Call::Click("Scroll down".to_string()),
                Call::Sleep(5),
                Call::Click("Scroll down".to_string()),
                Call::Sleep(5),
                Call::Click("Bluetooth".to_string()),
            ]
        );
    }

    #[test]
    fn swipe_search_clicks_when_found() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&[]).reveal("Bluetooth", 3);
        WorkflowInterpreter::new(&store, &accessor, "t")
            .with_options(options())
            .execute_workflow("SWIPE_BLUETOOTH")
            .expect("workflow");

        let swipes = accessor
            .calls()
            .iter()
            .filter(|c| **c == Call::Swipe(SwipeDirection::BottomToTop))
            .count();
        assert_eq!(swipes, 3);
        assert_eq!(accessor.calls().last(), Some(&Call::Click("Bluetooth".to_string())));
    }

    #[test]
    fn plain_swipe_swipes_once_and_waits() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&[]);
        let report = WorkflowInterpreter::new(&store, &accessor, "t")
            .execute_workflow("SWIPE_LEFT")
            .expect("workflow");

        assert_eq!(
            accessor.calls(),
            vec![Call::Swipe(SwipeDirection::RightToLeft), Call::Sleep(7)]
        );
        assert_eq!(report.tasks[0].outcome, TaskOutcome::Completed);
    }

    #[test]
    fn swipe_search_is_bounded_when_target_never_appears() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&[]);
        let err = WorkflowInterpreter::new(&store, &accessor, "t")
            .with_options(options())
            .execute_workflow("SWIPE_BLUETOOTH")
            .expect_err("not found");

        assert_eq!(err.kind, ErrorKind::Execution);
        assert!(err.error.contains("SWIPE_BLUETOOTH"));
        assert!(err.error.contains("SWIPE_TO_FIND_AND_CLICK"));
        assert!(err.error.contains("not found after swiping 4 times"));
        assert_eq!(accessor.count(&Call::Swipe(SwipeDirection::BottomToTop)), 4);
        assert_eq!(accessor.count(&Call::Sleep(5)), 4);
        assert!(!accessor
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Click(_))));
    }

    #[test]
    fn swipe_if_exist_skips_after_bound_and_continues() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&[]);
        let report = WorkflowInterpreter::new(&store, &accessor, "t")
            .with_options(options())
            .execute_workflow("MAYBE_SWIPE_BLUETOOTH")
            .expect("workflow");

        assert_eq!(report.tasks[0].outcome, TaskOutcome::Skipped);
        assert_eq!(report.tasks[1].outcome, TaskOutcome::Completed);
        assert_eq!(accessor.count(&Call::Swipe(SwipeDirection::BottomToTop)), 4);
        assert_eq!(accessor.count(&Call::Sleep(5)), 4);
        assert_eq!(accessor.calls().last(), Some(&Call::Key(3)));
    }

    #[test]
    fn package_assertion_failure_names_assertion() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&[]);
        let err = WorkflowInterpreter::new(&store, &accessor, "t")
            .execute_workflow("CHECK_SETTINGS")
            .expect_err("not foreground");

        assert_eq!(err.kind, ErrorKind::Execution);
        assert!(err.error.contains("CHECK_SETTINGS"));
        assert!(err.error.contains("HAS_PACKAGE_IN_FOREGROUND"));
        assert!(err.error.contains("com.android.car.settings"));
        assert_eq!(accessor.calls(), vec![Call::Shell("input keyevent 3".to_string())]);
    }

    #[test]
    fn package_assertion_passes_when_foreground() {
        let store = store();
        let accessor = FakeAccessor {
            foreground: Some("com.android.car.settings".to_string()),
            ..FakeAccessor::with_visible(&[])
        };
        WorkflowInterpreter::new(&store, &accessor, "t")
            .execute_workflow("CHECK_SETTINGS")
            .expect("workflow");
    }

    #[test]
    fn element_assertion_failure_is_execution_error() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&[]);
        let err = WorkflowInterpreter::new(&store, &accessor, "t")
            .execute_workflow("ASSERT_BUTTON")
            .expect_err("not foreground");
        assert!(err.error.contains("HAS_UI_ELEMENT_IN_FOREGROUND"));
        assert!(err.error.contains("SETTINGS_BUTTON"));
    }

    #[test]
    fn repeat_count_repeats_single_task() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&["com.app:id/settings"]);
        let report = WorkflowInterpreter::new(&store, &accessor, "t")
            .execute_workflow("BACK_TWICE")
            .expect("workflow");

        assert_eq!(
            accessor.calls(),
            vec![
                Call::LongKey(4),
                Call::LongKey(4),
                Call::LongClick("com.app:id/settings".to_string()),
            ]
        );
        assert_eq!(report.tasks[0].repeats, 2);
    }

    #[test]
    fn unknown_element_reference_is_lookup_error_with_context() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&[]);
        let err = WorkflowInterpreter::new(&store, &accessor, "t")
            .execute_workflow("DANGLING")
            .expect_err("lookup");
        assert_eq!(err.kind, ErrorKind::Lookup);
        assert!(err.error.contains("DANGLING"));
        assert!(err.error.contains("GHOST"));
    }

    #[test]
    fn unknown_workflow_is_lookup_error() {
        let store = store();
        let accessor = FakeAccessor::with_visible(&[]);
        let err = WorkflowInterpreter::new(&store, &accessor, "t")
            .execute_workflow("NOPE")
            .expect_err("lookup");
        assert_eq!(err.kind, ErrorKind::Lookup);
    }
}
