use std::time::Duration;

use tracing::{debug, warn};

use crate::app::adb::parse::{parse_focused_packages, parse_wm_size};
use crate::app::adb::runner::{run_command_with_timeout, CommandOutput};
use crate::app::error::AppError;
use crate::app::models::{Bounds, UiNode};
use crate::app::ui_xml::{parse_ui_hierarchy, UiTree};
use crate::app::workflow::accessor::UiAccessor;
use crate::app::workflow::model::{KeyCode, ScrollDirection, SwipeDirection, SwipeFraction};
use crate::app::workflow::resolver::Selector;

const LONG_CLICK_DURATION_MS: u64 = 1000;
const MS_PER_SWIPE_STEP: u64 = 5;
const SCROLL_STEPS: u32 = 20;

/// `UiAccessor` driving a device through `adb shell input` and
/// `uiautomator dump`.
#[derive(Debug, Clone)]
pub struct AdbUiAccessor {
    program: String,
    serial: Option<String>,
    timeout: Duration,
    trace_id: String,
}

impl AdbUiAccessor {
    pub fn new(
        program: impl Into<String>,
        serial: Option<String>,
        timeout: Duration,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            serial,
            timeout,
            trace_id: trace_id.into(),
        }
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn adb(&self, args: &[&str]) -> Result<CommandOutput, AppError> {
        let mut full: Vec<String> = Vec::with_capacity(args.len() + 2);
        if let Some(serial) = &self.serial {
            full.push("-s".to_string());
            full.push(serial.clone());
        }
        full.extend(args.iter().map(|arg| arg.to_string()));
        run_command_with_timeout(&self.program, &full, self.timeout, &self.trace_id)
    }

    fn adb_checked(&self, args: &[&str]) -> Result<CommandOutput, AppError> {
        let output = self.adb(args)?;
        if !output.success() {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            return Err(AppError::device(
                format!("adb {} failed: {detail}", args.join(" ")),
                &self.trace_id,
            ));
        }
        Ok(output)
    }

    fn input(&self, args: &[&str]) -> Result<(), AppError> {
        let mut full = vec!["shell", "input"];
        full.extend_from_slice(args);
        self.adb_checked(&full).map(|_| ())
    }

    pub fn dump_hierarchy(&self) -> Result<UiTree, AppError> {
        let output = self.adb_checked(&["exec-out", "uiautomator", "dump", "/dev/tty"])?;
        tree_from_dump(&output.stdout, &self.trace_id)
    }

    fn scroll_page(
        &self,
        container: Option<&UiNode>,
        gesture: SwipeDirection,
        margin: u32,
    ) -> Result<bool, AppError> {
        let before = self.dump_hierarchy()?;
        let bounds = match container.and_then(|node| node.bounds) {
            Some(bounds) if !bounds.is_empty() => bounds,
            _ => self.screen_bounds(Some(&before))?,
        };
        let (from, to) = swipe_points(bounds, gesture, SwipeFraction::One, margin);
        self.input_swipe(from, to, swipe_duration_ms(SCROLL_STEPS))?;
        let after = self.dump_hierarchy()?;
        Ok(before.nodes() != after.nodes())
    }

    fn screen_bounds(&self, tree: Option<&UiTree>) -> Result<Bounds, AppError> {
        if let Some(bounds) = tree.and_then(UiTree::screen_bounds) {
            return Ok(bounds);
        }
        let output = self.adb_checked(&["shell", "wm", "size"])?;
        let (width, height) = parse_wm_size(&output.stdout).ok_or_else(|| {
            AppError::device("Unable to determine the screen size", &self.trace_id)
        })?;
        Ok(Bounds {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        })
    }

    fn input_swipe(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration_ms: u64,
    ) -> Result<(), AppError> {
        self.input(&[
            "swipe",
            &from.0.to_string(),
            &from.1.to_string(),
            &to.0.to_string(),
            &to.1.to_string(),
            &duration_ms.to_string(),
        ])
    }

    fn tap_target(&self, node: &UiNode) -> Result<(i32, i32), AppError> {
        node.bounds
            .filter(|bounds| !bounds.is_empty())
            .map(|bounds| bounds.center())
            .ok_or_else(|| {
                AppError::device(
                    format!("UI node '{}' has no clickable area", describe(node)),
                    &self.trace_id,
                )
            })
    }
}

/// `uiautomator` prints errors such as "could not get idle state" on stdout,
/// which parse to a tree without nodes.
fn tree_from_dump(stdout: &str, trace_id: &str) -> Result<UiTree, AppError> {
    let tree = parse_ui_hierarchy(stdout)
        .map_err(|err| AppError::device(format!("Invalid UI hierarchy dump: {err}"), trace_id))?;
    if tree.is_empty() {
        return Err(AppError::device(
            format!("UI hierarchy dump contained no nodes: {}", stdout.trim()),
            trace_id,
        ));
    }
    Ok(tree)
}

fn describe(node: &UiNode) -> &str {
    [&node.resource_id, &node.text, &node.content_desc, &node.class]
        .into_iter()
        .find(|value| !value.is_empty())
        .map(String::as_str)
        .unwrap_or("<unnamed>")
}

/// Start and end points of a swipe across `bounds`, inset by `margin` on
/// every side and covering `fraction` of the remaining extent.
pub fn swipe_points(
    bounds: Bounds,
    direction: SwipeDirection,
    fraction: SwipeFraction,
    margin: u32,
) -> ((i32, i32), (i32, i32)) {
    let margin = i32::try_from(margin).unwrap_or(i32::MAX);
    let inset_x = margin.min(bounds.width() / 2);
    let inset_y = margin.min(bounds.height() / 2);
    let left = bounds.left + inset_x;
    let right = bounds.right - inset_x;
    let top = bounds.top + inset_y;
    let bottom = bounds.bottom - inset_y;
    let (center_x, center_y) = bounds.center();
    let span_x = ((right - left) as f64 * fraction.ratio()).round() as i32;
    let span_y = ((bottom - top) as f64 * fraction.ratio()).round() as i32;

    match direction {
        SwipeDirection::TopToBottom => ((center_x, top), (center_x, top + span_y)),
        SwipeDirection::BottomToTop => ((center_x, bottom), (center_x, bottom - span_y)),
        SwipeDirection::LeftToRight => ((left, center_y), (left + span_x, center_y)),
        SwipeDirection::RightToLeft => ((right, center_y), (right - span_x, center_y)),
    }
}

/// Scrolling forward drags the content toward the start edge.
fn scroll_gesture(direction: ScrollDirection) -> SwipeDirection {
    match direction {
        ScrollDirection::Vertical => SwipeDirection::BottomToTop,
        ScrollDirection::Horizontal => SwipeDirection::RightToLeft,
    }
}

fn rewind_gesture(direction: ScrollDirection) -> SwipeDirection {
    match direction {
        ScrollDirection::Vertical => SwipeDirection::TopToBottom,
        ScrollDirection::Horizontal => SwipeDirection::LeftToRight,
    }
}

fn swipe_duration_ms(steps: u32) -> u64 {
    u64::from(steps.max(1)) * MS_PER_SWIPE_STEP
}

impl UiAccessor for AdbUiAccessor {
    fn find_elements(&self, selector: &Selector) -> Result<Vec<UiNode>, AppError> {
        let tree = self.dump_hierarchy()?;
        let found: Vec<UiNode> = tree.find_all(selector).into_iter().cloned().collect();
        debug!(
            trace_id = %self.trace_id,
            selector = %selector,
            matches = found.len(),
            "queried UI hierarchy"
        );
        Ok(found)
    }

    fn click(&self, node: &UiNode) -> Result<(), AppError> {
        let (x, y) = self.tap_target(node)?;
        self.input(&["tap", &x.to_string(), &y.to_string()])
    }

    fn long_click(&self, node: &UiNode) -> Result<(), AppError> {
        let point = self.tap_target(node)?;
        self.input_swipe(point, point, LONG_CLICK_DURATION_MS)
    }

    fn press_key(&self, key: &KeyCode) -> Result<(), AppError> {
        self.input(&["keyevent", &key.code.to_string()])
    }

    fn long_press_key(&self, key: &KeyCode) -> Result<(), AppError> {
        self.input(&["keyevent", "--longpress", &key.code.to_string()])
    }

    fn swipe(
        &self,
        direction: SwipeDirection,
        fraction: SwipeFraction,
        steps: u32,
    ) -> Result<(), AppError> {
        let bounds = self.screen_bounds(None)?;
        let (from, to) = swipe_points(bounds, direction, fraction, 0);
        self.input_swipe(from, to, swipe_duration_ms(steps))
    }

    fn scroll(
        &self,
        container: Option<&UiNode>,
        direction: ScrollDirection,
        margin: u32,
    ) -> Result<bool, AppError> {
        self.scroll_page(container, scroll_gesture(direction), margin)
    }

    fn scroll_backward(
        &self,
        container: Option<&UiNode>,
        direction: ScrollDirection,
        margin: u32,
    ) -> Result<bool, AppError> {
        self.scroll_page(container, rewind_gesture(direction), margin)
    }

    fn execute_shell_command(&self, command: &str) -> Result<String, AppError> {
        let output = self.adb(&["shell", command])?;
        if !output.success() {
            warn!(
                trace_id = %self.trace_id,
                command = %command,
                exit_code = ?output.exit_code,
                stderr = %output.stderr.trim(),
                "shell command exited with a non-zero status"
            );
        }
        Ok(output.stdout)
    }

    fn has_package_in_foreground(&self, package: &str) -> Result<bool, AppError> {
        let output = self.adb_checked(&["shell", "dumpsys", "window"])?;
        Ok(parse_focused_packages(&output.stdout)
            .iter()
            .any(|focused| focused == package))
    }

    fn sleep(&self, duration_ms: u64) {
        std::thread::sleep(Duration::from_millis(duration_ms));
    }
}
