use crate::app::error::AppError;
use crate::app::models::UiNode;

use super::model::{KeyCode, ScrollDirection, SwipeDirection, SwipeFraction};
use super::resolver::Selector;

/// The live automation surface a workflow runs against.
///
/// Implementations are used from one thread at a time; the interpreter never
/// calls them concurrently.
pub trait UiAccessor {
    /// Every node currently on screen matching `selector`, in document order.
    fn find_elements(&self, selector: &Selector) -> Result<Vec<UiNode>, AppError>;

    fn find_element(&self, selector: &Selector) -> Result<Option<UiNode>, AppError> {
        Ok(self.find_elements(selector)?.into_iter().next())
    }

    fn has_element(&self, selector: &Selector) -> Result<bool, AppError> {
        Ok(self.find_element(selector)?.is_some())
    }

    fn click(&self, node: &UiNode) -> Result<(), AppError>;

    fn long_click(&self, node: &UiNode) -> Result<(), AppError>;

    fn press_key(&self, key: &KeyCode) -> Result<(), AppError>;

    fn long_press_key(&self, key: &KeyCode) -> Result<(), AppError>;

    fn swipe(
        &self,
        direction: SwipeDirection,
        fraction: SwipeFraction,
        steps: u32,
    ) -> Result<(), AppError>;

    /// Scrolls `container` (or the whole screen) one page forward.
    /// Returns `false` once the content no longer moves.
    fn scroll(
        &self,
        container: Option<&UiNode>,
        direction: ScrollDirection,
        margin: u32,
    ) -> Result<bool, AppError>;

    /// Scrolls one page back toward the start of the content.
    fn scroll_backward(
        &self,
        container: Option<&UiNode>,
        direction: ScrollDirection,
        margin: u32,
    ) -> Result<bool, AppError>;

    fn execute_shell_command(&self, command: &str) -> Result<String, AppError>;

    fn has_package_in_foreground(&self, package: &str) -> Result<bool, AppError>;

    /// Blocks the calling thread.
    fn sleep(&self, duration_ms: u64);
}
