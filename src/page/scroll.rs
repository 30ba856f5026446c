//! Scroll methods.

use tracing::debug;

use crate::error::{Error, Result};

use super::Page;

// ============================================================================
// Page - Scroll
// ============================================================================

impl Page {
    /// Scrolls the page by a pixel delta.
    ///
    /// # Arguments
    ///
    /// * `delta_x` - Horizontal amount in pixels (positive = right)
    /// * `delta_y` - Vertical amount in pixels (positive = down)
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionExecution`] if no driver is attached or the
    /// driver fails.
    pub async fn mouse_wheel(&self, delta_x: i64, delta_y: i64) -> Result<()> {
        let driver = self.require_driver("scroll", None)?;
        debug!(session_id = %self.session_id(), delta_x, delta_y, "Scrolling by");

        driver
            .mouse_wheel(delta_x, delta_y)
            .await
            .map_err(|e| Error::action_failed(format!("Scroll failed: {e}"), "scroll", None))
    }

    /// Scrolls the element matching `selector` into view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionExecution`] if no driver is attached or the
    /// element cannot be scrolled to.
    pub async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        let driver = self.require_driver("scroll", Some(selector))?;
        debug!(session_id = %self.session_id(), selector, "Scrolling into view");

        driver
            .locator(selector)
            .scroll_into_view_if_needed()
            .await
            .map_err(|e| {
                Error::action_failed(
                    format!("Scroll into view failed on selector '{selector}': {e}"),
                    "scroll",
                    Some(selector),
                )
            })
    }
}

// ============================================================================
// Tests
// ============================================================================
