//! Element waiting and query methods.

use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

use super::Page;
use super::driver::ElementState;

// ============================================================================
// Page - Elements
// ============================================================================

impl Page {
    /// Waits until the element matching `selector` reaches `state`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Element`] carrying the state and page URL if no
    /// driver is attached or the state is not reached in time.
    pub async fn wait_for_element(
        &self,
        selector: &str,
        state: ElementState,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let Some(driver) = self.driver() else {
            return Err(Error::element_state(
                "Page not initialized with a browser driver",
                selector,
                state.as_str(),
                self.url(),
            ));
        };
        let timeout = self.resolve_timeout(timeout);

        debug!(session_id = %self.session_id(), selector, state = %state, "Waiting for element");

        driver
            .wait_for_selector(selector, state, timeout)
            .await
            .map_err(|e| {
                Error::element_state(
                    format!("Element wait failed for '{selector}' (state: {state}): {e}"),
                    selector,
                    state.as_str(),
                    self.url(),
                )
            })
    }

    /// Returns `true` if the element is visible.
    ///
    /// Returns `false` without a driver or on driver failure.
    pub async fn is_element_visible(&self, selector: &str) -> bool {
        match self.driver() {
            Some(driver) => driver.locator(selector).is_visible().await.unwrap_or(false),
            None => false,
        }
    }

    /// Returns `true` if the element is enabled.
    ///
    /// Returns `false` without a driver or on driver failure.
    pub async fn is_element_enabled(&self, selector: &str) -> bool {
        match self.driver() {
            Some(driver) => driver.locator(selector).is_enabled().await.unwrap_or(false),
            None => false,
        }
    }

    /// Returns the element's text content.
    ///
    /// Returns `None` without a driver or on driver failure.
    pub async fn get_element_text(&self, selector: &str) -> Option<String> {
        let driver = self.driver()?;
        driver.locator(selector).text_content().await.ok().flatten()
    }

    /// Returns an attribute of the element.
    ///
    /// Returns `None` without a driver, on driver failure, or when the
    /// attribute is absent.
    pub async fn get_element_attribute(&self, selector: &str, attribute: &str) -> Option<String> {
        let driver = self.driver()?;
        driver
            .locator(selector)
            .get_attribute(attribute)
            .await
            .ok()
            .flatten()
    }
}

// ============================================================================
// Tests
// ============================================================================
