//! Page navigation methods.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::{Error, Result};
use crate::events::{NavigationEvent, NavigationMethod};

use super::Page;
use super::core::validate_page_url;
use super::driver::{BrowserDriver, PageResponse, WaitUntil};

// ============================================================================
// Page - Navigation
// ============================================================================

impl Page {
    /// Navigates to a URL and emits a `navigation` event.
    ///
    /// The event records the previous URL, the load time, and the response
    /// status when the driver reports one.
    ///
    /// # Errors
    ///
    /// - [`Error::ActionExecution`] if no driver is attached or navigation fails
    /// - [`Error::Validation`] if `url` is not an HTTP(S) URL with a host
    pub async fn navigate(
        &self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let driver = self.require_driver("navigate", None)?;
        let url = validate_page_url(url)?;
        let timeout = self.resolve_timeout(timeout);

        debug!(session_id = %self.session_id(), url = %url, wait_until = %wait_until, "Navigating");

        self.perform_navigate(driver.as_ref(), &url, wait_until, timeout)
            .await
            .map_err(|e| {
                Error::action_failed(format!("Navigation failed to '{url}': {e}"), "navigate", None)
            })
    }

    /// Reloads the page and emits a `navigation` event with method `reload`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionExecution`] if no driver is attached or the
    /// reload fails.
    pub async fn reload(&self) -> Result<()> {
        let driver = self.require_driver("reload", None)?;
        debug!(session_id = %self.session_id(), "Reloading page");

        self.perform_reload(driver.as_ref())
            .await
            .map_err(|e| Error::action_failed(format!("Page reload failed: {e}"), "reload", None))
    }

    /// Goes back in history and emits a `navigation` event with method `back`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionExecution`] if no driver is attached or the
    /// driver fails.
    pub async fn go_back(&self) -> Result<()> {
        let driver = self.require_driver("back", None)?;
        debug!(session_id = %self.session_id(), "Navigating back");

        self.perform_history_step(driver.as_ref(), NavigationMethod::Back)
            .await
            .map_err(|e| Error::action_failed(format!("Go back failed: {e}"), "back", None))
    }

    /// Goes forward in history and emits a `navigation` event with method
    /// `forward`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionExecution`] if no driver is attached or the
    /// driver fails.
    pub async fn go_forward(&self) -> Result<()> {
        let driver = self.require_driver("forward", None)?;
        debug!(session_id = %self.session_id(), "Navigating forward");

        self.perform_history_step(driver.as_ref(), NavigationMethod::Forward)
            .await
            .map_err(|e| Error::action_failed(format!("Go forward failed: {e}"), "forward", None))
    }
}

// ============================================================================
// Page - Internal
// ============================================================================

impl Page {
    async fn perform_navigate(
        &self,
        driver: &dyn BrowserDriver,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<()> {
        let from_url = self.url();
        let start = Instant::now();

        let response = driver.goto(url, wait_until, timeout).await?;
        self.set_url(url);

        let base = self
            .event_base()?
            .with_metadata("wait_until", wait_until.as_str())
            .with_metadata("timeout", timeout.as_secs_f64());

        let mut event = NavigationEvent::new(base, from_url, url, NavigationMethod::Navigate)?
            .with_load_time(start.elapsed().as_secs_f64())?;
        if let Some(response) = response {
            event = event.with_status_code(response.status)?;
        }

        self.emit(event).await;
        Ok(())
    }

    async fn perform_reload(&self, driver: &dyn BrowserDriver) -> Result<()> {
        let from_url = self.url();
        let start = Instant::now();
        let response = driver.reload().await?;
        self.emit_history_event(from_url, NavigationMethod::Reload, response, Some(start))
            .await
    }

    async fn perform_history_step(
        &self,
        driver: &dyn BrowserDriver,
        method: NavigationMethod,
    ) -> Result<()> {
        let from_url = self.url();
        let response = match method {
            NavigationMethod::Forward => driver.go_forward().await?,
            _ => driver.go_back().await?,
        };
        self.set_url(driver.url());
        self.emit_history_event(from_url, method, response, None)
            .await
    }

    /// Emits a navigation event from `from_url` to the page's current URL.
    async fn emit_history_event(
        &self,
        from_url: String,
        method: NavigationMethod,
        response: Option<PageResponse>,
        started: Option<Instant>,
    ) -> Result<()> {
        let to_url = self.url();

        let mut event = NavigationEvent::new(self.event_base()?, from_url, &to_url, method)?;
        if let Some(start) = started {
            event = event.with_load_time(start.elapsed().as_secs_f64())?;
        }
        if let Some(response) = response {
            event = event.with_status_code(response.status)?;
        }

        self.emit(event).await;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
