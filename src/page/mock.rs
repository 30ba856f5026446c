//! Scripted in-memory driver for unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::{Error, Result};

use super::driver::{
    BrowserDriver, ClickOptions, ElementState, HoverOptions, Locator, PageResponse, WaitUntil,
};

// ============================================================================
// Types
// ============================================================================

/// Element known to the mock page.
#[derive(Debug, Clone)]
pub(crate) struct MockElement {
    pub visible: bool,
    pub enabled: bool,
    pub text: Option<String>,
    pub tag: String,
    pub attributes: FxHashMap<String, String>,
}

impl MockElement {
    pub fn new(tag: &str) -> Self {
        Self {
            visible: true,
            enabled: true,
            text: None,
            tag: tag.to_string(),
            attributes: FxHashMap::default(),
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    url: String,
    elements: FxHashMap<String, MockElement>,
    calls: Vec<String>,
    click_failures: u32,
    click_delay: Option<Duration>,
    goto_status: Option<u16>,
    fail_navigation: bool,
    fill_override: Option<String>,
    history: Vec<String>,
    history_index: usize,
}

/// Driver whose page is a map of selectors to elements.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new(url: &str) -> Self {
        let driver = Self::default();
        {
            let mut state = driver.state.lock();
            state.url = url.to_string();
            state.history.push(url.to_string());
        }
        driver
    }

    pub fn with_element(self, selector: &str, element: MockElement) -> Self {
        self.state.lock().elements.insert(selector.to_string(), element);
        self
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().url = url.to_string();
    }

    pub fn remove_element(&self, selector: &str) {
        self.state.lock().elements.remove(selector);
    }

    pub fn element(&self, selector: &str) -> Option<MockElement> {
        self.state.lock().elements.get(selector).cloned()
    }

    /// Makes the next `count` clicks fail.
    pub fn fail_clicks(&self, count: u32) {
        self.state.lock().click_failures = count;
    }

    pub fn set_click_delay(&self, delay: Duration) {
        self.state.lock().click_delay = Some(delay);
    }

    pub fn set_goto_status(&self, status: u16) {
        self.state.lock().goto_status = Some(status);
    }

    pub fn fail_navigation(&self) {
        self.state.lock().fail_navigation = true;
    }

    /// Stores `value` instead of whatever a fill writes.
    pub fn override_fill(&self, value: &str) {
        self.state.lock().fill_override = Some(value.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.state.lock().calls.push(call);
    }

    fn require_element(&self, selector: &str) -> Result<MockElement> {
        self.element(selector)
            .ok_or_else(|| Error::driver(format!("No element matches selector '{selector}'")))
    }
}

// ============================================================================
// BrowserDriver
// ============================================================================

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn click(&self, selector: &str, options: &ClickOptions, _timeout: Duration) -> Result<()> {
        self.record(format!("click:{selector}:{}", options.button));

        let delay = self.state.lock().click_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut state = self.state.lock();
            if state.click_failures > 0 {
                state.click_failures -= 1;
                return Err(Error::driver("Element is not attached to the DOM"));
            }
        }

        self.require_element(selector).map(|_| ())
    }

    async fn fill(&self, selector: &str, value: &str, _timeout: Duration) -> Result<()> {
        self.record(format!("fill:{selector}:{value}"));
        self.require_element(selector)?;

        let mut state = self.state.lock();
        let stored = state.fill_override.clone().unwrap_or_else(|| value.to_string());
        if let Some(element) = state.elements.get_mut(selector) {
            element.attributes.insert("value".to_string(), stored);
        }
        Ok(())
    }

    async fn goto(
        &self,
        url: &str,
        wait_until: WaitUntil,
        _timeout: Duration,
    ) -> Result<Option<PageResponse>> {
        self.record(format!("goto:{url}:{wait_until}"));

        let mut state = self.state.lock();
        if state.fail_navigation {
            return Err(Error::driver("net::ERR_NAME_NOT_RESOLVED"));
        }

        let keep = state.history_index + 1;
        state.history.truncate(keep);
        state.history.push(url.to_string());
        state.history_index = state.history.len() - 1;
        state.url = url.to_string();

        Ok(Some(PageResponse {
            status: state.goto_status.unwrap_or(200),
        }))
    }

    async fn hover(&self, selector: &str, _options: &HoverOptions, _timeout: Duration) -> Result<()> {
        self.record(format!("hover:{selector}"));
        self.require_element(selector).map(|_| ())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()> {
        self.record(format!("wait:{selector}:{state}"));

        let element = self.element(selector);
        let reached = match state {
            ElementState::Visible => element.is_some_and(|e| e.visible),
            ElementState::Hidden => element.is_none_or(|e| !e.visible),
            ElementState::Attached => element.is_some(),
            ElementState::Detached => element.is_none(),
        };

        if reached {
            Ok(())
        } else {
            Err(Error::driver(format!(
                "Timeout {}ms exceeded waiting for '{selector}' to be {state}",
                timeout.as_millis()
            )))
        }
    }

    fn locator(&self, selector: &str) -> Box<dyn Locator> {
        Box::new(MockLocator {
            driver: self.clone(),
            selector: selector.to_string(),
        })
    }

    async fn reload(&self) -> Result<Option<PageResponse>> {
        self.record("reload".to_string());
        Ok(Some(PageResponse { status: 200 }))
    }

    async fn go_back(&self) -> Result<Option<PageResponse>> {
        self.record("back".to_string());
        let mut state = self.state.lock();
        if state.history_index == 0 {
            return Ok(None);
        }
        state.history_index -= 1;
        state.url = state.history[state.history_index].clone();
        Ok(Some(PageResponse { status: 200 }))
    }

    async fn go_forward(&self) -> Result<Option<PageResponse>> {
        self.record("forward".to_string());
        let mut state = self.state.lock();
        if state.history_index + 1 >= state.history.len() {
            return Ok(None);
        }
        state.history_index += 1;
        state.url = state.history[state.history_index].clone();
        Ok(Some(PageResponse { status: 200 }))
    }

    async fn mouse_wheel(&self, delta_x: i64, delta_y: i64) -> Result<()> {
        self.record(format!("wheel:{delta_x}:{delta_y}"));
        Ok(())
    }

    fn url(&self) -> String {
        self.state.lock().url.clone()
    }
}

// ============================================================================
// Locator
// ============================================================================

struct MockLocator {
    driver: MockDriver,
    selector: String,
}

#[async_trait]
impl Locator for MockLocator {
    async fn is_visible(&self) -> Result<bool> {
        Ok(self.driver.element(&self.selector).is_some_and(|e| e.visible))
    }

    async fn is_enabled(&self) -> Result<bool> {
        self.driver
            .require_element(&self.selector)
            .map(|element| element.enabled)
    }

    async fn text_content(&self) -> Result<Option<String>> {
        self.driver
            .require_element(&self.selector)
            .map(|element| element.text)
    }

    async fn get_attribute(&self, name: &str) -> Result<Option<String>> {
        self.driver
            .require_element(&self.selector)
            .map(|element| element.attributes.get(name).cloned())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let element = self.driver.require_element(&self.selector)?;
        if expression.contains("tagName") {
            Ok(Value::String(element.tag.to_lowercase()))
        } else {
            Ok(Value::Null)
        }
    }

    async fn scroll_into_view_if_needed(&self) -> Result<()> {
        self.driver
            .record(format!("scroll_into_view:{}", self.selector));
        self.driver.require_element(&self.selector).map(|_| ())
    }
}
