//! Element interaction methods.

use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Error, Result};
use crate::events::{InteractionAction, InteractionEvent};
use crate::validation::sanitize_element_text;

use super::Page;
use super::driver::{BrowserDriver, ClickOptions, HoverOptions};

const TAG_NAME_SCRIPT: &str = "el => el.tagName.toLowerCase()";

// ============================================================================
// Page - Interaction
// ============================================================================

impl Page {
    /// Left-clicks an element with default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionExecution`] if no driver is attached or the
    /// click fails.
    pub async fn click(&self, selector: &str) -> Result<()> {
        self.click_with(selector, &ClickOptions::default()).await
    }

    /// Clicks an element and emits an `interaction` event.
    ///
    /// The event carries the element's sanitized text and tag name when the
    /// driver can report them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionExecution`] if no driver is attached or the
    /// click fails.
    pub async fn click_with(&self, selector: &str, options: &ClickOptions) -> Result<()> {
        let driver = self.require_driver("click", Some(selector))?;
        let timeout = self.resolve_timeout(options.timeout);

        debug!(session_id = %self.session_id(), selector, button = %options.button, "Clicking");

        self.perform_click(driver.as_ref(), selector, options, timeout)
            .await
            .map_err(|e| {
                Error::action_failed(
                    format!("Click failed on selector '{selector}': {e}"),
                    "click",
                    Some(selector),
                )
            })
    }

    /// Fills an input and emits an `interaction` event carrying the value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionExecution`] if no driver is attached or the
    /// fill fails.
    pub async fn fill(&self, selector: &str, value: &str, timeout: Option<Duration>) -> Result<()> {
        self.fill_as(selector, value, timeout, InteractionAction::Fill)
            .await
    }

    /// Empties an input and emits an `interaction` event with action `clear`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionExecution`] if no driver is attached or the
    /// fill fails.
    pub async fn clear(&self, selector: &str, timeout: Option<Duration>) -> Result<()> {
        self.fill_as(selector, "", timeout, InteractionAction::Clear)
            .await
    }

    /// Hovers over an element and emits an `interaction` event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionExecution`] if no driver is attached or the
    /// hover fails.
    pub async fn hover(&self, selector: &str, options: &HoverOptions) -> Result<()> {
        let driver = self.require_driver("hover", Some(selector))?;
        let timeout = self.resolve_timeout(options.timeout);

        debug!(session_id = %self.session_id(), selector, "Hovering");

        self.perform_hover(driver.as_ref(), selector, options, timeout)
            .await
            .map_err(|e| {
                Error::action_failed(
                    format!("Hover failed on selector '{selector}': {e}"),
                    "hover",
                    Some(selector),
                )
            })
    }
}

// ============================================================================
// Page - Internal
// ============================================================================

impl Page {
    async fn fill_as(
        &self,
        selector: &str,
        value: &str,
        timeout: Option<Duration>,
        action: InteractionAction,
    ) -> Result<()> {
        let operation = action.as_str();
        let driver = self.require_driver(operation, Some(selector))?;
        let timeout = self.resolve_timeout(timeout);

        debug!(session_id = %self.session_id(), selector, action = %action, "Filling");

        self.perform_fill(driver.as_ref(), selector, value, timeout, action)
            .await
            .map_err(|e| {
                Error::action_failed(
                    format!("Fill failed on selector '{selector}': {e}"),
                    operation,
                    Some(selector),
                )
            })
    }

    async fn perform_click(
        &self,
        driver: &dyn BrowserDriver,
        selector: &str,
        options: &ClickOptions,
        timeout: Duration,
    ) -> Result<()> {
        driver.click(selector, options, timeout).await?;

        let (element_text, element_tag) = describe_element(driver, selector).await;

        let base = self
            .event_base()?
            .with_metadata("button", options.button.as_str())
            .with_metadata("timeout", timeout.as_secs_f64())
            .with_metadata("click_count", options.click_count)
            .with_metadata("force", options.force)
            .with_metadata("modifiers", modifier_list(options))
            .with_metadata("position", position_value(options));

        let mut event = InteractionEvent::new(base, InteractionAction::Click, selector)?;
        if let Some(text) = element_text {
            event = event.with_element_text(text);
        }
        if let Some(tag) = element_tag {
            event = event.with_element_tag(tag);
        }

        self.emit(event).await;
        Ok(())
    }

    async fn perform_fill(
        &self,
        driver: &dyn BrowserDriver,
        selector: &str,
        value: &str,
        timeout: Duration,
        action: InteractionAction,
    ) -> Result<()> {
        driver.fill(selector, value, timeout).await?;

        let element_tag = element_tag(driver, selector).await;

        let base = self
            .event_base()?
            .with_metadata("timeout", timeout.as_secs_f64());
        let mut event = InteractionEvent::new(base, action, selector)?.with_value(value);
        if let Some(tag) = element_tag {
            event = event.with_element_tag(tag);
        }

        self.emit(event).await;
        Ok(())
    }

    async fn perform_hover(
        &self,
        driver: &dyn BrowserDriver,
        selector: &str,
        options: &HoverOptions,
        timeout: Duration,
    ) -> Result<()> {
        driver.hover(selector, options, timeout).await?;

        let mut base = self
            .event_base()?
            .with_metadata("timeout", timeout.as_secs_f64())
            .with_metadata("force", options.force);
        if let Some(position) = options.position {
            base = base.with_metadata("position", json!(position));
        }

        let event = InteractionEvent::new(base, InteractionAction::Hover, selector)?;
        self.emit(event).await;
        Ok(())
    }
}

/// Reads the element's sanitized text and tag. Failures yield `None`.
async fn describe_element(
    driver: &dyn BrowserDriver,
    selector: &str,
) -> (Option<String>, Option<String>) {
    let locator = driver.locator(selector);
    let text = locator
        .text_content()
        .await
        .ok()
        .flatten()
        .map(|text| sanitize_element_text(&text))
        .filter(|text| !text.is_empty());
    let tag = element_tag(driver, selector).await;
    (text, tag)
}

async fn element_tag(driver: &dyn BrowserDriver, selector: &str) -> Option<String> {
    match driver.locator(selector).evaluate(TAG_NAME_SCRIPT).await {
        Ok(Value::String(tag)) if !tag.is_empty() => Some(tag),
        _ => None,
    }
}

fn modifier_list(options: &ClickOptions) -> Value {
    Value::Array(
        options
            .modifiers
            .iter()
            .map(|modifier| Value::String(modifier.as_str().to_string()))
            .collect(),
    )
}

fn position_value(options: &ClickOptions) -> Value {
    options.position.map_or(Value::Null, |position| json!(position))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::events::Event;
    use crate::page::driver::{KeyModifier, MouseButton};
    use crate::page::mock::{MockDriver, MockElement};

    fn page_with(driver: &MockDriver) -> Page {
        let page = Page::new("https://example.com", "session-1").unwrap();
        page.set_driver(Arc::new(driver.clone()));
        page
    }

    fn capture(page: &Page) -> Arc<Mutex<Vec<Arc<Event>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        page.on("interaction", move |event| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(event);
                Ok(())
            }
        });
        seen
    }

    #[tokio::test]
    async fn test_click_emits_interaction_with_element_info() {
        let driver = MockDriver::new("https://example.com").with_element(
            "#submit",
            MockElement::new("BUTTON").with_text("  <b>Sign</b>\n in  "),
        );
        let page = page_with(&driver);
        let seen = capture(&page);

        page.click("#submit").await.unwrap();

        let events = seen.lock();
        assert_eq!(events.len(), 1);
        let Event::Interaction(event) = events[0].as_ref() else {
            panic!("expected interaction event");
        };
        assert_eq!(event.action(), InteractionAction::Click);
        assert_eq!(event.selector(), "#submit");
        assert_eq!(event.element_text(), Some("Sign in"));
        assert_eq!(event.element_tag(), Some("button"));
        assert_eq!(events[0].metadata()["button"], "left");
        assert_eq!(events[0].metadata()["timeout"], 30.0);
    }

    #[tokio::test]
    async fn test_click_options_recorded_in_metadata() {
        let driver =
            MockDriver::new("https://example.com").with_element("#menu", MockElement::new("div"));
        let page = page_with(&driver);
        let seen = capture(&page);

        let options = ClickOptions {
            button: MouseButton::Right,
            modifiers: vec![KeyModifier::Shift],
            timeout: Some(Duration::from_secs(5)),
            ..ClickOptions::default()
        };
        page.click_with("#menu", &options).await.unwrap();

        let events = seen.lock();
        let metadata = events[0].metadata();
        assert_eq!(metadata["button"], "right");
        assert_eq!(metadata["timeout"], 5.0);
        assert_eq!(metadata["modifiers"], json!(["Shift"]));
        assert_eq!(driver.calls(), vec!["click:#menu:right".to_string()]);
    }

    #[tokio::test]
    async fn test_click_without_driver_fails() {
        let page = Page::new("https://example.com", "session-1").unwrap();
        let err = page.click("#submit").await.unwrap_err();

        assert!(err.is_execution_error());
        assert!(err.to_string().contains("not initialized"));
    }

    #[tokio::test]
    async fn test_click_failure_wrapped_and_no_event() {
        let driver = MockDriver::new("https://example.com");
        let page = page_with(&driver);
        let seen = capture(&page);

        let err = page.click("#missing").await.unwrap_err();

        assert!(err.to_string().contains("Click failed on selector '#missing'"));
        assert!(seen.lock().is_empty());
        match err {
            Error::ActionExecution {
                action_type,
                selector,
                ..
            } => {
                assert_eq!(action_type.as_deref(), Some("click"));
                assert_eq!(selector.as_deref(), Some("#missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fill_and_clear_emit_value() {
        let driver =
            MockDriver::new("https://example.com").with_element("#email", MockElement::new("input"));
        let page = page_with(&driver);
        let seen = capture(&page);

        page.fill("#email", "user@example.com", None).await.unwrap();
        page.clear("#email", None).await.unwrap();

        let events = seen.lock();
        assert_eq!(events.len(), 2);
        let Event::Interaction(fill) = events[0].as_ref() else {
            panic!("expected interaction event");
        };
        assert_eq!(fill.action(), InteractionAction::Fill);
        assert_eq!(fill.value(), Some("user@example.com"));
        assert_eq!(fill.element_tag(), Some("input"));

        let Event::Interaction(clear) = events[1].as_ref() else {
            panic!("expected interaction event");
        };
        assert_eq!(clear.action(), InteractionAction::Clear);
        assert_eq!(clear.value(), Some(""));
        assert_eq!(
            driver.element("#email").unwrap().attributes.get("value").map(String::as_str),
            Some("")
        );
    }

    #[tokio::test]
    async fn test_hover_emits_event() {
        let driver =
            MockDriver::new("https://example.com").with_element("#card", MockElement::new("div"));
        let page = page_with(&driver);
        let seen = capture(&page);

        page.hover("#card", &HoverOptions::default()).await.unwrap();

        let events = seen.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].selector(), Some("#card"));

        let err = page
            .hover("#nope", &HoverOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Hover failed"));
    }
}
