//! Concrete browser actions.
//!
//! | Action | Type | Readiness check |
//! |--------|------|-----------------|
//! | [`ClickAction`] | `click` | element visible |
//! | [`FillAction`] | `fill` | element visible and enabled |
//! | [`NavigationAction`] | `navigate` | none |
//! | [`WaitAction`] | `wait` | none |
//! | [`HoverAction`] | `hover` | element visible |
//! | [`ScrollAction`] | `scroll` | none |
//!
//! Driver failures inside `execute` are reported as failure results
//! carrying the selector or URL in their metadata, so the hook cycle
//! retries them like any other failure.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value, json};
use tokio::time::sleep;

use crate::error::{Error, Result};
use crate::page::{ClickOptions, ElementState, HoverOptions, KeyModifier, MouseButton, Page, Position, WaitUntil};
use crate::results::ActionResult;
use crate::validation::{validate_selector, validate_url};

use super::base::{Action, ActionConfig};

// ============================================================================
// Constants
// ============================================================================

/// Default distance of a directional scroll.
pub const DEFAULT_SCROLL_PIXELS: u32 = 300;

/// Largest accepted click count.
pub const MAX_CLICK_COUNT: u32 = 10;

// ============================================================================
// Helpers
// ============================================================================

fn checked_selector(selector: &str) -> Result<String> {
    if !validate_selector(selector) {
        return Err(Error::validation(
            "selector",
            format!("Invalid selector format: {selector}"),
        ));
    }
    Ok(selector.trim().to_string())
}

fn object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

async fn require_visible(page: &Page, selector: &str, message: &str) -> Result<()> {
    if page.is_element_visible(selector).await {
        return Ok(());
    }
    Err(Error::element_state(
        format!("{message}: {selector}"),
        selector,
        ElementState::Visible.as_str(),
        page.current_url(),
    ))
}

// ============================================================================
// ClickAction
// ============================================================================

/// Clicks an element.
///
/// # Example
///
/// ```ignore
/// let click = ClickAction::new("#submit")?
///     .with_button(MouseButton::Right)
///     .with_modifiers([KeyModifier::Shift]);
/// let result = click.execute_with_hooks(&page).await;
/// ```
#[derive(Debug, Clone)]
pub struct ClickAction {
    config: ActionConfig,
    selector: String,
    button: MouseButton,
    modifiers: Vec<KeyModifier>,
    position: Option<Position>,
    click_count: u32,
    force: bool,
}

impl ClickAction {
    /// Action type of click actions.
    pub const ACTION_TYPE: &'static str = "click";

    /// Creates a left click on `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the selector is malformed.
    pub fn new(selector: &str) -> Result<Self> {
        Ok(Self {
            config: ActionConfig::builtin(Self::ACTION_TYPE),
            selector: checked_selector(selector)?,
            button: MouseButton::Left,
            modifiers: Vec::new(),
            position: None,
            click_count: 1,
            force: false,
        })
    }

    /// Sets the mouse button.
    #[inline]
    #[must_use]
    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    /// Sets the modifiers held during the click.
    #[inline]
    #[must_use]
    pub fn with_modifiers(mut self, modifiers: impl IntoIterator<Item = KeyModifier>) -> Self {
        self.modifiers = modifiers.into_iter().collect();
        self
    }

    /// Sets the click offset inside the element.
    #[inline]
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets the number of clicks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] outside 1 to 10.
    pub fn with_click_count(mut self, click_count: u32) -> Result<Self> {
        if !(1..=MAX_CLICK_COUNT).contains(&click_count) {
            return Err(Error::validation(
                "click_count",
                format!("click_count must be between 1 and {MAX_CLICK_COUNT}, got {click_count}"),
            ));
        }
        self.click_count = click_count;
        Ok(self)
    }

    /// Skips actionability checks in the driver.
    #[inline]
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Returns the selector.
    #[inline]
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Returns the mouse button.
    #[inline]
    #[must_use]
    pub fn button(&self) -> MouseButton {
        self.button
    }
}

#[async_trait]
impl Action for ClickAction {
    fn config(&self) -> &ActionConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ActionConfig {
        &mut self.config
    }

    async fn pre_execute(&self, page: &Page) -> Result<()> {
        self.config.pre_execute(page).await?;
        require_visible(page, &self.selector, "Element not visible").await
    }

    async fn execute(&self, page: &Page) -> Result<ActionResult> {
        let options = ClickOptions {
            button: self.button,
            modifiers: self.modifiers.clone(),
            position: self.position,
            click_count: self.click_count,
            force: self.force,
            timeout: Some(self.config.timeout()),
        };

        if let Err(e) = page.click_with(&self.selector, &options).await {
            return Ok(
                ActionResult::failure(format!("Click failed on '{}': {e}", self.selector))
                    .with_action_type(Self::ACTION_TYPE)
                    .with_metadata("selector", self.selector.as_str())
                    .with_metadata("button", self.button.as_str()),
            );
        }

        let modifiers: Vec<&str> = self.modifiers.iter().map(|m| m.as_str()).collect();
        Ok(ActionResult::success(object(json!({
            "selector": self.selector,
            "button": self.button,
            "click_count": self.click_count,
            "position": self.position,
        })))
        .with_action_type(Self::ACTION_TYPE)
        .with_metadata("modifiers", json!(modifiers))
        .with_metadata("forced", self.force))
    }
}

// ============================================================================
// FillAction
// ============================================================================

/// Fills a form field, optionally clearing it first and verifying the
/// resulting `value` attribute.
#[derive(Debug, Clone)]
pub struct FillAction {
    config: ActionConfig,
    selector: String,
    value: String,
    clear_first: bool,
    verify_fill: bool,
}

impl FillAction {
    /// Action type of fill actions.
    pub const ACTION_TYPE: &'static str = "fill";

    /// Creates a fill of `value` into `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the selector is malformed.
    pub fn new(selector: &str, value: impl Into<String>) -> Result<Self> {
        Ok(Self {
            config: ActionConfig::builtin(Self::ACTION_TYPE),
            selector: checked_selector(selector)?,
            value: value.into(),
            clear_first: true,
            verify_fill: true,
        })
    }

    /// Sets whether the field is emptied before filling.
    #[inline]
    #[must_use]
    pub fn with_clear_first(mut self, clear_first: bool) -> Self {
        self.clear_first = clear_first;
        self
    }

    /// Sets whether the `value` attribute is checked after filling.
    #[inline]
    #[must_use]
    pub fn with_verify_fill(mut self, verify_fill: bool) -> Self {
        self.verify_fill = verify_fill;
        self
    }

    /// Returns the selector.
    #[inline]
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Returns the value to fill.
    #[inline]
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    fn failure(&self, error: String) -> ActionResult {
        ActionResult::failure(error)
            .with_action_type(Self::ACTION_TYPE)
            .with_metadata("selector", self.selector.as_str())
            .with_metadata("value", self.value.as_str())
    }
}

#[async_trait]
impl Action for FillAction {
    fn config(&self) -> &ActionConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ActionConfig {
        &mut self.config
    }

    async fn pre_execute(&self, page: &Page) -> Result<()> {
        self.config.pre_execute(page).await?;
        require_visible(page, &self.selector, "Element not visible").await?;

        if !page.is_element_enabled(&self.selector).await {
            return Err(Error::element(
                format!("Element not enabled: {}", self.selector),
                &self.selector,
            ));
        }
        Ok(())
    }

    async fn execute(&self, page: &Page) -> Result<ActionResult> {
        let timeout = Some(self.config.timeout());

        let original_value = if self.verify_fill {
            page.get_element_attribute(&self.selector, "value").await
        } else {
            None
        };

        if self.clear_first
            && let Err(e) = page.clear(&self.selector, timeout).await
        {
            return Ok(self.failure(format!("Fill failed on '{}': {e}", self.selector)));
        }

        if let Err(e) = page.fill(&self.selector, &self.value, timeout).await {
            return Ok(self.failure(format!("Fill failed on '{}': {e}", self.selector)));
        }

        let mut final_value = None;
        if self.verify_fill {
            final_value = page.get_element_attribute(&self.selector, "value").await;
            if final_value.as_deref() != Some(self.value.as_str()) {
                let actual = final_value.as_deref().unwrap_or("None");
                return Ok(ActionResult::failure(format!(
                    "Fill verification failed. Expected '{}', got '{actual}'",
                    self.value
                ))
                .with_action_type(Self::ACTION_TYPE)
                .with_metadata("selector", self.selector.as_str())
                .with_metadata("expected_value", self.value.as_str())
                .with_metadata("actual_value", final_value));
            }
        }

        Ok(ActionResult::success(object(json!({
            "selector": self.selector,
            "value": self.value,
            "original_value": original_value,
            "verified": self.verify_fill,
        })))
        .with_action_type(Self::ACTION_TYPE)
        .with_metadata("cleared_first", self.clear_first)
        .with_metadata("final_value", final_value))
    }
}

// ============================================================================
// NavigationAction
// ============================================================================

/// Navigates to a URL and optionally verifies where the page ended up.
///
/// Verification matches the final URL against `expected_url_pattern` when
/// set; otherwise the final URL must start with the target URL minus its
/// query string.
#[derive(Debug, Clone)]
pub struct NavigationAction {
    config: ActionConfig,
    url: String,
    wait_until: WaitUntil,
    expected_url_pattern: Option<Regex>,
    verify_navigation: bool,
}

impl NavigationAction {
    /// Action type of navigation actions.
    pub const ACTION_TYPE: &'static str = "navigate";

    /// Creates a navigation to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the URL is malformed.
    pub fn new(url: &str) -> Result<Self> {
        if !validate_url(url) {
            return Err(Error::validation("url", format!("Invalid URL format: {url}")));
        }

        Ok(Self {
            config: ActionConfig::builtin(Self::ACTION_TYPE),
            url: url.trim().to_string(),
            wait_until: WaitUntil::Load,
            expected_url_pattern: None,
            verify_navigation: true,
        })
    }

    /// Sets when navigation counts as complete.
    #[inline]
    #[must_use]
    pub fn with_wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.wait_until = wait_until;
        self
    }

    /// Sets a regular expression the final URL must match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the pattern does not compile.
    pub fn with_expected_url_pattern(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            Error::validation(
                "expected_url_pattern",
                format!("Invalid URL pattern '{pattern}': {e}"),
            )
        })?;
        self.expected_url_pattern = Some(regex);
        Ok(self)
    }

    /// Sets whether the final URL is verified.
    #[inline]
    #[must_use]
    pub fn with_verify_navigation(mut self, verify_navigation: bool) -> Self {
        self.verify_navigation = verify_navigation;
        self
    }

    /// Returns the target URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn verify(&self, final_url: &str) -> Option<ActionResult> {
        if !self.verify_navigation {
            return None;
        }

        if let Some(pattern) = &self.expected_url_pattern {
            if pattern.is_match(final_url) {
                return None;
            }
            return Some(
                ActionResult::failure(format!(
                    "Navigation verification failed. URL '{final_url}' doesn't match pattern '{}'",
                    pattern.as_str()
                ))
                .with_action_type(Self::ACTION_TYPE)
                .with_metadata("target_url", self.url.as_str())
                .with_metadata("final_url", final_url)
                .with_metadata("pattern", pattern.as_str()),
            );
        }

        let expected_prefix = self.url.split('?').next().unwrap_or_default();
        if final_url.starts_with(expected_prefix) {
            return None;
        }
        Some(
            ActionResult::failure(format!(
                "Navigation verification failed. Expected to be at '{}', but at '{final_url}'",
                self.url
            ))
            .with_action_type(Self::ACTION_TYPE)
            .with_metadata("target_url", self.url.as_str())
            .with_metadata("final_url", final_url),
        )
    }
}

#[async_trait]
impl Action for NavigationAction {
    fn config(&self) -> &ActionConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ActionConfig {
        &mut self.config
    }

    async fn execute(&self, page: &Page) -> Result<ActionResult> {
        let original_url = page.current_url();

        if let Err(e) = page
            .navigate(&self.url, self.wait_until, Some(self.config.timeout()))
            .await
        {
            return Ok(
                ActionResult::failure(format!("Navigation failed to '{}': {e}", self.url))
                    .with_action_type(Self::ACTION_TYPE)
                    .with_metadata("target_url", self.url.as_str()),
            );
        }

        let final_url = page.current_url();
        if let Some(failure) = self.verify(&final_url) {
            return Ok(failure);
        }

        Ok(ActionResult::success(object(json!({
            "target_url": self.url,
            "original_url": original_url,
            "final_url": final_url,
            "wait_until": self.wait_until,
        })))
        .with_action_type(Self::ACTION_TYPE)
        .with_metadata("verified", self.verify_navigation)
        .with_metadata("url_changed", original_url != final_url))
    }
}

// ============================================================================
// WaitAction
// ============================================================================

#[derive(Debug, Clone)]
enum WaitTarget {
    Fixed(Duration),
    Element {
        selector: String,
        state: ElementState,
        condition_text: Option<String>,
    },
}

/// Waits for a fixed duration or for an element to reach a state.
///
/// An element wait may also require `condition_text` to appear in the
/// element's text; the text is checked only for the `visible` and
/// `attached` states.
#[derive(Debug, Clone)]
pub struct WaitAction {
    config: ActionConfig,
    target: WaitTarget,
}

impl WaitAction {
    /// Action type of wait actions.
    pub const ACTION_TYPE: &'static str = "wait";

    /// Creates a fixed-duration wait.
    ///
    /// The duration counts against the action's timeout.
    #[must_use]
    pub fn for_duration(duration: Duration) -> Self {
        Self {
            config: ActionConfig::builtin(Self::ACTION_TYPE),
            target: WaitTarget::Fixed(duration),
        }
    }

    /// Creates a wait for `selector` to become visible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the selector is malformed.
    pub fn for_element(selector: &str) -> Result<Self> {
        Ok(Self {
            config: ActionConfig::builtin(Self::ACTION_TYPE),
            target: WaitTarget::Element {
                selector: checked_selector(selector)?,
                state: ElementState::Visible,
                condition_text: None,
            },
        })
    }

    /// Sets the element state to wait for. No effect on fixed waits.
    #[must_use]
    pub fn with_state(mut self, state: ElementState) -> Self {
        if let WaitTarget::Element { state: current, .. } = &mut self.target {
            *current = state;
        }
        self
    }

    /// Requires `text` to appear in the element's text. No effect on fixed
    /// waits.
    #[must_use]
    pub fn with_condition_text(mut self, text: impl Into<String>) -> Self {
        if let WaitTarget::Element { condition_text, .. } = &mut self.target {
            *condition_text = Some(text.into());
        }
        self
    }
}

#[async_trait]
impl Action for WaitAction {
    fn config(&self) -> &ActionConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ActionConfig {
        &mut self.config
    }

    async fn execute(&self, page: &Page) -> Result<ActionResult> {
        let (selector, state, condition_text) = match &self.target {
            WaitTarget::Fixed(duration) => {
                sleep(*duration).await;
                return Ok(ActionResult::success(object(json!({
                    "wait_time": duration.as_secs_f64(),
                })))
                .with_action_type(Self::ACTION_TYPE));
            }
            WaitTarget::Element {
                selector,
                state,
                condition_text,
            } => (selector, *state, condition_text),
        };

        if let Err(e) = page
            .wait_for_element(selector, state, Some(self.config.timeout()))
            .await
        {
            return Ok(ActionResult::failure(format!("Wait failed: {e}"))
                .with_action_type(Self::ACTION_TYPE)
                .with_metadata("selector", selector.as_str())
                .with_metadata("state", state.as_str()));
        }

        if let Some(expected) = condition_text
            && matches!(state, ElementState::Visible | ElementState::Attached)
        {
            let text = page.get_element_text(selector).await.unwrap_or_default();
            if !text.contains(expected.as_str()) {
                return Ok(ActionResult::failure(format!(
                    "Element text condition not met. Expected '{expected}' in '{text}'"
                ))
                .with_action_type(Self::ACTION_TYPE));
            }
        }

        Ok(ActionResult::success(object(json!({
            "selector": selector,
            "state": state,
            "condition_text": condition_text,
        })))
        .with_action_type(Self::ACTION_TYPE))
    }
}

// ============================================================================
// HoverAction
// ============================================================================

/// Moves the pointer over an element.
#[derive(Debug, Clone)]
pub struct HoverAction {
    config: ActionConfig,
    selector: String,
    position: Option<Position>,
    force: bool,
}

impl HoverAction {
    /// Action type of hover actions.
    pub const ACTION_TYPE: &'static str = "hover";

    /// Creates a hover over `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the selector is malformed.
    pub fn new(selector: &str) -> Result<Self> {
        Ok(Self {
            config: ActionConfig::builtin(Self::ACTION_TYPE),
            selector: checked_selector(selector)?,
            position: None,
            force: false,
        })
    }

    /// Sets the pointer offset inside the element.
    #[inline]
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Skips actionability checks in the driver.
    #[inline]
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

#[async_trait]
impl Action for HoverAction {
    fn config(&self) -> &ActionConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ActionConfig {
        &mut self.config
    }

    async fn pre_execute(&self, page: &Page) -> Result<()> {
        self.config.pre_execute(page).await?;
        require_visible(page, &self.selector, "Element not visible for hover").await
    }

    async fn execute(&self, page: &Page) -> Result<ActionResult> {
        let options = HoverOptions {
            position: self.position,
            force: self.force,
            timeout: Some(self.config.timeout()),
        };

        if let Err(e) = page.hover(&self.selector, &options).await {
            return Ok(
                ActionResult::failure(format!("Hover failed on '{}': {e}", self.selector))
                    .with_action_type(Self::ACTION_TYPE)
                    .with_metadata("selector", self.selector.as_str()),
            );
        }

        Ok(ActionResult::success(object(json!({
            "selector": self.selector,
            "position": self.position,
        })))
        .with_action_type(Self::ACTION_TYPE)
        .with_metadata("forced", self.force))
    }
}

// ============================================================================
// ScrollAction
// ============================================================================

string_enum! {
    /// Direction of a [`ScrollAction`].
    pub enum ScrollDirection ("direction") {
        /// Towards the top.
        Up => "up",
        /// Towards the bottom.
        Down => "down",
        /// Towards the left edge.
        Left => "left",
        /// Towards the right edge.
        Right => "right",
    }
}

impl Default for ScrollDirection {
    fn default() -> Self {
        Self::Down
    }
}

impl ScrollDirection {
    /// Returns the wheel delta for scrolling `pixels` in this direction.
    #[must_use]
    pub fn delta(self, pixels: u32) -> (i64, i64) {
        let pixels = i64::from(pixels);
        match self {
            Self::Up => (0, -pixels),
            Self::Down => (0, pixels),
            Self::Left => (-pixels, 0),
            Self::Right => (pixels, 0),
        }
    }
}

/// Scrolls the page, or brings an element into view.
///
/// With `to_element` set the action only scrolls that element into view.
/// With `selector` set the element is scrolled into view instead of
/// wheeling the page.
#[derive(Debug, Clone)]
pub struct ScrollAction {
    config: ActionConfig,
    direction: ScrollDirection,
    pixels: u32,
    selector: Option<String>,
    to_element: Option<String>,
}

impl Default for ScrollAction {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollAction {
    /// Action type of scroll actions.
    pub const ACTION_TYPE: &'static str = "scroll";

    /// Creates a 300 pixel downward page scroll.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ActionConfig::builtin(Self::ACTION_TYPE),
            direction: ScrollDirection::Down,
            pixels: DEFAULT_SCROLL_PIXELS,
            selector: None,
            to_element: None,
        }
    }

    /// Sets the direction.
    #[inline]
    #[must_use]
    pub fn with_direction(mut self, direction: ScrollDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the distance in pixels.
    #[inline]
    #[must_use]
    pub fn with_pixels(mut self, pixels: u32) -> Self {
        self.pixels = pixels;
        self
    }

    /// Scrolls `selector` into view instead of wheeling the page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the selector is malformed.
    pub fn with_selector(mut self, selector: &str) -> Result<Self> {
        self.selector = Some(checked_selector(selector)?);
        Ok(self)
    }

    /// Scrolls until `selector` is in view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the selector is malformed.
    pub fn to_element(mut self, selector: &str) -> Result<Self> {
        self.to_element = Some(checked_selector(selector)?);
        Ok(self)
    }

    async fn scroll(&self, page: &Page) -> Result<ActionResult> {
        if let Some(target) = &self.to_element {
            page.scroll_into_view(target).await?;
            return Ok(ActionResult::success(object(json!({ "to_element": target })))
                .with_action_type(Self::ACTION_TYPE));
        }

        let (delta_x, delta_y) = self.direction.delta(self.pixels);
        match &self.selector {
            Some(selector) => page.scroll_into_view(selector).await?,
            None => page.mouse_wheel(delta_x, delta_y).await?,
        }

        Ok(ActionResult::success(object(json!({
            "direction": self.direction,
            "pixels": self.pixels,
            "selector": self.selector,
        })))
        .with_action_type(Self::ACTION_TYPE)
        .with_metadata("delta_x", delta_x)
        .with_metadata("delta_y", delta_y))
    }
}

#[async_trait]
impl Action for ScrollAction {
    fn config(&self) -> &ActionConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ActionConfig {
        &mut self.config
    }

    async fn execute(&self, page: &Page) -> Result<ActionResult> {
        match self.scroll(page).await {
            Ok(result) => Ok(result),
            Err(e) => Ok(ActionResult::failure(format!("Scroll failed: {e}"))
                .with_action_type(Self::ACTION_TYPE)
                .with_metadata("direction", self.direction.as_str())
                .with_metadata("selector", self.selector.clone())
                .with_metadata("to_element", self.to_element.clone())),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
