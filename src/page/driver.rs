//! Browser driver capability surface.
//!
//! [`BrowserDriver`] is the narrow set of primitives a [`Page`](crate::Page)
//! needs from an automation backend. Any backend exposing these calls can be
//! attached; nothing here assumes a particular one.
//!
//! # Primitives
//!
//! | Call | Purpose |
//! |------|---------|
//! | `click` / `fill` / `hover` | Element interaction |
//! | `goto` / `reload` / `go_back` / `go_forward` | Navigation |
//! | `wait_for_selector` | Wait for an element state |
//! | `locator` | Element queries via [`Locator`] |
//! | `mouse_wheel` | Page scrolling |
//! | `url` | Current URL |
//!
//! Backends report failures as [`Error::Driver`](crate::Error::Driver).

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

// ============================================================================
// Vocabularies
// ============================================================================

string_enum! {
    /// Mouse button used for a click.
    pub enum MouseButton ("button") {
        /// Primary button.
        Left => "left",
        /// Secondary button.
        Right => "right",
        /// Wheel button.
        Middle => "middle",
    }
}

impl Default for MouseButton {
    fn default() -> Self {
        Self::Left
    }
}

string_enum! {
    /// Keyboard modifier held during a click.
    pub enum KeyModifier ("modifier") {
        /// Shift.
        Shift => "Shift",
        /// Control.
        Control => "Control",
        /// Alt.
        Alt => "Alt",
        /// Meta.
        Meta => "Meta",
    }
}

string_enum! {
    /// When a navigation counts as complete.
    pub enum WaitUntil ("wait_until") {
        /// `load` fired.
        Load => "load",
        /// `DOMContentLoaded` fired.
        DomContentLoaded => "domcontentloaded",
        /// No network activity for a while.
        NetworkIdle => "networkidle",
        /// Response received.
        Commit => "commit",
    }
}

impl Default for WaitUntil {
    fn default() -> Self {
        Self::Load
    }
}

string_enum! {
    /// Element state to wait for.
    pub enum ElementState ("state") {
        /// Attached and visible.
        Visible => "visible",
        /// Detached or invisible.
        Hidden => "hidden",
        /// Present in the DOM.
        Attached => "attached",
        /// Absent from the DOM.
        Detached => "detached",
    }
}

impl Default for ElementState {
    fn default() -> Self {
        Self::Visible
    }
}

// ============================================================================
// Options
// ============================================================================

/// Offset inside an element's box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    /// Horizontal offset in CSS pixels.
    pub x: f64,
    /// Vertical offset in CSS pixels.
    pub y: f64,
}

impl Position {
    /// Creates a position.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Options for [`BrowserDriver::click`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClickOptions {
    /// Mouse button.
    pub button: MouseButton,
    /// Modifiers held during the click.
    pub modifiers: Vec<KeyModifier>,
    /// Offset inside the element.
    pub position: Option<Position>,
    /// Number of clicks.
    pub click_count: u32,
    /// Skip actionability checks.
    pub force: bool,
    /// Per-call timeout. `None` uses the page default.
    pub timeout: Option<Duration>,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            button: MouseButton::Left,
            modifiers: Vec::new(),
            position: None,
            click_count: 1,
            force: false,
            timeout: None,
        }
    }
}

/// Options for [`BrowserDriver::hover`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoverOptions {
    /// Offset inside the element.
    pub position: Option<Position>,
    /// Skip actionability checks.
    pub force: bool,
    /// Per-call timeout. `None` uses the page default.
    pub timeout: Option<Duration>,
}

/// Main-document response of a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageResponse {
    /// HTTP status code.
    pub status: u16,
}

// ============================================================================
// Traits
// ============================================================================

/// Element query handle returned by [`BrowserDriver::locator`].
#[async_trait]
pub trait Locator: Send + Sync {
    /// Returns `true` if the element is visible.
    async fn is_visible(&self) -> Result<bool>;

    /// Returns `true` if the element is enabled.
    async fn is_enabled(&self) -> Result<bool>;

    /// Returns the element's text content.
    async fn text_content(&self) -> Result<Option<String>>;

    /// Returns an attribute value.
    async fn get_attribute(&self, name: &str) -> Result<Option<String>>;

    /// Evaluates a JavaScript function with the element as argument.
    async fn evaluate(&self, expression: &str) -> Result<Value>;

    /// Scrolls the element into view if it is not already.
    async fn scroll_into_view_if_needed(&self) -> Result<()>;
}

/// Primitives provided by an automation backend.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Clicks the element matching `selector`.
    async fn click(&self, selector: &str, options: &ClickOptions, timeout: Duration) -> Result<()>;

    /// Replaces the value of an input.
    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> Result<()>;

    /// Navigates to `url`.
    async fn goto(
        &self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<Option<PageResponse>>;

    /// Hovers over the element matching `selector`.
    async fn hover(&self, selector: &str, options: &HoverOptions, timeout: Duration) -> Result<()>;

    /// Waits until the element matching `selector` reaches `state`.
    async fn wait_for_selector(
        &self,
        selector: &str,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()>;

    /// Returns a query handle for `selector`.
    fn locator(&self, selector: &str) -> Box<dyn Locator>;

    /// Reloads the current page.
    async fn reload(&self) -> Result<Option<PageResponse>>;

    /// Goes back in history.
    async fn go_back(&self) -> Result<Option<PageResponse>>;

    /// Goes forward in history.
    async fn go_forward(&self) -> Result<Option<PageResponse>>;

    /// Scrolls the page by a pixel delta.
    async fn mouse_wheel(&self, delta_x: i64, delta_y: i64) -> Result<()>;

    /// Returns the current URL.
    fn url(&self) -> String;
}
