//! Core Page struct, builder, and accessors.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::config::BrowserConfig;
use crate::error::{Error, Result};
use crate::events::{EmitSummary, Event, EventBase, EventEmitter, HandlerRegistry};

use super::driver::BrowserDriver;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for a page.
pub(crate) struct PageInner {
    /// Session the page belongs to.
    pub session_id: String,
    /// Last URL known to the page.
    pub url: RwLock<String>,
    /// Default timeouts and browser settings.
    pub config: BrowserConfig,
    /// Attached automation backend.
    pub driver: RwLock<Option<Arc<dyn BrowserDriver>>>,
    /// Cleared by [`Page::close`].
    pub active: AtomicBool,
    /// Event emission capability.
    pub emitter: EventEmitter,
}

// ============================================================================
// Page
// ============================================================================

/// A browser page that emits an event after every primitive it performs.
///
/// The page wraps a [`BrowserDriver`] and owns an [`EventEmitter`]. Handlers
/// subscribed through [`Page::emitter`] (or [`Page::on`]) observe each
/// click, fill, hover, and navigation.
///
/// # Example
///
/// ```ignore
/// let page = Page::builder()
///     .url("https://example.com")
///     .session_id("session-123")
///     .driver(driver)
///     .build()?;
///
/// page.on("interaction", |event| async move {
///     println!("{:?}", event.selector());
///     Ok(())
/// });
///
/// page.click("#button").await?;
/// ```
#[derive(Clone)]
pub struct Page {
    pub(crate) inner: Arc<PageInner>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("session_id", &self.inner.session_id)
            .field("url", &*self.inner.url.read())
            .field("has_driver", &self.inner.driver.read().is_some())
            .field("active", &self.inner.active.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Page {
    /// Creates a [`PageBuilder`].
    #[inline]
    #[must_use]
    pub fn builder() -> PageBuilder {
        PageBuilder::new()
    }

    /// Creates a page without a driver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `url` is not an HTTP(S) URL or the
    /// session id is blank.
    pub fn new(url: impl Into<String>, session_id: impl Into<String>) -> Result<Self> {
        PageBuilder::new().url(url).session_id(session_id).build()
    }

    /// Creates a page without a driver whose emitter starts with the
    /// registry's handlers.
    ///
    /// # Errors
    ///
    /// Same as [`Page::new`].
    pub fn with_registry(
        url: impl Into<String>,
        session_id: impl Into<String>,
        registry: &HandlerRegistry,
    ) -> Result<Self> {
        PageBuilder::new()
            .url(url)
            .session_id(session_id)
            .registry(registry)
            .build()
    }
}

// ============================================================================
// PageBuilder
// ============================================================================

/// Builder for [`Page`].
#[derive(Default)]
pub struct PageBuilder {
    url: Option<String>,
    session_id: Option<String>,
    config: BrowserConfig,
    driver: Option<Arc<dyn BrowserDriver>>,
    emitter: Option<EventEmitter>,
}

impl fmt::Debug for PageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageBuilder")
            .field("url", &self.url)
            .field("session_id", &self.session_id)
            .field("config", &self.config)
            .field("has_driver", &self.driver.is_some())
            .finish_non_exhaustive()
    }
}

impl PageBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial page URL. Required.
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the session id. Defaults to a random UUID.
    #[inline]
    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the browser configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: BrowserConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches an automation backend.
    #[inline]
    #[must_use]
    pub fn driver(mut self, driver: Arc<dyn BrowserDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Seeds the page's emitter with the handlers of `registry`.
    #[inline]
    #[must_use]
    pub fn registry(mut self, registry: &HandlerRegistry) -> Self {
        self.emitter = Some(EventEmitter::with_registry(registry));
        self
    }

    /// Builds the page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the URL is missing or not HTTP(S),
    /// or the session id is blank.
    pub fn build(self) -> Result<Page> {
        let url = validate_page_url(self.url.as_deref().unwrap_or_default())?;

        let session_id = match self.session_id {
            Some(id) => {
                let trimmed = id.trim();
                if trimmed.is_empty() {
                    return Err(Error::validation("session_id", "Session ID cannot be empty"));
                }
                trimmed.to_string()
            }
            None => Uuid::new_v4().to_string(),
        };

        debug!(session_id = %session_id, url = %url, "Page created");

        Ok(Page {
            inner: Arc::new(PageInner {
                session_id,
                url: RwLock::new(url),
                config: self.config,
                driver: RwLock::new(self.driver),
                active: AtomicBool::new(true),
                emitter: self.emitter.unwrap_or_default(),
            }),
        })
    }
}

/// Checks that `url` carries an HTTP(S) scheme and a host.
pub(crate) fn validate_page_url(url: &str) -> Result<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("url", "URL cannot be empty"));
    }

    let parsed = url::Url::parse(trimmed).map_err(|e| {
        Error::validation("url", format!("URL must include scheme and domain: {e}"))
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::validation("url", "URL scheme must be http or https"));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::validation("url", "URL must include domain"));
    }

    Ok(trimmed.to_string())
}

// ============================================================================
// Page - Accessors
// ============================================================================

impl Page {
    /// Returns the session id.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Returns the last URL recorded by the page.
    #[inline]
    #[must_use]
    pub fn url(&self) -> String {
        self.inner.url.read().clone()
    }

    /// Returns the driver's current URL, or the recorded URL without a driver.
    #[must_use]
    pub fn current_url(&self) -> String {
        match self.driver() {
            Some(driver) => driver.url(),
            None => self.url(),
        }
    }

    /// Returns the browser configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BrowserConfig {
        &self.inner.config
    }

    /// Returns the page's event emitter.
    #[inline]
    #[must_use]
    pub fn emitter(&self) -> &EventEmitter {
        &self.inner.emitter
    }

    /// Returns `true` while the page is open and has a driver attached.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire) && self.inner.driver.read().is_some()
    }

    /// Returns `true` if a driver is attached.
    #[inline]
    #[must_use]
    pub fn has_driver(&self) -> bool {
        self.inner.driver.read().is_some()
    }
}

// ============================================================================
// Page - Lifecycle
// ============================================================================

impl Page {
    /// Attaches a driver and adopts its URL when it reports one.
    pub fn set_driver(&self, driver: Arc<dyn BrowserDriver>) {
        let driver_url = driver.url();
        if !driver_url.is_empty() {
            *self.inner.url.write() = driver_url;
        }
        *self.inner.driver.write() = Some(driver);
        self.inner.active.store(true, Ordering::Release);
        debug!(session_id = %self.inner.session_id, "Driver attached");
    }

    /// Marks the page inactive and detaches its driver.
    pub fn close(&self) {
        self.inner.active.store(false, Ordering::Release);
        self.inner.driver.write().take();
        debug!(session_id = %self.inner.session_id, "Page closed");
    }

    /// Subscribes an async handler for `event_type`.
    ///
    /// Shorthand for [`EventEmitter::on`] on the page's emitter.
    pub fn on<F, Fut>(&self, event_type: impl Into<String>, f: F) -> crate::events::EventHandler
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.inner.emitter.on(event_type, f)
    }
}

// ============================================================================
// Page - Internal
// ============================================================================

impl Page {
    /// Returns the attached driver, if any.
    pub(crate) fn driver(&self) -> Option<Arc<dyn BrowserDriver>> {
        self.inner.driver.read().clone()
    }

    /// Returns the attached driver or an execution error naming `operation`.
    pub(crate) fn require_driver(
        &self,
        operation: &str,
        selector: Option<&str>,
    ) -> Result<Arc<dyn BrowserDriver>> {
        self.driver().ok_or_else(|| {
            Error::action_failed(
                "Page not initialized with a browser driver",
                operation,
                selector,
            )
        })
    }

    /// Resolves a per-call timeout against the configured default.
    #[inline]
    pub(crate) fn resolve_timeout(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or(self.inner.config.timeout)
    }

    /// Creates an event base for the current URL.
    pub(crate) fn event_base(&self) -> Result<EventBase> {
        EventBase::new(self.url(), &self.inner.session_id)
    }

    /// Records a new URL.
    pub(crate) fn set_url(&self, url: impl Into<String>) {
        *self.inner.url.write() = url.into();
    }

    /// Emits an event on the page's emitter.
    pub(crate) async fn emit(&self, event: impl Into<Event>) -> EmitSummary {
        self.inner.emitter.emit(event.into()).await
    }
}

// ============================================================================
// Tests
// ============================================================================
