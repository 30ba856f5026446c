//! Typed event records and the event factory.
//!
//! Every event shares an [`EventBase`] (timestamp, page URL, session id,
//! metadata) and adds kind-specific fields. [`Event`] is the sum type that
//! flows through the emitter, the filters, and the logger.
//!
//! # Event Types
//!
//! | Discriminant | Record | Selector |
//! |--------------|--------|----------|
//! | `interaction` | [`InteractionEvent`] | yes |
//! | `navigation` | [`NavigationEvent`] | no |
//! | `network_request` | [`NetworkEvent`] | no |
//! | `dom_change` | [`DomChangeEvent`] | yes |
//!
//! # Wire Format
//!
//! Events serialize flat, with the discriminant under `event_type`:
//!
//! ```json
//! {
//!   "event_type": "interaction",
//!   "timestamp": 1700000000.25,
//!   "page_url": "https://example.com",
//!   "session_id": "session-123",
//!   "metadata": {},
//!   "action": "click",
//!   "selector": "#submit",
//!   "value": null,
//!   "element_text": "Submit",
//!   "element_tag": "button"
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use browserve::events::{create_event, Event};
//! use serde_json::json;
//!
//! let event = create_event(
//!     "interaction",
//!     json!({
//!         "action": " CLICK ",
//!         "selector": "#button",
//!         "page_url": "https://example.com",
//!         "session_id": "session-123",
//!     }),
//! )?;
//!
//! assert_eq!(event.event_type(), "interaction");
//! assert_eq!(event.selector(), Some("#button"));
//! # Ok::<(), browserve::Error>(())
//! ```
//!
//! Records are validated when constructed, whether through the typed
//! constructors or through serde, and never mutated afterwards.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Discriminant of [`InteractionEvent`].
pub const INTERACTION: &str = "interaction";

/// Discriminant of [`NavigationEvent`].
pub const NAVIGATION: &str = "navigation";

/// Discriminant of [`NetworkEvent`].
pub const NETWORK_REQUEST: &str = "network_request";

/// Discriminant of [`DomChangeEvent`].
pub const DOM_CHANGE: &str = "dom_change";

/// Registered event types, in registry order.
pub const EVENT_TYPES: [&str; 4] = [INTERACTION, NAVIGATION, NETWORK_REQUEST, DOM_CHANGE];

// ============================================================================
// Vocabularies
// ============================================================================

string_enum! {
    /// Interaction verb carried by an [`InteractionEvent`].
    pub enum InteractionAction ("action") {
        /// Single click.
        Click => "click",
        /// Double click.
        DoubleClick => "double_click",
        /// Context click.
        RightClick => "right_click",
        /// Pointer hover.
        Hover => "hover",
        /// Text entry.
        Fill => "fill",
        /// Input cleared.
        Clear => "clear",
        /// Option selected.
        Select => "select",
        /// Checkbox checked.
        Check => "check",
        /// Checkbox unchecked.
        Uncheck => "uncheck",
        /// Focus gained.
        Focus => "focus",
        /// Focus lost.
        Blur => "blur",
        /// Scroll.
        Scroll => "scroll",
        /// Drag start.
        Drag => "drag",
        /// Drop.
        Drop => "drop",
    }
}

string_enum! {
    /// How a navigation was triggered.
    pub enum NavigationMethod ("method") {
        /// Direct navigation to a URL.
        Navigate => "navigate",
        /// Page reload.
        Reload => "reload",
        /// History back.
        Back => "back",
        /// History forward.
        Forward => "forward",
        /// History entry replaced.
        Replace => "replace",
    }
}

impl Default for NavigationMethod {
    fn default() -> Self {
        Self::Navigate
    }
}

string_enum! {
    /// HTTP request method.
    pub enum HttpMethod ("method") {
        /// GET.
        Get => "GET",
        /// POST.
        Post => "POST",
        /// PUT.
        Put => "PUT",
        /// DELETE.
        Delete => "DELETE",
        /// PATCH.
        Patch => "PATCH",
        /// HEAD.
        Head => "HEAD",
        /// OPTIONS.
        Options => "OPTIONS",
        /// CONNECT.
        Connect => "CONNECT",
        /// TRACE.
        Trace => "TRACE",
    }
}

string_enum! {
    /// Kind of DOM mutation.
    pub enum DomChangeType ("change_type") {
        /// Node inserted.
        Added => "added",
        /// Node removed.
        Removed => "removed",
        /// Content changed.
        Modified => "modified",
        /// Attribute changed.
        Attribute => "attribute",
    }
}

// ============================================================================
// Field Validators
// ============================================================================

fn now_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

fn require_non_empty(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(field, format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn require_http_url(field: &str, value: &str) -> Result<String> {
    let url = require_non_empty(field, value)?;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Error::validation(
            field,
            format!("{field} must be a valid HTTP/HTTPS URL"),
        ));
    }
    Ok(url)
}

fn check_status_code(status_code: Option<u16>) -> Result<()> {
    match status_code {
        Some(code) if !(100..=599).contains(&code) => Err(Error::validation(
            "status_code",
            format!("status_code must be between 100 and 599, got {code}"),
        )),
        _ => Ok(()),
    }
}

fn check_non_negative(field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(Error::validation(
            field,
            format!("{field} must be a non-negative number, got {v}"),
        )),
        _ => Ok(()),
    }
}

// ============================================================================
// EventBase
// ============================================================================

validated_record! {
    /// Fields shared by every event.
    #[derive(Debug, Clone, PartialEq)]
    pub struct EventBase {
        #[serde(default = "now_timestamp")]
        timestamp: f64,
        page_url: String,
        session_id: String,
        #[serde(default)]
        metadata: Map<String, Value>,
    }
}

impl EventBase {
    /// Creates a base stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `page_url` is not an HTTP(S) URL or
    /// `session_id` is blank.
    pub fn new(page_url: impl AsRef<str>, session_id: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            timestamp: now_timestamp(),
            page_url: require_http_url("page_url", page_url.as_ref())?,
            session_id: require_non_empty("session_id", session_id.as_ref())?,
            metadata: Map::new(),
        })
    }

    /// Overrides the capture time (seconds since the Unix epoch).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if negative or not finite.
    pub fn with_timestamp(mut self, timestamp: f64) -> Result<Self> {
        check_non_negative("timestamp", Some(timestamp))?;
        self.timestamp = timestamp;
        Ok(self)
    }

    /// Adds one metadata entry.
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the capture time in seconds since the Unix epoch.
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Returns the page URL.
    #[inline]
    #[must_use]
    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    /// Returns the session id.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns the metadata map.
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    fn normalize(&mut self) -> Result<()> {
        check_non_negative("timestamp", Some(self.timestamp))?;
        self.page_url = require_http_url("page_url", &self.page_url)?;
        self.session_id = require_non_empty("session_id", &self.session_id)?;
        Ok(())
    }
}

// ============================================================================
// InteractionEvent
// ============================================================================

validated_record! {
    /// A user interaction with a page element.
    #[derive(Debug, Clone, PartialEq)]
    pub struct InteractionEvent {
        #[serde(flatten)]
        base: EventBase,
        action: InteractionAction,
        selector: String,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        element_text: Option<String>,
        #[serde(default)]
        element_tag: Option<String>,
    }
}

impl InteractionEvent {
    /// Creates an interaction event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `selector` is blank.
    pub fn new(base: EventBase, action: InteractionAction, selector: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            base,
            action,
            selector: require_non_empty("selector", selector.as_ref())?,
            value: None,
            element_text: None,
            element_tag: None,
        })
    }

    /// Sets the input value.
    #[inline]
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Sets the element text.
    #[inline]
    #[must_use]
    pub fn with_element_text(mut self, text: impl Into<String>) -> Self {
        self.element_text = Some(text.into());
        self
    }

    /// Sets the element tag name.
    #[inline]
    #[must_use]
    pub fn with_element_tag(mut self, tag: impl Into<String>) -> Self {
        self.element_tag = Some(tag.into());
        self
    }

    /// Returns the interaction verb.
    #[inline]
    #[must_use]
    pub fn action(&self) -> InteractionAction {
        self.action
    }

    /// Returns the target selector.
    #[inline]
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Returns the input value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns the element text.
    #[inline]
    #[must_use]
    pub fn element_text(&self) -> Option<&str> {
        self.element_text.as_deref()
    }

    /// Returns the element tag name.
    #[inline]
    #[must_use]
    pub fn element_tag(&self) -> Option<&str> {
        self.element_tag.as_deref()
    }

    fn normalize(&mut self) -> Result<()> {
        self.selector = require_non_empty("selector", &self.selector)?;
        Ok(())
    }
}

// ============================================================================
// NavigationEvent
// ============================================================================

validated_record! {
    /// A page navigation.
    #[derive(Debug, Clone, PartialEq)]
    pub struct NavigationEvent {
        #[serde(flatten)]
        base: EventBase,
        from_url: String,
        to_url: String,
        #[serde(default)]
        method: NavigationMethod,
        #[serde(default)]
        load_time: Option<f64>,
        #[serde(default)]
        status_code: Option<u16>,
    }
}

impl NavigationEvent {
    /// Creates a navigation event. `from_url` is empty for an initial load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `to_url` is blank.
    pub fn new(
        base: EventBase,
        from_url: impl AsRef<str>,
        to_url: impl AsRef<str>,
        method: NavigationMethod,
    ) -> Result<Self> {
        Ok(Self {
            base,
            from_url: from_url.as_ref().trim().to_string(),
            to_url: require_non_empty("to_url", to_url.as_ref())?,
            method,
            load_time: None,
            status_code: None,
        })
    }

    /// Sets the load time in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if negative.
    pub fn with_load_time(mut self, secs: f64) -> Result<Self> {
        check_non_negative("load_time", Some(secs))?;
        self.load_time = Some(secs);
        Ok(self)
    }

    /// Sets the response status code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if outside 100..=599.
    pub fn with_status_code(mut self, status_code: u16) -> Result<Self> {
        check_status_code(Some(status_code))?;
        self.status_code = Some(status_code);
        Ok(self)
    }

    /// Returns the previous URL.
    #[inline]
    #[must_use]
    pub fn from_url(&self) -> &str {
        &self.from_url
    }

    /// Returns the destination URL.
    #[inline]
    #[must_use]
    pub fn to_url(&self) -> &str {
        &self.to_url
    }

    /// Returns the navigation method.
    #[inline]
    #[must_use]
    pub fn method(&self) -> NavigationMethod {
        self.method
    }

    /// Returns the load time in seconds.
    #[inline]
    #[must_use]
    pub fn load_time(&self) -> Option<f64> {
        self.load_time
    }

    /// Returns the response status code.
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    fn normalize(&mut self) -> Result<()> {
        self.from_url = self.from_url.trim().to_string();
        self.to_url = require_non_empty("to_url", &self.to_url)?;
        check_non_negative("load_time", self.load_time)?;
        check_status_code(self.status_code)
    }
}

// ============================================================================
// NetworkEvent
// ============================================================================

validated_record! {
    /// An HTTP request observed by the page.
    #[derive(Debug, Clone, PartialEq)]
    pub struct NetworkEvent {
        #[serde(flatten)]
        base: EventBase,
        request_url: String,
        method: HttpMethod,
        #[serde(default)]
        status_code: Option<u16>,
        #[serde(default)]
        response_size: Option<u64>,
        #[serde(default)]
        request_headers: BTreeMap<String, String>,
        #[serde(default)]
        response_headers: BTreeMap<String, String>,
        #[serde(default)]
        duration: Option<f64>,
    }
}

impl NetworkEvent {
    /// Creates a network event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `request_url` is not an HTTP(S) URL.
    pub fn new(base: EventBase, request_url: impl AsRef<str>, method: HttpMethod) -> Result<Self> {
        Ok(Self {
            base,
            request_url: require_http_url("request_url", request_url.as_ref())?,
            method,
            status_code: None,
            response_size: None,
            request_headers: BTreeMap::new(),
            response_headers: BTreeMap::new(),
            duration: None,
        })
    }

    /// Sets the response status code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if outside 100..=599.
    pub fn with_status_code(mut self, status_code: u16) -> Result<Self> {
        check_status_code(Some(status_code))?;
        self.status_code = Some(status_code);
        Ok(self)
    }

    /// Sets the response body size in bytes.
    #[inline]
    #[must_use]
    pub fn with_response_size(mut self, bytes: u64) -> Self {
        self.response_size = Some(bytes);
        self
    }

    /// Adds a request header.
    #[inline]
    #[must_use]
    pub fn with_request_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.insert(name.into(), value.into());
        self
    }

    /// Adds a response header.
    #[inline]
    #[must_use]
    pub fn with_response_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response_headers.insert(name.into(), value.into());
        self
    }

    /// Sets the request duration in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if negative.
    pub fn with_duration(mut self, secs: f64) -> Result<Self> {
        check_non_negative("duration", Some(secs))?;
        self.duration = Some(secs);
        Ok(self)
    }

    /// Returns the request URL.
    #[inline]
    #[must_use]
    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    /// Returns the HTTP method.
    #[inline]
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the response status code.
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Returns the response body size in bytes.
    #[inline]
    #[must_use]
    pub fn response_size(&self) -> Option<u64> {
        self.response_size
    }

    /// Returns the request headers.
    #[inline]
    #[must_use]
    pub fn request_headers(&self) -> &BTreeMap<String, String> {
        &self.request_headers
    }

    /// Returns the response headers.
    #[inline]
    #[must_use]
    pub fn response_headers(&self) -> &BTreeMap<String, String> {
        &self.response_headers
    }

    /// Returns the request duration in seconds.
    #[inline]
    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn normalize(&mut self) -> Result<()> {
        self.request_url = require_http_url("request_url", &self.request_url)?;
        check_status_code(self.status_code)?;
        check_non_negative("duration", self.duration)
    }
}

// ============================================================================
// DomChangeEvent
// ============================================================================

validated_record! {
    /// A DOM mutation.
    #[derive(Debug, Clone, PartialEq)]
    pub struct DomChangeEvent {
        #[serde(flatten)]
        base: EventBase,
        change_type: DomChangeType,
        selector: String,
        #[serde(default)]
        old_value: Option<String>,
        #[serde(default)]
        new_value: Option<String>,
        #[serde(default)]
        attribute_name: Option<String>,
        #[serde(default)]
        element_tag: Option<String>,
    }
}

impl DomChangeEvent {
    /// Creates a DOM change event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `selector` is blank.
    pub fn new(base: EventBase, change_type: DomChangeType, selector: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            base,
            change_type,
            selector: require_non_empty("selector", selector.as_ref())?,
            old_value: None,
            new_value: None,
            attribute_name: None,
            element_tag: None,
        })
    }

    /// Sets the value before the change.
    #[inline]
    #[must_use]
    pub fn with_old_value(mut self, value: impl Into<String>) -> Self {
        self.old_value = Some(value.into());
        self
    }

    /// Sets the value after the change.
    #[inline]
    #[must_use]
    pub fn with_new_value(mut self, value: impl Into<String>) -> Self {
        self.new_value = Some(value.into());
        self
    }

    /// Sets the changed attribute name.
    #[inline]
    #[must_use]
    pub fn with_attribute_name(mut self, name: impl Into<String>) -> Self {
        self.attribute_name = Some(name.into());
        self
    }

    /// Sets the element tag name.
    #[inline]
    #[must_use]
    pub fn with_element_tag(mut self, tag: impl Into<String>) -> Self {
        self.element_tag = Some(tag.into());
        self
    }

    /// Returns the mutation kind.
    #[inline]
    #[must_use]
    pub fn change_type(&self) -> DomChangeType {
        self.change_type
    }

    /// Returns the mutated element's selector.
    #[inline]
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Returns the value before the change.
    #[inline]
    #[must_use]
    pub fn old_value(&self) -> Option<&str> {
        self.old_value.as_deref()
    }

    /// Returns the value after the change.
    #[inline]
    #[must_use]
    pub fn new_value(&self) -> Option<&str> {
        self.new_value.as_deref()
    }

    /// Returns the changed attribute name.
    #[inline]
    #[must_use]
    pub fn attribute_name(&self) -> Option<&str> {
        self.attribute_name.as_deref()
    }

    /// Returns the element tag name.
    #[inline]
    #[must_use]
    pub fn element_tag(&self) -> Option<&str> {
        self.element_tag.as_deref()
    }

    fn normalize(&mut self) -> Result<()> {
        self.selector = require_non_empty("selector", &self.selector)?;
        Ok(())
    }
}

// ============================================================================
// Event
// ============================================================================

/// Any event that flows through the emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum Event {
    /// `interaction`
    #[serde(rename = "interaction")]
    Interaction(InteractionEvent),
    /// `navigation`
    #[serde(rename = "navigation")]
    Navigation(NavigationEvent),
    /// `network_request`
    #[serde(rename = "network_request")]
    Network(NetworkEvent),
    /// `dom_change`
    #[serde(rename = "dom_change")]
    DomChange(DomChangeEvent),
}

impl Event {
    /// Returns the discriminant.
    #[inline]
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Interaction(_) => INTERACTION,
            Self::Navigation(_) => NAVIGATION,
            Self::Network(_) => NETWORK_REQUEST,
            Self::DomChange(_) => DOM_CHANGE,
        }
    }

    /// Returns the shared fields.
    #[inline]
    #[must_use]
    pub fn base(&self) -> &EventBase {
        match self {
            Self::Interaction(e) => &e.base,
            Self::Navigation(e) => &e.base,
            Self::Network(e) => &e.base,
            Self::DomChange(e) => &e.base,
        }
    }

    /// Returns the target selector for kinds that carry one.
    #[inline]
    #[must_use]
    pub fn selector(&self) -> Option<&str> {
        match self {
            Self::Interaction(e) => Some(e.selector()),
            Self::DomChange(e) => Some(e.selector()),
            Self::Navigation(_) | Self::Network(_) => None,
        }
    }

    /// Returns the capture time in seconds since the Unix epoch.
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> f64 {
        self.base().timestamp()
    }

    /// Returns the page URL.
    #[inline]
    #[must_use]
    pub fn page_url(&self) -> &str {
        self.base().page_url()
    }

    /// Returns the session id.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.base().session_id()
    }

    /// Returns the metadata map.
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        self.base().metadata()
    }
}

impl From<InteractionEvent> for Event {
    fn from(event: InteractionEvent) -> Self {
        Self::Interaction(event)
    }
}

impl From<NavigationEvent> for Event {
    fn from(event: NavigationEvent) -> Self {
        Self::Navigation(event)
    }
}

impl From<NetworkEvent> for Event {
    fn from(event: NetworkEvent) -> Self {
        Self::Network(event)
    }
}

impl From<DomChangeEvent> for Event {
    fn from(event: DomChangeEvent) -> Self {
        Self::DomChange(event)
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Creates an event of a registered type from a JSON object of fields.
///
/// String enum fields are trimmed and case-folded; every other field is
/// validated exactly as the typed constructors validate it.
///
/// # Errors
///
/// - [`Error::UnknownEventType`] if `event_type` is not registered
/// - [`Error::Validation`] if `fields` is not an object, tries to override
///   `event_type`, or holds an invalid value
pub fn create_event(event_type: &str, fields: Value) -> Result<Event> {
    if !EVENT_TYPES.contains(&event_type) {
        return Err(Error::unknown_event_type(event_type, &EVENT_TYPES));
    }

    let Value::Object(mut fields) = fields else {
        return Err(Error::validation(
            "fields",
            "event fields must be a JSON object",
        ));
    };

    if let Some(given) = fields.get("event_type")
        && given.as_str() != Some(event_type)
    {
        return Err(Error::validation(
            "event_type",
            format!("event_type is fixed to '{event_type}' and cannot be overridden"),
        ));
    }
    fields.insert("event_type".to_string(), Value::from(event_type));

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| Error::validation(event_type, e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
