//! Error types for Browserve.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use browserve::{ClickAction, Result};
//!
//! fn build() -> Result<ClickAction> {
//!     let click = ClickAction::new("#submit")?;
//!     Ok(click)
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Validation | [`Error::Validation`], [`Error::UnknownEventType`] |
//! | Execution | [`Error::ActionExecution`], [`Error::Element`], [`Error::Driver`] |
//! | Logging | [`Error::Logging`] |
//! | Configuration | [`Error::Configuration`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Csv`] |
//!
//! # Propagation
//!
//! Validation and configuration errors surface at construction time and are
//! never retried. Execution errors raised inside an action are converted into
//! a terminal [`ActionResult`](crate::ActionResult) by the hook cycle once the
//! retry budget is spent. Logging errors are returned to the caller.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// Malformed input rejected at construction time.
    ///
    /// Non-retryable: the caller must fix the input.
    #[error("Validation error on '{field}': {message}")]
    Validation {
        /// Name of the offending field.
        field: String,
        /// Description of the problem.
        message: String,
    },

    /// Event factory received a name outside the registry.
    #[error("Unknown event type '{event_type}'. Valid types: {valid}")]
    UnknownEventType {
        /// The rejected name.
        event_type: String,
        /// Comma-separated list of registered names.
        valid: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// A browser primitive failed or the target was not ready.
    #[error("Action execution failed: {message}")]
    ActionExecution {
        /// Description of the failure.
        message: String,
        /// Action type being executed, when known.
        action_type: Option<String>,
        /// Selector involved, when known.
        selector: Option<String>,
    },

    /// Selector-specific failure (not found, not visible, not enabled).
    #[error("Element error for '{selector}': {message}")]
    Element {
        /// Description of the failure.
        message: String,
        /// Selector that failed.
        selector: String,
        /// Expected element state, when relevant.
        state: Option<String>,
        /// Page URL at the time of failure.
        page_url: Option<String>,
    },

    /// Failure reported by the underlying browser driver.
    #[error("Driver error: {message}")]
    Driver {
        /// Message reported by the driver.
        message: String,
    },

    // ========================================================================
    // Logging Errors
    // ========================================================================
    /// Sink I/O or serialization failure.
    #[error("Logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
        /// Log format in use, when relevant.
        format: Option<String>,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid configuration value.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
        /// Configuration key, when known.
        key: Option<String>,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a validation error for a field.
    #[inline]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown event type error.
    #[inline]
    pub fn unknown_event_type(event_type: impl Into<String>, valid: &[&str]) -> Self {
        Self::UnknownEventType {
            event_type: event_type.into(),
            valid: valid.join(", "),
        }
    }

    /// Creates an action execution error.
    #[inline]
    pub fn action_execution(message: impl Into<String>) -> Self {
        Self::ActionExecution {
            message: message.into(),
            action_type: None,
            selector: None,
        }
    }

    /// Creates an action execution error with action and selector context.
    #[inline]
    pub fn action_failed(
        message: impl Into<String>,
        action_type: impl Into<String>,
        selector: Option<&str>,
    ) -> Self {
        Self::ActionExecution {
            message: message.into(),
            action_type: Some(action_type.into()),
            selector: selector.map(str::to_string),
        }
    }

    /// Creates an element error.
    #[inline]
    pub fn element(message: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::Element {
            message: message.into(),
            selector: selector.into(),
            state: None,
            page_url: None,
        }
    }

    /// Creates an element error carrying the expected state and page URL.
    #[inline]
    pub fn element_state(
        message: impl Into<String>,
        selector: impl Into<String>,
        state: impl Into<String>,
        page_url: impl Into<String>,
    ) -> Self {
        Self::Element {
            message: message.into(),
            selector: selector.into(),
            state: Some(state.into()),
            page_url: Some(page_url.into()),
        }
    }

    /// Creates a driver error.
    #[inline]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Creates a logging error.
    #[inline]
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
            format: None,
        }
    }

    /// Creates a logging error tied to an output format.
    #[inline]
    pub fn logging_format(message: impl Into<String>, format: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
            format: Some(format.into()),
        }
    }

    /// Creates a configuration error for a key.
    #[inline]
    pub fn configuration(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns the variant name.
    ///
    /// Used as the `error_type` of emission summaries.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::UnknownEventType { .. } => "UnknownEventType",
            Self::ActionExecution { .. } => "ActionExecutionError",
            Self::Element { .. } => "ElementError",
            Self::Driver { .. } => "DriverError",
            Self::Logging { .. } => "LoggingError",
            Self::Configuration { .. } => "ConfigurationError",
            Self::Io(_) => "IoError",
            Self::Json(_) => "JsonError",
            Self::Csv(_) => "CsvError",
        }
    }

    /// Returns `true` if this is a validation error.
    #[inline]
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::UnknownEventType { .. }
        )
    }

    /// Returns `true` if this is an execution error.
    ///
    /// Element errors are a specialization of execution errors.
    #[inline]
    #[must_use]
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::ActionExecution { .. } | Self::Element { .. })
    }

    /// Returns `true` if this is an element error.
    #[inline]
    #[must_use]
    pub fn is_element_error(&self) -> bool {
        matches!(self, Self::Element { .. })
    }

    /// Returns `true` if this error may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ActionExecution { .. } | Self::Element { .. } | Self::Driver { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
