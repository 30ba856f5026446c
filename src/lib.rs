//! Browserve - Validated browser actions with a buffered event log.
//!
//! This library wraps a browser driver in a [`Page`] that emits typed events
//! for every primitive, runs [`Action`]s against it with retries and
//! timeouts, and records the event stream to disk with [`BrowserLogger`].
//!
//! # Architecture
//!
//! - **Driver**: any type implementing [`BrowserDriver`] (click, fill, goto,
//!   hover, wait, locator queries, history, wheel)
//! - **Page**: forwards primitives to the driver and emits
//!   `interaction` / `navigation` events through its [`EventEmitter`]
//! - **Actions**: validated at construction, executed through a hook cycle
//!   (readiness check, per-attempt timeout, backoff, post hook) that always
//!   yields an [`ActionResult`]
//! - **Logger**: subscribes to pages, filters, buffers, and flushes to
//!   JSONL, JSON, or CSV with size-based rotation
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use browserve::{Action, BrowserLogger, ClickAction, LoggingConfig, Page, Result};
//!
//! async fn run(driver: Arc<dyn browserve::BrowserDriver>) -> Result<()> {
//!     let page = Page::builder()
//!         .url("https://example.com")
//!         .driver(driver)
//!         .build()?;
//!
//!     let logger = BrowserLogger::new(LoggingConfig::default())?;
//!     logger.start_logging(&page).await?;
//!
//!     let result = ClickAction::new("#submit")?.execute_with_hooks(&page).await;
//!     println!("{}", result.summary());
//!
//!     logger.stop_logging(&page).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`actions`] | [`Action`] trait, composites, concrete actions |
//! | [`config`] | Logger and browser configuration, environment loading |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`events`] | Event records, emitter, filters |
//! | [`logger`] | [`BrowserLogger`] and [`LogBuffer`] |
//! | [`page`] | [`Page`] and the [`BrowserDriver`] capability surface |
//! | [`results`] | [`ActionResult`] and [`ActionMetrics`] |
//! | [`validation`] | Selector, URL, and text validators |

#[macro_use]
mod macros;

// ============================================================================
// Modules
// ============================================================================

/// Retryable, time-bounded browser actions.
pub mod actions;

/// Logger and browser configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Event records, emission, and filtering.
pub mod events;

/// Buffered event logging.
pub mod logger;

/// Event-emitting page over a browser driver.
pub mod page;

/// Action outcomes and aggregate metrics.
pub mod results;

/// Input validators and sanitizers.
pub mod validation;

// ============================================================================
// Re-exports
// ============================================================================

// Action types
pub use actions::{
    Action, ActionConfig, ActionExt, ClickAction, ComposedAction, ConditionalAction, FillAction,
    HoverAction, NavigationAction, ScrollAction, ScrollDirection, WaitAction,
};

// Configuration types
pub use config::{BrowserConfig, Config, LogFormat, LoggingConfig};

// Error types
pub use error::{Error, Result};

// Event types
pub use events::{
    EmitSummary, Event, EventBase, EventEmitter, EventFilter, EventHandler, FilterChain,
    HandlerRegistry, create_event,
};

// Logger types
pub use logger::{BrowserLogger, LogBuffer};

// Page types
pub use page::{BrowserDriver, ElementState, Locator, MouseButton, Page, PageBuilder, WaitUntil};

// Result types
pub use results::{ActionMetrics, ActionResult, ActionStatus};
