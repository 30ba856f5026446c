//! Async publish/subscribe event emitter.
//!
//! An [`EventEmitter`] maps event types to ordered lists of async handlers.
//! [`EventEmitter::emit`] runs every matching handler concurrently and waits
//! for all of them. A handler that returns an error or panics is isolated:
//! siblings still run, `emit` never fails, and the failure is reported in
//! the returned [`EmitSummary`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use browserve::events::{
//!     Event, EventBase, EventEmitter, InteractionAction, InteractionEvent, handler,
//! };
//!
//! # tokio_test::block_on(async {
//! let emitter = EventEmitter::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&seen);
//! emitter.subscribe("interaction", handler(move |_event| {
//!     let counter = Arc::clone(&counter);
//!     async move {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!         Ok::<(), browserve::Error>(())
//!     }
//! }));
//!
//! let base = EventBase::new("https://example.com", "session-1")?;
//! let event = InteractionEvent::new(base, InteractionAction::Click, "#go")?;
//! let summary = emitter.emit(Event::from(event)).await;
//!
//! assert_eq!(summary.handlers_succeeded, 1);
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! # Ok::<(), browserve::Error>(())
//! # }).unwrap();
//! ```
//!
//! # Global Handlers
//!
//! A [`HandlerRegistry`] holds handlers that should be attached to every
//! emitter built from it. It is constructed explicitly and passed to
//! [`EventEmitter::with_registry`].

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::Result;

use super::model::Event;

// ============================================================================
// Types
// ============================================================================

/// Future returned by an [`EventHandler`].
pub type HandlerFuture = BoxFuture<'static, Result<()>>;

/// Async event handler.
///
/// Handlers are compared by pointer identity, so keep a clone of the `Arc`
/// to unsubscribe later.
pub type EventHandler = Arc<dyn Fn(Arc<Event>) -> HandlerFuture + Send + Sync>;

/// Map of event type to ordered handlers.
type HandlerMap = FxHashMap<String, Vec<EventHandler>>;

/// Wraps an async closure as an [`EventHandler`].
pub fn handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |event| f(event).boxed())
}

// ============================================================================
// EmitSummary
// ============================================================================

/// Failure of one handler during an emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerFailure {
    /// Position of the handler in the subscription list.
    pub handler_index: usize,
    /// Error kind, or `"Panic"`.
    pub error_type: String,
    /// Error message.
    pub error_message: String,
}

/// Outcome of one [`EventEmitter::emit`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmitSummary {
    /// Emitted event type.
    pub event_type: String,
    /// Handlers invoked.
    pub handlers_called: usize,
    /// Handlers that completed with `Ok`.
    pub handlers_succeeded: usize,
    /// Handlers that returned an error or panicked.
    pub handlers_failed: usize,
    /// One entry per failed handler.
    pub errors: Vec<HandlerFailure>,
}

// ============================================================================
// EventEmitter
// ============================================================================

/// Per-owner event registry with concurrent fan-out.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct EventEmitter {
    handlers: Arc<RwLock<HandlerMap>>,
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("event_types", &self.get_event_types())
            .field("handler_count", &self.get_handler_count(None))
            .finish()
    }
}

impl EventEmitter {
    /// Creates an emitter with no handlers.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an emitter pre-populated with a registry's handlers.
    #[must_use]
    pub fn with_registry(registry: &HandlerRegistry) -> Self {
        let emitter = Self::new();
        registry.apply_to_emitter(&emitter);
        emitter
    }

    /// Appends a handler to the list for `event_type`.
    pub fn subscribe(&self, event_type: impl Into<String>, handler: EventHandler) {
        let event_type = event_type.into();
        let mut handlers = self.handlers.write();
        let list = handlers.entry(event_type.clone()).or_default();
        list.push(handler);

        debug!(event_type = %event_type, count = list.len(), "Handler subscribed");
    }

    /// Wraps `f` as a handler, subscribes it, and returns it for later
    /// removal.
    pub fn on<F, Fut>(&self, event_type: impl Into<String>, f: F) -> EventHandler
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler = handler(f);
        self.subscribe(event_type, Arc::clone(&handler));
        handler
    }

    /// Removes the first subscription of `handler` for `event_type`.
    ///
    /// Returns `true` if a handler was removed. Removing the last handler
    /// of a type removes the type.
    pub fn unsubscribe(&self, event_type: &str, handler: &EventHandler) -> bool {
        let mut handlers = self.handlers.write();

        let Some(list) = handlers.get_mut(event_type) else {
            return false;
        };

        let Some(position) = list.iter().position(|h| Arc::ptr_eq(h, handler)) else {
            return false;
        };

        list.remove(position);
        if list.is_empty() {
            handlers.remove(event_type);
        }

        debug!(event_type, "Handler unsubscribed");
        true
    }

    /// Runs every handler for the event's type concurrently.
    ///
    /// Never fails. Handler errors and panics are reported in the summary.
    pub async fn emit(&self, event: impl Into<Arc<Event>>) -> EmitSummary {
        let event = event.into();
        let event_type = event.event_type();

        // Snapshot so handlers may (un)subscribe while running.
        let snapshot: Vec<EventHandler> = self
            .handlers
            .read()
            .get(event_type)
            .cloned()
            .unwrap_or_default();

        let mut summary = EmitSummary {
            event_type: event_type.to_string(),
            handlers_called: snapshot.len(),
            handlers_succeeded: 0,
            handlers_failed: 0,
            errors: Vec::new(),
        };

        if snapshot.is_empty() {
            return summary;
        }

        let outcomes = join_all(snapshot.iter().map(|handler| {
            let handler = Arc::clone(handler);
            let event = Arc::clone(&event);
            AssertUnwindSafe(async move { handler(event).await }).catch_unwind()
        }))
        .await;

        for (handler_index, outcome) in outcomes.into_iter().enumerate() {
            let failure = match outcome {
                Ok(Ok(())) => {
                    summary.handlers_succeeded += 1;
                    continue;
                }
                Ok(Err(e)) => HandlerFailure {
                    handler_index,
                    error_type: e.kind().to_string(),
                    error_message: e.to_string(),
                },
                Err(panic) => HandlerFailure {
                    handler_index,
                    error_type: "Panic".to_string(),
                    error_message: panic_message(panic.as_ref()),
                },
            };

            error!(
                event_type,
                handler_index,
                error_type = %failure.error_type,
                error = %failure.error_message,
                "Event handler failed"
            );

            summary.handlers_failed += 1;
            summary.errors.push(failure);
        }

        debug!(
            event_type,
            called = summary.handlers_called,
            failed = summary.handlers_failed,
            "Event emitted"
        );

        summary
    }

    /// Returns the handler count for one type, or for all types.
    #[must_use]
    pub fn get_handler_count(&self, event_type: Option<&str>) -> usize {
        let handlers = self.handlers.read();
        match event_type {
            Some(event_type) => handlers.get(event_type).map_or(0, Vec::len),
            None => handlers.values().map(Vec::len).sum(),
        }
    }

    /// Returns every type with at least one handler, sorted.
    #[must_use]
    pub fn get_event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.read().keys().cloned().collect();
        types.sort_unstable();
        types
    }

    /// Removes handlers for one type, or for all types.
    ///
    /// Returns the number of handlers removed.
    pub fn clear_handlers(&self, event_type: Option<&str>) -> usize {
        let mut handlers = self.handlers.write();
        let removed = match event_type {
            Some(event_type) => handlers.remove(event_type).map_or(0, |list| list.len()),
            None => {
                let count = handlers.values().map(Vec::len).sum();
                handlers.clear();
                count
            }
        };

        debug!(?event_type, removed, "Handlers cleared");
        removed
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

// ============================================================================
// HandlerRegistry
// ============================================================================

/// Handlers attached to every emitter built from this registry.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Mutex<HandlerMap>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.lock();
        let mut types: Vec<&String> = handlers.keys().collect();
        types.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("event_types", &types)
            .finish()
    }
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `event_type`.
    pub fn register_global_handler(&self, event_type: impl Into<String>, handler: EventHandler) {
        self.handlers
            .lock()
            .entry(event_type.into())
            .or_default()
            .push(handler);
    }

    /// Subscribes every registered handler on `emitter`.
    pub fn apply_to_emitter(&self, emitter: &EventEmitter) {
        let handlers = self.handlers.lock();
        for (event_type, list) in handlers.iter() {
            for handler in list {
                emitter.subscribe(event_type.clone(), Arc::clone(handler));
            }
        }
    }

    /// Returns a copy of the registered handlers.
    #[must_use]
    pub fn get_global_handlers(&self) -> FxHashMap<String, Vec<EventHandler>> {
        self.handlers.lock().clone()
    }

    /// Removes every registered handler.
    pub fn clear(&self) {
        self.handlers.lock().clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
