//! Event records, emission, and filtering.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `model` | Typed event records and [`create_event`] |
//! | `emitter` | [`EventEmitter`] and [`HandlerRegistry`] |
//! | `filters` | [`EventFilter`], [`FilterChain`], helper constructors |

// ============================================================================
// Submodules
// ============================================================================

mod emitter;
mod filters;
mod model;

// ============================================================================
// Re-exports
// ============================================================================

pub use emitter::{
    EmitSummary, EventEmitter, EventHandler, HandlerFailure, HandlerFuture, HandlerRegistry,
    handler,
};
pub use filters::{
    EventFilter, EventFilterBuilder, FilterChain, FilterOp, FilterPredicate, action_filter,
    domain_filter, event_type_filter, exclusion_filter, network_filter, selector_filter,
    time_range_filter,
};
pub use model::{
    DOM_CHANGE, DomChangeEvent, DomChangeType, EVENT_TYPES, Event, EventBase, HttpMethod,
    INTERACTION, InteractionAction, InteractionEvent, NAVIGATION, NETWORK_REQUEST,
    NavigationEvent, NavigationMethod, NetworkEvent, create_event,
};

pub(crate) use emitter::panic_message;
