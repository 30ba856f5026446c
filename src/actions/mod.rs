//! Retryable, time-bounded browser actions.
//!
//! Every action owns an [`ActionConfig`] and runs through
//! [`Action::execute_with_hooks`], which applies the readiness check,
//! per-attempt timeout, exponential backoff between attempts, and the
//! post-execution hook. The outcome is always an
//! [`ActionResult`](crate::ActionResult); errors never escape the cycle.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `base` | [`Action`] trait, [`ActionConfig`], retry cycle |
//! | `composite` | [`ComposedAction`] sequences, [`ConditionalAction`] |
//! | `interaction` | Click, fill, navigate, wait, hover, scroll |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use browserve::{Action, ActionExt, ClickAction, ComposedAction, FillAction};
//!
//! let login = ComposedAction::new(vec![
//!     Arc::new(FillAction::new("#user", "ada")?),
//!     Arc::new(FillAction::new("#pass", "secret")?),
//!     Arc::new(ClickAction::new("#submit")?.with_retry(3)?),
//! ])?;
//! let result = login.execute_with_hooks(&page).await;
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod base;
mod composite;
mod interaction;

// ============================================================================
// Re-exports
// ============================================================================

pub use base::{
    Action, ActionConfig, ActionExt, DEFAULT_ACTION_TIMEOUT, MAX_ACTION_DELAY, MAX_ACTION_TIMEOUT,
    MAX_RETRY_COUNT, MIN_ACTION_TIMEOUT, retry_delay,
};
pub use composite::{ComposedAction, ConditionalAction};
pub use interaction::{
    ClickAction, DEFAULT_SCROLL_PIXELS, FillAction, HoverAction, MAX_CLICK_COUNT,
    NavigationAction, ScrollAction, ScrollDirection, WaitAction,
};
