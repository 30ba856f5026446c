//! Event-emitting page over a pluggable browser driver.
//!
//! A [`Page`] forwards primitives to an attached [`BrowserDriver`] and emits
//! a typed event after each one completes.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `driver` | [`BrowserDriver`] and [`Locator`] traits, option types |
//! | `core` | Page struct, builder, and accessors |
//! | `interaction` | Click, fill, clear, hover |
//! | `navigation` | Navigate, reload, history |
//! | `elements` | Waiting and element queries |
//! | `scroll` | Wheel and scroll-into-view |
//!
//! # Emitted Events
//!
//! | Operation | Event | Action / Method |
//! |-----------|-------|-----------------|
//! | `click` | `interaction` | `click` |
//! | `fill` | `interaction` | `fill` |
//! | `clear` | `interaction` | `clear` |
//! | `hover` | `interaction` | `hover` |
//! | `navigate` | `navigation` | `navigate` |
//! | `reload` | `navigation` | `reload` |
//! | `go_back` | `navigation` | `back` |
//! | `go_forward` | `navigation` | `forward` |

// ============================================================================
// Submodules
// ============================================================================

mod core;
mod driver;
mod elements;
mod interaction;
mod navigation;
mod scroll;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Page, PageBuilder};
pub use driver::{
    BrowserDriver, ClickOptions, ElementState, HoverOptions, KeyModifier, Locator, MouseButton,
    PageResponse, Position, WaitUntil,
};
