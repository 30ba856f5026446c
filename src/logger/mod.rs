//! Buffered, filtered event logging to disk.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`BrowserLogger`] lifecycle, filters, flush, export |
//! | `buffer` | [`LogBuffer`] |
//! | `writer` | Format encoders, rotation, export conversion |
//!
//! # Output Formats
//!
//! | Format | Layout |
//! |--------|--------|
//! | `jsonl` | One event object per line |
//! | `json` | One top-level array |
//! | `csv` | `event_type,timestamp,page_url,session_id` then sorted metadata keys |
//!
//! Rotated files are named `{stem}.{unix_seconds}{suffix}` next to the live
//! file.

// ============================================================================
// Submodules
// ============================================================================

mod buffer;
mod core;
mod writer;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{BrowserLogger, FLUSH_INTERVAL};
pub use buffer::LogBuffer;
pub use writer::CSV_BASE_COLUMNS;
