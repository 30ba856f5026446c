//! Buffered event logger.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Error, Result};
use crate::events::{
    DOM_CHANGE, Event, EventFilter, EventHandler, INTERACTION, NAVIGATION, NETWORK_REQUEST,
    event_type_filter, handler, panic_message,
};
use crate::page::Page;

use super::buffer::LogBuffer;
use super::writer::{self, LogWriter};

// ============================================================================
// Constants
// ============================================================================

/// Interval of the background flush task.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Event types the logger subscribes to on each page.
const LOGGED_EVENT_TYPES: [&str; 4] = [INTERACTION, NAVIGATION, NETWORK_REQUEST, DOM_CHANGE];

// ============================================================================
// Types
// ============================================================================

/// Background flush task handle.
struct FlushTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Shared logger state.
struct LoggerInner {
    config: LoggingConfig,
    buffer: LogBuffer,
    writer: LogWriter,
    filters: RwLock<Vec<EventFilter>>,
    sources: Mutex<FxHashSet<String>>,
    handler: EventHandler,
    logging: AtomicBool,
    filter_errors: AtomicU64,
    /// Serializes flushes so batches reach the sink in order.
    flush_lock: AsyncMutex<()>,
    /// Serializes start/stop and owns the flush task.
    lifecycle: AsyncMutex<Option<FlushTask>>,
}

// ============================================================================
// BrowserLogger
// ============================================================================

/// Buffered logger fed by one or more pages.
///
/// Events pass through the logger's filters, are buffered, and are written
/// to the output file when the buffer fills, once per second, on
/// [`flush`](Self::flush), and when the last page stops logging.
///
/// Cheap to clone; clones share the same buffer and sink.
///
/// # Example
///
/// ```ignore
/// let logger = BrowserLogger::new(
///     LoggingConfig::default().with_output_path("logs/session.jsonl"),
/// )?;
/// logger.start_logging(&page).await?;
/// page.click("#submit").await?;
/// logger.stop_logging(&page).await?;
/// logger.export_logs("logs/session.csv", LogFormat::Csv).await?;
/// ```
#[derive(Clone)]
pub struct BrowserLogger {
    inner: Arc<LoggerInner>,
}

impl fmt::Debug for BrowserLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserLogger")
            .field("output_path", &self.inner.config.output_path)
            .field("format", &self.inner.config.format)
            .field("buffered", &self.inner.buffer.len())
            .field("is_logging", &self.is_logging())
            .finish_non_exhaustive()
    }
}

impl BrowserLogger {
    /// Creates a logger. Nothing is opened until the first
    /// [`start_logging`](Self::start_logging).
    ///
    /// A non-empty `config.filters` installs an event-type filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the configuration is invalid.
    pub fn new(config: LoggingConfig) -> Result<Self> {
        config.validate()?;

        let mut filters = Vec::new();
        if !config.filters.is_empty() {
            filters.push(event_type_filter(config.filters.clone()));
        }

        let inner = Arc::new_cyclic(|weak: &Weak<LoggerInner>| {
            let weak = weak.clone();
            let on_event = handler(move |event: Arc<Event>| {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(inner) => inner.handle_event(event).await,
                        None => Ok(()),
                    }
                }
            });

            LoggerInner {
                buffer: LogBuffer::new(config.buffer_size),
                writer: LogWriter::new(&config),
                filters: RwLock::new(filters),
                sources: Mutex::new(FxHashSet::default()),
                handler: on_event,
                logging: AtomicBool::new(false),
                filter_errors: AtomicU64::new(0),
                flush_lock: AsyncMutex::new(()),
                lifecycle: AsyncMutex::new(None),
                config,
            }
        });

        Ok(Self { inner })
    }
}

// ============================================================================
// BrowserLogger - Accessors
// ============================================================================

impl BrowserLogger {
    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &LoggingConfig {
        &self.inner.config
    }

    /// Returns the live log file path.
    #[inline]
    #[must_use]
    pub fn output_path(&self) -> &Path {
        self.inner.writer.path()
    }

    /// Returns `true` while the sink is open.
    #[inline]
    #[must_use]
    pub fn is_logging(&self) -> bool {
        self.inner.logging.load(Ordering::SeqCst)
    }

    /// Returns the session ids of pages being logged, sorted.
    #[must_use]
    pub fn active_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.inner.sources.lock().iter().cloned().collect();
        sources.sort_unstable();
        sources
    }

    /// Returns how many times a filter panicked and was skipped.
    #[inline]
    #[must_use]
    pub fn filter_error_count(&self) -> u64 {
        self.inner.filter_errors.load(Ordering::Relaxed)
    }

    /// Returns the number of events waiting to be written.
    #[inline]
    #[must_use]
    pub fn buffered_count(&self) -> usize {
        self.inner.buffer.len()
    }
}

// ============================================================================
// BrowserLogger - Lifecycle
// ============================================================================

impl BrowserLogger {
    /// Starts logging `page`.
    ///
    /// The first call opens the sink (creating parent directories) and, with
    /// `auto_flush`, starts the once-per-second flush task. Logging the same
    /// page twice has no further effect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Logging`] if the sink cannot be opened.
    pub async fn start_logging(&self, page: &Page) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.lock().await;

        if !self.is_logging() {
            self.open_sink().await?;
            self.inner.logging.store(true, Ordering::SeqCst);

            if self.inner.config.auto_flush {
                let (stop, stop_rx) = oneshot::channel();
                let handle = tokio::spawn(run_periodic_flush(Arc::downgrade(&self.inner), stop_rx));
                *lifecycle = Some(FlushTask { stop, handle });
            }

            info!(path = %self.output_path().display(), format = %self.inner.config.format, "Logging started");
        }

        let session_id = page.session_id().to_string();
        if !self.inner.sources.lock().insert(session_id.clone()) {
            debug!(session_id = %session_id, "Page already logged");
            return Ok(());
        }

        for event_type in LOGGED_EVENT_TYPES {
            page.emitter()
                .subscribe(event_type, Arc::clone(&self.inner.handler));
        }

        debug!(session_id = %session_id, "Page logging started");
        Ok(())
    }

    /// Stops logging `page`.
    ///
    /// When no pages remain, the flush task is stopped and awaited, the
    /// buffer is written out, and the sink is closed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Logging`] if the final flush fails.
    pub async fn stop_logging(&self, page: &Page) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.lock().await;

        for event_type in LOGGED_EVENT_TYPES {
            page.emitter().unsubscribe(event_type, &self.inner.handler);
        }

        let remaining = {
            let mut sources = self.inner.sources.lock();
            sources.remove(page.session_id());
            sources.len()
        };
        debug!(session_id = %page.session_id(), remaining, "Page logging stopped");

        if remaining > 0 || !self.is_logging() {
            return Ok(());
        }

        self.inner.logging.store(false, Ordering::SeqCst);

        if let Some(task) = lifecycle.take() {
            let _ = task.stop.send(());
            if let Err(e) = task.handle.await {
                warn!(error = %e, "Flush task ended abnormally");
            }
        }

        self.inner.write_pending().await?;
        info!(path = %self.output_path().display(), "Logging stopped");
        Ok(())
    }

    async fn open_sink(&self) -> Result<()> {
        let writer = self.inner.writer.clone();
        tokio::task::spawn_blocking(move || writer.open())
            .await
            .map_err(|e| Error::logging(format!("Failed to initialize logging: {e}")))?
            .map_err(|e| Error::logging(format!("Failed to initialize logging: {e}")))
    }
}

// ============================================================================
// BrowserLogger - Filters
// ============================================================================

impl BrowserLogger {
    /// Adds a filter. An event is logged only if every filter accepts it.
    pub fn add_filter(&self, filter: EventFilter) {
        self.inner.filters.write().push(filter);
    }

    /// Removes a previously added filter (or a clone of it).
    ///
    /// Returns `true` if the filter was found.
    pub fn remove_filter(&self, filter: &EventFilter) -> bool {
        let mut filters = self.inner.filters.write();
        let Some(position) = filters.iter().position(|f| f.ptr_eq(filter)) else {
            return false;
        };
        filters.remove(position);
        true
    }

    /// Returns the number of installed filters.
    #[inline]
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.inner.filters.read().len()
    }
}

// ============================================================================
// BrowserLogger - Output
// ============================================================================

impl BrowserLogger {
    /// Writes buffered events to the sink. Does nothing while not logging.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Logging`] if the write fails.
    pub async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }

    /// Converts the current log file (not the buffer) into `format` at
    /// `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Logging`] if the log file is missing, unreadable,
    /// or cannot be converted.
    pub async fn export_logs(&self, path: impl Into<PathBuf>, format: LogFormat) -> Result<()> {
        let source = self.output_path().to_path_buf();
        let source_format = self.inner.config.format;
        let target = path.into();

        debug!(source = %source.display(), target = %target.display(), %format, "Exporting logs");

        tokio::task::spawn_blocking(move || writer::export(&source, source_format, &target, format))
            .await
            .map_err(|e| Error::logging_format(format!("Export failed: {e}"), format.as_str()))?
            .map_err(|e| match e {
                Error::Logging { .. } => e,
                other => Error::logging_format(format!("Export failed: {other}"), format.as_str()),
            })
    }
}

// ============================================================================
// LoggerInner
// ============================================================================

impl LoggerInner {
    async fn handle_event(&self, event: Arc<Event>) -> Result<()> {
        if !self.passes_filters(&event) {
            return Ok(());
        }

        let full = self.buffer.add_event(event);
        if full && self.config.auto_flush {
            self.flush().await?;
        }
        Ok(())
    }

    /// Runs every filter. A panicking filter is skipped and counted.
    fn passes_filters(&self, event: &Event) -> bool {
        let filters = self.filters.read().clone();

        for filter in &filters {
            match catch_unwind(AssertUnwindSafe(|| filter.should_process(event))) {
                Ok(true) => {}
                Ok(false) => return false,
                Err(panic) => {
                    self.filter_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        error = %panic_message(panic.as_ref()),
                        event_type = event.event_type(),
                        "Event filter panicked, ignoring it"
                    );
                }
            }
        }
        true
    }

    async fn flush(&self) -> Result<()> {
        if !self.logging.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.write_pending().await
    }

    async fn write_pending(&self) -> Result<()> {
        let _guard = self.flush_lock.lock().await;

        let events = self.buffer.flush_all();
        if events.is_empty() {
            return Ok(());
        }

        let count = events.len();
        let writer = self.writer.clone();
        let format = self.config.format.as_str();

        tokio::task::spawn_blocking(move || writer.write_batch(&events))
            .await
            .map_err(|e| Error::logging_format(format!("Failed to flush events: {e}"), format))?
            .map_err(|e| Error::logging_format(format!("Failed to flush events: {e}"), format))?;

        debug!(count, format, "Flushed events");
        Ok(())
    }
}

/// Flushes once per [`FLUSH_INTERVAL`] until stopped or the logger is
/// dropped.
async fn run_periodic_flush(inner: Weak<LoggerInner>, mut stop: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            _ = &mut stop => break,
            () = sleep(FLUSH_INTERVAL) => {}
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.buffer.is_empty() {
            continue;
        }
        if let Err(e) = inner.flush().await {
            warn!(error = %e, "Periodic flush failed");
        }
    }

    debug!("Periodic flush task stopped");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::Value;

    use super::*;
    use crate::events::{EventBase, EventFilter, InteractionAction, InteractionEvent};
    use crate::page::mock::{MockDriver, MockElement};

    fn config(dir: &Path, file: &str) -> LoggingConfig {
        LoggingConfig::default()
            .with_output_path(dir.join(file))
            .with_buffer_size(10)
    }

    fn page(session_id: &str) -> (Page, MockDriver) {
        let driver = MockDriver::new("https://example.com")
            .with_element("#a", MockElement::new("button"))
            .with_element("#b", MockElement::new("input"));
        let page = Page::new("https://example.com", session_id).unwrap();
        page.set_driver(Arc::new(driver.clone()));
        (page, driver)
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn click_event(session_id: &str) -> Event {
        let base = EventBase::new("https://example.com", session_id).unwrap();
        InteractionEvent::new(base, InteractionAction::Click, "#a")
            .unwrap()
            .into()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = BrowserLogger::new(LoggingConfig::default().with_buffer_size(1)).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let logger = BrowserLogger::new(config(&dir.path().join("nested"), "log.jsonl")).unwrap();
        let (page, _) = page("session-1");

        assert!(!logger.is_logging());
        logger.start_logging(&page).await.unwrap();
        assert!(logger.is_logging());
        assert!(logger.output_path().exists());
        assert_eq!(logger.active_sources(), ["session-1"]);
        assert_eq!(page.emitter().get_handler_count(None), 4);

        logger.start_logging(&page).await.unwrap();
        assert_eq!(page.emitter().get_handler_count(None), 4);

        logger.stop_logging(&page).await.unwrap();
        assert!(!logger.is_logging());
        assert!(logger.active_sources().is_empty());
        assert_eq!(page.emitter().get_handler_count(None), 0);
    }

    #[tokio::test]
    async fn test_stop_writes_remaining_events() {
        let dir = tempfile::tempdir().unwrap();
        let logger = BrowserLogger::new(config(dir.path(), "log.jsonl").with_auto_flush(false)).unwrap();
        let (page, _) = page("session-1");

        logger.start_logging(&page).await.unwrap();
        page.click("#a").await.unwrap();
        page.fill("#b", "hello", None).await.unwrap();
        assert_eq!(logger.buffered_count(), 2);

        logger.stop_logging(&page).await.unwrap();

        let records = read_lines(logger.output_path());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["action"], "click");
        assert_eq!(records[1]["value"], "hello");
        assert_eq!(logger.buffered_count(), 0);
    }

    #[tokio::test]
    async fn test_buffer_full_flushes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let logger = BrowserLogger::new(config(dir.path(), "log.jsonl")).unwrap();
        let (page, _) = page("session-1");
        logger.start_logging(&page).await.unwrap();

        for _ in 0..10 {
            page.emitter().emit(click_event("session-1")).await;
        }

        assert_eq!(logger.buffered_count(), 0);
        assert_eq!(read_lines(logger.output_path()).len(), 10);
        logger.stop_logging(&page).await.unwrap();
    }

    #[tokio::test]
    async fn test_manual_flush_drains_past_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let logger = BrowserLogger::new(config(dir.path(), "log.jsonl").with_auto_flush(false)).unwrap();
        let (page, _) = page("session-1");
        logger.start_logging(&page).await.unwrap();

        for _ in 0..25 {
            page.emitter().emit(click_event("session-1")).await;
        }
        assert_eq!(logger.buffered_count(), 25);
        assert!(read_lines(logger.output_path()).is_empty());

        logger.flush().await.unwrap();
        assert_eq!(logger.buffered_count(), 0);
        assert_eq!(read_lines(logger.output_path()).len(), 25);
        logger.stop_logging(&page).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_flush_writes_within_interval() {
        let dir = tempfile::tempdir().unwrap();
        let logger = BrowserLogger::new(config(dir.path(), "log.jsonl")).unwrap();
        let (page, _) = page("session-1");
        logger.start_logging(&page).await.unwrap();

        page.emitter().emit(click_event("session-1")).await;
        assert_eq!(logger.buffered_count(), 1);

        tokio::time::sleep(FLUSH_INTERVAL + Duration::from_millis(100)).await;
        for _ in 0..50 {
            if logger.buffered_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(logger.buffered_count(), 0);
        logger.stop_logging(&page).await.unwrap();
        assert_eq!(read_lines(logger.output_path()).len(), 1);
    }

    #[tokio::test]
    async fn test_filters_from_config_and_identity_removal() {
        let dir = tempfile::tempdir().unwrap();
        let logger = BrowserLogger::new(
            config(dir.path(), "log.jsonl")
                .with_auto_flush(false)
                .with_filters(["navigation"]),
        )
        .unwrap();
        let (page, _) = page("session-1");
        logger.start_logging(&page).await.unwrap();

        page.click("#a").await.unwrap();
        page.navigate("https://example.com/next", Default::default(), None)
            .await
            .unwrap();
        assert_eq!(logger.buffered_count(), 1);

        let clicks_only = EventFilter::builder().event_types(["interaction"]).build();
        logger.add_filter(clicks_only.clone());
        assert_eq!(logger.filter_count(), 2);
        assert!(logger.remove_filter(&clicks_only));
        assert!(!logger.remove_filter(&EventFilter::new()));
        assert_eq!(logger.filter_count(), 1);

        logger.stop_logging(&page).await.unwrap();
        let records = read_lines(logger.output_path());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["event_type"], "navigation");
    }

    #[tokio::test]
    async fn test_panicking_filter_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let logger = BrowserLogger::new(config(dir.path(), "log.jsonl").with_auto_flush(false)).unwrap();
        logger.add_filter(EventFilter::from_predicate(|_| panic!("broken filter")));
        let (page, _) = page("session-1");
        logger.start_logging(&page).await.unwrap();

        page.emitter().emit(click_event("session-1")).await;

        assert_eq!(logger.filter_error_count(), 1);
        assert_eq!(logger.buffered_count(), 1);
        logger.stop_logging(&page).await.unwrap();
    }

    #[tokio::test]
    async fn test_multiple_pages_share_sink() {
        let dir = tempfile::tempdir().unwrap();
        let logger = BrowserLogger::new(config(dir.path(), "log.jsonl").with_auto_flush(false)).unwrap();
        let (first, _) = page("alpha");
        let (second, _) = page("beta");

        logger.start_logging(&first).await.unwrap();
        logger.start_logging(&second).await.unwrap();
        first.emitter().emit(click_event("alpha")).await;
        second.emitter().emit(click_event("beta")).await;

        logger.stop_logging(&first).await.unwrap();
        assert!(logger.is_logging());
        assert_eq!(logger.active_sources(), ["beta"]);

        logger.stop_logging(&second).await.unwrap();
        let sessions: Vec<Value> = read_lines(logger.output_path())
            .into_iter()
            .map(|r| r["session_id"].clone())
            .collect();
        assert_eq!(sessions, ["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_flush_error_reaches_emitter_summary() {
        let dir = tempfile::tempdir().unwrap();
        let logger = BrowserLogger::new(config(dir.path(), "log.json").with_format(LogFormat::Json))
            .unwrap();
        let (page, _) = page("session-1");
        logger.start_logging(&page).await.unwrap();
        fs::write(logger.output_path(), "not json").unwrap();

        let mut summary = None;
        for _ in 0..10 {
            summary = Some(page.emitter().emit(click_event("session-1")).await);
        }

        let summary = summary.unwrap();
        assert_eq!(summary.handlers_failed, 1);
        assert_eq!(summary.errors[0].error_type, "LoggingError");
    }

    #[tokio::test]
    async fn test_export_requires_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let logger = BrowserLogger::new(config(dir.path(), "never.jsonl")).unwrap();

        let err = logger
            .export_logs(dir.path().join("out.csv"), LogFormat::Csv)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("never.jsonl"));
    }
}
