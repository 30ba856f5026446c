//! Browser and logger configuration.
//!
//! Both config types use public fields, `with_*` builders, and an explicit
//! `validate()` that reports the offending key.
//!
//! # Example
//!
//! ```
//! use browserve::{LogFormat, LoggingConfig};
//!
//! let config = LoggingConfig::new()
//!     .with_format(LogFormat::Csv)
//!     .with_buffer_size(50)
//!     .with_output_path("logs/session.csv");
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Environment
//!
//! [`Config::from_env`] reads the following variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `BROWSERVE_HEADLESS` | `browser.headless` (`true` enables) |
//! | `BROWSERVE_VIEWPORT` | `browser.viewport` (`WxH`) |
//! | `BROWSERVE_USER_AGENT` | `browser.user_agent` |
//! | `BROWSERVE_TIMEOUT` | `browser.timeout` (seconds) |
//! | `BROWSERVE_LOG_FORMAT` | `logging.format` |
//! | `BROWSERVE_BUFFER_SIZE` | `logging.buffer_size` |
//! | `BROWSERVE_LOG_PATH` | `logging.output_path` |
//!
//! Unparseable numbers keep the default. Parsed values still go through
//! validation.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default log file, relative to the working directory.
pub const DEFAULT_OUTPUT_PATH: &str = "browserve_session.jsonl";

/// Default buffered event count.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Smallest accepted rotation threshold (1 MiB).
pub const MIN_FILE_SIZE: u64 = 1024 * 1024;

/// Default rotation threshold (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

const BUFFER_SIZE_RANGE: (usize, usize) = (10, 10_000);
const TIMEOUT_RANGE: (Duration, Duration) = (Duration::from_secs(1), Duration::from_secs(300));
const MAX_SLOW_MO: Duration = Duration::from_secs(5);
const VIEWPORT_MIN: (u32, u32) = (100, 100);
const VIEWPORT_MAX: (u32, u32) = (7680, 4320);

// ============================================================================
// LogFormat
// ============================================================================

/// On-disk log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Jsonl,
    /// A single JSON array.
    Json,
    /// Header row plus one row per event.
    Csv,
}

impl LogFormat {
    /// Returns the lowercase name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jsonl => "jsonl",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "jsonl" => Ok(Self::Jsonl),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(Error::configuration(
                "format",
                format!("Invalid format '{s}'. Must be one of: jsonl, json, csv"),
            )),
        }
    }
}

// ============================================================================
// LoggingConfig
// ============================================================================

/// Event logger configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,

    /// Event types to keep. Empty keeps every type.
    pub filters: Vec<String>,

    /// Events buffered before a flush is forced.
    pub buffer_size: usize,

    /// Flush when the buffer fills and once per second.
    ///
    /// When disabled, `buffer_size` is no longer an upper bound: events
    /// accumulate until the caller invokes `BrowserLogger::flush` or stops
    /// logging.
    pub auto_flush: bool,

    /// Log file path.
    pub output_path: PathBuf,

    /// Rotation threshold in bytes.
    pub max_file_size: u64,

    /// Rename the live file when it reaches `max_file_size`.
    pub rotate_logs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filters: Vec::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            auto_flush: true,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            rotate_logs: true,
        }
    }
}

impl LoggingConfig {
    /// Creates the default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output format.
    #[inline]
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Keeps only the given event types.
    #[inline]
    #[must_use]
    pub fn with_filters(mut self, event_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.filters = event_types.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the buffer size.
    #[inline]
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Enables or disables automatic flushing. See
    /// [`auto_flush`](Self::auto_flush) for what the caller then owns.
    #[inline]
    #[must_use]
    pub fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }

    /// Sets the log file path.
    #[inline]
    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Sets the rotation threshold in bytes.
    #[inline]
    #[must_use]
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Enables or disables rotation.
    #[inline]
    #[must_use]
    pub fn with_rotation(mut self, rotate_logs: bool) -> Self {
        self.rotate_logs = rotate_logs;
        self
    }

    /// Checks every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first invalid key.
    pub fn validate(&self) -> Result<()> {
        let (min, max) = BUFFER_SIZE_RANGE;
        if !(min..=max).contains(&self.buffer_size) {
            return Err(Error::configuration(
                "buffer_size",
                format!("buffer_size must be between {min} and {max}, got {}", self.buffer_size),
            ));
        }

        if self.max_file_size < MIN_FILE_SIZE {
            return Err(Error::configuration(
                "max_file_size",
                format!(
                    "max_file_size must be at least {MIN_FILE_SIZE} bytes, got {}",
                    self.max_file_size
                ),
            ));
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(Error::configuration("output_path", "output_path cannot be empty"));
        }

        if let Some(event_type) = self.filters.iter().find(|t| t.trim().is_empty()) {
            return Err(Error::configuration(
                "filters",
                format!("filter entries cannot be empty, got '{event_type}'"),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// BrowserConfig
// ============================================================================

/// Browser defaults carried by a [`Page`](crate::Page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    /// Run without a visible window.
    pub headless: bool,

    /// Viewport size (width, height).
    pub viewport: (u32, u32),

    /// Custom user agent.
    pub user_agent: Option<String>,

    /// Default timeout for page primitives.
    pub timeout: Duration,

    /// Delay injected between driver operations.
    pub slow_mo: Duration,

    /// Open developer tools on startup.
    pub dev_tools: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: (1920, 1080),
            user_agent: None,
            timeout: Duration::from_secs(30),
            slow_mo: Duration::ZERO,
            dev_tools: false,
        }
    }
}

impl BrowserConfig {
    /// Creates the default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets headless mode.
    #[inline]
    #[must_use]
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Sets the viewport size.
    #[inline]
    #[must_use]
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    /// Sets a custom user agent.
    #[inline]
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the default primitive timeout.
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the slow-motion delay.
    #[inline]
    #[must_use]
    pub fn with_slow_mo(mut self, slow_mo: Duration) -> Self {
        self.slow_mo = slow_mo;
        self
    }

    /// Checks every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first invalid key.
    pub fn validate(&self) -> Result<()> {
        let (width, height) = self.viewport;
        if width < VIEWPORT_MIN.0 || height < VIEWPORT_MIN.1 {
            return Err(Error::configuration(
                "viewport",
                "Viewport dimensions must be at least 100x100",
            ));
        }
        if width > VIEWPORT_MAX.0 || height > VIEWPORT_MAX.1 {
            return Err(Error::configuration(
                "viewport",
                "Viewport dimensions exceed maximum 7680x4320",
            ));
        }

        let (min, max) = TIMEOUT_RANGE;
        if self.timeout < min || self.timeout > max {
            return Err(Error::configuration(
                "timeout",
                format!("timeout must be between 1 and 300 seconds, got {:?}", self.timeout),
            ));
        }

        if self.slow_mo > MAX_SLOW_MO {
            return Err(Error::configuration(
                "slow_mo",
                format!("slow_mo must be at most 5 seconds, got {:?}", self.slow_mo),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Config
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Browser defaults.
    pub browser: BrowserConfig,
    /// Logger settings.
    pub logging: LoggingConfig,
}

impl Config {
    /// Builds configuration from `BROWSERVE_*` process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a parsed value is out of range.
    pub fn from_env() -> Result<Self> {
        Self::from_env_map(std::env::vars())
    }

    /// Builds configuration from an explicit set of variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a parsed value is out of range.
    pub fn from_env_map<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: FxHashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut config = Self::default();

        if let Some(value) = vars.get("BROWSERVE_HEADLESS") {
            config.browser.headless = value.trim().eq_ignore_ascii_case("true");
        }

        if let Some(value) = vars.get("BROWSERVE_VIEWPORT")
            && let Some((width, height)) = value.split_once('x')
            && let (Ok(width), Ok(height)) = (width.trim().parse::<u32>(), height.trim().parse::<u32>())
        {
            config.browser.viewport = (width, height);
        }

        if let Some(value) = vars.get("BROWSERVE_USER_AGENT") {
            config.browser.user_agent = Some(value.clone());
        }

        if let Some(value) = vars.get("BROWSERVE_TIMEOUT")
            && let Ok(secs) = value.trim().parse::<f64>()
        {
            config.browser.timeout = Duration::try_from_secs_f64(secs).map_err(|_| {
                Error::configuration("timeout", format!("invalid timeout '{value}'"))
            })?;
        }

        if let Some(value) = vars.get("BROWSERVE_LOG_FORMAT") {
            config.logging.format = value.parse()?;
        }

        if let Some(value) = vars.get("BROWSERVE_BUFFER_SIZE")
            && let Ok(size) = value.trim().parse::<usize>()
        {
            config.logging.buffer_size = size;
        }

        if let Some(value) = vars.get("BROWSERVE_LOG_PATH") {
            config.logging.output_path = PathBuf::from(value);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates both sections.
    ///
    /// # Errors
    ///
    /// Returns the first [`Error::Configuration`] found.
    pub fn validate(&self) -> Result<()> {
        self.browser.validate()?;
        self.logging.validate()
    }
}

// ============================================================================
// Tests
// ============================================================================
