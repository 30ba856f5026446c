//! Action outcomes and aggregate metrics.
//!
//! Every execution of an [`Action`](crate::Action) produces exactly one
//! [`ActionResult`]. Results are built through named factories and refined
//! with chainable `with_*` methods; callers never assign fields directly.
//!
//! # Example
//!
//! ```
//! use browserve::{ActionResult, ActionStatus};
//! use serde_json::json;
//!
//! let result = ActionResult::success(None)
//!     .with_action_type("click")
//!     .with_metadata("selector", json!("#submit"));
//!
//! assert!(result.is_success());
//! assert_eq!(result.status(), ActionStatus::Success);
//! assert!(result.error().is_none());
//! ```
//!
//! # Invariant
//!
//! `is_success() == true` implies `status() == ActionStatus::Success` and
//! `error() == None`. The factories are the only way to set these three.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tokio::time::Instant;

// ============================================================================
// ActionStatus
// ============================================================================

/// Detailed execution status of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Completed successfully.
    Success,
    /// Failed without timing out.
    Failure,
    /// Exceeded its timeout.
    Timeout,
    /// Intermediate retry record.
    Retry,
    /// Not executed.
    Skipped,
}

impl ActionStatus {
    /// Returns the lowercase wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
            Self::Retry => "retry",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ActionResult
// ============================================================================

/// Outcome of one action execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    success: bool,
    status: ActionStatus,
    data: Option<Map<String, Value>>,
    error: Option<String>,
    metadata: Map<String, Value>,
    #[serde(serialize_with = "serialize_secs")]
    execution_time: Option<Duration>,
    retry_count: u32,
    action_type: Option<String>,
}

// ============================================================================
// Constructors
// ============================================================================

impl ActionResult {
    /// Creates a successful result with an optional payload.
    ///
    /// A missing payload is stored as an empty map.
    #[must_use]
    pub fn success(data: Option<Map<String, Value>>) -> Self {
        Self {
            success: true,
            status: ActionStatus::Success,
            data: Some(data.unwrap_or_default()),
            error: None,
            metadata: Map::new(),
            execution_time: None,
            retry_count: 0,
            action_type: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            status: ActionStatus::Failure,
            data: None,
            error: Some(error.into()),
            metadata: Map::new(),
            execution_time: None,
            retry_count: 0,
            action_type: None,
        }
    }

    /// Creates a timeout result naming the configured timeout.
    #[must_use]
    pub fn timeout(timeout: Duration) -> Self {
        let secs = timeout.as_secs_f64();
        let mut metadata = Map::new();
        metadata.insert("timeout_duration".to_string(), Value::from(secs));

        Self {
            success: false,
            status: ActionStatus::Timeout,
            data: None,
            error: Some(format!("Action timed out after {secs:?}s")),
            metadata,
            execution_time: None,
            retry_count: 0,
            action_type: None,
        }
    }

    /// Creates an in-progress retry record.
    ///
    /// `attempt` is 1-based; the stored retry count is `attempt - 1`.
    #[must_use]
    pub fn retry(attempt: u32, max_attempts: u32, last_error: impl Into<String>) -> Self {
        let last_error = last_error.into();
        let mut metadata = Map::new();
        metadata.insert("current_attempt".to_string(), Value::from(attempt));
        metadata.insert("max_attempts".to_string(), Value::from(max_attempts));
        metadata.insert("last_error".to_string(), Value::from(last_error.clone()));

        Self {
            success: false,
            status: ActionStatus::Retry,
            data: None,
            error: Some(format!("Attempt {attempt}/{max_attempts} failed: {last_error}")),
            metadata,
            execution_time: None,
            retry_count: attempt.saturating_sub(1),
            action_type: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ActionResult {
    /// Sets the action type.
    #[inline]
    #[must_use]
    pub fn with_action_type(mut self, action_type: impl Into<String>) -> Self {
        self.action_type = Some(action_type.into());
        self
    }

    /// Adds one metadata entry, replacing any previous value for the key.
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Stamps the elapsed time since `start`.
    #[inline]
    #[must_use]
    pub fn with_timing(mut self, start: Instant) -> Self {
        self.execution_time = Some(start.elapsed());
        self
    }

    #[inline]
    pub(crate) fn set_execution_time(&mut self, elapsed: Duration) {
        self.execution_time = Some(elapsed);
    }

    #[inline]
    pub(crate) fn set_retry_count(&mut self, retry_count: u32) {
        self.retry_count = retry_count;
    }

    #[inline]
    pub(crate) fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Fills in the action type when the producer left it unset.
    #[inline]
    pub(crate) fn default_action_type(&mut self, action_type: &str) {
        if self.action_type.is_none() {
            self.action_type = Some(action_type.to_string());
        }
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl ActionResult {
    /// Returns `true` if the action succeeded.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the detailed status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ActionStatus {
        self.status
    }

    /// Returns the result payload.
    #[inline]
    #[must_use]
    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref()
    }

    /// Returns the error message, if any.
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the free-form metadata.
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns the wall time from the start of the call.
    #[inline]
    #[must_use]
    pub fn execution_time(&self) -> Option<Duration> {
        self.execution_time
    }

    /// Returns the number of retries performed.
    #[inline]
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the action type.
    #[inline]
    #[must_use]
    pub fn action_type(&self) -> Option<&str> {
        self.action_type.as_deref()
    }

    /// Returns `true` if the outcome could change on retry.
    #[inline]
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self.status, ActionStatus::Failure | ActionStatus::Timeout)
    }

    /// Returns a one-line human-readable summary.
    ///
    /// ```
    /// use browserve::ActionResult;
    ///
    /// let failed = ActionResult::failure("Element not found").with_action_type("click");
    /// assert_eq!(failed.summary(), "✗ click failed: Element not found");
    /// ```
    #[must_use]
    pub fn summary(&self) -> String {
        let action = self.action_type.as_deref().unwrap_or("Action");

        if self.success {
            let timing = match self.execution_time {
                Some(elapsed) if !elapsed.is_zero() => {
                    format!(" ({:.2}s)", elapsed.as_secs_f64())
                }
                _ => String::new(),
            };
            format!("✓ {action} succeeded{timing}")
        } else {
            let retries = if self.retry_count > 0 {
                format!(" (retry {})", self.retry_count)
            } else {
                String::new()
            };
            let error = self.error.as_deref().unwrap_or_default();
            format!("✗ {action} failed{retries}: {error}")
        }
    }
}

fn serialize_secs<S: Serializer>(
    value: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(elapsed) => serializer.serialize_some(&elapsed.as_secs_f64()),
        None => serializer.serialize_none(),
    }
}

// ============================================================================
// ActionMetrics
// ============================================================================

/// Running aggregate over a stream of results.
///
/// Owned by whatever orchestrates a batch of actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionMetrics {
    /// Total results recorded.
    pub total_actions: u64,
    /// Results with `success == true`.
    pub successful_actions: u64,
    /// Failed results other than timeouts.
    pub failed_actions: u64,
    /// Timed-out results.
    pub timeout_actions: u64,
    /// Sum of recorded execution times.
    pub total_execution_time: Duration,
    /// Sum of recorded retry counts.
    pub total_retries: u64,
}

impl ActionMetrics {
    /// Creates empty metrics.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one result.
    pub fn record(&mut self, result: &ActionResult) {
        self.total_actions += 1;

        if result.is_success() {
            self.successful_actions += 1;
        } else if result.status() == ActionStatus::Timeout {
            self.timeout_actions += 1;
        } else {
            self.failed_actions += 1;
        }

        if let Some(elapsed) = result.execution_time() {
            self.total_execution_time += elapsed;
        }

        self.total_retries += u64::from(result.retry_count());
    }

    /// Returns the success rate as a percentage in `[0, 100]`.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_actions == 0 {
            return 0.0;
        }
        self.successful_actions as f64 / self.total_actions as f64 * 100.0
    }

    /// Returns total execution time divided by successful actions.
    #[must_use]
    pub fn average_execution_time(&self) -> Duration {
        match u32::try_from(self.successful_actions) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(count) => self.total_execution_time / count,
        }
    }

    /// Resets all counters to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Tests
// ============================================================================
