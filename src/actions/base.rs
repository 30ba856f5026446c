//! Action trait, shared configuration, and the retrying hook cycle.
//!
//! Every action carries an [`ActionConfig`] and implements
//! [`Action::execute`]. Callers run actions through
//! [`Action::execute_with_hooks`], which wraps `execute` with
//! pre/post hooks, a per-attempt timeout, and exponential backoff.
//!
//! # Hook Cycle
//!
//! ```text
//! attempt 0..=retry_count:
//!     pre_execute  (when validate_before; sleeps wait_before)
//!     execute      (under timeout)
//!     post_execute (sleeps wait_after)
//!     success      -> return
//!     failure      -> sleep backoff, next attempt
//! ```
//!
//! Backoff before attempt `n + 1` is `min(0.5s * 2^n, 8s)`.
//!
//! # Terminal Outcomes
//!
//! | Last attempt | Returned result |
//! |--------------|-----------------|
//! | Failure result | That result, stamped with timing and retry count |
//! | Timed out | [`ActionResult::timeout`] naming the configured timeout |
//! | Error or panic | Failure naming the attempt count and last error |
//!
//! `execute_with_hooks` never returns an error.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::events::panic_message;
use crate::page::Page;
use crate::results::ActionResult;

use super::composite::ComposedAction;

// ============================================================================
// Constants
// ============================================================================

/// Default per-attempt timeout.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Smallest accepted per-attempt timeout.
pub const MIN_ACTION_TIMEOUT: Duration = Duration::from_millis(100);

/// Largest accepted per-attempt timeout.
pub const MAX_ACTION_TIMEOUT: Duration = Duration::from_secs(300);

/// Largest accepted retry count.
pub const MAX_RETRY_COUNT: u32 = 10;

/// Largest accepted `wait_before` / `wait_after`.
pub const MAX_ACTION_DELAY: Duration = Duration::from_secs(60);

const BASE_RETRY_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(8);

// ============================================================================
// ActionConfig
// ============================================================================

/// Settings shared by every action.
///
/// All fields are validated when set; an `ActionConfig` is always within
/// range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionConfig {
    action_type: String,
    timeout: Duration,
    retry_count: u32,
    wait_before: Duration,
    wait_after: Duration,
    validate_before: bool,
    description: Option<String>,
}

impl ActionConfig {
    /// Creates a configuration with default timing for `action_type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `action_type` is blank.
    pub fn new(action_type: impl AsRef<str>) -> Result<Self> {
        let action_type = action_type.as_ref().trim();
        if action_type.is_empty() {
            return Err(Error::validation(
                "action_type",
                "action_type cannot be empty",
            ));
        }

        Ok(Self::builtin(action_type))
    }

    /// Creates a configuration for a built-in, known non-empty action type.
    pub(crate) fn builtin(action_type: &str) -> Self {
        Self {
            action_type: action_type.to_string(),
            timeout: DEFAULT_ACTION_TIMEOUT,
            retry_count: 0,
            wait_before: Duration::ZERO,
            wait_after: Duration::ZERO,
            validate_before: true,
            description: None,
        }
    }

    /// Sets the per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] outside 0.1s to 300s.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.set_timeout(timeout)?;
        Ok(self)
    }

    /// Sets the number of retries after the first attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] above 10.
    pub fn with_retry_count(mut self, retry_count: u32) -> Result<Self> {
        self.set_retry_count(retry_count)?;
        Ok(self)
    }

    /// Sets the delays around each attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if either delay exceeds 60s.
    pub fn with_delays(mut self, wait_before: Duration, wait_after: Duration) -> Result<Self> {
        self.set_delays(wait_before, wait_after)?;
        Ok(self)
    }

    /// Enables or disables `pre_execute`.
    #[inline]
    #[must_use]
    pub fn with_validate_before(mut self, validate_before: bool) -> Self {
        self.validate_before = validate_before;
        self
    }

    /// Sets a human-readable description.
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replaces the per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] outside 0.1s to 300s.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if !(MIN_ACTION_TIMEOUT..=MAX_ACTION_TIMEOUT).contains(&timeout) {
            return Err(Error::validation(
                "timeout",
                format!(
                    "timeout must be between 0.1 and 300 seconds, got {}",
                    timeout.as_secs_f64()
                ),
            ));
        }
        self.timeout = timeout;
        Ok(())
    }

    /// Replaces the retry count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] above 10.
    pub fn set_retry_count(&mut self, retry_count: u32) -> Result<()> {
        if retry_count > MAX_RETRY_COUNT {
            return Err(Error::validation(
                "retry_count",
                format!("retry_count must be between 0 and {MAX_RETRY_COUNT}, got {retry_count}"),
            ));
        }
        self.retry_count = retry_count;
        Ok(())
    }

    /// Replaces both delays.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if either delay exceeds 60s.
    pub fn set_delays(&mut self, wait_before: Duration, wait_after: Duration) -> Result<()> {
        for (field, delay) in [("wait_before", wait_before), ("wait_after", wait_after)] {
            if delay > MAX_ACTION_DELAY {
                return Err(Error::validation(
                    field,
                    format!(
                        "{field} must be between 0 and 60 seconds, got {}",
                        delay.as_secs_f64()
                    ),
                ));
            }
        }
        self.wait_before = wait_before;
        self.wait_after = wait_after;
        Ok(())
    }
}

impl ActionConfig {
    /// Returns the action type.
    #[inline]
    #[must_use]
    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// Returns the per-attempt timeout.
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the retry count.
    #[inline]
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the delay before each attempt.
    #[inline]
    #[must_use]
    pub fn wait_before(&self) -> Duration {
        self.wait_before
    }

    /// Returns the delay after each attempt.
    #[inline]
    #[must_use]
    pub fn wait_after(&self) -> Duration {
        self.wait_after
    }

    /// Returns `true` if `pre_execute` runs before each attempt.
    #[inline]
    #[must_use]
    pub fn validate_before(&self) -> bool {
        self.validate_before
    }

    /// Returns the description.
    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl ActionConfig {
    /// Base pre-execution check: the page must be active. Sleeps
    /// `wait_before` afterwards.
    ///
    /// Actions overriding [`Action::pre_execute`] call this first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionExecution`] if the page is not active.
    pub async fn pre_execute(&self, page: &Page) -> Result<()> {
        if !page.is_active() {
            return Err(Error::action_failed(
                "Page is not active, cannot execute action",
                &self.action_type,
                None,
            ));
        }

        if !self.wait_before.is_zero() {
            debug!(action_type = %self.action_type, wait = ?self.wait_before, "Waiting before action");
            sleep(self.wait_before).await;
        }
        Ok(())
    }

    /// Base post-execution step: sleeps `wait_after` and logs the outcome.
    pub async fn post_execute(&self, result: &ActionResult) {
        if !self.wait_after.is_zero() {
            debug!(action_type = %self.action_type, wait = ?self.wait_after, "Waiting after action");
            sleep(self.wait_after).await;
        }

        if result.is_success() {
            info!(
                action_type = %self.action_type,
                elapsed = ?result.execution_time().unwrap_or_default(),
                "Action succeeded"
            );
        } else {
            warn!(
                action_type = %self.action_type,
                error = result.error().unwrap_or_default(),
                "Action failed"
            );
        }
    }
}

// ============================================================================
// Action Trait
// ============================================================================

/// A validated, executable unit of browser automation.
///
/// Implementors provide [`execute`](Action::execute) and access to their
/// [`ActionConfig`]. Hooks may be overridden to add readiness checks or
/// verification; overrides should delegate to the config's base hook.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone)]
/// struct Screenshot { config: ActionConfig }
///
/// #[async_trait]
/// impl Action for Screenshot {
///     fn config(&self) -> &ActionConfig { &self.config }
///     fn config_mut(&mut self) -> &mut ActionConfig { &mut self.config }
///
///     async fn execute(&self, page: &Page) -> Result<ActionResult> {
///         Ok(ActionResult::success(None))
///     }
/// }
/// ```
#[async_trait]
pub trait Action: fmt::Debug + Send + Sync {
    /// Returns the shared configuration.
    fn config(&self) -> &ActionConfig;

    /// Returns the shared configuration for in-place updates.
    fn config_mut(&mut self) -> &mut ActionConfig;

    /// Performs the action once.
    ///
    /// Report expected failures as a failure [`ActionResult`]; errors are
    /// caught by the hook cycle and retried the same way.
    async fn execute(&self, page: &Page) -> Result<ActionResult>;

    /// Runs before each attempt when `validate_before` is set.
    async fn pre_execute(&self, page: &Page) -> Result<()> {
        self.config().pre_execute(page).await
    }

    /// Runs after each attempt that produced a result.
    async fn post_execute(&self, _page: &Page, result: &ActionResult) -> Result<()> {
        self.config().post_execute(result).await;
        Ok(())
    }

    /// Runs the full hook cycle with timeout and retries.
    async fn execute_with_hooks(&self, page: &Page) -> ActionResult {
        run_hook_cycle(self, page).await
    }

    /// Returns the action type.
    fn action_type(&self) -> &str {
        self.config().action_type()
    }
}

#[async_trait]
impl<A: Action + ?Sized> Action for Box<A> {
    fn config(&self) -> &ActionConfig {
        (**self).config()
    }

    fn config_mut(&mut self) -> &mut ActionConfig {
        (**self).config_mut()
    }

    async fn execute(&self, page: &Page) -> Result<ActionResult> {
        (**self).execute(page).await
    }

    async fn pre_execute(&self, page: &Page) -> Result<()> {
        (**self).pre_execute(page).await
    }

    async fn post_execute(&self, page: &Page, result: &ActionResult) -> Result<()> {
        (**self).post_execute(page, result).await
    }

    async fn execute_with_hooks(&self, page: &Page) -> ActionResult {
        (**self).execute_with_hooks(page).await
    }
}

// ============================================================================
// ActionExt
// ============================================================================

/// Copy-on-write combinators for cloneable actions.
///
/// Each `with_*` method returns a modified copy; the receiver is unchanged.
pub trait ActionExt: Action + Clone + Sized + 'static {
    /// Returns a copy with a different retry count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] above 10.
    fn with_retry(&self, retry_count: u32) -> Result<Self> {
        let mut copy = self.clone();
        copy.config_mut().set_retry_count(retry_count)?;
        Ok(copy)
    }

    /// Returns a copy with a different per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] outside 0.1s to 300s.
    fn with_timeout(&self, timeout: Duration) -> Result<Self> {
        let mut copy = self.clone();
        copy.config_mut().set_timeout(timeout)?;
        Ok(copy)
    }

    /// Returns a copy with different delays around each attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if either delay exceeds 60s.
    fn with_delays(&self, wait_before: Duration, wait_after: Duration) -> Result<Self> {
        let mut copy = self.clone();
        copy.config_mut().set_delays(wait_before, wait_after)?;
        Ok(copy)
    }

    /// Sequences `self` then `other`.
    fn compose_with(self, other: impl Action + 'static) -> ComposedAction {
        ComposedAction::pair(Arc::new(self), Arc::new(other))
    }

    /// Alias for [`compose_with`](ActionExt::compose_with).
    fn then(self, other: impl Action + 'static) -> ComposedAction {
        self.compose_with(other)
    }
}

impl<A: Action + Clone + 'static> ActionExt for A {}

// ============================================================================
// Hook Cycle
// ============================================================================

/// Delay before the attempt following `attempt` (0-based).
#[must_use]
pub fn retry_delay(attempt: u32) -> Duration {
    BASE_RETRY_DELAY
        .saturating_mul(1 << attempt.min(4))
        .min(MAX_RETRY_DELAY)
}

enum Attempt {
    Finished(ActionResult),
    TimedOut,
    Raised(Error),
}

async fn run_attempt<A: Action + ?Sized>(action: &A, page: &Page) -> Attempt {
    let config = action.config();

    if config.validate_before()
        && let Err(e) = action.pre_execute(page).await
    {
        return Attempt::Raised(e);
    }

    let execution = AssertUnwindSafe(action.execute(page)).catch_unwind();
    match timeout(config.timeout(), execution).await {
        Err(_) => Attempt::TimedOut,
        Ok(Err(panic)) => Attempt::Raised(Error::action_failed(
            format!("Action panicked: {}", panic_message(panic.as_ref())),
            config.action_type(),
            None,
        )),
        Ok(Ok(Err(e))) => Attempt::Raised(e),
        Ok(Ok(Ok(result))) => Attempt::Finished(result),
    }
}

async fn backoff(action_type: &str, attempt: u32, attempts: u32) {
    let delay = retry_delay(attempt);
    debug!(
        action_type,
        attempt = attempt + 1,
        attempts,
        delay = ?delay,
        "Retrying action"
    );
    sleep(delay).await;
}

/// Runs `action` through the hook cycle.
pub(crate) async fn run_hook_cycle<A: Action + ?Sized>(action: &A, page: &Page) -> ActionResult {
    let config = action.config();
    let action_type = config.action_type();
    let attempts = config.retry_count() + 1;
    let start = Instant::now();
    let mut last_error = String::new();

    for attempt in 0..attempts {
        let remaining = attempt + 1 < attempts;

        debug!(action_type, attempt = attempt + 1, attempts, "Executing action");

        match run_attempt(action, page).await {
            Attempt::Finished(mut result) => {
                result.default_action_type(action_type);
                result.set_execution_time(start.elapsed());
                result.set_retry_count(attempt);

                if let Err(e) = action.post_execute(page, &result).await {
                    error!(action_type, error = %e, "Post-execution hook failed");
                    last_error = e.to_string();
                } else if result.is_success() {
                    return result;
                } else {
                    last_error = result
                        .error()
                        .unwrap_or("Action reported failure")
                        .to_string();

                    if !remaining {
                        result.set_execution_time(start.elapsed());
                        return result;
                    }
                }
            }
            Attempt::TimedOut => {
                warn!(
                    action_type,
                    timeout = ?config.timeout(),
                    attempt = attempt + 1,
                    "Action timed out"
                );

                if !remaining {
                    return ActionResult::timeout(config.timeout())
                        .with_action_type(action_type)
                        .with_timing(start);
                }
            }
            Attempt::Raised(e) => {
                error!(action_type, error = %e, "Action failed with error");
                last_error = e.to_string();
            }
        }

        if remaining {
            backoff(action_type, attempt, attempts).await;
        }
    }

    ActionResult::failure(format!(
        "Action failed after {attempts} attempts: {last_error}"
    ))
    .with_action_type(action_type)
    .with_timing(start)
    .with_metadata("retry_count", config.retry_count())
}

// ============================================================================
// Tests
// ============================================================================
