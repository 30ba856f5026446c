//! Sequential and conditional composition of actions.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::{Map, Value, json};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::events::panic_message;
use crate::page::Page;
use crate::results::ActionResult;

use super::base::{Action, ActionConfig};

/// Runs a sub-action's hook cycle, converting a panic into an error.
async fn run_contained(action: &dyn Action, page: &Page) -> Result<ActionResult> {
    AssertUnwindSafe(action.execute_with_hooks(page))
        .catch_unwind()
        .await
        .map_err(|panic| Error::action_execution(panic_message(panic.as_ref())))
}

fn step_record(step: usize, action_type: &str, outcome: &Result<ActionResult>) -> Value {
    match outcome {
        Ok(result) => json!({
            "step": step,
            "action_type": action_type,
            "success": result.is_success(),
            "error": result.error(),
            "execution_time": result.execution_time().map(|t| t.as_secs_f64()),
            "data": result.data(),
        }),
        Err(e) => json!({
            "step": step,
            "action_type": action_type,
            "success": false,
            "error": e.to_string(),
            "execution_time": null,
            "data": null,
        }),
    }
}

// ============================================================================
// ComposedAction
// ============================================================================

/// Runs sub-actions strictly in order.
///
/// With `stop_on_failure` (the default) the first failing step ends the
/// sequence with a failure result. Otherwise every step runs and the result
/// is a success whose data records `all_succeeded` and whose metadata
/// records the last `failed_step`.
///
/// # Metadata
///
/// | Key | When |
/// |-----|------|
/// | `results` | Per-step records when `collect_results` is set |
/// | `completed_steps`, `failed_step`, `total_steps` | Stopped on failure |
/// | `failed_step` | Ran to completion (`null` if nothing failed) |
#[derive(Debug, Clone)]
pub struct ComposedAction {
    config: ActionConfig,
    actions: Vec<Arc<dyn Action>>,
    stop_on_failure: bool,
    collect_results: bool,
}

impl ComposedAction {
    /// Action type of composed actions.
    pub const ACTION_TYPE: &'static str = "composed";

    /// Creates a sequence over `actions`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `actions` is empty.
    pub fn new(actions: Vec<Arc<dyn Action>>) -> Result<Self> {
        if actions.is_empty() {
            return Err(Error::validation("actions", "actions list cannot be empty"));
        }
        Ok(Self::from_parts(actions))
    }

    pub(crate) fn pair(first: Arc<dyn Action>, second: Arc<dyn Action>) -> Self {
        Self::from_parts(vec![first, second])
    }

    fn from_parts(actions: Vec<Arc<dyn Action>>) -> Self {
        Self {
            config: ActionConfig::builtin(Self::ACTION_TYPE),
            actions,
            stop_on_failure: true,
            collect_results: true,
        }
    }

    /// Sets whether the first failing step ends the sequence.
    #[inline]
    #[must_use]
    pub fn with_stop_on_failure(mut self, stop_on_failure: bool) -> Self {
        self.stop_on_failure = stop_on_failure;
        self
    }

    /// Sets whether per-step records are placed in the metadata.
    #[inline]
    #[must_use]
    pub fn with_collect_results(mut self, collect_results: bool) -> Self {
        self.collect_results = collect_results;
        self
    }

    /// Returns the sub-actions.
    #[inline]
    #[must_use]
    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    /// Returns `true` if the first failing step ends the sequence.
    #[inline]
    #[must_use]
    pub fn stop_on_failure(&self) -> bool {
        self.stop_on_failure
    }

    /// Returns `true` if per-step records are collected.
    #[inline]
    #[must_use]
    pub fn collect_results(&self) -> bool {
        self.collect_results
    }

    fn results_value(&self, results: Vec<Value>) -> Value {
        if self.collect_results {
            Value::Array(results)
        } else {
            Value::Null
        }
    }
}

#[async_trait]
impl Action for ComposedAction {
    fn config(&self) -> &ActionConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ActionConfig {
        &mut self.config
    }

    async fn execute(&self, page: &Page) -> Result<ActionResult> {
        let total = self.actions.len();
        let mut results = Vec::new();
        let mut failed_at_step = None;

        for (index, action) in self.actions.iter().enumerate() {
            let step = index + 1;
            let action_type = action.action_type();
            debug!(step, total, action_type, "Executing composed step");

            let outcome = run_contained(action.as_ref(), page).await;
            if self.collect_results {
                results.push(step_record(step, action_type, &outcome));
            }

            let error = match &outcome {
                Ok(result) if result.is_success() => continue,
                Ok(result) => format!(
                    "Composed action failed at step {step} ({action_type}): {}",
                    result.error().unwrap_or_default()
                ),
                Err(e) => {
                    error!(step, action_type, error = %e, "Composed step panicked");
                    format!("Exception in composed action step {step}: {e}")
                }
            };

            failed_at_step = Some(step);

            if self.stop_on_failure {
                warn!(step, action_type, "Composed action stopping on failure");
                return Ok(ActionResult::failure(error)
                    .with_action_type(self.action_type())
                    .with_metadata("completed_steps", index)
                    .with_metadata("failed_step", step)
                    .with_metadata("total_steps", total)
                    .with_metadata("results", self.results_value(results)));
            }

            warn!(step, action_type, "Composed step failed, continuing");
        }

        let mut data = Map::new();
        data.insert("completed_steps".to_string(), json!(total));
        data.insert("total_steps".to_string(), json!(total));
        data.insert("all_succeeded".to_string(), json!(failed_at_step.is_none()));

        Ok(ActionResult::success(Some(data))
            .with_action_type(self.action_type())
            .with_metadata("completed_steps", total)
            .with_metadata("failed_step", failed_at_step)
            .with_metadata("results", self.results_value(results)))
    }
}

// ============================================================================
// ConditionalAction
// ============================================================================

/// Runs `then_action` if `condition_action` succeeds, else `else_action`.
///
/// The branch result is returned with `condition_result` in its metadata.
/// Without an else branch a failed condition yields a success result
/// carrying `condition_result: false`.
#[derive(Debug, Clone)]
pub struct ConditionalAction {
    config: ActionConfig,
    condition_action: Arc<dyn Action>,
    then_action: Arc<dyn Action>,
    else_action: Option<Arc<dyn Action>>,
}

impl ConditionalAction {
    /// Action type of conditional actions.
    pub const ACTION_TYPE: &'static str = "conditional";

    /// Creates a conditional with no else branch.
    #[must_use]
    pub fn new(condition_action: Arc<dyn Action>, then_action: Arc<dyn Action>) -> Self {
        Self {
            config: ActionConfig::builtin(Self::ACTION_TYPE),
            condition_action,
            then_action,
            else_action: None,
        }
    }

    /// Sets the else branch.
    #[inline]
    #[must_use]
    pub fn with_else(mut self, else_action: Arc<dyn Action>) -> Self {
        self.else_action = Some(else_action);
        self
    }
}

#[async_trait]
impl Action for ConditionalAction {
    fn config(&self) -> &ActionConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ActionConfig {
        &mut self.config
    }

    async fn execute(&self, page: &Page) -> Result<ActionResult> {
        let condition = run_contained(self.condition_action.as_ref(), page).await?;

        if condition.is_success() {
            debug!("Condition succeeded, executing then branch");
            let result = run_contained(self.then_action.as_ref(), page).await?;
            return Ok(result.with_metadata("condition_result", true));
        }

        debug!("Condition failed, executing else branch");
        match &self.else_action {
            Some(else_action) => {
                let result = run_contained(else_action.as_ref(), page).await?;
                Ok(result.with_metadata("condition_result", false))
            }
            None => {
                let mut data = Map::new();
                data.insert("condition_result".to_string(), Value::Bool(false));
                data.insert("else_action".to_string(), Value::Null);
                Ok(ActionResult::success(Some(data)).with_action_type(self.action_type()))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::actions::base::ActionExt;
    use crate::actions::base::tests::{ScriptedAction, Step, active_page};
    use crate::results::ActionStatus;

    fn ok(name: &str) -> ScriptedAction {
        ScriptedAction::new(name, [Step::Succeed])
    }

    fn failing(name: &str) -> ScriptedAction {
        ScriptedAction::new(name, [Step::Fail])
    }

    #[test]
    fn test_new_rejects_empty() {
        let err = ComposedAction::new(Vec::new()).unwrap_err();
        assert!(err.is_validation_error());
    }

    #[tokio::test]
    async fn test_stop_on_failure() {
        let a = ok("a");
        let b = failing("b");
        let c = ok("c");
        let composed =
            ComposedAction::new(vec![Arc::new(a.clone()), Arc::new(b.clone()), Arc::new(c.clone())])
                .unwrap();
        let page = active_page();

        let result = composed.execute_with_hooks(&page).await;

        assert!(!result.is_success());
        assert_eq!(result.action_type(), Some("composed"));
        assert_eq!(result.metadata()["completed_steps"], 1);
        assert_eq!(result.metadata()["failed_step"], 2);
        assert_eq!(result.metadata()["total_steps"], 3);
        assert_eq!(result.metadata()["results"].as_array().unwrap().len(), 2);
        assert!(result.error().unwrap().contains("step 2 (b)"));
        assert_eq!(c.calls(), 0);
    }

    #[tokio::test]
    async fn test_continue_on_failure() {
        let c = ok("c");
        let composed = ComposedAction::new(vec![
            Arc::new(ok("a")),
            Arc::new(failing("b")),
            Arc::new(c.clone()),
        ])
        .unwrap()
        .with_stop_on_failure(false);
        let page = active_page();

        let result = composed.execute_with_hooks(&page).await;

        assert!(result.is_success());
        assert_eq!(result.status(), ActionStatus::Success);
        assert_eq!(result.metadata()["completed_steps"], 3);
        assert_eq!(result.metadata()["failed_step"], 2);
        assert_eq!(result.data().unwrap()["all_succeeded"], false);
        assert_eq!(c.calls(), 1);

        let records = result.metadata()["results"].as_array().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1]["success"], false);
        assert_eq!(records[1]["error"], "scripted failure");
    }

    #[tokio::test]
    async fn test_results_not_collected() {
        let composed = ComposedAction::new(vec![Arc::new(ok("a"))])
            .unwrap()
            .with_collect_results(false);
        let page = active_page();

        let result = composed.execute_with_hooks(&page).await;

        assert!(result.is_success());
        assert!(result.metadata()["results"].is_null());
        assert!(result.metadata()["failed_step"].is_null());
        assert_eq!(result.data().unwrap()["all_succeeded"], true);
    }

    #[tokio::test]
    async fn test_panicking_step_is_a_failure() {
        let c = ok("c");
        let composed = ComposedAction::new(vec![
            Arc::new(ScriptedAction::new("boom", [Step::Panic])),
            Arc::new(c.clone()),
        ])
        .unwrap();
        let page = active_page();

        let result = composed.execute_with_hooks(&page).await;

        assert!(!result.is_success());
        assert_eq!(result.metadata()["failed_step"], 1);
        assert_eq!(c.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_actions_run_in_sequence_with_own_retries() {
        let first = ScriptedAction::new("first", [Step::Fail, Step::Succeed])
            .with_retry(1)
            .unwrap();
        let second = ScriptedAction::new("second", [Step::Sleep(Duration::from_millis(200))]);
        let composed = first.clone().then(second.clone());
        let page = active_page();

        let result = composed.execute_with_hooks(&page).await;

        assert!(result.is_success());
        assert_eq!(first.calls(), 2);
        assert_eq!(second.calls(), 1);
        let records = result.metadata()["results"].as_array().unwrap();
        assert_eq!(records[0]["action_type"], "first");
        assert_eq!(records[1]["action_type"], "second");
    }

    #[tokio::test]
    async fn test_conditional_branches() {
        let page = active_page();

        let then_action = ok("then");
        let conditional = ConditionalAction::new(Arc::new(ok("cond")), Arc::new(then_action.clone()));
        let result = conditional.execute_with_hooks(&page).await;
        assert!(result.is_success());
        assert_eq!(result.metadata()["condition_result"], true);
        assert_eq!(then_action.calls(), 1);

        let else_action = failing("else");
        let conditional =
            ConditionalAction::new(Arc::new(failing("cond")), Arc::new(ok("then")))
                .with_else(Arc::new(else_action.clone()));
        let result = conditional.execute_with_hooks(&page).await;
        assert!(!result.is_success());
        assert_eq!(result.metadata()["condition_result"], false);
        assert_eq!(else_action.calls(), 1);
    }

    #[tokio::test]
    async fn test_conditional_without_else_is_success() {
        let page = active_page();
        let then_action = ok("then");
        let conditional =
            ConditionalAction::new(Arc::new(failing("cond")), Arc::new(then_action.clone()));

        let result = conditional.execute_with_hooks(&page).await;

        assert!(result.is_success());
        assert_eq!(result.action_type(), Some("conditional"));
        let data = result.data().unwrap();
        assert_eq!(data["condition_result"], false);
        assert!(data["else_action"].is_null());
        assert_eq!(then_action.calls(), 0);
    }
}
