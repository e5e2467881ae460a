//! Step Executor Contract
//!
//! Every step type is served by one [`StepExecutor`]. Implementations only
//! write the core logic in [`StepExecutor::execute`]; callers go through
//! [`execute_guarded`], which adds:
//!
//! - a cancellation check at entry
//! - parameter validation (short-circuits to a failure outcome)
//! - timing capture
//! - logging
//! - conversion of body errors and panics into failure outcomes
//!
//! Only cancellation escapes the guard, as `Err(Cancelled)`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Cancelled, StepError};

use super::cancel::CancellationSignal;
use super::context::ExecutionContext;
use super::outcome::{StepOutcome, ValidationResult};

/// Priority used when an executor does not override it. Lower wins.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Behaviour of one step type.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Step-type name this executor serves.
    fn step_type(&self) -> &str;

    /// Resolves conflicts between executors of the same type; lower wins.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Whether this executor can run steps of `step_type`.
    ///
    /// Used for fallback lookup when no exact key matches, so overrides can
    /// implement alias or prefix matching.
    fn can_execute(&self, step_type: &str) -> bool {
        step_type == self.step_type()
    }

    /// Checks a parameter payload before execution.
    fn validate_parameter(&self, _parameter: &Value) -> ValidationResult {
        ValidationResult::valid()
    }

    /// Runs the step.
    ///
    /// Must check `cancel` at every suspension point and return
    /// `Err(StepError::Cancelled)` when it fires.
    async fn execute(
        &self,
        parameter: &Value,
        ctx: &mut ExecutionContext,
        cancel: &CancellationSignal,
    ) -> Result<StepOutcome, StepError>;
}

/// Decodes a parameter payload into a typed struct.
///
/// A payload that does not match is a validation error, never a default.
pub fn decode_parameter<T: DeserializeOwned>(parameter: &Value) -> Result<T, StepError> {
    serde_json::from_value(parameter.clone())
        .map_err(|e| StepError::InvalidParameter(e.to_string()))
}

/// Runs an executor inside the shared validation/timing/error template.
pub async fn execute_guarded(
    executor: &dyn StepExecutor,
    parameter: &Value,
    ctx: &mut ExecutionContext,
    cancel: &CancellationSignal,
) -> Result<StepOutcome, Cancelled> {
    cancel.check()?;

    let step_type = executor.step_type().to_string();
    let started = Instant::now();

    let validation = executor.validate_parameter(parameter);
    if !validation.is_valid() {
        warn!(
            "Step {} ({}) rejected parameters: {}",
            ctx.step_index() + 1,
            step_type,
            validation
        );
        let mut outcome = StepOutcome::failure(
            format!("Parameter validation failed: {}", validation),
            validation.to_string(),
        );
        outcome.duration = started.elapsed();
        return Ok(outcome);
    }

    debug!(
        "Executing step {}/{} ({})",
        ctx.step_index() + 1,
        ctx.total_steps(),
        step_type
    );

    let result = AssertUnwindSafe(executor.execute(parameter, ctx, cancel))
        .catch_unwind()
        .await;

    let mut outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(StepError::Cancelled)) => {
            info!("Step {} ({}) cancelled", ctx.step_index() + 1, step_type);
            return Err(Cancelled);
        }
        Ok(Err(err)) => {
            error!("Step {} ({}) failed: {}", ctx.step_index() + 1, step_type, err);
            StepOutcome::failure(format!("{} failed: {}", step_type, err), err.to_string())
        }
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            error!("Step {} ({}) panicked: {}", ctx.step_index() + 1, step_type, detail);
            StepOutcome::failure(format!("{} failed unexpectedly", step_type), detail)
        }
    };

    outcome.duration = started.elapsed();
    debug!(
        "Step {} ({}) finished in {:.2?}: {}",
        ctx.step_index() + 1,
        step_type,
        outcome.duration,
        outcome.message
    );
    Ok(outcome)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
