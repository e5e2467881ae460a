//! `Loop` and `LoopControl` steps.
//!
//! A loop runs its body steps in order, `count` times, resolving each body
//! step through the registry and the guarded template. Inside the body:
//!
//! - a jump target is relative to the body and ends the iteration when it
//!   points past the end
//! - Break leaves the loop, Continue starts the next iteration
//! - any failure fails the whole Loop step
//!
//! Loop fields on the context are set for the body and restored afterwards,
//! so loops nest.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::StepError;
use crate::execution::{
    decode_parameter, execute_guarded, CancellationSignal, ControlDirective, ExecutionContext,
    ExecutorRegistry, StepExecutor, StepOutcome, ValidationResult,
};

use super::validate_typed;

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct BodyStep {
    step_type: String,
    #[serde(default)]
    parameter: Value,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct LoopParameter {
    count: u32,
    #[serde(default)]
    counter_variable: Option<String>,
    body: Vec<BodyStep>,
}

/// How a loop run ended.
struct LoopSummary {
    iterations: u32,
    body_steps: usize,
    broke: bool,
}

pub struct LoopExecutor;

impl LoopExecutor {
    async fn run_iterations(
        &self,
        parameter: &LoopParameter,
        registry: &ExecutorRegistry,
        ctx: &mut ExecutionContext,
        cancel: &CancellationSignal,
    ) -> Result<LoopSummary, StepError> {
        let body = &parameter.body;
        let mut summary = LoopSummary {
            iterations: 0,
            body_steps: 0,
            broke: false,
        };

        'iterations: for iteration in 1..=parameter.count {
            cancel.check()?;
            ctx.set_loop_counter(iteration);
            summary.iterations = iteration;
            if let Some(name) = parameter.counter_variable.as_deref() {
                ctx.variables().set(name, json!(iteration))?;
            }
            debug!("Loop iteration {}/{}", iteration, parameter.count);

            let mut pc = 0usize;
            while pc < body.len() {
                let entry = &body[pc];
                if !entry.enabled {
                    pc += 1;
                    continue;
                }

                let executor = registry.get_executor(&entry.step_type).ok_or_else(|| {
                    StepError::failed(format!(
                        "Unsupported step type '{}' in loop body",
                        entry.step_type
                    ))
                })?;

                let mut child = ctx.nested(pc, body.len());
                let outcome =
                    execute_guarded(executor.as_ref(), &entry.parameter, &mut child, cancel).await?;
                summary.body_steps += 1;

                if !outcome.success {
                    return Err(StepError::failed(format!(
                        "iteration {}, body step {} ({}): {}",
                        iteration,
                        pc + 1,
                        entry.step_type,
                        outcome.message
                    )));
                }

                match outcome.directive() {
                    ControlDirective::Jump(target) => pc = target,
                    ControlDirective::Break => {
                        summary.broke = true;
                        break 'iterations;
                    }
                    ControlDirective::Continue => continue 'iterations,
                    ControlDirective::Advance => pc += 1,
                }
            }
        }

        Ok(summary)
    }
}

#[async_trait]
impl StepExecutor for LoopExecutor {
    fn step_type(&self) -> &str {
        "Loop"
    }

    fn validate_parameter(&self, parameter: &Value) -> ValidationResult {
        validate_typed::<LoopParameter, _>(parameter, |p, result| {
            if p.body.is_empty() {
                result.push("loop body is empty");
            }
            for (index, entry) in p.body.iter().enumerate() {
                if entry.step_type.trim().is_empty() {
                    result.push(format!("body step {} has no step type", index + 1));
                }
            }
            if let Some(name) = &p.counter_variable {
                if name.trim().is_empty() {
                    result.push("counter variable name is empty");
                }
            }
        })
    }

    async fn execute(
        &self,
        parameter: &Value,
        ctx: &mut ExecutionContext,
        cancel: &CancellationSignal,
    ) -> Result<StepOutcome, StepError> {
        let parameter: LoopParameter = decode_parameter(parameter)?;
        let registry = Arc::clone(ctx.registry());

        let enclosing = ctx.enter_loop(parameter.count);
        let result = self.run_iterations(&parameter, &registry, ctx, cancel).await;
        ctx.exit_loop(enclosing);

        let summary = result?;
        let message = if summary.broke {
            format!(
                "Loop exited at iteration {}/{}",
                summary.iterations, parameter.count
            )
        } else {
            format!("Loop completed {} iterations", summary.iterations)
        };
        Ok(StepOutcome::success(message).with_output(json!({
            "iterations": summary.iterations,
            "body_steps": summary.body_steps,
            "broke": summary.broke,
        })))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LoopAction {
    Break,
    Continue,
}

#[derive(Debug, Deserialize)]
struct LoopControlParameter {
    action: LoopAction,
}

pub struct LoopControlExecutor;

#[async_trait]
impl StepExecutor for LoopControlExecutor {
    fn step_type(&self) -> &str {
        "LoopControl"
    }

    fn validate_parameter(&self, parameter: &Value) -> ValidationResult {
        validate_typed::<LoopControlParameter, _>(parameter, |_, _| {})
    }

    async fn execute(
        &self,
        parameter: &Value,
        ctx: &mut ExecutionContext,
        _cancel: &CancellationSignal,
    ) -> Result<StepOutcome, StepError> {
        let parameter: LoopControlParameter = decode_parameter(parameter)?;
        if !ctx.in_loop() {
            warn!("LoopControl at step {} is not inside a loop", ctx.step_index() + 1);
        }

        Ok(match parameter.action {
            LoopAction::Break => StepOutcome::break_loop("Break loop"),
            LoopAction::Continue => StepOutcome::continue_loop("Continue loop"),
        })
    }
}
