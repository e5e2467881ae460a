//! `Delay` step: waits for a fixed number of milliseconds.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::StepError;
use crate::execution::{
    decode_parameter, CancellationSignal, ExecutionContext, StepExecutor, StepOutcome,
    ValidationResult,
};

use super::validate_typed;

#[derive(Debug, Deserialize)]
struct DelayParameter {
    milliseconds: u64,
}

pub struct DelayExecutor;

#[async_trait]
impl StepExecutor for DelayExecutor {
    fn step_type(&self) -> &str {
        "Delay"
    }

    fn validate_parameter(&self, parameter: &Value) -> ValidationResult {
        validate_typed::<DelayParameter, _>(parameter, |_, _| {})
    }

    async fn execute(
        &self,
        parameter: &Value,
        _ctx: &mut ExecutionContext,
        cancel: &CancellationSignal,
    ) -> Result<StepOutcome, StepError> {
        let parameter: DelayParameter = decode_parameter(parameter)?;

        tokio::select! {
            _ = cancel.cancelled() => Err(StepError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(parameter.milliseconds)) => {
                Ok(StepOutcome::success(format!("Waited {} ms", parameter.milliseconds))
                    .with_output(json!(parameter.milliseconds)))
            }
        }
    }
}
