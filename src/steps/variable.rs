//! `SetVariable` step: assigns a value in the variable store.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::StepError;
use crate::execution::{
    decode_parameter, CancellationSignal, ExecutionContext, StepExecutor, StepOutcome,
    ValidationResult,
};
use crate::variables::display_value;

use super::validate_typed;

#[derive(Debug, Deserialize)]
struct SetVariableParameter {
    name: String,
    value: Value,
}

pub struct SetVariableExecutor;

#[async_trait]
impl StepExecutor for SetVariableExecutor {
    fn step_type(&self) -> &str {
        "SetVariable"
    }

    fn validate_parameter(&self, parameter: &Value) -> ValidationResult {
        validate_typed::<SetVariableParameter, _>(parameter, |p, result| {
            if p.name.trim().is_empty() {
                result.push("variable name is empty");
            }
        })
    }

    async fn execute(
        &self,
        parameter: &Value,
        ctx: &mut ExecutionContext,
        _cancel: &CancellationSignal,
    ) -> Result<StepOutcome, StepError> {
        let parameter: SetVariableParameter = decode_parameter(parameter)?;
        ctx.variables().set(&parameter.name, parameter.value.clone())?;

        Ok(StepOutcome::success(format!(
            "{} = {}",
            parameter.name,
            display_value(&parameter.value)
        ))
        .with_output(parameter.value))
    }
}
