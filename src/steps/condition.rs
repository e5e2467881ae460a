//! `Condition` step: compares a variable with a literal and branches.
//!
//! Both sides are compared numerically when they are numbers (or numeric
//! strings). Otherwise only `eq`/`ne` are allowed, comparing the rendered
//! text. A branch without a target just advances.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::StepError;
use crate::execution::{
    decode_parameter, CancellationSignal, ExecutionContext, StepExecutor, StepOutcome,
    ValidationResult,
};
use crate::variables::display_value;

use super::validate_typed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl ComparisonOperator {
    fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }

    fn compare_numbers(self, left: f64, right: f64) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Gt => left > right,
            Self::Ge => left >= right,
            Self::Lt => left < right,
            Self::Le => left <= right,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Deserialize)]
struct ConditionParameter {
    variable: String,
    operator: ComparisonOperator,
    value: Value,
    #[serde(default)]
    then_step: Option<usize>,
    #[serde(default)]
    else_step: Option<usize>,
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Evaluates `left <operator> right`.
fn evaluate(left: &Value, operator: ComparisonOperator, right: &Value) -> Result<bool, StepError> {
    if let (Some(l), Some(r)) = (as_number(left), as_number(right)) {
        return Ok(operator.compare_numbers(l, r));
    }

    if !operator.is_equality() {
        return Err(StepError::failed(format!(
            "operator {} needs numeric operands, got '{}' and '{}'",
            operator,
            display_value(left),
            display_value(right)
        )));
    }

    let equal = display_value(left) == display_value(right);
    Ok(equal == (operator == ComparisonOperator::Eq))
}

pub struct ConditionExecutor;

#[async_trait]
impl StepExecutor for ConditionExecutor {
    fn step_type(&self) -> &str {
        "Condition"
    }

    fn validate_parameter(&self, parameter: &Value) -> ValidationResult {
        validate_typed::<ConditionParameter, _>(parameter, |p, result| {
            if p.variable.trim().is_empty() {
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
        let parameter: ConditionParameter = decode_parameter(parameter)?;
        let current = ctx
            .variables()
            .get(&parameter.variable)
            .ok_or_else(|| StepError::Variable(format!("'{}' is not set", parameter.variable)))?;

        let holds = evaluate(&current, parameter.operator, &parameter.value)?;
        let message = format!(
            "{} ({}) {} {} is {}",
            parameter.variable,
            display_value(&current),
            parameter.operator,
            display_value(&parameter.value),
            holds
        );

        let target = if holds {
            parameter.then_step
        } else {
            parameter.else_step
        };
        let outcome = match target {
            Some(index) => StepOutcome::jump(message, index),
            None => StepOutcome::success(message),
        };
        Ok(outcome.with_output(json!(holds)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ControlDirective;
    use crate::steps::testing;

    async fn run(ctx: &mut ExecutionContext, parameter: Value) -> Result<StepOutcome, StepError> {
        ConditionExecutor
            .execute(&parameter, ctx, &CancellationSignal::never())
            .await
    }

    #[test]
    fn test_numeric_comparisons() {
        use ComparisonOperator as Op;
        assert!(evaluate(&json!(5), Op::Gt, &json!(3)).unwrap());
        assert!(evaluate(&json!("5"), Op::Ge, &json!(5.0)).unwrap());
        assert!(evaluate(&json!(2), Op::Lt, &json!(3)).unwrap());
        assert!(!evaluate(&json!(4), Op::Le, &json!(3)).unwrap());
        assert!(evaluate(&json!(1.0), Op::Eq, &json!(1)).unwrap());
    }

    #[test]
    fn test_string_equality() {
        use ComparisonOperator as Op;
        assert!(evaluate(&json!("PASS"), Op::Eq, &json!("PASS")).unwrap());
        assert!(evaluate(&json!("PASS"), Op::Ne, &json!("FAIL")).unwrap());
        assert!(evaluate(&json!(true), Op::Eq, &json!("true")).unwrap());
        assert!(evaluate(&json!("PASS"), Op::Gt, &json!("FAIL")).is_err());
    }

    #[tokio::test]
    async fn test_then_branch_jumps() {
        let mut ctx = testing::context();
        ctx.variables().set("temperature", json!(81)).unwrap();

        let outcome = run(
            &mut ctx,
            json!({ "variable": "temperature", "operator": "gt", "value": 80, "then_step": 4, "else_step": 1 }),
        )
        .await
        .unwrap();

        assert_eq!(outcome.directive(), ControlDirective::Jump(4));
        assert_eq!(outcome.output, Some(json!(true)));
    }

    #[tokio::test]
    async fn test_else_branch_without_target_advances() {
        let mut ctx = testing::context();
        ctx.variables().set("temperature", json!(20)).unwrap();

        let outcome = run(
            &mut ctx,
            json!({ "variable": "temperature", "operator": "gt", "value": 80, "then_step": 4 }),
        )
        .await
        .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.directive(), ControlDirective::Advance);
        assert_eq!(outcome.output, Some(json!(false)));
    }

    #[tokio::test]
    async fn test_missing_variable_fails() {
        let mut ctx = testing::context();
        let result = run(
            &mut ctx,
            json!({ "variable": "ghost", "operator": "eq", "value": 1 }),
        )
        .await;

        assert!(matches!(result, Err(StepError::Variable(_))));
    }

    #[test]
    fn test_validation() {
        assert!(!ConditionExecutor
            .validate_parameter(&json!({ "variable": "x", "operator": "approx", "value": 1 }))
            .is_valid());
        assert!(!ConditionExecutor
            .validate_parameter(&json!({ "variable": "", "operator": "eq", "value": 1 }))
            .is_valid());
        assert!(ConditionExecutor
            .validate_parameter(&json!({ "variable": "x", "operator": "le", "value": 1 }))
            .is_valid());
    }
}
