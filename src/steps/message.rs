//! `Message` step: writes an operator message to the log.
//!
//! `{name}` placeholders are replaced with variable values. The step also
//! answers to `Log` and `Notify`.

use async_trait::async_trait;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::StepError;
use crate::execution::{
    decode_parameter, CancellationSignal, ExecutionContext, StepExecutor, StepOutcome,
    ValidationResult,
};
use crate::variables::render_template;

use super::validate_typed;

const ALIASES: &[&str] = &["Message", "Log", "Notify"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MessageLevel {
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Debug, Deserialize)]
struct MessageParameter {
    text: String,
    #[serde(default)]
    level: MessageLevel,
}

pub struct MessageExecutor;

#[async_trait]
impl StepExecutor for MessageExecutor {
    fn step_type(&self) -> &str {
        "Message"
    }

    fn can_execute(&self, step_type: &str) -> bool {
        ALIASES
            .iter()
            .any(|alias| alias.eq_ignore_ascii_case(step_type))
    }

    fn validate_parameter(&self, parameter: &Value) -> ValidationResult {
        validate_typed::<MessageParameter, _>(parameter, |_, _| {})
    }

    async fn execute(
        &self,
        parameter: &Value,
        ctx: &mut ExecutionContext,
        _cancel: &CancellationSignal,
    ) -> Result<StepOutcome, StepError> {
        let parameter: MessageParameter = decode_parameter(parameter)?;
        let text = render_template(&parameter.text, ctx.variables());

        match parameter.level {
            MessageLevel::Info => info!("[{}] {}", ctx.classification(), text),
            MessageLevel::Warning => warn!("[{}] {}", ctx.classification(), text),
            MessageLevel::Error => error!("[{}] {}", ctx.classification(), text),
        }

        Ok(StepOutcome::success(text.clone()).with_output(json!(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing;

    #[tokio::test]
    async fn test_interpolates_variables() {
        let mut ctx = testing::context();
        ctx.variables().set("serial", json!("SN-0042")).unwrap();
        ctx.variables().set("volts", json!(230)).unwrap();

        let outcome = MessageExecutor
            .execute(
                &json!({ "text": "{serial} passed at {volts}V, {missing} untouched" }),
                &mut ctx,
                &CancellationSignal::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.message, "SN-0042 passed at 230V, {missing} untouched");
    }

    #[tokio::test]
    async fn test_levels() {
        let mut ctx = testing::context();
        for level in ["info", "warning", "error"] {
            let outcome = MessageExecutor
                .execute(
                    &json!({ "text": "check", "level": level }),
                    &mut ctx,
                    &CancellationSignal::never(),
                )
                .await
                .unwrap();
            assert!(outcome.success);
        }
        assert!(!MessageExecutor
            .validate_parameter(&json!({ "text": "x", "level": "shout" }))
            .is_valid());
    }

    #[test]
    fn test_aliases() {
        assert!(MessageExecutor.can_execute("Log"));
        assert!(MessageExecutor.can_execute("notify"));
        assert!(!MessageExecutor.can_execute("Logger"));
    }
}
