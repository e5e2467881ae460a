//! Built-in Step Executors
//!
//! The step types every installation ships with:
//!
//! - [`DelayExecutor`]: `Delay`, waits a fixed time
//! - [`SetVariableExecutor`]: `SetVariable`, writes the variable store
//! - [`ConditionExecutor`]: `Condition`, compares a variable and jumps
//! - [`LoopExecutor`]: `Loop`, repeats a body of nested steps
//! - [`LoopControlExecutor`]: `LoopControl`, break/continue
//! - [`MessageExecutor`]: `Message` (alias `Log`, `Notify`), writes a log line
//!
//! Device-specific executors are registered next to these by the host.

pub mod condition;
pub mod delay;
pub mod loop_step;
pub mod message;
pub mod variable;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::execution::{decode_parameter, ExecutorRegistry, StepExecutor, ValidationResult};

pub use condition::{ComparisonOperator, ConditionExecutor};
pub use delay::DelayExecutor;
pub use loop_step::{LoopControlExecutor, LoopExecutor};
pub use message::MessageExecutor;
pub use variable::SetVariableExecutor;

/// All built-in executors, in registration order.
pub fn builtin_executors() -> Vec<Arc<dyn StepExecutor>> {
    vec![
        Arc::new(DelayExecutor),
        Arc::new(SetVariableExecutor),
        Arc::new(ConditionExecutor),
        Arc::new(LoopExecutor),
        Arc::new(LoopControlExecutor),
        Arc::new(MessageExecutor),
    ]
}

/// Registry containing only the built-in executors.
pub fn builtin_registry() -> ExecutorRegistry {
    ExecutorRegistry::new(builtin_executors())
}

/// Decodes a parameter and runs extra checks on the typed value.
pub(crate) fn validate_typed<T, F>(parameter: &Value, check: F) -> ValidationResult
where
    T: DeserializeOwned,
    F: FnOnce(&T, &mut ValidationResult),
{
    match decode_parameter::<T>(parameter) {
        Ok(typed) => {
            let mut result = ValidationResult::valid();
            check(&typed, &mut result);
            result
        }
        Err(e) => ValidationResult::invalid(e.to_string()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_types() {
        let registry = builtin_registry();
        let types: Vec<String> = registry.registered_types().into_iter().collect();
        assert_eq!(
            types,
            vec!["Condition", "Delay", "Loop", "LoopControl", "Message", "SetVariable"]
        );
    }

    #[test]
    fn test_message_aliases_resolve() {
        let registry = builtin_registry();
        assert!(registry.is_supported("Log"));
        assert!(registry.is_supported("Notify"));
        assert!(!registry.is_supported("Teleport"));
    }
}
