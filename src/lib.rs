//! Stepflow - Sequential Workflow Stepper
//!
//! Runs ordered lists of typed steps (delays, variable updates, branches,
//! loops, device actions) for test and automation procedures. Each step
//! type is handled by a pluggable executor; the engine walks the list with
//! a program counter, honours jumps and loop directives, stops at the first
//! failure and can be cancelled cooperatively.
//!
//! # Architecture
//!
//! The library is organized into these modules:
//!
//! - [`workflow`]: Workflow model, persisted documents and validation
//! - [`execution`]: Executor contract, registry and the execution engine
//! - [`steps`]: Built-in step executors
//! - [`variables`]: Variable store handed to step bodies
//! - [`monitoring`]: Execution timeline built from engine events
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use stepflow::execution::Engine;
//! use stepflow::steps::builtin_registry;
//! use stepflow::variables::InMemoryVariableStore;
//! use stepflow::workflow::{Classification, Step, Workflow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut workflow = Workflow::new(Classification::new("Inverter", "X200", "Burn-in"));
//!     workflow.add_step(Step::new("SetVariable", json!({ "name": "volts", "value": 230 })));
//!     workflow.add_step(Step::new("Delay", json!({ "milliseconds": 500 })));
//!     workflow.add_step(Step::new("Message", json!({ "text": "Holding at {volts}V" })));
//!
//!     let engine = Engine::new(
//!         Arc::new(builtin_registry()),
//!         Arc::new(InMemoryVariableStore::new()),
//!     );
//!     let report = engine.execute_workflow(&mut workflow).await?;
//!     println!("{}", report.message);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod execution;
pub mod monitoring;
pub mod steps;
pub mod variables;
pub mod workflow;

// Re-export commonly used types
pub use error::{EngineError, PersistError, StepError};
pub use execution::{Engine, ExecutorRegistry, RunReport, StepExecutor, StepOutcome};
pub use steps::builtin_registry;
pub use workflow::{load_workflow_file, Step, Workflow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Stepflow";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "Stepflow");
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(part.parse::<u32>().is_ok(), "Version components should be numeric");
        }
    }

    #[tokio::test]
    async fn test_builtin_workflow_end_to_end() {
        let mut workflow = Workflow::default();
        workflow.add_step(Step::new("SetVariable", json!({ "name": "attempt", "value": 0 })));
        workflow.add_step(Step::new(
            "Loop",
            json!({
                "count": 3,
                "counter_variable": "attempt",
                "body": [ { "step_type": "Delay", "parameter": { "milliseconds": 1 } } ]
            }),
        ));
        workflow.add_step(Step::new(
            "Condition",
            json!({ "variable": "attempt", "operator": "eq", "value": 3, "then_step": 4 }),
        ));
        workflow.add_step(Step::new("Teleport", json!({})));
        workflow.add_step(Step::new("Log", json!({ "text": "attempts: {attempt}" })));

        let engine = Engine::new(
            Arc::new(builtin_registry()),
            Arc::new(variables::InMemoryVariableStore::new()),
        );
        let report = engine.execute_workflow(&mut workflow).await.unwrap();

        assert!(report.success, "{}", report.message);
        let trace: Vec<usize> = report.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(trace, vec![0, 1, 2, 4]);
        assert_eq!(report.outcomes[3].message, "attempts: 3");
        assert_eq!(engine.variables().get("attempt"), Some(json!(3)));
    }
}
