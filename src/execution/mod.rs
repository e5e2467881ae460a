//! Workflow Execution Module
//!
//! Runs a workflow's steps in order through pluggable step executors,
//! with explicit jumps, first-failure-stops and cooperative cancellation.
//!
//! # Architecture
//!
//! - [`engine`]: Program-counter state machine driving a run
//! - [`contract`]: The [`StepExecutor`] trait and its guarded template
//! - [`registry`]: Step-type to executor lookup
//! - [`context`]: Per-step execution context
//! - [`outcome`]: Step outcomes and run reports
//! - [`cancel`]: Cancellation source/signal pair
//! - [`events`]: Step, progress and log notifications

pub mod cancel;
pub mod context;
pub mod contract;
pub mod engine;
pub mod events;
pub mod outcome;
pub mod registry;

pub use cancel::{CancellationSignal, CancellationSource};
pub use context::{ExecutionContext, LoopState};
pub use contract::{decode_parameter, execute_guarded, StepExecutor, DEFAULT_PRIORITY};
pub use engine::{Engine, EngineState};
pub use events::{EngineEvent, EventBus, LogLevel};
pub use outcome::{ControlDirective, RunReport, StepOutcome, StepReport, ValidationResult};
pub use registry::ExecutorRegistry;
