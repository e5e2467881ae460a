//! Workflow Execution Engine
//!
//! The state machine that walks a workflow's step list:
//! - Program-counter stepping with explicit jumps
//! - Executor resolution through the registry
//! - First-failure-stops policy
//! - Cooperative cancellation via [`Engine::stop`]
//! - Step/progress/log notifications
//!
//! One engine runs at most one workflow at a time. A second
//! [`Engine::execute_workflow`] while a run is active is rejected with
//! [`EngineError::AlreadyRunning`]. The workflow is borrowed mutably for the
//! whole run, so structural edits cannot happen underneath it.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use parking_lot::Mutex;

use crate::error::{Cancelled, EngineError};
use crate::variables::VariableStore;
use crate::workflow::{StepStatus, Workflow};

use super::cancel::{CancellationSignal, CancellationSource};
use super::context::ExecutionContext;
use super::contract::execute_guarded;
use super::events::{EngineEvent, EventBus, LogLevel, DEFAULT_EVENT_CAPACITY};
use super::outcome::{ControlDirective, RunReport, StepOutcome, StepReport};
use super::registry::ExecutorRegistry;

/// Lifecycle state of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Running,
    Cancelling,
    Completed { success: bool },
}

impl EngineState {
    /// True while a run is in flight.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Cancelling)
    }
}

#[derive(Debug, Default)]
struct RunSlot {
    state: EngineState,
    cancel: Option<CancellationSource>,
    current_step: Option<usize>,
}

/// Returns the engine to a settled state when a run ends, even by panic.
struct RunGuard<'a> {
    slot: &'a Mutex<RunSlot>,
    final_state: EngineState,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        slot.state = self.final_state;
        slot.cancel = None;
        slot.current_step = None;
    }
}

/// Result of executing the step at one index.
enum StepRun {
    Skipped,
    Unsupported(StepOutcome),
    Finished(StepOutcome),
    Cancelled,
}

/// Workflow execution engine.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stepflow::execution::Engine;
/// use stepflow::steps::builtin_registry;
/// use stepflow::variables::InMemoryVariableStore;
/// use stepflow::workflow::load_workflow_file;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut workflow = load_workflow_file("burn_in.json")?.to_workflow()?;
///     let engine = Engine::new(
///         Arc::new(builtin_registry()),
///         Arc::new(InMemoryVariableStore::new()),
///     );
///
///     let report = engine.execute_workflow(&mut workflow).await?;
///     println!("{}", report.message);
///     Ok(())
/// }
/// ```
pub struct Engine {
    registry: Arc<ExecutorRegistry>,
    variables: Arc<dyn VariableStore>,
    events: EventBus,
    slot: Mutex<RunSlot>,
}

impl Engine {
    /// Creates an engine over the given executors and variable store.
    pub fn new(registry: Arc<ExecutorRegistry>, variables: Arc<dyn VariableStore>) -> Self {
        Self {
            registry,
            variables,
            events: EventBus::new(DEFAULT_EVENT_CAPACITY),
            slot: Mutex::new(RunSlot::default()),
        }
    }

    /// Sets how many events each subscriber may buffer.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = EventBus::new(capacity);
        self
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    pub fn variables(&self) -> &Arc<dyn VariableStore> {
        &self.variables
    }

    /// Subscribes to step, progress and log notifications.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> EngineState {
        self.slot.lock().state
    }

    pub fn is_executing(&self) -> bool {
        self.state().is_active()
    }

    /// Index of the step currently executing, if any.
    pub fn current_step_index(&self) -> Option<usize> {
        self.slot.lock().current_step
    }

    /// Requests cancellation of the active run.
    ///
    /// Returns immediately; the run winds down at its next cancellation
    /// check. Returns false if nothing was running.
    pub fn stop(&self) -> bool {
        let mut slot = self.slot.lock();
        match slot.state {
            EngineState::Running => {
                slot.state = EngineState::Cancelling;
                if let Some(source) = slot.cancel.as_ref() {
                    source.cancel();
                }
                drop(slot);
                self.events.log(LogLevel::Warning, "Stop requested - cancelling execution");
                true
            }
            EngineState::Cancelling => true,
            _ => false,
        }
    }

    /// Executes a workflow from the first step.
    ///
    /// Step failures, unsupported step types and cancellation are reported
    /// in the returned [`RunReport`]. `Err` only signals misuse of the
    /// engine.
    pub async fn execute_workflow(&self, workflow: &mut Workflow) -> Result<RunReport, EngineError> {
        let (mut guard, cancel) = self.begin_run()?;
        let started = Instant::now();
        let total = workflow.len();

        workflow.reset_statuses();
        self.events.log(
            LogLevel::Info,
            format!("Starting workflow {} ({} steps)", workflow.classification, total),
        );

        let mut trace: Vec<StepReport> = Vec::new();
        let mut failed_step: Option<(usize, String)> = None;
        let mut cancelled = false;
        let mut pc = 0usize;

        while pc < workflow.len() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let Some(step_type) = workflow.get_step(pc).map(|s| s.step_type.clone()) else {
                pc += 1;
                continue;
            };

            self.set_current_step(Some(pc));
            self.events.emit(EngineEvent::Progress {
                current: pc + 1,
                total,
                label: step_type.clone(),
            });

            match self.run_step(workflow, pc, &cancel).await {
                StepRun::Skipped => {
                    trace.push(StepReport::skipped(pc, &step_type));
                    pc += 1;
                }
                StepRun::Unsupported(outcome) => {
                    trace.push(StepReport::from_outcome(pc, &step_type, &outcome));
                    failed_step = Some((pc, outcome.message));
                    break;
                }
                StepRun::Finished(outcome) => {
                    trace.push(StepReport::from_outcome(pc, &step_type, &outcome));
                    if !outcome.success {
                        failed_step = Some((pc, outcome.message));
                        break;
                    }
                    pc = match outcome.directive() {
                        ControlDirective::Jump(target) => {
                            debug!("Step {} jumps to index {}", pc + 1, target);
                            target
                        }
                        ControlDirective::Break | ControlDirective::Continue => {
                            // No enclosing loop at the top level.
                            debug!(
                                "Step {} emitted loop control outside a loop - advancing",
                                pc + 1
                            );
                            pc + 1
                        }
                        ControlDirective::Advance => pc + 1,
                    };
                }
                StepRun::Cancelled => {
                    cancelled = true;
                    break;
                }
            }
        }

        self.set_current_step(None);

        let success = !cancelled && failed_step.is_none();
        let message = if cancelled {
            "Workflow execution cancelled".to_string()
        } else if let Some((index, ref reason)) = failed_step {
            format!("Workflow failed at step {}: {}", index + 1, reason)
        } else {
            "Workflow completed successfully".to_string()
        };

        let report = RunReport {
            success,
            cancelled,
            message,
            total_steps: total,
            completed_steps: trace.iter().filter(|entry| entry.success).count(),
            failed_step: failed_step.map(|(index, _)| index),
            duration: started.elapsed(),
            outcomes: trace,
        };

        let level = if success {
            LogLevel::Info
        } else if cancelled {
            LogLevel::Warning
        } else {
            LogLevel::Error
        };
        self.events.log(
            level,
            format!(
                "{} ({}/{} steps, {:.2?})",
                report.message, report.completed_steps, report.total_steps, report.duration
            ),
        );

        guard.final_state = EngineState::Completed { success };
        Ok(report)
    }

    /// Executes the step at `index` in isolation.
    ///
    /// Other steps' statuses and the engine's last run state are left
    /// untouched; the engine counts as executing while the step runs, so
    /// [`stop`](Self::stop) can cancel it.
    pub async fn execute_single_step(
        &self,
        workflow: &mut Workflow,
        index: usize,
    ) -> Result<StepOutcome, EngineError> {
        if index >= workflow.len() {
            return Err(EngineError::StepIndexOutOfRange {
                index,
                len: workflow.len(),
            });
        }

        let (_guard, cancel) = self.begin_run()?;
        self.set_current_step(Some(index));

        match self.run_step(workflow, index, &cancel).await {
            StepRun::Skipped => Ok(StepOutcome::success("Step disabled, skipped")),
            StepRun::Unsupported(outcome) | StepRun::Finished(outcome) => Ok(outcome),
            StepRun::Cancelled => Err(EngineError::Cancelled),
        }
    }

    /// Resolves and executes one step, updating its status.
    async fn run_step(
        &self,
        workflow: &mut Workflow,
        index: usize,
        cancel: &CancellationSignal,
    ) -> StepRun {
        let total = workflow.len();
        let workflow_id = workflow.id().to_string();
        let classification = workflow.classification.clone();

        let Some(step) = workflow.step_mut_for_run(index) else {
            return StepRun::Skipped;
        };
        let step_type = step.step_type.clone();

        if !step.enabled {
            step.set_status(StepStatus::Skipped, None);
            info!("Step {} ({}) disabled - skipped", index + 1, step_type);
            self.events.emit(EngineEvent::StepCompleted {
                index,
                step_type,
                outcome: StepOutcome::success("Step disabled, skipped"),
            });
            return StepRun::Skipped;
        }

        let Some(executor) = self.registry.get_executor(&step_type) else {
            let message = format!("Unsupported step type '{}'", step_type);
            step.set_status(StepStatus::Failed, Some(message.clone()));
            self.events.log(
                LogLevel::Error,
                format!("Step {}: {}", index + 1, message),
            );
            let outcome = StepOutcome::failure(message.clone(), message);
            self.events.emit(EngineEvent::StepCompleted {
                index,
                step_type,
                outcome: outcome.clone(),
            });
            return StepRun::Unsupported(outcome);
        };

        step.set_status(StepStatus::Running, None);
        info!("Starting step {}/{}: {}", index + 1, total, step_type);
        self.events.emit(EngineEvent::StepStarting {
            index,
            step_type: step_type.clone(),
        });

        let mut ctx = ExecutionContext::new(
            index,
            total,
            workflow_id,
            classification,
            Arc::clone(&self.variables),
            Arc::clone(&self.registry),
        );
        let result = execute_guarded(executor.as_ref(), &step.parameter, &mut ctx, cancel).await;

        match result {
            Ok(outcome) => {
                if outcome.success {
                    step.set_status(StepStatus::Succeeded, None);
                    info!("Step {} ({}) completed: {}", index + 1, step_type, outcome.message);
                } else {
                    step.set_status(StepStatus::Failed, Some(outcome.message.clone()));
                    self.events.log(
                        LogLevel::Error,
                        format!("Step {} ({}) failed: {}", index + 1, step_type, outcome.message),
                    );
                }
                self.events.emit(EngineEvent::StepCompleted {
                    index,
                    step_type,
                    outcome: outcome.clone(),
                });
                StepRun::Finished(outcome)
            }
            Err(Cancelled) => {
                step.set_status(StepStatus::Pending, None);
                self.events.log(
                    LogLevel::Warning,
                    format!("Step {} ({}) cancelled", index + 1, step_type),
                );
                StepRun::Cancelled
            }
        }
    }

    fn begin_run(&self) -> Result<(RunGuard<'_>, CancellationSignal), EngineError> {
        let mut slot = self.slot.lock();
        if slot.state.is_active() {
            drop(slot);
            self.events.log(
                LogLevel::Warning,
                "Rejected execution request - engine is already running",
            );
            return Err(EngineError::AlreadyRunning);
        }

        let previous = slot.state;
        let source = CancellationSource::new();
        let signal = source.signal();
        slot.cancel = Some(source);
        slot.state = EngineState::Running;
        slot.current_step = None;

        Ok((
            RunGuard {
                slot: &self.slot,
                final_state: previous,
            },
            signal,
        ))
    }

    fn set_current_step(&self, index: Option<usize>) {
        self.slot.lock().current_step = index;
    }
}
