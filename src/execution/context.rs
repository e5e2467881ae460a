//! Per-Step Execution Context
//!
//! Built by the engine for every step invocation. Executors can read
//! everything but may only change the loop-scoped fields.

use std::fmt;
use std::sync::Arc;

use crate::variables::VariableStore;
use crate::workflow::Classification;

use super::registry::ExecutorRegistry;

/// Loop-scoped fields, saved and restored around nested loops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopState {
    /// 1-based iteration number, 0 outside a loop
    pub counter: u32,
    pub total: u32,
    pub in_loop: bool,
}

/// Context handed to a step executor.
#[derive(Clone)]
pub struct ExecutionContext {
    step_index: usize,
    total_steps: usize,
    workflow_id: String,
    classification: Classification,
    loop_state: LoopState,
    variables: Arc<dyn VariableStore>,
    registry: Arc<ExecutorRegistry>,
}

impl ExecutionContext {
    pub fn new(
        step_index: usize,
        total_steps: usize,
        workflow_id: impl Into<String>,
        classification: Classification,
        variables: Arc<dyn VariableStore>,
        registry: Arc<ExecutorRegistry>,
    ) -> Self {
        Self {
            step_index,
            total_steps,
            workflow_id: workflow_id.into(),
            classification,
            loop_state: LoopState::default(),
            variables,
            registry,
        }
    }

    /// 0-based index of the step being executed.
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn loop_counter(&self) -> u32 {
        self.loop_state.counter
    }

    pub fn loop_total(&self) -> u32 {
        self.loop_state.total
    }

    pub fn in_loop(&self) -> bool {
        self.loop_state.in_loop
    }

    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    /// Enters a loop of `total` iterations and returns the enclosing state.
    pub fn enter_loop(&mut self, total: u32) -> LoopState {
        let enclosing = self.loop_state;
        self.loop_state = LoopState {
            counter: 0,
            total,
            in_loop: true,
        };
        enclosing
    }

    /// Sets the current 1-based iteration.
    pub fn set_loop_counter(&mut self, counter: u32) {
        self.loop_state.counter = counter;
    }

    /// Leaves the current loop, restoring the enclosing state.
    pub fn exit_loop(&mut self, enclosing: LoopState) {
        self.loop_state = enclosing;
    }

    /// Injected variable capability.
    pub fn variables(&self) -> &dyn VariableStore {
        self.variables.as_ref()
    }

    /// Registry used by composite steps to resolve nested steps.
    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    /// Context for a nested step, keeping identity and loop fields.
    pub fn nested(&self, step_index: usize, total_steps: usize) -> Self {
        Self {
            step_index,
            total_steps,
            ..self.clone()
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("step_index", &self.step_index)
            .field("total_steps", &self.total_steps)
            .field("workflow_id", &self.workflow_id)
            .field("classification", &self.classification)
            .field("loop_state", &self.loop_state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::InMemoryVariableStore;

    fn context() -> ExecutionContext {
        ExecutionContext::new(
            2,
            5,
            "wf-1",
            Classification::new("A", "B", "C"),
            Arc::new(InMemoryVariableStore::new()),
            Arc::new(ExecutorRegistry::empty()),
        )
    }

    #[test]
    fn test_context_fields() {
        let ctx = context();
        assert_eq!(ctx.step_index(), 2);
        assert_eq!(ctx.total_steps(), 5);
        assert_eq!(ctx.workflow_id(), "wf-1");
        assert!(!ctx.in_loop());
        assert_eq!(ctx.loop_counter(), 0);
    }

    #[test]
    fn test_nested_loops_restore_state() {
        let mut ctx = context();

        let outer = ctx.enter_loop(3);
        ctx.set_loop_counter(2);

        let inner = ctx.enter_loop(10);
        ctx.set_loop_counter(7);
        assert_eq!(ctx.loop_total(), 10);
        assert_eq!(ctx.loop_counter(), 7);

        ctx.exit_loop(inner);
        assert_eq!(ctx.loop_total(), 3);
        assert_eq!(ctx.loop_counter(), 2);

        ctx.exit_loop(outer);
        assert_eq!(ctx.loop_state(), LoopState::default());
    }

    #[test]
    fn test_nested_context_keeps_loop_fields() {
        let mut ctx = context();
        ctx.enter_loop(4);
        ctx.set_loop_counter(1);

        let child = ctx.nested(0, 2);
        assert_eq!(child.step_index(), 0);
        assert_eq!(child.total_steps(), 2);
        assert!(child.in_loop());
        assert_eq!(child.loop_counter(), 1);
    }
}
