//! Step Outcomes and Run Reports
//!
//! Structured results produced by step executors and aggregated by the
//! engine into a run report.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

/// Control-flow directive carried by a successful outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlDirective {
    /// Continue with the next step
    Advance,
    /// Set the program counter to the given index
    Jump(usize),
    /// Leave the enclosing loop
    Break,
    /// Start the next iteration of the enclosing loop
    Continue,
}

/// Result of executing one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
    /// Explicit 0-based jump target
    pub next_step_index: Option<usize>,
    pub break_loop: bool,
    pub continue_loop: bool,
    pub duration: Duration,
    pub output: Option<Value>,
}

impl StepOutcome {
    /// A plain successful outcome.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            next_step_index: None,
            break_loop: false,
            continue_loop: false,
            duration: Duration::ZERO,
            output: None,
        }
    }

    /// A failed outcome with error detail.
    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::success(message)
        }
    }

    /// A successful outcome that redirects the program counter.
    pub fn jump(message: impl Into<String>, target: usize) -> Self {
        Self {
            next_step_index: Some(target),
            ..Self::success(message)
        }
    }

    /// A successful outcome asking the enclosing loop to exit.
    pub fn break_loop(message: impl Into<String>) -> Self {
        Self {
            break_loop: true,
            ..Self::success(message)
        }
    }

    /// A successful outcome asking the enclosing loop to move on.
    pub fn continue_loop(message: impl Into<String>) -> Self {
        Self {
            continue_loop: true,
            ..Self::success(message)
        }
    }

    /// Attaches an output payload.
    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Resolves the directive; jump wins over break, break over continue.
    pub fn directive(&self) -> ControlDirective {
        if let Some(target) = self.next_step_index {
            ControlDirective::Jump(target)
        } else if self.break_loop {
            ControlDirective::Break
        } else if self.continue_loop {
            ControlDirective::Continue
        } else {
            ControlDirective::Advance
        }
    }
}

/// Result of a parameter check. Empty error list means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
        }
    }

    pub fn push(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.errors.join("; "))
    }
}

/// One entry of a run's execution trace.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// 0-based index of the step that ran
    pub index: usize,
    /// Step-type name
    pub name: String,
    pub success: bool,
    pub skipped: bool,
    pub message: String,
    pub duration: Duration,
}

impl StepReport {
    pub(crate) fn from_outcome(index: usize, name: &str, outcome: &StepOutcome) -> Self {
        Self {
            index,
            name: name.to_string(),
            success: outcome.success,
            skipped: false,
            message: outcome.message.clone(),
            duration: outcome.duration,
        }
    }

    pub(crate) fn skipped(index: usize, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            success: true,
            skipped: true,
            message: "Step disabled, skipped".to_string(),
            duration: Duration::ZERO,
        }
    }
}

/// Aggregate result of a workflow run.
///
/// `outcomes` is an execution trace in the order steps actually ran, so a
/// backward jump shows the same index more than once.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub success: bool,
    pub cancelled: bool,
    pub message: String,
    pub total_steps: usize,
    pub completed_steps: usize,
    /// 0-based index of the step that failed the run
    pub failed_step: Option<usize>,
    pub duration: Duration,
    pub outcomes: Vec<StepReport>,
}

impl RunReport {
    /// Number of skipped entries in the trace.
    pub fn skipped_steps(&self) -> usize {
        self.outcomes.iter().filter(|o| o.skipped).count()
    }
}
