//! Error Types
//!
//! Typed failures for every layer of the stepper. Step-level failures are
//! normally folded into [`StepOutcome`](crate::execution::StepOutcome)s by
//! the guarded execution template; only engine misuse and persistence
//! problems surface as `Err` to callers.

use thiserror::Error;

/// Errors a step body may return from its core logic.
#[derive(Debug, Error)]
pub enum StepError {
    /// The run was cancelled while the step was executing.
    #[error("step was cancelled")]
    Cancelled,

    /// The parameter payload could not be decoded or is inconsistent.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The variable store rejected a read or write.
    #[error("variable error: {0}")]
    Variable(String),

    /// The step body failed.
    #[error("{0}")]
    Failed(String),
}

impl StepError {
    /// Convenience constructor for body failures.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<Cancelled> for StepError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Marker error for cooperative cancellation.
///
/// This is the only failure allowed to unwind past the per-step boundary.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("execution cancelled")]
pub struct Cancelled;

/// Errors reported by the execution engine itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// A run was requested while another is still in flight.
    #[error("engine is already executing a workflow")]
    AlreadyRunning,

    /// A single-step execution referenced an index past the end.
    #[error("step index {index} is out of range (workflow has {len} steps)")]
    StepIndexOutOfRange { index: usize, len: usize },

    /// A single-step execution was cancelled.
    #[error("execution cancelled")]
    Cancelled,
}

/// Structural edit failures on a workflow.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("position {index} is out of range (workflow has {len} steps)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("step '{0}' not found")]
    StepNotFound(String),
}

/// Failures reading or writing persisted workflow documents.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported workflow file format: '{0}' (expected .json, .yaml or .yml)")]
    UnsupportedFormat(String),

    #[error("invalid workflow document: {0}")]
    InvalidDocument(String),
}

impl PersistError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
