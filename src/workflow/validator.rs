//! Workflow Validation
//!
//! Pre-run checks against an executor registry:
//! - Workflow is not empty
//! - Step ids are unique
//! - Ordinals are contiguous
//! - Every enabled step has a resolvable type and acceptable parameters
//!
//! Nothing is executed and the workflow is never modified.

use std::collections::HashSet;
use std::fmt;

use log::{debug, info, warn};

use crate::execution::ExecutorRegistry;

use super::model::{Step, Workflow};

/// A problem found before running a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyWorkflow,
    DuplicateStepId(String),
    OrdinalMismatch { index: usize, ordinal: usize },
    BlankStepType { index: usize },
    UnsupportedStepType { index: usize, step_type: String },
    InvalidParameter {
        index: usize,
        step_type: String,
        reason: String,
    },
}

impl ValidationIssue {
    /// 0-based index of the offending step, when there is one.
    pub fn step_index(&self) -> Option<usize> {
        match self {
            Self::OrdinalMismatch { index, .. }
            | Self::BlankStepType { index }
            | Self::UnsupportedStepType { index, .. }
            | Self::InvalidParameter { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyWorkflow => write!(f, "Workflow has no steps"),
            Self::DuplicateStepId(id) => write!(f, "Duplicate step ID: '{}'", id),
            Self::OrdinalMismatch { index, ordinal } => write!(
                f,
                "Step {} has ordinal {} (expected {})",
                index + 1,
                ordinal,
                index + 1
            ),
            Self::BlankStepType { index } => write!(f, "Step {} has no step type", index + 1),
            Self::UnsupportedStepType { index, step_type } => write!(
                f,
                "Step {}: unsupported step type '{}'",
                index + 1,
                step_type
            ),
            Self::InvalidParameter {
                index,
                step_type,
                reason,
            } => write!(
                f,
                "Step {} ({}): invalid parameter: {}",
                index + 1,
                step_type,
                reason
            ),
        }
    }
}

/// Checks one step against the registry.
fn validate_step(index: usize, step: &Step, registry: &ExecutorRegistry) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if step.ordinal() != index + 1 {
        issues.push(ValidationIssue::OrdinalMismatch {
            index,
            ordinal: step.ordinal(),
        });
    }

    if step.step_type.trim().is_empty() {
        issues.push(ValidationIssue::BlankStepType { index });
        return issues;
    }

    if !step.enabled {
        debug!("Step {} ({}) is disabled - not checked", index + 1, step.step_type);
        return issues;
    }

    match registry.get_executor(&step.step_type) {
        None => issues.push(ValidationIssue::UnsupportedStepType {
            index,
            step_type: step.step_type.clone(),
        }),
        Some(executor) => {
            let result = executor.validate_parameter(&step.parameter);
            for reason in result.errors {
                issues.push(ValidationIssue::InvalidParameter {
                    index,
                    step_type: step.step_type.clone(),
                    reason,
                });
            }
        }
    }

    issues
}

/// Validates a whole workflow, returning every issue found.
///
/// An empty result means the workflow is ready to run.
pub fn validate_workflow(workflow: &Workflow, registry: &ExecutorRegistry) -> Vec<ValidationIssue> {
    info!(
        "Validating workflow {} with {} steps",
        workflow.classification,
        workflow.len()
    );

    if workflow.is_empty() {
        return vec![ValidationIssue::EmptyWorkflow];
    }

    let mut issues = Vec::new();
    let mut seen_ids: HashSet<&str> = HashSet::new();

    for (index, step) in workflow.steps().iter().enumerate() {
        if !seen_ids.insert(step.id()) {
            issues.push(ValidationIssue::DuplicateStepId(step.id().to_string()));
        }
        issues.extend(validate_step(index, step, registry));
    }

    if issues.is_empty() {
        info!("Workflow validated: {} steps", workflow.len());
    } else {
        for issue in &issues {
            warn!("{}", issue);
        }
    }
    issues
}
