//! Workflow Data Model
//!
//! Core data structures representing a workflow: an ordered list of typed
//! steps addressed by a three-part classification key.
//!
//! Ordinals are always `1..=N` in sequence order. Every structural edit
//! renumbers, and the ordinal field is not writable from outside this
//! module. Status and error fields are only written by the execution
//! engine; an editing surface owns everything else.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use stepflow::workflow::{Classification, Step, Workflow};
//!
//! let mut workflow = Workflow::new(Classification::new("Inverter", "X200", "Burn-in"));
//! workflow.add_step(Step::new("Delay", json!({ "milliseconds": 500 })));
//! workflow.add_step(Step::new("SetVariable", json!({ "name": "ready", "value": true })));
//!
//! assert_eq!(workflow.steps()[1].ordinal(), 2);
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ModelError;

/// Execution status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Integer code used in persisted documents.
    pub fn code(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Succeeded => 2,
            Self::Failed => 3,
            Self::Skipped => 4,
        }
    }

    /// Decodes a persisted status code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Running),
            2 => Some(Self::Succeeded),
            3 => Some(Self::Failed),
            4 => Some(Self::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// Display grouping of step types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepCategory {
    Control,
    Variable,
    Device,
    Report,
    Monitor,
    Notification,
    Other,
}

impl fmt::Display for StepCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Control => "Control",
            Self::Variable => "Variable",
            Self::Device => "Device I/O",
            Self::Report => "Report I/O",
            Self::Monitor => "Monitor",
            Self::Notification => "Notification",
            Self::Other => "Other",
        };
        f.write_str(label)
    }
}

/// Complete step-type names, lowercased with separators removed.
const CATEGORY_NAMES: &[(&str, StepCategory)] = &[
    ("delay", StepCategory::Control),
    ("wait", StepCategory::Control),
    ("condition", StepCategory::Control),
    ("loop", StepCategory::Control),
    ("loopcontrol", StepCategory::Control),
    ("goto", StepCategory::Control),
    ("setvariable", StepCategory::Variable),
    ("message", StepCategory::Notification),
    ("notify", StepCategory::Notification),
    ("log", StepCategory::Notification),
];

/// Families matched on the first word of a step-type name (`PlcRead`,
/// `modbus_write`, `Excel Export`).
const CATEGORY_FAMILIES: &[(&str, StepCategory)] = &[
    ("variable", StepCategory::Variable),
    ("plc", StepCategory::Device),
    ("device", StepCategory::Device),
    ("modbus", StepCategory::Device),
    ("report", StepCategory::Report),
    ("excel", StepCategory::Report),
    ("monitor", StepCategory::Monitor),
];

fn is_name_separator(c: char) -> bool {
    matches!(c, '_' | '-' | ' ' | '.')
}

/// Lowercased first word of a CamelCase or separated name.
fn leading_word(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut word = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if is_name_separator(c) {
            break;
        }
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            // "PlcRead" splits before R, "PLCRead" too
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                break;
            }
        }
        word.extend(c.to_lowercase());
    }
    word
}

/// Derives the display category of a step type.
pub fn category_for(step_type: &str) -> StepCategory {
    let trimmed = step_type.trim();
    let normalized: String = trimmed
        .chars()
        .filter(|c| !is_name_separator(*c))
        .flat_map(char::to_lowercase)
        .collect();

    if let Some((_, category)) = CATEGORY_NAMES.iter().find(|(name, _)| *name == normalized) {
        return *category;
    }

    let first = leading_word(trimmed);
    CATEGORY_FAMILIES
        .iter()
        .find(|(family, _)| *family == first)
        .map(|(_, category)| *category)
        .unwrap_or(StepCategory::Other)
}

/// A single step in a workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    id: String,
    ordinal: usize,

    /// Step-type name, the key into the executor registry
    pub step_type: String,

    /// Opaque parameter payload, interpreted only by the executor
    pub parameter: Value,

    /// Free-text remark shown next to the step
    pub remark: String,

    /// Disabled steps are skipped without resolving an executor
    pub enabled: bool,

    status: StepStatus,
    error_message: Option<String>,
}

impl Step {
    /// Creates a freshly authored step with a new id and `Pending` status.
    ///
    /// The ordinal is assigned when the step is added to a workflow.
    pub fn new(step_type: impl Into<String>, parameter: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ordinal: 0,
            step_type: step_type.into().trim().to_string(),
            parameter,
            remark: String::new(),
            enabled: true,
            status: StepStatus::Pending,
            error_message: None,
        }
    }

    /// Rehydrates a step from storage, preserving id, status and error.
    pub fn reconstitute(
        id: impl Into<String>,
        step_type: impl Into<String>,
        parameter: Value,
        remark: impl Into<String>,
        enabled: bool,
        status: StepStatus,
        error_message: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            ordinal: 0,
            step_type: step_type.into().trim().to_string(),
            parameter,
            remark: remark.into(),
            enabled,
            status,
            error_message,
        }
    }

    /// Sets the remark.
    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }

    /// Marks the step disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 1-based position within the owning workflow.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Display category, derived from the step type on every call.
    pub fn category(&self) -> StepCategory {
        category_for(&self.step_type)
    }

    pub(crate) fn set_status(&mut self, status: StepStatus, error_message: Option<String>) {
        self.status = status;
        self.error_message = error_message;
    }
}

/// Three-part storage key of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Classification {
    pub model_type: String,
    pub model_name: String,
    pub item_name: String,
}

impl Classification {
    pub fn new(
        model_type: impl Into<String>,
        model_name: impl Into<String>,
        item_name: impl Into<String>,
    ) -> Self {
        Self {
            model_type: model_type.into(),
            model_name: model_name.into(),
            item_name: item_name.into(),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.model_type, self.model_name, self.item_name)
    }
}

/// An ordered, editable list of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    id: String,
    pub classification: Classification,
    steps: Vec<Step>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl Workflow {
    /// Creates a new empty workflow.
    pub fn new(classification: Classification) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            classification,
            steps: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Rebuilds a workflow from persisted parts. Ordinals are recomputed.
    pub fn reconstitute(
        id: impl Into<String>,
        classification: Classification,
        steps: Vec<Step>,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        let mut workflow = Self {
            id: id.into(),
            classification,
            steps,
            created_at,
            modified_at,
        };
        workflow.assign_ordinals();
        workflow
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Gets a step by 0-based index.
    pub fn get_step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Gets a mutable reference to a step by 0-based index.
    pub fn get_step_mut(&mut self, index: usize) -> Option<&mut Step> {
        self.touch();
        self.steps.get_mut(index)
    }

    /// Returns the 0-based index of the step with the given id.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Appends a step and returns its 0-based index.
    pub fn add_step(&mut self, step: Step) -> usize {
        self.steps.push(step);
        self.renumber();
        self.steps.len() - 1
    }

    /// Inserts a step before `index` (`index == len` appends).
    pub fn insert_step(&mut self, index: usize, step: Step) -> Result<(), ModelError> {
        if index > self.steps.len() {
            return Err(self.out_of_range(index));
        }
        self.steps.insert(index, step);
        self.renumber();
        Ok(())
    }

    /// Removes and returns the step at `index`.
    pub fn remove_step(&mut self, index: usize) -> Result<Step, ModelError> {
        if index >= self.steps.len() {
            return Err(self.out_of_range(index));
        }
        let step = self.steps.remove(index);
        self.renumber();
        Ok(step)
    }

    /// Removes the step with the given id.
    pub fn remove_step_by_id(&mut self, id: &str) -> Result<Step, ModelError> {
        let index = self
            .position_of(id)
            .ok_or_else(|| ModelError::StepNotFound(id.to_string()))?;
        self.remove_step(index)
    }

    /// Moves the step at `from` so that it ends up at position `to`.
    pub fn move_step(&mut self, from: usize, to: usize) -> Result<(), ModelError> {
        let len = self.steps.len();
        if from >= len {
            return Err(self.out_of_range(from));
        }
        if to >= len {
            return Err(self.out_of_range(to));
        }
        let step = self.steps.remove(from);
        self.steps.insert(to, step);
        self.renumber();
        Ok(())
    }

    /// Replaces the parameter payload of the step at `index`.
    pub fn update_parameter(&mut self, index: usize, parameter: Value) -> Result<(), ModelError> {
        match self.steps.get_mut(index) {
            Some(step) => step.parameter = parameter,
            None => return Err(self.out_of_range(index)),
        }
        self.touch();
        Ok(())
    }

    /// Resets every step to `Pending` and clears errors.
    pub fn reset_statuses(&mut self) {
        for step in &mut self.steps {
            step.set_status(StepStatus::Pending, None);
        }
    }

    /// Returns the number of steps in the workflow.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the workflow has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn step_mut_for_run(&mut self, index: usize) -> Option<&mut Step> {
        self.steps.get_mut(index)
    }

    fn renumber(&mut self) {
        self.assign_ordinals();
        self.touch();
    }

    fn assign_ordinals(&mut self) {
        for (position, step) in self.steps.iter_mut().enumerate() {
            step.ordinal = position + 1;
        }
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    fn out_of_range(&self, index: usize) -> ModelError {
        ModelError::IndexOutOfRange {
            index,
            len: self.steps.len(),
        }
    }
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new(Classification::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ordinals(workflow: &Workflow) -> Vec<usize> {
        workflow.steps().iter().map(|s| s.ordinal()).collect()
    }

    fn types(workflow: &Workflow) -> Vec<&str> {
        workflow.steps().iter().map(|s| s.step_type.as_str()).collect()
    }

    fn sample_workflow() -> Workflow {
        let mut workflow = Workflow::new(Classification::new("Inverter", "X200", "Burn-in"));
        for name in ["A", "B", "C", "D"] {
            workflow.add_step(Step::new(name, json!({})));
        }
        workflow
    }

    #[test]
    fn test_step_creation() {
        let step = Step::new("  Delay ", json!({ "milliseconds": 10 })).with_remark("settle");

        assert_eq!(step.step_type, "Delay");
        assert_eq!(step.remark, "settle");
        assert!(step.enabled);
        assert_eq!(step.status(), StepStatus::Pending);
        assert!(step.error_message().is_none());
        assert!(!step.id().is_empty());
    }

    #[test]
    fn test_step_ids_are_unique() {
        let a = Step::new("Delay", json!({}));
        let b = Step::new("Delay", json!({}));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_reconstitute_preserves_identity() {
        let step = Step::reconstitute(
            "step-7",
            "PlcWrite",
            json!({ "address": 40001 }),
            "write setpoint",
            false,
            StepStatus::Failed,
            Some("timeout".to_string()),
        );

        assert_eq!(step.id(), "step-7");
        assert_eq!(step.status(), StepStatus::Failed);
        assert_eq!(step.error_message(), Some("timeout"));
        assert!(!step.enabled);
    }

    #[test]
    fn test_status_codes() {
        for status in [
            StepStatus::Pending,
            StepStatus::Running,
            StepStatus::Succeeded,
            StepStatus::Failed,
            StepStatus::Skipped,
        ] {
            assert_eq!(StepStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(StepStatus::Skipped.code(), 4);
        assert_eq!(StepStatus::from_code(9), None);
    }

    #[test]
    fn test_category_is_derived() {
        let mut step = Step::new("Delay", json!({}));
        assert_eq!(step.category(), StepCategory::Control);

        step.step_type = "PlcRead".to_string();
        assert_eq!(step.category(), StepCategory::Device);

        step.step_type = "ExcelWrite".to_string();
        assert_eq!(step.category(), StepCategory::Report);

        step.step_type = "Something".to_string();
        assert_eq!(step.category(), StepCategory::Other);
    }

    #[test]
    fn test_category_matches_whole_names_and_families() {
        assert_eq!(category_for("Log"), StepCategory::Notification);
        assert_eq!(category_for("LoopControl"), StepCategory::Control);
        assert_eq!(category_for("set_variable"), StepCategory::Variable);
        assert_eq!(category_for("PLCWrite"), StepCategory::Device);
        assert_eq!(category_for("modbus_read"), StepCategory::Device);
        assert_eq!(category_for("Excel Export"), StepCategory::Report);

        assert_eq!(category_for("Logical"), StepCategory::Other);
        assert_eq!(category_for("LoopbackTest"), StepCategory::Other);
        assert_eq!(category_for("Delayed"), StepCategory::Other);
        assert_eq!(category_for("PlcxRead"), StepCategory::Other);
    }

    #[test]
    fn test_reconstitute_trims_step_type() {
        let step = Step::reconstitute(
            "s-1",
            " Delay\t",
            json!({}),
            "",
            true,
            StepStatus::Pending,
            None,
        );
        assert_eq!(step.step_type, "Delay");
        assert_eq!(step.step_type, Step::new(" Delay", json!({})).step_type);
    }

    #[test]
    fn test_add_assigns_ordinals() {
        let workflow = sample_workflow();
        assert_eq!(ordinals(&workflow), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_insert_renumbers() {
        let mut workflow = sample_workflow();
        workflow.insert_step(0, Step::new("Z", json!({}))).unwrap();
        workflow.insert_step(5, Step::new("Y", json!({}))).unwrap();

        assert_eq!(types(&workflow), vec!["Z", "A", "B", "C", "D", "Y"]);
        assert_eq!(ordinals(&workflow), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_insert_out_of_range() {
        let mut workflow = sample_workflow();
        let result = workflow.insert_step(9, Step::new("Z", json!({})));
        assert_eq!(result, Err(ModelError::IndexOutOfRange { index: 9, len: 4 }));
    }

    #[test]
    fn test_remove_renumbers() {
        let mut workflow = sample_workflow();
        let removed = workflow.remove_step(1).unwrap();

        assert_eq!(removed.step_type, "B");
        assert_eq!(types(&workflow), vec!["A", "C", "D"]);
        assert_eq!(ordinals(&workflow), vec![1, 2, 3]);
    }

    #[test]
    fn test_remove_by_id() {
        let mut workflow = sample_workflow();
        let id = workflow.steps()[2].id().to_string();

        workflow.remove_step_by_id(&id).unwrap();
        assert_eq!(types(&workflow), vec!["A", "B", "D"]);
        assert!(matches!(
            workflow.remove_step_by_id(&id),
            Err(ModelError::StepNotFound(_))
        ));
    }

    #[test]
    fn test_move_forward_and_back() {
        let mut workflow = sample_workflow();

        workflow.move_step(0, 3).unwrap();
        assert_eq!(types(&workflow), vec!["B", "C", "D", "A"]);
        assert_eq!(ordinals(&workflow), vec![1, 2, 3, 4]);

        workflow.move_step(3, 1).unwrap();
        assert_eq!(types(&workflow), vec!["B", "A", "C", "D"]);
        assert_eq!(ordinals(&workflow), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_move_out_of_range() {
        let mut workflow = sample_workflow();
        assert!(workflow.move_step(4, 0).is_err());
        assert!(workflow.move_step(0, 4).is_err());
    }

    #[test]
    fn test_ordinals_stay_contiguous_under_mixed_edits() {
        let mut workflow = sample_workflow();
        let edits: &[(u8, usize, usize)] = &[
            (0, 2, 0),
            (1, 0, 0),
            (2, 3, 0),
            (0, 0, 0),
            (1, 4, 0),
            (2, 0, 2),
            (0, 1, 0),
        ];

        for &(kind, a, b) in edits {
            match kind {
                0 => workflow.insert_step(a.min(workflow.len()), Step::new("N", json!({}))).unwrap(),
                1 => {
                    workflow.remove_step(a.min(workflow.len() - 1)).unwrap();
                }
                _ => {
                    let last = workflow.len() - 1;
                    workflow.move_step(a.min(last), b.min(last)).unwrap();
                }
            }
            let expected: Vec<usize> = (1..=workflow.len()).collect();
            assert_eq!(ordinals(&workflow), expected);
        }
    }

    #[test]
    fn test_update_parameter() {
        let mut workflow = sample_workflow();
        workflow.update_parameter(2, json!({ "x": 1 })).unwrap();
        assert_eq!(workflow.steps()[2].parameter, json!({ "x": 1 }));
        assert!(workflow.update_parameter(10, json!(null)).is_err());
    }

    #[test]
    fn test_reset_statuses() {
        let mut workflow = sample_workflow();
        workflow
            .step_mut_for_run(1)
            .unwrap()
            .set_status(StepStatus::Failed, Some("boom".to_string()));

        workflow.reset_statuses();

        assert!(workflow
            .steps()
            .iter()
            .all(|s| s.status() == StepStatus::Pending && s.error_message().is_none()));
    }

    #[test]
    fn test_reconstitute_workflow_renumbers() {
        let steps = vec![Step::new("A", json!({})), Step::new("B", json!({}))];
        let created = Utc::now() - chrono::Duration::hours(2);
        let modified = created + chrono::Duration::minutes(5);
        let workflow =
            Workflow::reconstitute("wf-1", Classification::default(), steps, created, modified);

        assert_eq!(workflow.id(), "wf-1");
        assert_eq!(ordinals(&workflow), vec![1, 2]);
        assert_eq!(workflow.modified_at(), modified);
    }

    #[test]
    fn test_workflow_default_is_empty() {
        let workflow = Workflow::default();
        assert!(workflow.is_empty());
        assert_eq!(workflow.len(), 0);
    }

    #[test]
    fn test_classification_display() {
        let c = Classification::new("Inverter", "X200", "Burn-in");
        assert_eq!(c.to_string(), "Inverter/X200/Burn-in");
    }
}
