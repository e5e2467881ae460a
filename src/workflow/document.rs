//! Persisted Workflow Document
//!
//! The on-disk form of a workflow: a metadata section, a form section with
//! the classification and the ordered step records, and a companion
//! variable list.
//!
//! # Example JSON Format
//!
//! ```json
//! {
//!   "metadata": { "created_at": "2026-01-05T08:00:00Z", "project": "Line 3" },
//!   "form": {
//!     "model_type": "Inverter",
//!     "model_name": "X200",
//!     "item_name": "Burn-in",
//!     "steps": [
//!       {
//!         "step_number": 1,
//!         "step_type": "Delay",
//!         "parameter": { "milliseconds": 500 },
//!         "remark": "settle",
//!         "status": 0,
//!         "error_message": null
//!       }
//!     ]
//!   },
//!   "variables": [
//!     { "name": "count", "type_tag": "int", "raw_value": "3", "display": "3" }
//!   ]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::PersistError;

use super::model::{Classification, Step, StepStatus, Workflow};

/// Root of a persisted workflow document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowDocument {
    pub metadata: DocumentMetadata,
    pub form: WorkflowForm,

    /// Variable definitions stored alongside the workflow
    #[serde(default)]
    pub variables: Vec<VariableRecord>,
}

/// Document-level metadata.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub project: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

/// Classification plus ordered step records.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowForm {
    pub model_type: String,
    pub model_name: String,
    pub item_name: String,

    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

/// A single persisted step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// 1-based position
    pub step_number: usize,
    pub step_type: String,

    #[serde(default)]
    pub parameter: Value,

    #[serde(default)]
    pub remark: String,

    /// 0=Pending, 1=Running, 2=Succeeded, 3=Failed, 4=Skipped
    #[serde(default)]
    pub status: u8,

    #[serde(default)]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// A persisted variable definition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VariableRecord {
    pub name: String,
    /// One of `int`, `double`, `bool`, `string`, `json`
    pub type_tag: String,
    pub raw_value: String,

    #[serde(default)]
    pub display: String,
}

impl VariableRecord {
    pub fn new(
        name: impl Into<String>,
        type_tag: impl Into<String>,
        raw_value: impl Into<String>,
    ) -> Self {
        let raw_value = raw_value.into();
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            display: raw_value.clone(),
            raw_value,
        }
    }

    /// Parses the raw text according to the type tag.
    pub fn typed_value(&self) -> Result<Value, PersistError> {
        let raw = self.raw_value.trim();
        let invalid = || {
            PersistError::InvalidDocument(format!(
                "variable '{}': '{}' is not a valid {}",
                self.name, self.raw_value, self.type_tag
            ))
        };

        match self.type_tag.to_ascii_lowercase().as_str() {
            "int" | "integer" | "long" => raw.parse::<i64>().map(Value::from).map_err(|_| invalid()),
            "double" | "float" | "number" => {
                let parsed = raw.parse::<f64>().map_err(|_| invalid())?;
                serde_json::Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(invalid)
            }
            "bool" | "boolean" => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            "json" => serde_json::from_str(raw).map_err(|_| invalid()),
            "string" | "text" | "" => Ok(Value::String(self.raw_value.clone())),
            other => Err(PersistError::InvalidDocument(format!(
                "variable '{}': unknown type tag '{}'",
                self.name, other
            ))),
        }
    }
}

impl WorkflowDocument {
    /// Builds the persisted form of a workflow.
    pub fn from_workflow(
        workflow: &Workflow,
        project: impl Into<String>,
        variables: Vec<VariableRecord>,
    ) -> Self {
        let steps = workflow
            .steps()
            .iter()
            .map(|step| StepRecord {
                step_number: step.ordinal(),
                step_type: step.step_type.clone(),
                parameter: step.parameter.clone(),
                remark: step.remark.clone(),
                status: step.status().code(),
                error_message: step.error_message().map(str::to_string),
                id: Some(step.id().to_string()),
                enabled: step.enabled,
            })
            .collect();

        Self {
            metadata: DocumentMetadata {
                created_at: workflow.created_at(),
                project: project.into(),
                workflow_id: Some(workflow.id().to_string()),
                modified_at: Some(workflow.modified_at()),
            },
            form: WorkflowForm {
                model_type: workflow.classification.model_type.clone(),
                model_name: workflow.classification.model_name.clone(),
                item_name: workflow.classification.item_name.clone(),
                steps,
            },
            variables,
        }
    }

    /// An empty document for a classification.
    pub fn empty(classification: &Classification) -> Self {
        Self::from_workflow(&Workflow::new(classification.clone()), "", Vec::new())
    }

    pub fn classification(&self) -> Classification {
        Classification::new(
            self.form.model_type.clone(),
            self.form.model_name.clone(),
            self.form.item_name.clone(),
        )
    }

    /// Rebuilds the workflow model.
    ///
    /// Records are ordered by `step_number`; ordinals are then recomputed.
    pub fn to_workflow(&self) -> Result<Workflow, PersistError> {
        let mut records: Vec<&StepRecord> = self.form.steps.iter().collect();
        records.sort_by_key(|record| record.step_number);

        let steps = records
            .into_iter()
            .map(|record| {
                let status = StepStatus::from_code(record.status).ok_or_else(|| {
                    PersistError::InvalidDocument(format!(
                        "step {}: unknown status code {}",
                        record.step_number, record.status
                    ))
                })?;
                let id = record
                    .id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());

                Ok(Step::reconstitute(
                    id,
                    record.step_type.clone(),
                    record.parameter.clone(),
                    record.remark.clone(),
                    record.enabled,
                    status,
                    record.error_message.clone(),
                ))
            })
            .collect::<Result<Vec<_>, PersistError>>()?;

        let workflow_id = self
            .metadata
            .workflow_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Workflow::reconstitute(
            workflow_id,
            self.classification(),
            steps,
            self.metadata.created_at,
            self.metadata.modified_at.unwrap_or(self.metadata.created_at),
        ))
    }
}
