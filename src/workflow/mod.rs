//! Workflow Definition Module
//!
//! Provides the workflow data model, its persisted document form and
//! pre-run validation.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (Step, Workflow, Classification)
//! - [`document`]: Serializable workflow document and variable records
//! - [`repository`]: JSON/YAML file persistence
//! - [`validator`]: Checks against an executor registry

pub mod document;
pub mod model;
pub mod repository;
pub mod validator;

pub use document::{StepRecord, VariableRecord, WorkflowDocument};
pub use model::{category_for, Classification, Step, StepCategory, StepStatus, Workflow};
pub use repository::{load_workflow_file, save_workflow_file, FileWorkflowRepository};
pub use validator::{validate_workflow, ValidationIssue};
