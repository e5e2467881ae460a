//! Workflow Persistence
//!
//! Reads and writes [`WorkflowDocument`]s. Two entry points:
//!
//! - [`load_workflow_file`] / [`save_workflow_file`] for a single explicit
//!   path (JSON or YAML, chosen by extension).
//! - [`FileWorkflowRepository`] for classification-addressed storage at
//!   `{root}/{model_type}/{model_name}/{item_name}.json`.
//!
//! The default repository root is `$STEPFLOW_HOME`, or `.stepflow` in the
//! current directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use once_cell::sync::Lazy;

use crate::error::PersistError;

use super::document::WorkflowDocument;
use super::model::{Classification, Workflow};

/// Environment variable overriding the repository root.
pub const STORAGE_ROOT_ENV: &str = "STEPFLOW_HOME";

/// Lazily-resolved default repository root.
pub static STORAGE_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(root) = std::env::var(STORAGE_ROOT_ENV) {
        if !root.trim().is_empty() {
            info!("Using workflow storage from {}: {}", STORAGE_ROOT_ENV, root);
            return PathBuf::from(root);
        }
    }

    let cwd_root = PathBuf::from(".stepflow");
    debug!("Using workflow storage: {}", cwd_root.display());
    cwd_root
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

fn format_for(path: &Path) -> Result<Format, PersistError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("json") => Ok(Format::Json),
        Some("yaml") | Some("yml") => Ok(Format::Yaml),
        _ => Err(PersistError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Loads a workflow document from a JSON or YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use stepflow::workflow::load_workflow_file;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let document = load_workflow_file("burn_in.json")?;
///     let workflow = document.to_workflow()?;
///     println!("Loaded {} steps", workflow.len());
///     Ok(())
/// }
/// ```
pub fn load_workflow_file(path: impl AsRef<Path>) -> Result<WorkflowDocument, PersistError> {
    let path = path.as_ref();
    let format = format_for(path)?;
    info!("Loading workflow from: {}", path.display());

    let content =
        fs::read_to_string(path).map_err(|e| PersistError::io(path.display().to_string(), e))?;
    debug!("Workflow document loaded ({} bytes)", content.len());

    let document = match format {
        Format::Json => serde_json::from_str(&content)?,
        Format::Yaml => serde_yaml::from_str(&content)?,
    };
    Ok(document)
}

/// Saves a workflow document to a JSON or YAML file.
pub fn save_workflow_file(
    document: &WorkflowDocument,
    path: impl AsRef<Path>,
) -> Result<(), PersistError> {
    let path = path.as_ref();
    let content = match format_for(path)? {
        Format::Json => serde_json::to_string_pretty(document)?,
        Format::Yaml => serde_yaml::to_string(document)?,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| PersistError::io(parent.display().to_string(), e))?;
        }
    }

    fs::write(path, content).map_err(|e| PersistError::io(path.display().to_string(), e))?;
    info!("Workflow saved to: {}", path.display());
    Ok(())
}

/// Classification-addressed workflow storage on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileWorkflowRepository {
    root: PathBuf,
}

impl FileWorkflowRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the document path for a classification.
    pub fn path_for(&self, classification: &Classification) -> PathBuf {
        self.root
            .join(sanitize(&classification.model_type))
            .join(sanitize(&classification.model_name))
            .join(format!("{}.json", sanitize(&classification.item_name)))
    }

    /// Loads a document; a missing file yields a fresh empty document.
    pub fn load(&self, classification: &Classification) -> Result<WorkflowDocument, PersistError> {
        let path = self.path_for(classification);
        if !path.exists() {
            info!(
                "No stored workflow for {} - starting empty",
                classification
            );
            return Ok(WorkflowDocument::empty(classification));
        }
        load_workflow_file(&path)
    }

    /// Loads the workflow model for a classification.
    pub fn load_workflow(&self, classification: &Classification) -> Result<Workflow, PersistError> {
        self.load(classification)?.to_workflow()
    }

    /// Writes a document at its classification path and returns that path.
    pub fn save(&self, document: &WorkflowDocument) -> Result<PathBuf, PersistError> {
        let path = self.path_for(&document.classification());
        save_workflow_file(document, &path)?;
        Ok(path)
    }

    /// Deletes a stored document. Returns whether a file was removed.
    pub fn delete(&self, classification: &Classification) -> Result<bool, PersistError> {
        let path = self.path_for(classification);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| PersistError::io(path.display().to_string(), e))?;
        info!("Deleted workflow: {}", path.display());
        Ok(true)
    }

    /// Lists the classifications of all stored documents, sorted.
    pub fn list(&self) -> Result<Vec<Classification>, PersistError> {
        let mut found = Vec::new();
        for model_type in subdirectories(&self.root)? {
            for model_name in subdirectories(&self.root.join(&model_type))? {
                let dir = self.root.join(&model_type).join(&model_name);
                let entries =
                    fs::read_dir(&dir).map_err(|e| PersistError::io(dir.display().to_string(), e))?;
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("json") {
                        continue;
                    }
                    if let Some(item) = path.file_stem().and_then(|s| s.to_str()) {
                        found.push(Classification::new(&model_type, &model_name, item));
                    }
                }
            }
        }
        found.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        Ok(found)
    }
}

impl Default for FileWorkflowRepository {
    fn default() -> Self {
        Self::new(STORAGE_ROOT.clone())
    }
}

fn subdirectories(dir: &Path) -> Result<Vec<String>, PersistError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|e| PersistError::io(dir.display().to_string(), e))?;
    Ok(entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect())
}

/// Makes a classification part safe to use as a path component.
fn sanitize(part: &str) -> String {
    let cleaned: String = part
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
