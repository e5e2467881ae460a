//! Variable Store
//!
//! Named values that steps read as inputs and write as outputs. The engine
//! never touches variables itself; it only hands the injected store to
//! step bodies through the execution context.

use std::collections::HashMap;

use log::debug;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{PersistError, StepError};
use crate::workflow::document::VariableRecord;

/// Read/write access to named variables.
pub trait VariableStore: Send + Sync {
    /// Returns the current value of a variable.
    fn get(&self, name: &str) -> Option<Value>;

    /// Assigns a variable, creating it if needed.
    fn set(&self, name: &str, value: Value) -> Result<(), StepError>;

    /// Returns all variable names, sorted.
    fn names(&self) -> Vec<String>;
}

/// Process-local variable store.
#[derive(Debug, Default)]
pub struct InMemoryVariableStore {
    values: RwLock<HashMap<String, Value>>,
}

impl InMemoryVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a store from the variable list of a workflow document.
    pub fn from_records(records: &[VariableRecord]) -> Result<Self, PersistError> {
        let store = Self::new();
        for record in records {
            let value = record.typed_value()?;
            debug!("Seeding variable '{}' = {}", record.name, value);
            store.insert(&record.name, value);
        }
        Ok(store)
    }

    fn insert(&self, name: &str, value: Value) {
        self.values.write().insert(name.to_string(), value);
    }
}

impl VariableStore for InMemoryVariableStore {
    fn get(&self, name: &str) -> Option<Value> {
        self.values.read().get(name).cloned()
    }

    fn set(&self, name: &str, value: Value) -> Result<(), StepError> {
        if name.trim().is_empty() {
            return Err(StepError::Variable("variable name is empty".to_string()));
        }
        self.insert(name, value);
        Ok(())
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Renders a value the way it appears in messages.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Replaces `{name}` placeholders with variable values.
///
/// Unknown names are left as-is.
pub fn render_template(template: &str, store: &dyn VariableStore) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match store.get(name) {
                    Some(value) => rendered.push_str(&display_value(&value)),
                    None => {
                        rendered.push('{');
                        rendered.push_str(name);
                        rendered.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                rendered.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    rendered.push_str(rest);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let store = InMemoryVariableStore::new();
        store.set("voltage", json!(230.5)).unwrap();

        assert_eq!(store.get("voltage"), Some(json!(230.5)));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_set_rejects_empty_name() {
        let store = InMemoryVariableStore::new();
        assert!(store.set("  ", json!(1)).is_err());
    }

    #[test]
    fn test_names_sorted() {
        let store = InMemoryVariableStore::new();
        store.set("b", json!(1)).unwrap();
        store.set("a", json!(2)).unwrap();
        assert_eq!(store.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_from_records() {
        let records = vec![
            VariableRecord::new("count", "int", "3"),
            VariableRecord::new("label", "string", "unit A"),
        ];
        let store = InMemoryVariableStore::from_records(&records).unwrap();

        assert_eq!(store.get("count"), Some(json!(3)));
        assert_eq!(store.get("label"), Some(json!("unit A")));
    }

    #[test]
    fn test_from_records_rejects_bad_value() {
        let records = vec![VariableRecord::new("count", "int", "three")];
        assert!(InMemoryVariableStore::from_records(&records).is_err());
    }

    #[test]
    fn test_render_template() {
        let store = InMemoryVariableStore::new();
        store.set("serial", json!("SN-001")).unwrap();
        store.set("temp", json!(41)).unwrap();

        assert_eq!(
            render_template("Unit {serial} at {temp} C", &store),
            "Unit SN-001 at 41 C"
        );
        assert_eq!(render_template("{unknown} stays", &store), "{unknown} stays");
        assert_eq!(render_template("open { brace", &store), "open { brace");
    }
}
