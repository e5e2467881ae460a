//! Executor Registry
//!
//! Maps step-type names to executors. Built once from every available
//! executor and read-only afterwards, so it can be shared between engines.
//!
//! # Conflict Resolution
//!
//! Executors are grouped by [`StepExecutor::step_type`]. Within a group the
//! lowest [`StepExecutor::priority`] wins; on a tie the executor registered
//! first wins. Losers are discarded at build time.
//!
//! # Lookup
//!
//! An exact key match is tried first. On a miss, the surviving executors
//! are scanned in build order and the first whose
//! [`StepExecutor::can_execute`] accepts the name is returned.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use log::{debug, info};

use super::contract::StepExecutor;

/// Read-only lookup table from step-type name to executor.
pub struct ExecutorRegistry {
    executors: Vec<Arc<dyn StepExecutor>>,
    index: HashMap<String, usize>,
}

impl ExecutorRegistry {
    /// Builds a registry, resolving duplicate step types by priority.
    pub fn new(executors: impl IntoIterator<Item = Arc<dyn StepExecutor>>) -> Self {
        let mut resolved: Vec<Arc<dyn StepExecutor>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for executor in executors {
            let key = executor.step_type().to_string();
            match index.get(&key) {
                Some(&position) => {
                    let current = &resolved[position];
                    if executor.priority() < current.priority() {
                        debug!(
                            "Executor for '{}' replaced (priority {} beats {})",
                            key,
                            executor.priority(),
                            current.priority()
                        );
                        resolved[position] = executor;
                    } else {
                        debug!(
                            "Executor for '{}' discarded (priority {} does not beat {})",
                            key,
                            executor.priority(),
                            current.priority()
                        );
                    }
                }
                None => {
                    index.insert(key, resolved.len());
                    resolved.push(executor);
                }
            }
        }

        info!("Executor registry built with {} step types", resolved.len());
        Self {
            executors: resolved,
            index,
        }
    }

    /// A registry with no executors.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Resolves the executor for a step type.
    pub fn get_executor(&self, step_type: &str) -> Option<Arc<dyn StepExecutor>> {
        if let Some(&position) = self.index.get(step_type) {
            return Some(Arc::clone(&self.executors[position]));
        }

        self.executors
            .iter()
            .find(|executor| executor.can_execute(step_type))
            .map(Arc::clone)
    }

    /// True iff [`get_executor`](Self::get_executor) would find a match.
    pub fn is_supported(&self, step_type: &str) -> bool {
        self.get_executor(step_type).is_some()
    }

    /// Names of all registered step types.
    pub fn registered_types(&self) -> BTreeSet<String> {
        self.index.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("step_types", &self.registered_types())
            .finish()
    }
}
