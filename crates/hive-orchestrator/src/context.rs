// hive-orchestrator/src/context.rs
// ============================================================================
// Module: Task Context
// Description: The view of prior results a running Task is allowed to see.
// Purpose: Enforce that a Task only sees its declared dependencies' results,
//          never the whole layer or the whole Run.
// Dependencies: hive_core::TaskId
// ============================================================================

use std::collections::BTreeMap;

use hive_core::TaskId;
use serde_json::Value;

/// The inputs visible to a single Task invocation: only the results of the
/// Tasks it declared as dependencies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskContext {
    /// Dependency results, keyed by the dependency's Task id.
    pub dependency_results: BTreeMap<TaskId, Value>,
}

impl TaskContext {
    /// Builds a context from a task's declared dependency ids and the
    /// completed-task result map accumulated so far.
    #[must_use]
    pub fn for_dependencies(dependency_ids: &[TaskId], completed: &BTreeMap<TaskId, Value>) -> Self {
        let dependency_results =
            dependency_ids.iter().filter_map(|id| completed.get(id).map(|v| (id.clone(), v.clone()))).collect();
        Self { dependency_results }
    }
}
