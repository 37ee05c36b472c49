// hive-planner/src/spec.rs
// ============================================================================
// Module: Task Specification
// Description: The shape of a single decomposed task as returned by the LLM
//              collaborator's decomposition response.
// Purpose: Give the graph validator and layering algorithm a typed input.
// Dependencies: hive_core::ActionClass
// ============================================================================

use hive_core::ActionClass;
use serde::Deserialize;
use serde::Serialize;

/// One task as decomposed from a goal, before it is assigned a real
/// [`hive_core::TaskId`] by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Task identifier, unique within the plan.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Optional longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Ids of tasks that must complete before this one may start.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Risk classification used by the policy gate.
    #[serde(default = "default_action_class")]
    pub action_class: ActionClass,
}

const fn default_action_class() -> ActionClass {
    ActionClass::ReadOnly
}

/// The raw decomposition response from the LLM collaborator: a flat task
/// list with no layering applied yet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecompositionResponse {
    /// Tasks in the order the collaborator returned them.
    pub tasks: Vec<TaskSpec>,
}

impl TaskSpec {
    /// Builds the single-task fallback plan used when decomposition fails
    /// validation: one task with no dependencies, carrying the original
    /// goal verbatim.
    #[must_use]
    pub fn fallback(goal: &str) -> Self {
        Self {
            id: "t1".to_string(),
            title: goal.to_string(),
            description: None,
            dependencies: Vec::new(),
            action_class: ActionClass::ReadOnly,
        }
    }
}
