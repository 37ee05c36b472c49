// hive-planner/src/graph.rs
// ============================================================================
// Module: Dependency Graph Validation and Layering
// Description: Validate a flat task list (no duplicate ids, no unknown
//              deps, no cycles) and resolve it into Kahn's-algorithm
//              execution layers.
// Purpose: Turn an LLM decomposition response into an orderable DAG.
// Dependencies: crate::spec::TaskSpec
// ============================================================================

//! ## Overview
//! Validation and layering are split from decomposition so the orchestrator
//! can re-layer a plan (e.g. after a retried task reopens a layer) without
//! re-invoking the collaborator. Layer 0 holds every task with no
//! dependencies; layer n+1 holds every remaining task whose dependencies
//! are all satisfied by layers 0..=n. Ties within a layer keep the input
//! order, so layering is deterministic for a given task list.

use std::collections::HashMap;
use std::collections::HashSet;

use thiserror::Error;

use crate::spec::TaskSpec;

/// A flaw in a decomposed task list that forces the planner to fall back to
/// a single-task plan.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two or more tasks share the same id.
    #[error("duplicate task id: {0}")]
    DuplicateId(String),
    /// A task depends on an id not present in the task list.
    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency {
        /// The task with the dangling dependency.
        task: String,
        /// The missing id it depends on.
        dependency: String,
    },
    /// The dependency graph contains a cycle reachable from `task`.
    #[error("cycle detected involving task {0}")]
    Cycle(String),
}

/// Validates `tasks`: no duplicate ids, no references to unknown ids, and
/// no cycles (checked via DFS reachability; a back-edge into a node
/// currently on the DFS stack is a cycle).
///
/// # Errors
///
/// Returns the first [`GraphError`] found.
pub fn validate(tasks: &[TaskSpec]) -> Result<(), GraphError> {
    let mut seen = HashSet::new();
    for task in tasks {
        if !seen.insert(task.id.as_str()) {
            return Err(GraphError::DuplicateId(task.id.clone()));
        }
    }
    let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    for task in tasks {
        for dep in &task.dependencies {
            if !ids.contains(dep.as_str()) {
                return Err(GraphError::UnknownDependency { task: task.id.clone(), dependency: dep.clone() });
            }
        }
    }
    detect_cycles(tasks)
}

fn detect_cycles(tasks: &[TaskSpec]) -> Result<(), GraphError> {
    let deps: HashMap<&str, &[String]> = tasks.iter().map(|t| (t.id.as_str(), t.dependencies.as_slice())).collect();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_stack: HashSet<&str> = HashSet::new();

    fn visit<'a>(
        node: &'a str,
        deps: &HashMap<&'a str, &'a [String]>,
        visited: &mut HashSet<&'a str>,
        on_stack: &mut HashSet<&'a str>,
    ) -> Result<(), GraphError> {
        if on_stack.contains(node) {
            return Err(GraphError::Cycle(node.to_string()));
        }
        if visited.contains(node) {
            return Ok(());
        }
        on_stack.insert(node);
        if let Some(children) = deps.get(node) {
            for child in children.iter() {
                visit(child.as_str(), deps, visited, on_stack)?;
            }
        }
        on_stack.remove(node);
        visited.insert(node);
        Ok(())
    }

    for task in tasks {
        visit(task.id.as_str(), &deps, &mut visited, &mut on_stack)?;
    }
    Ok(())
}

/// Resolves a validated task list into execution layers by Kahn's
/// algorithm: layer 0 is every task with no dependencies; layer n+1 is
/// every remaining task whose dependencies are all already placed in a
/// layer ≤ n. Input order is preserved within each layer.
#[must_use]
pub fn layer(tasks: &[TaskSpec]) -> Vec<Vec<TaskSpec>> {
    let mut placed: HashSet<String> = HashSet::new();
    let mut remaining: Vec<&TaskSpec> = tasks.iter().collect();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&TaskSpec>, Vec<&TaskSpec>) =
            remaining.into_iter().partition(|t| t.dependencies.iter().all(|d| placed.contains(d)));
        if ready.is_empty() {
            // A validated, acyclic list can only get here if layering itself
            // is buggy; treat whatever remains as one final layer rather
            // than looping forever.
            layers.push(blocked.into_iter().cloned().collect());
            break;
        }
        for task in &ready {
            placed.insert(task.id.clone());
        }
        layers.push(ready.into_iter().cloned().collect());
        remaining = blocked;
    }
    layers
}
