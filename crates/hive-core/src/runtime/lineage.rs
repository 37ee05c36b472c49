// hive-core/src/runtime/lineage.rs
// ============================================================================
// Module: HiveForge Lineage Resolver
// Description: Breadth-first traversal of event causal parent references.
// Purpose: Answer "what led to this" and "what followed from this" queries.
// Dependencies: crate::core::events, std::collections
// ============================================================================

//! ## Overview
//! Events reference their causal parents via `parents`. The lineage resolver
//! walks that graph breadth-first in either direction (or both), bounded by
//! an optional depth limit, and reports whether the traversal was truncated
//! before exhausting the reachable set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;

use serde::Deserialize;
use serde::Serialize;

use crate::core::Event;
use crate::core::EventId;

/// Direction of lineage traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageDirection {
    /// Walk toward causal parents (what led to this event).
    Ancestors,
    /// Walk toward causal children (what followed from this event).
    Descendants,
    /// Walk in both directions.
    Both,
}

/// A lineage traversal request.
#[derive(Debug, Clone)]
pub struct LineageQuery {
    /// Event to start from.
    pub root: EventId,
    /// Traversal direction.
    pub direction: LineageDirection,
    /// Maximum BFS depth; `None` means unbounded.
    pub max_depth: Option<u32>,
}

/// Result of a lineage traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageResult {
    /// Event identifiers reached, in BFS discovery order. Does not include
    /// `root` itself.
    pub visited: Vec<EventId>,
    /// `true` if `max_depth` stopped the traversal before it exhausted the
    /// reachable set.
    pub truncated: bool,
}

/// Resolves a lineage query over a flat event slice.
///
/// `events` need not be sorted; an adjacency index is built once per call.
#[must_use]
pub fn resolve_lineage(events: &[Event], query: &LineageQuery) -> LineageResult {
    let mut children: BTreeMap<EventId, Vec<EventId>> = BTreeMap::new();
    let mut parents_of: BTreeMap<EventId, Vec<EventId>> = BTreeMap::new();
    for event in events {
        parents_of.insert(event.id.clone(), event.parents.clone());
        for parent in &event.parents {
            children.entry(parent.clone()).or_default().push(event.id.clone());
        }
    }

    let mut visited_order = Vec::new();
    let mut seen: BTreeSet<EventId> = BTreeSet::new();
    seen.insert(query.root.clone());
    let mut queue: VecDeque<(EventId, u32)> = VecDeque::new();
    queue.push_back((query.root.clone(), 0));
    let mut truncated = false;

    while let Some((current, depth)) = queue.pop_front() {
        if let Some(max_depth) = query.max_depth {
            if depth >= max_depth {
                let has_more = match query.direction {
                    LineageDirection::Ancestors => parents_of.get(&current).is_some_and(|p| !p.is_empty()),
                    LineageDirection::Descendants => children.get(&current).is_some_and(|c| !c.is_empty()),
                    LineageDirection::Both => {
                        parents_of.get(&current).is_some_and(|p| !p.is_empty())
                            || children.get(&current).is_some_and(|c| !c.is_empty())
                    }
                };
                if has_more {
                    truncated = true;
                }
                continue;
            }
        }

        let mut neighbors: Vec<EventId> = Vec::new();
        if matches!(query.direction, LineageDirection::Ancestors | LineageDirection::Both) {
            if let Some(parents) = parents_of.get(&current) {
                neighbors.extend(parents.iter().cloned());
            }
        }
        if matches!(query.direction, LineageDirection::Descendants | LineageDirection::Both) {
            if let Some(kids) = children.get(&current) {
                neighbors.extend(kids.iter().cloned());
            }
        }

        for neighbor in neighbors {
            if seen.insert(neighbor.clone()) {
                visited_order.push(neighbor.clone());
                queue.push_back((neighbor, depth + 1));
            }
        }
    }

    LineageResult { visited: visited_order, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Actor;
    use crate::core::EventType;
    use crate::core::NewEvent;
    use crate::core::Timestamp;

    fn evt(id: &str, parents: &[&str]) -> Event {
        Event::new(
            EventId::new(id),
            NewEvent {
                event_type: EventType::TaskProgressed,
                timestamp: Timestamp::from_unix_millis(0),
                actor: Actor::System { subsystem: "test".into() },
                run_id: None,
                task_id: None,
                colony_id: None,
                requirement_id: None,
                payload: serde_json::json!({}),
                parents: parents.iter().map(|p| EventId::new(*p)).collect(),
                prev_hash: None,
            },
        )
        .expect("construct")
    }

    #[test]
    fn ancestors_walk_back_through_parents() {
        let events = vec![evt("a", &[]), evt("b", &["a"]), evt("c", &["b"])];
        let result = resolve_lineage(
            &events,
            &LineageQuery { root: EventId::new("c"), direction: LineageDirection::Ancestors, max_depth: None },
        );
        assert_eq!(result.visited, vec![EventId::new("b"), EventId::new("a")]);
        assert!(!result.truncated);
    }

    #[test]
    fn descendants_walk_forward_through_children() {
        let events = vec![evt("a", &[]), evt("b", &["a"]), evt("c", &["a"])];
        let result = resolve_lineage(
            &events,
            &LineageQuery { root: EventId::new("a"), direction: LineageDirection::Descendants, max_depth: None },
        );
        assert_eq!(result.visited.len(), 2);
        assert!(!result.truncated);
    }

    #[test]
    fn max_depth_truncates_and_reports_it() {
        let events = vec![evt("a", &[]), evt("b", &["a"]), evt("c", &["b"])];
        let result = resolve_lineage(
            &events,
            &LineageQuery { root: EventId::new("c"), direction: LineageDirection::Ancestors, max_depth: Some(1) },
        );
        assert_eq!(result.visited, vec![EventId::new("b")]);
        assert!(result.truncated);
    }
}
