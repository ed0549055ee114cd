// src/dag/cycle.rs

use std::collections::HashSet;
use std::sync::Arc;

use crate::dag::ScheduleNode;

/// Would making `dependant` wait on `dependency` close a cycle?
///
/// Edges point from a node to its dependants, so the new edge
/// `dependency -> dependant` closes a cycle exactly when `dependency` is
/// already reachable from `dependant`. A self-loop is always a cycle.
///
/// Callers hold the scheduler's graph lock, so no edge can be added while the
/// walk runs; edges removed concurrently by completing nodes can only shrink
/// the reachable set.
pub fn would_create_cycle(dependant: &Arc<ScheduleNode>, dependency: &Arc<ScheduleNode>) -> bool {
    if Arc::ptr_eq(dependant, dependency) {
        return true;
    }

    let mut stack: Vec<Arc<ScheduleNode>> = dependant.dependants_snapshot();
    if stack.is_empty() {
        return false;
    }

    let mut visited: HashSet<*const ScheduleNode> = HashSet::new();
    visited.insert(Arc::as_ptr(dependant));

    while let Some(node) = stack.pop() {
        if !visited.insert(Arc::as_ptr(&node)) {
            continue;
        }
        if Arc::ptr_eq(&node, dependency) {
            return true;
        }
        stack.extend(node.dependants_snapshot());
    }

    false
}
