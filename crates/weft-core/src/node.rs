//! The seam between the relation engine and the system that owns the nodes.
//!
//! The engine never stores node attributes. Everything it needs from a node
//! (its project, its dates, the ability to push a new start date) goes
//! through [`NodeStore`]. [`MemoryNodeStore`] is the in-process
//! implementation used by tests and ephemeral graphs.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::error::RelationError;
use crate::relation::{NodeId, ProjectId};

/// Scheduling dates of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeDates {
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// Node attributes the engine consults, owned elsewhere.
pub trait NodeStore {
    /// The project a node belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`RelationError::NodeNotFound`] for unknown nodes.
    fn project_of(&self, node: NodeId) -> Result<ProjectId, RelationError>;

    /// The node's scheduling dates.
    ///
    /// # Errors
    ///
    /// Returns [`RelationError::NodeNotFound`] for unknown nodes.
    fn dates_of(&self, node: NodeId) -> Result<NodeDates, RelationError>;

    /// Ask the owner to move `node` so it starts no earlier than `not_before`.
    ///
    /// This crosses into foreign state, so it reports failures through
    /// `anyhow` rather than [`RelationError`]; the engine surfaces them
    /// without rolling back the relation that triggered the move.
    ///
    /// # Errors
    ///
    /// Returns an error if the owning system rejects the reschedule.
    fn reschedule_after(&mut self, node: NodeId, not_before: NaiveDate) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryNodeStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MemoryNode {
    project: ProjectId,
    dates: NodeDates,
}

/// Hash-map node store. Rescheduling preserves a node's duration: when the
/// start moves forward, the due date shifts by the same number of days.
#[derive(Debug, Clone, Default)]
pub struct MemoryNodeStore {
    nodes: HashMap<NodeId, MemoryNode>,
}

impl MemoryNodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NodeId, project: ProjectId) {
        self.insert_with_dates(node, project, NodeDates::default());
    }

    pub fn insert_with_dates(&mut self, node: NodeId, project: ProjectId, dates: NodeDates) {
        self.nodes.insert(node, MemoryNode { project, dates });
    }

    /// Overwrite a node's dates, if the node exists.
    pub fn set_dates(&mut self, node: NodeId, dates: NodeDates) {
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.dates = dates;
        }
    }
}

impl NodeStore for MemoryNodeStore {
    fn project_of(&self, node: NodeId) -> Result<ProjectId, RelationError> {
        self.nodes
            .get(&node)
            .map(|entry| entry.project)
            .ok_or(RelationError::NodeNotFound(node))
    }

    fn dates_of(&self, node: NodeId) -> Result<NodeDates, RelationError> {
        self.nodes
            .get(&node)
            .map(|entry| entry.dates)
            .ok_or(RelationError::NodeNotFound(node))
    }

    fn reschedule_after(&mut self, node: NodeId, not_before: NaiveDate) -> anyhow::Result<()> {
        let entry = self
            .nodes
            .get_mut(&node)
            .ok_or(RelationError::NodeNotFound(node))?;

        let starts_early = entry.dates.start_date.is_none_or(|start| start < not_before);
        if !starts_early {
            return Ok(());
        }

        let duration = match (entry.dates.start_date, entry.dates.due_date) {
            (Some(start), Some(due)) => Some(due - start),
            _ => None,
        };
        entry.dates.start_date = Some(not_before);
        if let Some(duration) = duration {
            entry.dates.due_date = Some(not_before + duration);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn unknown_nodes_are_reported() {
        let store = MemoryNodeStore::new();
        assert!(matches!(
            store.project_of(9),
            Err(RelationError::NodeNotFound(9))
        ));
        assert!(matches!(
            store.dates_of(9),
            Err(RelationError::NodeNotFound(9))
        ));
    }

    #[test]
    fn reschedule_moves_start_and_preserves_duration() {
        let mut store = MemoryNodeStore::new();
        store.insert_with_dates(
            1,
            10,
            NodeDates {
                start_date: Some(date(2026, 3, 1)),
                due_date: Some(date(2026, 3, 5)),
            },
        );

        store
            .reschedule_after(1, date(2026, 3, 10))
            .expect("reschedule");

        let dates = store.dates_of(1).expect("dates");
        assert_eq!(dates.start_date, Some(date(2026, 3, 10)));
        assert_eq!(dates.due_date, Some(date(2026, 3, 14)));
    }

    #[test]
    fn reschedule_is_a_no_op_when_already_late_enough() {
        let mut store = MemoryNodeStore::new();
        store.insert_with_dates(
            1,
            10,
            NodeDates {
                start_date: Some(date(2026, 3, 20)),
                due_date: None,
            },
        );

        store
            .reschedule_after(1, date(2026, 3, 10))
            .expect("reschedule");
        assert_eq!(
            store.dates_of(1).expect("dates").start_date,
            Some(date(2026, 3, 20))
        );
    }

    #[test]
    fn reschedule_sets_start_on_undated_node() {
        let mut store = MemoryNodeStore::new();
        store.insert(1, 10);

        store
            .reschedule_after(1, date(2026, 3, 10))
            .expect("reschedule");

        let dates = store.dates_of(1).expect("dates");
        assert_eq!(dates.start_date, Some(date(2026, 3, 10)));
        assert_eq!(dates.due_date, None);
    }
}
