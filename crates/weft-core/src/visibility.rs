//! Principal-scoped filtering of relation queries.
//!
//! The engine stores relations for every node; which nodes a given principal
//! may see is the embedding system's business. Queries that take a principal
//! go through a [`VisibilityFilter`] and return only rows whose far endpoint
//! is visible.

use crate::relation::NodeId;

/// Decides whether a principal may see a node.
pub trait VisibilityFilter {
    fn is_visible(&self, node: NodeId, principal: &str) -> bool;
}

/// Every node is visible to every principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllVisible;

impl VisibilityFilter for AllVisible {
    fn is_visible(&self, _node: NodeId, _principal: &str) -> bool {
        true
    }
}

/// Static allow-list: a principal sees exactly the nodes granted to them.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    grants: std::collections::HashMap<String, std::collections::HashSet<NodeId>>,
}

impl AllowList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, principal: &str, node: NodeId) {
        self.grants
            .entry(principal.to_owned())
            .or_default()
            .insert(node);
    }
}

impl VisibilityFilter for AllowList {
    fn is_visible(&self, node: NodeId, principal: &str) -> bool {
        self.grants
            .get(principal)
            .is_some_and(|nodes| nodes.contains(&node))
    }
}
