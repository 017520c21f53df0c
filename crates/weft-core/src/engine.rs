//! The relation engine: validated mutations and closure-backed queries.
//!
//! All writes funnel through [`RelationEngine::create`] and
//! [`RelationEngine::destroy`], which validate, normalize, and keep the
//! closure at its fixed point inside one store transaction. Reads are plain
//! indexed lookups against the materialized rows.

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tracing::{debug, info};

use crate::closure;
use crate::config::EngineConfig;
use crate::cycle;
use crate::db;
use crate::error::RelationError;
use crate::node::NodeStore;
use crate::rebuild::{self, RebuildStats};
use crate::registry::{KindRegistry, RelationKind};
use crate::relation::{EdgeKind, NodeId, Relation, RelationId};
use crate::schedule::{self, ScheduleOutcome};
use crate::visibility::VisibilityFilter;

/// Result of a mutation: the stored (normalized) relation and what date
/// propagation did to the successor, if anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub relation: Relation,
    pub schedule: ScheduleOutcome,
}

pub struct RelationEngine<S: NodeStore> {
    conn: Connection,
    registry: KindRegistry,
    config: EngineConfig,
    nodes: S,
}

impl<S: NodeStore> RelationEngine<S> {
    /// Open (or create) the relation store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or migrated.
    pub fn open(path: &Path, config: EngineConfig, nodes: S) -> anyhow::Result<Self> {
        let conn = db::open_store(path)?;
        Ok(Self::from_connection(conn, KindRegistry::standard(), config, nodes))
    }

    /// Open an in-memory engine, for tests and ephemeral graphs.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or migrated.
    pub fn open_in_memory(config: EngineConfig, nodes: S) -> anyhow::Result<Self> {
        let conn = db::open_in_memory()?;
        Ok(Self::from_connection(conn, KindRegistry::standard(), config, nodes))
    }

    /// Assemble an engine from parts. The connection must already be
    /// migrated.
    pub fn from_connection(
        conn: Connection,
        registry: KindRegistry,
        config: EngineConfig,
        nodes: S,
    ) -> Self {
        Self {
            conn,
            registry,
            config,
            nodes,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    #[must_use]
    pub fn nodes(&self) -> &S {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut S {
        &mut self.nodes
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Create a direct relation of `kind` from `from` to `to`.
    ///
    /// Non-canonical kinds are normalized before storage: `b follows a`
    /// becomes `a precedes b`, and the outcome carries the normalized edge.
    /// `delay` applies only to `precedes` edges, where it defaults to 0; it
    /// is ignored on every other kind.
    ///
    /// The edge and its closure extension commit together. Date propagation
    /// runs after the commit; a propagation failure surfaces in the outcome
    /// and leaves the relation in place.
    ///
    /// # Errors
    ///
    /// Returns a [`RelationError`] describing the first failed validation,
    /// or a store error. Nothing is written on any error.
    pub fn create(
        &mut self,
        from: NodeId,
        to: NodeId,
        kind: RelationKind,
        delay: Option<i64>,
    ) -> Result<CreateOutcome, RelationError> {
        // Normalize direction first so every later check sees the stored
        // orientation.
        let (from, to, kind) = match self.registry.canonical_reverse(kind) {
            Some(canonical) => (to, from, canonical),
            None => (from, to, kind),
        };

        if from == to {
            return Err(RelationError::SelfRelation(from));
        }
        let delay = if kind == RelationKind::Precedes {
            let delay = delay.unwrap_or(0);
            if delay < 0 {
                return Err(RelationError::InvalidDelay { delay });
            }
            Some(delay)
        } else {
            None
        };

        let from_project = self.nodes.project_of(from)?;
        let to_project = self.nodes.project_of(to)?;
        if !self.config.cross_project_relations && from_project != to_project {
            return Err(RelationError::CrossProjectNotAllowed { from, to });
        }

        let tx = self.conn.transaction()?;

        if direct_row_exists(&tx, from, to)? {
            return Err(RelationError::DuplicateRelation { from, to });
        }
        if kind == RelationKind::Hierarchy {
            // A node has at most one hierarchy parent.
            if let Some(parent) = direct_parent(&tx, to)? {
                return Err(RelationError::ParentExists { node: to, parent });
            }
        } else if shares_hierarchy(&tx, from, to)? {
            return Err(RelationError::SharedHierarchyConflict { from, to });
        }
        if cycle::would_cycle(&tx, from, to)? {
            return Err(RelationError::CycleDetected { from, to });
        }

        let relation = closure::insert_edge(&tx, from, to, EdgeKind::Single(kind), delay)?;
        tx.commit()?;
        info!(
            relation_id = relation.id,
            from,
            to,
            kind = %kind,
            "relation created"
        );

        let schedule = if self.config.propagate_dates {
            schedule::propagate_edge(&mut self.nodes, &relation)?
        } else {
            ScheduleOutcome::NotApplicable
        };
        Ok(CreateOutcome { relation, schedule })
    }

    /// Destroy a direct relation and shrink the closure accordingly.
    ///
    /// # Errors
    ///
    /// Returns [`RelationError::NotDirect`] for derived rows; only direct
    /// edges may be destroyed.
    pub fn destroy(&mut self, id: RelationId) -> Result<Relation, RelationError> {
        let relation = self.get(id)?;
        if !relation.is_direct() {
            return Err(RelationError::NotDirect(id));
        }

        let tx = self.conn.transaction()?;
        closure::remove_edge(&tx, &relation)?;
        tx.commit()?;
        info!(
            relation_id = id,
            from = relation.from,
            to = relation.to,
            "relation destroyed"
        );
        Ok(relation)
    }

    /// Change the delay of a direct `precedes` relation and re-propagate.
    ///
    /// # Errors
    ///
    /// Returns [`RelationError::DelayNotApplicable`] unless the relation is
    /// a direct `precedes` edge, or [`RelationError::InvalidDelay`] for a
    /// negative delay.
    pub fn set_delay(&mut self, id: RelationId, delay: i64) -> Result<CreateOutcome, RelationError> {
        let mut relation = self.get(id)?;
        if !relation.is_direct() || relation.kind != EdgeKind::Single(RelationKind::Precedes) {
            return Err(RelationError::DelayNotApplicable(id));
        }
        if delay < 0 {
            return Err(RelationError::InvalidDelay { delay });
        }

        self.conn.execute(
            "UPDATE relations SET delay = ?1 WHERE relation_id = ?2",
            params![delay, id],
        )?;
        relation.delay = Some(delay);
        debug!(relation_id = id, delay, "relation delay updated");

        let schedule = if self.config.propagate_dates {
            schedule::propagate_edge(&mut self.nodes, &relation)?
        } else {
            ScheduleOutcome::NotApplicable
        };
        Ok(CreateOutcome { relation, schedule })
    }

    /// Re-run date propagation for every direct `precedes` edge leaving
    /// `node`. Callers chase a returned [`ScheduleOutcome::Requested`] by
    /// propagating from the moved node if they want the wave to continue.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the node store fails.
    pub fn propagate_dates_from(
        &mut self,
        node: NodeId,
    ) -> Result<Vec<(RelationId, ScheduleOutcome)>, RelationError> {
        let successors = self.query_relations(
            "SELECT {cols} FROM relations
             WHERE from_id = ?1 AND depth = 1 AND kind = 'precedes'
             ORDER BY relation_id",
            params![node],
        )?;

        let mut outcomes = Vec::with_capacity(successors.len());
        for relation in successors {
            let outcome = schedule::propagate_edge(&mut self.nodes, &relation)?;
            outcomes.push((relation.id, outcome));
        }
        Ok(outcomes)
    }

    /// Rebuild every derived row from the direct edges. See
    /// [`rebuild::rebuild`].
    ///
    /// # Errors
    ///
    /// Returns [`RelationError::UnrecoverableCycle`] or a store error; the
    /// store is untouched on failure.
    pub fn rebuild_closure(&mut self) -> Result<RebuildStats, RelationError> {
        rebuild::rebuild(&mut self.conn)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Fetch one relation row by id.
    ///
    /// # Errors
    ///
    /// Returns [`RelationError::RelationNotFound`] for unknown ids.
    pub fn get(&self, id: RelationId) -> Result<Relation, RelationError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM relations WHERE relation_id = ?1",
                    Relation::COLUMNS
                ),
                [id],
                Relation::from_row,
            )
            .optional()?
            .ok_or(RelationError::RelationNotFound(id))
    }

    /// Direct non-hierarchy relations touching `node`, sorted by the display
    /// order of the kind as seen from `node`'s side. Hierarchy edges are
    /// exposed through [`RelationEngine::parent`] and
    /// [`RelationEngine::children`] instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn relations_of(&self, node: NodeId) -> Result<Vec<Relation>, RelationError> {
        let mut rows = self.query_relations(
            "SELECT {cols} FROM relations
             WHERE (from_id = ?1 OR to_id = ?1) AND depth = 1 AND kind <> 'hierarchy'",
            params![node],
        )?;
        rows.sort_by_key(|relation| {
            let order = relation
                .relation_type_for(&self.registry, node)
                .and_then(|kind| self.registry.order(kind))
                .unwrap_or(u8::MAX);
            (order, relation.id)
        });
        Ok(rows)
    }

    /// Every direct edge touching `node`, hierarchy included, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn direct_relations(&self, node: NodeId) -> Result<Vec<Relation>, RelationError> {
        self.query_relations(
            "SELECT {cols} FROM relations
             WHERE (from_id = ?1 OR to_id = ?1) AND depth = 1
             ORDER BY relation_id",
            params![node],
        )
    }

    /// Like [`RelationEngine::relations_of`], keeping only rows where
    /// `principal` may see both endpoints. When `node` itself is invisible
    /// to `principal`, no relation of it is either.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn visible_relations_of<F: VisibilityFilter>(
        &self,
        node: NodeId,
        principal: &str,
        filter: &F,
    ) -> Result<Vec<Relation>, RelationError> {
        if !filter.is_visible(node, principal) {
            return Ok(Vec::new());
        }
        let mut rows = self.relations_of(node)?;
        rows.retain(|relation| filter.is_visible(relation.other_node(node), principal));
        Ok(rows)
    }

    /// The direct relation between two nodes, in either orientation.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn relation_between(
        &self,
        a: NodeId,
        b: NodeId,
    ) -> Result<Option<Relation>, RelationError> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM relations
                     WHERE depth = 1
                       AND ((from_id = ?1 AND to_id = ?2) OR (from_id = ?2 AND to_id = ?1))",
                    Relation::COLUMNS
                ),
                params![a, b],
                Relation::from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// The stored row from `from` to `to` at any depth: direct, derived, or
    /// reflexive.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn path_between(
        &self,
        from: NodeId,
        to: NodeId,
    ) -> Result<Option<Relation>, RelationError> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM relations WHERE from_id = ?1 AND to_id = ?2",
                    Relation::COLUMNS
                ),
                params![from, to],
                Relation::from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Is there any path from `from` to `to`, of any kind?
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn in_closure(&self, from: NodeId, to: NodeId) -> Result<bool, RelationError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM relations
                WHERE from_id = ?1 AND to_id = ?2 AND depth >= 1
            )",
            params![from, to],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Hierarchy ancestors of `node`, nearest first. Pairs are matched on
    /// their hierarchy reachability, so an ancestor stays one even when a
    /// shorter path through other kinds owns the stored row.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn ancestors(&self, node: NodeId) -> Result<Vec<Relation>, RelationError> {
        self.query_relations(
            "SELECT {cols} FROM relations
             WHERE to_id = ?1 AND hier_depth >= 1
             ORDER BY hier_depth, from_id",
            params![node],
        )
    }

    /// Hierarchy descendants of `node`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn descendants(&self, node: NodeId) -> Result<Vec<Relation>, RelationError> {
        self.query_relations(
            "SELECT {cols} FROM relations
             WHERE from_id = ?1 AND hier_depth >= 1
             ORDER BY hier_depth, to_id",
            params![node],
        )
    }

    /// Direct hierarchy children of `node`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>, RelationError> {
        let mut stmt = self.conn.prepare(
            "SELECT to_id FROM relations
             WHERE from_id = ?1 AND depth = 1 AND kind = 'hierarchy'
             ORDER BY to_id",
        )?;
        let children = stmt
            .query_map([node], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(children)
    }

    /// The direct hierarchy parent of `node`, if any. At most one exists;
    /// [`RelationEngine::create`] rejects a second hierarchy in-edge.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>, RelationError> {
        direct_parent(&self.conn, node)
    }

    /// Is `node` anywhere below `ancestor` in the hierarchy?
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> Result<bool, RelationError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM relations
                WHERE from_id = ?1 AND to_id = ?2 AND hier_depth >= 1
            )",
            params![ancestor, node],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Does `node` have a hierarchy parent?
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn is_child(&self, node: NodeId) -> Result<bool, RelationError> {
        Ok(self.parent(node)?.is_some())
    }

    /// Does `node` have no hierarchy children?
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn is_leaf(&self, node: NodeId) -> Result<bool, RelationError> {
        Ok(self.children(node)?.is_empty())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn query_relations(
        &self,
        sql_template: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Relation>, RelationError> {
        let sql = sql_template.replace("{cols}", Relation::COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, Relation::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn direct_row_exists(conn: &Connection, from: NodeId, to: NodeId) -> Result<bool, RelationError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM relations
            WHERE from_id = ?1 AND to_id = ?2 AND depth = 1
        )",
        params![from, to],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn direct_parent(conn: &Connection, node: NodeId) -> Result<Option<NodeId>, RelationError> {
    let parent = conn
        .query_row(
            "SELECT from_id FROM relations
             WHERE to_id = ?1 AND depth = 1 AND kind = 'hierarchy'",
            [node],
            |row| row.get(0),
        )
        .optional()?;
    Ok(parent)
}

/// Are the nodes connected by a pure hierarchy path, in either direction?
/// Matches on hierarchy reachability rather than the stored kind, so a row
/// whose kind a shorter foreign-kind path owns still counts.
fn shares_hierarchy(conn: &Connection, a: NodeId, b: NodeId) -> Result<bool, RelationError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM relations
            WHERE hier_depth >= 1
              AND ((from_id = ?1 AND to_id = ?2) OR (from_id = ?2 AND to_id = ?1))
        )",
        params![a, b],
        |row| row.get(0),
    )?;
    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::MemoryNodeStore;
    use crate::visibility::AllowList;

    fn engine() -> RelationEngine<MemoryNodeStore> {
        let mut nodes = MemoryNodeStore::new();
        for id in 1..=8 {
            nodes.insert(id, 10);
        }
        nodes.insert(99, 20); // a node in another project
        RelationEngine::open_in_memory(EngineConfig::default(), nodes).expect("open engine")
    }

    fn create(
        engine: &mut RelationEngine<MemoryNodeStore>,
        from: NodeId,
        to: NodeId,
        kind: RelationKind,
    ) -> Relation {
        engine.create(from, to, kind, None).expect("create").relation
    }

    #[test]
    fn create_normalizes_non_canonical_kinds() {
        let mut engine = engine();
        let stored = create(&mut engine, 2, 1, RelationKind::Follows);

        assert_eq!(stored.from, 1);
        assert_eq!(stored.to, 2);
        assert_eq!(stored.kind, EdgeKind::Single(RelationKind::Precedes));
        // The follows view is reconstructed from node 2's side.
        assert_eq!(
            stored.relation_type_for(engine.registry(), 2),
            Some(RelationKind::Follows)
        );
    }

    #[test]
    fn precedes_defaults_delay_to_zero() {
        let mut engine = engine();
        let stored = create(&mut engine, 1, 2, RelationKind::Precedes);
        assert_eq!(stored.delay, Some(0));

        let other = create(&mut engine, 3, 4, RelationKind::Blocks);
        assert_eq!(other.delay, None);
    }

    #[test]
    fn self_relation_is_rejected() {
        let mut engine = engine();
        let err = engine
            .create(1, 1, RelationKind::Relates, None)
            .expect_err("must fail");
        assert!(matches!(err, RelationError::SelfRelation(1)));
    }

    #[test]
    fn negative_delay_is_rejected() {
        let mut engine = engine();
        let err = engine
            .create(1, 2, RelationKind::Precedes, Some(-3))
            .expect_err("must fail");
        assert!(matches!(err, RelationError::InvalidDelay { delay: -3 }));
    }

    #[test]
    fn cross_project_is_rejected_by_default() {
        let mut engine = engine();
        let err = engine
            .create(1, 99, RelationKind::Relates, None)
            .expect_err("must fail");
        assert!(matches!(
            err,
            RelationError::CrossProjectNotAllowed { from: 1, to: 99 }
        ));
    }

    #[test]
    fn cross_project_can_be_enabled() {
        let mut nodes = MemoryNodeStore::new();
        nodes.insert(1, 10);
        nodes.insert(99, 20);
        let config = EngineConfig {
            cross_project_relations: true,
            ..EngineConfig::default()
        };
        let mut engine = RelationEngine::open_in_memory(config, nodes).expect("open engine");

        engine
            .create(1, 99, RelationKind::Relates, None)
            .expect("cross-project relation allowed");
    }

    #[test]
    fn unknown_node_is_rejected() {
        let mut engine = engine();
        let err = engine
            .create(1, 1000, RelationKind::Relates, None)
            .expect_err("must fail");
        assert!(matches!(err, RelationError::NodeNotFound(1000)));
    }

    #[test]
    fn duplicate_pair_is_rejected() {
        let mut engine = engine();
        create(&mut engine, 1, 2, RelationKind::Relates);

        let err = engine
            .create(1, 2, RelationKind::Blocks, None)
            .expect_err("must fail");
        assert!(matches!(
            err,
            RelationError::DuplicateRelation { from: 1, to: 2 }
        ));
    }

    #[test]
    fn relating_within_a_shared_hierarchy_is_rejected() {
        let mut engine = engine();
        create(&mut engine, 1, 2, RelationKind::Hierarchy);
        create(&mut engine, 2, 3, RelationKind::Hierarchy);

        let err = engine
            .create(3, 1, RelationKind::Blocks, None)
            .expect_err("must fail");
        assert!(matches!(
            err,
            RelationError::SharedHierarchyConflict { from: 3, to: 1 }
        ));
    }

    #[test]
    fn cycle_is_rejected_and_closure_unchanged() {
        let mut engine = engine();
        create(&mut engine, 1, 2, RelationKind::Blocks);
        create(&mut engine, 2, 3, RelationKind::Blocks);

        let err = engine
            .create(3, 1, RelationKind::Relates, None)
            .expect_err("must fail");
        assert!(matches!(
            err,
            RelationError::CycleDetected { from: 3, to: 1 }
        ));

        // Nothing leaked into the closure.
        assert!(!engine.in_closure(3, 1).expect("query"));
        assert!(engine.in_closure(1, 3).expect("query"));
    }

    #[test]
    fn destroy_rejects_derived_rows() {
        let mut engine = engine();
        create(&mut engine, 1, 2, RelationKind::Blocks);
        create(&mut engine, 2, 3, RelationKind::Blocks);

        let composed = engine.path_between(1, 3).expect("query").expect("row");
        assert!(composed.is_closure());

        let err = engine.destroy(composed.id).expect_err("must fail");
        assert!(matches!(err, RelationError::NotDirect(_)));
        // The derived row survives the rejected destroy.
        assert!(engine.in_closure(1, 3).expect("query"));
    }

    #[test]
    fn destroy_removes_edge_and_dependent_closure_rows() {
        let mut engine = engine();
        create(&mut engine, 1, 2, RelationKind::Blocks);
        let middle = create(&mut engine, 2, 3, RelationKind::Blocks);
        assert!(engine.in_closure(1, 3).expect("query"));

        let destroyed = engine.destroy(middle.id).expect("destroy");
        assert_eq!(destroyed.id, middle.id);
        assert!(!engine.in_closure(1, 3).expect("query"));
        assert!(engine.in_closure(1, 2).expect("query"));

        let err = engine.destroy(middle.id).expect_err("already gone");
        assert!(matches!(err, RelationError::RelationNotFound(_)));
    }

    #[test]
    fn set_delay_updates_and_validates() {
        let mut engine = engine();
        let precedes = create(&mut engine, 1, 2, RelationKind::Precedes);
        let blocks = create(&mut engine, 3, 4, RelationKind::Blocks);

        let updated = engine.set_delay(precedes.id, 5).expect("set delay");
        assert_eq!(updated.relation.delay, Some(5));
        assert_eq!(engine.get(precedes.id).expect("get").delay, Some(5));

        let err = engine.set_delay(blocks.id, 5).expect_err("must fail");
        assert!(matches!(err, RelationError::DelayNotApplicable(_)));

        let err = engine.set_delay(precedes.id, -1).expect_err("must fail");
        assert!(matches!(err, RelationError::InvalidDelay { delay: -1 }));
    }

    #[test]
    fn relations_of_sorts_by_viewpoint_order() {
        let mut engine = engine();
        // From node 2's viewpoint: 1 -> 2 precedes reads as follows (7),
        // 2 -> 3 blocks reads as blocks (4), 4 -> 2 duplicates reads as
        // duplicated_by (3).
        create(&mut engine, 1, 2, RelationKind::Precedes);
        create(&mut engine, 2, 3, RelationKind::Blocks);
        create(&mut engine, 4, 2, RelationKind::Duplicates);

        let rows = engine.relations_of(2).expect("query");
        let labels: Vec<&str> = rows
            .iter()
            .map(|r| r.label_for(engine.registry(), 2))
            .collect();
        assert_eq!(labels, vec!["duplicated_by", "blocks", "follows"]);
    }

    #[test]
    fn relations_of_excludes_hierarchy_edges() {
        let mut engine = engine();
        create(&mut engine, 1, 2, RelationKind::Hierarchy);
        create(&mut engine, 2, 3, RelationKind::Blocks);

        let rows = engine.relations_of(2).expect("query");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, EdgeKind::Single(RelationKind::Blocks));

        // direct_relations sees both.
        assert_eq!(engine.direct_relations(2).expect("query").len(), 2);
    }

    #[test]
    fn visible_relations_respect_the_filter() {
        let mut engine = engine();
        create(&mut engine, 1, 2, RelationKind::Relates);
        create(&mut engine, 2, 3, RelationKind::Blocks);

        let mut filter = AllowList::new();
        filter.grant("alice", 1);
        filter.grant("alice", 2);
        // Node 3 not granted.

        let rows = engine
            .visible_relations_of(2, "alice", &filter)
            .expect("query");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].other_node(2), 1);

        // Both endpoints must be visible: bob sees the far endpoints but
        // not node 2 itself, so nothing is reported.
        filter.grant("bob", 1);
        filter.grant("bob", 3);
        let rows = engine
            .visible_relations_of(2, "bob", &filter)
            .expect("query");
        assert!(rows.is_empty());
    }

    #[test]
    fn hierarchy_queries() {
        let mut engine = engine();
        create(&mut engine, 1, 2, RelationKind::Hierarchy);
        create(&mut engine, 1, 3, RelationKind::Hierarchy);
        create(&mut engine, 2, 4, RelationKind::Hierarchy);

        assert_eq!(engine.parent(4).expect("parent"), Some(2));
        assert_eq!(engine.parent(1).expect("parent"), None);
        assert_eq!(engine.children(1).expect("children"), vec![2, 3]);
        assert!(engine.is_descendant_of(4, 1).expect("query"));
        assert!(!engine.is_descendant_of(3, 2).expect("query"));
        assert!(engine.is_leaf(4).expect("query"));
        assert!(!engine.is_leaf(1).expect("query"));
        assert!(engine.is_child(2).expect("query"));
        assert!(!engine.is_child(1).expect("query"));

        let ancestors: Vec<NodeId> = engine
            .ancestors(4)
            .expect("ancestors")
            .iter()
            .map(|r| r.from)
            .collect();
        assert_eq!(ancestors, vec![2, 1]);

        let descendants: Vec<NodeId> = engine
            .descendants(1)
            .expect("descendants")
            .iter()
            .map(|r| r.to)
            .collect();
        assert_eq!(descendants, vec![2, 3, 4]);
    }

    #[test]
    fn hierarchy_ancestry_survives_shorter_foreign_path() {
        let mut engine = engine();
        create(&mut engine, 1, 2, RelationKind::Hierarchy);
        create(&mut engine, 2, 3, RelationKind::Hierarchy);
        create(&mut engine, 3, 4, RelationKind::Hierarchy);
        // A two-hop blocks route shortens the stored (1, 4) row.
        create(&mut engine, 1, 5, RelationKind::Blocks);
        create(&mut engine, 5, 4, RelationKind::Blocks);

        let ancestors: Vec<NodeId> = engine
            .ancestors(4)
            .expect("ancestors")
            .iter()
            .map(|r| r.from)
            .collect();
        assert_eq!(ancestors, vec![3, 2, 1]);
        assert!(engine.is_descendant_of(4, 1).expect("query"));

        // Relating a node to its own ancestor stays forbidden.
        let err = engine
            .create(1, 4, RelationKind::Relates, None)
            .expect_err("must fail");
        assert!(matches!(
            err,
            RelationError::SharedHierarchyConflict { from: 1, to: 4 }
        ));
    }

    #[test]
    fn second_hierarchy_parent_is_rejected() {
        let mut engine = engine();
        create(&mut engine, 1, 3, RelationKind::Hierarchy);

        let err = engine
            .create(2, 3, RelationKind::Hierarchy, None)
            .expect_err("must fail");
        assert!(matches!(
            err,
            RelationError::ParentExists { node: 3, parent: 1 }
        ));
        assert_eq!(engine.parent(3).expect("parent"), Some(1));

        // Re-parenting works once the old edge is gone.
        let old = engine.relation_between(1, 3).expect("query").expect("row");
        engine.destroy(old.id).expect("destroy");
        create(&mut engine, 2, 3, RelationKind::Hierarchy);
        assert_eq!(engine.parent(3).expect("parent"), Some(2));
    }

    #[test]
    fn relation_between_sees_both_orientations() {
        let mut engine = engine();
        let stored = create(&mut engine, 1, 2, RelationKind::Blocks);

        let found = engine.relation_between(2, 1).expect("query").expect("row");
        assert_eq!(found.id, stored.id);
        assert!(engine.relation_between(1, 3).expect("query").is_none());
    }
}
