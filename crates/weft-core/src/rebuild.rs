//! Bulk reconstruction of the closure from the direct edges alone.
//!
//! Used after imports or when the derived rows are suspect. Direct edges are
//! the source of truth: every `depth != 1` row is dropped and re-derived by
//! iterative deepening, joining depth-`d` rows against direct edges until a
//! fixed point. Edge data that predates the cycle guard may contain cycles;
//! each detected cycle is repaired by removing one non-hierarchy direct edge
//! among the offending nodes and restarting. A cycle that only hierarchy
//! edges sustain cannot be repaired automatically and fails the whole
//! reconstruction, rolling back every change.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::cycle;
use crate::error::RelationError;
use crate::relation::NodeId;

/// Outcome counters for one reconstruction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RebuildStats {
    /// Deepest composition reached.
    pub max_depth: i64,
    /// Derived (`depth > 1`) rows present after the run.
    pub derived_rows: i64,
    /// Direct edges removed to break cycles.
    pub removed_edges: i64,
    /// Times derivation restarted after a repair.
    pub restarts: i64,
}

/// Rebuild every derived row from the direct edges, repairing cycles where
/// possible.
///
/// Runs in a single transaction; on any error, including
/// [`RelationError::UnrecoverableCycle`], the store is left untouched.
///
/// # Errors
///
/// Returns [`RelationError::UnrecoverableCycle`] when a cycle survives after
/// every removable non-hierarchy edge among its nodes is gone, or a store
/// error if a statement fails.
pub fn rebuild(conn: &mut Connection) -> Result<RebuildStats, RelationError> {
    let tx = conn.transaction()?;
    let mut stats = RebuildStats::default();

    'restart: loop {
        tx.execute("DELETE FROM relations WHERE depth <> 1", [])?;
        tx.execute(
            "UPDATE relations
             SET hier_depth = CASE WHEN kind = 'hierarchy' THEN 1 ELSE NULL END
             WHERE depth = 1",
            [],
        )?;
        seed_reflexive_rows(&tx)?;

        let mut depth = 1;
        loop {
            let pairs = cycle::circular_pairs(&tx, depth)?;
            if !pairs.is_empty() {
                if remove_one_cycle_edge(&tx, &pairs)? {
                    stats.removed_edges += 1;
                    stats.restarts += 1;
                    continue 'restart;
                }
                return Err(RelationError::UnrecoverableCycle { pairs });
            }

            let inserted = derive_next_depth(&tx, depth)?;
            if inserted == 0 {
                stats.max_depth = depth;
                break;
            }
            depth += 1;
        }

        break;
    }

    derive_hierarchy_depths(&tx)?;

    stats.derived_rows =
        tx.query_row("SELECT COUNT(*) FROM relations WHERE depth > 1", [], |row| {
            row.get(0)
        })?;
    tx.execute(
        "UPDATE relation_meta SET last_rebuild_at_us = ?1 WHERE id = 1",
        [chrono::Utc::now().timestamp_micros()],
    )?;
    tx.commit()?;

    info!(
        max_depth = stats.max_depth,
        derived_rows = stats.derived_rows,
        removed_edges = stats.removed_edges,
        "closure rebuilt"
    );
    Ok(stats)
}

/// One self row per node that any direct edge touches.
fn seed_reflexive_rows(conn: &Connection) -> Result<(), RelationError> {
    conn.execute_batch(
        "INSERT OR IGNORE INTO relations (from_id, to_id, kind, depth, hier_depth)
         SELECT from_id, from_id, 'self', 0, 0 FROM relations WHERE depth = 1;
         INSERT OR IGNORE INTO relations (from_id, to_id, kind, depth, hier_depth)
         SELECT to_id, to_id, 'self', 0, 0 FROM relations WHERE depth = 1;",
    )?;
    Ok(())
}

/// Iterative deepening over the hierarchy edges alone, assigning each pair
/// the length of its shortest pure-hierarchy path. The generic closure is a
/// superset of the hierarchy closure, so every hierarchy-reachable pair
/// already has a row and an `UPDATE` suffices. Rows are visited in depth
/// order, so the first assignment is already the minimum.
fn derive_hierarchy_depths(conn: &Connection) -> Result<(), RelationError> {
    let mut depth = 1;
    loop {
        let updated = conn.execute(
            "UPDATE relations SET hier_depth = ?1 + 1
             WHERE hier_depth IS NULL
               AND EXISTS (
                   SELECT 1 FROM relations AS r1
                   JOIN relations AS r2 ON r1.to_id = r2.from_id
                   WHERE r1.hier_depth = ?1
                     AND r2.depth = 1 AND r2.kind = 'hierarchy'
                     AND r1.from_id = relations.from_id
                     AND r2.to_id = relations.to_id
               )",
            [depth],
        )?;
        if updated == 0 {
            return Ok(());
        }
        depth += 1;
    }
}

/// Join depth-`depth` rows against direct edges to produce depth + 1 rows.
/// `INSERT OR IGNORE` keeps the shallower row for pairs derived earlier, so
/// the minimum-depth invariant holds without an upsert.
fn derive_next_depth(conn: &Connection, depth: i64) -> Result<i64, RelationError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO relations (from_id, to_id, kind, depth)
         SELECT r1.from_id,
                r2.to_id,
                CASE WHEN r1.kind = r2.kind THEN r1.kind ELSE 'mixed' END,
                r1.depth + 1
         FROM relations AS r1
         JOIN relations AS r2 ON r1.to_id = r2.from_id
         WHERE r1.depth = ?1 AND r2.depth = 1 AND r1.from_id <> r2.to_id",
        [depth],
    )?;
    Ok(i64::try_from(inserted).unwrap_or(i64::MAX))
}

/// Remove one direct non-hierarchy edge among the nodes of the detected
/// cycles. Hierarchy edges are never removed automatically.
fn remove_one_cycle_edge(
    conn: &Connection,
    pairs: &[(NodeId, NodeId)],
) -> Result<bool, RelationError> {
    let mut ids: Vec<NodeId> = pairs.iter().flat_map(|&(a, b)| [a, b]).collect();
    ids.sort_unstable();
    ids.dedup();
    let rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
    let id_list = rendered.join(", ");

    let candidate: Option<(i64, NodeId, NodeId)> = conn
        .query_row(
            &format!(
                "SELECT relation_id, from_id, to_id FROM relations
                 WHERE depth = 1 AND kind <> 'hierarchy'
                   AND from_id IN ({id_list}) AND to_id IN ({id_list})
                 ORDER BY relation_id
                 LIMIT 1"
            ),
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map(Some)
        .or_else(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    match candidate {
        Some((id, from, to)) => {
            warn!(relation_id = id, from, to, "removing edge to break cycle");
            conn.execute("DELETE FROM relations WHERE relation_id = ?1", [id])?;
            Ok(true)
        }
        None => Ok(false),
    }
}
