//! Cycle detection over the materialized closure.
//!
//! Because the closure holds a row for every reachable pair, the acyclicity
//! guard is a single indexed lookup: an edge `from -> to` closes a cycle
//! exactly when a row `to -> from` already exists at depth >= 1. The guard
//! applies to every kind, so no pair of nodes is ever ancestor and descendant
//! of each other, regardless of which kinds the two paths compose.

use rusqlite::{Connection, params};

use crate::error::RelationError;
use crate::relation::NodeId;

/// Would inserting `from -> to` close a cycle?
///
/// Self loops count as cycles of length one.
///
/// # Errors
///
/// Returns an error if the lookup fails.
pub fn would_cycle(conn: &Connection, from: NodeId, to: NodeId) -> Result<bool, RelationError> {
    if from == to {
        return Ok(true);
    }
    let reverse: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM relations
            WHERE from_id = ?1 AND to_id = ?2 AND depth >= 1
        )",
        params![to, from],
        |row| row.get(0),
    )?;
    Ok(reverse)
}

/// Pairs `(x, y)` witnessing a cycle at a given composition depth: a direct
/// edge `y -> x` coexists with a depth-`d` row `x -> y`.
///
/// Used by bulk reconstruction, where cycles in pre-existing edge data
/// surface as rows that keep composing past every finite depth.
///
/// # Errors
///
/// Returns an error if the lookup fails.
pub fn circular_pairs(
    conn: &Connection,
    depth: i64,
) -> Result<Vec<(NodeId, NodeId)>, RelationError> {
    let mut stmt = conn.prepare(
        "SELECT closure.from_id, closure.to_id
         FROM relations AS closure
         JOIN relations AS direct
           ON direct.from_id = closure.to_id AND direct.to_id = closure.from_id
         WHERE closure.depth = ?1 AND direct.depth = 1
         ORDER BY closure.from_id, closure.to_id",
    )?;
    let pairs = stmt
        .query_map([depth], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure;
    use crate::db;
    use crate::registry::RelationKind;
    use crate::relation::EdgeKind;

    fn store() -> Connection {
        db::open_in_memory().expect("open in-memory store")
    }

    fn link(conn: &Connection, from: NodeId, to: NodeId, kind: RelationKind) {
        closure::insert_edge(conn, from, to, EdgeKind::Single(kind), None).expect("insert edge");
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let conn = store();
        assert!(would_cycle(&conn, 1, 1).expect("guard"));
    }

    #[test]
    fn direct_reverse_edge_is_a_cycle() {
        let conn = store();
        link(&conn, 1, 2, RelationKind::Blocks);
        assert!(would_cycle(&conn, 2, 1).expect("guard"));
        assert!(!would_cycle(&conn, 1, 2).expect("guard"));
    }

    #[test]
    fn transitive_reverse_path_is_a_cycle() {
        let conn = store();
        link(&conn, 1, 2, RelationKind::Precedes);
        link(&conn, 2, 3, RelationKind::Precedes);
        assert!(would_cycle(&conn, 3, 1).expect("guard"));
    }

    #[test]
    fn kinds_do_not_matter_to_the_guard() {
        let conn = store();
        link(&conn, 1, 2, RelationKind::Hierarchy);
        link(&conn, 2, 3, RelationKind::Blocks);
        // A third, unrelated kind still may not point back up the path.
        assert!(would_cycle(&conn, 3, 1).expect("guard"));
    }

    #[test]
    fn unrelated_nodes_are_not_cyclic() {
        let conn = store();
        link(&conn, 1, 2, RelationKind::Relates);
        assert!(!would_cycle(&conn, 3, 4).expect("guard"));
    }

    #[test]
    fn circular_pairs_finds_seeded_two_cycle() {
        let conn = store();
        // Seed contradictory direct rows behind the guard's back, the way a
        // corrupted import would.
        conn.execute_batch(
            "INSERT INTO relations (from_id, to_id, kind, depth)
             VALUES (1, 2, 'blocks', 1), (2, 1, 'blocks', 1);",
        )
        .expect("seed rows");

        let pairs = circular_pairs(&conn, 1).expect("scan");
        assert_eq!(pairs, vec![(1, 2), (2, 1)]);
    }
}
