//! Incremental maintenance of the materialized transitive closure.
//!
//! Every mutation keeps the store at a fixed point of the closure invariant:
//! one row per reachable `(from, to)` pair, at the minimum composition depth,
//! with the kind composed along a minimal path. Insertion composes every path
//! ending at the new edge's tail with every path starting at its head.
//! Deletion re-derives the affected region exactly: no depth over-estimates
//! survive, because stale rows are dropped before recomputation.
//!
//! Hierarchy reachability is carried on every row as `hier_depth`, the
//! length of the shortest pure-hierarchy path for the pair, and is minimized
//! independently of the generic depth. A shorter path through foreign kinds
//! may own a row's `kind` and `depth`, but it never erases the fact that the
//! pair is connected through the hierarchy.

use rusqlite::{Connection, params};
use std::collections::{HashMap, VecDeque};

use crate::error::RelationError;
use crate::registry::RelationKind;
use crate::relation::{EdgeKind, NodeId, Relation};

/// One endpoint of a stored path, as seen from a fixed node.
struct PathRow {
    other: NodeId,
    kind: EdgeKind,
    depth: i64,
    hier_depth: Option<i64>,
}

// ---------------------------------------------------------------------------
// Insertion
// ---------------------------------------------------------------------------

/// Insert a direct edge and extend the closure with every path that now runs
/// through it.
///
/// The caller has already validated the edge (no self loop, no duplicate, no
/// cycle) and normalized its direction. A composed row for the same pair may
/// exist; the direct edge replaces it, tightening the pair's depth to 1
/// while its hierarchy reachability survives untouched.
///
/// # Errors
///
/// Returns an error if a store statement fails.
pub fn insert_edge(
    conn: &Connection,
    from: NodeId,
    to: NodeId,
    kind: EdgeKind,
    delay: Option<i64>,
) -> Result<Relation, RelationError> {
    ensure_reflexive(conn, from)?;
    ensure_reflexive(conn, to)?;

    let is_hierarchy = kind == EdgeKind::Single(RelationKind::Hierarchy);
    let own_hier: Option<i64> = is_hierarchy.then_some(1);

    conn.execute(
        "INSERT INTO relations (from_id, to_id, kind, delay, depth, hier_depth)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)
         ON CONFLICT (from_id, to_id)
         DO UPDATE SET kind = excluded.kind, delay = excluded.delay, depth = 1,
             hier_depth = COALESCE(MIN(relations.hier_depth, excluded.hier_depth),
                                   relations.hier_depth, excluded.hier_depth)",
        params![from, to, kind, delay, own_hier],
    )?;
    let (id, hierarchy_depth) = conn.query_row(
        "SELECT relation_id, hier_depth FROM relations WHERE from_id = ?1 AND to_id = ?2",
        params![from, to],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    // Compose every path ending at `from` (including its reflexive row) with
    // every path starting at `to`.
    let heads = paths_ending_at(conn, from)?;
    let tails = paths_starting_at(conn, to)?;
    for head in &heads {
        for tail in &tails {
            if head.other == tail.other || (head.other == from && tail.other == to) {
                continue;
            }
            let depth = head.depth + 1 + tail.depth;
            let composed = head.kind.compose(kind).compose(tail.kind);
            // A pure-hierarchy path exists through this edge only when the
            // edge itself and both flanking segments are hierarchy.
            let hier = match (is_hierarchy, head.hier_depth, tail.hier_depth) {
                (true, Some(h1), Some(h2)) => Some(h1 + 1 + h2),
                _ => None,
            };
            upsert_min(conn, head.other, tail.other, composed, depth, hier)?;
        }
    }

    Ok(Relation {
        id,
        from,
        to,
        kind,
        delay,
        depth: 1,
        hierarchy_depth,
    })
}

/// Insert the `depth == 0` self row for `node` if it is not present yet.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn ensure_reflexive(conn: &Connection, node: NodeId) -> Result<(), RelationError> {
    conn.execute(
        "INSERT OR IGNORE INTO relations (from_id, to_id, kind, depth, hier_depth)
         VALUES (?1, ?1, 'self', 0, 0)",
        [node],
    )?;
    Ok(())
}

/// Install a derived row. The generic depth (and the kind traveling with it)
/// only ever tightens; direct rows (`depth == 1`) keep theirs, since a
/// composed candidate depth is always >= 2. Hierarchy depth is minimized on
/// its own, treating `NULL` as unreachable.
fn upsert_min(
    conn: &Connection,
    from: NodeId,
    to: NodeId,
    kind: EdgeKind,
    depth: i64,
    hier_depth: Option<i64>,
) -> Result<(), RelationError> {
    conn.execute(
        "INSERT INTO relations (from_id, to_id, kind, depth, hier_depth)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (from_id, to_id)
         DO UPDATE SET
             kind = CASE WHEN excluded.depth < relations.depth
                         THEN excluded.kind ELSE relations.kind END,
             depth = MIN(relations.depth, excluded.depth),
             hier_depth = COALESCE(MIN(relations.hier_depth, excluded.hier_depth),
                                   relations.hier_depth, excluded.hier_depth)",
        params![from, to, kind, depth, hier_depth],
    )?;
    Ok(())
}

fn paths_ending_at(conn: &Connection, node: NodeId) -> Result<Vec<PathRow>, RelationError> {
    let mut stmt = conn.prepare(
        "SELECT from_id, kind, depth, hier_depth FROM relations WHERE to_id = ?1",
    )?;
    let rows = stmt
        .query_map([node], |row| {
            Ok(PathRow {
                other: row.get(0)?,
                kind: row.get(1)?,
                depth: row.get(2)?,
                hier_depth: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn paths_starting_at(conn: &Connection, node: NodeId) -> Result<Vec<PathRow>, RelationError> {
    let mut stmt = conn.prepare(
        "SELECT to_id, kind, depth, hier_depth FROM relations WHERE from_id = ?1",
    )?;
    let rows = stmt
        .query_map([node], |row| {
            Ok(PathRow {
                other: row.get(0)?,
                kind: row.get(1)?,
                depth: row.get(2)?,
                hier_depth: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

/// Remove a direct edge and re-derive the closure rows that may have depended
/// on it.
///
/// Only pairs `(u, v)` with `u` an ancestor of the edge's tail (or the tail
/// itself) and `v` a descendant of its head (or the head itself) can change.
/// Their composed rows are dropped and recomputed from the surviving direct
/// edges, so depths shrink to the true remaining minimum and pairs with no
/// remaining path lose their row entirely. Hierarchy depths in the region
/// are recomputed the same way, from the surviving hierarchy edges alone.
///
/// # Errors
///
/// Returns an error if a store statement fails.
pub fn remove_edge(conn: &Connection, edge: &Relation) -> Result<(), RelationError> {
    debug_assert!(edge.is_direct());

    let mut sources = node_column(
        conn,
        "SELECT from_id FROM relations WHERE to_id = ?1 AND depth >= 1",
        edge.from,
    )?;
    sources.push(edge.from);
    let mut targets = node_column(
        conn,
        "SELECT to_id FROM relations WHERE from_id = ?1 AND depth >= 1",
        edge.to,
    )?;
    targets.push(edge.to);

    conn.execute(
        "DELETE FROM relations WHERE relation_id = ?1",
        [edge.id],
    )?;
    conn.execute(
        &format!(
            "DELETE FROM relations
             WHERE depth > 1 AND from_id IN ({}) AND to_id IN ({})",
            id_list(&sources),
            id_list(&targets)
        ),
        [],
    )?;
    // Direct rows in the region fall back to their own edge's hierarchy
    // contribution; re-derivation below restores any multi-hop reachability
    // that survives.
    conn.execute(
        &format!(
            "UPDATE relations
             SET hier_depth = CASE WHEN kind = 'hierarchy' THEN 1 ELSE NULL END
             WHERE depth = 1 AND from_id IN ({}) AND to_id IN ({})",
            id_list(&sources),
            id_list(&targets)
        ),
        [],
    )?;

    for &source in &sources {
        let reached = shortest_paths_from(conn, source, false)?;
        let hier_reached = shortest_paths_from(conn, source, true)?;
        for &target in &targets {
            if target == source {
                continue;
            }
            let hier = hier_reached.get(&target).map(|&(depth, _)| depth);
            match reached.get(&target) {
                Some(&(depth, kind)) if depth > 1 => {
                    upsert_min(conn, source, target, kind, depth, hier)?;
                }
                Some(_) => {
                    // The pair kept its direct row; only its hierarchy
                    // reachability needs refreshing.
                    if let Some(hier) = hier {
                        merge_hier_depth(conn, source, target, hier)?;
                    }
                }
                None => {}
            }
        }
    }

    Ok(())
}

fn merge_hier_depth(
    conn: &Connection,
    from: NodeId,
    to: NodeId,
    hier_depth: i64,
) -> Result<(), RelationError> {
    conn.execute(
        "UPDATE relations
         SET hier_depth = COALESCE(MIN(hier_depth, ?3), hier_depth, ?3)
         WHERE from_id = ?1 AND to_id = ?2",
        params![from, to, hier_depth],
    )?;
    Ok(())
}

/// Breadth-first search over the surviving direct edges (optionally only the
/// hierarchy ones). Yields, for every node reachable from `origin`, the
/// minimum hop count and the kind composed along minimal paths (differing
/// minimal paths degrade to mixed).
fn shortest_paths_from(
    conn: &Connection,
    origin: NodeId,
    hierarchy_only: bool,
) -> Result<HashMap<NodeId, (i64, EdgeKind)>, RelationError> {
    let sql = if hierarchy_only {
        "SELECT to_id, kind FROM relations
         WHERE from_id = ?1 AND depth = 1 AND kind = 'hierarchy'"
    } else {
        "SELECT to_id, kind FROM relations WHERE from_id = ?1 AND depth = 1"
    };
    let mut stmt = conn.prepare(sql)?;

    let mut reached: HashMap<NodeId, (i64, EdgeKind)> = HashMap::new();
    reached.insert(origin, (0, EdgeKind::Reflexive));
    let mut queue = VecDeque::from([origin]);

    while let Some(node) = queue.pop_front() {
        let (depth, kind) = reached[&node];
        let successors = stmt
            .query_map([node], |row| {
                Ok((row.get::<_, NodeId>(0)?, row.get::<_, EdgeKind>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (next, edge_kind) in successors {
            let candidate = (depth + 1, kind.compose(edge_kind));
            match reached.get_mut(&next) {
                None => {
                    reached.insert(next, candidate);
                    queue.push_back(next);
                }
                // BFS visits in depth order, so a revisit at the same depth
                // is another minimal path; a deeper revisit is ignored.
                Some(existing) => {
                    if existing.0 == candidate.0 && existing.1 != candidate.1 {
                        existing.1 = EdgeKind::Mixed;
                    }
                }
            }
        }
    }

    Ok(reached)
}

fn node_column(
    conn: &Connection,
    sql: &str,
    node: NodeId,
) -> Result<Vec<NodeId>, RelationError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([node], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Render node ids for an `IN (...)` list. Ids are integers, so no quoting
/// is required.
fn id_list(ids: &[NodeId]) -> String {
    let rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
    rendered.join(", ")
}
