//! Relation store schema.
//!
//! A single `relations` table holds direct edges, derived closure rows, and
//! the reflexive self rows, distinguished by `depth`:
//! - `depth = 1` — direct edges (client-owned)
//! - `depth > 1` — closure rows (engine-derived)
//! - `depth = 0` — reflexive self rows (`from_id = to_id`)
//!
//! `UNIQUE (from_id, to_id)` enforces the closure invariant of exactly one
//! row per reachable pair, kept at the minimum composition depth.
//!
//! `hier_depth` tracks the shortest pure-hierarchy path for the pair,
//! minimized independently of `depth`: a shorter path through foreign kinds
//! may own the row's `kind` and `depth` without erasing the fact that the
//! pair is connected through the hierarchy.

/// Migration v1: the relations table, its indexes, and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS relations (
    relation_id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_id INTEGER NOT NULL,
    to_id INTEGER NOT NULL,
    kind TEXT NOT NULL CHECK (length(trim(kind)) > 0),
    delay INTEGER CHECK (delay IS NULL OR delay >= 0),
    depth INTEGER NOT NULL CHECK (depth >= 0),
    hier_depth INTEGER CHECK (hier_depth IS NULL OR hier_depth >= 0),
    UNIQUE (from_id, to_id),
    CHECK ((from_id = to_id) = (depth = 0)),
    CHECK (hier_depth IS NULL OR ((from_id = to_id) = (hier_depth = 0))),
    CHECK (delay IS NULL OR (kind = 'precedes' AND depth = 1))
);

CREATE INDEX IF NOT EXISTS idx_relations_to_depth
    ON relations(to_id, depth);

CREATE INDEX IF NOT EXISTS idx_relations_from_depth
    ON relations(from_id, depth);

CREATE INDEX IF NOT EXISTS idx_relations_depth
    ON relations(depth);

CREATE INDEX IF NOT EXISTS idx_relations_kind_depth
    ON relations(kind, depth);

CREATE TABLE IF NOT EXISTS relation_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_rebuild_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO relation_meta (id, schema_version) VALUES (1, 1);
";

/// Indexes expected by the closure maintenance and query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_relations_to_depth",
    "idx_relations_from_depth",
    "idx_relations_depth",
    "idx_relations_kind_depth",
];
