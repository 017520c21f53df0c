//! Edge data model: direct edges, closure rows, and the reflexive self row.
//!
//! A [`Relation`] is one row of the relation store. `depth` distinguishes the
//! three flavors:
//!
//! - `depth == 1` — a direct edge created by a client.
//! - `depth > 1` — a closure row derived by composing direct edges.
//! - `depth == 0` — the reflexive self row (`from == to`), a closure
//!   artifact consulted by the cycle guard.
//!
//! The store holds exactly one row per `(from, to)` pair, at the minimum
//! available composition depth.

use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use std::fmt;

use crate::registry::{KindRegistry, RelationKind, Viewpoint};

/// Identity of a node, owned by the external node store.
pub type NodeId = i64;

/// Identity of a project, used only for the same-project sanity check.
pub type ProjectId = i64;

/// Identity of a relation row.
pub type RelationId = i64;

// ---------------------------------------------------------------------------
// EdgeKind
// ---------------------------------------------------------------------------

/// Kind carried by a stored row: an explicit tagged value, never inferred
/// from flag columns.
///
/// Direct edges are always [`EdgeKind::Single`]. [`EdgeKind::Mixed`] arises
/// only on closure rows whose underlying path composes differing kinds, and
/// [`EdgeKind::Reflexive`] only on the `depth == 0` self row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Single(RelationKind),
    Mixed,
    Reflexive,
}

impl EdgeKind {
    /// Stable storage tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single(kind) => kind.as_str(),
            Self::Mixed => "mixed",
            Self::Reflexive => "self",
        }
    }

    /// Parse a storage tag back into an [`EdgeKind`].
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "mixed" => Some(Self::Mixed),
            "self" => Some(Self::Reflexive),
            other => other.parse::<RelationKind>().ok().map(Self::Single),
        }
    }

    /// The single kind, if this is not a mixed or reflexive row.
    #[must_use]
    pub const fn single(self) -> Option<RelationKind> {
        match self {
            Self::Single(kind) => Some(kind),
            Self::Mixed | Self::Reflexive => None,
        }
    }

    /// Compose two path segments: equal kinds stay themselves, anything else
    /// degrades to `Mixed`. Reflexive segments are identity.
    #[must_use]
    pub fn compose(self, other: Self) -> Self {
        match (self, other) {
            (Self::Reflexive, k) | (k, Self::Reflexive) => k,
            (Self::Single(a), Self::Single(b)) if a == b => Self::Single(a),
            _ => Self::Mixed,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for EdgeKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EdgeKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let tag = value.as_str()?;
        Self::parse(tag).ok_or(FromSqlError::InvalidType)
    }
}

// ---------------------------------------------------------------------------
// Relation
// ---------------------------------------------------------------------------

/// One row of the relation store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub id: RelationId,
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
    /// Working-day offset along a `precedes` edge. `None` on every other
    /// kind and on derived rows.
    pub delay: Option<i64>,
    /// Path length: 0 reflexive, 1 direct, >1 composed.
    pub depth: i64,
    /// Length of the shortest pure-hierarchy path for this pair, when one
    /// exists. Minimized independently of `depth`, so a shorter path through
    /// other kinds never masks hierarchy reachability.
    pub hierarchy_depth: Option<i64>,
}

impl Relation {
    /// Column list matching [`Relation::from_row`].
    pub const COLUMNS: &'static str =
        "relation_id, from_id, to_id, kind, delay, depth, hier_depth";

    /// Map a row selected with [`Relation::COLUMNS`].
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or holds an unknown kind tag.
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            from: row.get(1)?,
            to: row.get(2)?,
            kind: row.get(3)?,
            delay: row.get(4)?,
            depth: row.get(5)?,
            hierarchy_depth: row.get(6)?,
        })
    }

    /// `true` for client-created edges.
    #[must_use]
    pub const fn is_direct(&self) -> bool {
        self.depth == 1
    }

    /// `true` for derived multi-hop rows.
    #[must_use]
    pub const fn is_closure(&self) -> bool {
        self.depth > 1
    }

    /// `true` for the `depth == 0` self row.
    #[must_use]
    pub const fn is_reflexive(&self) -> bool {
        self.depth == 0
    }

    /// Are the endpoints connected through a pure hierarchy path?
    #[must_use]
    pub fn has_hierarchy_path(&self) -> bool {
        self.hierarchy_depth.is_some_and(|depth| depth >= 1)
    }

    /// Does this row touch `node` on either end?
    #[must_use]
    pub const fn involves(&self, node: NodeId) -> bool {
        self.from == node || self.to == node
    }

    /// The endpoint that is not `node`.
    #[must_use]
    pub const fn other_node(&self, node: NodeId) -> NodeId {
        if self.from == node { self.to } else { self.from }
    }

    /// The relation kind as seen from `node`'s side: the stored kind when
    /// `node` is the `from` endpoint, its symmetric counterpart otherwise.
    ///
    /// This is how the original (pre-normalization) kind of a canonicalized
    /// edge is reconstructed. Mixed and reflexive rows report `None`.
    #[must_use]
    pub fn relation_type_for(&self, registry: &KindRegistry, node: NodeId) -> Option<RelationKind> {
        let kind = self.kind.single()?;
        if self.from == node {
            Some(kind)
        } else {
            Some(registry.symmetric_of(kind).unwrap_or(kind))
        }
    }

    /// Symbolic label for this row as seen from `node`'s side.
    #[must_use]
    pub fn label_for(&self, registry: &KindRegistry, node: NodeId) -> &'static str {
        match self.kind {
            EdgeKind::Single(kind) => {
                let viewpoint = if self.from == node {
                    Viewpoint::From
                } else {
                    Viewpoint::To
                };
                registry.label_for(kind, viewpoint)
            }
            EdgeKind::Mixed | EdgeKind::Reflexive => self.kind.as_str(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
