//! Relation kind registry: canonical direction, symmetric counterparts,
//! and display ordering.
//!
//! Every other module consults this table instead of hardcoding a kind's
//! reverse or position. The registry is an immutable value injected into the
//! engine, so tests can construct one with a custom kind set.
//!
//! # Canonical storage
//!
//! Five of the symmetric pairs have a distinguished canonical member
//! (`duplicates`, `blocks`, `precedes`, `includes`, `requires`). The store
//! only ever holds the canonical kind; asking to create the non-canonical
//! counterpart swaps the endpoints instead. The original orientation is
//! reconstructed on read via [`KindRegistry::symmetric_of`].
//!
//! `hierarchy` is the structural parent → child kind. It has no symmetric
//! counterpart and never appears in the display ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// RelationKind
// ---------------------------------------------------------------------------

/// A typed, directed relation between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Relates,
    Duplicates,
    DuplicatedBy,
    Blocks,
    BlockedBy,
    Precedes,
    Follows,
    Includes,
    PartOf,
    Requires,
    RequiredBy,
    /// Structural parent → child relation. Asymmetric by construction.
    Hierarchy,
}

impl RelationKind {
    /// Stable string tag, used both for storage and for config/API surfaces.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Relates => "relates",
            Self::Duplicates => "duplicates",
            Self::DuplicatedBy => "duplicated_by",
            Self::Blocks => "blocks",
            Self::BlockedBy => "blocked_by",
            Self::Precedes => "precedes",
            Self::Follows => "follows",
            Self::Includes => "includes",
            Self::PartOf => "part_of",
            Self::Requires => "requires",
            Self::RequiredBy => "required_by",
            Self::Hierarchy => "hierarchy",
        }
    }

    /// All kinds a client may ask to create, in display order, plus
    /// `hierarchy` at the end.
    pub const ALL: [Self; 12] = [
        Self::Relates,
        Self::Duplicates,
        Self::DuplicatedBy,
        Self::Blocks,
        Self::BlockedBy,
        Self::Precedes,
        Self::Follows,
        Self::Includes,
        Self::PartOf,
        Self::Requires,
        Self::RequiredBy,
        Self::Hierarchy,
    ];
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown relation kind tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown relation kind: '{}'", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for RelationKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Descriptors and registry
// ---------------------------------------------------------------------------

/// Which endpoint of an edge a label or kind is reported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewpoint {
    /// The `from` endpoint: the forward name applies.
    From,
    /// The `to` endpoint: the symmetric name applies.
    To,
}

/// Static description of one non-hierarchy relation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDescriptor {
    pub kind: RelationKind,
    /// Position in the display ordering (1-based, strict total order).
    pub order: u8,
    /// The kind reported from the other endpoint's perspective.
    pub symmetric: RelationKind,
    /// Canonical kind to store instead, with endpoints swapped. `None` for
    /// kinds that are themselves canonical (or self-symmetric).
    pub reverse: Option<RelationKind>,
}

/// Immutable lookup table over [`KindDescriptor`]s.
///
/// [`KindRegistry::standard`] builds the production table; tests may inject
/// a reduced or custom one via [`KindRegistry::with_descriptors`].
#[derive(Debug, Clone)]
pub struct KindRegistry {
    descriptors: Vec<KindDescriptor>,
}

impl KindRegistry {
    /// The standard eleven-kind table.
    #[must_use]
    pub fn standard() -> Self {
        use RelationKind::{
            BlockedBy, Blocks, DuplicatedBy, Duplicates, Follows, Includes, PartOf, Precedes,
            Relates, RequiredBy, Requires,
        };

        Self::with_descriptors(vec![
            desc(Relates, 1, Relates, None),
            desc(Duplicates, 2, DuplicatedBy, None),
            desc(DuplicatedBy, 3, Duplicates, Some(Duplicates)),
            desc(Blocks, 4, BlockedBy, None),
            desc(BlockedBy, 5, Blocks, Some(Blocks)),
            desc(Precedes, 6, Follows, None),
            desc(Follows, 7, Precedes, Some(Precedes)),
            desc(Includes, 8, PartOf, None),
            desc(PartOf, 9, Includes, Some(Includes)),
            desc(Requires, 10, RequiredBy, None),
            desc(RequiredBy, 11, Requires, Some(Requires)),
        ])
    }

    /// Build a registry from an explicit descriptor list.
    #[must_use]
    pub fn with_descriptors(descriptors: Vec<KindDescriptor>) -> Self {
        Self { descriptors }
    }

    /// Look up the descriptor for a kind. `hierarchy` has none.
    #[must_use]
    pub fn descriptor(&self, kind: RelationKind) -> Option<&KindDescriptor> {
        self.descriptors.iter().find(|d| d.kind == kind)
    }

    /// Parse a tag into a kind registered with this registry.
    ///
    /// `hierarchy` always parses: it is implicit and not part of the
    /// descriptor table.
    #[must_use]
    pub fn kind_of(&self, tag: &str) -> Option<RelationKind> {
        let kind = tag.parse::<RelationKind>().ok()?;
        if kind == RelationKind::Hierarchy || self.descriptor(kind).is_some() {
            Some(kind)
        } else {
            None
        }
    }

    /// The kind physically stored for `kind`: its canonical reverse when one
    /// is registered, otherwise `kind` unchanged.
    #[must_use]
    pub fn storage_kind(&self, kind: RelationKind) -> RelationKind {
        self.canonical_reverse(kind).unwrap_or(kind)
    }

    /// The registered canonical reverse of `kind`, if any. A `Some` result
    /// means edges of this kind are stored with swapped endpoints.
    #[must_use]
    pub fn canonical_reverse(&self, kind: RelationKind) -> Option<RelationKind> {
        self.descriptor(kind).and_then(|d| d.reverse)
    }

    /// Position of `kind` in the strict display ordering.
    #[must_use]
    pub fn order(&self, kind: RelationKind) -> Option<u8> {
        self.descriptor(kind).map(|d| d.order)
    }

    /// The kind reported from the other endpoint's perspective.
    #[must_use]
    pub fn symmetric_of(&self, kind: RelationKind) -> Option<RelationKind> {
        self.descriptor(kind).map(|d| d.symmetric)
    }

    /// Symbolic label for `kind` as seen from `viewpoint`: the forward tag
    /// from the `from` endpoint, the symmetric tag from the `to` endpoint.
    ///
    /// `hierarchy` labels as itself from both ends.
    #[must_use]
    pub fn label_for(&self, kind: RelationKind, viewpoint: Viewpoint) -> &'static str {
        match viewpoint {
            Viewpoint::From => kind.as_str(),
            Viewpoint::To => self.symmetric_of(kind).unwrap_or(kind).as_str(),
        }
    }

    /// All registered descriptors, in table order.
    #[must_use]
    pub fn descriptors(&self) -> &[KindDescriptor] {
        &self.descriptors
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

const fn desc(
    kind: RelationKind,
    order: u8,
    symmetric: RelationKind,
    reverse: Option<RelationKind>,
) -> KindDescriptor {
    KindDescriptor {
        kind,
        order,
        symmetric,
        reverse,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
