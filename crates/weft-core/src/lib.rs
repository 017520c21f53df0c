//! Typed DAG relation engine with a materialized transitive closure.
//!
//! Nodes live elsewhere (behind [`node::NodeStore`]); this crate owns the
//! edges between them. Direct edges are validated against self-loops,
//! duplicates, shared hierarchies, and cycles, then stored alongside a
//! derived row for every reachable pair of nodes, so reachability and
//! ancestry queries are single indexed lookups.
//!
//! Entry point: [`engine::RelationEngine`].

pub mod closure;
pub mod config;
pub mod cycle;
pub mod db;
pub mod engine;
pub mod error;
pub mod node;
pub mod rebuild;
pub mod registry;
pub mod relation;
pub mod schedule;
pub mod visibility;

pub use config::EngineConfig;
pub use engine::{CreateOutcome, RelationEngine};
pub use error::RelationError;
pub use node::{MemoryNodeStore, NodeDates, NodeStore};
pub use rebuild::RebuildStats;
pub use registry::{KindRegistry, RelationKind, Viewpoint};
pub use relation::{EdgeKind, NodeId, ProjectId, Relation, RelationId};
pub use schedule::ScheduleOutcome;
pub use visibility::{AllVisible, AllowList, VisibilityFilter};
