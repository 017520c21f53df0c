//! Date propagation along direct `precedes` edges.
//!
//! A successor may start no earlier than the day after its predecessor ends,
//! plus the edge's delay. Propagation is one hop per invocation: moving a
//! successor does not recursively move its own successors here; callers
//! re-run propagation from the moved node if they want the wave to continue.
//!
//! Propagation is deliberately outside the edge-commit transaction. A
//! relation that fails to move its successor still exists; the failure is
//! reported, not rolled back.

use chrono::{Days, NaiveDate};
use tracing::debug;

use crate::error::RelationError;
use crate::node::{NodeDates, NodeStore};
use crate::registry::RelationKind;
use crate::relation::{EdgeKind, Relation};

/// What happened to one successor during propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The row is not a direct `precedes` edge, or the predecessor has no
    /// dates to propagate from.
    NotApplicable,
    /// The successor was asked to start no earlier than this date.
    Requested(NaiveDate),
    /// The node owner rejected the reschedule. The relation stands.
    Failed { not_before: NaiveDate, reason: String },
}

/// Earliest start permitted for a successor of a node with these dates: the
/// day after the predecessor ends (due date, falling back to start date),
/// pushed out by the edge delay.
///
/// `None` when the predecessor is undated or the date arithmetic overflows.
#[must_use]
pub fn soonest_start(predecessor: &NodeDates, delay: Option<i64>) -> Option<NaiveDate> {
    let anchor = predecessor.due_date.or(predecessor.start_date)?;
    let offset = 1 + delay.unwrap_or(0);
    let days = u64::try_from(offset).ok()?;
    anchor.checked_add_days(Days::new(days))
}

/// Propagate one direct `precedes` edge: compute the successor's earliest
/// start and ask the node store to honor it.
///
/// # Errors
///
/// Returns an error if the predecessor's dates cannot be read. A rejected
/// reschedule is not an error; it surfaces as [`ScheduleOutcome::Failed`].
pub fn propagate_edge<S: NodeStore>(
    nodes: &mut S,
    relation: &Relation,
) -> Result<ScheduleOutcome, RelationError> {
    if !relation.is_direct() || relation.kind != EdgeKind::Single(RelationKind::Precedes) {
        return Ok(ScheduleOutcome::NotApplicable);
    }

    let predecessor = nodes.dates_of(relation.from)?;
    let Some(not_before) = soonest_start(&predecessor, relation.delay) else {
        return Ok(ScheduleOutcome::NotApplicable);
    };

    debug!(
        from = relation.from,
        to = relation.to,
        %not_before,
        "propagating dates along precedes edge"
    );
    match nodes.reschedule_after(relation.to, not_before) {
        Ok(()) => Ok(ScheduleOutcome::Requested(not_before)),
        Err(error) => Ok(ScheduleOutcome::Failed {
            not_before,
            reason: format!("{error:#}"),
        }),
    }
}
