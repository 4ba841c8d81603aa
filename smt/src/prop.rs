//! Unit propagation.
pub mod assignment;
pub mod binary;
pub mod graph;
pub mod long;
pub mod watch;

use partial_ref::{partial, PartialRef};

use crate::context::{
    AssignmentP, BinaryClausesP, ClauseAllocP, Context, ImplGraphP, TrailP, WatchlistsP,
};

pub use assignment::{backtrack, enqueue_assignment, full_restart, restart, Assignment, Trail};
pub use binary::propagate_binary;
pub use graph::{Conflict, ExplanationId, ImplGraph, ImplNode, Reason};
pub use long::propagate_long;
pub use watch::{Watch, Watchlists};

/// Propagate every literal currently queued on the trail to quiescence, via both the binary
/// clause index and the long-clause watchlists.
///
/// Returns the first conflict found, leaving whatever is left of the queue for the next call once
/// the caller has backtracked.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
    ),
) -> Result<(), Conflict> {
    while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        propagate_binary(ctx.borrow(), lit)?;
        propagate_long(ctx.borrow(), lit)?;
    }
    Ok(())
}
