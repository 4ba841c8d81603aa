//! Clause database reduction.
use std::mem::replace;

use partial_ref::{partial, PartialRef};

use vec_mut_scan::VecMutScan;

use crate::context::{parts::*, Context};

use super::db::{by_tier_mut, set_clause_tier, set_count_by_tier, try_delete_clause, Tier};

/// Remove deleted and duplicate entries from the by_tier clause lists.
///
/// This has the side effect of setting the mark bit on all clauses of the tier.
pub fn dedup_and_mark_by_tier(mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP), tier: Tier) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let by_tier = by_tier_mut(ctx.part_mut(ClauseDbP), tier);

    by_tier.retain(|&cref| {
        let header = alloc.header_mut(cref);
        let retain = !header.deleted() && !header.mark() && header.tier() == tier;
        if retain {
            header.set_mark(true);
        }
        retain
    })
}

/// Reduce the number of local tier clauses by deleting half of them.
pub fn reduce_locals(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut WatchlistsP,
        AssignmentP,
        ImplGraphP,
    ),
) {
    dedup_and_mark_by_tier(ctx.borrow(), Tier::Local);

    let mut locals = replace(by_tier_mut(ctx.part_mut(ClauseDbP), Tier::Local), vec![]);

    locals.sort_unstable_by(|&a, &b| {
        let a = ctx.part(ClauseAllocP).header(a).activity();
        let b = ctx.part(ClauseAllocP).header(b).activity();
        b.partial_cmp(&a).unwrap()
    });

    let mut to_delete = locals.len() / 2;

    let mut scan = VecMutScan::new(&mut locals);

    if to_delete > 0 {
        while let Some(cref) = scan.next() {
            ctx.part_mut(ClauseAllocP).header_mut(*cref).set_mark(false);

            if try_delete_clause(ctx.borrow(), *cref) {
                cref.remove();
                to_delete -= 1;
                if to_delete == 0 {
                    break;
                }
            }
        }
    }

    // Make sure to clear all marks.
    while let Some(cref) = scan.next() {
        ctx.part_mut(ClauseAllocP).header_mut(*cref).set_mark(false);
    }

    drop(scan);

    set_count_by_tier(ctx.part_mut(ClauseDbP), Tier::Local, locals.len());
    *by_tier_mut(ctx.part_mut(ClauseDbP), Tier::Local) = locals;
}

/// Reduce the number of mid tier clauses by moving inactive ones to the local tier.
pub fn reduce_mids(mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP)) {
    dedup_and_mark_by_tier(ctx.borrow(), Tier::Mid);

    let mut mids = replace(by_tier_mut(ctx.part_mut(ClauseDbP), Tier::Mid), vec![]);

    mids.retain(|&cref| {
        let header = ctx.part_mut(ClauseAllocP).header_mut(cref);
        header.set_mark(false);

        if header.active() {
            header.set_active(false);
            true
        } else {
            set_clause_tier(ctx.borrow(), cref, Tier::Local);
            false
        }
    });

    set_count_by_tier(ctx.part_mut(ClauseDbP), Tier::Mid, mids.len());
    *by_tier_mut(ctx.part_mut(ClauseDbP), Tier::Mid) = mids;
}
