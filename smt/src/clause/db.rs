//! Database for long clauses.
use std::mem::transmute;

use partial_ref::{partial, PartialRef};

use smt_formula::lit::Lit;

use crate::context::{parts::*, Context};

use super::{header::HEADER_LEN, ClauseAlloc, ClauseHeader, ClauseRef};

/// Partitions of the clause database.
///
/// The long clauses are partitioned into 4 [`Tier`]s. This follows the approach described by
/// Chanseok Oh in ["Between SAT and UNSAT: The Fundamental Difference in CDCL
/// SAT"](https://doi.org/10.1007/978-3-319-24318-4_23), section 4.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Tier {
    Irred = 0,
    Core = 1,
    Mid = 2,
    Local = 3,
}

impl Tier {
    /// Total number of tiers.
    pub const fn count() -> usize {
        4
    }

    /// Cast an index into the corresponding tier.
    pub unsafe fn from_index(index: usize) -> Tier {
        debug_assert!(index < Tier::count());
        transmute(index as u8)
    }
}

#[derive(Default)]
/// Database for long clauses.
///
/// Removal of clauses from the `clauses` and the `by_tier` fields can be delayed. The clause
/// header's deleted and tier fields need to be checked when iterating over these. `by_tier` may
/// also contain duplicate entries.
pub struct ClauseDb {
    /// May contain deleted clauses, see above.
    clauses: Vec<ClauseRef>,
    /// May contain deleted and moved clauses, see above.
    by_tier: [Vec<ClauseRef>; Tier::count()],
    /// These counts should always be up to date.
    count_by_tier: [usize; Tier::count()],
    /// Size of deleted but not collected clauses.
    garbage_size: usize,
}

impl ClauseDb {
    pub fn count_by_tier(&self, tier: Tier) -> usize {
        self.count_by_tier[tier as usize]
    }
}

/// Add a long clause to the database.
///
/// Starts the clause's two watches on its first two literals. Callers must ensure those are
/// suitable for watching (e.g. unassigned, or the asserting/implied pair after backtracking).
pub fn add_clause(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP, mut WatchlistsP),
    header: ClauseHeader,
    lits: &[Lit],
) -> ClauseRef {
    let tier = header.tier();

    let cref = ctx.part_mut(ClauseAllocP).add_clause(header, lits);

    ctx.part_mut(WatchlistsP)
        .watch_clause(cref, [lits[0], lits[1]]);

    let db = ctx.part_mut(ClauseDbP);

    db.clauses.push(cref);
    db.by_tier[tier as usize].push(cref);
    db.count_by_tier[tier as usize] += 1;

    cref
}

/// Change the tier of a long clause. A noop for a clause already of the given tier.
pub fn set_clause_tier(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP),
    cref: ClauseRef,
    tier: Tier,
) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let old_tier = alloc.header(cref).tier();
    if old_tier != tier {
        db.count_by_tier[old_tier as usize] -= 1;
        db.count_by_tier[tier as usize] += 1;

        alloc.header_mut(cref).set_tier(tier);
        db.by_tier[tier as usize].push(cref);
    }
}

/// Delete a long clause from the database.
///
/// Panics if the clause is already deleted; use [`try_delete_clause`] when the clause might still
/// be the reason for an assigned literal.
pub fn delete_clause(mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP), cref: ClauseRef) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let header = alloc.header_mut(cref);

    debug_assert!(!header.deleted(), "delete_clause for already deleted clause");

    header.set_deleted(true);

    db.count_by_tier[header.tier() as usize] -= 1;

    db.garbage_size += header.len() + HEADER_LEN;
}

/// Delete a long clause unless it is the reason for the current value of its first literal.
///
/// Returns whether the clause was deleted. Used by clause reduction, which must not delete a
/// clause that is still needed to justify an assignment on the trail.
pub fn try_delete_clause(
    mut ctx: partial!(
        Context,
        mut ClauseDbP,
        mut ClauseAllocP,
        AssignmentP,
        ImplGraphP,
    ),
    cref: ClauseRef,
) -> bool {
    use crate::prop::Reason;

    let alloc = ctx.part(ClauseAllocP);
    let clause = alloc.clause(cref);
    let first = clause.lits()[0];

    let impl_graph = ctx.part(ImplGraphP);
    let is_reason = ctx.part(AssignmentP).lit_is_true(first)
        && matches!(impl_graph.reason(first.var()), Reason::Long(reason_cref) if *reason_cref == cref);

    if is_reason {
        return false;
    }

    delete_clause(ctx.borrow(), cref);
    true
}

pub(crate) fn by_tier_mut(db: &mut ClauseDb, tier: Tier) -> &mut Vec<ClauseRef> {
    &mut db.by_tier[tier as usize]
}

pub(crate) fn set_count_by_tier(db: &mut ClauseDb, tier: Tier, count: usize) {
    db.count_by_tier[tier as usize] = count;
}

pub(crate) fn all_clauses(db: &ClauseDb) -> &[ClauseRef] {
    &db.clauses
}

pub(crate) fn set_all_clauses(db: &mut ClauseDb, clauses: Vec<ClauseRef>) {
    db.clauses = clauses;
}

pub(crate) fn set_all_by_tier(db: &mut ClauseDb, by_tier: [Vec<ClauseRef>; Tier::count()]) {
    db.by_tier = by_tier;
}

pub(crate) fn garbage_size(db: &ClauseDb) -> usize {
    db.garbage_size
}

pub(crate) fn set_garbage_size(db: &mut ClauseDb, garbage_size: usize) {
    db.garbage_size = garbage_size;
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;
    use smt_formula::cnf_formula;

    #[test]
    fn set_tiers_and_deletes() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let clauses = cnf_formula![
            1, 2, 3;
            4, -5, 6;
            -2, 3, -4;
            -3, 5, 2, 7, 5;
        ];

        let tiers = vec![Tier::Irred, Tier::Core, Tier::Mid, Tier::Local];
        let new_tiers = vec![Tier::Irred, Tier::Local, Tier::Local, Tier::Core];

        let mut crefs = vec![];

        for (clause, &tier) in clauses.iter().zip(tiers.iter()) {
            let mut header = ClauseHeader::new();
            header.set_tier(tier);
            let cref = add_clause(ctx.borrow(), header, clause);
            crefs.push(cref);
        }

        for (&cref, &tier) in crefs.iter().rev().zip(new_tiers.iter().rev()) {
            set_clause_tier(ctx.borrow(), cref, tier);
        }

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Core), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Mid), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Local), 2);

        delete_clause(ctx.borrow(), crefs[0]);
        delete_clause(ctx.borrow(), crefs[2]);

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Core), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Mid), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Local), 1);
    }
}
