//! Simplification using unit clauses.

use partial_ref::{partial, PartialRef};

use crate::clause::db;
use crate::context::{
    AssignmentP, BinaryClausesP, ClauseAllocP, ClauseDbP, Context, ProofP, TrailP, WatchlistsP,
};

/// Record level-0 units as proof steps, then drop them from the trail.
///
/// Once a unit has been proven this way its justifying clause is no longer needed -- the
/// assignment it produced is permanent -- so the trail can be cleared without
/// [`crate::clause::gc::collect_garbage`]'s reason-marking pass needing to preserve that clause.
/// This only ever has anything to do at decision level 0, since that's the only level a clause can
/// assert a literal that will never again need to be unassigned.
pub fn prove_units(mut ctx: partial!(Context, mut ProofP, mut TrailP, AssignmentP)) -> bool {
    if ctx.part(TrailP).current_level() != 0 {
        return false;
    }

    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    let new_unit = !trail.trail().is_empty();

    if new_unit {
        ctx.part_mut(ProofP)
            .add_step("unit-clauses", &[], trail.trail(), &[]);
    }

    trail.clear();

    new_unit
}

/// Remove satisfied clauses and false literals.
pub fn simplify(
    mut ctx: partial!(
        Context,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ProofP,
        mut WatchlistsP,
        AssignmentP,
    ),
) {
    let (binary, mut ctx) = ctx.split_part_mut(BinaryClausesP);
    binary.simplify(ctx.part(AssignmentP));

    let crefs = db::all_clauses(ctx.part(ClauseDbP)).to_vec();

    let mut new_lits = vec![];

    for cref in crefs {
        if ctx.part(ClauseAllocP).header(cref).deleted() {
            continue;
        }

        let lits = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();

        new_lits.clear();
        let mut satisfied = false;

        for &lit in &lits {
            match ctx.part(AssignmentP).lit_value(lit) {
                None => new_lits.push(lit),
                Some(true) => {
                    satisfied = true;
                    break;
                }
                Some(false) => (),
            }
        }

        if satisfied {
            ctx.part_mut(ProofP)
                .add_step("delete-satisfied-clause", &[], &lits, &[]);
            db::delete_clause(ctx.borrow(), cref);
            continue;
        }

        if new_lits.len() == lits.len() {
            continue;
        }

        ctx.part_mut(ProofP)
            .add_step("simplify-clause", &[], &new_lits, &[]);

        match new_lits[..] {
            // Cannot have empty or unit clauses after full propagation. An empty clause would
            // have been a conflict and a unit clause's surviving literal would already have
            // propagated, making this clause satisfied rather than merely shrinkable.
            [] | [_] => unreachable!(),
            [lit_0, lit_1] => {
                ctx.part_mut(BinaryClausesP)
                    .add_binary_clause([lit_0, lit_1]);
                db::delete_clause(ctx.borrow(), cref);
            }
            ref shrunk => {
                let header = ctx.part(ClauseAllocP).header(cref).clone();
                db::add_clause(ctx.borrow(), header, shrunk);
                db::delete_clause(ctx.borrow(), cref);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::clause::{ClauseHeader, Tier};
    use crate::context::{set_var_count, TrailP};
    use crate::prop::{enqueue_assignment, Reason};

    #[test]
    fn satisfied_long_clause_is_deleted() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        let mut header = ClauseHeader::new();
        header.set_tier(Tier::Irred);
        let cref = db::add_clause(ctx.borrow(), header, &lits![1, 2, 3]);

        enqueue_assignment(ctx.borrow(), lit!(1), Reason::Unit);

        simplify(ctx.borrow());

        assert!(ctx.part(ClauseAllocP).header(cref).deleted());
    }

    #[test]
    fn clause_with_false_literal_shrinks_to_binary() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        let mut header = ClauseHeader::new();
        header.set_tier(Tier::Irred);
        let cref = db::add_clause(ctx.borrow(), header, &lits![1, 2, 3]);

        enqueue_assignment(ctx.borrow(), lit!(-1), Reason::Unit);
        enqueue_assignment(ctx.borrow(), lit!(-2), Reason::Unit);

        simplify(ctx.borrow());

        assert!(ctx.part(ClauseAllocP).header(cref).deleted());
        assert_eq!(ctx.part(BinaryClausesP).count(), 1);
        assert_eq!(ctx.part(BinaryClausesP).implied(lit!(1)), &[lit!(3)]);
    }

    #[test]
    fn prove_units_clears_the_trail_at_level_zero() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        enqueue_assignment(ctx.borrow(), lit!(1), Reason::Unit);

        assert!(prove_units(ctx.borrow()));
        assert!(ctx.part(TrailP).trail().is_empty());
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(1)));
    }
}
