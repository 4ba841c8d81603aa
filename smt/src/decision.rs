//! Decision heuristics.
pub mod vsids;

use partial_ref::{partial, PartialRef};

use smt_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, Reason};

/// Make the VSIDS heap variable `var` available for future decisions again.
///
/// Called whenever `var` becomes unassigned, whether by backtracking or because it was never
/// assigned in the first place after a variable count increase.
pub fn make_available(mut ctx: partial!(Context, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).make_available(var);
}

/// Make a decision and enqueue it.
///
/// Picks the highest-activity variable that is not yet assigned, in the VSIDS order, restoring
/// the polarity it last had (phase saving).
///
/// Returns `false` if no decision was made because all variables are assigned.
pub fn make_decision(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP, mut VsidsP),
) -> bool {
    let var = loop {
        match ctx.part_mut(VsidsP).next() {
            Some(var) => {
                if ctx.part(AssignmentP).var_value(var).is_none() {
                    break var;
                }
            }
            None => return false,
        }
    };

    let decision = Lit::from_var(var, ctx.part(AssignmentP).last_var_value(var));

    ctx.part_mut(TrailP).new_decision_level();

    enqueue_assignment(ctx.borrow(), decision, Reason::Unit);

    true
}
