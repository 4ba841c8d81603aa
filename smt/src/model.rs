//! Model reconstruction.
//!
//! The boolean part is a plain snapshot of the trail's assignment (spec §3 Assignment), taken
//! once `solve` reaches `Sat` so a later `assume`/`push_level` call can't invalidate it out from
//! under a caller still holding it. Datatype-sorted terms need more than a snapshot can cheaply
//! hold -- an explicit constructor tree -- so those are walked live out of the congruence
//! closure's known constructors and the datatype theory's bookkeeping (spec §4.8 "Model
//! generation"), the same way the acyclicity check in [`crate::theory::framework`] walks them.
use partial_ref::{partial, PartialRef};

use smt_formula::term::TermId;
use smt_formula::types::{DatatypeId, Type};
use smt_formula::{Lit, Var};

use crate::context::{AssignmentP, CcP, Context, TermsP, TheoriesP};

/// The value the model assigns to a term.
///
/// Boolean terms evaluate to `Bool`; datatype terms evaluate to an explicit constructor
/// application, built recursively. A datatype class that was never pinned to a constructor (no
/// term was ever built from one, and `final_check` never case-split it) still needs *some*
/// value: [`term_value`] synthesizes one from the type's [`smt_formula::types::TypeStore::base_cstor`],
/// with a fresh opaque witness for any argument that has no term of its own to recurse into.
#[derive(Clone, Debug, PartialEq)]
pub enum TermValue {
    Bool(bool),
    Cstor(Box<str>, Vec<TermValue>),
    /// An unconstrained value of an uninterpreted sort, or a synthesized datatype argument.
    /// The label is for display only; distinct `Opaque` values aren't guaranteed to denote
    /// distinct model elements.
    Opaque(Box<str>),
}

/// A snapshot of the boolean assignment the solver found, valid for as long as nothing further
/// mutates the trail.
#[derive(Default, Clone)]
pub struct Model {
    assignment: Vec<Option<bool>>,
}

impl Model {
    /// The full assignment, indexed by [`Var::index`].
    pub fn assignment(&self) -> &[Option<bool>] {
        &self.assignment
    }

    /// Value assigned to a variable, or `None` if it was never assigned (e.g. a variable
    /// introduced by a clause load after this snapshot was taken).
    pub fn var_value(&self, var: Var) -> Option<bool> {
        self.assignment.get(var.index()).copied().flatten()
    }

    /// Whether a literal is true in this model.
    pub fn lit_is_true(&self, lit: Lit) -> bool {
        self.var_value(lit.var()) == Some(lit.is_positive())
    }
}

/// Snapshot the current assignment into a [`Model`]. Called once, when `solve` reports `Sat`.
pub fn reconstruct(ctx: partial!(Context, AssignmentP)) -> Model {
    Model {
        assignment: ctx.part(AssignmentP).assignment().to_vec(),
    }
}

/// Evaluate a term in the model found by the most recent `solve` call (spec §6 "Model query").
///
/// Only meaningful while the solver's state is `Sat`.
pub fn term_value(mut ctx: partial!(Context, CcP, mut TermsP, TheoriesP), term: TermId) -> TermValue {
    let mut fresh = 0u32;
    term_value_rec(ctx.borrow(), term, &mut fresh)
}

fn term_value_rec(
    mut ctx: partial!(Context, CcP, mut TermsP, TheoriesP),
    term: TermId,
    fresh: &mut u32,
) -> TermValue {
    let ty = ctx.part(TermsP).store.type_of(term).clone();

    match ty {
        Type::Bool => {
            let true_term = ctx.part(TermsP).store.true_term();
            let true_node = ctx.part(CcP).find_term(true_term);
            let node = ctx.part(CcP).find_term(term);
            TermValue::Bool(node.is_some() && node == true_node)
        }
        Type::Uninterpreted(name) => synth_opaque(&name, fresh),
        Type::Datatype(dt_id) => {
            let node = ctx.part(CcP).find_term(term);
            let known = node.and_then(|n| ctx.part(TheoriesP).datatype.known_cstor_of(n));

            match known {
                Some((cstor, arg_nodes)) => {
                    let arg_terms: Vec<TermId> =
                        arg_nodes.iter().map(|&n| ctx.part(CcP).term_of(n)).collect();
                    let name = ctx
                        .part_mut(TermsP)
                        .types
                        .datatype(cstor.datatype)
                        .cstor(cstor.index)
                        .name
                        .clone();
                    let args = arg_terms
                        .into_iter()
                        .map(|t| term_value_rec(ctx.borrow(), t, fresh))
                        .collect();
                    TermValue::Cstor(name, args)
                }
                None => synth_datatype_value(ctx.borrow(), dt_id, fresh),
            }
        }
    }
}

/// Build a value for a datatype class that never got pinned to a constructor: the type's chosen
/// base constructor, applied to freshly synthesized arguments (spec §4.8).
fn synth_datatype_value(
    mut ctx: partial!(Context, mut TermsP),
    dt_id: DatatypeId,
    fresh: &mut u32,
) -> TermValue {
    let cstor_index = ctx.part_mut(TermsP).types.base_cstor(dt_id);
    let cstor = ctx.part(TermsP).types.datatype(dt_id).cstor(cstor_index).clone();

    let args = cstor
        .args
        .into_iter()
        .map(|arg_ty| synth_value_of_type(ctx.borrow(), &arg_ty, fresh))
        .collect();

    TermValue::Cstor(cstor.name, args)
}

fn synth_value_of_type(
    mut ctx: partial!(Context, mut TermsP),
    ty: &Type,
    fresh: &mut u32,
) -> TermValue {
    match ty {
        Type::Bool => TermValue::Bool(false),
        Type::Uninterpreted(name) => synth_opaque(name, fresh),
        Type::Datatype(id) => synth_datatype_value(ctx, *id, fresh),
    }
}

fn synth_opaque(sort_name: &str, fresh: &mut u32) -> TermValue {
    let id = *fresh;
    *fresh += 1;
    TermValue::Opaque(format!("{}#{}", sort_name, id).into_boxed_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::context::{set_var_count, Context};
    use crate::prop::enqueue_assignment;
    use crate::prop::Reason;

    #[test]
    fn boolean_model_reads_back_the_assignment() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 2);
        enqueue_assignment(ctx.borrow(), lit!(1), Reason::Unit);
        enqueue_assignment(ctx.borrow(), lit!(-2), Reason::Unit);

        let model = reconstruct(ctx.borrow());
        assert!(model.lit_is_true(lit!(1)));
        assert!(model.lit_is_true(lit!(-2)));
        assert!(!model.lit_is_true(lit!(2)));
    }

    #[test]
    fn unconstrained_finite_datatype_synthesizes_base_cstor() {
        use crate::context::TheoriesP;

        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let dt_id = {
            let (theories, mut rest) = ctx.split_part_mut(TheoriesP);
            let terms = rest.part_mut(TermsP);
            let (dt_id, _symbols) = theories.datatype.declare_datatype(
                &mut terms.store,
                &mut terms.types,
                "T",
                vec![("A".into(), vec![]), ("B".into(), vec![])],
            );
            dt_id
        };

        let t = {
            let terms = ctx.part_mut(TermsP);
            let sym = terms.store.intern_symbol("x");
            terms.store.mk_const(sym, Type::Datatype(dt_id))
        };

        // Never added to the congruence closure, so this resolves through `synth_datatype_value`.
        let value = term_value(ctx.borrow(), t);
        match value {
            TermValue::Cstor(name, args) => {
                assert!(&*name == "A" || &*name == "B");
                assert!(args.is_empty());
            }
            other => panic!("expected a constructor value, got {:?}", other),
        }
    }
}
