//! The solver's public interface: a CDCL core driven through a pluggable datatype theory.
use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};

use smt_formula::term::{Symbol, TermId, TermStore};
use smt_formula::types::{DatatypeId, Type, TypeStore};
use smt_formula::{CnfFormula, Lit};

use crate::config::{SolverConfig, SolverOptions};
use crate::context::{config_changed, ensure_var_count, Context, ScheduleP, SolverStateP};
use crate::error::SolverError;
use crate::incremental::set_assumptions;
use crate::load::load_clause;
use crate::model::{self, Model, TermValue};
use crate::proof::{NullTracer, Proof, ProofTracer};
use crate::resource::ResourceBudget;
use crate::schedule::schedule_step;
use crate::state::{Outcome, SatState};
use crate::theory::framework;

/// A CDCL core combined with a congruence closure and a datatype theory.
///
/// The boolean skeleton (clauses, assumptions, the model's boolean part) is driven through
/// [`assume`](Solver::assume) and [`solve`](Solver::solve) exactly as in a plain SAT solver;
/// terms and datatype declarations go through [`term_lit`](Solver::term_lit),
/// [`assert_term`](Solver::assert_term) and [`declare_datatype`](Solver::declare_datatype), which
/// route through the atom/congruence-closure bridge in [`crate::theory::framework`].
pub struct Solver {
    ctx: Box<Context>,
    budget: ResourceBudget,
    model: Option<Model>,
    /// Number of open [`push_level`](Solver::push_level) calls, tracked here so
    /// [`pop_levels`](Solver::pop_levels) can reject an over-pop with a
    /// [`SolverError::InvariantViolation`] instead of underflowing the theories' journals.
    level: usize,
}

impl Default for Solver {
    fn default() -> Solver {
        Solver::create(SolverOptions::default(), Box::new(NullTracer))
    }
}

impl Solver {
    /// Create a solver with the given options and proof tracer.
    pub fn create(options: SolverOptions, tracer: Box<dyn ProofTracer>) -> Solver {
        let mut ctx = Box::<Context>::default();
        ctx.solver_config = options.config;
        ctx.proof = Proof::new(tracer);

        {
            let mut ctx_ref = ctx.into_partial_ref_mut();
            config_changed(ctx_ref.borrow());
            framework::init(ctx_ref.borrow());
        }

        Solver {
            ctx,
            budget: ResourceBudget::default(),
            model: None,
            level: 0,
        }
    }

    /// Replace the resource budget [`solve`](Solver::solve) polls between schedule steps.
    pub fn set_resource_budget(&mut self, budget: ResourceBudget) {
        self.budget = budget;
    }

    /// Replace the tuning parameters used during solving.
    pub fn set_config(&mut self, config: SolverConfig) {
        self.ctx.solver_config = config;
        let mut ctx = self.ctx.into_partial_ref_mut();
        config_changed(ctx.borrow());
    }

    /// Add a batch of clauses over plain propositional variables.
    pub fn assume(&mut self, clauses: &CnfFormula) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ensure_var_count(ctx.borrow(), clauses.var_count());
        for clause in clauses.iter() {
            load_clause(ctx.borrow(), clause);
        }
    }

    /// Like [`assume`](Solver::assume), but fails fast with [`SolverError::RootUnsat`] if the
    /// added clauses make the formula unsatisfiable at the root decision level (spec §7's
    /// "Root-level unsat" error kind), rather than silently leaving the solver in that state for
    /// the next [`solve`](Solver::solve) call to report.
    pub fn assume_checked(&mut self, clauses: &CnfFormula) -> Result<(), SolverError> {
        self.assume(clauses);
        if self.ctx.solver_state.sat_state == SatState::Unsat {
            Err(SolverError::RootUnsat)
        } else {
            Ok(())
        }
    }

    /// Allocate (or look up) the literal standing for a boolean-sorted term, registering it with
    /// the congruence closure the first time the term is seen.
    pub fn term_lit(&mut self, term: TermId) -> Lit {
        let mut ctx = self.ctx.into_partial_ref_mut();
        framework::term_lit(ctx.borrow(), term)
    }

    /// Assert a term as a unit clause, in the given polarity.
    ///
    /// This is the entry point a term-level front end uses instead of building `CnfFormula`s by
    /// hand: it goes through the same atom/congruence-closure bridge as
    /// [`term_lit`](Solver::term_lit), so equalities, `distinct`s and datatype testers assert
    /// exactly as they would appear in a clause built from their literal.
    pub fn assert_term(&mut self, term: TermId, polarity: bool) {
        let lit = self.term_lit(term);
        let lit = if polarity { lit } else { !lit };
        let mut ctx = self.ctx.into_partial_ref_mut();
        load_clause(ctx.borrow(), &[lit]);
    }

    /// Declare a datatype and intern a constructor symbol for each of its constructors.
    ///
    /// Bypasses the `partial_ref` machinery: this is a single self-contained helper call, not a
    /// multi-function borrow that needs to cross a function boundary, so plain disjoint field
    /// access on [`Context`] is simpler than invoking `partial!`.
    pub fn declare_datatype(
        &mut self,
        name: impl Into<Box<str>>,
        cstors: Vec<(Box<str>, Vec<Type>)>,
    ) -> (DatatypeId, Vec<Symbol>) {
        let ctx = &mut *self.ctx;
        ctx.theories.datatype.declare_datatype(
            &mut ctx.terms.store,
            &mut ctx.terms.types,
            name,
            cstors,
        )
    }

    /// Declare a datatype whose constructors may refer back to the datatype's own id, for
    /// recursive fields (e.g. `cons(head: Int, tail: List)`): `build_cstors` is called with the
    /// freshly reserved id before any constructor exists.
    pub fn declare_datatype_with(
        &mut self,
        name: impl Into<Box<str>>,
        build_cstors: impl FnOnce(DatatypeId) -> Vec<(Box<str>, Vec<Type>)>,
    ) -> (DatatypeId, Vec<Symbol>) {
        let ctx = &mut *self.ctx;
        ctx.theories.datatype.declare_datatype_with(
            &mut ctx.terms.store,
            &mut ctx.terms.types,
            name,
            build_cstors,
        )
    }

    /// The term store, for building terms to pass to [`term_lit`](Solver::term_lit)/
    /// [`assert_term`](Solver::assert_term).
    pub fn store_mut(&mut self) -> &mut TermStore {
        &mut self.ctx.terms.store
    }

    /// The type store, for querying cardinality or declared datatypes.
    pub fn types(&mut self) -> &mut TypeStore {
        &mut self.ctx.terms.types
    }

    /// Open a new decision level in the congruence closure and datatype theory, matching a
    /// `push` on the boolean assumption stack the caller is about to build on top of.
    pub fn push_level(&mut self) {
        self.level += 1;
        let mut ctx = self.ctx.into_partial_ref_mut();
        framework::push_level(ctx.borrow());
    }

    /// Undo `levels` levels pushed by [`push_level`](Solver::push_level).
    ///
    /// Fails with [`SolverError::InvariantViolation`] rather than underflowing the theories'
    /// journals if `levels` exceeds the number of levels currently open (spec §3's "Backtrackable
    /// state has stack-depth equal to the current decision level" invariant, checked at the
    /// solver's own boundary rather than left to panic deep inside a journal).
    pub fn pop_levels(&mut self, levels: usize) -> Result<(), SolverError> {
        if levels > self.level {
            return Err(SolverError::InvariantViolation(format!(
                "pop_levels({}) requested but only {} levels are open",
                levels, self.level
            )));
        }
        self.level -= levels;
        let mut ctx = self.ctx.into_partial_ref_mut();
        framework::pop_levels(ctx.borrow(), levels);
        Ok(())
    }

    /// Solve under the given assumptions, polling the resource budget once per schedule step.
    pub fn solve(&mut self, assumptions: &[Lit]) -> Outcome {
        {
            let min_count = assumptions.iter().map(|l| l.index() + 1).max().unwrap_or(0);
            let mut ctx = self.ctx.into_partial_ref_mut();
            ensure_var_count(ctx.borrow(), min_count);
            set_assumptions(ctx.borrow(), assumptions);
        }

        let outcome = loop {
            let conflicts = {
                let ctx = self.ctx.into_partial_ref();
                ctx.part(ScheduleP).conflicts()
            };

            if self.budget.check(conflicts).is_err() {
                break if self.budget.is_interrupted() {
                    Outcome::Interrupted
                } else {
                    Outcome::ResourceOut
                };
            }

            let mut ctx = self.ctx.into_partial_ref_mut();
            if !schedule_step(ctx.borrow()) {
                break match ctx.part(SolverStateP).sat_state {
                    SatState::Sat => Outcome::Sat,
                    SatState::Unsat => Outcome::Unsat,
                    SatState::UnsatUnderAssumptions => Outcome::UnsatUnderAssumptions,
                    SatState::Unknown => unreachable!("schedule_step only stops on a final state"),
                };
            }
        };

        self.model = if outcome == Outcome::Sat {
            let mut ctx = self.ctx.into_partial_ref_mut();
            Some(model::reconstruct(ctx.borrow()))
        } else {
            None
        };

        outcome
    }

    /// The model found by the most recent [`solve`](Solver::solve) call, if it returned
    /// [`Outcome::Sat`].
    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    /// Evaluate a term in the model found by the most recent [`solve`](Solver::solve) call.
    /// Returns `None` unless that call returned [`Outcome::Sat`].
    pub fn term_value(&mut self, term: TermId) -> Option<TermValue> {
        if self.model.is_none() {
            return None;
        }
        let mut ctx = self.ctx.into_partial_ref_mut();
        Some(model::term_value(ctx.borrow(), term))
    }

    /// The subset of the last `solve` call's assumptions that made it unsatisfiable, valid after
    /// an [`Outcome::UnsatUnderAssumptions`] result.
    pub fn failed_core(&self) -> &[Lit] {
        self.ctx.incremental.failed_core()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use smt_formula::test::{conditional_pigeon_hole, sat_formula, sgen_unsat_formula};
    use smt_formula::Var;

    proptest! {
        #[test]
        fn sgen_formulas_are_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::default();
            solver.assume(&formula);
            prop_assert_eq!(solver.solve(&[]), Outcome::Unsat);
        }

        #[test]
        fn sat_formulas_are_sat_and_the_model_satisfies_every_clause(
            formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0),
        ) {
            let mut solver = Solver::default();
            solver.assume(&formula);
            prop_assert_eq!(solver.solve(&[]), Outcome::Sat);

            let model = solver.model().unwrap().clone();
            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|&lit| model.lit_is_true(lit)));
            }
        }

        #[test]
        fn pigeon_hole_assumption_core_always_has_columns_plus_one_literals(
            (enable_row, columns, formula) in conditional_pigeon_hole(1..5usize, 1..5usize),
        ) {
            let mut solver = Solver::default();
            solver.assume(&formula);

            let mut assumptions = enable_row;
            prop_assert_eq!(solver.solve(&assumptions), Outcome::Sat);

            assumptions.push(Lit::positive(Var::from_index(formula.var_count() + 10)));

            prop_assert_eq!(solver.solve(&assumptions), Outcome::UnsatUnderAssumptions);

            let mut candidates = solver.failed_core().to_owned();
            let mut core = vec![];

            while !candidates.is_empty() {
                let without_last = candidates[0..candidates.len() - 1].to_owned();
                match solver.solve(&without_last) {
                    Outcome::Sat => {
                        let skipped = *candidates.last().unwrap();
                        core.push(skipped);
                        solver.assume(&CnfFormula::from(Some([skipped])));
                        candidates = vec![];
                    }
                    Outcome::UnsatUnderAssumptions => {
                        candidates = solver.failed_core().to_owned();
                    }
                    other => panic!("unexpected outcome {:?}", other),
                }
            }

            prop_assert_eq!(core.len(), columns + 1);
        }
    }

    #[test]
    fn resource_budget_stops_the_search() {
        let mut solver = Solver::default();
        solver.set_resource_budget(ResourceBudget::new().with_conflict_limit(0));

        let formula = CnfFormula::from(vec![vec![lit!(1), lit!(2)], vec![lit!(-1), lit!(-2)]]);
        solver.assume(&formula);

        assert_eq!(solver.solve(&[]), Outcome::ResourceOut);
    }

    #[test]
    fn datatype_terms_assert_and_solve_through_the_atom_bridge() {
        let mut solver = Solver::default();
        let (dt, cstors) = solver.declare_datatype("T", vec![("A".into(), vec![]), ("B".into(), vec![])]);

        let x_sym = solver.store_mut().intern_symbol("x");
        let x = solver.store_mut().mk_const(x_sym, Type::Datatype(dt));
        let a = solver.store_mut().mk_app(cstors[0], vec![], Type::Datatype(dt));
        let eq = solver.store_mut().mk_eq(x, a);

        solver.assert_term(eq, true);

        assert_eq!(solver.solve(&[]), Outcome::Sat);
        match solver.term_value(x).unwrap() {
            TermValue::Cstor(name, args) => {
                assert_eq!(&*name, "A");
                assert!(args.is_empty());
            }
            other => panic!("expected a constructor value, got {:?}", other),
        }
    }
}
