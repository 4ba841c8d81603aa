//! The theory plugin multiplexer: term/type storage, the boolean atom/congruence-closure
//! bridge, and the `on_assume`/`partial_check`/`final_check`/`push_level`/`pop_levels` entry
//! points the SAT core drives (spec §4.6, §4.7, §4.8).
//!
//! There is only one plugin today, the datatype theory, so `Theories` owns it directly rather
//! than dispatching over a collection. Adding a second theory would turn the bodies of
//! `partial_check`/`final_check`/`push_level`/`pop_levels` into a loop over a `Vec` of plugins;
//! until then the direct field access is simpler and the borrow checker is happier for it.
use rustc_hash::FxHashMap;

use partial_ref::{partial, PartialRef};

use smt_formula::term::{Symbol, TermId, TermStore, TermView};
use smt_formula::types::{Cardinality, CstorId, TypeStore};
use smt_formula::{Lit, Var};

use crate::clause::{db, ClauseHeader, Tier};
use crate::context::{
    AnalyzeConflictP, AssignmentP, BinaryClausesP, CcP, ClauseAllocP, ClauseDbP, Context,
    ImplGraphP, SolverConfigP, TermsP, TheoriesP, TmpDataP, TrailP, VsidsP, WatchlistsP,
};
use crate::context::ensure_var_count;
use crate::journal::Journal;
use crate::prop::{enqueue_assignment, ExplanationId, Reason};
use crate::theory::cc::{Cc, CcEvent, Explanation};
use crate::theory::datatype::{self, DatatypeTheory};
use crate::theory::TheoryResult;

/// Term/type storage plus the boolean atom/congruence-closure bridge.
///
/// Every boolean-sorted term that some literal stands for (an equality, a `distinct`, an
/// `is-C` tester, ...) is registered here the first time [`term_lit`] allocates or looks up its
/// literal. The map is from term to *unsigned* variable: `TermView::Not` is peeled off by
/// `term_lit` rather than getting its own atom, so the bridge only ever needs the non-negated
/// direction.
#[derive(Default)]
pub struct Terms {
    pub store: TermStore,
    pub types: TypeStore,
    atom_to_var: FxHashMap<TermId, Var>,
    var_to_atom: Vec<Option<TermId>>,
}

impl Terms {
    /// The atom term a variable stands for, if any (plain propositional variables have none).
    pub fn atom_of(&self, var: Var) -> Option<TermId> {
        self.var_to_atom.get(var.index()).copied().flatten()
    }

    fn existing_atom_var(&self, term: TermId) -> Option<Var> {
        self.atom_to_var.get(&term).copied()
    }

    fn register_atom(&mut self, term: TermId, var: Var) {
        self.atom_to_var.insert(term, var);
        if self.var_to_atom.len() <= var.index() {
            self.var_to_atom.resize(var.index() + 1, None);
        }
        self.var_to_atom[var.index()] = Some(term);
    }

    /// Every registered `(term, variable)` atom pair, snapshotted so callers can scan them while
    /// mutating other context parts.
    fn atoms_snapshot(&self) -> impl Iterator<Item = (TermId, Var)> + '_ {
        self.atom_to_var.iter().map(|(&term, &var)| (term, var))
    }
}

/// Backtrackable bookkeeping that isn't owned by the congruence closure or the datatype theory
/// themselves: how much of the trail [`on_assume`] has already seen, and facts learned from
/// assumed literals that still need to be turned into congruence-closure merges.
enum TheoriesUndo {
    TrailCursor(usize),
    PendingIsTrue,
    PendingDiseq,
}

/// Owns the datatype theory, the propagation explanation arena, and the atom-driven assumption
/// queue. One per solver; see the module comment for why this isn't a collection of plugins.
#[derive(Default)]
pub struct Theories {
    pub datatype: DatatypeTheory,
    explanations: Vec<Box<[Lit]>>,
    trail_cursor: usize,
    /// `is-C(t)` atoms assumed true whose class has no known constructor yet, waiting for
    /// `partial_check`'s selector-reduction pass.
    pending_is_true: Vec<(CstorId, TermId, Lit)>,
    /// Term pairs asserted apart by a negative equality or `distinct` atom, checked against
    /// every merge.
    pending_diseq: Vec<(TermId, TermId, Lit)>,
    journal: Journal<TheoriesUndo>,
}

impl Theories {
    /// The literals that justify a theory-propagated literal, by the id stashed in its
    /// [`Reason::ThReason`]/[`crate::prop::Conflict::Theory`].
    pub fn explanation(&self, id: ExplanationId) -> &[Lit] {
        &self.explanations[id.0 as usize]
    }

    /// Stash a freshly produced set of justifying literals and hand back the id the SAT core
    /// threads through [`Reason::ThReason`]/[`crate::prop::Conflict::Theory`]. Used both by the
    /// atom-propagation path in this module and, for conflicts, by [`crate::cdcl`] when a
    /// `partial_check`/`final_check` call returns [`TheoryResult::Conflict`].
    pub fn push_explanation(&mut self, lits: Vec<Lit>) -> ExplanationId {
        let id = ExplanationId(self.explanations.len() as u32);
        self.explanations.push(lits.into_boxed_slice());
        id
    }

    fn push_pending_is_true(&mut self, cstor: CstorId, term: TermId, lit: Lit) {
        self.pending_is_true.push((cstor, term, lit));
        self.journal.record(TheoriesUndo::PendingIsTrue);
    }

    fn push_pending_diseq(&mut self, a: TermId, b: TermId, lit: Lit) {
        self.pending_diseq.push((a, b, lit));
        self.journal.record(TheoriesUndo::PendingDiseq);
    }

    fn set_cursor(&mut self, cursor: usize) {
        self.journal.record(TheoriesUndo::TrailCursor(self.trail_cursor));
        self.trail_cursor = cursor;
    }

    pub fn push_level(&mut self) {
        self.datatype.push_level();
        self.journal.push_level();
    }

    pub fn pop_levels(&mut self, levels: usize) {
        self.datatype.pop_levels(levels);
        let Theories {
            journal,
            trail_cursor,
            pending_is_true,
            pending_diseq,
            ..
        } = self;
        journal.pop_levels(levels, |undo| match undo {
            TheoriesUndo::TrailCursor(old) => *trail_cursor = old,
            TheoriesUndo::PendingIsTrue => {
                pending_is_true.pop();
            }
            TheoriesUndo::PendingDiseq => {
                pending_diseq.pop();
            }
        });
    }
}

/// Register the solver's `true`/`false` terms with the congruence closure. Call once, before the
/// first [`term_lit`]/[`partial_check`] call; idempotent like every other [`Cc::add_term`] call.
pub fn init(mut ctx: partial!(Context, mut CcP, mut TermsP)) {
    let (terms, mut ctx) = ctx.split_part_mut(TermsP);
    ctx.part_mut(CcP).add_term(&terms.store, terms.store.true_term());
    ctx.part_mut(CcP).add_term(&terms.store, terms.store.false_term());
}

/// The literal standing for a boolean-sorted term, allocating a fresh variable and registering
/// it with the congruence closure the first time the term is seen.
pub fn term_lit(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut CcP,
        mut ImplGraphP,
        mut TermsP,
        mut TmpDataP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    term: TermId,
) -> Lit {
    if let TermView::Not(inner) = ctx.part(TermsP).store.view(term).clone() {
        return !term_lit(ctx.borrow(), inner);
    }

    if let Some(var) = ctx.part(TermsP).existing_atom_var(term) {
        return var.positive();
    }

    let new_count = ctx.part(AssignmentP).assignment().len() + 1;
    ensure_var_count(ctx.borrow(), new_count);
    let var = Var::from_index(new_count - 1);

    let (terms, mut ctx) = ctx.split_part_mut(TermsP);
    terms.register_atom(term, var);
    ctx.part_mut(CcP).add_term(&terms.store, term);

    var.positive()
}

/// Feed one newly-assumed literal to the congruence closure: equalities merge directly,
/// disequalities and `is-C` facts are queued for [`run_to_fixpoint`] to turn into merges and
/// selector-reduction equations.
fn on_assume_lit(mut ctx: partial!(Context, mut CcP, mut TermsP, mut TheoriesP), lit: Lit) {
    let term = match ctx.part(TermsP).atom_of(lit.var()) {
        Some(term) => term,
        None => return,
    };
    let view = ctx.part(TermsP).store.view(term).clone();

    match view {
        TermView::Eq(a, b) => {
            if lit.is_positive() {
                let (terms, mut ctx) = ctx.split_part_mut(TermsP);
                ctx.part_mut(CcP).assert_eq(&terms.store, a, b, lit);
            } else {
                let (terms, mut ctx) = ctx.split_part_mut(TermsP);
                ctx.part_mut(CcP).add_term(&terms.store, a);
                ctx.part_mut(CcP).add_term(&terms.store, b);
                ctx.part_mut(TheoriesP).push_pending_diseq(a, b, lit);
            }
        }
        TermView::Distinct(args) if lit.is_positive() => {
            let (terms, mut ctx) = ctx.split_part_mut(TermsP);
            for &a in args.iter() {
                ctx.part_mut(CcP).add_term(&terms.store, a);
            }
            for i in 0..args.len() {
                for j in (i + 1)..args.len() {
                    ctx.part_mut(TheoriesP)
                        .push_pending_diseq(args[i], args[j], lit);
                }
            }
        }
        TermView::IsCstor(c, u) if lit.is_positive() => {
            let (terms, mut ctx) = ctx.split_part_mut(TermsP);
            ctx.part_mut(CcP).add_term(&terms.store, u);
            ctx.part_mut(TheoriesP).push_pending_is_true(c, u, lit);
        }
        _ => {}
    }
}

/// Drain congruence-closure events to a fixpoint, routing each through the datatype theory.
/// Returns a conflict clause the first time the theory contradicts itself.
fn settle_cc_events(mut ctx: partial!(Context, mut CcP, mut TermsP, mut TheoriesP)) -> Option<Vec<Lit>> {
    loop {
        let events = ctx.part_mut(CcP).take_events();
        if events.is_empty() {
            return None;
        }
        for event in events {
            let (cc, mut rest) = ctx.split_part_mut(CcP);
            let (theories, mut rest) = rest.split_part_mut(TheoriesP);
            let (terms, _rest) = rest.split_part_mut(TermsP);

            match event {
                CcEvent::NewTerm(node) => {
                    datatype::on_new_term(&mut theories.datatype, cc, &terms.store, &mut terms.types, node);
                }
                CcEvent::Merged { root, absorbed } => {
                    if let Some(conflict) =
                        datatype::on_merged(&mut theories.datatype, cc, &terms.store, root, absorbed)
                    {
                        return Some(conflict);
                    }
                }
            }
        }
    }
}

/// Check every pending disequality against the current congruence classes; the first violated
/// one yields a conflict clause.
fn check_pending_diseq(ctx: partial!(Context, CcP, mut TheoriesP)) -> Option<Vec<Lit>> {
    let cc = ctx.part(CcP);
    let violated = ctx
        .part(TheoriesP)
        .pending_diseq
        .iter()
        .find(|&&(a, b, _)| cc.find_term(a) == cc.find_term(b))
        .copied();

    violated.map(|(a, b, lit)| {
        let mut conflict: Vec<Lit> = cc.explain(a, b).into_iter().map(|l| !l).collect();
        conflict.push(!lit);
        conflict
    })
}

/// Turn every still-pending `is-C(t)` fact into an actual constructor witness, via fresh
/// selector applications: `t = C(sel_0(t), ..., sel_{k-1}(t))` (spec §4.8's selector-reduction
/// rule). This is what lets the datatype theory learn a constructor for `t` even when it was
/// never literally built as `C(...)`, only asserted to be one via a tester.
fn apply_selector_reductions(
    mut ctx: partial!(Context, mut CcP, mut TermsP, mut TheoriesP),
) -> bool {
    let pending = std::mem::take(&mut ctx.part_mut(TheoriesP).pending_is_true);
    if pending.is_empty() {
        ctx.part_mut(TheoriesP).pending_is_true = pending;
        return false;
    }

    for (cstor, term, lit) in pending {
        let (terms, mut rest) = ctx.split_part_mut(TermsP);
        let node = terms.store.view(term);
        let _ = node;
        let u_node = rest.part_mut(CcP).add_term(&terms.store, term);
        let rep = rest.part(CcP).find(u_node);

        if rest.part(TheoriesP).datatype.has_known_cstor(rest.part(CcP), rep) {
            continue;
        }

        let symbol = terms.types.datatype(cstor.datatype).cstor(cstor.index).name.clone();
        let symbol: Symbol = terms.store.intern_symbol(symbol);
        let arg_types = terms.types.datatype(cstor.datatype).cstor(cstor.index).args.clone();

        let arg_terms: Vec<TermId> = arg_types
            .iter()
            .enumerate()
            .map(|(i, ty)| terms.store.mk_selector(cstor, i as u32, term, ty.clone()))
            .collect();
        let ctor_ty = smt_formula::Type::Datatype(cstor.datatype);
        let ctor_term = terms.store.mk_app(symbol, arg_terms, ctor_ty);

        let ctor_node = rest.part_mut(CcP).add_term(&terms.store, ctor_term);
        rest.part_mut(CcP)
            .merge(u_node, ctor_node, Explanation::Theory(Box::new([lit])));
    }

    true
}

/// Scan every registered atom and propagate the ones whose congruence class now coincides with
/// `true`/`false` but whose literal isn't assigned yet. Returns whether anything was propagated.
fn propagate_atoms(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut CcP,
        mut ImplGraphP,
        mut TermsP,
        mut TheoriesP,
        mut TrailP,
    ),
) -> Option<Vec<Lit>> {
    let (terms, mut rest) = ctx.split_part_mut(TermsP);
    let true_node = rest.part(CcP).find_term(terms.store.true_term());
    let false_node = rest.part(CcP).find_term(terms.store.false_term());

    let atoms: Vec<(TermId, Var)> = terms
        .atoms_snapshot()
        .collect();

    let mut progressed = false;

    for (term, var) in atoms {
        if rest.part(AssignmentP).var_value(var).is_some() {
            continue;
        }
        let node = match rest.part(CcP).find_term(term) {
            Some(node) => node,
            None => continue,
        };

        let forced = if Some(node) == true_node {
            Some(true)
        } else if Some(node) == false_node {
            Some(false)
        } else {
            None
        };

        if let Some(value) = forced {
            let target = if value { true_node } else { false_node }.unwrap();
            let lits = rest.part(CcP).explain_nodes(node, target);
            let id = rest.part_mut(TheoriesP).push_explanation(lits);
            enqueue_assignment(rest.borrow(), Lit::from_var(var, value), Reason::ThReason(id));
            progressed = true;
        }
    }

    // Every propagation here goes through `enqueue_assignment`, never a direct conflict: the
    // caller already skips atoms that are assigned, so the assignment this function makes is
    // always to a previously-unassigned variable. `partial_check` notices the trail grew past
    // its cursor and reports `Progress`; a real contradiction surfaces later as an ordinary SAT
    // propagation conflict once the forced value collides with another unit.
    let _ = progressed;
    None
}

/// Add an already-literal'd axiom clause directly to the appropriate clause storage, bypassing
/// the input-loading preprocessing in [`crate::load`] (these literals are always fresh, never
/// duplicated or already falsified).
fn add_axiom_clause(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
    ),
    lits: Vec<Lit>,
) {
    match lits.len() {
        0 => {}
        1 => enqueue_assignment(ctx.borrow(), lits[0], Reason::Unit),
        2 => ctx
            .part_mut(BinaryClausesP)
            .add_binary_clause([lits[0], lits[1]]),
        _ => {
            let mut header = ClauseHeader::new();
            header.set_tier(Tier::Irred);
            db::add_clause(ctx.borrow(), header, &lits);
        }
    }
}

/// Advance past every trail entry [`on_assume`] hasn't seen yet, then settle the congruence
/// closure (including selector reduction) to a fixpoint. Returns a conflict clause the first
/// time the theory contradicts the trail.
fn run_to_fixpoint(
    mut ctx: partial!(Context, mut CcP, mut TermsP, mut TheoriesP, mut TrailP),
) -> Option<Vec<Lit>> {
    let trail_len = ctx.part(TrailP).trail().len();
    let cursor = ctx.part(TheoriesP).trail_cursor;

    if cursor < trail_len {
        let new_lits: Vec<Lit> = ctx.part(TrailP).trail()[cursor..].to_vec();
        ctx.part_mut(TheoriesP).set_cursor(trail_len);
        for lit in new_lits {
            on_assume_lit(ctx.borrow(), lit);
        }
    }

    loop {
        if let Some(conflict) = settle_cc_events(ctx.borrow()) {
            return Some(conflict);
        }
        if let Some(conflict) = check_pending_diseq(ctx.borrow()) {
            return Some(conflict);
        }
        if !apply_selector_reductions(ctx.borrow()) {
            break;
        }
    }

    None
}

/// Called once per new trail entry by the SAT core (spec §4.6). A thin wrapper around
/// [`run_to_fixpoint`]'s bookkeeping: conflicts found here are reported back on the next
/// [`partial_check`] call rather than threaded through `on_assume` itself, since the `Theory`
/// contract gives `on_assume` no return value.
pub fn on_assume(ctx: partial!(Context, mut CcP, mut TermsP, mut TheoriesP, mut TrailP)) {
    run_to_fixpoint(ctx);
}

/// Called once propagation reaches quiescence (spec §4.6).
pub fn partial_check(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut CcP,
        mut ImplGraphP,
        mut TermsP,
        mut TheoriesP,
        mut TrailP,
    ),
) -> TheoryResult {
    if let Some(conflict) = run_to_fixpoint(ctx.borrow()) {
        return TheoryResult::Conflict(conflict);
    }
    match propagate_atoms(ctx.borrow()) {
        Some(conflict) => TheoryResult::Conflict(conflict),
        None => {
            if ctx.part(TheoriesP).trail_cursor == ctx.part(TrailP).trail().len() {
                TheoryResult::Ok
            } else {
                TheoryResult::Progress
            }
        }
    }
}

/// Called before the SAT core declares the formula satisfiable (spec §4.6, §4.8): checks
/// acyclicity and, if configured, emits an exhaustive case-split for any finite-datatype class
/// that still doesn't have one.
pub fn final_check(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut CcP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TermsP,
        mut TheoriesP,
        mut TrailP,
        mut WatchlistsP,
        AnalyzeConflictP,
        SolverConfigP,
        VsidsP,
        TmpDataP,
    ),
) -> TheoryResult {
    match partial_check(ctx.borrow()) {
        TheoryResult::Conflict(c) => return TheoryResult::Conflict(c),
        TheoryResult::Progress => return TheoryResult::Progress,
        TheoryResult::Ok => {}
    }

    if let Some(conflict) = check_acyclicity(ctx.borrow()) {
        return TheoryResult::Conflict(conflict);
    }

    if !ctx.part(SolverConfigP).datatype_case_splits {
        return TheoryResult::Ok;
    }

    let to_decide: Vec<_> = ctx.part(TheoriesP).datatype.to_decide().collect();
    let mut progressed = false;

    for node in to_decide {
        let (cc, mut rest) = ctx.split_part_mut(CcP);
        let rep = cc.find(node);
        let rep_term = cc.term_of(rep);

        let (terms, mut rest2) = rest.split_part_mut(TermsP);
        let (theories, _rest3) = rest2.split_part_mut(TheoriesP);

        let clauses = datatype::case_split_clauses(&mut theories.datatype, &mut terms.store, &terms.types, rep_term);

        if let Some(clauses) = clauses {
            for clause_terms in clauses {
                let lits: Vec<Lit> = clause_terms
                    .into_iter()
                    .map(|t| term_lit(ctx.borrow(), t))
                    .collect();
                add_axiom_clause(ctx.borrow(), lits);
            }
            progressed = true;
        }
    }

    if progressed {
        TheoryResult::Progress
    } else {
        TheoryResult::Ok
    }
}

/// Occurs-check over every class with a known constructor: a cycle means some class would have
/// to contain itself as a (possibly indirect) argument, which is unsatisfiable for any algebraic
/// datatype (spec §4.8).
fn check_acyclicity(ctx: partial!(Context, CcP, TheoriesP)) -> Option<Vec<Lit>> {
    use crate::theory::cc::ENodeId;
    use std::collections::HashMap;

    let cc = ctx.part(CcP);
    let theories = ctx.part(TheoriesP);

    let mut edges: HashMap<ENodeId, Vec<(ENodeId, ENodeId)>> = HashMap::new();
    for (rep, _cstor, args) in theories.datatype.known_classes() {
        let out = args
            .iter()
            .map(|&a| (a, cc.find(a)))
            .collect();
        edges.insert(rep, out);
    }

    let mut color: HashMap<ENodeId, DfsColor> =
        edges.keys().map(|&k| (k, DfsColor::White)).collect();
    let mut path: Vec<(ENodeId, ENodeId, ENodeId)> = vec![];

    for &start in edges.keys() {
        if color[&start] != DfsColor::White {
            continue;
        }
        if let Some(cycle) = dfs_find_cycle(&edges, &mut color, &mut path, start) {
            let mut lits = vec![];
            let mut seen = std::collections::HashSet::new();
            for (from_rep, arg_node, to_rep) in cycle {
                let witness = theories
                    .datatype
                    .known_witness(to_rep)
                    .unwrap_or(to_rep);
                let _ = from_rep;
                for l in cc.explain_nodes(arg_node, witness) {
                    if seen.insert(l) {
                        lits.push(l);
                    }
                }
            }
            return Some(lits.into_iter().map(|l| !l).collect());
        }
    }

    None
}

/// Three-color DFS marking (white = unvisited, gray = on the current path, black = fully
/// explored). A gray node reached again is a back edge: the cycle is the suffix of `path`
/// from that node onward, plus the closing edge.
#[derive(Clone, Copy, PartialEq)]
enum DfsColor {
    White,
    Gray,
    Black,
}

fn dfs_find_cycle(
    edges: &std::collections::HashMap<
        crate::theory::cc::ENodeId,
        Vec<(crate::theory::cc::ENodeId, crate::theory::cc::ENodeId)>,
    >,
    color: &mut std::collections::HashMap<crate::theory::cc::ENodeId, DfsColor>,
    path: &mut Vec<(
        crate::theory::cc::ENodeId,
        crate::theory::cc::ENodeId,
        crate::theory::cc::ENodeId,
    )>,
    start: crate::theory::cc::ENodeId,
) -> Option<
    Vec<(
        crate::theory::cc::ENodeId,
        crate::theory::cc::ENodeId,
        crate::theory::cc::ENodeId,
    )>,
> {
    color.insert(start, DfsColor::Gray);

    if let Some(out) = edges.get(&start) {
        for &(arg_node, to_rep) in out {
            match color.get(&to_rep).copied().unwrap_or(DfsColor::Black) {
                DfsColor::White => {
                    path.push((start, arg_node, to_rep));
                    if let Some(cycle) = dfs_find_cycle(edges, color, path, to_rep) {
                        return Some(cycle);
                    }
                    path.pop();
                }
                DfsColor::Gray => {
                    let pos = path
                        .iter()
                        .position(|&(from, _, _)| from == to_rep)
                        .unwrap_or(path.len());
                    let mut cycle: Vec<_> = path[pos..].to_vec();
                    cycle.push((start, arg_node, to_rep));
                    return Some(cycle);
                }
                DfsColor::Black => {}
            }
        }
    }

    color.insert(start, DfsColor::Black);
    None
}

pub fn push_level(mut ctx: partial!(Context, mut CcP, mut TheoriesP)) {
    ctx.part_mut(CcP).push_level();
    ctx.part_mut(TheoriesP).push_level();
}

pub fn pop_levels(mut ctx: partial!(Context, mut CcP, mut TheoriesP), levels: usize) {
    ctx.part_mut(CcP).pop_levels(levels);
    ctx.part_mut(TheoriesP).pop_levels(levels);
}
