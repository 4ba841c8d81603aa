//! The datatype theory: injectivity, disjointness, selector reduction, acyclicity and
//! exhaustive case-split over algebraic datatypes (spec §4.8).
//!
//! This is the one theory plugin the solver ships; it exists to exercise the congruence closure
//! and the SAT↔theory loop with a non-trivial client. Its state -- which class has a known
//! constructor, and which `is-C`/selector applications are waiting on one -- is backtracked the
//! same way the congruence closure is, through its own [`Journal`].
use rustc_hash::{FxHashMap, FxHashSet};

use smt_formula::term::{Symbol, TermId, TermStore, TermView};
use smt_formula::types::{Cardinality, CstorId, Cstor, DatatypeId, Type, TypeStore};
use smt_formula::Lit;

use crate::journal::Journal;
use crate::theory::cc::{Cc, ENodeId, Explanation};

#[derive(Clone)]
struct KnownCstor {
    cstor: CstorId,
    /// The e-node whose term is literally `C(args...)`.
    witness: ENodeId,
    args: Box<[ENodeId]>,
}

enum DtUndo {
    KnownCstor(ENodeId, Option<KnownCstor>),
    IsParentsLen(ENodeId, usize),
    SelParentsLen(ENodeId, usize),
    ToDecideInsert(ENodeId),
    ToDecideRemove(ENodeId),
    CaseSplitDone(TermId),
}

/// Per-class bookkeeping for the datatype theory, all keyed by current CC representative.
#[derive(Default)]
pub struct DatatypeTheory {
    /// Which function symbol is which datatype's constructor, set up once at declaration time.
    symbol_cstor: FxHashMap<Symbol, CstorId>,
    known_cstor: FxHashMap<ENodeId, KnownCstor>,
    is_parents: FxHashMap<ENodeId, Vec<ENodeId>>,
    sel_parents: FxHashMap<ENodeId, Vec<ENodeId>>,
    /// Representatives of finite-datatype-typed classes that have neither a known constructor
    /// nor a recorded case-split yet.
    to_decide: FxHashSet<ENodeId>,
    case_split_done: FxHashSet<TermId>,
    journal: Journal<DtUndo>,
}

impl DatatypeTheory {
    /// Declare a datatype and intern a constructor symbol for each of its constructors, so later
    /// `App` terms built from those symbols are recognized as constructor applications.
    pub fn declare_datatype(
        &mut self,
        store: &mut TermStore,
        types: &mut TypeStore,
        name: impl Into<Box<str>>,
        cstors: Vec<(Box<str>, Vec<Type>)>,
    ) -> (DatatypeId, Vec<Symbol>) {
        self.declare_datatype_with(store, types, name, |_id| cstors)
    }

    /// Declare a datatype whose constructors may refer back to the datatype's own id (a
    /// recursive field, e.g. `cons(head: Int, tail: List)`): `build_cstors` is called with the
    /// freshly reserved [`DatatypeId`] before any constructor exists.
    pub fn declare_datatype_with(
        &mut self,
        store: &mut TermStore,
        types: &mut TypeStore,
        name: impl Into<Box<str>>,
        build_cstors: impl FnOnce(DatatypeId) -> Vec<(Box<str>, Vec<Type>)>,
    ) -> (DatatypeId, Vec<Symbol>) {
        let id = types.reserve_datatype(name);
        let cstors = build_cstors(id);

        let names: Vec<Box<str>> = cstors.iter().map(|(n, _)| n.clone()).collect();
        let dt_cstors: Vec<Cstor> = cstors
            .into_iter()
            .map(|(name, args)| Cstor { name, args })
            .collect();
        types.set_cstors(id, dt_cstors);

        let symbols: Vec<Symbol> = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                let sym = store.intern_symbol(name);
                self.symbol_cstor.insert(
                    sym,
                    CstorId {
                        datatype: id,
                        index: index as u32,
                    },
                );
                sym
            })
            .collect();

        (id, symbols)
    }

    pub fn push_level(&mut self) {
        self.journal.push_level();
    }

    pub fn pop_levels(&mut self, levels: usize) {
        let DatatypeTheory {
            journal,
            known_cstor,
            is_parents,
            sel_parents,
            to_decide,
            case_split_done,
            ..
        } = self;
        journal.pop_levels(levels, |undo| match undo {
            DtUndo::KnownCstor(rep, old) => match old {
                Some(k) => {
                    known_cstor.insert(rep, k);
                }
                None => {
                    known_cstor.remove(&rep);
                }
            },
            DtUndo::IsParentsLen(rep, len) => {
                if let Some(v) = is_parents.get_mut(&rep) {
                    v.truncate(len);
                }
            }
            DtUndo::SelParentsLen(rep, len) => {
                if let Some(v) = sel_parents.get_mut(&rep) {
                    v.truncate(len);
                }
            }
            DtUndo::ToDecideInsert(rep) => {
                to_decide.remove(&rep);
            }
            DtUndo::ToDecideRemove(rep) => {
                to_decide.insert(rep);
            }
            DtUndo::CaseSplitDone(t) => {
                case_split_done.remove(&t);
            }
        });
    }

    fn set_known_cstor(&mut self, rep: ENodeId, k: KnownCstor) {
        let old = self.known_cstor.insert(rep, k);
        self.journal.record(DtUndo::KnownCstor(rep, old));
    }

    fn push_is_parent(&mut self, rep: ENodeId, node: ENodeId) {
        let len = self.is_parents.get(&rep).map_or(0, Vec::len);
        self.journal.record(DtUndo::IsParentsLen(rep, len));
        self.is_parents.entry(rep).or_default().push(node);
    }

    fn push_sel_parent(&mut self, rep: ENodeId, node: ENodeId) {
        let len = self.sel_parents.get(&rep).map_or(0, Vec::len);
        self.journal.record(DtUndo::SelParentsLen(rep, len));
        self.sel_parents.entry(rep).or_default().push(node);
    }

    fn mark_to_decide(&mut self, rep: ENodeId) {
        if self.to_decide.insert(rep) {
            self.journal.record(DtUndo::ToDecideInsert(rep));
        }
    }

    fn clear_to_decide(&mut self, rep: ENodeId) {
        if self.to_decide.remove(&rep) {
            self.journal.record(DtUndo::ToDecideRemove(rep));
        }
    }

    fn mark_case_split_done(&mut self, t: TermId) {
        if self.case_split_done.insert(t) {
            self.journal.record(DtUndo::CaseSplitDone(t));
        }
    }

    pub fn is_case_split_done(&self, t: TermId) -> bool {
        self.case_split_done.contains(&t)
    }

    pub fn has_known_cstor(&self, cc: &Cc, node: ENodeId) -> bool {
        self.known_cstor.contains_key(&cc.find(node))
    }

    /// Representatives still awaiting a case-split, for [`super::framework::final_check`].
    pub fn to_decide(&self) -> impl Iterator<Item = ENodeId> + '_ {
        self.to_decide.iter().copied()
    }

    /// All class representatives that currently have a known constructor, paired with it, for
    /// the acyclicity check in [`super::framework::final_check`].
    pub fn known_classes(&self) -> impl Iterator<Item = (ENodeId, CstorId, &[ENodeId])> + '_ {
        self.known_cstor
            .iter()
            .map(|(&rep, k)| (rep, k.cstor, &k.args[..]))
    }

    /// The e-node whose term is literally `C(args...)` for `rep`'s known constructor, used as the
    /// explanation target when the acyclicity check reports a cycle through this class.
    pub fn known_witness(&self, rep: ENodeId) -> Option<ENodeId> {
        self.known_cstor.get(&rep).map(|k| k.witness)
    }

    /// The constructor and argument e-nodes known for `rep`'s class, if any, for model
    /// reconstruction (spec §4.8 "Model generation").
    pub fn known_cstor_of(&self, rep: ENodeId) -> Option<(CstorId, &[ENodeId])> {
        self.known_cstor.get(&rep).map(|k| (k.cstor, &k.args[..]))
    }
}

/// Handle one `CcEvent::NewTerm`: recognize constructor applications, and connect `is-C`/
/// selector applications to an already-known constructor if their argument already has one.
pub fn on_new_term(
    dt: &mut DatatypeTheory,
    cc: &mut Cc,
    store: &TermStore,
    types: &mut TypeStore,
    node: ENodeId,
) {
    let term = cc.term_of(node);
    let view = store.view(term).clone();
    let ty = store.type_of(term).clone();

    if let Type::Datatype(_) = &ty {
        if types.cardinality(&ty) == Cardinality::Finite {
            dt.mark_to_decide(cc.find(node));
        }
    }

    match view {
        TermView::App(sym, _) => {
            if let (Type::Datatype(_), Some(&cstor)) = (&ty, dt.symbol_cstor.get(&sym)) {
                let args = cc.node_args(node).to_vec();
                assert_constructor(dt, cc, store, node, cstor, &args);
            }
        }
        TermView::IsCstor(c, u) => {
            let u_node = cc.node_of(u).expect("subterm already added");
            let u_rep = cc.find(u_node);
            if let Some(known) = dt.known_cstor.get(&u_rep).cloned() {
                resolve_is_cstor(cc, store, node, c, &known);
            } else {
                dt.push_is_parent(u_rep, node);
            }
        }
        TermView::Selector(c, i, u) => {
            let u_node = cc.node_of(u).expect("subterm already added");
            let u_rep = cc.find(u_node);
            if let Some(known) = dt.known_cstor.get(&u_rep).cloned() {
                if known.cstor == c {
                    cc.merge(node, known.args[i as usize], Explanation::Theory(Box::new([])));
                }
            } else {
                dt.push_sel_parent(u_rep, node);
            }
        }
        _ => {}
    }
}

fn resolve_is_cstor(cc: &mut Cc, store: &TermStore, is_c_node: ENodeId, c: CstorId, known: &KnownCstor) {
    let target = if known.cstor == c {
        store.true_term()
    } else {
        store.false_term()
    };
    let target_node = cc
        .node_of(target)
        .expect("true/false terms are registered with the congruence closure at setup time");
    cc.merge(is_c_node, target_node, Explanation::Theory(Box::new([])));
}

/// Register that `witness`'s term is (congruent to) a direct application of `cstor` to `args`.
/// Returns a conflict clause if this contradicts an already-known, different constructor for the
/// same class (disjointness); otherwise derives injectivity equalities and resolves any pending
/// `is-C`/selector parents.
pub fn assert_constructor(
    dt: &mut DatatypeTheory,
    cc: &mut Cc,
    store: &TermStore,
    witness: ENodeId,
    cstor: CstorId,
    args: &[ENodeId],
) -> Option<Vec<Lit>> {
    let rep = cc.find(witness);
    let known = KnownCstor {
        cstor,
        witness,
        args: args.to_vec().into_boxed_slice(),
    };

    if let Some(existing) = dt.known_cstor.get(&rep).cloned() {
        return merge_known_cstors(cc, existing, known);
    }

    dt.set_known_cstor(rep, known.clone());
    resolve_parents(dt, cc, store, rep, &known);
    None
}

fn merge_known_cstors(cc: &mut Cc, a: KnownCstor, b: KnownCstor) -> Option<Vec<Lit>> {
    if a.cstor == b.cstor {
        for i in 0..a.args.len() {
            cc.merge(a.args[i], b.args[i], Explanation::Theory(Box::new([])));
        }
        None
    } else {
        let lits = cc.explain_nodes(a.witness, b.witness);
        Some(lits.into_iter().map(|l| !l).collect())
    }
}

fn resolve_parents(dt: &mut DatatypeTheory, cc: &mut Cc, store: &TermStore, rep: ENodeId, known: &KnownCstor) {
    dt.clear_to_decide(rep);

    if let Some(parents) = dt.is_parents.get(&rep).cloned() {
        for p in parents {
            if let TermView::IsCstor(c, _) = store.view(cc.term_of(p)) {
                resolve_is_cstor(cc, store, p, *c, known);
            }
        }
    }
    if let Some(parents) = dt.sel_parents.get(&rep).cloned() {
        for p in parents {
            if let TermView::Selector(c, i, _) = store.view(cc.term_of(p)) {
                if *c == known.cstor {
                    cc.merge(p, known.args[*i as usize], Explanation::Theory(Box::new([])));
                }
            }
        }
    }
}

/// Handle one `CcEvent::Merged`: migrate per-class bookkeeping from the absorbed class into the
/// surviving one, and check/derive the consequences (injectivity, disjointness, selector and
/// `is-C` reduction) described in spec §4.8.
pub fn on_merged(
    dt: &mut DatatypeTheory,
    cc: &mut Cc,
    store: &TermStore,
    root: ENodeId,
    absorbed: ENodeId,
) -> Option<Vec<Lit>> {
    if dt.to_decide.contains(&absorbed) {
        dt.clear_to_decide(absorbed);
        dt.mark_to_decide(root);
    }

    let absorbed_is_parents = dt.is_parents.get(&absorbed).cloned().unwrap_or_default();
    for &p in &absorbed_is_parents {
        dt.push_is_parent(root, p);
    }
    let absorbed_sel_parents = dt.sel_parents.get(&absorbed).cloned().unwrap_or_default();
    for &p in &absorbed_sel_parents {
        dt.push_sel_parent(root, p);
    }

    match (
        dt.known_cstor.get(&root).cloned(),
        dt.known_cstor.get(&absorbed).cloned(),
    ) {
        (Some(a), Some(b)) => {
            if let Some(conflict) = merge_known_cstors(cc, a, b) {
                return Some(conflict);
            }
        }
        (None, Some(b)) => {
            dt.set_known_cstor(root, b.clone());
            resolve_parents(dt, cc, store, root, &b);
        }
        _ => {}
    }

    None
}

/// Emit the exhaustive case-split for a still-undecided finite-datatype class, if it hasn't
/// already been split: `\/_C is-C(t)` plus all pairwise `¬is-C(t) \/ ¬is-D(t)`.
///
/// Returns the clauses to load (as term pairs/lists still needing atoms allocated) for
/// [`super::framework::final_check`] to turn into SAT clauses.
pub fn case_split_clauses(
    dt: &mut DatatypeTheory,
    store: &mut TermStore,
    types: &TypeStore,
    rep_term: TermId,
) -> Option<Vec<Vec<TermId>>> {
    if dt.case_split_done.contains(&rep_term) {
        return None;
    }
    let dt_id = match store.type_of(rep_term) {
        Type::Datatype(id) => *id,
        _ => return None,
    };
    dt.mark_case_split_done(rep_term);

    let arity = types.datatype(dt_id).cstors.len() as u32;
    let is_c_terms: Vec<TermId> = (0..arity)
        .map(|i| {
            store.mk_is_cstor(
                CstorId {
                    datatype: dt_id,
                    index: i,
                },
                rep_term,
            )
        })
        .collect();

    let mut clauses = vec![is_c_terms.clone()];
    for i in 0..is_c_terms.len() {
        for j in (i + 1)..is_c_terms.len() {
            clauses.push(vec![
                store.mk_not(is_c_terms[i]),
                store.mk_not(is_c_terms[j]),
            ]);
        }
    }
    Some(clauses)
}
