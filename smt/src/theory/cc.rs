//! Congruence closure over hash-consed terms.
//!
//! Maintains the smallest equivalence relation containing the asserted equalities and closed
//! under `a_i = b_i => f(a) = f(b)` (spec §4.7). Every [`TermId`] gets its own e-node the first
//! time it is seen via [`Cc::add_term`]; e-nodes never go away afterwards (terms live for the
//! whole solve), only the union-find links and proof-forest edges between them are backtracked.
//!
//! Two auxiliary structures do the work:
//! - a signature table mapping `(head, current-representatives-of-args)` to a canonical e-node,
//!   rebuilt incrementally on every merge so that congruent applications are discovered as soon
//!   as their arguments become equal;
//! - an (undirected) proof forest recording, for each merge, the fact that justified it, so that
//!   [`Cc::explain`] can recover a set of currently-true literals implying any two equal terms
//!   are equal.
use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use smt_formula::term::{Symbol, TermId, TermStore, TermView};
use smt_formula::types::CstorId;
use smt_formula::Lit;

use crate::journal::Journal;

/// A node in the union-find / proof forest, one per distinct [`TermId`] ever seen.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct ENodeId(u32);

impl ENodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The function symbol (or connective) a node's term applies, for signature-table purposes.
///
/// `Const` terms have no signature: their hash-consed identity already gives them a unique
/// e-node, so there is nothing for congruence to discover about them directly.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
enum CongHead {
    App(Symbol),
    Eq,
    Distinct,
    Not,
    IsCstor(CstorId),
    Selector(CstorId, u32),
}

/// Why two e-nodes were merged; a proof-forest edge label.
///
/// Kept eagerly (not as a closure) since by the time a merge happens we already have everything
/// needed to reconstruct it; conflict analysis may never ask for it, but computing it up front
/// keeps the forest representation uniform and avoids borrowing the theory that produced it.
#[derive(Clone, Debug)]
pub enum Explanation {
    /// A literal on the trail directly asserted this equality.
    Lit(Lit),
    /// `f(a) = f(b)` because `a_i = b_i` for each matching pair of arguments.
    Congruence(Box<[(ENodeId, ENodeId)]>),
    /// A theory plugin derived this merge from other currently-true literals (e.g. datatype
    /// injectivity, selector reduction, `is-C` propagation).
    Theory(Box<[Lit]>),
}

struct ENode {
    term: TermId,
    parent: ENodeId,
    /// Valid only while this node is a root.
    size: u32,
    /// Forms a ring over every member of the node's class.
    ring_next: ENodeId,
    /// E-nodes whose term has this node's term as a direct subterm.
    direct_parents: Vec<ENodeId>,
    head: Option<CongHead>,
    args: Box<[ENodeId]>,
}

/// An observable effect of a call into the congruence closure.
///
/// The theory framework drains these after every [`Cc::add_term`]/[`Cc::assert_eq`] call and
/// reacts to them (e.g. the datatype theory inspects every `Merged` event for injectivity,
/// disjointness, and selector-reduction opportunities). Kept as a plain queue rather than
/// callback hooks so the CC never needs a borrow back into the plugin driving it (spec §9).
#[derive(Copy, Clone, Debug)]
pub enum CcEvent {
    NewTerm(ENodeId),
    Merged { root: ENodeId, absorbed: ENodeId },
}

enum Undo {
    Union {
        small: ENodeId,
        big: ENodeId,
        small_size: u32,
        big_old_next: ENodeId,
        small_old_next: ENodeId,
    },
    Edge {
        a: ENodeId,
        b: ENodeId,
    },
    /// A fresh entry was added to the signature table; on undo it must be removed again, or a
    /// later, unrelated class reusing the same `(head, arg-representatives)` key would hit this
    /// stale entry and spuriously merge with whatever it pointed to.
    SigTableInsert(SigKey),
}

/// A signature-table key: a congruence head paired with the current representatives of its
/// arguments.
type SigKey = (CongHead, Box<[ENodeId]>);

/// The congruence closure engine.
pub struct Cc {
    nodes: Vec<ENode>,
    by_term: FxHashMap<TermId, ENodeId>,
    sig_table: FxHashMap<SigKey, ENodeId>,
    edges: Vec<Vec<(ENodeId, Explanation)>>,
    journal: Journal<Undo>,
    worklist: Vec<(ENodeId, ENodeId, Explanation)>,
    events: Vec<CcEvent>,
}

impl Default for Cc {
    fn default() -> Cc {
        Cc {
            nodes: vec![],
            by_term: FxHashMap::default(),
            sig_table: FxHashMap::default(),
            edges: vec![],
            journal: Journal::default(),
            worklist: vec![],
            events: vec![],
        }
    }
}

fn cong_head(view: &TermView) -> (Option<CongHead>, Vec<TermId>) {
    match view {
        TermView::Const(_) => (None, vec![]),
        TermView::App(sym, args) => (Some(CongHead::App(*sym)), args.to_vec()),
        TermView::Eq(l, r) => (Some(CongHead::Eq), vec![*l, *r]),
        TermView::Distinct(args) => (Some(CongHead::Distinct), args.to_vec()),
        TermView::Not(t) => (Some(CongHead::Not), vec![*t]),
        TermView::IsCstor(c, t) => (Some(CongHead::IsCstor(*c)), vec![*t]),
        TermView::Selector(c, i, t) => (Some(CongHead::Selector(*c, *i)), vec![*t]),
    }
}

impl Cc {
    /// Look up the e-node for a term that has already been added, if any.
    pub fn node_of(&self, term: TermId) -> Option<ENodeId> {
        self.by_term.get(&term).copied()
    }

    pub fn term_of(&self, node: ENodeId) -> TermId {
        self.nodes[node.index()].term
    }

    /// The direct subterm e-nodes of `node`'s term, in argument order. Empty for constants.
    pub fn node_args(&self, node: ENodeId) -> &[ENodeId] {
        &self.nodes[node.index()].args
    }

    /// Representative of `n`'s class. Not path-compressing: compression would need to be
    /// backtrackable to stay correct across `pop_levels`, and classes are shallow in practice
    /// since unions always attach the smaller class to the larger one.
    pub fn find(&self, n: ENodeId) -> ENodeId {
        let mut cur = n;
        loop {
            let parent = self.nodes[cur.index()].parent;
            if parent == cur {
                return cur;
            }
            cur = parent;
        }
    }

    pub fn find_term(&self, t: TermId) -> Option<ENodeId> {
        self.by_term.get(&t).copied().map(|n| self.find(n))
    }

    pub fn same_class(&self, a: ENodeId, b: ENodeId) -> bool {
        self.find(a) == self.find(b)
    }

    /// All current members of `n`'s class (its own e-node included).
    pub fn class_members(&self, n: ENodeId) -> Vec<ENodeId> {
        let mut out = vec![];
        let mut cur = n;
        loop {
            out.push(cur);
            cur = self.nodes[cur.index()].ring_next;
            if cur == n {
                break;
            }
        }
        out
    }

    /// Intern `t`, recursively adding subterms, and register its signature. Idempotent: returns
    /// the existing node if `t` was already added. Pushes a [`CcEvent::NewTerm`] for the caller
    /// to react to (e.g. the datatype theory schedules a case-split for finite-datatype terms).
    pub fn add_term(&mut self, store: &TermStore, t: TermId) -> ENodeId {
        if let Some(&id) = self.by_term.get(&t) {
            return id;
        }

        let (head, arg_terms) = cong_head(store.view(t));
        let arg_ids: Vec<ENodeId> = arg_terms
            .into_iter()
            .map(|a| self.add_term(store, a))
            .collect();

        let id = ENodeId(self.nodes.len() as u32);
        self.nodes.push(ENode {
            term: t,
            parent: id,
            size: 1,
            ring_next: id,
            direct_parents: vec![],
            head,
            args: arg_ids.clone().into_boxed_slice(),
        });
        self.edges.push(vec![]);
        self.by_term.insert(t, id);

        for &a in &arg_ids {
            self.nodes[a.index()].direct_parents.push(id);
        }

        self.events.push(CcEvent::NewTerm(id));

        if let Some(other) = self.register_signature(id) {
            let reason = self.congruence_reason(id, other);
            self.worklist.push((id, other, reason));
            self.drain_worklist();
        }

        id
    }

    fn congruence_reason(&self, p: ENodeId, q: ENodeId) -> Explanation {
        let pairs: Vec<(ENodeId, ENodeId)> = self.nodes[p.index()]
            .args
            .iter()
            .zip(self.nodes[q.index()].args.iter())
            .map(|(&x, &y)| (x, y))
            .collect();
        Explanation::Congruence(pairs.into_boxed_slice())
    }

    fn current_key(&self, id: ENodeId) -> Option<SigKey> {
        let head = self.nodes[id.index()].head.clone()?;
        let args: Vec<ENodeId> = self.nodes[id.index()]
            .args
            .iter()
            .map(|&a| self.find(a))
            .collect();
        Some((head, args.into_boxed_slice()))
    }

    /// Register (or re-register, after one of its arguments' representative changed) `id`'s
    /// signature. Returns `Some(other)` if this collides with an existing, differently-classed
    /// node -- i.e. a new congruence was just discovered.
    fn register_signature(&mut self, id: ENodeId) -> Option<ENodeId> {
        let key = self.current_key(id)?;
        match self.sig_table.get(&key).copied() {
            Some(existing) if self.find(existing) != self.find(id) => Some(existing),
            Some(_) => None,
            None => {
                self.journal.record(Undo::SigTableInsert(key.clone()));
                self.sig_table.insert(key, id);
                None
            }
        }
    }

    /// Assert that two terms are equal because of `reason`, adding them first if new.
    ///
    /// Like [`Cc::add_term`] and [`Cc::merge`], the events this produces (new terms, merges) are
    /// left queued rather than drained here: [`Cc::take_events`] is the single drain point, called
    /// by [`super::framework::settle_cc_events`] once per fixpoint iteration. Draining here too
    /// would race that loop -- whichever of the two calls [`Cc::take_events`] first would empty
    /// the queue out from under the other.
    pub fn assert_eq(&mut self, store: &TermStore, a: TermId, b: TermId, reason: Lit) {
        let na = self.add_term(store, a);
        let nb = self.add_term(store, b);
        self.merge(na, nb, Explanation::Lit(reason));
    }

    /// Drain and return the events accumulated since the last call to this method.
    pub fn take_events(&mut self) -> Vec<CcEvent> {
        std::mem::take(&mut self.events)
    }

    /// Merge two e-nodes directly (used by theory plugins for derived equalities such as
    /// datatype injectivity or selector reduction).
    pub fn merge(&mut self, a: ENodeId, b: ENodeId, reason: Explanation) {
        self.worklist.push((a, b, reason));
        self.drain_worklist();
    }

    fn drain_worklist(&mut self) {
        while let Some((a, b, expl)) = self.worklist.pop() {
            let (ra, rb) = (self.find(a), self.find(b));
            if ra == rb {
                continue;
            }

            self.add_proof_edge(a, b, expl);

            let (big, small) = if self.nodes[ra.index()].size >= self.nodes[rb.index()].size {
                (ra, rb)
            } else {
                (rb, ra)
            };
            let small_size = self.nodes[small.index()].size;
            let big_old_next = self.nodes[big.index()].ring_next;
            let small_old_next = self.nodes[small.index()].ring_next;

            self.journal.record(Undo::Union {
                small,
                big,
                small_size,
                big_old_next,
                small_old_next,
            });

            self.nodes[small.index()].parent = big;
            self.nodes[big.index()].size += small_size;
            self.nodes[big.index()].ring_next = small_old_next;
            self.nodes[small.index()].ring_next = big_old_next;

            self.events.push(CcEvent::Merged {
                root: big,
                absorbed: small,
            });

            let members = self.class_members(small);
            for m in members {
                let parents = self.nodes[m.index()].direct_parents.clone();
                for p in parents {
                    if let Some(other) = self.register_signature(p) {
                        let reason = self.congruence_reason(p, other);
                        self.worklist.push((p, other, reason));
                    }
                }
            }
        }
    }

    fn add_proof_edge(&mut self, a: ENodeId, b: ENodeId, expl: Explanation) {
        self.edges[a.index()].push((b, expl.clone()));
        self.edges[b.index()].push((a, expl));
        self.journal.record(Undo::Edge { a, b });
    }

    /// A set of currently-true literals whose conjunction implies `a = b`. Panics in debug builds
    /// if the two nodes are not actually in the same class; callers must check first.
    pub fn explain_nodes(&self, a: ENodeId, b: ENodeId) -> Vec<Lit> {
        debug_assert_eq!(self.find(a), self.find(b), "explain() on unequal e-nodes");
        let mut out = vec![];
        if a == b {
            return out;
        }

        let mut prev: FxHashMap<ENodeId, Option<(ENodeId, usize)>> = FxHashMap::default();
        prev.insert(a, None);
        let mut queue = VecDeque::new();
        queue.push_back(a);

        while let Some(cur) = queue.pop_front() {
            if cur == b {
                break;
            }
            for (i, (next, _)) in self.edges[cur.index()].iter().enumerate() {
                if !prev.contains_key(next) {
                    prev.insert(*next, Some((cur, i)));
                    queue.push_back(*next);
                }
            }
        }

        let mut path = vec![];
        let mut cur = b;
        while let Some(Some((from, edge_idx))) = prev.get(&cur).copied() {
            path.push((from, edge_idx));
            cur = from;
        }
        path.reverse();

        let mut seen = std::collections::HashSet::new();
        for (from, edge_idx) in path {
            let (_, expl) = &self.edges[from.index()][edge_idx];
            self.expand_explanation(expl, &mut out, &mut seen);
        }
        out
    }

    fn expand_explanation(
        &self,
        expl: &Explanation,
        out: &mut Vec<Lit>,
        seen: &mut std::collections::HashSet<Lit>,
    ) {
        match expl {
            Explanation::Lit(l) => {
                if seen.insert(*l) {
                    out.push(*l);
                }
            }
            Explanation::Theory(lits) => {
                for &l in lits.iter() {
                    if seen.insert(l) {
                        out.push(l);
                    }
                }
            }
            Explanation::Congruence(pairs) => {
                for &(x, y) in pairs.iter() {
                    for l in self.explain_nodes(x, y) {
                        if seen.insert(l) {
                            out.push(l);
                        }
                    }
                }
            }
        }
    }

    /// Convenience wrapper over [`Cc::explain_nodes`] for terms rather than e-nodes.
    pub fn explain(&self, a: TermId, b: TermId) -> Vec<Lit> {
        let na = self.by_term[&a];
        let nb = self.by_term[&b];
        self.explain_nodes(na, nb)
    }

    pub fn push_level(&mut self) {
        self.journal.push_level();
    }

    pub fn pop_levels(&mut self, levels: usize) {
        let Cc {
            journal,
            nodes,
            edges,
            sig_table,
            ..
        } = self;
        journal.pop_levels(levels, |undo| match undo {
            Undo::Union {
                small,
                big,
                small_size,
                big_old_next,
                small_old_next,
            } => {
                nodes[small.index()].parent = small;
                nodes[big.index()].size -= small_size;
                nodes[big.index()].ring_next = big_old_next;
                nodes[small.index()].ring_next = small_old_next;
            }
            Undo::Edge { a, b } => {
                edges[a.index()].pop();
                edges[b.index()].pop();
            }
            Undo::SigTableInsert(key) => {
                sig_table.remove(&key);
            }
        });
    }
}
