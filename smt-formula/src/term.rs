//! Hash-consed terms.
//!
//! Terms are interned into a dense arena the same way [`crate::lit::Var`]/[`crate::lit::Lit`]
//! are dense indices into the SAT solver's per-variable arrays: a [`TermId`] is a small `Copy`
//! handle, and the actual [`TermView`] lives in a `Vec` indexed by it. Structural sharing is
//! obtained by hash-consing `TermView`s through an `FxHashMap` keyed on the view itself, so two
//! syntactically identical terms always get the same id.
use std::fmt;

use rustc_hash::FxHashMap;

use crate::types::{CstorId, Type};

/// An uninterpreted function or constant symbol.
///
/// Symbols are interned the same way terms are: equal names always produce the same id, so
/// `Symbol` equality is a single integer comparison.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Symbol {
    index: u32,
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Sym{}", self.index)
    }
}

/// A hash-consed term handle.
///
/// Dense and `Copy`, like [`crate::lit::Lit`]; index into [`TermStore`]'s internal arrays with
/// [`TermId::index`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TermId {
    index: u32,
}

impl TermId {
    pub fn index(self) -> usize {
        self.index as usize
    }

    fn from_index(index: usize) -> TermId {
        TermId {
            index: index as u32,
        }
    }
}

impl fmt::Debug for TermId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t{}", self.index)
    }
}

/// The shape of a term, as stored by [`TermStore`].
///
/// Matches the structural forms the congruence closure and datatype theory need to recognize
/// directly (application for congruence, `Eq`/`Distinct`/`Not` for the boolean skeleton,
/// `IsCstor`/`Selector` for the datatype theory's own vocabulary). Anything else is a function
/// application and congruence-closed structurally.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TermView {
    /// A 0-arity constant or free variable.
    Const(Symbol),
    /// An application of an uninterpreted function symbol to arguments.
    App(Symbol, Box<[TermId]>),
    /// `lhs = rhs`.
    Eq(TermId, TermId),
    /// `distinct(ts...)`: pairwise disequality.
    Distinct(Box<[TermId]>),
    /// Boolean negation.
    Not(TermId),
    /// The tester predicate for one constructor of a datatype, e.g. `is-cons(t)`.
    IsCstor(CstorId, TermId),
    /// The `index`-th selector (field accessor) of one constructor, applied to `t`.
    Selector(CstorId, u32, TermId),
}

/// Owns the symbol table and the hash-consed term arena, and assigns each term its [`Type`].
pub struct TermStore {
    symbol_names: Vec<Box<str>>,
    symbol_by_name: FxHashMap<Box<str>, Symbol>,

    views: Vec<TermView>,
    types: Vec<Type>,
    by_view: FxHashMap<TermView, TermId>,

    true_term: TermId,
    false_term: TermId,
}

impl TermStore {
    pub fn new() -> TermStore {
        let mut store = TermStore {
            symbol_names: vec![],
            symbol_by_name: FxHashMap::default(),
            views: vec![],
            types: vec![],
            by_view: FxHashMap::default(),
            true_term: TermId::from_index(0),
            false_term: TermId::from_index(0),
        };

        let true_sym = store.intern_symbol("true");
        let false_sym = store.intern_symbol("false");
        store.true_term = store.intern(TermView::Const(true_sym), Type::Bool);
        store.false_term = store.intern(TermView::Const(false_sym), Type::Bool);

        store
    }

    pub fn true_term(&self) -> TermId {
        self.true_term
    }

    pub fn false_term(&self) -> TermId {
        self.false_term
    }

    pub fn intern_symbol(&mut self, name: impl Into<Box<str>>) -> Symbol {
        let name = name.into();
        if let Some(&sym) = self.symbol_by_name.get(&name) {
            return sym;
        }
        let sym = Symbol {
            index: self.symbol_names.len() as u32,
        };
        self.symbol_names.push(name.clone());
        self.symbol_by_name.insert(name, sym);
        sym
    }

    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        &self.symbol_names[symbol.index as usize]
    }

    fn intern(&mut self, view: TermView, ty: Type) -> TermId {
        if let Some(&id) = self.by_view.get(&view) {
            return id;
        }
        let id = TermId::from_index(self.views.len());
        self.views.push(view.clone());
        self.types.push(ty);
        self.by_view.insert(view, id);
        id
    }

    pub fn mk_const(&mut self, symbol: Symbol, ty: Type) -> TermId {
        self.intern(TermView::Const(symbol), ty)
    }

    pub fn mk_app(&mut self, symbol: Symbol, args: Vec<TermId>, result_ty: Type) -> TermId {
        self.intern(TermView::App(symbol, args.into_boxed_slice()), result_ty)
    }

    pub fn mk_eq(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        // Canonicalize by id so `a = b` and `b = a` hash-cons to the same term.
        let (lhs, rhs) = if lhs <= rhs { (lhs, rhs) } else { (rhs, lhs) };
        self.intern(TermView::Eq(lhs, rhs), Type::Bool)
    }

    pub fn mk_distinct(&mut self, mut args: Vec<TermId>) -> TermId {
        args.sort_unstable();
        args.dedup();
        self.intern(TermView::Distinct(args.into_boxed_slice()), Type::Bool)
    }

    pub fn mk_not(&mut self, t: TermId) -> TermId {
        // Avoid building double negations; `Not(Not(t))` hash-conses to `t` directly.
        if let TermView::Not(inner) = self.view(t) {
            return *inner;
        }
        self.intern(TermView::Not(t), Type::Bool)
    }

    pub fn mk_is_cstor(&mut self, cstor: CstorId, t: TermId) -> TermId {
        self.intern(TermView::IsCstor(cstor, t), Type::Bool)
    }

    pub fn mk_selector(&mut self, cstor: CstorId, field: u32, t: TermId, field_ty: Type) -> TermId {
        self.intern(TermView::Selector(cstor, field, t), field_ty)
    }

    pub fn view(&self, id: TermId) -> &TermView {
        &self.views[id.index()]
    }

    pub fn type_of(&self, id: TermId) -> &Type {
        &self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl Default for TermStore {
    fn default() -> TermStore {
        TermStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_sharing() {
        let mut store = TermStore::new();
        let a = store.intern_symbol("a");
        let t1 = store.mk_const(a, Type::Uninterpreted("U".into()));
        let t2 = store.mk_const(a, Type::Uninterpreted("U".into()));
        assert_eq!(t1, t2);
    }

    #[test]
    fn eq_is_symmetric_in_hash_consing() {
        let mut store = TermStore::new();
        let a = store.intern_symbol("a");
        let b = store.intern_symbol("b");
        let ty = Type::Uninterpreted("U".into());
        let ta = store.mk_const(a, ty.clone());
        let tb = store.mk_const(b, ty);

        let e1 = store.mk_eq(ta, tb);
        let e2 = store.mk_eq(tb, ta);
        assert_eq!(e1, e2);
    }

    #[test]
    fn double_negation_collapses() {
        let mut store = TermStore::new();
        let p = store.intern_symbol("p");
        let tp = store.mk_const(p, Type::Bool);
        let not_not_p = store.mk_not(store.mk_not(tp));
        assert_eq!(not_not_p, tp);
    }

    #[test]
    fn distinct_dedups_and_sorts_args() {
        let mut store = TermStore::new();
        let a = store.intern_symbol("a");
        let b = store.intern_symbol("b");
        let ty = Type::Uninterpreted("U".into());
        let ta = store.mk_const(a, ty.clone());
        let tb = store.mk_const(b, ty.clone());

        let d1 = store.mk_distinct(vec![ta, tb, ta]);
        let d2 = store.mk_distinct(vec![tb, ta]);
        assert_eq!(d1, d2);
    }
}
