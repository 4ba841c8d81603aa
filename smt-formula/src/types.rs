//! Sorts (types) for terms.
//!
//! The type system is intentionally small: it only carries what the congruence-closure core and
//! the datatype theory need to do their job (typing equalities, checking selector applications,
//! deciding cardinality). A theory for a richer sort (e.g. linear arithmetic) would extend this
//! enum; nothing in `smt` depends on it being closed.
use std::fmt;

use rustc_hash::FxHashMap;

/// A unique identifier for a declared datatype.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct DatatypeId {
    index: u32,
}

impl DatatypeId {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for DatatypeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Dt{}", self.index)
    }
}

/// A unique identifier for a constructor of some datatype.
///
/// Constructors are numbered within their datatype; `CstorId` pairs the datatype with the
/// constructor's index so it can be used as a map key without carrying the datatype around
/// separately.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CstorId {
    pub datatype: DatatypeId,
    pub index: u32,
}

impl fmt::Debug for CstorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}/{}", self.datatype, self.index)
    }
}

/// The sort of a term.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Type {
    /// The sort of literals and equality atoms.
    Bool,
    /// An uninterpreted sort, identified by name.
    Uninterpreted(Box<str>),
    /// A declared algebraic datatype.
    Datatype(DatatypeId),
}

/// A constructor of a [`Datatype`].
#[derive(Clone, Debug)]
pub struct Cstor {
    pub name: Box<str>,
    /// Argument types, in order. `args.len()` is the constructor's arity.
    pub args: Vec<Type>,
}

/// A declared algebraic datatype: a fixed, finite set of named constructors.
#[derive(Clone, Debug)]
pub struct Datatype {
    pub name: Box<str>,
    pub cstors: Vec<Cstor>,
}

impl Datatype {
    pub fn cstor(&self, index: u32) -> &Cstor {
        &self.cstors[index as usize]
    }
}

/// Whether a type has finitely many inhabitants.
///
/// Computed by [`TypeStore::cardinality`] per spec §4.8: base types are finite/infinite per a
/// fixed predicate, and datatypes are finite iff every constructor's argument types are finite,
/// with direct recursion cut by seeding `Infinite` and iterating to a fixpoint.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Cardinality {
    Finite,
    Infinite,
}

/// Owns all declared datatypes and answers cardinality/base-constructor queries about [`Type`]s.
#[derive(Default)]
pub struct TypeStore {
    datatypes: Vec<Datatype>,
    uninterpreted: FxHashMap<Box<str>, ()>,
    /// Cache for `cardinality`, `None` while still being computed (guards against infinite
    /// recursion through mutually recursive datatypes).
    cardinality_cache: FxHashMap<DatatypeId, Option<Cardinality>>,
    base_cstor_cache: FxHashMap<DatatypeId, Option<u32>>,
}

impl TypeStore {
    pub fn new() -> TypeStore {
        TypeStore::default()
    }

    /// Declare a new datatype and return its id.
    pub fn declare_datatype(&mut self, name: impl Into<Box<str>>, cstors: Vec<Cstor>) -> DatatypeId {
        let id = self.reserve_datatype(name);
        self.set_cstors(id, cstors);
        id
    }

    /// Reserve a fresh [`DatatypeId`] with no constructors yet.
    ///
    /// Lets a caller build constructors that refer back to the datatype's own id (a recursive
    /// field, e.g. `cons(head: Int, tail: List)`) before the constructor list itself exists; pair
    /// with [`set_cstors`](TypeStore::set_cstors) once the constructors are built.
    pub fn reserve_datatype(&mut self, name: impl Into<Box<str>>) -> DatatypeId {
        let id = DatatypeId {
            index: self.datatypes.len() as u32,
        };
        self.datatypes.push(Datatype {
            name: name.into(),
            cstors: vec![],
        });
        id
    }

    /// Fill in the constructors for a datatype reserved with
    /// [`reserve_datatype`](TypeStore::reserve_datatype).
    pub fn set_cstors(&mut self, id: DatatypeId, cstors: Vec<Cstor>) {
        self.datatypes[id.index()].cstors = cstors;
    }

    pub fn datatype(&self, id: DatatypeId) -> &Datatype {
        &self.datatypes[id.index()]
    }

    pub fn uninterpreted_sort(&mut self, name: impl Into<Box<str>>) -> Type {
        let name = name.into();
        self.uninterpreted.entry(name.clone()).or_insert(());
        Type::Uninterpreted(name)
    }

    /// Whether a type is a single-constructor ("record-like") datatype.
    ///
    /// Used by the datatype theory's preprocessing step (spec §4.8): such a type never needs a
    /// case-split, only the single constructor's selector-reduction equation.
    pub fn single_cstor(&self, ty: &Type) -> Option<CstorId> {
        match ty {
            Type::Datatype(id) if self.datatype(*id).cstors.len() == 1 => Some(CstorId {
                datatype: *id,
                index: 0,
            }),
            _ => None,
        }
    }

    /// Cardinality of a type, per spec §4.8.
    pub fn cardinality(&mut self, ty: &Type) -> Cardinality {
        match ty {
            Type::Bool => Cardinality::Finite,
            Type::Uninterpreted(_) => Cardinality::Infinite,
            Type::Datatype(id) => self.datatype_cardinality(*id),
        }
    }

    fn datatype_cardinality(&mut self, id: DatatypeId) -> Cardinality {
        if let Some(Some(cached)) = self.cardinality_cache.get(&id) {
            return *cached;
        }

        // Seed the recursive case with `Infinite` (a direct recursive occurrence does not by
        // itself make a datatype infinite; a base case elsewhere might still close it off) and
        // recompute to a fixpoint, per spec's cut-for-direct-recursion rule.
        self.cardinality_cache.insert(id, Some(Cardinality::Infinite));

        loop {
            let cstors = self.datatype(id).cstors.clone();
            let mut all_finite = true;
            for cstor in &cstors {
                for arg_ty in &cstor.args {
                    if self.cardinality(arg_ty) == Cardinality::Infinite {
                        all_finite = false;
                    }
                }
            }
            let new_value = if all_finite {
                Cardinality::Finite
            } else {
                Cardinality::Infinite
            };
            let changed = self.cardinality_cache.get(&id) != Some(&Some(new_value));
            self.cardinality_cache.insert(id, Some(new_value));
            if !changed {
                return new_value;
            }
        }
    }

    /// Choose a constructor usable to build a ground value for model completion (spec §4.8).
    ///
    /// Prefers a constructor with only finite argument types; falls back to any constructor that
    /// is not directly recursive in this datatype (so the chosen constructor can always be
    /// grounded by recursing into already-grounded arguments).
    pub fn base_cstor(&mut self, id: DatatypeId) -> u32 {
        if let Some(Some(cached)) = self.base_cstor_cache.get(&id) {
            return *cached;
        }

        let cstors = self.datatype(id).cstors.clone();

        let mut fallback = None;
        for (index, cstor) in cstors.iter().enumerate() {
            let all_finite = cstor
                .args
                .iter()
                .all(|arg_ty| self.cardinality(arg_ty) == Cardinality::Finite);
            if all_finite {
                self.base_cstor_cache.insert(id, Some(index as u32));
                return index as u32;
            }
            let directly_recursive = cstor
                .args
                .iter()
                .any(|arg_ty| matches!(arg_ty, Type::Datatype(other) if *other == id));
            if fallback.is_none() && !directly_recursive {
                fallback = Some(index as u32);
            }
        }

        let chosen = fallback.unwrap_or(0);
        self.base_cstor_cache.insert(id, Some(chosen));
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_datatype_is_finite() {
        let mut types = TypeStore::new();
        let unit = types.declare_datatype(
            "Unit",
            vec![Cstor {
                name: "unit".into(),
                args: vec![],
            }],
        );
        assert_eq!(
            types.cardinality(&Type::Datatype(unit)),
            Cardinality::Finite
        );
        assert_eq!(types.base_cstor(unit), 0);
    }

    #[test]
    fn list_of_uninterpreted_is_infinite() {
        let mut types = TypeStore::new();
        let elem = types.uninterpreted_sort("Elem");
        // List = nil | cons(Elem, List)
        let list = types.declare_datatype("List", vec![]);
        let cstors = vec![
            Cstor {
                name: "nil".into(),
                args: vec![],
            },
            Cstor {
                name: "cons".into(),
                args: vec![elem, Type::Datatype(list)],
            },
        ];
        types.datatypes[list.index()].cstors = cstors;

        assert_eq!(
            types.cardinality(&Type::Datatype(list)),
            Cardinality::Infinite
        );
        // nil has no args, so it is finite and preferred as the base constructor.
        assert_eq!(types.base_cstor(list), 0);
    }

    #[test]
    fn enum_datatype_is_finite() {
        let mut types = TypeStore::new();
        let bool_like = types.declare_datatype(
            "T",
            vec![
                Cstor {
                    name: "A".into(),
                    args: vec![],
                },
                Cstor {
                    name: "B".into(),
                    args: vec![],
                },
            ],
        );
        assert_eq!(
            types.cardinality(&Type::Datatype(bool_like)),
            Cardinality::Finite
        );
    }
}
