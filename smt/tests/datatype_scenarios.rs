//! End-to-end scenarios from spec.md §8, run against the public `Solver` API.

use smt::model::TermValue;
use smt::state::Outcome;
use smt::Solver;
use smt_formula::types::{CstorId, Type};
use smt_formula::{cnf_formula, lit};

/// 1. Unit propagation chain: `{a}`, `{¬a, b}`, `{¬b, c}`, query `c`. Expect `Sat`.
#[test]
fn unit_propagation_chain() {
    let mut solver = Solver::default();
    let formula = cnf_formula![
        1;
        -1, 2;
        -2, 3;
    ];
    solver.assume(&formula);

    assert_eq!(solver.solve(&[]), Outcome::Sat);

    let model = solver.model().unwrap();
    assert!(model.lit_is_true(lit!(1)));
    assert!(model.lit_is_true(lit!(2)));
    assert!(model.lit_is_true(lit!(3)));
}

/// 2. Binary conflict: `{a, b}`, `{a, ¬b}`, `{¬a, b}`, `{¬a, ¬b}`. Expect `Unsat`.
#[test]
fn binary_conflict() {
    let mut solver = Solver::default();
    let formula = cnf_formula![
        1, 2;
        1, -2;
        -1, 2;
        -1, -2;
    ];
    solver.assume(&formula);

    assert_eq!(solver.solve(&[]), Outcome::Unsat);
}

/// 3. Datatype disjointness: `T = A | B`, assume `is-A(x)` and `is-B(x)`. Expect `Unsat`.
#[test]
fn datatype_disjointness() {
    let mut solver = Solver::default();
    let (dt, _cstors) = solver.declare_datatype("T", vec![("A".into(), vec![]), ("B".into(), vec![])]);

    let x_sym = solver.store_mut().intern_symbol("x");
    let x = solver.store_mut().mk_const(x_sym, Type::Datatype(dt));

    let is_a = solver
        .store_mut()
        .mk_is_cstor(CstorId { datatype: dt, index: 0 }, x);
    let is_b = solver
        .store_mut()
        .mk_is_cstor(CstorId { datatype: dt, index: 1 }, x);

    solver.assert_term(is_a, true);
    solver.assert_term(is_b, true);

    assert_eq!(solver.solve(&[]), Outcome::Unsat);
}

/// 4. Datatype injectivity + selectors: `T = cons(head: Int, tail: T) | nil`. Assume
/// `cons(x, y) = cons(u, v)`, query `x = u ∧ y = v`. Expect `Sat` with model assigning those
/// equalities. Uses an uninterpreted "Int" sort in place of arithmetic (out of scope per
/// spec.md §1) since only the injectivity rule -- not arithmetic reasoning -- is under test.
#[test]
fn datatype_injectivity_and_selectors() {
    let mut solver = Solver::default();
    let int_ty = solver.types().uninterpreted_sort("Int");

    let (dt, cstors) = {
        let int_ty = int_ty.clone();
        solver.declare_datatype_with("T", move |dt| {
            vec![
                ("cons".into(), vec![int_ty, Type::Datatype(dt)]),
                ("nil".into(), vec![]),
            ]
        })
    };

    let dt_ty = Type::Datatype(dt);

    let x_sym = solver.store_mut().intern_symbol("x");
    let y_sym = solver.store_mut().intern_symbol("y");
    let u_sym = solver.store_mut().intern_symbol("u");
    let v_sym = solver.store_mut().intern_symbol("v");

    let x = solver.store_mut().mk_const(x_sym, int_ty.clone());
    let y = solver.store_mut().mk_const(y_sym, dt_ty.clone());
    let u = solver.store_mut().mk_const(u_sym, int_ty.clone());
    let v = solver.store_mut().mk_const(v_sym, dt_ty.clone());

    let cons_x_y = solver.store_mut().mk_app(cstors[0], vec![x, y], dt_ty.clone());
    let cons_u_v = solver.store_mut().mk_app(cstors[0], vec![u, v], dt_ty.clone());

    let lhs_eq_rhs = solver.store_mut().mk_eq(cons_x_y, cons_u_v);
    solver.assert_term(lhs_eq_rhs, true);

    // Register the queried atoms before solving, so they are part of the trail/model the search
    // produces rather than fresh variables allocated after the fact: `term_lit` only allocates
    // the literal and hooks the term into the congruence closure, it asserts nothing, so this
    // does not change what is satisfiable.
    let x_eq_u_term = solver.store_mut().mk_eq(x, u);
    let y_eq_v_term = solver.store_mut().mk_eq(y, v);
    let x_eq_u = solver.term_lit(x_eq_u_term);
    let y_eq_v = solver.term_lit(y_eq_v_term);

    assert_eq!(solver.solve(&[]), Outcome::Sat);

    let model = solver.model().unwrap();
    assert!(model.lit_is_true(x_eq_u));
    assert!(model.lit_is_true(y_eq_v));
}

/// 5. Acyclicity: `T = node(left: T, right: T) | leaf`, assume `x = node(y, _) ∧ y = node(x, _)`.
/// Expect `Unsat`.
#[test]
fn acyclicity_is_rejected() {
    let mut solver = Solver::default();

    let (dt, cstors) = solver.declare_datatype_with("T", |dt| {
        vec![
            ("node".into(), vec![Type::Datatype(dt), Type::Datatype(dt)]),
            ("leaf".into(), vec![]),
        ]
    });
    let dt_ty = Type::Datatype(dt);

    let x_sym = solver.store_mut().intern_symbol("x");
    let y_sym = solver.store_mut().intern_symbol("y");
    let leaf_sym = solver.store_mut().intern_symbol("leaf_witness");

    let x = solver.store_mut().mk_const(x_sym, dt_ty.clone());
    let y = solver.store_mut().mk_const(y_sym, dt_ty.clone());
    let leaf_witness = solver.store_mut().mk_const(leaf_sym, dt_ty.clone());

    let node_y = solver
        .store_mut()
        .mk_app(cstors[0], vec![y, leaf_witness], dt_ty.clone());
    let node_x = solver
        .store_mut()
        .mk_app(cstors[0], vec![x, leaf_witness], dt_ty.clone());

    let x_eq_node_y = solver.store_mut().mk_eq(x, node_y);
    let y_eq_node_x = solver.store_mut().mk_eq(y, node_x);

    solver.assert_term(x_eq_node_y, true);
    solver.assert_term(y_eq_node_x, true);

    assert_eq!(solver.solve(&[]), Outcome::Unsat);
}

/// 6. Finite datatype case-split: `T = A | B`, no constraints. Expect `Sat` with the model
/// picking some constructor for every introduced `T`-typed term.
#[test]
fn finite_datatype_case_split_picks_a_constructor() {
    let mut solver = Solver::default();
    let (dt, _cstors) = solver.declare_datatype("T", vec![("A".into(), vec![]), ("B".into(), vec![])]);

    let x_sym = solver.store_mut().intern_symbol("x");
    let x = solver.store_mut().mk_const(x_sym, Type::Datatype(dt));

    // Force the term into the congruence closure (and so into the case-split queue) without
    // constraining its value, exactly as a front end would when a `T`-typed variable is declared.
    let x_eq_x = solver.store_mut().mk_eq(x, x);
    let _ = solver.term_lit(x_eq_x);

    assert_eq!(solver.solve(&[]), Outcome::Sat);

    match solver.term_value(x).unwrap() {
        TermValue::Cstor(name, args) => {
            assert!(&*name == "A" || &*name == "B");
            assert!(args.is_empty());
        }
        other => panic!("expected a constructor value, got {:?}", other),
    }
}
