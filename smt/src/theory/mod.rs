//! The theory plugin interface and its concrete clients (spec §4.6, §4.8, §9).
//!
//! There is exactly one `Theory` object per solver, `framework::Theories`, which owns the
//! congruence closure and multiplexes over whatever theory plugins are installed (today: the
//! datatype theory). The SAT core calls it at fixed points: once per new trail entry
//! ([`on_assume`](framework::on_assume)), once per propagation quiescence
//! ([`partial_check`](framework::partial_check)), and once before declaring the formula
//! satisfiable ([`final_check`](framework::final_check)), with [`push_level`](framework::push_level)
//! / [`pop_levels`](framework::pop_levels) mirroring SAT decision levels.
//!
//! Unlike the rest of the crate's subsystems there is no `dyn Theory` trait object: with a single
//! concrete plugin configuration, a trait would only add an indirection the `partial_ref`-based
//! context plumbing doesn't need. `Theory` below documents the contract; `framework` is the only
//! implementation.
pub mod cc;
pub mod datatype;
pub mod framework;

use smt_formula::Lit;

/// Outcome of a [`framework::partial_check`] or [`framework::final_check`] call.
#[derive(Debug)]
pub enum TheoryResult {
    /// Nothing more for the theory to add. Only from `final_check` does this mean the formula is
    /// satisfiable under the current (total) assignment; from `partial_check` it just means the
    /// theory has nothing to add yet and propagation should resume.
    Ok,
    /// The plugin propagated new facts or asserted new clauses (e.g. a case-split). The SAT core
    /// must keep propagating/searching rather than treat this as quiescence.
    Progress,
    /// The plugin found the current trail contradictory. The clause is the negation of a set of
    /// currently-true literals (spec §4.6); fed into conflict analysis exactly like a propagation
    /// conflict.
    Conflict(Vec<Lit>),
}

/// The contract every SAT-core/theory interaction point follows (spec §4.6).
///
/// Documented here for fidelity to the spec's component boundary; see the module comment for why
/// there is no corresponding `dyn` object in this crate.
#[allow(dead_code)]
trait Theory {
    fn on_assume(&mut self, lit: Lit);
    fn partial_check(&mut self) -> TheoryResult;
    fn final_check(&mut self) -> TheoryResult;
    fn push_level(&mut self);
    fn pop_levels(&mut self, levels: usize);
}
