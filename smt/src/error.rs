//! Typed error surface for the solver's boundary (spec §7).
//!
//! `Outcome` (`Sat`/`Unsat`/`UnsatUnderAssumptions`/`ResourceOut`/`Interrupted`) covers every
//! result of an ordinary [`Solver::solve`](crate::solver::Solver::solve) call -- those are data on
//! the normal control path, not errors. `SolverError` is for the narrower set of cases spec §7's
//! table calls out as actual errors: a formula that is unsatisfiable before search even starts,
//! and internal bugs.
use thiserror::Error;

/// Errors an embedder can get back from the solver's boundary, as opposed to an ordinary
/// [`Outcome`](crate::state::Outcome).
#[derive(Error, Debug)]
pub enum SolverError {
    /// The formula is unsatisfiable at the root decision level (level 0), independent of any
    /// assumptions a later `solve` call might pass.
    #[error("formula is unsatisfiable at the root decision level")]
    RootUnsat,

    /// An internal invariant was violated. This indicates a bug in the solver itself, not a
    /// property of the input formula; spec §7 marks this "Fatal; surfaces as programmer-error".
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}
