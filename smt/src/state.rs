//! Miscellaneous solver state.

/// Satisfiability state tracked internally between calls to
/// [`solve`](crate::solver::Solver::solve).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SatState {
    Unknown,
    Sat,
    Unsat,
    UnsatUnderAssumptions,
}

impl Default for SatState {
    fn default() -> SatState {
        SatState::Unknown
    }
}

/// The externally visible result of a [`solve`](crate::solver::Solver::solve) call.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Outcome {
    Sat,
    Unsat,
    /// Unsatisfiable under the assumptions passed to this `solve` call, but not unconditionally
    /// unsatisfiable.
    UnsatUnderAssumptions,
    /// Stopped because a [`crate::resource::ResourceBudget`] limit was hit.
    ResourceOut,
    /// Stopped because of an external interrupt request.
    Interrupted,
}

/// Miscellaneous solver state.
///
/// Anything larger or any larger group of related state variables should be moved into a separate
/// part of [`Context`](crate::context::Context).
#[derive(Default)]
pub struct SolverState {
    pub sat_state: SatState,
}
