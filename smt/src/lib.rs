//! An SMT solver combining a CDCL core with pluggable theories.
#[macro_use]
extern crate smt_formula;

pub mod config;
pub mod error;
pub mod model;
pub mod proof;
pub mod resource;
pub mod solver;
pub mod state;

mod analyze_conflict;
mod binary;
mod cdcl;
mod clause;
mod context;
mod decision;
mod glue;
mod incremental;
mod journal;
mod load;
mod prop;
mod schedule;
mod simplify;
mod theory;
mod tmp;

mod vec_mut_scan;

pub use config::{SolverConfig, SolverOptions};
pub use error::SolverError;
pub use model::{Model, TermValue};
pub use proof::{InMemoryTracer, NullTracer, ProofTracer, StepId};
pub use resource::{ResourceBudget, ResourceOut};
pub use solver::Solver;
pub use state::Outcome;
