//! Temporary data.
use smt_formula::Lit;

/// Temporary data used by various parts of the solver.
///
/// Make sure to check any documented invariants when using this. Also make sure to check all
/// existing users when adding invariants.
#[derive(Default)]
pub struct TmpData {
    pub lits: Vec<Lit>,
    /// A second scratch literal buffer, used where a caller needs two independent buffers at
    /// once (e.g. the unsimplified and simplified literals of a clause being loaded).
    pub lits_2: Vec<Lit>,
    /// A boolean for each literal, or for each decision level (the two scratch uses never
    /// overlap and both fit in a buffer of `2 * var_count` bools).
    ///
    /// Reset to all-false, keep size.
    pub flags: Vec<bool>,
}

impl TmpData {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.flags.resize(count * 2, false);
    }
}
