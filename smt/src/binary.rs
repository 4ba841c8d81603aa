//! Binary clauses.
use smt_formula::Lit;

use crate::prop::Assignment;

/// Binary clauses.
#[derive(Default)]
pub struct BinaryClauses {
    by_lit: Vec<Vec<Lit>>,
    count: usize,
}

impl BinaryClauses {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.by_lit.resize(count * 2, vec![]);
    }

    /// Add a binary clause.
    pub fn add_binary_clause(&mut self, lits: [Lit; 2]) {
        for i in 0..2 {
            self.by_lit[(!lits[i]).code()].push(lits[i ^ 1]);
        }
        self.count += 1;
    }

    /// Implications of a given literal.
    pub fn implied(&self, lit: Lit) -> &[Lit] {
        &self.by_lit[lit.code()]
    }

    /// Number of binary clauses.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Drop binary clauses already satisfied by a (permanent, level 0) assignment.
    ///
    /// The entry stored at `code` pairs the literal `!Lit::from_code(code)` with `other`, so both
    /// halves of a clause are satisfied by exactly the same condition and stay in sync.
    pub fn simplify(&mut self, assignment: &Assignment) {
        for code in 0..self.by_lit.len() {
            let first = !Lit::from_code(code);
            self.by_lit[code]
                .retain(|&other| assignment.lit_value(first) != Some(true) && assignment.lit_value(other) != Some(true));
        }

        self.count = self.by_lit.iter().map(|lits| lits.len()).sum::<usize>() / 2;
    }
}
