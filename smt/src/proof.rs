//! Proof tracing.
//!
//! The core treats a proof as an append-only graph of steps (spec §6, §9): each step has an id,
//! a rule name, the premise steps it was derived from, and the literals/terms it talks about.
//! What happens to that graph -- written to a file, kept in memory, thrown away -- is a driver
//! concern; the solver only ever talks to a [`ProofTracer`]. Concrete on-disk encodings (DRAT,
//! LRAT, whatever a front-end wants) are explicitly out of scope here, matching the source's own
//! FIXME about not having settled on one (spec §9's open question).
use smt_formula::{Lit, TermId};

/// Identifies one step in the proof graph. `StepId(0)` is the sentinel returned when tracing is
/// disabled; callers never need to distinguish it from a real id since a disabled tracer also
/// never emits anything that would reference it as a premise.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct StepId(pub u64);

/// One node of the proof graph.
#[derive(Clone, Debug)]
pub struct ProofStep {
    pub id: StepId,
    pub rule: &'static str,
    pub premises: Vec<StepId>,
    pub lits: Vec<Lit>,
    pub terms: Vec<TermId>,
}

/// Sink for proof steps.
///
/// Implementations decide what "recording" a step means; the core never inspects the return
/// value beyond using it as a premise id for later steps.
pub trait ProofTracer {
    fn add_step(&mut self, rule: &'static str, premises: &[StepId], lits: &[Lit], terms: &[TermId]) -> StepId;
}

/// Discards every step. The default, and what's used whenever proof tracing wasn't requested.
#[derive(Default)]
pub struct NullTracer;

impl ProofTracer for NullTracer {
    fn add_step(&mut self, _rule: &'static str, _premises: &[StepId], _lits: &[Lit], _terms: &[TermId]) -> StepId {
        StepId(0)
    }
}

/// Keeps the whole graph in memory, for tests and for drivers that want to inspect or
/// pretty-print it themselves after the fact.
#[derive(Default)]
pub struct InMemoryTracer {
    steps: Vec<ProofStep>,
}

impl InMemoryTracer {
    pub fn steps(&self) -> &[ProofStep] {
        &self.steps
    }
}

impl ProofTracer for InMemoryTracer {
    fn add_step(&mut self, rule: &'static str, premises: &[StepId], lits: &[Lit], terms: &[TermId]) -> StepId {
        let id = StepId(self.steps.len() as u64 + 1);
        self.steps.push(ProofStep {
            id,
            rule,
            premises: premises.to_vec(),
            lits: lits.to_vec(),
            terms: terms.to_vec(),
        });
        id
    }
}

/// The context part holding whichever tracer the driver configured at construction time.
pub struct Proof {
    tracer: Box<dyn ProofTracer>,
}

impl Default for Proof {
    fn default() -> Proof {
        Proof {
            tracer: Box::new(NullTracer),
        }
    }
}

impl Proof {
    pub fn new(tracer: Box<dyn ProofTracer>) -> Proof {
        Proof { tracer }
    }

    pub fn add_step(&mut self, rule: &'static str, premises: &[StepId], lits: &[Lit], terms: &[TermId]) -> StepId {
        self.tracer.add_step(rule, premises, lits, terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_tracer_assigns_increasing_ids() {
        let mut proof = Proof::new(Box::new(InMemoryTracer::default()));
        let a = proof.add_step("unit", &[], &[lit!(1)], &[]);
        let b = proof.add_step("resolve", &[a], &[lit!(2)], &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn null_tracer_always_returns_sentinel() {
        let mut proof = Proof::default();
        let a = proof.add_step("unit", &[], &[lit!(1)], &[]);
        let b = proof.add_step("resolve", &[a], &[lit!(2)], &[]);
        assert_eq!(a, StepId(0));
        assert_eq!(b, StepId(0));
    }
}
