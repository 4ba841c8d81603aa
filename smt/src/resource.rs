//! Cooperative resource budgeting and cancellation.
//!
//! Grounded on the single-process subset of the `InputSignal::Interrupt` polling pattern: an
//! `Arc<AtomicBool>` that external code can flip, checked at safe points between propagation
//! rounds and before decisions. There is no background thread here and no multi-writer channel,
//! just a budget that [`crate::cdcl::conflict_step`] polls once per step.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Why solving stopped before reaching a verdict.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ResourceOut {
    /// [`ResourceBudget::deadline`] was reached.
    Deadline,
    /// [`ResourceBudget::conflict_limit`] was reached.
    ConflictLimit,
}

/// Limits that bound how long [`crate::solver::Solver::solve`] may run.
///
/// All limits are optional; a default budget never stops the solver on its own. The
/// `interrupted` flag can be shared with other threads via [`ResourceBudget::interrupt_handle`]
/// to request cooperative cancellation.
#[derive(Clone, Default)]
pub struct ResourceBudget {
    deadline: Option<Instant>,
    conflict_limit: Option<u64>,
    interrupted: Arc<AtomicBool>,
}

impl ResourceBudget {
    pub fn new() -> ResourceBudget {
        ResourceBudget::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> ResourceBudget {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_conflict_limit(mut self, limit: u64) -> ResourceBudget {
        self.conflict_limit = Some(limit);
        self
    }

    /// A handle that can be used to request cancellation from another thread.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    /// Check all limits, given the number of conflicts seen so far.
    ///
    /// Returns `Err` as soon as any limit is exceeded. This does not distinguish an externally
    /// requested interrupt from the other limits at the type level; callers needing that
    /// distinction check [`ResourceBudget::is_interrupted`] separately.
    pub fn check(&self, conflicts: u64) -> Result<(), ResourceOut> {
        if self.interrupted.load(Ordering::Relaxed) {
            return Err(ResourceOut::Deadline);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ResourceOut::Deadline);
            }
        }
        if let Some(limit) = self.conflict_limit {
            if conflicts >= limit {
                return Err(ResourceOut::ConflictLimit);
            }
        }
        Ok(())
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn conflict_limit_trips() {
        let budget = ResourceBudget::new().with_conflict_limit(3);
        assert!(budget.check(2).is_ok());
        assert_eq!(budget.check(3), Err(ResourceOut::ConflictLimit));
    }

    #[test]
    fn deadline_trips() {
        let budget = ResourceBudget::new().with_deadline(Instant::now() - Duration::from_secs(1));
        assert_eq!(budget.check(0), Err(ResourceOut::Deadline));
    }

    #[test]
    fn external_interrupt_trips() {
        let budget = ResourceBudget::new();
        let handle = budget.interrupt_handle();
        assert!(budget.check(0).is_ok());
        handle.store(true, Ordering::Relaxed);
        assert!(budget.check(0).is_err());
    }
}
