//! Evaluation counters
//!
//! Cheap per-thread tallies of what the engine actually did: how many
//! temporaries were allocated, how many were evaluated, how many backend
//! routines ran and how often a backend was bypassed for the generic loop.
//! Counters are thread-local so that concurrently running callers (and test
//! cases) do not see each other's work.

use std::cell::Cell;
use std::fmt;

/// Snapshot of the counters of the current thread
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// Result buffers allocated for unforced temporaries
    pub temporaries: u64,
    /// Temporary evaluations that ran an operator's `apply`
    pub evaluations: u64,
    /// Temporaries evaluated straight into a caller's destination
    pub direct_evaluations: u64,
    /// Backend routines invoked
    pub backend_dispatches: u64,
    /// Backend routines skipped or failed and replaced by the generic loop
    pub backend_fallbacks: u64,
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "temporaries={} evaluations={} direct={} dispatches={} fallbacks={}",
            self.temporaries,
            self.evaluations,
            self.direct_evaluations,
            self.backend_dispatches,
            self.backend_fallbacks
        )
    }
}

thread_local! {
    static COUNTERS: Cell<Counters> = const {
        Cell::new(Counters {
            temporaries: 0,
            evaluations: 0,
            direct_evaluations: 0,
            backend_dispatches: 0,
            backend_fallbacks: 0,
        })
    };
}

#[derive(Copy, Clone, Debug)]
pub(crate) enum Counter {
    Temporary,
    Evaluation,
    DirectEvaluation,
    BackendDispatch,
    BackendFallback,
}

pub(crate) fn bump(counter: Counter) {
    COUNTERS.with(|c| {
        let mut v = c.get();
        match counter {
            Counter::Temporary => v.temporaries += 1,
            Counter::Evaluation => v.evaluations += 1,
            Counter::DirectEvaluation => v.direct_evaluations += 1,
            Counter::BackendDispatch => v.backend_dispatches += 1,
            Counter::BackendFallback => v.backend_fallbacks += 1,
        }
        c.set(v);
    });
}

/// Reset all counters of the current thread to zero
pub fn reset_counters() {
    COUNTERS.with(|c| c.set(Counters::default()));
}

/// Read the counters of the current thread
pub fn counters() -> Counters {
    COUNTERS.with(Cell::get)
}

/// Log the counters of the current thread at info level
pub fn dump_counters() {
    log::info!("lazr counters: {}", counters());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_and_reset() {
        reset_counters();
        bump(Counter::Temporary);
        bump(Counter::Evaluation);
        bump(Counter::Evaluation);
        let c = counters();
        assert_eq!(c.temporaries, 1);
        assert_eq!(c.evaluations, 2);
        assert_eq!(c.backend_dispatches, 0);
        reset_counters();
        assert_eq!(counters(), Counters::default());
    }
}
