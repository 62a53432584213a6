//! Thread-safe sink collecting per-worker outcomes into one report.
//!
//! The aggregator is the only harness-owned shared mutable resource in a
//! run. `record` is safe under concurrent append from every worker; no
//! update is lost. `finalize` may be called only after all workers have
//! joined; there is deliberately no consistency guarantee for reads
//! concurrent with active workers, since intermediate reporting is not a
//! requirement.
//!
//! Counters and the failure list are kept instead of every successful
//! outcome: the report surfaces totals and errors, and an unbounded
//! time-based run must not grow memory per successful query.

use parking_lot::Mutex;
use qstorm_types::{Outcome, RunReport, StopReason, WorkerSummary};

#[derive(Debug, Default)]
struct AggregatorState {
    total_run: u64,
    total_succeeded: u64,
    total_failed: u64,
    errors: Vec<Outcome>,
    per_worker: Vec<WorkerSummary>,
}

/// Mutex-guarded outcome sink shared by all workers of one run.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    state: Mutex<AggregatorState>,
}

impl ResultAggregator {
    /// A fresh aggregator for one run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one executed-item record. Callable concurrently from any
    /// worker without external locking.
    pub fn record(&self, outcome: Outcome) {
        let mut state = self.state.lock();
        state.total_run += 1;
        if outcome.succeeded {
            state.total_succeeded += 1;
        } else {
            state.total_failed += 1;
            state.errors.push(outcome);
        }
    }

    /// Record a worker's final totals when it exits its loop.
    pub fn record_worker(&self, summary: WorkerSummary) {
        self.state.lock().per_worker.push(summary);
    }

    /// Total outcomes recorded so far. Meaningful once workers joined.
    #[must_use]
    pub fn recorded(&self) -> u64 {
        self.state.lock().total_run
    }

    /// Consume the collected state into an immutable [`RunReport`].
    ///
    /// Per-worker summaries are ordered by worker id so the report is
    /// deterministic in content regardless of join order.
    #[must_use]
    pub fn finalize(self, wall_clock_millis: u64, stop_reason: StopReason) -> RunReport {
        let mut state = self.state.into_inner();
        state.per_worker.sort_by_key(|summary| summary.worker_id);
        RunReport {
            total_run: state.total_run,
            total_succeeded: state.total_succeeded,
            total_failed: state.total_failed,
            errors: state.errors,
            per_worker: state.per_worker,
            wall_clock_millis,
            stop_reason,
        }
    }
}
