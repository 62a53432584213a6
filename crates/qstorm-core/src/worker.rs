//! Virtual user: the unit of concurrent execution.
//!
//! A worker repeatedly selects an item, executes it against the shared
//! connection, validates the result, and records the outcome both in its
//! local list and in the shared aggregator. A single query exception
//! never terminates the loop; it is captured as a failed outcome and
//! the worker continues, unless `stop_on_first_failure` is configured,
//! in which case the worker trips the shared stop signal and exits.
//!
//! The only blocking point in the loop body is the query call itself.
//! The stop-signal check is one atomic load per iteration, and no new
//! iteration starts once the signal is observed.

use std::time::Instant;

use qstorm_types::{Outcome, OutcomeError, RunConfig, StopReason, WorkerSummary};
use tracing::{debug, trace};

use crate::aggregator::ResultAggregator;
use crate::connection::ServiceConnection;
use crate::corpus::WorkloadCorpus;
use crate::signal::StopSignal;

/// Trim exactly one leading line break from an expected fixture.
///
/// Historical fixtures begin with a single `\n`; trimming just that one
/// avoids false negatives on harmless formatting. The rule is
/// deliberately narrow: trimming all whitespace would mask genuine
/// formatting regressions.
#[must_use]
pub fn normalize_expected(expected: &str) -> &str {
    if let Some(rest) = expected.strip_prefix('\n') {
        rest
    } else if let Some(rest) = expected.strip_prefix("\r\n") {
        rest
    } else {
        expected
    }
}

/// One virtual user.
#[derive(Debug, Clone, Copy)]
pub struct Worker {
    id: usize,
}

impl Worker {
    /// A worker with the given id (unique within a run).
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self { id }
    }

    /// Worker identifier.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Run the selection/execution loop to completion.
    ///
    /// The loop ends when the per-worker iteration budget is exhausted
    /// (0 = unbounded), the deadline passes (also tripping the signal
    /// with [`StopReason::TimeLimit`]), or the shared stop signal is
    /// observed. Returns this worker's outcomes in execution order; the
    /// same outcomes were already recorded in `aggregator`, along with
    /// a final [`WorkerSummary`].
    pub fn run(
        &self,
        corpus: &WorkloadCorpus,
        connection: &dyn ServiceConnection,
        config: &RunConfig,
        run_started: Instant,
        deadline: Option<Instant>,
        stop: &StopSignal,
        aggregator: &ResultAggregator,
    ) -> Vec<Outcome> {
        let mut selector = corpus.selector(config.selection, config.seed.wrapping_add(self.id as u64));
        let loop_started = Instant::now();
        let mut outcomes: Vec<Outcome> = Vec::new();
        let mut iteration: u64 = 0;

        loop {
            if config.iteration_limit != 0 && iteration >= config.iteration_limit {
                break;
            }
            if stop.is_set() {
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    stop.trip(StopReason::TimeLimit);
                    break;
                }
            }

            let (item_index, item) = selector.next(corpus);
            trace!(worker_id = self.id, item_index, iteration, "executing item");

            let call_started = Instant::now();
            let result = connection.execute(&item.query_text);
            let elapsed_millis = call_started.elapsed().as_millis() as u64;
            let offset_millis = run_started.elapsed().as_millis() as u64;

            let outcome = match result {
                Ok(actual) => match item.expected.as_deref() {
                    Some(expected) => {
                        let expected = normalize_expected(expected);
                        if actual == expected {
                            Outcome::success(
                                self.id,
                                item_index,
                                iteration,
                                elapsed_millis,
                                offset_millis,
                            )
                        } else {
                            Outcome::failure(
                                self.id,
                                item_index,
                                iteration,
                                OutcomeError::Mismatch {
                                    expected: expected.to_owned(),
                                    actual,
                                },
                                elapsed_millis,
                                offset_millis,
                            )
                        }
                    }
                    None => Outcome::success(
                        self.id,
                        item_index,
                        iteration,
                        elapsed_millis,
                        offset_millis,
                    ),
                },
                Err(err) => Outcome::failure(
                    self.id,
                    item_index,
                    iteration,
                    OutcomeError::Execution {
                        message: format!("exception occurred on iteration {iteration}: {err}"),
                    },
                    elapsed_millis,
                    offset_millis,
                ),
            };

            let failed = !outcome.succeeded;
            aggregator.record(outcome.clone());
            outcomes.push(outcome);
            iteration += 1;

            if failed && config.stop_on_first_failure {
                stop.trip(StopReason::Failure);
                break;
            }
        }

        let succeeded = outcomes.iter().filter(|o| o.succeeded).count() as u64;
        let executed = outcomes.len() as u64;
        let summary = WorkerSummary {
            worker_id: self.id,
            executed,
            succeeded,
            failed: executed - succeeded,
            elapsed_millis: loop_started.elapsed().as_millis() as u64,
        };
        aggregator.record_worker(summary);
        debug!(
            worker_id = self.id,
            executed,
            succeeded,
            "worker finished"
        );

        outcomes
    }
}
