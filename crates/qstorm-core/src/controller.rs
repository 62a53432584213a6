//! Run orchestration: spawn workers, arm the watchdog, join, report.
//!
//! The controller validates the configuration, creates the shared stop
//! signal and aggregator, launches one thread per virtual user, and
//! blocks until every worker has terminated. Only setup-time violations
//! (bad config, a worker thread dying) abort the run; per-query failures
//! were already recovered inside the workers.
//!
//! Report aggregates are deterministic in content (the same totals
//! regardless of thread interleaving) but not in outcome order. No
//! outcome is lost or duplicated.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use qstorm_error::{HarnessError, Result};
use qstorm_types::{RunConfig, RunReport, StopReason};
use tracing::{debug, info, warn};

use crate::aggregator::ResultAggregator;
use crate::connection::ServiceConnection;
use crate::corpus::WorkloadCorpus;
use crate::signal::StopSignal;
use crate::worker::Worker;

/// Orchestrates one run of the harness.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunController;

impl RunController {
    /// Execute the configured workload and return the finalized report.
    pub fn execute(
        corpus: &WorkloadCorpus,
        connection: &dyn ServiceConnection,
        config: &RunConfig,
    ) -> Result<RunReport> {
        config.validate()?;
        if corpus.is_empty() {
            return Err(HarnessError::EmptyCorpus);
        }

        let stop = StopSignal::new();
        let aggregator = ResultAggregator::new();
        let run_started = Instant::now();
        let deadline = (config.time_limit_millis > 0)
            .then(|| run_started + Duration::from_millis(config.time_limit_millis));

        info!(
            workers = config.worker_count,
            iteration_limit = config.iteration_limit,
            time_limit_millis = config.time_limit_millis,
            corpus_items = corpus.len(),
            "run starting"
        );

        let panic_failure: Option<HarnessError> = thread::scope(|scope| {
            let (disarm_tx, disarm_rx) = mpsc::channel::<()>();
            if let Some(deadline) = deadline {
                let stop = &stop;
                scope.spawn(move || watchdog(deadline, &disarm_rx, stop));
                debug!(?deadline, "watchdog armed");
            }

            let handles: Vec<_> = (0..config.worker_count)
                .map(|id| {
                    let stop = &stop;
                    let aggregator = &aggregator;
                    scope.spawn(move || {
                        Worker::new(id).run(
                            corpus,
                            connection,
                            config,
                            run_started,
                            deadline,
                            stop,
                            aggregator,
                        )
                    })
                })
                .collect();

            let mut panic_failure = None;
            for (id, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(outcomes) => {
                        debug!(worker_id = id, executed = outcomes.len(), "worker joined");
                    }
                    Err(payload) => {
                        // End the siblings promptly; the run is already lost.
                        stop.trip(StopReason::Failure);
                        let message = panic_text(payload.as_ref());
                        warn!(worker_id = id, message, "worker thread panicked");
                        if panic_failure.is_none() {
                            panic_failure = Some(HarnessError::WorkerPanic {
                                worker_id: id,
                                message,
                            });
                        }
                    }
                }
            }

            // Workers are done; release the watchdog if it is still waiting.
            drop(disarm_tx);
            panic_failure
        });

        if let Some(err) = panic_failure {
            return Err(err);
        }

        let wall_clock_millis = run_started.elapsed().as_millis() as u64;
        let stop_reason = stop.reason().unwrap_or(StopReason::IterationBudget);
        let report = aggregator.finalize(wall_clock_millis, stop_reason);
        info!(
            total_run = report.total_run,
            total_failed = report.total_failed,
            wall_clock_millis,
            %stop_reason,
            "run finished"
        );
        Ok(report)
    }
}

/// Sleep until the deadline or a disarm message, whichever comes first.
/// On expiry, trip the stop signal with [`StopReason::TimeLimit`].
fn watchdog(deadline: Instant, disarm: &mpsc::Receiver<()>, stop: &StopSignal) {
    let wait = deadline.saturating_duration_since(Instant::now());
    match disarm.recv_timeout(wait) {
        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
            debug!("watchdog disarmed");
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            if stop.trip(StopReason::TimeLimit) {
                info!("watchdog fired: time limit expired");
            }
        }
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qstorm_error::ExecutionError;
    use qstorm_types::WorkloadItem;

    struct EchoConnection;

    impl ServiceConnection for EchoConnection {
        fn execute(&self, query: &str) -> std::result::Result<String, ExecutionError> {
            Ok(query.replacen('Q', "R", 1))
        }
    }

    fn corpus() -> WorkloadCorpus {
        WorkloadCorpus::from_items(vec![
            WorkloadItem::checked("Q1", "R1"),
            WorkloadItem::checked("Q2", "R2"),
        ])
        .expect("corpus")
    }

    #[test]
    fn zero_workers_is_rejected_before_starting() {
        let config = RunConfig::sequential(0, 1);
        let err = RunController::execute(&corpus(), &EchoConnection, &config).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfig(_)));
    }

    #[test]
    fn single_worker_single_iteration() {
        let config = RunConfig::sequential(1, 1);
        let report = RunController::execute(&corpus(), &EchoConnection, &config).expect("run");
        assert_eq!(report.total_run, 1);
        assert_eq!(report.stop_reason, StopReason::IterationBudget);
        assert!(report.passed());
    }

    #[test]
    fn panicking_connection_is_fatal() {
        struct PanickingConnection;
        impl ServiceConnection for PanickingConnection {
            fn execute(&self, _query: &str) -> std::result::Result<String, ExecutionError> {
                panic!("engine fell over");
            }
        }

        let config = RunConfig::sequential(2, 1);
        let err = RunController::execute(&corpus(), &PanickingConnection, &config).unwrap_err();
        match err {
            HarnessError::WorkerPanic { message, .. } => {
                assert!(message.contains("engine fell over"), "got: {message}");
            }
            other => panic!("expected WorkerPanic, got {other}"),
        }
    }
}
