//! End-to-end harness runs under real concurrency.
//!
//! Spawns full controller runs with scripted engines and checks the
//! aggregate accounting invariants: no outcome lost or duplicated,
//! totals independent of interleaving, early stop bounded, watchdog
//! termination, and failure classification.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use qstorm_core::{RunController, ServiceConnection, WorkloadCorpus};
use qstorm_error::ExecutionError;
use qstorm_types::{
    OutcomeError, RunConfig, SelectionPlan, SelectionPolicy, StopReason, WorkloadItem,
};

// ─── Scripted engines ──────────────────────────────────────────────────

/// Answers "Qn" with "Rn"; counts calls.
#[derive(Default)]
struct EchoConnection {
    calls: AtomicU64,
}

impl ServiceConnection for EchoConnection {
    fn execute(&self, query: &str) -> Result<String, ExecutionError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(query.replacen('Q', "R", 1))
    }
}

/// Raises on one specific query, echoes otherwise.
struct FaultyConnection {
    poison: &'static str,
}

impl ServiceConnection for FaultyConnection {
    fn execute(&self, query: &str) -> Result<String, ExecutionError> {
        if query == self.poison {
            return Err(ExecutionError::new(format!("engine rejected {query}")));
        }
        Ok(query.replacen('Q', "R", 1))
    }
}

/// Echoes after a short sleep, to give time-limited runs something to do.
struct SlowConnection {
    delay: Duration,
}

impl ServiceConnection for SlowConnection {
    fn execute(&self, query: &str) -> Result<String, ExecutionError> {
        std::thread::sleep(self.delay);
        Ok(query.replacen('Q', "R", 1))
    }
}

fn two_item_corpus() -> WorkloadCorpus {
    WorkloadCorpus::from_items(vec![
        WorkloadItem::checked("Q1", "R1"),
        WorkloadItem::checked("Q2", "R2"),
    ])
    .expect("corpus")
}

fn assert_accounting(report: &qstorm_types::RunReport) {
    assert_eq!(
        report.total_succeeded + report.total_failed,
        report.total_run,
        "success/failure split must partition the total"
    );
    let per_worker_sum: u64 = report.per_worker.iter().map(|s| s.executed).sum();
    assert_eq!(
        per_worker_sum, report.total_run,
        "per-worker counts must sum to the aggregate total (no lost or duplicated outcomes)"
    );
    assert_eq!(
        report.total_failed,
        report.errors.len() as u64,
        "every failure must be retained for diagnostics"
    );
}

// ─── Scenarios ─────────────────────────────────────────────────────────

#[test]
fn three_workers_ten_iterations_sequential_all_pass() {
    let connection = EchoConnection::default();
    let config = RunConfig::sequential(3, 10);
    let report = RunController::execute(&two_item_corpus(), &connection, &config).expect("run");

    assert_eq!(report.total_run, 30);
    assert_eq!(report.total_failed, 0);
    assert_eq!(report.stop_reason, StopReason::IterationBudget);
    assert_eq!(report.per_worker.len(), 3);
    assert!(report.per_worker.iter().all(|s| s.executed == 10));
    assert_eq!(connection.calls.load(Ordering::Relaxed), 30);
    assert_accounting(&report);
}

#[test]
fn faulty_item_fails_once_per_worker_per_occurrence() {
    let connection = FaultyConnection { poison: "Q2" };
    let config = RunConfig::sequential(3, 10);
    let report = RunController::execute(&two_item_corpus(), &connection, &config).expect("run");

    // Each worker alternates Q1/Q2 sequentially: 5 Q2 hits per worker.
    assert_eq!(report.total_run, 30);
    assert_eq!(report.total_failed, 15);
    assert_eq!(report.total_succeeded, 15);
    assert!(report.total_failed >= 10, "at least one per worker per occurrence");
    assert_accounting(&report);

    for outcome in &report.errors {
        match outcome.error.as_ref().expect("failed outcome has detail") {
            OutcomeError::Execution { message } => {
                assert!(
                    message.contains("exception occurred on iteration"),
                    "context missing: {message}"
                );
            }
            other => panic!("expected execution failures only, got {other:?}"),
        }
    }
}

#[test]
fn run_only_corpus_records_execution_failures_never_mismatches() {
    let connection = FaultyConnection { poison: "Q2" };
    let corpus = WorkloadCorpus::from_items(vec![
        WorkloadItem::load_only("Q1"),
        WorkloadItem::load_only("Q2"),
    ])
    .expect("corpus");
    let config = RunConfig::sequential(2, 8);
    let report = RunController::execute(&corpus, &connection, &config).expect("run");

    assert!(report.total_failed > 0);
    assert!(
        report
            .errors
            .iter()
            .all(|o| matches!(o.error, Some(OutcomeError::Execution { .. }))),
        "load-only items must never produce validation mismatches"
    );
    assert_accounting(&report);
}

#[test]
fn k_times_m_accounting_under_random_selection() {
    let connection = EchoConnection::default();
    let corpus = WorkloadCorpus::from_items(
        (0..8)
            .map(|i| WorkloadItem::checked(format!("Q{i}"), format!("R{i}")))
            .collect(),
    )
    .expect("corpus");
    let config = RunConfig::sequential(4, 50)
        .with_selection(SelectionPlan::Flat(SelectionPolicy::Random))
        .with_seed(0xA5A5);
    let report = RunController::execute(&corpus, &connection, &config).expect("run");

    assert_eq!(report.total_run, 200);
    assert_eq!(report.total_failed, 0);
    assert_accounting(&report);
}

#[test]
fn grouped_selection_runs_through_the_controller() {
    let connection = EchoConnection::default();
    let corpus = WorkloadCorpus::builder()
        .group("suite-a")
        .item("Q1", "R1")
        .item("Q2", "R2")
        .group("suite-b")
        .item("Q3", "R3")
        .build()
        .expect("corpus");
    let config = RunConfig::sequential(2, 9).with_selection(SelectionPlan::Grouped {
        groups: SelectionPolicy::Sequential,
        items: SelectionPolicy::Sequential,
    });
    let report = RunController::execute(&corpus, &connection, &config).expect("run");

    assert_eq!(report.total_run, 18);
    assert_eq!(report.total_failed, 0);
    assert_accounting(&report);
}

#[test]
fn stop_on_first_failure_bounds_the_run() {
    // The failing item comes first, so every worker detects it on its
    // own first iteration at the latest.
    let connection = FaultyConnection { poison: "Q0" };
    let corpus = WorkloadCorpus::from_items(
        std::iter::once(WorkloadItem::checked("Q0", "R0"))
            .chain((1..50).map(|i| WorkloadItem::checked(format!("Q{i}"), format!("R{i}"))))
            .collect(),
    )
    .expect("corpus");
    let config = RunConfig::sequential(4, 0).with_stop_on_first_failure();
    let report = RunController::execute(&corpus, &connection, &config).expect("run");

    assert_eq!(report.stop_reason, StopReason::Failure);
    assert!(
        report.total_run <= 4,
        "no worker may run more than one iteration past detection, got {}",
        report.total_run
    );
    assert!(report.total_failed >= 1);
    assert!(!report.passed());
    assert_accounting(&report);
}

#[test]
fn watchdog_ends_an_unbounded_run() {
    let connection = SlowConnection {
        delay: Duration::from_millis(5),
    };
    let config = RunConfig::sequential(3, 0).with_time_limit_millis(150);
    let report = RunController::execute(&two_item_corpus(), &connection, &config).expect("run");

    assert_eq!(report.stop_reason, StopReason::TimeLimit);
    assert!(report.total_run > 0, "workers should have made progress");
    assert_eq!(report.total_failed, 0);
    assert!(
        report.wall_clock_millis >= 100,
        "run ended far too early: {} ms",
        report.wall_clock_millis
    );
    assert_accounting(&report);
}

#[test]
fn iteration_budget_wins_when_it_exhausts_before_the_deadline() {
    let connection = EchoConnection::default();
    let config = RunConfig::sequential(2, 5).with_time_limit_millis(60_000);
    let report = RunController::execute(&two_item_corpus(), &connection, &config).expect("run");

    assert_eq!(report.total_run, 10);
    assert_eq!(report.stop_reason, StopReason::IterationBudget);
}

#[test]
fn report_content_is_deterministic_across_runs() {
    // Totals (not outcome order) must be independent of interleaving.
    let corpus = two_item_corpus();
    let config = RunConfig::sequential(4, 25);
    let first = RunController::execute(&corpus, &EchoConnection::default(), &config).expect("run");
    let second = RunController::execute(&corpus, &EchoConnection::default(), &config).expect("run");

    assert_eq!(first.total_run, second.total_run);
    assert_eq!(first.total_succeeded, second.total_succeeded);
    assert_eq!(first.total_failed, second.total_failed);
}
