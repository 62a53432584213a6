//! Data model shared by the querystorm harness crates.
//!
//! Everything here is plain data: workload items and groups, the run
//! configuration, per-query outcomes, the aggregate run report, and cache
//! counter snapshots. All report-facing types are serde-serializable so
//! runs can be archived as JSON artifacts.
//!
//! Lifecycle: [`RunConfig`] and the workload are constructed before a run
//! and are read-only while it executes. [`Outcome`] and [`RunReport`]
//! instances are created fresh per run and never reused.

use std::fmt;

use qstorm_error::{HarnessError, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Workload
// ---------------------------------------------------------------------------

/// One query plus its expected rendered result.
///
/// `expected == None` means "run only, do not validate", used for pure
/// load generation where only engine exceptions count as failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadItem {
    /// The query text handed verbatim to the service connection.
    pub query_text: String,
    /// Expected result rendering, if this item is validated.
    #[serde(default)]
    pub expected: Option<String>,
}

impl WorkloadItem {
    /// A validated item: the actual result must match `expected`.
    #[must_use]
    pub fn checked(query_text: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            expected: Some(expected.into()),
        }
    }

    /// A load-only item: executed but never compared.
    #[must_use]
    pub fn load_only(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            expected: None,
        }
    }
}

/// Named, ordered sequence of workload items.
///
/// Insertion order is significant for sequential selection and irrelevant
/// for random selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkGroup {
    /// Group name, unique within a corpus.
    pub name: String,
    /// Items in registration order.
    pub items: Vec<WorkloadItem>,
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// How the next workload item is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Deterministic round-robin: `items[counter % size]`.
    Sequential,
    /// Uniform draw with replacement from a seeded source.
    Random,
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Random => f.write_str("random"),
        }
    }
}

/// Selection over a corpus: flat over all items, or two-level over groups.
///
/// Grouped selection reproduces nested-suite execution: pick a group,
/// then pick an item within it. A sequential item policy exhausts the
/// whole group before the group cursor advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPlan {
    /// Single-level selection over the flattened item list.
    Flat(SelectionPolicy),
    /// Two-level selection: group policy, then item policy within it.
    Grouped {
        /// Policy choosing which group to draw from.
        groups: SelectionPolicy,
        /// Policy choosing the item inside the chosen group.
        items: SelectionPolicy,
    },
}

impl SelectionPlan {
    /// The policy applied at the item level.
    #[must_use]
    pub fn item_policy(&self) -> SelectionPolicy {
        match self {
            Self::Flat(policy) => *policy,
            Self::Grouped { items, .. } => *items,
        }
    }
}

/// Immutable parameters of a single harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of virtual users. Must be >= 1.
    pub worker_count: usize,
    /// Per-worker iteration budget. 0 means unbounded.
    pub iteration_limit: u64,
    /// Global wall-clock budget in milliseconds. 0 means unbounded.
    pub time_limit_millis: u64,
    /// Item selection strategy.
    pub selection: SelectionPlan,
    /// Trip the shared stop signal on the first recorded failure.
    pub stop_on_first_failure: bool,
    /// Root seed for random selection; worker `i` derives `seed + i`.
    pub seed: u64,
}

impl RunConfig {
    /// Sequential run with the given worker and iteration counts, no time
    /// limit. The common starting point for correctness runs.
    #[must_use]
    pub fn sequential(worker_count: usize, iteration_limit: u64) -> Self {
        Self {
            worker_count,
            iteration_limit,
            time_limit_millis: 0,
            selection: SelectionPlan::Flat(SelectionPolicy::Sequential),
            stop_on_first_failure: false,
            seed: 0,
        }
    }

    /// Override the wall-clock budget.
    #[must_use]
    pub fn with_time_limit_millis(mut self, millis: u64) -> Self {
        self.time_limit_millis = millis;
        self
    }

    /// Override the selection plan.
    #[must_use]
    pub fn with_selection(mut self, selection: SelectionPlan) -> Self {
        self.selection = selection;
        self
    }

    /// Override the random-selection seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable cooperative early stop on the first failure.
    #[must_use]
    pub fn with_stop_on_first_failure(mut self) -> Self {
        self.stop_on_first_failure = true;
        self
    }

    /// Reject parameter combinations the harness cannot run.
    ///
    /// A run with neither an iteration limit nor a time limit is legal:
    /// it runs until the stop signal is tripped externally.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(HarnessError::InvalidConfig(
                "worker_count must be >= 1".to_owned(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why an executed item was counted as failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeError {
    /// The engine raised while executing the query.
    Execution {
        /// Contextualized engine error ("exception occurred on iteration N: ...").
        message: String,
    },
    /// The query ran but its result differed from the expected fixture.
    /// Carries both sides for diagnostic reporting.
    Mismatch {
        /// Normalized expected rendering.
        expected: String,
        /// Actual rendering returned by the engine.
        actual: String,
    },
}

impl fmt::Display for OutcomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execution { message } => f.write_str(message),
            Self::Mismatch { expected, actual } => {
                write!(f, "result mismatch: expected {expected:?}, got {actual:?}")
            }
        }
    }
}

/// Record of one executed workload item. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Worker that executed the item.
    pub worker_id: usize,
    /// Global index of the item within the corpus.
    pub item_index: usize,
    /// 0-based iteration of the owning worker.
    pub iteration: u64,
    /// Whether the execution counted as a success.
    pub succeeded: bool,
    /// Failure detail when `succeeded` is false.
    pub error: Option<OutcomeError>,
    /// Time spent inside the service call, in milliseconds.
    pub elapsed_millis: u64,
    /// Milliseconds since the run started when the item was executed.
    pub offset_millis: u64,
}

impl Outcome {
    /// A successful execution record.
    #[must_use]
    pub fn success(
        worker_id: usize,
        item_index: usize,
        iteration: u64,
        elapsed_millis: u64,
        offset_millis: u64,
    ) -> Self {
        Self {
            worker_id,
            item_index,
            iteration,
            succeeded: true,
            error: None,
            elapsed_millis,
            offset_millis,
        }
    }

    /// A failed execution record carrying its failure detail.
    #[must_use]
    pub fn failure(
        worker_id: usize,
        item_index: usize,
        iteration: u64,
        error: OutcomeError,
        elapsed_millis: u64,
        offset_millis: u64,
    ) -> Self {
        Self {
            worker_id,
            item_index,
            iteration,
            succeeded: false,
            error: Some(error),
            elapsed_millis,
            offset_millis,
        }
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Why the run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every worker exhausted its iteration budget.
    IterationBudget,
    /// The watchdog (or a worker's own deadline check) fired.
    TimeLimit,
    /// A worker tripped the stop signal after a failure.
    Failure,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IterationBudget => f.write_str("iteration budget exhausted"),
            Self::TimeLimit => f.write_str("time limit expired"),
            Self::Failure => f.write_str("failure"),
        }
    }
}

/// Per-worker execution totals, used for the per-worker report lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    /// Worker identifier.
    pub worker_id: usize,
    /// Items this worker executed.
    pub executed: u64,
    /// Items that counted as successes.
    pub succeeded: u64,
    /// Items that counted as failures.
    pub failed: u64,
    /// Wall-clock time the worker spent in its loop, in milliseconds.
    pub elapsed_millis: u64,
}

/// Aggregate result of one harness run.
///
/// Invariants: `total_run == total_succeeded + total_failed`, and
/// `total_run` equals the sum of per-worker executed counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Total items executed across all workers.
    pub total_run: u64,
    /// Items that succeeded.
    pub total_succeeded: u64,
    /// Items that failed (execution errors and mismatches alike).
    pub total_failed: u64,
    /// Every failed outcome, in aggregator arrival order.
    pub errors: Vec<Outcome>,
    /// Per-worker totals, ordered by worker id.
    pub per_worker: Vec<WorkerSummary>,
    /// Wall-clock duration of the whole run, in milliseconds.
    pub wall_clock_millis: u64,
    /// Why the run stopped.
    pub stop_reason: StopReason,
}

impl RunReport {
    /// Whether the run counts as passed: no recorded failures.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.total_failed == 0
    }

    /// One-line summary for triage output.
    #[must_use]
    pub fn summary_line(&self) -> String {
        if self.passed() {
            format!(
                "PASS: {} queries across {} workers in {} ms ({})",
                self.total_run,
                self.per_worker.len(),
                self.wall_clock_millis,
                self.stop_reason,
            )
        } else {
            format!(
                "FAIL: {} of {} queries failed across {} workers in {} ms ({})",
                self.total_failed,
                self.total_run,
                self.per_worker.len(),
                self.wall_clock_millis,
                self.stop_reason,
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Cache counters
// ---------------------------------------------------------------------------

/// Point-in-time reading of the cache counters.
///
/// The ratio is derived, never stored: `hit_ratio == hits / requests`,
/// undefined (`None`) when no requests were observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Total cache lookups.
    pub request_count: u64,
    /// Lookups served from the cache.
    pub hit_count: u64,
    /// Lookups that fell through to the backing engine.
    pub miss_count: u64,
}

impl CacheSnapshot {
    /// Counter-wise difference `self - earlier`, saturating at zero so a
    /// flushed-and-restarted counter never yields nonsense deltas.
    #[must_use]
    pub fn delta_since(&self, earlier: &Self) -> Self {
        Self {
            request_count: self.request_count.saturating_sub(earlier.request_count),
            hit_count: self.hit_count.saturating_sub(earlier.hit_count),
            miss_count: self.miss_count.saturating_sub(earlier.miss_count),
        }
    }

    /// `hits / requests`, or `None` when no requests were observed.
    #[must_use]
    pub fn hit_ratio(&self) -> Option<f64> {
        if self.request_count == 0 {
            None
        } else {
            Some(self.hit_count as f64 / self.request_count as f64)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
