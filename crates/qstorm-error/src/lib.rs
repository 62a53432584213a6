//! Error taxonomy for the querystorm harness.
//!
//! Only setup-time violations are surfaced through [`HarnessError`]: they
//! abort a run before (or instead of) starting it. Per-query failures are
//! data, not errors: they are captured inside outcome records and never
//! propagate as `Err`.

use thiserror::Error;

/// Convenience alias used across the harness crates.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Fatal, setup-time harness errors.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Run parameters failed validation (zero worker count, malformed
    /// numeric arguments, and similar). The run never starts.
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    /// An item was selected from a corpus with no items.
    #[error("workload corpus is empty")]
    EmptyCorpus,

    /// A worker thread terminated abnormally instead of returning its
    /// outcome list. Distinct from a query failure, which is recovered.
    #[error("worker thread {worker_id} panicked: {message}")]
    WorkerPanic {
        /// Identifier of the worker whose thread died.
        worker_id: usize,
        /// Panic payload rendered to text.
        message: String,
    },

    /// A workload file could not be read.
    #[error("workload file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A workload file was read but could not be understood.
    #[error("malformed workload file: {0}")]
    WorkloadParse(String),
}

/// Error raised by the query service while executing a single query.
///
/// This is the engine-facing error type: the harness converts it into a
/// failed outcome with context and keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutionError {
    /// Human-readable engine error description.
    pub message: String,
}

impl ExecutionError {
    /// Build an execution error from anything renderable as text.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
