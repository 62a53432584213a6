//! querystorm harness core.
//!
//! A concurrent correctness-and-load harness for a query service backed
//! by a shared, mutable cache. Many independent virtual users issue
//! queries against one logical connection, results are validated against
//! expected fixtures, the run is bounded by iteration count and/or
//! wall-clock time, and outcomes are aggregated into a single
//! pass/fail/cache-efficiency report.
//!
//! The harness orchestrates and observes; the query engine, the cache
//! and the workload corpus content are external collaborators reached
//! through the traits in [`connection`] and the types in `qstorm-types`.
//!
//! ```no_run
//! use qstorm_core::{RunController, WorkloadCorpus};
//! use qstorm_types::RunConfig;
//! # struct Engine;
//! # impl qstorm_core::ServiceConnection for Engine {
//! #     fn execute(&self, q: &str) -> Result<String, qstorm_error::ExecutionError> {
//! #         Ok(q.to_owned())
//! #     }
//! # }
//! # fn main() -> qstorm_error::Result<()> {
//! let corpus = WorkloadCorpus::builder()
//!     .group("smoke")
//!     .item("SELECT 1", "1")
//!     .build()?;
//! let config = RunConfig::sequential(4, 1_000);
//! let report = RunController::execute(&corpus, &Engine, &config)?;
//! assert!(report.passed());
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod cache_stats;
pub mod connection;
pub mod controller;
pub mod corpus;
pub mod signal;
pub mod worker;

pub use aggregator::ResultAggregator;
pub use cache_stats::{CacheEfficiency, CacheStatsReporter};
pub use connection::{CacheStatsSource, ServiceConnection};
pub use controller::RunController;
pub use corpus::{Selector, WorkloadCorpus, WorkloadCorpusBuilder};
pub use signal::StopSignal;
pub use worker::{Worker, normalize_expected};
