//! Collaborator interfaces consumed by the harness.
//!
//! The query engine and the cache-statistics provider are external
//! collaborators. The harness reaches them only through these narrow
//! traits, so tests substitute scripted fakes and the CLI plugs in a real
//! engine without the harness knowing either apart.

use qstorm_error::ExecutionError;
use qstorm_types::CacheSnapshot;

/// One logical connection to the query service under test.
///
/// `execute` parses and runs a query string against shared state and
/// returns an opaque textual rendering of the result (typically a
/// normalized multi-line listing) or the engine's error. The harness
/// issues concurrent `execute` calls from every worker; serializing or
/// parallelizing them internally is the implementor's business. The call
/// is treated as atomic; the harness never aborts it mid-flight.
pub trait ServiceConnection: Sync {
    /// Execute a query and return its rendered result.
    fn execute(&self, query: &str) -> Result<String, ExecutionError>;
}

/// Read-only view of the shared cache's counters, plus a flush hook.
///
/// Counters are monotonically non-decreasing and readable at any time
/// without side effects. `flush` resets observed cache *state* (not the
/// counters) and is invoked between runs by test setup, never by the
/// harness itself.
pub trait CacheStatsSource {
    /// Total cache lookups issued so far.
    fn request_count(&self) -> u64;
    /// Lookups answered from the cache.
    fn hit_count(&self) -> u64;
    /// Lookups that fell through to the backing engine.
    fn miss_count(&self) -> u64;
    /// Drop cached entries for the named region.
    fn flush(&self, region: &str);

    /// Capture all three counters as one point-in-time snapshot.
    fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            request_count: self.request_count(),
            hit_count: self.hit_count(),
            miss_count: self.miss_count(),
        }
    }
}
