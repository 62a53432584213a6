//! Cache-efficiency measurement around a run.
//!
//! Snapshots the shared cache's request/hit/miss counters before and
//! after a run and derives a hit ratio. When `before()` was taken the
//! report is the counter delta; when the cache was flushed by test setup
//! instead, absolute counters are reported. Zero observed requests
//! yields an explicitly undefined ratio, surfaced as such and never
//! coerced to 0.

use std::fmt;

use qstorm_types::CacheSnapshot;
use serde::{Deserialize, Serialize};

use crate::connection::CacheStatsSource;

/// Derived cache-efficiency figures for one measurement window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheEfficiency {
    /// Cache lookups in the window.
    pub requests: u64,
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that fell through to the engine.
    pub misses: u64,
    /// `hits / requests`; `None` when `requests == 0`.
    pub hit_ratio: Option<f64>,
}

impl CacheEfficiency {
    fn from_snapshot(snapshot: CacheSnapshot) -> Self {
        Self {
            requests: snapshot.request_count,
            hits: snapshot.hit_count,
            misses: snapshot.miss_count,
            hit_ratio: snapshot.hit_ratio(),
        }
    }

    /// Ratio rendered for reports: three decimals, or `undefined`.
    #[must_use]
    pub fn ratio_text(&self) -> String {
        match self.hit_ratio {
            Some(ratio) => format!("{ratio:.3}"),
            None => "undefined".to_owned(),
        }
    }
}

impl fmt::Display for CacheEfficiency {
    /// The two report lines: total requests, then misses with the ratio.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cache requests: {}", self.requests)?;
        write!(
            f,
            "cache misses: {} (hit ratio: {})",
            self.misses,
            self.ratio_text()
        )
    }
}

/// Brackets a run with cache-counter snapshots.
///
/// `report()` is idempotent: it captures the closing snapshot at most
/// once and afterwards answers from stored state, so calling it twice
/// without an intervening `before()` produces the same result.
pub struct CacheStatsReporter<'s> {
    source: &'s dyn CacheStatsSource,
    before: Option<CacheSnapshot>,
    after: Option<CacheSnapshot>,
}

impl<'s> CacheStatsReporter<'s> {
    /// A reporter over the given counter source.
    #[must_use]
    pub fn new(source: &'s dyn CacheStatsSource) -> Self {
        Self {
            source,
            before: None,
            after: None,
        }
    }

    /// Open a measurement window: snapshot now, discard any prior close.
    pub fn before(&mut self) -> CacheSnapshot {
        let snapshot = self.source.snapshot();
        self.before = Some(snapshot);
        self.after = None;
        snapshot
    }

    /// Close the measurement window: snapshot now.
    pub fn after(&mut self) -> CacheSnapshot {
        let snapshot = self.source.snapshot();
        self.after = Some(snapshot);
        snapshot
    }

    /// Derived figures for the window.
    ///
    /// Delta of `after - before` when a window was opened; absolute
    /// closing counters otherwise (the flushed-cache measurement mode).
    pub fn report(&mut self) -> CacheEfficiency {
        let after = match self.after {
            Some(snapshot) => snapshot,
            None => self.after(),
        };
        let window = match self.before {
            Some(before) => after.delta_since(&before),
            None => after,
        };
        CacheEfficiency::from_snapshot(window)
    }
}

impl fmt::Debug for CacheStatsReporter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStatsReporter")
            .field("before", &self.before)
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Counter fake the tests can wind forward by hand.
    #[derive(Default)]
    struct FakeCacheStats {
        requests: AtomicU64,
        hits: AtomicU64,
        misses: AtomicU64,
        flushes: AtomicU64,
    }

    impl FakeCacheStats {
        fn advance(&self, requests: u64, hits: u64, misses: u64) {
            self.requests.fetch_add(requests, Ordering::Relaxed);
            self.hits.fetch_add(hits, Ordering::Relaxed);
            self.misses.fetch_add(misses, Ordering::Relaxed);
        }
    }

    impl CacheStatsSource for FakeCacheStats {
        fn request_count(&self) -> u64 {
            self.requests.load(Ordering::Relaxed)
        }
        fn hit_count(&self) -> u64 {
            self.hits.load(Ordering::Relaxed)
        }
        fn miss_count(&self) -> u64 {
            self.misses.load(Ordering::Relaxed)
        }
        fn flush(&self, _region: &str) {
            self.flushes.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn delta_window_reports_only_the_run() {
        let stats = FakeCacheStats::default();
        stats.advance(1_000, 900, 100); // traffic before our window

        let mut reporter = CacheStatsReporter::new(&stats);
        reporter.before();
        stats.advance(100, 80, 20);
        reporter.after();

        let report = reporter.report();
        assert_eq!(report.requests, 100);
        assert_eq!(report.hits, 80);
        assert_eq!(report.misses, 20);
        assert_eq!(report.hit_ratio, Some(0.8));
    }

    #[test]
    fn absolute_mode_without_before() {
        let stats = FakeCacheStats::default();
        stats.advance(100, 80, 20);

        let mut reporter = CacheStatsReporter::new(&stats);
        let report = reporter.report();
        assert_eq!(report.requests, 100);
        assert_eq!(report.hit_ratio, Some(0.8));
    }

    #[test]
    fn zero_requests_is_undefined_not_zero() {
        let stats = FakeCacheStats::default();
        let mut reporter = CacheStatsReporter::new(&stats);
        let report = reporter.report();
        assert_eq!(report.hit_ratio, None);
        assert_eq!(report.ratio_text(), "undefined");
    }

    #[test]
    fn report_is_idempotent() {
        let stats = FakeCacheStats::default();
        stats.advance(10, 5, 5);

        let mut reporter = CacheStatsReporter::new(&stats);
        let first = reporter.report();
        // Counters keep moving, but the stored window must not.
        stats.advance(90, 85, 5);
        let second = reporter.report();
        assert_eq!(first, second);
    }

    #[test]
    fn before_reopens_the_window() {
        let stats = FakeCacheStats::default();
        let mut reporter = CacheStatsReporter::new(&stats);

        reporter.before();
        stats.advance(10, 10, 0);
        let first = reporter.report();
        assert_eq!(first.requests, 10);

        reporter.before();
        stats.advance(4, 2, 2);
        let second = reporter.report();
        assert_eq!(second.requests, 4);
        assert_eq!(second.hit_ratio, Some(0.5));
    }

    #[test]
    fn display_renders_two_lines() {
        let stats = FakeCacheStats::default();
        stats.advance(100, 80, 20);
        let mut reporter = CacheStatsReporter::new(&stats);
        let text = reporter.report().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "cache requests: 100");
        assert_eq!(lines[1], "cache misses: 20 (hit ratio: 0.800)");
    }

    #[test]
    fn snapshot_reads_have_no_side_effects() {
        let stats = FakeCacheStats::default();
        stats.advance(5, 5, 0);
        let mut reporter = CacheStatsReporter::new(&stats);
        reporter.before();
        reporter.after();
        reporter.report();
        assert_eq!(stats.request_count(), 5, "reads must not bump counters");
        assert_eq!(stats.flushes.load(Ordering::Relaxed), 0);
    }
}
