//! Demonstration query service for the standalone load tester.
//!
//! A real SQLite engine (in memory, behind a mutex) fronted by a shared
//! LRU query cache: the smallest honest instance of "query service
//! backed by a shared, mutable cache" the harness exists to pound on.
//! Results are rendered as pipe-separated fields, one row per line, so
//! fixtures compare as plain text.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use qstorm_core::{CacheStatsSource, ServiceConnection};
use qstorm_error::ExecutionError;
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use tracing::debug;

const DEFAULT_CACHE_CAPACITY: usize = 256;

/// In-memory SQLite engine plus shared query cache with hit/miss counters.
pub struct CachedSqliteService {
    engine: Mutex<Connection>,
    cache: Mutex<LruCache<String, String>>,
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedSqliteService {
    /// Open the engine and seed the demonstration schema.
    pub fn open_demo() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|err| format!("engine_open_failed: {err}"))?;
        conn.execute_batch(
            "CREATE TABLE inventory (id INTEGER PRIMARY KEY, name TEXT NOT NULL, qty INTEGER NOT NULL);
             INSERT INTO inventory (id, name, qty) VALUES (1, 'bolt', 120);
             INSERT INTO inventory (id, name, qty) VALUES (2, 'nut', 80);
             INSERT INTO inventory (id, name, qty) VALUES (3, 'washer', 200);",
        )
        .map_err(|err| format!("demo_schema_failed: {err}"))?;

        let capacity = NonZeroUsize::new(DEFAULT_CACHE_CAPACITY)
            .ok_or_else(|| "cache capacity must be nonzero".to_owned())?;
        Ok(Self {
            engine: Mutex::new(conn),
            cache: Mutex::new(LruCache::new(capacity)),
            requests: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// The built-in workload used when no workload file is given.
    ///
    /// Expected fixtures match [`render_rows`]' textual rendering of the
    /// demo schema. The load-only item exercises the cache without
    /// validation.
    #[must_use]
    pub fn demo_workload() -> Vec<qstorm_types::WorkloadItem> {
        use qstorm_types::WorkloadItem;
        vec![
            WorkloadItem::checked("SELECT 1", "1"),
            WorkloadItem::checked("SELECT count(*) FROM inventory", "3"),
            WorkloadItem::checked(
                "SELECT id, name FROM inventory ORDER BY id",
                "1|bolt\n2|nut\n3|washer",
            ),
            WorkloadItem::checked("SELECT name FROM inventory WHERE id = 1", "bolt"),
            WorkloadItem::checked(
                "SELECT name, qty FROM inventory WHERE qty > 100 ORDER BY qty",
                "bolt|120\nwasher|200",
            ),
            WorkloadItem::load_only("SELECT qty FROM inventory WHERE id = 2"),
        ]
    }
}

impl ServiceConnection for CachedSqliteService {
    fn execute(&self, query: &str) -> Result<String, ExecutionError> {
        self.requests.fetch_add(1, Ordering::Relaxed);

        if let Some(cached) = self.cache.lock().get(query).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let rendered = {
            let engine = self.engine.lock();
            render_rows(&engine, query).map_err(|err| ExecutionError::new(err.to_string()))?
        };
        self.cache.lock().put(query.to_owned(), rendered.clone());
        Ok(rendered)
    }
}

impl CacheStatsSource for CachedSqliteService {
    fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn flush(&self, region: &str) {
        debug!(region, "flushing query cache");
        self.cache.lock().clear();
    }
}

/// Execute `query` and render the result set as text: fields joined with
/// `|`, rows joined with `\n`, empty result as the empty string.
fn render_rows(conn: &Connection, query: &str) -> Result<String, rusqlite::Error> {
    let mut stmt = conn.prepare(query)?;
    let column_count = stmt.column_count();
    let mut rows = stmt.query([])?;
    let mut lines: Vec<String> = Vec::new();
    while let Some(row) = rows.next()? {
        let mut fields = Vec::with_capacity(column_count);
        for index in 0..column_count {
            fields.push(render_value(row.get_ref(index)?));
        }
        lines.push(fields.join("|"));
    }
    Ok(lines.join("\n"))
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_owned(),
        ValueRef::Integer(value) => value.to_string(),
        ValueRef::Real(value) => value.to_string(),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Blob(bytes) => format!("blob({} bytes)", bytes.len()),
    }
}
