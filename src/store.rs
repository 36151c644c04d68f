// 🗄️ Record Store Adapter - read-only access to persisted revenue records
//
// `RecordStore` is the only seam between the engine and persistence.
// SqliteStore pushes predicate + ordering down into SQL; MemoryStore
// evaluates them in-process and doubles as a test store.

use crate::db::{record_from_row, RECORD_COLUMNS};
use crate::deadline::Deadline;
use crate::error::{QueryError, QueryResult};
use crate::filter::Predicate;
use crate::record::RevenueRecord;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::cmp::Ordering;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

/// How often (in rows) scans re-check the caller's deadline
const DEADLINE_CHECK_INTERVAL: usize = 256;

/// SQLite VM instructions between progress-handler deadline checks
const PROGRESS_HANDLER_OPS: i32 = 1_000;

/// Callback receiving records one at a time; `Break` stops the scan.
pub type Visitor<'a> = dyn FnMut(RevenueRecord) -> ControlFlow<()> + 'a;

/// Order in which a scan yields records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Storage order (row id ascending)
    Natural,
    /// Latest period first, highest revenue first within a period
    NewestFirst,
    /// Earliest period first
    OldestFirst,
}

impl SortOrder {
    fn sql(&self) -> &'static str {
        match self {
            SortOrder::Natural => "id ASC",
            SortOrder::NewestFirst => "year_month DESC, revenue DESC, id ASC",
            SortOrder::OldestFirst => "year_month ASC, id ASC",
        }
    }

    fn compare(&self, a: &RevenueRecord, b: &RevenueRecord) -> Ordering {
        match self {
            SortOrder::Natural => a.id.cmp(&b.id),
            SortOrder::NewestFirst => b
                .year_month
                .cmp(&a.year_month)
                .then_with(|| b.revenue_amount.total_cmp(&a.revenue_amount))
                .then_with(|| a.id.cmp(&b.id)),
            SortOrder::OldestFirst => a
                .year_month
                .cmp(&b.year_month)
                .then_with(|| a.id.cmp(&b.id)),
        }
    }
}

/// Read-only record source shared by concurrent queries.
pub trait RecordStore: Send + Sync {
    /// Stream records admitted by `predicate`, in `order`, to `visit`.
    /// Every call is a fresh scan.
    fn scan(
        &self,
        predicate: &Predicate,
        order: SortOrder,
        deadline: &Deadline,
        visit: &mut Visitor<'_>,
    ) -> QueryResult<()>;

    /// Total number of persisted records.
    fn count(&self, deadline: &Deadline) -> QueryResult<u64>;

    /// Whether the persistence engine is reachable right now.
    fn ping(&self) -> bool;

    fn fetch(
        &self,
        predicate: &Predicate,
        order: SortOrder,
        deadline: &Deadline,
    ) -> QueryResult<Vec<RevenueRecord>> {
        let mut records = Vec::new();
        self.scan(predicate, order, deadline, &mut |record| {
            records.push(record);
            ControlFlow::Continue(())
        })?;
        Ok(records)
    }
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// Connections kept by the read pool
const POOL_MAX_CONNECTIONS: u32 = 8;

/// How long a caller waits for a pooled connection
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Read-only SQLite store over a pool of connections. Nothing is opened until
/// first use, and a database file that appears later is picked up without
/// restarting.
pub struct SqliteStore {
    path: PathBuf,
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Self {
        let manager = SqliteConnectionManager::file(path).with_flags(
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        );

        let pool = Pool::builder()
            .max_size(POOL_MAX_CONNECTIONS)
            .min_idle(Some(0))
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .build_unchecked(manager);

        SqliteStore {
            path: path.to_path_buf(),
            pool,
        }
    }

    fn connection(&self) -> QueryResult<PooledConnection<SqliteConnectionManager>> {
        if !self.path.is_file() {
            return Err(QueryError::unavailable(format!(
                "database {} does not exist",
                self.path.display()
            )));
        }

        self.pool.get().map_err(|e| {
            QueryError::unavailable(format!("cannot open {}: {}", self.path.display(), e))
        })
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> QueryResult<T>,
    ) -> QueryResult<T> {
        let result = self.connection().and_then(|conn| f(&*conn));

        if let Err(QueryError::StoreUnavailable(reason)) = &result {
            tracing::error!(%reason, path = %self.path.display(), "revenue store failure");
        }
        result
    }
}

/// Run `f` with SQLite interrupting any statement that outlives `deadline`.
fn with_deadline<T>(
    conn: &Connection,
    deadline: &Deadline,
    f: impl FnOnce(&Connection) -> QueryResult<T>,
) -> QueryResult<T> {
    if let Some(at) = deadline.instant() {
        conn.progress_handler(PROGRESS_HANDLER_OPS, Some(move || Instant::now() >= at));
    }
    let result = f(conn);
    conn.progress_handler(0, None::<fn() -> bool>);
    result
}

fn scan_rows(
    conn: &Connection,
    sql: &str,
    values: &[String],
    deadline: &Deadline,
    visit: &mut Visitor<'_>,
) -> QueryResult<()> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(values.iter()))?;

    let mut seen = 0usize;
    while let Some(row) = rows.next()? {
        seen += 1;
        if seen % DEADLINE_CHECK_INTERVAL == 0 {
            deadline.check()?;
        }

        let record = match record_from_row(row) {
            Ok(record) => record,
            Err(error) => {
                let id = row.get::<_, i64>(0).unwrap_or_default();
                tracing::warn!(id, %error, "skipping undecodable revenue row");
                continue;
            }
        };

        if visit(record).is_break() {
            break;
        }
    }

    Ok(())
}

impl RecordStore for SqliteStore {
    fn scan(
        &self,
        predicate: &Predicate,
        order: SortOrder,
        deadline: &Deadline,
        visit: &mut Visitor<'_>,
    ) -> QueryResult<()> {
        deadline.check()?;

        let (where_sql, values) = predicate.where_clause();
        let sql = format!(
            "SELECT {} FROM hospital_revenue{} ORDER BY {}",
            RECORD_COLUMNS,
            where_sql,
            order.sql()
        );
        tracing::debug!(%sql, "scanning revenue records");

        self.with_connection(|conn| {
            with_deadline(conn, deadline, |conn| {
                scan_rows(conn, &sql, &values, deadline, visit)
            })
        })
    }

    fn count(&self, deadline: &Deadline) -> QueryResult<u64> {
        deadline.check()?;

        self.with_connection(|conn| {
            with_deadline(conn, deadline, |conn| {
                let total = conn.query_row("SELECT COUNT(*) FROM hospital_revenue", [], |row| {
                    row.get::<_, i64>(0)
                })?;
                Ok(total.max(0) as u64)
            })
        })
    }

    fn ping(&self) -> bool {
        self.with_connection(|conn| {
            conn.prepare("SELECT 1 FROM hospital_revenue LIMIT 1")?;
            Ok(())
        })
        .is_ok()
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// In-process store over a fixed record set. Reachability can be toggled to
/// exercise the unavailable paths.
pub struct MemoryStore {
    records: Vec<RevenueRecord>,
    online: AtomicBool,
}

impl MemoryStore {
    /// Records with `id == 0` get their 1-based position as id.
    pub fn new(records: Vec<RevenueRecord>) -> Self {
        let records = records
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                if record.id == 0 {
                    record.id = i as i64 + 1;
                }
                record
            })
            .collect();

        MemoryStore {
            records,
            online: AtomicBool::new(true),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, AtomicOrdering::SeqCst);
    }

    fn ensure_online(&self) -> QueryResult<()> {
        if self.online.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(QueryError::unavailable("memory store offline"))
        }
    }
}

impl RecordStore for MemoryStore {
    fn scan(
        &self,
        predicate: &Predicate,
        order: SortOrder,
        deadline: &Deadline,
        visit: &mut Visitor<'_>,
    ) -> QueryResult<()> {
        self.ensure_online()?;
        deadline.check()?;

        let mut matched: Vec<&RevenueRecord> = self
            .records
            .iter()
            .filter(|r| predicate.matches(r))
            .collect();
        matched.sort_by(|a, b| order.compare(a, b));

        for (i, record) in matched.into_iter().enumerate() {
            if (i + 1) % DEADLINE_CHECK_INTERVAL == 0 {
                deadline.check()?;
            }
            if visit(record.clone()).is_break() {
                break;
            }
        }

        Ok(())
    }

    fn count(&self, deadline: &Deadline) -> QueryResult<u64> {
        self.ensure_online()?;
        deadline.check()?;
        Ok(self.records.len() as u64)
    }

    fn ping(&self) -> bool {
        self.online.load(AtomicOrdering::SeqCst)
    }
}
