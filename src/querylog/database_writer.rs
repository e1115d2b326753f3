//! MySQL / PostgreSQL backed query log.

use super::error::WriterResult;
use super::types::{LogEntry, QueryLogWriter};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{MySql, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{debug, error, info};

/// Entries buffered before a bulk insert is forced.
const MAX_PENDING: usize = 1000;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const MYSQL_SCHEMA: &[&str] = &["CREATE TABLE IF NOT EXISTS log_entries (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        request_ts DATETIME(3) NOT NULL,
        client_ip VARCHAR(64) NOT NULL,
        client_name VARCHAR(255) NOT NULL,
        duration_ms BIGINT NOT NULL,
        reason VARCHAR(512) NOT NULL,
        response_type VARCHAR(32) NOT NULL,
        response_code VARCHAR(16) NOT NULL,
        question_type VARCHAR(16) NOT NULL,
        question_name VARCHAR(255) NOT NULL,
        answer TEXT NOT NULL,
        INDEX idx_log_entries_request_ts (request_ts)
    )"];

const POSTGRES_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS log_entries (
        id BIGSERIAL PRIMARY KEY,
        request_ts TIMESTAMPTZ NOT NULL,
        client_ip TEXT NOT NULL,
        client_name TEXT NOT NULL,
        duration_ms BIGINT NOT NULL,
        reason TEXT NOT NULL,
        response_type TEXT NOT NULL,
        response_code TEXT NOT NULL,
        question_type TEXT NOT NULL,
        question_name TEXT NOT NULL,
        answer TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_log_entries_request_ts ON log_entries(request_ts)",
];

const INSERT_PREFIX: &str = "INSERT INTO log_entries (request_ts, client_ip, client_name, \
     duration_ms, reason, response_type, response_code, question_type, question_name, answer) ";

enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
}

/// Row values, owned so they can be bound after the entry is gone.
struct LogRow {
    request_ts: DateTime<Utc>,
    client_ip: String,
    client_name: String,
    duration_ms: i64,
    reason: String,
    response_type: String,
    response_code: String,
    question_type: String,
    question_name: String,
    answer: String,
}

impl From<&LogEntry> for LogRow {
    fn from(entry: &LogEntry) -> Self {
        Self {
            request_ts: entry.timestamp.with_timezone(&Utc),
            client_ip: entry.client_ip.clone(),
            client_name: entry.client_names_string(),
            duration_ms: entry.duration_ms as i64,
            reason: entry.response_reason.clone(),
            response_type: entry.response_type.to_string(),
            response_code: entry.response_code.clone(),
            question_type: entry.question.record_type.clone(),
            question_name: entry.question.value.clone(),
            answer: entry.answers_string(),
        }
    }
}

// Same statement for both dialects; QueryBuilder picks the placeholder style.
macro_rules! bulk_insert {
    ($db:ty, $pool:expr, $rows:expr) => {{
        let mut builder = QueryBuilder::<$db>::new(INSERT_PREFIX);
        builder.push_values($rows, |mut b, row| {
            b.push_bind(row.request_ts)
                .push_bind(row.client_ip)
                .push_bind(row.client_name)
                .push_bind(row.duration_ms)
                .push_bind(row.reason)
                .push_bind(row.response_type)
                .push_bind(row.response_code)
                .push_bind(row.question_type)
                .push_bind(row.question_name)
                .push_bind(row.answer);
        });
        builder.build().execute($pool).await.map(|r| r.rows_affected())
    }};
}

/// Buffers entries and bulk inserts them into the `log_entries` table.
pub struct DatabaseWriter {
    pool: DbPool,
    pending: Vec<LogRow>,
    retention_days: u64,
}

impl DatabaseWriter {
    /// Connects to a MySQL server and makes sure the table exists.
    pub async fn mysql(dsn: &str, retention_days: u64) -> WriterResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect(dsn)
            .await?;
        for statement in MYSQL_SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        info!("Query log connected to MySQL");
        Ok(Self::with_pool(DbPool::MySql(pool), retention_days))
    }

    /// Connects to a PostgreSQL server and makes sure the table exists.
    pub async fn postgres(dsn: &str, retention_days: u64) -> WriterResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect(dsn)
            .await?;
        for statement in POSTGRES_SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        info!("Query log connected to PostgreSQL");
        Ok(Self::with_pool(DbPool::Postgres(pool), retention_days))
    }

    fn with_pool(pool: DbPool, retention_days: u64) -> Self {
        Self {
            pool,
            pending: Vec::with_capacity(MAX_PENDING),
            retention_days,
        }
    }

    async fn insert_pending(&mut self) -> Result<u64, sqlx::Error> {
        let rows = std::mem::take(&mut self.pending);
        match &self.pool {
            DbPool::MySql(pool) => bulk_insert!(MySql, pool, rows),
            DbPool::Postgres(pool) => bulk_insert!(Postgres, pool, rows),
        }
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        match &self.pool {
            DbPool::MySql(pool) => sqlx::query("DELETE FROM log_entries WHERE request_ts < ?")
                .bind(cutoff)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            DbPool::Postgres(pool) => sqlx::query("DELETE FROM log_entries WHERE request_ts < $1")
                .bind(cutoff)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        }
    }
}

/// Oldest timestamp still inside the window, `None` when it predates any
/// representable date.
fn retention_cutoff(now: DateTime<Utc>, retention_days: u64) -> Option<DateTime<Utc>> {
    let days = i64::try_from(retention_days).ok()?;
    now.checked_sub_signed(ChronoDuration::try_days(days)?)
}

#[async_trait::async_trait]
impl QueryLogWriter for DatabaseWriter {
    async fn write(&mut self, entry: &LogEntry) {
        self.pending.push(LogRow::from(entry));
        if self.pending.len() >= MAX_PENDING {
            self.flush().await;
        }
    }

    async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let count = self.pending.len();
        if let Err(e) = self.insert_pending().await {
            error!("Failed to insert {} query log entries: {}", count, e);
        }
    }

    async fn clean_up(&mut self) {
        if self.retention_days == 0 {
            return;
        }
        let Some(cutoff) = retention_cutoff(Utc::now(), self.retention_days) else {
            debug!("Retention reaches past the calendar, nothing to prune");
            return;
        };
        match self.prune(cutoff).await {
            Ok(deleted) => info!("Pruned {} expired query log rows", deleted),
            Err(e) => error!("Failed to prune old query log rows: {}", e),
        }
    }
}
