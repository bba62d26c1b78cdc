use async_trait::async_trait;
use ferry_core::error::{Result, StorageError};
use ferry_core::{
    Code, ContentKind, ContentRecord, Consumption, PayloadRef, Quota, ReadRepository, Repository,
    Stats,
};
use jiff::Timestamp;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const SCHEMA: &str = include_str!("../ddl/sqlite/schema.sql");

/// How long a statement waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a caller waits for a pooled connection before failing.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 4;

const FILE_COLUMNS: &str = "code, file_name, created_at, expires_at, max_uses, current_uses";
const PASTE_COLUMNS: &str = "code, content, lang, created_at, expires_at, max_uses, current_uses";

/// SQLite implementation of the repository contract.
///
/// One table per kind (`files`, `pastes`) keyed by code. Consumption is a
/// single conditional `UPDATE ... RETURNING`, so the quota test and the
/// increment cannot interleave with another consumer; a timed-out row is
/// removed by a guarded `DELETE ... RETURNING` that only one caller can win.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a repository from an existing SQLite connection pool.
    ///
    /// The schema is not created; call [`SqliteRepository::migrate`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database file at `path` and applies the schema.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Unavailable(format!("{}: {e}", parent.display())))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        let repository = Self::new(pool);
        repository.migrate().await?;
        debug!(path = %path.display(), "opened sqlite record store");
        Ok(repository)
    }

    /// Opens a private in-memory database with the schema applied.
    ///
    /// Every SQLite connection to `:memory:` is a separate database, so the
    /// pool is pinned to one connection that is never recycled.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(map_sqlx_error)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        let repository = Self::new(pool);
        repository.migrate().await?;
        Ok(repository)
    }

    /// Creates the tables and indexes if they do not exist.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn table(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::File => "files",
        ContentKind::Paste => "pastes",
    }
}

fn columns(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::File => FILE_COLUMNS,
        ContentKind::Paste => PASTE_COLUMNS,
    }
}

fn parse_timestamp(column: &str, millis: i64) -> Result<Timestamp> {
    Timestamp::from_millisecond(millis).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{millis}': {e}"))
    })
}

fn decode_record(kind: ContentKind, row: &SqliteRow) -> Result<ContentRecord> {
    let code: String = row.try_get("code").map_err(map_sqlx_error)?;

    let payload = match kind {
        ContentKind::File => PayloadRef::Blob {
            file_name: row.try_get("file_name").map_err(map_sqlx_error)?,
        },
        ContentKind::Paste => PayloadRef::Text {
            content: row.try_get("content").map_err(map_sqlx_error)?,
            lang: row.try_get("lang").map_err(map_sqlx_error)?,
        },
    };

    let created_at = parse_timestamp(
        "created_at",
        row.try_get("created_at").map_err(map_sqlx_error)?,
    )?;
    let expires_at = parse_timestamp(
        "expires_at",
        row.try_get("expires_at").map_err(map_sqlx_error)?,
    )?;

    let max_uses: i64 = row.try_get("max_uses").map_err(map_sqlx_error)?;
    let max_uses = Quota::new(max_uses).map_err(|e| StorageError::InvalidData(e.to_string()))?;

    let current_uses: i64 = row.try_get("current_uses").map_err(map_sqlx_error)?;
    let current_uses = u32::try_from(current_uses).map_err(|_| {
        StorageError::InvalidData(format!("invalid current_uses '{current_uses}' for {code}"))
    })?;

    Ok(ContentRecord {
        code: Code::new_unchecked(code),
        created_at,
        expires_at,
        max_uses,
        current_uses,
        payload,
    })
}

fn count(row: &SqliteRow, column: &str) -> Result<u64> {
    let value: i64 = row.try_get(column).map_err(map_sqlx_error)?;
    u64::try_from(value)
        .map_err(|_| StorageError::InvalidData(format!("negative {column}: {value}")))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        // SQLITE_BUSY surfaces as a database error once the busy timeout lapses
        sqlx::Error::Database(ref db) if db.message().contains("locked") => {
            StorageError::Timeout(message)
        }
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadRepository for SqliteRepository {
    async fn get(&self, kind: ContentKind, code: &Code) -> Result<Option<ContentRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE code = ?1",
            columns(kind),
            table(kind)
        );

        let row = sqlx::query(&sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| decode_record(kind, &row)).transpose()
    }

    async fn exists(&self, kind: ContentKind, code: &Code) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE code = ?1 LIMIT 1", table(kind));

        let exists = sqlx::query(&sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .is_some();

        Ok(exists)
    }

    async fn list(&self, kind: ContentKind) -> Result<Vec<ContentRecord>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY created_at",
            columns(kind),
            table(kind)
        );

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(|row| decode_record(kind, row)).collect()
    }

    async fn stats(&self) -> Result<Stats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM files) AS total_files,
                (SELECT COUNT(*) FROM pastes) AS total_pastes,
                (SELECT COALESCE(SUM(current_uses), 0) FROM files) AS total_downloads
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(Stats {
            total_files: count(&row, "total_files")?,
            total_pastes: count(&row, "total_pastes")?,
            total_downloads: count(&row, "total_downloads")?,
        })
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn insert(&self, record: ContentRecord) -> Result<()> {
        let code = record.code.as_str();
        let created_at = record.created_at.as_millisecond();
        let expires_at = record.expires_at.as_millisecond();
        let max_uses = i64::from(record.max_uses);
        let current_uses = i64::from(record.current_uses);

        let query = match &record.payload {
            PayloadRef::Blob { file_name } => sqlx::query(
                r#"
                INSERT INTO files (code, file_name, created_at, expires_at, max_uses, current_uses)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(code)
            .bind(file_name.as_str()),
            PayloadRef::Text { content, lang } => sqlx::query(
                r#"
                INSERT INTO pastes (code, content, lang, created_at, expires_at, max_uses, current_uses)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(code)
            .bind(content.as_str())
            .bind(lang.as_str()),
        };

        let result = query
            .bind(created_at)
            .bind(expires_at)
            .bind(max_uses)
            .bind(current_uses)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StorageError::Conflict(record.code.to_string()))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn consume(
        &self,
        kind: ContentKind,
        code: &Code,
        now: Timestamp,
    ) -> Result<Consumption> {
        let now = now.as_millisecond();

        // Test-and-increment in one statement.
        let increment = format!(
            r#"
            UPDATE {table}
            SET current_uses = current_uses + 1
            WHERE code = ?1
              AND current_uses < max_uses
              AND expires_at > ?2
            RETURNING {columns}
            "#,
            table = table(kind),
            columns = columns(kind),
        );

        let served = sqlx::query(&increment)
            .bind(code.as_str())
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if let Some(row) = served {
            return Ok(Consumption::Served(decode_record(kind, &row)?));
        }

        // Not served: either timed out, exhausted, or gone.
        let expire = format!(
            r#"
            DELETE FROM {table}
            WHERE code = ?1
              AND expires_at <= ?2
            RETURNING {columns}
            "#,
            table = table(kind),
            columns = columns(kind),
        );

        let removed = sqlx::query(&expire)
            .bind(code.as_str())
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if let Some(row) = removed {
            return Ok(Consumption::Expired(Some(decode_record(kind, &row)?)));
        }

        if self.exists(kind, code).await? {
            Ok(Consumption::Expired(None))
        } else {
            Ok(Consumption::NotFound)
        }
    }

    async fn delete(&self, kind: ContentKind, code: &Code) -> Result<Option<ContentRecord>> {
        let sql = format!(
            "DELETE FROM {} WHERE code = ?1 RETURNING {}",
            table(kind),
            columns(kind)
        );

        let row = sqlx::query(&sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| decode_record(kind, &row)).transpose()
    }
}
