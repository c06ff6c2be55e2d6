//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the `StorageBackend` trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers (history, advisory) never block the ingest writer
//! - **Connection pooling**: Efficient resource usage
//! - **Migrations**: Automatic schema versioning with sqlx

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{AdvisoryRecord, millis_to_timestamp, timestamp_to_millis};
use crate::advisory::AdvisoryStatus;
use crate::reading::{Origin, Reading};

/// SQLite storage backend
///
/// Stores readings and advisory records in a local SQLite database file.
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for concurrent readers (WAL mode)
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use greenhouse_hub::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./greenhouse.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("SQLite backend ready");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn reading_from_row(row: &SqliteRow) -> StorageResult<Reading> {
        let id: i64 = row.try_get("id")?;
        let origin: String = row.try_get("origin")?;
        let extra: String = row.try_get("extra")?;

        let origin = origin
            .parse::<Origin>()
            .map_err(StorageError::SerializationError)?;
        let extra: Map<String, Value> = serde_json::from_str(&extra)?;

        Ok(Reading {
            id: Some(id.to_string()),
            timestamp: millis_to_timestamp(row.try_get("timestamp")?)?,
            origin,
            t: row.try_get("temperature")?,
            h: row.try_get("humidity")?,
            l: row.try_get("light")?,
            device_id: row.try_get("device_id")?,
            raw: row.try_get("raw")?,
            extra,
        })
    }

    fn advisory_from_row(row: &SqliteRow) -> StorageResult<AdvisoryRecord> {
        let id: i64 = row.try_get("id")?;
        let status: String = row.try_get("status")?;

        Ok(AdvisoryRecord {
            id: Some(id.to_string()),
            timestamp: millis_to_timestamp(row.try_get("timestamp")?)?,
            t: row.try_get("temperature")?,
            h: row.try_get("humidity")?,
            l: row.try_get("light")?,
            question: row.try_get("question")?,
            answer: row.try_get("answer")?,
            status: status
                .parse::<AdvisoryStatus>()
                .map_err(StorageError::SerializationError)?,
        })
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip_all, fields(origin = %reading.origin))]
    async fn insert_reading(&self, reading: &Reading) -> StorageResult<String> {
        let extra = serde_json::to_string(&reading.extra)?;

        let result = sqlx::query(
            r#"
            INSERT INTO readings (
                timestamp, origin, temperature, humidity, light, device_id, raw, extra
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(timestamp_to_millis(&reading.timestamp))
        .bind(reading.origin.to_string())
        .bind(reading.t)
        .bind(reading.h)
        .bind(reading.l)
        .bind(&reading.device_id)
        .bind(&reading.raw)
        .bind(extra)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid().to_string();
        debug!("stored reading {id}");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn recent_readings(&self, limit: usize) -> StorageResult<Vec<Reading>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, origin, temperature, humidity, light, device_id, raw, extra
            FROM readings
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::reading_from_row).collect()
    }

    #[instrument(skip_all)]
    async fn insert_advisory(&self, record: &AdvisoryRecord) -> StorageResult<String> {
        let result = sqlx::query(
            r#"
            INSERT INTO advisories (
                timestamp, temperature, humidity, light, question, answer, status
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(timestamp_to_millis(&record.timestamp))
        .bind(record.t)
        .bind(record.h)
        .bind(record.l)
        .bind(&record.question)
        .bind(&record.answer)
        .bind(record.status.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid().to_string())
    }

    #[instrument(skip(self))]
    async fn recent_advisories(&self, limit: usize) -> StorageResult<Vec<AdvisoryRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, temperature, humidity, light, question, answer, status
            FROM advisories
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::advisory_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM readings")
            .fetch_one(&self.pool)
            .await
        {
            Ok((count,)) => Ok(HealthStatus {
                healthy: true,
                message: "SQLite backend operational".to_string(),
                metadata: HashMap::from([
                    ("backend".to_string(), "sqlite".to_string()),
                    ("db_path".to_string(), self.db_path.clone()),
                    ("readings".to_string(), count.to_string()),
                ]),
            }),
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::from([("backend".to_string(), "sqlite".to_string())]),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
