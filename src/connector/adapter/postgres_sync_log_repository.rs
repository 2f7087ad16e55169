use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use tracing::{debug, info};

use crate::application::SyncLogRepository;
use crate::domain::{DomainError, SyncLogEntry, SyncStatus};

use super::postgres_schema::{execute_all, verify_tables};
use super::PostgresConnection;

const REQUIRED_COLUMNS: &[&str] = &[
    "table_name",
    "records_processed",
    "records_inserted",
    "records_updated",
    "status",
    "error_message",
    "execution_time_seconds",
    "metadata",
    "sync_timestamp",
];

#[derive(Debug, FromRow)]
struct SyncLogRow {
    table_name: String,
    records_processed: i64,
    records_inserted: i64,
    records_updated: i64,
    status: String,
    error_message: Option<String>,
    execution_time_seconds: f64,
    metadata: Option<Value>,
    sync_timestamp: DateTime<Utc>,
}

impl From<SyncLogRow> for SyncLogEntry {
    fn from(row: SyncLogRow) -> Self {
        SyncLogEntry {
            table_name: row.table_name,
            records_processed: row.records_processed.max(0) as u64,
            records_inserted: row.records_inserted.max(0) as u64,
            records_updated: row.records_updated.max(0) as u64,
            status: SyncStatus::from_str(&row.status),
            error_message: row.error_message,
            execution_time_seconds: row.execution_time_seconds,
            metadata: row.metadata.unwrap_or(Value::Null),
            sync_timestamp: row.sync_timestamp,
        }
    }
}

/// Sync audit log in the destination database. Successful rows double as
/// the incremental checkpoint.
pub struct PostgresSyncLogRepository {
    connection: PostgresConnection,
    table: String,
}

impl PostgresSyncLogRepository {
    /// `table` must already be a valid SQL identifier.
    pub fn new(connection: PostgresConnection, table: &str) -> Self {
        Self {
            connection,
            table: table.to_string(),
        }
    }

    fn schema_statements(&self) -> Vec<String> {
        let table = &self.table;
        vec![
            format!(
                r#"CREATE TABLE IF NOT EXISTS {table} (
                    id BIGSERIAL PRIMARY KEY,
                    table_name TEXT NOT NULL,
                    records_processed BIGINT NOT NULL DEFAULT 0,
                    records_inserted BIGINT NOT NULL DEFAULT 0,
                    records_updated BIGINT NOT NULL DEFAULT 0,
                    status TEXT NOT NULL CHECK (status IN ('SUCCESS', 'ERROR')),
                    error_message TEXT,
                    execution_time_seconds DOUBLE PRECISION NOT NULL DEFAULT 0,
                    metadata JSONB NOT NULL DEFAULT '{{}}',
                    sync_timestamp TIMESTAMPTZ NOT NULL DEFAULT now()
                )"#
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {table}_lookup_idx \
                 ON {table} (table_name, status, sync_timestamp DESC)"
            ),
        ]
    }
}

#[async_trait]
impl SyncLogRepository for PostgresSyncLogRepository {
    async fn initialize(&self) -> Result<(), DomainError> {
        execute_all(self.connection.pool(), &self.schema_statements()).await?;
        info!("Sync log table ready: {}", self.table);
        Ok(())
    }

    async fn verify(&self) -> Result<(), DomainError> {
        verify_tables(self.connection.pool(), &[(self.table.as_str(), REQUIRED_COLUMNS)]).await
    }

    async fn count_successful(&self, table_name: &str) -> Result<u64, DomainError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE status = 'SUCCESS' AND table_name = $1",
            self.table
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(table_name)
            .fetch_one(self.connection.pool())
            .await
            .map_err(|e| DomainError::storage(format!("Failed to read sync log: {}", e)))?;
        Ok(count.max(0) as u64)
    }

    async fn last_successful_sync(
        &self,
        table_name: &str,
    ) -> Result<Option<DateTime<Utc>>, DomainError> {
        let sql = format!(
            "SELECT MAX(sync_timestamp) FROM {} WHERE status = 'SUCCESS' AND table_name = $1",
            self.table
        );
        sqlx::query_scalar(&sql)
            .bind(table_name)
            .fetch_one(self.connection.pool())
            .await
            .map_err(|e| DomainError::storage(format!("Failed to read sync log: {}", e)))
    }

    async fn record(&self, entry: &SyncLogEntry) -> Result<(), DomainError> {
        let sql = format!(
            r#"INSERT INTO {} (
                table_name, records_processed, records_inserted, records_updated,
                status, error_message, execution_time_seconds, metadata, sync_timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
            self.table
        );

        sqlx::query(&sql)
            .bind(&entry.table_name)
            .bind(entry.records_processed as i64)
            .bind(entry.records_inserted as i64)
            .bind(entry.records_updated as i64)
            .bind(entry.status.as_str())
            .bind(&entry.error_message)
            .bind(entry.execution_time_seconds)
            .bind(&entry.metadata)
            .bind(entry.sync_timestamp)
            .execute(self.connection.pool())
            .await
            .map_err(|e| DomainError::storage(format!("Failed to write sync log: {}", e)))?;

        debug!(
            "Logged {} sync for {}",
            entry.status.as_str(),
            entry.table_name
        );
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SyncLogEntry>, DomainError> {
        let sql = format!(
            r#"SELECT table_name, records_processed, records_inserted, records_updated,
                      status, error_message, execution_time_seconds, metadata, sync_timestamp
               FROM {}
               ORDER BY sync_timestamp DESC, id DESC
               LIMIT $1"#,
            self.table
        );

        let rows: Vec<SyncLogRow> = sqlx::query_as(&sql)
            .bind(limit as i64)
            .fetch_all(self.connection.pool())
            .await
            .map_err(|e| DomainError::storage(format!("Failed to read sync log: {}", e)))?;

        Ok(rows.into_iter().map(SyncLogEntry::from).collect())
    }
}
