//! Postgres-backed health log (`api_health_logs`).

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tasa_common::{AttemptStatus, HealthLogEntry, Timestamp};

use super::HealthLog;
use crate::error::{StoreError, StoreResult};

const COLUMNS: &str = "api_name, status, response_time_ms, error_message, rate_obtained, created_at";

pub struct PgHealthLog {
    pool: PgPool,
}

impl PgHealthLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> StoreResult<HealthLogEntry> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<AttemptStatus>()
            .map_err(|e| StoreError::CorruptRow(e.to_string()))?;

        Ok(HealthLogEntry {
            api_name: row.try_get("api_name")?,
            status,
            response_time_ms: row.try_get("response_time_ms")?,
            error_message: row.try_get("error_message")?,
            rate_obtained: row.try_get::<Option<Decimal>, _>("rate_obtained")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl HealthLog for PgHealthLog {
    async fn append(&self, entry: HealthLogEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO api_health_logs (api_name, status, response_time_ms, error_message, rate_obtained, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&entry.api_name)
        .bind(entry.status.as_str())
        .bind(entry.response_time_ms)
        .bind(&entry.error_message)
        .bind(entry.rate_obtained)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn entries_since(&self, api_name: &str, since: Timestamp) -> StoreResult<Vec<HealthLogEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM api_health_logs
             WHERE api_name = $1 AND created_at >= $2
             ORDER BY created_at DESC"
        ))
        .bind(api_name)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn latest(&self, api_name: &str) -> StoreResult<Option<HealthLogEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM api_health_logs
             WHERE api_name = $1
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(api_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }
}
