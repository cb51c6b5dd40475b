//! Postgres-backed rate store. One table per pair, same layout:
//! `id, rate, source, timestamp, is_fallback, api_response, created_at`.

use async_trait::async_trait;
use chrono::Duration;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tasa_common::{NewRateRecord, RatePair, RateRecord};
use tracing::debug;

use super::RateStore;
use crate::error::StoreResult;

const COLUMNS: &str = "id, rate, source, timestamp, is_fallback, api_response, created_at";

pub struct PgRateStore {
    pool: PgPool,
    table: &'static str,
}

impl PgRateStore {
    pub fn new(pool: PgPool, pair: RatePair) -> Self {
        Self {
            pool,
            table: pair.table(),
        }
    }

    fn map_row(row: &PgRow) -> StoreResult<RateRecord> {
        Ok(RateRecord {
            id: row.try_get("id")?,
            rate: row.try_get("rate")?,
            source: row.try_get("source")?,
            timestamp: row.try_get("timestamp")?,
            is_fallback: row.try_get("is_fallback")?,
            raw_payload: row
                .try_get::<Option<serde_json::Value>, _>("api_response")?
                .unwrap_or(serde_json::Value::Null),
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl RateStore for PgRateStore {
    async fn save(&self, record: NewRateRecord) -> StoreResult<RateRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO {} (rate, source, timestamp, is_fallback, api_response)
             VALUES ($1, $2, NOW(), $3, $4)
             RETURNING {COLUMNS}",
            self.table
        ))
        .bind(record.rate)
        .bind(&record.source)
        .bind(record.is_fallback)
        .bind(&record.raw_payload)
        .fetch_one(&self.pool)
        .await?;

        Self::map_row(&row)
    }

    async fn latest_valid(&self, max_age: Option<Duration>) -> StoreResult<Option<RateRecord>> {
        let row = match max_age {
            Some(age) => {
                // Cutoff on the database clock, the same clock that stamps rows.
                sqlx::query(&format!(
                    "SELECT {COLUMNS} FROM {}
                     WHERE is_fallback = FALSE AND timestamp >= NOW() - ($1 * INTERVAL '1 second')
                     ORDER BY timestamp DESC, id DESC
                     LIMIT 1",
                    self.table
                ))
                .bind(age.num_seconds())
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {COLUMNS} FROM {}
                     WHERE is_fallback = FALSE
                     ORDER BY timestamp DESC, id DESC
                     LIMIT 1",
                    self.table
                ))
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn latest_any(&self) -> StoreResult<Option<RateRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM {} ORDER BY timestamp DESC, id DESC LIMIT 1",
            self.table
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn cleanup(&self, keep: usize) -> StoreResult<u64> {
        let result = sqlx::query(&format!(
            "DELETE FROM {table}
             WHERE id NOT IN (
                 SELECT id FROM {table} ORDER BY timestamp DESC, id DESC LIMIT $1
             )",
            table = self.table
        ))
        .bind(keep as i64)
        .execute(&self.pool)
        .await?;

        debug!(table = self.table, deleted = result.rows_affected(), "Pruned rate table");
        Ok(result.rows_affected())
    }

    async fn count(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }
}

/// These run against a live Postgres: `DATABASE_URL=... cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;

    async fn store(pair: RatePair) -> PgRateStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.unwrap();
        sqlx::migrate!("../server/migrations").run(&pool).await.unwrap();
        sqlx::query(&format!("DELETE FROM {}", pair.table()))
            .execute(&pool)
            .await
            .unwrap();
        PgRateStore::new(pool, pair)
    }

    async fn insert_aged(store: &PgRateStore, rate: rust_decimal::Decimal, minutes_ago: i64) {
        sqlx::query(&format!(
            "INSERT INTO {} (rate, source, timestamp, is_fallback)
             VALUES ($1, 'src', NOW() - ($2 * INTERVAL '1 minute'), FALSE)",
            store.table
        ))
        .bind(rate)
        .bind(minutes_ago)
        .execute(&store.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_latest_valid_window_and_fallback_rows() {
        let store = store(RatePair::Binance).await;
        insert_aged(&store, dec!(230), 45).await;
        store
            .save(NewRateRecord::fallback(dec!(350), "Tasa por Defecto", Value::Null))
            .await
            .unwrap();

        assert!(store.latest_valid(Some(Duration::minutes(30))).await.unwrap().is_none());

        let valid = store.latest_valid(Some(Duration::hours(24))).await.unwrap().unwrap();
        assert_eq!(valid.rate, dec!(230));
        assert!(!valid.is_fallback);

        let any = store.latest_any().await.unwrap().unwrap();
        assert!(any.is_fallback);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_cleanup_keeps_newest_rows() {
        let store = store(RatePair::Cny).await;
        for i in 0..10i64 {
            insert_aged(&store, rust_decimal::Decimal::from(7) + rust_decimal::Decimal::new(i, 2), 100 - i).await;
        }

        let deleted = store.cleanup(3).await.unwrap();

        assert_eq!(deleted, 7);
        assert_eq!(store.count().await.unwrap(), 3);
        let latest = store.latest_any().await.unwrap().unwrap();
        assert_eq!(latest.rate, dec!(7.09));
        assert_eq!(store.cleanup(3).await.unwrap(), 0);
    }
}
