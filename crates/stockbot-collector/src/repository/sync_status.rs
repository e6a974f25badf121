use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::SyncStatusRepository;
use crate::domain::SyncStatus;
use crate::Result;

/// `sync_metadata` 테이블 기반 동기화 상태 저장소
#[derive(Debug, Clone)]
pub struct PgSyncStatusRepository {
    pool: PgPool,
}

impl PgSyncStatusRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncStatusRepository for PgSyncStatusRepository {
    async fn get_by_market(&self, market: &str) -> Result<Option<SyncStatus>> {
        let row: Option<(
            String,
            Option<DateTime<Utc>>,
            Option<DateTime<Utc>>,
            Option<String>,
            i64,
        )> = sqlx::query_as(
            r#"
            SELECT market, last_sync_at, last_success_at, last_error, total_count::BIGINT
            FROM sync_metadata
            WHERE market = $1
            "#,
        )
        .bind(market)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(market, last_sync_at, last_success_at, last_error, total_count)| SyncStatus {
                market,
                last_sync_at,
                last_success_at,
                last_error,
                total_count,
            },
        ))
    }

    async fn upsert(&self, status: &SyncStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_metadata (
                market, last_sync_at, last_success_at, last_error, total_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            ON CONFLICT (market) DO UPDATE SET
                last_sync_at = EXCLUDED.last_sync_at,
                last_success_at = COALESCE(EXCLUDED.last_success_at, sync_metadata.last_success_at),
                last_error = EXCLUDED.last_error,
                total_count = EXCLUDED.total_count,
                updated_at = NOW()
            "#,
        )
        .bind(&status.market)
        .bind(status.last_sync_at)
        .bind(status.last_success_at)
        .bind(status.last_error.as_deref())
        .bind(status.total_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
