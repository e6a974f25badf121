use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use super::TradeDateRepository;
use crate::domain::TradeDate;
use crate::error::CollectorError;
use crate::modules::worker_pool::BatchOutcome;

/// `trade_dates` 테이블 기반 거래일 저장소
#[derive(Debug, Clone)]
pub struct PgTradeDateRepository {
    pool: PgPool,
}

impl PgTradeDateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeDateRepository for PgTradeDateRepository {
    /// 배치 전체를 한 번의 INSERT로 저장합니다 (배치 단위 성공/실패).
    async fn batch_insert(&self, dates: &[TradeDate], token: &CancellationToken) -> BatchOutcome {
        if token.is_cancelled() {
            return BatchOutcome::failed(dates.len(), CollectorError::Cancelled);
        }

        let values: Vec<NaiveDate> = dates.iter().map(|d| d.date).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO trade_dates (date, created_at)
            SELECT d, NOW() FROM UNNEST($1::date[]) AS t(d)
            ON CONFLICT (date) DO NOTHING
            "#,
        )
        .bind(&values)
        .execute(&self.pool)
        .await;

        match result {
            // 이미 존재해서 무시된 날짜도 성공으로 취급
            Ok(_) => BatchOutcome::succeeded(dates.len()),
            Err(e) => BatchOutcome::failed(dates.len(), CollectorError::Database(e)),
        }
    }
}
