use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::StockSymbolRepository;
use crate::domain::StockSymbol;
use crate::error::CollectorError;
use crate::modules::worker_pool::BatchOutcome;
use crate::Result;

/// `stock_symbols` 테이블 기반 종목 저장소
#[derive(Debug, Clone)]
pub struct PgStockSymbolRepository {
    pool: PgPool,
}

impl PgStockSymbolRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockSymbolRepository for PgStockSymbolRepository {
    async fn batch_upsert(
        &self,
        symbols: &[StockSymbol],
        token: &CancellationToken,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut last_error = None;

        for (idx, symbol) in symbols.iter().enumerate() {
            if token.is_cancelled() {
                outcome.error_count += symbols.len() - idx;
                outcome.error = Some(CollectorError::Cancelled);
                return outcome;
            }

            // 이름이 바뀐 경우에만 갱신
            let result = sqlx::query(
                r#"
                INSERT INTO stock_symbols (symbol, name, market, created_at, updated_at)
                VALUES ($1, $2, $3, NOW(), NOW())
                ON CONFLICT (symbol, market) DO UPDATE SET
                    name = EXCLUDED.name,
                    updated_at = NOW()
                WHERE stock_symbols.name IS DISTINCT FROM EXCLUDED.name
                "#,
            )
            .bind(&symbol.symbol)
            .bind(&symbol.name)
            .bind(symbol.market.code())
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => outcome.success_count += 1,
                Err(e) => {
                    warn!(symbol = %symbol.symbol, market = %symbol.market, error = %e, "종목 저장 실패");
                    outcome.error_count += 1;
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            outcome.error = Some(CollectorError::Database(e));
        }
        outcome
    }

    async fn market_stats(&self) -> Result<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT market, COUNT(*)
            FROM stock_symbols
            GROUP BY market
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}
