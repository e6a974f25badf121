//! 종목/거래일 동기화 모듈.

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::coordinator::BatchSyncCoordinator;
use crate::domain::{Market, SyncStatus};
use crate::error::CollectorError;
use crate::provider::ReferenceDataProvider;
use crate::repository::{StockSymbolRepository, TradeDateRepository};
use crate::stats::SyncRunOutcome;
use crate::Result;

/// 종목 및 거래일 동기화 서비스
#[derive(Clone)]
pub struct StockSyncService {
    coordinator: BatchSyncCoordinator,
    provider: Arc<dyn ReferenceDataProvider>,
    symbols: Arc<dyn StockSymbolRepository>,
    trade_dates: Arc<dyn TradeDateRepository>,
}

impl StockSyncService {
    pub fn new(
        coordinator: BatchSyncCoordinator,
        provider: Arc<dyn ReferenceDataProvider>,
        symbols: Arc<dyn StockSymbolRepository>,
        trade_dates: Arc<dyn TradeDateRepository>,
    ) -> Self {
        Self {
            coordinator,
            provider,
            symbols,
            trade_dates,
        }
    }

    /// 한 시장의 종목 정보 동기화
    pub async fn sync_market(
        &self,
        market: Market,
        token: &CancellationToken,
    ) -> Result<SyncRunOutcome> {
        let provider = Arc::clone(&self.provider);
        self.coordinator
            .sync_market(
                market.code(),
                |token| async move { provider.fetch_stock_info(market, &token).await },
                Arc::clone(&self.symbols),
                token,
            )
            .await
    }

    /// 대만 종목 정보 동기화
    pub async fn sync_taiwan_stock_info(&self, token: &CancellationToken) -> Result<SyncRunOutcome> {
        self.sync_market(Market::Taiwan, token).await
    }

    /// 미국 종목 정보 동기화
    pub async fn sync_us_stock_info(&self, token: &CancellationToken) -> Result<SyncRunOutcome> {
        self.sync_market(Market::Us, token).await
    }

    /// 여러 시장을 순서대로 동기화합니다. 한 시장의 실패는 다음 시장을 막지 않습니다.
    ///
    /// 취소되면 남은 시장은 건너뜁니다.
    pub async fn sync_markets(
        &self,
        markets: &[Market],
        token: &CancellationToken,
    ) -> Vec<(Market, Result<SyncRunOutcome>)> {
        let mut results = Vec::with_capacity(markets.len());
        for &market in markets {
            if token.is_cancelled() {
                info!(market = %market, "취소됨, 남은 시장 동기화 건너뜀");
                break;
            }
            let result = self.sync_market(market, token).await;
            if let Err(e) = &result {
                error!(market = %market, error = %e, "종목 동기화 실패");
            }
            results.push((market, result));
        }
        results
    }

    /// 대만 거래일 동기화 (상태 레코드는 남기지 않음)
    pub async fn sync_taiwan_trading_dates(
        &self,
        token: &CancellationToken,
    ) -> Result<SyncRunOutcome> {
        if token.is_cancelled() {
            return Err(CollectorError::Cancelled);
        }

        info!("대만 거래일 동기화 시작");

        let dates = self.provider.fetch_taiwan_trading_dates(token).await.map_err(|e| {
            error!(error = %e, "거래일 조회 실패");
            e
        })?;

        info!(count = dates.len(), "거래일 조회 완료");

        let outcome = self
            .coordinator
            .run_batches(dates, Arc::clone(&self.trade_dates), token)
            .await;
        outcome.log_summary("거래일 동기화");
        Ok(outcome)
    }

    /// 시장별 저장된 종목 수
    pub async fn get_sync_stats(&self) -> Result<HashMap<String, i64>> {
        self.symbols.market_stats().await
    }

    /// 시장별 마지막 동기화 상태
    pub async fn get_sync_status(&self, market: Market) -> Result<Option<SyncStatus>> {
        self.coordinator.recorder().get(market.code()).await
    }
}

/// [`StockSyncService::sync_markets`] 결과 중 실패한 시장 목록
pub fn failed_markets(results: &[(Market, Result<SyncRunOutcome>)]) -> Vec<Market> {
    results
        .iter()
        .filter(|(_, result)| result.is_err())
        .map(|(market, _)| *market)
        .collect()
}
